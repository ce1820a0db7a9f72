use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use chrono::Utc;
use std::sync::Arc;

use super::{parse_object_id, ApiError};
use crate::{
    extractors::ValidatedJson,
    metrics::record_submission_outcome,
    models::progress::{
        StudentTestResult, SubmitTestRequest, SubmitTestResponse, TestResultResponse,
    },
    services::{
        evaluation_service, progress_service::ProgressService, test_service::TestService, AppState,
    },
};

/// Score a submitted answer set and record the result in the student's
/// progress aggregate.
///
/// Evaluation and persistence are deliberately decoupled: once the score is
/// computed it is always returned to the student, even when every attempt to
/// persist it has failed. In that case the response carries HTTP 206 and a
/// warning instead of failing the submission outright.
pub async fn submit_test(
    State(state): State<Arc<AppState>>,
    Path(test_id): Path<String>,
    ValidatedJson(req): ValidatedJson<SubmitTestRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let test_id = parse_object_id(&test_id, "test_id")?;
    let user_id = parse_object_id(&req.user_id, "userId")?;

    tracing::info!(
        "Received test submission: test={}, user={}, answers={}, time_spent={}",
        test_id,
        user_id,
        req.answers.len(),
        req.time_spent
    );

    let test_service = TestService::new(state.mongo.clone());
    let test = test_service
        .get_test(&test_id)
        .await?
        .ok_or_else(|| ApiError::not_found("Test not found"))?;

    if !test.is_active {
        return Err(ApiError::bad_request("Test is no longer active"));
    }
    if test.deadline_passed(Utc::now()) {
        return Err(ApiError::bad_request("Test deadline has passed"));
    }

    let result = evaluation_service::evaluate(&test, &req.answers, req.time_spent);

    let progress_service = ProgressService::new(state.mongo.clone(), state.progress_log.clone());

    match progress_service.save_result(&user_id, &test_id, &result).await {
        Ok(aggregate) => {
            record_submission_outcome("saved");
            tracing::info!(
                "Submission stored: test={}, user={}, tests_recorded={}",
                test_id,
                user_id,
                aggregate.passed_tests.len()
            );
            Ok((
                StatusCode::OK,
                Json(SubmitTestResponse {
                    score: result.score,
                    total_points: result.total_points,
                    percentage: result.percentage,
                    time_spent: result.time_spent,
                    warning: None,
                }),
            ))
        }
        Err(e) => {
            record_submission_outcome("degraded");
            tracing::error!(
                "Failed to persist test result: test={}, user={}: {}",
                test_id,
                user_id,
                e
            );
            Ok((
                StatusCode::PARTIAL_CONTENT,
                Json(SubmitTestResponse {
                    score: result.score,
                    total_points: result.total_points,
                    percentage: result.percentage,
                    time_spent: result.time_spent,
                    warning: Some(
                        "Test completed but progress may not be saved properly. \
                         Please contact support."
                            .to_string(),
                    ),
                }),
            ))
        }
    }
}

/// Stored result for one (test, student) pair; `studentResult` is null when
/// the student has not passed the test yet.
pub async fn get_test_result(
    State(state): State<Arc<AppState>>,
    Path((test_id, user_id)): Path<(String, String)>,
) -> Result<Json<TestResultResponse>, ApiError> {
    let test_id = parse_object_id(&test_id, "test_id")?;
    let user_id = parse_object_id(&user_id, "user_id")?;

    let progress_service = ProgressService::new(state.mongo.clone(), state.progress_log.clone());
    let result = progress_service.find_test_result(&user_id, &test_id).await?;

    Ok(Json(TestResultResponse {
        student_result: result.map(|r| StudentTestResult {
            test_id: test_id.to_hex(),
            student_id: user_id.to_hex(),
            answers: r.answers,
            score: r.score,
            total_points: r.total_points,
            percentage: r.percentage,
            completed_at: r.passed_at,
            time_spent: r.time_spent,
        }),
    }))
}
