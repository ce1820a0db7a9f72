use chrono::{DateTime, Utc};
use mongodb::bson::oid::ObjectId;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use validator::Validate;

/// Per-user progress document stored in the "user_progress" collection.
///
/// Created lazily on the first write and mutated only through
/// `ProgressService`. `passed_tests` is keyed by the test's ObjectId hex, so
/// a user can never hold two results for the same test.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserProgress {
    #[serde(rename = "_id", skip_serializing_if = "Option::is_none")]
    pub id: Option<ObjectId>,
    pub user: ObjectId,
    #[serde(rename = "completedLessons", default)]
    pub completed_lessons: Vec<CompletedLesson>,
    #[serde(rename = "passedTests", default)]
    pub passed_tests: HashMap<String, TestResult>,
    #[serde(rename = "solvedTasks", default)]
    pub solved_tasks: Vec<SolvedTask>,
    #[serde(rename = "createdAt", with = "super::bson_datetime_as_chrono")]
    pub created_at: DateTime<Utc>,
    #[serde(rename = "updatedAt", with = "super::bson_datetime_as_chrono")]
    pub updated_at: DateTime<Utc>,
}

impl UserProgress {
    pub fn test_result(&self, test_id: &ObjectId) -> Option<&TestResult> {
        self.passed_tests.get(&test_id.to_hex())
    }
}

/// One user's outcome for one test attempt. Resubmitting the same test
/// replaces the entry in place.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TestResult {
    pub test: ObjectId,
    pub score: i64,
    #[serde(rename = "totalPoints")]
    pub total_points: i64,
    pub percentage: f64,
    #[serde(default)]
    pub answers: Vec<EvaluatedAnswer>,
    /// Seconds spent on the attempt, never negative
    #[serde(rename = "timeSpent", default)]
    pub time_spent: i64,
    #[serde(rename = "passedAt", with = "super::bson_datetime_as_chrono")]
    pub passed_at: DateTime<Utc>,
}

/// Ids are kept as the strings the client submitted; an id that never matched
/// anything still gets recorded with zero points.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct EvaluatedAnswer {
    #[serde(rename = "questionId")]
    pub question_id: String,
    #[serde(rename = "optionId")]
    pub option_id: String,
    pub correct: bool,
    pub points: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompletedLesson {
    pub lesson: ObjectId,
    #[serde(rename = "completedAt", with = "super::bson_datetime_as_chrono")]
    pub completed_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SolvedTask {
    pub task: ObjectId,
    #[serde(default)]
    pub solution: Option<String>,
    #[serde(rename = "timeSpent", default)]
    pub time_spent: i64,
    #[serde(rename = "solvedAt", with = "super::bson_datetime_as_chrono")]
    pub solved_at: DateTime<Utc>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct SubmittedAnswer {
    #[serde(rename = "questionId")]
    pub question_id: String,
    #[serde(rename = "optionId")]
    pub option_id: String,
}

#[derive(Debug, Deserialize, Validate)]
pub struct SubmitTestRequest {
    /// Authorization is checked upstream; the gateway forwards the user id
    #[serde(rename = "userId")]
    pub user_id: String,
    #[validate(length(min = 1, message = "answers must not be empty"))]
    pub answers: Vec<SubmittedAnswer>,
    #[serde(rename = "timeSpent", default)]
    pub time_spent: i64,
}

#[derive(Debug, Serialize)]
pub struct SubmitTestResponse {
    pub score: i64,
    #[serde(rename = "totalPoints")]
    pub total_points: i64,
    pub percentage: f64,
    #[serde(rename = "timeSpent")]
    pub time_spent: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub warning: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct TestResultResponse {
    #[serde(rename = "studentResult")]
    pub student_result: Option<StudentTestResult>,
}

#[derive(Debug, Serialize)]
pub struct StudentTestResult {
    #[serde(rename = "testId")]
    pub test_id: String,
    #[serde(rename = "studentId")]
    pub student_id: String,
    pub answers: Vec<EvaluatedAnswer>,
    pub score: i64,
    #[serde(rename = "totalPoints")]
    pub total_points: i64,
    pub percentage: f64,
    #[serde(rename = "completedAt")]
    pub completed_at: DateTime<Utc>,
    #[serde(rename = "timeSpent")]
    pub time_spent: i64,
}
