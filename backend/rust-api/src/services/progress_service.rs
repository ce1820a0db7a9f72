use anyhow::{Context, Result};
use chrono::Utc;
use mongodb::{
    bson::{doc, oid::ObjectId, to_bson, Bson, Document},
    options::ReturnDocument,
    Database,
};
use serde_json::json;
use thiserror::Error;

use crate::metrics::{PROGRESS_WRITES_TOTAL, PROGRESS_WRITE_RETRIES_TOTAL};
use crate::models::progress::{TestResult, UserProgress};
use crate::utils::progress_log::DiagnosticLog;
use crate::utils::retry::{retry_async_with_config, RetryConfig};
use crate::utils::time::chrono_to_bson;

const PROGRESS_COLLECTION: &str = "user_progress";

#[derive(Debug, Error)]
pub enum ProgressWriteError {
    #[error("failed to encode test result: {0}")]
    Encode(#[from] mongodb::bson::ser::Error),
    #[error(
        "progress write for user {user_id} test {test_id} failed after {attempts} attempts: {last_error}"
    )]
    Exhausted {
        user_id: ObjectId,
        test_id: ObjectId,
        attempts: usize,
        last_error: String,
    },
}

/// Owner of the per-user progress aggregate.
///
/// All mutation goes through `save_result`: a single conditional upsert that
/// either replaces the entry under `passedTests.<testId>` or inserts it,
/// creating the aggregate document on first write. Document-level atomicity
/// of the update makes the append-vs-replace decision race-free, and the
/// keyed layout keeps one result per test without any scanning.
pub struct ProgressService {
    mongo: Database,
    diagnostics: DiagnosticLog,
}

impl ProgressService {
    pub fn new(mongo: Database, diagnostics: DiagnosticLog) -> Self {
        Self { mongo, diagnostics }
    }

    /// Persist `result` for `(user_id, test_id)`, last write wins.
    ///
    /// Transient storage errors are retried with backoff; they never reach
    /// the caller individually. Once every attempt is spent, the payload and
    /// the error from each attempt are appended to the diagnostic log before
    /// the failure is surfaced.
    pub async fn save_result(
        &self,
        user_id: &ObjectId,
        test_id: &ObjectId,
        result: &TestResult,
    ) -> Result<UserProgress, ProgressWriteError> {
        tracing::info!(
            "Saving test result: user={}, test={}, score={}/{}",
            user_id,
            test_id,
            result.score,
            result.total_points
        );

        let result_bson = match to_bson(result) {
            Ok(bson) => bson,
            Err(e) => {
                self.diagnostics
                    .append(
                        "Failed to encode test result for progress write",
                        json!({
                            "userId": user_id.to_hex(),
                            "testId": test_id.to_hex(),
                            "error": e.to_string(),
                        }),
                    )
                    .await;
                return Err(ProgressWriteError::Encode(e));
            }
        };

        let update = upsert_update(user_id, test_id, result_bson);
        let collection = self.mongo.collection::<UserProgress>(PROGRESS_COLLECTION);

        let retry = RetryConfig::aggressive();
        let mut attempt_errors: Vec<String> = Vec::new();
        let mut backoff = retry.base_backoff;

        for attempt in 1..=retry.max_attempts {
            match collection
                .find_one_and_update(doc! { "user": user_id }, update.clone())
                .upsert(true)
                .return_document(ReturnDocument::After)
                .await
            {
                Ok(Some(aggregate)) => {
                    PROGRESS_WRITES_TOTAL.with_label_values(&["success"]).inc();
                    tracing::info!(
                        "Progress saved: user={}, test={}, tests_recorded={}",
                        user_id,
                        test_id,
                        aggregate.passed_tests.len()
                    );
                    return Ok(aggregate);
                }
                // Upsert with ReturnDocument::After always hands the document
                // back; treat the contrary as a failed attempt
                Ok(None) => {
                    attempt_errors
                        .push("update acknowledged but no document returned".to_string());
                }
                Err(e) => {
                    tracing::warn!(
                        "Progress write attempt {}/{} failed: user={}, test={}: {}",
                        attempt,
                        retry.max_attempts,
                        user_id,
                        test_id,
                        e
                    );
                    attempt_errors.push(e.to_string());
                }
            }

            if attempt < retry.max_attempts {
                PROGRESS_WRITE_RETRIES_TOTAL.inc();
                let (wait, next) = retry.next_backoff(backoff);
                tokio::time::sleep(wait).await;
                backoff = next;
            }
        }

        PROGRESS_WRITES_TOTAL.with_label_values(&["failure"]).inc();

        let last_error = attempt_errors
            .last()
            .cloned()
            .unwrap_or_else(|| "unknown error".to_string());

        // On disk before the caller hears about the failure
        self.diagnostics
            .append(
                "All progress write attempts failed",
                json!({
                    "userId": user_id.to_hex(),
                    "testId": test_id.to_hex(),
                    "result": serde_json::to_value(result).unwrap_or(serde_json::Value::Null),
                    "errors": attempt_errors,
                }),
            )
            .await;

        Err(ProgressWriteError::Exhausted {
            user_id: *user_id,
            test_id: *test_id,
            attempts: retry.max_attempts,
            last_error,
        })
    }

    pub async fn load_progress(&self, user_id: &ObjectId) -> Result<Option<UserProgress>> {
        let collection = self.mongo.collection::<UserProgress>(PROGRESS_COLLECTION);

        retry_async_with_config(RetryConfig::default(), || async {
            collection.find_one(doc! { "user": user_id }).await
        })
        .await
        .context("Failed to query user progress")
    }

    pub async fn find_test_result(
        &self,
        user_id: &ObjectId,
        test_id: &ObjectId,
    ) -> Result<Option<TestResult>> {
        let progress = self.load_progress(user_id).await?;
        Ok(progress.and_then(|p| p.test_result(test_id).cloned()))
    }
}

/// Update document for the insert-or-replace-by-test upsert. Running it twice
/// with the same payload leaves the aggregate unchanged.
fn upsert_update(user_id: &ObjectId, test_id: &ObjectId, result_bson: Bson) -> Document {
    let now = chrono_to_bson(Utc::now());

    let mut set_doc = doc! { "updatedAt": now };
    set_doc.insert(format!("passedTests.{}", test_id.to_hex()), result_bson);

    doc! {
        "$set": set_doc,
        "$setOnInsert": {
            "user": user_id,
            "completedLessons": [],
            "solvedTasks": [],
            "createdAt": now,
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn upsert_update_targets_one_keyed_entry() {
        let user_id = ObjectId::new();
        let test_id = ObjectId::new();

        let update = upsert_update(&user_id, &test_id, Bson::String("payload".to_string()));

        let set = update.get_document("$set").unwrap();
        assert!(set.contains_key(format!("passedTests.{}", test_id.to_hex())));
        assert!(set.contains_key("updatedAt"));

        let on_insert = update.get_document("$setOnInsert").unwrap();
        assert_eq!(on_insert.get_object_id("user").unwrap(), user_id);
        assert!(on_insert.contains_key("completedLessons"));
        assert!(on_insert.contains_key("solvedTasks"));
        assert!(on_insert.contains_key("createdAt"));
        // The keyed entry itself must not appear in the insert branch
        assert!(!on_insert.contains_key(format!("passedTests.{}", test_id.to_hex())));
    }
}
