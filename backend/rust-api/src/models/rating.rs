use chrono::{DateTime, Utc};
use mongodb::bson::oid::ObjectId;
use serde::{Deserialize, Serialize};

/// Assignment submission from the "submissions" collection (owned by the
/// assignment service). The rating aggregator only reads evaluation scores.
#[derive(Debug, Clone, Deserialize)]
pub struct Submission {
    #[serde(rename = "_id")]
    pub id: ObjectId,
    pub student: ObjectId,
    #[serde(default)]
    pub assignment: Option<ObjectId>,
    pub status: SubmissionStatus,
    #[serde(rename = "aiEvaluation", default)]
    pub ai_evaluation: Option<Evaluation>,
    #[serde(rename = "teacherEvaluation", default)]
    pub teacher_evaluation: Option<Evaluation>,
}

impl Submission {
    /// Teacher evaluation wins over the AI one when both are present.
    pub fn effective_score(&self) -> f64 {
        self.teacher_evaluation
            .as_ref()
            .and_then(|e| e.score)
            .or_else(|| self.ai_evaluation.as_ref().and_then(|e| e.score))
            .unwrap_or(0.0)
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct Evaluation {
    #[serde(default)]
    pub score: Option<f64>,
    #[serde(default)]
    pub feedback: Option<String>,
    #[serde(
        rename = "evaluatedAt",
        default,
        with = "super::bson_datetime_as_chrono_option"
    )]
    pub evaluated_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum SubmissionStatus {
    Submitted,
    AiEvaluated,
    TeacherEvaluated,
    PendingTeacherReview,
}

/// Learning material from the "materials" collection (owned by the content
/// service); only the view log matters for the progress percentage.
#[derive(Debug, Clone, Deserialize)]
pub struct Material {
    #[serde(rename = "_id")]
    pub id: ObjectId,
    #[serde(rename = "viewedBy", default)]
    pub viewed_by: Vec<MaterialView>,
}

impl Material {
    pub fn viewed_by_user(&self, user_id: &ObjectId) -> bool {
        self.viewed_by
            .iter()
            .any(|v| v.user_id.as_ref() == Some(user_id))
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct MaterialView {
    #[serde(rename = "userId", default)]
    pub user_id: Option<ObjectId>,
    #[serde(
        rename = "viewedAt",
        default,
        with = "super::bson_datetime_as_chrono_option"
    )]
    pub viewed_at: Option<DateTime<Utc>>,
}

/// Dashboard payload for a single student.
#[derive(Debug, Serialize)]
pub struct StudentRating {
    #[serde(rename = "overallScore")]
    pub overall_score: i64,
    #[serde(rename = "testsCompleted")]
    pub tests_completed: usize,
    #[serde(rename = "testsAverage")]
    pub tests_average: f64,
    #[serde(rename = "assignmentsCompleted")]
    pub assignments_completed: usize,
    #[serde(rename = "assignmentsAverage")]
    pub assignments_average: f64,
    #[serde(rename = "materialsProgress")]
    pub materials_progress: f64,
    /// 1-based position among all students, 0 when the user is not a student
    pub rank: u32,
    #[serde(rename = "totalStudents")]
    pub total_students: usize,
}

/// One row of the teacher-facing leaderboard, ordered by descending
/// overall score.
#[derive(Debug, Serialize)]
pub struct StudentRatingRow {
    pub id: String,
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub grade: Option<String>,
    #[serde(rename = "overallScore")]
    pub overall_score: i64,
    #[serde(rename = "testsAverage")]
    pub tests_average: f64,
    #[serde(rename = "assignmentsAverage")]
    pub assignments_average: f64,
    #[serde(rename = "materialsProgress")]
    pub materials_progress: f64,
}
