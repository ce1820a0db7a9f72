use anyhow::{Context, Result};
use futures::TryStreamExt;
use mongodb::{
    bson::{doc, oid::ObjectId},
    Database,
};

use crate::metrics::{track_db_operation, RATINGS_COMPUTED_TOTAL};
use crate::models::progress::UserProgress;
use crate::models::rating::{Material, StudentRating, StudentRatingRow, Submission};
use crate::models::user::User;

/// Read-only aggregator over progress, submissions and materials.
///
/// Everything is recomputed from the source collections on every call. The
/// endpoints only back dashboard views, so freshness wins over caching here.
pub struct RatingService {
    mongo: Database,
}

impl RatingService {
    pub fn new(mongo: Database) -> Self {
        Self { mongo }
    }

    pub async fn compute_rating(&self, user_id: &ObjectId) -> Result<StudentRating> {
        let materials = self.load_materials().await?;
        let breakdown = self.student_breakdown(user_id, &materials).await?;

        let students = self.load_students().await?;
        let mut standings = Vec::with_capacity(students.len());
        for student in &students {
            let student_breakdown = self.student_breakdown(&student.id, &materials).await?;
            standings.push((student.id, student_breakdown.overall_score()));
        }
        let standings = ranked(standings);

        let rank = standings
            .iter()
            .position(|(id, _)| id == user_id)
            .map(|i| i as u32 + 1)
            .unwrap_or(0);

        RATINGS_COMPUTED_TOTAL.with_label_values(&["student"]).inc();

        Ok(StudentRating {
            overall_score: breakdown.overall_score(),
            tests_completed: breakdown.tests_completed,
            tests_average: breakdown.tests_average,
            assignments_completed: breakdown.assignments_completed,
            assignments_average: breakdown.assignments_average,
            materials_progress: breakdown.materials_progress,
            rank,
            total_students: standings.len(),
        })
    }

    pub async fn compute_all_ratings(&self) -> Result<Vec<StudentRatingRow>> {
        let materials = self.load_materials().await?;
        let students = self.load_students().await?;

        let mut rows = Vec::with_capacity(students.len());
        for student in students {
            let breakdown = self.student_breakdown(&student.id, &materials).await?;
            rows.push(StudentRatingRow {
                id: student.id.to_hex(),
                name: student.full_name(),
                grade: student.grade.clone(),
                overall_score: breakdown.overall_score(),
                tests_average: breakdown.tests_average,
                assignments_average: breakdown.assignments_average,
                materials_progress: breakdown.materials_progress,
            });
        }

        // Stable sort keeps the query order between equal scores
        rows.sort_by(|a, b| b.overall_score.cmp(&a.overall_score));

        RATINGS_COMPUTED_TOTAL.with_label_values(&["all"]).inc();

        Ok(rows)
    }

    async fn student_breakdown(
        &self,
        user_id: &ObjectId,
        materials: &[Material],
    ) -> Result<ScoreBreakdown> {
        // Tests
        let progress_collection = self.mongo.collection::<UserProgress>("user_progress");
        let progress = track_db_operation("find_one", "user_progress", async {
            progress_collection
                .find_one(doc! { "user": user_id })
                .await
                .context("Failed to query user progress")
        })
        .await?;

        let test_percentages: Vec<f64> = progress
            .map(|p| p.passed_tests.values().map(|t| t.percentage).collect())
            .unwrap_or_default();

        // Assignments: only submissions somebody has already evaluated
        let submissions_collection = self.mongo.collection::<Submission>("submissions");
        let submissions: Vec<Submission> = track_db_operation("find", "submissions", async {
            let cursor = submissions_collection
                .find(doc! {
                    "student": user_id,
                    "status": { "$in": ["ai_evaluated", "teacher_evaluated"] },
                })
                .await
                .context("Failed to query submissions")?;
            cursor
                .try_collect()
                .await
                .context("Submissions cursor failure")
        })
        .await?;

        let assignment_scores: Vec<f64> = submissions.iter().map(|s| s.effective_score()).collect();

        // Materials
        let viewed = materials
            .iter()
            .filter(|m| m.viewed_by_user(user_id))
            .count();

        Ok(ScoreBreakdown {
            tests_completed: test_percentages.len(),
            tests_average: mean(&test_percentages),
            assignments_completed: assignment_scores.len(),
            assignments_average: mean(&assignment_scores),
            materials_progress: materials_progress(viewed, materials.len()),
        })
    }

    async fn load_materials(&self) -> Result<Vec<Material>> {
        let collection = self.mongo.collection::<Material>("materials");
        track_db_operation("find", "materials", async {
            let cursor = collection
                .find(doc! {})
                .await
                .context("Failed to query materials")?;
            cursor
                .try_collect()
                .await
                .context("Materials cursor failure")
        })
        .await
    }

    async fn load_students(&self) -> Result<Vec<User>> {
        let collection = self.mongo.collection::<User>("users");
        track_db_operation("find", "users", async {
            let cursor = collection
                .find(doc! { "role": "student" })
                .await
                .context("Failed to query students")?;
            cursor.try_collect().await.context("Students cursor failure")
        })
        .await
    }
}

#[derive(Debug, Clone, PartialEq)]
struct ScoreBreakdown {
    tests_completed: usize,
    tests_average: f64,
    assignments_completed: usize,
    assignments_average: f64,
    materials_progress: f64,
}

impl ScoreBreakdown {
    /// Rounded mean of the three sub-averages.
    fn overall_score(&self) -> i64 {
        ((self.tests_average + self.assignments_average + self.materials_progress) / 3.0).round()
            as i64
    }
}

fn mean(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    values.iter().sum::<f64>() / values.len() as f64
}

fn materials_progress(viewed: usize, total: usize) -> f64 {
    if total == 0 {
        return 0.0;
    }
    (viewed as f64 / total as f64) * 100.0
}

/// Descending by score; the stable sort keeps input order between ties.
fn ranked(mut standings: Vec<(ObjectId, i64)>) -> Vec<(ObjectId, i64)> {
    standings.sort_by(|a, b| b.1.cmp(&a.1));
    standings
}
