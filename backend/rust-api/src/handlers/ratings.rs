use axum::{
    extract::{Path, State},
    Json,
};
use std::sync::Arc;

use super::{parse_object_id, ApiError};
use crate::{
    models::rating::{StudentRating, StudentRatingRow},
    services::{rating_service::RatingService, AppState},
};

pub async fn get_student_rating(
    State(state): State<Arc<AppState>>,
    Path(user_id): Path<String>,
) -> Result<Json<StudentRating>, ApiError> {
    let user_id = parse_object_id(&user_id, "user_id")?;

    tracing::info!("Computing rating for student {}", user_id);

    let service = RatingService::new(state.mongo.clone());
    let rating = service.compute_rating(&user_id).await?;

    Ok(Json(rating))
}

pub async fn get_all_students_ratings(
    State(state): State<Arc<AppState>>,
) -> Result<Json<Vec<StudentRatingRow>>, ApiError> {
    tracing::info!("Computing ratings for all students");

    let service = RatingService::new(state.mongo.clone());
    let ratings = service.compute_all_ratings().await?;

    Ok(Json(ratings))
}
