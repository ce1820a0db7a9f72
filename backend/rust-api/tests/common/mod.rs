#![allow(dead_code)]

use axum::Router;
use chrono::{Duration, Utc};
use codeclass_api::{config::Config, create_router, services::AppState};
use mongodb::bson::{doc, oid::ObjectId, DateTime as BsonDateTime, Document};
use std::sync::Arc;

// Fixed ids so parallel tests seed the same definitions
pub const TEST_ID: &str = "64a1f0c2b5d3a4e6f7890001";
pub const INACTIVE_TEST_ID: &str = "64a1f0c2b5d3a4e6f7890002";
pub const EXPIRED_TEST_ID: &str = "64a1f0c2b5d3a4e6f7890003";

pub const Q1_ID: &str = "64a1f0c2b5d3a4e6f7890011";
pub const Q2_ID: &str = "64a1f0c2b5d3a4e6f7890012";
pub const Q1_CORRECT: &str = "64a1f0c2b5d3a4e6f7890021";
pub const Q1_WRONG: &str = "64a1f0c2b5d3a4e6f7890022";
pub const Q2_CORRECT: &str = "64a1f0c2b5d3a4e6f7890023";
pub const Q2_WRONG: &str = "64a1f0c2b5d3a4e6f7890024";

pub fn oid(hex: &str) -> ObjectId {
    ObjectId::parse_str(hex).unwrap()
}

pub async fn create_test_app() -> Router {
    // Initialize tracing for tests
    let _ = tracing_subscriber::fmt()
        .with_test_writer()
        .with_max_level(tracing::Level::DEBUG)
        .try_init();

    // Load test environment from .env.test, fall back to a local test database
    dotenvy::from_filename(".env.test").ok();
    if std::env::var("MONGO_URI").is_err() {
        std::env::set_var("MONGO_URI", "mongodb://localhost:27017");
    }
    if std::env::var("MONGO_DATABASE").is_err() {
        std::env::set_var("MONGO_DATABASE", "codeclass_test");
    }

    // Load test configuration
    let config = Config::load().expect("Failed to load test configuration");

    // Connect to test database
    let mongo_client = mongodb::Client::with_uri_str(&config.mongo_uri)
        .await
        .expect("Failed to connect to test MongoDB");

    // Create app state (connection is verified inside)
    let app_state = Arc::new(
        AppState::new(config.clone(), mongo_client.clone())
            .await
            .expect("Failed to initialize test app state"),
    );

    // Seed test data
    seed_test_data(&mongo_client, &config.mongo_database).await;

    // Build test router (same as main app)
    create_router(app_state)
}

pub async fn test_database() -> mongodb::Database {
    dotenvy::from_filename(".env.test").ok();
    if std::env::var("MONGO_URI").is_err() {
        std::env::set_var("MONGO_URI", "mongodb://localhost:27017");
    }
    if std::env::var("MONGO_DATABASE").is_err() {
        std::env::set_var("MONGO_DATABASE", "codeclass_test");
    }

    let config = Config::load().expect("Failed to load test configuration");
    let client = mongodb::Client::with_uri_str(&config.mongo_uri)
        .await
        .expect("Failed to connect to test MongoDB");
    client.database(&config.mongo_database)
}

/// Two-question quiz used by the submission tests:
/// Q1 is worth 2 points, Q2 is worth 3.
async fn seed_test_data(mongo_client: &mongodb::Client, db_name: &str) {
    let db = mongo_client.database(db_name);
    let tests = db.collection::<Document>("tests");

    let group = oid("64a1f0c2b5d3a4e6f7890101");
    let teacher = oid("64a1f0c2b5d3a4e6f7890102");
    let tomorrow = BsonDateTime::from_millis((Utc::now() + Duration::days(1)).timestamp_millis());
    let yesterday = BsonDateTime::from_millis((Utc::now() - Duration::days(1)).timestamp_millis());

    let questions = vec![
        doc! {
            "_id": oid(Q1_ID),
            "text": "What does a for loop do?",
            "points": 2,
            "options": [
                { "_id": oid(Q1_CORRECT), "text": "Repeats a block", "isCorrect": true },
                { "_id": oid(Q1_WRONG), "text": "Declares a variable", "isCorrect": false },
            ],
        },
        doc! {
            "_id": oid(Q2_ID),
            "text": "Which index is the first element of an array?",
            "points": 3,
            "options": [
                { "_id": oid(Q2_CORRECT), "text": "0", "isCorrect": true },
                { "_id": oid(Q2_WRONG), "text": "1", "isCorrect": false },
            ],
        },
    ];

    let seeds = vec![
        doc! {
            "_id": oid(TEST_ID),
            "title": "Loops and arrays",
            "group": group,
            "createdBy": teacher,
            "timeLimit": 30,
            "deadline": tomorrow,
            "questions": questions.clone(),
            "isActive": true,
        },
        doc! {
            "_id": oid(INACTIVE_TEST_ID),
            "title": "Retired quiz",
            "group": group,
            "createdBy": teacher,
            "timeLimit": 30,
            "deadline": tomorrow,
            "questions": questions.clone(),
            "isActive": false,
        },
        doc! {
            "_id": oid(EXPIRED_TEST_ID),
            "title": "Past deadline quiz",
            "group": group,
            "createdBy": teacher,
            "timeLimit": 30,
            "deadline": yesterday,
            "questions": questions,
            "isActive": true,
        },
    ];

    for seed in seeds {
        let id = seed.get_object_id("_id").unwrap();
        // Idempotent upsert, safe for parallel test runs
        tests
            .replace_one(doc! { "_id": id }, &seed)
            .upsert(true)
            .await
            .expect("Failed to seed test definition");
    }
}
