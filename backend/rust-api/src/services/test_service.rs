use anyhow::{Context, Result};
use mongodb::{
    bson::{doc, oid::ObjectId},
    Database,
};

use crate::metrics::track_db_operation;
use crate::models::test::Test;

/// Read-only access to quiz definitions owned by the content service.
pub struct TestService {
    mongo: Database,
}

impl TestService {
    pub fn new(mongo: Database) -> Self {
        Self { mongo }
    }

    pub async fn get_test(&self, test_id: &ObjectId) -> Result<Option<Test>> {
        let collection = self.mongo.collection::<Test>("tests");

        let test = track_db_operation("find_one", "tests", async {
            collection
                .find_one(doc! { "_id": test_id })
                .await
                .context("Failed to query tests collection")
        })
        .await?;

        if test.is_none() {
            tracing::warn!("Test {} not found", test_id);
        }

        Ok(test)
    }
}
