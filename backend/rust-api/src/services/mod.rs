use crate::config::Config;
use crate::utils::progress_log::DiagnosticLog;
use mongodb::{Client as MongoClient, Database};

pub struct AppState {
    pub config: Config,
    pub mongo: Database,
    pub progress_log: DiagnosticLog,
}

impl AppState {
    pub async fn new(config: Config, mongo_client: MongoClient) -> anyhow::Result<Self> {
        let mongo = mongo_client.database(&config.mongo_database);

        tracing::info!("Verifying MongoDB connection with ping...");

        tokio::time::timeout(
            std::time::Duration::from_secs(5),
            mongo.run_command(mongodb::bson::doc! { "ping": 1 }),
        )
        .await
        .map_err(|_| anyhow::anyhow!("MongoDB ping timeout after 5s"))??;

        tracing::info!("MongoDB connection established successfully");

        let progress_log = DiagnosticLog::new(&config.progress_log_path);

        Ok(Self {
            config,
            mongo,
            progress_log,
        })
    }
}

pub mod evaluation_service;
pub mod progress_service;
pub mod rating_service;
pub mod test_service;
