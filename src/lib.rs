pub mod algorithms;
pub mod config;
pub mod data;
pub mod error;
pub mod models;
pub mod services;
pub mod utils;

pub use config::Config;
pub use error::{EngineError, EngineResult};
pub use models::*;
pub use services::{create_router, explain, AnalyticsSnapshot, EngineSnapshot, RecommendationEngine};

use anyhow::Result;
use data::DataGenerator;
use std::sync::Arc;
use tracing::info;

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub engine: Arc<RecommendationEngine>,
}

impl AppState {
    /// Builds an engine and loads it with a generated dataset.
    pub fn new(config: Config) -> Result<Self> {
        let config = Arc::new(config);
        let engine = Arc::new(RecommendationEngine::new(config.recommendation.clone()));

        let dataset = DataGenerator::new(config.data.seed).generate(&config.data);
        let version = engine.load(dataset)?;
        info!("Recommendation engine ready at snapshot v{}", version);

        Ok(Self { config, engine })
    }

    /// Replaces every store with a freshly generated dataset. Requests in
    /// flight keep the snapshot they started with.
    pub fn regenerate(&self) -> EngineResult<u64> {
        let dataset = DataGenerator::new(None).generate(&self.config.data);
        self.engine.load(dataset)
    }
}

/// `RUST_LOG` wins when set; otherwise `level` applies.
pub fn init_tracing(level: &str) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(level));
    tracing_subscriber::fmt().with_env_filter(filter).init();
}
