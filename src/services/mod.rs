pub mod analytics;
pub mod catalog;
pub mod engine;
pub mod serving;

pub use analytics::AnalyticsSnapshot;
pub use catalog::{Catalog, StudentDirectory};
pub use engine::{explain, EngineSnapshot, LoadState, RecommendationEngine};
pub use serving::{create_router, ApiResponse};
