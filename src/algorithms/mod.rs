pub mod collaborative;
pub mod content;
pub mod enhancer;
pub mod tfidf;

pub use collaborative::{CollaborativeModel, LowRankFactors};
pub use content::ContentModel;
pub use enhancer::{Enhancement, HeuristicEnhancer, ScoreEnhancer};
pub use tfidf::TfidfVectorizer;

/// A book id with a model score.
pub type ScoredItem = (String, f32);
