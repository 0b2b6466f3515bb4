use crate::models::{Book, Student};
use crate::utils::clamp_unit;
use std::collections::HashSet;

pub const GENRE_BOOST: f32 = 0.10;
pub const LEVEL_BOOST: f32 = 0.05;
pub const INTEREST_BOOST: f32 = 0.15;

pub const EXPLORATION_REASON: &str =
    "This book offers a new reading experience to expand your horizons.";

#[derive(Debug, Clone, PartialEq)]
pub struct Enhancement {
    pub score: f32,
    pub reason: String,
}

/// Adjusts a candidate's base score for one student and explains why.
///
/// Implementations must return a score in `[base, 1.0]` for any base in `[0, 1]`.
pub trait ScoreEnhancer: Send + Sync {
    fn enhance(&self, student: &Student, book: &Book, base_score: f32) -> Enhancement;
}

/// Deterministic rule-based enhancer.
#[derive(Debug, Clone, Copy, Default)]
pub struct HeuristicEnhancer;

impl HeuristicEnhancer {
    pub fn new() -> Self {
        Self
    }

    fn matched_genre<'a>(student: &Student, book: &'a Book) -> Option<&'a str> {
        book.genre
            .iter()
            .find(|genre| student.preferred_genres.contains(genre))
            .map(String::as_str)
    }

    fn matched_interest(student: &Student, book: &Book) -> Option<String> {
        let description = book.description.to_lowercase();
        let description_words: HashSet<&str> = description.split_whitespace().collect();

        student
            .interests
            .iter()
            .flat_map(|interest| interest.split_whitespace())
            .map(str::to_lowercase)
            .find(|word| description_words.contains(word.as_str()))
    }
}

impl ScoreEnhancer for HeuristicEnhancer {
    fn enhance(&self, student: &Student, book: &Book, base_score: f32) -> Enhancement {
        let mut boost = 0.0;
        let mut reasons = Vec::new();

        if let Some(genre) = Self::matched_genre(student, book) {
            boost += GENRE_BOOST;
            reasons.push(format!("matches your preferred genre of {}", genre));
        }

        if book.reading_level == student.reading_level {
            boost += LEVEL_BOOST;
            reasons.push("is at your reading level".to_string());
        }

        if let Some(word) = Self::matched_interest(student, book) {
            boost += INTEREST_BOOST;
            reasons.push(format!("relates to your interest in {}", word));
        }

        let reason = if reasons.is_empty() {
            EXPLORATION_REASON.to_string()
        } else {
            format!("This book is recommended because it {}.", reasons.join(" and "))
        };

        let base = clamp_unit(base_score);
        Enhancement {
            score: (base + boost).min(1.0),
            reason,
        }
    }
}
