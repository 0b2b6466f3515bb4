use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;
use std::str::FromStr;

use crate::utils::stable_short_id;

/// Ordered reading-level buckets used for both books and students.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum ReadingLevel {
    #[serde(rename = "K-2")]
    K2,
    #[serde(rename = "3-5")]
    Grades3To5,
    #[serde(rename = "6-8")]
    Grades6To8,
    #[serde(rename = "9-12")]
    Grades9To12,
}

impl ReadingLevel {
    pub const ALL: [ReadingLevel; 4] = [
        ReadingLevel::K2,
        ReadingLevel::Grades3To5,
        ReadingLevel::Grades6To8,
        ReadingLevel::Grades9To12,
    ];

    /// Bucket for a school grade, kindergarten being grade 0.
    pub fn from_grade(grade: u8) -> Self {
        match grade {
            0..=2 => ReadingLevel::K2,
            3..=5 => ReadingLevel::Grades3To5,
            6..=8 => ReadingLevel::Grades6To8,
            _ => ReadingLevel::Grades9To12,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ReadingLevel::K2 => "K-2",
            ReadingLevel::Grades3To5 => "3-5",
            ReadingLevel::Grades6To8 => "6-8",
            ReadingLevel::Grades9To12 => "9-12",
        }
    }
}

impl fmt::Display for ReadingLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ReadingLevel {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        ReadingLevel::ALL
            .into_iter()
            .find(|level| level.as_str() == s.trim())
            .ok_or_else(|| format!("unknown reading level: {}", s))
    }
}

/// Which component produced a recommendation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Strategy {
    Collaborative,
    Content,
    Diversity,
    Popularity,
}

impl Strategy {
    pub fn as_str(&self) -> &'static str {
        match self {
            Strategy::Collaborative => "collaborative",
            Strategy::Content => "content",
            Strategy::Diversity => "diversity",
            Strategy::Popularity => "popularity",
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Strategy::Collaborative => "Collaborative",
            Strategy::Content => "Content",
            Strategy::Diversity => "Diversity",
            Strategy::Popularity => "Popularity",
        }
    }
}

impl fmt::Display for Strategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Book {
    pub book_id: String,
    pub title: String,
    pub author: String,
    pub isbn: String,
    pub genre: Vec<String>,
    pub subject: Vec<String>,
    pub reading_level: ReadingLevel,
    pub description: String,
    pub publication_year: i32,
    pub page_count: u32,
    #[serde(default = "default_language")]
    pub language: String,
    #[serde(default = "default_copies")]
    pub available_copies: u32,
    #[serde(default = "default_copies")]
    pub total_copies: u32,
    #[serde(default)]
    pub popularity_score: f32,
    #[serde(default)]
    pub average_rating: Option<f32>,
    #[serde(default)]
    pub rating_count: u32,
}

fn default_language() -> String {
    "English".to_string()
}

fn default_copies() -> u32 {
    1
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Student {
    pub student_id: String,
    pub grade_level: u8,
    pub reading_level: ReadingLevel,
    #[serde(default)]
    pub preferred_genres: Vec<String>,
    #[serde(default)]
    pub interests: Vec<String>,
    /// Chronological, duplicates suppressed.
    #[serde(default)]
    pub reading_history: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BorrowingRecord {
    pub student_id: String,
    pub book_id: String,
    pub borrow_date: DateTime<Utc>,
    pub return_date: Option<DateTime<Utc>>,
    /// 1-5 scale.
    pub rating: Option<u8>,
    pub completed: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Recommendation {
    pub book: Book,
    pub score: f32,
    pub reason: String,
    pub strategy: Strategy,
    pub confidence: f32,
}

/// Materialized collections handed to the engine by a dataset source.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Dataset {
    pub books: Vec<Book>,
    pub students: Vec<Student>,
    pub records: Vec<BorrowingRecord>,
}

impl Book {
    /// 8 uppercase hex digits derived from title and author.
    pub fn derive_id(title: &str, author: &str) -> String {
        stable_short_id(&format!("{}{}", title, author), 8)
    }

    pub fn new(title: impl Into<String>, author: impl Into<String>, reading_level: ReadingLevel) -> Self {
        let title = title.into();
        let author = author.into();
        Self {
            book_id: Self::derive_id(&title, &author),
            title,
            author,
            isbn: String::new(),
            genre: Vec::new(),
            subject: Vec::new(),
            reading_level,
            description: String::new(),
            publication_year: 2020,
            page_count: 0,
            language: default_language(),
            available_copies: 1,
            total_copies: 1,
            popularity_score: 0.0,
            average_rating: None,
            rating_count: 0,
        }
    }

    pub fn with_id(mut self, book_id: impl Into<String>) -> Self {
        self.book_id = book_id.into();
        self
    }

    pub fn with_isbn(mut self, isbn: impl Into<String>) -> Self {
        self.isbn = isbn.into();
        self
    }

    pub fn with_genres<S: Into<String>>(mut self, genres: impl IntoIterator<Item = S>) -> Self {
        self.genre = genres.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_subjects<S: Into<String>>(mut self, subjects: impl IntoIterator<Item = S>) -> Self {
        self.subject = subjects.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    pub fn with_publication_year(mut self, year: i32) -> Self {
        self.publication_year = year;
        self
    }

    pub fn with_page_count(mut self, pages: u32) -> Self {
        self.page_count = pages;
        self
    }

    pub fn with_copies(mut self, available: u32, total: u32) -> Self {
        self.available_copies = available;
        self.total_copies = total;
        self
    }

    /// Text fed to the term-weighting model.
    pub fn feature_text(&self) -> String {
        format!(
            "{} {} {} {} {}",
            self.title,
            self.author,
            self.genre.join(" "),
            self.subject.join(" "),
            self.description
        )
    }
}

impl Student {
    pub fn new(student_id: impl Into<String>, grade_level: u8, reading_level: ReadingLevel) -> Self {
        Self {
            student_id: student_id.into(),
            grade_level,
            reading_level,
            preferred_genres: Vec::new(),
            interests: Vec::new(),
            reading_history: Vec::new(),
        }
    }

    pub fn with_preferred_genres<S: Into<String>>(mut self, genres: impl IntoIterator<Item = S>) -> Self {
        self.preferred_genres = genres.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_interests<S: Into<String>>(mut self, interests: impl IntoIterator<Item = S>) -> Self {
        self.interests = interests.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_history<S: Into<String>>(mut self, history: impl IntoIterator<Item = S>) -> Self {
        self.reading_history.clear();
        for book_id in history {
            self.record_read(book_id);
        }
        self
    }

    /// Appends to the history unless the book is already there.
    pub fn record_read(&mut self, book_id: impl Into<String>) -> bool {
        let book_id = book_id.into();
        if self.has_read(&book_id) {
            return false;
        }
        self.reading_history.push(book_id);
        true
    }

    pub fn has_read(&self, book_id: &str) -> bool {
        self.reading_history.iter().any(|id| id == book_id)
    }

    /// Drops repeated history entries, keeping the first occurrence.
    pub fn dedup_history(&mut self) {
        let mut seen = HashSet::new();
        self.reading_history.retain(|id| seen.insert(id.clone()));
    }
}

impl BorrowingRecord {
    pub fn new(student_id: impl Into<String>, book_id: impl Into<String>) -> Self {
        Self {
            student_id: student_id.into(),
            book_id: book_id.into(),
            borrow_date: Utc::now(),
            return_date: None,
            rating: None,
            completed: false,
        }
    }

    pub fn borrowed_at(mut self, at: DateTime<Utc>) -> Self {
        self.borrow_date = at;
        self
    }

    pub fn returned_at(mut self, at: DateTime<Utc>) -> Self {
        self.return_date = Some(at);
        self
    }

    pub fn with_rating(mut self, rating: u8) -> Self {
        self.rating = Some(rating);
        self
    }

    pub fn completed(mut self) -> Self {
        self.completed = true;
        self
    }

    /// Implicit-feedback weight: an explicit rating wins, then the completion bonus.
    pub fn interaction_weight(&self) -> f32 {
        match self.rating {
            Some(rating) => rating as f32 / 5.0,
            None if self.completed => 1.2,
            None => 1.0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reading_level_from_grade() {
        assert_eq!(ReadingLevel::from_grade(0), ReadingLevel::K2);
        assert_eq!(ReadingLevel::from_grade(5), ReadingLevel::Grades3To5);
        assert_eq!(ReadingLevel::from_grade(8), ReadingLevel::Grades6To8);
        assert_eq!(ReadingLevel::from_grade(12), ReadingLevel::Grades9To12);
        assert!(ReadingLevel::K2 < ReadingLevel::Grades9To12);
    }

    #[test]
    fn test_reading_level_serde() {
        let json = serde_json::to_string(&ReadingLevel::Grades6To8).unwrap();
        assert_eq!(json, "\"6-8\"");
        let level: ReadingLevel = serde_json::from_str("\"K-2\"").unwrap();
        assert_eq!(level, ReadingLevel::K2);
        assert_eq!("9-12".parse::<ReadingLevel>().unwrap(), ReadingLevel::Grades9To12);
        assert!("10-11".parse::<ReadingLevel>().is_err());
    }

    #[test]
    fn test_book_id_is_stable() {
        let a = Book::new("The Lost Dragon", "Emma Smith", ReadingLevel::K2);
        let b = Book::new("The Lost Dragon", "Emma Smith", ReadingLevel::Grades6To8);
        let c = Book::new("The Lost Dragon", "Liam Jones", ReadingLevel::K2);
        assert_eq!(a.book_id, b.book_id);
        assert_ne!(a.book_id, c.book_id);
        assert_eq!(a.book_id.len(), 8);
        assert!(a.book_id.chars().all(|c| c.is_ascii_hexdigit() && !c.is_ascii_lowercase()));
    }

    #[test]
    fn test_student_history_suppresses_duplicates() {
        let mut student = Student::new("S1", 4, ReadingLevel::Grades3To5).with_history(["A", "B", "A"]);
        assert_eq!(student.reading_history, vec!["A", "B"]);
        assert!(!student.record_read("B"));
        assert!(student.record_read("C"));
        assert_eq!(student.reading_history, vec!["A", "B", "C"]);
    }

    #[test]
    fn test_interaction_weight() {
        assert_eq!(BorrowingRecord::new("S", "B").interaction_weight(), 1.0);
        assert_eq!(BorrowingRecord::new("S", "B").completed().interaction_weight(), 1.2);
        let rated = BorrowingRecord::new("S", "B").completed().with_rating(4);
        assert!((rated.interaction_weight() - 0.8).abs() < 1e-6);
    }

    #[test]
    fn test_strategy_serializes_lowercase() {
        assert_eq!(serde_json::to_string(&Strategy::Diversity).unwrap(), "\"diversity\"");
        assert_eq!(Strategy::Content.label(), "Content");
    }
}
