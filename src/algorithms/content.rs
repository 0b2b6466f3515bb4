use crate::algorithms::tfidf::TfidfVectorizer;
use crate::algorithms::ScoredItem;
use crate::models::{Book, Student};
use crate::utils::{cosine_similarity, top_k};
use ndarray::{Array1, Array2, Axis};
use std::collections::{HashMap, HashSet};
use tracing::info;

/// Content-based model over book metadata text.
#[derive(Debug, Clone)]
pub struct ContentModel {
    version: u64,
    profile_window: usize,
    vectorizer: TfidfVectorizer,
    book_ids: Vec<String>,
    book_index: HashMap<String, usize>,
    features: Array2<f32>,
}

impl ContentModel {
    pub fn empty(max_features: usize, profile_window: usize) -> Self {
        Self {
            version: 0,
            profile_window,
            vectorizer: TfidfVectorizer::new(max_features),
            book_ids: Vec::new(),
            book_index: HashMap::new(),
            features: Array2::zeros((0, 0)),
        }
    }

    pub fn fit(books: &[Book], max_features: usize, profile_window: usize, version: u64) -> Self {
        let mut model = Self::empty(max_features, profile_window);
        model.version = version;

        if books.is_empty() {
            return model;
        }

        let documents: Vec<String> = books.iter().map(Book::feature_text).collect();
        model.features = model.vectorizer.fit_transform(&documents);
        model.book_ids = books.iter().map(|b| b.book_id.clone()).collect();
        model.book_index = model
            .book_ids
            .iter()
            .enumerate()
            .map(|(idx, id)| (id.clone(), idx))
            .collect();

        info!(
            "Content model trained with {} books and {} terms",
            books.len(),
            model.vectorizer.vocabulary_size()
        );
        model
    }

    pub fn version(&self) -> u64 {
        self.version
    }

    pub fn vocabulary_size(&self) -> usize {
        self.vectorizer.vocabulary_size()
    }

    /// Averaged feature vector of the student's most recent fitted books.
    pub fn profile(&self, student: &Student) -> Option<Array1<f32>> {
        if self.vocabulary_size() == 0 {
            return None;
        }

        let history = &student.reading_history;
        let window_start = history.len().saturating_sub(self.profile_window);
        let indices: Vec<usize> = history[window_start..]
            .iter()
            .filter_map(|id| self.book_index.get(id).copied())
            .collect();

        if indices.is_empty() {
            return None;
        }

        self.features.select(Axis(0), &indices).mean_axis(Axis(0))
    }

    pub fn recommend(&self, student: &Student, n: usize) -> Vec<ScoredItem> {
        if student.reading_history.is_empty() {
            return Vec::new();
        }

        let Some(profile) = self.profile(student) else {
            return Vec::new();
        };
        let read: HashSet<&str> = student.reading_history.iter().map(String::as_str).collect();
        let scored: Vec<ScoredItem> = self
            .features
            .rows()
            .into_iter()
            .zip(&self.book_ids)
            .filter(|(_, id)| !read.contains(id.as_str()))
            .map(|(row, id)| (id.clone(), cosine_similarity(row, profile.view())))
            .collect();

        top_k(scored, n)
    }
}
