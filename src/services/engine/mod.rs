use crate::algorithms::{CollaborativeModel, ContentModel, HeuristicEnhancer, ScoreEnhancer};
use crate::config::RecommendationConfig;
use crate::error::{EngineError, EngineResult};
use crate::models::*;
use crate::services::analytics::{self, AnalyticsSnapshot};
use crate::services::catalog::{Catalog, StudentDirectory};
use crate::utils::{clamp_unit, validation};
use parking_lot::{Mutex, RwLock};
use std::collections::HashSet;
use std::sync::Arc;
use tracing::{debug, info, warn};

pub const POPULAR_REASON: &str =
    "This is one of our most popular books that many students have enjoyed!";
pub const POPULARITY_CONFIDENCE: f32 = 0.5;
pub const DIVERSITY_CONFIDENCE: f32 = 0.6;

/// Which stores have been loaded at least once.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LoadState {
    pub catalog: bool,
    pub students: bool,
    pub history: bool,
}

impl LoadState {
    pub fn missing(&self) -> Vec<&'static str> {
        let mut missing = Vec::new();
        if !self.catalog {
            missing.push("catalog");
        }
        if !self.students {
            missing.push("students");
        }
        if !self.history {
            missing.push("history");
        }
        missing
    }

    pub fn is_ready(&self) -> bool {
        self.catalog && self.students && self.history
    }
}

/// An immutable, fully consistent view of the stores and both fitted models.
///
/// Readers hold an `Arc` to one snapshot for the whole request; reloads build
/// a replacement and swap it in, never touching a published snapshot.
pub struct EngineSnapshot {
    version: u64,
    loaded: LoadState,
    config: Arc<RecommendationConfig>,
    enhancer: Arc<dyn ScoreEnhancer>,
    catalog: Arc<Catalog>,
    students: Arc<StudentDirectory>,
    history: Arc<Vec<BorrowingRecord>>,
    collaborative: Arc<CollaborativeModel>,
    content: Arc<ContentModel>,
}

impl EngineSnapshot {
    fn initial(config: Arc<RecommendationConfig>, enhancer: Arc<dyn ScoreEnhancer>) -> Self {
        let collaborative = CollaborativeModel::empty(config.neighbor_count);
        let content = ContentModel::empty(config.max_features, config.profile_window);
        Self {
            version: 0,
            loaded: LoadState::default(),
            config,
            enhancer,
            catalog: Arc::new(Catalog::default()),
            students: Arc::new(StudentDirectory::default()),
            history: Arc::new(Vec::new()),
            collaborative: Arc::new(collaborative),
            content: Arc::new(content),
        }
    }

    fn successor(&self) -> Self {
        Self {
            version: self.version + 1,
            loaded: self.loaded,
            config: self.config.clone(),
            enhancer: self.enhancer.clone(),
            catalog: self.catalog.clone(),
            students: self.students.clone(),
            history: self.history.clone(),
            collaborative: self.collaborative.clone(),
            content: self.content.clone(),
        }
    }

    pub fn version(&self) -> u64 {
        self.version
    }

    pub fn load_state(&self) -> LoadState {
        self.loaded
    }

    pub fn catalog(&self) -> &Catalog {
        &self.catalog
    }

    pub fn history(&self) -> &[BorrowingRecord] {
        &self.history
    }

    pub fn collaborative(&self) -> &CollaborativeModel {
        &self.collaborative
    }

    pub fn content(&self) -> &ContentModel {
        &self.content
    }

    /// Students in id order.
    pub fn students(&self) -> impl Iterator<Item = &Student> {
        self.students.iter()
    }

    pub fn student(&self, student_id: &str) -> Option<&Student> {
        self.students.get(student_id)
    }

    pub fn book(&self, book_id: &str) -> Option<&Book> {
        self.catalog.get(book_id)
    }

    /// First `limit` books in catalog order.
    pub fn books(&self, limit: usize) -> &[Book] {
        let books = self.catalog.books();
        &books[..limit.min(books.len())]
    }

    /// Books co-borrowed with `book_id`, resolved against the catalog.
    pub fn similar_books(&self, book_id: &str, n: usize) -> Vec<(Book, f32)> {
        self.collaborative
            .similar_items(book_id, n)
            .into_iter()
            .filter_map(|(id, score)| self.catalog.get(&id).map(|b| (b.clone(), score)))
            .collect()
    }

    pub fn analytics(&self) -> AnalyticsSnapshot {
        analytics::compute(&self.catalog, &self.students, &self.history)
    }

    /// Blends collaborative, content and diversity candidates into at most
    /// `n` recommendations with unique books, best first.
    pub fn recommend(&self, student_id: &str, n: usize) -> Vec<Recommendation> {
        if n == 0 {
            return Vec::new();
        }

        let Some(student) = self.students.get(student_id) else {
            warn!("Student {} not found, falling back to popular books", student_id);
            return self.popular_books(n);
        };

        let half = n / 2;
        let history_len = student.reading_history.len() as f32;
        let mut recommendations: Vec<Recommendation> = Vec::with_capacity(n);
        let mut chosen: HashSet<String> = HashSet::new();

        let collaborative_confidence = (history_len / 10.0).min(1.0);
        for (book_id, score) in self.collaborative.recommend(student_id, n * 2) {
            if recommendations.len() >= half {
                break;
            }
            let Some(book) = self.catalog.get(&book_id) else {
                continue;
            };
            if !chosen.insert(book_id) {
                continue;
            }
            recommendations.push(self.enhanced(
                student,
                book,
                score,
                Strategy::Collaborative,
                collaborative_confidence,
            ));
        }
        let collaborative_count = recommendations.len();

        let content_confidence = (history_len / 5.0).min(1.0);
        let mut content_count = 0;
        for (book_id, score) in self.content.recommend(student, n * 2) {
            if content_count >= half {
                break;
            }
            let Some(book) = self.catalog.get(&book_id) else {
                continue;
            };
            if chosen.contains(&book_id) {
                continue;
            }
            chosen.insert(book_id);
            recommendations.push(self.enhanced(student, book, score, Strategy::Content, content_confidence));
            content_count += 1;
        }

        let before_diversity = recommendations.len();
        if recommendations.len() < n {
            self.fill_with_diversity(student, n, &mut chosen, &mut recommendations);
        }

        debug!(
            "Student {}: {} collaborative, {} content, {} diversity candidates",
            student_id,
            collaborative_count,
            content_count,
            recommendations.len() - before_diversity
        );

        recommendations.sort_by(|a, b| {
            b.score
                .partial_cmp(&a.score)
                .unwrap_or(std::cmp::Ordering::Equal)
        });
        recommendations.truncate(n);
        recommendations
    }

    fn enhanced(
        &self,
        student: &Student,
        book: &Book,
        score: f32,
        strategy: Strategy,
        confidence: f32,
    ) -> Recommendation {
        let enhancement = self.enhancer.enhance(student, book, clamp_unit(score));
        Recommendation {
            book: book.clone(),
            score: clamp_unit(enhancement.score),
            reason: enhancement.reason,
            strategy,
            confidence,
        }
    }

    /// Appends level-appropriate books that introduce a genre the student has
    /// not read yet, in catalog order, until `n` entries exist.
    fn fill_with_diversity(
        &self,
        student: &Student,
        n: usize,
        chosen: &mut HashSet<String>,
        recommendations: &mut Vec<Recommendation>,
    ) {
        let explored: HashSet<&str> = student
            .reading_history
            .iter()
            .filter_map(|id| self.catalog.get(id))
            .flat_map(|book| book.genre.iter().map(String::as_str))
            .collect();

        for book in self.catalog.iter() {
            if recommendations.len() >= n {
                break;
            }
            if book.reading_level != student.reading_level
                || student.has_read(&book.book_id)
                || chosen.contains(&book.book_id)
            {
                continue;
            }
            let Some(new_genre) = book.genre.iter().find(|g| !explored.contains(g.as_str())) else {
                continue;
            };

            chosen.insert(book.book_id.clone());
            recommendations.push(Recommendation {
                book: book.clone(),
                score: 0.7 + 0.3 * book.popularity_score,
                reason: format!(
                    "Explore a new genre: {}. This highly-rated book will broaden your reading horizons.",
                    new_genre
                ),
                strategy: Strategy::Diversity,
                confidence: DIVERSITY_CONFIDENCE,
            });
        }
    }

    fn popular_books(&self, n: usize) -> Vec<Recommendation> {
        self.catalog
            .most_popular(n)
            .into_iter()
            .map(|book| Recommendation {
                book: book.clone(),
                score: book.popularity_score,
                reason: POPULAR_REASON.to_string(),
                strategy: Strategy::Popularity,
                confidence: POPULARITY_CONFIDENCE,
            })
            .collect()
    }
}

/// Multi-line, human readable summary of a recommendation.
pub fn explain(recommendation: &Recommendation) -> String {
    let book = &recommendation.book;
    let mut text = format!("📚 {} by {}\n\n", book.title, book.author);
    text.push_str(&format!("Why this book?\n{}\n\n", recommendation.reason));
    text.push_str("Details:\n");
    text.push_str(&format!("- Genres: {}\n", book.genre.join(", ")));
    text.push_str(&format!("- Reading Level: {}\n", book.reading_level));
    text.push_str(&format!("- Pages: {}\n", book.page_count));
    text.push_str(&format!(
        "- Recommendation Confidence: {:.0}%\n",
        recommendation.confidence * 100.0
    ));
    text.push_str(&format!(
        "- Strategy Used: {}-based recommendation\n",
        recommendation.strategy.label()
    ));
    text
}

/// Owner of the current snapshot. Construct, load, then query.
pub struct RecommendationEngine {
    current: RwLock<Arc<EngineSnapshot>>,
    writer: Mutex<()>,
}

impl RecommendationEngine {
    pub fn new(config: RecommendationConfig) -> Self {
        Self::with_enhancer(config, Arc::new(HeuristicEnhancer::new()))
    }

    pub fn with_enhancer(config: RecommendationConfig, enhancer: Arc<dyn ScoreEnhancer>) -> Self {
        let initial = EngineSnapshot::initial(Arc::new(config), enhancer);
        Self {
            current: RwLock::new(Arc::new(initial)),
            writer: Mutex::new(()),
        }
    }

    /// The latest snapshot, whether or not every store has been loaded.
    pub fn current(&self) -> Arc<EngineSnapshot> {
        self.current.read().clone()
    }

    /// The latest snapshot once catalog, students and history are all loaded.
    pub fn ready(&self) -> EngineResult<Arc<EngineSnapshot>> {
        let snapshot = self.current();
        if snapshot.loaded.is_ready() {
            Ok(snapshot)
        } else {
            Err(EngineError::NotReady {
                missing: snapshot.loaded.missing(),
            })
        }
    }

    pub fn is_ready(&self) -> bool {
        self.current().loaded.is_ready()
    }

    pub fn recommend(&self, student_id: &str, n: usize) -> EngineResult<Vec<Recommendation>> {
        Ok(self.ready()?.recommend(student_id, n))
    }

    pub fn analytics(&self) -> EngineResult<AnalyticsSnapshot> {
        Ok(self.ready()?.analytics())
    }

    pub fn explain(&self, recommendation: &Recommendation) -> String {
        explain(recommendation)
    }

    /// Replaces the catalog and refits the content model.
    pub fn load_catalog(&self, books: Vec<Book>) -> EngineResult<u64> {
        validation::validate_catalog(&books)?;
        self.publish(|prev| {
            let mut next = prev.successor();
            next.set_catalog(books);
            next.loaded.catalog = true;
            info!("Loaded {} books into catalog", next.catalog.len());
            next
        })
    }

    pub fn load_students(&self, students: Vec<Student>) -> EngineResult<u64> {
        validation::validate_students(&students)?;
        self.publish(|prev| {
            let mut next = prev.successor();
            next.students = Arc::new(StudentDirectory::from_students(students));
            next.loaded.students = true;
            info!("Loaded {} student profiles", next.students.len());
            next
        })
    }

    /// Replaces the borrowing log, recomputes popularity and refits the
    /// collaborative model.
    pub fn load_history(&self, records: Vec<BorrowingRecord>) -> EngineResult<u64> {
        validation::validate_history(&records)?;
        self.publish(|prev| {
            let mut next = prev.successor();
            next.set_history(records);
            next.loaded.history = true;
            info!("Loaded {} borrowing records", next.history.len());
            next
        })
    }

    /// Replaces all three stores and both models in a single swap.
    pub fn load(&self, dataset: Dataset) -> EngineResult<u64> {
        let Dataset {
            books,
            students,
            records,
        } = dataset;
        validation::validate_catalog(&books)?;
        validation::validate_students(&students)?;
        validation::validate_history(&records)?;

        self.publish(|prev| {
            let mut next = prev.successor();
            next.students = Arc::new(StudentDirectory::from_students(students));
            next.history = Arc::new(records);
            next.set_catalog(books);
            next.collaborative = Arc::new(CollaborativeModel::fit(
                &next.history,
                next.config.neighbor_count,
                next.config.max_factor_components,
                next.version,
            ));
            next.loaded = LoadState {
                catalog: true,
                students: true,
                history: true,
            };
            info!(
                "Engine loaded with {} books, {} students and {} borrowing records",
                next.catalog.len(),
                next.students.len(),
                next.history.len()
            );
            next
        })
    }

    fn publish<F>(&self, build: F) -> EngineResult<u64>
    where
        F: FnOnce(&EngineSnapshot) -> EngineSnapshot,
    {
        let _guard = self.writer.lock();
        let prev = self.current();
        let next = Arc::new(build(&prev));
        let version = next.version;
        *self.current.write() = next;
        debug!("Published engine snapshot v{}", version);
        Ok(version)
    }
}

impl EngineSnapshot {
    fn set_catalog(&mut self, books: Vec<Book>) {
        let mut catalog = Catalog::from_books(books);
        catalog.apply_history(&self.history);
        self.content = Arc::new(ContentModel::fit(
            catalog.books(),
            self.config.max_features,
            self.config.profile_window,
            self.version,
        ));
        self.catalog = Arc::new(catalog);
    }

    fn set_history(&mut self, records: Vec<BorrowingRecord>) {
        let mut catalog = (*self.catalog).clone();
        catalog.apply_history(&records);
        self.catalog = Arc::new(catalog);
        self.collaborative = Arc::new(CollaborativeModel::fit(
            &records,
            self.config.neighbor_count,
            self.config.max_factor_components,
            self.version,
        ));
        self.history = Arc::new(records);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn three_book_catalog() -> Vec<Book> {
        vec![
            Book::new("A", "Author", ReadingLevel::Grades3To5).with_id("A").with_genres(["Fantasy"]),
            Book::new("B", "Author", ReadingLevel::Grades3To5).with_id("B").with_genres(["Mystery"]),
            Book::new("C", "Author", ReadingLevel::Grades6To8).with_id("C").with_genres(["Fantasy"]),
        ]
    }

    fn loaded_engine(books: Vec<Book>, students: Vec<Student>, records: Vec<BorrowingRecord>) -> RecommendationEngine {
        let engine = RecommendationEngine::new(RecommendationConfig::default());
        engine.load_catalog(books).unwrap();
        engine.load_students(students).unwrap();
        engine.load_history(records).unwrap();
        engine
    }

    #[test]
    fn test_not_ready_until_all_stores_loaded() {
        let engine = RecommendationEngine::new(RecommendationConfig::default());
        let err = engine.recommend("U", 2).unwrap_err();
        assert!(matches!(err, EngineError::NotReady { .. }));

        engine.load_catalog(three_book_catalog()).unwrap();
        match engine.analytics().unwrap_err() {
            EngineError::NotReady { missing } => assert_eq!(missing, vec!["students", "history"]),
            other => panic!("unexpected error: {other}"),
        }

        engine.load_students(vec![]).unwrap();
        engine.load_history(vec![]).unwrap();
        assert!(engine.is_ready());
        assert_eq!(engine.current().version(), 3);
    }

    #[test]
    fn test_cold_student_falls_through_to_diversity() {
        let student = Student::new("U", 4, ReadingLevel::Grades3To5).with_preferred_genres(["Fantasy"]);
        let engine = loaded_engine(three_book_catalog(), vec![student], vec![]);

        let recs = engine.recommend("U", 2).unwrap();
        let mut ids: Vec<&str> = recs.iter().map(|r| r.book.book_id.as_str()).collect();
        ids.sort();
        assert_eq!(ids, vec!["A", "B"]);
        for rec in &recs {
            assert_eq!(rec.strategy, Strategy::Diversity);
            assert_eq!(rec.confidence, DIVERSITY_CONFIDENCE);
            assert!((rec.score - 0.7).abs() < 1e-6);
        }
    }

    #[test]
    fn test_unknown_student_gets_popularity() {
        let engine = loaded_engine(
            three_book_catalog(),
            vec![],
            vec![
                BorrowingRecord::new("X", "C"),
                BorrowingRecord::new("Y", "C"),
                BorrowingRecord::new("Y", "B"),
            ],
        );

        let recs = engine.recommend("nobody", 3).unwrap();
        let ids: Vec<&str> = recs.iter().map(|r| r.book.book_id.as_str()).collect();
        assert_eq!(ids, vec!["C", "B", "A"]);
        assert_eq!(recs[0].score, 1.0);
        assert_eq!(recs[1].score, 0.5);
        assert!(recs.iter().all(|r| r.strategy == Strategy::Popularity
            && r.confidence == POPULARITY_CONFIDENCE
            && r.reason == POPULAR_REASON));
    }

    #[test]
    fn test_zero_count_is_empty() {
        let engine = loaded_engine(three_book_catalog(), vec![], vec![]);
        assert!(engine.recommend("nobody", 0).unwrap().is_empty());
    }

    #[test]
    fn test_blended_strategies_and_confidence() {
        let books: Vec<Book> = (0..8)
            .map(|i| {
                let genre = if i % 2 == 0 { "Fantasy" } else { "Mystery" };
                Book::new(format!("Dragon Tale {}", i), "Author", ReadingLevel::Grades3To5)
                    .with_id(format!("B{}", i))
                    .with_genres([genre])
                    .with_description(format!("dragon story number{} about castles", i))
            })
            .collect();
        let students = vec![
            Student::new("U1", 4, ReadingLevel::Grades3To5).with_history(["B0", "B1"]),
            Student::new("U2", 4, ReadingLevel::Grades3To5).with_history(["B0", "B1", "B2", "B3"]),
        ];
        let records = vec![
            BorrowingRecord::new("U1", "B0"),
            BorrowingRecord::new("U1", "B1"),
            BorrowingRecord::new("U2", "B0"),
            BorrowingRecord::new("U2", "B1"),
            BorrowingRecord::new("U2", "B2"),
            BorrowingRecord::new("U2", "B3"),
        ];
        let engine = loaded_engine(books, students, records);

        let recs = engine.recommend("U1", 4).unwrap();
        assert!(recs.len() <= 4);
        let ids: HashSet<&str> = recs.iter().map(|r| r.book.book_id.as_str()).collect();
        assert_eq!(ids.len(), recs.len());
        assert!(!ids.contains("B0") && !ids.contains("B1"));

        let collaborative: Vec<&Recommendation> =
            recs.iter().filter(|r| r.strategy == Strategy::Collaborative).collect();
        let content: Vec<&Recommendation> = recs.iter().filter(|r| r.strategy == Strategy::Content).collect();
        assert_eq!(collaborative.len(), 2);
        assert_eq!(content.len(), 2);
        assert!(collaborative.iter().all(|r| (r.confidence - 0.2).abs() < 1e-6));
        assert!(content.iter().all(|r| (r.confidence - 0.4).abs() < 1e-6));

        for pair in recs.windows(2) {
            assert!(pair[0].score >= pair[1].score);
        }
        assert!(recs.iter().all(|r| (0.0..=1.0).contains(&r.score)));
    }

    #[test]
    fn test_failed_reload_keeps_previous_state() {
        let engine = loaded_engine(three_book_catalog(), vec![], vec![BorrowingRecord::new("X", "A")]);
        let before = engine.current();

        let bad = vec![BorrowingRecord::new("X", "B").with_rating(9)];
        assert!(engine.load_history(bad).is_err());

        let dup = vec![three_book_catalog()[0].clone(), three_book_catalog()[0].clone()];
        assert!(engine.load_catalog(dup).is_err());

        let after = engine.current();
        assert_eq!(after.version(), before.version());
        assert_eq!(after.history().len(), 1);
        assert_eq!(after.book("A").unwrap().popularity_score, 1.0);
    }

    #[test]
    fn test_reload_swaps_models_together() {
        let engine = loaded_engine(three_book_catalog(), vec![], vec![]);
        let old = engine.current();

        let dataset = Dataset {
            books: three_book_catalog(),
            students: vec![Student::new("U", 4, ReadingLevel::Grades3To5)],
            records: vec![BorrowingRecord::new("U", "A"), BorrowingRecord::new("V", "A")],
        };
        let version = engine.load(dataset).unwrap();
        let new = engine.current();

        assert_eq!(new.version(), version);
        assert_eq!(new.collaborative().version(), version);
        assert_eq!(new.content().version(), version);
        assert_eq!(new.book("A").unwrap().popularity_score, 1.0);

        // The old snapshot is untouched.
        assert_eq!(old.collaborative().weight("U", "A"), None);
        assert_eq!(old.book("A").unwrap().popularity_score, 0.0);
    }

    #[test]
    fn test_catalog_reload_recomputes_popularity_from_history() {
        let engine = loaded_engine(three_book_catalog(), vec![], vec![BorrowingRecord::new("X", "B")]);
        engine.load_catalog(three_book_catalog()).unwrap();
        let snapshot = engine.ready().unwrap();
        assert_eq!(snapshot.book("B").unwrap().popularity_score, 1.0);
        assert_eq!(snapshot.book("A").unwrap().popularity_score, 0.0);
    }

    #[test]
    fn test_explain_layout() {
        let rec = Recommendation {
            book: Book::new("The Lost Dragon", "Emma Smith", ReadingLevel::Grades3To5)
                .with_genres(["Fantasy", "Adventure"])
                .with_page_count(120),
            score: 0.9,
            reason: "Because.".to_string(),
            strategy: Strategy::Content,
            confidence: 0.6,
        };
        let expected = "📚 The Lost Dragon by Emma Smith\n\n\
                        Why this book?\nBecause.\n\n\
                        Details:\n\
                        - Genres: Fantasy, Adventure\n\
                        - Reading Level: 3-5\n\
                        - Pages: 120\n\
                        - Recommendation Confidence: 60%\n\
                        - Strategy Used: Content-based recommendation\n";
        assert_eq!(explain(&rec), expected);
    }

    struct FixedEnhancer;

    impl ScoreEnhancer for FixedEnhancer {
        fn enhance(&self, _student: &Student, _book: &Book, base_score: f32) -> crate::algorithms::Enhancement {
            crate::algorithms::Enhancement {
                score: base_score,
                reason: "fixed".to_string(),
            }
        }
    }

    #[test]
    fn test_enhancer_is_replaceable() {
        let engine = RecommendationEngine::with_enhancer(RecommendationConfig::default(), Arc::new(FixedEnhancer));
        engine.load_catalog(three_book_catalog()).unwrap();
        engine
            .load_students(vec![
                Student::new("U1", 4, ReadingLevel::Grades3To5).with_history(["A"]),
                Student::new("U2", 4, ReadingLevel::Grades3To5),
            ])
            .unwrap();
        engine
            .load_history(vec![
                BorrowingRecord::new("U1", "A"),
                BorrowingRecord::new("U2", "A"),
                BorrowingRecord::new("U2", "B"),
            ])
            .unwrap();

        let recs = engine.recommend("U1", 2).unwrap();
        let collaborative = recs.iter().find(|r| r.strategy == Strategy::Collaborative).unwrap();
        assert_eq!(collaborative.book.book_id, "B");
        assert_eq!(collaborative.reason, "fixed");
    }
}
