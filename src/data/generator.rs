use crate::config::DataConfig;
use crate::models::{Book, BorrowingRecord, Dataset, ReadingLevel, Student};
use crate::utils::stable_short_id;
use chrono::{Duration, Utc};
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};
use std::collections::HashSet;
use tracing::info;

const FIRST_NAMES: &[&str] = &[
    "Emma", "Liam", "Olivia", "Noah", "Ava", "Elijah", "Sophia", "Lucas", "Isabella", "Oliver",
    "Mia", "Ethan", "Charlotte", "James", "Amelia", "Benjamin", "Harper", "Mason", "Evelyn",
    "Logan", "Abigail", "Alexander", "Emily", "Sebastian", "Madison", "Jack", "Chloe", "Daniel",
    "Grace", "Henry",
];

const LAST_NAMES: &[&str] = &[
    "Smith", "Johnson", "Williams", "Brown", "Jones", "Garcia", "Miller", "Davis", "Rodriguez",
    "Martinez", "Hernandez", "Lopez", "Gonzalez", "Wilson", "Anderson",
];

const ADJECTIVES: &[&str] = &[
    "Mysterious", "Ancient", "Golden", "Silver", "Lost", "Hidden", "Magical", "Enchanted",
    "Forgotten", "Secret", "Crystal", "Emerald", "Sapphire", "Brave", "Clever", "Curious",
    "Amazing", "Wonderful", "Fantastic",
];

const NOUNS: &[&str] = &[
    "Dragon", "Knight", "Princess", "Wizard", "Forest", "Castle", "Mountain", "Ocean", "Island",
    "Kingdom", "Adventure", "Journey", "Quest", "Mystery", "Treasure", "Phoenix", "Guardian",
    "Explorer", "Inventor", "Detective",
];

const PLACES: &[&str] = &[
    "Avalon", "Atlantis", "Eldoria", "Mystwood", "Silverstone", "Goldshire", "Dragonfall",
    "Starhaven", "Moonhallow", "Sunridge", "Windmere", "Shadowvale",
];

pub const GENRES: &[&str] = &[
    "Fantasy", "Science Fiction", "Mystery", "Adventure", "Historical Fiction", "Contemporary",
    "Horror", "Romance", "Thriller", "Biography", "Poetry", "Graphic Novel", "Humor", "Sports",
    "Nature", "Technology",
];

const SUBJECTS: &[&str] = &[
    "Friendship", "Courage", "Family", "Growing Up", "Problem Solving", "Teamwork",
    "Perseverance", "Creativity", "Leadership", "Empathy", "Environment", "History", "Science",
    "Mathematics", "Arts", "Music", "Animals", "Space", "Time Travel", "Magic", "Robots",
    "Dinosaurs",
];

const INTERESTS: &[&str] = &[
    "Sports", "Music", "Art", "Science", "Technology", "Nature", "Animals", "Space", "History",
    "Cooking", "Gaming", "Photography", "Dancing", "Writing", "Reading", "Traveling", "Movies",
    "Comics", "Puzzles", "Chess",
];

const STORYTELLING: &[&str] = &["exciting", "thoughtful", "imaginative", "compelling"];

const TITLE_ATTEMPTS: usize = 10;
/// Borrow dates fall within this many days before now.
const HISTORY_SPAN_DAYS: i64 = 365;

/// Produces a plausible school-library dataset.
pub struct DataGenerator {
    rng: StdRng,
}

impl DataGenerator {
    /// Seeded generators are reproducible except for timestamps, which are
    /// relative to the current time.
    pub fn new(seed: Option<u64>) -> Self {
        let rng = match seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        Self { rng }
    }

    pub fn generate(&mut self, config: &DataConfig) -> Dataset {
        let books = self.generate_books(config.num_books);
        let mut students = self.generate_students(config.num_students);
        let records = self.generate_history(&mut students, &books, config.num_records);

        info!(
            "Generated {} books, {} students and {} borrowing records",
            books.len(),
            students.len(),
            records.len()
        );
        Dataset {
            books,
            students,
            records,
        }
    }

    pub fn generate_books(&mut self, n: usize) -> Vec<Book> {
        let mut books = Vec::with_capacity(n);
        let mut titles: HashSet<String> = HashSet::new();
        let mut ids: HashSet<String> = HashSet::new();

        while books.len() < n {
            let mut title = self.title();
            for _ in 1..TITLE_ATTEMPTS {
                if !titles.contains(&title) {
                    break;
                }
                title = self.title();
            }
            let author = self.person_name();
            let level = *ReadingLevel::ALL.choose(&mut self.rng).unwrap_or(&ReadingLevel::K2);

            let mut book = Book::new(title.clone(), author.clone(), level);
            if !ids.insert(book.book_id.clone()) {
                let id = Book::derive_id(&title, &format!("{}{}", author, books.len()));
                if !ids.insert(id.clone()) {
                    continue;
                }
                book = book.with_id(id);
            }
            titles.insert(title);

            let genres = self.sample(GENRES, 1, 3);
            let subjects = self.sample(SUBJECTS, 2, 4);
            let description = format!(
                "An engaging {} story about {}. This book explores themes of {} through {} storytelling.",
                genres[0].to_lowercase(),
                subjects[0].to_lowercase(),
                subjects[1..].join(", ").to_lowercase(),
                STORYTELLING.choose(&mut self.rng).unwrap_or(&"compelling"),
            );
            let (min_pages, max_pages) = page_range(level);
            let isbn = self.isbn();
            let year = self.rng.gen_range(2010..=2024);
            let pages = self.rng.gen_range(min_pages..=max_pages);
            let total = self.rng.gen_range(2..=8);
            let available = self.rng.gen_range(1..=5).min(total);

            books.push(
                book.with_isbn(isbn)
                    .with_genres(genres)
                    .with_subjects(subjects)
                    .with_description(description)
                    .with_publication_year(year)
                    .with_page_count(pages)
                    .with_copies(available, total),
            );
        }
        books
    }

    pub fn generate_students(&mut self, n: usize) -> Vec<Student> {
        let mut students = Vec::with_capacity(n);
        let mut ids: HashSet<String> = HashSet::new();

        while students.len() < n {
            let name = self.person_name();
            let grade: u8 = self.rng.gen_range(0..=12);
            let salt: u32 = self.rng.gen_range(1000..=9999);
            let id = format!("S{}", stable_short_id(&format!("{}{}{}", name, grade, salt), 6));
            if !ids.insert(id.clone()) {
                continue;
            }

            let genres = self.sample(GENRES, 1, 4);
            let interests = self.sample(INTERESTS, 2, 5);
            students.push(
                Student::new(id, grade, ReadingLevel::from_grade(grade))
                    .with_preferred_genres(genres)
                    .with_interests(interests),
            );
        }
        students
    }

    /// Gives every student 2 to 15 borrows, then tops up with random pairs
    /// until `target` records exist. Borrowed books are appended to reading
    /// histories.
    pub fn generate_history(
        &mut self,
        students: &mut [Student],
        books: &[Book],
        target: usize,
    ) -> Vec<BorrowingRecord> {
        let mut records = Vec::with_capacity(target);
        if students.is_empty() || books.is_empty() {
            return records;
        }

        for s in 0..students.len() {
            let level = students[s].reading_level;
            let suitable: Vec<&Book> = books.iter().filter(|b| b.reading_level == level).collect();
            let borrows = self.rng.gen_range(2..=15);
            for _ in 0..borrows {
                let book = if !suitable.is_empty() && self.rng.gen_bool(0.7) {
                    suitable[self.rng.gen_range(0..suitable.len())]
                } else {
                    &books[self.rng.gen_range(0..books.len())]
                };
                let record = self.borrow(&students[s].student_id, &book.book_id);
                students[s].record_read(book.book_id.clone());
                records.push(record);
            }
        }

        while records.len() < target {
            let s = self.rng.gen_range(0..students.len());
            let book = &books[self.rng.gen_range(0..books.len())];
            let record = self.borrow(&students[s].student_id, &book.book_id);
            students[s].record_read(book.book_id.clone());
            records.push(record);
        }
        records
    }

    fn borrow(&mut self, student_id: &str, book_id: &str) -> BorrowingRecord {
        let start = Utc::now() - Duration::days(HISTORY_SPAN_DAYS);
        let borrowed = start + Duration::days(self.rng.gen_range(0..=HISTORY_SPAN_DAYS));
        let mut record = BorrowingRecord::new(student_id, book_id).borrowed_at(borrowed);

        if self.rng.gen_bool(0.8) {
            record = record.returned_at(borrowed + Duration::days(self.rng.gen_range(7..=30)));
            if self.rng.gen_bool(0.7) {
                let rating = match self.rng.gen_range(0..10) {
                    0..=1 => 3,
                    2..=5 => 4,
                    _ => 5,
                };
                record = record.completed().with_rating(rating);
            }
        }
        record
    }

    fn title(&mut self) -> String {
        let adjective = self.pick(ADJECTIVES);
        let noun = self.pick(NOUNS);
        let place = self.pick(PLACES);
        match self.rng.gen_range(0..10) {
            0 => format!("The {} {}", adjective, noun),
            1 => format!("{} of {}", noun, place),
            2 => format!("Journey to {}", place),
            3 => format!("The Last {}", noun),
            4 => format!("{} {} Adventures", adjective, noun),
            5 => format!("Mystery of the {} {}", adjective, noun),
            6 => format!("The {}'s Secret", noun),
            7 => format!("Tales of {}", place),
            8 => format!("The {} Quest", adjective),
            _ => format!("{} and the {} {}", noun, adjective, self.pick(NOUNS)),
        }
    }

    fn person_name(&mut self) -> String {
        format!("{} {}", self.pick(FIRST_NAMES), self.pick(LAST_NAMES))
    }

    fn isbn(&mut self) -> String {
        format!(
            "978-{}-{}-{}-{}",
            self.rng.gen_range(0..=9),
            self.rng.gen_range(10000..=99999),
            self.rng.gen_range(100..=999),
            self.rng.gen_range(0..=9)
        )
    }

    fn pick(&mut self, pool: &[&'static str]) -> &'static str {
        pool.choose(&mut self.rng).copied().unwrap_or_default()
    }

    /// Between `min` and `max` distinct entries of `pool`.
    fn sample(&mut self, pool: &[&str], min: usize, max: usize) -> Vec<String> {
        let count = self.rng.gen_range(min..=max);
        pool.choose_multiple(&mut self.rng, count)
            .map(|s| s.to_string())
            .collect()
    }
}

fn page_range(level: ReadingLevel) -> (u32, u32) {
    match level {
        ReadingLevel::K2 => (20, 80),
        ReadingLevel::Grades3To5 => (80, 200),
        ReadingLevel::Grades6To8 => (150, 350),
        ReadingLevel::Grades9To12 => (200, 500),
    }
}
