use crate::models::{Book, BorrowingRecord, Student};
use std::collections::{BTreeMap, HashMap};
use tracing::warn;

/// Books keyed by id, iterated in load order.
#[derive(Debug, Clone, Default)]
pub struct Catalog {
    books: Vec<Book>,
    index: HashMap<String, usize>,
}

impl Catalog {
    /// Builds from already validated books.
    pub fn from_books(books: Vec<Book>) -> Self {
        let index = books
            .iter()
            .enumerate()
            .map(|(idx, book)| (book.book_id.clone(), idx))
            .collect();
        Self { books, index }
    }

    pub fn len(&self) -> usize {
        self.books.len()
    }

    pub fn is_empty(&self) -> bool {
        self.books.is_empty()
    }

    pub fn get(&self, book_id: &str) -> Option<&Book> {
        self.index.get(book_id).map(|&idx| &self.books[idx])
    }

    pub fn contains(&self, book_id: &str) -> bool {
        self.index.contains_key(book_id)
    }

    pub fn books(&self) -> &[Book] {
        &self.books
    }

    pub fn iter(&self) -> impl Iterator<Item = &Book> {
        self.books.iter()
    }

    /// Recomputes popularity and rating aggregates from scratch.
    ///
    /// Popularity is borrow count over the busiest book's count, so it lies in
    /// `[0, 1]` and is 0 for books nobody borrowed.
    pub fn apply_history(&mut self, records: &[BorrowingRecord]) {
        let mut borrow_counts = vec![0usize; self.books.len()];
        let mut rating_sums = vec![(0u32, 0u32); self.books.len()];
        let mut unknown = 0usize;

        for record in records {
            let Some(&idx) = self.index.get(&record.book_id) else {
                unknown += 1;
                continue;
            };
            borrow_counts[idx] += 1;
            if let Some(rating) = record.rating {
                rating_sums[idx].0 += rating as u32;
                rating_sums[idx].1 += 1;
            }
        }

        if unknown > 0 {
            warn!("{} borrowing records reference books missing from the catalog", unknown);
        }

        let max_count = borrow_counts.iter().copied().max().unwrap_or(0).max(1) as f32;
        for (idx, book) in self.books.iter_mut().enumerate() {
            book.popularity_score = borrow_counts[idx] as f32 / max_count;
            let (sum, count) = rating_sums[idx];
            book.rating_count = count;
            book.average_rating = (count > 0).then(|| sum as f32 / count as f32);
        }
    }

    /// Books by popularity, most popular first; ties keep catalog order.
    pub fn most_popular(&self, n: usize) -> Vec<&Book> {
        let mut ranked: Vec<&Book> = self.books.iter().collect();
        ranked.sort_by(|a, b| {
            b.popularity_score
                .partial_cmp(&a.popularity_score)
                .unwrap_or(std::cmp::Ordering::Equal)
        });
        ranked.truncate(n);
        ranked
    }
}

/// Students keyed by id, iterated in id order.
#[derive(Debug, Clone, Default)]
pub struct StudentDirectory {
    students: BTreeMap<String, Student>,
}

impl StudentDirectory {
    /// Builds from already validated students, suppressing repeated history entries.
    pub fn from_students(students: Vec<Student>) -> Self {
        let students = students
            .into_iter()
            .map(|mut student| {
                student.dedup_history();
                (student.student_id.clone(), student)
            })
            .collect();
        Self { students }
    }

    pub fn len(&self) -> usize {
        self.students.len()
    }

    pub fn is_empty(&self) -> bool {
        self.students.is_empty()
    }

    pub fn get(&self, student_id: &str) -> Option<&Student> {
        self.students.get(student_id)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Student> {
        self.students.values()
    }
}
