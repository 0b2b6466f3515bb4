use crate::models::BorrowingRecord;
use crate::services::catalog::{Catalog, StudentDirectory};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap, HashSet};

pub const MOST_ACTIVE_LIMIT: usize = 5;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalyticsSnapshot {
    pub total_students: usize,
    pub total_books: usize,
    pub total_borrowing_records: usize,
    pub average_books_per_student: f64,
    /// Borrow count per genre; multi-genre books count once per genre.
    pub genre_distribution: BTreeMap<String, usize>,
    pub most_active_readers: Vec<(String, usize)>,
    pub catalog_coverage: f64,
}

pub fn compute(catalog: &Catalog, students: &StudentDirectory, records: &[BorrowingRecord]) -> AnalyticsSnapshot {
    let total_students = students.len();
    let total_books = catalog.len();
    let total_borrowing_records = records.len();

    let average_books_per_student = if total_students == 0 {
        0.0
    } else {
        total_borrowing_records as f64 / total_students as f64
    };

    let mut genre_distribution = BTreeMap::new();
    for book in records.iter().filter_map(|r| catalog.get(&r.book_id)) {
        for genre in &book.genre {
            *genre_distribution.entry(genre.clone()).or_insert(0) += 1;
        }
    }

    let mut activity: Vec<(String, usize)> = Vec::new();
    let mut slot: HashMap<&str, usize> = HashMap::new();
    for record in records {
        let idx = *slot.entry(record.student_id.as_str()).or_insert_with(|| {
            activity.push((record.student_id.clone(), 0));
            activity.len() - 1
        });
        activity[idx].1 += 1;
    }
    activity.sort_by(|a, b| b.1.cmp(&a.1));
    activity.truncate(MOST_ACTIVE_LIMIT);

    let catalog_coverage = if total_books == 0 {
        0.0
    } else {
        let borrowed: HashSet<&str> = records
            .iter()
            .map(|r| r.book_id.as_str())
            .filter(|id| catalog.contains(id))
            .collect();
        borrowed.len() as f64 / total_books as f64
    };

    AnalyticsSnapshot {
        total_students,
        total_books,
        total_borrowing_records,
        average_books_per_student,
        genre_distribution,
        most_active_readers: activity,
        catalog_coverage,
    }
}
