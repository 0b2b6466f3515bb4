use crate::algorithms::ScoredItem;
use crate::models::BorrowingRecord;
use crate::utils::top_k;
use nalgebra::DMatrix;
use ndarray::{Array1, Array2, Axis};
use rayon::prelude::*;
use std::cmp::Ordering;
use std::collections::HashMap;
use tracing::{debug, info};

/// Rank-k factorization of the interaction matrix. Fitted for future use;
/// ranking never reads it.
#[derive(Debug, Clone)]
pub struct LowRankFactors {
    pub singular_values: Vec<f32>,
    /// `k × items`, rows ordered by descending singular value.
    pub components: DMatrix<f32>,
}

impl LowRankFactors {
    pub fn rank(&self) -> usize {
        self.singular_values.len()
    }

    fn fit(interactions: &Array2<f32>, max_components: usize) -> Option<Self> {
        let (users, items) = interactions.dim();
        if users <= 2 || items <= 2 || max_components == 0 {
            return None;
        }
        let k = max_components.min(users - 1).min(items - 1);

        let matrix = DMatrix::from_fn(users, items, |i, j| interactions[[i, j]]);
        let svd = matrix.svd(false, true);
        let v_t = svd.v_t?;

        let mut order: Vec<usize> = (0..svd.singular_values.len()).collect();
        order.sort_by(|&a, &b| {
            svd.singular_values[b]
                .partial_cmp(&svd.singular_values[a])
                .unwrap_or(Ordering::Equal)
        });
        order.truncate(k);

        let components = DMatrix::from_fn(order.len(), items, |r, c| v_t[(order[r], c)]);
        let singular_values = order.iter().map(|&i| svd.singular_values[i]).collect();
        Some(Self {
            singular_values,
            components,
        })
    }
}

/// Neighborhood collaborative filter over a dense student × book matrix.
#[derive(Debug, Clone)]
pub struct CollaborativeModel {
    version: u64,
    neighbor_count: usize,
    students: Vec<String>,
    student_index: HashMap<String, usize>,
    books: Vec<String>,
    book_index: HashMap<String, usize>,
    interactions: Array2<f32>,
    user_similarity: Option<Array2<f32>>,
    item_similarity: Option<Array2<f32>>,
    factors: Option<LowRankFactors>,
}

impl CollaborativeModel {
    pub fn empty(neighbor_count: usize) -> Self {
        Self {
            version: 0,
            neighbor_count,
            students: Vec::new(),
            student_index: HashMap::new(),
            books: Vec::new(),
            book_index: HashMap::new(),
            interactions: Array2::zeros((0, 0)),
            user_similarity: None,
            item_similarity: None,
            factors: None,
        }
    }

    pub fn fit(
        records: &[BorrowingRecord],
        neighbor_count: usize,
        max_factor_components: usize,
        version: u64,
    ) -> Self {
        let mut model = Self::empty(neighbor_count);
        model.version = version;

        for record in records {
            intern(&mut model.students, &mut model.student_index, &record.student_id);
            intern(&mut model.books, &mut model.book_index, &record.book_id);
        }

        let mut interactions = Array2::zeros((model.students.len(), model.books.len()));
        for record in records {
            let row = model.student_index[&record.student_id];
            let col = model.book_index[&record.book_id];
            // Later records for the same pair replace earlier ones.
            interactions[[row, col]] = record.interaction_weight();
        }

        if model.students.len() > 1 {
            model.user_similarity = Some(pairwise_cosine(&interactions));
        }
        if model.books.len() > 1 {
            model.item_similarity = Some(pairwise_cosine(&interactions.t().to_owned()));
        }
        model.factors = LowRankFactors::fit(&interactions, max_factor_components);
        model.interactions = interactions;

        info!(
            "Collaborative model trained with {} students and {} books",
            model.students.len(),
            model.books.len()
        );
        if let Some(factors) = &model.factors {
            debug!("Fitted rank-{} interaction factors", factors.rank());
        }
        model
    }

    pub fn version(&self) -> u64 {
        self.version
    }

    pub fn factors(&self) -> Option<&LowRankFactors> {
        self.factors.as_ref()
    }

    pub fn weight(&self, student_id: &str, book_id: &str) -> Option<f32> {
        let row = *self.student_index.get(student_id)?;
        let col = *self.book_index.get(book_id)?;
        Some(self.interactions[[row, col]])
    }

    pub fn user_similarity(&self, a: &str, b: &str) -> Option<f32> {
        let matrix = self.user_similarity.as_ref()?;
        let i = *self.student_index.get(a)?;
        let j = *self.student_index.get(b)?;
        Some(matrix[[i, j]])
    }

    pub fn item_similarity(&self, a: &str, b: &str) -> Option<f32> {
        let matrix = self.item_similarity.as_ref()?;
        let i = *self.book_index.get(a)?;
        let j = *self.book_index.get(b)?;
        Some(matrix[[i, j]])
    }

    /// Books by total interaction weight, heaviest first.
    pub fn popular(&self, n: usize) -> Vec<ScoredItem> {
        let totals: Array1<f32> = self.interactions.sum_axis(Axis(0));
        let scored: Vec<ScoredItem> = self
            .books
            .iter()
            .cloned()
            .zip(totals.iter().copied())
            .collect();
        top_k(scored, n)
    }

    pub fn recommend(&self, student_id: &str, n: usize) -> Vec<ScoredItem> {
        let Some(&target) = self.student_index.get(student_id) else {
            return self.popular(n);
        };
        let Some(similarity) = &self.user_similarity else {
            return Vec::new();
        };

        let others: Vec<(usize, f32)> = (0..self.students.len())
            .filter(|&other| other != target)
            .map(|other| (other, similarity[[target, other]]))
            .collect();
        let neighbors = top_k(others, self.neighbor_count);

        let target_row = self.interactions.row(target);
        let mut accumulated: Vec<(usize, f32)> = Vec::new();
        let mut slot: HashMap<usize, usize> = HashMap::new();
        for (neighbor, sim) in neighbors {
            for (col, &weight) in self.interactions.row(neighbor).indexed_iter() {
                if weight <= 0.0 || target_row[col] != 0.0 {
                    continue;
                }
                let idx = *slot.entry(col).or_insert_with(|| {
                    accumulated.push((col, 0.0));
                    accumulated.len() - 1
                });
                accumulated[idx].1 += weight * sim;
            }
        }

        top_k(accumulated, n)
            .into_iter()
            .map(|(col, score)| (self.books[col].clone(), score))
            .collect()
    }

    /// Books whose interaction columns are closest to `book_id`'s.
    pub fn similar_items(&self, book_id: &str, n: usize) -> Vec<ScoredItem> {
        let (Some(matrix), Some(&i)) = (&self.item_similarity, self.book_index.get(book_id)) else {
            return Vec::new();
        };
        let scored: Vec<ScoredItem> = (0..self.books.len())
            .filter(|&j| j != i)
            .map(|j| (self.books[j].clone(), matrix[[i, j]]))
            .collect();
        top_k(scored, n)
    }
}

fn intern(ids: &mut Vec<String>, index: &mut HashMap<String, usize>, id: &str) {
    if !index.contains_key(id) {
        index.insert(id.to_string(), ids.len());
        ids.push(id.to_string());
    }
}

/// Cosine similarity between every pair of rows. Only the upper triangle is
/// computed and then mirrored, so the result is exactly symmetric.
pub fn pairwise_cosine(rows: &Array2<f32>) -> Array2<f32> {
    let n = rows.nrows();
    let norms: Vec<f32> = rows.rows().into_iter().map(|r| r.dot(&r).sqrt()).collect();

    let upper: Vec<Vec<f32>> = (0..n)
        .into_par_iter()
        .map(|i| {
            (i..n)
                .map(|j| {
                    let denom = norms[i] * norms[j];
                    if denom == 0.0 {
                        0.0
                    } else {
                        rows.row(i).dot(&rows.row(j)) / denom
                    }
                })
                .collect()
        })
        .collect();

    let mut similarity = Array2::zeros((n, n));
    for (i, row) in upper.into_iter().enumerate() {
        for (offset, value) in row.into_iter().enumerate() {
            let j = i + offset;
            similarity[[i, j]] = value;
            similarity[[j, i]] = value;
        }
    }
    similarity
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn record(student: &str, book: &str) -> BorrowingRecord {
        BorrowingRecord::new(student, book)
    }

    #[test]
    fn test_identical_profiles_are_fully_similar() {
        let records = vec![record("U1", "X"), record("U2", "X")];
        let model = CollaborativeModel::fit(&records, 5, 10, 1);

        assert_eq!(model.user_similarity("U1", "U2"), Some(1.0));
        assert!(model.recommend("U1", 5).iter().all(|(id, _)| id != "X"));
        assert!(model.recommend("U1", 5).is_empty());
    }

    #[test]
    fn test_weights_follow_rating_then_completion() {
        let records = vec![
            record("U1", "A"),
            record("U1", "B").completed(),
            record("U1", "C").completed().with_rating(3),
        ];
        let model = CollaborativeModel::fit(&records, 5, 10, 1);
        assert_eq!(model.weight("U1", "A"), Some(1.0));
        assert_eq!(model.weight("U1", "B"), Some(1.2));
        assert!((model.weight("U1", "C").unwrap() - 0.6).abs() < 1e-6);
    }

    #[test]
    fn test_neighbor_scores_accumulate() {
        let records = vec![
            record("U1", "A"),
            record("U2", "A"),
            record("U2", "B"),
            record("U3", "A"),
            record("U3", "B"),
            record("U3", "C"),
        ];
        let model = CollaborativeModel::fit(&records, 5, 10, 1);
        let recs = model.recommend("U1", 5);

        let ids: Vec<&str> = recs.iter().map(|(id, _)| id.as_str()).collect();
        assert_eq!(ids, vec!["B", "C"]);

        let s12 = model.user_similarity("U1", "U2").unwrap();
        let s13 = model.user_similarity("U1", "U3").unwrap();
        assert!((recs[0].1 - (s12 + s13)).abs() < 1e-5);
        assert!((recs[1].1 - s13).abs() < 1e-5);
    }

    #[test]
    fn test_unknown_student_gets_popular_books() {
        let records = vec![
            record("U1", "A"),
            record("U2", "B"),
            record("U3", "B"),
            record("U3", "C").completed(),
        ];
        let model = CollaborativeModel::fit(&records, 5, 10, 1);
        let recs = model.recommend("nobody", 2);
        assert_eq!(recs, vec![("B".to_string(), 2.0), ("C".to_string(), 1.2)]);
    }

    #[test]
    fn test_single_student_has_no_neighbors() {
        let records = vec![record("U1", "A"), record("U1", "B")];
        let model = CollaborativeModel::fit(&records, 5, 10, 1);
        assert!(model.recommend("U1", 5).is_empty());
        assert_eq!(model.user_similarity("U1", "U1"), None);
    }

    #[test]
    fn test_empty_history() {
        let model = CollaborativeModel::fit(&[], 5, 10, 2);
        assert_eq!(model.version(), 2);
        assert!(model.recommend("U1", 5).is_empty());
        assert!(model.popular(3).is_empty());
    }

    #[test]
    fn test_similar_items() {
        let records = vec![
            record("U1", "A"),
            record("U1", "B"),
            record("U2", "A"),
            record("U2", "B"),
            record("U3", "C"),
        ];
        let model = CollaborativeModel::fit(&records, 5, 10, 1);
        let similar = model.similar_items("A", 2);
        assert_eq!(similar[0].0, "B");
        assert!((similar[0].1 - 1.0).abs() < 1e-6);
        assert_eq!(similar[1], ("C".to_string(), 0.0));
        assert_eq!(model.item_similarity("A", "C"), Some(0.0));
    }

    #[test]
    fn test_factors_fitted_but_optional() {
        let small = CollaborativeModel::fit(&[record("U1", "A"), record("U2", "B")], 5, 10, 1);
        assert!(small.factors().is_none());

        let records: Vec<BorrowingRecord> = ["U1", "U2", "U3", "U4"]
            .iter()
            .flat_map(|u| ["A", "B", "C"].iter().map(move |b| record(u, b)))
            .collect();
        let model = CollaborativeModel::fit(&records, 5, 10, 1);
        let factors = model.factors().unwrap();
        assert_eq!(factors.rank(), 2);
        assert_eq!(factors.components.ncols(), 3);
        assert!(factors.singular_values[0] >= factors.singular_values[1]);
    }

    #[test]
    fn test_pairwise_cosine_symmetric() {
        let rows = ndarray::array![[1.0, 0.5, 0.0], [0.2, 0.0, 1.2], [0.8, 0.8, 0.4]];
        let sim = pairwise_cosine(&rows);
        for i in 0..3 {
            for j in 0..3 {
                assert_eq!(sim[[i, j]], sim[[j, i]]);
            }
        }
    }

    fn interaction_log() -> impl proptest::strategy::Strategy<Value = Vec<BorrowingRecord>> {
        prop::collection::vec((0u8..6, 0u8..8, prop::option::of(1u8..=5), any::<bool>()), 0..40)
            .prop_map(|rows| {
                rows.into_iter()
                    .map(|(student, book, rating, completed)| {
                        let mut r = record(&format!("U{}", student), &format!("B{}", book));
                        if completed {
                            r = r.completed();
                        }
                        match rating {
                            Some(rating) => r.with_rating(rating),
                            None => r,
                        }
                    })
                    .collect()
            })
    }

    proptest! {
        #[test]
        fn prop_user_similarity_is_symmetric(records in interaction_log()) {
            let model = CollaborativeModel::fit(&records, 5, 10, 1);
            let students: Vec<String> = (0..6).map(|s| format!("U{}", s)).collect();

            for a in &students {
                for b in &students {
                    let ab = model.user_similarity(a, b);
                    prop_assert_eq!(ab, model.user_similarity(b, a));
                    if let Some(sim) = ab {
                        prop_assert!((-1e-5..=1.0 + 1e-5).contains(&sim));
                    }
                }
            }
        }
    }
}
