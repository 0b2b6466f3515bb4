use crate::error::{EngineError, EngineResult};
use crate::models::*;
use std::collections::HashSet;

pub fn validate_book(book: &Book) -> EngineResult<()> {
    if book.book_id.trim().is_empty() {
        return Err(EngineError::validation("book_id", "Book ID cannot be empty"));
    }

    if book.title.trim().is_empty() {
        return Err(EngineError::validation(
            "title",
            format!("Book {} has an empty title", book.book_id),
        ));
    }

    if !book.popularity_score.is_finite() || !(0.0..=1.0).contains(&book.popularity_score) {
        return Err(EngineError::validation(
            "popularity_score",
            format!("Book {} popularity score must be between 0.0 and 1.0", book.book_id),
        ));
    }

    if let Some(rating) = book.average_rating {
        if !rating.is_finite() {
            return Err(EngineError::validation(
                "average_rating",
                format!("Book {} average rating is not a finite number", book.book_id),
            ));
        }
    }

    if book.available_copies > book.total_copies {
        return Err(EngineError::validation(
            "available_copies",
            format!(
                "Book {} has {} available copies but only {} in total",
                book.book_id, book.available_copies, book.total_copies
            ),
        ));
    }

    Ok(())
}

pub fn validate_student(student: &Student) -> EngineResult<()> {
    if student.student_id.trim().is_empty() {
        return Err(EngineError::validation("student_id", "Student ID cannot be empty"));
    }

    if student.grade_level > 12 {
        return Err(EngineError::validation(
            "grade_level",
            format!("Student {} grade level must be between 0 and 12", student.student_id),
        ));
    }

    Ok(())
}

pub fn validate_borrowing_record(record: &BorrowingRecord) -> EngineResult<()> {
    if record.student_id.trim().is_empty() {
        return Err(EngineError::validation("student_id", "Record student ID cannot be empty"));
    }

    if record.book_id.trim().is_empty() {
        return Err(EngineError::validation("book_id", "Record book ID cannot be empty"));
    }

    if let Some(rating) = record.rating {
        if !(1..=5).contains(&rating) {
            return Err(EngineError::validation(
                "rating",
                format!(
                    "Rating {} for book {} by {} must be between 1 and 5",
                    rating, record.book_id, record.student_id
                ),
            ));
        }
    }

    if let Some(returned) = record.return_date {
        if returned < record.borrow_date {
            return Err(EngineError::validation(
                "return_date",
                format!("Book {} returned before it was borrowed", record.book_id),
            ));
        }
    }

    Ok(())
}

pub fn validate_catalog(books: &[Book]) -> EngineResult<()> {
    let mut seen = HashSet::new();
    for book in books {
        validate_book(book)?;
        if !seen.insert(book.book_id.as_str()) {
            return Err(EngineError::validation(
                "book_id",
                format!("Duplicate book ID: {}", book.book_id),
            ));
        }
    }
    Ok(())
}

pub fn validate_students(students: &[Student]) -> EngineResult<()> {
    let mut seen = HashSet::new();
    for student in students {
        validate_student(student)?;
        if !seen.insert(student.student_id.as_str()) {
            return Err(EngineError::validation(
                "student_id",
                format!("Duplicate student ID: {}", student.student_id),
            ));
        }
    }
    Ok(())
}

pub fn validate_history(records: &[BorrowingRecord]) -> EngineResult<()> {
    records.iter().try_for_each(validate_borrowing_record)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, Utc};

    #[test]
    fn test_validate_book() {
        let book = Book::new("Tales of Avalon", "Mia Brown", ReadingLevel::K2);
        assert!(validate_book(&book).is_ok());

        let mut invalid = book.clone();
        invalid.popularity_score = 1.5;
        assert!(validate_book(&invalid).is_err());

        let invalid = book.clone().with_id("  ");
        assert!(validate_book(&invalid).is_err());

        let invalid = book.with_copies(4, 2);
        assert!(validate_book(&invalid).is_err());
    }

    #[test]
    fn test_validate_catalog_rejects_duplicates() {
        let a = Book::new("Tales of Avalon", "Mia Brown", ReadingLevel::K2);
        let b = a.clone();
        let err = validate_catalog(&[a, b]).unwrap_err();
        assert!(err.to_string().contains("Duplicate book ID"));
    }

    #[test]
    fn test_validate_students() {
        let s = Student::new("S1", 3, ReadingLevel::Grades3To5);
        assert!(validate_students(&[s.clone()]).is_ok());
        assert!(validate_students(&[s.clone(), s]).is_err());
        assert!(validate_student(&Student::new("S2", 13, ReadingLevel::Grades9To12)).is_err());
    }

    #[test]
    fn test_validate_borrowing_record() {
        let now = Utc::now();
        let record = BorrowingRecord::new("S1", "B1").borrowed_at(now).with_rating(5);
        assert!(validate_borrowing_record(&record).is_ok());

        let record = BorrowingRecord::new("S1", "B1").with_rating(0);
        assert!(validate_borrowing_record(&record).is_err());

        let record = BorrowingRecord::new("S1", "B1").with_rating(6);
        assert!(validate_borrowing_record(&record).is_err());

        let record = BorrowingRecord::new("S1", "B1")
            .borrowed_at(now)
            .returned_at(now - Duration::days(2));
        assert!(validate_borrowing_record(&record).is_err());
    }
}
