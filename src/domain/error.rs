use super::model::id::BookId;

#[derive(Debug, thiserror::Error)]
pub enum DomainError {
    #[error("Rating must be between 1 and 5")]
    InvalidRating(i64),

    #[error("Book with id {0} not found")]
    BookNotFound(BookId),
}
