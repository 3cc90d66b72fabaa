//! Domain error types
//!
//! These errors are framework-agnostic and represent business-level failures.

use sea_orm::{DbErr, SqlErr};

#[derive(Debug, thiserror::Error)]
pub enum DomainError {
    /// Resource not found
    #[error("Resource not found")]
    NotFound,
    /// Validation error with message
    #[error("Validation error: {0}")]
    Validation(String),
    /// A loan would take a copy from a book with none left on the shelf
    #[error("No available copies for book {book_id}")]
    NoAvailableCopies { book_id: i32 },
    /// Uniqueness, foreign key or CHECK constraint rejected by the data store
    #[error("Constraint violation: {0}")]
    Constraint(String),
    /// Database/persistence error
    #[error("Database error: {0}")]
    Database(String),
}

impl DomainError {
    pub fn is_constraint(&self) -> bool {
        matches!(self, DomainError::Constraint(_))
    }
}

// Conversion from SeaORM errors (used in infrastructure layer)
impl From<DbErr> for DomainError {
    fn from(e: DbErr) -> Self {
        match e.sql_err() {
            Some(SqlErr::UniqueConstraintViolation(msg)) => DomainError::Constraint(msg),
            Some(SqlErr::ForeignKeyConstraintViolation(msg)) => DomainError::Constraint(msg),
            _ => {
                let msg = e.to_string();
                // SQLite reports CHECK and FK failures with these prefixes
                if msg.contains("CHECK constraint failed")
                    || msg.contains("FOREIGN KEY constraint failed")
                {
                    DomainError::Constraint(msg)
                } else {
                    DomainError::Database(msg)
                }
            }
        }
    }
}
