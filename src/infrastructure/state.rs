//! Application state containing repositories and shared resources

use sea_orm::DatabaseConnection;
use std::sync::Arc;

use crate::domain::{BookRepository, MemberRepository};
use crate::infrastructure::{SeaOrmBookRepository, SeaOrmMemberRepository};

/// Shared handles to the database and repositories
#[derive(Clone)]
pub struct AppState {
    /// Database connection, used by the loan service
    db: DatabaseConnection,
    /// Book repository
    pub book_repo: Arc<dyn BookRepository>,
    /// Member repository
    pub member_repo: Arc<dyn MemberRepository>,
}

impl AppState {
    /// Create a new AppState with all repositories initialized
    pub fn new(db: DatabaseConnection) -> Self {
        let book_repo = Arc::new(SeaOrmBookRepository::new(db.clone()));
        let member_repo = Arc::new(SeaOrmMemberRepository::new(db.clone()));

        Self {
            db,
            book_repo,
            member_repo,
        }
    }

    /// Get the database connection
    pub fn db(&self) -> &DatabaseConnection {
        &self.db
    }
}
