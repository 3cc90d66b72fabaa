//! Repository trait definitions
//!
//! These traits define the contract for data access.
//! Implementations live in the infrastructure layer.

use async_trait::async_trait;
use serde::Deserialize;

use super::DomainError;
use crate::models::{Book, Member};

/// Filter criteria for book queries
#[derive(Debug, Default, Clone)]
pub struct BookFilter {
    pub title: Option<String>,
    pub author: Option<String>,
    /// Only books with at least one copy on the shelf
    pub available_only: bool,
}

/// Input for adding a title to the catalogue
#[derive(Debug, Clone, Deserialize)]
pub struct NewBook {
    pub title: String,
    pub author: String,
    pub isbn: Option<String>,
    pub published_year: Option<i32>,
    pub total_copies: i32,
}

/// Input for updating a book
#[derive(Debug, Clone, Default, Deserialize)]
pub struct BookUpdate {
    pub title: Option<String>,
    pub author: Option<String>,
    pub isbn: Option<Option<String>>,
    pub published_year: Option<Option<i32>>,
    pub total_copies: Option<i32>,
}

/// Repository trait for Book entity
#[async_trait]
pub trait BookRepository: Send + Sync {
    /// Find all books matching the filter criteria, ordered by title
    async fn find_all(&self, filter: BookFilter) -> Result<Vec<Book>, DomainError>;

    /// Find a single book by ID
    async fn find_by_id(&self, id: i32) -> Result<Option<Book>, DomainError>;

    /// Create a new book with every copy on the shelf
    async fn create(&self, book: NewBook) -> Result<Book, DomainError>;

    /// Update an existing book; a new `total_copies` shifts
    /// `available_copies` by the same amount
    async fn update(&self, id: i32, update: BookUpdate) -> Result<Book, DomainError>;

    /// Delete a book by ID. Fails while any loan references it.
    async fn delete(&self, id: i32) -> Result<(), DomainError>;
}

/// Input for registering a member
#[derive(Debug, Clone, Deserialize)]
pub struct NewMember {
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub phone: Option<String>,
    /// Defaults to today
    pub membership_date: Option<String>,
}

/// Input for updating a member
#[derive(Debug, Clone, Default, Deserialize)]
pub struct MemberUpdate {
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub email: Option<String>,
    pub phone: Option<Option<String>>,
}

/// Repository trait for Member entity
#[async_trait]
pub trait MemberRepository: Send + Sync {
    /// Find all members ordered by last name
    async fn find_all(&self) -> Result<Vec<Member>, DomainError>;

    /// Find a member by ID
    async fn find_by_id(&self, id: i32) -> Result<Option<Member>, DomainError>;

    /// Find a member by email address
    async fn find_by_email(&self, email: &str) -> Result<Option<Member>, DomainError>;

    /// Register a new member
    async fn create(&self, member: NewMember) -> Result<Member, DomainError>;

    /// Update a member
    async fn update(&self, id: i32, update: MemberUpdate) -> Result<Member, DomainError>;

    /// Delete a member together with their loans, returning any copies
    /// they still hold to the shelf
    async fn delete(&self, id: i32) -> Result<(), DomainError>;
}
