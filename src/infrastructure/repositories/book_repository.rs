//! SeaORM implementation of BookRepository

use async_trait::async_trait;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter, QueryOrder,
    QuerySelect, Set, TransactionTrait,
};

use crate::domain::{BookFilter, BookRepository, BookUpdate, DomainError, NewBook};
use crate::models::Book;
use crate::models::book::{ActiveModel, Column, Entity as BookEntity};

/// SeaORM-based implementation of BookRepository
pub struct SeaOrmBookRepository {
    db: DatabaseConnection,
}

impl SeaOrmBookRepository {
    pub fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }
}

fn required(field: &str, value: &str) -> Result<String, DomainError> {
    let value = value.trim();
    if value.is_empty() {
        return Err(DomainError::Validation(format!("{} is required", field)));
    }
    Ok(value.to_string())
}

fn check_total(total: i32) -> Result<(), DomainError> {
    if total < 0 {
        return Err(DomainError::Validation(format!(
            "total_copies cannot be negative, got {}",
            total
        )));
    }
    Ok(())
}

#[async_trait]
impl BookRepository for SeaOrmBookRepository {
    async fn find_all(&self, filter: BookFilter) -> Result<Vec<Book>, DomainError> {
        let mut query = BookEntity::find();

        if let Some(title) = &filter.title
            && !title.is_empty()
        {
            query = query.filter(Column::Title.contains(title));
        }

        if let Some(author) = &filter.author
            && !author.is_empty()
        {
            query = query.filter(Column::Author.contains(author));
        }

        if filter.available_only {
            query = query.filter(Column::AvailableCopies.gt(0));
        }

        let books = query
            .order_by_asc(Column::Title)
            .order_by_asc(Column::Id)
            .all(&self.db)
            .await?;

        Ok(books.into_iter().map(Book::from).collect())
    }

    async fn find_by_id(&self, id: i32) -> Result<Option<Book>, DomainError> {
        let book = BookEntity::find_by_id(id).one(&self.db).await?;
        Ok(book.map(Book::from))
    }

    async fn create(&self, book: NewBook) -> Result<Book, DomainError> {
        check_total(book.total_copies)?;
        let now = chrono::Utc::now().to_rfc3339();

        let new_book = ActiveModel {
            title: Set(required("title", &book.title)?),
            author: Set(required("author", &book.author)?),
            isbn: Set(book.isbn),
            published_year: Set(book.published_year),
            total_copies: Set(book.total_copies),
            available_copies: Set(book.total_copies),
            created_at: Set(now.clone()),
            updated_at: Set(now),
            ..Default::default()
        };

        let result = new_book.insert(&self.db).await?;
        tracing::info!(book_id = result.id, title = %result.title, "Book added");
        Ok(Book::from(result))
    }

    async fn update(&self, id: i32, update: BookUpdate) -> Result<Book, DomainError> {
        if let Some(total) = update.total_copies {
            check_total(total)?;
        }

        let txn = self.db.begin().await?;

        let existing = BookEntity::find_by_id(id)
            .lock_exclusive()
            .one(&txn)
            .await?
            .ok_or(DomainError::NotFound)?;

        let mut active: ActiveModel = existing.clone().into();

        if let Some(total) = update.total_copies {
            let lent_out = existing.total_copies - existing.available_copies;
            let available = existing.available_copies + (total - existing.total_copies);
            if available < 0 {
                return Err(DomainError::Validation(format!(
                    "Cannot reduce total_copies to {}: {} copies are lent out",
                    total, lent_out
                )));
            }
            active.total_copies = Set(total);
            active.available_copies = Set(available);
        }
        if let Some(title) = update.title {
            active.title = Set(required("title", &title)?);
        }
        if let Some(author) = update.author {
            active.author = Set(required("author", &author)?);
        }
        if let Some(isbn) = update.isbn {
            active.isbn = Set(isbn);
        }
        if let Some(year) = update.published_year {
            active.published_year = Set(year);
        }
        active.updated_at = Set(chrono::Utc::now().to_rfc3339());

        let result = active.update(&txn).await?;
        txn.commit().await?;

        Ok(Book::from(result))
    }

    async fn delete(&self, id: i32) -> Result<(), DomainError> {
        let result = BookEntity::delete_by_id(id).exec(&self.db).await?;

        if result.rows_affected == 0 {
            return Err(DomainError::NotFound);
        }

        tracing::info!(book_id = id, "Book deleted");
        Ok(())
    }
}
