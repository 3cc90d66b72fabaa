//! Loan Service - loan writes and the copy counter they drive
//!
//! Every write opens a transaction, locks the loan and book rows it
//! touches, applies the [`counter_effects`] of the transition and commits
//! together with the loan row. Any error drops the transaction, which
//! rolls back both the loan write and the counter.

use chrono::{Local, NaiveDate};
use sea_orm::sea_query::Expr;
use sea_orm::*;
use std::collections::HashMap;

use crate::domain::{CounterEffect, DomainError, LoanSide, counter_effects};
use crate::models::DATE_FORMAT;
use crate::models::active_loan::{self, Entity as ActiveLoan};
use crate::models::book::{self, Entity as Book};
use crate::models::loan::{self, Entity as Loan, LoanStatus, LoanUpdate, NewLoan};
use crate::models::member::Entity as Member;

/// Enriched loan with related data
#[derive(Debug, Clone, serde::Serialize)]
pub struct LoanWithDetails {
    pub id: i32,
    pub book_id: i32,
    pub member_id: i32,
    pub loan_date: String,
    pub due_date: String,
    pub return_date: Option<String>,
    pub status: LoanStatus,
    pub member_name: String,
    pub book_title: String,
}

/// Filter parameters for listing loans
#[derive(Debug, Default, Clone)]
pub struct LoanFilter {
    pub book_id: Option<i32>,
    pub member_id: Option<i32>,
    pub status: Option<LoanStatus>,
}

fn timestamp() -> String {
    chrono::Utc::now().to_rfc3339()
}

fn parse_date(field: &str, value: &str) -> Result<NaiveDate, DomainError> {
    NaiveDate::parse_from_str(value.trim(), DATE_FORMAT).map_err(|_| {
        DomainError::Validation(format!("{} must be a YYYY-MM-DD date, got '{}'", field, value))
    })
}

/// Checked and normalized loan dates
#[derive(Debug)]
struct LoanDates {
    loan_date: String,
    due_date: String,
    return_date: Option<String>,
}

fn validate_dates(
    loan_date: &str,
    due_date: &str,
    return_date: Option<&str>,
) -> Result<LoanDates, DomainError> {
    let loaned = parse_date("loan_date", loan_date)?;
    let due = parse_date("due_date", due_date)?;
    if due < loaned {
        return Err(DomainError::Validation(format!(
            "due_date {} is before loan_date {}",
            due, loaned
        )));
    }

    let returned = return_date
        .map(|d| parse_date("return_date", d))
        .transpose()?;
    if let Some(returned) = returned
        && returned < loaned
    {
        return Err(DomainError::Validation(format!(
            "return_date {} is before loan_date {}",
            returned, loaned
        )));
    }

    Ok(LoanDates {
        loan_date: loaned.format(DATE_FORMAT).to_string(),
        due_date: due.format(DATE_FORMAT).to_string(),
        return_date: returned.map(|d| d.format(DATE_FORMAT).to_string()),
    })
}

/// Take one copy of `book_id` off the shelf.
///
/// The book row is read with an exclusive lock first, then decremented
/// with a guarded update so the counter can never go below zero even if
/// the backend ignores the lock.
async fn acquire_copy<C: ConnectionTrait>(txn: &C, book_id: i32) -> Result<(), DomainError> {
    let book = Book::find_by_id(book_id).lock_exclusive().one(txn).await?;

    let Some(book) = book else {
        tracing::warn!(book_id, "Loan refused: book does not exist");
        return Err(DomainError::NoAvailableCopies { book_id });
    };

    if book.available_copies <= 0 {
        tracing::warn!(book_id, title = %book.title, "Loan refused: no copies left");
        return Err(DomainError::NoAvailableCopies { book_id });
    }

    let result = Book::update_many()
        .col_expr(
            book::Column::AvailableCopies,
            Expr::col(book::Column::AvailableCopies).sub(1),
        )
        .col_expr(book::Column::UpdatedAt, Expr::value(timestamp()))
        .filter(book::Column::Id.eq(book_id))
        .filter(book::Column::AvailableCopies.gt(0))
        .exec(txn)
        .await?;

    if result.rows_affected == 0 {
        tracing::warn!(book_id, "Loan refused: last copy taken concurrently");
        return Err(DomainError::NoAvailableCopies { book_id });
    }

    tracing::debug!(
        book_id,
        available = book.available_copies - 1,
        "Copy taken off the shelf"
    );
    Ok(())
}

/// Put one copy of `book_id` back on the shelf, never above `total_copies`.
async fn release_copy<C: ConnectionTrait>(txn: &C, book_id: i32) -> Result<(), DomainError> {
    let book = Book::find_by_id(book_id)
        .lock_exclusive()
        .one(txn)
        .await?
        .ok_or(DomainError::NotFound)?;

    let result = Book::update_many()
        .col_expr(
            book::Column::AvailableCopies,
            Expr::col(book::Column::AvailableCopies).add(1),
        )
        .col_expr(book::Column::UpdatedAt, Expr::value(timestamp()))
        .filter(book::Column::Id.eq(book_id))
        .filter(Expr::col(book::Column::AvailableCopies).lt(Expr::col(book::Column::TotalCopies)))
        .exec(txn)
        .await?;

    if result.rows_affected == 0 {
        tracing::warn!(
            book_id,
            total = book.total_copies,
            "Copy returned to a full shelf, counter left unchanged"
        );
    } else {
        tracing::debug!(
            book_id,
            available = book.available_copies + 1,
            "Copy back on the shelf"
        );
    }
    Ok(())
}

async fn apply_effects<C: ConnectionTrait>(
    txn: &C,
    effects: &[CounterEffect],
) -> Result<(), DomainError> {
    for effect in effects {
        match *effect {
            CounterEffect::Acquire { book_id } => acquire_copy(txn, book_id).await?,
            CounterEffect::Release { book_id } => release_copy(txn, book_id).await?,
        }
    }
    Ok(())
}

async fn lock_loan<C: ConnectionTrait>(txn: &C, id: i32) -> Result<loan::Model, DomainError> {
    Loan::find_by_id(id)
        .lock_exclusive()
        .one(txn)
        .await?
        .ok_or(DomainError::NotFound)
}

/// Apply `update` to an already locked loan inside `txn`.
async fn write_update<C: ConnectionTrait>(
    txn: &C,
    existing: loan::Model,
    update: LoanUpdate,
) -> Result<loan::Model, DomainError> {
    let return_date = match &update.return_date {
        Some(value) => value.as_deref(),
        None => existing.return_date.as_deref(),
    };
    let dates = validate_dates(
        update.loan_date.as_deref().unwrap_or(&existing.loan_date),
        update.due_date.as_deref().unwrap_or(&existing.due_date),
        return_date,
    )?;

    let old = LoanSide::new(existing.book_id, existing.status);
    let new = LoanSide::new(
        update.book_id.unwrap_or(existing.book_id),
        update.status.unwrap_or(existing.status),
    );
    apply_effects(txn, &counter_effects(Some(old), Some(new))).await?;

    let mut active: loan::ActiveModel = existing.into();
    active.book_id = Set(new.book_id);
    active.status = Set(new.status);
    if let Some(member_id) = update.member_id {
        active.member_id = Set(member_id);
    }
    active.loan_date = Set(dates.loan_date);
    active.due_date = Set(dates.due_date);
    active.return_date = Set(dates.return_date);
    active.updated_at = Set(timestamp());

    Ok(active.update(txn).await?)
}

/// Create a new loan, `on_loan` unless the input says otherwise
pub async fn create_loan(
    db: &DatabaseConnection,
    input: NewLoan,
) -> Result<loan::Model, DomainError> {
    let status = input.status.unwrap_or(LoanStatus::OnLoan);
    let dates = validate_dates(
        &input.loan_date,
        &input.due_date,
        input.return_date.as_deref(),
    )?;
    let now = timestamp();

    let txn = db.begin().await?;

    let effects = counter_effects(None, Some(LoanSide::new(input.book_id, status)));
    apply_effects(&txn, &effects).await?;

    let new_loan = loan::ActiveModel {
        book_id: Set(input.book_id),
        member_id: Set(input.member_id),
        loan_date: Set(dates.loan_date),
        due_date: Set(dates.due_date),
        return_date: Set(dates.return_date),
        status: Set(status),
        created_at: Set(now.clone()),
        updated_at: Set(now),
        ..Default::default()
    };
    let saved_loan = new_loan.insert(&txn).await?;

    txn.commit().await?;

    tracing::info!(
        loan_id = saved_loan.id,
        book_id = saved_loan.book_id,
        member_id = saved_loan.member_id,
        "Loan created"
    );
    Ok(saved_loan)
}

/// Update a loan. Changing the book or the status moves copies between
/// shelves as [`counter_effects`] dictates.
pub async fn update_loan(
    db: &DatabaseConnection,
    id: i32,
    update: LoanUpdate,
) -> Result<loan::Model, DomainError> {
    let txn = db.begin().await?;
    let existing = lock_loan(&txn, id).await?;
    let updated = write_update(&txn, existing, update).await?;
    txn.commit().await?;

    tracing::info!(loan_id = id, status = %updated.status, "Loan updated");
    Ok(updated)
}

/// Return a loan, stamping `return_date` (today by default).
///
/// Only an `on_loan` loan puts its copy back; returning an `overdue`
/// loan records the return without touching the counter.
pub async fn return_loan(
    db: &DatabaseConnection,
    id: i32,
    return_date: Option<NaiveDate>,
) -> Result<loan::Model, DomainError> {
    let txn = db.begin().await?;
    let existing = lock_loan(&txn, id).await?;

    if existing.status == LoanStatus::Returned {
        return Err(DomainError::Validation(
            "Loan is already returned".to_string(),
        ));
    }

    let returned_on = return_date.unwrap_or_else(|| Local::now().date_naive());
    let update = LoanUpdate {
        status: Some(LoanStatus::Returned),
        return_date: Some(Some(returned_on.format(DATE_FORMAT).to_string())),
        ..Default::default()
    };
    let updated = write_update(&txn, existing, update).await?;
    txn.commit().await?;

    tracing::info!(loan_id = id, "Loan returned");
    Ok(updated)
}

/// Flag an `on_loan` loan as overdue. The copy stays off the shelf.
pub async fn mark_overdue(db: &DatabaseConnection, id: i32) -> Result<loan::Model, DomainError> {
    let txn = db.begin().await?;
    let existing = lock_loan(&txn, id).await?;

    if existing.status != LoanStatus::OnLoan {
        return Err(DomainError::Validation(format!(
            "Only loans on loan can become overdue, this one is {}",
            existing.status
        )));
    }

    let update = LoanUpdate {
        status: Some(LoanStatus::Overdue),
        ..Default::default()
    };
    let updated = write_update(&txn, existing, update).await?;
    txn.commit().await?;

    tracing::info!(loan_id = id, "Loan marked overdue");
    Ok(updated)
}

/// Delete a loan; an `on_loan` loan gives its copy back first
pub async fn delete_loan(db: &DatabaseConnection, id: i32) -> Result<(), DomainError> {
    let txn = db.begin().await?;
    let existing = lock_loan(&txn, id).await?;

    let old = LoanSide::new(existing.book_id, existing.status);
    apply_effects(&txn, &counter_effects(Some(old), None)).await?;

    Loan::delete_by_id(id).exec(&txn).await?;
    txn.commit().await?;

    tracing::info!(loan_id = id, "Loan deleted");
    Ok(())
}

/// Give back every copy a member still holds, ahead of their loans being
/// removed by the member cascade. Returns the number of copies released.
pub async fn release_member_loans<C: ConnectionTrait>(
    txn: &C,
    member_id: i32,
) -> Result<usize, DomainError> {
    let loans = Loan::find()
        .filter(loan::Column::MemberId.eq(member_id))
        .filter(loan::Column::Status.eq(LoanStatus::OnLoan))
        .lock_exclusive()
        .all(txn)
        .await?;

    for loan in &loans {
        let old = LoanSide::new(loan.book_id, loan.status);
        apply_effects(txn, &counter_effects(Some(old), None)).await?;
    }

    Ok(loans.len())
}

/// Get a single loan
pub async fn get_loan(db: &DatabaseConnection, id: i32) -> Result<loan::Model, DomainError> {
    Loan::find_by_id(id)
        .one(db)
        .await?
        .ok_or(DomainError::NotFound)
}

/// List loans with member and book info, newest first
pub async fn list_loans(
    db: &DatabaseConnection,
    filter: LoanFilter,
) -> Result<Vec<LoanWithDetails>, DomainError> {
    let mut condition = Condition::all();

    if let Some(book_id) = filter.book_id {
        condition = condition.add(loan::Column::BookId.eq(book_id));
    }

    if let Some(member_id) = filter.member_id {
        condition = condition.add(loan::Column::MemberId.eq(member_id));
    }

    if let Some(status) = filter.status {
        condition = condition.add(loan::Column::Status.eq(status));
    }

    let loans_with_members = Loan::find()
        .filter(condition)
        .order_by_desc(loan::Column::LoanDate)
        .order_by_desc(loan::Column::Id)
        .find_also_related(Member)
        .all(db)
        .await?;

    let book_ids: Vec<i32> = loans_with_members.iter().map(|(l, _)| l.book_id).collect();

    let mut titles: HashMap<i32, String> = HashMap::new();
    if !book_ids.is_empty() {
        let books = Book::find()
            .filter(book::Column::Id.is_in(book_ids))
            .all(db)
            .await?;
        for book in books {
            titles.insert(book.id, book.title);
        }
    }

    let result = loans_with_members
        .into_iter()
        .map(|(loan, member)| LoanWithDetails {
            id: loan.id,
            book_id: loan.book_id,
            member_id: loan.member_id,
            loan_date: loan.loan_date,
            due_date: loan.due_date,
            return_date: loan.return_date,
            status: loan.status,
            member_name: member
                .map(|m| m.full_name())
                .unwrap_or_else(|| "Unknown".to_string()),
            book_title: titles
                .get(&loan.book_id)
                .cloned()
                .unwrap_or_else(|| "Unknown".to_string()),
        })
        .collect();

    Ok(result)
}

/// Rows of the `active_loans` view, soonest due first
pub async fn list_active_loans(
    db: &DatabaseConnection,
) -> Result<Vec<active_loan::Model>, DomainError> {
    Ok(ActiveLoan::find()
        .order_by_asc(active_loan::Column::DueDate)
        .order_by_asc(active_loan::Column::LoanId)
        .all(db)
        .await?)
}

/// Count total loans
pub async fn count_loans(db: &DatabaseConnection) -> Result<u64, DomainError> {
    Ok(Loan::find().count(db).await?)
}

/// Count loans currently holding a copy
pub async fn count_active_loans(db: &DatabaseConnection) -> Result<u64, DomainError> {
    Ok(Loan::find()
        .filter(loan::Column::Status.eq(LoanStatus::OnLoan))
        .count(db)
        .await?)
}
