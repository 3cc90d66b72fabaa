use chrono::{Duration, Local};

use crate::domain::{BookFilter, DomainError, NewBook, NewMember};
use crate::infrastructure::AppState;
use crate::models::DATE_FORMAT;
use crate::models::loan::NewLoan;
use crate::services::loan_service;

/// Fill an empty database with a small catalogue, two members and a few
/// loans. Does nothing if any book already exists.
pub async fn seed_demo_data(state: &AppState) -> Result<(), DomainError> {
    if !state.book_repo.find_all(BookFilter::default()).await?.is_empty() {
        tracing::info!("Catalogue not empty, skipping demo data");
        return Ok(());
    }

    // 1. Books
    let books = vec![
        ("The Hobbit", "J.R.R. Tolkien", "9780547928227", 1937, 3),
        ("Foundation", "Isaac Asimov", "9780553293357", 1951, 2),
        ("Dune", "Frank Herbert", "9780441013593", 1965, 1),
    ];

    let mut book_ids = Vec::with_capacity(books.len());
    for (title, author, isbn, year, copies) in books {
        let book = state
            .book_repo
            .create(NewBook {
                title: title.to_owned(),
                author: author.to_owned(),
                isbn: Some(isbn.to_owned()),
                published_year: Some(year),
                total_copies: copies,
            })
            .await?;
        book_ids.push(book.id);
    }

    // 2. Members
    let alice = state
        .member_repo
        .create(NewMember {
            first_name: "Alice".to_owned(),
            last_name: "Martin".to_owned(),
            email: "alice@example.org".to_owned(),
            phone: None,
            membership_date: None,
        })
        .await?;
    let bob = state
        .member_repo
        .create(NewMember {
            first_name: "Bob".to_owned(),
            last_name: "Durand".to_owned(),
            email: "bob@example.org".to_owned(),
            phone: Some("+33 1 23 45 67 89".to_owned()),
            membership_date: None,
        })
        .await?;

    // 3. Loans
    let today = Local::now().date_naive();
    let fmt = |d: chrono::NaiveDate| d.format(DATE_FORMAT).to_string();

    loan_service::create_loan(
        state.db(),
        NewLoan {
            book_id: book_ids[0],
            member_id: alice.id,
            loan_date: fmt(today),
            due_date: fmt(today + Duration::days(14)),
            return_date: None,
            status: None,
        },
    )
    .await?;

    let earlier = loan_service::create_loan(
        state.db(),
        NewLoan {
            book_id: book_ids[2],
            member_id: bob.id,
            loan_date: fmt(today - Duration::days(30)),
            due_date: fmt(today - Duration::days(16)),
            return_date: None,
            status: None,
        },
    )
    .await?;
    loan_service::return_loan(state.db(), earlier.id, Some(today - Duration::days(18))).await?;

    loan_service::create_loan(
        state.db(),
        NewLoan {
            book_id: book_ids[1],
            member_id: bob.id,
            loan_date: fmt(today),
            due_date: fmt(today + Duration::days(21)),
            return_date: None,
            status: None,
        },
    )
    .await?;

    tracing::info!("Demo data seeded: {} books, 2 members, 3 loans", book_ids.len());
    Ok(())
}
