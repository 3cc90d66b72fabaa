use std::collections::HashSet;

use bibliodesk::db;
use bibliodesk::domain::{BookUpdate, DomainError, NewBook, NewMember};
use bibliodesk::infrastructure::AppState;
use bibliodesk::models::LoanStatus;
use bibliodesk::models::loan::{LoanUpdate, NewLoan};
use bibliodesk::services::LoanFilter;
use bibliodesk::services::loan_service;
use proptest::prelude::*;
use proptest::test_runner::TestCaseError;

const BOOKS: usize = 3;
const MEMBERS: usize = 4;

#[derive(Debug, Clone)]
enum Op {
    Lend { book: usize, member: usize, status: LoanStatus },
    Return { loan: usize },
    MarkOverdue { loan: usize },
    Move { loan: usize, book: usize },
    SetStatus { loan: usize, status: LoanStatus },
    Delete { loan: usize },
    Resize { book: usize, total: i32 },
    RemoveMember { member: usize },
}

fn status() -> impl Strategy<Value = LoanStatus> {
    prop_oneof![
        3 => Just(LoanStatus::OnLoan),
        1 => Just(LoanStatus::Returned),
        1 => Just(LoanStatus::Overdue),
    ]
}

fn op() -> impl Strategy<Value = Op> {
    prop_oneof![
        4 => (0..BOOKS, 0..MEMBERS, status())
            .prop_map(|(book, member, status)| Op::Lend { book, member, status }),
        2 => any::<usize>().prop_map(|loan| Op::Return { loan }),
        1 => any::<usize>().prop_map(|loan| Op::MarkOverdue { loan }),
        1 => (any::<usize>(), 0..BOOKS).prop_map(|(loan, book)| Op::Move { loan, book }),
        1 => (any::<usize>(), status()).prop_map(|(loan, status)| Op::SetStatus { loan, status }),
        1 => any::<usize>().prop_map(|loan| Op::Delete { loan }),
        1 => (0..BOOKS, 0..5i32).prop_map(|(book, total)| Op::Resize { book, total }),
        1 => (0..MEMBERS).prop_map(|member| Op::RemoveMember { member }),
    ]
}

struct Library {
    state: AppState,
    books: Vec<i32>,
    members: Vec<i32>,
    removed_members: HashSet<i32>,
    loans: Vec<i32>,
}

impl Library {
    async fn open() -> Self {
        let db = db::init_db("sqlite::memory:")
            .await
            .expect("Failed to init DB");
        let state = AppState::new(db);

        let mut books = Vec::with_capacity(BOOKS);
        for (i, copies) in [1, 2, 3].into_iter().enumerate() {
            let book = state
                .book_repo
                .create(NewBook {
                    title: format!("Volume {}", i),
                    author: "Series Author".to_string(),
                    isbn: None,
                    published_year: None,
                    total_copies: copies,
                })
                .await
                .expect("Failed to create book");
            books.push(book.id);
        }

        let mut members = Vec::with_capacity(MEMBERS);
        for i in 0..MEMBERS {
            let member = state
                .member_repo
                .create(NewMember {
                    first_name: format!("Patron{}", i),
                    last_name: "Random".to_string(),
                    email: format!("patron{}@example.org", i),
                    phone: None,
                    membership_date: None,
                })
                .await
                .expect("Failed to create member");
            members.push(member.id);
        }

        Self {
            state,
            books,
            members,
            removed_members: HashSet::new(),
            loans: Vec::new(),
        }
    }

    fn pick_loan(&self, index: usize) -> Option<i32> {
        if self.loans.is_empty() {
            None
        } else {
            Some(self.loans[index % self.loans.len()])
        }
    }

    async fn apply(&mut self, op: &Op) -> Result<(), DomainError> {
        let db = self.state.db();
        match *op {
            Op::Lend { book, member, status } => {
                let member_id = self.members[member];
                if self.removed_members.contains(&member_id) {
                    return Ok(());
                }
                let loan = loan_service::create_loan(
                    db,
                    NewLoan {
                        book_id: self.books[book],
                        member_id,
                        loan_date: "2024-02-01".to_string(),
                        due_date: "2024-02-21".to_string(),
                        return_date: None,
                        status: Some(status),
                    },
                )
                .await?;
                self.loans.push(loan.id);
            }
            Op::Return { loan } => {
                if let Some(id) = self.pick_loan(loan) {
                    loan_service::return_loan(db, id, None).await?;
                }
            }
            Op::MarkOverdue { loan } => {
                if let Some(id) = self.pick_loan(loan) {
                    loan_service::mark_overdue(db, id).await?;
                }
            }
            Op::Move { loan, book } => {
                if let Some(id) = self.pick_loan(loan) {
                    let update = LoanUpdate {
                        book_id: Some(self.books[book]),
                        ..Default::default()
                    };
                    loan_service::update_loan(db, id, update).await?;
                }
            }
            Op::SetStatus { loan, status } => {
                if let Some(id) = self.pick_loan(loan) {
                    let update = LoanUpdate {
                        status: Some(status),
                        ..Default::default()
                    };
                    loan_service::update_loan(db, id, update).await?;
                }
            }
            Op::Delete { loan } => {
                if let Some(id) = self.pick_loan(loan) {
                    loan_service::delete_loan(db, id).await?;
                }
            }
            Op::Resize { book, total } => {
                let update = BookUpdate {
                    total_copies: Some(total),
                    ..Default::default()
                };
                self.state.book_repo.update(self.books[book], update).await?;
            }
            Op::RemoveMember { member } => {
                let member_id = self.members[member];
                if self.removed_members.insert(member_id) {
                    self.state.member_repo.delete(member_id).await?;
                }
            }
        }
        Ok(())
    }

    /// Every book keeps `0 <= available <= total`, and the copies held by
    /// `on_loan` loans never exceed what is missing from the shelf.
    async fn check_counters(&self) -> Result<(), TestCaseError> {
        for &book_id in &self.books {
            let book = self
                .state
                .book_repo
                .find_by_id(book_id)
                .await
                .map_err(|e| TestCaseError::fail(e.to_string()))?
                .ok_or_else(|| TestCaseError::fail("book disappeared"))?;

            let on_loan = loan_service::list_loans(
                self.state.db(),
                LoanFilter {
                    book_id: Some(book_id),
                    status: Some(LoanStatus::OnLoan),
                    ..Default::default()
                },
            )
            .await
            .map_err(|e| TestCaseError::fail(e.to_string()))?
            .len() as i32;

            prop_assert!(book.available_copies >= 0, "{:?}", book);
            prop_assert!(book.available_copies <= book.total_copies, "{:?}", book);
            prop_assert!(
                book.available_copies + on_loan <= book.total_copies,
                "{:?} with {} on loan",
                book,
                on_loan
            );
        }
        Ok(())
    }
}

async fn run_operations(ops: Vec<Op>) -> Result<(), TestCaseError> {
    let mut library = Library::open().await;

    for op in &ops {
        match library.apply(op).await {
            Ok(())
            | Err(DomainError::NoAvailableCopies { .. })
            | Err(DomainError::Validation(_))
            | Err(DomainError::NotFound) => {}
            Err(e) => {
                return Err(TestCaseError::fail(format!("{:?} failed: {}", op, e)));
            }
        }
        library.check_counters().await?;
    }
    Ok(())
}

proptest! {
    #![proptest_config(ProptestConfig {
        cases: 32,
        ..ProptestConfig::default()
    })]

    /// Property: any sequence of loan, book and member operations leaves
    /// every shelf counter within bounds.
    #[test]
    fn random_operations_keep_shelf_counters_in_bounds(ops in prop::collection::vec(op(), 1..40)) {
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .expect("Failed to build runtime");
        runtime.block_on(run_operations(ops))?;
    }
}
