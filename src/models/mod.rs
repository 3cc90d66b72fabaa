pub mod active_loan;
pub mod book;
pub mod loan;
pub mod member;

pub use book::Book;
pub use loan::LoanStatus;
pub use member::Member;

/// Storage format of calendar dates (`loan_date`, `due_date`, ...)
pub const DATE_FORMAT: &str = "%Y-%m-%d";
