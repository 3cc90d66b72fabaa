use sea_orm::{
    ConnectOptions, ConnectionTrait, Database, DatabaseBackend, DatabaseConnection, DbErr,
    Statement,
};

use std::time::Duration;

use super::config::Config;

/// Lifetime and idle timeout for the connection behind an in-memory
/// database, long enough that the pool never recycles it.
const PINNED_CONNECTION_LIFETIME: Duration = Duration::from_secs(60 * 60 * 24 * 365 * 100);

fn is_in_memory(database_url: &str) -> bool {
    database_url.contains(":memory:") || database_url.contains("mode=memory")
}

/// Connect with default pool settings and run migrations.
pub async fn init_db(database_url: &str) -> Result<DatabaseConnection, DbErr> {
    connect(database_url, None).await
}

/// Connect using the pool size from `config` and run migrations.
pub async fn init_db_with_config(config: &Config) -> Result<DatabaseConnection, DbErr> {
    connect(&config.database_url, config.max_connections).await
}

async fn connect(
    database_url: &str,
    max_connections: Option<u32>,
) -> Result<DatabaseConnection, DbErr> {
    let mut options = ConnectOptions::new(database_url.to_owned());
    options.sqlx_logging(false);

    if database_url.starts_with("sqlite:") {
        // SQLite has a single writer: one pooled connection serializes loan
        // transactions and keeps `sqlite::memory:` databases alive.
        options
            .max_connections(max_connections.unwrap_or(1))
            .min_connections(1);
        if is_in_memory(database_url) {
            // The database lives only as long as its connection
            options
                .max_lifetime(PINNED_CONNECTION_LIFETIME)
                .idle_timeout(PINNED_CONNECTION_LIFETIME);
        }
    } else if let Some(max) = max_connections {
        options.max_connections(max);
    }

    let db = Database::connect(options).await?;

    // Run migrations manually (simple SQL)
    run_migrations(&db).await?;

    tracing::debug!("Database ready at {}", database_url);
    Ok(db)
}

async fn exec(db: &DatabaseConnection, sql: &str) -> Result<(), DbErr> {
    db.execute(Statement::from_string(
        db.get_database_backend(),
        sql.to_owned(),
    ))
    .await?;
    Ok(())
}

async fn run_migrations(db: &DatabaseConnection) -> Result<(), DbErr> {
    if db.get_database_backend() == DatabaseBackend::Sqlite {
        exec(db, "PRAGMA foreign_keys = ON").await?;
    }

    // Create books table
    exec(
        db,
        r#"
        CREATE TABLE IF NOT EXISTS books (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            title TEXT NOT NULL,
            author TEXT NOT NULL,
            isbn TEXT UNIQUE,
            published_year INTEGER,
            total_copies INTEGER NOT NULL DEFAULT 1
                CHECK (total_copies >= 0),
            available_copies INTEGER NOT NULL DEFAULT 1
                CHECK (available_copies >= 0 AND available_copies <= total_copies),
            created_at TEXT NOT NULL,
            updated_at TEXT NOT NULL
        )
        "#,
    )
    .await?;

    // Create members table
    exec(
        db,
        r#"
        CREATE TABLE IF NOT EXISTS members (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            first_name TEXT NOT NULL,
            last_name TEXT NOT NULL,
            email TEXT NOT NULL UNIQUE,
            phone TEXT,
            membership_date TEXT NOT NULL,
            created_at TEXT NOT NULL,
            updated_at TEXT NOT NULL
        )
        "#,
    )
    .await?;

    // Create loans table. Books with loans cannot be deleted; members take
    // their loans with them.
    exec(
        db,
        r#"
        CREATE TABLE IF NOT EXISTS loans (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            book_id INTEGER NOT NULL,
            member_id INTEGER NOT NULL,
            loan_date TEXT NOT NULL,
            due_date TEXT NOT NULL,
            return_date TEXT,
            status TEXT NOT NULL DEFAULT 'on_loan'
                CHECK (status IN ('on_loan', 'returned', 'overdue')),
            created_at TEXT NOT NULL,
            updated_at TEXT NOT NULL,
            CHECK (due_date >= loan_date),
            CHECK (return_date IS NULL OR return_date >= loan_date),
            FOREIGN KEY (book_id) REFERENCES books(id) ON DELETE RESTRICT,
            FOREIGN KEY (member_id) REFERENCES members(id) ON DELETE CASCADE
        )
        "#,
    )
    .await?;

    // Indexes
    for sql in [
        "CREATE INDEX IF NOT EXISTS idx_books_title ON books(title)",
        "CREATE INDEX IF NOT EXISTS idx_books_author ON books(author)",
        "CREATE INDEX IF NOT EXISTS idx_members_last_name ON members(last_name)",
        "CREATE INDEX IF NOT EXISTS idx_loans_book_id ON loans(book_id)",
        "CREATE INDEX IF NOT EXISTS idx_loans_member_id ON loans(member_id)",
        "CREATE INDEX IF NOT EXISTS idx_loans_status ON loans(status)",
        "CREATE INDEX IF NOT EXISTS idx_loans_due_date ON loans(due_date)",
    ] {
        exec(db, sql).await?;
    }

    // Loans currently holding a copy, with book title and member name
    exec(
        db,
        r#"
        CREATE VIEW IF NOT EXISTS active_loans AS
        SELECT
            l.id AS loan_id,
            l.book_id AS book_id,
            b.title AS title,
            l.member_id AS member_id,
            m.first_name || ' ' || m.last_name AS member_name,
            l.loan_date AS loan_date,
            l.due_date AS due_date,
            l.status AS status
        FROM loans l
        JOIN books b ON b.id = l.book_id
        JOIN members m ON m.id = l.member_id
        WHERE l.status = 'on_loan'
        "#,
    )
    .await?;

    Ok(())
}
