use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use bibliodesk::domain::BookFilter;
use bibliodesk::infrastructure::AppState;
use bibliodesk::services::loan_service;
use bibliodesk::{config, db, seed};

#[tokio::main]
async fn main() {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "bibliodesk=debug,sea_orm=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    // Load configuration
    dotenvy::dotenv().ok();

    // Check for --profile CLI argument
    let args: Vec<String> = std::env::args().collect();
    let profile = args
        .iter()
        .position(|arg| arg == "--profile")
        .and_then(|pos| args.get(pos + 1))
        .cloned();

    let config = config::Config::from_env_with_profile(profile);

    // Initialize database
    let db = match db::init_db_with_config(&config).await {
        Ok(db) => db,
        Err(e) => {
            tracing::error!("Failed to initialize database: {}", e);
            std::process::exit(1);
        }
    };
    let state = AppState::new(db);

    if config.seed_demo {
        tracing::info!("Seeding demo data...");
        if let Err(e) = seed::seed_demo_data(&state).await {
            tracing::error!("Failed to seed data: {}", e);
        }
    }

    match state.book_repo.find_all(BookFilter::default()).await {
        Ok(books) => {
            for book in &books {
                tracing::info!(
                    "{} by {}: {}/{} on the shelf",
                    book.title,
                    book.author,
                    book.available_copies,
                    book.total_copies
                );
            }
        }
        Err(e) => tracing::error!("Failed to list books: {}", e),
    }

    match loan_service::list_active_loans(state.db()).await {
        Ok(active) => {
            tracing::info!("{} active loans", active.len());
            for loan in active {
                tracing::info!(
                    "#{} {} -> {} (due {})",
                    loan.loan_id,
                    loan.title,
                    loan.member_name,
                    loan.due_date
                );
            }
        }
        Err(e) => tracing::error!("Failed to list active loans: {}", e),
    }
}
