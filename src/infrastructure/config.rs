use std::env;

#[derive(Clone, Debug)]
pub struct Config {
    pub database_url: String,
    /// Pool size; SQLite defaults to a single connection when unset
    pub max_connections: Option<u32>,
    pub seed_demo: bool,
    pub profile: String,
}

impl Config {
    /// Read configuration from the environment. `profile` (from the
    /// `--profile` argument) takes precedence over the `PROFILE` variable.
    pub fn from_env_with_profile(profile: Option<String>) -> Self {
        let profile = profile
            .or_else(|| env::var("PROFILE").ok())
            .unwrap_or_else(|| "default".to_string());

        let database_url = env::var("DATABASE_URL").unwrap_or_else(|_| {
            if profile == "default" {
                "sqlite://bibliodesk.db?mode=rwc".to_string()
            } else {
                format!("sqlite://bibliodesk_{}.db?mode=rwc", profile)
            }
        });

        Self {
            database_url,
            max_connections: env::var("DATABASE_MAX_CONNECTIONS")
                .ok()
                .and_then(|n| n.parse().ok()),
            seed_demo: env::var("SEED_DEMO")
                .map(|v| v != "false" && v != "0")
                .unwrap_or(false),
            profile,
        }
    }
}
