use clap::{Args, Parser, Subcommand};
use thiserror::Error;

/// URL that selects the in-process store instead of PostgreSQL.
pub const MEMORY_DATABASE_URL: &str = "memory://";

/// Placeholder secrets that must never sign tokens in production.
pub const INSECURE_SECRETS: &[&str] = &[
    "changeme",
    "secret",
    "your-secret-key-change-in-production",
    // shipped in .env.example
    "replace-with-a-long-random-string",
];

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("SECRET_KEY must not be empty")]
    EmptySecret,
    #[error("ACCESS_TOKEN_EXPIRE_MINUTES must be positive, got {0}")]
    InvalidTokenLifetime(i64),
    #[error("AUTH_RATE_LIMIT_PER_MINUTE must be positive")]
    InvalidRateLimit,
    #[error("no database configured: set DATABASE_URL or POSTGRES_USER and POSTGRES_DB")]
    MissingDatabase,
}

#[derive(Debug, Parser)]
#[command(name = "secure-notes-api", version, about = "Per-user notes REST API")]
pub struct Cli {
    #[command(flatten)]
    pub config: AppConfig,

    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Debug, Subcommand, PartialEq, Eq)]
pub enum Command {
    /// Run the HTTP server (default)
    Serve,
    /// Create a user if it does not exist yet
    Seed {
        #[arg(long, default_value = "testuser")]
        username: String,
        #[arg(long, env = "SEED_PASSWORD", default_value = "testpassword", hide_env_values = true)]
        password: String,
    },
}

#[derive(Debug, Clone, Args)]
pub struct AppConfig {
    #[arg(long, env = "HOST", default_value = "127.0.0.1")]
    pub host: String,

    #[arg(long, env = "PORT", default_value_t = 8080)]
    pub port: u16,

    /// HMAC key used to sign access tokens
    #[arg(long, env = "SECRET_KEY", hide_env_values = true)]
    pub secret_key: String,

    #[arg(long, env = "ACCESS_TOKEN_EXPIRE_MINUTES", default_value_t = 15)]
    pub access_token_expire_minutes: i64,

    /// Requests per minute and client IP allowed on /register and /login
    #[arg(long, env = "AUTH_RATE_LIMIT_PER_MINUTE", default_value_t = 5)]
    pub auth_rate_limit: u32,

    #[command(flatten)]
    pub database: DatabaseConfig,
}

#[derive(Debug, Clone, Args)]
pub struct DatabaseConfig {
    #[arg(long, env = "DATABASE_URL", hide_env_values = true)]
    pub database_url: Option<String>,

    #[arg(long, env = "POSTGRES_USER")]
    pub postgres_user: Option<String>,

    #[arg(long, env = "POSTGRES_PASSWORD", default_value = "", hide_env_values = true)]
    pub postgres_password: String,

    #[arg(long, env = "POSTGRES_HOST", default_value = "localhost")]
    pub postgres_host: String,

    #[arg(long, env = "POSTGRES_PORT", default_value_t = 5432)]
    pub postgres_port: u16,

    #[arg(long, env = "POSTGRES_DB")]
    pub postgres_db: Option<String>,

    #[arg(long, env = "DB_MAX_CONNECTIONS", default_value_t = 5)]
    pub max_connections: u32,

    #[arg(long, env = "RUN_MIGRATIONS", default_value_t = true, action = clap::ArgAction::Set)]
    pub run_migrations: bool,
}

impl AppConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.secret_key.trim().is_empty() {
            return Err(ConfigError::EmptySecret);
        }
        if self.access_token_expire_minutes <= 0 {
            return Err(ConfigError::InvalidTokenLifetime(
                self.access_token_expire_minutes,
            ));
        }
        if self.auth_rate_limit == 0 {
            return Err(ConfigError::InvalidRateLimit);
        }
        self.database.url().map(|_| ())
    }

    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    pub fn uses_insecure_secret(&self) -> bool {
        INSECURE_SECRETS.contains(&self.secret_key.as_str())
    }
}

impl DatabaseConfig {
    /// Connection string, preferring an explicit `DATABASE_URL` over the parts.
    pub fn url(&self) -> Result<String, ConfigError> {
        if let Some(url) = self.database_url.as_deref().filter(|u| !u.is_empty()) {
            return Ok(url.to_string());
        }
        match (&self.postgres_user, &self.postgres_db) {
            (Some(user), Some(db)) => {
                let auth = if self.postgres_password.is_empty() {
                    user.clone()
                } else {
                    format!("{}:{}", user, self.postgres_password)
                };
                Ok(format!(
                    "postgres://{}@{}:{}/{}",
                    auth, self.postgres_host, self.postgres_port, db
                ))
            }
            _ => Err(ConfigError::MissingDatabase),
        }
    }

    pub fn is_memory(&self) -> bool {
        self.database_url.as_deref() == Some(MEMORY_DATABASE_URL)
    }
}

#[cfg(test)]
pub(crate) fn test_config() -> AppConfig {
    AppConfig {
        host: "127.0.0.1".to_string(),
        port: 8080,
        secret_key: "test-secret-key".to_string(),
        access_token_expire_minutes: 15,
        auth_rate_limit: 100,
        database: DatabaseConfig {
            database_url: Some(MEMORY_DATABASE_URL.to_string()),
            postgres_user: None,
            postgres_password: String::new(),
            postgres_host: "localhost".to_string(),
            postgres_port: 5432,
            postgres_db: None,
            max_connections: 5,
            run_migrations: false,
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(args: &[&str]) -> Cli {
        let mut argv = vec!["secure-notes-api"];
        argv.extend_from_slice(args);
        Cli::try_parse_from(argv).unwrap()
    }

    #[test]
    fn test_database_url_preferred() {
        let cli = parse(&[
            "--secret-key",
            "k",
            "--database-url",
            "postgres://app@db/notes",
            "--postgres-user",
            "ignored",
            "--postgres-db",
            "ignored",
        ]);
        assert_eq!(cli.config.database.url().unwrap(), "postgres://app@db/notes");
    }

    #[test]
    fn test_database_url_from_parts() {
        let mut config = test_config();
        config.database.database_url = None;
        config.database.postgres_user = Some("notes".to_string());
        config.database.postgres_password = "pw".to_string();
        config.database.postgres_host = "db".to_string();
        config.database.postgres_db = Some("notes_db".to_string());

        assert_eq!(
            config.database.url().unwrap(),
            "postgres://notes:pw@db:5432/notes_db"
        );

        config.database.postgres_password.clear();
        assert_eq!(
            config.database.url().unwrap(),
            "postgres://notes@db:5432/notes_db"
        );
    }

    #[test]
    fn test_missing_database_rejected() {
        let mut config = test_config();
        config.database.database_url = None;
        assert_eq!(config.validate(), Err(ConfigError::MissingDatabase));
    }

    #[test]
    fn test_validate_rejects_bad_values() {
        let mut config = test_config();
        config.secret_key = "  ".to_string();
        assert_eq!(config.validate(), Err(ConfigError::EmptySecret));

        let mut config = test_config();
        config.access_token_expire_minutes = 0;
        assert_eq!(
            config.validate(),
            Err(ConfigError::InvalidTokenLifetime(0))
        );

        let mut config = test_config();
        config.auth_rate_limit = 0;
        assert_eq!(config.validate(), Err(ConfigError::InvalidRateLimit));

        assert!(test_config().validate().is_ok());
    }

    #[test]
    fn test_seed_subcommand() {
        let cli = parse(&[
            "--secret-key",
            "k",
            "--database-url",
            "memory://",
            "seed",
            "--username",
            "alice",
            "--password",
            "pw",
        ]);
        assert!(cli.config.database.is_memory());
        assert_eq!(
            cli.command,
            Some(Command::Seed {
                username: "alice".to_string(),
                password: "pw".to_string(),
            })
        );
    }

    #[test]
    fn test_insecure_secret_detected() {
        let mut config = test_config();
        assert!(!config.uses_insecure_secret());
        config.secret_key = "changeme".to_string();
        assert!(config.uses_insecure_secret());
    }

    #[test]
    fn test_env_example_secret_is_insecure() {
        let example = include_str!("../.env.example");
        let secret = example
            .lines()
            .find_map(|line| line.strip_prefix("SECRET_KEY="))
            .unwrap();

        let mut config = test_config();
        config.secret_key = secret.trim().to_string();
        assert!(config.uses_insecure_secret());
    }
}
