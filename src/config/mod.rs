use anyhow::{bail, Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use tracing::info;

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub database: DatabaseConfig,
    #[serde(default)]
    pub auth: AuthConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct DatabaseConfig {
    /// SQLite connection string, e.g. `sqlite://epicrm.db`
    pub url: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AuthConfig {
    /// HS256 signing secret. Changing it logs everybody out.
    pub jwt_secret: Option<String>,
    #[serde(default = "default_token_ttl_minutes")]
    pub token_ttl_minutes: i64,
    /// Where the current session token is kept between invocations
    #[serde(default = "default_session_file")]
    pub session_file: PathBuf,
    /// Bootstrap management account, created when the user table is empty
    pub admin_email: Option<String>,
    pub admin_password: Option<String>,
    #[serde(default = "default_admin_name")]
    pub admin_name: String,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            jwt_secret: None,
            token_ttl_minutes: default_token_ttl_minutes(),
            session_file: default_session_file(),
            admin_email: None,
            admin_password: None,
            admin_name: default_admin_name(),
        }
    }
}

fn default_token_ttl_minutes() -> i64 {
    60
}

fn default_session_file() -> PathBuf {
    PathBuf::from(".token")
}

fn default_admin_name() -> String {
    "Administrator".to_string()
}

#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

fn default_log_level() -> String {
    "warn".to_string()
}

impl Config {
    pub fn load(path: &Path) -> Result<Self> {
        if path.exists() {
            info!("Loading configuration from {}", path.display());
            let content = std::fs::read_to_string(path)
                .with_context(|| format!("Failed to read config file: {}", path.display()))?;
            let config: Config = toml::from_str(&content)
                .with_context(|| "Failed to parse configuration file")?;
            Ok(config)
        } else {
            info!("No config file found, using defaults");
            Ok(Config::default())
        }
    }

    /// Apply values given on the command line or through the environment
    pub fn with_overrides(
        mut self,
        database_url: Option<String>,
        jwt_secret: Option<String>,
        log_level: Option<String>,
    ) -> Self {
        if database_url.is_some() {
            self.database.url = database_url;
        }
        if jwt_secret.is_some() {
            self.auth.jwt_secret = jwt_secret;
        }
        if let Some(level) = log_level {
            self.logging.level = level;
        }
        self
    }

    /// Both the database and the signing secret are required to start
    pub fn validate(&self) -> Result<()> {
        if self.database_url().is_none() {
            bail!("No database configured. Set DATABASE_URL, --database-url or [database] url");
        }
        if self.jwt_secret().is_none() {
            bail!("No signing secret configured. Set EPICRM_JWT_SECRET, --jwt-secret or [auth] jwt_secret");
        }
        if self.auth.token_ttl_minutes <= 0 {
            bail!("auth.token_ttl_minutes must be positive");
        }
        if self.auth.admin_email.is_some() != self.auth.admin_password.is_some() {
            bail!("auth.admin_email and auth.admin_password must be set together");
        }
        Ok(())
    }

    pub fn database_url(&self) -> Option<&str> {
        non_blank(self.database.url.as_deref())
    }

    pub fn jwt_secret(&self) -> Option<&str> {
        non_blank(self.auth.jwt_secret.as_deref())
    }

    pub fn token_ttl(&self) -> chrono::Duration {
        chrono::Duration::minutes(self.auth.token_ttl_minutes)
    }
}

fn non_blank(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|v| !v.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_missing_file_uses_defaults() {
        let config = Config::load(Path::new("/nonexistent/epicrm.toml")).unwrap();
        assert_eq!(config.auth.token_ttl_minutes, 60);
        assert_eq!(config.auth.session_file, PathBuf::from(".token"));
        assert!(config.database_url().is_none());
    }

    #[test]
    fn test_load_partial_file() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(
            file,
            r#"
[database]
url = "sqlite://crm.db"

[auth]
jwt_secret = "s3cret"
token_ttl_minutes = 15
"#
        )
        .unwrap();

        let config = Config::load(file.path()).unwrap();
        assert_eq!(config.database_url(), Some("sqlite://crm.db"));
        assert_eq!(config.jwt_secret(), Some("s3cret"));
        assert_eq!(config.token_ttl(), chrono::Duration::minutes(15));
        assert_eq!(config.logging.level, "warn");
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_invalid_toml_is_an_error() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "[database\nurl = ").unwrap();
        assert!(Config::load(file.path()).is_err());
    }

    #[test]
    fn test_validate_requires_database_and_secret() {
        let config = Config::default();
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("database"));

        let config = Config::default().with_overrides(Some("sqlite://crm.db".into()), None, None);
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("secret"));

        let config = config.with_overrides(None, Some("   ".into()), None);
        assert!(config.validate().is_err());

        let config = config.with_overrides(None, Some("s3cret".into()), Some("debug".into()));
        assert!(config.validate().is_ok());
        assert_eq!(config.logging.level, "debug");
    }

    #[test]
    fn test_admin_credentials_come_in_pairs() {
        let mut config = Config::default().with_overrides(
            Some("sqlite://crm.db".into()),
            Some("s3cret".into()),
            None,
        );
        config.auth.admin_email = Some("admin@epic.io".into());
        assert!(config.validate().is_err());
        config.auth.admin_password = Some("adminpass1".into());
        assert!(config.validate().is_ok());
    }
}
