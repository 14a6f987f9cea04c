//! Layered configuration for the teamgate server.
//!
//! Sources, lowest precedence first:
//! - built-in defaults
//! - a TOML file (`--config`, default `teamgate.toml`)
//! - environment variables prefixed `TEAMGATE`, nested with `__`
//!   (e.g. `TEAMGATE__SERVER__PORT=9090`)
//! - command line flags

use crate::cli::Args;
use anyhow::{Context, Result};
use config::{Config as ConfigBuilder, Environment, File, FileFormat};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::net::{IpAddr, SocketAddr};
use std::path::{Path, PathBuf};
use teamgate_identity_core::Team;
use tracing::{debug, info};

pub const ENV_PREFIX: &str = "TEAMGATE";

/// Longest accepted session lifetime: ten years.
pub const MAX_COOKIE_AGE_SECS: i64 = 10 * 365 * 86_400;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub server: ServerConfig,
    pub auth: AuthConfig,
    pub logging: LoggingConfig,
    /// Teams and the providers each of them accepts logins through.
    pub teams: Vec<Team>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Host to bind to (default: 127.0.0.1)
    pub host: IpAddr,

    /// Port to bind to (default: 8080)
    pub port: u16,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AuthConfig {
    /// PEM encoded RSA private key used to sign session tokens
    pub signing_key_path: Option<PathBuf>,

    /// Session and OAuth state lifetime in seconds (default: 86400 = 24 hours)
    pub cookie_age_seconds: i64,

    /// URL this service is reachable at; OAuth callbacks are registered under it
    pub external_url: String,

    /// Team that authenticated callers without a team claim fall back to
    pub default_team: String,

    pub allow_default_team_fallback: bool,

    /// Let members of admin teams act on every team
    pub admin_override: bool,

    /// Static credentials accepted in addition to session tokens
    pub basic_auth: Option<BasicAuthConfig>,

    /// Treat every request as authenticated
    pub no_auth: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BasicAuthConfig {
    pub username: String,
    pub password: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error) or a full filter directive
    pub level: String,

    /// Log format (pretty, json, compact)
    pub format: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: IpAddr::from([127, 0, 0, 1]),
            port: 8080,
        }
    }
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            signing_key_path: None,
            cookie_age_seconds: 86_400,
            external_url: "http://127.0.0.1:8080".to_string(),
            default_team: "main".to_string(),
            allow_default_team_fallback: true,
            admin_override: false,
            basic_auth: None,
            no_auth: false,
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: "pretty".to_string(),
        }
    }
}

impl Config {
    /// Load configuration from `path` (if it exists) and the environment.
    pub fn load(path: &Path) -> Result<Self> {
        Self::load_with_env(path, None)
    }

    /// As [`Config::load`], reading environment variables from `env` instead
    /// of the process environment when given.
    pub fn load_with_env(path: &Path, env: Option<HashMap<String, String>>) -> Result<Self> {
        let mut builder = ConfigBuilder::builder();

        if path.exists() {
            info!(path = %path.display(), "loading configuration file");
            builder = builder.add_source(File::from(path).format(FileFormat::Toml));
        } else {
            debug!(path = %path.display(), "no configuration file, using defaults");
        }

        builder = builder.add_source(
            Environment::with_prefix(ENV_PREFIX)
                .separator("__")
                .try_parsing(true)
                .source(env),
        );

        let config = builder.build().context("Failed to build configuration")?;

        let settings: Config = config
            .try_deserialize()
            .context("Failed to deserialize configuration")?;

        Ok(settings)
    }

    /// Command line flags win over every other source.
    pub fn apply_args(&mut self, args: &Args) {
        if let Some(host) = args.host {
            self.server.host = host;
        }
        if let Some(port) = args.port {
            self.server.port = port;
        }
    }

    /// Validate configuration values
    pub fn validate(&self) -> Result<()> {
        if self.server.port == 0 {
            anyhow::bail!("Server port cannot be 0");
        }

        if self.auth.signing_key_path.is_none() {
            anyhow::bail!("auth.signing_key_path must be set");
        }

        let cookie_age = self.auth.cookie_age_seconds;
        if cookie_age <= 0 || cookie_age > MAX_COOKIE_AGE_SECS {
            anyhow::bail!(
                "auth.cookie_age_seconds must be between 1 and {}, got {}",
                MAX_COOKIE_AGE_SECS,
                cookie_age
            );
        }

        if self.auth.default_team.is_empty() {
            anyhow::bail!("auth.default_team cannot be empty");
        }

        if !self.auth.external_url.starts_with("http://")
            && !self.auth.external_url.starts_with("https://")
        {
            anyhow::bail!(
                "auth.external_url '{}' must be an http(s) URL",
                self.auth.external_url
            );
        }

        if let Some(basic) = &self.auth.basic_auth {
            if basic.username.is_empty() || basic.password.is_empty() {
                anyhow::bail!("auth.basic_auth requires both username and password");
            }
        }

        let valid_levels = ["trace", "debug", "info", "warn", "error"];
        let level_lower = self.logging.level.to_lowercase();
        if !self.is_filter_directive() && !valid_levels.contains(&level_lower.as_str()) {
            anyhow::bail!(
                "Invalid log level '{}'. Must be one of: {:?}",
                self.logging.level,
                valid_levels
            );
        }

        let valid_formats = ["pretty", "json", "compact"];
        let format_lower = self.logging.format.to_lowercase();
        if !valid_formats.contains(&format_lower.as_str()) {
            anyhow::bail!(
                "Invalid log format '{}'. Must be one of: {:?}",
                self.logging.format,
                valid_formats
            );
        }

        let mut seen = HashSet::new();
        for team in &self.teams {
            if team.name.is_empty() {
                anyhow::bail!("Team name cannot be empty");
            }
            if !seen.insert(team.name.as_str()) {
                anyhow::bail!("Team '{}' is configured more than once", team.name);
            }
        }

        Ok(())
    }

    pub fn socket_addr(&self) -> SocketAddr {
        SocketAddr::from((self.server.host, self.server.port))
    }

    fn is_filter_directive(&self) -> bool {
        self.logging.level.contains('=') || self.logging.level.contains(',')
    }

    /// Get the log filter string for tracing
    pub fn log_filter(&self) -> String {
        if self.is_filter_directive() {
            self.logging.level.clone()
        } else {
            format!(
                "teamgate_server={level},teamgate_oauth2={level},teamgate_auth_core={level},tower_http={level},{level}",
                level = self.logging.level
            )
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn valid() -> Config {
        let mut config = Config::default();
        config.auth.signing_key_path = Some(PathBuf::from("/etc/teamgate/signing_key.pem"));
        config
    }

    fn write_toml(contents: &str) -> tempfile::NamedTempFile {
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        file.write_all(contents.as_bytes()).unwrap();
        file
    }

    #[test]
    fn test_default_config_needs_signing_key() {
        assert!(Config::default().validate().is_err());
        assert!(valid().validate().is_ok());
    }

    #[test]
    fn test_invalid_config() {
        let mut config = valid();
        config.server.port = 0;
        assert!(config.validate().is_err());

        let mut config = valid();
        config.auth.cookie_age_seconds = 0;
        assert!(config.validate().is_err());

        let mut config = valid();
        config.logging.format = "xml".to_string();
        assert!(config.validate().is_err());

        let mut config = valid();
        config.auth.cookie_age_seconds = MAX_COOKIE_AGE_SECS;
        assert!(config.validate().is_ok());

        for cookie_age_seconds in [MAX_COOKIE_AGE_SECS + 1, 10_000_000_000_000, i64::MAX] {
            let mut config = valid();
            config.auth.cookie_age_seconds = cookie_age_seconds;
            let err = config.validate().unwrap_err().to_string();
            assert!(err.contains("cookie_age_seconds"), "{cookie_age_seconds}: {err}");
        }

        let mut config = valid();
        config.logging.format = "xml".to_string();
        assert!(config.validate().is_err());

        let mut config = valid();
        config.logging.level = "loud".to_string();
        assert!(config.validate().is_err());

        let mut config = valid();
        config.logging.level = "teamgate_server=debug,info".to_string();
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_duplicate_teams_are_rejected() {
        let mut config = valid();
        let team = Team {
            name: "main".to_string(),
            id: 1,
            admin: true,
            providers: Default::default(),
        };
        config.teams = vec![team.clone(), team];

        let err = config.validate().unwrap_err().to_string();
        assert!(err.contains("more than once"));
    }

    #[test]
    fn test_missing_file_uses_defaults() {
        let config =
            Config::load_with_env(Path::new("/nonexistent/teamgate.toml"), Some(HashMap::new()))
                .unwrap();
        assert_eq!(config.server.port, 8080);
        assert_eq!(config.auth.default_team, "main");
        assert!(config.auth.allow_default_team_fallback);
        assert!(!config.auth.admin_override);
        assert!(config.teams.is_empty());
    }

    #[test]
    fn test_file_with_teams_and_providers() {
        let file = write_toml(
            r#"
            [server]
            port = 9000

            [auth]
            signing_key_path = "/keys/session.pem"
            external_url = "https://ci.example.com"

            [[teams]]
            name = "main"
            id = 1
            admin = true

            [teams.providers.github]
            client_id = "gh-id"
            client_secret = "gh-secret"
            organizations = ["some-org"]

            [[teams]]
            name = "some-team"
            id = 2
            "#,
        );

        let config = Config::load_with_env(file.path(), Some(HashMap::new())).unwrap();
        assert_eq!(config.server.port, 9000);
        assert_eq!(config.auth.external_url, "https://ci.example.com");
        assert_eq!(config.teams.len(), 2);

        let main = &config.teams[0];
        assert!(main.admin);
        assert_eq!(
            main.providers["github"]["organizations"],
            serde_json::json!(["some-org"])
        );
        assert!(!config.teams[1].admin);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_environment_overrides_file() {
        let file = write_toml(
            r#"
            [server]
            port = 9000

            [auth]
            default_team = "main"
            "#,
        );

        let env = HashMap::from([
            ("TEAMGATE__SERVER__PORT".to_string(), "9100".to_string()),
            ("TEAMGATE__AUTH__DEFAULT_TEAM".to_string(), "ops".to_string()),
        ]);

        let config = Config::load_with_env(file.path(), Some(env)).unwrap();
        assert_eq!(config.server.port, 9100);
        assert_eq!(config.auth.default_team, "ops");
    }

    #[test]
    fn test_args_override_everything() {
        let mut config = valid();
        let args = Args {
            config: PathBuf::from("teamgate.toml"),
            host: Some("0.0.0.0".parse().unwrap()),
            port: Some(9443),
            check: false,
        };
        config.apply_args(&args);
        assert_eq!(config.socket_addr().to_string(), "0.0.0.0:9443");
    }

    #[test]
    fn test_log_filter() {
        let mut config = valid();
        assert!(config.log_filter().starts_with("teamgate_server=info,"));

        config.logging.level = "warn,tower_http=debug".to_string();
        assert_eq!(config.log_filter(), "warn,tower_http=debug");
    }
}
