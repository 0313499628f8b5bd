use std::net::SocketAddr;
use std::path::PathBuf;

use anyhow::{Context, Result, bail};
use tracing::{info, warn};

use gridhold_api::Environment;

/// Placeholder JWT secrets that MUST NOT be used outside development.
const PLACEHOLDER_SECRETS: &[&str] = &["change-me-to-a-random-string", "dev-secret-change-me"];

const DEV_SECRET: &str = "dev-secret-change-me";

pub struct Config {
    pub jwt_secret: String,
    pub db_path: PathBuf,
    pub addr: SocketAddr,
    pub environment: Environment,
    /// Usernames promoted to `admin` at startup.
    pub admins: Vec<String>,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let environment = lookup("GRIDHOLD_ENV")
            .unwrap_or_else(|| "development".into())
            .parse::<Environment>()
            .map_err(anyhow::Error::msg)
            .context("GRIDHOLD_ENV")?;

        let jwt_secret = match lookup("GRIDHOLD_JWT_SECRET").filter(|s| !s.is_empty()) {
            Some(secret) => secret,
            None if environment.is_development() => {
                warn!("GRIDHOLD_JWT_SECRET not set, using the development placeholder");
                DEV_SECRET.to_string()
            }
            None => bail!("GRIDHOLD_JWT_SECRET must be set in production"),
        };
        if !environment.is_development() && PLACEHOLDER_SECRETS.contains(&jwt_secret.as_str()) {
            bail!("GRIDHOLD_JWT_SECRET is still a placeholder");
        }

        let db_path: PathBuf = lookup("GRIDHOLD_DB_PATH")
            .unwrap_or_else(|| "data/app.db".into())
            .into();
        let host = lookup("GRIDHOLD_HOST").unwrap_or_else(|| "0.0.0.0".into());
        let port: u16 = lookup("GRIDHOLD_PORT")
            .unwrap_or_else(|| "3000".into())
            .parse()
            .context("GRIDHOLD_PORT")?;
        let addr: SocketAddr = format!("{}:{}", host, port)
            .parse()
            .with_context(|| format!("invalid listen address {}:{}", host, port))?;

        let admins: Vec<String> = lookup("GRIDHOLD_ADMINS")
            .unwrap_or_default()
            .split(',')
            .map(str::trim)
            .filter(|name| !name.is_empty())
            .map(str::to_string)
            .collect();

        info!("Config loaded: env={}, db={}, addr={}", environment, db_path.display(), addr);

        Ok(Self {
            jwt_secret,
            db_path,
            addr,
            environment,
            admins,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn load(vars: &[(&str, &str)]) -> Result<Config> {
        let map: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Config::from_lookup(|key| map.get(key).cloned())
    }

    #[test]
    fn defaults_are_development() {
        let config = load(&[]).unwrap();
        assert_eq!(config.environment, Environment::Development);
        assert_eq!(config.jwt_secret, DEV_SECRET);
        assert_eq!(config.db_path, PathBuf::from("data/app.db"));
        assert_eq!(config.addr.port(), 3000);
        assert!(config.admins.is_empty());
    }

    #[test]
    fn admin_list_is_comma_separated() {
        let config = load(&[("GRIDHOLD_ADMINS", " alice, ,bob ")]).unwrap();
        assert_eq!(config.admins, vec!["alice", "bob"]);
    }

    #[test]
    fn production_requires_a_real_secret() {
        assert!(load(&[("GRIDHOLD_ENV", "production")]).is_err());
        assert!(
            load(&[
                ("GRIDHOLD_ENV", "production"),
                ("GRIDHOLD_JWT_SECRET", "dev-secret-change-me"),
            ])
            .is_err()
        );

        let config = load(&[
            ("GRIDHOLD_ENV", "production"),
            ("GRIDHOLD_JWT_SECRET", "s3cr3t-value"),
            ("GRIDHOLD_PORT", "8080"),
        ])
        .unwrap();
        assert_eq!(config.environment, Environment::Production);
        assert_eq!(config.addr.port(), 8080);
    }

    #[test]
    fn bad_values_are_rejected() {
        assert!(load(&[("GRIDHOLD_PORT", "http")]).is_err());
        assert!(load(&[("GRIDHOLD_ENV", "staging")]).is_err());
    }
}
