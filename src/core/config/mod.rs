use anyhow::{anyhow, Context};

#[derive(Clone, Debug)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub database: DatabaseConfig,
}

#[derive(Clone, Debug)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub base_url: String,
}

#[derive(Clone, Debug)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,
    pub run_migrations: bool,
}

impl AppConfig {
    pub fn from_env() -> Result<Self, anyhow::Error> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Builds the config from any key lookup. Unset keys fall back to their
    /// defaults; set but unparsable values are errors.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, anyhow::Error>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get_str = |key: &str, default: &str| {
            lookup(key)
                .filter(|v| !v.trim().is_empty())
                .unwrap_or_else(|| default.to_string())
        };

        let host = get_str("SERVER_HOST", "0.0.0.0");
        let port: u16 = get_str("SERVER_PORT", "8080")
            .parse()
            .context("SERVER_PORT must be a valid port number")?;
        let base_url = lookup("SERVER_BASE_URL")
            .filter(|v| !v.trim().is_empty())
            .unwrap_or_else(|| format!("http://localhost:{port}"));

        let url = lookup("DATABASE_URL")
            .filter(|v| !v.trim().is_empty())
            .ok_or_else(|| anyhow!("DATABASE_URL must be set"))?;
        let max_connections: u32 = get_str("DATABASE_MAX_CONNECTIONS", "10")
            .parse()
            .context("DATABASE_MAX_CONNECTIONS must be a positive integer")?;
        if max_connections == 0 {
            return Err(anyhow!("DATABASE_MAX_CONNECTIONS must be a positive integer"));
        }
        let run_migrations = match get_str("RUN_MIGRATIONS", "true").to_lowercase().as_str() {
            "true" | "1" | "yes" => true,
            "false" | "0" | "no" => false,
            other => return Err(anyhow!("RUN_MIGRATIONS has invalid value '{other}'")),
        };

        Ok(AppConfig {
            server: ServerConfig {
                host,
                port,
                base_url,
            },
            database: DatabaseConfig {
                url,
                max_connections,
                run_migrations,
            },
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key: &str| vars.get(key).cloned()
    }

    #[test]
    fn test_defaults() {
        let config =
            AppConfig::from_lookup(lookup(&[("DATABASE_URL", "postgres://localhost/social")]))
                .unwrap();
        assert_eq!(config.server.host, "0.0.0.0");
        assert_eq!(config.server.port, 8080);
        assert_eq!(config.server.base_url, "http://localhost:8080");
        assert_eq!(config.database.max_connections, 10);
        assert!(config.database.run_migrations);
    }

    #[test]
    fn test_overrides() {
        let config = AppConfig::from_lookup(lookup(&[
            ("DATABASE_URL", "postgres://db/social"),
            ("SERVER_HOST", "127.0.0.1"),
            ("SERVER_PORT", "9000"),
            ("DATABASE_MAX_CONNECTIONS", "4"),
            ("RUN_MIGRATIONS", "false"),
        ]))
        .unwrap();
        assert_eq!(config.server.host, "127.0.0.1");
        assert_eq!(config.server.port, 9000);
        assert_eq!(config.server.base_url, "http://localhost:9000");
        assert_eq!(config.database.max_connections, 4);
        assert!(!config.database.run_migrations);
    }

    #[test]
    fn test_missing_database_url() {
        assert!(AppConfig::from_lookup(lookup(&[])).is_err());
    }

    #[test]
    fn test_invalid_numbers_rejected() {
        for (key, value) in [
            ("SERVER_PORT", "eighty"),
            ("SERVER_PORT", "70000"),
            ("DATABASE_MAX_CONNECTIONS", "0"),
            ("RUN_MIGRATIONS", "maybe"),
        ] {
            let result = AppConfig::from_lookup(lookup(&[
                ("DATABASE_URL", "postgres://db/social"),
                (key, value),
            ]));
            assert!(result.is_err(), "{key}={value} should be rejected");
        }
    }
}
