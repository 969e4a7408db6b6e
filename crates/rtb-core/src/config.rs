use std::{env, time::Duration};

use crate::{errors::Error, scheduler::CronExpr, Result};

const DEFAULT_DB_NAME: &str = "read_that_bot";
const DEFAULT_REMINDER_CRON: &str = "0 17 * * *";

/// Typed configuration, read from the environment (and `.env` if present).
#[derive(Clone, Debug)]
pub struct Config {
    pub telegram_bot_token: String,
    /// Long-poll timeout handed to the Telegram update listener.
    pub poll_timeout: Duration,
    pub database: DatabaseConfig,
    /// Cron expression (UTC) for the reminder broadcast; `None` disables it.
    pub reminder_cron: Option<String>,
}

/// Connection parameters for the relational store.
#[derive(Clone, Debug)]
pub struct DatabaseConfig {
    pub host: String,
    pub port: u16,
    pub user: String,
    pub password: String,
    pub name: String,

    pub max_connections: u32,
    pub min_connections: u32,
    /// How long to wait for a free pooled connection.
    pub acquire_timeout: Duration,
}

impl Config {
    /// Load from the process environment, after merging `.env` (existing
    /// variables are never overridden).
    pub fn load() -> Result<Self> {
        env_file_outcome(dotenvy::dotenv().map(|_| ()))?;
        Self::from_lookup(|key| env::var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let get = |key: &str| lookup(key).and_then(non_empty);
        let required = |key: &str| {
            get(key).ok_or_else(|| {
                Error::Config(format!("{key} environment variable is required"))
            })
        };

        let telegram_bot_token = required("TG_BOT_API_KEY")?;
        let user = required("TG_BOT_DB_USER")?;
        let password = required("TG_BOT_DB_PASSWORD")?;
        let host = required("TG_BOT_DB_HOST")?;
        let port_raw = required("TG_BOT_DB_PORT")?;
        let port: u16 = port_raw.trim().parse().map_err(|_| {
            Error::Config(format!("TG_BOT_DB_PORT must be a port number, got {port_raw:?}"))
        })?;
        let name = get("TG_BOT_DB_NAME").unwrap_or_else(|| DEFAULT_DB_NAME.to_string());

        let max_connections: u32 =
            parse_num("TG_BOT_DB_MAX_CONNECTIONS", get("TG_BOT_DB_MAX_CONNECTIONS"))?
                .unwrap_or(10);
        let min_connections: u32 =
            parse_num("TG_BOT_DB_MIN_CONNECTIONS", get("TG_BOT_DB_MIN_CONNECTIONS"))?
                .unwrap_or(1);
        if min_connections > max_connections {
            return Err(Error::Config(format!(
                "TG_BOT_DB_MIN_CONNECTIONS ({min_connections}) exceeds TG_BOT_DB_MAX_CONNECTIONS ({max_connections})"
            )));
        }
        let acquire_timeout = Duration::from_secs(
            parse_num(
                "TG_BOT_DB_ACQUIRE_TIMEOUT_SECS",
                get("TG_BOT_DB_ACQUIRE_TIMEOUT_SECS"),
            )?
            .unwrap_or(30),
        );

        let poll_timeout = Duration::from_secs(
            parse_num("TG_BOT_POLL_TIMEOUT_SECS", get("TG_BOT_POLL_TIMEOUT_SECS"))?.unwrap_or(60),
        );

        let reminder_cron = match get("TG_BOT_REMINDER_CRON") {
            Some(v) if v.trim().eq_ignore_ascii_case("off") => None,
            Some(v) => Some(v.trim().to_string()),
            None => Some(DEFAULT_REMINDER_CRON.to_string()),
        };
        if let Some(expr) = &reminder_cron {
            CronExpr::parse(expr)
                .map_err(|e| Error::Config(format!("TG_BOT_REMINDER_CRON: {e}")))?;
        }

        Ok(Self {
            telegram_bot_token,
            poll_timeout,
            database: DatabaseConfig {
                host,
                port,
                user,
                password,
                name,
                max_connections,
                min_connections,
                acquire_timeout,
            },
            reminder_cron,
        })
    }
}

fn parse_num<T: std::str::FromStr>(key: &str, raw: Option<String>) -> Result<Option<T>> {
    let Some(raw) = raw else {
        return Ok(None);
    };
    raw.trim()
        .parse::<T>()
        .map(Some)
        .map_err(|_| Error::Config(format!("{key} must be a number, got {raw:?}")))
}

fn non_empty(s: String) -> Option<String> {
    if s.trim().is_empty() {
        None
    } else {
        Some(s)
    }
}

/// A missing `.env` is fine; an unreadable or malformed one is not.
fn env_file_outcome(res: std::result::Result<(), dotenvy::Error>) -> Result<()> {
    match res {
        Ok(()) => Ok(()),
        Err(e) if e.not_found() => Ok(()),
        Err(e) => Err(Error::Config(format!(".env: {e}"))),
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn base_env() -> HashMap<&'static str, &'static str> {
        HashMap::from([
            ("TG_BOT_API_KEY", "123:abc"),
            ("TG_BOT_DB_USER", "bot"),
            ("TG_BOT_DB_PASSWORD", "secret"),
            ("TG_BOT_DB_HOST", "localhost"),
            ("TG_BOT_DB_PORT", "5432"),
        ])
    }

    fn load(env: &HashMap<&'static str, &'static str>) -> Result<Config> {
        Config::from_lookup(|k| env.get(k).map(|v| v.to_string()))
    }

    #[test]
    fn loads_required_values_and_defaults() {
        let cfg = load(&base_env()).unwrap();
        assert_eq!(cfg.telegram_bot_token, "123:abc");
        assert_eq!(cfg.database.port, 5432);
        assert_eq!(cfg.database.name, "read_that_bot");
        assert_eq!(cfg.database.max_connections, 10);
        assert_eq!(cfg.poll_timeout, Duration::from_secs(60));
        assert_eq!(cfg.reminder_cron.as_deref(), Some("0 17 * * *"));
    }

    #[test]
    fn every_required_variable_is_fatal_when_missing() {
        for key in [
            "TG_BOT_API_KEY",
            "TG_BOT_DB_USER",
            "TG_BOT_DB_PASSWORD",
            "TG_BOT_DB_HOST",
            "TG_BOT_DB_PORT",
        ] {
            let mut env = base_env();
            env.insert(key, "  ");
            let err = load(&env).unwrap_err();
            assert!(err.to_string().contains(key), "{key}: {err}");
        }
    }

    #[test]
    fn rejects_non_numeric_port() {
        let mut env = base_env();
        env.insert("TG_BOT_DB_PORT", "pg");
        assert!(matches!(load(&env), Err(Error::Config(_))));
    }

    #[test]
    fn reminder_schedule_can_be_disabled_or_overridden() {
        let mut env = base_env();
        env.insert("TG_BOT_REMINDER_CRON", "off");
        assert_eq!(load(&env).unwrap().reminder_cron, None);

        env.insert("TG_BOT_REMINDER_CRON", "30 8 * * 1-5");
        assert_eq!(
            load(&env).unwrap().reminder_cron.as_deref(),
            Some("30 8 * * 1-5")
        );

        env.insert("TG_BOT_REMINDER_CRON", "every day");
        assert!(matches!(load(&env), Err(Error::Config(_))));
    }

    #[test]
    fn missing_env_file_is_ignored_but_malformed_one_fails() {
        let missing = dotenvy::from_path("/nonexistent/rtb/.env");
        assert!(env_file_outcome(missing).is_ok());

        let path = std::env::temp_dir().join(format!("rtb-malformed-{}.env", std::process::id()));
        std::fs::write(&path, "RTB_TEST_ONLY_KEY='unterminated\n").unwrap();
        let malformed = dotenvy::from_path(&path);
        std::fs::remove_file(&path).unwrap();

        let err = env_file_outcome(malformed).unwrap_err();
        assert!(matches!(err, Error::Config(_)));
    }
}
