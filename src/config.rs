use chrono::NaiveTime;
use percent_encoding::{AsciiSet, NON_ALPHANUMERIC, utf8_percent_encode};
use std::collections::HashMap;
use std::path::PathBuf;
use std::time::Duration;

use crate::services::pipeline::DEFAULT_CHANNEL_CAPACITY;
use crate::utils::error::{EtlError, EtlResult};

const USERINFO: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'.')
    .remove(b'_')
    .remove(b'~');

const DEFAULT_RUN_AT: &str = "04:00";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DatabaseConfig {
    pub user: String,
    pub password: String,
    pub host: String,
    pub name: String,
}

impl DatabaseConfig {
    // URL form of the `user:pass@tcp(host)/name` DSN
    pub fn connection_url(&self) -> String {
        format!(
            "mysql://{}:{}@{}/{}",
            utf8_percent_encode(&self.user, USERINFO),
            utf8_percent_encode(&self.password, USERINFO),
            self.host,
            self.name
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Schedule {
    // local wall-clock time
    Daily(NaiveTime),
    Every(Duration),
}

#[derive(Debug, Clone)]
pub struct Config {
    pub database: DatabaseConfig,
    pub database_url_override: Option<String>,
    pub log_path: PathBuf,
    pub schedule: Schedule,
    pub channel_capacity: usize,
    pub remove_source: bool,
    pub run_on_start: bool,
}

impl Config {
    pub fn from_env() -> EtlResult<Self> {
        Self::from_vars(std::env::vars().collect())
    }

    pub fn from_vars(vars: HashMap<String, String>) -> EtlResult<Self> {
        let get = |key: &str| vars.get(key).filter(|v| !v.is_empty()).cloned();
        let required = |key: &str| {
            get(key).ok_or_else(|| EtlError::Config(format!("{} not set", key)))
        };

        let database_url_override = get("DATABASE_URL");

        let database = match &database_url_override {
            Some(_) => DatabaseConfig {
                user: get("DB_USER").unwrap_or_default(),
                password: get("DB_PASS").unwrap_or_default(),
                host: get("DB_HOST").unwrap_or_default(),
                name: get("DB_NAME").unwrap_or_default(),
            },
            None => DatabaseConfig {
                user: required("DB_USER")?,
                password: get("DB_PASS").unwrap_or_default(),
                host: required("DB_HOST")?,
                name: required("DB_NAME")?,
            },
        };

        let log_path = PathBuf::from(required("LOG_PATH")?);

        let schedule = match get("ETL_INTERVAL_SECS") {
            Some(secs) => {
                let secs: u64 = parse_var("ETL_INTERVAL_SECS", &secs)?;
                if secs == 0 {
                    return Err(EtlError::Config(
                        "ETL_INTERVAL_SECS must be greater than zero".to_string(),
                    ));
                }
                Schedule::Every(Duration::from_secs(secs))
            }
            None => {
                let run_at = get("ETL_RUN_AT").unwrap_or_else(|| DEFAULT_RUN_AT.to_string());
                let time = NaiveTime::parse_from_str(&run_at, "%H:%M").map_err(|e| {
                    EtlError::Config(format!("Invalid ETL_RUN_AT {:?}: {}", run_at, e))
                })?;
                Schedule::Daily(time)
            }
        };

        let channel_capacity = match get("ETL_CHANNEL_CAPACITY") {
            Some(v) => parse_var("ETL_CHANNEL_CAPACITY", &v)?,
            None => DEFAULT_CHANNEL_CAPACITY,
        };
        if channel_capacity == 0 {
            return Err(EtlError::Config(
                "ETL_CHANNEL_CAPACITY must be greater than zero".to_string(),
            ));
        }

        let remove_source = parse_flag("ETL_REMOVE_SOURCE", get("ETL_REMOVE_SOURCE"))?;
        let run_on_start = parse_flag("ETL_RUN_ON_START", get("ETL_RUN_ON_START"))?;

        Ok(Self {
            database,
            database_url_override,
            log_path,
            schedule,
            channel_capacity,
            remove_source,
            run_on_start,
        })
    }

    pub fn database_url(&self) -> String {
        self.database_url_override
            .clone()
            .unwrap_or_else(|| self.database.connection_url())
    }
}

fn parse_var<T: std::str::FromStr>(key: &str, value: &str) -> EtlResult<T>
where
    T::Err: std::fmt::Display,
{
    value
        .parse()
        .map_err(|e| EtlError::Config(format!("Invalid {} {:?}: {}", key, value, e)))
}

fn parse_flag(key: &str, value: Option<String>) -> EtlResult<bool> {
    match value.as_deref().map(str::to_ascii_lowercase).as_deref() {
        None => Ok(false),
        Some("1" | "true" | "yes" | "on") => Ok(true),
        Some("0" | "false" | "no" | "off") => Ok(false),
        Some(other) => Err(EtlError::Config(format!(
            "Invalid {} {:?}: expected true or false",
            key, other
        ))),
    }
}
