use crate::error::ReportError;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

pub const MAX_RETENTION_DAYS: u32 = 3650;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum StorageMode {
    S3,
    Fs,
}

impl StorageMode {
    pub fn parse(s: &str) -> Self {
        match s.to_lowercase().as_str() {
            "fs" | "file" => StorageMode::Fs,
            _ => StorageMode::S3,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum NotifyMode {
    Ses,
    Stdout,
}

impl NotifyMode {
    pub fn parse(s: &str) -> Self {
        match s.to_lowercase().as_str() {
            "stdout" => NotifyMode::Stdout,
            _ => NotifyMode::Ses,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LogFormat {
    Text,
    Json,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub backoff_step: Duration,
    pub call_timeout: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 4,
            backoff_step: Duration::from_millis(300),
            call_timeout: Duration::from_secs(30),
        }
    }
}

#[derive(Clone, Debug)]
pub struct Config {
    pub storage_mode: StorageMode,
    pub bucket: Option<String>,
    pub storage_dir: PathBuf,
    pub notify_mode: NotifyMode,
    pub email_from: Option<String>,
    pub email_to: Option<String>,
    /// SES endpoint region when it differs from the ambient AWS region.
    pub ses_region: Option<String>,
    pub mock: bool,
    pub mock_dir: PathBuf,
    pub retention_days: u32,
    pub link_ttl: Duration,
    pub retry: RetryPolicy,
    pub resolve_concurrency: usize,
    pub log_format: LogFormat,
}

impl Config {
    pub fn from_env() -> Result<Self, ReportError> {
        Self::from_lookup(|k| std::env::var(k).ok())
    }

    /// Builds the config from any key lookup; `from_env` passes the process
    /// environment.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ReportError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let or = |key: &str, default: &str| lookup(key).unwrap_or_else(|| default.to_string());

        let storage_mode = StorageMode::parse(&or("STORAGE_MODE", "s3"));
        let notify_mode = NotifyMode::parse(&or("NOTIFY_MODE", "ses"));
        let bucket = lookup("REPORT_S3_BUCKET").filter(|s| !s.is_empty());
        let email_from = lookup("EMAIL_FROM").filter(|s| !s.is_empty());
        let email_to = lookup("EMAIL_TO").filter(|s| !s.is_empty());

        if storage_mode == StorageMode::S3 && bucket.is_none() {
            return Err(ReportError::Config(
                "REPORT_S3_BUCKET is required when STORAGE_MODE=s3".into(),
            ));
        }
        if notify_mode == NotifyMode::Ses && (email_from.is_none() || email_to.is_none()) {
            return Err(ReportError::Config(
                "EMAIL_FROM and EMAIL_TO are required when NOTIFY_MODE=ses".into(),
            ));
        }

        let max_attempts: u32 = parse_num(&or("FEED_MAX_ATTEMPTS", "4"), "FEED_MAX_ATTEMPTS")?;
        let resolve_concurrency: usize =
            parse_num(&or("RESOLVE_CONCURRENCY", "2"), "RESOLVE_CONCURRENCY")?;
        if max_attempts == 0 || resolve_concurrency == 0 {
            return Err(ReportError::Config(
                "FEED_MAX_ATTEMPTS and RESOLVE_CONCURRENCY must be at least 1".into(),
            ));
        }

        let retention_days: u32 = parse_num(&or("RETENTION_DAYS", "90"), "RETENTION_DAYS")?;
        if retention_days > MAX_RETENTION_DAYS {
            return Err(ReportError::Config(format!(
                "RETENTION_DAYS must be at most {MAX_RETENTION_DAYS}, got {retention_days}"
            )));
        }

        let link_ttl_hours: u64 = parse_num(&or("LINK_TTL_HOURS", "24"), "LINK_TTL_HOURS")?;

        Ok(Config {
            storage_mode,
            bucket,
            storage_dir: PathBuf::from(or("STORAGE_DIR", "./report-store")),
            notify_mode,
            email_from,
            email_to,
            ses_region: lookup("SES_REGION").filter(|s| !s.is_empty()),
            mock: lookup("MOCK_MODE").is_some(),
            mock_dir: PathBuf::from(or("MOCK_DIR", "mocks")),
            retention_days,
            link_ttl: Duration::from_secs(link_ttl_hours * 3600),
            retry: RetryPolicy {
                max_attempts,
                backoff_step: Duration::from_millis(parse_num(
                    &or("FEED_BACKOFF_MS", "300"),
                    "FEED_BACKOFF_MS",
                )?),
                call_timeout: Duration::from_secs(parse_num(
                    &or("FEED_TIMEOUT_SECS", "30"),
                    "FEED_TIMEOUT_SECS",
                )?),
            },
            resolve_concurrency,
            log_format: match or("LOG_FORMAT", "text").to_lowercase().as_str() {
                "json" => LogFormat::Json,
                _ => LogFormat::Text,
            },
        })
    }
}

fn parse_num<T: FromStr>(raw: &str, key: &str) -> Result<T, ReportError> {
    raw.trim()
        .parse::<T>()
        .map_err(|_| ReportError::Config(format!("{key} is not a valid number: {raw:?}")))
}
