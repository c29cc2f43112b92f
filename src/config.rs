//! Startup configuration read from the environment

use crate::delivery::{SendGridConfig, DEFAULT_SENDER};
use crate::knowledge::{OpenAiConfig, DEFAULT_BASE_URL, DEFAULT_MODEL};
use crate::passcode::{CODE_DIGITS, CODE_TTL_SECS};
use crate::runtime::RuntimeSettings;
use crate::state_machine::Policy;
use std::ops::RangeInclusive;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

/// Accepted passcode lifetimes, in seconds
const OTP_TTL_RANGE: RangeInclusive<u64> = 1..=86_400;

/// Accepted session retention, in hours
const SESSION_TTL_RANGE: RangeInclusive<i64> = 1..=87_600;

/// Typed process configuration
#[derive(Debug, Clone)]
pub struct Config {
    pub db_path: PathBuf,
    pub port: u16,
    pub catalog_path: PathBuf,
    pub search_k: usize,
    pub otp_ttl_secs: u64,
    pub otp_max_attempts: u32,
    pub lookup_timeout_secs: u64,
    pub delivery_timeout_secs: u64,
    pub session_ttl_hours: i64,
    pub accept_unsolicited_email: bool,
    /// `None` allows any origin
    pub cors_origin: Option<String>,
    pub openai: Option<OpenAiConfig>,
    pub sendgrid: Option<SendGridConfig>,
}

impl Config {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from an arbitrary variable source
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let var = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

        let db_path = var("CONCIERGE_DB_PATH").map_or_else(
            || {
                let home = var("HOME").unwrap_or_else(|| "/tmp".to_string());
                PathBuf::from(format!("{home}/.monument-concierge/concierge.db"))
            },
            PathBuf::from,
        );

        let openai = var("OPENAI_API_KEY").map(|api_key| OpenAiConfig {
            api_key,
            base_url: var("OPENAI_BASE_URL").unwrap_or_else(|| DEFAULT_BASE_URL.to_string()),
            model: var("OPENAI_MODEL").unwrap_or_else(|| DEFAULT_MODEL.to_string()),
        });

        let sendgrid = var("SENDGRID_API_KEY").map(|api_key| SendGridConfig {
            api_key,
            sender: var("EMAIL_SENDER").unwrap_or_else(|| DEFAULT_SENDER.to_string()),
        });

        Self {
            db_path,
            port: parse_or("CONCIERGE_PORT", var("CONCIERGE_PORT"), 8000),
            catalog_path: var("CONCIERGE_CATALOG_PATH")
                .map_or_else(|| PathBuf::from("data/monuments.json"), PathBuf::from),
            search_k: parse_or::<usize>("CONCIERGE_SEARCH_K", var("CONCIERGE_SEARCH_K"), 2).max(1),
            otp_ttl_secs: parse_within(
                "CONCIERGE_OTP_TTL_SECS",
                var("CONCIERGE_OTP_TTL_SECS"),
                CODE_TTL_SECS,
                &OTP_TTL_RANGE,
            ),
            otp_max_attempts: parse_or::<u32>(
                "CONCIERGE_OTP_MAX_ATTEMPTS",
                var("CONCIERGE_OTP_MAX_ATTEMPTS"),
                3,
            )
            .max(1),
            lookup_timeout_secs: parse_or(
                "CONCIERGE_LOOKUP_TIMEOUT_SECS",
                var("CONCIERGE_LOOKUP_TIMEOUT_SECS"),
                10,
            ),
            delivery_timeout_secs: parse_or(
                "CONCIERGE_DELIVERY_TIMEOUT_SECS",
                var("CONCIERGE_DELIVERY_TIMEOUT_SECS"),
                30,
            ),
            session_ttl_hours: parse_within(
                "CONCIERGE_SESSION_TTL_HOURS",
                var("CONCIERGE_SESSION_TTL_HOURS"),
                72,
                &SESSION_TTL_RANGE,
            ),
            accept_unsolicited_email: parse_flag(
                "CONCIERGE_ACCEPT_UNSOLICITED_EMAIL",
                var("CONCIERGE_ACCEPT_UNSOLICITED_EMAIL"),
            ),
            cors_origin: var("CONCIERGE_CORS_ORIGIN").filter(|origin| origin != "*"),
            openai,
            sendgrid,
        }
    }

    /// Turn-level rules for the state machine
    pub fn policy(&self) -> Policy {
        Policy {
            max_attempts: self.otp_max_attempts,
            code_digits: CODE_DIGITS,
            accept_unsolicited_email: self.accept_unsolicited_email,
        }
    }

    pub fn runtime_settings(&self) -> RuntimeSettings {
        RuntimeSettings {
            policy: self.policy(),
            search_k: self.search_k,
            otp_ttl: Duration::from_secs(self.otp_ttl_secs),
            lookup_timeout: Duration::from_secs(self.lookup_timeout_secs),
            delivery_timeout: Duration::from_secs(self.delivery_timeout_secs),
        }
    }
}

/// Parse `value`, falling back to `default` with a warning when it is malformed
fn parse_or<T>(key: &str, value: Option<String>, default: T) -> T
where
    T: FromStr + std::fmt::Display,
{
    let Some(raw) = value else {
        return default;
    };
    raw.parse().unwrap_or_else(|_| {
        tracing::warn!(key = %key, value = %raw, default = %default, "Invalid configuration value, using default");
        default
    })
}

/// Like `parse_or`, but values outside `range` also fall back to `default`
fn parse_within<T>(key: &str, value: Option<String>, default: T, range: &RangeInclusive<T>) -> T
where
    T: FromStr + std::fmt::Display + PartialOrd + Copy,
{
    let parsed = parse_or(key, value, default);
    if range.contains(&parsed) {
        parsed
    } else {
        tracing::warn!(
            key = %key,
            value = %parsed,
            min = %range.start(),
            max = %range.end(),
            default = %default,
            "Configuration value out of range, using default"
        );
        default
    }
}

fn parse_flag(key: &str, value: Option<String>) -> bool {
    match value.as_deref().map(str::to_ascii_lowercase).as_deref() {
        None => false,
        Some("1" | "true" | "yes" | "on") => true,
        Some("0" | "false" | "no" | "off") => false,
        Some(other) => {
            tracing::warn!(key = %key, value = %other, "Invalid flag value, using false");
            false
        }
    }
}
