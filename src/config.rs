use crate::application::{IssuerError, IssuerGate, RenderPreference, RenderPreferenceError};
use crate::domain::{FieldOptions, IdentifierError, IdentifierGenerator};
use std::fmt::Display;
use std::net::SocketAddr;
use std::str::FromStr;
use std::time::Duration;
use thiserror::Error;
use tracing::{info, warn};

const DEFAULT_LISTEN_ADDR: &str = "0.0.0.0:8080";
const DEFAULT_PUBLIC_BASE_URL: &str = "http://localhost:8080";
const DEFAULT_DB_PATH: &str = "/var/lib/clearance/clearance.db";
const DEFAULT_TABLE: &str = "submissions";
const DEFAULT_HANDOFF_TTL_SECS: &str = "600";
const DEFAULT_STORE_TIMEOUT_SECS: &str = "10";

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Invalid {key} value {value:?}: {reason}")]
    Invalid {
        key: &'static str,
        value: String,
        reason: String,
    },

    #[error("{0} must be set when CLEARANCE_STORE=postgrest")]
    Missing(&'static str),

    #[error(transparent)]
    Prefix(#[from] IdentifierError),

    #[error(transparent)]
    Issuer(#[from] IssuerError),

    #[error(transparent)]
    Render(#[from] RenderPreferenceError),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreBackend {
    Sqlite {
        path: String,
    },
    Postgrest {
        url: String,
        key: String,
        table: String,
        timeout: Duration,
    },
}

pub struct Config {
    pub listen_addr: SocketAddr,
    pub public_base_url: String,
    pub store: StoreBackend,
    pub generator: IdentifierGenerator,
    pub issuer: IssuerGate,
    pub handoff_ttl: Duration,
    pub render: RenderPreference,
    pub field_options: FieldOptions,
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Builds the configuration from any key lookup; `from_env` passes the
    /// process environment.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let vars = Vars(lookup);

        let store = match vars.or("CLEARANCE_STORE", "sqlite").to_ascii_lowercase().as_str() {
            "sqlite" => StoreBackend::Sqlite {
                path: vars.or("CLEARANCE_DB_PATH", DEFAULT_DB_PATH),
            },
            "postgrest" => StoreBackend::Postgrest {
                url: vars
                    .get("CLEARANCE_REST_URL")
                    .ok_or(ConfigError::Missing("CLEARANCE_REST_URL"))?,
                key: vars
                    .get("CLEARANCE_REST_KEY")
                    .ok_or(ConfigError::Missing("CLEARANCE_REST_KEY"))?,
                table: vars.or("CLEARANCE_TABLE", DEFAULT_TABLE),
                timeout: Duration::from_secs(
                    vars.parse("CLEARANCE_STORE_TIMEOUT_SECS", DEFAULT_STORE_TIMEOUT_SECS)?,
                ),
            },
            other => {
                return Err(ConfigError::Invalid {
                    key: "CLEARANCE_STORE",
                    value: other.to_string(),
                    reason: "expected \"sqlite\" or \"postgrest\"".to_string(),
                })
            }
        };

        let issuer = match vars.get("CLEARANCE_ISSUER_TOKEN_SHA256") {
            Some(digest) => IssuerGate::from_digest(&digest)?,
            None => {
                warn!("CLEARANCE_ISSUER_TOKEN_SHA256 not set, certificate issuance is open");
                IssuerGate::open()
            }
        };

        Ok(Self {
            listen_addr: vars.parse("CLEARANCE_LISTEN_ADDR", DEFAULT_LISTEN_ADDR)?,
            public_base_url: vars
                .or("CLEARANCE_PUBLIC_BASE_URL", DEFAULT_PUBLIC_BASE_URL)
                .trim_end_matches('/')
                .to_string(),
            store,
            generator: IdentifierGenerator::new(&vars.or("CLEARANCE_NDN_PREFIX", "PRJ"))?,
            issuer,
            handoff_ttl: Duration::from_secs(
                vars.parse("CLEARANCE_HANDOFF_TTL_SECS", DEFAULT_HANDOFF_TTL_SECS)?,
            ),
            render: vars.or("CLEARANCE_RENDER", "stored").parse()?,
            field_options: FieldOptions {
                submission_types: vars.list("CLEARANCE_SUBMISSION_TYPES"),
                compliance_statuses: vars.list("CLEARANCE_COMPLIANCE_STATUSES"),
                report_statuses: vars.list("CLEARANCE_REPORT_STATUSES"),
            },
        })
    }
}

struct Vars<F>(F);

impl<F> Vars<F>
where
    F: Fn(&str) -> Option<String>,
{
    fn get(&self, key: &str) -> Option<String> {
        (self.0)(key)
            .map(|v| v.trim().to_string())
            .filter(|v| !v.is_empty())
    }

    fn or(&self, key: &str, default: &str) -> String {
        self.get(key).unwrap_or_else(|| {
            info!("{key} not set, using default: {default}");
            default.to_string()
        })
    }

    fn parse<T>(&self, key: &'static str, default: &str) -> Result<T, ConfigError>
    where
        T: FromStr,
        T::Err: Display,
    {
        let value = self.or(key, default);
        value.parse().map_err(|e: T::Err| {
            warn!("Invalid {key} value: {e}");
            ConfigError::Invalid {
                key,
                reason: e.to_string(),
                value,
            }
        })
    }

    fn list(&self, key: &str) -> Vec<String> {
        self.get(key)
            .map(|v| {
                v.split(',')
                    .map(str::trim)
                    .filter(|s| !s.is_empty())
                    .map(str::to_string)
                    .collect()
            })
            .unwrap_or_default()
    }
}
