//! Policy thresholds and connection settings

use anyhow::Result;

use crate::error::AdvisorError;

/// Fragmentation at or above this percentage calls for a REBUILD.
pub const REBUILD_FRAGMENTATION_PERCENT: f64 = 30.0;
/// Fragmentation at or above this percentage (and below rebuild) calls for a REORGANIZE.
pub const REORGANIZE_FRAGMENTATION_PERCENT: f64 = 5.0;
/// Indexes with this many pages or fewer are not worth maintaining.
pub const MIN_PAGE_COUNT: i64 = 100;
/// Total reads below this count mark a written-to index as LOW_READ.
pub const LOW_READ_THRESHOLD: i64 = 100;
/// Missing-index suggestions need more seeks than this to be recommended.
pub const MISSING_INDEX_MIN_SEEKS: i64 = 50;
/// Missing-index suggestions need an average impact above this to be recommended.
pub const MISSING_INDEX_MIN_IMPACT: f64 = 70.0;
/// Default similarity ratio a rewritten procedure must reach.
pub const SIMILARITY_THRESHOLD: f64 = 0.95;

/// Tunable policy constants used by the classifiers and the verifier.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Thresholds {
    pub rebuild_percent: f64,
    pub reorganize_percent: f64,
    pub min_page_count: i64,
    pub low_read: i64,
    pub missing_min_seeks: i64,
    pub missing_min_impact: f64,
    pub similarity: f64,
}

impl Default for Thresholds {
    fn default() -> Self {
        Self {
            rebuild_percent: REBUILD_FRAGMENTATION_PERCENT,
            reorganize_percent: REORGANIZE_FRAGMENTATION_PERCENT,
            min_page_count: MIN_PAGE_COUNT,
            low_read: LOW_READ_THRESHOLD,
            missing_min_seeks: MISSING_INDEX_MIN_SEEKS,
            missing_min_impact: MISSING_INDEX_MIN_IMPACT,
            similarity: SIMILARITY_THRESHOLD,
        }
    }
}

/// How to authenticate against SQL Server
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Authentication {
    SqlServer { user: String, password: String },
    Windows,
}

/// Connection settings read from the environment (and `.env`, when present)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectionSettings {
    pub host: String,
    pub port: u16,
    /// Default database context for table resolution and deployment
    pub database: String,
    pub authentication: Authentication,
    pub trust_cert: bool,
}

impl ConnectionSettings {
    /// Load from `SQL_SERVER`, `SQL_DATABASE`, `SQL_USER`, `SQL_PASSWORD`,
    /// `USE_WINDOWS_AUTH` and `SQL_TRUST_CERT`.
    pub fn from_env() -> Result<Self> {
        let _ = dotenvy::dotenv();
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build settings from an arbitrary key lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let server = lookup("SQL_SERVER")
            .filter(|s| !s.trim().is_empty())
            .ok_or_else(|| AdvisorError::ConfigError {
                message: "SQL_SERVER is not set".to_string(),
            })?;
        let database = lookup("SQL_DATABASE")
            .filter(|s| !s.trim().is_empty())
            .ok_or_else(|| AdvisorError::ConfigError {
                message: "SQL_DATABASE is not set".to_string(),
            })?;

        let (host, port) = parse_server(&server)?;

        let windows = lookup("USE_WINDOWS_AUTH")
            .map(|v| v.eq_ignore_ascii_case("true"))
            .unwrap_or(false);
        let authentication = if windows {
            Authentication::Windows
        } else {
            Authentication::SqlServer {
                user: lookup("SQL_USER").unwrap_or_default(),
                password: lookup("SQL_PASSWORD").unwrap_or_default(),
            }
        };

        let trust_cert = lookup("SQL_TRUST_CERT")
            .map(|v| v == "1" || v.eq_ignore_ascii_case("true"))
            .unwrap_or(true);

        Ok(Self {
            host,
            port,
            database: database.trim().to_string(),
            authentication,
            trust_cert,
        })
    }
}

/// Parse `host`, `host,port` (ODBC style) or `host:port`.
fn parse_server(server: &str) -> Result<(String, u16)> {
    let server = server.trim();
    let split = server.rsplit_once(',').or_else(|| server.rsplit_once(':'));
    match split {
        Some((host, port)) => {
            let port = port
                .trim()
                .parse::<u16>()
                .map_err(|_| AdvisorError::ConfigError {
                    message: format!("Invalid port in SQL_SERVER: {}", server),
                })?;
            Ok((host.trim().to_string(), port))
        }
        None => Ok((server.to_string(), 1433)),
    }
}
