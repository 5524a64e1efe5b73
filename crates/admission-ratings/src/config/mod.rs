use std::env;
use std::fmt;
use std::net::{IpAddr, SocketAddr};
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use crate::admission::broadcast::{BroadcastSettings, MissingCapacityPolicy};
use crate::admission::status::StatusThresholds;
use crate::admission::trajectory::SparseWindow;

/// Distinguishes runtime behavior for different stages of the service.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AppEnvironment {
    Development,
    Test,
    Production,
}

impl AppEnvironment {
    fn from_str(value: &str) -> Self {
        match value.trim().to_ascii_lowercase().as_str() {
            "prod" | "production" => Self::Production,
            "test" | "ci" => Self::Test,
            _ => Self::Development,
        }
    }
}

/// Top-level configuration for the application.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub environment: AppEnvironment,
    pub server: ServerConfig,
    pub telemetry: TelemetryConfig,
    pub thresholds: StatusThresholds,
    pub broadcast: BroadcastConfig,
    pub services: ServiceEndpoints,
    /// `direction,budget_seats` CSV; an empty capacity table is used when unset.
    pub capacity_csv: Option<PathBuf>,
}

impl AppConfig {
    pub fn load() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();

        let environment = AppEnvironment::from_str(
            &env::var("APP_ENV").unwrap_or_else(|_| "development".to_string()),
        );

        let host = env::var("APP_HOST").unwrap_or_else(|_| "127.0.0.1".to_string());
        let port = env::var("APP_PORT")
            .unwrap_or_else(|_| "3000".to_string())
            .parse::<u16>()
            .map_err(|_| ConfigError::InvalidPort)?;

        let log_level = env::var("APP_LOG_LEVEL").unwrap_or_else(|_| "info".to_string());
        let log_format = match optional_var("APP_LOG_FORMAT") {
            None => LogFormat::Compact,
            Some(value) => match value.trim().to_ascii_lowercase().as_str() {
                "compact" => LogFormat::Compact,
                "json" => LogFormat::Json,
                _ => {
                    return Err(ConfigError::InvalidChoice {
                        var: "APP_LOG_FORMAT",
                        value,
                        expected: "compact or json",
                    })
                }
            },
        };

        Ok(Self {
            environment,
            server: ServerConfig { host, port },
            telemetry: TelemetryConfig {
                log_level,
                format: log_format,
            },
            thresholds: load_thresholds()?,
            broadcast: load_broadcast()?,
            services: load_services()?,
            capacity_csv: optional_var("BUDGET_SEATS_CSV").map(PathBuf::from),
        })
    }
}

fn load_thresholds() -> Result<StatusThresholds, ConfigError> {
    let defaults = StatusThresholds::default();

    let sparse_window = match optional_var("RATINGS_SPARSE_WINDOW") {
        None => defaults.sparse_window,
        Some(value) => match value.trim().to_ascii_lowercase().as_str() {
            "stable" => SparseWindow::Stable,
            "unstable" => SparseWindow::Unstable,
            _ => {
                return Err(ConfigError::InvalidChoice {
                    var: "RATINGS_SPARSE_WINDOW",
                    value,
                    expected: "stable or unstable",
                })
            }
        },
    };

    Ok(StatusThresholds {
        positive_threshold_probability: probability_var(
            "RATINGS_POSITIVE_PROBABILITY",
            defaults.positive_threshold_probability,
        )?,
        critical_threshold_probability: probability_var(
            "RATINGS_CRITICAL_PROBABILITY",
            defaults.critical_threshold_probability,
        )?,
        velocity_drop_threshold: parsed_var(
            "RATINGS_VELOCITY_DROP",
            defaults.velocity_drop_threshold,
        )?,
        warning_zone_margin: parsed_var("RATINGS_WARNING_ZONE_MARGIN", defaults.warning_zone_margin)?,
        days_count: parsed_var("RATINGS_STABILITY_DAYS", defaults.days_count)?,
        max_change: parsed_var("RATINGS_STABILITY_MAX_CHANGE", defaults.max_change)?,
        top_rating_cutoff: parsed_var("RATINGS_TOP_RATING_CUTOFF", defaults.top_rating_cutoff)?,
        sparse_window,
    })
}

fn load_broadcast() -> Result<BroadcastConfig, ConfigError> {
    let defaults = BroadcastSettings::default();

    let page_size: usize = parsed_var("BROADCAST_PAGE_SIZE", defaults.page_size)?;
    if page_size == 0 {
        return Err(ConfigError::InvalidNumber {
            var: "BROADCAST_PAGE_SIZE",
            value: "0".to_string(),
        });
    }

    let missing_capacity = match optional_var("BROADCAST_MISSING_CAPACITY") {
        None => defaults.missing_capacity,
        Some(value) => match value.trim().to_ascii_lowercase().as_str() {
            "skip" => MissingCapacityPolicy::SkipApplicant,
            "abort" => MissingCapacityPolicy::AbortCycle,
            _ => {
                return Err(ConfigError::InvalidChoice {
                    var: "BROADCAST_MISSING_CAPACITY",
                    value,
                    expected: "skip or abort",
                })
            }
        },
    };

    let interval = match optional_var("BROADCAST_INTERVAL_SECS") {
        None => None,
        Some(value) => match value.trim().parse::<u64>() {
            Ok(secs) if secs > 0 => Some(Duration::from_secs(secs)),
            _ => {
                return Err(ConfigError::InvalidNumber {
                    var: "BROADCAST_INTERVAL_SECS",
                    value,
                })
            }
        },
    };

    Ok(BroadcastConfig {
        settings: BroadcastSettings {
            page_size,
            missing_capacity,
        },
        interval,
    })
}

fn load_services() -> Result<ServiceEndpoints, ConfigError> {
    Ok(ServiceEndpoints {
        classifier_url: env::var("CLASSIFIER_URL")
            .unwrap_or_else(|_| "http://127.0.0.1:8001".to_string()),
        recommender_url: env::var("RECOMMENDER_URL")
            .unwrap_or_else(|_| "http://127.0.0.1:8002".to_string()),
        request_timeout: Duration::from_secs(parsed_var("SERVICE_TIMEOUT_SECS", 10u64)?),
        max_retries: parsed_var("SERVICE_MAX_RETRIES", 3u32)?,
    })
}

fn optional_var(var: &str) -> Option<String> {
    env::var(var).ok().filter(|value| !value.trim().is_empty())
}

fn parsed_var<T: FromStr>(var: &'static str, default: T) -> Result<T, ConfigError> {
    match optional_var(var) {
        None => Ok(default),
        Some(value) => value
            .trim()
            .parse::<T>()
            .map_err(|_| ConfigError::InvalidNumber { var, value }),
    }
}

fn probability_var(var: &'static str, default: f64) -> Result<f64, ConfigError> {
    let probability: f64 = parsed_var(var, default)?;
    if !(0.0..=1.0).contains(&probability) {
        return Err(ConfigError::InvalidProbability {
            var,
            value: probability,
        });
    }
    Ok(probability)
}

/// Settings controlling the HTTP server binding.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

impl ServerConfig {
    pub fn socket_addr(&self) -> Result<SocketAddr, ConfigError> {
        if self.host.eq_ignore_ascii_case("localhost") {
            return Ok(SocketAddr::new(IpAddr::from([127, 0, 0, 1]), self.port));
        }

        let ip: IpAddr = self
            .host
            .parse()
            .map_err(|source| ConfigError::InvalidHost { source })?;

        Ok(SocketAddr::new(ip, self.port))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    Compact,
    Json,
}

/// Tracing controls.
#[derive(Debug, Clone)]
pub struct TelemetryConfig {
    pub log_level: String,
    pub format: LogFormat,
}

#[derive(Debug, Clone)]
pub struct BroadcastConfig {
    pub settings: BroadcastSettings,
    /// When set, the server repeats the broadcast on this period.
    pub interval: Option<Duration>,
}

/// Base URLs and retry policy for the classifier and recommender microservices.
#[derive(Debug, Clone)]
pub struct ServiceEndpoints {
    pub classifier_url: String,
    pub recommender_url: String,
    pub request_timeout: Duration,
    pub max_retries: u32,
}

#[derive(Debug)]
pub enum ConfigError {
    InvalidPort,
    InvalidHost {
        source: std::net::AddrParseError,
    },
    InvalidNumber {
        var: &'static str,
        value: String,
    },
    InvalidProbability {
        var: &'static str,
        value: f64,
    },
    InvalidChoice {
        var: &'static str,
        value: String,
        expected: &'static str,
    },
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::InvalidPort => write!(f, "APP_PORT must be a valid u16"),
            ConfigError::InvalidHost { .. } => {
                write!(f, "APP_HOST must parse to an IPv4 or IPv6 address")
            }
            ConfigError::InvalidNumber { var, value } => {
                write!(f, "{var} has invalid numeric value '{value}'")
            }
            ConfigError::InvalidProbability { var, value } => {
                write!(f, "{var} must lie within [0, 1], got {value}")
            }
            ConfigError::InvalidChoice {
                var,
                value,
                expected,
            } => write!(f, "{var} must be {expected}, got '{value}'"),
        }
    }
}

impl std::error::Error for ConfigError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ConfigError::InvalidHost { source } => Some(source),
            _ => None,
        }
    }
}
