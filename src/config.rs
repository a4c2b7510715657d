use std::collections::HashMap;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

use clap::Parser;
use serde::{Deserialize, Serialize};

use crate::model::Transport;

/// A trust-anchor entry loaded from config: a DS or DNSKEY record at a zone.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrustAnchorEntry {
    pub zone: String,
    /// Presentation-format RDATA of the DS (or DNSKEY) record.
    pub rdata: String,
}

/// A stub zone seeded into the Zone Map and Auth-Server Registry at startup.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StubZone {
    pub zone: String,
    pub servers: Vec<SocketAddr>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResolverConfig {
    /// Addresses the resolver listens on for client queries.
    pub listen_addrs: Vec<SocketAddr>,

    /// Path to a file of trust-anchor DS/DNSKEY records (RFC 9.0-style
    /// presentation format). None means no validation is possible beyond
    /// Indeterminate.
    pub trust_anchor_path: Option<PathBuf>,

    #[serde(default)]
    pub trust_anchors: Vec<TrustAnchorEntry>,

    /// Whether to consult SVCB/TSYNC transport signals (§4.9).
    #[serde(default)]
    pub use_transport_signals: bool,

    /// Whether to revalidate the delegation NS set against the child zone
    /// apex after following a referral (§4.7.5 step 8).
    #[serde(default)]
    pub revalidate_ns: bool,

    /// Column width used by debug-mode response dumps; has no protocol
    /// effect.
    #[serde(default = "default_line_width")]
    pub line_width: usize,

    #[serde(default)]
    pub stub_zones: Vec<StubZone>,

    /// Default exchange timeout, overridable per transport.
    #[serde(default = "default_exchange_timeout", with = "duration_secs")]
    pub exchange_timeout: Duration,

    #[serde(default)]
    pub transport_timeouts: HashMap<String, u64>,

    /// Source of root hints: embedded defaults unless overridden.
    pub root_hints_path: Option<PathBuf>,

    /// `tracing_subscriber::EnvFilter` directive string.
    #[serde(default = "default_log_filter")]
    pub log_filter: String,

    /// Maximum referral hops before `ReferralLoop`/`CnameExcessive`.
    #[serde(default = "default_max_referrals")]
    pub max_referrals: u8,
}

fn default_line_width() -> usize {
    80
}

fn default_exchange_timeout() -> Duration {
    Duration::from_secs(5)
}

fn default_log_filter() -> String {
    "resolvd=info".to_string()
}

fn default_max_referrals() -> u8 {
    20
}

mod duration_secs {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_u64(d.as_secs())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Duration, D::Error> {
        Ok(Duration::from_secs(u64::deserialize(d)?))
    }
}

impl Default for ResolverConfig {
    fn default() -> Self {
        Self {
            listen_addrs: vec!["127.0.0.1:1053".parse().expect("valid default listener")],
            trust_anchor_path: None,
            trust_anchors: Vec::new(),
            use_transport_signals: false,
            revalidate_ns: false,
            line_width: default_line_width(),
            stub_zones: Vec::new(),
            exchange_timeout: default_exchange_timeout(),
            transport_timeouts: HashMap::new(),
            root_hints_path: None,
            log_filter: default_log_filter(),
            max_referrals: default_max_referrals(),
        }
    }
}

/// Command-line overrides for [`ResolverConfig`].
///
/// Layering, following the teacher's approach: `Default` → TOML file →
/// environment → CLI flags, each layer overriding the previous one.
#[derive(Debug, Parser)]
#[command(name = "resolvd", about = "Iterative, validating DNS resolver")]
pub struct CliArgs {
    /// Path to a TOML configuration file.
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Override listen addresses (repeatable).
    #[arg(long = "listen")]
    pub listen_addrs: Vec<SocketAddr>,

    #[arg(long)]
    pub use_transport_signals: bool,

    #[arg(long)]
    pub revalidate_ns: bool,

    #[arg(long)]
    pub trust_anchor_file: Option<PathBuf>,

    #[arg(long)]
    pub root_hints_file: Option<PathBuf>,

    /// `tracing_subscriber::EnvFilter` directive, e.g. `resolvd=debug`.
    #[arg(long)]
    pub log_filter: Option<String>,
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read config file {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse config file {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },
    #[error("invalid configuration: {0}")]
    Invalid(String),
}

impl ResolverConfig {
    /// Load layered configuration: defaults, then an optional TOML file,
    /// then the `RESOLVD_LOG_FILTER` environment override, then CLI flags.
    pub fn load(args: &CliArgs) -> Result<Self, ConfigError> {
        let mut config = match &args.config {
            Some(path) => Self::from_file(path)?,
            None => Self::default(),
        };

        if let Ok(filter) = std::env::var("RESOLVD_LOG_FILTER") {
            config.log_filter = filter;
        }

        if !args.listen_addrs.is_empty() {
            config.listen_addrs = args.listen_addrs.clone();
        }
        if args.use_transport_signals {
            config.use_transport_signals = true;
        }
        if args.revalidate_ns {
            config.revalidate_ns = true;
        }
        if let Some(path) = &args.trust_anchor_file {
            config.trust_anchor_path = Some(path.clone());
        }
        if let Some(path) = &args.root_hints_file {
            config.root_hints_path = Some(path.clone());
        }
        if let Some(filter) = &args.log_filter {
            config.log_filter = filter.clone();
        }

        config.validate()?;
        Ok(config)
    }

    fn from_file(path: &PathBuf) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.clone(),
            source,
        })?;
        toml::from_str(&text).map_err(|source| ConfigError::Parse {
            path: path.clone(),
            source,
        })
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.listen_addrs.is_empty() {
            return Err(ConfigError::Invalid(
                "at least one listen address is required".to_string(),
            ));
        }
        if self.line_width == 0 {
            return Err(ConfigError::Invalid(
                "line-width must be at least 1".to_string(),
            ));
        }
        if self.exchange_timeout.as_secs() == 0 || self.exchange_timeout.as_secs() > 300 {
            return Err(ConfigError::Invalid(
                "exchange timeout must be between 1 and 300 seconds".to_string(),
            ));
        }
        for stub in &self.stub_zones {
            if stub.servers.is_empty() {
                return Err(ConfigError::Invalid(format!(
                    "stub zone {} has no servers",
                    stub.zone
                )));
            }
        }
        Ok(())
    }

    /// The exchange timeout for a given transport, falling back to the
    /// global default.
    pub fn timeout_for(&self, transport: Transport) -> Duration {
        self.transport_timeouts
            .get(transport.as_str())
            .map(|secs| Duration::from_secs(*secs))
            .unwrap_or(self.exchange_timeout)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_is_valid() {
        assert!(ResolverConfig::default().validate().is_ok());
    }

    #[test]
    fn rejects_empty_listen_addrs() {
        let config = ResolverConfig {
            listen_addrs: vec![],
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn rejects_oversized_timeout() {
        let config = ResolverConfig {
            exchange_timeout: Duration::from_secs(301),
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn timeout_for_falls_back_to_default() {
        let config = ResolverConfig::default();
        assert_eq!(
            config.timeout_for(Transport::Do53),
            config.exchange_timeout
        );
    }
}
