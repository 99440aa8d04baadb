use anyhow::{Context, Result};
use clap::{Args, Parser};
use lib_ris::connections::TlsVerification;
use lib_ris::filters::{
    AsPathExpr, Collector, FilterSet, MessageType, Peer, Prefix, RequiredKey, parse_as_path, parse_collectors,
    parse_peer, parse_prefixes,
};
use lib_ris::ingestors::{DEFAULT_CLIENT_NAME, StreamConfig, endpoint, is_valid_client_name};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::PathBuf;
use std::time::Duration;

/// Config file looked up in the working directory when no path is given.
pub const DEFAULT_CONFIG_FILE: &str = "ris_live.conf";

// Aliases keep clap from treating these as repeated arguments: each flag takes
// one comma-separated value that its parser turns into a list.
type CollectorList = Vec<Collector>;
type AsPathList = Vec<AsPathExpr>;
type PrefixList = Vec<Prefix>;

#[derive(Parser, Debug, Clone)]
#[command(name = "ris_live", about = "Monitor the streams from RIPE RIS Live.", version)]
pub struct Cli {
    #[command(flatten)]
    pub filters: FilterArgs,

    #[command(flatten)]
    pub settings: Settings,
}

#[derive(Args, Debug, Clone)]
pub struct FilterArgs {
    #[arg(short = 'H', long = "host", value_parser = parse_collectors, help = "Filter messages by a specific RRC (format: rrcXX).")]
    pub host: Option<CollectorList>,

    #[arg(short = 't', long = "type", value_enum, help = "Filter messages by BGP or RIS type.")]
    pub message_type: Option<MessageType>,

    #[arg(short = 'k', long = "key", value_enum, help = "Filter messages containing a specific key.")]
    pub key: Option<RequiredKey>,

    #[arg(short = 'p', long = "peer", value_parser = parse_peer, help = "Filter messages by BGP peer IP address.")]
    pub peer: Option<Peer>,

    #[arg(short = 'a', long = "aspath", value_parser = parse_as_path, help = "Filter by AS path. Use \"^\" for start, \"$\" for end (e.g., \"^123,456,789$\").")]
    pub aspath: Option<AsPathList>,

    #[arg(short = 'f', long = "prefix", value_parser = parse_prefixes, help = "Filter UPDATE messages by IPv4/IPv6 prefix (e.g., 192.0.2.0/24 or 2001:db8::/32).")]
    pub prefix: Option<PrefixList>,

    #[arg(short = 'm', long, help = "Match prefixes that are more specific (part of) the given prefix.")]
    pub more_specific: bool,

    #[arg(short = 'l', long, help = "Match prefixes that are less specific (contain) the given prefix.")]
    pub less_specific: bool,

    #[arg(short = 'r', long, help = "Include Base64-encoded original binary BGP message.")]
    pub include_raw: bool,

    #[arg(short = 'd', long, help = "Disable auto-reconnect on connection drop.")]
    pub disable_auto_reconnect: bool,

    #[arg(short = 'D', long, help = "Enable debug logging output.")]
    pub debug: bool,
}

impl FilterArgs {
    /// Every value here already went through its validator during parsing.
    pub fn to_filter_set(&self) -> FilterSet {
        FilterSet {
            collectors: self.host.clone().unwrap_or_default(),
            peer: self.peer.clone(),
            as_path: self.aspath.clone(),
            prefixes: self.prefix.clone(),
            message_type: self.message_type,
            require: self.key,
            more_specific: self.more_specific,
            less_specific: self.less_specific,
            include_raw: self.include_raw,
            auto_reconnect: !self.disable_auto_reconnect,
        }
    }
}

#[derive(Args, Deserialize, Serialize, Debug, Clone, Default, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Settings {
    #[arg(long, env = "RIS_CONFIG_PATH", help = "Path to the JSON configuration file.")]
    pub config_path: Option<PathBuf>,

    #[arg(long, env = "RIS_LOG_DIR", help = "Directory for log files. Logs go to stderr only when unset.")]
    pub log_dir: Option<PathBuf>,

    #[arg(long, env = "RIS_LOG_LEVEL", help = "Logging level (trace, debug, info, warn, error).")]
    pub log_level: Option<String>,

    #[arg(long, env = "RIS_CLIENT_NAME", help = "Client identity reported to RIS Live.")]
    pub client_name: Option<String>,

    #[arg(long, env = "RIS_RECONNECT_BASE_DELAY_MS", help = "Base delay in milliseconds for reconnect attempts.")]
    pub reconnect_base_delay_ms: Option<u64>,

    #[arg(long, env = "RIS_RECONNECT_MAX_DELAY_MS", help = "Maximum delay in milliseconds for reconnect attempts.")]
    pub reconnect_max_delay_ms: Option<u64>,

    #[arg(long, env = "RIS_STALL_TIMEOUT_SECONDS", help = "Reconnect when nothing is received for this many seconds.")]
    pub stall_timeout_seconds: Option<u64>,

    #[arg(
        long,
        env = "RIS_INSECURE",
        num_args = 0..=1,
        default_missing_value = "true",
        help = "Skip TLS certificate verification. The server identity is NOT authenticated."
    )]
    pub insecure: Option<bool>,
}

impl Settings {
    fn defaults() -> Settings {
        Settings {
            log_level: Some("info".to_string()),
            client_name: Some(DEFAULT_CLIENT_NAME.to_string()),
            reconnect_base_delay_ms: Some(1000),
            reconnect_max_delay_ms: Some(60000),
            insecure: Some(false),
            ..Default::default()
        }
    }

    // Merge two Settings structs, where 'other' overrides 'self' for Some values
    fn merge(self, other: Settings) -> Settings {
        Settings {
            config_path: other.config_path.or(self.config_path),
            log_dir: other.log_dir.or(self.log_dir),
            log_level: other.log_level.or(self.log_level),
            client_name: other.client_name.or(self.client_name),
            reconnect_base_delay_ms: other.reconnect_base_delay_ms.or(self.reconnect_base_delay_ms),
            reconnect_max_delay_ms: other.reconnect_max_delay_ms.or(self.reconnect_max_delay_ms),
            stall_timeout_seconds: other.stall_timeout_seconds.or(self.stall_timeout_seconds),
            insecure: other.insecure.or(self.insecure),
        }
    }

    /// Layers defaults, the config file and the command line (which already
    /// includes environment variables), later layers winning.
    ///
    /// A missing file at the default location is fine; a missing file that was
    /// asked for explicitly, or one that does not parse, is an error. So is a
    /// client name that cannot be put in the endpoint URL unescaped.
    pub fn resolve(cli: Settings) -> Result<Settings> {
        let explicit = cli.config_path.is_some();
        let config_file_path = cli
            .config_path
            .clone()
            .unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_FILE));

        let mut current = Settings::defaults();

        if config_file_path.exists() {
            let config_str = fs::read_to_string(&config_file_path)
                .with_context(|| format!("Failed to read config file {}", config_file_path.display()))?;
            let file_settings: Settings = serde_json::from_str(&config_str)
                .with_context(|| format!("Failed to parse config file {}", config_file_path.display()))?;
            current = current.merge(file_settings);
        } else if explicit {
            anyhow::bail!("Config file not found: {}", config_file_path.display());
        }

        let settings = current.merge(cli);
        if let Some(name) = settings.client_name.as_deref() {
            if !is_valid_client_name(name) {
                anyhow::bail!(
                    "Invalid client name '{}'. Use letters, digits, '-', '.', '_' or '~' only",
                    name
                );
            }
        }
        Ok(settings)
    }

    pub fn log_level(&self) -> &str {
        self.log_level.as_deref().unwrap_or("info")
    }

    pub fn tls_verification(&self) -> TlsVerification {
        if self.insecure.unwrap_or(false) {
            TlsVerification::Insecure
        } else {
            TlsVerification::Verify
        }
    }

    pub fn stream_config(&self, auto_reconnect: bool) -> StreamConfig {
        let defaults = StreamConfig::default();
        StreamConfig {
            url: endpoint(self.client_name.as_deref().unwrap_or(DEFAULT_CLIENT_NAME)),
            tls: self.tls_verification(),
            auto_reconnect,
            reconnect_base_delay: self
                .reconnect_base_delay_ms
                .map(Duration::from_millis)
                .unwrap_or(defaults.reconnect_base_delay),
            reconnect_max_delay: self
                .reconnect_max_delay_ms
                .map(Duration::from_millis)
                .unwrap_or(defaults.reconnect_max_delay),
            stall_timeout: self.stall_timeout_seconds.map(Duration::from_secs),
            close_timeout: defaults.close_timeout,
        }
    }
}
