//! # Subscription Filters
//!
//! Typed, validated filter values for a RIS Live subscription.
//!
//! Every value type in this module (`Collector`, `AsPathExpr`, `Prefix`) keeps
//! its fields private and can only be produced by the validators in
//! [`validate`]. A `FilterSet` is therefore well-formed by construction: raw
//! user text is rejected at the boundary and never reaches the wire.

#![forbid(unsafe_code)]

use std::fmt;
use std::net::IpAddr;

use clap::ValueEnum;
use ipnet::IpNet;
use serde::Serialize;
use thiserror::Error;

/// Pure validators turning raw text into filter values.
pub mod validate;

pub use validate::{parse_as_path, parse_collectors, parse_peer, parse_prefixes};

/// Errors produced while validating raw filter text.
///
/// Each variant carries the exact sub-token that failed so the diagnostic can
/// point at it.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum FilterError {
    /// A collector token does not match `rrc` followed by two digits.
    #[error("Invalid RRC format '{0}'. Must be in format 'rrcXX' where X is a digit")]
    InvalidCollector(String),

    /// The peer is not a syntactically valid IPv4 or IPv6 address.
    #[error("Invalid IP address format: '{0}'")]
    InvalidPeer(String),

    /// An AS-path expression contains a token that is not an ASN in [0, 4294967295].
    #[error("Invalid AS path format in '{0}'. Must be comma-separated ASNs, optionally anchored with '^' and '$'")]
    InvalidAsPath(String),

    /// A prefix was given without a `/len` mask.
    #[error("Network prefix '{0}' must include mask in CIDR notation (e.g. 192.0.2.0/24 or 2001:db8::/32)")]
    PrefixMissingMask(String),

    /// A prefix has a mask but does not parse as an IPv4 or IPv6 network.
    #[error("Invalid network prefix format: '{0}'")]
    InvalidPrefix(String),
}

/// A route collector identifier such as `rrc01`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Collector(String);

impl Collector {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Collector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A BGP peer address.
///
/// Sent to the service as typed (after trimming), so `2001:DB8:0::1` is not
/// rewritten to its canonical form.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Peer {
    text: String,
    addr: IpAddr,
}

impl Peer {
    pub fn as_str(&self) -> &str {
        &self.text
    }

    pub fn addr(&self) -> IpAddr {
        self.addr
    }
}

/// One AS-path expression, anchors (`^`, `$`) kept verbatim.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AsPathExpr(String);

impl AsPathExpr {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

/// A network prefix in CIDR notation.
///
/// The text is kept as the user wrote it (host bits may be set); `network()`
/// exposes the parsed value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Prefix {
    text: String,
    net: IpNet,
}

impl Prefix {
    pub fn as_str(&self) -> &str {
        &self.text
    }

    pub fn network(&self) -> IpNet {
        self.net
    }
}

/// BGP or RIS message types the service can filter on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, ValueEnum)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[value(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum MessageType {
    Update,
    Open,
    Notification,
    Keepalive,
    RisPeerState,
}

impl MessageType {
    pub fn as_str(&self) -> &'static str {
        match self {
            MessageType::Update => "UPDATE",
            MessageType::Open => "OPEN",
            MessageType::Notification => "NOTIFICATION",
            MessageType::Keepalive => "KEEPALIVE",
            MessageType::RisPeerState => "RIS_PEER_STATE",
        }
    }
}

/// Keys an UPDATE must contain to be forwarded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
#[value(rename_all = "lower")]
pub enum RequiredKey {
    Announcements,
    Withdrawals,
}

impl RequiredKey {
    pub fn as_str(&self) -> &'static str {
        match self {
            RequiredKey::Announcements => "announcements",
            RequiredKey::Withdrawals => "withdrawals",
        }
    }
}

/// # Filter Set
///
/// The validated, immutable set of subscription constraints for one run.
/// Built once at startup and shared by reference afterwards.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FilterSet {
    /// Collector identifiers in the order given.
    pub collectors: Vec<Collector>,
    /// A single BGP peer address.
    pub peer: Option<Peer>,
    /// AS-path expressions in the order given.
    pub as_path: Option<Vec<AsPathExpr>>,
    /// Prefixes in the order given.
    pub prefixes: Option<Vec<Prefix>>,
    pub message_type: Option<MessageType>,
    pub require: Option<RequiredKey>,
    /// Also match prefixes more specific than the given ones.
    pub more_specific: bool,
    /// Also match prefixes less specific than the given ones.
    pub less_specific: bool,
    /// Ask the service to include the Base64-encoded raw BGP message.
    pub include_raw: bool,
    /// Reconnect after an unexpected drop.
    pub auto_reconnect: bool,
}

impl Default for FilterSet {
    fn default() -> Self {
        Self {
            collectors: Vec::new(),
            peer: None,
            as_path: None,
            prefixes: None,
            message_type: None,
            require: None,
            more_specific: false,
            less_specific: false,
            include_raw: false,
            auto_reconnect: true,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_enable_auto_reconnect_only() {
        let filters = FilterSet::default();
        assert!(filters.auto_reconnect);
        assert!(!filters.more_specific);
        assert!(!filters.less_specific);
        assert!(!filters.include_raw);
        assert!(filters.collectors.is_empty());
        assert!(filters.peer.is_none());
    }

    #[test]
    fn enum_wire_names() {
        assert_eq!(serde_json::to_string(&MessageType::RisPeerState).unwrap(), "\"RIS_PEER_STATE\"");
        assert_eq!(serde_json::to_string(&MessageType::Keepalive).unwrap(), "\"KEEPALIVE\"");
        assert_eq!(serde_json::to_string(&RequiredKey::Withdrawals).unwrap(), "\"withdrawals\"");
        assert_eq!(MessageType::Update.as_str(), "UPDATE");
    }

    #[test]
    fn enum_cli_names_match_wire_names() {
        let parsed = MessageType::from_str("RIS_PEER_STATE", false).unwrap();
        assert_eq!(parsed, MessageType::RisPeerState);
        let parsed = RequiredKey::from_str("announcements", false).unwrap();
        assert_eq!(parsed, RequiredKey::Announcements);
        assert!(MessageType::from_str("update", false).is_err());
    }
}
