//! Validators for raw filter text.
//!
//! Each function takes the text as typed on the command line, splits it on
//! commas where the filter accepts lists, and either returns every token in
//! validated form or fails on the first bad token.

use std::net::IpAddr;
use std::sync::LazyLock;

use ipnet::IpNet;
use regex::Regex;

use super::{AsPathExpr, Collector, FilterError, Peer, Prefix};

static COLLECTOR_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^rrc[0-9]{2}$").expect("collector pattern is a valid regex"));

fn split_list(value: &str) -> impl Iterator<Item = &str> {
    value.split(',').map(str::trim)
}

/// Validates a comma-separated list of collector identifiers (`rrc00`, `rrc21`, ...).
///
/// # Returns
/// The collectors in input order, or `FilterError::InvalidCollector` naming the
/// first token that does not match.
pub fn parse_collectors(value: &str) -> Result<Vec<Collector>, FilterError> {
    split_list(value)
        .map(|token| {
            if COLLECTOR_PATTERN.is_match(token) {
                Ok(Collector(token.to_string()))
            } else {
                Err(FilterError::InvalidCollector(token.to_string()))
            }
        })
        .collect()
}

/// Validates a single peer address. No name resolution is attempted.
pub fn parse_peer(value: &str) -> Result<Peer, FilterError> {
    let value = value.trim();
    value
        .parse::<IpAddr>()
        .map(|addr| Peer { text: value.to_string(), addr })
        .map_err(|_| FilterError::InvalidPeer(value.to_string()))
}

/// Validates a comma-separated list of AS-path expressions.
///
/// Each comma-separated token is one expression. A leading `^` and a trailing
/// `$` are ignored while checking the ASN but kept in the returned expression;
/// what remains must be empty or a plain decimal number that fits in 32 bits.
/// Empty tokens (`1,,2`, `64500,`) are kept as they are.
pub fn parse_as_path(value: &str) -> Result<Vec<AsPathExpr>, FilterError> {
    split_list(value)
        .map(|expr| {
            let bare = expr.strip_prefix('^').unwrap_or(expr);
            let bare = bare.strip_suffix('$').unwrap_or(bare);

            if bare.is_empty() || is_asn(bare) {
                Ok(AsPathExpr(expr.to_string()))
            } else {
                Err(FilterError::InvalidAsPath(expr.to_string()))
            }
        })
        .collect()
}

fn is_asn(token: &str) -> bool {
    token.bytes().all(|b| b.is_ascii_digit()) && token.parse::<u32>().is_ok()
}

/// Validates a comma-separated list of CIDR prefixes, IPv4 or IPv6.
///
/// Parsing is non-strict: host bits may be set (`192.0.2.1/24` is accepted).
/// A token without `/` gets its own diagnostic since a missing mask is the
/// most common mistake.
pub fn parse_prefixes(value: &str) -> Result<Vec<Prefix>, FilterError> {
    split_list(value)
        .map(|token| {
            if !token.contains('/') {
                return Err(FilterError::PrefixMissingMask(token.to_string()));
            }
            token
                .parse::<IpNet>()
                .map(|net| Prefix { text: token.to_string(), net })
                .map_err(|_| FilterError::InvalidPrefix(token.to_string()))
        })
        .collect()
}
