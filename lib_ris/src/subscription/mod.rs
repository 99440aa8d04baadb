//! # Subscription Request
//!
//! Turns a validated [`FilterSet`] into the `ris_subscribe` control message.
//!
//! The request is serialized once and then replayed verbatim on every new
//! connection, since the service keeps no state between sessions.

use serde::Serialize;

use crate::filters::{FilterSet, MessageType, RequiredKey};

/// Message type understood by the service for subscriptions.
pub const SUBSCRIBE_TYPE: &str = "ris_subscribe";

#[derive(Serialize)]
struct Envelope<'a> {
    #[serde(rename = "type")]
    kind: &'static str,
    data: SubscribeData<'a>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct SocketOptions {
    include_raw: bool,
}

// Field order here is the order on the wire.
#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct SubscribeData<'a> {
    socket_options: SocketOptions,
    more_specific: bool,
    less_specific: bool,
    auto_reconnect: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    host: Option<&'a str>,
    #[serde(rename = "type", skip_serializing_if = "Option::is_none")]
    message_type: Option<MessageType>,
    #[serde(skip_serializing_if = "Option::is_none")]
    require: Option<RequiredKey>,
    #[serde(skip_serializing_if = "Option::is_none")]
    peer: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    path: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    prefix: Option<Vec<&'a str>>,
}

/// # Subscription Request
///
/// The immutable JSON text of one `ris_subscribe` message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubscriptionRequest {
    payload: String,
}

impl SubscriptionRequest {
    /// Builds the request for `filters`.
    ///
    /// Only the first collector is sent as `host`, since the service accepts a
    /// single collector per subscription. AS-path expressions are joined with
    /// `,`; prefixes are sent as a list. Optional filters that are not set are
    /// left out entirely rather than sent as `null`.
    pub fn build(filters: &FilterSet) -> Result<Self, serde_json::Error> {
        let envelope = Envelope {
            kind: SUBSCRIBE_TYPE,
            data: SubscribeData {
                socket_options: SocketOptions { include_raw: filters.include_raw },
                more_specific: filters.more_specific,
                less_specific: filters.less_specific,
                auto_reconnect: filters.auto_reconnect,
                host: filters.collectors.first().map(|c| c.as_str()),
                message_type: filters.message_type,
                require: filters.require,
                peer: filters.peer.as_ref().map(|p| p.as_str()),
                path: filters.as_path.as_ref().map(|exprs| {
                    exprs.iter().map(|e| e.as_str()).collect::<Vec<_>>().join(",")
                }),
                prefix: filters
                    .prefixes
                    .as_ref()
                    .map(|prefixes| prefixes.iter().map(|p| p.as_str()).collect()),
            },
        };

        Ok(Self { payload: serde_json::to_string(&envelope)? })
    }

    /// The serialized message, ready to be sent as a text frame.
    pub fn as_str(&self) -> &str {
        &self.payload
    }
}
