//! Typed colibri conference descriptions.
//!
//! A [`ConferenceDescription`] is used both as the bridge-confirmed
//! conference state kept by the controller and as the body of outgoing
//! requests and incoming replies. Encoding to the wire is done elsewhere.

use crate::sources::{Source, SourceGroup};
use common::types::{BridgeAddress, ConferenceId, EndpointId, MediaType};
use std::collections::BTreeMap;

/// Media direction of a channel as seen by the bridge.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MediaDirection {
    SendRecv,
    SendOnly,
    RecvOnly,
    Inactive,
}

impl MediaDirection {
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            MediaDirection::SendRecv => "sendrecv",
            MediaDirection::SendOnly => "sendonly",
            MediaDirection::RecvOnly => "recvonly",
            MediaDirection::Inactive => "inactive",
        }
    }
}

/// One negotiated codec.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PayloadType {
    pub id: u8,
    pub name: String,
    pub clock_rate: u32,
    pub channels: Option<u8>,
    pub parameters: BTreeMap<String, String>,
}

impl PayloadType {
    #[must_use]
    pub fn new(id: u8, name: impl Into<String>, clock_rate: u32) -> Self {
        Self {
            id,
            name: name.into(),
            clock_rate,
            channels: None,
            parameters: BTreeMap::new(),
        }
    }
}

/// RTP description of one media type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RtpDescription {
    pub media_type: MediaType,
    pub payload_types: Vec<PayloadType>,
    pub rtcp_mux: bool,
}

/// DTLS certificate fingerprint.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DtlsFingerprint {
    pub hash: String,
    pub setup: Option<String>,
    pub value: String,
}

/// ICE candidate.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IceCandidate {
    pub foundation: String,
    pub component: u8,
    pub protocol: String,
    pub priority: u32,
    pub ip: String,
    pub port: u16,
    pub kind: String,
}

/// ICE-UDP transport description.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IceUdpTransport {
    pub ufrag: Option<String>,
    pub pwd: Option<String>,
    pub rtcp_mux: bool,
    pub fingerprints: Vec<DtlsFingerprint>,
    pub candidates: Vec<IceCandidate>,
}

/// Bridge-side RTP relay endpoint for one participant and media type.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Channel {
    /// Bridge-assigned channel ID; absent in allocation requests.
    pub id: Option<String>,
    pub endpoint: Option<EndpointId>,
    pub channel_bundle_id: Option<String>,
    pub initiator: Option<bool>,
    /// Seconds of inactivity before the bridge expires the channel; 0 expires now.
    pub expire: Option<u32>,
    pub direction: Option<MediaDirection>,
    pub last_n: Option<u32>,
    pub adaptive_last_n: Option<bool>,
    pub adaptive_simulcast: Option<bool>,
    pub payload_types: Vec<PayloadType>,
    pub transport: Option<IceUdpTransport>,
    pub sources: Vec<Source>,
    pub source_groups: Vec<SourceGroup>,
}

impl Channel {
    /// A request channel addressing an existing channel by ID.
    #[must_use]
    pub fn with_id(id: impl Into<String>) -> Self {
        Self {
            id: Some(id.into()),
            ..Self::default()
        }
    }
}

/// Bridge-side SCTP connection (data channels) for one participant.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SctpConnection {
    pub id: Option<String>,
    pub endpoint: Option<EndpointId>,
    pub channel_bundle_id: Option<String>,
    pub initiator: Option<bool>,
    pub expire: Option<u32>,
    pub port: Option<u16>,
    pub transport: Option<IceUdpTransport>,
}

/// Channels of one media type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Content {
    pub media_type: MediaType,
    pub channels: Vec<Channel>,
    pub sctp_connections: Vec<SctpConnection>,
}

impl Content {
    #[must_use]
    pub fn new(media_type: MediaType) -> Self {
        Self {
            media_type,
            channels: Vec::new(),
            sctp_connections: Vec::new(),
        }
    }

    #[must_use]
    pub fn channel(&self, id: &str) -> Option<&Channel> {
        self.channels.iter().find(|c| c.id.as_deref() == Some(id))
    }

    #[must_use]
    pub fn sctp_connection(&self, id: &str) -> Option<&SctpConnection> {
        self.sctp_connections
            .iter()
            .find(|c| c.id.as_deref() == Some(id))
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.channels.is_empty() && self.sctp_connections.is_empty()
    }
}

/// Transport shared by all bundled channels of one endpoint.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChannelBundle {
    pub id: String,
    pub transport: Option<IceUdpTransport>,
}

/// Shape of a colibri conference: contents, channels and bundles.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConferenceDescription {
    pub id: Option<ConferenceId>,
    pub name: Option<String>,
    pub contents: Vec<Content>,
    pub channel_bundles: Vec<ChannelBundle>,
}

impl ConferenceDescription {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn content(&self, media_type: MediaType) -> Option<&Content> {
        self.contents.iter().find(|c| c.media_type == media_type)
    }

    /// Content for `media_type`, created at the end if missing.
    #[allow(clippy::indexing_slicing)] // index comes from position() or the push below
    pub fn content_mut(&mut self, media_type: MediaType) -> &mut Content {
        let index = match self
            .contents
            .iter()
            .position(|c| c.media_type == media_type)
        {
            Some(index) => index,
            None => {
                self.contents.push(Content::new(media_type));
                self.contents.len() - 1
            }
        };
        &mut self.contents[index]
    }

    #[must_use]
    pub fn channel_bundle(&self, id: &str) -> Option<&ChannelBundle> {
        self.channel_bundles.iter().find(|b| b.id == id)
    }

    /// Number of RTP channels across all contents.
    #[must_use]
    pub fn channel_count(&self) -> usize {
        self.contents.iter().map(|c| c.channels.len()).sum()
    }

    /// Number of RTP channels of one media type.
    #[must_use]
    pub fn channel_count_for(&self, media_type: MediaType) -> usize {
        self.content(media_type).map_or(0, |c| c.channels.len())
    }

    /// Channels of `media_type` the bridge has assigned an ID to.
    #[must_use]
    pub fn allocated_channel_count_for(&self, media_type: MediaType) -> usize {
        self.content(media_type)
            .map_or(0, |c| c.channels.iter().filter(|ch| ch.id.is_some()).count())
    }

    /// True when there is nothing to put on the wire besides the ID.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.contents.iter().all(Content::is_empty) && self.channel_bundles.is_empty()
    }
}

/// An outgoing colibri request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColibriRequest {
    pub to: BridgeAddress,
    /// Per-conference sequence number, strictly increasing in send order.
    pub seq: u64,
    pub conference: ConferenceDescription,
}

/// Error element carried by a bridge reply.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ErrorCondition {
    pub condition: String,
    pub text: Option<String>,
}

impl std::fmt::Display for ErrorCondition {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.text {
            Some(text) => write!(f, "{}: {}", self.condition, text),
            None => f.write_str(&self.condition),
        }
    }
}

/// A reply delivered by the bridge connection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BridgeReply {
    /// A colibri conference description.
    Conference(ConferenceDescription),
    /// An error element.
    Error(ErrorCondition),
    /// Something that is neither; carries the payload kind for logging.
    Unexpected(String),
}
