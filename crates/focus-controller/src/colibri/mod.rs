//! Colibri conference control.
//!
//! The focus drives one videobridge conference per room through the
//! colibri request/reply protocol:
//!
//! - [`model`]: typed conference descriptions used for state, requests and replies
//! - [`builder`]: turns intents (allocate, expire, update) into one request
//! - [`analyser`]: merges allocation replies into the confirmed state
//! - [`connection`]: the send/await seam to the bridge
//! - [`conference`]: the per-conference controller

pub mod analyser;
pub mod builder;
pub mod conference;
pub mod connection;
pub mod model;

use std::time::Duration;

pub use builder::ColibriBuilder;
pub use conference::ColibriConference;
pub use connection::BridgeConnection;
pub use model::{
    BridgeReply, Channel, ChannelBundle, ColibriRequest, ConferenceDescription, Content,
    ErrorCondition, IceUdpTransport, MediaDirection, RtpDescription, SctpConnection,
};

/// Default bound on awaited bridge requests.
pub const DEFAULT_REPLY_TIMEOUT: Duration = Duration::from_secs(15);

/// Per-conference colibri settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColibriSettings {
    /// Bound on allocate and source-update requests.
    pub reply_timeout: Duration,
    /// Last-N stamped on allocated video channels.
    pub channel_last_n: Option<u32>,
    pub adaptive_last_n: bool,
    pub adaptive_simulcast: bool,
}

impl Default for ColibriSettings {
    fn default() -> Self {
        Self {
            reply_timeout: DEFAULT_REPLY_TIMEOUT,
            channel_last_n: None,
            adaptive_last_n: false,
            adaptive_simulcast: false,
        }
    }
}
