//! Conference Focus Controller Library
//!
//! This library provides the control-plane core of the conference focus,
//! the component that owns one conference on a videobridge:
//!
//! - Colibri conference and channel lifecycle (allocate, update, expire)
//! - Per-participant SSRC and source-group reconciliation
//! - Roster fan-out of source additions and removals to other participants
//! - Videobridge discovery and selection
//!
//! # Architecture
//!
//! ```text
//! FocusServices
//! └── BridgeSelector (picks the bridge, broadcasts up/down events)
//!
//! ParticipantRoster (one per conference)
//! ├── ParticipantState (channels, sources, pending queues)
//! └── emits SourceUpdate for each other participant
//!
//! ColibriConference (one per conference)
//! ├── ColibriBuilder   -> ColibriRequest
//! ├── BridgeConnection (transport seam, mockable)
//! └── analyser         <- allocation replies
//! ```
//!
//! Signaling, conference lifecycle policy and the XMPP transport live
//! outside this crate; they drive it through the types re-exported here.
//!
//! # Modules
//!
//! - [`bridge`] - Videobridge directory and selector
//! - [`colibri`] - Colibri request building, reply merging and conference state
//! - [`config`] - Service configuration from environment
//! - [`errors`] - Error types with failure classification
//! - [`media`] - Negotiated media contents
//! - [`observability`] - Metrics
//! - [`participant`] - Per-participant state
//! - [`roster`] - Source fan-out across the roster
//! - [`sources`] - SSRC and source-group sets

pub mod bridge;
pub mod colibri;
pub mod config;
pub mod errors;
pub mod media;
pub mod observability;
pub mod participant;
pub mod roster;
pub mod sources;
