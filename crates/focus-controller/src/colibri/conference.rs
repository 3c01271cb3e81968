//! Per-conference colibri controller.
//!
//! One [`ColibriConference`] drives one videobridge conference. It keeps
//! the bridge-confirmed conference state, which only changes by merging a
//! successful allocation reply or by expiring the whole conference, and
//! hands out owned snapshots of it.
//!
//! Allocation and source updates wait for the bridge (bounded by
//! [`ColibriSettings::reply_timeout`]); every other operation is handed to
//! the connection and forgotten. Calls are serialized on the conference
//! lock, and every request carries the next per-conference sequence
//! number, so sequence order is send order.

use super::analyser;
use super::builder::ColibriBuilder;
use super::connection::BridgeConnection;
use super::model::{
    BridgeReply, ColibriRequest, ConferenceDescription, IceUdpTransport, MediaDirection,
    RtpDescription,
};
use super::ColibriSettings;
use crate::errors::ColibriError;
use crate::media::MediaContent;
use crate::observability::metrics;
use crate::sources::{SourceGroupSet, SourceSet};
use common::types::{BridgeAddress, ConferenceId, EndpointId, MediaType};
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::Mutex;
use tracing::{debug, info, instrument, warn};

/// State guarded by the conference lock.
#[derive(Debug, Default)]
struct ConferenceInner {
    bridge: Option<BridgeAddress>,
    state: ConferenceDescription,
    /// Bumped on every change of `state`.
    version: u64,
}

/// Controller of one colibri conference.
pub struct ColibriConference {
    connection: Arc<dyn BridgeConnection>,
    settings: ColibriSettings,
    inner: Mutex<ConferenceInner>,
    just_allocated: AtomicBool,
    seq: AtomicU64,
}

impl ColibriConference {
    /// Create a controller with no bridge and no conference.
    pub fn new(connection: Arc<dyn BridgeConnection>, settings: ColibriSettings) -> Self {
        Self {
            connection,
            settings,
            inner: Mutex::new(ConferenceInner::default()),
            just_allocated: AtomicBool::new(false),
            seq: AtomicU64::new(0),
        }
    }

    pub fn settings(&self) -> &ColibriSettings {
        &self.settings
    }

    /// Set the bridge hosting this conference.
    ///
    /// # Errors
    ///
    /// - `ColibriError::IllegalState` - the conference is already allocated
    ///   on a different bridge
    pub async fn set_bridge_address(&self, address: BridgeAddress) -> Result<(), ColibriError> {
        let mut inner = self.inner.lock().await;
        if inner.bridge.as_ref() == Some(&address) {
            return Ok(());
        }
        if let Some(id) = &inner.state.id {
            return Err(ColibriError::IllegalState(format!(
                "conference {id} is already allocated, cannot move it to {address}"
            )));
        }
        debug!(target: "focus.colibri.conference", bridge = %address, "Bridge address set");
        inner.bridge = Some(address);
        Ok(())
    }

    pub async fn bridge_address(&self) -> Option<BridgeAddress> {
        self.inner.lock().await.bridge.clone()
    }

    /// Bridge-assigned conference ID, `None` until the first allocation and
    /// again after the conference was expired.
    pub async fn conference_id(&self) -> Option<ConferenceId> {
        self.inner.lock().await.state.id.clone()
    }

    /// Copy of the bridge-confirmed conference state.
    pub async fn snapshot(&self) -> ConferenceDescription {
        self.inner.lock().await.state.clone()
    }

    /// Version of the conference state; changes whenever the state does.
    pub async fn state_version(&self) -> u64 {
        self.inner.lock().await.version
    }

    /// Set the conference name sent along with every request.
    pub async fn set_name(&self, name: impl Into<String>) {
        let mut inner = self.inner.lock().await;
        inner.state.name = Some(name.into());
        inner.version += 1;
    }

    pub async fn name(&self) -> Option<String> {
        self.inner.lock().await.state.name.clone()
    }

    /// Allocate channels for one participant and wait for the bridge.
    ///
    /// Returns the part of the reply describing the requested contents. The
    /// first successful allocation assigns the conference ID and raises the
    /// just-allocated signal. A failed call leaves the conference state as
    /// it was.
    ///
    /// # Errors
    ///
    /// - `ColibriError::IllegalState` - no bridge address, or nothing to allocate
    /// - `ColibriError::NetworkFailure` - no reply within the reply timeout
    /// - `ColibriError::Transport` - the request could not be sent
    /// - `ColibriError::Protocol` - error reply, or a reply that is not a
    ///   valid conference description
    #[instrument(skip_all, name = "focus.colibri.allocate", fields(endpoint = %endpoint, use_bundle = use_bundle))]
    pub async fn allocate_channels(
        &self,
        use_bundle: bool,
        endpoint: &EndpointId,
        peer_is_initiator: bool,
        contents: &[MediaContent],
    ) -> Result<ConferenceDescription, ColibriError> {
        let started = Instant::now();
        let result = self
            .allocate(use_bundle, endpoint, peer_is_initiator, contents)
            .await;
        metrics::record_allocate_duration(started.elapsed());
        metrics::record_colibri_request(
            "allocate_channels",
            result.as_ref().map_or_else(ColibriError::metric_label, |_| "success"),
        );
        if let Err(e) = &result {
            warn!(
                target: "focus.colibri.conference",
                endpoint = %endpoint,
                error = %e,
                "Failed to allocate colibri channels"
            );
        }
        result
    }

    async fn allocate(
        &self,
        use_bundle: bool,
        endpoint: &EndpointId,
        peer_is_initiator: bool,
        contents: &[MediaContent],
    ) -> Result<ConferenceDescription, ColibriError> {
        let mut inner = self.inner.lock().await;
        let bridge = require_bridge(&inner)?;

        let request = self
            .build(&inner, bridge.clone(), |builder| {
                builder.add_allocate_channels_req(use_bundle, endpoint, peer_is_initiator, contents)
            })
            .ok_or_else(|| {
                ColibriError::IllegalState(format!("no media contents to allocate for {endpoint}"))
            })?;
        let seq = request.seq;

        // No retry here: the caller decides what a failed allocation means.
        let reply = match tokio::time::timeout(
            self.settings.reply_timeout,
            self.connection.send_and_await_reply(request),
        )
        .await
        {
            Ok(reply) => reply?,
            Err(_) => {
                return Err(ColibriError::NetworkFailure(format!(
                    "no allocation reply from {bridge} within {}ms",
                    self.settings.reply_timeout.as_millis()
                )))
            }
        };

        let conference = match reply {
            BridgeReply::Conference(conference) => conference,
            BridgeReply::Error(condition) => {
                return Err(ColibriError::Protocol(format!(
                    "allocation rejected by {bridge}: {condition}"
                )))
            }
            BridgeReply::Unexpected(kind) => {
                return Err(ColibriError::Protocol(format!(
                    "allocation reply from {bridge} is not a colibri conference: {kind}"
                )))
            }
        };

        let conference_existed = inner.state.id.is_some();
        let mut merged = inner.state.clone();
        analyser::process_channel_alloc_resp(&mut merged, &conference)?;
        inner.state = merged;
        inner.version += 1;

        if !conference_existed {
            self.just_allocated.store(true, Ordering::SeqCst);
            info!(
                target: "focus.colibri.conference",
                conference_id = ?inner.state.id,
                bridge = %bridge,
                "Colibri conference allocated"
            );
        }
        debug!(
            target: "focus.colibri.conference",
            endpoint = %endpoint,
            seq = seq,
            channels = inner.state.channel_count(),
            "Channels allocated"
        );

        Ok(analyser::response_contents(&conference, contents))
    }

    /// Whether a conference was allocated since the last call. Reading
    /// clears the signal.
    pub fn has_just_allocated(&self) -> bool {
        self.just_allocated.swap(false, Ordering::SeqCst)
    }

    /// Expire the given channels. Fire-and-forget.
    pub async fn expire_channels(&self, channels: &ConferenceDescription) {
        let inner = self.inner.lock().await;
        self.dispatch("expire_channels", &inner, |builder| {
            builder.add_expire_channels_req(channels)
        })
        .await;
    }

    /// Expire every channel of the conference and forget it.
    ///
    /// Does nothing when no conference was allocated. Afterwards the
    /// conference ID is unset, so the next allocation creates a new
    /// conference on the bridge.
    pub async fn expire_conference(&self) {
        let mut inner = self.inner.lock().await;
        let Some(conference_id) = inner.state.id.clone() else {
            info!(
                target: "focus.colibri.conference",
                "Nothing to expire - no conference allocated yet"
            );
            return;
        };

        self.dispatch("expire_conference", &inner, |builder| {
            builder.add_expire_channels_req(&inner.state)
        })
        .await;

        inner.state = ConferenceDescription::default();
        inner.version += 1;
        info!(
            target: "focus.colibri.conference",
            conference_id = %conference_id,
            "Colibri conference expired"
        );
    }

    /// Send updated codec descriptions for the given channels. Fire-and-forget.
    pub async fn update_rtp_description(
        &self,
        descriptions: &BTreeMap<MediaType, RtpDescription>,
        channels: &ConferenceDescription,
    ) {
        let inner = self.inner.lock().await;
        self.dispatch("update_rtp_description", &inner, |builder| {
            builder.add_rtp_description(descriptions, channels)
        })
        .await;
    }

    /// Send per-media transport for the given channels. Fire-and-forget.
    pub async fn update_transport_info(
        &self,
        initiator: bool,
        transports: &BTreeMap<MediaType, IceUdpTransport>,
        channels: &ConferenceDescription,
    ) {
        let inner = self.inner.lock().await;
        self.dispatch("update_transport", &inner, |builder| {
            builder.add_transport_update_req(initiator, transports, channels)
        })
        .await;
    }

    /// Send the bundled transport of a participant. Fire-and-forget.
    pub async fn update_bundle_transport_info(
        &self,
        initiator: bool,
        transport: &IceUdpTransport,
        channels: &ConferenceDescription,
    ) {
        let inner = self.inner.lock().await;
        self.dispatch("update_bundle_transport", &inner, |builder| {
            builder.add_bundle_transport_update_req(initiator, transport, channels)
        })
        .await;
    }

    /// Replace the sources and groups of the given channels and wait until
    /// the bridge has answered.
    ///
    /// Media types without sources or groups are sent the clearing
    /// sentinels. The reply is not merged into the conference state.
    ///
    /// # Errors
    ///
    /// - `ColibriError::IllegalState` - no bridge address
    /// - `ColibriError::NetworkFailure` - no reply within the reply timeout
    /// - `ColibriError::Transport` - the request could not be sent
    /// - `ColibriError::Protocol` - the bridge answered with an error
    #[instrument(skip_all, name = "focus.colibri.update_sources", fields(sources = sources.len()))]
    pub async fn update_sources(
        &self,
        sources: &SourceSet,
        groups: &SourceGroupSet,
        channels: &ConferenceDescription,
    ) -> Result<(), ColibriError> {
        let result = self.send_sources(sources, groups, channels).await;
        metrics::record_colibri_request(
            "update_sources",
            result.as_ref().map_or_else(ColibriError::metric_label, |_| "success"),
        );
        if let Err(e) = &result {
            warn!(target: "focus.colibri.conference", error = %e, "Failed to update sources");
        }
        result
    }

    async fn send_sources(
        &self,
        sources: &SourceSet,
        groups: &SourceGroupSet,
        channels: &ConferenceDescription,
    ) -> Result<(), ColibriError> {
        let inner = self.inner.lock().await;
        let bridge = require_bridge(&inner)?;
        let Some(request) = self.build(&inner, bridge.clone(), |builder| {
            builder.add_source_update_req(sources, groups, channels)
        }) else {
            debug!(target: "focus.colibri.conference", "No channels to update sources on");
            return Ok(());
        };

        let reply = match tokio::time::timeout(
            self.settings.reply_timeout,
            self.connection.send_and_await_reply(request),
        )
        .await
        {
            Ok(reply) => reply?,
            Err(_) => {
                return Err(ColibriError::NetworkFailure(format!(
                    "no source update reply from {bridge} within {}ms",
                    self.settings.reply_timeout.as_millis()
                )))
            }
        };

        match reply {
            BridgeReply::Error(condition) => Err(ColibriError::Protocol(format!(
                "source update rejected by {bridge}: {condition}"
            ))),
            BridgeReply::Conference(_) | BridgeReply::Unexpected(_) => Ok(()),
        }
    }

    /// Ask the bridge to mute (`inactive`) or unmute (`sendrecv`) the audio
    /// and video channels of a participant.
    ///
    /// Only dispatches the request; the caller records the new mute state.
    ///
    /// # Errors
    ///
    /// - `ColibriError::MissingMediaType` - no allocated audio or video channel;
    ///   nothing is sent
    /// - `ColibriError::IllegalState` - no bridge address
    pub async fn mute_participant(
        &self,
        channels: &ConferenceDescription,
        mute: bool,
    ) -> Result<(), ColibriError> {
        self.set_direction("mute_participant", channels, mute).await
    }

    /// Put a participant on hold (`inactive`) or take it off hold
    /// (`sendrecv`). Same contract as [`Self::mute_participant`].
    ///
    /// # Errors
    ///
    /// - `ColibriError::MissingMediaType` - no allocated audio or video channel;
    ///   nothing is sent
    /// - `ColibriError::IllegalState` - no bridge address
    pub async fn hold_participant(
        &self,
        channels: &ConferenceDescription,
        hold: bool,
    ) -> Result<(), ColibriError> {
        self.set_direction("hold_participant", channels, hold).await
    }

    async fn set_direction(
        &self,
        operation: &'static str,
        channels: &ConferenceDescription,
        inactive: bool,
    ) -> Result<(), ColibriError> {
        for media_type in [MediaType::Audio, MediaType::Video] {
            if channels.allocated_channel_count_for(media_type) == 0 {
                metrics::record_colibri_request(operation, "illegal_state");
                warn!(
                    target: "focus.colibri.conference",
                    operation = operation,
                    media_type = %media_type,
                    "Direction change needs audio and video channels"
                );
                return Err(ColibriError::MissingMediaType {
                    operation,
                    media_type,
                });
            }
        }

        let direction = if inactive {
            MediaDirection::Inactive
        } else {
            MediaDirection::SendRecv
        };

        let inner = self.inner.lock().await;
        if let Err(e) = require_bridge(&inner) {
            metrics::record_colibri_request(operation, e.metric_label());
            return Err(e);
        }
        self.dispatch(operation, &inner, |builder| {
            builder.add_direction_update_req(channels, direction)
        })
        .await;
        Ok(())
    }

    fn next_seq(&self) -> u64 {
        self.seq.fetch_add(1, Ordering::SeqCst) + 1
    }

    /// Build one request against the current state, or `None` when the
    /// intents added nothing.
    fn build(
        &self,
        inner: &ConferenceInner,
        bridge: BridgeAddress,
        add: impl FnOnce(&mut ColibriBuilder) -> bool,
    ) -> Option<ColibriRequest> {
        let mut builder = ColibriBuilder::new(inner.state.id.clone(), &self.settings)
            .with_name(inner.state.name.clone());
        if !add(&mut builder) {
            return None;
        }
        builder.build(bridge, self.next_seq())
    }

    /// Build and send a fire-and-forget request. Send failures are logged,
    /// not returned.
    async fn dispatch(
        &self,
        operation: &'static str,
        inner: &ConferenceInner,
        add: impl FnOnce(&mut ColibriBuilder) -> bool,
    ) {
        let Some(bridge) = inner.bridge.clone() else {
            metrics::record_colibri_request(operation, "illegal_state");
            warn!(
                target: "focus.colibri.conference",
                operation = operation,
                "No bridge address set, request dropped"
            );
            return;
        };
        let Some(request) = self.build(inner, bridge, add) else {
            debug!(target: "focus.colibri.conference", operation = operation, "Nothing to send");
            return;
        };

        let seq = request.seq;
        match self.connection.send(request).await {
            Ok(()) => {
                metrics::record_colibri_request(operation, "success");
                debug!(target: "focus.colibri.conference", operation = operation, seq = seq, "Request sent");
            }
            Err(e) => {
                metrics::record_colibri_request(operation, e.metric_label());
                warn!(
                    target: "focus.colibri.conference",
                    operation = operation,
                    seq = seq,
                    error = %e,
                    "Failed to send request"
                );
            }
        }
    }
}

fn require_bridge(inner: &ConferenceInner) -> Result<BridgeAddress, ColibriError> {
    inner
        .bridge
        .clone()
        .ok_or_else(|| ColibriError::IllegalState("no bridge address set".to_string()))
}
