//! Per-participant media state.
//!
//! A [`ParticipantState`] tracks what the focus knows about one conference
//! member: its signaling session, its bridge channels, the sources it has
//! announced, and the sources of other members waiting to be signaled to
//! it. Sources learned from other members while this member's session is
//! not up yet are parked in the pending queues and flushed later.
//!
//! # Pending queues
//!
//! A source or group is never in both queues at once. Scheduling an add for
//! something queued for removal cancels the removal (and vice versa)
//! instead of queuing both, so out-of-order add/remove pairs net out.

use crate::colibri::model::ConferenceDescription;
use crate::media::MediaContent;
use crate::sources::{SourceGroupSet, SourceSet};
use common::types::EndpointId;
use std::collections::HashSet;
use std::fmt;
use tracing::debug;

/// Opaque handle of an established signaling session.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SessionHandle(String);

impl SessionHandle {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SessionHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Protocol feature advertised by a participant through service discovery.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Feature {
    RtcpMux,
    RtpBundle,
    Dtls,
    IceUdp,
    Sctp,
    Audio,
    Video,
    /// Marks the SIP gateway component.
    SipGateway,
}

impl Feature {
    /// Every known feature.
    pub const ALL: [Feature; 8] = [
        Feature::RtcpMux,
        Feature::RtpBundle,
        Feature::Dtls,
        Feature::IceUdp,
        Feature::Sctp,
        Feature::Audio,
        Feature::Video,
        Feature::SipGateway,
    ];

    /// Discovery URI of the feature.
    #[must_use]
    pub fn uri(&self) -> &'static str {
        match self {
            Feature::RtcpMux => "urn:ietf:rfc:5761",
            Feature::RtpBundle => "urn:ietf:rfc:5888",
            Feature::Dtls => "urn:xmpp:jingle:apps:dtls:0",
            Feature::IceUdp => "urn:xmpp:jingle:transports:ice-udp:1",
            Feature::Sctp => "urn:xmpp:jingle:transports:dtls-sctp:1",
            Feature::Audio => "urn:xmpp:jingle:apps:rtp:audio",
            Feature::Video => "urn:xmpp:jingle:apps:rtp:video",
            Feature::SipGateway => "http://jitsi.org/protocol/jigasi",
        }
    }

    /// Parses a discovery URI; unknown URIs give `None`.
    #[must_use]
    pub fn from_uri(uri: &str) -> Option<Feature> {
        Feature::ALL.into_iter().find(|f| f.uri() == uri)
    }
}

/// State of one conference participant.
#[derive(Debug, Clone)]
pub struct ParticipantState {
    endpoint_id: EndpointId,
    /// Full address of the member, stamped on its sources.
    owner: String,
    session: Option<SessionHandle>,
    channels: Option<ConferenceDescription>,
    sources: SourceSet,
    groups: SourceGroupSet,
    pending_add_sources: SourceSet,
    pending_add_groups: SourceGroupSet,
    pending_remove_sources: SourceSet,
    pending_remove_groups: SourceGroupSet,
    features: HashSet<Feature>,
    muted: bool,
    held: bool,
    pub display_name: Option<String>,
    pub external_id: Option<String>,
}

impl ParticipantState {
    /// New participant with no session, channels or sources.
    pub fn new(endpoint_id: EndpointId, owner: impl Into<String>) -> Self {
        Self {
            endpoint_id,
            owner: owner.into(),
            session: None,
            channels: None,
            sources: SourceSet::new(),
            groups: SourceGroupSet::new(),
            pending_add_sources: SourceSet::new(),
            pending_add_groups: SourceGroupSet::new(),
            pending_remove_sources: SourceSet::new(),
            pending_remove_groups: SourceGroupSet::new(),
            features: HashSet::new(),
            muted: false,
            held: false,
            display_name: None,
            external_id: None,
        }
    }

    pub fn endpoint_id(&self) -> &EndpointId {
        &self.endpoint_id
    }

    pub fn owner(&self) -> &str {
        &self.owner
    }

    // --- Session and channels -------------------------------------------

    pub fn session(&self) -> Option<&SessionHandle> {
        self.session.as_ref()
    }

    pub fn set_session(&mut self, session: Option<SessionHandle>) {
        self.session = session;
    }

    pub fn has_session(&self) -> bool {
        self.session.is_some()
    }

    /// Bridge channels allocated for this participant.
    pub fn channels(&self) -> Option<&ConferenceDescription> {
        self.channels.as_ref()
    }

    pub fn set_channels(&mut self, channels: Option<ConferenceDescription>) {
        self.channels = channels;
    }

    // --- Own sources ----------------------------------------------------

    pub fn sources(&self) -> &SourceSet {
        &self.sources
    }

    pub fn groups(&self) -> &SourceGroupSet {
        &self.groups
    }

    /// Copy of the sources sharing the source records.
    pub fn sources_copy(&self) -> SourceSet {
        self.sources.shallow_copy()
    }

    pub fn groups_copy(&self) -> SourceGroupSet {
        self.groups.copy()
    }

    /// Imports the sources and groups of an accepted answer.
    ///
    /// Every source is tagged with this participant as owner. Returns the
    /// sources and groups that were not known before.
    pub fn import_from_answer(&mut self, contents: &[MediaContent]) -> (SourceSet, SourceGroupSet) {
        let mut new_sources = SourceSet::from_contents(contents).with_owner(&self.owner);
        new_sources.remove(&self.sources);
        let mut new_groups = SourceGroupSet::from_contents(contents);
        new_groups.remove(&self.groups);

        self.sources.add(&new_sources);
        self.groups.add(&new_groups);

        debug!(
            target: "focus.participant",
            endpoint = %self.endpoint_id,
            sources = new_sources.len(),
            groups = new_groups.len(),
            "Imported sources from answer"
        );
        (new_sources, new_groups)
    }

    /// Adds sources announced later by this participant (source-add).
    pub fn add_sources(&mut self, sources: &SourceSet, groups: &SourceGroupSet) {
        self.sources.add(&sources.with_owner(&self.owner));
        self.groups.add(groups);
    }

    /// Removes sources, along with every group that still references one of
    /// them. Returns the groups dropped that way.
    pub fn remove_sources(&mut self, sources: &SourceSet) -> SourceGroupSet {
        self.sources.remove(sources);
        let orphaned = self.groups.uncovered_by(&self.sources);
        self.groups.remove(&orphaned);
        orphaned
    }

    pub fn remove_groups(&mut self, groups: &SourceGroupSet) {
        self.groups.remove(groups);
    }

    // --- Pending queues -------------------------------------------------

    /// Queues sources of another participant to be added to this one's
    /// session. Anything queued for removal is cancelled instead.
    pub fn schedule_add(&mut self, sources: &SourceSet, groups: &SourceGroupSet) {
        let cancelled_sources = self.pending_remove_sources.intersection(sources);
        let cancelled_groups = self.pending_remove_groups.intersection(groups);
        self.pending_remove_sources.remove(&cancelled_sources);
        self.pending_remove_groups.remove(&cancelled_groups);

        let mut sources = sources.shallow_copy();
        sources.remove(&cancelled_sources);
        let mut groups = groups.copy();
        groups.remove(&cancelled_groups);
        self.pending_add_sources.add(&sources);
        self.pending_add_groups.add(&groups);

        debug!(
            target: "focus.participant",
            endpoint = %self.endpoint_id,
            queued = sources.len() + groups.len(),
            cancelled = cancelled_sources.len() + cancelled_groups.len(),
            "Scheduled source add"
        );
    }

    /// Queues sources of another participant to be removed from this one's
    /// session. Anything queued for addition is cancelled instead.
    pub fn schedule_remove(&mut self, sources: &SourceSet, groups: &SourceGroupSet) {
        let cancelled_sources = self.pending_add_sources.intersection(sources);
        let cancelled_groups = self.pending_add_groups.intersection(groups);
        self.pending_add_sources.remove(&cancelled_sources);
        self.pending_add_groups.remove(&cancelled_groups);

        let mut sources = sources.shallow_copy();
        sources.remove(&cancelled_sources);
        let mut groups = groups.copy();
        groups.remove(&cancelled_groups);
        self.pending_remove_sources.add(&sources);
        self.pending_remove_groups.add(&groups);

        debug!(
            target: "focus.participant",
            endpoint = %self.endpoint_id,
            queued = sources.len() + groups.len(),
            cancelled = cancelled_sources.len() + cancelled_groups.len(),
            "Scheduled source remove"
        );
    }

    pub fn has_pending_add(&self) -> bool {
        !self.pending_add_sources.is_empty() || !self.pending_add_groups.is_empty()
    }

    pub fn has_pending_remove(&self) -> bool {
        !self.pending_remove_sources.is_empty() || !self.pending_remove_groups.is_empty()
    }

    pub fn pending_add(&self) -> (&SourceSet, &SourceGroupSet) {
        (&self.pending_add_sources, &self.pending_add_groups)
    }

    pub fn pending_remove(&self) -> (&SourceSet, &SourceGroupSet) {
        (&self.pending_remove_sources, &self.pending_remove_groups)
    }

    /// Empties the add queue. Call once the source-add has been dispatched.
    pub fn clear_pending_add(&mut self) {
        self.pending_add_sources = SourceSet::new();
        self.pending_add_groups = SourceGroupSet::new();
    }

    /// Empties the remove queue. Call once the source-remove has been
    /// dispatched.
    pub fn clear_pending_remove(&mut self) {
        self.pending_remove_sources = SourceSet::new();
        self.pending_remove_groups = SourceGroupSet::new();
    }

    /// Takes the add queue, leaving it empty. `None` when it was empty.
    pub fn take_pending_add(&mut self) -> Option<(SourceSet, SourceGroupSet)> {
        if !self.has_pending_add() {
            return None;
        }
        Some((
            std::mem::take(&mut self.pending_add_sources),
            std::mem::take(&mut self.pending_add_groups),
        ))
    }

    /// Takes the remove queue, leaving it empty. `None` when it was empty.
    pub fn take_pending_remove(&mut self) -> Option<(SourceSet, SourceGroupSet)> {
        if !self.has_pending_remove() {
            return None;
        }
        Some((
            std::mem::take(&mut self.pending_remove_sources),
            std::mem::take(&mut self.pending_remove_groups),
        ))
    }

    // --- Capabilities ---------------------------------------------------

    /// Replaces the feature set from discovery URIs. Unknown URIs are skipped.
    pub fn set_supported_features<'a>(&mut self, uris: impl IntoIterator<Item = &'a str>) {
        self.features = uris.into_iter().filter_map(Feature::from_uri).collect();
    }

    pub fn supports(&self, feature: Feature) -> bool {
        self.features.contains(&feature)
    }

    /// Bundling needs both rtcp-mux and bundle.
    pub fn has_bundle_support(&self) -> bool {
        self.supports(Feature::RtcpMux) && self.supports(Feature::RtpBundle)
    }

    pub fn has_dtls_support(&self) -> bool {
        self.supports(Feature::Dtls)
    }

    pub fn has_ice_support(&self) -> bool {
        self.supports(Feature::IceUdp)
    }

    pub fn has_sctp_support(&self) -> bool {
        self.supports(Feature::Sctp)
    }

    pub fn has_audio_support(&self) -> bool {
        self.supports(Feature::Audio)
    }

    pub fn has_video_support(&self) -> bool {
        self.supports(Feature::Video)
    }

    pub fn is_sip_gateway(&self) -> bool {
        self.supports(Feature::SipGateway)
    }

    // --- Mute / hold ----------------------------------------------------

    /// Last requested mute state.
    pub fn is_muted(&self) -> bool {
        self.muted
    }

    pub fn set_muted(&mut self, muted: bool) {
        self.muted = muted;
    }

    /// Last requested hold state.
    pub fn is_held(&self) -> bool {
        self.held
    }

    pub fn set_held(&mut self, held: bool) {
        self.held = held;
    }
}
