//! In-memory videobridge.
//!
//! `FakeBridge` answers colibri requests the way a bridge does: it assigns
//! conference and channel IDs, keeps the sources and simulcast groups of
//! every channel, honours the remove-all and empty-group markers, and drops
//! a conference once its last channel expired.
//!
//! # Example
//!
//! ```rust,ignore
//! use focus_test_utils::FakeBridge;
//!
//! let bridge = Arc::new(FakeBridge::new());
//! let conference = ColibriConference::new(bridge.clone(), ColibriSettings::default());
//! // ... allocate channels, update sources ...
//! assert_eq!(bridge.simulcast_layers(&endpoint("alice")), vec![Ssrc(1), Ssrc(2)]);
//! ```

use async_trait::async_trait;
use common::types::{BridgeAddress, ConferenceId, EndpointId, MediaType};
use focus_controller::colibri::{
    BridgeConnection, BridgeReply, ColibriRequest, ConferenceDescription, ErrorCondition,
    MediaDirection,
};
use focus_controller::errors::ColibriError;
use focus_controller::sources::{GroupSemantics, Source, SourceGroup, Ssrc};
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};
use uuid::Uuid;

/// What the fake bridge remembers about one channel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FakeChannel {
    pub conference: ConferenceId,
    pub media_type: MediaType,
    pub endpoint: Option<EndpointId>,
    pub direction: Option<MediaDirection>,
    pub sources: Vec<Source>,
    pub groups: Vec<SourceGroup>,
}

#[derive(Debug, Default)]
struct FakeConference {
    channels: BTreeMap<String, FakeChannel>,
    sctp_connections: BTreeMap<String, Option<EndpointId>>,
}

impl FakeConference {
    fn is_empty(&self) -> bool {
        self.channels.is_empty() && self.sctp_connections.is_empty()
    }

    fn knows(&self, id: &str) -> bool {
        self.channels.contains_key(id) || self.sctp_connections.contains_key(id)
    }
}

#[derive(Debug, Default)]
struct BridgeState {
    conferences: BTreeMap<ConferenceId, FakeConference>,
    requests: Vec<ColibriRequest>,
}

/// Stateful fake videobridge.
#[derive(Debug, Default)]
pub struct FakeBridge {
    state: Mutex<BridgeState>,
    offline: AtomicBool,
}

fn new_id() -> String {
    Uuid::new_v4().simple().to_string()
}

fn not_found(what: String) -> BridgeReply {
    BridgeReply::Error(ErrorCondition {
        condition: "item-not-found".to_string(),
        text: Some(what),
    })
}

/// Replaces `current` with `update`; a leading remove-all source clears it.
/// An empty update leaves the channel as it was.
fn apply_sources(current: &mut Vec<Source>, update: &[Source]) {
    match update.first() {
        None => {}
        Some(first) if first.ssrc.is_remove_all() => current.clear(),
        Some(_) => *current = update.to_vec(),
    }
}

/// Replaces `current` with the non-empty groups of `update`. An empty group
/// clears every group with its semantics.
fn apply_groups(current: &mut Vec<SourceGroup>, update: &[SourceGroup]) {
    if update.is_empty() {
        return;
    }
    for cleared in update.iter().filter(|g| g.is_empty()) {
        current.retain(|g| g.semantics != cleared.semantics);
    }
    let groups: Vec<SourceGroup> = update.iter().filter(|g| !g.is_empty()).cloned().collect();
    if !groups.is_empty() {
        *current = groups;
    }
}

impl FakeBridge {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Address tests hand to `ColibriConference::set_bridge_address`.
    #[must_use]
    pub fn address() -> BridgeAddress {
        BridgeAddress::new("jvb.example.com")
    }

    /// Make every following request fail on send.
    pub fn go_offline(&self) {
        self.offline.store(true, Ordering::SeqCst);
    }

    /// Number of live conferences.
    #[must_use]
    pub fn conference_count(&self) -> usize {
        self.lock().conferences.len()
    }

    #[must_use]
    pub fn has_conference(&self, id: &ConferenceId) -> bool {
        self.lock().conferences.contains_key(id)
    }

    /// Number of live RTP channels across all conferences.
    #[must_use]
    pub fn channel_count(&self) -> usize {
        self.lock()
            .conferences
            .values()
            .map(|c| c.channels.len())
            .sum()
    }

    /// Number of live SCTP connections across all conferences.
    #[must_use]
    pub fn sctp_connection_count(&self) -> usize {
        self.lock()
            .conferences
            .values()
            .map(|c| c.sctp_connections.len())
            .sum()
    }

    #[must_use]
    pub fn channel(&self, id: &str) -> Option<FakeChannel> {
        self.lock()
            .conferences
            .values()
            .find_map(|c| c.channels.get(id).cloned())
    }

    /// Channels of one endpoint and media type.
    #[must_use]
    pub fn channels_of(&self, endpoint: &EndpointId, media_type: MediaType) -> Vec<FakeChannel> {
        self.lock()
            .conferences
            .values()
            .flat_map(|c| c.channels.values())
            .filter(|c| c.media_type == media_type && c.endpoint.as_ref() == Some(endpoint))
            .cloned()
            .collect()
    }

    /// SSRCs the bridge has for an endpoint's channels of one media type.
    #[must_use]
    pub fn ssrcs(&self, endpoint: &EndpointId, media_type: MediaType) -> Vec<Ssrc> {
        self.channels_of(endpoint, media_type)
            .iter()
            .flat_map(|c| c.sources.iter().map(|s| s.ssrc))
            .collect()
    }

    /// Simulcast layers of an endpoint's video, empty when simulcast is off.
    #[must_use]
    pub fn simulcast_layers(&self, endpoint: &EndpointId) -> Vec<Ssrc> {
        self.channels_of(endpoint, MediaType::Video)
            .iter()
            .flat_map(|c| c.groups.iter())
            .find(|g| g.semantics == GroupSemantics::Simulcast)
            .map(|g| g.ssrcs.clone())
            .unwrap_or_default()
    }

    /// Every request received, in arrival order.
    #[must_use]
    pub fn requests(&self) -> Vec<ColibriRequest> {
        self.lock().requests.clone()
    }

    #[must_use]
    pub fn request_count(&self) -> usize {
        self.lock().requests.len()
    }

    #[must_use]
    pub fn last_request(&self) -> Option<ColibriRequest> {
        self.lock().requests.last().cloned()
    }

    fn lock(&self) -> MutexGuard<'_, BridgeState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn check_online(&self) -> Result<(), ColibriError> {
        if self.offline.load(Ordering::SeqCst) {
            return Err(ColibriError::Transport("fake bridge is offline".to_string()));
        }
        Ok(())
    }

    fn process(&self, request: ColibriRequest) -> BridgeReply {
        let mut state = self.lock();
        state.requests.push(request.clone());
        let mut reply: ConferenceDescription = request.conference;

        let id = match reply.id.clone() {
            Some(id) => id,
            None => {
                let id = ConferenceId::new(new_id());
                state
                    .conferences
                    .insert(id.clone(), FakeConference::default());
                id
            }
        };
        let Some(conference) = state.conferences.get_mut(&id) else {
            return not_found(format!("conference {id} not found"));
        };

        // Updates must target live channels; expiring an unknown one is a no-op.
        for content in &reply.contents {
            let channel_ids = content
                .channels
                .iter()
                .filter(|c| c.expire != Some(0))
                .filter_map(|c| c.id.as_deref());
            let sctp_ids = content
                .sctp_connections
                .iter()
                .filter(|c| c.expire != Some(0))
                .filter_map(|c| c.id.as_deref());
            if let Some(unknown) = channel_ids
                .chain(sctp_ids)
                .find(|channel_id| !conference.knows(channel_id))
            {
                return not_found(format!("channel {unknown} not found"));
            }
        }

        for content in &mut reply.contents {
            let media_type = content.media_type;
            for channel in &mut content.channels {
                let channel_id = channel.id.get_or_insert_with(new_id).clone();
                if channel.expire == Some(0) {
                    conference.channels.remove(&channel_id);
                    continue;
                }
                let fake = conference
                    .channels
                    .entry(channel_id)
                    .or_insert_with(|| FakeChannel {
                        conference: id.clone(),
                        media_type,
                        endpoint: channel.endpoint.clone(),
                        direction: None,
                        sources: Vec::new(),
                        groups: Vec::new(),
                    });
                if channel.direction.is_some() {
                    fake.direction = channel.direction;
                }
                apply_sources(&mut fake.sources, &channel.sources);
                apply_groups(&mut fake.groups, &channel.source_groups);
            }
            for connection in &mut content.sctp_connections {
                let connection_id = connection.id.get_or_insert_with(new_id).clone();
                if connection.expire == Some(0) {
                    conference.sctp_connections.remove(&connection_id);
                } else {
                    conference
                        .sctp_connections
                        .entry(connection_id)
                        .or_insert_with(|| connection.endpoint.clone());
                }
            }
        }

        if conference.is_empty() {
            state.conferences.remove(&id);
        }
        reply.id = Some(id);
        BridgeReply::Conference(reply)
    }
}

#[async_trait]
impl BridgeConnection for FakeBridge {
    async fn send_and_await_reply(
        &self,
        request: ColibriRequest,
    ) -> Result<BridgeReply, ColibriError> {
        self.check_online()?;
        Ok(self.process(request))
    }

    async fn send(&self, request: ColibriRequest) -> Result<(), ColibriError> {
        self.check_online()?;
        self.process(request);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use focus_controller::colibri::Channel;

    fn request(conference: ConferenceDescription) -> ColibriRequest {
        ColibriRequest {
            to: FakeBridge::address(),
            seq: 1,
            conference,
        }
    }

    fn allocation(endpoint: &str, sources: Vec<Source>) -> ConferenceDescription {
        let mut conference = ConferenceDescription::new();
        conference.content_mut(MediaType::Video).channels.push(Channel {
            endpoint: Some(EndpointId::new(endpoint)),
            sources,
            ..Channel::default()
        });
        conference
    }

    fn allocated_id(reply: &BridgeReply) -> (ConferenceId, String) {
        let BridgeReply::Conference(conference) = reply else {
            panic!("expected a conference, got {reply:?}");
        };
        let channel = conference
            .content(MediaType::Video)
            .and_then(|c| c.channels.first())
            .and_then(|c| c.id.clone())
            .unwrap();
        (conference.id.clone().unwrap(), channel)
    }

    #[tokio::test]
    async fn test_allocation_assigns_ids() {
        let bridge = FakeBridge::new();
        let reply = bridge
            .send_and_await_reply(request(allocation("alice", vec![Source::new(1_u32)])))
            .await
            .unwrap();
        let (conference_id, channel_id) = allocated_id(&reply);

        assert!(bridge.has_conference(&conference_id));
        assert_eq!(bridge.channel(&channel_id).unwrap().sources.len(), 1);
        assert_eq!(
            bridge.ssrcs(&EndpointId::new("alice"), MediaType::Video),
            vec![Ssrc(1)]
        );
    }

    #[tokio::test]
    async fn test_remove_all_and_empty_group_markers() {
        let bridge = FakeBridge::new();
        let reply = bridge
            .send_and_await_reply(request(allocation("alice", vec![Source::new(1_u32)])))
            .await
            .unwrap();
        let (conference_id, channel_id) = allocated_id(&reply);

        let mut update = ConferenceDescription {
            id: Some(conference_id.clone()),
            ..ConferenceDescription::default()
        };
        let mut channel = Channel::with_id(channel_id.clone());
        channel.sources = vec![Source::new(1_u32), Source::new(2_u32)];
        channel.source_groups = vec![SourceGroup::simulcast([Ssrc(1), Ssrc(2)])];
        update.content_mut(MediaType::Video).channels.push(channel);
        bridge.send(request(update.clone())).await.unwrap();
        assert_eq!(
            bridge.simulcast_layers(&EndpointId::new("alice")),
            vec![Ssrc(1), Ssrc(2)]
        );

        let channel = update
            .content_mut(MediaType::Video)
            .channels
            .first_mut()
            .unwrap();
        channel.sources = vec![Source::remove_all()];
        channel.source_groups = vec![SourceGroup::empty_simulcast()];
        bridge.send(request(update)).await.unwrap();

        let fake = bridge.channel(&channel_id).unwrap();
        assert!(fake.sources.is_empty());
        assert!(fake.groups.is_empty());
    }

    #[tokio::test]
    async fn test_expiring_last_channel_drops_conference() {
        let bridge = FakeBridge::new();
        let reply = bridge
            .send_and_await_reply(request(allocation("alice", Vec::new())))
            .await
            .unwrap();
        let (conference_id, channel_id) = allocated_id(&reply);

        let mut expire = ConferenceDescription {
            id: Some(conference_id.clone()),
            ..ConferenceDescription::default()
        };
        let mut channel = Channel::with_id(channel_id);
        channel.expire = Some(0);
        expire.content_mut(MediaType::Video).channels.push(channel);
        bridge.send(request(expire.clone())).await.unwrap();

        assert_eq!(bridge.conference_count(), 0);
        let again = bridge.send_and_await_reply(request(expire)).await.unwrap();
        assert!(matches!(again, BridgeReply::Error(_)));
    }

    #[tokio::test]
    async fn test_offline_bridge_fails_sends() {
        let bridge = FakeBridge::new();
        bridge.go_offline();
        let result = bridge.send(request(allocation("alice", Vec::new()))).await;

        assert!(matches!(result, Err(ColibriError::Transport(_))));
        assert_eq!(bridge.request_count(), 0);
    }
}
