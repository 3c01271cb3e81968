//! Source fan-out across the participants of one conference.
//!
//! When a participant announces or retracts sources, every other
//! participant has to hear about it. Participants whose signaling session
//! is up get a [`SourceUpdate`] to send right away; the others get the
//! change parked in their pending queues until
//! [`ParticipantRoster::session_established`] flushes it.

use crate::errors::RosterError;
use crate::participant::{ParticipantState, SessionHandle};
use crate::sources::{SourceGroupSet, SourceSet};
use common::types::EndpointId;
use tracing::{debug, info, warn};

/// Direction of a source update.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceUpdateKind {
    /// source-add
    Add,
    /// source-remove
    Remove,
}

/// A source-add or source-remove to signal to one participant.
#[derive(Debug, Clone, PartialEq)]
pub struct SourceUpdate {
    pub target: EndpointId,
    pub session: SessionHandle,
    pub kind: SourceUpdateKind,
    pub sources: SourceSet,
    pub groups: SourceGroupSet,
}

/// Participants of one conference, in join order.
#[derive(Debug, Default)]
pub struct ParticipantRoster {
    participants: Vec<ParticipantState>,
}

impl ParticipantRoster {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a participant.
    ///
    /// # Errors
    ///
    /// - `RosterError::ParticipantExists` - the endpoint ID is taken
    pub fn add(&mut self, participant: ParticipantState) -> Result<(), RosterError> {
        if self.get(participant.endpoint_id()).is_some() {
            return Err(RosterError::ParticipantExists(
                participant.endpoint_id().clone(),
            ));
        }
        info!(
            target: "focus.roster",
            endpoint = %participant.endpoint_id(),
            participants = self.participants.len() + 1,
            "Participant added"
        );
        self.participants.push(participant);
        Ok(())
    }

    /// Removes a participant and retracts its sources from everyone else.
    ///
    /// # Errors
    ///
    /// - `RosterError::ParticipantNotFound` - unknown endpoint
    pub fn remove(
        &mut self,
        endpoint: &EndpointId,
    ) -> Result<(ParticipantState, Vec<SourceUpdate>), RosterError> {
        let index = self
            .participants
            .iter()
            .position(|p| p.endpoint_id() == endpoint)
            .ok_or_else(|| RosterError::ParticipantNotFound(endpoint.clone()))?;
        let removed = self.participants.remove(index);

        let updates = self.route(
            endpoint,
            SourceUpdateKind::Remove,
            removed.sources(),
            removed.groups(),
        );
        info!(
            target: "focus.roster",
            endpoint = %endpoint,
            participants = self.participants.len(),
            updates = updates.len(),
            "Participant removed"
        );
        Ok((removed, updates))
    }

    pub fn get(&self, endpoint: &EndpointId) -> Option<&ParticipantState> {
        self.participants.iter().find(|p| p.endpoint_id() == endpoint)
    }

    pub fn get_mut(&mut self, endpoint: &EndpointId) -> Option<&mut ParticipantState> {
        self.participants
            .iter_mut()
            .find(|p| p.endpoint_id() == endpoint)
    }

    pub fn len(&self) -> usize {
        self.participants.len()
    }

    pub fn is_empty(&self) -> bool {
        self.participants.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &ParticipantState> {
        self.participants.iter()
    }

    /// Records sources announced by `from` and fans them out.
    ///
    /// The sources are tagged with the announcer as owner.
    ///
    /// # Errors
    ///
    /// - `RosterError::ParticipantNotFound` - unknown announcer
    pub fn announce_sources(
        &mut self,
        from: &EndpointId,
        sources: &SourceSet,
        groups: &SourceGroupSet,
    ) -> Result<Vec<SourceUpdate>, RosterError> {
        let announcer = self
            .get_mut(from)
            .ok_or_else(|| RosterError::ParticipantNotFound(from.clone()))?;
        let sources = sources.with_owner(announcer.owner());
        announcer.add_sources(&sources, groups);

        Ok(self.route(from, SourceUpdateKind::Add, &sources, groups))
    }

    /// Drops sources of `from` and fans the removal out.
    ///
    /// Only sources and groups `from` actually owns are retracted. Groups
    /// left referencing a removed source are retracted with them.
    ///
    /// # Errors
    ///
    /// - `RosterError::ParticipantNotFound` - unknown participant
    pub fn retract_sources(
        &mut self,
        from: &EndpointId,
        sources: &SourceSet,
        groups: &SourceGroupSet,
    ) -> Result<Vec<SourceUpdate>, RosterError> {
        let participant = self
            .get_mut(from)
            .ok_or_else(|| RosterError::ParticipantNotFound(from.clone()))?;
        let owned = participant.sources().intersection(sources);
        let mut owned_groups = participant.groups().intersection(groups);
        let ignored = sources.len().saturating_sub(owned.len())
            + groups.len().saturating_sub(owned_groups.len());
        if ignored > 0 {
            warn!(
                target: "focus.roster",
                endpoint = %from,
                ignored,
                "Ignoring retraction of sources the participant does not own"
            );
        }

        participant.remove_groups(&owned_groups);
        owned_groups.add(&participant.remove_sources(&owned));

        Ok(self.route(from, SourceUpdateKind::Remove, &owned, &owned_groups))
    }

    /// Marks the session of `endpoint` as established and flushes its
    /// pending queues: the add first, then the remove.
    ///
    /// # Errors
    ///
    /// - `RosterError::ParticipantNotFound` - unknown endpoint
    pub fn session_established(
        &mut self,
        endpoint: &EndpointId,
        session: SessionHandle,
    ) -> Result<Vec<SourceUpdate>, RosterError> {
        let participant = self
            .get_mut(endpoint)
            .ok_or_else(|| RosterError::ParticipantNotFound(endpoint.clone()))?;
        participant.set_session(Some(session.clone()));

        let mut updates = Vec::new();
        if let Some((sources, groups)) = participant.take_pending_add() {
            updates.push(SourceUpdate {
                target: endpoint.clone(),
                session: session.clone(),
                kind: SourceUpdateKind::Add,
                sources,
                groups,
            });
        }
        if let Some((sources, groups)) = participant.take_pending_remove() {
            updates.push(SourceUpdate {
                target: endpoint.clone(),
                session,
                kind: SourceUpdateKind::Remove,
                sources,
                groups,
            });
        }

        debug!(
            target: "focus.roster",
            endpoint = %endpoint,
            flushed = updates.len(),
            "Session established"
        );
        Ok(updates)
    }

    /// Sources and groups of everybody except `endpoint`.
    pub fn sources_except(&self, endpoint: &EndpointId) -> (SourceSet, SourceGroupSet) {
        let mut sources = SourceSet::new();
        let mut groups = SourceGroupSet::new();
        for participant in self.participants.iter().filter(|p| p.endpoint_id() != endpoint) {
            sources.add(participant.sources());
            groups.add(participant.groups());
        }
        (sources, groups)
    }

    fn route(
        &mut self,
        from: &EndpointId,
        kind: SourceUpdateKind,
        sources: &SourceSet,
        groups: &SourceGroupSet,
    ) -> Vec<SourceUpdate> {
        if sources.is_empty() && groups.is_empty() {
            return Vec::new();
        }

        let mut updates = Vec::new();
        for participant in self
            .participants
            .iter_mut()
            .filter(|p| p.endpoint_id() != from)
        {
            if let Some(session) = participant.session() {
                updates.push(SourceUpdate {
                    target: participant.endpoint_id().clone(),
                    session: session.clone(),
                    kind,
                    sources: sources.shallow_copy(),
                    groups: groups.copy(),
                });
                continue;
            }
            match kind {
                SourceUpdateKind::Add => participant.schedule_add(sources, groups),
                SourceUpdateKind::Remove => participant.schedule_remove(sources, groups),
            }
        }

        debug!(
            target: "focus.roster",
            from = %from,
            kind = ?kind,
            immediate = updates.len(),
            "Routed source update"
        );
        updates
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used, clippy::indexing_slicing)]
mod tests {
    use super::*;
    use crate::sources::{Source, SourceGroup, Ssrc};
    use common::types::MediaType;

    fn ep(name: &str) -> EndpointId {
        EndpointId::new(name)
    }

    fn member(name: &str) -> ParticipantState {
        ParticipantState::new(ep(name), format!("room@conference.example.com/{name}"))
    }

    fn audio(ssrc: i64) -> SourceSet {
        SourceSet::from_sources([(MediaType::Audio, Source::new(ssrc))])
    }

    #[test]
    fn test_duplicate_participant_rejected() {
        let mut roster = ParticipantRoster::new();
        roster.add(member("alice")).unwrap();
        assert_eq!(
            roster.add(member("alice")),
            Err(RosterError::ParticipantExists(ep("alice")))
        );
        assert_eq!(roster.len(), 1);
    }

    #[test]
    fn test_announce_routes_by_session_state() {
        let mut roster = ParticipantRoster::new();
        roster.add(member("alice")).unwrap();
        roster.add(member("bob")).unwrap();
        roster.add(member("carol")).unwrap();
        roster
            .session_established(&ep("bob"), SessionHandle::new("s-bob"))
            .unwrap();

        let updates = roster
            .announce_sources(&ep("alice"), &audio(111), &SourceGroupSet::new())
            .unwrap();

        assert_eq!(updates.len(), 1);
        assert_eq!(updates[0].target, ep("bob"));
        assert_eq!(updates[0].kind, SourceUpdateKind::Add);
        assert_eq!(
            updates[0].sources.sources_for(MediaType::Audio)[0].owner.as_deref(),
            Some("room@conference.example.com/alice")
        );
        assert!(roster.get(&ep("carol")).unwrap().has_pending_add());
        assert!(roster
            .get(&ep("alice"))
            .unwrap()
            .sources()
            .contains(MediaType::Audio, Ssrc(111)));
    }

    #[test]
    fn test_session_established_flushes_add_then_remove() {
        let mut roster = ParticipantRoster::new();
        roster.add(member("alice")).unwrap();
        roster.add(member("bob")).unwrap();
        roster
            .session_established(&ep("bob"), SessionHandle::new("s-bob"))
            .unwrap();
        roster
            .announce_sources(&ep("alice"), &audio(3), &SourceGroupSet::new())
            .unwrap();
        roster.get_mut(&ep("bob")).unwrap().set_session(None);

        roster
            .announce_sources(&ep("alice"), &audio(1), &SourceGroupSet::new())
            .unwrap();
        roster
            .announce_sources(&ep("alice"), &audio(2), &SourceGroupSet::new())
            .unwrap();
        roster
            .retract_sources(&ep("alice"), &audio(1), &SourceGroupSet::new())
            .unwrap();
        roster
            .announce_sources(&ep("alice"), &audio(1), &SourceGroupSet::new())
            .unwrap();
        roster
            .retract_sources(&ep("alice"), &audio(3), &SourceGroupSet::new())
            .unwrap();

        let updates = roster
            .session_established(&ep("bob"), SessionHandle::new("s-bob"))
            .unwrap();
        assert_eq!(updates.len(), 2);
        assert_eq!(updates[0].kind, SourceUpdateKind::Add);
        assert_eq!(
            updates[0].sources.ssrcs_for(MediaType::Audio),
            vec![Ssrc(2), Ssrc(1)]
        );
        assert_eq!(updates[1].kind, SourceUpdateKind::Remove);
        assert_eq!(updates[1].sources.ssrcs_for(MediaType::Audio), vec![Ssrc(3)]);

        let bob = roster.get(&ep("bob")).unwrap();
        assert!(!bob.has_pending_add());
        assert!(!bob.has_pending_remove());
    }

    #[test]
    fn test_retract_ignores_sources_owned_by_someone_else() {
        let mut roster = ParticipantRoster::new();
        for name in ["alice", "bob", "carol"] {
            roster.add(member(name)).unwrap();
        }
        roster
            .session_established(&ep("carol"), SessionHandle::new("s-carol"))
            .unwrap();
        roster
            .announce_sources(&ep("alice"), &audio(111), &SourceGroupSet::new())
            .unwrap();

        let updates = roster
            .retract_sources(&ep("bob"), &audio(111), &SourceGroupSet::new())
            .unwrap();

        assert!(updates.is_empty());
        assert!(!roster.get(&ep("alice")).unwrap().has_pending_remove());
        assert!(roster
            .get(&ep("alice"))
            .unwrap()
            .sources()
            .contains(MediaType::Audio, Ssrc(111)));
        let (seen_by_carol, _) = roster.sources_except(&ep("carol"));
        assert_eq!(seen_by_carol.ssrcs_for(MediaType::Audio), vec![Ssrc(111)]);
    }

    #[test]
    fn test_retracting_layers_retracts_their_group() {
        let mut roster = ParticipantRoster::new();
        roster.add(member("alice")).unwrap();
        roster.add(member("bob")).unwrap();
        roster
            .session_established(&ep("bob"), SessionHandle::new("s-bob"))
            .unwrap();
        let layers = SourceSet::from_sources([
            (MediaType::Video, Source::new(10_i64)),
            (MediaType::Video, Source::new(20_i64)),
        ]);
        let sim = SourceGroupSet::from_groups([(
            MediaType::Video,
            SourceGroup::simulcast([Ssrc(10), Ssrc(20)]),
        )]);
        roster.announce_sources(&ep("alice"), &layers, &sim).unwrap();

        let updates = roster
            .retract_sources(&ep("alice"), &layers, &SourceGroupSet::new())
            .unwrap();

        assert_eq!(updates.len(), 1);
        assert_eq!(updates[0].kind, SourceUpdateKind::Remove);
        assert_eq!(updates[0].sources.len(), 2);
        assert_eq!(updates[0].groups, sim);
        assert!(roster.get(&ep("alice")).unwrap().groups().is_empty());
    }

    #[test]
    fn test_remove_retracts_sources_from_others() {
        let mut roster = ParticipantRoster::new();
        roster.add(member("alice")).unwrap();
        roster.add(member("bob")).unwrap();
        roster
            .session_established(&ep("bob"), SessionHandle::new("s-bob"))
            .unwrap();
        roster
            .announce_sources(&ep("alice"), &audio(111), &SourceGroupSet::new())
            .unwrap();

        let (alice, updates) = roster.remove(&ep("alice")).unwrap();
        assert_eq!(alice.endpoint_id(), &ep("alice"));
        assert_eq!(updates.len(), 1);
        assert_eq!(updates[0].kind, SourceUpdateKind::Remove);
        assert!(updates[0].sources.contains(MediaType::Audio, Ssrc(111)));
        assert_eq!(roster.len(), 1);
        assert_eq!(
            roster.remove(&ep("alice")).map(|_| ()),
            Err(RosterError::ParticipantNotFound(ep("alice")))
        );
    }

    #[test]
    fn test_leave_before_flush_nets_out() {
        let mut roster = ParticipantRoster::new();
        roster.add(member("alice")).unwrap();
        roster.add(member("bob")).unwrap();
        roster
            .announce_sources(&ep("alice"), &audio(111), &SourceGroupSet::new())
            .unwrap();
        roster.remove(&ep("alice")).unwrap();

        let updates = roster
            .session_established(&ep("bob"), SessionHandle::new("s-bob"))
            .unwrap();
        assert!(updates.is_empty());
    }

    #[test]
    fn test_sources_except() {
        let mut roster = ParticipantRoster::new();
        for name in ["alice", "bob", "carol"] {
            roster.add(member(name)).unwrap();
        }
        roster
            .announce_sources(&ep("alice"), &audio(1), &SourceGroupSet::new())
            .unwrap();
        roster
            .announce_sources(&ep("bob"), &audio(2), &SourceGroupSet::new())
            .unwrap();

        let (sources, _) = roster.sources_except(&ep("bob"));
        assert_eq!(sources.ssrcs_for(MediaType::Audio), vec![Ssrc(1)]);
    }

    #[test]
    fn test_empty_announcement_produces_nothing() {
        let mut roster = ParticipantRoster::new();
        roster.add(member("alice")).unwrap();
        roster.add(member("bob")).unwrap();
        roster
            .session_established(&ep("bob"), SessionHandle::new("s-bob"))
            .unwrap();

        let updates = roster
            .announce_sources(&ep("alice"), &SourceSet::new(), &SourceGroupSet::new())
            .unwrap();
        assert!(updates.is_empty());
    }
}
