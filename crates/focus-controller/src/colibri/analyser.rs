//! Merges allocation replies into the confirmed conference state.

use super::model::ConferenceDescription;
use crate::errors::ColibriError;
use crate::media::MediaContent;
use tracing::debug;

/// Validates an allocation reply and merges it into `state`.
///
/// The reply must carry a conference ID, equal to the one in `state` when
/// `state` already has one, and every channel and SCTP connection in
/// it must carry an ID. Entries already present in `state` (same ID) are
/// left as they are. `state` is untouched when validation fails.
pub fn process_channel_alloc_resp(
    state: &mut ConferenceDescription,
    reply: &ConferenceDescription,
) -> Result<(), ColibriError> {
    let Some(reply_id) = &reply.id else {
        return Err(ColibriError::Protocol(
            "allocation reply carries no conference id".to_string(),
        ));
    };
    if let Some(known) = &state.id {
        if known != reply_id {
            return Err(ColibriError::Protocol(format!(
                "allocation reply is for conference {reply_id}, expected {known}"
            )));
        }
    }
    for content in &reply.contents {
        let unnamed = content.channels.iter().any(|c| c.id.is_none())
            || content.sctp_connections.iter().any(|c| c.id.is_none());
        if unnamed {
            return Err(ColibriError::Protocol(format!(
                "allocation reply has a {} channel without id",
                content.media_type
            )));
        }
    }

    state.id = Some(reply_id.clone());
    if state.name.is_none() {
        state.name.clone_from(&reply.name);
    }

    for content in &reply.contents {
        let target = state.content_mut(content.media_type);
        for channel in &content.channels {
            let known = channel
                .id
                .as_deref()
                .is_some_and(|id| target.channel(id).is_some());
            if !known {
                target.channels.push(channel.clone());
            }
        }
        for connection in &content.sctp_connections {
            let known = connection
                .id
                .as_deref()
                .is_some_and(|id| target.sctp_connection(id).is_some());
            if !known {
                target.sctp_connections.push(connection.clone());
            }
        }
    }

    for bundle in &reply.channel_bundles {
        if state.channel_bundle(&bundle.id).is_none() {
            state.channel_bundles.push(bundle.clone());
        }
    }

    debug!(
        target: "focus.colibri.analyser",
        conference_id = %reply_id,
        channels = state.channel_count(),
        "Merged allocation reply"
    );
    Ok(())
}

/// The part of an allocation reply that belongs to the requested contents.
#[must_use]
pub fn response_contents(
    reply: &ConferenceDescription,
    requested: &[MediaContent],
) -> ConferenceDescription {
    ConferenceDescription {
        id: reply.id.clone(),
        name: reply.name.clone(),
        contents: reply
            .contents
            .iter()
            .filter(|content| requested.iter().any(|r| r.media_type == content.media_type))
            .cloned()
            .collect(),
        channel_bundles: reply.channel_bundles.clone(),
    }
}
