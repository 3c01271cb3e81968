//! Colibri conference lifecycle against the fake videobridge.

#![allow(clippy::unwrap_used, clippy::expect_used, clippy::indexing_slicing)]

use common::types::{BridgeAddress, ConferenceId, MediaType};
use focus_controller::colibri::connection::mock::{MockBridgeConnection, MockReply};
use focus_controller::colibri::{
    Channel, ColibriConference, ColibriSettings, ConferenceDescription, MediaDirection,
};
use focus_controller::errors::{ColibriError, FailureKind};
use focus_controller::sources::{GroupSemantics, SourceGroupSet, SourceSet, Ssrc};
use focus_test_utils::*;
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

async fn conference_on(bridge: &Arc<FakeBridge>) -> ColibriConference {
    let conference = ColibriConference::new(bridge.clone(), ColibriSettings::default());
    conference
        .set_bridge_address(FakeBridge::address())
        .await
        .unwrap();
    conference
}

fn channel_ids(channels: &ConferenceDescription, media_type: MediaType) -> Vec<String> {
    channels
        .content(media_type)
        .map(|c| c.channels.iter().filter_map(|ch| ch.id.clone()).collect())
        .unwrap_or_default()
}

#[tokio::test]
async fn test_second_allocation_joins_existing_conference() {
    let bridge = Arc::new(FakeBridge::new());
    let conference = conference_on(&bridge).await;

    let alice = conference
        .allocate_channels(true, &endpoint("alice"), true, &full_contents(1, 2))
        .await
        .unwrap();
    let first_id = conference.conference_id().await.unwrap();
    assert_eq!(alice.id.as_ref(), Some(&first_id));

    let bob = conference
        .allocate_channels(true, &endpoint("bob"), true, &audio_video(3, 4))
        .await
        .unwrap();

    assert_eq!(bob.id.as_ref(), Some(&first_id));
    assert!(conference.has_just_allocated());
    assert!(!conference.has_just_allocated());
    assert_eq!(bridge.conference_count(), 1);
    assert_eq!(bridge.channel_count(), 4);
    assert_eq!(bridge.sctp_connection_count(), 1);
    assert_eq!(conference.snapshot().await.channel_count(), 4);
}

#[tokio::test]
async fn test_just_allocated_not_raised_by_later_allocations() {
    let bridge = Arc::new(FakeBridge::new());
    let conference = conference_on(&bridge).await;

    conference
        .allocate_channels(false, &endpoint("alice"), true, &audio_video(1, 2))
        .await
        .unwrap();
    assert!(conference.has_just_allocated());

    conference
        .allocate_channels(false, &endpoint("bob"), true, &audio_video(3, 4))
        .await
        .unwrap();
    assert!(!conference.has_just_allocated());
}

#[tokio::test]
async fn test_allocation_returns_only_requested_contents() {
    let bridge = Arc::new(FakeBridge::new());
    let conference = conference_on(&bridge).await;

    let channels = conference
        .allocate_channels(false, &endpoint("alice"), true, &[audio_content(1)])
        .await
        .unwrap();

    assert_eq!(channel_ids(&channels, MediaType::Audio).len(), 1);
    assert!(channels.content(MediaType::Video).is_none());
    assert_eq!(bridge.ssrcs(&endpoint("alice"), MediaType::Audio), vec![Ssrc(1)]);
}

#[tokio::test]
async fn test_expire_conference_without_allocation_is_a_no_op() {
    let bridge = Arc::new(FakeBridge::new());
    let conference = conference_on(&bridge).await;

    conference.expire_conference().await;
    conference.expire_conference().await;

    assert_eq!(bridge.request_count(), 0);
    assert_eq!(conference.conference_id().await, None);
}

#[tokio::test]
async fn test_expire_then_allocate_creates_new_conference() {
    let bridge = Arc::new(FakeBridge::new());
    let conference = conference_on(&bridge).await;
    conference
        .allocate_channels(true, &endpoint("alice"), true, &full_contents(1, 2))
        .await
        .unwrap();
    let first_id = conference.conference_id().await.unwrap();
    assert!(conference.has_just_allocated());

    conference.expire_conference().await;
    assert_eq!(conference.conference_id().await, None);
    assert_eq!(conference.snapshot().await, ConferenceDescription::default());
    assert_eq!(bridge.conference_count(), 0);

    conference
        .allocate_channels(true, &endpoint("alice"), true, &full_contents(1, 2))
        .await
        .unwrap();
    let second_id = conference.conference_id().await.unwrap();

    assert_ne!(first_id, second_id);
    assert!(conference.has_just_allocated());
    assert!(bridge.has_conference(&second_id));
}

#[tokio::test]
async fn test_expire_channels_keeps_conference() {
    let bridge = Arc::new(FakeBridge::new());
    let conference = conference_on(&bridge).await;
    let alice = conference
        .allocate_channels(false, &endpoint("alice"), true, &audio_video(1, 2))
        .await
        .unwrap();
    conference
        .allocate_channels(false, &endpoint("bob"), true, &audio_video(3, 4))
        .await
        .unwrap();

    conference.expire_channels(&alice).await;

    assert_eq!(bridge.channel_count(), 2);
    assert!(bridge.channels_of(&endpoint("alice"), MediaType::Audio).is_empty());
    assert!(conference.conference_id().await.is_some());
}

#[tokio::test]
async fn test_bridge_cannot_change_after_allocation() {
    let bridge = Arc::new(FakeBridge::new());
    let conference = conference_on(&bridge).await;
    conference
        .allocate_channels(false, &endpoint("alice"), true, &audio_video(1, 2))
        .await
        .unwrap();

    let result = conference
        .set_bridge_address(BridgeAddress::new("jvb2.example.com"))
        .await;

    assert_eq!(result.unwrap_err().kind(), FailureKind::IllegalState);
    assert_eq!(conference.bridge_address().await, Some(FakeBridge::address()));
}

#[tokio::test]
async fn test_mute_without_video_sends_nothing() {
    let bridge = Arc::new(FakeBridge::new());
    let conference = conference_on(&bridge).await;
    let audio_only = conference
        .allocate_channels(false, &endpoint("alice"), true, &[audio_content(1)])
        .await
        .unwrap();
    let before = bridge.request_count();

    let result = conference.mute_participant(&audio_only, true).await;

    assert!(matches!(
        result,
        Err(ColibriError::MissingMediaType {
            media_type: MediaType::Video,
            ..
        })
    ));
    assert_eq!(bridge.request_count(), before);
}

#[tokio::test]
async fn test_mute_and_hold_set_channel_direction() {
    let bridge = Arc::new(FakeBridge::new());
    let conference = conference_on(&bridge).await;
    let alice = conference
        .allocate_channels(false, &endpoint("alice"), true, &audio_video(1, 2))
        .await
        .unwrap();

    conference.mute_participant(&alice, true).await.unwrap();
    for media_type in [MediaType::Audio, MediaType::Video] {
        let channel = bridge.channels_of(&endpoint("alice"), media_type).remove(0);
        assert_eq!(channel.direction, Some(MediaDirection::Inactive));
    }

    conference.hold_participant(&alice, false).await.unwrap();
    let video = bridge.channels_of(&endpoint("alice"), MediaType::Video).remove(0);
    assert_eq!(video.direction, Some(MediaDirection::SendRecv));
}

#[tokio::test]
async fn test_update_sources_sends_clearing_sentinels() {
    let bridge = Arc::new(FakeBridge::new());
    let conference = conference_on(&bridge).await;
    let alice = conference
        .allocate_channels(
            false,
            &endpoint("alice"),
            true,
            &[audio_content(1), simulcast_video_content(&[10, 20])],
        )
        .await
        .unwrap();

    conference
        .update_sources(&SourceSet::new(), &SourceGroupSet::new(), &alice)
        .await
        .unwrap();

    let request = bridge.last_request().unwrap();
    for media_type in [MediaType::Audio, MediaType::Video] {
        let content = request.conference.content(media_type).unwrap();
        let channel = content.channels.first().unwrap();
        assert_eq!(channel.sources.len(), 1);
        assert!(channel.sources[0].ssrc.is_remove_all());
        assert_eq!(channel.source_groups.len(), 1);
        assert_eq!(channel.source_groups[0].semantics, GroupSemantics::Simulcast);
        assert!(channel.source_groups[0].is_empty());
    }
    assert!(bridge.ssrcs(&endpoint("alice"), MediaType::Audio).is_empty());
    assert!(bridge.simulcast_layers(&endpoint("alice")).is_empty());
}

#[tokio::test]
async fn test_requests_carry_increasing_sequence_numbers() {
    let bridge = Arc::new(FakeBridge::new());
    let conference = conference_on(&bridge).await;
    let alice = conference
        .allocate_channels(true, &endpoint("alice"), true, &full_contents(1, 2))
        .await
        .unwrap();

    let mut descriptions = BTreeMap::new();
    descriptions.insert(MediaType::Audio, audio_description());
    conference.update_rtp_description(&descriptions, &alice).await;
    conference
        .update_bundle_transport_info(true, &transport("bundle"), &alice)
        .await;
    conference
        .update_sources(&source_set(MediaType::Audio, &[1]), &SourceGroupSet::new(), &alice)
        .await
        .unwrap();
    conference.expire_conference().await;

    let seqs: Vec<u64> = bridge.requests().iter().map(|r| r.seq).collect();
    assert_eq!(seqs, vec![1, 2, 3, 4, 5]);
}

#[tokio::test]
async fn test_bundle_transport_goes_to_bundle() {
    let bridge = Arc::new(FakeBridge::new());
    let conference = conference_on(&bridge).await;
    let alice = conference
        .allocate_channels(true, &endpoint("alice"), false, &audio_video(1, 2))
        .await
        .unwrap();

    conference
        .update_bundle_transport_info(false, &transport("alice-ufrag"), &alice)
        .await;

    let request = bridge.last_request().unwrap();
    let bundle = request.conference.channel_bundle("alice").unwrap();
    assert_eq!(
        bundle.transport.as_ref().and_then(|t| t.ufrag.as_deref()),
        Some("alice-ufrag")
    );
}

#[tokio::test]
async fn test_fire_and_forget_failure_is_not_reported() {
    let bridge = Arc::new(FakeBridge::new());
    let conference = conference_on(&bridge).await;
    let alice = conference
        .allocate_channels(false, &endpoint("alice"), true, &audio_video(1, 2))
        .await
        .unwrap();
    bridge.go_offline();

    conference.expire_channels(&alice).await;
    let mute = conference.mute_participant(&alice, true).await;

    assert!(mute.is_ok());
    assert_eq!(bridge.channel_count(), 2);
}

#[tokio::test]
async fn test_update_sources_reports_transport_failure() {
    let bridge = Arc::new(FakeBridge::new());
    let conference = conference_on(&bridge).await;
    let alice = conference
        .allocate_channels(false, &endpoint("alice"), true, &audio_video(1, 2))
        .await
        .unwrap();
    bridge.go_offline();

    let result = conference
        .update_sources(&SourceSet::new(), &SourceGroupSet::new(), &alice)
        .await;

    assert_eq!(result.unwrap_err().kind(), FailureKind::NetworkFailure);
}

#[tokio::test(start_paused = true)]
async fn test_allocate_timeout_leaves_state_unchanged() {
    // The fake bridge always answers, so script the bridge instead.
    let mut allocated = ConferenceDescription::new();
    allocated.id = Some(ConferenceId::new("conf-1"));
    allocated
        .content_mut(MediaType::Audio)
        .channels
        .push(Channel::with_id("audio-1"));
    let mock = Arc::new(MockBridgeConnection::with_replies(vec![
        MockReply::Conference(allocated),
        MockReply::Timeout,
    ]));
    let settings = ColibriSettings {
        reply_timeout: Duration::from_secs(5),
        ..ColibriSettings::default()
    };
    let conference = ColibriConference::new(mock.clone(), settings);
    conference
        .set_bridge_address(FakeBridge::address())
        .await
        .unwrap();
    conference
        .allocate_channels(false, &endpoint("alice"), true, &[audio_content(1)])
        .await
        .unwrap();
    assert!(conference.has_just_allocated());
    let snapshot = conference.snapshot().await;
    let version = conference.state_version().await;

    let result = conference
        .allocate_channels(false, &endpoint("bob"), true, &[audio_content(2)])
        .await;

    assert!(matches!(result, Err(ColibriError::NetworkFailure(_))));
    assert_eq!(conference.snapshot().await, snapshot);
    assert_eq!(conference.state_version().await, version);
    assert!(!conference.has_just_allocated());
    assert_eq!(mock.request_count(), 2);
}
