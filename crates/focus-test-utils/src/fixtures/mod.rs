//! Pre-configured media fixtures for focus testing.
//!
//! Provides builders for:
//! - Endpoint IDs and participant addresses
//! - Audio, video and data contents with codecs and transports
//! - Simulcast video contents
//! - Participant states with channels and sources

use common::types::{EndpointId, MediaType};
use focus_controller::colibri::model::{DtlsFingerprint, PayloadType};
use focus_controller::colibri::{IceUdpTransport, RtpDescription};
use focus_controller::media::MediaContent;
use focus_controller::participant::ParticipantState;
use focus_controller::sources::{Source, SourceGroup, SourceGroupSet, SourceSet, Ssrc, VideoType};

/// Room every fixture participant joins.
pub const TEST_ROOM: &str = "testroom@conference.example.com";

/// Endpoint ID fixture.
#[must_use]
pub fn endpoint(name: &str) -> EndpointId {
    EndpointId::new(name)
}

/// Full room address of a participant, used as source owner.
#[must_use]
pub fn owner(name: &str) -> String {
    format!("{TEST_ROOM}/{name}")
}

/// A participant with no channels or sources.
#[must_use]
pub fn participant(name: &str) -> ParticipantState {
    ParticipantState::new(endpoint(name), owner(name))
}

/// Opus at 48kHz stereo.
#[must_use]
pub fn opus() -> PayloadType {
    let mut opus = PayloadType::new(111, "opus", 48_000);
    opus.channels = Some(2);
    opus.parameters.insert("minptime".to_string(), "10".to_string());
    opus
}

/// VP8 at 90kHz.
#[must_use]
pub fn vp8() -> PayloadType {
    PayloadType::new(100, "VP8", 90_000)
}

#[must_use]
pub fn audio_description() -> RtpDescription {
    RtpDescription {
        media_type: MediaType::Audio,
        payload_types: vec![opus()],
        rtcp_mux: true,
    }
}

#[must_use]
pub fn video_description() -> RtpDescription {
    RtpDescription {
        media_type: MediaType::Video,
        payload_types: vec![vp8()],
        rtcp_mux: true,
    }
}

/// ICE-UDP transport with credentials derived from `ufrag`.
#[must_use]
pub fn transport(ufrag: &str) -> IceUdpTransport {
    IceUdpTransport {
        ufrag: Some(ufrag.to_string()),
        pwd: Some(format!("{ufrag}-pwd")),
        rtcp_mux: true,
        fingerprints: vec![DtlsFingerprint {
            hash: "sha-256".to_string(),
            setup: Some("actpass".to_string()),
            value: "AB:CD:EF:01:23:45:67:89".to_string(),
        }],
        candidates: Vec::new(),
    }
}

/// Audio content sending one SSRC.
#[must_use]
pub fn audio_content(ssrc: u32) -> MediaContent {
    MediaContent::new(MediaType::Audio)
        .with_description(audio_description())
        .with_transport(transport("audio"))
        .with_source(Source::new(ssrc))
}

/// Camera video content sending one SSRC.
#[must_use]
pub fn video_content(ssrc: u32) -> MediaContent {
    MediaContent::new(MediaType::Video)
        .with_description(video_description())
        .with_transport(transport("video"))
        .with_source(Source::new(ssrc).with_video_type(VideoType::Camera))
}

/// Camera video content with one source per layer and a simulcast group.
#[must_use]
pub fn simulcast_video_content(layers: &[u32]) -> MediaContent {
    let mut content = MediaContent::new(MediaType::Video)
        .with_description(video_description())
        .with_transport(transport("video"));
    for ssrc in layers {
        content = content.with_source(Source::new(*ssrc).with_video_type(VideoType::Camera));
    }
    content.with_group(SourceGroup::simulcast(layers.iter().map(|s| Ssrc::from(*s))))
}

/// Data channel content.
#[must_use]
pub fn data_content() -> MediaContent {
    MediaContent::new(MediaType::Data).with_transport(transport("data"))
}

/// Audio and video contents.
#[must_use]
pub fn audio_video(audio_ssrc: u32, video_ssrc: u32) -> Vec<MediaContent> {
    vec![audio_content(audio_ssrc), video_content(video_ssrc)]
}

/// Audio, video and data contents.
#[must_use]
pub fn full_contents(audio_ssrc: u32, video_ssrc: u32) -> Vec<MediaContent> {
    vec![
        audio_content(audio_ssrc),
        video_content(video_ssrc),
        data_content(),
    ]
}

/// Source set with the given SSRCs of one media type.
#[must_use]
pub fn source_set(media_type: MediaType, ssrcs: &[u32]) -> SourceSet {
    SourceSet::from_sources(ssrcs.iter().map(|s| (media_type, Source::new(*s))))
}

/// Group set holding one video simulcast group.
#[must_use]
pub fn simulcast_groups(layers: &[u32]) -> SourceGroupSet {
    SourceGroupSet::from_groups([(
        MediaType::Video,
        SourceGroup::simulcast(layers.iter().map(|s| Ssrc::from(*s))),
    )])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_simulcast_content_groups_every_layer() {
        let content = simulcast_video_content(&[10, 20, 30]);
        assert_eq!(content.sources.len(), 3);
        assert_eq!(
            content.source_groups,
            vec![SourceGroup::simulcast([Ssrc(10), Ssrc(20), Ssrc(30)])]
        );
    }

    #[test]
    fn test_participant_owner_is_room_address() {
        let alice = participant("alice");
        assert_eq!(alice.owner(), "testroom@conference.example.com/alice");
        assert_eq!(alice.endpoint_id(), &endpoint("alice"));
    }
}
