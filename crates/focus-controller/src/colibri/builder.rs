//! Colibri request builder.
//!
//! A builder is created for one request, collects any number of intents and
//! then produces a single [`ColibriRequest`], or `None` when none of the
//! intents had anything to put on the wire.

use super::model::{
    Channel, ChannelBundle, ColibriRequest, ConferenceDescription, IceUdpTransport,
    MediaDirection, RtpDescription, SctpConnection,
};
use super::ColibriSettings;
use crate::media::MediaContent;
use crate::sources::{Source, SourceGroup, SourceGroupSet, SourceSet};
use common::types::{BridgeAddress, ConferenceId, EndpointId, MediaType};
use std::collections::BTreeMap;

/// Seconds of inactivity before the bridge expires a freshly allocated channel.
pub const DEFAULT_CHANNEL_EXPIRE_SECS: u32 = 15;

/// SCTP port requested for data channels.
pub const DEFAULT_SCTP_PORT: u16 = 5000;

/// Builds one colibri request.
#[derive(Debug)]
pub struct ColibriBuilder {
    request: ConferenceDescription,
    channel_last_n: Option<u32>,
    adaptive_last_n: bool,
    adaptive_simulcast: bool,
    has_content: bool,
}

impl ColibriBuilder {
    /// Builder for a conference. `conference_id` is `None` until the bridge
    /// has assigned one.
    #[must_use]
    pub fn new(conference_id: Option<ConferenceId>, settings: &ColibriSettings) -> Self {
        Self {
            request: ConferenceDescription {
                id: conference_id,
                ..ConferenceDescription::default()
            },
            channel_last_n: settings.channel_last_n,
            adaptive_last_n: settings.adaptive_last_n,
            adaptive_simulcast: settings.adaptive_simulcast,
            has_content: false,
        }
    }

    /// Sets the conference name carried by the request.
    #[must_use]
    pub fn with_name(mut self, name: Option<String>) -> Self {
        self.request.name = name;
        self
    }

    /// Requests channels for one participant, one per media content.
    ///
    /// RTP contents get channels, the data content gets an SCTP connection.
    /// With `use_bundle` every channel is tied to a bundle named after the
    /// endpoint.
    pub fn add_allocate_channels_req(
        &mut self,
        use_bundle: bool,
        endpoint: &EndpointId,
        peer_is_initiator: bool,
        contents: &[MediaContent],
    ) -> bool {
        let bundle_id = use_bundle.then(|| endpoint.as_str().to_string());
        let mut added = false;

        for content in contents {
            if content.media_type == MediaType::Data {
                self.request
                    .content_mut(MediaType::Data)
                    .sctp_connections
                    .push(SctpConnection {
                        endpoint: Some(endpoint.clone()),
                        channel_bundle_id: bundle_id.clone(),
                        initiator: Some(peer_is_initiator),
                        expire: Some(DEFAULT_CHANNEL_EXPIRE_SECS),
                        port: Some(DEFAULT_SCTP_PORT),
                        ..SctpConnection::default()
                    });
                added = true;
                continue;
            }

            let mut channel = Channel {
                endpoint: Some(endpoint.clone()),
                channel_bundle_id: bundle_id.clone(),
                initiator: Some(peer_is_initiator),
                expire: Some(DEFAULT_CHANNEL_EXPIRE_SECS),
                payload_types: content
                    .description
                    .as_ref()
                    .map(|d| d.payload_types.clone())
                    .unwrap_or_default(),
                sources: content.sources.clone(),
                source_groups: content.source_groups.clone(),
                ..Channel::default()
            };
            if content.media_type == MediaType::Video {
                channel.last_n = self.channel_last_n;
                channel.adaptive_last_n = Some(self.adaptive_last_n);
                channel.adaptive_simulcast = Some(self.adaptive_simulcast);
            }
            self.request
                .content_mut(content.media_type)
                .channels
                .push(channel);
            added = true;
        }

        if let Some(bundle_id) = bundle_id.filter(|_| added) {
            if self.request.channel_bundle(&bundle_id).is_none() {
                self.request.channel_bundles.push(ChannelBundle {
                    id: bundle_id,
                    transport: None,
                });
            }
        }

        self.has_content |= added;
        added
    }

    /// Expires every channel and SCTP connection of `channels` that has an ID.
    pub fn add_expire_channels_req(&mut self, channels: &ConferenceDescription) -> bool {
        let mut added = false;
        for content in &channels.contents {
            for channel in &content.channels {
                if let Some(id) = &channel.id {
                    let mut expire = Channel::with_id(id.clone());
                    expire.expire = Some(0);
                    self.request
                        .content_mut(content.media_type)
                        .channels
                        .push(expire);
                    added = true;
                }
            }
            for connection in &content.sctp_connections {
                if let Some(id) = &connection.id {
                    self.request
                        .content_mut(content.media_type)
                        .sctp_connections
                        .push(SctpConnection {
                            id: Some(id.clone()),
                            expire: Some(0),
                            ..SctpConnection::default()
                        });
                    added = true;
                }
            }
        }
        self.has_content |= added;
        added
    }

    /// Carries updated codec lists to the matching channels.
    pub fn add_rtp_description(
        &mut self,
        descriptions: &BTreeMap<MediaType, RtpDescription>,
        channels: &ConferenceDescription,
    ) -> bool {
        let mut added = false;
        for (media_type, description) in descriptions {
            let Some(content) = channels.content(*media_type) else {
                continue;
            };
            for id in content.channels.iter().filter_map(|c| c.id.as_ref()) {
                let mut update = Channel::with_id(id.clone());
                update.payload_types = description.payload_types.clone();
                self.request.content_mut(*media_type).channels.push(update);
                added = true;
            }
        }
        self.has_content |= added;
        added
    }

    /// Carries per-media transport to the matching channels and SCTP
    /// connections.
    pub fn add_transport_update_req(
        &mut self,
        initiator: bool,
        transports: &BTreeMap<MediaType, IceUdpTransport>,
        channels: &ConferenceDescription,
    ) -> bool {
        let mut added = false;
        for (media_type, transport) in transports {
            let Some(content) = channels.content(*media_type) else {
                continue;
            };
            for id in content.channels.iter().filter_map(|c| c.id.as_ref()) {
                let mut update = Channel::with_id(id.clone());
                update.initiator = Some(initiator);
                update.transport = Some(transport.clone());
                self.request.content_mut(*media_type).channels.push(update);
                added = true;
            }
            for id in content.sctp_connections.iter().filter_map(|c| c.id.as_ref()) {
                self.request
                    .content_mut(*media_type)
                    .sctp_connections
                    .push(SctpConnection {
                        id: Some(id.clone()),
                        initiator: Some(initiator),
                        transport: Some(transport.clone()),
                        ..SctpConnection::default()
                    });
                added = true;
            }
        }
        self.has_content |= added;
        added
    }

    /// Carries the shared transport of a bundled participant.
    ///
    /// The bundle is the first `channel_bundle_id` found in `channels`; the
    /// initiator flag goes to every channel in that bundle.
    pub fn add_bundle_transport_update_req(
        &mut self,
        initiator: bool,
        transport: &IceUdpTransport,
        channels: &ConferenceDescription,
    ) -> bool {
        let bundle_id = channels.contents.iter().find_map(|content| {
            content
                .channels
                .iter()
                .find_map(|c| c.channel_bundle_id.clone())
                .or_else(|| {
                    content
                        .sctp_connections
                        .iter()
                        .find_map(|c| c.channel_bundle_id.clone())
                })
        });
        let Some(bundle_id) = bundle_id else {
            return false;
        };

        for content in &channels.contents {
            for channel in &content.channels {
                if channel.channel_bundle_id.as_deref() != Some(bundle_id.as_str()) {
                    continue;
                }
                if let Some(id) = &channel.id {
                    let mut update = Channel::with_id(id.clone());
                    update.initiator = Some(initiator);
                    self.request
                        .content_mut(content.media_type)
                        .channels
                        .push(update);
                }
            }
        }

        self.request.channel_bundles.push(ChannelBundle {
            id: bundle_id,
            transport: Some(transport.clone()),
        });
        self.has_content = true;
        true
    }

    /// Replaces the sources and groups of every RTP channel in `channels`.
    ///
    /// A channel whose media type has no sources gets the remove-all source,
    /// one without groups gets the empty simulcast group, so the bridge drops
    /// what it had instead of keeping it.
    pub fn add_source_update_req(
        &mut self,
        sources: &SourceSet,
        groups: &SourceGroupSet,
        channels: &ConferenceDescription,
    ) -> bool {
        let mut added = false;
        for content in &channels.contents {
            let media_sources: Vec<Source> = sources
                .sources_for(content.media_type)
                .iter()
                .map(|s| Source::clone(s))
                .collect();
            let media_groups = groups.groups_for(content.media_type);

            for id in content.channels.iter().filter_map(|c| c.id.as_ref()) {
                let mut update = Channel::with_id(id.clone());
                update.sources = if media_sources.is_empty() {
                    vec![Source::remove_all()]
                } else {
                    media_sources.clone()
                };
                update.source_groups = if media_groups.is_empty() {
                    vec![SourceGroup::empty_simulcast()]
                } else {
                    media_groups.to_vec()
                };
                self.request
                    .content_mut(content.media_type)
                    .channels
                    .push(update);
                added = true;
            }
        }
        self.has_content |= added;
        added
    }

    /// Sets the direction of every audio and video channel in `channels`.
    pub fn add_direction_update_req(
        &mut self,
        channels: &ConferenceDescription,
        direction: MediaDirection,
    ) -> bool {
        let mut added = false;
        for media_type in [MediaType::Audio, MediaType::Video] {
            let Some(content) = channels.content(media_type) else {
                continue;
            };
            for id in content.channels.iter().filter_map(|c| c.id.as_ref()) {
                let mut update = Channel::with_id(id.clone());
                update.direction = Some(direction);
                self.request.content_mut(media_type).channels.push(update);
                added = true;
            }
        }
        self.has_content |= added;
        added
    }

    /// Finishes the request, or returns `None` when nothing was added.
    #[must_use]
    pub fn build(self, to: BridgeAddress, seq: u64) -> Option<ColibriRequest> {
        if !self.has_content {
            return None;
        }
        let mut conference = self.request;
        conference.contents.retain(|c| !c.is_empty());
        Some(ColibriRequest {
            to,
            seq,
            conference,
        })
    }
}
