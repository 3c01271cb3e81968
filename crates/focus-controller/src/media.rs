//! Session-description side media contents.
//!
//! A [`MediaContent`] is what a participant's offer or answer says about one
//! media type: codecs, transport and the sources it sends. The controller
//! only reads these; producing them is the signaling layer's job.

use crate::colibri::model::{IceUdpTransport, RtpDescription};
use crate::sources::{Source, SourceGroup};
use common::types::MediaType;

/// One negotiated media content.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MediaContent {
    /// Content name as negotiated (usually the media type name).
    pub name: String,
    pub media_type: MediaType,
    pub description: Option<RtpDescription>,
    pub transport: Option<IceUdpTransport>,
    pub sources: Vec<Source>,
    pub source_groups: Vec<SourceGroup>,
}

impl MediaContent {
    /// A content with no description, transport or sources.
    #[must_use]
    pub fn new(media_type: MediaType) -> Self {
        Self {
            name: media_type.as_str().to_string(),
            media_type,
            description: None,
            transport: None,
            sources: Vec::new(),
            source_groups: Vec::new(),
        }
    }

    #[must_use]
    pub fn with_description(mut self, description: RtpDescription) -> Self {
        self.description = Some(description);
        self
    }

    #[must_use]
    pub fn with_transport(mut self, transport: IceUdpTransport) -> Self {
        self.transport = Some(transport);
        self
    }

    #[must_use]
    pub fn with_source(mut self, source: Source) -> Self {
        self.sources.push(source);
        self
    }

    #[must_use]
    pub fn with_group(mut self, group: SourceGroup) -> Self {
        self.source_groups.push(group);
        self
    }
}
