//! Per-media collections of media sources (SSRCs).

use crate::media::MediaContent;
use common::types::MediaType;
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

/// Numeric identifier of one media stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Ssrc(pub i64);

impl Ssrc {
    /// Reserved value telling the bridge to drop every source of a channel.
    pub const REMOVE_ALL: Ssrc = Ssrc(-1);

    /// Whether this is the "remove all sources" sentinel.
    #[must_use]
    pub fn is_remove_all(self) -> bool {
        self == Self::REMOVE_ALL
    }
}

impl fmt::Display for Ssrc {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<i64> for Ssrc {
    fn from(value: i64) -> Self {
        Ssrc(value)
    }
}

impl From<u32> for Ssrc {
    fn from(value: u32) -> Self {
        Ssrc(i64::from(value))
    }
}

/// Kind of video a source carries.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VideoType {
    Camera,
    Screen,
}

/// One media source with its signaling metadata.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Source {
    pub ssrc: Ssrc,
    /// Address of the participant that owns the source.
    pub owner: Option<String>,
    pub video_type: Option<VideoType>,
    /// Free-form `name=value` parameters (cname, msid, ...).
    pub parameters: Vec<(String, String)>,
}

impl Source {
    /// A source with no metadata.
    #[must_use]
    pub fn new(ssrc: impl Into<Ssrc>) -> Self {
        Self {
            ssrc: ssrc.into(),
            owner: None,
            video_type: None,
            parameters: Vec::new(),
        }
    }

    /// The "remove all sources" sentinel source.
    #[must_use]
    pub fn remove_all() -> Self {
        Self::new(Ssrc::REMOVE_ALL)
    }

    #[must_use]
    pub fn with_owner(mut self, owner: impl Into<String>) -> Self {
        self.owner = Some(owner.into());
        self
    }

    #[must_use]
    pub fn with_video_type(mut self, video_type: VideoType) -> Self {
        self.video_type = Some(video_type);
        self
    }

    #[must_use]
    pub fn with_parameter(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.parameters.push((name.into(), value.into()));
        self
    }
}

/// Media sources keyed by media type.
///
/// Order within a media type is significant: the first source is the
/// primary (simulcast base) stream. SSRCs are unique per media type.
///
/// Sources are shared behind `Arc`, so [`SourceSet::shallow_copy`] (and
/// `clone`) shares the source records while [`SourceSet::copy`] gives the
/// copy its own.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SourceSet {
    sources: BTreeMap<MediaType, Vec<Arc<Source>>>,
}

impl SourceSet {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a set from `(media, source)` pairs, skipping duplicate SSRCs.
    #[must_use]
    pub fn from_sources(sources: impl IntoIterator<Item = (MediaType, Source)>) -> Self {
        let mut set = Self::new();
        for (media, source) in sources {
            set.insert(media, Arc::new(source));
        }
        set
    }

    /// Collect the sources announced in a list of media contents.
    #[must_use]
    pub fn from_contents(contents: &[MediaContent]) -> Self {
        Self::from_sources(contents.iter().flat_map(|content| {
            content
                .sources
                .iter()
                .map(move |source| (content.media_type, source.clone()))
        }))
    }

    fn insert(&mut self, media: MediaType, source: Arc<Source>) -> bool {
        let entries = self.sources.entry(media).or_default();
        if entries.iter().any(|existing| existing.ssrc == source.ssrc) {
            // First writer wins, metadata included.
            return false;
        }
        entries.push(source);
        true
    }

    /// Union: keeps existing entries and order, appends new SSRCs.
    pub fn add(&mut self, other: &SourceSet) {
        for (media, sources) in &other.sources {
            for source in sources {
                self.insert(*media, Arc::clone(source));
            }
        }
    }

    /// Difference by SSRC. Media types absent from `self` are ignored.
    pub fn remove(&mut self, other: &SourceSet) {
        for (media, removed) in &other.sources {
            if let Some(entries) = self.sources.get_mut(media) {
                entries.retain(|source| !removed.iter().any(|r| r.ssrc == source.ssrc));
                if entries.is_empty() {
                    self.sources.remove(media);
                }
            }
        }
    }

    /// Entries of `self` whose SSRC also appears in `other`.
    #[must_use]
    pub fn intersection(&self, other: &SourceSet) -> SourceSet {
        let mut result = SourceSet::new();
        for (media, sources) in &self.sources {
            for source in sources {
                if other.contains(*media, source.ssrc) {
                    result.insert(*media, Arc::clone(source));
                }
            }
        }
        result
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.sources.values().all(Vec::is_empty)
    }

    /// Total number of sources across media types.
    #[must_use]
    pub fn len(&self) -> usize {
        self.sources.values().map(Vec::len).sum()
    }

    #[must_use]
    pub fn contains(&self, media: MediaType, ssrc: Ssrc) -> bool {
        self.sources
            .get(&media)
            .is_some_and(|sources| sources.iter().any(|s| s.ssrc == ssrc))
    }

    /// Sources for one media type, in announcement order.
    #[must_use]
    pub fn sources_for(&self, media: MediaType) -> &[Arc<Source>] {
        self.sources.get(&media).map(Vec::as_slice).unwrap_or(&[])
    }

    #[must_use]
    pub fn ssrcs_for(&self, media: MediaType) -> Vec<Ssrc> {
        self.sources_for(media).iter().map(|s| s.ssrc).collect()
    }

    /// Media types that currently have at least one source.
    pub fn media_types(&self) -> impl Iterator<Item = MediaType> + '_ {
        self.sources
            .iter()
            .filter(|(_, sources)| !sources.is_empty())
            .map(|(media, _)| *media)
    }

    /// Copy that shares the source records with `self`.
    #[must_use]
    pub fn shallow_copy(&self) -> SourceSet {
        self.clone()
    }

    /// Copy with its own source records.
    #[must_use]
    pub fn copy(&self) -> SourceSet {
        SourceSet {
            sources: self
                .sources
                .iter()
                .map(|(media, sources)| {
                    (
                        *media,
                        sources
                            .iter()
                            .map(|source| Arc::new(Source::clone(source)))
                            .collect(),
                    )
                })
                .collect(),
        }
    }

    /// Replace every source's owner tag, producing fresh records.
    #[must_use]
    pub fn with_owner(&self, owner: &str) -> SourceSet {
        SourceSet::from_sources(self.sources.iter().flat_map(|(media, sources)| {
            sources
                .iter()
                .map(move |source| (*media, Source::clone(source).with_owner(owner)))
        }))
    }
}
