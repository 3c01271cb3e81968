//! Per-media collections of source groups (simulcast layers, RTX pairs).

use super::source_set::{SourceSet, Ssrc};
use crate::media::MediaContent;
use common::types::MediaType;
use std::collections::BTreeMap;

/// Semantics of a source group.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum GroupSemantics {
    /// Simulcast layers, lowest quality first.
    Simulcast,
    /// Flow identification (primary + retransmission stream).
    Fid,
}

impl GroupSemantics {
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            GroupSemantics::Simulcast => "SIM",
            GroupSemantics::Fid => "FID",
        }
    }
}

/// Ordered list of SSRCs tied together by a semantic.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SourceGroup {
    pub semantics: GroupSemantics,
    pub ssrcs: Vec<Ssrc>,
}

impl SourceGroup {
    #[must_use]
    pub fn new(semantics: GroupSemantics, ssrcs: impl IntoIterator<Item = Ssrc>) -> Self {
        Self {
            semantics,
            ssrcs: ssrcs.into_iter().collect(),
        }
    }

    #[must_use]
    pub fn simulcast(ssrcs: impl IntoIterator<Item = Ssrc>) -> Self {
        Self::new(GroupSemantics::Simulcast, ssrcs)
    }

    /// Empty simulcast group: tells the bridge to turn simulcast layers off.
    #[must_use]
    pub fn empty_simulcast() -> Self {
        Self::simulcast(Vec::new())
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.ssrcs.is_empty()
    }
}

/// Source groups keyed by media type. Groups are compared by value.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SourceGroupSet {
    groups: BTreeMap<MediaType, Vec<SourceGroup>>,
}

impl SourceGroupSet {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn from_groups(groups: impl IntoIterator<Item = (MediaType, SourceGroup)>) -> Self {
        let mut set = Self::new();
        for (media, group) in groups {
            set.insert(media, group);
        }
        set
    }

    /// Collect the groups announced in a list of media contents.
    #[must_use]
    pub fn from_contents(contents: &[MediaContent]) -> Self {
        Self::from_groups(contents.iter().flat_map(|content| {
            content
                .source_groups
                .iter()
                .map(move |group| (content.media_type, group.clone()))
        }))
    }

    fn insert(&mut self, media: MediaType, group: SourceGroup) {
        let entries = self.groups.entry(media).or_default();
        if !entries.contains(&group) {
            entries.push(group);
        }
    }

    /// Union, keeping existing order and appending new groups.
    pub fn add(&mut self, other: &SourceGroupSet) {
        for (media, groups) in &other.groups {
            for group in groups {
                self.insert(*media, group.clone());
            }
        }
    }

    /// Difference. Media types absent from `self` are ignored.
    pub fn remove(&mut self, other: &SourceGroupSet) {
        for (media, removed) in &other.groups {
            if let Some(entries) = self.groups.get_mut(media) {
                entries.retain(|group| !removed.contains(group));
                if entries.is_empty() {
                    self.groups.remove(media);
                }
            }
        }
    }

    #[must_use]
    pub fn intersection(&self, other: &SourceGroupSet) -> SourceGroupSet {
        SourceGroupSet::from_groups(self.groups.iter().flat_map(|(media, groups)| {
            groups
                .iter()
                .filter(move |group| other.groups_for(*media).contains(*group))
                .map(move |group| (*media, group.clone()))
        }))
    }

    /// Groups that reference an SSRC missing from `sources` under the
    /// same media type.
    #[must_use]
    pub fn uncovered_by(&self, sources: &SourceSet) -> SourceGroupSet {
        SourceGroupSet::from_groups(self.groups.iter().flat_map(|(media, groups)| {
            groups
                .iter()
                .filter(move |group| {
                    group.ssrcs.iter().any(|ssrc| !sources.contains(*media, *ssrc))
                })
                .map(move |group| (*media, group.clone()))
        }))
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.groups.values().all(Vec::is_empty)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.groups.values().map(Vec::len).sum()
    }

    #[must_use]
    pub fn groups_for(&self, media: MediaType) -> &[SourceGroup] {
        self.groups.get(&media).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Groups are plain values, so every copy is deep.
    #[must_use]
    pub fn copy(&self) -> SourceGroupSet {
        self.clone()
    }
}
