//! Media source bookkeeping.
//!
//! - [`SourceSet`] - SSRCs per media type, with owner and video-type metadata
//! - [`SourceGroupSet`] - source groups (simulcast layers) per media type
//!
//! Both support union, difference and emptiness checks. Neither raises on a
//! media type it does not know about.

pub mod group_set;
pub mod source_set;

pub use group_set::{GroupSemantics, SourceGroup, SourceGroupSet};
pub use source_set::{Source, SourceSet, Ssrc, VideoType};
