//! Bridge and component directory.
//!
//! [`FocusServices`] sorts discovered components into videobridges, the
//! recorder and the SIP gateway. Videobridges are handed to the
//! [`BridgeSelector`], which picks the bridge for new conferences and
//! announces bridges going up or down.

pub mod directory;
pub mod selector;

pub use directory::{FocusServices, ServiceKind};
pub use selector::{BridgeEvent, BridgeSelector};
