//! # Focus Test Utilities
//!
//! Shared test utilities for the conference focus controller.
//!
//! This crate provides a stateful fake videobridge and media fixtures so
//! colibri and source reconciliation flows can be tested end to end without
//! a real bridge.
//!
//! ## Modules
//!
//! - `fake_bridge` - In-memory videobridge implementing `BridgeConnection`
//! - `fixtures` - Media contents, payload types and transports
//!
//! ## Usage
//!
//! ```rust,ignore
//! use focus_test_utils::*;
//!
//! #[tokio::test]
//! async fn test_example() {
//!     let bridge = Arc::new(FakeBridge::new());
//!     let conference = ColibriConference::new(bridge.clone(), ColibriSettings::default());
//!     conference.set_bridge_address(FakeBridge::address()).await.unwrap();
//!
//!     let channels = conference
//!         .allocate_channels(true, &endpoint("alice"), true, &audio_video(1, 2))
//!         .await
//!         .unwrap();
//!     assert_eq!(bridge.conference_count(), 1);
//! }
//! ```

pub mod fake_bridge;
pub mod fixtures;

pub use fake_bridge::FakeBridge;
pub use fixtures::*;
