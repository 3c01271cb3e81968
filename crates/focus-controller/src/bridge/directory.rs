//! Classification of discovered components.

use super::selector::BridgeSelector;
use common::types::BridgeAddress;
use tracing::{debug, info, warn};

/// Colibri protocol namespace.
pub const COLIBRI_NAMESPACE: &str = "http://jitsi.org/protocol/colibri";

/// Features a component must advertise to be used as a videobridge.
pub const VIDEOBRIDGE_FEATURES: [&str; 4] = [
    COLIBRI_NAMESPACE,
    "urn:xmpp:jingle:apps:dtls:0",
    "urn:xmpp:jingle:transports:ice-udp:1",
    "urn:xmpp:jingle:transports:raw-udp:0",
];

/// Features of the recorder component.
pub const RECORDER_FEATURES: [&str; 1] = ["http://jitsi.org/protocol/jirecon"];

/// Features of the SIP gateway component.
pub const SIP_GATEWAY_FEATURES: [&str; 2] = ["http://jitsi.org/protocol/jigasi", "urn:xmpp:rayo:0"];

/// Role a discovered component was registered for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ServiceKind {
    Videobridge,
    Recorder,
    SipGateway,
}

fn supports_all(required: &[&str], advertised: &[&str]) -> bool {
    required.iter().all(|feature| advertised.contains(feature))
}

/// Services the focus knows about.
#[derive(Debug)]
pub struct FocusServices {
    selector: BridgeSelector,
    recorder: Option<String>,
    sip_gateway: Option<String>,
}

impl FocusServices {
    pub fn new(selector: BridgeSelector) -> Self {
        Self {
            selector,
            recorder: None,
            sip_gateway: None,
        }
    }

    /// Whether `features` make a component usable as a videobridge.
    #[must_use]
    pub fn is_videobridge(features: &[&str]) -> bool {
        supports_all(&VIDEOBRIDGE_FEATURES, features)
    }

    /// Registers a discovered component by its advertised features.
    ///
    /// Only the first recorder and the first SIP gateway are kept. Returns
    /// the role the node was registered for, if any.
    pub fn new_node_discovered(&mut self, node: &str, features: &[&str]) -> Option<ServiceKind> {
        if Self::is_videobridge(features) {
            self.selector.add_bridge(BridgeAddress::new(node));
            return Some(ServiceKind::Videobridge);
        }
        if self.recorder.is_none() && supports_all(&RECORDER_FEATURES, features) {
            info!(target: "focus.bridge.directory", node = %node, "Discovered recorder");
            self.recorder = Some(node.to_string());
            return Some(ServiceKind::Recorder);
        }
        if self.sip_gateway.is_none() && supports_all(&SIP_GATEWAY_FEATURES, features) {
            info!(target: "focus.bridge.directory", node = %node, "Discovered SIP gateway");
            self.sip_gateway = Some(node.to_string());
            return Some(ServiceKind::SipGateway);
        }
        debug!(target: "focus.bridge.directory", node = %node, "Ignoring discovered node");
        None
    }

    /// Drops whatever role `node` had.
    pub fn node_no_longer_available(&mut self, node: &str) {
        let address = BridgeAddress::new(node);
        if self.selector.is_known(&address) {
            self.selector.remove_bridge(&address);
        } else if self.recorder.as_deref() == Some(node) {
            warn!(target: "focus.bridge.directory", node = %node, "Recorder went offline");
            self.recorder = None;
        } else if self.sip_gateway.as_deref() == Some(node) {
            warn!(target: "focus.bridge.directory", node = %node, "SIP gateway went offline");
            self.sip_gateway = None;
        }
    }

    pub fn recorder(&self) -> Option<&str> {
        self.recorder.as_deref()
    }

    pub fn sip_gateway(&self) -> Option<&str> {
        self.sip_gateway.as_deref()
    }

    pub fn bridge_selector(&self) -> &BridgeSelector {
        &self.selector
    }

    pub fn bridge_selector_mut(&mut self) -> &mut BridgeSelector {
        &mut self.selector
    }
}
