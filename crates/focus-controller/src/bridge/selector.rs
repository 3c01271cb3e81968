//! Videobridge selection.

use crate::observability::metrics;
use common::types::BridgeAddress;
use std::collections::BTreeMap;
use tokio::sync::broadcast;
use tracing::{debug, info, warn};

/// Capacity of the bridge event channel.
const EVENT_CHANNEL_CAPACITY: usize = 64;

/// Bridge availability change.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BridgeEvent {
    /// The bridge became usable.
    Up(BridgeAddress),
    /// The bridge went away or stopped being usable.
    Down(BridgeAddress),
}

#[derive(Debug, Clone)]
struct BridgeState {
    operational: bool,
    conference_count: usize,
}

/// Tracks known videobridges and picks one for new conferences.
///
/// The preferred bridge wins while it is operational; otherwise the
/// operational bridge hosting the fewest conferences is chosen (ties go to
/// the lowest address).
#[derive(Debug)]
pub struct BridgeSelector {
    bridges: BTreeMap<BridgeAddress, BridgeState>,
    preferred: Option<BridgeAddress>,
    events: broadcast::Sender<BridgeEvent>,
}

impl BridgeSelector {
    pub fn new(preferred: Option<BridgeAddress>) -> Self {
        let (events, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        Self {
            bridges: BTreeMap::new(),
            preferred,
            events,
        }
    }

    /// Receiver of future bridge up/down events.
    pub fn subscribe(&self) -> broadcast::Receiver<BridgeEvent> {
        self.events.subscribe()
    }

    /// Registers a bridge as operational. Known bridges are left as they are.
    pub fn add_bridge(&mut self, address: BridgeAddress) {
        if self.bridges.contains_key(&address) {
            return;
        }
        info!(target: "focus.bridge.selector", bridge = %address, "Bridge added");
        self.bridges.insert(
            address.clone(),
            BridgeState {
                operational: true,
                conference_count: 0,
            },
        );
        self.publish(BridgeEvent::Up(address));
    }

    /// Forgets a bridge.
    pub fn remove_bridge(&mut self, address: &BridgeAddress) {
        let Some(state) = self.bridges.remove(address) else {
            return;
        };
        warn!(
            target: "focus.bridge.selector",
            bridge = %address,
            conferences = state.conference_count,
            "Bridge removed"
        );
        self.publish(BridgeEvent::Down(address.clone()));
    }

    pub fn is_known(&self, address: &BridgeAddress) -> bool {
        self.bridges.contains_key(address)
    }

    pub fn is_operational(&self, address: &BridgeAddress) -> bool {
        self.bridges.get(address).is_some_and(|b| b.operational)
    }

    /// Marks a known bridge as (not) operational, announcing changes.
    pub fn set_operational(&mut self, address: &BridgeAddress, operational: bool) {
        let Some(state) = self.bridges.get_mut(address) else {
            debug!(target: "focus.bridge.selector", bridge = %address, "Status for unknown bridge ignored");
            return;
        };
        if state.operational == operational {
            return;
        }
        state.operational = operational;
        if operational {
            info!(target: "focus.bridge.selector", bridge = %address, "Bridge is operational again");
            self.publish(BridgeEvent::Up(address.clone()));
        } else {
            warn!(target: "focus.bridge.selector", bridge = %address, "Bridge is not operational");
            self.publish(BridgeEvent::Down(address.clone()));
        }
    }

    /// Records how many conferences a bridge hosts.
    pub fn set_conference_count(&mut self, address: &BridgeAddress, count: usize) {
        if let Some(state) = self.bridges.get_mut(address) {
            state.conference_count = count;
        }
    }

    /// Bridge for a new conference, `None` when no bridge is operational.
    pub fn select_bridge(&self) -> Option<BridgeAddress> {
        if let Some(preferred) = self.preferred.as_ref().filter(|p| self.is_operational(p)) {
            return Some(preferred.clone());
        }
        let selected = self
            .bridges
            .iter()
            .filter(|(_, state)| state.operational)
            .min_by_key(|(_, state)| state.conference_count)
            .map(|(address, _)| address.clone());

        match &selected {
            Some(address) => {
                debug!(target: "focus.bridge.selector", bridge = %address, "Selected bridge");
            }
            None => {
                warn!(target: "focus.bridge.selector", known = self.bridges.len(), "No operational bridge");
            }
        }
        selected
    }

    pub fn operational_count(&self) -> usize {
        self.bridges.values().filter(|b| b.operational).count()
    }

    fn publish(&self, event: BridgeEvent) {
        metrics::set_bridges_operational(self.operational_count());
        // No subscribers is fine.
        let _ = self.events.send(event);
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    fn jvb(n: u8) -> BridgeAddress {
        BridgeAddress::new(format!("jvb{n}.example.com"))
    }

    #[test]
    fn test_least_loaded_operational_bridge_wins() {
        let mut selector = BridgeSelector::new(None);
        selector.add_bridge(jvb(1));
        selector.add_bridge(jvb(2));
        selector.add_bridge(jvb(3));
        selector.set_conference_count(&jvb(1), 5);
        selector.set_conference_count(&jvb(2), 1);
        selector.set_conference_count(&jvb(3), 0);
        selector.set_operational(&jvb(3), false);

        assert_eq!(selector.select_bridge(), Some(jvb(2)));
        assert_eq!(selector.operational_count(), 2);
    }

    #[test]
    fn test_preferred_bridge_while_operational() {
        let mut selector = BridgeSelector::new(Some(jvb(1)));
        selector.add_bridge(jvb(1));
        selector.add_bridge(jvb(2));
        selector.set_conference_count(&jvb(1), 10);

        assert_eq!(selector.select_bridge(), Some(jvb(1)));
        selector.set_operational(&jvb(1), false);
        assert_eq!(selector.select_bridge(), Some(jvb(2)));
    }

    #[test]
    fn test_no_bridges_selects_nothing() {
        let selector = BridgeSelector::new(Some(jvb(1)));
        assert_eq!(selector.select_bridge(), None);
    }

    #[tokio::test]
    async fn test_events_published_on_changes_only() {
        let mut selector = BridgeSelector::new(None);
        let mut events = selector.subscribe();

        selector.add_bridge(jvb(1));
        selector.add_bridge(jvb(1));
        selector.set_operational(&jvb(1), true);
        selector.set_operational(&jvb(1), false);
        selector.remove_bridge(&jvb(1));
        selector.remove_bridge(&jvb(1));

        assert_eq!(events.recv().await.unwrap(), BridgeEvent::Up(jvb(1)));
        assert_eq!(events.recv().await.unwrap(), BridgeEvent::Down(jvb(1)));
        assert_eq!(events.recv().await.unwrap(), BridgeEvent::Down(jvb(1)));
        assert!(events.try_recv().is_err());
        assert!(!selector.is_known(&jvb(1)));
    }
}
