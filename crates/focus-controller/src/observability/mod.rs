//! Observability for the focus controller.
//!
//! Structured logs go through `tracing` with a dotted target per module
//! (`focus.colibri.conference`, `focus.roster`, ...). Metric labels are
//! bounded:
//! - `operation`: one value per colibri operation (9 values)
//! - `outcome`: `success`, `network_failure`, `protocol_error`, `illegal_state`
//!
//! # Metrics
//!
//! | Metric | Type | Labels | Purpose |
//! |--------|------|--------|---------|
//! | `focus_colibri_requests_total` | Counter | `operation`, `outcome` | Colibri requests by result |
//! | `focus_colibri_allocate_duration_seconds` | Histogram | none | Allocation round trip |
//! | `focus_bridges_operational` | Gauge | none | Bridges currently usable |

pub mod metrics;

pub use metrics::{
    init_metrics_recorder, record_allocate_duration, record_colibri_request,
    set_bridges_operational,
};
