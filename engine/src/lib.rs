//! # Fazenda Engine
//!
//! Pure logic behind Fazenda Digital's offline outbox and herd measurements.
//!
//! This crate holds everything that can be decided without touching a disk,
//! a network or a clock: the shape and bookkeeping of queued sync actions,
//! the status state machine, and the numeric routines that turn noisy camera
//! readings into counts and weights the farm can trust.
//!
//! ## Design Principles
//!
//! - **No IO**: persistence, reachability and remote calls live in `fazenda-sync`
//! - **Total functions**: vision math never panics; empty and degenerate inputs
//!   have defined results
//! - **Portable**: exposed to the mobile shell through a C ABI ([`ffi`])
//!
//! ## Core Concepts
//!
//! ### Sync actions
//!
//! A [`SyncAction`] is a create/update/delete intent against a named entity
//! ("animal", "sale", "cost"). The [`ActionQueue`] keeps actions in FIFO order,
//! flips `synced` once the remote apply succeeds, and moves actions that keep
//! failing to a dead-letter list according to a [`RetryPolicy`].
//!
//! ### Status
//!
//! [`SyncStatus`] is one of `offline | online | syncing | error` and advances
//! through [`SyncStatus::next`].
//!
//! ### Vision aggregation and calibration
//!
//! - [`aggregate_pen_count`] combines concurrent camera counts
//! - [`smooth_count`] is a trailing moving average over a count history
//! - [`calculate_confidence`] scores agreement between readings
//! - [`calculate_calibration`] fits `actual ≈ a * estimated + b`
//!
//! ## Quick Start
//!
//! ```rust
//! use fazenda_engine::{
//!     aggregate_pen_count, calculate_calibration, ActionKind, ActionQueue,
//!     AggregationRule, CalibrationSample, SyncAction,
//! };
//! use serde_json::json;
//!
//! // Queue a mutation
//! let mut queue = ActionQueue::new();
//! queue
//!     .push(SyncAction::new(
//!         "a-1",
//!         ActionKind::Create,
//!         "animal",
//!         json!({"brinco": "0042"}),
//!         1706745600000,
//!     ))
//!     .unwrap();
//! assert_eq!(queue.pending_count(), 1);
//!
//! // Combine camera counts
//! let count = aggregate_pen_count(&[45, 48, 42, 50, 47], AggregationRule::Median, None);
//! assert_eq!(count, 47);
//!
//! // Calibrate a weighing station
//! let model = calculate_calibration(&[
//!     CalibrationSample::new(300.0, 320.0),
//!     CalibrationSample::new(400.0, 420.0),
//! ]);
//! assert!(model.is_finite());
//! ```
//!
//! ## Persistence
//!
//! Use [`ActionQueue::export`] and [`ActionQueue::from_snapshot`] with
//! [`QueueSnapshot`]. Snapshots serialize to JSON and read the legacy
//! bare-array format.

pub mod action;
pub mod calculator;
pub mod calibration;
pub mod camera;
pub mod error;
pub mod ffi;
pub mod snapshot;
pub mod status;
pub mod vision;

// Re-export main types at crate root
pub use action::{
    is_valid_entity_name, ActionKind, ActionQueue, FailureOutcome, RetryPolicy, SyncAction,
    DEFAULT_MAX_ATTEMPTS,
};
pub use calculator::{
    average_daily_gain, carcass_value, feed_conversion, feed_efficiency, kg_to_arrobas,
    kg_to_arrobas_default, live_weight_arrobas, project_weight, FeedConversionGrade, ARROBA_KG,
    DEFAULT_CARCASS_YIELD, LIVE_WEIGHT_ARROBA_KG,
};
pub use calibration::{
    calculate_calibration, estimate_weight_from_bbox, BboxCoefficients, CalibrationModel,
    CalibrationSample, DEGENERATE_EPSILON,
};
pub use camera::{validate_camera_position, validate_camera_url, CameraPosition};
pub use error::Error;
pub use snapshot::{QueueSnapshot, QUEUE_FORMAT_VERSION};
pub use status::{StatusEvent, SyncStatus};
pub use vision::{
    aggregate_pen_count, calculate_confidence, smooth_count, summarize_pen, weighted_count,
    AggregationRule, CameraCountSample, CameraId, PenCountSummary,
};

/// Type aliases for clarity
pub type ActionId = String;
pub type EntityName = String;
pub type Timestamp = u64;
