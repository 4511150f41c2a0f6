//! Metrics emitted by domain stores.
//!
//! Stores record through the `metrics` facade only. No exporter is installed
//! here; the host application decides whether and where metrics go. Without a
//! recorder every call is a no-op.
//!
//! # Example
//!
//! ```rust
//! use placebook_runtime::metrics;
//!
//! // Attach descriptions once the host has installed a recorder
//! metrics::describe();
//! ```

use metrics::{counter, describe_counter, describe_gauge, describe_histogram, gauge, histogram};
use std::time::Duration;

/// Actions reduced by any store
pub const STORE_ACTIONS: &str = "store.actions.total";
/// Time spent inside reducers
pub const STORE_REDUCER_DURATION: &str = "store.reducer.duration_seconds";
/// Snapshots published to subscribers
pub const STORE_EMISSIONS: &str = "store.emissions.total";
/// Currently attached listeners
pub const STORE_SUBSCRIBERS: &str = "store.subscribers";
/// Remote operations that failed
pub const SYNC_REMOTE_FAILURES: &str = "sync.remote.failures";

/// Register all metric descriptions.
pub fn describe() {
    describe_counter!(STORE_ACTIONS, "Total number of actions reduced by domain stores");
    describe_histogram!(STORE_REDUCER_DURATION, "Time taken by a single reduction");
    describe_counter!(STORE_EMISSIONS, "Total number of snapshots published to subscribers");
    describe_gauge!(STORE_SUBSCRIBERS, "Listeners attached to the most recently changed store");
    describe_counter!(SYNC_REMOTE_FAILURES, "Remote operations that returned an error, by operation");
}

/// Store metrics recorder.
pub struct StoreMetrics;

impl StoreMetrics {
    /// Record a reduced action.
    pub fn record_action(duration: Duration) {
        counter!(STORE_ACTIONS).increment(1);
        histogram!(STORE_REDUCER_DURATION).record(duration.as_secs_f64());
    }

    /// Record a published snapshot.
    pub fn record_emission() {
        counter!(STORE_EMISSIONS).increment(1);
    }

    /// Record the number of attached listeners.
    #[allow(clippy::cast_precision_loss)] // Listener counts are small
    pub fn record_subscribers(count: usize) {
        gauge!(STORE_SUBSCRIBERS).set(count as f64);
    }
}

/// Remote sync metrics recorder.
pub struct SyncMetrics;

impl SyncMetrics {
    /// Record a failed remote operation (`fetch`, `add`, `update`, `delete`).
    pub fn record_failure(operation: &'static str) {
        counter!(SYNC_REMOTE_FAILURES, "operation" => operation).increment(1);
    }
}
