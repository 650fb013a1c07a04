//! Metrics recording for the `SQLite` store.

use std::time::Instant;

/// Records operation metrics for storage operations.
///
/// This function records two metrics for each operation:
/// 1. `storage_operations_total` - Counter for operation count by status
/// 2. `storage_operation_duration_ms` - Histogram for operation latency
///
/// # Arguments
///
/// * `operation` - Operation name (e.g., "save_record", "save_properties")
/// * `start` - Operation start time from `Instant::now()`
/// * `success` - Whether the operation succeeded
pub fn record_operation_metrics(operation: &'static str, start: Instant, success: bool) {
    let status = if success { "success" } else { "error" };
    metrics::counter!(
        "storage_operations_total",
        "backend" => "sqlite",
        "operation" => operation,
        "status" => status
    )
    .increment(1);
    metrics::histogram!(
        "storage_operation_duration_ms",
        "backend" => "sqlite",
        "operation" => operation,
        "status" => status
    )
    .record(start.elapsed().as_secs_f64() * 1000.0);
}
