use crate::record::{LogRecord, Resource};

/// Outcome of a single [`LogExporter::export`] call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExportResult {
    Success,
    Failure,
}

/// Destination for batches of [`LogRecord`]s produced by the logging layer.
///
/// Implementations are responsible for turning records into whatever the
/// backend expects and handing them off. The layer calls `export` from a
/// background task, never from the thread that emitted the event.
pub trait LogExporter: Send + Sync {
    /// Export a finite, ordered batch of records.
    ///
    /// **Parameters**
    /// - `batch`: records in the order they were emitted. They are only
    ///   borrowed for the duration of the call.
    ///
    /// **Returns**
    /// - `ExportResult::Success` if every record was accepted for delivery.
    /// - `ExportResult::Failure` if the exporter cannot accept records at
    ///   all (shut down, or its backend client could not be created).
    fn export(&self, batch: &[LogRecord]) -> ExportResult;

    /// Stop accepting records. Later `export` calls return `Failure`.
    ///
    /// Default implementation is a no-op.
    fn shutdown(&self) {}

    /// Replace the process-wide resource attributes attached to every
    /// exported record.
    ///
    /// Default implementation ignores the resource.
    fn set_resource(&self, _resource: Resource) {}
}
