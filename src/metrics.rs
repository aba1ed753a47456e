use crate::storage::BackendKind;
use opentelemetry::metrics::{Counter, Meter};
use opentelemetry::{global, KeyValue};

pub const METER_NAME: &str = "tenant-storage";

/// OpenTelemetry counters for storage routing.
///
/// Every counter carries a `backend` attribute with the backend tag.
/// Counters built from the global meter are no-ops until a provider is
/// installed with `telemetry::init_telemetry`.
pub struct Metrics {
    pub bindings_total: Counter<u64>,
    pub uploads_total: Counter<u64>,
    pub downloads_total: Counter<u64>,
    pub upload_bytes_total: Counter<u64>,
    pub storage_errors_total: Counter<u64>,
}

impl Metrics {
    /// Counters on the global meter provider as it stands right now.
    pub fn from_global() -> Self {
        Self::new(&global::meter(METER_NAME))
    }

    pub fn new(meter: &Meter) -> Self {
        Metrics {
            bindings_total: meter
                .u64_counter("tenant_storage_bindings_total")
                .with_description("Total number of user-to-backend bindings made")
                .init(),

            uploads_total: meter
                .u64_counter("tenant_storage_uploads_total")
                .with_description("Total number of uploads dispatched to a backend")
                .init(),

            downloads_total: meter
                .u64_counter("tenant_storage_downloads_total")
                .with_description("Total number of downloads dispatched to a backend")
                .init(),

            upload_bytes_total: meter
                .u64_counter("tenant_storage_upload_bytes_total")
                .with_description("Total bytes handed to backends for upload")
                .init(),

            storage_errors_total: meter
                .u64_counter("tenant_storage_errors_total")
                .with_description("Total number of failed backend operations")
                .init(),
        }
    }

    pub fn record_binding(&self, kind: BackendKind) {
        self.bindings_total.add(1, &[backend_attr(kind)]);
    }

    pub fn record_upload(&self, kind: BackendKind, bytes: usize) {
        let attrs = [backend_attr(kind)];
        self.uploads_total.add(1, &attrs);
        self.upload_bytes_total.add(bytes as u64, &attrs);
    }

    pub fn record_download(&self, kind: BackendKind) {
        self.downloads_total.add(1, &[backend_attr(kind)]);
    }

    pub fn record_error(&self, kind: BackendKind, operation: &'static str) {
        self.storage_errors_total.add(
            1,
            &[backend_attr(kind), KeyValue::new("operation", operation)],
        );
    }
}

fn backend_attr(kind: BackendKind) -> KeyValue {
    KeyValue::new("backend", kind.as_str())
}
