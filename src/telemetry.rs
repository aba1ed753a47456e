use crate::error::TelemetryError;
use crate::metrics::METER_NAME;
use opentelemetry::global;
use opentelemetry::metrics::{Meter, MeterProvider as _};
use opentelemetry_sdk::metrics::MeterProvider as SdkMeterProvider;
use prometheus::{Encoder, TextEncoder};
use tracing::{info, Level};

/// Install the global fmt subscriber.
///
/// `debug` wins over `verbose`; with neither, only warnings and errors
/// are shown.
pub fn init_logging(verbose: bool, debug: bool) -> Result<(), TelemetryError> {
    tracing_subscriber::fmt()
        .with_max_level(log_level(verbose, debug))
        .with_writer(std::io::stderr)
        .try_init()
        .map_err(|e| TelemetryError::LoggingInit(e.to_string()))
}

fn log_level(verbose: bool, debug: bool) -> Level {
    if debug {
        Level::DEBUG
    } else if verbose {
        Level::INFO
    } else {
        Level::WARN
    }
}

/// SDK meter provider backed by a Prometheus registry.
pub struct TelemetryService {
    provider: SdkMeterProvider,
    registry: prometheus::Registry,
}

impl TelemetryService {
    pub fn new() -> Result<Self, TelemetryError> {
        let registry = prometheus::Registry::new();
        let exporter = opentelemetry_prometheus::exporter()
            .with_registry(registry.clone())
            .build()
            .map_err(|e| TelemetryError::MetricsInit(e.to_string()))?;
        let provider = SdkMeterProvider::builder().with_reader(exporter).build();

        Ok(Self { provider, registry })
    }

    pub fn meter(&self) -> Meter {
        self.provider.meter(METER_NAME)
    }

    pub fn registry(&self) -> &prometheus::Registry {
        &self.registry
    }

    /// Current metric values in the Prometheus text format.
    pub fn render(&self) -> Result<String, TelemetryError> {
        let mut buf = Vec::new();
        TextEncoder::new()
            .encode(&self.registry.gather(), &mut buf)
            .map_err(|e| TelemetryError::MetricsInit(e.to_string()))?;
        String::from_utf8(buf).map_err(|e| TelemetryError::MetricsInit(e.to_string()))
    }
}

/// Build the SDK provider and make it the global one.
///
/// Must run before the global registry is created, since counters bind to
/// whichever provider is global when they are built.
pub fn init_telemetry() -> Result<TelemetryService, TelemetryError> {
    let service = TelemetryService::new()?;
    global::set_meter_provider(service.provider.clone());
    info!("OpenTelemetry metrics initialized");
    Ok(service)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_log_level_precedence() {
        assert_eq!(log_level(false, false), Level::WARN);
        assert_eq!(log_level(true, false), Level::INFO);
        assert_eq!(log_level(true, true), Level::DEBUG);
    }

    #[test]
    fn test_render_reports_recorded_counter() {
        let telemetry = TelemetryService::new().unwrap();
        let counter = telemetry.meter().u64_counter("scratch_events_total").init();
        counter.add(3, &[]);

        let text = telemetry.render().unwrap();
        assert!(text.contains("scratch_events"), "{}", text);
    }
}
