// Telemetry initialization
//
// Console logging through tracing-subscriber with an EnvFilter, optional JSON
// output, and (with the `otlp` feature) span export to an OTLP collector.

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer};

/// Configuration for logging and tracing
#[derive(Debug, Clone)]
pub struct TelemetryConfig {
    /// Service name for traces
    pub service_name: String,
    /// OTLP endpoint (e.g., "http://localhost:4317")
    pub otlp_endpoint: Option<String>,
    /// Log filter (e.g., "info", "pidwarden_pool=debug")
    pub log_filter: Option<String>,
    /// Emit logs as JSON lines
    pub json: bool,
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            service_name: "pidwarden".to_string(),
            otlp_endpoint: None,
            log_filter: None,
            json: false,
        }
    }
}

impl TelemetryConfig {
    /// Create configuration from environment variables
    ///
    /// Environment variables:
    /// - `OTEL_SERVICE_NAME`: Service name (default: "pidwarden")
    /// - `OTEL_EXPORTER_OTLP_ENDPOINT`: OTLP endpoint (used with the `otlp` feature)
    /// - `RUST_LOG` or `LOG_LEVEL`: Log filter
    /// - `LOG_FORMAT`: "json" for JSON lines
    pub fn from_env() -> Self {
        Self {
            service_name: std::env::var("OTEL_SERVICE_NAME")
                .unwrap_or_else(|_| "pidwarden".to_string()),
            otlp_endpoint: std::env::var("OTEL_EXPORTER_OTLP_ENDPOINT").ok(),
            log_filter: std::env::var("RUST_LOG")
                .ok()
                .or_else(|| std::env::var("LOG_LEVEL").ok()),
            json: std::env::var("LOG_FORMAT")
                .map(|v| v.eq_ignore_ascii_case("json"))
                .unwrap_or(false),
        }
    }

    fn filter(&self) -> EnvFilter {
        self.log_filter
            .as_ref()
            .and_then(|f| EnvFilter::try_new(f).ok())
            .unwrap_or_else(|| EnvFilter::new("info"))
    }
}

/// Guard that flushes exported spans when dropped
pub struct TelemetryGuard {
    #[cfg(feature = "otlp")]
    provider: Option<opentelemetry_sdk::trace::SdkTracerProvider>,
}

impl Drop for TelemetryGuard {
    fn drop(&mut self) {
        #[cfg(feature = "otlp")]
        if let Some(provider) = self.provider.take() {
            if let Err(e) = provider.shutdown() {
                eprintln!("Failed to shutdown tracer provider: {:?}", e);
            }
        }
    }
}

/// Initialize logging (and OTLP export when enabled)
///
/// Keep the returned guard alive for the lifetime of the process. Logs go to
/// stderr so command output on stdout stays machine-readable.
pub fn init_telemetry(config: TelemetryConfig) -> TelemetryGuard {
    let console_layer = if config.json {
        tracing_subscriber::fmt::layer()
            .json()
            .with_writer(std::io::stderr)
            .with_filter(config.filter())
            .boxed()
    } else {
        tracing_subscriber::fmt::layer()
            .with_target(true)
            .with_writer(std::io::stderr)
            .with_filter(config.filter())
            .boxed()
    };

    #[cfg(feature = "otlp")]
    {
        let (provider, otel_layer, otel_status) = match &config.otlp_endpoint {
            Some(endpoint) => match otlp::build_tracer(endpoint, &config.service_name) {
                Ok((provider, tracer)) => (
                    Some(provider),
                    Some(tracing_opentelemetry::layer().with_tracer(tracer)),
                    Some(Ok(endpoint.clone())),
                ),
                Err(e) => (None, None, Some(Err(e.to_string()))),
            },
            None => (None, None, None),
        };

        tracing_subscriber::registry()
            .with(console_layer)
            .with(otel_layer)
            .init();

        match otel_status {
            Some(Ok(endpoint)) => {
                tracing::info!(endpoint = %endpoint, "OpenTelemetry tracing enabled");
            }
            Some(Err(e)) => {
                tracing::warn!(error = %e, "Failed to initialize OTLP tracer, continuing without tracing");
            }
            None => {
                tracing::debug!("OpenTelemetry tracing disabled: OTEL_EXPORTER_OTLP_ENDPOINT not set");
            }
        }

        TelemetryGuard { provider }
    }

    #[cfg(not(feature = "otlp"))]
    {
        tracing_subscriber::registry().with(console_layer).init();

        if config.otlp_endpoint.is_some() {
            tracing::warn!("OTEL_EXPORTER_OTLP_ENDPOINT set but built without the otlp feature");
        }

        TelemetryGuard {}
    }
}

#[cfg(feature = "otlp")]
mod otlp {
    use std::time::Duration;

    use opentelemetry::trace::TracerProvider as _;
    use opentelemetry::KeyValue;
    use opentelemetry_otlp::{SpanExporter, WithExportConfig};
    use opentelemetry_sdk::trace::{RandomIdGenerator, Sampler, SdkTracerProvider, Tracer};
    use opentelemetry_sdk::Resource;

    pub fn build_tracer(
        endpoint: &str,
        service_name: &str,
    ) -> Result<(SdkTracerProvider, Tracer), Box<dyn std::error::Error + Send + Sync>> {
        let exporter = SpanExporter::builder()
            .with_tonic()
            .with_endpoint(endpoint)
            .with_timeout(Duration::from_secs(10))
            .build()?;

        let resource = Resource::builder()
            .with_attributes(vec![KeyValue::new("service.name", service_name.to_string())])
            .build();

        let provider = SdkTracerProvider::builder()
            .with_batch_exporter(exporter)
            .with_sampler(Sampler::AlwaysOn)
            .with_id_generator(RandomIdGenerator::default())
            .with_resource(resource)
            .build();

        let tracer = provider.tracer("pidwarden");
        Ok((provider, tracer))
    }
}
