use std::time::Duration;

use opentelemetry::trace::TracerProvider as _;
use opentelemetry_appender_tracing::layer::OpenTelemetryTracingBridge;
use opentelemetry_otlp::{Protocol, WithExportConfig};
use opentelemetry_sdk::{
    logs::SdkLoggerProvider, metrics::SdkMeterProvider, trace::SdkTracerProvider,
};
use tracing_opentelemetry::OpenTelemetryLayer;
use tracing_subscriber::{
    EnvFilter, Layer as _, layer::SubscriberExt as _, util::SubscriberInitExt as _,
};

use crate::cli::{CliArgs, CliArgsOtelExporter, CliArgsOtelExporterOtlpProtocol};

pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

const DEFAULT_GRPC_ENDPOINT: &str = "http://localhost:4317";
const DEFAULT_HTTP_ENDPOINT: &str = "http://localhost:4318";

pub struct Provider {
    logger: SdkLoggerProvider,
    meter: SdkMeterProvider,
    service_name: String,
    tracer: SdkTracerProvider,
}

impl Provider {
    /// # Errors
    ///
    /// Will return `Err` if an OTLP exporter could not be built.
    pub fn new(cli: &CliArgs) -> Result<Self, BoxError> {
        Ok(Self {
            logger: logger_provider(cli)?,
            meter: meter_provider(cli)?,
            service_name: cli.otel_service_name.clone(),
            tracer: tracer_provider(cli)?,
        })
    }

    #[must_use]
    pub fn meter(&self) -> &SdkMeterProvider {
        &self.meter
    }

    /// # Errors
    ///
    /// Will return `Err` if a global subscriber is already set.
    pub fn init_tracing_subscriber(&self) -> Result<(), BoxError> {
        let logger_layer = OpenTelemetryTracingBridge::new(&self.logger)
            .with_filter(external_component_filter()?);

        let tracer_layer = OpenTelemetryLayer::new(self.tracer.tracer(self.service_name.clone()))
            .with_filter(external_component_filter()?);

        let fmt_layer = tracing_subscriber::fmt::layer()
            .with_thread_names(true)
            .with_filter(EnvFilter::from_default_env());

        tracing_subscriber::registry()
            .with(logger_layer)
            .with(tracer_layer)
            .with(fmt_layer)
            .try_init()?;

        Ok(())
    }

    /// # Errors
    ///
    /// Will return `Err` if open telemetry providers could not shutdown.
    pub fn shutdown(&self) -> Result<(), BoxError> {
        let mut shutdown_errors = Vec::new();
        if let Err(e) = self.tracer.shutdown() {
            shutdown_errors.push(format!("tracer provider: {e}"));
        }
        if let Err(e) = self.meter.shutdown() {
            shutdown_errors.push(format!("meter provider: {e}"));
        }
        if let Err(e) = self.logger.shutdown() {
            shutdown_errors.push(format!("logger provider: {e}"));
        }
        if !shutdown_errors.is_empty() {
            return Err(format!(
                "Failed to shutdown providers:{}",
                shutdown_errors.join("\n")
            )
            .into());
        }

        Ok(())
    }
}

/// Logs of the exporters' own transports would be exported again, so
/// `hyper`, `tonic`, `h2` and `reqwest` are switched off for the
/// OpenTelemetry layers.
///
/// <https://github.com/open-telemetry/opentelemetry-rust/issues/2877>
fn external_component_filter() -> Result<EnvFilter, BoxError> {
    Ok(EnvFilter::from_default_env()
        .add_directive("hyper=off".parse()?)
        .add_directive("tonic=off".parse()?)
        .add_directive("h2=off".parse()?)
        .add_directive("reqwest=off".parse()?))
}

fn resource(cli: &CliArgs) -> opentelemetry_sdk::Resource {
    opentelemetry_sdk::Resource::builder()
        .with_service_name(cli.otel_service_name.clone())
        .build()
}

/*
 * ============================================================================
 * Exporter Settings
 * ============================================================================
 */
struct OtlpSettings {
    endpoint: String,
    protocol: Protocol,
    timeout: Duration,
}

impl OtlpSettings {
    /// Resolves signal specific settings, falling back to the shared ones and
    /// then to the OTLP defaults.
    fn new(
        cli: &CliArgs,
        endpoint: Option<&String>,
        protocol: Option<CliArgsOtelExporterOtlpProtocol>,
        timeout: Option<u64>,
        path: &str,
    ) -> Self {
        let protocol: Protocol = protocol
            .or(cli.otel_exporter_otlp_protocol)
            .unwrap_or(CliArgsOtelExporterOtlpProtocol::HttpProtobuf)
            .into();

        let endpoint = match (endpoint, &cli.otel_exporter_otlp_endpoint, protocol) {
            (Some(endpoint), _, _) => endpoint.clone(),
            (None, Some(endpoint), Protocol::Grpc) => endpoint.clone(),
            (None, Some(endpoint), Protocol::HttpBinary | Protocol::HttpJson) => {
                format!("{}/{path}", endpoint.trim_end_matches('/'))
            }
            (None, None, Protocol::Grpc) => DEFAULT_GRPC_ENDPOINT.to_string(),
            (None, None, Protocol::HttpBinary | Protocol::HttpJson) => {
                format!("{DEFAULT_HTTP_ENDPOINT}/{path}")
            }
        };

        Self {
            endpoint,
            protocol,
            timeout: Duration::from_millis(timeout.unwrap_or(cli.otel_exporter_otlp_timeout)),
        }
    }

    fn logs(cli: &CliArgs) -> Self {
        Self::new(
            cli,
            cli.otel_exporter_otlp_logs_endpoint.as_ref(),
            cli.otel_exporter_otlp_logs_protocol,
            cli.otel_exporter_otlp_logs_timeout,
            "v1/logs",
        )
    }

    fn metrics(cli: &CliArgs) -> Self {
        Self::new(
            cli,
            cli.otel_exporter_otlp_metrics_endpoint.as_ref(),
            cli.otel_exporter_otlp_metrics_protocol,
            cli.otel_exporter_otlp_metrics_timeout,
            "v1/metrics",
        )
    }

    fn traces(cli: &CliArgs) -> Self {
        Self::new(
            cli,
            cli.otel_exporter_otlp_traces_endpoint.as_ref(),
            cli.otel_exporter_otlp_traces_protocol,
            cli.otel_exporter_otlp_traces_timeout,
            "v1/traces",
        )
    }
}

/*
 * ============================================================================
 * Providers
 * ============================================================================
 */
fn logger_provider(cli: &CliArgs) -> Result<SdkLoggerProvider, BoxError> {
    let mut provider_builder = SdkLoggerProvider::builder().with_resource(resource(cli));

    if let Some(exporter) = &cli.otel_logs_exporter {
        if exporter.contains(&CliArgsOtelExporter::Console) {
            provider_builder =
                provider_builder.with_simple_exporter(opentelemetry_stdout::LogExporter::default());
        }

        if exporter.contains(&CliArgsOtelExporter::Otlp) {
            let settings = OtlpSettings::logs(cli);
            let exporter = match settings.protocol {
                Protocol::Grpc => opentelemetry_otlp::LogExporter::builder()
                    .with_tonic()
                    .with_endpoint(settings.endpoint)
                    .with_protocol(settings.protocol)
                    .with_timeout(settings.timeout)
                    .build()?,
                Protocol::HttpBinary | Protocol::HttpJson => {
                    opentelemetry_otlp::LogExporter::builder()
                        .with_http()
                        .with_endpoint(settings.endpoint)
                        .with_protocol(settings.protocol)
                        .with_timeout(settings.timeout)
                        .build()?
                }
            };
            provider_builder = provider_builder.with_batch_exporter(exporter);
        }
    }

    Ok(provider_builder.build())
}

fn meter_provider(cli: &CliArgs) -> Result<SdkMeterProvider, BoxError> {
    let mut provider_builder = SdkMeterProvider::builder().with_resource(resource(cli));

    if let Some(exporter) = &cli.otel_metrics_exporter {
        if exporter.contains(&CliArgsOtelExporter::Console) {
            provider_builder = provider_builder.with_periodic_exporter(
                opentelemetry_stdout::MetricExporterBuilder::default().build(),
            );
        }

        if exporter.contains(&CliArgsOtelExporter::Otlp) {
            let settings = OtlpSettings::metrics(cli);
            let exporter = match settings.protocol {
                Protocol::Grpc => opentelemetry_otlp::MetricExporter::builder()
                    .with_tonic()
                    .with_endpoint(settings.endpoint)
                    .with_protocol(settings.protocol)
                    .with_timeout(settings.timeout)
                    .build()?,
                Protocol::HttpBinary | Protocol::HttpJson => {
                    opentelemetry_otlp::MetricExporter::builder()
                        .with_http()
                        .with_endpoint(settings.endpoint)
                        .with_protocol(settings.protocol)
                        .with_timeout(settings.timeout)
                        .build()?
                }
            };
            provider_builder = provider_builder.with_periodic_exporter(exporter);
        }
    }

    Ok(provider_builder.build())
}

fn tracer_provider(cli: &CliArgs) -> Result<SdkTracerProvider, BoxError> {
    let mut provider_builder = SdkTracerProvider::builder().with_resource(resource(cli));

    if let Some(exporter) = &cli.otel_traces_exporter {
        if exporter.contains(&CliArgsOtelExporter::Console) {
            provider_builder = provider_builder
                .with_simple_exporter(opentelemetry_stdout::SpanExporter::default());
        }

        if exporter.contains(&CliArgsOtelExporter::Otlp) {
            let settings = OtlpSettings::traces(cli);
            let exporter = match settings.protocol {
                Protocol::Grpc => opentelemetry_otlp::SpanExporter::builder()
                    .with_tonic()
                    .with_endpoint(settings.endpoint)
                    .with_protocol(settings.protocol)
                    .with_timeout(settings.timeout)
                    .build()?,
                Protocol::HttpBinary | Protocol::HttpJson => {
                    opentelemetry_otlp::SpanExporter::builder()
                        .with_http()
                        .with_endpoint(settings.endpoint)
                        .with_protocol(settings.protocol)
                        .with_timeout(settings.timeout)
                        .build()?
                }
            };
            provider_builder = provider_builder.with_batch_exporter(exporter);
        }
    }

    Ok(provider_builder.build())
}
