use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueEnum};

/*
 * ============================================================================
 * Cli
 * ============================================================================
 */
#[allow(clippy::module_name_repetitions)]
#[derive(Parser, Debug)]
#[command(version, about)]
pub struct CliArgs {
    #[command(subcommand)]
    pub command: CliCommands,

    /// Sets the value of the `service.name` resource attribute.
    #[arg(
        long,
        env = "OTEL_SERVICE_NAME",
        default_value = "backplane-operator",
        global = true
    )]
    pub otel_service_name: String,

    /// Specifies which exporter is used for logs.
    #[arg(long, env = "OTEL_LOGS_EXPORTER", value_delimiter = ',', global = true)]
    pub otel_logs_exporter: Option<Vec<CliArgsOtelExporter>>,

    /// Specifies which exporter is used for metrics.
    #[arg(long, env = "OTEL_METRICS_EXPORTER", value_delimiter = ',', global = true)]
    pub otel_metrics_exporter: Option<Vec<CliArgsOtelExporter>>,

    /// Specifies which exporter is used for traces.
    #[arg(long, env = "OTEL_TRACES_EXPORTER", value_delimiter = ',', global = true)]
    pub otel_traces_exporter: Option<Vec<CliArgsOtelExporter>>,

    /// A base endpoint URL for any signal type, with an optionally-specified port number.
    #[arg(long, env = "OTEL_EXPORTER_OTLP_ENDPOINT", global = true)]
    pub otel_exporter_otlp_endpoint: Option<String>,

    /// Endpoint URL for log data only, with an optionally-specified port number.
    #[arg(long, env = "OTEL_EXPORTER_OTLP_LOGS_ENDPOINT", global = true)]
    pub otel_exporter_otlp_logs_endpoint: Option<String>,

    /// Endpoint URL for metric data only, with an optionally-specified port number.
    #[arg(long, env = "OTEL_EXPORTER_OTLP_METRICS_ENDPOINT", global = true)]
    pub otel_exporter_otlp_metrics_endpoint: Option<String>,

    /// Endpoint URL for trace data only, with an optionally-specified port number.
    #[arg(long, env = "OTEL_EXPORTER_OTLP_TRACES_ENDPOINT", global = true)]
    pub otel_exporter_otlp_traces_endpoint: Option<String>,

    /// Specifies the OTLP transport protocol to be used for all telemetry data.
    #[arg(long, env = "OTEL_EXPORTER_OTLP_PROTOCOL", global = true)]
    pub otel_exporter_otlp_protocol: Option<CliArgsOtelExporterOtlpProtocol>,

    /// Specifies the OTLP transport protocol to be used for log data.
    #[arg(long, env = "OTEL_EXPORTER_OTLP_LOGS_PROTOCOL", global = true)]
    pub otel_exporter_otlp_logs_protocol: Option<CliArgsOtelExporterOtlpProtocol>,

    /// Specifies the OTLP transport protocol to be used for metrics data.
    #[arg(long, env = "OTEL_EXPORTER_OTLP_METRICS_PROTOCOL", global = true)]
    pub otel_exporter_otlp_metrics_protocol: Option<CliArgsOtelExporterOtlpProtocol>,

    /// Specifies the OTLP transport protocol to be used for trace data.
    #[arg(long, env = "OTEL_EXPORTER_OTLP_TRACES_PROTOCOL", global = true)]
    pub otel_exporter_otlp_traces_protocol: Option<CliArgsOtelExporterOtlpProtocol>,

    /// The timeout value for all outgoing data (in milliseconds).
    #[arg(
        long,
        env = "OTEL_EXPORTER_OTLP_TIMEOUT",
        default_value_t = 10000,
        global = true
    )]
    pub otel_exporter_otlp_timeout: u64,

    /// The timeout value for all outgoing logs (in milliseconds).
    #[arg(long, env = "OTEL_EXPORTER_OTLP_LOGS_TIMEOUT", global = true)]
    pub otel_exporter_otlp_logs_timeout: Option<u64>,

    /// The timeout value for all outgoing metrics (in milliseconds).
    #[arg(long, env = "OTEL_EXPORTER_OTLP_METRICS_TIMEOUT", global = true)]
    pub otel_exporter_otlp_metrics_timeout: Option<u64>,

    /// The timeout value for all outgoing traces (in milliseconds).
    #[arg(long, env = "OTEL_EXPORTER_OTLP_TRACES_TIMEOUT", global = true)]
    pub otel_exporter_otlp_traces_timeout: Option<u64>,
}

#[must_use]
pub fn parse() -> CliArgs {
    CliArgs::parse()
}

#[allow(clippy::module_name_repetitions)]
#[derive(Subcommand, Debug)]
pub enum CliCommands {
    /// Controller
    Controller(ControllerArgs),

    /// Custom Resource Definition
    Crd(CrdArgs),

    /// Markdown
    Markdown(MarkdownArgs),
}

#[allow(clippy::module_name_repetitions)]
#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum CliArgsOtelExporter {
    Console,
    Otlp,
}

#[allow(clippy::module_name_repetitions)]
#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum CliArgsOtelExporterOtlpProtocol {
    #[value(name = "grpc")]
    Grpc,

    #[value(name = "http/protobuf")]
    HttpProtobuf,

    #[value(name = "http/json")]
    HttpJson,
}

impl From<CliArgsOtelExporterOtlpProtocol> for opentelemetry_otlp::Protocol {
    fn from(value: CliArgsOtelExporterOtlpProtocol) -> Self {
        match value {
            CliArgsOtelExporterOtlpProtocol::Grpc => opentelemetry_otlp::Protocol::Grpc,
            CliArgsOtelExporterOtlpProtocol::HttpProtobuf => {
                opentelemetry_otlp::Protocol::HttpBinary
            }
            CliArgsOtelExporterOtlpProtocol::HttpJson => opentelemetry_otlp::Protocol::HttpJson,
        }
    }
}

/*
 * ============================================================================
 * Controller
 * ============================================================================
 */
#[derive(Args, Debug)]
pub struct ControllerArgs {
    #[command(subcommand)]
    pub command: ControllerCommands,
}

#[derive(Subcommand, Debug)]
pub enum ControllerCommands {
    /// Run
    Run(ControllerRunArgs),
}

#[derive(Args, Debug)]
pub struct ControllerRunArgs {
    /// Host the web server binds to.
    #[arg(long, default_value = "127.0.0.1")]
    pub host: String,

    /// Port the web server binds to.
    #[arg(long, default_value_t = 8080)]
    pub port: u16,

    /// Proxy server image pull policy, unless overridden by the `BackplaneConfig`.
    #[arg(long, default_value = "IfNotPresent")]
    pub proxy_server_image_pull_policy: String,

    /// Proxy server image uri, unless overridden by the `BackplaneConfig` image overrides.
    #[arg(
        long,
        default_value = "quay.io/stolostron/multicloud-manager:latest"
    )]
    pub proxy_server_image_uri: String,

    /// Proxy server replicas.
    #[arg(long, default_value_t = 1)]
    pub proxy_server_replicas: i32,
}

/*
 * ============================================================================
 * Custom Resource Definition
 * ============================================================================
 */
#[derive(Args, Debug)]
pub struct CrdArgs {
    #[command(subcommand)]
    pub command: CrdCommands,
}

#[derive(Subcommand, Debug)]
pub enum CrdCommands {
    /// Generate
    Generate(CrdGenerateArgs),
}

#[derive(Args, Debug)]
pub struct CrdGenerateArgs {
    /// Output format.
    #[arg(long, value_enum, default_value_t = CrdGenerateArgsFormat::Yaml)]
    pub format: CrdGenerateArgsFormat,

    /// Directory to write the document to, instead of stdout.
    #[arg(long, value_hint = clap::ValueHint::DirPath)]
    pub output: Option<PathBuf>,
}

#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum CrdGenerateArgsFormat {
    Json,
    Yaml,
}

/*
 * ============================================================================
 * Markdown
 * ============================================================================
 */
#[derive(Args, Debug)]
pub struct MarkdownArgs {
    #[command(subcommand)]
    pub command: MarkdownCommands,
}

#[derive(Subcommand, Debug)]
pub enum MarkdownCommands {
    /// Generate
    Generate(MarkdownGenerateArgs),
}

#[derive(Args, Debug)]
pub struct MarkdownGenerateArgs {
    /// Directory to write the document to, instead of stdout.
    #[arg(long, value_hint = clap::ValueHint::DirPath)]
    pub output: Option<PathBuf>,
}

#[cfg(test)]
mod tests {
    use clap::{CommandFactory, Parser};

    use super::{
        CliArgs, CliArgsOtelExporter, CliArgsOtelExporterOtlpProtocol, CliCommands,
        ControllerCommands, CrdCommands, CrdGenerateArgsFormat,
    };

    #[test]
    fn command() {
        CliArgs::command().debug_assert();
    }

    #[test]
    fn controller_run_defaults() {
        // Act
        let cli = CliArgs::try_parse_from(["backplane-operator", "controller", "run"]).unwrap();

        // Assert
        let CliCommands::Controller(controller) = cli.command else {
            panic!("expected controller command");
        };
        let ControllerCommands::Run(run) = controller.command;
        assert_eq!("127.0.0.1", run.host);
        assert_eq!(8080, run.port);
        assert_eq!("IfNotPresent", run.proxy_server_image_pull_policy);
        assert_eq!(1, run.proxy_server_replicas);
    }

    #[test]
    fn crd_generate() {
        // Act
        let cli = CliArgs::try_parse_from([
            "backplane-operator",
            "crd",
            "generate",
            "--format",
            "json",
            "--output",
            "deploy",
        ])
        .unwrap();

        // Assert
        let CliCommands::Crd(crd) = cli.command else {
            panic!("expected crd command");
        };
        let CrdCommands::Generate(generate) = crd.command;
        assert_eq!(CrdGenerateArgsFormat::Json, generate.format);
        assert_eq!(Some("deploy".into()), generate.output);
    }

    #[test]
    fn otel_arguments() {
        // Act
        let cli = CliArgs::try_parse_from([
            "backplane-operator",
            "controller",
            "run",
            "--otel-traces-exporter",
            "console,otlp",
            "--otel-exporter-otlp-protocol",
            "http/protobuf",
            "--otel-exporter-otlp-traces-timeout",
            "500",
        ])
        .unwrap();

        // Assert
        assert_eq!(
            Some(vec![CliArgsOtelExporter::Console, CliArgsOtelExporter::Otlp]),
            cli.otel_traces_exporter
        );
        assert_eq!(
            Some(CliArgsOtelExporterOtlpProtocol::HttpProtobuf),
            cli.otel_exporter_otlp_protocol
        );
        assert_eq!(Some(500), cli.otel_exporter_otlp_traces_timeout);
    }
}
