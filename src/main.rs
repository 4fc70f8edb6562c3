use std::{fs::File, io::Write, net::SocketAddr};

use backplane_operator::{
    backplane_config::{self, Config, ImageConfig},
    cli::{
        CliArgs, CliCommands, ControllerCommands, ControllerRunArgs, CrdCommands, CrdGenerateArgs,
        CrdGenerateArgsFormat, MarkdownCommands, MarkdownGenerateArgs, parse,
    },
    http_server,
    metrics::Metrics,
    otel::{BoxError, Provider},
};

#[tokio::main]
async fn main() -> Result<(), BoxError> {
    let cli = parse();

    match &cli.command {
        CliCommands::Controller(controller) => match &controller.command {
            ControllerCommands::Run(run) => controller_run(&cli, run).await,
        },
        CliCommands::Crd(crd) => match &crd.command {
            CrdCommands::Generate(generate) => crd_generate(generate),
        },
        CliCommands::Markdown(markdown) => match &markdown.command {
            MarkdownCommands::Generate(generate) => markdown_generate(generate),
        },
    }
}

async fn controller_run(cli: &CliArgs, run: &ControllerRunArgs) -> Result<(), BoxError> {
    let provider = Provider::new(cli)?;
    provider.init_tracing_subscriber()?;

    let addr: SocketAddr = format!("{}:{}", run.host, run.port).parse()?;
    let client = kube::Client::try_default().await?;
    let metrics = Metrics::new(provider.meter());

    let config = Config {
        proxy_server_image: ImageConfig {
            pull_policy: run.proxy_server_image_pull_policy.clone(),
            uri: run.proxy_server_image_uri.clone(),
        },
        proxy_server_replicas: run.proxy_server_replicas,
    };

    let result: Result<(), BoxError> = tokio::select! {
        result = http_server::run(addr) => result.map_err(Into::into),
        () = backplane_config::run_controller(client, config, metrics) => Ok(()),
    };

    provider.shutdown()?;

    result
}

fn crd_generate(generate: &CrdGenerateArgs) -> Result<(), BoxError> {
    let crd = backplane_config::generate_custom_resource_definition();

    let content = match generate.format {
        CrdGenerateArgsFormat::Json => serde_json::to_string_pretty(&crd)?,
        CrdGenerateArgsFormat::Yaml => serde_yaml::to_string(&crd)?,
    };

    if let Some(output) = &generate.output {
        let path = match generate.format {
            CrdGenerateArgsFormat::Json => output.join("backplaneconfig.json"),
            CrdGenerateArgsFormat::Yaml => output.join("backplaneconfig.yaml"),
        };

        File::create(path)?.write_all(content.as_bytes())?;
    } else {
        print!("{content}");
    }

    Ok(())
}

fn markdown_generate(generate: &MarkdownGenerateArgs) -> Result<(), BoxError> {
    let content = clap_markdown::help_markdown::<CliArgs>();

    if let Some(output) = &generate.output {
        File::create(output.join("cli.md"))?.write_all(content.as_bytes())?;
    } else {
        print!("{content}");
    }

    Ok(())
}
