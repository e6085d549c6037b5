use std::{
    collections::HashSet,
    fs::File,
    path::{Path, PathBuf},
    sync::Arc,
    time::Duration,
};

use clap::Parser;
use eyre::WrapErr as _;
use getpot::{
    ProviderRegistry,
    core::{DispatchConfig, HttpDispatcher, PotContext, PotHandler as _, PotRequest},
};
use getpot_trusted_session::TrustedSessionProvider;
use serde_json::{Map, Value};
use tracing::level_filters::LevelFilter;
use tracing_subscriber::{Layer, layer::SubscriberExt as _, util::SubscriberInitExt};
use url::Url;

#[derive(Parser, Debug)]
#[command(
    name = "getpot",
    about = "Fetch a Proof-of-Origin Token from the registered providers.",
    version
)]
struct GetPotOptions {
    /// The Innertube client the token is for.
    #[arg(short = 'c', long, default_value = "web")]
    client: String,

    #[arg(long)]
    visitor_data: Option<String>,

    /// Signed-in session identifier. Leave unset for anonymous sessions.
    #[arg(long)]
    data_sync_id: Option<String>,

    /// Innertube context, as a JSON object.
    #[arg(long)]
    context: Option<String>,

    #[arg(long)]
    player_url: Option<String>,

    #[arg(long)]
    video_id: Option<String>,

    /// The kind of token to fetch: gvs or player.
    #[arg(long, default_value_t = PotContext::Gvs)]
    pot_context: PotContext,

    /// Base URL of the trusted-session token server.
    #[arg(long, default_value = TrustedSessionProvider::DEFAULT_ENDPOINT)]
    endpoint: String,

    /// Request timeout in seconds.
    #[arg(
        short = 't',
        long,
        default_value_t = DispatchConfig::TIMEOUT.as_secs(),
        value_parser = clap::value_parser!(u64).range(1..)
    )]
    timeout: u64,

    /// Proxy for all outgoing requests.
    #[arg(long)]
    proxy: Option<Url>,

    /// The providers to consult. By default, all providers are consulted.
    #[arg(short = 'p', long = "provider", value_delimiter = ',')]
    providers: Vec<String>,

    /// Print the registered providers and exit.
    #[arg(long)]
    list: bool,

    /// Also write errors as JSON lines to this file.
    #[arg(long)]
    error_report: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> eyre::Result<()> {
    let options = GetPotOptions::parse();
    setup_tracing(options.error_report.as_deref())?;

    color_eyre::install()?;

    let registry = construct_registry(&options)?;

    if options.list {
        for handler in registry.handlers() {
            println!("{} {}", handler.name(), handler.version());
        }
        return Ok(());
    }

    if registry.is_empty() {
        eyre::bail!("No registered provider matches {:?}", options.providers);
    }

    let request = build_request(&options)?;
    let dispatcher = HttpDispatcher::new(DispatchConfig {
        timeout: Duration::from_secs(options.timeout),
        proxy: options.proxy.clone(),
        ..Default::default()
    })?;

    match registry.fetch(&request, &dispatcher).await {
        Ok(token) => {
            println!("{token}");
            Ok(())
        }
        Err(err) => {
            tracing::error!(client = %request.client, "{err}");
            Err(err.into())
        }
    }
}

fn construct_registry(options: &GetPotOptions) -> eyre::Result<ProviderRegistry> {
    let mut registry = ProviderRegistry::new();
    getpot_trusted_session::register(
        &mut registry,
        TrustedSessionProvider::new(options.endpoint.as_str()),
    )?;

    if !options.providers.is_empty() {
        let include: HashSet<&str> = options.providers.iter().map(String::as_str).collect();
        registry.retain(|name| include.contains(name));
    }
    Ok(registry)
}

fn build_request(options: &GetPotOptions) -> eyre::Result<PotRequest> {
    let mut request =
        PotRequest::new(options.client.as_str()).with_pot_context(options.pot_context);
    request.visitor_data = options.visitor_data.clone();
    request.data_sync_id = options.data_sync_id.clone();
    request.player_url = options.player_url.clone();
    request.video_id = options.video_id.clone();

    if let Some(context) = &options.context {
        let context: Map<String, Value> =
            serde_json::from_str(context).wrap_err("--context must be a JSON object")?;
        request = request.with_context(context);
    }
    Ok(request)
}

fn setup_tracing(error_report: Option<&Path>) -> eyre::Result<()> {
    // stdout carries the token
    let stderr_log = tracing_subscriber::fmt::layer()
        .with_writer(std::io::stderr)
        .with_ansi(true)
        .with_level(true)
        .with_filter(
            tracing_subscriber::EnvFilter::builder()
                .with_default_directive(LevelFilter::INFO.into())
                .from_env_lossy(),
        );

    let error_report_layer = match error_report {
        Some(path) => {
            let file = File::create(path).map_err(|e| {
                eyre::eyre!("Failed to create error report {}: {e}", path.display())
            })?;
            Some(
                tracing_subscriber::fmt::layer()
                    .json()
                    .with_writer(Arc::new(file))
                    .with_filter(LevelFilter::ERROR),
            )
        }
        None => None,
    };

    tracing_subscriber::registry()
        .with(stderr_log)
        .with(error_report_layer)
        .init();
    Ok(())
}
