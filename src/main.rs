use std::{path::Path, sync::Arc};

use clap::{Parser, Subcommand};
use color_eyre::{Result, eyre::Context};
use service_bus::{
    adapters::{AdapterServer, FileSystemAdapter, HttpClientAdapter, HttpHandler},
    config::{
        AdapterConfig, Config, ConfigValidator, Rule, RuleFrom, RuleTo, Settings,
        SettingsOverrides, load_config,
    },
    core::{EndpointTable, RuleExecutor, TemplateCache},
    ports::http_client::HttpClient,
    tracing_setup,
    utils::graceful_shutdown::GracefulShutdown,
};
use tokio::task::JoinSet;

const DEFAULT_CONFIG_PATH: &str = "config/config.json";

#[derive(Parser, Debug)]
#[clap(author, version, about)]
struct Args {
    #[clap(subcommand)]
    command: Option<Commands>,

    /// Rule document to load
    #[clap(
        short,
        long,
        default_value = DEFAULT_CONFIG_PATH,
        env = "SERVICE_BUS_CONFIG",
        global = true
    )]
    config: String,

    /// File that also receives every log line (empty string disables it)
    #[clap(long, global = true)]
    log: Option<String>,

    /// Log output format: pretty or json
    #[clap(long, global = true)]
    log_format: Option<String>,

    /// Log filter, e.g. `info` or `service_bus=debug`
    #[clap(long, global = true)]
    log_level: Option<String>,

    /// Upper bound for one upstream exchange, e.g. `30s`
    #[clap(long, global = true)]
    proxy_timeout: Option<String>,

    /// Interface every adapter binds to
    #[clap(long, global = true)]
    bind_host: Option<String>,
}

impl Args {
    fn overrides(&self) -> SettingsOverrides {
        SettingsOverrides {
            bind_host: self.bind_host.clone(),
            proxy_timeout: self.proxy_timeout.clone(),
            log_level: self.log_level.clone(),
            log_format: self.log_format.clone(),
            log_file: self.log.clone(),
        }
    }
}

#[derive(Subcommand, Debug, Clone, Copy)]
enum Commands {
    /// Start one server per configured adapter (default)
    Serve,
    /// Load and validate the rule document, then exit
    Validate,
    /// Write an example rule document
    Init,
}

#[tokio::main]
async fn main() -> Result<()> {
    color_eyre::install()?;

    let args = Args::parse();
    let settings = Settings::load(&args.overrides()).context("Failed to load runtime settings")?;

    match args.command.unwrap_or(Commands::Serve) {
        Commands::Serve => serve(&args.config, settings).await,
        Commands::Validate => validate_config_command(&args.config).await,
        Commands::Init => init_config_command(&args.config).await,
    }
}

async fn serve(config_path: &str, settings: Settings) -> Result<()> {
    tracing_setup::init_tracing(&settings).context("Failed to initialize tracing")?;

    tracing::info!("Loading configuration from {config_path}");
    let config = load_config(config_path).await?;
    ConfigValidator::validate(&config)
        .with_context(|| format!("Invalid configuration in {config_path}"))?;
    for warning in ConfigValidator::warnings(&config) {
        tracing::warn!("{warning}");
    }

    let templates = Arc::new(TemplateCache::new(Arc::new(FileSystemAdapter::new())));
    let executor = Arc::new(RuleExecutor::new(templates));
    let http_client: Arc<dyn HttpClient> = Arc::new(
        HttpClientAdapter::new(settings.proxy_timeout)
            .context("Failed to create HTTP client adapter")?,
    );

    let graceful_shutdown = Arc::new(GracefulShutdown::new());
    let signal_handler_shutdown = graceful_shutdown.clone();
    tokio::spawn(async move {
        signal_handler_shutdown.run_signal_handler().await;
    });

    let mut servers = JoinSet::new();
    for adapter in &config.adapters {
        let handler = Arc::new(HttpHandler::new(
            adapter,
            executor.clone(),
            http_client.clone(),
            &settings,
        )?);
        let server = AdapterServer::new(adapter, handler, &settings.bind_host);
        let shutdown_token = graceful_shutdown.shutdown_token();

        tracing::info!(
            "Starting adapter '{}' on {} ({} rules)",
            server.name(),
            server.addr(),
            adapter.rules.len()
        );
        let name = server.name().to_string();
        servers.spawn(async move { (name, server.run(shutdown_token).await) });
    }

    // A failed adapter is reported; the others keep serving.
    while let Some(joined) = servers.join_next().await {
        match joined {
            Ok((name, Ok(()))) => tracing::info!("Adapter '{name}' shut down"),
            Ok((name, Err(e))) => tracing::error!("Adapter '{name}' stopped: {e:?}"),
            Err(e) => tracing::error!("Adapter task failed: {e}"),
        }
    }

    tracing::info!("All adapters stopped");
    Ok(())
}

/// Validate configuration file and exit
async fn validate_config_command(config_path: &str) -> Result<()> {
    println!("🔍 Validating configuration file: {config_path}");

    if !Path::new(config_path).exists() {
        eprintln!("❌ Error: Configuration file '{config_path}' not found");
        std::process::exit(1);
    }

    let config = match load_config(config_path).await {
        Ok(config) => {
            println!("✅ Configuration parsing: OK");
            config
        }
        Err(e) => {
            eprintln!("❌ Configuration parsing failed:");
            eprintln!("   {e:#}");
            std::process::exit(1);
        }
    };

    if let Err(e) = ConfigValidator::validate(&config) {
        eprintln!("❌ Configuration validation failed:");
        eprintln!("{e}");
        println!();
        println!("💡 Common fixes:");
        println!("   • Give every adapter its own non-zero port");
        println!("   • Start every from.path with '/'");
        println!("   • Ensure all URLs start with http:// or https://");
        println!("   • Write headers as 'Name: Value'");
        std::process::exit(1);
    }

    println!("✅ Configuration validation: OK");
    println!();
    println!("📋 Configuration Summary:");
    for adapter in &config.adapters {
        let endpoints = EndpointTable::new(&adapter.rules);
        println!(
            "   • {} on port {}: {} rules, {} endpoints",
            adapter.display_name(),
            adapter.port,
            adapter.rules.len(),
            endpoints.len()
        );
        for path in endpoints.paths() {
            println!("       - {path}");
        }
    }

    let warnings = ConfigValidator::warnings(&config);
    if !warnings.is_empty() {
        println!();
        println!("⚠️  Warnings:");
        for warning in warnings {
            println!("   • {warning}");
        }
    }

    println!();
    println!("🎉 Configuration is valid and ready to use!");
    Ok(())
}

/// Write an example rule document
async fn init_config_command(config_path: &str) -> Result<()> {
    let path = Path::new(config_path);
    if path.exists() {
        eprintln!("❌ Error: Configuration file '{config_path}' already exists");
        std::process::exit(1);
    }

    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        tokio::fs::create_dir_all(parent)
            .await
            .with_context(|| format!("Failed to create {}", parent.display()))?;
    }

    let document = serde_json::to_string_pretty(&example_config())
        .context("Failed to serialize example config")?;
    tokio::fs::write(path, document)
        .await
        .context("Failed to write config file")?;

    println!("✅ Created example configuration at: {config_path}");
    println!("   Run 'service-bus serve --config {config_path}' to start the adapters");
    Ok(())
}

fn example_config() -> Config {
    Config {
        adapters: vec![AdapterConfig {
            name: "example".to_string(),
            port: 7000,
            rules: vec![
                Rule::new(
                    RuleFrom::new("/hello", "GET"),
                    RuleTo::local(r#"{"hello": "%QUERY[name]%"}"#)
                        .with_headers(["Content-Type: application/json"]),
                ),
                Rule::new(
                    RuleFrom::new("/orders", "POST"),
                    RuleTo::forward("http://localhost:8080/orders", "POST")
                        .with_headers(["Content-Type: text/xml"])
                        .with_data(r#"<order><id>%REGEX["id":\s*"([^"]+)"][1]%</id></order>"#),
                ),
            ],
        }],
    }
}
