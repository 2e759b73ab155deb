//! MediaDispatch - dispatch media analysis jobs and correlate their results
//!
//! Runs the dispatch and callback HTTP surfaces, or performs a one-shot
//! dispatch or store query from the command line.
//!
//! Exit codes:
//!   0 - Success
//!   1 - Runtime error (configuration, bind failure, store corruption, etc.)
//!   2 - A dispatched task failed and --fail-on-error was set

use anyhow::{bail, Context, Result};
use mediadispatch::{
    api,
    cli::{Args, Command, DispatchArgs, OutputFormat, QueryArgs},
    config::{Config, StoreBackend, DEFAULT_CONFIG_FILE},
    dispatch::Dispatcher,
    ingest::CallbackService,
    report,
    state::AppState,
    store::{JsonlResultStore, MemoryResultStore, ResultStore},
};
use std::sync::Arc;
use tracing::{debug, error, info, warn};
use tracing_subscriber::{EnvFilter, FmtSubscriber};

#[tokio::main]
async fn main() -> Result<()> {
    // Parse command-line arguments
    let args = Args::parse_args();

    // Validate arguments
    if let Err(e) = args.validate() {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }

    // Handle --init-config early (no logging needed)
    if args.init_config {
        return handle_init_config();
    }

    init_logging(&args);

    info!("MediaDispatch v{}", env!("CARGO_PKG_VERSION"));
    debug!("Arguments: {:?}", args);

    match run(args).await {
        Ok(exit_code) => std::process::exit(exit_code),
        Err(e) => {
            error!("{:#}", e);
            eprintln!("\n❌ Error: {:#}", e);
            std::process::exit(1);
        }
    }
}

/// Handle --init-config: generate a default .mediadispatch.toml.
fn handle_init_config() -> Result<()> {
    let path = std::path::Path::new(DEFAULT_CONFIG_FILE);

    if path.exists() {
        eprintln!(
            "⚠️  {} already exists. Remove it first or edit it manually.",
            DEFAULT_CONFIG_FILE
        );
        std::process::exit(1);
    }

    let content = Config::default_toml();
    std::fs::write(path, &content)
        .with_context(|| format!("Failed to write {}", DEFAULT_CONFIG_FILE))?;

    println!("✅ Created {} with default settings.", DEFAULT_CONFIG_FILE);
    println!("   Set [analyzer] endpoint before dispatching.");
    Ok(())
}

/// Initialize logging. `RUST_LOG` wins over the verbosity flags.
fn init_logging(args: &Args) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(args.log_level().to_string().to_lowercase()));

    let subscriber = FmtSubscriber::builder()
        .with_env_filter(filter)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false)
        .compact()
        .finish();

    if let Err(e) = tracing::subscriber::set_global_default(subscriber) {
        eprintln!("Failed to set tracing subscriber: {}", e);
    }
}

async fn run(args: Args) -> Result<i32> {
    let mut config = load_config(&args)?;
    config.merge_with_args(&args);

    match args.command {
        Some(Command::Serve(_)) => serve(config).await,
        Some(Command::Dispatch(ref dispatch)) => run_dispatch(&config, dispatch).await,
        Some(Command::Query(ref query)) => run_query(&config, query).await,
        None => bail!("A command is required: serve, dispatch or query"),
    }
}

/// Load configuration from file or use defaults.
fn load_config(args: &Args) -> Result<Config> {
    // Try explicit config path
    if let Some(ref config_path) = args.config {
        info!("Loading config from: {}", config_path.display());
        return Config::load(config_path);
    }

    // Try default location
    match Config::load_default() {
        Ok(Some(config)) => {
            info!("Loaded default config from {}", DEFAULT_CONFIG_FILE);
            Ok(config)
        }
        Ok(None) => {
            debug!("No config file found, using defaults");
            Ok(Config::default())
        }
        Err(e) => {
            warn!("Failed to load config: {:#}", e);
            Ok(Config::default())
        }
    }
}

async fn open_store(config: &Config) -> Result<Arc<dyn ResultStore>> {
    let store: Arc<dyn ResultStore> = match config.store.backend {
        StoreBackend::Memory => {
            info!("Using in-memory result store");
            Arc::new(MemoryResultStore::new())
        }
        StoreBackend::Jsonl => {
            let store = JsonlResultStore::open(&config.store.path)
                .await
                .with_context(|| {
                    format!("Failed to open result store {}", config.store.path.display())
                })?;
            Arc::new(store)
        }
    };
    Ok(store)
}

/// Run the HTTP surfaces until the process is stopped.
async fn serve(config: Config) -> Result<i32> {
    let dispatcher = Dispatcher::from_config(&config.analyzer)?;
    let store = open_store(&config).await?;
    let callbacks = CallbackService::with_config(store, &config.callbacks, config.store.stats_policy);

    let app = api::router(AppState::new(dispatcher, callbacks));

    let addr = format!("{}:{}", config.server.host, config.server.port);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind {}", addr))?;

    info!("MediaDispatch listening on {}", addr);
    info!("Endpoints:");
    info!("  - POST     /dispatch");
    info!("  - POST|PUT /callback/:task_id");
    info!("  - GET      /callback/:task_id");
    info!("  - GET      /callback/batch/:batch_id");
    info!("  - GET      /health");

    axum::serve(listener, app).await.context("Server error")?;

    Ok(0)
}

/// One-shot dispatch. Returns exit code 0 or 2.
async fn run_dispatch(config: &Config, args: &DispatchArgs) -> Result<i32> {
    let dispatcher = Dispatcher::from_config(&config.analyzer)?;
    let batch = args.to_request().into_batch()?;

    println!(
        "🚀 Dispatching {} file(s) to {}",
        batch.jobs.len(),
        config.analyzer.endpoint.as_deref().unwrap_or("<unset>")
    );

    let response = dispatcher.dispatch(batch).await?;

    let output = match args.format {
        OutputFormat::Json => report::generate_json_report(&response)?,
        OutputFormat::Markdown => report::generate_markdown_report(&response),
    };

    match args.output {
        Some(ref path) => {
            std::fs::write(path, &output)
                .with_context(|| format!("Failed to write report to {}", path.display()))?;
            println!("✅ Report saved to: {}", path.display());
        }
        None => println!("{}", output),
    }

    let failed = response.failed();
    if args.fail_on_error && failed > 0 {
        eprintln!(
            "\n⛔ {} task(s) in batch {} failed. Failing (exit code 2).",
            failed,
            response.batch_id()
        );
        return Ok(2);
    }

    Ok(0)
}

/// Print stored records from a JSON-lines store.
async fn run_query(config: &Config, args: &QueryArgs) -> Result<i32> {
    let path = &config.store.path;
    if !path.exists() {
        bail!("Result store {} does not exist", path.display());
    }

    let store = JsonlResultStore::open(path)
        .await
        .with_context(|| format!("Failed to open result store {}", path.display()))?;
    let policy = args.stats_policy.unwrap_or(config.store.stats_policy);
    let service = CallbackService::with_config(Arc::new(store), &config.callbacks, policy);

    let output = match (&args.task, &args.batch) {
        (Some(task_id), _) => {
            report::generate_json_report(&service.task_results(task_id, args.limit).await?)?
        }
        (None, Some(batch_id)) => {
            report::generate_json_report(&service.batch_results(batch_id).await?)?
        }
        (None, None) => bail!("Either --task or --batch is required"),
    };

    println!("{}", output);
    Ok(0)
}
