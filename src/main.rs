use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use clap::Parser;
use log::{error, info, warn};

use id_allocation::allocation::{register_routes, AllocationBackend, PgAllocator};
use id_allocation::{load_settings, logging, AppConfig, Environment, HttpServer, RouteRegistry};

/// Graph identifier allocation server.
#[derive(Debug, Parser)]
#[command(version, about)]
struct Cli {
    /// Deployment environment selecting the default settings file.
    #[arg(long, default_value = "development")]
    env: Environment,

    /// Settings file; overrides the environment default.
    #[arg(long)]
    config: Option<PathBuf>,
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    let path = cli
        .config
        .unwrap_or_else(|| PathBuf::from(cli.env.settings_path()));

    let settings = match load_settings(&path) {
        Ok(settings) => settings,
        Err(e) => {
            eprintln!("Failed to load settings from {path}: {e}", path = path.display());
            return ExitCode::FAILURE;
        }
    };

    logging::init(&settings.server);
    info!(
        "Starting {name} ({env}) with settings {path}",
        name = settings.server.server_name,
        env = cli.env,
        path = path.display()
    );

    match run(settings) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("Server failed: {e}");
            ExitCode::FAILURE
        }
    }
}

fn run(settings: AppConfig) -> Result<(), id_allocation::ServerError> {
    let AppConfig { server, id_allocation } = settings;

    let allocator = Arc::new(if id_allocation.pooled {
        info!(
            "Using pooled write connections, max {max}",
            max = id_allocation.pool_max_size
        );
        PgAllocator::pooled(&id_allocation.write, id_allocation.pool_config())
    } else {
        info!("Using a direct write connection per allocation");
        PgAllocator::direct(&id_allocation.write)
    });

    let mut registry = RouteRegistry::new();
    let backend: Arc<dyn AllocationBackend> = allocator.clone();
    register_routes(&mut registry, backend);

    HttpServer::new(server, registry)
        .on_process_start(move || {
            if let Err(e) = allocator.warm_up() {
                warn!("Connection pool warm-up failed, connecting on demand: {e}");
            }
        })
        .run()
}
