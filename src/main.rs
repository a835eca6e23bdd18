use anyhow::Context;
use clap::Parser;
use pingora::server::configuration::Opt;
use pingora::server::Server;
use std::path::PathBuf;

use mani_offline::config::Config;
use mani_offline::proxy::OfflineProxy;

/// Mani Offline - offline-capable request cache controller built on Pingora
#[derive(Parser, Debug)]
#[command(name = "mani-offline")]
#[command(version, about, long_about = None)]
struct Args {
    /// Path to configuration file
    #[arg(short, long, default_value = "config.yaml")]
    config: PathBuf,

    /// Daemon mode
    #[arg(short = 'd', long)]
    daemon: bool,

    /// Test configuration and exit
    #[arg(long)]
    test: bool,

    /// Upgrade workers gracefully
    #[arg(long)]
    upgrade: bool,
}

fn load_config(path: &PathBuf) -> anyhow::Result<Config> {
    let config = Config::from_file(path)
        .map_err(anyhow::Error::msg)
        .with_context(|| format!("failed to load configuration from {}", path.display()))?;
    config
        .validate()
        .map_err(anyhow::Error::msg)
        .context("invalid configuration")?;
    Ok(config)
}

fn build_server(args: &Args, config: Config) -> anyhow::Result<Server> {
    let opt = Opt {
        daemon: args.daemon,
        upgrade: args.upgrade,
        ..Default::default()
    };

    let mut server = Server::new(Some(opt)).context("failed to create Pingora server")?;
    server.bootstrap();

    let listen_addr = format!("{}:{}", config.server.address, config.server.port);
    let threads = config.server.threads;
    let proxy = OfflineProxy::new(config).context("failed to build offline proxy")?;

    let mut proxy_service = pingora_proxy::http_proxy_service(&server.configuration, proxy);
    proxy_service.threads = Some(threads);
    proxy_service.add_tcp(&listen_addr);

    tracing::info!(address = %listen_addr, threads = threads, "Starting Mani Offline controller");

    server.add_service(proxy_service);
    Ok(server)
}

fn main() {
    let args = Args::parse();

    let config = load_config(&args.config).unwrap_or_else(|e| {
        eprintln!("{:#}", e);
        std::process::exit(1);
    });

    if args.test {
        println!("configuration file {} test is successful", args.config.display());
        return;
    }

    if let Err(e) = mani_offline::logging::init_subscriber(&config.logging) {
        eprintln!("Failed to initialize logging subsystem: {}", e);
        std::process::exit(1);
    }

    tracing::info!(
        config_file = %args.config.display(),
        server_address = %config.server.address,
        server_port = config.server.port,
        origin = %config.controller.origin,
        version = %config.controller.version,
        cache_backend = ?config.cache.backend,
        "Configuration loaded successfully"
    );

    match build_server(&args, config) {
        Ok(server) => server.run_forever(),
        Err(e) => {
            tracing::error!(error = %format!("{:#}", e), "Failed to start server");
            std::process::exit(1);
        }
    }
}
