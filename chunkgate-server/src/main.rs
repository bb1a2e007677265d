//! chunkgate server binary

use anyhow::Context;
use chunkgate_core::GateConfig;
use chunkgate_server::{AppState, GateServer};
use clap::{value_parser, Arg, ArgMatches, Command};
use std::net::SocketAddr;
use std::path::PathBuf;
use tracing::info;
use tracing_subscriber::EnvFilter;

fn cli() -> Command {
    let defaults = GateConfig::default();

    Command::new("chunkgate-server")
        .version(env!("CARGO_PKG_VERSION"))
        .about("Chunked upload gateway with session tracking and object storage")
        .arg(
            Arg::new("bind")
                .long("bind")
                .env("CHUNKGATE_BIND")
                .value_name("ADDR")
                .help("Bind address")
                .value_parser(value_parser!(SocketAddr))
                .default_value("127.0.0.1:8080"),
        )
        .arg(
            Arg::new("data-dir")
                .long("data-dir")
                .env("CHUNKGATE_DATA_DIR")
                .value_name("PATH")
                .help("Object store directory")
                .value_parser(value_parser!(PathBuf))
                .default_value(defaults.data_dir.into_os_string()),
        )
        .arg(
            Arg::new("temp-root")
                .long("temp-root")
                .env("CHUNKGATE_TEMP_ROOT")
                .value_name("PATH")
                .help("Parent directory for per-upload scratch directories")
                .value_parser(value_parser!(PathBuf))
                .default_value(defaults.temp_root.into_os_string()),
        )
        .arg(
            Arg::new("bucket")
                .long("bucket")
                .env("CHUNKGATE_BUCKET")
                .value_name("NAME")
                .help("Destination bucket")
                .default_value(defaults.bucket),
        )
        .arg(
            Arg::new("public-base-url")
                .long("public-base-url")
                .env("CHUNKGATE_PUBLIC_BASE_URL")
                .value_name("URL")
                .help("Base of the locator URLs handed back to clients")
                .default_value(defaults.public_base_url),
        )
        .arg(
            Arg::new("path-service-url")
                .long("path-service-url")
                .env("CHUNKGATE_PATH_SERVICE_URL")
                .value_name("URL")
                .help("Path resolution service endpoint"),
        )
        .arg(
            Arg::new("path-service-timeout-secs")
                .long("path-service-timeout-secs")
                .env("CHUNKGATE_PATH_SERVICE_TIMEOUT_SECS")
                .value_name("SECS")
                .value_parser(value_parser!(u64))
                .default_value(defaults.path_service_timeout_secs.to_string()),
        )
        .arg(
            Arg::new("download-timeout-secs")
                .long("download-timeout-secs")
                .env("CHUNKGATE_DOWNLOAD_TIMEOUT_SECS")
                .value_name("SECS")
                .help("Give up on a public URL download that stalls this long")
                .value_parser(value_parser!(u64))
                .default_value(defaults.download_timeout_secs.to_string()),
        )
        .arg(
            Arg::new("session-idle-timeout-secs")
                .long("session-idle-timeout-secs")
                .env("CHUNKGATE_SESSION_IDLE_TIMEOUT_SECS")
                .value_name("SECS")
                .help("Abandoned sessions are discarded after this long")
                .value_parser(value_parser!(u64))
                .default_value(defaults.session_idle_timeout_secs.to_string()),
        )
        .arg(
            Arg::new("sweep-interval-secs")
                .long("sweep-interval-secs")
                .env("CHUNKGATE_SWEEP_INTERVAL_SECS")
                .value_name("SECS")
                .help("How often to look for abandoned sessions, 0 disables")
                .value_parser(value_parser!(u64))
                .default_value(defaults.sweep_interval_secs.to_string()),
        )
        .arg(
            Arg::new("max-body-bytes")
                .long("max-body-bytes")
                .env("CHUNKGATE_MAX_BODY_BYTES")
                .value_name("BYTES")
                .help("Largest accepted chunk or direct upload body")
                .value_parser(value_parser!(usize))
                .default_value(defaults.max_body_bytes.to_string()),
        )
        .arg(
            Arg::new("log-format")
                .long("log-format")
                .env("CHUNKGATE_LOG_FORMAT")
                .value_parser(["text", "json"])
                .default_value("text"),
        )
}

fn config_from(matches: &ArgMatches) -> anyhow::Result<GateConfig> {
    fn required<T: Clone + Send + Sync + 'static>(matches: &ArgMatches, id: &str) -> anyhow::Result<T> {
        matches
            .get_one::<T>(id)
            .cloned()
            .with_context(|| format!("missing --{}", id))
    }

    Ok(GateConfig {
        bucket: required(matches, "bucket")?,
        data_dir: required(matches, "data-dir")?,
        temp_root: required(matches, "temp-root")?,
        public_base_url: required(matches, "public-base-url")?,
        path_service_url: matches.get_one::<String>("path-service-url").cloned(),
        path_service_timeout_secs: required(matches, "path-service-timeout-secs")?,
        download_timeout_secs: required(matches, "download-timeout-secs")?,
        session_idle_timeout_secs: required(matches, "session-idle-timeout-secs")?,
        sweep_interval_secs: required(matches, "sweep-interval-secs")?,
        max_body_bytes: required(matches, "max-body-bytes")?,
    })
}

fn init_tracing(format: &str) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let builder = tracing_subscriber::fmt().with_env_filter(filter);

    if format == "json" {
        builder.json().init();
    } else {
        builder.init();
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let matches = cli().get_matches();

    let log_format = matches
        .get_one::<String>("log-format")
        .map(String::as_str)
        .unwrap_or("text");
    init_tracing(log_format);

    let bind_addr = *matches
        .get_one::<SocketAddr>("bind")
        .context("missing --bind")?;
    let config = config_from(&matches)?;

    info!("Starting chunkgate {}", env!("CARGO_PKG_VERSION"));
    info!("Data directory: {}", config.data_dir.display());
    info!("Scratch directory: {}", config.temp_root.display());
    info!("Bucket: {}", config.bucket);

    let state = AppState::from_config(&config).context("failed to initialise gateway")?;
    let _sweeper = state.spawn_sweeper();

    GateServer::new(state).serve(bind_addr).await
}
