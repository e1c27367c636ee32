//! Disk Simulator Server
//!
//! HTTP front end for the simulated block device

use anyhow::Context;
use bytes::Bytes;
use clap::Parser;
use disksim_rs::api::{self, ApiRequest, ApiResponse};
use disksim_rs::{
    DiskBuilder, DiskConfig, DiskService, HostDiskProbe, StatvfsProbe, DEFAULT_SNAPSHOT_PATH,
};
use http_body_util::{BodyExt, Full};
use hyper::body::Incoming;
use hyper::header::{
    HeaderValue, ACCESS_CONTROL_ALLOW_HEADERS, ACCESS_CONTROL_ALLOW_METHODS,
    ACCESS_CONTROL_ALLOW_ORIGIN, CONTENT_TYPE,
};
use hyper::server::conn::http1;
use hyper::service::service_fn;
use hyper::{Method, Request, Response, StatusCode};
use hyper_util::rt::TokioIo;
use parking_lot::Mutex;
use std::convert::Infallible;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing::{debug, info, warn};

#[derive(Parser, Debug)]
#[command(name = "disksim-server")]
#[command(about = "HTTP server for the block storage simulator")]
struct Args {
    /// TOML configuration file
    #[arg(short = 'c', long)]
    config: Option<PathBuf>,

    /// Snapshot file (overrides the config file)
    #[arg(short = 'd', long, env = "DATA_FILE")]
    data_file: Option<PathBuf>,

    /// Bind address
    #[arg(short = 'H', long, default_value = "127.0.0.1")]
    host: String,

    /// Port number
    #[arg(short = 'P', long, env = "PORT", default_value = "8080")]
    port: u16,

    /// Number of blocks for a new device
    #[arg(short = 'b', long)]
    blocks: Option<usize>,

    /// Seed for fault injection
    #[arg(long)]
    seed: Option<u64>,
}

type SharedDisk = Arc<Mutex<DiskService>>;

/// Merge CLI arguments over the config file
fn load_config(args: &Args) -> anyhow::Result<DiskConfig> {
    let mut config = match &args.config {
        Some(path) => DiskConfig::from_file(path)
            .with_context(|| format!("loading config {}", path.display()))?,
        None => DiskConfig::default(),
    };

    if let Some(blocks) = args.blocks {
        config.capacity = blocks;
    }
    if let Some(seed) = args.seed {
        config.seed = Some(seed);
    }
    config.snapshot_path = args
        .data_file
        .clone()
        .or(config.snapshot_path.take())
        .or_else(|| Some(PathBuf::from(DEFAULT_SNAPSHOT_PATH)));

    Ok(config)
}

fn to_http(response: ApiResponse) -> Response<Full<Bytes>> {
    let status =
        StatusCode::from_u16(response.status).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
    with_cors(
        Response::builder()
            .status(status)
            .header(CONTENT_TYPE, HeaderValue::from_static("application/json")),
    )
    .body(Full::new(Bytes::from(response.to_json_string())))
    .unwrap_or_else(|_| Response::new(Full::new(Bytes::new())))
}

fn with_cors(builder: hyper::http::response::Builder) -> hyper::http::response::Builder {
    builder
        .header(ACCESS_CONTROL_ALLOW_ORIGIN, "*")
        .header(ACCESS_CONTROL_ALLOW_METHODS, "GET, POST, DELETE, OPTIONS")
        .header(ACCESS_CONTROL_ALLOW_HEADERS, "Content-Type")
}

async fn handle(
    req: Request<Incoming>,
    disk: SharedDisk,
) -> Result<Response<Full<Bytes>>, Infallible> {
    let (parts, body) = req.into_parts();

    if parts.method == Method::OPTIONS {
        let preflight = with_cors(Response::builder().status(StatusCode::NO_CONTENT))
            .body(Full::new(Bytes::new()))
            .unwrap_or_else(|_| Response::new(Full::new(Bytes::new())));
        return Ok(preflight);
    }

    let body = match body.collect().await {
        Ok(collected) => collected.to_bytes(),
        Err(e) => {
            warn!("Failed to read request body: {}", e);
            return Ok(to_http(ApiResponse::error(400, "Invalid request")));
        }
    };

    let request =
        ApiRequest::new(parts.method.as_str(), parts.uri.path()).with_body(body.to_vec());
    let response = {
        let mut disk = disk.lock();
        api::route(&mut disk, &request)
    };
    debug!("{} {} -> {}", request.method, request.path, response.status);

    Ok(to_http(response))
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::INFO.into()),
        )
        .init();

    let args = Args::parse();
    let config = load_config(&args)?;

    info!("Starting disk simulator server");
    info!(
        "Device: {} blocks, snapshot {:?}",
        config.capacity, config.snapshot_path
    );

    match StatvfsProbe::root().probe() {
        Ok(host) => info!(
            "Host disk {}: {} of {} bytes used ({:.2}%)",
            host.path, host.used, host.total, host.used_percentage
        ),
        Err(e) => warn!("Host disk probe unavailable: {}", e),
    }

    let service = DiskBuilder::from_config(&config).build()?;
    let disk: SharedDisk = Arc::new(Mutex::new(service));

    let addr: SocketAddr = format!("{}:{}", args.host, args.port)
        .parse()
        .with_context(|| format!("invalid bind address {}:{}", args.host, args.port))?;

    let listener = TcpListener::bind(addr).await?;
    let local_addr = listener.local_addr()?;

    info!("Server listening on http://{}", local_addr);

    loop {
        // Accept connection or wait for Ctrl+C
        tokio::select! {
            result = listener.accept() => {
                match result {
                    Ok((socket, _)) => {
                        let disk = disk.clone();
                        tokio::spawn(async move {
                            let service = service_fn(move |req| handle(req, disk.clone()));
                            if let Err(e) = http1::Builder::new()
                                .serve_connection(TokioIo::new(socket), service)
                                .await
                            {
                                warn!("Connection error: {}", e);
                            }
                        });
                    }
                    Err(e) => {
                        warn!("Failed to accept connection: {}", e);
                    }
                }
            }
            _ = tokio::signal::ctrl_c() => {
                info!("Received Ctrl+C, shutting down...");
                break;
            }
        }
    }

    // Flush a final snapshot before exit
    {
        let mut disk = disk.lock();
        disk.persist()?;
        info!("Snapshot flushed");
    }

    info!("Server stopped");

    Ok(())
}
