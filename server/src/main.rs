use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use axum::routing::get;
use axum::Router;
use axum_server::tls_rustls::RustlsConfig;
use clap::Parser;
use tower_http::services::ServeDir;
use tower_http::trace::TraceLayer;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

mod handlers;
mod logic;
mod state;
mod storage;

use crate::handlers::{history_handler, ws_handler};
use crate::logic::run_clock;
use crate::state::{AppState, DEFAULT_COUNTDOWN_SECS};
use crate::storage::{FileStorage, MemoryStorage, Storage};

#[derive(Parser)]
#[command(author, version, about)]
struct Args {
    /// Static files for the drawing page.
    #[arg(long)]
    public_dir: Option<PathBuf>,
    /// Persist history as JSON lines; kept in memory only when absent.
    #[arg(long)]
    history_file: Option<PathBuf>,
    #[arg(long, default_value_t = DEFAULT_COUNTDOWN_SECS)]
    countdown_secs: u64,
    #[arg(long, requires = "tls_key")]
    tls_cert: Option<PathBuf>,
    #[arg(long, requires = "tls_cert")]
    tls_key: Option<PathBuf>,
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "scribblefusion_server=info,tower_http=info".into()),
        )
        .init();

    let args = Args::parse();
    let storage: Arc<dyn Storage> = match args.history_file {
        Some(path) => match FileStorage::open(path).await {
            Ok(storage) => Arc::new(storage),
            Err(err) => {
                error!("{err}");
                std::process::exit(1);
            }
        },
        None => Arc::new(MemoryStorage::default()),
    };
    let state = AppState::new(storage, args.countdown_secs);
    tokio::spawn(run_clock(state.clone()));

    let public_dir = args
        .public_dir
        .unwrap_or_else(|| PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("../public"));

    let app = Router::new()
        .route("/api/getdrawingdata", get(history_handler))
        .route("/ws", get(ws_handler))
        .fallback_service(ServeDir::new(public_dir).append_index_html_on_directories(true))
        .layer(TraceLayer::new_for_http())
        .with_state(state);

    let port: u16 = std::env::var("PORT")
        .ok()
        .and_then(|value| value.parse().ok())
        .unwrap_or(3000);
    let addr = SocketAddr::from(([0, 0, 0, 0], port));

    match (args.tls_cert, args.tls_key) {
        (Some(cert), Some(key)) => {
            let config = RustlsConfig::from_pem_file(cert, key)
                .await
                .expect("Failed to load TLS certificate");
            info!("Canvas running at https://localhost:{port}");
            axum_server::bind_rustls(addr, config)
                .serve(app.into_make_service())
                .await
                .expect("Server crashed");
        }
        _ => {
            info!("Canvas running at http://localhost:{port}");
            let listener = tokio::net::TcpListener::bind(addr)
                .await
                .expect("Failed to bind server");
            axum::serve(listener, app).await.expect("Server crashed");
        }
    }
}
