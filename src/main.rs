//! Keygate application entry point.
//!
//! Bootstraps the server:
//! 1. Load configuration from environment
//! 2. Connect to Redis, or fall back to the in-memory store
//! 3. Build router with API routes + headers middleware
//! 4. Start Axum server
//!
//! Also supports `keygen` and `sign` subcommands for device-side testing.

use keygate::{
    auth::{clock::SystemClock, codec, middleware::AppState, verify::KeyFamily},
    cleanup,
    config::Config,
    keys, routes,
    storage::{MemoryStore, Store},
};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

fn print_usage() {
    eprintln!("Usage:");
    eprintln!("  keygate                                 Run the server");
    eprintln!("  keygate keygen <secp256k1|rsa>          Print a new private + public key pair");
    eprintln!("  keygate sign <private.pem> <challenge>  Sign a challenge, print key data signature");
    eprintln!();
    eprintln!("Example:");
    eprintln!("  keygate keygen secp256k1 > device.pem");
    eprintln!("  keygate sign device.pem 3f9a...e1");
}

fn run_keygen(family: &str) -> Result<(), String> {
    let family: KeyFamily = family.parse()?;
    let pair = keys::generate(family).map_err(|e| e.to_string())?;
    print!("{}", pair.private_pem.as_str());
    print!("{}", pair.public_pem);
    Ok(())
}

/// The first PEM block in `text`, so the combined `keygen` output can be
/// passed to `sign` as-is.
fn first_pem_block(text: &str) -> &str {
    let Some(end) = text.find("-----END ") else {
        return text;
    };
    match text[end + 9..].find("-----") {
        Some(close) => &text[..end + 9 + close + 5],
        None => text,
    }
}

fn run_sign(private_path: &str, challenge: &str) -> Result<(), String> {
    let pem = zeroize::Zeroizing::new(
        std::fs::read_to_string(private_path)
            .map_err(|e| format!("Failed to read {}: {}", private_path, e))?,
    );
    let signature =
        keys::sign_challenge(first_pem_block(&pem), challenge).map_err(|e| e.to_string())?;
    println!("{}", codec::encode(&signature));
    Ok(())
}

/// Handle a CLI subcommand. Returns None when the server should start.
fn run_subcommand(args: &[String]) -> Option<Result<(), String>> {
    match args.get(1).map(String::as_str) {
        None => None,
        Some("keygen") if args.len() == 3 => Some(run_keygen(&args[2])),
        Some("sign") if args.len() == 4 => Some(run_sign(&args[2], &args[3])),
        Some(_) => {
            print_usage();
            std::process::exit(2);
        }
    }
}

async fn connect_store(config: &Config) -> Result<Store, String> {
    let Some(url) = config.redis_url.as_deref() else {
        let memory = Arc::new(MemoryStore::new(Arc::new(SystemClock)));
        tokio::spawn(cleanup::run_session_sweep(
            memory.clone(),
            Duration::from_secs(config.session_sweep_secs),
        ));
        tracing::warn!("REDIS_URL not set; using in-memory store (single node only)");
        return Ok(Store::Memory(memory));
    };

    let client = redis::Client::open(url).map_err(|e| format!("Invalid Redis URL: {}", e))?;
    // Verify Redis connection
    client
        .get_multiplexed_async_connection()
        .await
        .map_err(|e| format!("Failed to connect to Redis: {}", e))?;
    Ok(Store::Redis(client))
}

#[tokio::main]
async fn main() {
    let args: Vec<String> = std::env::args().collect();
    if let Some(result) = run_subcommand(&args) {
        if let Err(e) = result {
            eprintln!("Error: {}", e);
            std::process::exit(1);
        }
        return;
    }

    // Initialize tracing with env filter support (RUST_LOG)
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let config = match Config::from_env() {
        Ok(config) => config,
        Err(e) => {
            tracing::error!(error = %e, "Failed to load config");
            std::process::exit(1);
        }
    };
    tracing::info!(?config, "Starting keygate on {}", config.bind_addr);

    let store = match connect_store(&config).await {
        Ok(store) => store,
        Err(e) => {
            tracing::error!(error = %e, "Storage unavailable");
            std::process::exit(1);
        }
    };
    tracing::info!(backend = store.backend_name(), "Storage ready");

    let bind_addr = config.bind_addr;
    let state = AppState::new(config, store, Arc::new(SystemClock));
    let app = routes::app(state);

    let listener = match tokio::net::TcpListener::bind(bind_addr).await {
        Ok(listener) => listener,
        Err(e) => {
            tracing::error!(error = %e, "Failed to bind {}", bind_addr);
            std::process::exit(1);
        }
    };
    tracing::info!("Listening on {}", bind_addr);

    // Start server (with_connect_info required for ConnectInfo<SocketAddr> extractors)
    if let Err(e) = axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .await
    {
        tracing::error!(error = %e, "Server error");
        std::process::exit(1);
    }
}
