// Risk Monitor - Web Server
// Read-only JSON API over the last committed reload

use anyhow::Result;
use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Json, Response},
    routing::get,
    Router,
};
use clap::Parser;
use risk_monitor_loader::{
    list_customers, load_snapshot, table_counts, Catalog, Config, Pipeline, TableCount,
};
use rusqlite::Connection;
use serde::Serialize;
use std::path::PathBuf;
use std::sync::{Arc, Mutex, MutexGuard};
use tower_http::cors::CorsLayer;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "risk-server")]
#[command(about = "Serve loaded risk-monitoring data as JSON")]
struct Args {
    /// Path to TOML configuration file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Override the database path
    #[arg(long)]
    database: Option<PathBuf>,

    /// Address to listen on
    #[arg(long, default_value = "0.0.0.0:3000")]
    addr: String,
}

/// Shared application state
#[derive(Clone)]
struct AppState {
    db: Arc<Mutex<Connection>>,
    catalog: Arc<Catalog>,
}

impl AppState {
    fn conn(&self) -> Result<MutexGuard<'_, Connection>, Response> {
        self.db.lock().map_err(|_| {
            error!("Database mutex poisoned");
            failure(StatusCode::INTERNAL_SERVER_ERROR, "database unavailable".to_string())
        })
    }
}

/// API Response wrapper
#[derive(Serialize)]
struct ApiResponse<T> {
    success: bool,
    data: Option<T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
}

impl<T: Serialize> ApiResponse<T> {
    fn ok(data: T) -> Self {
        Self {
            success: true,
            data: Some(data),
            error: None,
        }
    }
}

fn failure(status: StatusCode, message: String) -> Response {
    let body = ApiResponse::<()> {
        success: false,
        data: None,
        error: Some(message),
    };
    (status, Json(body)).into_response()
}

// ============================================================================
// API Handlers
// ============================================================================

/// GET /api/health - Health check
async fn health_check() -> impl IntoResponse {
    Json(ApiResponse::ok("OK"))
}

/// GET /api/customers - All customers in load order
async fn get_customers(State(state): State<AppState>) -> Response {
    let conn = match state.conn() {
        Ok(conn) => conn,
        Err(response) => return response,
    };

    match list_customers(&conn) {
        Ok(customers) => (StatusCode::OK, Json(ApiResponse::ok(customers))).into_response(),
        Err(e) => {
            error!("Error listing customers: {}", e);
            failure(StatusCode::INTERNAL_SERVER_ERROR, e.to_string())
        }
    }
}

/// GET /api/customers/:user_id - One customer's snapshot
async fn get_customer_snapshot(
    State(state): State<AppState>,
    Path(user_id): Path<String>,
) -> Response {
    let conn = match state.conn() {
        Ok(conn) => conn,
        Err(response) => return response,
    };

    match load_snapshot(&conn, &user_id) {
        Ok(Some(snapshot)) => (StatusCode::OK, Json(ApiResponse::ok(snapshot))).into_response(),
        Ok(None) => failure(StatusCode::NOT_FOUND, format!("customer {} not found", user_id)),
        Err(e) => {
            error!("Error loading snapshot for {}: {}", user_id, e);
            failure(StatusCode::INTERNAL_SERVER_ERROR, e.to_string())
        }
    }
}

/// GET /api/tables - Row count per table
async fn get_tables(State(state): State<AppState>) -> Response {
    let conn = match state.conn() {
        Ok(conn) => conn,
        Err(response) => return response,
    };

    match table_counts(&conn, &state.catalog) {
        Ok(counts) => {
            (StatusCode::OK, Json(ApiResponse::<Vec<TableCount>>::ok(counts))).into_response()
        }
        Err(e) => {
            error!("Error counting rows: {}", e);
            failure(StatusCode::INTERNAL_SERVER_ERROR, e.to_string())
        }
    }
}

// ============================================================================
// Main Server
// ============================================================================

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_target(false)
        .init();
    let args = Args::parse();

    let mut config = match &args.config {
        Some(path) => Config::load(path)?,
        None => Config::default(),
    }
    .with_env_overrides()?;
    if let Some(database) = args.database {
        config.database.path = database;
    }

    let pipeline = Pipeline::new(config)?;
    let conn = pipeline.connect_read_only()?;
    info!("✓ Database opened: {}", pipeline.config().database.path.display());

    let state = AppState {
        db: Arc::new(Mutex::new(conn)),
        catalog: Arc::new(Catalog::risk_monitor()?),
    };

    let api_routes = Router::new()
        .route("/health", get(health_check))
        .route("/customers", get(get_customers))
        .route("/customers/:user_id", get(get_customer_snapshot))
        .route("/tables", get(get_tables))
        .with_state(state);

    let app = Router::new()
        .nest("/api", api_routes)
        .layer(CorsLayer::permissive());

    let listener = tokio::net::TcpListener::bind(&args.addr).await?;
    info!("🚀 Server running on http://{}", args.addr);

    axum::serve(listener, app).await?;
    Ok(())
}
