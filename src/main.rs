// Citybus arrivals dashboard: bus times to and from Central
// Web UI + JSON API server, plus one-shot terminal queries

use actix_cors::Cors;
use actix_web::{middleware, web, App, HttpResponse, HttpServer};
use chrono::Utc;
use clap::{Parser, Subcommand};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::sync::Arc;

mod config;
mod ctb_api_models;
mod fetcher;
mod lookup;
mod merger;
mod pipeline;
mod presenter;

use config::DashboardConfig;
use ctb_api_models::{CtbError, CtbModels};
use presenter::BoardView;

// Embed static files at compile time
const INDEX_HTML: &str = include_str!("../static/dashboard.html");
const DASHBOARD_JS: &str = include_str!("../static/dashboard.js");

const FROM_CENTRAL_TITLE: &str = "Bus times from Central";
const TO_CENTRAL_TITLE: &str = "Bus times to Central";

/// bus arrival times to and from Central, from the Citybus real-time ETA feed
#[derive(Parser)]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    /// TOML config file; defaults to <config dir>/ctb_bus_times/dashboard.toml when present
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,
    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand)]
enum Command {
    /// run the web dashboard (default)
    Serve {
        /// address to listen on, e.g. 127.0.0.1:8080
        #[arg(short, long)]
        bind: Option<String>,
    },
    /// print arrivals on routes from a start stop towards the configured destinations
    FromCentral {
        /// start stop code, e.g. 001032
        start: String,
    },
    /// print arrivals at one of the configured inbound stops
    ToCentral {
        /// stop code, e.g. 002349
        stop: String,
    },
    /// list the configured stops
    Stops,
}

#[derive(Clone)]
struct AppState {
    config: Arc<DashboardConfig>,
}

#[derive(Serialize)]
struct ApiResponse<T> {
    success: bool,
    data: Option<T>,
    error: Option<String>,
    timestamp: i64,
    sources: Vec<String>,
}

impl<T: Serialize> ApiResponse<T> {
    fn success(data: T) -> Self {
        ApiResponse {
            success: true,
            data: Some(data),
            error: None,
            timestamp: CtbModels::get_current_timestamp(),
            sources: vec!["CTB".to_string()],
        }
    }

    fn error(message: String) -> Self {
        ApiResponse {
            success: false,
            data: None,
            error: Some(message),
            timestamp: CtbModels::get_current_timestamp(),
            sources: vec![],
        }
    }
}

#[derive(Deserialize)]
struct FromCentralQuery {
    #[serde(default)]
    start: String,
}

#[derive(Deserialize)]
struct ToCentralQuery {
    #[serde(default)]
    stop: String,
}

#[derive(Serialize)]
struct StopsInfo<'a> {
    suggested_starts: &'a [config::NamedStop],
    destinations: &'a [String],
    inbound_stops: &'a [config::NamedStop],
}

// ============================================================================
// Frontend Routes
// ============================================================================

async fn serve_index() -> HttpResponse {
    HttpResponse::Ok()
        .content_type("text/html; charset=utf-8")
        .body(INDEX_HTML)
}

async fn serve_js() -> HttpResponse {
    HttpResponse::Ok()
        .content_type("application/javascript; charset=utf-8")
        .body(DASHBOARD_JS)
}

// ============================================================================
// API Endpoints
// ============================================================================

async fn get_stops(state: web::Data<AppState>) -> HttpResponse {
    let config = &state.config;
    log::info!("📍 Stops requested");
    HttpResponse::Ok().json(ApiResponse::success(StopsInfo {
        suggested_starts: &config.from_central.suggested_starts,
        destinations: &config.from_central.destinations,
        inbound_stops: &config.to_central.stops,
    }))
}

async fn get_info(state: web::Data<AppState>) -> HttpResponse {
    HttpResponse::Ok().json(ApiResponse::success(&state.config.attribution))
}

async fn get_from_central(
    state: web::Data<AppState>,
    query: web::Query<FromCentralQuery>,
) -> HttpResponse {
    let start = query.into_inner().start;
    let config = state.config.clone();
    let query_text = start.trim().to_string();

    let result = tokio::task::spawn_blocking(move || pipeline::run_from_central(&config, &start)).await;
    board_response(FROM_CENTRAL_TITLE, &query_text, result)
}

async fn get_to_central(
    state: web::Data<AppState>,
    query: web::Query<ToCentralQuery>,
) -> HttpResponse {
    let stop = query.into_inner().stop.trim().to_string();

    let name = match state.config.named_inbound_stop(&stop) {
        Some(named) => format!("{} - {}", named.name, named.stop),
        None => {
            log::info!("⚠️  Stop not offered: {}", stop);
            return HttpResponse::NotFound()
                .json(ApiResponse::<String>::error(format!("Stop '{}' not found", stop)));
        }
    };

    let config = state.config.clone();
    let result = tokio::task::spawn_blocking(move || pipeline::run_to_central(&config, &stop)).await;
    board_response(TO_CENTRAL_TITLE, &name, result)
}

fn board_response(
    title: &str,
    query: &str,
    result: Result<ctb_api_models::Result<ctb_api_models::BoardOutcome>, tokio::task::JoinError>,
) -> HttpResponse {
    match result {
        Ok(Ok(outcome)) => {
            let view = BoardView::new(title, query, &outcome, Utc::now());
            log::info!("🚌 {} ({}): {} arrivals", title, query, view.rows.len());
            HttpResponse::Ok().json(ApiResponse::success(view))
        }
        Ok(Err(e)) => {
            log::error!("❌ {} ({}) failed: {}", title, query, e);
            HttpResponse::InternalServerError()
                .json(ApiResponse::<String>::error(format!("Failed to load arrivals: {}", e)))
        }
        Err(e) => {
            log::error!("❌ {} task panicked: {}", title, e);
            HttpResponse::InternalServerError()
                .json(ApiResponse::<String>::error("Arrivals task panicked".to_string()))
        }
    }
}

async fn health_check() -> HttpResponse {
    HttpResponse::Ok().json(serde_json::json!({
        "status": "healthy",
        "service": "Citybus Central Arrivals",
        "version": env!("CARGO_PKG_VERSION"),
        "sources": ["CTB"],
        "timestamp": CtbModels::get_current_timestamp(),
        "embedded_frontend": true
    }))
}

fn configure_routes(cfg: &mut web::ServiceConfig) {
    cfg
        // Frontend routes
        .route("/", web::get().to(serve_index))
        .route("/dashboard.js", web::get().to(serve_js))
        // Health check
        .route("/health", web::get().to(health_check))
        // API routes
        .service(
            web::scope("/api/ctb")
                .route("/stops", web::get().to(get_stops))
                .route("/info", web::get().to(get_info))
                .route("/from-central", web::get().to(get_from_central))
                .route("/to-central", web::get().to(get_to_central)),
        );
}

// ============================================================================
// Server Setup
// ============================================================================

async fn run_server(config: DashboardConfig, bind: String) -> std::io::Result<()> {
    let app_state = AppState {
        config: Arc::new(config),
    };

    println!("\n╔════════════════════════════════════════════════════════════╗");
    println!("║   🚌 Citybus Central Arrivals Dashboard                    ║");
    println!("╚════════════════════════════════════════════════════════════╝\n");
    println!("🕐 Started at: {}", CtbModels::format_timestamp_full(CtbModels::get_current_timestamp()));
    println!("🌐 Server running on: http://{}", bind);
    println!("📡 API available at: http://{}/api/ctb\n", bind);

    println!("📍 Available Routes:");
    println!("┌─────────────────────────────────────────────────────────────┐");
    println!("│   GET  /                           - Web UI (embedded)      │");
    println!("│   GET  /api/ctb/stops              - Configured stops       │");
    println!("│   GET  /api/ctb/from-central?start - Bus times from Central │");
    println!("│   GET  /api/ctb/to-central?stop    - Bus times to Central   │");
    println!("│   GET  /api/ctb/info               - Source and citation    │");
    println!("│   GET  /health                     - Health check           │");
    println!("└─────────────────────────────────────────────────────────────┘\n");

    HttpServer::new(move || {
        let cors = Cors::permissive();

        App::new()
            .app_data(web::Data::new(app_state.clone()))
            .wrap(cors)
            .wrap(middleware::Logger::default())
            .wrap(middleware::Compress::default())
            .configure(configure_routes)
    })
        .bind(bind)?
        .run()
        .await
}

// ============================================================================
// Main Entry Point
// ============================================================================

fn print_board(title: &str, query: &str, config: &DashboardConfig, outcome: &ctb_api_models::BoardOutcome) {
    let view = BoardView::new(title, query, outcome, Utc::now());
    print!("{}", presenter::render_text(&view, &config.attribution));
}

fn run(cli: Cli) -> ctb_api_models::Result<()> {
    let config = DashboardConfig::load(cli.config.as_deref())?;

    match cli.command.unwrap_or(Command::Serve { bind: None }) {
        Command::Serve { bind } => {
            let bind = bind.unwrap_or_else(|| format!("{}:{}", config.server.host, config.server.port));
            actix_web::rt::System::new()
                .block_on(run_server(config, bind))
                .map_err(|e| CtbError::NetworkError(format!("Server error: {}", e)))
        }
        Command::FromCentral { start } => {
            let outcome = pipeline::run_from_central(&config, &start)?;
            print_board(FROM_CENTRAL_TITLE, start.trim(), &config, &outcome);
            Ok(())
        }
        Command::ToCentral { stop } => {
            let named = config.named_inbound_stop(stop.trim()).cloned().ok_or_else(|| {
                let offered: Vec<_> = config.to_central.stops.iter().map(|s| s.stop.as_str()).collect();
                CtbError::ConfigError(format!("stop '{}' is not one of {:?}", stop.trim(), offered))
            })?;
            let outcome = pipeline::run_to_central(&config, &named.stop)?;
            print_board(TO_CENTRAL_TITLE, &format!("{} - {}", named.name, named.stop), &config, &outcome);
            Ok(())
        }
        Command::Stops => {
            println!("📍 Start points (bus times from Central):");
            for s in &config.from_central.suggested_starts {
                println!("   {} - {}", s.name, s.stop);
            }
            println!("🎯 Destinations: {}", config.from_central.destinations.join(", "));
            println!("🚏 Stops (bus times to Central):");
            for s in &config.to_central.stops {
                println!("   {} - {}", s.name, s.stop);
            }
            Ok(())
        }
    }
}

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let cli = Cli::parse();
    if let Err(e) = run(cli) {
        log::error!("failed running ctb-bus-times: {e}");
        std::process::exit(1);
    }
}
