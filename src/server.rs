//! rempo-server: HTTP bridge that puts the discovery engine behind a small
//! JSON API plus an SSE scan stream, so dashboard frontends can render live
//! progress without linking the crate.

use std::convert::Infallible;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::response::sse::{Event, KeepAlive, Sse};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use clap::Parser;
use futures::stream::{unfold, Stream};
use serde::Deserialize;
use serde_json::json;
use tokio::sync::mpsc;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use rempo::config::AppConfig;
use rempo::engine::{DiscoveryEngine, ScanRequest};
use rempo::git::{normalize_remote_url, GitCli, GitClient};
use rempo::scanner::{CancelToken, ChannelSink, ScanOptions};
use rempo::storage::{JsonStore, MemoryCache, ScanCache};
use rempo::summary::SummaryEngine;
use rempo::types::SummaryError;

const DETAILS_COMMIT_LIMIT: usize = 10;

#[derive(Parser)]
#[command(
    name = "rempo-server",
    version,
    about = "HTTP bridge exposing repository discovery to dashboard frontends"
)]
struct ServerCli {
    /// Address to listen on.
    #[arg(long, default_value = "127.0.0.1:7420")]
    listen: SocketAddr,

    /// Path to a rempo.toml configuration file.
    #[arg(long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Write daily-rotated JSON logs into this directory instead of stderr.
    #[arg(long, value_name = "DIR")]
    log_dir: Option<PathBuf>,
}

struct AppState {
    config: AppConfig,
    engine: DiscoveryEngine,
    store: Arc<JsonStore>,
    git: Arc<GitCli>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = ServerCli::parse();

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("rempo=info,tower_http=info"));
    // The non-blocking writer stops flushing once its guard drops, so the
    // guard has to live for the whole of main.
    let _guard = match cli.log_dir.as_ref() {
        Some(dir) => {
            let appender = tracing_appender::rolling::daily(dir, "rempo-server.log");
            let (writer, guard) = tracing_appender::non_blocking(appender);
            tracing_subscriber::fmt()
                .with_env_filter(filter)
                .json()
                .with_writer(writer)
                .init();
            Some(guard)
        }
        None => {
            tracing_subscriber::fmt()
                .with_env_filter(filter)
                .with_writer(std::io::stderr)
                .init();
            None
        }
    };

    let config = AppConfig::load(cli.config.as_deref()).context("failed to load configuration")?;
    let store = Arc::new(JsonStore::load(&config.cache.path));
    let git = Arc::new(GitCli::new());
    let cache: Arc<dyn ScanCache> = if config.cache.enabled {
        Arc::clone(&store) as Arc<dyn ScanCache>
    } else {
        Arc::new(MemoryCache::new())
    };
    let engine = DiscoveryEngine::builder()
        .git_client(Arc::clone(&git) as Arc<dyn GitClient>)
        .cache(cache)
        .scan_options(config.scanning.to_options())
        .build()
        .context("failed to assemble the discovery engine")?;

    let state = Arc::new(AppState {
        config,
        engine,
        store,
        git,
    });

    let app = Router::new()
        .route("/health", get(health))
        .route("/scan/events", get(scan_events))
        .route("/repos", get(cached_repos))
        .route("/repos/details", get(repo_details))
        .route("/repos/summary", post(repo_summary))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state);

    info!(listen = %cli.listen, "rempo-server listening");
    let listener = tokio::net::TcpListener::bind(cli.listen)
        .await
        .with_context(|| format!("failed to bind {}", cli.listen))?;
    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
            info!("shutdown signal received");
        })
        .await
        .context("server error")?;
    Ok(())
}

async fn health() -> Json<serde_json::Value> {
    Json(json!({ "status": "ok", "version": env!("CARGO_PKG_VERSION") }))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ScanParams {
    root: PathBuf,
    max_depth: Option<usize>,
    include_hidden: Option<bool>,
    /// Comma-separated extra ignore patterns.
    ignore: Option<String>,
    refresh: Option<bool>,
}

impl ScanParams {
    fn to_options(&self, defaults: &ScanOptions) -> ScanOptions {
        let mut options = defaults.clone();
        if let Some(depth) = self.max_depth {
            options.max_depth = depth;
        }
        if let Some(hidden) = self.include_hidden {
            options.include_hidden = hidden;
        }
        if let Some(ignore) = &self.ignore {
            options.extra_ignore_patterns.extend(
                ignore
                    .split(',')
                    .map(str::trim)
                    .filter(|pattern| !pattern.is_empty())
                    .map(String::from),
            );
        }
        options
    }
}

/// Streams one scan as SSE: `progress` events while the walk runs, then a
/// single `result` event with the full report (or `error`). The connection
/// stays open afterwards so EventSource clients do not auto-reconnect and
/// trigger a fresh scan; the client closes when it has the result.
async fn scan_events(
    State(state): State<Arc<AppState>>,
    Query(params): Query<ScanParams>,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    let (events_tx, events_rx) = mpsc::unbounded_channel::<Event>();

    // A dropped receiver means the client went away; stop the walk instead
    // of finishing it for nobody.
    let cancel = CancelToken::new();
    tokio::spawn({
        let tx = events_tx.clone();
        let cancel = cancel.clone();
        async move {
            tx.closed().await;
            cancel.cancel();
        }
    });

    let (sink, mut progress_rx) = ChannelSink::new();
    tokio::spawn({
        let tx = events_tx.clone();
        async move {
            while let Some(event) = progress_rx.recv().await {
                match Event::default().event("progress").json_data(&event) {
                    Ok(frame) => {
                        if tx.send(frame).is_err() {
                            break;
                        }
                    }
                    Err(err) => warn!(error = %err, "progress event failed to serialize"),
                }
            }
        }
    });

    tokio::spawn({
        let state = Arc::clone(&state);
        async move {
            let options = params.to_options(state.engine.default_options());
            let request = ScanRequest::new()
                .with_options(options)
                .refresh(params.refresh.unwrap_or(false))
                .with_sink(&sink)
                .with_cancel(cancel);
            let frame = match state.engine.scan_with(&params.root, request).await {
                Ok(report) => Event::default().event("result").json_data(&report),
                Err(err) => Event::default()
                    .event("error")
                    .json_data(json!({ "message": err.to_string() })),
            };
            match frame {
                Ok(frame) => {
                    let _ = events_tx.send(frame);
                }
                Err(err) => warn!(error = %err, "scan result failed to serialize"),
            }
        }
    });

    let stream = unfold(events_rx, |mut rx| async move {
        rx.recv()
            .await
            .map(|event| (Ok::<Event, Infallible>(event), rx))
    });
    Sse::new(stream).keep_alive(KeepAlive::default())
}

#[derive(Debug, Deserialize)]
struct RootParams {
    root: PathBuf,
}

async fn cached_repos(
    State(state): State<Arc<AppState>>,
    Query(params): Query<RootParams>,
) -> Response {
    match state.engine.cached(&params.root) {
        Some(entry) => Json(entry).into_response(),
        None => (
            StatusCode::NOT_FOUND,
            Json(json!({ "message": "no cached scan for this root" })),
        )
            .into_response(),
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct DetailsParams {
    path: PathBuf,
    commits: Option<usize>,
}

async fn repo_details(
    State(state): State<Arc<AppState>>,
    Query(params): Query<DetailsParams>,
) -> Response {
    if !state.git.is_work_tree(&params.path).await {
        return (
            StatusCode::NOT_FOUND,
            Json(json!({ "message": "not a git working tree" })),
        )
            .into_response();
    }
    let max = params.commits.unwrap_or(DETAILS_COMMIT_LIMIT);
    let queried = futures::try_join!(
        state.git.recent_commits(&params.path, max),
        state.git.status(&params.path),
        state.git.remote_url(&params.path),
    );
    match queried {
        Ok((commits, files, remote)) => Json(json!({
            "commits": commits,
            "files": files,
            "remoteUrl": remote.as_deref().map(normalize_remote_url),
        }))
        .into_response(),
        Err(err) => (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(json!({ "message": err.to_string() })),
        )
            .into_response(),
    }
}

#[derive(Debug, Deserialize)]
struct SummaryBody {
    path: PathBuf,
}

async fn repo_summary(
    State(state): State<Arc<AppState>>,
    Json(body): Json<SummaryBody>,
) -> Response {
    let engine = match SummaryEngine::from_config(
        &state.config.ai,
        None,
        Arc::clone(&state.git) as Arc<dyn GitClient>,
    ) {
        Ok(engine) => engine.with_store(Arc::clone(&state.store)),
        Err(err) => return summary_error(err),
    };
    match engine.summarize(&body.path).await {
        Ok(summary) => Json(json!({ "summary": summary })).into_response(),
        Err(err) => summary_error(err),
    }
}

fn summary_error(err: SummaryError) -> Response {
    let status = match &err {
        SummaryError::Disabled | SummaryError::MissingApiKey => StatusCode::SERVICE_UNAVAILABLE,
        SummaryError::Api { status, .. } if *status == 429 => StatusCode::TOO_MANY_REQUESTS,
        _ => StatusCode::BAD_GATEWAY,
    };
    (status, Json(json!({ "message": err.to_string() }))).into_response()
}
