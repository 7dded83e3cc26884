use anyhow::Context as _;
use clap::Parser;
use fiberserve::router::Router;
use fiberserve::sandbox::{HandlerRegistry, RequestContext, Sandbox};
use fiberserve::server::{AppService, HttpServer};
use fiberserve::session::{SessionStore, SharedState};
use fiberserve::static_files::StaticFiles;
use fiberserve::runtime_config::RuntimeConfig;
use serde_json::{json, Value};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "fiberserve")]
#[command(about = "Coroutine HTTP server with isolated request sandboxes", long_about = None)]
struct Cli {
    /// Address to listen on
    #[arg(long, default_value = "127.0.0.1:8080", env = "FIBERSERVE_ADDR")]
    addr: String,

    /// Document root for static files
    #[arg(long, default_value = "public", env = "FIBERSERVE_DOC_ROOT")]
    doc_root: PathBuf,

    /// Default document served for directory paths
    #[arg(long, default_value = "index.html")]
    index: String,
}

/// Per-session visit counter (session sandbox demo).
fn counter_handler(ctx: &mut RequestContext) -> anyhow::Result<()> {
    let count = ctx
        .session()
        .get("count")
        .and_then(Value::as_i64)
        .unwrap_or(0)
        + 1;
    ctx.session_mut().insert("count".to_string(), json!(count));
    ctx.echo(&format!(
        "<h1>Visit count: {count}</h1><p>Session {}</p>",
        ctx.session_id()
    ));
    Ok(())
}

/// Cross-session visit counter (shared state demo).
fn visits_handler(ctx: &mut RequestContext) -> anyhow::Result<()> {
    let total = ctx.shared().increment("visits");
    ctx.echo(&format!("<h1>Total visits: {total}</h1>"));
    Ok(())
}

/// JSON echo of the decoded body (parsed-body demo).
fn api_echo_handler(ctx: &mut RequestContext) -> anyhow::Result<()> {
    ctx.set_header("Content-Type", "application/json");
    let name = ctx.post("name").cloned().unwrap_or(Value::Null);
    let greeting = ctx.query("greeting").unwrap_or("hello").to_string();
    ctx.echo(&json!({ "greeting": greeting, "name": name }).to_string());
    Ok(())
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();
    let config = RuntimeConfig::from_env();

    if !cli.doc_root.is_dir() {
        std::fs::create_dir_all(&cli.doc_root)
            .with_context(|| format!("creating document root {}", cli.doc_root.display()))?;
    }

    let mut handlers = HandlerRegistry::new();
    handlers.register("/counter", counter_handler);
    handlers.register("/visits", visits_handler);
    handlers.register("/api/echo", api_echo_handler);

    let statics = StaticFiles::new(&cli.doc_root)
        .with_context(|| format!("opening document root {}", cli.doc_root.display()))?
        .with_index(&cli.index);
    let sessions = Arc::new(SessionStore::new());
    let shared = Arc::new(SharedState::new());
    let service = AppService::new(
        Router::new(handlers, statics),
        Sandbox::new(sessions, shared),
    )
    .with_config(config);

    let handle = HttpServer(service)
        .start(&cli.addr)
        .with_context(|| format!("binding {}", cli.addr))?;
    info!(addr = %handle.local_addr(), "fiberserve listening");

    handle
        .join()
        .map_err(|e| anyhow::anyhow!("server failed: {e:?}"))?;
    Ok(())
}
