//! Surfa CLI
//!
//! Command-line demos for the Surfa ingest client

use anyhow::Context;
use clap::{Args, Parser, Subcommand};
use serde_json::{Value, json};
use surfa_client::{ClientConfig, Extra, IngestClient, RuntimeInfo};
use surfa_core::factory;
use tracing::info;
use tracing_subscriber::{EnvFilter, FmtSubscriber};

#[derive(Parser)]
#[command(name = "surfa")]
#[command(about = "Surfa - live traffic ingest client", long_about = None)]
struct Cli {
    /// Log level (overridden by RUST_LOG)
    #[arg(long, global = true, default_value = "info")]
    log_level: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Track a short session and flush it twice, reusing the execution id
    FlushDemo(ConnectArgs),
    /// Check that runtime-info is injected on the first flush only
    RuntimeDemo(ConnectArgs),
    /// Print the helper-built events without sending anything
    Preview,
}

#[derive(Args)]
struct ConnectArgs {
    /// Base URL for the Surfa API
    #[arg(long, env = "SURFA_API_URL", default_value = "http://localhost:3000")]
    api_url: String,

    /// Ingest API key (sk_live_... or sk_test_...)
    #[arg(long, env = "SURFA_INGEST_KEY", hide_env_values = true)]
    ingest_key: String,

    /// Buffered events that trigger an automatic flush
    #[arg(long, default_value = "10")]
    flush_at: usize,

    /// Per-request timeout in seconds
    #[arg(long, default_value = "10")]
    timeout_secs: u64,
}

impl ConnectArgs {
    fn client(&self) -> anyhow::Result<IngestClient> {
        let config = ClientConfig::new(self.ingest_key.clone())
            .with_api_url(self.api_url.clone())
            .with_flush_at(self.flush_at)
            .with_timeout_secs(self.timeout_secs);
        IngestClient::new(config).context("Failed to create ingest client")
    }
}

fn extra(value: Value) -> Extra {
    match value {
        Value::Object(map) => map,
        _ => Extra::new(),
    }
}

fn print_json(label: &str, value: &impl serde::Serialize) -> anyhow::Result<()> {
    println!("{label}:\n{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

async fn flush_demo(args: ConnectArgs) -> anyhow::Result<()> {
    let client = args.client()?;
    info!(session_id = %client.session_id(), "Created client");

    client.set_runtime(RuntimeInfo::new("anthropic", "claude-sonnet-4-5").with_mode("messages"));
    client.session_start(Extra::new()).await?;
    client
        .tool_started(
            "search_web",
            Some(json!({"query": "Rust SDK best practices", "limit": 10})),
            None,
            Extra::new(),
        )
        .await?;
    client
        .tool_completed(
            "search_web",
            Some(json!({"count": 5, "results": ["Result 1", "Result 2", "Result 3"]})),
            Some(234),
            None,
            Extra::new(),
        )
        .await?;
    client
        .custom_event(
            "custom",
            Some("demo_event".to_string()),
            extra(json!({"message": "Hello from flush demo!", "version": env!("CARGO_PKG_VERSION")})),
        )
        .await?;

    info!(buffer_len = client.buffer_len(), "Flushing events");
    match client.flush().await.context("Flush failed")? {
        Some(response) => {
            print_json("Response", &response)?;
            for key in [
                "workspace_id",
                "execution_id",
                "execution_status",
                "inserted_count",
                "correlation_normalized",
            ] {
                let value = response.get(key).map(Value::to_string);
                println!("  {key}: {}", value.as_deref().unwrap_or("N/A"));
            }
        }
        None => println!("No events to flush (buffer was empty)"),
    }
    println!("Stored execution_id: {:?}", client.execution_id());
    println!("Buffer size after flush: {}", client.buffer_len());

    client
        .tool_started(
            "write_file",
            Some(json!({"path": "/tmp/test.txt", "content": "Hello!"})),
            None,
            Extra::new(),
        )
        .await?;
    if let Some(response) = client.flush().await.context("Second flush failed")? {
        let returned = response.get("execution_id").and_then(Value::as_str);
        println!(
            "Second flush execution_id: {:?} (same as stored: {})",
            returned,
            returned.map(str::to_string) == client.execution_id()
        );
    }

    client.close().await;
    Ok(())
}

async fn runtime_demo(args: ConnectArgs) -> anyhow::Result<()> {
    let client = args.client()?;

    client.set_runtime(
        RuntimeInfo::new("anthropic", "claude-sonnet-4-5")
            .with_mode("messages")
            .with_extras(extra(json!({
                "temperature": 0.7,
                "max_tokens": 4096,
                "api_version": "2023-06-01"
            }))),
    );

    client.session_start(Extra::new()).await?;
    client
        .tool_started("search_web", Some(json!({"query": "AI runtime tracking"})), None, Extra::new())
        .await?;
    client
        .tool_completed("search_web", Some(json!({"count": 3})), Some(156), None, Extra::new())
        .await?;

    // runtime_info + session start + tool started + tool completed
    let response = client.flush().await?.context("First flush sent nothing")?;
    report_inserted("First flush", &response, 4);

    client
        .tool_started("write_file", Some(json!({"path": "/tmp/test.txt"})), None, Extra::new())
        .await?;

    // runtime_info already emitted
    let response = client.flush().await?.context("Second flush sent nothing")?;
    report_inserted("Second flush", &response, 1);

    println!("Execution ID: {:?}", client.execution_id());
    client.close().await;
    Ok(())
}

fn report_inserted(label: &str, response: &serde_json::Map<String, Value>, expected: u64) {
    let actual = response.get("inserted_count").and_then(Value::as_u64).unwrap_or(0);
    let verdict = if actual == expected { "ok" } else { "UNEXPECTED" };
    println!("{label}: inserted_count={actual} (expected {expected}) {verdict}");
}

fn preview() -> anyhow::Result<()> {
    print_json("session_started", &factory::session_started(Extra::new()))?;
    print_json("session_ended", &factory::session_ended(Extra::new()))?;
    print_json(
        "tool_call_started",
        &factory::tool_call_started(
            "search_web",
            Some(json!({"query": "AI news", "limit": 10})),
            None,
            Extra::new(),
        ),
    )?;
    print_json(
        "tool_call_completed",
        &factory::tool_call_completed("search_web", Some(json!({"count": 5})), Some(234), None, Extra::new()),
    )?;
    print_json(
        "tool_call_failed",
        &factory::tool_call_failed(
            "search_web",
            Some("Network timeout".to_string()),
            Some(5000),
            None,
            Extra::new(),
        ),
    )?;
    print_json(
        "custom",
        &factory::custom_event(
            Some("user_action".to_string()),
            extra(json!({"action": "button_click", "button_id": "submit"})),
        ),
    )?;
    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&cli.log_level));
    let subscriber = FmtSubscriber::builder().with_env_filter(filter).finish();
    tracing::subscriber::set_global_default(subscriber)?;

    match cli.command {
        Commands::FlushDemo(args) => flush_demo(args).await?,
        Commands::RuntimeDemo(args) => runtime_demo(args).await?,
        Commands::Preview => preview()?,
    }

    Ok(())
}
