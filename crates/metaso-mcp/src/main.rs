use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use metaso_core::{config, tools, Config, ToolKind};
use metaso_mcp::MetasoMcp;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[derive(Parser, Debug)]
#[command(name = "metaso")]
#[command(about = "Metaso AI search as MCP tools (stdio server)", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Run as an MCP stdio server (for Cursor / Claude Desktop / MCP clients).
    #[cfg(feature = "stdio")]
    McpStdio(ConfigArgs),
    /// Print the tool definitions (json; no API key needed).
    Tools,
    /// Run a single tool call and print the MCP result envelope (json).
    Call(CallCmd),
    /// Print version info.
    Version(VersionCmd),
}

#[derive(clap::Args, Debug)]
struct ConfigArgs {
    /// Metaso API key (mk- followed by 32 uppercase letters or digits).
    #[arg(long, env = "METASO_API_KEY", hide_env_values = true)]
    api_key: Option<String>,
    /// API base URL.
    #[arg(long, env = "METASO_BASE_URL")]
    base_url: Option<String>,
    /// Per-request timeout in milliseconds.
    #[arg(long, env = "METASO_TIMEOUT")]
    timeout_ms: Option<u64>,
    /// Verbose request/response logging (to stderr).
    #[arg(long, env = "METASO_DEBUG", value_parser = clap::builder::BoolishValueParser::new())]
    debug: bool,
}

impl ConfigArgs {
    /// Invalid configuration is reported once, with help, and ends the process.
    fn load(self) -> Config {
        match Config::new(self.api_key, self.base_url, self.timeout_ms, self.debug) {
            Ok(cfg) => cfg,
            Err(e) => {
                eprintln!("Configuration error: {e}");
                eprintln!("{}", config_help());
                std::process::exit(1);
            }
        }
    }
}

#[derive(clap::Args, Debug)]
struct CallCmd {
    #[command(flatten)]
    config: ConfigArgs,
    /// Tool name, e.g. metaso_search.
    #[arg(long)]
    tool: String,
    /// Tool arguments as a JSON object.
    #[arg(long, default_value = "{}")]
    args_json: String,
}

#[derive(clap::Args, Debug)]
struct VersionCmd {
    /// Output format. Allowed: json, text
    #[arg(long, default_value = "json")]
    output: String,
}

fn config_help() -> String {
    format!(
        "\nRequired:\n  METASO_API_KEY   your Metaso API key (e.g. mk-0123456789ABCDEFGHIJKLMNOPQRSTUV)\n\
         \nOptional:\n  METASO_BASE_URL  API base URL (default: {})\n  \
         METASO_TIMEOUT   request timeout in ms (default: {})\n  \
         METASO_DEBUG     true to log requests and responses\n  \
         METASO_ENV_FILE  KEY=VALUE file loaded before the variables above\n\
         \nGet an API key at https://metaso.cn",
        config::DEFAULT_BASE_URL,
        config::DEFAULT_TIMEOUT_MS
    )
}

/// Logs go to stderr: stdout is the MCP channel.
fn init_tracing(debug: bool) {
    let default = if debug {
        "metaso=debug,metaso_mcp=debug,metaso_local=debug,metaso_core=debug,rmcp=info"
    } else {
        "metaso=info,metaso_mcp=info,metaso_local=info,rmcp=warn"
    };
    let _ = tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| default.into()))
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(std::io::stderr)
                .with_ansi(false),
        )
        .try_init();
}

/// Opt-in `KEY=VALUE` file (METASO_ENV_FILE). Never overrides variables already set.
fn load_env_file() {
    let Ok(p) = std::env::var("METASO_ENV_FILE") else {
        return;
    };
    let p = p.trim();
    if p.is_empty() {
        return;
    }
    let Ok(txt) = std::fs::read_to_string(p) else {
        return;
    };
    for raw in txt.lines() {
        let s = raw.trim();
        if s.is_empty() || s.starts_with('#') {
            continue;
        }
        let Some((k, v)) = s.split_once('=') else {
            continue;
        };
        let k = k.trim();
        let v = v.trim().trim_matches('"');
        if k.is_empty() {
            continue;
        }
        if std::env::var_os(k).is_none() {
            std::env::set_var(k, v);
        }
    }
}

#[cfg(feature = "stdio")]
async fn shutdown_signal() {
    let ctrl_c = async {
        if tokio::signal::ctrl_c().await.is_err() {
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{signal, SignalKind};
        match (signal(SignalKind::terminate()), signal(SignalKind::quit())) {
            (Ok(mut term), Ok(mut quit)) => {
                tokio::select! {
                    _ = term.recv() => tracing::info!("received SIGTERM"),
                    _ = quit.recv() => tracing::info!("received SIGQUIT"),
                }
            }
            _ => std::future::pending::<()>().await,
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => tracing::info!("received Ctrl+C"),
        _ = terminate => {}
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    load_env_file();
    let cli = Cli::parse();

    match cli.command {
        #[cfg(feature = "stdio")]
        Commands::McpStdio(args) => {
            let cfg = args.load();
            init_tracing(cfg.debug);
            tracing::info!(
                base_url = %cfg.base_url,
                timeout_ms = cfg.timeout.as_millis() as u64,
                api_key = %cfg.masked_api_key(),
                "starting Metaso MCP server"
            );
            metaso_mcp::server::serve_stdio(cfg, shutdown_signal()).await?;
            tracing::info!("Metaso MCP server stopped");
        }
        Commands::Tools => {
            let v = serde_json::json!({ "tools": tools::definitions() });
            println!("{}", serde_json::to_string_pretty(&v)?);
        }
        Commands::Call(cmd) => {
            let cfg = cmd.config.load();
            init_tracing(cfg.debug);
            let args: serde_json::Value =
                serde_json::from_str(&cmd.args_json).context("--args-json is not valid JSON")?;
            let serde_json::Value::Object(args) = args else {
                anyhow::bail!("--args-json must be a JSON object");
            };
            let mcp = MetasoMcp::new(cfg)?;
            let r = mcp.dispatch(&cmd.tool, Some(&args)).await;
            println!("{}", serde_json::to_string_pretty(&r)?);
        }
        Commands::Version(cmd) => {
            let name = env!("CARGO_PKG_NAME");
            let version = env!("CARGO_PKG_VERSION");
            match cmd.output.as_str() {
                "text" => println!("metaso {version}"),
                "json" => {
                    let tool_names: Vec<&str> = ToolKind::ALL.iter().map(|k| k.name()).collect();
                    let v = serde_json::json!({
                        "name": "metaso",
                        "package": name,
                        "version": version,
                        "tools": tool_names,
                        "features": { "stdio": cfg!(feature = "stdio") },
                    });
                    println!("{}", serde_json::to_string_pretty(&v)?);
                }
                other => anyhow::bail!("unknown --output {other:?} (allowed: json, text)"),
            }
        }
    }
    Ok(())
}
