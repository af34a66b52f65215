// OpenSpace Hub - Main Entry Point
//
// CLI and MCP stdio server for the OpenSpace IDE workspace.
// Usage:
//   openspace-hub serve                       # Run MCP server (stdio)
//   openspace-hub status                      # Show hub status
//   openspace-hub versions                    # Show the artifact version map
//   openspace-hub audit --tail 20             # Show recent audit events
//   openspace-hub classify <path>             # Sensitive-file check
//   openspace-hub resolve <path>              # Path-safety check

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use openspace_hub::{config, hub::Hub, mcp, paths, sensitive, watcher};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "openspace-hub")]
#[command(version)]
#[command(about = "OpenSpace Hub - MCP bridge between the browser IDE and coding agents")]
struct Cli {
    /// Workspace root directory
    #[arg(short, long, default_value = ".")]
    workspace: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run MCP server (stdio JSON-RPC)
    Serve,

    /// Show hub status for this workspace
    Status,

    /// Show the artifact version map
    Versions,

    /// Show recent audit events
    Audit {
        /// Number of events to show, newest last
        #[arg(long, default_value_t = 20)]
        tail: usize,
    },

    /// Check a path against the sensitive-file denylist
    Classify {
        /// Workspace-relative path
        path: String,
    },

    /// Resolve a path against the workspace root, rejecting escapes
    Resolve {
        /// Workspace-relative path
        path: String,
    },
}

fn main() -> Result<()> {
    // Initialize logging (safe if already init)
    let _ = env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).try_init();

    let cli = Cli::parse();

    let hub = Hub::open(&cli.workspace)
        .with_context(|| format!("Failed to open workspace at {:?}", cli.workspace))?;

    match &cli.command {
        Commands::Serve => {
            // Watcher failures degrade to serving without external-change
            // detection rather than refusing to start.
            let _watcher = match watcher::watch(&hub.root, &hub.store, &hub.config) {
                Ok(w) => Some(w),
                Err(e) => {
                    log::warn!("Workspace watcher unavailable: {}", e);
                    None
                }
            };
            // Blocks until stdin closes.
            mcp::run(hub);
        }

        Commands::Status => {
            let versions = hub.patch.snapshot();
            let events = std::fs::read_to_string(hub.root.join(config::EVENTS_FILE))
                .map(|s| s.lines().count())
                .unwrap_or(0);
            println!("OpenSpace Hub v{}", env!("CARGO_PKG_VERSION"));
            println!("Workspace: {:?}", hub.root);
            println!("Tracked artifacts: {}", versions.len());
            println!("Audit events: {}", events);
            println!("Frontend connected: {}", hub.bridge.frontend_registered());
            println!();
            println!("Bridge timeout: {}ms", hub.config.bridge_timeout_ms);
            println!("History limit: {} backups per artifact", hub.config.history_limit);
            println!("Echo window: {}ms", hub.config.echo_window_ms);
        }

        Commands::Versions => {
            let versions = hub.patch.snapshot();
            if versions.is_empty() {
                println!("No artifacts have been patched yet.");
            } else {
                for (path, version) in &versions {
                    println!("{version:>6}  {path}");
                }
            }
        }

        Commands::Audit { tail } => {
            let raw = std::fs::read_to_string(hub.root.join(config::EVENTS_FILE))
                .unwrap_or_default();
            let lines: Vec<&str> = raw.lines().collect();
            let start = lines.len().saturating_sub(*tail);
            for line in &lines[start..] {
                // Re-serialize for aligned output; pass raw lines through
                // if an old entry does not parse.
                match serde_json::from_str::<serde_json::Value>(line) {
                    Ok(ev) => println!(
                        "{} {:7} {:5} {} ({})",
                        ev["ts"].as_str().unwrap_or("?"),
                        ev["action"].as_str().unwrap_or("?"),
                        ev["actor"].as_str().unwrap_or("?"),
                        ev["artifact"].as_str().unwrap_or("?"),
                        ev["reason"].as_str().unwrap_or(""),
                    ),
                    Err(_) => println!("{line}"),
                }
            }
        }

        Commands::Classify { path } => {
            if sensitive::is_sensitive(path) {
                println!("SENSITIVE: {path} is hidden from agents");
                std::process::exit(1);
            }
            println!("OK: {path} is accessible to agents");
        }

        Commands::Resolve { path } => match paths::resolve_real_path(&hub.root, path) {
            Ok(resolved) => println!("OK: {path} -> {resolved:?}"),
            Err(e) => {
                println!("REJECTED: {e}");
                std::process::exit(1);
            }
        },
    }

    Ok(())
}
