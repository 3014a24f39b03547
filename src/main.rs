mod demos;

use std::path::PathBuf;

use clap::{CommandFactory, Parser, Subcommand};
use futures::StreamExt;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use weave_core::config::AppConfig;
use weave_core::types::WorkflowEvent;
use weave_engine::{Engine, RunOutcome};

#[derive(Parser)]
#[command(name = "weave", version, about = "Concurrent executor-graph workflows")]
struct Cli {
    /// Path to config file
    #[arg(short, long, default_value = "weave.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List the bundled demo workflows
    Demos,
    /// Run a demo workflow and stream its events
    Run {
        /// Demo name (see `weave demos`)
        demo: String,
        /// Input, parsed as JSON when possible (defaults to the demo's sample input)
        #[arg(trailing_var_arg = true)]
        input: Vec<String>,
        /// Print events as JSON lines
        #[arg(long)]
        json: bool,
    },
    /// Print a demo's node/edge topology as JSON
    Topology {
        /// Demo name
        demo: String,
    },
    /// Show current configuration
    Config,
    /// Generate shell completions
    Completions {
        /// Shell to generate completions for
        #[arg(value_enum)]
        shell: clap_complete::Shell,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Handle completions before config loading
    if let Commands::Completions { shell } = &cli.command {
        let mut cmd = Cli::command();
        clap_complete::generate(*shell, &mut cmd, "weave", &mut std::io::stdout());
        return Ok(());
    }

    let config = AppConfig::load_or_default(&cli.config)?;

    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.log.filter)),
        )
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    match cli.command {
        Commands::Demos => {
            for demo in demos::all() {
                println!("{:<16} {}", demo.name, demo.about);
            }
        }
        Commands::Topology { demo } => {
            let demo = find_demo(&demo)?;
            let graph = (demo.build)()?;
            println!("{}", serde_json::to_string_pretty(&graph.topology())?);
        }
        Commands::Config => {
            println!("{}", toml::to_string_pretty(&config)?);
        }
        Commands::Run { demo, input, json } => {
            let demo = find_demo(&demo)?;
            let graph = (demo.build)()?;
            let input = demos::parse_input(&input).unwrap_or_else(demo.default_input);
            let engine = Engine::new(config.engine.clone());

            info!(demo = demo.name, "Running demo");
            let mut handle = engine.run(&graph, input);

            let cancel = handle.cancellation_token();
            tokio::spawn(async move {
                if tokio::signal::ctrl_c().await.is_ok() {
                    cancel.cancel();
                }
            });

            while let Some(event) = handle.events().next().await {
                if json {
                    println!("{}", serde_json::to_string(&event)?);
                } else {
                    print_event(&event);
                }
            }

            let report = handle.finish().await?;
            match report.outcome {
                RunOutcome::Completed { output } => {
                    if !json {
                        println!("\nOutput: {}", render(&output));
                    }
                }
                RunOutcome::Failed { failure } => {
                    anyhow::bail!(failure);
                }
                RunOutcome::Cancelled => {
                    warn!("Run cancelled");
                    anyhow::bail!("run cancelled");
                }
            }
        }
        // Handled before config loading
        Commands::Completions { .. } => {}
    }

    Ok(())
}

fn find_demo(name: &str) -> anyhow::Result<&'static demos::Demo> {
    demos::find(name).ok_or_else(|| {
        let names: Vec<&str> = demos::all().iter().map(|d| d.name).collect();
        anyhow::anyhow!("unknown demo '{}' (available: {})", name, names.join(", "))
    })
}

fn render(payload: &serde_json::Value) -> String {
    match payload {
        serde_json::Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

fn print_event(event: &WorkflowEvent) {
    match event {
        WorkflowEvent::RunStarted { run_id, start } => {
            println!("▶ run {} started at {}", run_id, start);
        }
        WorkflowEvent::ExecutorInvoked {
            executor_id,
            input_summary,
        } => println!("  → {} ({})", executor_id, input_summary),
        WorkflowEvent::ExecutorCompleted {
            executor_id,
            output_summary,
        } => println!("  ✓ {} → {}", executor_id, output_summary),
        WorkflowEvent::ExecutorFailed { executor_id, error } => {
            println!("  ✗ {} [{}] {}", executor_id, error.kind(), error)
        }
        WorkflowEvent::ExecutorEvent {
            executor_id,
            name,
            data,
        } => println!("  · {} {} {}", executor_id, name, data),
        WorkflowEvent::OutputProduced {
            executor_id,
            payload,
        } => println!("  ★ output from {}: {}", executor_id, render(payload)),
        WorkflowEvent::Warning {
            executor_id,
            message,
        } => match executor_id {
            Some(id) => println!("  ! {}: {}", id, message),
            None => println!("  ! {}", message),
        },
        WorkflowEvent::RunFailed { failure } => println!("✗ {}", failure),
        WorkflowEvent::RunCancelled => println!("✗ run cancelled"),
    }
}
