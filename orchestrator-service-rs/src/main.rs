// orchestrator-service-rs/src/main.rs
// Command-line entry point: repair one Python file and report the session.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use executor::{ProcessSandbox, Sandbox};
use orchestrator::{HybridOrchestrator, OrchestratorConfig};
use shared_types::{DebugSession, SessionStatus};

#[derive(Parser, Debug)]
#[command(
    name = "repair-orchestrator",
    about = "Run a Python file and repair it until it executes cleanly",
    version
)]
struct Args {
    /// Python source file to repair
    file: PathBuf,

    /// Repair attempts before giving up (defaults to REPAIR_MAX_ITERATIONS)
    #[arg(short, long)]
    max_iterations: Option<u32>,

    /// Sandbox timeout per run in seconds (defaults to REPAIR_EXECUTION_TIMEOUT_SECS)
    #[arg(short, long)]
    timeout_secs: Option<u64>,

    /// Print the whole session as JSON
    #[arg(long)]
    json: bool,

    /// How often to poll the session status, in milliseconds
    #[arg(long, default_value = "250")]
    poll_ms: u64,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    config_rs::load_dotenv();
    let level = config_rs::get_optional_var("REPAIR_LOG_LEVEL").unwrap_or_else(|| "info".to_string());
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level)).init();

    let args = Args::parse();
    let code = std::fs::read_to_string(&args.file)?;

    let mut config = OrchestratorConfig::from_env();
    if let Some(secs) = args.timeout_secs {
        config.execution_timeout = Duration::from_secs(secs.max(1));
    }

    if ProcessSandbox::from_env().check_connection().await {
        log::info!("Sandbox probe succeeded");
    } else {
        log::warn!("Sandbox probe failed; executions will report runtime errors");
    }

    let orchestrator = Arc::new(HybridOrchestrator::from_config(config)?);
    let started = orchestrator.start_session(&code, args.max_iterations).await?;
    let session_id = started.session_id();
    log::info!(
        "Repairing {} as session {} (max {} iterations)",
        args.file.display(),
        session_id,
        started.max_iterations()
    );

    let handle = orchestrator.spawn_loop(session_id);
    let poll = Duration::from_millis(args.poll_ms.max(10));
    let mut last_trace = None;
    loop {
        let Some(summary) = orchestrator.get_status_summary(session_id).await else {
            return Err(format!("session {} disappeared", session_id).into());
        };
        if summary.latest_trace != last_trace {
            log::debug!(
                "iteration {}/{} version {}: {}",
                summary.current_iteration,
                summary.max_iterations,
                summary.current_version,
                summary.latest_trace.as_deref().unwrap_or("")
            );
            last_trace = summary.latest_trace;
        }
        if summary.status.is_terminal() {
            break;
        }
        tokio::time::sleep(poll).await;
    }

    // The loop has reached a terminal status; collect its result.
    handle.await??;

    let session = orchestrator
        .get_session(session_id)
        .await
        .ok_or_else(|| format!("session {} disappeared", session_id))?;

    if args.json {
        println!("{}", serde_json::to_string_pretty(&session)?);
    } else {
        print_report(&session);
    }

    if session.status() != SessionStatus::Success {
        std::process::exit(1);
    }
    Ok(())
}

fn print_report(session: &DebugSession) {
    println!("== Trace ==");
    for line in session.traces() {
        println!("{}", line);
    }

    println!();
    println!("== Result ==");
    println!("Status: {}", session.status());
    println!("Iterations: {}/{}", session.current_iteration(), session.max_iterations());
    println!("Patches: {}", session.patches().len());
    for patch in session.patches() {
        println!(
            "  v{} -> v{} [{}] {}",
            patch.version_from,
            patch.version_to,
            patch.source.as_str(),
            patch.fix_strategy.as_deref().unwrap_or(&patch.reasoning)
        );
    }
    if let Some(completed_at) = session.completed_at() {
        let elapsed = completed_at - session.created_at();
        println!("Elapsed: {} ms", elapsed.num_milliseconds());
    }

    println!();
    match session.final_code() {
        Some(code) => {
            println!("== Final code ==");
            println!("{}", code);
        }
        None => {
            println!("== Latest code (not fixed) ==");
            println!("{}", session.latest_version().code);
        }
    }
}
