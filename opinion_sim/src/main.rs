//! Opinion Simulator CLI
//!
//! Run the named scenarios, or replay a scripted user feed against a
//! configured world.

use std::path::PathBuf;
use std::sync::Arc;

use clap::Parser;
use opinion_core::InvariantReport;
use opinion_sim::scenarios::ScenarioId;
use opinion_sim::{
    load_script, ScenarioResult, ScenarioRunner, ScriptedAnalyzer, ScriptedPost, Session, SimConfig,
    SimError, SimExport, SimFrame, SimWorld,
};
use tracing::{debug, error, info, warn};
use tracing_subscriber::{EnvFilter, FmtSubscriber};

/// Opinion propagation simulator
#[derive(Parser, Debug)]
#[command(name = "opinion-sim")]
#[command(about = "Run deterministic opinion propagation simulations", long_about = None)]
struct Args {
    /// Master seed for determinism (0 = random from time)
    #[arg(short, long, default_value = "42")]
    seed: u64,

    /// Number of agents
    #[arg(short, long, default_value = "21")]
    agents: usize,

    /// Scenario to run (consensus, user_anchor, ..., bot_chatter, all)
    #[arg(short = 'S', long, default_value = "all")]
    scenario: String,

    /// Number of consecutive seeds to test
    #[arg(long, default_value = "1")]
    seeds: usize,

    /// Steps per run
    #[arg(long, default_value = "50")]
    steps: u64,

    /// World configuration (TOML); switches to session mode
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// JSON list of user posts to replay; switches to session mode
    #[arg(short, long)]
    user_posts: Option<PathBuf>,

    /// Export frames to a JSON file
    #[arg(long)]
    export: Option<String>,

    /// JSON output for CI parsing
    #[arg(long)]
    json: bool,

    /// Verbose output
    #[arg(short, long)]
    verbose: bool,
}

#[tokio::main]
async fn main() {
    let args = Args::parse();

    let level = if args.verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    let subscriber = FmtSubscriber::builder().with_env_filter(filter).finish();
    if let Err(e) = tracing::subscriber::set_global_default(subscriber) {
        eprintln!("Failed to set tracing subscriber: {}", e);
    }

    if !args.json {
        info!("Opinion Simulator v{}", env!("CARGO_PKG_VERSION"));
        info!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");
    }

    let base_seed = if args.seed == 0 {
        std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .map(|d| d.as_nanos() as u64)
            .unwrap_or(42)
    } else {
        args.seed
    };

    let code = if args.config.is_some() || args.user_posts.is_some() {
        match run_session(&args, base_seed).await {
            Ok(true) => 0,
            Ok(false) => 1,
            Err(e) => {
                error!("Session failed: {}", e);
                1
            }
        }
    } else {
        run_scenarios(&args, base_seed)
    };

    if code != 0 {
        std::process::exit(code);
    }
}

/// Replays the user script against one world, one bot cycle per step.
///
/// Returns whether the final state satisfies every engine invariant.
async fn run_session(args: &Args, seed: u64) -> Result<bool, SimError> {
    let mut config = match &args.config {
        Some(path) => SimConfig::from_file(path)?,
        None => SimConfig::default(),
    };
    if args.config.is_none() {
        config = config.with_agents(args.agents);
    }
    config = config.with_seed(seed);

    let script: Vec<ScriptedPost> = match &args.user_posts {
        Some(path) => load_script(path)?,
        None => Vec::new(),
    };

    let world = SimWorld::new(config)?;
    let session = Session::new(world, Arc::new(ScriptedAnalyzer::from_script(&script)));
    info!(seed, posts = script.len(), steps = args.steps, "session started");

    let mut export = match &args.export {
        Some(_) => Some(session.with_world(|w| SimExport::new("session", seed, w)).await),
        None => None,
    };

    let mut pending = script.iter();
    for step in 0..args.steps {
        if let Some(post) = pending.next() {
            match session.submit_user_post(&post.text).await {
                Ok(outcome) => debug!(step, analyzed = ?outcome.analyzed, "user post applied"),
                Err(e) => warn!(step, error = %e, "user post rejected"),
            }
        }
        let state = session.tick().await;
        debug!(step, time_step = state.time_step, "bot cycle");

        if let Some(export) = export.as_mut() {
            let from = export.exported_posts();
            let frame = session.with_world(|w| SimFrame::capture(w, from)).await;
            export.add_frame(frame);
        }
    }

    let (report, snapshot, posts) = session
        .with_world(|w| (InvariantReport::check(w.network()), w.snapshot(), w.posts().len()))
        .await;
    let passed = report.passes();

    if let (Some(export), Some(path)) = (export.as_mut(), &args.export) {
        export.finalize(passed, (!passed).then(|| report.to_string()));
        export.write_to_file(path)?;
        info!("Exported {} frames to {}", export.frames.len(), path);
    }

    if args.json {
        let summary = serde_json::json!({
            "seed": seed,
            "passed": passed,
            "posts": posts,
            "time_step": snapshot.state.time_step,
            "time_secs": snapshot.time_sec,
            "stats": snapshot.stats,
            "violations": report.violations,
        });
        println!("{}", serde_json::to_string_pretty(&summary)?);
    } else {
        let stats = &snapshot.stats;
        info!(
            "t={:.1}s | step={} | posts={} | mean={:.3} | std={:.3} | extreme={:.0}%",
            snapshot.time_sec,
            snapshot.state.time_step,
            posts,
            stats.mean.first().copied().unwrap_or_default(),
            stats.std_dev.first().copied().unwrap_or_default(),
            stats.extreme_fraction * 100.0
        );
        if passed {
            info!("✅ All invariants hold");
        } else {
            error!("❌ {}", report);
        }
    }

    Ok(passed)
}

/// Runs the selected scenarios across `args.seeds` seeds. Returns the exit code.
fn run_scenarios(args: &Args, base_seed: u64) -> i32 {
    let scenarios: Vec<ScenarioId> = if args.scenario == "all" {
        ScenarioId::all()
    } else {
        match args.scenario.parse() {
            Ok(scenario) => vec![scenario],
            Err(e) => {
                eprintln!("Error: {}", e);
                let names: Vec<&str> = ScenarioId::all().iter().map(|s| s.name()).collect();
                eprintln!("Available scenarios: {}, all", names.join(", "));
                return 1;
            }
        }
    };

    if let Some(export_path) = &args.export {
        if scenarios.len() > 1 {
            eprintln!("Error: --export only supports a single scenario, not 'all'");
            return 1;
        }
        return export_scenario(args, base_seed, scenarios[0], export_path);
    }

    let mut all_results: Vec<ScenarioResult> = Vec::new();
    let mut failed_count = 0;

    for seed_offset in 0..args.seeds {
        let seed = base_seed.wrapping_add(seed_offset as u64);
        let runner = ScenarioRunner::new(seed, args.agents).with_steps(args.steps);

        for scenario in &scenarios {
            let result = runner.run(*scenario);

            if !args.json {
                if result.passed {
                    info!("✓ {} (seed={}) PASSED", scenario.name(), seed);
                } else {
                    error!(
                        "✗ {} (seed={}) FAILED: {}",
                        scenario.name(),
                        seed,
                        result.failure_reason.as_deref().unwrap_or("unknown")
                    );
                }
            }

            if !result.passed {
                failed_count += 1;
            }
            all_results.push(result);
        }
    }

    let total = all_results.len();
    let passed = total - failed_count;

    if args.json {
        let summary = serde_json::json!({
            "total": total,
            "passed": passed,
            "failed": failed_count,
            "results": all_results,
        });
        match serde_json::to_string_pretty(&summary) {
            Ok(text) => println!("{}", text),
            Err(e) => {
                eprintln!("Failed to encode summary: {}", e);
                return 1;
            }
        }
    } else {
        info!("");
        info!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");

        if failed_count == 0 {
            info!("✅ All {} scenario runs passed!", total);
        } else {
            error!("❌ {}/{} scenario runs failed!", failed_count, total);
            for result in all_results.iter().filter(|r| !r.passed) {
                error!(
                    "  - {} seed={}: {}",
                    result.scenario.name(),
                    result.seed,
                    result.failure_reason.as_deref().unwrap_or("unknown")
                );
            }
        }
    }

    if failed_count > 0 {
        1
    } else {
        0
    }
}

fn export_scenario(args: &Args, seed: u64, scenario: ScenarioId, export_path: &str) -> i32 {
    info!("Running with export to: {}", export_path);

    let runner = ScenarioRunner::new(seed, args.agents).with_steps(args.steps);
    let (result, export) = runner.run_with_export(scenario);

    match export {
        Some(export) => match export.write_to_file(export_path) {
            Ok(()) => info!("Exported {} frames to {}", export.frames.len(), export_path),
            Err(e) => error!("Failed to write export: {}", e),
        },
        None => warn!("{} produced no frames", scenario.name()),
    }

    if result.passed {
        info!("✓ {} (seed={}) PASSED", scenario.name(), seed);
        0
    } else {
        error!(
            "✗ {} FAILED: {}",
            scenario.name(),
            result.failure_reason.as_deref().unwrap_or("unknown")
        );
        1
    }
}
