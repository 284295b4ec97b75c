//! Agent Society Simulation
//!
//! Runs a cooperate/defect agent society: metabolic payoffs, trust edges,
//! coalitions, death and karma-weighted rebirth. Scenarios come from a
//! built-in preset or a TOML file; when the population contains a human
//! slot the run suspends at each of that agent's turns and prompts on
//! stdin.

use std::io::{self, BufRead, Write};
use std::path::PathBuf;

use clap::Parser;
use tracing_subscriber::EnvFilter;

use society_core::config::ScenarioConfig;
use society_core::decision::DecisionFrame;
use society_core::error::SimError;
use society_core::output;
use society_core::recorder::EventRecorder;
use society_core::scheduler::{RunState, Scheduler};
use society_events::Action;

/// Command line arguments for the simulation.
#[derive(Parser, Debug)]
#[command(name = "society_sim")]
#[command(about = "A metabolic cooperate/defect agent society simulation")]
struct Args {
    /// Built-in scenario preset (friendly, harsh, mixed, human_mixed)
    #[arg(long, default_value = "mixed", conflicts_with = "scenario")]
    preset: String,

    /// Path to a TOML scenario file (overrides --preset)
    #[arg(long)]
    scenario: Option<PathBuf>,

    /// Random seed for reproducibility
    #[arg(long, default_value_t = 42)]
    seed: u64,

    /// Override the scenario's epoch count
    #[arg(long)]
    epochs: Option<u64>,

    /// Directory for snapshots, metrics, and the event log
    #[arg(long, default_value = "output")]
    output_dir: PathBuf,

    /// Mirror events to a JSONL file as they happen
    #[arg(long)]
    log_events: bool,
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    if let Err(e) = run(Args::parse()) {
        eprintln!("error: {}", e);
        std::process::exit(1);
    }
}

fn run(args: Args) -> Result<(), SimError> {
    let mut config = match &args.scenario {
        Some(path) => ScenarioConfig::from_file(path)?,
        None => ScenarioConfig::preset(&args.preset)?,
    };
    if let Some(epochs) = args.epochs {
        config.schedule.epochs = epochs;
    }

    println!("Agent Society Simulation");
    println!("========================");
    println!("Scenario: {}", config.name);
    println!("Seed: {}", args.seed);
    println!("Agents: {}", config.population.agents.len());
    println!(
        "Schedule: {} epochs x {} rounds x {} interactions",
        config.schedule.epochs,
        config.schedule.rounds_per_epoch,
        config.schedule.interactions_per_round
    );
    println!();

    let recorder = if args.log_events {
        let path = args.output_dir.join("events.jsonl");
        EventRecorder::with_jsonl(&path).map_err(|source| SimError::Output {
            time: society_events::SimTime::start(),
            source,
        })?
    } else {
        EventRecorder::new()
    };

    let mut scheduler = Scheduler::with_recorder(config, args.seed, recorder)?;

    let reason = loop {
        match scheduler.run()? {
            RunState::Finished(reason) => break reason,
            RunState::AwaitingHuman(frame) => {
                match prompt_for_action(&frame) {
                    Some(action) => {
                        if let Err(e) = scheduler.submit_decision(&frame.frame_id, action) {
                            eprintln!("Warning: decision rejected: {}", e);
                        }
                    }
                    None => {
                        if let Err(e) = scheduler.cancel_pending_decision() {
                            eprintln!("Warning: could not cancel: {}", e);
                        }
                        println!("  Skipped this interaction.");
                    }
                }
            }
        }
    };

    println!();
    println!("Run finished: {:?} at {}", reason, scheduler.time());

    let metrics = scheduler.metrics();
    println!("  Interactions: {}", metrics.total_interactions);
    println!("  Cooperation rate: {:.3}", metrics.cooperation_rate);
    println!(
        "  Population: {} alive, {} permanently dead, {} rebirths",
        metrics.alive_count, metrics.permanent_deaths, metrics.rebirths
    );
    println!(
        "  Coalitions: {} covering {:.0}% of the living",
        metrics.coalition_count,
        metrics.coalition_coverage * 100.0
    );

    write_outputs(&args, &scheduler)?;
    Ok(())
}

/// Writes the final snapshot set, metrics, and event log.
fn write_outputs(args: &Args, scheduler: &Scheduler) -> Result<(), SimError> {
    let to_sim_error = |source: std::io::Error| SimError::Output {
        time: scheduler.time(),
        source,
    };

    let snapshot_dir = args.output_dir.join("snapshots");
    for snapshot in scheduler.snapshots() {
        output::write_snapshot(&snapshot_dir, snapshot).map_err(to_sim_error)?;
    }
    output::write_metrics(args.output_dir.join("metrics.json"), &scheduler.metrics())
        .map_err(to_sim_error)?;
    output::write_event_log(args.output_dir.join("events.json"), scheduler.recorder())
        .map_err(to_sim_error)?;

    println!();
    println!(
        "Wrote {} snapshots, metrics, and {} events to {}",
        scheduler.snapshots().len(),
        scheduler.recorder().event_count(),
        args.output_dir.display()
    );
    Ok(())
}

/// Prompts on stdin for the human slot's action. Returns `None` to cancel.
fn prompt_for_action(frame: &DecisionFrame) -> Option<Action> {
    println!();
    println!("[{}] Your turn against {}", frame.time, frame.partner_id);
    println!(
        "  ATP: {:.1} | partner reputation: {:.2} | trust to/from: {:.2}/{:.2}",
        frame.self_atp,
        frame.partner_reputation,
        frame.trust_toward_partner,
        frame.trust_from_partner
    );
    if let Some(advice) = &frame.pattern_advice {
        println!(
            "  Pattern memory suggests {:?} (confidence {:.2})",
            advice.action, advice.confidence
        );
    }

    let stdin = io::stdin();
    loop {
        print!("  [c]ooperate / [d]efect / [s]kip > ");
        if io::stdout().flush().is_err() {
            return None;
        }
        let mut line = String::new();
        match stdin.lock().read_line(&mut line) {
            Ok(0) | Err(_) => return None,
            Ok(_) => {}
        }
        match line.trim().to_ascii_lowercase().as_str() {
            "c" | "cooperate" => return Some(Action::Cooperate),
            "d" | "defect" => return Some(Action::Defect),
            "s" | "skip" | "q" => return None,
            other => println!("  Unrecognized input '{}'", other),
        }
    }
}
