//! SMT scheduling simulator CLI.
//!
//! This binary provides a single entry point for both simulation modes. It performs:
//! 1. **Dump runs:** Load a disassembly dump, mint tasks per function entry, and simulate.
//! 2. **Demo runs:** A built-in task fixture for quick policy comparisons.
//! 3. **Reporting:** A per-slot text timeline, run statistics, and optional JSON export.

use std::path::PathBuf;
use std::process;

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use smtsim_core::config::Config;
use smtsim_core::isa::{Branch, Inst};
use smtsim_core::sched::Policy;
use smtsim_core::sim::driver::{Arrival, SimMode, SimOutcome, run_to_exhaustion};
use smtsim_core::sim::loader;
use smtsim_core::task::{Task, TaskCategory, TaskId};

#[derive(Parser, Debug)]
#[command(
    name = "smtsim",
    author,
    version,
    about = "SMT4 processor and quantum scheduling simulator",
    long_about = "Simulate SMT scheduling over a disassembly dump or a built-in demo set.\n\nExamples:\n  smtsim run -f matrix.dump -e worker:4 --policy slot-fill\n  smtsim run -f matrix.dump -e main:1 -e worker:2 --mode cycle --seed 7\n  smtsim demo --policy even-slot --json"
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Simulate tasks loaded from a disassembly dump.
    Run {
        /// Dump file (objdump-style text).
        #[arg(short, long)]
        file: PathBuf,

        /// Function entry to mint tasks from, as name:count. Repeatable.
        #[arg(short, long = "entry")]
        entries: Vec<String>,

        /// Scheduling policy.
        #[arg(long, default_value = "round-robin")]
        policy: Policy,

        /// Driving mode.
        #[arg(long, default_value = "quantum")]
        mode: SimMode,

        /// JSON config file overriding the defaults.
        #[arg(long)]
        config: Option<PathBuf>,

        /// Branch-resolution seed override.
        #[arg(long)]
        seed: Option<u64>,

        /// Emit the outcome as JSON instead of the text report.
        #[arg(long)]
        json: bool,
    },

    /// Simulate the built-in demo task set.
    Demo {
        /// Scheduling policy.
        #[arg(long, default_value = "slot-fill")]
        policy: Policy,

        /// Driving mode.
        #[arg(long, default_value = "quantum")]
        mode: SimMode,

        /// Emit the outcome as JSON instead of the text report.
        #[arg(long)]
        json: bool,
    },
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let result = match cli.command {
        Commands::Run {
            file,
            entries,
            policy,
            mode,
            config,
            seed,
            json,
        } => cmd_run(&file, &entries, policy, mode, config.as_deref(), seed, json),
        Commands::Demo { policy, mode, json } => cmd_demo(policy, mode, json),
    };

    if let Err(message) = result {
        eprintln!("error: {message}");
        process::exit(1);
    }
}

fn cmd_run(
    file: &std::path::Path,
    entries: &[String],
    policy: Policy,
    mode: SimMode,
    config: Option<&std::path::Path>,
    seed: Option<u64>,
    json: bool,
) -> Result<(), String> {
    let mut cfg = match config {
        Some(path) => {
            let text = std::fs::read_to_string(path)
                .map_err(|e| format!("reading {}: {e}", path.display()))?;
            Config::from_json(&text).map_err(|e| format!("parsing {}: {e}", path.display()))?
        }
        None => Config::default(),
    };
    if let Some(seed) = seed {
        cfg.driver.seed = seed;
    }

    let entries = parse_entries(entries)?;
    if entries.is_empty() {
        return Err("at least one --entry name:count is required".into());
    }

    let tasks = loader::load_dump(file, &entries).map_err(|e| e.to_string())?;
    println!(
        "Loaded {} tasks from {} ({} entries)",
        tasks.len(),
        file.display(),
        entries.len()
    );

    let arrivals = tasks.into_iter().map(Arrival::immediate).collect();
    let outcome = run_to_exhaustion(arrivals, policy, mode, &cfg).map_err(|e| e.to_string())?;
    report(&outcome, json);
    Ok(())
}

fn cmd_demo(policy: Policy, mode: SimMode, json: bool) -> Result<(), String> {
    let stream = |n: usize| -> Vec<Inst> {
        let mut insts = vec![Inst::Lsu; n];
        insts.push(Inst::Branch(Branch::ret()));
        insts
    };
    // A mix of narrow memory-bound tasks and wide FX/FP tasks, all arriving
    // at quantum zero except one latecomer.
    let arrivals = vec![
        Arrival::immediate(Task::new(0, TaskCategory::Mem, stream(8))),
        Arrival::immediate(Task::new(1, TaskCategory::Mem, stream(8))),
        Arrival::immediate(Task::new(2, TaskCategory::Fx, stream(4))),
        Arrival::immediate(Task::new(3, TaskCategory::Io, stream(4))),
        Arrival::immediate(Task::new(4, TaskCategory::Fp, stream(3))),
        Arrival::at(2, Task::new(5, TaskCategory::Mem, stream(3))),
    ];
    let outcome = run_to_exhaustion(arrivals, policy, mode, &Config::default())
        .map_err(|e| e.to_string())?;
    report(&outcome, json);
    Ok(())
}

fn parse_entries(raw: &[String]) -> Result<Vec<(String, usize)>, String> {
    raw.iter()
        .map(|spec| {
            let (name, count) = spec
                .split_once(':')
                .ok_or_else(|| format!("entry {spec:?} is not name:count"))?;
            let count: usize = count
                .parse()
                .map_err(|_| format!("entry {spec:?} has a non-numeric count"))?;
            Ok((name.to_string(), count))
        })
        .collect()
}

fn report(outcome: &SimOutcome, json: bool) {
    if json {
        let tasks: Vec<serde_json::Value> = outcome
            .tasks
            .iter()
            .map(|t| {
                serde_json::json!({
                    "id": t.id,
                    "category": t.category,
                    "width": t.width(),
                    "entry": t.entry,
                    "ran_at": t.ran_at,
                    "completed_at": t.completed_at,
                })
            })
            .collect();
        let doc = serde_json::json!({
            "schedule": outcome.schedule,
            "tasks": tasks,
            "quanta": outcome.stats.quanta,
            "cycles": outcome.stats.cycles,
            "completed_instructions": outcome.stats.completed,
        });
        println!("{doc:#}");
        return;
    }

    println!();
    print_timeline(outcome);
    println!();
    println!("{}", outcome.stats);
}

/// Renders the schedule as one row per hardware thread slot, one column per
/// quantum; wide tasks span as many rows as their category fills.
fn print_timeline(outcome: &SimOutcome) {
    const SLOTS: usize = 4;
    let width = |id: TaskId| {
        outcome
            .tasks
            .iter()
            .find(|t| t.id == id)
            .map_or(1, Task::width)
    };

    let quanta: Vec<(u64, &[TaskId])> = outcome.schedule.iter().collect();
    let mut rows = vec![Vec::with_capacity(quanta.len()); SLOTS];
    for (_, ids) in &quanta {
        let mut slot = 0;
        let mut cells = [None; SLOTS];
        for &id in *ids {
            for _ in 0..width(id).min(SLOTS - slot) {
                cells[slot] = Some(id);
                slot += 1;
            }
            if slot == SLOTS {
                break;
            }
        }
        for (row, cell) in rows.iter_mut().zip(cells) {
            row.push(cell);
        }
    }

    print!("quantum ");
    for (q, _) in &quanta {
        print!("{q:>4}");
    }
    println!();
    for (slot, row) in rows.iter().enumerate() {
        print!("slot {slot}  ");
        for cell in row {
            match cell {
                Some(id) => print!("{:>4}", format!("{id}")),
                None => print!("{:>4}", "."),
            }
        }
        println!();
    }
}
