use clap::Parser;
use latency_benchmark_rs::benchmark_utils::{print_sweep_result, write_sweep_result};
use latency_benchmark_rs::plan::{SweepPlan, PRESETS};
use latency_benchmark_rs::sweep::run_sweep;
use latency_benchmark_rs::{HarnessError, Result};
use std::path::PathBuf;
use std::process::ExitCode;
use std::time::Instant;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

const OUTPUT_FILE: &str = "sweep_results.json";

/// Sweep external benchmark executables and report outlier-filtered latencies
#[derive(Parser, Debug)]
#[command(name = "run_sweep")]
#[command(version)]
struct Args {
    /// Built-in plan: tree, s-tree or qsort-mt
    #[arg(short, long, default_value = "tree", conflicts_with = "plan")]
    preset: String,

    /// JSON plan file to use instead of a preset
    #[arg(long)]
    plan: Option<PathBuf>,

    /// Override the benchmark executable
    #[arg(short, long)]
    executable: Option<PathBuf>,

    /// Override the number of trials per point
    #[arg(short, long)]
    repeats: Option<usize>,

    /// Pin every trial to this CPU core
    #[arg(long, conflicts_with = "no_pin")]
    core: Option<usize>,

    /// Do not pin trials to a CPU core
    #[arg(long)]
    no_pin: bool,

    /// Give up on a trial after this many empty outputs
    #[arg(long)]
    max_attempts: Option<u32>,

    /// Pause between retries of an empty output, in milliseconds
    #[arg(long)]
    retry_delay_ms: Option<u64>,

    /// Where to write the JSON results
    #[arg(short, long, default_value = OUTPUT_FILE)]
    output: PathBuf,

    /// Only print these operations (repeatable)
    #[arg(long = "operation")]
    operations: Vec<String>,

    /// Do not run the build step first
    #[arg(long)]
    skip_build: bool,

    /// Log every point's statistics
    #[arg(short, long)]
    verbose: bool,
}

fn init_tracing(verbose: bool) {
    let default_filter = if verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter));
    let _ = tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(filter)
        .try_init();
}

fn load_plan(args: &Args) -> Result<SweepPlan> {
    let mut plan = match &args.plan {
        Some(path) => SweepPlan::load(path)?,
        None => SweepPlan::preset(&args.preset).ok_or_else(|| {
            HarnessError::invalid_plan(format!(
                "unknown preset '{}', expected one of {}",
                args.preset,
                PRESETS.join(", ")
            ))
        })?,
    };

    if let Some(executable) = &args.executable {
        plan.executable = executable.clone();
    }
    if let Some(repeats) = args.repeats {
        plan.repeats = repeats;
    }
    if args.no_pin {
        plan.cpu_core = None;
    } else if args.core.is_some() {
        plan.cpu_core = args.core;
    }
    if let Some(max_attempts) = args.max_attempts {
        plan.retry.max_attempts = max_attempts;
    }
    if let Some(delay_ms) = args.retry_delay_ms {
        plan.retry.delay_ms = delay_ms;
    }
    if args.skip_build {
        plan.build = None;
    }

    plan.validate()?;
    Ok(plan)
}

fn run(args: &Args) -> Result<()> {
    let plan = load_plan(args)?;
    let definition = plan.definition()?;

    // The executables must be current before the first measurement
    if let Some(build) = &plan.build {
        build.ensure_built()?;
    }

    info!(
        "Running plan \"{}\": {} variant(s) x {} point(s) x {} repeat(s)",
        plan.name,
        definition.variants.len(),
        definition.axis.len(),
        definition.repeats
    );

    let start = Instant::now();
    let mut runner = plan.runner();
    let result = run_sweep(&mut runner, &definition)?;
    info!("Sweep finished in {:.1}s", start.elapsed().as_secs_f64());

    write_sweep_result(&result, &args.output)?;
    info!("Results written to {}", args.output.display());

    print_sweep_result(&result, &args.operations, &plan.parameter_label);
    Ok(())
}

fn main() -> ExitCode {
    let args = Args::parse();
    init_tracing(args.verbose);

    match run(&args) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("{}", e);
            ExitCode::FAILURE
        }
    }
}
