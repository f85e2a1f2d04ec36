mod display;

use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::time::Duration;

use anonplay_core::jsonl;
use anonplay_core::{AggregateStats, InputItem, MalformedLinePolicy};
use anonplay_engine::RunConfig;
use anyhow::{Context, Result, bail};
use clap::{Args, Parser, Subcommand, ValueEnum};
use tracing::{debug, info};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "anonplay", version, about = "Iterative LLM text anonymization")]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Log level for anonplay crates; RUST_LOG overrides it
    #[arg(short, long, default_value = "info", global = true)]
    log_level: String,
}

#[derive(Subcommand)]
enum Commands {
    /// Evaluate and anonymize texts, then print results and statistics
    Run(RunArgs),

    /// Print aggregate statistics of an exported results file
    Stats {
        /// Results jsonl written by `run --output`
        results: PathBuf,

        /// Text version to aggregate over (0 = original)
        #[arg(long, default_value_t = 1)]
        text_version: usize,
    },

    /// Normalize an input jsonl file to `{text, context, truth}` lines
    Inputs {
        /// Input jsonl file
        input: PathBuf,

        /// Write here instead of stdout
        #[arg(short, long)]
        output: Option<PathBuf>,

        #[arg(long, value_enum, default_value_t = OnMalformed::Placeholder)]
        on_malformed: OnMalformed,
    },
}

#[derive(Args)]
struct RunArgs {
    /// Input jsonl file, one `{text, context?, truth?}` object per line
    #[arg(short, long, conflicts_with = "text", required_unless_present = "text")]
    input: Option<PathBuf>,

    /// A single text to anonymize
    #[arg(long)]
    text: Option<String>,

    /// Immutable context shown to the evaluator with --text
    #[arg(long, requires = "text", default_value = "")]
    context: String,

    /// Export results as jsonl
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Rewrite rounds per item
    #[arg(long, default_value_t = anonplay_engine::config::DEFAULT_ROUNDS)]
    rounds: usize,

    #[arg(long, env = "OPENAI_API_KEY", hide_env_values = true)]
    api_key: Option<String>,

    /// Model override
    #[arg(long)]
    model: Option<String>,

    /// Provider endpoint override
    #[arg(long)]
    base_url: Option<String>,

    /// Per-call deadline in seconds
    #[arg(long, default_value_t = 10)]
    timeout_secs: u64,

    /// Re-evaluations of a version after its first attempt
    #[arg(long, default_value_t = anonplay_engine::config::DEFAULT_STEP_RETRIES)]
    step_retries: u32,

    /// Attempts per rewrite
    #[arg(long, default_value_t = 3)]
    rewrite_attempts: u32,

    /// Pause between retries in milliseconds
    #[arg(long, default_value_t = 0)]
    backoff_ms: u64,

    #[arg(long, value_enum, default_value_t = OnMalformed::Placeholder)]
    on_malformed: OnMalformed,
}

/// What to do with input lines that are not valid JSON.
#[derive(Clone, Copy, ValueEnum)]
enum OnMalformed {
    /// Keep an empty item in its place
    Placeholder,
    /// Drop the line
    Skip,
}

impl From<OnMalformed> for MalformedLinePolicy {
    fn from(value: OnMalformed) -> Self {
        match value {
            OnMalformed::Placeholder => MalformedLinePolicy::Placeholder,
            OnMalformed::Skip => MalformedLinePolicy::Skip,
        }
    }
}

impl RunArgs {
    fn config(&self) -> RunConfig {
        RunConfig {
            credential: self.api_key.clone(),
            model: self.model.clone(),
            base_url: self.base_url.clone(),
            round: self.rounds,
            step_retries: self.step_retries,
            rewrite_attempts: self.rewrite_attempts,
            backoff: Duration::from_millis(self.backoff_ms),
            call_timeout: Duration::from_secs(self.timeout_secs),
            ..RunConfig::default()
        }
    }

    fn items(&self) -> Result<Vec<InputItem>> {
        if let Some(path) = &self.input {
            return jsonl::read_inputs(path, self.on_malformed.into())
                .with_context(|| format!("failed to read inputs from {}", path.display()));
        }
        match &self.text {
            Some(text) => Ok(vec![InputItem::new(text).with_context(&self.context)]),
            None => bail!("either --input or --text is required"),
        }
    }
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<ExitCode> {
    let cli = Cli::parse();

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        EnvFilter::new(format!(
            "anonplay={level},anonplay_core={level},anonplay_ai={level},anonplay_engine={level}",
            level = cli.log_level
        ))
    });
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
    debug!("anonplay v{}", env!("CARGO_PKG_VERSION"));

    match cli.command {
        Commands::Run(args) => cmd_run(args).await,
        Commands::Stats {
            results,
            text_version,
        } => cmd_stats(&results, text_version),
        Commands::Inputs {
            input,
            output,
            on_malformed,
        } => cmd_inputs(&input, output.as_deref(), on_malformed.into()),
    }
}

async fn cmd_run(args: RunArgs) -> Result<ExitCode> {
    let items = args.items()?;
    let config = args.config();
    debug!(?config, items = items.len(), "run configuration");

    let report = anonplay_engine::run_all(items, &config)
        .await
        .context("run refused")?;

    if let Some(path) = &args.output {
        let records: Vec<_> = report.records().cloned().collect();
        jsonl::write_results(path, &records)
            .with_context(|| format!("failed to write results to {}", path.display()))?;
        info!(path = %path.display(), records = records.len(), "results written");
    }

    display::print_report(&report);

    if report.defects().next().is_some() {
        return Ok(ExitCode::FAILURE);
    }
    Ok(ExitCode::SUCCESS)
}

fn cmd_stats(path: &Path, version: usize) -> Result<ExitCode> {
    let records = jsonl::read_results(path)
        .with_context(|| format!("failed to read results from {}", path.display()))?;
    display::print_stats(&AggregateStats::for_version(&records, version));
    Ok(ExitCode::SUCCESS)
}

fn cmd_inputs(
    input: &Path,
    output: Option<&Path>,
    policy: MalformedLinePolicy,
) -> Result<ExitCode> {
    let items = jsonl::read_inputs(input, policy)
        .with_context(|| format!("failed to read inputs from {}", input.display()))?;
    match output {
        Some(path) => {
            jsonl::write_inputs(path, &items)
                .with_context(|| format!("failed to write inputs to {}", path.display()))?;
            info!(path = %path.display(), items = items.len(), "inputs written");
        }
        None => print!("{}", jsonl::inputs_to_jsonl(&items)?),
    }
    Ok(ExitCode::SUCCESS)
}
