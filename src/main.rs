use std::path::PathBuf;

use clap::{ArgGroup, Args, Parser, Subcommand};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use signup_labeler::config::{self, Config};
use signup_labeler::feedback::{FeedbackStore, DEFAULT_STORE_PATH};
use signup_labeler::labeler::OpenAiClient;
use signup_labeler::pipeline::{self, Pipeline, PipelineOptions, DEFAULT_FEWSHOT_COUNT};
use signup_labeler::recorder;

#[derive(Parser)]
#[command(name = "signup-labeler")]
#[command(about = "Annotate signups with an ethnicity label inferred from each name")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Label every signup in a CSV
    Label(LabelArgs),
    /// Record verified labels for future runs
    Record(RecordArgs),
}

#[derive(Args)]
struct LabelArgs {
    /// Path to the CSV containing signups (name in the first column)
    input_csv: PathBuf,

    /// Where to write the annotated CSV (defaults to <input>_with_ethnicity.csv)
    output_csv: Option<PathBuf>,

    /// Custom prompt instructions for the model
    #[arg(long)]
    prompt_file: Option<PathBuf>,

    /// Only process the first N signups
    #[arg(long)]
    limit: Option<usize>,

    /// The CSV does not contain a header row
    #[arg(long)]
    no_header: bool,

    /// Override the model (defaults to OPENAI_MODEL or gpt-4o-mini)
    #[arg(long)]
    model: Option<String>,

    /// CSV file containing verified name -> ethnicity mappings
    #[arg(long, default_value = DEFAULT_STORE_PATH)]
    feedback_store: PathBuf,

    /// How many feedback examples to include as guidance in the prompt
    #[arg(long, default_value_t = DEFAULT_FEWSHOT_COUNT)]
    fewshot_count: usize,

    /// Always call the API even if the feedback store has a label for the name
    #[arg(long)]
    force_api: bool,
}

#[derive(Args)]
#[command(group(ArgGroup::new("source").required(true).args(["name", "from_csv"])))]
struct RecordArgs {
    /// Path to the feedback CSV
    #[arg(long, default_value = DEFAULT_STORE_PATH)]
    store: PathBuf,

    /// Single name to record
    #[arg(long, requires = "ethnicity")]
    name: Option<String>,

    /// CSV file with name,ethnicity[,notes] columns
    #[arg(long)]
    from_csv: Option<PathBuf>,

    /// Ethnicity label for --name
    #[arg(long)]
    ethnicity: Option<String>,

    /// Optional notes for --name
    #[arg(long)]
    notes: Option<String>,
}

/// Initialize tracing on stderr so stdout only carries the final result.
fn init_tracing() {
    let filter = tracing_subscriber::EnvFilter::new(
        std::env::var("RUST_LOG").unwrap_or_else(|_| "signup_labeler=info".into()),
    );

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Before tracing so RUST_LOG from .env takes effect
    let dotenv = config::load_dotenv();
    init_tracing();
    match dotenv {
        Ok(Some(path)) => tracing::debug!("Loaded environment from {}", path.display()),
        Ok(None) => {}
        Err(e) => tracing::warn!("Ignoring unreadable .env file: {}", e),
    }

    match cli.command {
        Commands::Label(args) => label(args).await,
        Commands::Record(args) => record(args),
    }
}

async fn label(args: LabelArgs) -> anyhow::Result<()> {
    let mut config = Config::from_env()?;
    if let Some(model) = args.model {
        config = config.with_model(model);
    }
    tracing::debug!(?config, "Configuration loaded");

    let custom_instructions = args
        .prompt_file
        .as_deref()
        .map(config::read_prompt_file)
        .transpose()?;

    let store = FeedbackStore::load(&args.feedback_store)?;
    tracing::info!(
        "Loaded {} feedback entries from {}",
        store.len(),
        store.path().display()
    );

    let client = OpenAiClient::new(&config)?;
    let options = PipelineOptions {
        custom_instructions,
        limit: args.limit,
        has_header: !args.no_header,
        fewshot_count: args.fewshot_count,
        force_api: args.force_api,
        ..PipelineOptions::new(config.model.clone())
    };

    let output = args
        .output_csv
        .unwrap_or_else(|| pipeline::output_path_for(&args.input_csv));
    let summary = Pipeline::new(&store, &client, options)
        .run_files(&args.input_csv, &output)
        .await?;

    if summary.failed > 0 {
        tracing::warn!(
            "{} of {} rows could not be classified and were labeled Unknown",
            summary.failed,
            summary.rows
        );
    }
    println!("Wrote annotated CSV to {}", output.display());
    Ok(())
}

fn record(args: RecordArgs) -> anyhow::Result<()> {
    let mut store = FeedbackStore::load(&args.store)?;

    if let Some(name) = args.name {
        let ethnicity = args.ethnicity.unwrap_or_default();
        let entry = recorder::record_single(&mut store, &name, &ethnicity, args.notes.as_deref())?;
        println!("Recorded feedback for {} -> {}", entry.name, entry.ethnicity);
        return Ok(());
    }

    if let Some(path) = args.from_csv {
        let report = recorder::import_csv(&mut store, &path)?;
        for rejected in &report.rejected {
            eprintln!("Skipped line {}: {}", rejected.line, rejected.reason);
        }
        println!(
            "Imported {} feedback rows into {}",
            report.entries.len(),
            store.path().display()
        );
    }

    Ok(())
}
