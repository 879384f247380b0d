//! CLI command definitions, routing, and tracing setup.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use clap::{Parser, Subcommand};
use color_eyre::eyre::{Result, eyre};
use indicatif::{ProgressBar, ProgressStyle};
use tracing::info;

use reglens_artifacts::{DiffRenderer, change_counts, line_diff};
use reglens_core::{
    AnswerRequester, ContextRanker, IntakeAction, MergeRequester, ProgressReporter,
    RegulationIntake, ask, build_sections, merge_chunks,
};
use reglens_llm::{ChatClient, HttpEmbedder, OpenAiChatClient};
use reglens_shared::{
    AppConfig, BudgetPolicy, Chunk, MergeResult, init_config, load_config, load_config_from,
};
use reglens_storage::{RegulationRepository, Storage};
use reglens_text::{ChunkSplitter, Cl100kTokenizer, flesch_reading_ease, split_on_separator};

use crate::display::print_document;

// ---------------------------------------------------------------------------
// CLI structure
// ---------------------------------------------------------------------------

/// RegLens — reconcile regulation updates and ask grounded questions.
#[derive(Parser)]
#[command(
    name = "reglens",
    version,
    about = "Reconcile regulation updates and answer questions grounded in regulation text.",
    long_about = None,
)]
pub(crate) struct Cli {
    /// Config file (defaults to ~/.reglens/reglens.toml).
    #[arg(long, global = true, env = "REGLENS_CONFIG")]
    pub config: Option<PathBuf>,

    /// Log format: text (default) or json.
    #[arg(long, default_value = "text", global = true)]
    pub log_format: LogFormat,

    /// Verbosity level (-v, -vv).
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    #[command(subcommand)]
    pub command: Command,
}

/// Log output format.
#[derive(Clone, Debug, clap::ValueEnum)]
pub(crate) enum LogFormat {
    Text,
    Json,
}

/// Context budget policy.
#[derive(Clone, Copy, Debug, clap::ValueEnum)]
pub(crate) enum PolicyArg {
    /// Halt at the first section that overflows the budget.
    Stop,
    /// Skip overflowing sections and keep scanning.
    Skip,
}

impl From<PolicyArg> for BudgetPolicy {
    fn from(arg: PolicyArg) -> Self {
        match arg {
            PolicyArg::Stop => BudgetPolicy::StopAtOverflow,
            PolicyArg::Skip => BudgetPolicy::SkipOversized,
        }
    }
}

/// Top-level CLI subcommands.
#[derive(Subcommand)]
pub(crate) enum Command {
    /// Merge update chunks into original chunks and report the differences.
    Merge {
        /// File with the original regulation text.
        #[arg(long)]
        original: PathBuf,

        /// File with the update text.
        #[arg(long)]
        update: PathBuf,

        /// Line that separates pre-chunked input (e.g. `---`). Without it,
        /// both files are split into token-bounded sections.
        #[arg(long)]
        separator: Option<String>,

        /// Write the report here (.html, .md, or text). Prints to the terminal otherwise.
        #[arg(short, long)]
        out: Option<PathBuf>,

        /// Concurrent merge requests (1 = sequential).
        #[arg(long)]
        workers: Option<usize>,

        /// Include pairs the merge left unchanged.
        #[arg(long)]
        all: bool,
    },

    /// Answer a question from a document.
    Ask {
        /// Source document.
        #[arg(long)]
        document: PathBuf,

        /// The question.
        #[arg(short, long)]
        question: String,

        /// Context budget in tokens.
        #[arg(long)]
        max_len: Option<usize>,

        /// Section size in tokens.
        #[arg(long)]
        chunk_size: Option<usize>,

        /// What to do with a section that overflows the budget.
        #[arg(long)]
        policy: Option<PolicyArg>,

        /// Print the answer, parsed fields, and context as JSON.
        #[arg(long)]
        json: bool,
    },

    /// Line diff of two files (no network).
    Diff {
        old: PathBuf,
        new: PathBuf,

        /// Write the diff document here instead of printing it.
        #[arg(short, long)]
        out: Option<PathBuf>,
    },

    /// Regulation repository.
    Regulation {
        #[command(subcommand)]
        action: RegulationAction,
    },

    /// Flesch reading ease of a text file.
    Readability { file: PathBuf },

    /// Configuration management.
    Config {
        /// Config subcommand.
        #[command(subcommand)]
        action: ConfigAction,
    },
}

/// Regulation subcommands.
#[derive(Subcommand)]
pub(crate) enum RegulationAction {
    /// Store a new regulation or apply an amendment to a stored one.
    Ingest {
        /// Lookup key of the regulation.
        #[arg(long)]
        key: String,

        /// Title for a newly stored regulation.
        #[arg(long)]
        title: Option<String>,

        /// Store the cleaned input as-is instead of asking for extraction.
        #[arg(long)]
        no_extract: bool,

        /// Raw input (HTML or text).
        file: PathBuf,
    },
    /// Print a stored regulation and its amendment history.
    Show { key: String },
    /// List stored regulations.
    List,
}

/// Config subcommands.
#[derive(Subcommand)]
pub(crate) enum ConfigAction {
    /// Initialize config file with defaults.
    Init,
    /// Show resolved configuration.
    Show,
}

// ---------------------------------------------------------------------------
// Tracing setup
// ---------------------------------------------------------------------------

/// Initialize tracing based on CLI flags.
pub(crate) fn init_tracing(cli: &Cli) {
    use tracing_subscriber::{EnvFilter, fmt};

    let filter = match cli.verbose {
        0 => "reglens=info",
        1 => "reglens=debug",
        _ => "reglens=trace",
    };

    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter));

    match cli.log_format {
        LogFormat::Text => {
            fmt()
                .with_env_filter(env_filter)
                .with_target(false)
                .with_writer(std::io::stderr)
                .init();
        }
        LogFormat::Json => {
            fmt()
                .json()
                .with_env_filter(env_filter)
                .with_writer(std::io::stderr)
                .init();
        }
    }
}

// ---------------------------------------------------------------------------
// Command dispatch
// ---------------------------------------------------------------------------

/// Run the CLI command.
pub(crate) async fn run(cli: Cli) -> Result<()> {
    let config_path = cli.config.as_deref();
    match cli.command {
        Command::Merge {
            original,
            update,
            separator,
            out,
            workers,
            all,
        } => {
            let config = resolve_config(config_path)?;
            let args = MergeArgs {
                original,
                update,
                separator,
                out,
                workers,
                all,
            };
            cmd_merge(&config, &args).await
        }
        Command::Ask {
            document,
            question,
            max_len,
            chunk_size,
            policy,
            json,
        } => {
            let config = resolve_config(config_path)?;
            let args = AskArgs {
                document,
                question,
                max_len,
                chunk_size,
                policy,
                json,
            };
            cmd_ask(&config, &args).await
        }
        Command::Diff { old, new, out } => cmd_diff(&old, &new, out.as_deref()),
        Command::Regulation { action } => {
            let config = resolve_config(config_path)?;
            match action {
                RegulationAction::Ingest {
                    key,
                    title,
                    no_extract,
                    file,
                } => cmd_regulation_ingest(&config, &key, title.as_deref(), !no_extract, &file).await,
                RegulationAction::Show { key } => cmd_regulation_show(&config, &key).await,
                RegulationAction::List => cmd_regulation_list(&config).await,
            }
        }
        Command::Readability { file } => cmd_readability(&file),
        Command::Config { action } => match action {
            ConfigAction::Init => cmd_config_init(),
            ConfigAction::Show => cmd_config_show(config_path),
        },
    }
}

fn resolve_config(path: Option<&Path>) -> Result<AppConfig> {
    let config = match path {
        Some(p) => load_config_from(p)?,
        None => load_config()?,
    };
    Ok(config)
}

fn read_input(path: &Path) -> Result<String> {
    std::fs::read_to_string(path).map_err(|e| eyre!("cannot read '{}': {e}", path.display()))
}

fn chat_client(config: &AppConfig) -> Result<Arc<dyn ChatClient>> {
    let client = OpenAiChatClient::new(&config.llm)?;
    info!(model = client.model_name(), endpoint = client.endpoint(), "reasoning client ready");
    Ok(Arc::new(client))
}

// ---------------------------------------------------------------------------
// merge
// ---------------------------------------------------------------------------

struct MergeArgs {
    original: PathBuf,
    update: PathBuf,
    separator: Option<String>,
    out: Option<PathBuf>,
    workers: Option<usize>,
    all: bool,
}

async fn cmd_merge(config: &AppConfig, args: &MergeArgs) -> Result<()> {
    let client = chat_client(config)?;
    let original_text = read_input(&args.original)?;
    let update_text = read_input(&args.update)?;

    let (original, update) = match args.separator.as_deref() {
        Some(sep) => (
            split_on_separator(&original_text, sep),
            split_on_separator(&update_text, sep),
        ),
        None => {
            let tokenizer = Cl100kTokenizer::new()?;
            let splitter = ChunkSplitter::new(&tokenizer, config.retrieval.chunk_size)?;
            (splitter.chunks(&original_text), splitter.chunks(&update_text))
        }
    };
    if original.is_empty() || update.is_empty() {
        return Err(eyre!("nothing to merge: both inputs must contain at least one chunk"));
    }

    let workers = args.workers.unwrap_or(config.merge.workers);
    info!(
        original = original.len(),
        update = update.len(),
        workers,
        "merging chunks"
    );

    let requester = MergeRequester::new(client);
    let progress = CliProgress::new();
    let results = merge_chunks(&requester, &original, &update, workers, &progress).await;

    let renderer = DiffRenderer::new().include_unchanged(args.all || config.merge.include_unchanged);
    let changed = results.iter().filter(|r| r.changed()).count();
    let fallbacks = results.iter().filter(|r| r.fallback).count();
    let (added, removed) = results
        .iter()
        .map(|r| change_counts(&r.line_diff))
        .fold((0, 0), |(a, r), (da, dr)| (a + da, r + dr));

    match &args.out {
        Some(path) => {
            let written = renderer.write(&results, path)?;
            println!("Report written to {} ({written} pairs)", path.display());
        }
        None => print_document(&renderer.report(&results)),
    }

    println!();
    println!("  Pairs:     {}", results.len());
    println!("  Changed:   {changed}");
    println!("  Unchanged: {}", results.len() - changed);
    println!("  Lines:     +{added} -{removed}");
    if fallbacks > 0 {
        println!("  Failed:    {fallbacks} (original kept)");
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// ask
// ---------------------------------------------------------------------------

struct AskArgs {
    document: PathBuf,
    question: String,
    max_len: Option<usize>,
    chunk_size: Option<usize>,
    policy: Option<PolicyArg>,
    json: bool,
}

async fn cmd_ask(config: &AppConfig, args: &AskArgs) -> Result<()> {
    config.retrieval.validate()?;
    let client = chat_client(config)?;
    let embedder = HttpEmbedder::new(&config.embedding, &config.llm)?;
    let text = read_input(&args.document)?;

    let tokenizer = Cl100kTokenizer::new()?;
    let splitter = ChunkSplitter::new(
        &tokenizer,
        args.chunk_size.unwrap_or(config.retrieval.chunk_size),
    )?;

    let progress = CliProgress::new();
    let sections = build_sections(&splitter, &text, &embedder, &progress).await?;
    progress.done();

    let mut ranker = ContextRanker::from_config(&config.retrieval);
    if let Some(max_len) = args.max_len {
        ranker = ContextRanker::new(max_len)
            .with_max_sections(config.retrieval.max_sections)
            .with_policy(ranker.policy());
    }
    if let Some(policy) = args.policy {
        ranker = ranker.with_policy(policy.into());
    }

    let answerer = AnswerRequester::new(client, config.llm.temperature);
    let outcome = ask(&args.question, &sections, &embedder, &ranker, &answerer).await;

    if args.json {
        let body = serde_json::json!({
            "answer": outcome.answer,
            "grounded": outcome.grounded(),
            "context": outcome.context,
        });
        println!("{}", serde_json::to_string_pretty(&body)?);
        return Ok(());
    }

    if !outcome.is_answered() {
        eprintln!("Answer unavailable.");
        return Ok(());
    }
    println!("{}", outcome.answer.trim());
    println!();
    println!(
        "  Context: {} ({} tokens)",
        outcome.context.ids().join(", "),
        outcome.context.total_tokens
    );
    Ok(())
}

// ---------------------------------------------------------------------------
// diff
// ---------------------------------------------------------------------------

fn cmd_diff(old: &Path, new: &Path, out: Option<&Path>) -> Result<()> {
    let before = read_input(old)?;
    let after = read_input(new)?;
    let result = MergeResult {
        line_diff: line_diff(&before, &after),
        original: Chunk::new(0, before),
        updated: Chunk::new(0, after),
        fallback: false,
    };

    let renderer = DiffRenderer::new().include_unchanged(true);
    match out {
        Some(path) => {
            renderer.write(std::slice::from_ref(&result), path)?;
            println!("Diff written to {}", path.display());
        }
        None => {
            let doc = renderer.report(std::slice::from_ref(&result));
            print_document(&doc);
        }
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// regulation
// ---------------------------------------------------------------------------

async fn cmd_regulation_ingest(
    config: &AppConfig,
    key: &str,
    title: Option<&str>,
    extract: bool,
    file: &Path,
) -> Result<()> {
    let client = chat_client(config)?;
    let raw = read_input(file)?;
    let storage = Storage::open(&config.storage.db_path()?).await?;

    let intake = RegulationIntake::new(client);
    let outcome = intake.ingest(&storage, key, title, &raw, extract).await?;

    let verb = match outcome.action {
        IntakeAction::Inserted => "stored as new regulation",
        IntakeAction::InsertedUnknownKey => "no regulation under this key; stored as new",
        IntakeAction::Amended => "amendment merged",
        IntakeAction::Unchanged => "stored regulation unchanged",
    };
    println!("  {key}: {verb}");
    println!("  Hash: {}", outcome.regulation.content_hash);
    if let Some(merge) = outcome.merge.as_ref().filter(|m| m.changed()) {
        println!();
        print_document(&DiffRenderer::new().report(std::slice::from_ref(merge)));
    }
    Ok(())
}

async fn cmd_regulation_show(config: &AppConfig, key: &str) -> Result<()> {
    let storage = Storage::open_readonly(&config.storage.db_path()?).await?;
    let regulation = storage
        .find_by_key(key)
        .await?
        .ok_or_else(|| eyre!("no regulation with key '{key}'"))?;

    println!("{}", regulation.title.as_deref().unwrap_or(&regulation.key));
    println!("  Key:     {}", regulation.key);
    println!("  Updated: {}", regulation.updated_at.to_rfc3339());
    println!("  Hash:    {}", regulation.content_hash);
    println!();
    println!("{}", regulation.body);

    let history = storage.amendments(&regulation.id).await?;
    if !history.is_empty() {
        println!();
        println!("Amendments:");
        for a in history {
            println!(
                "  {}  {} -> {}",
                a.applied_at.to_rfc3339(),
                &a.previous_hash[..12.min(a.previous_hash.len())],
                &a.new_hash[..12.min(a.new_hash.len())]
            );
        }
    }
    Ok(())
}

async fn cmd_regulation_list(config: &AppConfig) -> Result<()> {
    let path = config.storage.db_path()?;
    if !path.exists() {
        println!("No regulations stored yet.");
        return Ok(());
    }
    let storage = Storage::open_readonly(&path).await?;
    let regulations = storage.list().await?;
    if regulations.is_empty() {
        println!("No regulations stored yet.");
        return Ok(());
    }
    for r in regulations {
        println!(
            "  {:<24} {:<40} {}",
            r.key,
            r.title.as_deref().unwrap_or("-"),
            r.updated_at.format("%Y-%m-%d %H:%M")
        );
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// readability / config
// ---------------------------------------------------------------------------

fn cmd_readability(file: &Path) -> Result<()> {
    let text = read_input(file)?;
    let report = flesch_reading_ease(&text)?;
    println!("  Score:      {:.2}", report.score);
    println!("  Difficulty: {}", report.difficulty.unwrap_or("-"));
    println!(
        "  Sentences:  {}  Words: {}  Syllables: {}",
        report.sentences, report.words, report.syllables
    );
    Ok(())
}

fn cmd_config_init() -> Result<()> {
    let path = init_config()?;
    println!("Config initialized at: {}", path.display());
    Ok(())
}

fn cmd_config_show(path: Option<&Path>) -> Result<()> {
    let config = resolve_config(path)?;
    let toml_str = toml::to_string_pretty(&config)?;
    println!("{toml_str}");
    Ok(())
}

// ---------------------------------------------------------------------------
// CLI progress reporter
// ---------------------------------------------------------------------------

/// CLI progress reporter using an indicatif bar.
struct CliProgress {
    bar: ProgressBar,
}

impl CliProgress {
    fn new() -> Self {
        let bar = ProgressBar::new(0);
        if let Ok(style) =
            ProgressStyle::with_template("{spinner:.cyan} {msg} [{bar:30.cyan/blue}] {pos}/{len}")
        {
            bar.set_style(
                style
                    .progress_chars("=> ")
                    .tick_strings(&["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏"]),
            );
        }
        bar.enable_steady_tick(std::time::Duration::from_millis(80));
        Self { bar }
    }
}

impl ProgressReporter for CliProgress {
    fn phase(&self, name: &str) {
        self.bar.set_message(name.to_string());
    }

    fn item_done(&self, current: usize, total: usize) {
        self.bar.set_length(total as u64);
        self.bar.set_position(current as u64);
    }

    fn done(&self) {
        self.bar.finish_and_clear();
    }
}
