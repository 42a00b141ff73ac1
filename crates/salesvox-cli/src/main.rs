use std::fs;
use std::io::{self, ErrorKind, Write};
use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};

use anyhow::{bail, Context, Result};
use clap::{Args, Parser, Subcommand};
use salesvox_contracts::chat::{
    parse_chat_input, ChatAction, ChatInput, CHAT_HELP_COMMANDS, SAMPLE_QUESTIONS,
};
use salesvox_contracts::events::ActivityLog;
use salesvox_contracts::models::{ModelSelector, IMAGE, TEXT, TRANSCRIPTION};
use salesvox_contracts::pipeline::{ImageQuality, ImageSize, PipelineResult, RenderOptions};
use salesvox_engine::store::{BusinessOverview, TableInfo};
use salesvox_engine::{
    tracker_from_config, ChatSession, DataAgent, EngineConfig, OpenAiChat, OpenAiImages,
    OpenAiTranscriber, SalesStore, Submission, VoicePipeline, VoiceSession,
};
use serde_json::json;
use tracing::{info, warn, Level};

#[derive(Debug, Parser)]
#[command(name = "salesvox", version, about = "Chat with sales data, or turn speech into images")]
struct Cli {
    /// Log at debug level.
    #[arg(long, global = true)]
    verbose: bool,
    /// Append a JSONL activity log to this file.
    #[arg(long, global = true, env = "SALESVOX_EVENTS")]
    events: Option<PathBuf>,
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Create the sample database if it has no sales yet.
    Seed(SeedArgs),
    /// Interactive chat about the sales data.
    Chat(ChatArgs),
    /// Ask a single question and print the answer.
    Ask(AskArgs),
    /// Print the business overview.
    Overview(ReportArgs),
    /// Print table row counts and columns.
    Tables(ReportArgs),
    /// Run the voice-to-image pipeline on audio files or typed text.
    Imagine(ImagineArgs),
    /// List known models and their capabilities.
    Models,
}

#[derive(Debug, Args)]
struct StoreArgs {
    #[arg(long)]
    db: Option<PathBuf>,
}

#[derive(Debug, Args)]
struct SeedArgs {
    #[command(flatten)]
    store: StoreArgs,
    /// Fixed RNG seed for reproducible sample data.
    #[arg(long)]
    seed: Option<u64>,
}

#[derive(Debug, Args)]
struct ChatArgs {
    #[command(flatten)]
    store: StoreArgs,
    #[arg(long)]
    text_model: Option<String>,
}

#[derive(Debug, Args)]
struct AskArgs {
    question: String,
    #[command(flatten)]
    store: StoreArgs,
    #[arg(long)]
    text_model: Option<String>,
}

#[derive(Debug, Args)]
struct ReportArgs {
    #[command(flatten)]
    store: StoreArgs,
    #[arg(long)]
    json: bool,
}

#[derive(Debug, Args)]
struct ImagineArgs {
    /// Audio file to transcribe. Repeat to process several in one session.
    #[arg(long)]
    audio: Vec<PathBuf>,
    /// Typed description used instead of (or after) audio.
    #[arg(long)]
    text: Option<String>,
    #[arg(long, default_value = "1024x1024")]
    size: ImageSize,
    #[arg(long, default_value = "standard")]
    quality: ImageQuality,
    #[arg(long)]
    text_model: Option<String>,
    #[arg(long)]
    image_model: Option<String>,
    #[arg(long)]
    transcribe_model: Option<String>,
    #[arg(long)]
    json: bool,
}

fn main() {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();

    let default_level = match (&cli.command, cli.verbose) {
        (_, true) => Level::DEBUG,
        (Command::Overview(_) | Command::Tables(_) | Command::Models, false) => Level::WARN,
        _ => Level::INFO,
    };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env().add_directive(default_level.into()),
        )
        .with_target(false)
        .with_writer(io::stderr)
        .init();

    match run(cli) {
        Ok(code) => std::process::exit(code),
        Err(err) => {
            eprintln!("salesvox error: {err:#}");
            std::process::exit(1);
        }
    }
}

fn run(cli: Cli) -> Result<i32> {
    let config = EngineConfig::from_env();
    let session_id = new_session_id();
    let log = match cli.events {
        Some(path) => ActivityLog::to_file(path, session_id.clone()),
        None => ActivityLog::disabled(),
    };
    if let Some(path) = log.path().filter(|_| log.is_enabled()) {
        info!("Recording activity to {}", path.display());
    }

    match cli.command {
        Command::Seed(args) => run_seed(args, config),
        Command::Chat(args) => {
            run_chat(args, config, log, &session_id)?;
            Ok(0)
        }
        Command::Ask(args) => run_ask(args, config, log, &session_id),
        Command::Overview(args) => run_overview(args, config),
        Command::Tables(args) => run_tables(args, config),
        Command::Imagine(args) => run_imagine(args, config, log),
        Command::Models => {
            print_models();
            Ok(0)
        }
    }
}

fn run_seed(args: SeedArgs, mut config: EngineConfig) -> Result<i32> {
    apply_store_args(&args.store, &mut config);
    let store = SalesStore::open(&config.database_path)?;
    let inserted = store.seed_if_empty(args.seed)?;
    if inserted == 0 {
        println!(
            "{} already has sales data; nothing inserted.",
            config.database_path.display()
        );
    } else {
        println!(
            "Database created successfully at {} ({inserted} sales records).",
            config.database_path.display()
        );
    }
    print_tables(&store.table_info()?);
    Ok(0)
}

fn run_chat(args: ChatArgs, mut config: EngineConfig, log: ActivityLog, session_id: &str) -> Result<()> {
    apply_store_args(&args.store, &mut config);
    if let Some(model) = args.text_model {
        config.text_model = model;
    }
    let store = open_store(&config.database_path)?;
    let agent = build_agent(&config, store.clone(), log)?;
    let mut session = ChatSession::new(session_id);

    let stdin = io::stdin();
    let mut line = String::new();
    println!(
        "Data insights chat ({}). Type /help for commands, /samples for ideas.",
        agent.model()
    );

    loop {
        print!("> ");
        io::stdout().flush()?;

        line.clear();
        let read = match stdin.read_line(&mut line) {
            Ok(read) => read,
            Err(err) if err.kind() == ErrorKind::Interrupted => continue,
            Err(err) => return Err(err.into()),
        };
        if read == 0 {
            break;
        }

        match parse_chat_input(&line) {
            ChatInput::Noop => continue,
            ChatInput::Invalid(message) => println!("{message}"),
            ChatInput::Question(question) => {
                let reply = agent.handle(&mut session, &question);
                println!("{reply}");
            }
            ChatInput::Command(ChatAction::Help) => {
                println!("Commands: {}", CHAT_HELP_COMMANDS.join(" "));
            }
            ChatInput::Command(ChatAction::Reset) => {
                session.reset();
                println!("Conversation reset.");
            }
            ChatInput::Command(ChatAction::Samples) => {
                for (index, question) in SAMPLE_QUESTIONS.iter().enumerate() {
                    println!("{:>2}. {question}", index + 1);
                }
            }
            ChatInput::Command(ChatAction::Tables) => match store.table_info() {
                Ok(info) => print_tables(&info),
                Err(err) => eprintln!("salesvox error: {err:#}"),
            },
            ChatInput::Command(ChatAction::Overview) => match store.overview() {
                Ok(overview) => print_overview(&overview),
                Err(err) => eprintln!("salesvox error: {err:#}"),
            },
            ChatInput::Command(ChatAction::Quit) => break,
        }
    }
    Ok(())
}

fn run_ask(args: AskArgs, mut config: EngineConfig, log: ActivityLog, session_id: &str) -> Result<i32> {
    apply_store_args(&args.store, &mut config);
    if let Some(model) = args.text_model {
        config.text_model = model;
    }
    let question = args.question.trim();
    if question.is_empty() {
        bail!("question must not be empty");
    }
    let store = open_store(&config.database_path)?;
    let agent = build_agent(&config, store, log)?;
    let mut session = ChatSession::new(session_id);
    println!("{}", agent.handle(&mut session, question));
    Ok(0)
}

fn run_overview(args: ReportArgs, mut config: EngineConfig) -> Result<i32> {
    apply_store_args(&args.store, &mut config);
    let overview = open_store(&config.database_path)?.overview()?;
    if args.json {
        println!("{}", serde_json::to_string_pretty(&overview)?);
    } else {
        print_overview(&overview);
    }
    Ok(0)
}

fn run_tables(args: ReportArgs, mut config: EngineConfig) -> Result<i32> {
    apply_store_args(&args.store, &mut config);
    let info = open_store(&config.database_path)?.table_info()?;
    if args.json {
        println!("{}", serde_json::to_string_pretty(&info)?);
    } else {
        print_tables(&info);
    }
    Ok(0)
}

fn run_imagine(args: ImagineArgs, config: EngineConfig, log: ActivityLog) -> Result<i32> {
    if args.audio.is_empty() && args.text.is_none() {
        bail!("imagine needs --audio <path> or --text <description>");
    }

    let text_model = resolve_model(args.text_model.as_deref().unwrap_or(&config.text_model), TEXT)?;
    let image_model = resolve_model(args.image_model.as_deref().unwrap_or(&config.image_model), IMAGE)?;
    let transcription_model = resolve_model(
        args.transcribe_model
            .as_deref()
            .unwrap_or(&config.transcription_model),
        TRANSCRIPTION,
    )?;

    let pipeline = VoicePipeline::new(
        Box::new(OpenAiTranscriber::new(&config, transcription_model)?),
        Box::new(OpenAiChat::new(&config)?),
        Box::new(OpenAiImages::new(&config)?),
        text_model,
        image_model,
    )
    .with_options(RenderOptions {
        size: args.size,
        quality: args.quality,
    })
    .with_activity_log(log);
    let mut session = VoiceSession::new(pipeline);

    let mut failures = 0;
    for path in &args.audio {
        let bytes = match fs::read(path) {
            Ok(bytes) => bytes,
            Err(err) => {
                eprintln!("Failed to read {}: {err}", path.display());
                failures += 1;
                continue;
            }
        };
        match session.submit_audio(&bytes) {
            Submission::Duplicate => {
                println!("{}: same audio as the previous input; skipped.", path.display());
            }
            Submission::Processed(result) => {
                report_result(&format!("{}", path.display()), &result, args.json)?;
                if !result.is_complete() {
                    failures += 1;
                }
            }
        }
    }
    if let Some(text) = args.text.as_deref() {
        let result = session.submit_text(text);
        report_result("text", &result, args.json)?;
        if !result.is_complete() {
            failures += 1;
        }
    }

    if !args.json && session.history().len() > 1 {
        println!("Generated {} images this session.", session.history().len());
    }
    Ok(if failures > 0 { 1 } else { 0 })
}

fn report_result(label: &str, result: &PipelineResult, as_json: bool) -> Result<()> {
    if as_json {
        println!("{}", serde_json::to_string(&json!({"input": label, "result": result}))?);
        return Ok(());
    }

    println!("== {label}");
    if !result.transcript.is_empty() {
        println!("Transcript: {}", result.transcript);
    }
    if let Some(description) = &result.description {
        println!("Description: {description}");
    }
    if let Some(url) = &result.image_url {
        println!("Image: {url}");
    }
    println!(
        "Models: text={} image={} size={} quality={}",
        result.text_model, result.image_model, result.image_size, result.image_quality
    );
    if let Some(error) = &result.error {
        let stage = result
            .failed_stage
            .map(|stage| stage.to_string())
            .unwrap_or_else(|| "unknown".to_string());
        println!("Error ({stage}): {error}");
    }
    Ok(())
}

fn apply_store_args(args: &StoreArgs, config: &mut EngineConfig) {
    if let Some(db) = &args.db {
        config.database_path = db.clone();
    }
}

/// Opens the database, creating and seeding it on first use.
fn open_store(path: &Path) -> Result<SalesStore> {
    if !path.exists() {
        info!("Database not found at {}. Creating...", path.display());
    }
    let store = SalesStore::open(path)
        .with_context(|| format!("failed to prepare database {}", path.display()))?;
    store.seed_if_empty(None)?;
    Ok(store)
}

fn build_agent(config: &EngineConfig, store: SalesStore, log: ActivityLog) -> Result<DataAgent> {
    let model = resolve_model(&config.text_model, TEXT)?;
    Ok(DataAgent::new(
        Box::new(OpenAiChat::new(config)?),
        Box::new(store),
        tracker_from_config(config)?,
        model,
    )
    .with_activity_log(log))
}

fn resolve_model(requested: &str, capability: &str) -> Result<String> {
    let selection = ModelSelector::default().select(Some(requested), capability)?;
    if let Some(reason) = selection.fallback_reason {
        warn!("{reason}");
    }
    Ok(selection.model.name)
}

fn print_tables<'a>(info: impl IntoIterator<Item = (&'a String, &'a TableInfo)>) {
    for (name, table) in info {
        println!("{name}: {} rows", table.row_count);
        println!("  columns: {}", table.columns.join(", "));
    }
}

fn print_overview(overview: &BusinessOverview) {
    println!("Total sales records: {}", overview.total_sales_records);
    println!("Total customers:     {}", overview.total_customers);
    println!("Total revenue:       ${:.2}", overview.total_revenue);

    println!("\nTop products by revenue:");
    for line in &overview.top_products {
        println!("  {:<24} ${:>12.2}", line.label, line.revenue);
    }
    println!("\nRevenue by region:");
    for line in &overview.revenue_by_region {
        println!("  {:<24} ${:>12.2}", line.label, line.revenue);
    }
    println!("\nRevenue by category:");
    for line in &overview.revenue_by_category {
        println!("  {:<24} ${:>12.2}", line.label, line.revenue);
    }
    println!("\nTop customers:");
    for customer in &overview.top_customers {
        println!(
            "  {:<24} ${:>12.2}  ({} orders)",
            customer.name, customer.total_spent, customer.total_orders
        );
    }
}

fn print_models() {
    let selector = ModelSelector::default();
    for model in selector.registry.list() {
        let context = model
            .context_window
            .map(|tokens| format!("{tokens} ctx"))
            .unwrap_or_default();
        println!(
            "{:<24} {:<8} {:<14} {}",
            model.name,
            model.provider,
            model.capabilities.join(", "),
            context
        );
    }
}

fn new_session_id() -> String {
    let millis = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|elapsed| elapsed.as_millis())
        .unwrap_or_default();
    format!("session-{millis}")
}
