use anyhow::Context as _;
use clap::builder::FalseyValueParser;
use clap::{ArgAction, Parser};
use llm_regress::ansi::{GREEN, NORMAL, RED};
use llm_regress::{
    BackoffConfig, ChatConfig, EvalOptions, HttpBackend, Pipeline, PipelineConfig, Repl,
    ScenarioEvaluator,
};
use std::io;
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "llm-regress")]
#[command(about = "Ask an LLM through a reason/respond pipeline, or replay scripted conversations against it")]
struct Args {
    /// Transcript files to evaluate; without any, read questions from stdin
    files: Vec<PathBuf>,

    /// Chat API base URL (OpenAI-compatible or Gemini)
    #[arg(long, env = "LLM_API_BASE_URL", default_value = llm_regress::config::DEFAULT_BASE_URL)]
    base_url: String,

    /// API key (falls back to OPENAI_API_KEY)
    #[arg(long, env = "LLM_API_KEY", hide_env_values = true)]
    api_key: Option<String>,

    /// Chat model
    #[arg(long, env = "LLM_CHAT_MODEL", default_value = llm_regress::config::DEFAULT_MODEL)]
    model: String,

    /// Token streaming; "no" turns it off
    #[arg(long, env = "LLM_STREAMING", default_value = "yes")]
    streaming: String,

    /// Ask for JSON matching a schema instead of key: value lines
    #[arg(long, env = "LLM_JSON_SCHEMA", action = ArgAction::SetTrue, value_parser = FalseyValueParser::new())]
    json_schema: bool,

    /// Answer directly, skipping the reasoning stage
    #[arg(long, env = "LLM_ZERO_SHOT", action = ArgAction::SetTrue, value_parser = FalseyValueParser::new())]
    zero_shot: bool,

    /// Log chat traffic
    #[arg(long, env = "LLM_DEBUG_CHAT", action = ArgAction::SetTrue, value_parser = FalseyValueParser::new())]
    debug_chat: bool,

    /// Print the stage review after passing checks too
    #[arg(long, env = "LLM_DEBUG_PIPELINE", action = ArgAction::SetTrue, value_parser = FalseyValueParser::new())]
    debug_pipeline: bool,

    /// Stop at the first mismatch
    #[arg(long, env = "LLM_DEBUG_FAIL_EXIT", action = ArgAction::SetTrue, value_parser = FalseyValueParser::new())]
    fail_fast: bool,
}

fn init_tracing(debug_chat: bool) -> anyhow::Result<()> {
    let mut filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    if debug_chat {
        filter = filter.add_directive("llm_regress=debug".parse()?);
    }
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .init();
    Ok(())
}

async fn run(args: Args) -> anyhow::Result<bool> {
    let api_key = args
        .api_key
        .or_else(|| std::env::var("OPENAI_API_KEY").ok())
        .unwrap_or_default();

    let chat = ChatConfig::default()
        .with_base_url(args.base_url)
        .with_api_key(api_key)
        .with_model(args.model)
        .with_streaming(args.streaming != "no");
    let backoff = BackoffConfig::from_chat_config(&chat);
    tracing::debug!(config = ?chat, "chat transport");

    println!(
        "Using LLM at {} (model: {}{}{}).",
        chat.base_url, GREEN, chat.model, NORMAL
    );

    let backend = HttpBackend::new(chat).context("cannot set up the chat transport")?;
    let pipeline = Pipeline::new(
        Arc::new(backend),
        PipelineConfig::default()
            .with_json_schema(args.json_schema)
            .with_zero_shot(args.zero_shot),
    )
    .with_backoff(backoff);

    if args.files.is_empty() {
        let stdin = tokio::io::BufReader::new(tokio::io::stdin());
        Repl::new(&pipeline, io::stdout()).run(stdin).await?;
        return Ok(true);
    }

    let options = EvalOptions {
        debug_pipeline: args.debug_pipeline,
        fail_fast: args.fail_fast,
    };
    let mut evaluator = ScenarioEvaluator::new(&pipeline, options, io::stdout());
    let mut passed = true;
    for path in &args.files {
        let summary = evaluator.evaluate_file(path).await?;
        passed &= summary.passed();
    }
    Ok(passed)
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> ExitCode {
    let args = Args::parse();
    if let Err(e) = init_tracing(args.debug_chat) {
        eprintln!("cannot set up logging: {:#}", e);
    }

    match run(args).await {
        Ok(true) => ExitCode::SUCCESS,
        Ok(false) => ExitCode::FAILURE,
        Err(e) => {
            eprintln!("{}{:#}{}", RED, e, NORMAL);
            ExitCode::FAILURE
        }
    }
}
