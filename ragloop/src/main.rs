//! ragloop: document-grounded agent conversations.
//!
//! Inspect how a markdown document is split and folded, print tool
//! definitions, and replay scripted conversations through the same loop a
//! live model would drive.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result, bail};
use clap::{Args, Parser, Subcommand};
use ragloop::core::invariants::validate_tree_invariants;
use ragloop::core::section_tree::SectionTree;
use ragloop::exit_codes;
use ragloop::io::config::{RagloopConfig, load_config};
use ragloop::io::document::read_document;
use ragloop::io::history::{load_history, save_history};
use ragloop::io::model::ScriptedModel;
use ragloop::io::prompt::PromptBuilder;
use ragloop::io::vector_store::InMemoryStore;
use ragloop::logging;
use ragloop::looping::{LoopConfig, LoopOutcome, LoopStop, RoundReport, run_loop};
use ragloop::sessions::{
    RetrievalSession, Session, SessionKind, SummarizeSession, TaskSession, TocSession,
};
use serde_json::Value;

const DEFAULT_CONFIG: &str = "ragloop.toml";

#[derive(Parser)]
#[command(
    name = "ragloop",
    version,
    about = "Document-grounded agent conversations: summarize, structure, retrieve, plan"
)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Print the section tree of a markdown document and check its invariants.
    Outline { doc: PathBuf },
    /// Print the first summarization prompt for a document.
    Fold {
        doc: PathBuf,
        /// Unsummarized sections shown in the excerpt.
        #[arg(long)]
        window: Option<usize>,
    },
    /// Print the first table-of-contents prompt for a document.
    Paragraphs {
        doc: PathBuf,
        /// Raw paragraphs shown in the excerpt.
        #[arg(long)]
        window: Option<usize>,
    },
    /// Print the tool definitions of a conversation kind as JSON.
    Tools {
        #[arg(value_enum)]
        kind: SessionKind,
    },
    /// Drive a conversation with turns read from a JSON script.
    Replay(ReplayArgs),
}

#[derive(Args)]
struct ReplayArgs {
    #[arg(value_enum)]
    kind: SessionKind,
    /// JSON array of model turns.
    #[arg(long)]
    script: PathBuf,
    /// Markdown document (summarize, toc, retrieval).
    #[arg(long)]
    doc: Option<PathBuf>,
    /// Question or overall goal (retrieval, tasks).
    #[arg(long)]
    goal: Option<String>,
    #[arg(long, default_value = DEFAULT_CONFIG)]
    config: PathBuf,
}

fn main() {
    logging::init();
    let cli = Cli::parse();
    match run(cli) {
        Ok(code) => std::process::exit(code),
        Err(err) => {
            eprintln!("{:#}", err);
            std::process::exit(exit_codes::INVALID);
        }
    }
}

fn run(cli: Cli) -> Result<i32> {
    match cli.command {
        Command::Outline { doc } => cmd_outline(&doc),
        Command::Fold { doc, window } => cmd_fold(&doc, window),
        Command::Paragraphs { doc, window } => cmd_paragraphs(&doc, window),
        Command::Tools { kind } => cmd_tools(kind),
        Command::Replay(args) => cmd_replay(&args),
    }
}

fn cmd_outline(doc: &Path) -> Result<i32> {
    let tree = SectionTree::from_document(&read_document(doc)?);
    for (id, segment) in tree.segments().iter().enumerate() {
        println!(
            "{}\tlevel={}\t{}\tchildren={:?}\tskip={}",
            id,
            segment.level,
            segment.display_heading(),
            segment.children,
            segment.skip
        );
    }
    let errors = validate_tree_invariants(&tree);
    if !errors.is_empty() {
        bail!("invariant violations:\n- {}", errors.join("\n- "));
    }
    Ok(exit_codes::OK)
}

fn cmd_fold(doc: &Path, window: Option<usize>) -> Result<i32> {
    let defaults = RagloopConfig::default();
    let session = SummarizeSession::new(
        &read_document(doc)?,
        window.unwrap_or(defaults.fold_window),
    );
    print_prompt(&session, &defaults)
}

fn cmd_paragraphs(doc: &Path, window: Option<usize>) -> Result<i32> {
    let defaults = RagloopConfig::default();
    let session = TocSession::new(
        &read_document(doc)?,
        window.unwrap_or(defaults.paragraph_window),
        defaults.load_paragraph_cap,
    );
    print_prompt(&session, &defaults)
}

fn print_prompt<S: Session>(session: &S, cfg: &RagloopConfig) -> Result<i32> {
    let prompt = session.render(&PromptBuilder::new(cfg.prompt_budget_bytes))?;
    println!("{}", prompt);
    Ok(exit_codes::OK)
}

fn cmd_tools(kind: SessionKind) -> Result<i32> {
    let definitions: Vec<Value> = kind.tools().iter().map(|spec| spec.definition()).collect();
    let rendered = serde_json::to_string_pretty(&definitions).context("serialize tools")?;
    println!("{}", rendered);
    Ok(exit_codes::OK)
}

fn cmd_replay(args: &ReplayArgs) -> Result<i32> {
    let cfg = load_config(&args.config)?;
    cfg.validate()
        .with_context(|| format!("invalid config {}", args.config.display()))?;
    let model = ScriptedModel::from_path(&args.script)?;
    let prompts = PromptBuilder::new(cfg.prompt_budget_bytes);
    let loop_config = LoopConfig::from(&cfg);

    let outcome = match args.kind {
        SessionKind::Summarize => {
            let mut session = SummarizeSession::new(&require_doc(args)?, cfg.fold_window);
            let outcome = run_loop(&model, &mut session, &prompts, &loop_config, print_round)?;
            for record in session.summaries() {
                println!("summary {}: {}", record.headings.join(" > "), record.summary);
            }
            outcome
        }
        SessionKind::Toc => {
            let mut session = TocSession::new(
                &require_doc(args)?,
                cfg.paragraph_window,
                cfg.load_paragraph_cap,
            );
            let outcome = run_loop(&model, &mut session, &prompts, &loop_config, print_round)?;
            print!("{}", session.recorder().render_entries());
            outcome
        }
        SessionKind::Retrieval => {
            let store = InMemoryStore::from_document(&require_doc(args)?);
            let mut session = RetrievalSession::new(&require_goal(args)?, store, cfg.search_top_k);
            let outcome = run_loop(&model, &mut session, &prompts, &loop_config, print_round)?;
            print!("{}", session.state().render_observations());
            outcome
        }
        SessionKind::Tasks => {
            let mut session =
                TaskSession::new(&require_goal(args)?, cfg.tasks.resume_parent_on_finish);
            if let Some(path) = &cfg.tasks.history_file {
                session = session.with_history(load_history(path)?);
            }
            let outcome = run_loop(&model, &mut session, &prompts, &loop_config, print_round)?;
            print!("{}", session.hierarchy().render_task_list());
            print!("{}", session.hierarchy().render_conclusions());
            if let (Some(path), LoopStop::Answered { text }) = (&cfg.tasks.history_file, &outcome.stop) {
                session.record_answer(text);
                save_history(path, session.history())?;
            }
            outcome
        }
    };
    Ok(report_outcome(&outcome))
}

fn require_doc(args: &ReplayArgs) -> Result<String> {
    let Some(doc) = &args.doc else {
        bail!("--doc is required for {} conversations", args.kind);
    };
    read_document(doc)
}

fn require_goal(args: &ReplayArgs) -> Result<String> {
    match args.goal.as_deref().map(str::trim) {
        Some(goal) if !goal.is_empty() => Ok(goal.to_string()),
        _ => bail!("--goal is required for {} conversations", args.kind),
    }
}

fn print_round(report: &RoundReport) {
    println!("round {}: {} tool call(s)", report.round, report.results.len());
    for result in &report.results {
        let first_line = result.content.lines().next().unwrap_or_default();
        println!("  {} -> {}", result.name, first_line);
    }
}

/// Print the stop reason and map it to an exit code.
fn report_outcome(outcome: &LoopOutcome) -> i32 {
    match &outcome.stop {
        LoopStop::Complete => {
            println!("complete after {} round(s)", outcome.rounds_executed);
            exit_codes::OK
        }
        LoopStop::Answered { text } => {
            println!("answered after {} round(s)\n{}", outcome.rounds_executed, text);
            exit_codes::OK
        }
        LoopStop::MaxRoundsExceeded { rounds, max_rounds } => {
            eprintln!("round limit reached ({}/{})", rounds, max_rounds);
            exit_codes::LIMIT
        }
        LoopStop::DeadlineExceeded => {
            eprintln!(
                "conversation deadline exceeded after {} round(s)",
                outcome.rounds_executed
            );
            exit_codes::LIMIT
        }
    }
}
