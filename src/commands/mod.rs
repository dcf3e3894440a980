// Command implementations for the CLI


use std::io::{self, BufRead, Write};
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use console::style;
use indicatif::{ProgressBar, ProgressStyle};
use tracing::{info, warn};

use crate::RagError;
use crate::config::{BackendKind, Config};
use crate::embeddings::OllamaClient;
use crate::index::{SearchHit, VectorIndex};
use crate::pipeline::{IngestReport, Pipeline, QueryOutcome, Session};

/// Where a chat session gets its index from, decided before anything is loaded
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IndexSource {
    /// Build a fresh index from this PDF and persist it
    Rebuild(PathBuf),
    /// Load the index persisted in this directory
    Persisted(PathBuf),
    /// Nothing to load; questions get the guard message until a PDF is ingested
    Missing,
}

impl IndexSource {
    /// An explicit PDF always wins over whatever is on disk
    #[inline]
    pub fn resolve(pdf: Option<PathBuf>, index_dir: &Path) -> Self {
        match pdf {
            Some(path) => Self::Rebuild(path),
            None if VectorIndex::exists(index_dir) => Self::Persisted(index_dir.to_path_buf()),
            None => Self::Missing,
        }
    }
}

/// Build an index from a PDF and persist it under the data directory
#[inline]
pub fn ingest(config: &Config, pdf: &Path) -> Result<()> {
    let Some(pipeline) = connect(config)? else {
        return Ok(());
    };

    let mut session = Session::new();
    let report = ingest_and_persist(&pipeline, &mut session, pdf, &config.index_dir())?;
    print_report(pdf, &report);

    Ok(())
}

/// Answer a single question against the persisted index
#[inline]
pub fn ask(config: &Config, question: &str) -> Result<()> {
    let Some(pipeline) = connect(config)? else {
        return Ok(());
    };

    let source = IndexSource::resolve(None, &config.index_dir());
    let mut session = open_session(&pipeline, &source, &config.index_dir())?;

    let outcome = pipeline
        .query(&mut session, question)
        .context("Failed to answer question")?;
    print_outcome(&mut io::stdout().lock(), &outcome)?;

    Ok(())
}

/// Console question loop over one session
#[inline]
pub fn chat(config: &Config, pdf: Option<PathBuf>) -> Result<()> {
    let Some(pipeline) = connect(config)? else {
        return Ok(());
    };

    let source = IndexSource::resolve(pdf, &config.index_dir());
    let mut session = open_session(&pipeline, &source, &config.index_dir())?;

    run_chat(
        &pipeline,
        &mut session,
        io::stdin().lock(),
        io::stdout().lock(),
    )?;

    info!("Chat ended after {} turns", session.history().len());
    Ok(())
}

/// Show the configured backend and the persisted index, if any
#[inline]
pub fn status(config: &Config) -> Result<()> {
    println!("📊 PDF RAG Status Report");
    println!("{}", "=".repeat(50));
    println!();

    println!("🤖 Backend: {}", config.backend);
    println!("   📋 Embedding Model: {}", config.embedding_model());
    println!("   💬 Chat Model: {}", config.chat_model());

    match config.backend {
        BackendKind::Ollama => match OllamaClient::new(&config.ollama) {
            Ok(client) => match client.health_check() {
                Ok(()) => println!("   ✅ Ollama: Connected ({})", client.base_url()),
                Err(e) => println!("   ⚠️  Ollama: Unhealthy - {}", e),
            },
            Err(e) => println!("   ❌ Ollama: Invalid configuration - {}", e),
        },
        BackendKind::Hosted => {
            if std::env::var(&config.hosted.api_key_env).is_ok_and(|key| !key.trim().is_empty()) {
                println!("   ✅ API key: {} is set", config.hosted.api_key_env);
            } else {
                println!("   ❌ API key: {} is not set", config.hosted.api_key_env);
            }
        }
    }

    println!();
    println!("🔍 Vector Index:");
    let index_dir = config.index_dir();
    match VectorIndex::load(&index_dir) {
        Ok(index) => {
            let manifest = index.manifest();
            println!("   🆔 ID: {}", manifest.id);
            println!("   📦 Chunks: {}", index.len());
            println!("   🔢 Dimensions: {}", manifest.dimension);
            println!("   📋 Model: {}", manifest.embedding_model);
            println!(
                "   🕒 Created: {}",
                manifest.created_at.format("%Y-%m-%d %H:%M:%S")
            );
            if manifest.embedding_model != config.embedding_model() {
                println!(
                    "   ⚠️  Built with {} but {} is configured; re-ingest to search with the new model",
                    manifest.embedding_model,
                    config.embedding_model()
                );
            }
        }
        Err(RagError::IndexNotFound(_)) => {
            println!("   💤 No index yet. Use 'pdf-rag ingest <PDF>' to build one.");
        }
        Err(e) => println!("   ❌ Unreadable index at {} - {}", index_dir.display(), e),
    }

    Ok(())
}

/// Prepare a session from the chosen index source
#[inline]
pub fn open_session(pipeline: &Pipeline, source: &IndexSource, index_dir: &Path) -> Result<Session> {
    match source {
        IndexSource::Rebuild(pdf) => {
            let mut session = Session::new();
            let report = ingest_and_persist(pipeline, &mut session, pdf, index_dir)?;
            print_report(pdf, &report);
            Ok(session)
        }
        IndexSource::Persisted(dir) => {
            let index = VectorIndex::load(dir)
                .with_context(|| format!("Failed to load index from {}", dir.display()))?;
            eprintln!(
                "{} {} chunks from the last ingested PDF",
                style("Loaded").green(),
                index.len()
            );
            Ok(Session::with_index(index))
        }
        IndexSource::Missing => {
            eprintln!(
                "{}",
                style("No index found. Use 'pdf-rag ingest <PDF>' or 'pdf-rag chat --pdf <PDF>'.")
                    .yellow()
            );
            Ok(Session::new())
        }
    }
}

/// Read questions line by line until `exit` or end of input. Backend errors
/// are reported and the loop continues.
#[inline]
pub fn run_chat<R: BufRead, W: Write>(
    pipeline: &Pipeline,
    session: &mut Session,
    mut input: R,
    mut output: W,
) -> Result<()> {
    writeln!(
        output,
        "{}",
        style("Ask a question about the document. Type 'exit' to quit.").bold()
    )?;

    loop {
        write!(output, "{} ", style("You:").bold().cyan())?;
        output.flush()?;

        let mut line = String::new();
        if input.read_line(&mut line)? == 0 {
            writeln!(output)?;
            break;
        }

        let question = line.trim();
        if question.eq_ignore_ascii_case("exit") {
            break;
        }

        match pipeline.query(session, question) {
            Ok(outcome) => print_outcome(&mut output, &outcome)?,
            Err(e) => {
                warn!("Query failed: {}", e);
                writeln!(output, "{} {}", style("Error:").bold().red(), e)?;
            }
        }
    }

    Ok(())
}

/// Print an answer and where it came from, or the guard message
#[inline]
pub fn print_outcome<W: Write>(output: &mut W, outcome: &QueryOutcome) -> io::Result<()> {
    match outcome {
        QueryOutcome::Answered(answer) => {
            writeln!(output, "{} {}", style("Assistant:").bold().green(), answer.text)?;
            if !answer.sources.is_empty() {
                writeln!(output, "{}", style("Sources:").dim())?;
                for hit in &answer.sources {
                    writeln!(output, "{}", style(format_source(hit)).dim())?;
                }
            }
        }
        QueryOutcome::Blocked(message) => {
            writeln!(output, "{}", style(message).yellow())?;
        }
    }
    Ok(())
}

fn format_source(hit: &SearchHit) -> String {
    let source = &hit.chunk.source;
    let file = source
        .file_name()
        .map_or_else(|| source.to_string_lossy(), |name| name.to_string_lossy());
    format!(
        "  - {} page {} (distance {:.3})",
        file, hit.chunk.page, hit.distance
    )
}

/// Build the configured pipeline. A missing API key is a user mistake, not a
/// crash, so it is printed and `None` is returned.
fn connect(config: &Config) -> Result<Option<Pipeline>> {
    match Pipeline::from_config(config) {
        Ok(pipeline) => Ok(Some(pipeline)),
        Err(RagError::MissingCredential(var)) => {
            eprintln!(
                "{} The hosted backend needs an API key. Set {} and try again, or run 'pdf-rag config' to switch to Ollama.",
                style("✗").red(),
                style(var).cyan()
            );
            Ok(None)
        }
        Err(e) => Err(e).context("Failed to set up backends"),
    }
}

fn ingest_and_persist(
    pipeline: &Pipeline,
    session: &mut Session,
    pdf: &Path,
    index_dir: &Path,
) -> Result<IngestReport> {
    let bar = spinner(&format!("Indexing {}", pdf.display()));
    let result = pipeline.ingest_pdf(session, pdf);
    bar.finish_and_clear();

    let report = result.with_context(|| format!("Failed to ingest {}", pdf.display()))?;

    if let Some(index) = session.index() {
        index
            .persist(index_dir)
            .with_context(|| format!("Failed to save index to {}", index_dir.display()))?;
    }

    Ok(report)
}

fn spinner(message: &str) -> ProgressBar {
    let bar = if console::user_attended_stderr() {
        ProgressBar::new_spinner().with_style(
            ProgressStyle::with_template("{spinner} {msg}").expect("style template is valid"),
        )
    } else {
        ProgressBar::hidden()
    };
    bar.set_message(message.to_string());
    bar.enable_steady_tick(Duration::from_millis(100));
    bar
}

fn print_report(pdf: &Path, report: &IngestReport) {
    eprintln!(
        "{} {} ({} pages, {} chunks, {} dimensions)",
        style("✓ Indexed").green(),
        style(pdf.display()).cyan(),
        report.pages,
        report.chunks,
        report.dimension
    );
}
