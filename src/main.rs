use std::{fs, path::Path, thread, time::Duration};

use anyhow::{Context, bail};
use clap::Parser;
use indicatif::{ProgressBar, ProgressStyle};
use owo_colors::{OwoColorize, Stream};
use tracing::{debug, info, warn};
use tracing_subscriber::EnvFilter;

use crate::{
    annotate::{PassReport, annotate},
    cli::{AnnotateArgs, Cli, Command},
    document::Document,
    gate::{GateOutcome, ReadinessGate},
    message::{InitialRequest, PageTypeNotice, document_id},
    toggle::VanityLinkToggle,
};

mod annotate;
mod cli;
mod config;
mod document;
mod gate;
mod linker;
mod matching;
mod message;
mod page;
mod toggle;

fn main() -> anyhow::Result<()> {
    let args = Cli::parse();
    init_tracing(args.verbose);
    match args.command {
        Command::Annotate(args) => run_annotate(&args),
        Command::Request { url } => {
            let request = InitialRequest {
                arxiv_id: document_id(&url)?,
            };
            println!("{}", serde_json::to_string(&request)?);
            Ok(())
        }
        Command::VanityLink { html, pdp, url } => {
            let notice = url.as_deref().map_or(
                PageTypeNotice { is_s2_pdp: pdp },
                PageTypeNotice::for_url,
            );
            let mut doc = Document::new(read_html(&html)?);
            let mut toggle = VanityLinkToggle::attach(&doc);
            toggle.apply(&mut doc, notice);
            info!(shown = toggle.is_shown(), "vanity link toggled");
            print!("{}", doc.as_str());
            Ok(())
        }
    }
}

fn init_tracing(verbose: bool) {
    let filter = if verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"))
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn read_html(path: &Path) -> anyhow::Result<String> {
    fs::read_to_string(path).with_context(|| format!("failed to read {}", path.display()))
}

fn run_annotate(args: &AnnotateArgs) -> anyhow::Result<()> {
    let config = args.config()?;
    let message = args.metadata.read()?;

    if let Some(url) = &args.url {
        let id = document_id(url)?;
        if !message.accepts(&id) {
            warn!(document = %id, metadata = %message.arxiv_id, "metadata is for another document, leaving it unchanged");
            return write_output(args.output.as_deref(), &read_html(&args.html)?);
        }
    }

    let spinner = ProgressBar::new_spinner();
    spinner.set_style(
        ProgressStyle::with_template("{spinner:.cyan} [{elapsed_precise}] {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner()),
    );
    spinner.set_message(format!("waiting for {}", config.selectors.sentinel));

    let sentinel = &config.selectors.sentinel;
    let mut gate = ReadinessGate::new(config.gate.clone());
    // A read error ends the wait at once and surfaces through the pass.
    let outcome = gate.run(
        || match read_html(&args.html) {
            Ok(html) => {
                let doc = Document::new(html);
                doc.contains(sentinel).then_some(Ok(doc))
            }
            Err(err) => Some(Err(err)),
        },
        |interval: Duration| {
            spinner.tick();
            thread::sleep(interval);
        },
        |doc: anyhow::Result<Document>| {
            doc.map(|mut doc| {
                let report = annotate(&mut doc, &message, &config);
                (doc, report)
            })
        },
    );
    spinner.finish_and_clear();
    debug!(state = ?gate.state(), "readiness gate finished");

    match outcome {
        GateOutcome::Invoked(annotated) => {
            let (doc, report) = annotated?;
            write_output(args.output.as_deref(), doc.as_str())?;
            print_summary(&report);
            Ok(())
        }
        GateOutcome::GaveUp { attempts, waited } => {
            bail!(
                "{} never contained {} ({} checks over {:?})",
                args.html.display(),
                sentinel,
                attempts,
                waited
            )
        }
        GateOutcome::AlreadyFinished => bail!("annotation pass already ran"),
    }
}

fn write_output(output: Option<&Path>, html: &str) -> anyhow::Result<()> {
    match output {
        Some(path) => fs::write(path, html)
            .with_context(|| format!("failed to write {}", path.display())),
        None => {
            print!("{html}");
            Ok(())
        }
    }
}

fn print_summary(report: &PassReport) {
    eprintln!(
        "{} {}",
        format!("✓ {}", report.linked()).if_supports_color(Stream::Stderr, |t| t.green()),
        format!("✗ {}", report.unlinked()).if_supports_color(Stream::Stderr, |t| t.red())
    );
    eprintln!(
        "{} bib entries, {} citation contexts, {} authors, detail link {}",
        report.bib_entries(),
        report.contexts(),
        report.authors,
        if report.detail_link { "added" } else { "skipped" }
    );
    for r in report.references.iter().filter(|r| !r.is_linked()) {
        info!(reference = %r.id, "reference not found in document");
    }
}
