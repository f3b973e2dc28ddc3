use std::{fs, path::PathBuf, str::FromStr, time::Duration};

use anyhow::Context;
use clap::{Args, Parser, Subcommand};
use url::Url;

use crate::config::Config;
use crate::message::MetadataMessage;

#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Log what each annotation step does
    #[arg(short, long, global = true)]
    pub verbose: bool,
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Link the references of a rendered paper to their pages
    Annotate(AnnotateArgs),
    /// Print the metadata request a document at URL would send
    Request {
        #[arg(value_name = "URL")]
        url: String,
    },
    /// Show or hide the "View on Arxiv Vanity" link on a page
    VanityLink {
        #[arg(value_name = "HTML")]
        html: PathBuf,
        /// The page is a paper detail page
        #[arg(long, conflicts_with = "url")]
        pdp: bool,
        /// URL of the page; decides whether it is a paper detail page
        #[arg(long, value_name = "URL")]
        url: Option<String>,
    },
}

#[derive(Args, Debug)]
pub struct AnnotateArgs {
    /// The rendered paper
    #[arg(value_name = "HTML")]
    pub html: PathBuf,
    /// Reference metadata, as a file or inline JSON
    #[arg(short, long, value_name = "FILE|JSON")]
    pub metadata: MetadataSource,
    /// URL of the document; metadata for any other document is ignored
    #[arg(long, value_name = "URL")]
    pub url: Option<String>,
    /// Write the annotated HTML here instead of stdout
    #[arg(short, long, value_name = "FILE")]
    pub output: Option<PathBuf>,
    #[arg(short, long, value_name = "FILE")]
    pub config: Option<PathBuf>,
    /// Base URL of the metadata service
    #[arg(long, value_name = "URL")]
    pub service: Option<Url>,
    #[arg(long, value_name = "N")]
    pub interval_ms: Option<u64>,
    #[arg(long, value_name = "N")]
    pub max_attempts: Option<u32>,
    #[arg(long, value_name = "N")]
    pub timeout_ms: Option<u64>,
}

impl AnnotateArgs {
    /// The config file, if any, with this invocation's flags on top.
    pub fn config(&self) -> anyhow::Result<Config> {
        let mut config = Config::load(self.config.as_deref())?;
        self.apply(&mut config);
        Ok(config)
    }

    fn apply(&self, config: &mut Config) {
        if let Some(service) = &self.service {
            config.service = service.clone();
        }
        if let Some(ms) = self.interval_ms {
            config.gate.interval = Duration::from_millis(ms);
        }
        if let Some(max) = self.max_attempts {
            config.gate.max_attempts = Some(max);
        }
        if let Some(ms) = self.timeout_ms {
            config.gate.timeout = Some(Duration::from_millis(ms));
        }
    }
}

#[derive(Clone, Debug)]
/// Where the reference metadata comes from: either
///
/// - a JSON file, or
/// - the JSON itself, given inline.
pub enum MetadataSource {
    File(PathBuf),
    Inline(String),
}

impl FromStr for MetadataSource {
    type Err = String;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if let Ok(path) = fs::canonicalize(s) {
            Ok(MetadataSource::File(path))
        } else {
            Ok(MetadataSource::Inline(s.to_string()))
        }
    }
}

impl MetadataSource {
    pub fn read(&self) -> anyhow::Result<MetadataMessage> {
        match self {
            MetadataSource::File(path) => {
                let raw = fs::read_to_string(path)
                    .with_context(|| format!("failed to read metadata {}", path.display()))?;
                serde_json::from_str(&raw)
                    .with_context(|| format!("invalid metadata in {}", path.display()))
            }
            MetadataSource::Inline(json) => {
                serde_json::from_str(json).context("invalid inline metadata")
            }
        }
    }
}
