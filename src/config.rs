use std::{fs, path::Path};

use anyhow::Context;
use once_cell::sync::Lazy;
use serde::Deserialize;
use url::Url;

use crate::document::Selector;
use crate::gate::GateConfig;
use crate::page::{DEFAULT_SERVICE, PaperPages};

/// Where the annotation pass looks in the rendered document.
#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Selectors {
    pub paragraphs: Vec<Selector>,
    /// Searched in this order; the reference list first, then the hover boxes.
    pub bib_entries: Vec<Selector>,
    pub author_list: Selector,
    pub metadata: Selector,
    /// Present once the document has finished rendering.
    pub sentinel: Selector,
}

impl Default for Selectors {
    fn default() -> Self {
        Selectors {
            paragraphs: vec![Selector::class("ltx_p")],
            bib_entries: vec![
                Selector::class("ltx_bibitem"),
                Selector::id("cite-hover-boxes-container")
                    .descendant(Selector::class("dt-hover-box")),
            ],
            author_list: Selector::class("ltx_personname"),
            metadata: Selector::class("engrafo-metadata-custom"),
            sentinel: Selector::tag("dt-article"),
        }
    }
}

#[derive(Debug, Clone)]
pub struct Config {
    /// Base URL of the metadata service hosting paper pages.
    pub service: Url,
    /// Label of the link back to the paper's page.
    pub service_name: String,
    pub selectors: Selectors,
    pub gate: GateConfig,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            service: DEFAULT_SERVICE_URL.clone(),
            service_name: "Semantic Scholar".to_string(),
            selectors: Selectors::default(),
            gate: GateConfig::default(),
        }
    }
}

static DEFAULT_SERVICE_URL: Lazy<Url> = Lazy::new(|| Url::parse(DEFAULT_SERVICE).unwrap());

/// On-disk configuration. Every field is optional and overrides the default.
#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct ConfigFile {
    service: Option<Url>,
    service_name: Option<String>,
    selectors: Option<Selectors>,
    gate: Option<GateConfig>,
}

impl Config {
    /// Defaults, overlaid with the JSON file at `path` when one is given.
    pub fn load(path: Option<&Path>) -> anyhow::Result<Config> {
        let mut config = Config::default();
        let Some(path) = path else {
            return Ok(config);
        };

        let raw = fs::read_to_string(path)
            .with_context(|| format!("failed to read config file {}", path.display()))?;
        let file: ConfigFile = serde_json::from_str(&raw)
            .with_context(|| format!("invalid config file {}", path.display()))?;

        if let Some(service) = file.service {
            config.service = service;
        }
        if let Some(name) = file.service_name {
            config.service_name = name;
        }
        if let Some(selectors) = file.selectors {
            config.selectors = selectors;
        }
        if let Some(gate) = file.gate {
            config.gate = gate;
        }
        Ok(config)
    }

    pub fn pages(&self) -> PaperPages {
        PaperPages::new(&self.service)
    }
}
