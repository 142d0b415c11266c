use anyhow::Result;
use config::{Config, Environment};
use serde::Deserialize;

pub const DEFAULT_VERBS: &[&str] = &[
    "Listened to",
    "Searched for",
    "Visited",
    "Used",
    "Viewed",
    "Watched",
];
pub const DEFAULT_BOUNDARY_MARKER: &str = "mdl-typography--title";
pub const DEFAULT_CHANNEL_VERB: &str = "Watched";
pub const DEFAULT_ROOT_TAG: &str = "body";

const DEFAULT_DB_PATH: &str = "data/takeout.sqlite";
const DEFAULT_MAX_ITEM_LEN: usize = 1000;

/// Runtime settings. Defaults are overridden by `TAKEOUT_*` environment variables
/// (e.g. `TAKEOUT_DB_PATH`), and CLI flags override both.
#[derive(Debug, Clone, Deserialize)]
pub struct Settings {
    pub db_path: String,
    pub max_item_len: usize,
    pub root_tag: String,
    pub boundary_marker: String,
}

impl Settings {
    pub fn load() -> Result<Self> {
        Self::from_env(env())
    }

    fn from_env(env: Environment) -> Result<Self> {
        let settings = Config::builder()
            .set_default("db_path", DEFAULT_DB_PATH)?
            .set_default("max_item_len", DEFAULT_MAX_ITEM_LEN as i64)?
            .set_default("root_tag", DEFAULT_ROOT_TAG)?
            .set_default("boundary_marker", DEFAULT_BOUNDARY_MARKER)?
            .add_source(env)
            .build()?
            .try_deserialize()?;
        Ok(settings)
    }

    pub fn classifier(&self) -> ClassifierConfig {
        ClassifierConfig {
            boundary_marker: self.boundary_marker.clone(),
            root_tag: self.root_tag.clone(),
            ..ClassifierConfig::default()
        }
    }
}

fn env() -> Environment {
    Environment::with_prefix("TAKEOUT").try_parsing(true)
}

/// The parse-only subset of `Settings`. Store keys are never read, so a bad
/// `TAKEOUT_MAX_ITEM_LEN` cannot break a plain parse.
#[derive(Debug, Deserialize)]
struct ParseSettings {
    root_tag: String,
    boundary_marker: String,
}

/// Immutable parse configuration, built once and borrowed by the classifier
/// for the whole run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClassifierConfig {
    /// Canonical action verbs, in scan order.
    pub verbs: Vec<String>,
    /// Attribute value on a start tag that opens the next record.
    pub boundary_marker: String,
    /// The only verb whose item is followed by a channel field.
    pub channel_verb: String,
    /// Tag name of the content root element.
    pub root_tag: String,
}

impl ClassifierConfig {
    /// Defaults with `TAKEOUT_ROOT_TAG` / `TAKEOUT_BOUNDARY_MARKER` applied.
    pub fn load() -> Result<Self> {
        Self::from_env(env())
    }

    fn from_env(env: Environment) -> Result<Self> {
        let parse: ParseSettings = Config::builder()
            .set_default("root_tag", DEFAULT_ROOT_TAG)?
            .set_default("boundary_marker", DEFAULT_BOUNDARY_MARKER)?
            .add_source(env)
            .build()?
            .try_deserialize()?;
        Ok(Self {
            root_tag: parse.root_tag,
            boundary_marker: parse.boundary_marker,
            ..Self::default()
        })
    }
}

impl Default for ClassifierConfig {
    fn default() -> Self {
        Self {
            verbs: DEFAULT_VERBS.iter().map(|v| v.to_string()).collect(),
            boundary_marker: DEFAULT_BOUNDARY_MARKER.to_string(),
            channel_verb: DEFAULT_CHANNEL_VERB.to_string(),
            root_tag: DEFAULT_ROOT_TAG.to_string(),
        }
    }
}
