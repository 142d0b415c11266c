pub mod classify;
pub mod date;
pub mod root;
pub mod tokens;

use std::path::Path;

use scraper::Html;
use tracing::info;

use crate::config::ClassifierConfig;
use crate::error::ParseError;
use crate::model::ActivityRecord;
use classify::Classifier;
use tokens::Tokenizer;

pub fn read_document(path: &Path) -> Result<String, ParseError> {
    std::fs::read_to_string(path).map_err(|source| ParseError::Io {
        path: path.to_path_buf(),
        source,
    })
}

/// Read → locate root → serialize → tokenize → classify.
pub fn parse_file(path: &Path, config: &ClassifierConfig) -> Result<Vec<ActivityRecord>, ParseError> {
    let markup = read_document(path)?;
    info!("Read {} ({} bytes)", path.display(), markup.len());
    parse_document(&markup, config)
}

pub fn parse_document(markup: &str, config: &ClassifierConfig) -> Result<Vec<ActivityRecord>, ParseError> {
    let doc = Html::parse_document(markup);
    let root = root::find_root(&doc, &config.root_tag)?;
    let serialized = root.html();
    info!("Located <{}> ({} bytes serialized)", config.root_tag, serialized.len());

    let records = Classifier::new(config).run(Tokenizer::new(&serialized));
    info!("Extracted {} records", records.len());
    Ok(records)
}
