use tracing::debug;

use super::date;
use super::tokens::{Attribute, Token};
use crate::config::ClassifierConfig;
use crate::model::ActivityRecord;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParserState {
    AwaitingTitle,
    AwaitingAction,
    AwaitingItem,
    AwaitingChannel,
    AwaitingDate,
    AwaitingBoundary,
}

/// Outcome of matching action text against the verb list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ActionMatch {
    /// The text is exactly a verb; the item comes in the next text token.
    Exact(String),
    /// The text contains a verb; the rest of the text is the item.
    Contains { verb: String, item: String },
    None,
}

/// Match action text against the verbs in declared order.
///
/// The scan always runs the whole list. A later exact match overwrites an
/// earlier one, and while no exact match has been seen each containing verb
/// overwrites the previous one.
pub fn match_action(text: &str, verbs: &[String]) -> ActionMatch {
    let mut exact: Option<&str> = None;
    let mut contains: Option<(&str, &str)> = None;

    for verb in verbs.iter().map(String::as_str) {
        if text == verb {
            exact = Some(verb);
        }
        if exact.is_none() && text.contains(verb) {
            let rest = text.strip_prefix(verb).unwrap_or(text);
            contains = Some((verb, rest.trim()));
        }
    }

    match (exact, contains) {
        (Some(verb), _) => ActionMatch::Exact(verb.to_string()),
        (None, Some((verb, item))) => ActionMatch::Contains {
            verb: verb.to_string(),
            item: item.to_string(),
        },
        (None, None) => ActionMatch::None,
    }
}

/// Collects finished records in document order.
#[derive(Debug, Default)]
pub struct RecordEmitter {
    records: Vec<ActivityRecord>,
}

impl RecordEmitter {
    /// Move the accumulated fields into a record and leave `acc` empty.
    pub fn emit(&mut self, acc: &mut ActivityRecord) {
        self.records.push(std::mem::take(acc));
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn into_records(self) -> Vec<ActivityRecord> {
        self.records
    }
}

/// State machine that maps a token stream onto activity records.
pub struct Classifier<'c> {
    config: &'c ClassifierConfig,
    state: ParserState,
    acc: ActivityRecord,
    emitter: RecordEmitter,
}

impl<'c> Classifier<'c> {
    pub fn new(config: &'c ClassifierConfig) -> Self {
        Self {
            config,
            state: ParserState::AwaitingTitle,
            acc: ActivityRecord::default(),
            emitter: RecordEmitter::default(),
        }
    }

    pub fn state(&self) -> ParserState {
        self.state
    }

    /// Feed one token. Returns `false` once the stream has ended.
    pub fn feed(&mut self, token: Token) -> bool {
        match token {
            Token::Text(content) => self.on_text(&content),
            Token::StartTag(attrs) => self.on_start_tag(&attrs),
            Token::End => return false,
        }
        true
    }

    /// Drive the classifier over a whole stream. A record still in progress
    /// when the stream ends is dropped.
    pub fn run<I>(mut self, tokens: I) -> Vec<ActivityRecord>
    where
        I: IntoIterator<Item = Token>,
    {
        for token in tokens {
            if !self.feed(token) {
                break;
            }
        }
        let state = self.state();
        if state != ParserState::AwaitingBoundary && self.acc != ActivityRecord::default() {
            debug!(?state, "Dropping partial record at end of stream");
        }
        debug!(records = self.emitter.len(), "Token stream ended");
        self.emitter.into_records()
    }

    fn on_text(&mut self, content: &str) {
        let text = content.trim();
        self.state = match self.state {
            ParserState::AwaitingTitle => {
                self.acc.title = text.to_string();
                ParserState::AwaitingAction
            }
            ParserState::AwaitingAction => match match_action(text, &self.config.verbs) {
                ActionMatch::Exact(verb) => {
                    self.acc.action = verb;
                    ParserState::AwaitingItem
                }
                ActionMatch::Contains { verb, item } => {
                    self.acc.action = verb;
                    self.acc.item = item;
                    ParserState::AwaitingDate
                }
                ActionMatch::None => {
                    debug!(text, "No action verb matched");
                    ParserState::AwaitingDate
                }
            },
            ParserState::AwaitingItem => {
                self.acc.item = text.to_string();
                if self.acc.action == self.config.channel_verb {
                    ParserState::AwaitingChannel
                } else {
                    ParserState::AwaitingDate
                }
            }
            ParserState::AwaitingChannel => {
                self.acc.channel = Some(text.to_string());
                ParserState::AwaitingDate
            }
            ParserState::AwaitingDate => {
                self.acc.date = date::normalize(text);
                if self.acc.date.is_empty() {
                    debug!(text, "Unrecognized date, keeping record with empty date");
                }
                self.emitter.emit(&mut self.acc);
                ParserState::AwaitingBoundary
            }
            ParserState::AwaitingBoundary => ParserState::AwaitingBoundary,
        };
    }

    fn on_start_tag(&mut self, attrs: &[Attribute]) {
        if self.state != ParserState::AwaitingBoundary {
            return;
        }
        let marker = self.config.boundary_marker.as_str();
        let mut boundary = false;
        for attr in attrs {
            if attr.value == marker {
                debug!(attribute = %attr.name, "Record boundary");
                boundary = true;
            }
        }
        if boundary {
            self.state = ParserState::AwaitingTitle;
        }
    }
}
