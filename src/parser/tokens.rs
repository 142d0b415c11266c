use quick_xml::escape::resolve_html5_entity;
use quick_xml::events::{BytesStart, BytesText, Event};
use quick_xml::Reader;
use tracing::warn;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Attribute {
    pub name: String,
    pub value: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Token {
    Text(String),
    /// Every attribute of the tag, in source order.
    StartTag(Vec<Attribute>),
    End,
}

/// Forward-only token stream over serialized markup.
///
/// Only text and opening tags surface as tokens. End tags, self-closing tags,
/// comments and declarations are skipped. A reader error ends the stream the
/// same way end of input does. Once `End` has been returned the stream stays
/// at `End`; a second pass needs a new `Tokenizer`.
pub struct Tokenizer<'a> {
    reader: Reader<&'a [u8]>,
    finished: bool,
    end_yielded: bool,
}

impl<'a> Tokenizer<'a> {
    pub fn new(markup: &'a str) -> Self {
        let mut reader = Reader::from_str(markup);
        let config = reader.config_mut();
        // Serialized HTML leaves void elements (<br>, <img>) unclosed.
        config.check_end_names = false;
        config.allow_unmatched_ends = true;
        Self {
            reader,
            finished: false,
            end_yielded: false,
        }
    }

    pub fn next_token(&mut self) -> Token {
        if self.finished {
            return Token::End;
        }
        loop {
            match self.reader.read_event() {
                Ok(Event::Start(e)) => return Token::StartTag(attributes(&e)),
                Ok(Event::Text(e)) => return Token::Text(decode_text(&e)),
                Ok(Event::CData(e)) => {
                    return Token::Text(String::from_utf8_lossy(&e).into_owned())
                }
                Ok(Event::Eof) => break,
                Err(err) => {
                    warn!(
                        position = self.reader.buffer_position(),
                        error = %err,
                        "Markup tokenizer stopped early"
                    );
                    break;
                }
                Ok(_) => {}
            }
        }
        self.finished = true;
        Token::End
    }
}

/// Yields every token up to and including the first `End`, then `None`.
impl Iterator for Tokenizer<'_> {
    type Item = Token;

    fn next(&mut self) -> Option<Token> {
        if self.end_yielded {
            return None;
        }
        let token = self.next_token();
        if token == Token::End {
            self.end_yielded = true;
        }
        Some(token)
    }
}

fn decode_text(e: &BytesText) -> String {
    e.unescape_with(resolve_html5_entity)
        .map(|t| t.into_owned())
        .unwrap_or_else(|_| String::from_utf8_lossy(e).into_owned())
}

fn attributes(e: &BytesStart) -> Vec<Attribute> {
    e.html_attributes()
        .with_checks(false)
        .filter_map(|attr| attr.ok())
        .map(|attr| Attribute {
            name: String::from_utf8_lossy(attr.key.as_ref()).into_owned(),
            value: attr
                .unescape_value_with(resolve_html5_entity)
                .map(|v| v.into_owned())
                .unwrap_or_else(|_| String::from_utf8_lossy(&attr.value).into_owned()),
        })
        .collect()
}
