// entstring.rs — tokenizer and parser for the map's entity text block
//
// The text is a sequence of `{ "key" "value" ... }` records. Parsing stops at
// the first NUL byte, so the reserved tail of the lump never reaches the
// tokenizer.

use crate::common::com_warn;
use crate::error::EntityParseError;

// ============================================================
// Tokenizer (COM_Parse over a borrowed buffer)
// ============================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Token<'a> {
    pub text: &'a str,
    /// Quoted tokens never act as braces.
    pub quoted: bool,
    pub line: usize,
}

impl Token<'_> {
    fn is_bare(&self, s: &str) -> bool {
        !self.quoted && self.text == s
    }
}

pub struct Tokenizer<'a> {
    data: &'a str,
    pos: usize,
    line: usize,
}

impl<'a> Tokenizer<'a> {
    pub fn new(data: &'a str) -> Self {
        let end = data.find('\0').unwrap_or(data.len());
        Self {
            data: &data[..end],
            pos: 0,
            line: 1,
        }
    }

    pub fn line(&self) -> usize {
        self.line
    }

    fn bytes(&self) -> &'a [u8] {
        self.data.as_bytes()
    }

    fn skip_garbage(&mut self) {
        let bytes = self.bytes();
        loop {
            // skip whitespace
            while self.pos < bytes.len() && bytes[self.pos] <= b' ' {
                if bytes[self.pos] == b'\n' {
                    self.line += 1;
                }
                self.pos += 1;
            }

            // skip // comments
            if self.pos + 1 < bytes.len() && bytes[self.pos] == b'/' && bytes[self.pos + 1] == b'/' {
                while self.pos < bytes.len() && bytes[self.pos] != b'\n' {
                    self.pos += 1;
                }
                continue;
            }
            break;
        }
    }

    /// Next token, `Ok(None)` at end of text.
    pub fn next_token(&mut self) -> Result<Option<Token<'a>>, EntityParseError> {
        self.skip_garbage();
        let bytes = self.bytes();
        if self.pos >= bytes.len() {
            return Ok(None);
        }

        let line = self.line;

        // handle quoted strings
        if bytes[self.pos] == b'"' {
            let start = self.pos + 1;
            let mut end = start;
            while end < bytes.len() && bytes[end] != b'"' {
                if bytes[end] == b'\n' {
                    self.line += 1;
                }
                end += 1;
            }
            if end >= bytes.len() {
                return Err(EntityParseError::UnterminatedQuote { line });
            }
            self.pos = end + 1;
            return Ok(Some(Token {
                text: &self.data[start..end],
                quoted: true,
                line,
            }));
        }

        // parse regular word
        let start = self.pos;
        while self.pos < bytes.len() && bytes[self.pos] > b' ' {
            self.pos += 1;
        }
        Ok(Some(Token {
            text: &self.data[start..self.pos],
            quoted: false,
            line,
        }))
    }
}

// ============================================================
// Entity dictionaries
// ============================================================

/// Raw key/value pairs of one entity, in text order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct EntityDict {
    /// Line of the opening brace.
    pub line: usize,
    pairs: Vec<(String, String)>,
}

impl EntityDict {
    pub fn new(line: usize) -> Self {
        Self {
            line,
            pairs: Vec::new(),
        }
    }

    /// Adds a pair. A repeated key keeps the later value.
    pub fn insert(&mut self, key: &str, value: &str) {
        if let Some(slot) = self.pairs.iter_mut().find(|(k, _)| k == key) {
            com_warn(&format!(
                "entity on line {} repeats key \"{}\", keeping \"{}\"\n",
                self.line, key, value
            ));
            slot.1 = value.to_string();
            return;
        }
        self.pairs.push((key.to_string(), value.to_string()));
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.pairs
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.pairs.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    pub fn len(&self) -> usize {
        self.pairs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pairs.is_empty()
    }
}

/// Parse one entity after its opening brace.
fn parse_entity(tok: &mut Tokenizer<'_>, line: usize) -> Result<EntityDict, EntityParseError> {
    let mut dict = EntityDict::new(line);
    loop {
        let key = match tok.next_token()? {
            Some(t) => t,
            None => return Err(EntityParseError::UnexpectedEof { line }),
        };
        if key.is_bare("}") {
            return Ok(dict);
        }

        let value = match tok.next_token()? {
            Some(t) => t,
            None => return Err(EntityParseError::UnexpectedEof { line }),
        };
        if value.is_bare("}") {
            return Err(EntityParseError::MissingValue {
                key: key.text.to_string(),
                line: key.line,
            });
        }

        dict.insert(key.text, value.text);
    }
}

/// Split entity text into dictionaries. Any structural error rejects the
/// whole text; no partial list is returned.
pub fn parse_entities(text: &str) -> Result<Vec<EntityDict>, EntityParseError> {
    let mut tok = Tokenizer::new(text);
    let mut ents = Vec::new();

    while let Some(t) = tok.next_token()? {
        if !t.is_bare("{") {
            return Err(EntityParseError::ExpectedOpenBrace {
                line: t.line,
                found: t.text.to_string(),
            });
        }
        ents.push(parse_entity(&mut tok, t.line)?);
    }

    Ok(ents)
}

// ============================================================
// Tests
// ============================================================
