// src/ingest/jsonpath.rs
//! Minimal path queries over `serde_json::Value`.
//!
//! Supported forms, all of which may be mixed:
//! - `$.main.temp` / `main.temp` (leading `$` is optional)
//! - `$.list[0].value`, `$.list[-1]` (negative indexes count from the end)
//! - `$['key with spaces']`, `$["a.b"]`
//! - `$.list.0.value` (numeric dot segments index into arrays)
//!
//! Wildcards, filters and recursive descent are not supported.

use serde_json::Value;

use crate::error::FetchError;

#[derive(Debug, Clone, PartialEq, Eq)]
enum Segment {
    /// Dot segment: object key, or array index when numeric.
    Name(String),
    /// Quoted bracket segment: always an object key.
    Key(String),
    /// Bracketed integer.
    Index(i64),
}

/// A parsed path query.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JsonPath {
    segments: Vec<Segment>,
}

impl JsonPath {
    pub fn parse(path: &str) -> Result<Self, FetchError> {
        let segments = Parser::new(path).parse()?;
        Ok(Self { segments })
    }

    /// Resolve against `doc`. `None` means the path does not exist.
    pub fn select<'a>(&self, doc: &'a Value) -> Option<&'a Value> {
        self.segments
            .iter()
            .try_fold(doc, |cur, seg| match (seg, cur) {
                (Segment::Name(n), Value::Object(map)) => map.get(n),
                (Segment::Name(n), Value::Array(items)) => {
                    n.parse::<usize>().ok().and_then(|i| items.get(i))
                }
                (Segment::Key(k), Value::Object(map)) => map.get(k),
                (Segment::Index(i), Value::Array(items)) => {
                    let idx = if *i < 0 {
                        items.len().checked_sub(i.unsigned_abs() as usize)?
                    } else {
                        *i as usize
                    };
                    items.get(idx)
                }
                _ => None,
            })
    }
}

/// Parse `path` and resolve it, mapping a miss to [`FetchError::PathNotFound`].
pub fn select_required<'a>(doc: &'a Value, path: &str) -> Result<&'a Value, FetchError> {
    JsonPath::parse(path)?
        .select(doc)
        .ok_or_else(|| FetchError::PathNotFound(path.to_string()))
}

struct Parser<'a> {
    src: &'a str,
    pos: usize,
}

impl<'a> Parser<'a> {
    fn new(src: &'a str) -> Self {
        Self { src, pos: 0 }
    }

    fn err(&self, reason: impl Into<String>) -> FetchError {
        FetchError::InvalidPath {
            path: self.src.to_string(),
            reason: reason.into(),
        }
    }

    fn peek(&self) -> Option<char> {
        self.src[self.pos..].chars().next()
    }

    fn bump(&mut self) -> Option<char> {
        let c = self.peek()?;
        self.pos += c.len_utf8();
        Some(c)
    }

    fn parse(mut self) -> Result<Vec<Segment>, FetchError> {
        if self.src.trim().is_empty() {
            return Err(self.err("empty path"));
        }
        let mut out = Vec::new();

        if self.peek() == Some('$') {
            self.bump();
        } else if !matches!(self.peek(), Some('.') | Some('[')) {
            // gjson-style bare leading key: `main.temp`
            out.push(self.name()?);
        }

        while let Some(c) = self.peek() {
            match c {
                '.' => {
                    self.bump();
                    out.push(self.name()?);
                }
                '[' => {
                    self.bump();
                    out.push(self.bracket()?);
                }
                other => return Err(self.err(format!("unexpected '{other}' at {}", self.pos))),
            }
        }
        Ok(out)
    }

    fn name(&mut self) -> Result<Segment, FetchError> {
        let start = self.pos;
        while let Some(c) = self.peek() {
            if c == '.' || c == '[' || c == ']' {
                break;
            }
            self.bump();
        }
        let name = &self.src[start..self.pos];
        if name.is_empty() {
            return Err(self.err(format!("empty segment at {start}")));
        }
        if name == "*" {
            return Err(self.err("wildcards are not supported"));
        }
        Ok(Segment::Name(name.to_string()))
    }

    fn bracket(&mut self) -> Result<Segment, FetchError> {
        let seg = match self.peek() {
            Some(q @ ('\'' | '"')) => {
                self.bump();
                let start = self.pos;
                loop {
                    match self.bump() {
                        Some(c) if c == q => break,
                        Some(_) => {}
                        None => return Err(self.err("unterminated quoted key")),
                    }
                }
                Segment::Key(self.src[start..self.pos - q.len_utf8()].to_string())
            }
            _ => {
                let start = self.pos;
                while matches!(self.peek(), Some(c) if c != ']') {
                    self.bump();
                }
                let raw = self.src[start..self.pos].trim();
                let idx = raw
                    .parse::<i64>()
                    .map_err(|_| self.err(format!("invalid index '{raw}'")))?;
                Segment::Index(idx)
            }
        };
        match self.bump() {
            Some(']') => Ok(seg),
            _ => Err(self.err("expected ']'")),
        }
    }
}
