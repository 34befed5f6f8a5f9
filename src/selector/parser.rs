use regex::Regex;
use std::sync::OnceLock;
use thiserror::Error;

use super::{AttrOp, Compound, Predicate};

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SelectorError {
    #[error("Empty selector")]
    Empty,

    #[error("Unsupported selector '{selector}': {reason}")]
    Unsupported { selector: String, reason: String },

    #[error("Malformed selector '{selector}' at byte {position}: {reason}")]
    Malformed {
        selector: String,
        position: usize,
        reason: String,
    },
}

fn attribute_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(
            r#"^\s*([A-Za-z_][-A-Za-z0-9_:.]*)\s*(?:([*^$]?=)\s*(?:"([^"]*)"|'([^']*)'|([^\s"']+)))?\s*$"#,
        )
        .expect("attribute pattern is valid")
    })
}

/// Parse a selector string into its compound and optional `>> nth=N` index
pub(super) fn parse(source: &str) -> Result<(Compound, Option<usize>), SelectorError> {
    let trimmed = source.trim();
    if trimmed.is_empty() {
        return Err(SelectorError::Empty);
    }

    let (body, nth) = split_nth(trimmed)?;
    if body.is_empty() {
        return Err(SelectorError::Empty);
    }

    let compound = Parser::new(trimmed, body).compound()?;
    Ok((compound, nth))
}

fn split_nth(source: &str) -> Result<(&str, Option<usize>), SelectorError> {
    let Some((body, suffix)) = source.rsplit_once(">>") else {
        return Ok((source, None));
    };

    let index = suffix
        .trim()
        .strip_prefix("nth=")
        .and_then(|n| n.trim().parse::<usize>().ok())
        .ok_or_else(|| unsupported(source, "only '>> nth=N' may follow '>>'"))?;

    Ok((body.trim_end(), Some(index)))
}

fn unsupported(selector: &str, reason: impl Into<String>) -> SelectorError {
    SelectorError::Unsupported {
        selector: selector.to_string(),
        reason: reason.into(),
    }
}

fn is_ident_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '-' || c == '_'
}

fn unquote(s: &str) -> &str {
    let s = s.trim();
    for quote in ['"', '\''] {
        if let Some(inner) = s.strip_prefix(quote).and_then(|r| r.strip_suffix(quote)) {
            return inner;
        }
    }
    s
}

struct Parser<'a> {
    /// Full selector text, for error messages
    selector: &'a str,
    input: &'a str,
    pos: usize,
}

impl<'a> Parser<'a> {
    fn new(selector: &'a str, input: &'a str) -> Self {
        Self {
            selector,
            input,
            pos: 0,
        }
    }

    fn malformed(&self, reason: impl Into<String>) -> SelectorError {
        SelectorError::Malformed {
            selector: self.selector.to_string(),
            position: self.pos,
            reason: reason.into(),
        }
    }

    fn peek(&self) -> Option<char> {
        self.input[self.pos..].chars().next()
    }

    fn bump(&mut self) -> Option<char> {
        let c = self.peek()?;
        self.pos += c.len_utf8();
        Some(c)
    }

    fn ident(&mut self) -> Result<&'a str, SelectorError> {
        let start = self.pos;
        while self.peek().map(is_ident_char).unwrap_or(false) {
            self.bump();
        }
        if start == self.pos {
            return Err(self.malformed("expected an identifier"));
        }
        Ok(&self.input[start..self.pos])
    }

    fn expect(&mut self, wanted: char) -> Result<(), SelectorError> {
        match self.bump() {
            Some(c) if c == wanted => Ok(()),
            _ => Err(self.malformed(format!("expected '{}'", wanted))),
        }
    }

    /// Consume up to and including `close`, returning the text in between.
    /// Quoted text is skipped; parentheses nest when `close` is ')'.
    fn until_closing(&mut self, close: char) -> Result<&'a str, SelectorError> {
        let start = self.pos;
        let mut quote: Option<char> = None;
        let mut depth = 0usize;

        while let Some(c) = self.bump() {
            match quote {
                Some(q) if c == q => quote = None,
                Some(_) => {}
                None if c == '"' || c == '\'' => quote = Some(c),
                None if c == '(' && close == ')' => depth += 1,
                None if c == close => {
                    if depth == 0 {
                        return Ok(&self.input[start..self.pos - c.len_utf8()]);
                    }
                    depth -= 1;
                }
                None => {}
            }
        }

        Err(self.malformed(format!("unclosed '{}'", close)))
    }

    fn compound(&mut self) -> Result<Compound, SelectorError> {
        let mut compound = Compound::default();

        match self.peek() {
            Some('*') => {
                self.bump();
            }
            Some(c) if is_ident_char(c) => {
                compound.tag = Some(self.ident()?.to_ascii_lowercase());
            }
            _ => {}
        }

        while let Some(c) = self.peek() {
            match c {
                '#' => {
                    self.bump();
                    let id = self.ident()?;
                    compound.predicates.push(Predicate::Id(id.to_string()));
                }
                '.' => {
                    self.bump();
                    let class = self.ident()?;
                    compound.predicates.push(Predicate::Class(class.to_string()));
                }
                '[' => {
                    self.bump();
                    let inner = self.until_closing(']')?;
                    compound.predicates.push(self.attribute(inner)?);
                }
                ':' => {
                    self.bump();
                    let predicate = self.pseudo()?;
                    compound.predicates.push(predicate);
                }
                ',' => {
                    return Err(unsupported(
                        self.selector,
                        "selector groups must be listed as separate fallbacks",
                    ))
                }
                c if c.is_whitespace() || c == '>' || c == '+' || c == '~' => {
                    return Err(unsupported(self.selector, "combinators are not supported"))
                }
                other => return Err(self.malformed(format!("unexpected '{}'", other))),
            }
        }

        Ok(compound)
    }

    fn attribute(&self, inner: &str) -> Result<Predicate, SelectorError> {
        let caps = attribute_pattern()
            .captures(inner)
            .ok_or_else(|| self.malformed(format!("bad attribute test '[{}]'", inner)))?;

        let name = caps[1].to_ascii_lowercase();
        let value = caps
            .get(3)
            .or_else(|| caps.get(4))
            .or_else(|| caps.get(5))
            .map(|m| m.as_str().to_string())
            .unwrap_or_default();

        let op = match caps.get(2).map(|m| m.as_str()) {
            None => AttrOp::Exists,
            Some("=") => AttrOp::Equals(value),
            Some("*=") => AttrOp::Contains(value),
            Some("^=") => AttrOp::Prefix(value),
            Some("$=") => AttrOp::Suffix(value),
            Some(other) => return Err(unsupported(self.selector, format!("operator '{}'", other))),
        };

        Ok(Predicate::Attr { name, op })
    }

    fn pseudo(&mut self) -> Result<Predicate, SelectorError> {
        let name = self.ident()?.to_ascii_lowercase();
        match name.as_str() {
            "nth-of-type" => {
                self.expect('(')?;
                let inner = self.until_closing(')')?;
                let n = inner
                    .trim()
                    .parse::<usize>()
                    .ok()
                    .filter(|n| *n >= 1)
                    .ok_or_else(|| self.malformed("nth-of-type takes a positive integer"))?;
                Ok(Predicate::NthOfType(n))
            }
            "has" => {
                self.expect('(')?;
                let inner = self.until_closing(')')?;
                let nested = Parser::new(self.selector, inner.trim()).compound()?;
                Ok(Predicate::Has(Box::new(nested)))
            }
            "contains" => {
                self.expect('(')?;
                let inner = self.until_closing(')')?;
                Ok(Predicate::Contains(unquote(inner).to_string()))
            }
            other => Err(unsupported(self.selector, format!("pseudo-class ':{}'", other))),
        }
    }
}
