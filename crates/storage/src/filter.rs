// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Flattened event view and the SQL-ish predicate language over it.
//!
//! `FlatEvent` is the query surface: message/status/life sub-fields hoisted
//! next to the envelope columns, array fields rendered as their JSON text
//! (so `delivered_to LIKE '%luna%'` works the way subscriptions expect).
//!
//! Predicates: `field op literal` with `=`, `!=`, `<`, `<=`, `>`, `>=` and
//! `LIKE` (`%` / `_` wildcards), combined with `AND`, `OR`, `NOT` and
//! parentheses. Keywords are case-insensitive; strings are single-quoted;
//! `null` is a literal.

use hcom_core::{Event, EventData};
use std::fmt;
use thiserror::Error;

/// Errors from predicate parsing
#[derive(Debug, Error, PartialEq)]
pub enum FilterError {
    #[error("unexpected end of expression")]
    UnexpectedEnd,
    #[error("unexpected token '{0}'")]
    UnexpectedToken(String),
    #[error("unknown field '{0}'")]
    UnknownField(String),
    #[error("unterminated string literal")]
    UnterminatedString,
}

/// Queryable fields of the flattened view
const FIELDS: &[&str] = &[
    "id",
    "ts",
    "type",
    "instance",
    "from",
    "text",
    "scope",
    "delivered_to",
    "mentions",
    "intent",
    "thread",
    "reply_to",
    "sender_kind",
    "status",
    "context",
    "detail",
    "action",
    "by",
    "reason",
    "batch_id",
];

/// Fields whose flattened form is a JSON array; equality against them is
/// almost always a bug (callers want `LIKE '%name%'`).
const ARRAY_FIELDS: &[&str] = &["delivered_to", "mentions"];

/// A field value in the flattened view
#[derive(Debug, Clone, PartialEq)]
pub enum FieldValue {
    Null,
    Int(i64),
    Str(String),
}

/// Flattened, queryable form of one event.
#[derive(Debug, Clone)]
pub struct FlatEvent<'a> {
    event: &'a Event,
}

impl<'a> FlatEvent<'a> {
    pub fn new(event: &'a Event) -> Self {
        Self { event }
    }

    pub fn get(&self, field: &str) -> FieldValue {
        let event = self.event;
        match field {
            "id" => FieldValue::Int(event.id),
            "ts" => FieldValue::Str(event.ts.to_rfc3339()),
            "type" => FieldValue::Str(event.kind().as_str().to_string()),
            "instance" => FieldValue::Str(event.instance.clone()),
            _ => match &event.data {
                EventData::Message(m) => match field {
                    "from" => FieldValue::Str(m.from.clone()),
                    "text" => FieldValue::Str(m.text.clone()),
                    "scope" => json_enum(&m.scope),
                    "delivered_to" => json_array(&m.delivered_to),
                    "mentions" => json_array(&m.mentions),
                    "intent" => json_enum(&m.intent),
                    "thread" => opt_str(m.thread.as_deref()),
                    "reply_to" => m.reply_to.map_or(FieldValue::Null, FieldValue::Int),
                    "sender_kind" => json_enum(&m.sender_kind),
                    _ => FieldValue::Null,
                },
                EventData::Status(s) => match field {
                    "status" => FieldValue::Str(s.status.as_str().to_string()),
                    "context" => FieldValue::Str(s.context.clone()),
                    "detail" => opt_str(s.detail.as_deref()),
                    _ => FieldValue::Null,
                },
                EventData::Life(l) => match field {
                    "action" => json_enum(&l.action),
                    "by" => FieldValue::Str(l.by.clone()),
                    "reason" => opt_str(l.reason.as_deref()),
                    "batch_id" => opt_str(l.batch_id.as_deref()),
                    _ => FieldValue::Null,
                },
            },
        }
    }
}

fn opt_str(value: Option<&str>) -> FieldValue {
    value.map_or(FieldValue::Null, |s| FieldValue::Str(s.to_string()))
}

fn json_array(items: &[String]) -> FieldValue {
    FieldValue::Str(serde_json::to_string(items).unwrap_or_default())
}

fn json_enum<T: serde::Serialize>(value: &T) -> FieldValue {
    match serde_json::to_value(value) {
        Ok(serde_json::Value::String(s)) => FieldValue::Str(s),
        _ => FieldValue::Null,
    }
}

/// Comparison operators
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Op {
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
    Like,
}

/// Literal values in predicates
#[derive(Debug, Clone, PartialEq)]
pub enum Literal {
    Null,
    Int(i64),
    Str(String),
}

/// A parsed predicate over [`FlatEvent`]
#[derive(Debug, Clone, PartialEq)]
pub enum Predicate {
    Compare { field: String, op: Op, value: Literal },
    And(Box<Predicate>, Box<Predicate>),
    Or(Box<Predicate>, Box<Predicate>),
    Not(Box<Predicate>),
}

impl Predicate {
    /// Evaluate against one event.
    pub fn matches(&self, event: &Event) -> bool {
        self.eval(&FlatEvent::new(event))
    }

    fn eval(&self, flat: &FlatEvent<'_>) -> bool {
        match self {
            Predicate::And(a, b) => a.eval(flat) && b.eval(flat),
            Predicate::Or(a, b) => a.eval(flat) || b.eval(flat),
            Predicate::Not(inner) => !inner.eval(flat),
            Predicate::Compare { field, op, value } => compare(&flat.get(field), *op, value),
        }
    }

    /// Array fields this predicate compares with `=` — surfaced as a
    /// warning at subscription create time (callers almost always want
    /// `LIKE '%name%'`).
    pub fn equality_on_array_fields(&self) -> Vec<String> {
        let mut found = Vec::new();
        self.collect_array_equality(&mut found);
        found
    }

    fn collect_array_equality(&self, found: &mut Vec<String>) {
        match self {
            Predicate::And(a, b) | Predicate::Or(a, b) => {
                a.collect_array_equality(found);
                b.collect_array_equality(found);
            }
            Predicate::Not(inner) => inner.collect_array_equality(found),
            Predicate::Compare { field, op, .. } => {
                if matches!(op, Op::Eq | Op::Ne)
                    && ARRAY_FIELDS.contains(&field.as_str())
                    && !found.contains(field)
                {
                    found.push(field.clone());
                }
            }
        }
    }
}

impl fmt::Display for Predicate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Predicate::And(a, b) => write!(f, "({a} AND {b})"),
            Predicate::Or(a, b) => write!(f, "({a} OR {b})"),
            Predicate::Not(inner) => write!(f, "NOT {inner}"),
            Predicate::Compare { field, op, value } => {
                let op = match op {
                    Op::Eq => "=",
                    Op::Ne => "!=",
                    Op::Lt => "<",
                    Op::Le => "<=",
                    Op::Gt => ">",
                    Op::Ge => ">=",
                    Op::Like => "LIKE",
                };
                match value {
                    Literal::Null => write!(f, "{field} {op} null"),
                    Literal::Int(n) => write!(f, "{field} {op} {n}"),
                    Literal::Str(s) => write!(f, "{field} {op} '{s}'"),
                }
            }
        }
    }
}

fn compare(value: &FieldValue, op: Op, literal: &Literal) -> bool {
    match op {
        Op::Like => {
            let (FieldValue::Str(s), Literal::Str(pattern)) = (value, literal) else {
                return false;
            };
            like_match(pattern, s)
        }
        Op::Eq | Op::Ne => {
            let equal = match (value, literal) {
                (FieldValue::Null, Literal::Null) => true,
                (FieldValue::Int(a), Literal::Int(b)) => a == b,
                (FieldValue::Str(a), Literal::Str(b)) => a == b,
                // Numeric comparison against a numeric-looking column
                (FieldValue::Str(a), Literal::Int(b)) => a.parse::<i64>() == Ok(*b),
                _ => false,
            };
            if op == Op::Eq {
                equal
            } else {
                !equal
            }
        }
        Op::Lt | Op::Le | Op::Gt | Op::Ge => {
            let ordering = match (value, literal) {
                (FieldValue::Int(a), Literal::Int(b)) => a.cmp(b),
                (FieldValue::Str(a), Literal::Str(b)) => a.as_str().cmp(b.as_str()),
                _ => return false,
            };
            match op {
                Op::Lt => ordering.is_lt(),
                Op::Le => ordering.is_le(),
                Op::Gt => ordering.is_gt(),
                Op::Ge => ordering.is_ge(),
                _ => false,
            }
        }
    }
}

/// SQL LIKE: `%` matches any run, `_` matches one character.
fn like_match(pattern: &str, text: &str) -> bool {
    let p: Vec<char> = pattern.chars().collect();
    let t: Vec<char> = text.chars().collect();

    // Iterative matcher with backtracking on the last `%`
    let (mut pi, mut ti) = (0usize, 0usize);
    let (mut star_pi, mut star_ti) = (usize::MAX, 0usize);

    while ti < t.len() {
        if pi < p.len() && (p[pi] == '_' || p[pi] == t[ti]) {
            pi += 1;
            ti += 1;
        } else if pi < p.len() && p[pi] == '%' {
            star_pi = pi;
            star_ti = ti;
            pi += 1;
        } else if star_pi != usize::MAX {
            pi = star_pi + 1;
            star_ti += 1;
            ti = star_ti;
        } else {
            return false;
        }
    }
    while pi < p.len() && p[pi] == '%' {
        pi += 1;
    }
    pi == p.len()
}

// --- parser ---

#[derive(Debug, Clone, PartialEq)]
enum Token {
    Ident(String),
    Str(String),
    Int(i64),
    Op(Op),
    LParen,
    RParen,
    And,
    Or,
    Not,
    Null,
}

fn tokenize(input: &str) -> Result<Vec<Token>, FilterError> {
    let mut tokens = Vec::new();
    let chars: Vec<char> = input.chars().collect();
    let mut i = 0;

    while i < chars.len() {
        let c = chars[i];
        match c {
            ' ' | '\t' | '\n' => i += 1,
            '(' => {
                tokens.push(Token::LParen);
                i += 1;
            }
            ')' => {
                tokens.push(Token::RParen);
                i += 1;
            }
            '\'' => {
                let mut s = String::new();
                i += 1;
                loop {
                    match chars.get(i) {
                        // '' escapes a quote inside the literal
                        Some('\'') if chars.get(i + 1) == Some(&'\'') => {
                            s.push('\'');
                            i += 2;
                        }
                        Some('\'') => {
                            i += 1;
                            break;
                        }
                        Some(&ch) => {
                            s.push(ch);
                            i += 1;
                        }
                        None => return Err(FilterError::UnterminatedString),
                    }
                }
                tokens.push(Token::Str(s));
            }
            '=' => {
                tokens.push(Token::Op(Op::Eq));
                i += if chars.get(i + 1) == Some(&'=') { 2 } else { 1 };
            }
            '!' if chars.get(i + 1) == Some(&'=') => {
                tokens.push(Token::Op(Op::Ne));
                i += 2;
            }
            '<' if chars.get(i + 1) == Some(&'>') => {
                tokens.push(Token::Op(Op::Ne));
                i += 2;
            }
            '<' if chars.get(i + 1) == Some(&'=') => {
                tokens.push(Token::Op(Op::Le));
                i += 2;
            }
            '<' => {
                tokens.push(Token::Op(Op::Lt));
                i += 1;
            }
            '>' if chars.get(i + 1) == Some(&'=') => {
                tokens.push(Token::Op(Op::Ge));
                i += 2;
            }
            '>' => {
                tokens.push(Token::Op(Op::Gt));
                i += 1;
            }
            '-' | '0'..='9' => {
                let start = i;
                i += 1;
                while chars.get(i).is_some_and(|c| c.is_ascii_digit()) {
                    i += 1;
                }
                let text: String = chars[start..i].iter().collect();
                let n = text
                    .parse::<i64>()
                    .map_err(|_| FilterError::UnexpectedToken(text.clone()))?;
                tokens.push(Token::Int(n));
            }
            c if c.is_ascii_alphabetic() || c == '_' => {
                let start = i;
                while chars
                    .get(i)
                    .is_some_and(|c| c.is_ascii_alphanumeric() || *c == '_')
                {
                    i += 1;
                }
                let word: String = chars[start..i].iter().collect();
                match word.to_ascii_uppercase().as_str() {
                    "AND" => tokens.push(Token::And),
                    "OR" => tokens.push(Token::Or),
                    "NOT" => tokens.push(Token::Not),
                    "LIKE" => tokens.push(Token::Op(Op::Like)),
                    "NULL" => tokens.push(Token::Null),
                    _ => tokens.push(Token::Ident(word)),
                }
            }
            other => return Err(FilterError::UnexpectedToken(other.to_string())),
        }
    }

    Ok(tokens)
}

struct Parser {
    tokens: Vec<Token>,
    pos: usize,
}

impl Parser {
    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos)
    }

    fn next(&mut self) -> Option<Token> {
        let token = self.tokens.get(self.pos).cloned();
        if token.is_some() {
            self.pos += 1;
        }
        token
    }

    fn parse_or(&mut self) -> Result<Predicate, FilterError> {
        let mut left = self.parse_and()?;
        while self.peek() == Some(&Token::Or) {
            self.next();
            let right = self.parse_and()?;
            left = Predicate::Or(Box::new(left), Box::new(right));
        }
        Ok(left)
    }

    fn parse_and(&mut self) -> Result<Predicate, FilterError> {
        let mut left = self.parse_not()?;
        while self.peek() == Some(&Token::And) {
            self.next();
            let right = self.parse_not()?;
            left = Predicate::And(Box::new(left), Box::new(right));
        }
        Ok(left)
    }

    fn parse_not(&mut self) -> Result<Predicate, FilterError> {
        if self.peek() == Some(&Token::Not) {
            self.next();
            let inner = self.parse_not()?;
            return Ok(Predicate::Not(Box::new(inner)));
        }
        self.parse_primary()
    }

    fn parse_primary(&mut self) -> Result<Predicate, FilterError> {
        match self.next() {
            Some(Token::LParen) => {
                let inner = self.parse_or()?;
                match self.next() {
                    Some(Token::RParen) => Ok(inner),
                    Some(t) => Err(FilterError::UnexpectedToken(format!("{t:?}"))),
                    None => Err(FilterError::UnexpectedEnd),
                }
            }
            Some(Token::Ident(field)) => {
                if !FIELDS.contains(&field.as_str()) {
                    return Err(FilterError::UnknownField(field));
                }
                let op = match self.next() {
                    Some(Token::Op(op)) => op,
                    Some(t) => return Err(FilterError::UnexpectedToken(format!("{t:?}"))),
                    None => return Err(FilterError::UnexpectedEnd),
                };
                let value = match self.next() {
                    Some(Token::Str(s)) => Literal::Str(s),
                    Some(Token::Int(n)) => Literal::Int(n),
                    Some(Token::Null) => Literal::Null,
                    // Bare words read as strings for ergonomics:
                    // `type = message` works like `type = 'message'`
                    Some(Token::Ident(word)) => Literal::Str(word),
                    Some(t) => return Err(FilterError::UnexpectedToken(format!("{t:?}"))),
                    None => return Err(FilterError::UnexpectedEnd),
                };
                Ok(Predicate::Compare { field, op, value })
            }
            Some(t) => Err(FilterError::UnexpectedToken(format!("{t:?}"))),
            None => Err(FilterError::UnexpectedEnd),
        }
    }
}

/// Parse a predicate expression.
pub fn parse_predicate(input: &str) -> Result<Predicate, FilterError> {
    let tokens = tokenize(input)?;
    let mut parser = Parser { tokens, pos: 0 };
    let predicate = parser.parse_or()?;
    if parser.pos != parser.tokens.len() {
        return Err(FilterError::UnexpectedToken(format!(
            "{:?}",
            parser.tokens[parser.pos]
        )));
    }
    Ok(predicate)
}

#[cfg(test)]
#[path = "filter_tests.rs"]
mod tests;
