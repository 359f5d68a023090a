//! VQL statement construction.
//!
//! Every caller-supplied string that ends up inside a statement goes through
//! one of the quoting helpers here. VQL string literals escape a single quote
//! by doubling it, so [`quote`] is the only sanitisation applied to values;
//! identifiers and numbers are validated instead of escaped.

use std::fmt;

use crate::error::{Error, Result};

/// Default maximum number of rows per response batch.
pub const DEFAULT_MAX_ROWS: u64 = 1000;

/// Default number of seconds the server waits before flushing a batch.
pub const DEFAULT_MAX_WAIT: u64 = 1;

/// A VQL program ready to be sent, plus its row/time budget.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Statement {
    text: String,
    max_rows: u64,
    max_wait: u64,
}

impl Statement {
    /// Create a statement with the default budget.
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            max_rows: DEFAULT_MAX_ROWS,
            max_wait: DEFAULT_MAX_WAIT,
        }
    }

    /// Set the maximum rows per response batch.
    pub fn with_max_rows(mut self, max_rows: u64) -> Self {
        self.max_rows = max_rows;
        self
    }

    /// Set the maximum seconds before the first batch is flushed.
    pub fn with_max_wait(mut self, max_wait: u64) -> Self {
        self.max_wait = max_wait;
        self
    }

    /// The VQL text.
    pub fn text(&self) -> &str {
        &self.text
    }

    /// Maximum rows per response batch.
    pub fn max_rows(&self) -> u64 {
        self.max_rows
    }

    /// Maximum seconds before the first batch.
    pub fn max_wait(&self) -> u64 {
        self.max_wait
    }
}

impl From<&str> for Statement {
    fn from(text: &str) -> Self {
        Statement::new(text)
    }
}

impl From<String> for Statement {
    fn from(text: String) -> Self {
        Statement::new(text)
    }
}

impl fmt::Display for Statement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.text)
    }
}

/// Double every single quote in `s`.
pub fn escape(s: &str) -> String {
    s.replace('\'', "''")
}

/// Render `s` as a single-quoted VQL string literal.
pub fn quote(s: &str) -> String {
    format!("'{}'", escape(s))
}

/// Render `s` as a triple-quoted VQL block.
///
/// Quotes are doubled as in [`quote`], and consecutive quotes are separated
/// by a space so the body never contains `'''`. A space is also placed
/// between the body and either delimiter when the body starts or ends with a
/// quote.
pub fn raw_block(s: &str) -> String {
    let mut body = String::with_capacity(s.len() + 8);
    let mut prev_quote = false;
    for c in s.chars() {
        if c == '\'' {
            if prev_quote || body.is_empty() {
                body.push(' ');
            }
            body.push_str("''");
            prev_quote = true;
        } else {
            body.push(c);
            prev_quote = false;
        }
    }
    if prev_quote {
        body.push(' ');
    }
    format!("'''{}'''", body)
}

/// Render a list of strings as a VQL array literal: `['a', 'b']`.
pub fn string_list<I, S>(items: I) -> String
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let items: Vec<String> = items.into_iter().map(|s| quote(s.as_ref())).collect();
    format!("[{}]", items.join(", "))
}

/// Returns true if `s` can be used unquoted as a VQL argument name.
pub fn is_identifier(s: &str) -> bool {
    let mut chars = s.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}

/// Render key/value pairs as a VQL `dict(...)` literal.
///
/// Values are quoted. Keys become argument names, so they must be plain
/// identifiers; anything else is rejected rather than escaped.
pub fn literal_map<I, K, V>(pairs: I) -> Result<String>
where
    I: IntoIterator<Item = (K, V)>,
    K: AsRef<str>,
    V: AsRef<str>,
{
    let mut rendered = Vec::new();
    for (key, value) in pairs {
        let key = key.as_ref();
        if !is_identifier(key) {
            return Err(Error::InvalidArgument(format!(
                "parameter name '{}' is not a valid identifier",
                key
            )));
        }
        rendered.push(format!("{}={}", key, quote(value.as_ref())));
    }
    Ok(format!("dict({})", rendered.join(", ")))
}

/// Render a function call whose arguments are already VQL expressions.
pub fn call<'a, I>(function: &str, args: I) -> String
where
    I: IntoIterator<Item = (&'a str, String)>,
{
    let args: Vec<String> = args
        .into_iter()
        .map(|(name, expr)| format!("{}={}", name, expr))
        .collect();
    format!("{}({})", function, args.join(", "))
}

/// `field =~ 'value'` (regex match).
pub fn matches(field: &str, value: &str) -> String {
    format!("{} =~ {}", field, quote(value))
}

/// `field = 'value'`.
pub fn equals(field: &str, value: &str) -> String {
    format!("{} = {}", field, quote(value))
}

/// Join predicates with `OR` inside parentheses.
pub fn any_of<I, S>(predicates: I) -> String
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let parts: Vec<String> = predicates
        .into_iter()
        .map(|p| p.as_ref().to_string())
        .collect();
    format!("({})", parts.join(" OR "))
}

/// Builder for `SELECT ... FROM ...` statements.
///
/// A limit or offset of 0 leaves the clause out, so `limit(0)` means "no
/// limit beyond whatever the server enforces".
#[derive(Clone, Debug)]
pub struct Select {
    columns: String,
    source: String,
    predicates: Vec<String>,
    order_by: Option<String>,
    limit: u64,
    offset: u64,
}

impl Select {
    /// `SELECT * FROM source`.
    pub fn star(source: impl Into<String>) -> Self {
        Self::new("*", source)
    }

    /// `SELECT columns FROM source`.
    pub fn new(columns: impl Into<String>, source: impl Into<String>) -> Self {
        Self {
            columns: columns.into(),
            source: source.into(),
            predicates: Vec::new(),
            order_by: None,
            limit: 0,
            offset: 0,
        }
    }

    /// Add a `WHERE` predicate. Multiple predicates are joined with `AND`.
    pub fn filter(mut self, predicate: impl Into<String>) -> Self {
        self.predicates.push(predicate.into());
        self
    }

    /// Set the `ORDER BY` expression.
    pub fn order_by(mut self, expr: impl Into<String>) -> Self {
        self.order_by = Some(expr.into());
        self
    }

    /// Set `LIMIT`.
    pub fn limit(mut self, limit: u64) -> Self {
        self.limit = limit;
        self
    }

    /// Set `OFFSET`.
    pub fn offset(mut self, offset: u64) -> Self {
        self.offset = offset;
        self
    }

    /// Render the statement.
    pub fn build(self) -> Statement {
        let mut text = format!("SELECT {} FROM {}", self.columns, self.source);
        if !self.predicates.is_empty() {
            text.push_str(" WHERE ");
            text.push_str(&self.predicates.join(" AND "));
        }
        if let Some(order) = &self.order_by {
            text.push_str(" ORDER BY ");
            text.push_str(order);
        }
        if self.limit > 0 {
            text.push_str(&format!(" LIMIT {}", self.limit));
        }
        if self.offset > 0 {
            text.push_str(&format!(" OFFSET {}", self.offset));
        }
        Statement::new(text)
    }
}
