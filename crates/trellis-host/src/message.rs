//! Tagged messages and their textual wire form.
//!
//! A message is written as `type=<Tag> key=value ...`. Values containing
//! whitespace are quoted with `'` or `"`, and several messages can be chained
//! with `;` (key bindings use this to fire more than one message per press).
//! Inside quotes, `\` escapes the opening quote character or another `\`;
//! any other backslash is kept as written.

use std::borrow::Cow;
use std::fmt;

use indexmap::IndexMap;
use thiserror::Error;

const TAG_KEY: &str = "type";

#[derive(Debug, Error, PartialEq, Eq)]
pub enum WireError {
    #[error("message has no `type=` field: {0:?}")]
    MissingTag(String),
    #[error("unterminated quote in message: {0:?}")]
    UnterminatedQuote(String),
    #[error("empty field name in message: {0:?}")]
    EmptyKey(String),
}

/// A single field value.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Text(String),
    Number(f64),
}

impl Value {
    fn from_wire(raw: &str, quoted: bool) -> Self {
        if !quoted {
            if let Ok(number) = raw.parse::<f64>() {
                if number.is_finite() {
                    return Value::Number(number);
                }
            }
        }
        Value::Text(raw.to_string())
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Number(number) => Some(*number),
            Value::Text(text) => text.trim().parse().ok(),
        }
    }

    pub fn as_text(&self) -> Cow<'_, str> {
        match self {
            Value::Text(text) => Cow::Borrowed(text.as_str()),
            Value::Number(_) => Cow::Owned(self.to_string()),
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Text(text) => f.write_str(text),
            Value::Number(number) if number.fract() == 0.0 && number.abs() < 1e15 => {
                write!(f, "{}", *number as i64)
            }
            Value::Number(number) => write!(f, "{number}"),
        }
    }
}

impl From<&str> for Value {
    fn from(value: &str) -> Self {
        Value::Text(value.to_string())
    }
}

impl From<String> for Value {
    fn from(value: String) -> Self {
        Value::Text(value)
    }
}

impl From<f64> for Value {
    fn from(value: f64) -> Self {
        Value::Number(value)
    }
}

impl From<i64> for Value {
    fn from(value: i64) -> Self {
        Value::Number(value as f64)
    }
}

impl From<i32> for Value {
    fn from(value: i32) -> Self {
        Value::Number(f64::from(value))
    }
}

/// A tagged, ordered set of fields plus the per-dispatch consumed flag.
#[derive(Debug, Clone, PartialEq)]
pub struct Message {
    tag: String,
    fields: IndexMap<String, Value>,
    consumed: bool,
}

impl Message {
    pub fn new(tag: impl Into<String>) -> Self {
        Self {
            tag: tag.into(),
            fields: IndexMap::new(),
            consumed: false,
        }
    }

    pub fn with(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.set(key, value);
        self
    }

    pub fn set(&mut self, key: impl Into<String>, value: impl Into<Value>) {
        self.fields.insert(key.into(), value.into());
    }

    pub fn tag(&self) -> &str {
        &self.tag
    }

    pub fn fields(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.fields.iter().map(|(key, value)| (key.as_str(), value))
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.fields.get(key)
    }

    pub fn has(&self, key: &str) -> bool {
        self.fields.contains_key(key)
    }

    /// Field rendered as text; numbers use their wire form.
    pub fn text(&self, key: &str) -> Option<Cow<'_, str>> {
        self.fields.get(key).map(Value::as_text)
    }

    pub fn f64(&self, key: &str) -> Option<f64> {
        self.fields.get(key).and_then(Value::as_f64)
    }

    pub fn i64(&self, key: &str) -> Option<i64> {
        self.f64(key).map(|value| value as i64)
    }

    pub fn is_consumed(&self) -> bool {
        self.consumed
    }

    /// Stops any further handler from seeing this message in the current pass.
    pub fn consume(&mut self) {
        self.consumed = true;
    }

    /// Parses one message from its wire form.
    pub fn parse(input: &str) -> Result<Self, WireError> {
        let mut tag = None;
        let mut fields = IndexMap::new();
        for (key, raw, quoted) in tokenize(input)? {
            if key == TAG_KEY && tag.is_none() {
                tag = Some(raw);
            } else {
                fields.insert(key, Value::from_wire(&raw, quoted));
            }
        }
        let tag = tag
            .filter(|tag| !tag.is_empty())
            .ok_or_else(|| WireError::MissingTag(input.to_string()))?;
        Ok(Self {
            tag,
            fields,
            consumed: false,
        })
    }

    /// Parses a `;`-separated chain of messages. Blank segments are skipped.
    pub fn parse_batch(input: &str) -> Result<Vec<Self>, WireError> {
        split_batch(input)?
            .into_iter()
            .filter(|segment| !segment.trim().is_empty())
            .map(Message::parse)
            .collect()
    }
}

impl fmt::Display for Message {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{TAG_KEY}=")?;
        if needs_quotes(&self.tag) {
            write_quoted(f, &self.tag)?;
        } else {
            write!(f, "{}", self.tag)?;
        }
        for (key, value) in &self.fields {
            let rendered = value.to_string();
            // Unquoted numeric text would read back as a number.
            let numeric_text = matches!(value, Value::Text(_)) && rendered.parse::<f64>().is_ok();
            if numeric_text || needs_quotes(&rendered) {
                write!(f, " {key}=")?;
                write_quoted(f, &rendered)?;
            } else {
                write!(f, " {key}={rendered}")?;
            }
        }
        Ok(())
    }
}

fn needs_quotes(text: &str) -> bool {
    text.is_empty()
        || text.starts_with(['\'', '"'])
        || text.contains(|ch: char| ch.is_whitespace() || ch == ';')
}

fn write_quoted(f: &mut fmt::Formatter<'_>, text: &str) -> fmt::Result {
    let quote = if text.contains('\'') && !text.contains('"') {
        '"'
    } else {
        '\''
    };
    write!(f, "{quote}")?;
    for ch in text.chars() {
        if ch == quote || ch == '\\' {
            write!(f, "\\")?;
        }
        write!(f, "{ch}")?;
    }
    write!(f, "{quote}")
}

fn split_batch(input: &str) -> Result<Vec<&str>, WireError> {
    let mut segments = Vec::new();
    let mut quote = None;
    let mut start = 0;
    let mut chars = input.char_indices();
    while let Some((index, ch)) = chars.next() {
        match (quote, ch) {
            (None, '\'' | '"') => quote = Some(ch),
            (Some(_), '\\') => {
                chars.next();
            }
            (Some(open), _) if open == ch => quote = None,
            (None, ';') => {
                segments.push(&input[start..index]);
                start = index + 1;
            }
            _ => {}
        }
    }
    if quote.is_some() {
        return Err(WireError::UnterminatedQuote(input.to_string()));
    }
    segments.push(&input[start..]);
    Ok(segments)
}

fn tokenize(input: &str) -> Result<Vec<(String, String, bool)>, WireError> {
    let mut tokens = Vec::new();
    let mut chars = input.chars().peekable();
    loop {
        while chars.next_if(|ch| ch.is_whitespace()).is_some() {}
        if chars.peek().is_none() {
            break;
        }

        let mut key = String::new();
        while let Some(ch) = chars.next_if(|ch| *ch != '=' && !ch.is_whitespace()) {
            key.push(ch);
        }
        if chars.next_if_eq(&'=').is_none() {
            // A bare word is a flag.
            if key.is_empty() {
                return Err(WireError::EmptyKey(input.to_string()));
            }
            tokens.push((key, "1".to_string(), false));
            continue;
        }
        if key.is_empty() {
            return Err(WireError::EmptyKey(input.to_string()));
        }

        let mut value = String::new();
        let quoted = match chars.next_if(|ch| *ch == '\'' || *ch == '"') {
            Some(open) => {
                let mut closed = false;
                while let Some(ch) = chars.next() {
                    if ch == open {
                        closed = true;
                        break;
                    }
                    if ch == '\\' {
                        let escaped = chars.next_if(|next| *next == open || *next == '\\');
                        if let Some(escaped) = escaped {
                            value.push(escaped);
                            continue;
                        }
                    }
                    value.push(ch);
                }
                if !closed {
                    return Err(WireError::UnterminatedQuote(input.to_string()));
                }
                true
            }
            None => {
                while let Some(ch) = chars.next_if(|ch| !ch.is_whitespace()) {
                    value.push(ch);
                }
                false
            }
        };
        tokens.push((key, value, quoted));
    }
    Ok(tokens)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn parses_tag_and_typed_fields() {
        let msg = Message::parse("type=SetVar key=Orbit_speed delta=0.5 name='two words'")
            .expect("parse");
        assert_eq!(msg.tag(), "SetVar");
        assert_eq!(msg.text("key").as_deref(), Some("Orbit_speed"));
        assert_eq!(msg.get("delta"), Some(&Value::Number(0.5)));
        assert_eq!(msg.get("name"), Some(&Value::Text("two words".into())));
        assert!(!msg.is_consumed());
    }

    #[test]
    fn field_order_is_preserved() {
        let msg = Message::parse("type=A z=1 a=2 m=3").unwrap();
        let keys: Vec<&str> = msg.fields().map(|(key, _)| key).collect();
        assert_eq!(keys, vec!["z", "a", "m"]);
    }

    #[test]
    fn quoted_numbers_stay_text() {
        let msg = Message::parse("type=PluginChange which='42'").unwrap();
        assert_eq!(msg.get("which"), Some(&Value::Text("42".into())));
        assert_eq!(msg.f64("which"), Some(42.0));
    }

    #[test]
    fn missing_tag_is_rejected() {
        assert!(matches!(
            Message::parse("key=value"),
            Err(WireError::MissingTag(_))
        ));
        assert!(matches!(
            Message::parse("type=A key='open"),
            Err(WireError::UnterminatedQuote(_))
        ));
    }

    #[test]
    fn batch_splits_outside_quotes() {
        let batch =
            Message::parse_batch("type=UiSet key=hidden toggle=1 toUi=controlPanel; type=MouseShow")
                .unwrap();
        assert_eq!(batch.len(), 2);
        assert_eq!(batch[0].i64("toggle"), Some(1));
        assert_eq!(batch[1].tag(), "MouseShow");

        let quoted = Message::parse_batch("type=Say text='a;b'").unwrap();
        assert_eq!(quoted.len(), 1);
        assert_eq!(quoted[0].text("text").as_deref(), Some("a;b"));
    }

    #[test]
    fn display_renders_wire_form() {
        let msg = Message::new("VarEdit_Add")
            .with("toUi", "pluginVars")
            .with("regexp", "^Orbit_.* x")
            .with("count", 3);
        let wire = msg.to_string();
        assert_eq!(wire, "type=VarEdit_Add toUi=pluginVars regexp='^Orbit_.* x' count=3");
        assert_eq!(Message::parse(&wire).unwrap(), msg);
    }

    #[test]
    fn numeric_text_keeps_its_type_through_wire_form() {
        let msg = Message::new("Label").with("text", "42").with("size", 42);
        let wire = msg.to_string();
        assert_eq!(wire, "type=Label text='42' size=42");
        let parsed = Message::parse(&wire).unwrap();
        assert_eq!(parsed.get("text"), Some(&Value::Text("42".into())));
        assert_eq!(parsed, msg);
    }

    #[test]
    fn values_with_both_quote_kinds_survive_wire_form() {
        let msg = Message::new("Say")
            .with("line", r#"it's a "test"; ok"#)
            .with("path", r"C:\data dir\")
            .with("lead", "'x");
        let wire = msg.to_string();
        assert_eq!(
            wire,
            r#"type=Say line='it\'s a "test"; ok' path='C:\\data dir\\' lead="'x""#
        );
        assert_eq!(Message::parse(&wire).unwrap(), msg);

        let batch = Message::parse_batch(&format!("{wire}; type=Next")).unwrap();
        assert_eq!(batch.len(), 2);
        assert_eq!(batch[0], msg);
    }

    #[test]
    fn quoted_tag_is_requoted() {
        let msg = Message::parse("type='Show Panel' id=3").unwrap();
        assert_eq!(msg.tag(), "Show Panel");
        assert_eq!(msg.to_string(), "type='Show Panel' id=3");
    }

    #[test]
    fn lone_backslashes_in_quotes_are_literal() {
        let msg = Message::parse(r"type=Open path='C:\dir\file x'").unwrap();
        assert_eq!(msg.text("path").as_deref(), Some(r"C:\dir\file x"));
    }

    #[test]
    fn bare_words_are_flags() {
        let msg = Message::parse("type=Toggle verbose").unwrap();
        assert_eq!(msg.i64("verbose"), Some(1));
    }
}
