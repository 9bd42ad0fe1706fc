//! Generic wire values.
//!
//! Every parameter and result crosses the wire as a [`Value`]: a kind-tagged
//! scalar literal, an ordered array, or a struct of named members. Scalars
//! keep their literal text; coercion into a concrete type happens on demand
//! through the `as_*` accessors.

use crate::error::ProtocolError;
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use chrono::NaiveDateTime;
use std::collections::HashMap;
use std::fmt;

/// Wire format for `dateTime.iso8601` literals.
pub const DATETIME_FORMAT: &str = "%Y%m%dT%H:%M:%S";

/// Alternative dateTime layouts accepted on input.
const DATETIME_INPUT_FORMATS: &[&str] = &[DATETIME_FORMAT, "%Y-%m-%dT%H:%M:%S", "%Y%m%dT%H%M%S"];

/// Scalar kinds understood by the protocol.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ScalarKind {
    /// 32-bit integer (`int` or `i4`).
    Int,
    /// 64-bit integer (`i8` extension).
    I8,
    Boolean,
    Double,
    String,
    DateTime,
    Base64,
}

impl ScalarKind {
    /// Resolves an element tag. Unknown tags are treated as strings.
    pub fn from_tag(tag: &str) -> Self {
        match tag {
            "int" | "i4" => ScalarKind::Int,
            "i8" => ScalarKind::I8,
            "boolean" => ScalarKind::Boolean,
            "double" => ScalarKind::Double,
            "dateTime.iso8601" => ScalarKind::DateTime,
            "base64" => ScalarKind::Base64,
            _ => ScalarKind::String,
        }
    }

    /// Returns the element tag written for this kind.
    pub fn tag(&self) -> &'static str {
        match self {
            ScalarKind::Int => "int",
            ScalarKind::I8 => "i8",
            ScalarKind::Boolean => "boolean",
            ScalarKind::Double => "double",
            ScalarKind::String => "string",
            ScalarKind::DateTime => "dateTime.iso8601",
            ScalarKind::Base64 => "base64",
        }
    }
}

impl fmt::Display for ScalarKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.tag())
    }
}

/// A scalar literal with its declared kind.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Scalar {
    kind: ScalarKind,
    text: String,
}

impl Scalar {
    pub fn new(kind: ScalarKind, text: impl Into<String>) -> Self {
        Self {
            kind,
            text: text.into(),
        }
    }

    pub fn int(v: i32) -> Self {
        Self::new(ScalarKind::Int, v.to_string())
    }

    pub fn i8(v: i64) -> Self {
        Self::new(ScalarKind::I8, v.to_string())
    }

    pub fn boolean(v: bool) -> Self {
        Self::new(ScalarKind::Boolean, if v { "1" } else { "0" })
    }

    /// Non-finite values have no wire form; the encoder rejects them.
    pub fn double(v: f64) -> Self {
        Self::new(ScalarKind::Double, v.to_string())
    }

    pub fn string(v: impl Into<String>) -> Self {
        Self::new(ScalarKind::String, v)
    }

    pub fn datetime(v: NaiveDateTime) -> Self {
        Self::new(ScalarKind::DateTime, v.format(DATETIME_FORMAT).to_string())
    }

    pub fn base64(bytes: &[u8]) -> Self {
        Self::new(ScalarKind::Base64, STANDARD.encode(bytes))
    }

    pub fn kind(&self) -> ScalarKind {
        self.kind
    }

    /// Returns the literal text as it appears on the wire.
    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn as_i32(&self) -> Result<i32, ProtocolError> {
        parse_integer(&self.text).ok_or_else(|| self.invalid(ScalarKind::Int))
    }

    pub fn as_i64(&self) -> Result<i64, ProtocolError> {
        parse_integer(&self.text).ok_or_else(|| self.invalid(ScalarKind::I8))
    }

    pub fn as_bool(&self) -> Result<bool, ProtocolError> {
        match self.text.trim() {
            "1" => Ok(true),
            "0" => Ok(false),
            s if s.eq_ignore_ascii_case("true") => Ok(true),
            s if s.eq_ignore_ascii_case("false") => Ok(false),
            _ => Err(self.invalid(ScalarKind::Boolean)),
        }
    }

    pub fn as_f64(&self) -> Result<f64, ProtocolError> {
        self.text
            .trim()
            .parse()
            .map_err(|_| self.invalid(ScalarKind::Double))
    }

    pub fn as_str(&self) -> &str {
        &self.text
    }

    pub fn as_datetime(&self) -> Result<NaiveDateTime, ProtocolError> {
        let text = self.text.trim();
        DATETIME_INPUT_FORMATS
            .iter()
            .find_map(|format| NaiveDateTime::parse_from_str(text, format).ok())
            .ok_or_else(|| self.invalid(ScalarKind::DateTime))
    }

    pub fn as_base64(&self) -> Result<Vec<u8>, ProtocolError> {
        let compact: String = self.text.split_whitespace().collect();
        STANDARD
            .decode(compact)
            .map_err(|_| self.invalid(ScalarKind::Base64))
    }

    fn invalid(&self, kind: ScalarKind) -> ProtocolError {
        ProtocolError::InvalidLiteral {
            kind,
            text: self.text.clone(),
        }
    }
}

fn parse_integer<T: std::str::FromStr>(text: &str) -> Option<T> {
    let text = text.trim();
    text.strip_prefix('+').unwrap_or(text).parse().ok()
}

/// Struct members in document order.
///
/// Names are unique; inserting an existing name replaces its value in place.
/// Lookups go through a name index, so building a wide struct stays linear.
#[derive(Debug, Clone, Default)]
pub struct Members {
    entries: Vec<(String, Value)>,
    index: HashMap<String, usize>,
}

impl Members {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, name: impl Into<String>, value: Value) {
        let name = name.into();
        match self.index.get(&name) {
            Some(&pos) => self.entries[pos].1 = value,
            None => {
                self.index.insert(name.clone(), self.entries.len());
                self.entries.push((name, value));
            }
        }
    }

    pub fn with(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.insert(name, value.into());
        self
    }

    pub fn get(&self, name: &str) -> Option<&Value> {
        self.index.get(name).map(|&pos| &self.entries[pos].1)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.index.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.entries.iter().map(|(n, v)| (n.as_str(), v))
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|(n, _)| n.as_str())
    }
}

impl PartialEq for Members {
    fn eq(&self, other: &Self) -> bool {
        self.entries == other.entries
    }
}

impl<N: Into<String>> FromIterator<(N, Value)> for Members {
    fn from_iter<I: IntoIterator<Item = (N, Value)>>(iter: I) -> Self {
        let mut members = Members::new();
        for (name, value) in iter {
            members.insert(name, value);
        }
        members
    }
}

/// A parsed or to-be-written wire value.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Scalar(Scalar),
    Array(Vec<Value>),
    Struct(Members),
}

impl Value {
    pub fn int(v: i32) -> Self {
        Value::Scalar(Scalar::int(v))
    }

    pub fn boolean(v: bool) -> Self {
        Value::Scalar(Scalar::boolean(v))
    }

    /// Non-finite values have no wire form; the encoder rejects them.
    pub fn double(v: f64) -> Self {
        Value::Scalar(Scalar::double(v))
    }

    pub fn string(v: impl Into<String>) -> Self {
        Value::Scalar(Scalar::string(v))
    }

    pub fn as_scalar(&self) -> Option<&Scalar> {
        match self {
            Value::Scalar(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_array(&self) -> Option<&[Value]> {
        match self {
            Value::Array(items) => Some(items),
            _ => None,
        }
    }

    pub fn as_struct(&self) -> Option<&Members> {
        match self {
            Value::Struct(members) => Some(members),
            _ => None,
        }
    }

    /// Describes the value's shape for diagnostics (`int`, `array`, `struct`, ...).
    pub fn shape(&self) -> &'static str {
        match self {
            Value::Scalar(s) => s.kind().tag(),
            Value::Array(_) => "array",
            Value::Struct(_) => "struct",
        }
    }
}

impl From<Scalar> for Value {
    fn from(s: Scalar) -> Self {
        Value::Scalar(s)
    }
}

impl From<i32> for Value {
    fn from(v: i32) -> Self {
        Value::int(v)
    }
}

impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Value::boolean(v)
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Value::double(v)
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Value::string(v)
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Value::string(v)
    }
}

impl From<Vec<Value>> for Value {
    fn from(items: Vec<Value>) -> Self {
        Value::Array(items)
    }
}

impl From<Members> for Value {
    fn from(members: Members) -> Self {
        Value::Struct(members)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    #[test]
    fn test_kind_from_tag() {
        assert_eq!(ScalarKind::from_tag("int"), ScalarKind::Int);
        assert_eq!(ScalarKind::from_tag("i4"), ScalarKind::Int);
        assert_eq!(ScalarKind::from_tag("i8"), ScalarKind::I8);
        assert_eq!(ScalarKind::from_tag("boolean"), ScalarKind::Boolean);
        assert_eq!(ScalarKind::from_tag("double"), ScalarKind::Double);
        assert_eq!(
            ScalarKind::from_tag("dateTime.iso8601"),
            ScalarKind::DateTime
        );
        assert_eq!(ScalarKind::from_tag("base64"), ScalarKind::Base64);
        assert_eq!(ScalarKind::from_tag("string"), ScalarKind::String);
        // Unknown tags fall back to string
        assert_eq!(ScalarKind::from_tag("nil"), ScalarKind::String);
        assert_eq!(ScalarKind::from_tag("ex:float"), ScalarKind::String);
    }

    #[test]
    fn test_integer_coercion() {
        assert_eq!(Scalar::new(ScalarKind::Int, "5").as_i32().unwrap(), 5);
        assert_eq!(Scalar::new(ScalarKind::Int, " -12 ").as_i32().unwrap(), -12);
        assert_eq!(Scalar::new(ScalarKind::Int, "+7").as_i32().unwrap(), 7);
        assert_eq!(
            Scalar::new(ScalarKind::I8, "9000000000").as_i64().unwrap(),
            9_000_000_000
        );
        assert!(Scalar::new(ScalarKind::Int, "9000000000").as_i32().is_err());
        assert!(Scalar::new(ScalarKind::Int, "five").as_i32().is_err());
    }

    #[test]
    fn test_boolean_coercion() {
        assert!(Scalar::new(ScalarKind::Boolean, "1").as_bool().unwrap());
        assert!(!Scalar::new(ScalarKind::Boolean, "0").as_bool().unwrap());
        assert!(Scalar::new(ScalarKind::Boolean, "TRUE").as_bool().unwrap());
        assert!(!Scalar::new(ScalarKind::Boolean, "false").as_bool().unwrap());

        let err = Scalar::new(ScalarKind::Boolean, "yes").as_bool().unwrap_err();
        assert!(matches!(
            err,
            ProtocolError::InvalidLiteral {
                kind: ScalarKind::Boolean,
                ..
            }
        ));
    }

    #[test]
    fn test_double_coercion() {
        assert_eq!(Scalar::new(ScalarKind::Double, "1.5").as_f64().unwrap(), 1.5);
        assert_eq!(Scalar::new(ScalarKind::Double, "-0.25").as_f64().unwrap(), -0.25);
        assert!(Scalar::new(ScalarKind::Double, "x").as_f64().is_err());
    }

    #[test]
    fn test_datetime_coercion() {
        let expected = NaiveDate::from_ymd_opt(1998, 7, 17)
            .unwrap()
            .and_hms_opt(14, 8, 55)
            .unwrap();
        assert_eq!(
            Scalar::new(ScalarKind::DateTime, "19980717T14:08:55")
                .as_datetime()
                .unwrap(),
            expected
        );
        assert_eq!(
            Scalar::new(ScalarKind::DateTime, "1998-07-17T14:08:55")
                .as_datetime()
                .unwrap(),
            expected
        );
        assert_eq!(Scalar::datetime(expected).text(), "19980717T14:08:55");
        assert!(Scalar::new(ScalarKind::DateTime, "yesterday")
            .as_datetime()
            .is_err());
    }

    #[test]
    fn test_base64_coercion() {
        let scalar = Scalar::base64(b"you can't read this!");
        assert_eq!(scalar.text(), "eW91IGNhbid0IHJlYWQgdGhpcyE=");
        assert_eq!(scalar.as_base64().unwrap(), b"you can't read this!");

        // Line-wrapped payloads are accepted
        let wrapped = Scalar::new(ScalarKind::Base64, "eW91IGNhbid0\n  IHJlYWQgdGhpcyE=");
        assert_eq!(wrapped.as_base64().unwrap(), b"you can't read this!");

        assert!(Scalar::new(ScalarKind::Base64, "!!!").as_base64().is_err());
    }

    #[test]
    fn test_string_text_is_verbatim() {
        let scalar = Scalar::string("  padded  ");
        assert_eq!(scalar.as_str(), "  padded  ");
        assert_eq!(scalar.kind(), ScalarKind::String);
    }

    #[test]
    fn test_members_last_write_wins() {
        let mut members = Members::new();
        members.insert("a", Value::int(1));
        members.insert("b", Value::string("x"));
        members.insert("a", Value::int(2));

        assert_eq!(members.len(), 2);
        assert_eq!(members.get("a"), Some(&Value::int(2)));
        // Replacement keeps the original position
        assert_eq!(members.names().collect::<Vec<_>>(), vec!["a", "b"]);
    }

    #[test]
    fn test_members_wide_insert() {
        let mut members = Members::new();
        for i in 0..50_000 {
            members.insert(format!("m{i}"), Value::int(i));
        }
        members.insert("m0", Value::string("first"));

        assert_eq!(members.len(), 50_000);
        assert_eq!(members.get("m0"), Some(&Value::string("first")));
        assert_eq!(members.get("m49999"), Some(&Value::int(49_999)));
        assert_eq!(members.iter().next().map(|(n, _)| n), Some("m0"));
        assert_eq!(members.names().last(), Some("m49999"));
    }

    #[test]
    fn test_members_equality_ignores_index() {
        let a = Members::new().with("x", 1).with("y", 2);
        let b = Members::new().with("x", 0).with("y", 2).with("x", 1);
        assert_eq!(a, b);
        assert_ne!(a, Members::new().with("y", 2).with("x", 1));
    }

    #[test]
    fn test_members_from_iter() {
        let members: Members = vec![("x", Value::int(1)), ("y", Value::boolean(true))]
            .into_iter()
            .collect();
        assert!(members.contains("x"));
        assert!(members.contains("y"));
        assert!(!members.contains("z"));
    }

    #[test]
    fn test_value_shape() {
        assert_eq!(Value::int(1).shape(), "int");
        assert_eq!(Value::string("s").shape(), "string");
        assert_eq!(Value::Array(vec![]).shape(), "array");
        assert_eq!(Value::Struct(Members::new()).shape(), "struct");
    }
}
