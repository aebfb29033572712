//! Typed, validated option storage shared by the codecs.
//!
//! Each codec owns a [`Configuration`] parameterised by a [`Schema`]. The
//! schema fixes the set of option names, their defaults, and how an incoming
//! [`OptionValue`] is validated and coerced. Coercion happens on write, so
//! reads never fail on a badly typed value.

use std::collections::BTreeMap;
use std::fmt;

use serde::ser::{Serialize, SerializeMap, Serializer};
use zeroize::Zeroizing;

use crate::error::CodecError;

/// A dynamically typed option value.
#[derive(Clone, PartialEq)]
pub enum OptionValue {
    /// Absent value. Writing it leaves the option unchanged.
    Null,
    /// Text value.
    Text(String),
    /// Integer value.
    Integer(i64),
    /// Boolean value.
    Bool(bool),
    /// Raw bytes, zeroized on drop.
    Bytes(Zeroizing<Vec<u8>>),
}

impl OptionValue {
    fn kind(&self) -> &'static str {
        match self {
            Self::Null => "null",
            Self::Text(_) => "text",
            Self::Integer(_) => "integer",
            Self::Bool(_) => "boolean",
            Self::Bytes(_) => "bytes",
        }
    }
}

impl fmt::Debug for OptionValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Null => write!(f, "Null"),
            Self::Text(s) => f.debug_tuple("Text").field(s).finish(),
            Self::Integer(n) => f.debug_tuple("Integer").field(n).finish(),
            Self::Bool(b) => f.debug_tuple("Bool").field(b).finish(),
            Self::Bytes(_) => f.debug_tuple("Bytes").field(&"[REDACTED]").finish(),
        }
    }
}

impl Serialize for OptionValue {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Self::Null => serializer.serialize_unit(),
            Self::Text(s) => serializer.serialize_str(s),
            Self::Integer(n) => serializer.serialize_i64(*n),
            Self::Bool(b) => serializer.serialize_bool(*b),
            Self::Bytes(_) => serializer.serialize_str("[REDACTED]"),
        }
    }
}

impl From<&str> for OptionValue {
    fn from(value: &str) -> Self {
        Self::Text(value.to_string())
    }
}

impl From<String> for OptionValue {
    fn from(value: String) -> Self {
        Self::Text(value)
    }
}

impl From<bool> for OptionValue {
    fn from(value: bool) -> Self {
        Self::Bool(value)
    }
}

impl From<i64> for OptionValue {
    fn from(value: i64) -> Self {
        Self::Integer(value)
    }
}

impl From<i32> for OptionValue {
    fn from(value: i32) -> Self {
        Self::Integer(i64::from(value))
    }
}

impl From<u32> for OptionValue {
    fn from(value: u32) -> Self {
        Self::Integer(i64::from(value))
    }
}

/// Values above `i64::MAX` are kept as their decimal text, which numeric
/// options reject.
impl From<u64> for OptionValue {
    fn from(value: u64) -> Self {
        i64::try_from(value).map_or_else(|_| Self::Text(value.to_string()), Self::Integer)
    }
}

impl From<usize> for OptionValue {
    fn from(value: usize) -> Self {
        i64::try_from(value).map_or_else(|_| Self::Text(value.to_string()), Self::Integer)
    }
}

impl From<Vec<u8>> for OptionValue {
    fn from(value: Vec<u8>) -> Self {
        Self::Bytes(Zeroizing::new(value))
    }
}

impl From<&[u8]> for OptionValue {
    fn from(value: &[u8]) -> Self {
        Self::Bytes(Zeroizing::new(value.to_vec()))
    }
}

impl From<Zeroizing<Vec<u8>>> for OptionValue {
    fn from(value: Zeroizing<Vec<u8>>) -> Self {
        Self::Bytes(value)
    }
}

impl<T: Into<OptionValue>> From<Option<T>> for OptionValue {
    fn from(value: Option<T>) -> Self {
        value.map_or(Self::Null, Into::into)
    }
}

impl TryFrom<&serde_json::Value> for OptionValue {
    type Error = CodecError;

    fn try_from(value: &serde_json::Value) -> Result<Self, Self::Error> {
        use serde_json::Value;

        match value {
            Value::Null => Ok(Self::Null),
            Value::Bool(b) => Ok(Self::Bool(*b)),
            Value::String(s) => Ok(Self::Text(s.clone())),
            Value::Number(n) => n.as_i64().map(Self::Integer).ok_or_else(|| {
                CodecError::InvalidArgument(format!("{} is not an integer", n))
            }),
            Value::Array(_) | Value::Object(_) => Err(CodecError::InvalidArgument(
                "option values must be scalars".to_string(),
            )),
        }
    }
}

// ============================================================================
// Schema
// ============================================================================

/// The fixed option set of one codec.
pub trait Schema: fmt::Debug {
    /// All recognised option names.
    fn names(&self) -> &'static [&'static str];

    /// Values applied before any caller option.
    fn defaults(&self) -> Vec<(&'static str, OptionValue)>;

    /// Validates and coerces `value` for the (recognised) option `name`.
    ///
    /// Never called with [`OptionValue::Null`].
    fn coerce(&self, name: &str, value: OptionValue) -> Result<OptionValue, CodecError>;
}

/// Accepts text only.
pub(crate) fn expect_text(name: &str, value: OptionValue) -> Result<OptionValue, CodecError> {
    match value {
        OptionValue::Text(_) => Ok(value),
        other => Err(type_error(name, "text", &other)),
    }
}

/// Accepts a non-negative integer or a string of ASCII digits.
pub(crate) fn expect_integer(name: &str, value: OptionValue) -> Result<OptionValue, CodecError> {
    match value {
        OptionValue::Integer(n) if n >= 0 => Ok(OptionValue::Integer(n)),
        OptionValue::Integer(n) => Err(CodecError::InvalidArgument(format!(
            "option \"{}\" must not be negative, got {}",
            name, n
        ))),
        OptionValue::Text(ref s) => parse_digits(s)
            .map(OptionValue::Integer)
            .ok_or_else(|| type_error(name, "numeric", &value)),
        other => Err(type_error(name, "numeric", &other)),
    }
}

/// Like [`expect_integer`], additionally capped at `max`.
pub(crate) fn expect_bounded(
    name: &str,
    value: OptionValue,
    max: i64,
) -> Result<OptionValue, CodecError> {
    match expect_integer(name, value)? {
        OptionValue::Integer(n) if n > max => Err(CodecError::InvalidArgument(format!(
            "option \"{}\" must be at most {}, got {}",
            name, max, n
        ))),
        value => Ok(value),
    }
}

/// Accepts a boolean, an integer or a digit string; coerces to boolean.
pub(crate) fn expect_flag(name: &str, value: OptionValue) -> Result<OptionValue, CodecError> {
    match value {
        OptionValue::Bool(_) => Ok(value),
        OptionValue::Integer(n) => Ok(OptionValue::Bool(n != 0)),
        OptionValue::Text(ref s) => parse_digits(s)
            .map(|n| OptionValue::Bool(n != 0))
            .ok_or_else(|| type_error(name, "boolean", &value)),
        other => Err(type_error(name, "boolean", &other)),
    }
}

/// Accepts bytes, or text taken as its UTF-8 bytes.
pub(crate) fn expect_bytes(name: &str, value: OptionValue) -> Result<OptionValue, CodecError> {
    match value {
        OptionValue::Bytes(_) => Ok(value),
        OptionValue::Text(s) => Ok(OptionValue::Bytes(Zeroizing::new(s.into_bytes()))),
        other => Err(type_error(name, "bytes", &other)),
    }
}

fn parse_digits(s: &str) -> Option<i64> {
    if s.is_empty() || !s.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    s.parse().ok()
}

fn type_error(name: &str, expected: &str, got: &OptionValue) -> CodecError {
    CodecError::InvalidArgument(format!(
        "option \"{}\" only accepts {}, got {}",
        name,
        expected,
        got.kind()
    ))
}

// ============================================================================
// Configuration
// ============================================================================

/// Validated option store for one codec instance.
#[derive(Debug, Clone)]
pub struct Configuration<S: Schema> {
    schema: S,
    values: BTreeMap<&'static str, OptionValue>,
}

impl<S: Schema> Configuration<S> {
    /// Creates a configuration holding the schema defaults.
    pub fn new(schema: S) -> Self {
        let values = schema.defaults().into_iter().collect();
        Self { schema, values }
    }

    /// Creates a configuration and applies `options` one by one.
    ///
    /// Application stops at the first invalid option; earlier options stay
    /// applied.
    pub fn with_options<I, K, V>(schema: S, options: I) -> Result<Self, CodecError>
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: Into<OptionValue>,
    {
        let mut config = Self::new(schema);
        config.apply(options)?;
        Ok(config)
    }

    /// Creates a configuration from a JSON object of options.
    pub fn from_json(schema: S, options: &serde_json::Value) -> Result<Self, CodecError> {
        let object = options.as_object().ok_or_else(|| {
            CodecError::InvalidArgument("options must be a JSON object".to_string())
        })?;

        let mut config = Self::new(schema);
        for (name, value) in object {
            config.set(name, OptionValue::try_from(value)?)?;
        }
        Ok(config)
    }

    /// Applies `options` one by one through [`Configuration::set`].
    pub fn apply<I, K, V>(&mut self, options: I) -> Result<&mut Self, CodecError>
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: Into<OptionValue>,
    {
        for (name, value) in options {
            self.set(name.as_ref(), value)?;
        }
        Ok(self)
    }

    /// Validates, coerces and stores an option.
    ///
    /// [`OptionValue::Null`] leaves the current value in place.
    pub fn set(
        &mut self,
        name: &str,
        value: impl Into<OptionValue>,
    ) -> Result<&mut Self, CodecError> {
        let key = self.resolve(name)?;
        let value = value.into();
        if value == OptionValue::Null {
            return Ok(self);
        }

        let coerced = self.schema.coerce(key, value)?;
        self.values.insert(key, coerced);
        Ok(self)
    }

    /// Returns the stored value of an option.
    ///
    /// # Errors
    ///
    /// [`CodecError::UnknownOption`] if the name is not recognised or the
    /// option was never set and has no default.
    pub fn get(&self, name: &str) -> Result<&OptionValue, CodecError> {
        let key = self.resolve(name)?;
        self.values
            .get(key)
            .ok_or_else(|| CodecError::UnknownOption(format!("\"{}\" is not set", name)))
    }

    /// Returns a text option, `None` if unset.
    pub fn text(&self, name: &str) -> Result<Option<&str>, CodecError> {
        match self.lookup(name)? {
            None => Ok(None),
            Some(OptionValue::Text(s)) => Ok(Some(s)),
            Some(other) => Err(mismatch(name, "text", other)),
        }
    }

    /// Returns an integer option, `None` if unset.
    pub fn integer(&self, name: &str) -> Result<Option<usize>, CodecError> {
        match self.lookup(name)? {
            None => Ok(None),
            Some(OptionValue::Integer(n)) => usize::try_from(*n).map(Some).map_err(|_| {
                CodecError::Configuration(format!("\"{}\" is out of range", name))
            }),
            Some(other) => Err(mismatch(name, "integer", other)),
        }
    }

    /// Returns a boolean option, `None` if unset.
    pub fn flag(&self, name: &str) -> Result<Option<bool>, CodecError> {
        match self.lookup(name)? {
            None => Ok(None),
            Some(OptionValue::Bool(b)) => Ok(Some(*b)),
            Some(other) => Err(mismatch(name, "boolean", other)),
        }
    }

    /// Returns a bytes option, `None` if unset.
    pub fn bytes(&self, name: &str) -> Result<Option<&[u8]>, CodecError> {
        match self.lookup(name)? {
            None => Ok(None),
            Some(OptionValue::Bytes(b)) => Ok(Some(b.as_slice())),
            Some(other) => Err(mismatch(name, "bytes", other)),
        }
    }

    /// Restores the schema defaults, dropping every caller option.
    pub fn reset(&mut self) {
        self.values = self.schema.defaults().into_iter().collect();
    }

    /// The schema this configuration validates against.
    pub fn schema(&self) -> &S {
        &self.schema
    }

    fn lookup(&self, name: &str) -> Result<Option<&OptionValue>, CodecError> {
        let key = self.resolve(name)?;
        Ok(self.values.get(key))
    }

    fn resolve(&self, name: &str) -> Result<&'static str, CodecError> {
        self.schema
            .names()
            .iter()
            .copied()
            .find(|known| *known == name)
            .ok_or_else(|| CodecError::UnknownOption(format!("\"{}\" is not defined", name)))
    }
}

fn mismatch(name: &str, expected: &str, got: &OptionValue) -> CodecError {
    CodecError::Configuration(format!(
        "\"{}\" holds {}, expected {}",
        name,
        got.kind(),
        expected
    ))
}

impl<S: Schema> Serialize for Configuration<S> {
    fn serialize<Ser: Serializer>(&self, serializer: Ser) -> Result<Ser::Ok, Ser::Error> {
        let mut map = serializer.serialize_map(Some(self.values.len()))?;
        for (name, value) in &self.values {
            map.serialize_entry(name, value)?;
        }
        map.end()
    }
}
