//! AMF0 value types
//!
//! Objects and ECMA arrays keep their properties in wire order. Duplicate
//! names are kept as they arrive; lookups return the first match.

/// AMF0 value
#[derive(Debug, Clone, PartialEq, Default)]
pub enum AmfValue {
    /// IEEE 754 double-precision floating point (0x00)
    Number(f64),

    /// Boolean value (0x01)
    Boolean(bool),

    /// UTF-8 string with 16-bit length prefix (0x02)
    String(String),

    /// Anonymous object (0x03)
    Object(AmfObject),

    /// Null value (0x05)
    #[default]
    Null,

    /// Undefined value (0x06)
    Undefined,

    /// Associative array (0x08)
    EcmaArray(AmfObject),
}

impl AmfValue {
    /// Try to get this value as a string reference
    pub fn as_str(&self) -> Option<&str> {
        match self {
            AmfValue::String(s) => Some(s),
            _ => None,
        }
    }

    /// Try to get this value as a number
    pub fn as_number(&self) -> Option<f64> {
        match self {
            AmfValue::Number(n) => Some(*n),
            _ => None,
        }
    }

    /// Try to get this value as a boolean
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            AmfValue::Boolean(b) => Some(*b),
            _ => None,
        }
    }

    /// Try to get the property list of an object or ECMA array
    pub fn as_object(&self) -> Option<&AmfObject> {
        match self {
            AmfValue::Object(o) | AmfValue::EcmaArray(o) => Some(o),
            _ => None,
        }
    }

    /// Check if this value is null or undefined
    pub fn is_null_or_undefined(&self) -> bool {
        matches!(self, AmfValue::Null | AmfValue::Undefined)
    }

    /// Get a property from an object value
    pub fn get(&self, key: &str) -> Option<&AmfValue> {
        self.as_object()?.get(key)
    }

    /// Get a string property from an object value
    pub fn get_string(&self, key: &str) -> Option<&str> {
        self.get(key)?.as_str()
    }

    /// Get a number property from an object value
    pub fn get_number(&self, key: &str) -> Option<f64> {
        self.get(key)?.as_number()
    }
}

/// Ordered name/value property list shared by objects and ECMA arrays
#[derive(Debug, Clone, PartialEq, Default)]
pub struct AmfObject {
    properties: Vec<(String, AmfValue)>,
}

impl AmfObject {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style insert, for assembling response objects
    pub fn with(mut self, key: impl Into<String>, value: impl Into<AmfValue>) -> Self {
        self.insert(key, value);
        self
    }

    /// Set a property, replacing the first existing entry with that name
    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<AmfValue>) {
        let key = key.into();
        let value = value.into();
        match self.properties.iter_mut().find(|(k, _)| *k == key) {
            Some(slot) => slot.1 = value,
            None => self.properties.push((key, value)),
        }
    }

    /// Append a property without checking for duplicates
    pub fn push(&mut self, key: String, value: AmfValue) {
        self.properties.push((key, value));
    }

    pub fn get(&self, key: &str) -> Option<&AmfValue> {
        self.properties
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &AmfValue)> {
        self.properties.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.properties.iter().map(|(k, _)| k.as_str())
    }

    pub fn len(&self) -> usize {
        self.properties.len()
    }

    pub fn is_empty(&self) -> bool {
        self.properties.is_empty()
    }
}

impl<K: Into<String>, V: Into<AmfValue>> FromIterator<(K, V)> for AmfObject {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self {
            properties: iter
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        }
    }
}

impl IntoIterator for AmfObject {
    type Item = (String, AmfValue);
    type IntoIter = std::vec::IntoIter<(String, AmfValue)>;

    fn into_iter(self) -> Self::IntoIter {
        self.properties.into_iter()
    }
}

impl From<bool> for AmfValue {
    fn from(v: bool) -> Self {
        AmfValue::Boolean(v)
    }
}

impl From<f64> for AmfValue {
    fn from(v: f64) -> Self {
        AmfValue::Number(v)
    }
}

impl From<u32> for AmfValue {
    fn from(v: u32) -> Self {
        AmfValue::Number(v as f64)
    }
}

impl From<String> for AmfValue {
    fn from(v: String) -> Self {
        AmfValue::String(v)
    }
}

impl From<&str> for AmfValue {
    fn from(v: &str) -> Self {
        AmfValue::String(v.to_string())
    }
}

impl From<AmfObject> for AmfValue {
    fn from(v: AmfObject) -> Self {
        AmfValue::Object(v)
    }
}
