use std::fmt;

use crate::legacy::encode::LegacyEncode;

/// Stands in for an empty collection so its position still carries a parameter.
pub const EMPTY_COLLECTION_PLACEHOLDER: &str = "anything";

/// Ordered `(name, value)` pairs. Order is part of the signed contract.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ParameterList {
    pairs: Vec<(String, String)>,
}

impl ParameterList {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.pairs.push((name.into(), value.into()));
    }

    pub fn extend(&mut self, other: ParameterList) {
        self.pairs.extend(other.pairs);
    }

    /// Appends `value` encoded under the positional prefix `index`.
    pub fn add_encoded<T: LegacyEncode + ?Sized>(&mut self, index: usize, value: &T) {
        self.extend(value.encode_params(&index.to_string()));
    }

    pub fn len(&self) -> usize {
        self.pairs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pairs.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.pairs.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    /// `name=value` pairs joined by `&`, nothing escaped.
    pub fn to_query_string(&self) -> String {
        self.join(|value| value.to_owned())
    }

    /// Form used as signature input: names verbatim, values percent-encoded
    /// with everything outside the RFC 3986 unreserved set escaped.
    pub fn to_signature_string(&self) -> String {
        self.join(|value| urlencoding::encode(value).into_owned())
    }

    fn join(&self, encode_value: impl Fn(&str) -> String) -> String {
        let mut out = String::new();
        for (i, (name, value)) in self.pairs.iter().enumerate() {
            if i > 0 {
                out.push('&');
            }
            out.push_str(name);
            out.push('=');
            out.push_str(&encode_value(value));
        }
        out
    }
}

impl fmt::Display for ParameterList {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_query_string())
    }
}
