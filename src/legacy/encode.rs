//! Encoding of typed values into the legacy signed parameter convention.
//!
//! Every record type publishes its fields once, as an ordered table of
//! `(name, accessor)` pairs. Both the flat parameter list and the SOAP body
//! fragment are produced from that table, so the two can never disagree on
//! field order.

use crate::legacy::params::{ParameterList, EMPTY_COLLECTION_PLACEHOLDER};

static XSD_STRING: &str = "xsd:string";
static XSD_INT: &str = "xsd:int";
static XSD_BOOLEAN: &str = "xsd:boolean";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FieldValue {
    Str(String),
    Int(i64),
    Bool(bool),
}

impl FieldValue {
    pub fn xsd_type(&self) -> &'static str {
        match self {
            FieldValue::Str(_) => XSD_STRING,
            FieldValue::Int(_) => XSD_INT,
            FieldValue::Bool(_) => XSD_BOOLEAN,
        }
    }

    /// Value as it appears in the parameter list. Booleans follow the
    /// server's string conversion: `true` is `1`, `false` is empty.
    pub fn param_value(&self) -> String {
        match self {
            FieldValue::Str(value) => value.clone(),
            FieldValue::Int(value) => value.to_string(),
            FieldValue::Bool(true) => "1".to_owned(),
            FieldValue::Bool(false) => String::new(),
        }
    }

    pub fn body_value(&self) -> String {
        match self {
            FieldValue::Str(value) => escape_xml(value),
            FieldValue::Int(value) => value.to_string(),
            FieldValue::Bool(value) => value.to_string(),
        }
    }

    fn body_element(&self, name: &str) -> String {
        format!(
            r#"<{name} xsi:type="{}">{}</{name}>"#,
            self.xsd_type(),
            self.body_value()
        )
    }
}

/// One entry of a record's field table.
pub struct Field<T> {
    pub name: &'static str,
    pub value: fn(&T) -> FieldValue,
}

/// A record type of the remote schema.
pub trait LegacyRecord: Sized + 'static {
    /// Schema type name, e.g. `DnsEntry`.
    const TYPE_NAME: &'static str;

    /// Fields in the order fixed by the remote schema.
    fn fields() -> &'static [Field<Self>];
}

pub trait LegacyEncode {
    fn encode_params(&self, prefix: &str) -> ParameterList;
    fn encode_body(&self, key: &str) -> String;
}

/// `prefix[field]` for every field of `record`.
pub fn encode_record_params<T: LegacyRecord>(record: &T, prefix: &str) -> ParameterList {
    let mut params = ParameterList::new();
    push_record_params(&mut params, record, prefix);
    params
}

fn push_record_params<T: LegacyRecord>(params: &mut ParameterList, record: &T, prefix: &str) {
    for field in T::fields() {
        params.add(format!("{}[{}]", prefix, field.name), (field.value)(record).param_value());
    }
}

fn record_body_elements<T: LegacyRecord>(record: &T, indent: &str) -> String {
    let mut out = String::new();
    for field in T::fields() {
        out.push_str(indent);
        out.push_str(&(field.value)(record).body_element(field.name));
        out.push('\n');
    }
    out
}

pub fn encode_record_body<T: LegacyRecord>(record: &T, key: &str) -> String {
    format!(
        "<{key} xsi:type=\"ns1:{}\">\n{}</{key}>",
        T::TYPE_NAME,
        record_body_elements(record, "  ")
    )
}

/// `prefix[index][field]` for every item, or the placeholder when empty.
pub fn encode_collection_params<T: LegacyRecord>(items: &[T], prefix: &str) -> ParameterList {
    let mut params = ParameterList::new();
    if items.is_empty() {
        params.add(EMPTY_COLLECTION_PLACEHOLDER, "");
        return params;
    }
    for (index, item) in items.iter().enumerate() {
        push_record_params(&mut params, item, &format!("{}[{}]", prefix, index));
    }
    params
}

pub fn encode_collection_body<T: LegacyRecord>(items: &[T], key: &str) -> String {
    let mut out = format!(
        "<{key} SOAP-ENC:arrayType=\"ns1:{type_name}[{len}]\" xsi:type=\"ns1:ArrayOf{type_name}\">\n",
        type_name = T::TYPE_NAME,
        len = items.len(),
    );
    for item in items {
        out.push_str(&format!("  <item xsi:type=\"ns1:{}\">\n", T::TYPE_NAME));
        out.push_str(&record_body_elements(item, "    "));
        out.push_str("  </item>\n");
    }
    out.push_str(&format!("</{key}>"));
    out
}

impl<T: LegacyRecord> LegacyEncode for [T] {
    fn encode_params(&self, prefix: &str) -> ParameterList {
        encode_collection_params(self, prefix)
    }

    fn encode_body(&self, key: &str) -> String {
        encode_collection_body(self, key)
    }
}

impl<T: LegacyRecord> LegacyEncode for Vec<T> {
    fn encode_params(&self, prefix: &str) -> ParameterList {
        encode_collection_params(self, prefix)
    }

    fn encode_body(&self, key: &str) -> String {
        encode_collection_body(self, key)
    }
}

/// Implements [`LegacyEncode`] for record types through their field table.
#[macro_export]
macro_rules! impl_legacy_record_encode {
    ($($record:ty),+ $(,)?) => {
        $(
            impl $crate::legacy::encode::LegacyEncode for $record {
                fn encode_params(&self, prefix: &str) -> $crate::legacy::params::ParameterList {
                    $crate::legacy::encode::encode_record_params(self, prefix)
                }

                fn encode_body(&self, key: &str) -> String {
                    $crate::legacy::encode::encode_record_body(self, key)
                }
            }
        )+
    };
}

fn scalar_params(prefix: &str, value: FieldValue) -> ParameterList {
    let mut params = ParameterList::new();
    params.add(prefix, value.param_value());
    params
}

impl LegacyEncode for str {
    fn encode_params(&self, prefix: &str) -> ParameterList {
        scalar_params(prefix, FieldValue::Str(self.to_owned()))
    }

    fn encode_body(&self, key: &str) -> String {
        FieldValue::Str(self.to_owned()).body_element(key)
    }
}

impl LegacyEncode for String {
    fn encode_params(&self, prefix: &str) -> ParameterList {
        self.as_str().encode_params(prefix)
    }

    fn encode_body(&self, key: &str) -> String {
        self.as_str().encode_body(key)
    }
}

impl LegacyEncode for i64 {
    fn encode_params(&self, prefix: &str) -> ParameterList {
        scalar_params(prefix, FieldValue::Int(*self))
    }

    fn encode_body(&self, key: &str) -> String {
        FieldValue::Int(*self).body_element(key)
    }
}

impl LegacyEncode for bool {
    fn encode_params(&self, prefix: &str) -> ParameterList {
        scalar_params(prefix, FieldValue::Bool(*self))
    }

    fn encode_body(&self, key: &str) -> String {
        FieldValue::Bool(*self).body_element(key)
    }
}

fn escape_xml(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    for c in value.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            _ => out.push(c),
        }
    }
    out
}
