//! Tagged tree model of a scene document.
//!
//! Arrays are classified once when the JSON is parsed, so the resolver can
//! switch on the tag instead of re-inspecting element types at every level.

use crate::error::{OracleError, Result};
use serde_json::{Map, Number, Value};
use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

#[derive(Debug, Clone, PartialEq)]
pub enum Scalar {
    Null,
    Bool(bool),
    Number(f64),
    String(String),
}

#[derive(Debug, Clone, PartialEq)]
pub enum DocNode {
    Object(BTreeMap<String, DocNode>),
    /// Every element is a number. Empty arrays land here too. Bools are not
    /// numbers here: an array mixing them stays `Mixed` and keeps its bools,
    /// so its floats are not rounded.
    Numbers(Vec<f64>),
    /// Every element is a string, e.g. enumerated attribute names.
    Strings(Vec<String>),
    Mixed(Vec<DocNode>),
    Scalar(Scalar),
}

impl DocNode {
    pub fn from_json(value: &Value) -> Self {
        match value {
            Value::Null => DocNode::Scalar(Scalar::Null),
            Value::Bool(b) => DocNode::Scalar(Scalar::Bool(*b)),
            Value::Number(n) => DocNode::Scalar(Scalar::Number(number_to_f64(n))),
            Value::String(s) => DocNode::Scalar(Scalar::String(s.clone())),
            Value::Array(items) => classify_array(items),
            Value::Object(map) => DocNode::Object(
                map.iter()
                    .map(|(k, v)| (k.clone(), DocNode::from_json(v)))
                    .collect(),
            ),
        }
    }

    pub fn to_json(&self) -> Value {
        match self {
            DocNode::Object(map) => Value::Object(
                map.iter()
                    .map(|(k, v)| (k.clone(), v.to_json()))
                    .collect::<Map<_, _>>(),
            ),
            DocNode::Numbers(values) => {
                Value::Array(values.iter().map(|&v| f64_to_json(v)).collect())
            }
            DocNode::Strings(values) => {
                Value::Array(values.iter().cloned().map(Value::String).collect())
            }
            DocNode::Mixed(items) => Value::Array(items.iter().map(DocNode::to_json).collect()),
            DocNode::Scalar(Scalar::Null) => Value::Null,
            DocNode::Scalar(Scalar::Bool(b)) => Value::Bool(*b),
            DocNode::Scalar(Scalar::Number(n)) => f64_to_json(*n),
            DocNode::Scalar(Scalar::String(s)) => Value::String(s.clone()),
        }
    }

    pub fn as_object(&self) -> Option<&BTreeMap<String, DocNode>> {
        match self {
            DocNode::Object(map) => Some(map),
            _ => None,
        }
    }

    /// Interprets the node as an index into a collection.
    pub fn as_index(&self) -> Option<usize> {
        match self {
            DocNode::Scalar(Scalar::Number(n))
                if n.is_finite() && *n >= 0.0 && n.fract() == 0.0 && *n <= u32::MAX as f64 =>
            {
                Some(*n as usize)
            }
            _ => None,
        }
    }

    /// Number of entries when the node is an array of any flavor.
    pub fn array_len(&self) -> Option<usize> {
        match self {
            DocNode::Numbers(v) => Some(v.len()),
            DocNode::Strings(v) => Some(v.len()),
            DocNode::Mixed(v) => Some(v.len()),
            _ => None,
        }
    }

    /// Element `index` of an array node. Numeric and string leaves yield
    /// scalar nodes.
    pub fn array_element(&self, index: usize) -> Option<DocNode> {
        match self {
            DocNode::Numbers(v) => v.get(index).map(|&n| DocNode::Scalar(Scalar::Number(n))),
            DocNode::Strings(v) => v
                .get(index)
                .map(|s| DocNode::Scalar(Scalar::String(s.clone()))),
            DocNode::Mixed(v) => v.get(index).cloned(),
            _ => None,
        }
    }
}

fn classify_array(items: &[Value]) -> DocNode {
    if items.iter().all(Value::is_number) {
        return DocNode::Numbers(items.iter().filter_map(Value::as_f64).collect());
    }
    if items.iter().all(Value::is_string) {
        return DocNode::Strings(
            items
                .iter()
                .filter_map(Value::as_str)
                .map(str::to_string)
                .collect(),
        );
    }
    DocNode::Mixed(items.iter().map(DocNode::from_json).collect())
}

fn number_to_f64(n: &Number) -> f64 {
    // Integers beyond f64 range don't occur in scene documents; saturate
    n.as_f64().unwrap_or(f64::MAX)
}

fn f64_to_json(v: f64) -> Value {
    if v.fract() == 0.0 && v.abs() < 9.007_199_254_740_992e15 {
        Value::Number(Number::from(v as i64))
    } else {
        Number::from_f64(v).map(Value::Number).unwrap_or(Value::Null)
    }
}

/// A parsed scene document: a root object of named sections.
#[derive(Debug, Clone, PartialEq)]
pub struct Document {
    sections: BTreeMap<String, DocNode>,
}

impl Document {
    pub fn from_value(value: &Value) -> Result<Self> {
        match DocNode::from_json(value) {
            DocNode::Object(sections) => Ok(Self { sections }),
            _ => Err(OracleError::malformed("document root is not an object")),
        }
    }

    pub fn from_json_str(text: &str) -> Result<Self> {
        let value: Value = serde_json::from_str(text).map_err(|source| OracleError::Json {
            path: "<inline>".into(),
            source,
        })?;
        Self::from_value(&value)
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let text = fs::read_to_string(path).map_err(|source| OracleError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let value: Value = serde_json::from_str(&text).map_err(|source| OracleError::Json {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_value(&value)
    }

    pub(crate) fn from_sections(sections: BTreeMap<String, DocNode>) -> Self {
        Self { sections }
    }

    pub fn section(&self, name: &str) -> Option<&DocNode> {
        self.sections.get(name)
    }

    pub fn sections(&self) -> &BTreeMap<String, DocNode> {
        &self.sections
    }

    /// Looks up `collection[index]`, failing on anything that doesn't resolve.
    pub fn lookup(&self, collection: &str, index: usize) -> Result<DocNode> {
        let items = self.sections.get(collection).ok_or_else(|| {
            OracleError::malformed(format!("missing collection '{collection}'"))
        })?;
        let len = items.array_len().ok_or_else(|| {
            OracleError::malformed(format!("collection '{collection}' is not an array"))
        })?;
        items.array_element(index).ok_or_else(|| {
            OracleError::malformed(format!(
                "index {index} out of range for '{collection}' (len {len})"
            ))
        })
    }

    pub fn to_json(&self) -> Value {
        DocNode::Object(self.sections.clone()).to_json()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn arrays_are_tagged_once() {
        let node = DocNode::from_json(&json!({
            "translation": [1, 2.5, -3],
            "targets": ["POSITION", "NORMAL"],
            "primitives": [{"mode": 4}, 7],
            "empty": []
        }));
        let map = node.as_object().expect("object");
        assert_eq!(map["translation"], DocNode::Numbers(vec![1.0, 2.5, -3.0]));
        assert!(matches!(map["targets"], DocNode::Strings(_)));
        assert!(matches!(map["primitives"], DocNode::Mixed(_)));
        assert_eq!(map["empty"], DocNode::Numbers(vec![]));
    }

    #[test]
    fn bools_keep_an_array_mixed() {
        let node = DocNode::from_json(&json!([true, 0.30000000000000004]));
        assert!(matches!(node, DocNode::Mixed(_)));
        assert_eq!(node.to_json(), json!([true, 0.30000000000000004]));
    }

    #[test]
    fn integral_numbers_serialize_back_as_integers() {
        let value = json!({"mesh": 3, "scale": [0.5, 2]});
        assert_eq!(DocNode::from_json(&value).to_json(), value);
    }

    #[test]
    fn index_requires_non_negative_integer() {
        assert_eq!(DocNode::Scalar(Scalar::Number(2.0)).as_index(), Some(2));
        assert_eq!(DocNode::Scalar(Scalar::Number(-1.0)).as_index(), None);
        assert_eq!(DocNode::Scalar(Scalar::Number(1.5)).as_index(), None);
        assert_eq!(DocNode::Scalar(Scalar::String("0".into())).as_index(), None);
    }

    #[test]
    fn lookup_reports_bad_indices() {
        let doc = Document::from_value(&json!({"cameras": [{"type": "perspective"}]}))
            .expect("document");
        assert!(doc.lookup("cameras", 0).is_ok());
        assert!(matches!(
            doc.lookup("cameras", 1),
            Err(OracleError::MalformedDocument(_))
        ));
        assert!(matches!(
            doc.lookup("meshes", 0),
            Err(OracleError::MalformedDocument(_))
        ));
    }

    #[test]
    fn root_must_be_an_object() {
        assert!(Document::from_value(&json!([1, 2])).is_err());
        assert!(Document::from_json_str("{ not json").is_err());
    }
}
