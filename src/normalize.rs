//! Produces the comparison form of a scene document.

use crate::config::SchemaConfig;
use crate::document::{DocNode, Document};
use crate::error::{OracleError, Result};
use crate::resolver::Resolver;
use log::debug;
use serde_json::Value;

/// A document with its payload collection removed and every node fully
/// inlined. Sections other than `nodes` are carried over untouched.
#[derive(Debug, Clone, PartialEq)]
pub struct NormalizedDocument {
    document: Document,
    nodes: Vec<DocNode>,
}

impl NormalizedDocument {
    pub fn nodes(&self) -> &[DocNode] {
        &self.nodes
    }

    pub fn section(&self, name: &str) -> Option<&DocNode> {
        self.document.section(name)
    }

    pub fn to_json(&self) -> Value {
        let mut value = self.document.to_json();
        if let Value::Object(map) = &mut value {
            map.insert(
                "nodes".to_string(),
                Value::Array(self.nodes.iter().map(DocNode::to_json).collect()),
            );
        }
        value
    }
}

pub struct Normalizer<'a> {
    schema: &'a SchemaConfig,
}

impl<'a> Normalizer<'a> {
    pub fn new(schema: &'a SchemaConfig) -> Self {
        Self { schema }
    }

    pub fn normalize(&self, document: &Document) -> Result<NormalizedDocument> {
        let mut sections = document.sections().clone();
        sections.remove(&self.schema.payload_collection);

        let nodes = match sections.remove("nodes") {
            Some(DocNode::Mixed(items)) => items,
            // an empty `nodes` array parses as a numeric leaf
            Some(DocNode::Numbers(items)) if items.is_empty() => Vec::new(),
            Some(_) => return Err(OracleError::malformed("'nodes' is not an array of objects")),
            None => return Err(OracleError::malformed("missing 'nodes' section")),
        };

        let context = Document::from_sections(sections);
        let resolver = Resolver::new(self.schema);
        let nodes = nodes
            .iter()
            .map(|node| resolver.resolve(&context, node))
            .collect::<Result<Vec<_>>>()?;
        debug!("normalized document with {} nodes", nodes.len());

        Ok(NormalizedDocument {
            document: context,
            nodes,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn input_is_left_untouched() {
        let schema = SchemaConfig::default();
        let document = Document::from_value(&json!({
            "buffers": [{"byteLength": 12, "uri": "data:..."}],
            "cameras": [{"name": "cam", "type": "orthographic"}],
            "nodes": [{"camera": 0, "name": "n0"}]
        }))
        .expect("document");
        let before = document.clone();

        let normalized = Normalizer::new(&schema).normalize(&document).expect("normalize");
        assert_eq!(document, before);
        assert!(normalized.section("buffers").is_none());
        assert_eq!(
            normalized.nodes()[0].to_json(),
            json!({"camera": {"type": "orthographic"}})
        );
    }

    #[test]
    fn missing_nodes_is_malformed() {
        let schema = SchemaConfig::default();
        let document = Document::from_value(&json!({"scene": 0})).expect("document");
        assert!(matches!(
            Normalizer::new(&schema).normalize(&document),
            Err(OracleError::MalformedDocument(_))
        ));
    }

    #[test]
    fn references_into_the_payload_collection_fail() {
        let mut schema = SchemaConfig::default();
        schema.identity_fields.clear();
        schema
            .reference_fields
            .insert("buffer".to_string(), "buffers".to_string());
        let document = Document::from_value(&json!({
            "buffers": [{"byteLength": 4}],
            "nodes": [{"buffer": 0}]
        }))
        .expect("document");
        assert!(Normalizer::new(&schema).normalize(&document).is_err());
    }
}
