//! Inlines index references so comparisons don't depend on export order.

use crate::config::SchemaConfig;
use crate::document::{DocNode, Document};
use crate::error::{OracleError, Result};
use crate::rounding::round_leaf;
use log::trace;
use std::collections::BTreeMap;

/// Rebuilds a subtree with identity fields dropped, reference fields replaced
/// by the objects they point at, and numeric leaves rounded.
pub struct Resolver<'a> {
    schema: &'a SchemaConfig,
}

impl<'a> Resolver<'a> {
    pub fn new(schema: &'a SchemaConfig) -> Self {
        Self { schema }
    }

    /// Resolves `subtree` against the collections of `document`. Neither input
    /// is modified.
    pub fn resolve(&self, document: &Document, subtree: &DocNode) -> Result<DocNode> {
        let mut chain = Vec::new();
        self.resolve_node(document, subtree, &mut chain)
    }

    // `chain` holds the (collection, index) entries currently being inlined.
    // Re-entering one of them would never terminate.
    fn resolve_node(
        &self,
        document: &Document,
        node: &DocNode,
        chain: &mut Vec<(&'a str, usize)>,
    ) -> Result<DocNode> {
        match node {
            DocNode::Object(map) => {
                let mut out = BTreeMap::new();
                for (key, value) in map {
                    if self.schema.identity_fields.contains(key) {
                        continue;
                    }
                    let resolved = match self.schema.reference_fields.get(key) {
                        Some(collection) => self.inline(document, key, collection, value, chain)?,
                        None => self.resolve_node(document, value, chain)?,
                    };
                    out.insert(key.clone(), resolved);
                }
                Ok(DocNode::Object(out))
            }
            DocNode::Numbers(values) => Ok(DocNode::Numbers(round_leaf(
                values,
                self.schema.precision,
            ))),
            DocNode::Strings(_) | DocNode::Scalar(_) => Ok(node.clone()),
            DocNode::Mixed(items) => items
                .iter()
                .map(|item| self.resolve_node(document, item, chain))
                .collect::<Result<Vec<_>>>()
                .map(DocNode::Mixed),
        }
    }

    fn inline(
        &self,
        document: &Document,
        key: &str,
        collection: &'a str,
        value: &DocNode,
        chain: &mut Vec<(&'a str, usize)>,
    ) -> Result<DocNode> {
        let index = value.as_index().ok_or_else(|| {
            OracleError::malformed(format!(
                "field '{key}' must hold an index into '{collection}', found {}",
                value.to_json()
            ))
        })?;
        if chain.contains(&(collection, index)) {
            return Err(OracleError::ReferenceCycle {
                collection: collection.to_string(),
                index,
            });
        }
        let target = document.lookup(collection, index)?;
        trace!("inlining {collection}[{index}] for '{key}'");

        chain.push((collection, index));
        let resolved = self.resolve_node(document, &target, chain);
        chain.pop();
        resolved
    }
}
