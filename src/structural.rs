//! Structural equality of two scene documents after normalization.

use crate::config::SchemaConfig;
use crate::document::{DocNode, Document};
use crate::error::{OracleError, Result};
use crate::normalize::{NormalizedDocument, Normalizer};
use serde::Serialize;
use serde_json::Value;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SectionMismatch {
    pub section: String,
    pub actual: Value,
    pub expected: Value,
}

/// Nodes left over after pairing equal nodes one to one.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct NodeMismatch {
    /// Expected nodes with no counterpart in the actual document.
    pub missing: Vec<Value>,
    /// Actual nodes with no counterpart in the expected document.
    pub unexpected: Vec<Value>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum StructuralFailure {
    ScalarSections,
    NodeMultiset,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct StructuralReport {
    pub section_mismatches: Vec<SectionMismatch>,
    pub node_mismatch: Option<NodeMismatch>,
    pub actual_nodes: usize,
    pub expected_nodes: usize,
}

impl StructuralReport {
    pub fn is_match(&self) -> bool {
        self.section_mismatches.is_empty() && self.node_mismatch.is_none()
    }

    /// Every failure mode present, scalar sections first.
    pub fn failures(&self) -> Vec<StructuralFailure> {
        let mut out = Vec::new();
        if !self.section_mismatches.is_empty() {
            out.push(StructuralFailure::ScalarSections);
        }
        if self.node_mismatch.is_some() {
            out.push(StructuralFailure::NodeMultiset);
        }
        out
    }
}

pub struct StructuralComparator {
    schema: SchemaConfig,
}

impl StructuralComparator {
    pub fn new(schema: SchemaConfig) -> Self {
        Self { schema }
    }

    pub fn schema(&self) -> &SchemaConfig {
        &self.schema
    }

    pub fn normalize(&self, document: &Document) -> Result<NormalizedDocument> {
        Normalizer::new(&self.schema).normalize(document)
    }

    pub fn compare(&self, actual: &Document, expected: &Document) -> Result<StructuralReport> {
        let actual = self.normalize(actual)?;
        let expected = self.normalize(expected)?;
        self.compare_normalized(&actual, &expected)
    }

    pub fn compare_normalized(
        &self,
        actual: &NormalizedDocument,
        expected: &NormalizedDocument,
    ) -> Result<StructuralReport> {
        let mut section_mismatches = Vec::new();
        for name in &self.schema.scalar_sections {
            let a = required_section(actual, name, "actual")?;
            let e = required_section(expected, name, "expected")?;
            if a != e {
                section_mismatches.push(SectionMismatch {
                    section: name.clone(),
                    actual: a.to_json(),
                    expected: e.to_json(),
                });
            }
        }

        Ok(StructuralReport {
            section_mismatches,
            node_mismatch: multiset_difference(actual.nodes(), expected.nodes()),
            actual_nodes: actual.nodes().len(),
            expected_nodes: expected.nodes().len(),
        })
    }
}

fn required_section<'d>(
    document: &'d NormalizedDocument,
    name: &str,
    side: &str,
) -> Result<&'d DocNode> {
    document
        .section(name)
        .ok_or_else(|| OracleError::malformed(format!("{side} document has no '{name}' section")))
}

// Nodes hold floats, so there is no Hash/Ord to bucket by; pair greedily instead.
fn multiset_difference(actual: &[DocNode], expected: &[DocNode]) -> Option<NodeMismatch> {
    let mut matched = vec![false; expected.len()];
    let mut unexpected = Vec::new();

    for node in actual {
        let slot = (0..expected.len()).find(|&i| !matched[i] && expected[i] == *node);
        match slot {
            Some(i) => matched[i] = true,
            None => unexpected.push(node.to_json()),
        }
    }

    let missing: Vec<Value> = expected
        .iter()
        .zip(&matched)
        .filter(|(_, m)| !**m)
        .map(|(node, _)| node.to_json())
        .collect();

    if missing.is_empty() && unexpected.is_empty() {
        None
    } else {
        Some(NodeMismatch {
            missing,
            unexpected,
        })
    }
}
