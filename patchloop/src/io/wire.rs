//! Loading collaborator JSON (change batches, requirements) with schema checks.
//!
//! JSON is validated against the embedded schemas first so the collaborator
//! gets every structural problem at once; typed decoding then enforces the
//! rules a schema cannot express well (exactly-one variant, hunk ranges).

use std::fs;
use std::path::Path;

use anyhow::{Context, Result, anyhow};
use jsonschema::validator_for;
use serde::de::DeserializeOwned;
use serde_json::Value;

use crate::core::types::{ChangeBatch, Requirement};

pub const CHANGE_BATCH_SCHEMA: &str = include_str!("../../schemas/change_batch.schema.json");
pub const REQUIREMENT_SCHEMA: &str = include_str!("../../schemas/requirement.schema.json");

/// Which wire document a schema describes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Document {
    ChangeBatch,
    Requirement,
}

impl Document {
    pub fn schema(self) -> &'static str {
        match self {
            Document::ChangeBatch => CHANGE_BATCH_SCHEMA,
            Document::Requirement => REQUIREMENT_SCHEMA,
        }
    }

    fn label(self) -> &'static str {
        match self {
            Document::ChangeBatch => "change batch",
            Document::Requirement => "requirement",
        }
    }
}

pub fn parse_change_batch(raw: &str) -> Result<ChangeBatch> {
    parse_document(Document::ChangeBatch, raw)
}

pub fn parse_requirement(raw: &str) -> Result<Requirement> {
    parse_document(Document::Requirement, raw)
}

pub fn load_change_batch(path: &Path) -> Result<ChangeBatch> {
    let raw = fs::read_to_string(path).with_context(|| format!("read {}", path.display()))?;
    parse_change_batch(&raw).with_context(|| format!("load {}", path.display()))
}

pub fn load_requirement(path: &Path) -> Result<Requirement> {
    let raw = fs::read_to_string(path).with_context(|| format!("read {}", path.display()))?;
    parse_requirement(&raw).with_context(|| format!("load {}", path.display()))
}

fn parse_document<T: DeserializeOwned>(doc: Document, raw: &str) -> Result<T> {
    let value: Value =
        serde_json::from_str(raw).with_context(|| format!("parse {} json", doc.label()))?;
    validate_schema(doc, &value)?;
    serde_json::from_value(value).with_context(|| format!("decode {}", doc.label()))
}

fn validate_schema(doc: Document, instance: &Value) -> Result<()> {
    let schema: Value = serde_json::from_str(doc.schema())
        .with_context(|| format!("parse {} schema", doc.label()))?;
    let validator = validator_for(&schema).map_err(|err| anyhow!("invalid schema: {}", err))?;
    let messages = validator
        .iter_errors(instance)
        .map(|err| err.to_string())
        .collect::<Vec<_>>();
    if !messages.is_empty() {
        return Err(anyhow!(
            "{} schema validation failed:\n- {}",
            doc.label(),
            messages.join("\n- ")
        ));
    }
    Ok(())
}
