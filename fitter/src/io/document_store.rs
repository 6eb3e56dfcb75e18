//! Document load/save helpers with schema + invariant validation.

use std::fs;
use std::path::Path;

use anyhow::{Context, Result, anyhow};
use jsonschema::validator_for;
use serde_json::Value;

use crate::core::invariants::validate_invariants;
use crate::document::LayoutDocument;

/// JSON Schema for layout documents on disk.
pub const DOCUMENT_SCHEMA: &str = include_str!("../../schemas/layout_document.schema.json");

/// Load and validate a document from disk (schema + invariants).
pub fn load_document(path: &Path) -> Result<LayoutDocument> {
    let contents =
        fs::read_to_string(path).with_context(|| format!("read document {}", path.display()))?;
    parse_document(&contents).with_context(|| format!("load document {}", path.display()))
}

/// Validate and deserialize a document from JSON text.
pub fn parse_document(contents: &str) -> Result<LayoutDocument> {
    let value: Value = serde_json::from_str(contents).context("parse document json")?;
    validate_schema(&value)?;
    let document: LayoutDocument =
        serde_json::from_value(value).context("deserialize document")?;
    check_invariants(&document)?;
    Ok(document)
}

/// Atomically write a document to disk (temp file + rename).
pub fn write_document(path: &Path, document: &LayoutDocument) -> Result<()> {
    check_invariants(document)?;
    let mut buf = serde_json::to_string_pretty(document).context("serialize document")?;
    buf.push('\n');
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)
            .with_context(|| format!("create directory {}", parent.display()))?;
    }
    let tmp_path = path.with_extension("json.tmp");
    fs::write(&tmp_path, buf)
        .with_context(|| format!("write temp document {}", tmp_path.display()))?;
    fs::rename(&tmp_path, path).with_context(|| format!("replace document {}", path.display()))
}

fn validate_schema(document: &Value) -> Result<()> {
    let schema_value: Value =
        serde_json::from_str(DOCUMENT_SCHEMA).context("parse embedded document schema")?;
    let compiled =
        validator_for(&schema_value).map_err(|err| anyhow!("invalid schema: {}", err))?;
    if !compiled.is_valid(document) {
        let messages = compiled
            .iter_errors(document)
            .map(|err| err.to_string())
            .collect::<Vec<_>>();
        return Err(anyhow!(
            "document schema validation failed: {}",
            messages.join("; ")
        ));
    }
    Ok(())
}

fn check_invariants(document: &LayoutDocument) -> Result<()> {
    let errors = validate_invariants(document);
    if errors.is_empty() {
        return Ok(());
    }
    Err(anyhow!("document invariants failed: {}", errors.join("; ")))
}
