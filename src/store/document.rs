//! Parsing of product configuration files.
//!
//! A file is a YAML mapping whose only recognized field is `configs`, a
//! mapping of key to scalar. Scalars are stored as strings.

use std::path::Path;

use serde_yaml::Value;

use crate::store::ProductConfig;

/// Why a document could not be turned into a product map.
#[derive(Debug, thiserror::Error)]
pub enum DocumentError {
    #[error(transparent)]
    Yaml(#[from] serde_yaml::Error),
    #[error("{0}")]
    Shape(String),
}

/// Parse the text of a configuration file.
pub fn parse(content: &str) -> Result<ProductConfig, DocumentError> {
    if content.trim().is_empty() {
        return Ok(ProductConfig::new());
    }

    let root: Value = serde_yaml::from_str(content)?;
    let root = match root {
        Value::Null => return Ok(ProductConfig::new()),
        Value::Mapping(map) => map,
        other => {
            return Err(DocumentError::Shape(format!(
                "top level must be a mapping, found {}",
                kind(&other)
            )))
        }
    };

    let configs = match root.get("configs") {
        None | Some(Value::Null) => return Ok(ProductConfig::new()),
        Some(Value::Mapping(map)) => map,
        Some(other) => {
            return Err(DocumentError::Shape(format!(
                "`configs` must be a mapping, found {}",
                kind(other)
            )))
        }
    };

    let mut out = ProductConfig::with_capacity(configs.len());
    for (key, value) in configs {
        let key = scalar(key)
            .ok_or_else(|| DocumentError::Shape(format!("key must be a scalar, found {}", kind(key))))?;
        let value = scalar(value).ok_or_else(|| {
            DocumentError::Shape(format!("value of `{}` must be a scalar, found {}", key, kind(value)))
        })?;
        out.insert(key, value);
    }
    Ok(out)
}

/// Product owning a file: the name of its immediate parent directory.
pub fn product_for(path: &Path) -> Option<String> {
    path.parent()?
        .file_name()?
        .to_str()
        .filter(|name| !name.is_empty())
        .map(str::to_owned)
}

/// True for files the store loads.
pub fn is_config_file(path: &Path) -> bool {
    path.extension().is_some_and(|ext| ext == "yml")
}

fn scalar(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        Value::Null => Some(String::new()),
        Value::Tagged(tagged) => scalar(&tagged.value),
        Value::Sequence(_) | Value::Mapping(_) => None,
    }
}

fn kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Sequence(_) => "a sequence",
        Value::Mapping(_) => "a mapping",
        Value::Tagged(_) => "a tagged value",
    }
}
