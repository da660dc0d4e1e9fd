use super::ensure_unique_ids;
use crate::models::IndexNode;

#[derive(Debug, thiserror::Error)]
pub enum BackupError {
    #[error("backup is not valid JSON: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("backup must be a JSON array of index nodes")]
    NotAnArray,
}

/// Pretty JSON of the full tree, content included.
pub fn export_backup(tree: &[IndexNode]) -> Result<String, BackupError> {
    Ok(serde_json::to_string_pretty(tree)?)
}

/// Parse a backup produced by [`export_backup`]. Ids are made unique on the way in.
pub fn import_backup(json: &str) -> Result<Vec<IndexNode>, BackupError> {
    let value: serde_json::Value = serde_json::from_str(json)?;
    if !value.is_array() {
        return Err(BackupError::NotAnArray);
    }
    let tree: Vec<IndexNode> = serde_json::from_value(value)?;
    Ok(ensure_unique_ids(&tree))
}
