// Pipeline ingestion: reading raw records from files on disk

use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

use crate::error::{ImportError, Result};
use crate::pipeline::processing::normalize::RawInput;

/// Load raw inputs from files or directories, in the order given.
///
/// `.json` files hold one discovery record or an array of them; any other
/// file is read as an export document. Directories are expanded to their
/// files sorted by name.
pub fn load_inputs<P: AsRef<Path>>(paths: &[P]) -> Result<Vec<RawInput>> {
    let mut inputs = Vec::new();
    for path in paths {
        let path = path.as_ref();
        if path.is_dir() {
            for file in list_files(path)? {
                inputs.extend(load_file(&file)?);
            }
        } else {
            inputs.extend(load_file(path)?);
        }
    }
    info!("Loaded {} raw records from {} path(s)", inputs.len(), paths.len());
    Ok(inputs)
}

fn list_files(dir: &Path) -> Result<Vec<PathBuf>> {
    let mut files: Vec<PathBuf> = fs::read_dir(dir)?
        .filter_map(|entry| entry.ok().map(|e| e.path()))
        .filter(|p| p.is_file())
        .collect();
    files.sort();
    Ok(files)
}

fn load_file(path: &Path) -> Result<Vec<RawInput>> {
    let content = fs::read_to_string(path).map_err(|e| {
        ImportError::Parse(format!("failed to read '{}': {}", path.display(), e))
    })?;

    let is_json = path
        .extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| ext.eq_ignore_ascii_case("json"));
    if !is_json {
        debug!("Read export document {}", path.display());
        return Ok(vec![RawInput::Export(content)]);
    }

    let value: serde_json::Value = serde_json::from_str(&content)?;
    let records = match value {
        serde_json::Value::Array(items) => items.into_iter().map(RawInput::Discovery).collect(),
        other => vec![RawInput::Discovery(other)],
    };
    debug!("Read {} discovery record(s) from {}", records.len(), path.display());
    Ok(records)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_loads_arrays_documents_and_directories() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(
            dir.path().join("a_discovered.json"),
            r#"[{"source": "x", "source_event_id": "1"}, {"source": "x", "source_event_id": "2"}]"#,
        )
        .unwrap();
        fs::write(dir.path().join("b_show.md"), "+++\nschema_version = \"1.0\"\n+++\n").unwrap();

        let inputs = load_inputs(&[dir.path()]).unwrap();
        assert_eq!(inputs.len(), 3);
        assert!(matches!(inputs[0], RawInput::Discovery(_)));
        assert!(matches!(inputs[2], RawInput::Export(_)));
    }

    #[test]
    fn test_invalid_json_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("broken.json");
        fs::write(&path, "{ not json").unwrap();
        assert!(matches!(load_inputs(&[&path]), Err(ImportError::Json(_))));
    }
}
