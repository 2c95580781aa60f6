use std::path::{Path, PathBuf};

use super::transform::{OutputFormat, TransformError};

pub const JSONL_EXTENSION: &str = "jsonl";

/// Lists the `.jsonl` files directly inside `dir`, sorted by name.
/// Subdirectories are not walked.
pub fn jsonl_files_in(dir: &Path) -> Result<Vec<PathBuf>, TransformError> {
    let entries = std::fs::read_dir(dir).map_err(|source| TransformError::ListDir {
        path: dir.to_path_buf(),
        source,
    })?;

    let mut files = Vec::new();
    for entry in entries {
        let entry = entry.map_err(|source| TransformError::ListDir {
            path: dir.to_path_buf(),
            source,
        })?;
        let path = entry.path();
        let is_jsonl = path
            .extension()
            .and_then(|extension| extension.to_str())
            .map(|extension| extension.eq_ignore_ascii_case(JSONL_EXTENSION))
            .unwrap_or(false);
        if is_jsonl && path.is_file() {
            files.push(path);
        }
    }
    files.sort();
    Ok(files)
}

/// Output file path for an input: the input stem plus the format suffix,
/// inside `output_dir`. `data.jsonl` becomes `data_transformed.jsonl` or
/// `data_bedrock.jsonl`.
pub fn output_path_for(input_path: &Path, output_dir: &Path, format: OutputFormat) -> PathBuf {
    let stem = input_path
        .file_stem()
        .and_then(|stem| stem.to_str())
        .unwrap_or("output");
    output_dir.join(format!("{}{}.jsonl", stem, format.output_suffix()))
}

pub fn ensure_dir(dir: &Path) -> Result<(), TransformError> {
    std::fs::create_dir_all(dir).map_err(|source| TransformError::Create {
        path: dir.to_path_buf(),
        source,
    })
}
