use std::fs::File;
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};

use serde::Serialize;
use serde_json::Value;
use thiserror::Error;
use tracing::{debug, error, info, warn};

use super::conversation::convert_conversation;
use super::files::{ensure_dir, jsonl_files_in, output_path_for};
use super::record::{extract_prompt_completion, RecordError};

/// File-level failures. Unlike [`RecordError`] these abort the current file,
/// though never the rest of a batch.
#[derive(Error, Debug)]
pub enum TransformError {
    #[error("failed to open {}: {source}", path.display())]
    Open { path: PathBuf, source: std::io::Error },
    #[error("failed to create {}: {source}", path.display())]
    Create { path: PathBuf, source: std::io::Error },
    #[error("failed to read {}: {source}", path.display())]
    Read { path: PathBuf, source: std::io::Error },
    #[error("failed to write {}: {source}", path.display())]
    Write { path: PathBuf, source: std::io::Error },
    #[error("failed to list {}: {source}", path.display())]
    ListDir { path: PathBuf, source: std::io::Error },
    #[error("no .jsonl files found in {}", path.display())]
    NoInputFiles { path: PathBuf },
}

/// Target shape for converted records.
#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum OutputFormat {
    /// Last user turn and last assistant turn as `{prompt, completion}`.
    PromptCompletion,
    /// Bedrock conversation schema with `[{text}]` content blocks.
    Conversation,
}

impl OutputFormat {
    /// Suffix appended to the input file stem when naming the output file.
    pub fn output_suffix(&self) -> &'static str {
        match self {
            OutputFormat::PromptCompletion => "_transformed",
            OutputFormat::Conversation => "_bedrock",
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            OutputFormat::PromptCompletion => "prompt-completion",
            OutputFormat::Conversation => "conversation",
        }
    }
}

/// Outcome of converting one file.
#[derive(Debug, Clone, Serialize)]
pub struct FileReport {
    pub input_path: PathBuf,
    pub output_path: PathBuf,
    /// Non-empty lines seen, including ones that failed to convert.
    pub records_read: usize,
    pub records_written: usize,
    /// One human-readable entry per skipped record, or the file-level
    /// failure when the file could not be processed at all.
    pub errors: Vec<String>,
    aborted: bool,
}

impl FileReport {
    fn new(input_path: &Path, output_path: &Path) -> Self {
        Self {
            input_path: input_path.to_path_buf(),
            output_path: output_path.to_path_buf(),
            records_read: 0,
            records_written: 0,
            errors: Vec::new(),
            aborted: false,
        }
    }

    fn aborted(input_path: &Path, output_path: &Path, error: &TransformError) -> Self {
        let mut report = Self::new(input_path, output_path);
        report.errors.push(error.to_string());
        report.aborted = true;
        report
    }

    /// A file counts as successful when at least one record came out of it.
    /// An empty input file is also a success, there was nothing to lose.
    pub fn success(&self) -> bool {
        !self.aborted && (self.records_written > 0 || self.records_read == 0)
    }
}

/// Aggregated outcome of a directory run.
#[derive(Debug, Default, Serialize)]
pub struct BatchReport {
    pub files: Vec<FileReport>,
}

impl BatchReport {
    pub fn files_succeeded(&self) -> usize {
        self.files.iter().filter(|report| report.success()).count()
    }

    pub fn files_failed(&self) -> usize {
        self.files.len() - self.files_succeeded()
    }

    pub fn all_succeeded(&self) -> bool {
        self.files_failed() == 0
    }

    pub fn total_records_read(&self) -> usize {
        self.files.iter().map(|report| report.records_read).sum()
    }

    pub fn total_records_written(&self) -> usize {
        self.files.iter().map(|report| report.records_written).sum()
    }

    pub fn total_errors(&self) -> usize {
        self.files.iter().map(|report| report.errors.len()).sum()
    }
}

/// Line-by-line JSONL converter.
///
/// Reads one record per line, reshapes it into the configured
/// [`OutputFormat`] and writes it to the output file. Empty lines are
/// skipped silently; malformed or incomplete records are logged, counted
/// and skipped. I/O is synchronous, the files involved are small.
pub struct Transformer {
    format: OutputFormat,
}

impl Transformer {
    pub fn new(format: OutputFormat) -> Self {
        Self { format }
    }

    pub fn format(&self) -> OutputFormat {
        self.format
    }

    /// Converts a single file, returning counts and per-record errors.
    pub fn transform_file(
        &self,
        input_path: &Path,
        output_path: &Path,
    ) -> Result<FileReport, TransformError> {
        let input = File::open(input_path).map_err(|source| TransformError::Open {
            path: input_path.to_path_buf(),
            source,
        })?;
        let reader = BufReader::new(input);
        let output = File::create(output_path).map_err(|source| TransformError::Create {
            path: output_path.to_path_buf(),
            source,
        })?;
        let mut writer = BufWriter::new(output);

        let mut report = FileReport::new(input_path, output_path);
        for (index, line) in reader.lines().enumerate() {
            let line_number = index + 1;
            let line = line.map_err(|source| TransformError::Read {
                path: input_path.to_path_buf(),
                source,
            })?;
            let line = line.trim();
            if line.is_empty() {
                continue;
            }
            report.records_read += 1;

            let serialized = match self.convert_line(line) {
                Ok(serialized) => serialized,
                Err(err) => {
                    warn!(
                        "skipping line {} of {}: {}",
                        line_number,
                        input_path.display(),
                        err
                    );
                    report.errors.push(format!("line {}: {}", line_number, err));
                    continue;
                }
            };

            writer
                .write_all(serialized.as_bytes())
                .and_then(|_| writer.write_all(b"\n"))
                .map_err(|source| TransformError::Write {
                    path: output_path.to_path_buf(),
                    source,
                })?;
            report.records_written += 1;
        }
        writer.flush().map_err(|source| TransformError::Write {
            path: output_path.to_path_buf(),
            source,
        })?;

        info!(
            "{}: {} records read, {} written, {} skipped",
            input_path.display(),
            report.records_read,
            report.records_written,
            report.errors.len()
        );
        Ok(report)
    }

    /// Converts every `.jsonl` file of a directory, writing outputs next to
    /// each other in `output_dir`. A file that fails outright is recorded as
    /// aborted and the batch moves on.
    pub fn transform_dir(
        &self,
        input_dir: &Path,
        output_dir: &Path,
    ) -> Result<BatchReport, TransformError> {
        let inputs = jsonl_files_in(input_dir)?;
        if inputs.is_empty() {
            return Err(TransformError::NoInputFiles {
                path: input_dir.to_path_buf(),
            });
        }
        ensure_dir(output_dir)?;

        let mut batch = BatchReport::default();
        for input_path in inputs {
            let output_path = output_path_for(&input_path, output_dir, self.format);
            debug!("converting {} -> {}", input_path.display(), output_path.display());
            match self.transform_file(&input_path, &output_path) {
                Ok(report) => batch.files.push(report),
                Err(err) => {
                    error!("{}", err);
                    batch.files.push(FileReport::aborted(&input_path, &output_path, &err));
                }
            }
        }

        info!(
            "batch done: {}/{} files succeeded, {} records written",
            batch.files_succeeded(),
            batch.files.len(),
            batch.total_records_written()
        );
        Ok(batch)
    }

    fn convert_line(&self, line: &str) -> Result<String, RecordError> {
        let record: Value = serde_json::from_str(line)?;
        match self.format {
            OutputFormat::PromptCompletion => {
                let converted = extract_prompt_completion(&record)?;
                Ok(serde_json::to_string(&converted)?)
            }
            OutputFormat::Conversation => {
                let converted = convert_conversation(&record)?;
                Ok(serde_json::to_string(&converted)?)
            }
        }
    }
}
