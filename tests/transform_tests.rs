//! Integration tests for the dataset conversion pipeline
//!
//! Drives the public `dataset` API the way `cli-transform` does: resolve
//! output paths, convert, then check the reports and the written files.

use std::fs;
use teachassist::dataset::{ensure_dir, output_path_for, OutputFormat, Transformer};

#[test]
fn test_single_file_conversion_takes_the_last_exchange() {
    let dir = tempfile::tempdir().unwrap();
    let input = dir.path().join("tutoring.jsonl");
    fs::write(
        &input,
        concat!(
            r#"{"messages":[{"role":"system","content":"You are a tutor"},{"role":"user","content":"What is 2+2?"},{"role":"assistant","content":"4"},{"role":"user","content":"And 3+3?"},{"role":"assistant","content":"6"}]}"#,
            "\n",
        ),
    )
    .unwrap();

    let output_dir = dir.path().join("out");
    ensure_dir(&output_dir).unwrap();
    let output = output_path_for(&input, &output_dir, OutputFormat::PromptCompletion);

    let report = Transformer::new(OutputFormat::PromptCompletion)
        .transform_file(&input, &output)
        .unwrap();

    assert!(report.success());
    assert_eq!(report.records_written, 1);
    assert_eq!(output, output_dir.join("tutoring_transformed.jsonl"));

    // Multi-turn records keep only the final exchange.
    let written = fs::read_to_string(&output).unwrap();
    assert_eq!(written.trim_end(), r#"{"prompt":"And 3+3?","completion":"6"}"#);
}

#[test]
fn test_directory_batch_reports_totals_across_files() {
    let dir = tempfile::tempdir().unwrap();
    let input_dir = dir.path().join("datasets");
    let output_dir = dir.path().join("out");
    fs::create_dir(&input_dir).unwrap();

    fs::write(
        input_dir.join("clean.jsonl"),
        concat!(
            r#"{"messages":[{"role":"user","content":"Hi"},{"role":"assistant","content":"Hello"}]}"#,
            "\n",
            r#"{"messages":[{"role":"user","content":"Bye"},{"role":"assistant","content":"See you"}]}"#,
            "\n",
        ),
    )
    .unwrap();
    fs::write(
        input_dir.join("mixed.jsonl"),
        concat!(
            "not json\n",
            r#"{"messages":[{"role":"user","content":"Thanks"},{"role":"assistant","content":"Any time"}]}"#,
            "\n",
        ),
    )
    .unwrap();

    let batch = Transformer::new(OutputFormat::Conversation)
        .transform_dir(&input_dir, &output_dir)
        .unwrap();

    assert!(batch.all_succeeded());
    assert_eq!(batch.files.len(), 2);
    assert_eq!(batch.total_records_read(), 4);
    assert_eq!(batch.total_records_written(), 3);
    assert_eq!(batch.total_errors(), 1);

    let written = fs::read_to_string(output_dir.join("clean_bedrock.jsonl")).unwrap();
    let first_line = written.lines().next().unwrap();
    assert_eq!(
        first_line,
        r#"{"schemaVersion":"bedrock-conversation-2024","messages":[{"role":"user","content":[{"text":"Hi"}]},{"role":"assistant","content":[{"text":"Hello"}]}]}"#
    );
    assert!(output_dir.join("mixed_bedrock.jsonl").is_file());
}
