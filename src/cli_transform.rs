use anyhow::Result;
use clap::Parser;
use indicatif::{ProgressBar, ProgressStyle};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::level_filters::LevelFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, EnvFilter};

#[allow(dead_code)]
mod cli_style;

use cli_style::{
    get_styles, print_error, print_key_value, print_section_footer, print_section_header,
    print_success, TableBuilder,
};

use teachassist::dataset::{
    ensure_dir, output_path_for, BatchReport, OutputFormat, Transformer,
};

/// Converts chat-format JSONL datasets into fine-tuning formats.
#[derive(Parser, Debug)]
#[command(styles=get_styles())]
struct CliArgs {
    /// A .jsonl file or a directory containing .jsonl files.
    pub input: PathBuf,

    /// Directory the converted files are written to.
    #[clap(short, long, default_value = "output")]
    pub output_dir: PathBuf,

    /// Output record shape.
    #[clap(short, long, value_enum, default_value = "prompt-completion")]
    pub format: OutputFormat,

    /// Logs every record conversion.
    #[clap(short, long)]
    pub verbose: bool,
}

fn run(transformer: &Transformer, input: &Path, output_dir: &Path) -> Result<BatchReport> {
    if input.is_dir() {
        let spinner = ProgressBar::new_spinner().with_message("Converting .jsonl files...");
        spinner.set_style(ProgressStyle::with_template("{spinner} {msg}").unwrap());
        spinner.enable_steady_tick(Duration::from_millis(100));
        let batch = transformer.transform_dir(input, output_dir);
        spinner.finish_and_clear();
        Ok(batch?)
    } else {
        ensure_dir(output_dir)?;
        let output_path = output_path_for(input, output_dir, transformer.format());
        let report = transformer.transform_file(input, &output_path)?;
        Ok(BatchReport {
            files: vec![report],
        })
    }
}

fn print_summary(batch: &BatchReport) {
    let mut table = TableBuilder::new(vec!["File", "Read", "Written", "Skipped", "Status"]);
    for report in &batch.files {
        let name = report
            .input_path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_else(|| report.input_path.display().to_string());
        let read = report.records_read.to_string();
        let written = report.records_written.to_string();
        let skipped = report.errors.len().to_string();
        let status = if report.success() { "ok" } else { "failed" };
        table.add_row(vec![
            name.as_str(),
            read.as_str(),
            written.as_str(),
            skipped.as_str(),
            status,
        ]);
    }
    table.print();
    println!();

    if batch.all_succeeded() {
        print_success(&format!(
            "{} records written across {} files",
            batch.total_records_written(),
            batch.files.len()
        ));
    } else {
        print_error(&format!(
            "{} of {} files failed, {} records written",
            batch.files_failed(),
            batch.files.len(),
            batch.total_records_written()
        ));
    }
}

fn main() -> Result<()> {
    let cli_args = CliArgs::parse();

    let default_level = if cli_args.verbose {
        LevelFilter::DEBUG
    } else {
        LevelFilter::WARN
    };
    tracing_subscriber::registry()
        .with(fmt::layer())
        .with(
            EnvFilter::builder()
                .with_default_directive(default_level.into())
                .with_env_var("LOG_LEVEL")
                .from_env_lossy(),
        )
        .try_init()
        .unwrap();

    print_section_header("Dataset transform");
    print_key_value("Input", &cli_args.input.display().to_string());
    print_key_value("Output dir", &cli_args.output_dir.display().to_string());
    print_key_value("Format", cli_args.format.as_str());
    print_section_footer();
    println!();

    let transformer = Transformer::new(cli_args.format);
    let batch = run(&transformer, &cli_args.input, &cli_args.output_dir)?;

    print_summary(&batch);

    if !batch.all_succeeded() {
        std::process::exit(1);
    }
    Ok(())
}
