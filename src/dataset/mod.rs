//! JSONL dataset conversion for supervised fine-tuning.
//!
//! Input files hold one chat record per line, each with a `messages` array of
//! role/content turns. Two output shapes are supported: a flattened
//! `{prompt, completion}` record taken from the last user and last assistant
//! turn, and the Bedrock conversation schema that wraps every content string
//! in a `[{text}]` block list. Conversion is line by line; bad lines are
//! counted and skipped, never fatal for the batch.

mod conversation;
mod files;
mod record;
mod transform;

pub use conversation::{convert_conversation, ContentBlock, ConversationMessage, ConversationRecord, SCHEMA_VERSION};
pub use files::{ensure_dir, jsonl_files_in, output_path_for, JSONL_EXTENSION};
pub use record::{extract_prompt_completion, PromptCompletionRecord, RecordError};
pub use transform::{BatchReport, FileReport, OutputFormat, TransformError, Transformer};
