use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueEnum};
use pdfsift::{ExtractOptions, RestorePolicy};

/// Reconstruct text and locate patterns in PDF documents.
#[derive(Debug, Parser)]
#[command(name = "pdfsift", about, version)]
pub struct Cli {
    /// Increase log verbosity (-v info, -vv debug, -vvv trace). RUST_LOG
    /// overrides this.
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    #[command(subcommand)]
    pub command: Commands,
}

/// Available subcommands.
#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Reconstruct the text of marked-content regions
    Text {
        /// Path to the PDF file
        #[arg(value_name = "FILE")]
        file: PathBuf,

        /// Page range (e.g. '1,3-5'). Default: all pages
        #[arg(long)]
        pages: Option<String>,

        /// Output format
        #[arg(long, value_enum, default_value_t = TextFormat::Text)]
        format: TextFormat,

        /// Wrap regions in tags and words in positioned spans
        #[arg(long)]
        markup: bool,

        #[command(flatten)]
        interpreter: InterpreterArgs,
    },

    /// Find pattern matches with their bounding boxes
    Search {
        /// Path to the PDF file
        #[arg(value_name = "FILE")]
        file: PathBuf,

        /// Search pattern (regex by default)
        #[arg(value_name = "PATTERN")]
        pattern: String,

        /// Page range (e.g. '1,3-5'). Default: all pages
        #[arg(long)]
        pages: Option<String>,

        /// Case-insensitive search
        #[arg(long, short = 'i')]
        case_insensitive: bool,

        /// Treat the pattern as a literal string
        #[arg(long)]
        no_regex: bool,

        /// Output format
        #[arg(long, value_enum, default_value_t = OutputFormat::Text)]
        format: OutputFormat,

        #[command(flatten)]
        interpreter: InterpreterArgs,
    },
}

/// Interpreter limits and strictness shared by every subcommand.
#[derive(Debug, Args)]
pub struct InterpreterArgs {
    /// Maximum form XObject nesting
    #[arg(long, default_value_t = 10)]
    pub max_form_depth: usize,

    /// Maximum marked-content nesting
    #[arg(long, default_value_t = 256)]
    pub max_marked_depth: usize,

    /// Fail on a Q without a matching q instead of ignoring it
    #[arg(long)]
    pub strict_restore: bool,

    /// Accept TJ arrays whose strings and numbers do not alternate
    #[arg(long)]
    pub lenient_text_arrays: bool,

    /// Stop at the first page that fails instead of skipping it
    #[arg(long)]
    pub fail_fast: bool,

    /// Refuse files larger than this many bytes
    #[arg(long, value_name = "BYTES")]
    pub max_input_bytes: Option<usize>,
}

impl InterpreterArgs {
    pub fn to_options(&self, use_markup: bool) -> ExtractOptions {
        ExtractOptions {
            max_recursion_depth: self.max_form_depth,
            max_marked_content_depth: self.max_marked_depth,
            unbalanced_restore: if self.strict_restore {
                RestorePolicy::Error
            } else {
                RestorePolicy::Ignore
            },
            strict_text_arrays: !self.lenient_text_arrays,
            use_markup,
            fail_fast: self.fail_fast,
            max_input_bytes: self.max_input_bytes,
        }
    }
}

/// Output format for the text subcommand.
#[derive(Debug, Clone, ValueEnum)]
pub enum TextFormat {
    /// Plain text with a header per page
    Text,
    /// One JSON object per page
    Json,
}

/// Output format for the search subcommand.
#[derive(Debug, Clone, ValueEnum)]
pub enum OutputFormat {
    /// Plain text (tab-separated)
    Text,
    /// JSON array of matches
    Json,
    /// CSV output
    Csv,
}
