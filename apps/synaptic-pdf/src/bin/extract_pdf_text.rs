//! `extract-pdf-text <pdf_file_path>`
//!
//! Prints one JSON object to stdout; exits 0 on success, 1 on failure.

use std::process::ExitCode;

use synaptic_pdf::cli::TextArgs;
use synaptic_pdf::config::TextLimits;
use synaptic_pdf::extract::extract_text;
use synaptic_pdf::output::emit;
use synaptic_pdf::telemetry;

fn main() -> ExitCode {
    dotenvy::dotenv().ok();
    telemetry::init("synaptic_pdf=warn");

    let args = match TextArgs::parse_args(std::env::args_os()) {
        Ok(args) => args,
        Err(usage) => return emit(&usage),
    };

    emit(&extract_text(&args.pdf_file_path, &TextLimits::from_env()))
}
