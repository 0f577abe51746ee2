//! `extract-pdf-images <pdf_file_path> [output_directory]`
//!
//! Without an output directory the images are inlined as base64.

use std::process::ExitCode;

use synaptic_pdf::cli::ImagesArgs;
use synaptic_pdf::config::ImageLimits;
use synaptic_pdf::extract::{extract_images, OutputMode};
use synaptic_pdf::output::emit;
use synaptic_pdf::telemetry;

fn main() -> ExitCode {
    dotenvy::dotenv().ok();
    telemetry::init("synaptic_pdf=warn");

    let args = match ImagesArgs::parse_args(std::env::args_os()) {
        Ok(args) => args,
        Err(usage) => return emit(&usage),
    };

    let output = OutputMode::from_arg(args.output_directory);
    emit(&extract_images(&args.pdf_file_path, &output, &ImageLimits::from_env()))
}
