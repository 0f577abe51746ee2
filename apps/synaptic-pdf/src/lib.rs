//! Synaptic PDF Tools
//!
//! Glue between the Synaptic document pipeline and its native helpers.
//! The pipeline spawns the extractor binaries as child processes, reads a
//! single JSON object from stdout and treats the exit code as success or
//! failure.
//!
//! # Modules
//!
//! - `extract`: Text and image extraction (the subprocess contracts)
//! - `document`: Opening PDFs and looking up pages via MuPDF
//! - `content`: Content stream scanner used to place images on a page
//! - `launcher`: Starts the Chroma vector store with fixed configuration
//! - `config`: Environment-driven configuration with literal defaults
//! - `cli`: Extractor arguments, with parse errors mapped to JSON

pub mod cli;
pub mod config;
pub mod content;
pub mod document;
pub mod extract;
pub mod launcher;
pub mod output;
pub mod telemetry;

#[cfg(test)]
mod testing;
