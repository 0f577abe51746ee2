//! Configuration management
//!
//! Every value has a literal default matching the behaviour the pipeline
//! was built against; the environment (or a `.env` file loaded by the
//! binaries) can override them.

use std::env;
use std::path::PathBuf;
use std::str::FromStr;

/// Chroma launcher settings
#[derive(Debug, Clone, PartialEq)]
pub struct LauncherConfig {
    pub data_dir: PathBuf,
    pub host: String,
    pub port: u16,
    /// Executable providing `chroma run`
    pub chroma_bin: String,
    pub log_level: String,
}

impl Default for LauncherConfig {
    fn default() -> Self {
        LauncherConfig {
            data_dir: PathBuf::from("./chromadb_data"),
            host: "0.0.0.0".to_string(),
            port: 8000,
            chroma_bin: "chroma".to_string(),
            log_level: "info".to_string(),
        }
    }
}

impl LauncherConfig {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Build from an arbitrary key lookup (used by tests)
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();
        LauncherConfig {
            data_dir: lookup("CHROMA_DATA_DIR")
                .map(PathBuf::from)
                .unwrap_or(defaults.data_dir),
            host: lookup("CHROMA_HOST").unwrap_or(defaults.host),
            port: parse_or(&lookup, "CHROMA_PORT", defaults.port),
            chroma_bin: lookup("CHROMA_BIN").unwrap_or(defaults.chroma_bin),
            log_level: lookup("CHROMA_LOG_LEVEL").unwrap_or(defaults.log_level),
        }
    }

    /// Address as shown to users
    pub fn url(&self) -> String {
        let host = if self.host == "0.0.0.0" {
            "localhost"
        } else {
            self.host.as_str()
        };
        format!("http://{}:{}", host, self.port)
    }
}

/// Limits for the image extractor
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ImageLimits {
    /// Stop once this many images have been accepted
    pub max_images: usize,
    /// Minimum width and height in pixels (inclusive)
    pub min_size: u32,
}

impl Default for ImageLimits {
    fn default() -> Self {
        ImageLimits {
            max_images: 50,
            min_size: 100,
        }
    }
}

impl ImageLimits {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();
        ImageLimits {
            max_images: parse_or(&lookup, "PDF_MAX_IMAGES", defaults.max_images),
            min_size: parse_or(&lookup, "PDF_MIN_IMAGE_SIZE", defaults.min_size),
        }
    }
}

/// Limits for the text extractor
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TextLimits {
    /// Documents whose trimmed text is shorter than this (in characters)
    /// are treated as image-only
    pub min_chars: usize,
}

impl Default for TextLimits {
    fn default() -> Self {
        TextLimits { min_chars: 100 }
    }
}

impl TextLimits {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        TextLimits {
            min_chars: parse_or(&lookup, "PDF_MIN_TEXT_CHARS", Self::default().min_chars),
        }
    }
}

fn parse_or<F, T>(lookup: &F, key: &str, default: T) -> T
where
    F: Fn(&str) -> Option<String>,
    T: FromStr + Copy + std::fmt::Display,
{
    match lookup(key) {
        Some(raw) => raw.trim().parse().unwrap_or_else(|_| {
            tracing::warn!("Invalid {}={:?}, using default {}", key, raw, default);
            default
        }),
        None => default,
    }
}
