//! Shared plumbing for the docrag binaries.
use docrag_core::config::{expand_path, Config};
use docrag_core::loader::DocumentSource;
use docrag_core::settings::RagSettings;
use docrag_core::types::CitedSource;
use tracing_subscriber::EnvFilter;

/// `RUST_LOG` wins; `info` otherwise.
pub fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).with_target(false).init();
}

pub fn load_settings() -> anyhow::Result<RagSettings> {
    let config = Config::load().map_err(|e| {
        eprintln!("Error loading config: {}", e);
        e
    })?;
    config.settings()
}

/// Directory plus explicit files, in that order.
pub fn sources(directory: Option<&str>, files: &[String]) -> Vec<DocumentSource> {
    let mut sources: Vec<DocumentSource> = directory.map(|d| DocumentSource::Directory(expand_path(d))).into_iter().collect();
    sources.extend(files.iter().map(|f| DocumentSource::File(expand_path(f))));
    sources
}

/// Accepts "txt,md", ".rst" and "md rst".
pub fn parse_extensions(raw: &str) -> Vec<String> {
    raw.split(|c: char| c == ',' || c.is_whitespace())
        .map(|e| e.trim().trim_start_matches('.').to_ascii_lowercase())
        .filter(|e| !e.is_empty())
        .collect()
}

pub fn format_sources(sources: &[CitedSource]) -> String {
    sources
        .iter()
        .enumerate()
        .map(|(i, s)| {
            let line = format!("  [{}] {} ({}) score={:.3}", i + 1, s.title, s.source, s.score);
            if s.preview.is_empty() {
                line
            } else {
                format!("{line}\n      {}", s.preview.replace('\n', " "))
            }
        })
        .collect::<Vec<_>>()
        .join("\n")
}
