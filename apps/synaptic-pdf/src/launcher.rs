//! Chroma vector store launcher
//!
//! Prepares the persistent data directory, checks the port is free, then
//! runs `chroma run` as a child process until it exits or we are asked to
//! stop.

use std::net::TcpListener;
use std::path::Path;
use std::process::Stdio;

use anyhow::{bail, Context, Result};
use tokio::process::Command;
use tokio::signal;

use crate::config::LauncherConfig;

/// Create the data directory (and parents) if missing
pub fn prepare_data_dir(dir: &Path) -> Result<()> {
    std::fs::create_dir_all(dir)
        .with_context(|| format!("Failed to create data directory {}", dir.display()))
}

/// Fail early if something is already listening on `host:port`
pub fn check_port_available(host: &str, port: u16) -> Result<()> {
    let listener = TcpListener::bind((host, port))
        .with_context(|| format!("Port {} on {} is not available", port, host))?;
    drop(listener);
    Ok(())
}

/// Lines printed to stdout once the store is configured
pub fn banner(config: &LauncherConfig) -> Vec<String> {
    vec![
        "✅ ChromaDB initialized".to_string(),
        format!("📁 Data directory: {}", config.data_dir.display()),
        format!("🌐 Server: {}", config.url()),
    ]
}

/// Arguments for `chroma run`
pub fn chroma_args(config: &LauncherConfig) -> Vec<String> {
    vec![
        "run".to_string(),
        "--path".to_string(),
        config.data_dir.display().to_string(),
        "--host".to_string(),
        config.host.clone(),
        "--port".to_string(),
        config.port.to_string(),
    ]
}

fn chroma_command(config: &LauncherConfig) -> Command {
    let mut command = Command::new(&config.chroma_bin);
    command
        .args(chroma_args(config))
        .stdin(Stdio::inherit())
        .stdout(Stdio::inherit())
        .stderr(Stdio::inherit())
        .kill_on_drop(true);
    command
}

/// Run the store until the child exits or a shutdown signal arrives
pub async fn run(config: LauncherConfig) -> Result<()> {
    prepare_data_dir(&config.data_dir)?;
    check_port_available(&config.host, config.port)?;

    for line in banner(&config) {
        println!("{}", line);
    }

    let mut child = chroma_command(&config)
        .spawn()
        .with_context(|| format!("Failed to start '{}'", config.chroma_bin))?;

    tracing::info!(pid = ?child.id(), "Chroma started");

    tokio::select! {
        status = child.wait() => {
            let status = status.context("Failed to wait for Chroma")?;
            if !status.success() {
                bail!("Chroma exited with {}", status);
            }
            tracing::info!("Chroma exited");
        }
        _ = shutdown_signal() => {
            child.kill().await.context("Failed to stop Chroma")?;
            tracing::info!("Chroma stopped");
        }
    }

    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::warn!("Ctrl+C handler unavailable: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                tracing::warn!("SIGTERM handler unavailable: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            tracing::info!("Received Ctrl+C, shutting down...");
        },
        _ = terminate => {
            tracing::info!("Received SIGTERM, shutting down...");
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    fn config_in(dir: &Path) -> LauncherConfig {
        LauncherConfig {
            data_dir: dir.join("chroma"),
            host: "127.0.0.1".to_string(),
            ..LauncherConfig::default()
        }
    }

    #[test]
    fn test_chroma_args() {
        let config = LauncherConfig {
            data_dir: PathBuf::from("./chromadb_data"),
            ..LauncherConfig::default()
        };
        assert_eq!(
            chroma_args(&config),
            vec!["run", "--path", "./chromadb_data", "--host", "0.0.0.0", "--port", "8000"]
        );
    }

    #[test]
    fn test_banner() {
        let lines = banner(&LauncherConfig::default());
        assert!(lines[0].ends_with("ChromaDB initialized"));
        assert!(lines[1].ends_with("Data directory: ./chromadb_data"));
        assert!(lines[2].ends_with("Server: http://localhost:8000"));
    }

    #[test]
    fn test_prepare_data_dir_creates_parents() {
        let dir = tempfile::tempdir().unwrap();
        let target = dir.path().join("a").join("b");

        prepare_data_dir(&target).unwrap();
        assert!(target.is_dir());
        // Idempotent
        prepare_data_dir(&target).unwrap();
    }

    #[test]
    fn test_prepare_data_dir_under_file_fails() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("file");
        std::fs::write(&file, b"x").unwrap();

        let err = prepare_data_dir(&file.join("data")).unwrap_err();
        assert!(err.to_string().contains("Failed to create data directory"));
    }

    #[test]
    fn test_port_in_use() {
        let listener = TcpListener::bind(("127.0.0.1", 0)).unwrap();
        let port = listener.local_addr().unwrap().port();

        let err = check_port_available("127.0.0.1", port).unwrap_err();
        assert!(err.to_string().contains(&port.to_string()));

        drop(listener);
        check_port_available("127.0.0.1", port).unwrap();
    }

    #[tokio::test]
    async fn test_run_fails_when_binary_missing() {
        let dir = tempfile::tempdir().unwrap();
        let port = TcpListener::bind(("127.0.0.1", 0))
            .unwrap()
            .local_addr()
            .unwrap()
            .port();
        let config = LauncherConfig {
            port,
            chroma_bin: dir.path().join("no-such-chroma").display().to_string(),
            ..config_in(dir.path())
        };

        let err = run(config.clone()).await.unwrap_err();
        assert!(err.to_string().starts_with("Failed to start"));
        assert!(config.data_dir.is_dir());
    }

    #[tokio::test]
    async fn test_run_reports_child_failure() {
        let dir = tempfile::tempdir().unwrap();
        let port = TcpListener::bind(("127.0.0.1", 0))
            .unwrap()
            .local_addr()
            .unwrap()
            .port();
        // `false` ignores its arguments and exits 1
        let config = LauncherConfig {
            port,
            chroma_bin: "false".to_string(),
            ..config_in(dir.path())
        };

        if cfg!(unix) {
            let err = run(config).await.unwrap_err();
            assert!(err.to_string().starts_with("Chroma exited with"));
        }
    }
}
