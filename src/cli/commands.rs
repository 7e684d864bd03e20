//! CLI command implementations
//!
//! Every command loads and validates the configuration first. Storage is
//! opened after that and only by the command that needs it.

use std::collections::HashMap;
use std::fs;
use std::io::{self, Write};
use std::path::Path;
use std::sync::Arc;

use serde_json::json;

use crate::http_server::HttpServer;
use crate::observability::{log_event, log_event_with_fields, Event, Logger, MetricsRegistry};
use crate::report::{DocumentSizeResponder, MIN_SIZE_PARAM};
use crate::storage::{DocumentStorage, DocumentTable, MemoryStorage, StorageEngineKind};

use super::args::Command;
use super::config::Config;
use super::errors::{CliError, CliResult};
use super::io::write_response;

/// Main CLI entry point
///
/// Parses arguments and dispatches to the appropriate command.
/// This is the only function that main.rs should call.
pub fn run() -> CliResult<()> {
    let cli = super::args::Cli::parse_args();
    // stdout carries status lines and reports
    Logger::route_all_to_stderr();
    run_command(cli.command)
}

/// Run the appropriate command based on CLI args
pub fn run_command(cmd: Command) -> CliResult<()> {
    match cmd {
        Command::Init { config } => init(&config),
        Command::Serve { config, port } => serve(&config, port),
        Command::Scan { config, min_size_kb } => {
            let stdout = io::stdout();
            scan(&config, &min_size_kb, stdout.lock())
        }
        Command::Put {
            config,
            key,
            data,
            metadata,
        } => put(&config, &key, data.as_deref(), metadata.as_deref()),
        Command::Delete { config, key } => delete(&config, &key),
    }
}

/// Create the data directory and an empty table.
pub fn init(config_path: &Path) -> CliResult<()> {
    let config = load_config(config_path)?;
    let data_dir = config.data_path();

    if is_initialized(data_dir) {
        return Err(CliError::already_initialized());
    }

    let dir = data_dir.join("data");
    fs::create_dir_all(&dir).map_err(|e| {
        CliError::config_error(format!("Failed to create directory {:?}: {}", dir, e))
    })?;

    if config.engine()? == StorageEngineKind::Esent {
        DocumentTable::open(data_dir)?;
    }

    let data_dir_str = data_dir.display().to_string();
    log_event_with_fields(Event::DataDirInitialized, &[("data_dir", &data_dir_str)]);
    write_response(json!({"initialized": true}))?;

    Ok(())
}

/// Serve the size report until Ctrl-C.
pub fn serve(config_path: &Path, port: Option<u16>) -> CliResult<()> {
    log_event(Event::StartupBegin);
    let config = load_config(config_path)?;
    let storage = open_storage(&config)?;

    let mut http_config = config.http.clone();
    if let Some(port) = port {
        http_config.port = port;
    }

    let responder = DocumentSizeResponder::new(storage, Arc::new(MetricsRegistry::new()))
        .with_heartbeat_interval(config.heartbeat_interval());
    let server = HttpServer::with_config(http_config, responder);

    let rt = tokio::runtime::Runtime::new()
        .map_err(|e| CliError::boot_failed(format!("Failed to create tokio runtime: {}", e)))?;

    rt.block_on(async {
        server
            .start()
            .await
            .map_err(|e| CliError::boot_failed(format!("HTTP server failed: {}", e)))
    })?;

    Ok(())
}

/// Write one report to `out`.
///
/// The threshold goes through the same parser as the HTTP query parameter,
/// so both surfaces reject the same inputs with the same message.
pub fn scan<W: Write>(config_path: &Path, min_size_kb: &str, mut out: W) -> CliResult<()> {
    let config = load_config(config_path)?;
    let storage = open_storage(&config)?;

    let responder = DocumentSizeResponder::new(storage, Arc::new(MetricsRegistry::new()))
        .with_heartbeat_interval(config.heartbeat_interval());

    let mut query = HashMap::new();
    query.insert(MIN_SIZE_PARAM.to_string(), min_size_kb.to_string());

    responder.respond(&query, &mut out)?;
    writeln!(out)?;
    out.flush()?;
    Ok(())
}

/// Store one document.
pub fn put(config_path: &Path, key: &str, data: Option<&str>, metadata: Option<&str>) -> CliResult<()> {
    let config = load_config(config_path)?;
    let storage = open_storage(&config)?;

    let etag = storage.put(key, data.map(str::as_bytes), metadata.map(str::as_bytes))?;

    let etag_str = etag.to_string();
    log_event_with_fields(Event::DocumentPut, &[("key", key), ("etag", &etag_str)]);
    write_response(json!({"key": key, "etag": etag}))?;

    Ok(())
}

/// Delete one document.
pub fn delete(config_path: &Path, key: &str) -> CliResult<()> {
    let config = load_config(config_path)?;
    let storage = open_storage(&config)?;

    let deleted = storage.delete(key)?;

    if deleted {
        log_event_with_fields(Event::DocumentDeleted, &[("key", key)]);
    }
    write_response(json!({"key": key, "deleted": deleted}))?;

    Ok(())
}

fn load_config(config_path: &Path) -> CliResult<Config> {
    let config = Config::load(config_path)?;
    log_event_with_fields(
        Event::ConfigLoaded,
        &[("data_dir", &config.data_dir), ("storage_engine", &config.storage_engine)],
    );
    Ok(config)
}

/// Open the configured engine.
///
/// FATAL: a table that fails verification is not served.
pub fn open_storage(config: &Config) -> CliResult<Arc<dyn DocumentStorage>> {
    let engine = config.engine()?;

    let storage: Arc<dyn DocumentStorage> = match engine {
        StorageEngineKind::Esent => {
            if !is_initialized(config.data_path()) {
                return Err(CliError::not_initialized());
            }
            let table = DocumentTable::open(config.data_path()).map_err(|e| {
                if e.is_fatal() {
                    log_event_with_fields(Event::TableCorruption, &[("error", &e.to_string())]);
                }
                CliError::from(e)
            })?;
            Arc::new(table)
        }
        StorageEngineKind::Memory => Arc::new(MemoryStorage::new()),
    };

    let documents = storage.document_count().to_string();
    log_event_with_fields(
        Event::StorageOpened,
        &[("engine", engine.as_str()), ("documents", &documents)],
    );

    Ok(storage)
}

/// Check if a data directory is initialized
fn is_initialized(data_dir: &Path) -> bool {
    data_dir.join("data").exists()
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn write_config(dir: &TempDir, engine: &str) -> std::path::PathBuf {
        let path = dir.path().join("aerodb.json");
        let data_dir = dir.path().join("db");
        let config = json!({
            "data_dir": data_dir.to_string_lossy(),
            "storage_engine": engine,
        });
        fs::write(&path, config.to_string()).unwrap();
        path
    }

    #[test]
    fn test_init_twice_fails() {
        let dir = TempDir::new().unwrap();
        let config = write_config(&dir, "esent");
        init(&config).unwrap();
        let err = init(&config).unwrap_err();
        assert_eq!(err.code_str(), "AERO_CLI_ALREADY_INITIALIZED");
    }

    #[test]
    fn test_scan_requires_init() {
        let dir = TempDir::new().unwrap();
        let config = write_config(&dir, "esent");
        let err = scan(&config, "1", Vec::new()).unwrap_err();
        assert_eq!(err.code_str(), "AERO_CLI_NOT_INITIALIZED");
    }

    #[test]
    fn test_put_then_scan() {
        let dir = TempDir::new().unwrap();
        let config = write_config(&dir, "esent");
        init(&config).unwrap();
        put(&config, "users/1", Some("x".repeat(1500).as_str()), Some("{}")).unwrap();
        put(&config, "users/2", Some("tiny"), None).unwrap();

        let mut out = Vec::new();
        scan(&config, "1", &mut out).unwrap();
        assert_eq!(
            String::from_utf8(out).unwrap(),
            "{\"DocumentsAndSizes\":[{\"Id\":\"users/1\",\"Size\":1502}]}\n"
        );
    }

    #[test]
    fn test_deleted_document_not_reported() {
        let dir = TempDir::new().unwrap();
        let config = write_config(&dir, "esent");
        init(&config).unwrap();
        put(&config, "gone", Some("x".repeat(4096).as_str()), None).unwrap();
        delete(&config, "gone").unwrap();

        let mut out = Vec::new();
        scan(&config, "0", &mut out).unwrap();
        assert_eq!(
            String::from_utf8(out).unwrap(),
            "{\"DocumentsAndSizes\":[]}\n"
        );
    }

    #[test]
    fn test_scan_on_memory_engine_is_rejected() {
        let dir = TempDir::new().unwrap();
        let config = write_config(&dir, "memory");

        let mut out = Vec::new();
        let err = scan(&config, "1", &mut out).unwrap_err();
        assert_eq!(err.code_str(), "AERO_CLI_SCAN_FAILED");
        assert_eq!(out, b"Only ESENT storage supported");
    }

    #[test]
    fn test_malformed_threshold_is_rejected() {
        let dir = TempDir::new().unwrap();
        let config = write_config(&dir, "esent");
        init(&config).unwrap();

        let mut out = Vec::new();
        let err = scan(&config, "lots", &mut out).unwrap_err();
        assert_eq!(err.message(), "minSizeInKB query parameter should be provided");
    }
}
