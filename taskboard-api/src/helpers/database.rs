use std::path::PathBuf;
use std::sync::Arc;

use crate::database::Database;

/// Returns the default path of the taskboard database
///
/// # Platform-specific paths
///
/// - **macOS**: `~/Library/Application Support/taskboard/taskboard.db`
/// - **Linux**: `~/.local/share/taskboard/taskboard.db`
/// - **Windows**: `%LOCALAPPDATA%\taskboard\taskboard.db`
pub fn get_db_path() -> anyhow::Result<PathBuf> {
    let data_dir = dirs::data_local_dir()
        .ok_or_else(|| anyhow::anyhow!("Could not determine local data directory"))?;

    Ok(data_dir.join("taskboard").join("taskboard.db"))
}

/// Open the configured database, falling back to the platform default path
pub fn initialize_database(configured: Option<&str>) -> anyhow::Result<Arc<Database>> {
    let db_path = match configured {
        Some(path) if !path.trim().is_empty() => PathBuf::from(path),
        _ => get_db_path()?,
    };

    let db = Database::new(&db_path)?;
    tracing::info!("Using database at {}", db_path.display());
    Ok(Arc::new(db))
}
