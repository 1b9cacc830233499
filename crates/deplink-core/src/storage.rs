//! Read/write the embedded database file.
//!
//! One file holds the whole database; deleting it is the only
//! supported reset.

use crate::config::StorageConfig;
use crate::schema::{self, GraphFile, ProjectInfo};
use crate::store::{GraphStore, StoreError};
use std::fs;
use std::io::Read as _;
use std::path::{Path, PathBuf};

const DB_DIR: &str = ".deplink";
const DB_FILE: &str = "graph.json";
const DB_BACKUP_FILE: &str = "graph.backup.json";

/// Zstd magic bytes: 0x28 0xB5 0x2F 0xFD.
const ZSTD_MAGIC: [u8; 4] = [0x28, 0xB5, 0x2F, 0xFD];

/// The deplink directory for a given project root.
pub fn db_dir(project_root: &Path) -> PathBuf {
    project_root.join(DB_DIR)
}

/// The database file for a given project root.
pub fn db_file(project_root: &Path) -> PathBuf {
    db_dir(project_root).join(DB_FILE)
}

/// Whether a database exists for the given project root.
pub fn db_exists(project_root: &Path) -> bool {
    db_file(project_root).exists()
}

pub fn backup_file(project_root: &Path) -> PathBuf {
    db_dir(project_root).join(DB_BACKUP_FILE)
}

/// Copy the current database aside before destructive operations.
/// Returns the backup path, or None when no database exists yet.
pub fn create_backup(project_root: &Path) -> Result<Option<PathBuf>, StoreError> {
    if !db_exists(project_root) {
        return Ok(None);
    }
    let dest = backup_file(project_root);
    fs::copy(db_file(project_root), &dest)?;
    Ok(Some(dest))
}

/// Load a database from disk. Compressed files are detected by magic
/// bytes; secondary indexes are rebuilt before the store is returned.
pub fn load(project_root: &Path) -> Result<GraphFile, StoreError> {
    let path = db_file(project_root);
    let raw = fs::read(&path)?;

    let json = if raw.len() >= 4 && raw[..4] == ZSTD_MAGIC {
        let mut decoder = zstd::Decoder::new(&raw[..])?;
        let mut decompressed = String::new();
        decoder.read_to_string(&mut decompressed)?;
        decompressed
    } else {
        String::from_utf8(raw)
            .map_err(|_| StoreError::Corrupt(format!("{} is not valid UTF-8", path.display())))?
    };

    let mut file = schema::from_json(&json)?;
    file.store.rebuild_indexes();
    Ok(file)
}

/// Save a database to disk, compressing when the config asks for it.
pub fn save(
    project_root: &Path,
    store: &GraphStore,
    project: &ProjectInfo,
    storage_config: &StorageConfig,
) -> Result<(), StoreError> {
    let dir = db_dir(project_root);
    fs::create_dir_all(&dir)?;

    let json = schema::to_json(store, project)?;
    if storage_config.compress {
        let compressed = zstd::encode_all(json.as_bytes(), 3)?;
        fs::write(db_file(project_root), compressed)?;
    } else {
        fs::write(db_file(project_root), json)?;
    }

    // Backups are local state; keep them out of version control.
    let inner_gitignore = dir.join(".gitignore");
    if !inner_gitignore.exists() {
        let _ = fs::write(&inner_gitignore, "graph.backup.json\n");
    }

    Ok(())
}
