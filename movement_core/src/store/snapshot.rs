//! Atomic JSON snapshots of the world state.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use world_rules::WorldState;

use super::{StoreError, StoreResult};

/// Load a snapshot, or an empty world if the file does not exist yet.
pub(crate) fn load_world(path: &Path) -> StoreResult<WorldState> {
    match fs::read_to_string(path) {
        Ok(text) => Ok(WorldState::from_json(&text)?),
        Err(error) if error.kind() == io::ErrorKind::NotFound => Ok(WorldState::new()),
        Err(source) => Err(StoreError::Io {
            path: path.to_path_buf(),
            source,
        }),
    }
}

/// Write the snapshot through a sibling temp file so readers never see a torn file.
pub(crate) fn save_world(path: &Path, state: &WorldState) -> StoreResult<()> {
    let text = state.to_json()?;
    write_text_atomic(path, &text).map_err(|source| StoreError::Io {
        path: path.to_path_buf(),
        source,
    })
}

fn write_text_atomic(path: &Path, text: &str) -> io::Result<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent)?;
        }
    }

    let tmp_path = temp_path_for(path);
    fs::write(&tmp_path, text)?;
    if let Err(error) = fs::rename(&tmp_path, path) {
        let _ = fs::remove_file(&tmp_path);
        return Err(error);
    }
    Ok(())
}

fn temp_path_for(path: &Path) -> PathBuf {
    let file_name = path
        .file_name()
        .and_then(|name| name.to_str())
        .unwrap_or("world.json");
    let tmp_name = format!("{file_name}.tmp");
    match path.parent() {
        Some(parent) => parent.join(tmp_name),
        None => PathBuf::from(tmp_name),
    }
}
