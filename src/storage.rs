// src/storage.rs
//! Snapshot files on disk. Every write goes through a temp file + rename so
//! readers never observe a half-written JSON document.

use serde::Serialize;
use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use tracing::{info, warn};

use crate::config::research::DataSection;
use crate::error::{ResearchError, Result};
use crate::record::WeeklySnapshot;

/// Write `contents` next to `path` as `<name>.tmp`, synced. Returns the temp
/// path; nothing is visible at `path` until it is renamed.
fn stage(path: &Path, contents: &[u8]) -> io::Result<PathBuf> {
    if let Some(dir) = path.parent().filter(|d| !d.as_os_str().is_empty()) {
        fs::create_dir_all(dir)?;
    }
    let mut name = path.file_name().unwrap_or_default().to_os_string();
    name.push(".tmp");
    let tmp = path.with_file_name(name);
    let mut f = fs::File::create(&tmp)?;
    f.write_all(contents)?;
    f.sync_all()?;
    Ok(tmp)
}

fn pretty_json<T: Serialize + ?Sized>(value: &T) -> Result<Vec<u8>> {
    let mut json = serde_json::to_vec_pretty(value)?;
    json.push(b'\n');
    Ok(json)
}

pub fn write_text_atomic(path: &Path, text: &str) -> Result<()> {
    let tmp = stage(path, text.as_bytes())?;
    fs::rename(&tmp, path)?;
    Ok(())
}

/// Pretty JSON, non-ASCII kept verbatim.
pub fn write_json_atomic<T: Serialize + ?Sized>(path: &Path, value: &T) -> Result<()> {
    let tmp = stage(path, &pretty_json(value)?)?;
    fs::rename(&tmp, path)?;
    Ok(())
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PersistedPaths {
    /// Flat record array read by the dashboard.
    pub research_data: PathBuf,
    /// Dated envelope read by the trend roll-up.
    pub snapshot: PathBuf,
}

pub fn snapshot_path(dir: &Path, snapshot: &WeeklySnapshot) -> PathBuf {
    dir.join(format!("{}.json", snapshot.metadata.report_date.format("%Y-%m-%d")))
}

/// Write both views of one run. A snapshot for the same report date is
/// replaced, never merged. Empty snapshots are refused.
pub fn persist_snapshot(data: &DataSection, snapshot: &WeeklySnapshot) -> Result<PersistedPaths> {
    if snapshot.articles.is_empty() {
        return Err(ResearchError::Persist(io::Error::new(
            io::ErrorKind::InvalidInput,
            "refusing to write a snapshot with zero records",
        )));
    }

    let research_data = data.research_data_path.clone();
    let snapshot_file = snapshot_path(&data.weekly_data_dir, snapshot);

    // Stage both files before either becomes visible.
    let snapshot_tmp = stage(&snapshot_file, &pretty_json(snapshot)?)?;
    let flat_tmp = match pretty_json(&snapshot.articles)
        .and_then(|bytes| Ok(stage(&research_data, &bytes)?))
    {
        Ok(tmp) => tmp,
        Err(e) => {
            let _ = fs::remove_file(&snapshot_tmp);
            return Err(e);
        }
    };
    if let Err(e) = fs::rename(&snapshot_tmp, &snapshot_file) {
        let _ = fs::remove_file(&snapshot_tmp);
        let _ = fs::remove_file(&flat_tmp);
        return Err(e.into());
    }
    fs::rename(&flat_tmp, &research_data)?;

    info!(
        research_data = %research_data.display(),
        snapshot = %snapshot_file.display(),
        articles = snapshot.articles.len(),
        "snapshot persisted"
    );
    Ok(PersistedPaths {
        research_data,
        snapshot: snapshot_file,
    })
}

/// Load every `*.json` snapshot in `dir`, ordered by file name (report date).
/// Unreadable files are skipped with a warning.
pub fn load_snapshots(dir: &Path) -> Vec<WeeklySnapshot> {
    let entries = match fs::read_dir(dir) {
        Ok(e) => e,
        Err(e) => {
            warn!(dir = %dir.display(), error = %e, "snapshot directory not readable");
            return Vec::new();
        }
    };

    let mut files: Vec<PathBuf> = entries
        .flatten()
        .map(|e| e.path())
        .filter(|p| p.extension().and_then(|s| s.to_str()) == Some("json"))
        .collect();
    files.sort();

    let mut out = Vec::with_capacity(files.len());
    for path in files {
        let parsed = fs::read_to_string(&path)
            .map_err(|e| e.to_string())
            .and_then(|s| serde_json::from_str::<WeeklySnapshot>(&s).map_err(|e| e.to_string()));
        match parsed {
            Ok(s) => out.push(s),
            Err(e) => warn!(file = %path.display(), error = %e, "skipping unreadable snapshot"),
        }
    }
    out
}
