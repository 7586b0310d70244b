use crate::paths::AppPaths;
use crate::Result;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime, UNIX_EPOCH};

const RUN_LOG_MAX_AGE_DAYS: u64 = 30;
const RUN_LOG_TOTAL_CAP_BYTES: u64 = 64 * 1024 * 1024;

/// Append-only JSONL log for a single search run. The file and its directory
/// are created on the first write.
#[derive(Debug, Clone)]
pub struct RunLog {
    run_id: String,
    path: PathBuf,
}

impl RunLog {
    pub fn new(paths: &AppPaths, run_id: &str) -> Self {
        Self {
            run_id: run_id.to_string(),
            path: paths.run_log_path(run_id),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn line(&self, level: &str, event: &str, data: serde_json::Value) -> Result<()> {
        let line = serde_json::json!({
            "ts_ms": now_ms(),
            "run_id": self.run_id,
            "level": level,
            "event": event,
            "data": data
        })
        .to_string();

        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)?
            .write_all(format!("{line}\n").as_bytes())?;
        Ok(())
    }
}

/// Drops run logs older than the retention window, then the oldest ones until
/// the directory fits under the size cap.
pub fn prune_run_logs(paths: &AppPaths) -> Result<usize> {
    let dir = paths.run_logs_dir();
    if !dir.exists() {
        return Ok(0);
    }

    let cutoff = SystemTime::now()
        .checked_sub(Duration::from_secs(RUN_LOG_MAX_AGE_DAYS * 24 * 60 * 60))
        .unwrap_or(SystemTime::UNIX_EPOCH);

    let mut removed = 0_usize;
    let mut candidates: Vec<(PathBuf, SystemTime, u64)> = Vec::new();
    for entry in std::fs::read_dir(&dir)? {
        let entry = match entry {
            Ok(v) => v,
            Err(_) => continue,
        };
        let meta = match entry.metadata() {
            Ok(v) => v,
            Err(_) => continue,
        };
        if !meta.is_file() {
            continue;
        }
        let modified = meta.modified().unwrap_or(SystemTime::UNIX_EPOCH);
        let path = entry.path();

        if modified < cutoff {
            if std::fs::remove_file(&path).is_ok() {
                removed += 1;
            }
            continue;
        }
        candidates.push((path, modified, meta.len()));
    }

    candidates.sort_by_key(|(_, modified, _)| *modified);
    let mut total: u64 = candidates.iter().map(|(_, _, size)| *size).sum();
    for (path, _modified, size) in candidates {
        if total <= RUN_LOG_TOTAL_CAP_BYTES {
            break;
        }
        if std::fs::remove_file(&path).is_ok() {
            removed += 1;
        }
        total = total.saturating_sub(size);
    }

    Ok(removed)
}

pub(crate) fn now_ms() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as i64
}
