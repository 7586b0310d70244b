use std::path::{Path, PathBuf};

const BASE_DIR_ENV_VAR: &str = "VISTASHOP_BASE_DIR";

#[derive(Debug, Clone)]
pub struct AppPaths {
    pub base_dir: PathBuf,
}

impl AppPaths {
    pub fn new(base_dir: PathBuf) -> Self {
        Self { base_dir }
    }

    /// Resolves the base dir from an explicit override, `VISTASHOP_BASE_DIR`,
    /// or the directory holding the running executable (where `config.yml`
    /// ships next to the binary).
    pub fn discover(explicit: Option<&Path>) -> Option<Self> {
        if let Some(dir) = explicit {
            return Some(Self::new(dir.to_path_buf()));
        }
        if let Ok(v) = std::env::var(BASE_DIR_ENV_VAR) {
            let t = v.trim();
            if !t.is_empty() {
                return Some(Self::new(PathBuf::from(t)));
            }
        }
        let exe_path = std::env::current_exe().ok()?;
        exe_path.parent().map(|dir| Self::new(dir.to_path_buf()))
    }

    pub fn config_path(&self) -> PathBuf {
        self.base_dir.join("config.yml")
    }

    pub fn logs_dir(&self) -> PathBuf {
        self.base_dir.join("logs")
    }

    pub fn run_logs_dir(&self) -> PathBuf {
        self.logs_dir().join("runs")
    }

    pub fn run_log_path(&self, run_id: &str) -> PathBuf {
        self.run_logs_dir().join(format!("{run_id}.jsonl"))
    }

    pub fn ensure_dirs(&self) -> std::io::Result<()> {
        std::fs::create_dir_all(self.run_logs_dir())?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn explicit_base_dir_wins() {
        let dir = tempfile::tempdir().expect("tempdir");
        let paths = AppPaths::discover(Some(dir.path())).expect("paths");
        assert_eq!(paths.config_path(), dir.path().join("config.yml"));
        assert_eq!(
            paths.run_log_path("abc"),
            dir.path().join("logs").join("runs").join("abc.jsonl")
        );
    }
}
