use crate::auth;
use crate::canonical::SlugCanonicalizer;
use crate::config::AppConfig;
use crate::image_input::{self, SelectedImage};
use crate::paths::AppPaths;
use crate::render::{self, RenderedResults};
use crate::runlog::{self, RunLog};
use crate::search;
use crate::thumbnail::ThumbnailResolver;
use crate::upload;
use crate::{EngineError, Result};
use serde::Serialize;
use serde_json::Value;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use thiserror::Error;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RunStage {
    Idle,
    SelectingImage,
    Uploading,
    Authenticating,
    Searching,
    RenderingResults,
    Failed,
}

impl RunStage {
    pub fn as_str(&self) -> &'static str {
        match self {
            RunStage::Idle => "idle",
            RunStage::SelectingImage => "selecting_image",
            RunStage::Uploading => "uploading",
            RunStage::Authenticating => "authenticating",
            RunStage::Searching => "searching",
            RunStage::RenderingResults => "rendering_results",
            RunStage::Failed => "failed",
        }
    }
}

impl std::fmt::Display for RunStage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Error)]
#[error("search run {run_id} failed while {stage}: {error}")]
pub struct RunFailure {
    pub run_id: String,
    /// Stage that was in flight when the run aborted.
    pub stage: RunStage,
    #[source]
    pub error: EngineError,
}

#[derive(Debug, Clone, Serialize)]
pub struct RunReport {
    pub run_id: String,
    pub image: SelectedImage,
    pub uploaded_url: String,
    pub results: RenderedResults,
    pub log_path: PathBuf,
}

/// Owns the configuration and makes sure only one run is in flight at a time.
#[derive(Debug)]
pub struct SearchSession {
    paths: AppPaths,
    config: AppConfig,
    in_flight: AtomicBool,
}

impl SearchSession {
    pub fn new(paths: AppPaths, config: AppConfig) -> Result<Self> {
        paths.ensure_dirs()?;
        runlog::prune_run_logs(&paths)?;
        Ok(Self {
            paths,
            config,
            in_flight: AtomicBool::new(false),
        })
    }

    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    pub fn is_busy(&self) -> bool {
        self.in_flight.load(Ordering::SeqCst)
    }

    /// Claims the session for one run. Fails with `SessionBusy` while another
    /// run holds it; the claim is released when the returned value drops.
    pub fn begin(&self) -> Result<ActiveRun<'_>> {
        if self
            .in_flight
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            return Err(EngineError::SessionBusy);
        }
        Ok(ActiveRun { session: self })
    }
}

pub struct ActiveRun<'s> {
    session: &'s SearchSession,
}

impl Drop for ActiveRun<'_> {
    fn drop(&mut self) {
        self.session.in_flight.store(false, Ordering::SeqCst);
    }
}

impl ActiveRun<'_> {
    /// Runs select → upload → authenticate → search → render for one image.
    /// `on_stage` sees every transition, including `Failed`; `on_log` sees
    /// every structured event that is written to the run log.
    pub fn run<FStage, FLog>(
        self,
        image_path: Option<&Path>,
        mut on_stage: FStage,
        mut on_log: FLog,
    ) -> std::result::Result<RunReport, RunFailure>
    where
        FStage: FnMut(RunStage),
        FLog: FnMut(&str, &str, &Value),
    {
        let run_id = Uuid::new_v4().to_string();
        let mut run = SearchRun {
            log: RunLog::new(&self.session.paths, &run_id),
            run_id,
            stage: RunStage::Idle,
        };

        match run.execute(&self.session.config, image_path, &mut on_stage, &mut on_log) {
            Ok(report) => {
                run.stage = RunStage::Idle;
                on_stage(run.stage);
                Ok(report)
            }
            Err(error) => {
                let stage = run.stage;
                let data = serde_json::json!({
                    "stage": stage.as_str(),
                    "error": error.to_string(),
                });
                on_log("error", "run_failed", &data);
                let _ = run.log.line("error", "run_failed", data);
                run.stage = RunStage::Failed;
                on_stage(run.stage);
                Err(RunFailure {
                    run_id: run.run_id,
                    stage,
                    error,
                })
            }
        }
    }
}

/// State of one user-triggered search. Built fresh for every run and dropped
/// when the run ends.
struct SearchRun {
    run_id: String,
    stage: RunStage,
    log: RunLog,
}

impl SearchRun {
    fn execute<FStage, FLog>(
        &mut self,
        config: &AppConfig,
        image_path: Option<&Path>,
        on_stage: &mut FStage,
        on_log: &mut FLog,
    ) -> Result<RunReport>
    where
        FStage: FnMut(RunStage),
        FLog: FnMut(&str, &str, &Value),
    {
        // Run log writes never abort a run; the first failure is reported
        // through `on_log` and later ones are dropped.
        let log = &self.log;
        let mut log_write_failed = false;
        let mut sink = |level: &str, event: &str, data: Value| -> Result<()> {
            on_log(level, event, &data);
            if let Err(err) = log.line(level, event, data) {
                if !log_write_failed {
                    log_write_failed = true;
                    on_log(
                        "warn",
                        "run_log_write_failed",
                        &serde_json::json!({
                            "path": log.path().to_string_lossy(),
                            "error": err.to_string(),
                        }),
                    );
                }
            }
            Ok(())
        };

        advance(&mut self.stage, RunStage::SelectingImage, on_stage);
        let image = image_input::select_image(image_path)?;
        sink(
            "info",
            "image_selected",
            serde_json::json!({
                "path": image.path.to_string_lossy(),
                "width": image.width,
                "height": image.height,
                "bytes": image.bytes,
            }),
        )?;

        advance(&mut self.stage, RunStage::Uploading, on_stage);
        let uploaded = upload::upload_image(
            &config.endpoints.imgbb_upload,
            &config.imgbb_api_key,
            &image.path,
            &mut sink,
        )?;

        advance(&mut self.stage, RunStage::Authenticating, on_stage);
        let token = auth::fetch_token(&config.endpoints.token, &config.oauth, &mut sink)?;

        advance(&mut self.stage, RunStage::Searching, on_stage);
        let products = search::visual_search(
            &config.endpoints.visual_search,
            &uploaded.url,
            &token,
            &mut sink,
        )?;

        advance(&mut self.stage, RunStage::RenderingResults, on_stage);
        let canonicalizer = SlugCanonicalizer::new(config.endpoints.product_url_template.as_str());
        let resolver =
            ThumbnailResolver::new(&canonicalizer, config.endpoints.retail_referer.as_str());

        let mut results = RenderedResults::default();
        for product in &products {
            let thumbnail = match product.link.as_deref().filter(|l| !l.trim().is_empty()) {
                Some(link) => resolver.resolve(
                    link,
                    config.thumbnail_width,
                    product.name.as_deref(),
                    &mut sink,
                ),
                None => None,
            };
            results
                .products
                .push(render::render_product(product, thumbnail));
        }
        sink(
            "info",
            "results_rendered",
            serde_json::json!({
                "header": results.header(),
                "with_thumbnail": results.products.iter().filter(|p| p.thumbnail.is_some()).count(),
            }),
        )?;

        Ok(RunReport {
            run_id: self.run_id.clone(),
            image,
            uploaded_url: uploaded.url,
            results,
            log_path: self.log.path().to_path_buf(),
        })
    }
}

fn advance<FStage>(stage: &mut RunStage, next: RunStage, on_stage: &mut FStage)
where
    FStage: FnMut(RunStage),
{
    *stage = next;
    on_stage(next);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::parse_config;

    fn session(dir: &tempfile::TempDir) -> SearchSession {
        let config = parse_config(
            "indiTEx:\n  oauth_client_id: a\n  oauth_client_secret: b\nimgBB:\n  api_key: c\n",
        )
        .expect("config");
        SearchSession::new(AppPaths::new(dir.path().to_path_buf()), config).expect("session")
    }

    #[test]
    fn second_run_is_refused_while_one_is_in_flight() {
        let dir = tempfile::tempdir().expect("tempdir");
        let session = session(&dir);

        let first = session.begin().expect("first run");
        assert!(session.is_busy());
        assert!(matches!(session.begin(), Err(EngineError::SessionBusy)));

        drop(first);
        assert!(!session.is_busy());
        assert!(session.begin().is_ok());
    }

    #[test]
    fn missing_selection_fails_before_any_network_stage() {
        let dir = tempfile::tempdir().expect("tempdir");
        let session = session(&dir);

        let mut stages: Vec<RunStage> = Vec::new();
        let failure = session
            .begin()
            .expect("run")
            .run(None, |s| stages.push(s), |_, _, _| {})
            .expect_err("no image");

        assert_eq!(failure.stage, RunStage::SelectingImage);
        assert!(matches!(failure.error, EngineError::Selection(_)));
        assert_eq!(stages, vec![RunStage::SelectingImage, RunStage::Failed]);
        assert!(!session.is_busy());
    }

    #[test]
    fn failure_is_written_to_the_run_log() {
        let dir = tempfile::tempdir().expect("tempdir");
        let session = session(&dir);

        let failure = session
            .begin()
            .expect("run")
            .run(None, |_| {}, |_, _, _| {})
            .expect_err("no image");

        let log_path = AppPaths::new(dir.path().to_path_buf()).run_log_path(&failure.run_id);
        let raw = std::fs::read_to_string(log_path).expect("log");
        assert!(raw.contains("\"run_failed\""), "log={raw}");
        assert!(raw.contains("selecting_image"), "log={raw}");
    }

    #[test]
    fn unwritable_run_log_still_reports_the_real_failure() {
        let dir = tempfile::tempdir().expect("tempdir");
        let session = session(&dir);
        let paths = AppPaths::new(dir.path().to_path_buf());
        std::fs::remove_dir_all(paths.run_logs_dir()).expect("remove runs dir");
        std::fs::write(paths.run_logs_dir(), b"not a directory").expect("blocker");

        let mut stages: Vec<RunStage> = Vec::new();
        let mut events: Vec<String> = Vec::new();
        let failure = session
            .begin()
            .expect("run")
            .run(
                None,
                |s| stages.push(s),
                |_, event, _| events.push(event.to_string()),
            )
            .expect_err("no image");

        assert_eq!(failure.stage, RunStage::SelectingImage);
        assert!(matches!(failure.error, EngineError::Selection(_)), "{failure:?}");
        assert_eq!(stages, vec![RunStage::SelectingImage, RunStage::Failed]);
        assert!(events.iter().any(|e| e == "run_failed"), "events={events:?}");
        assert!(!session.is_busy());
    }
}
