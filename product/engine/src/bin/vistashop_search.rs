use std::path::PathBuf;

use vistashop_engine::config;
use vistashop_engine::image_input::SUPPORTED_EXTENSIONS;
use vistashop_engine::paths::AppPaths;
use vistashop_engine::pipeline::{RunStage, SearchSession};

fn main() -> Result<(), String> {
    let args: Vec<String> = std::env::args().collect();

    if args.iter().any(|a| a == "-h" || a == "--help") {
        print_help();
        return Ok(());
    }

    let mut base_dir: Option<PathBuf> = None;
    let mut html_out: Option<PathBuf> = None;
    let mut image_path: Option<PathBuf> = None;
    let mut json = false;
    let mut verbose = false;

    let mut i = 1;
    while i < args.len() {
        match args[i].as_str() {
            "--base-dir" => {
                i += 1;
                let v = args
                    .get(i)
                    .ok_or_else(|| "--base-dir requires a value".to_string())?;
                base_dir = Some(PathBuf::from(v));
            }
            "--html" => {
                i += 1;
                let v = args
                    .get(i)
                    .ok_or_else(|| "--html requires a value".to_string())?;
                html_out = Some(PathBuf::from(v));
            }
            "--json" => json = true,
            "--verbose" | "-v" => verbose = true,
            other if other.starts_with("--") => {
                return Err(format!("unknown arg: {other} (try --help)"))
            }
            other => {
                if image_path.is_some() {
                    return Err(format!("only one image can be searched at a time: {other}"));
                }
                image_path = Some(PathBuf::from(other));
            }
        }
        i += 1;
    }

    let paths = AppPaths::discover(base_dir.as_deref())
        .ok_or_else(|| "could not determine base dir; pass --base-dir".to_string())?;
    let config = config::load_config(&paths).map_err(|e| e.to_string())?;
    let log_paths = paths.clone();
    let session = SearchSession::new(paths, config).map_err(|e| e.to_string())?;

    let active = session.begin().map_err(|e| e.to_string())?;
    let outcome = active.run(
        image_path.as_deref(),
        |stage| {
            if let Some(label) = stage_label(stage) {
                eprintln!("{label}");
            }
        },
        |level, event, data| {
            if verbose || level == "error" {
                eprintln!("[{level}] {event} {data}");
            }
        },
    );

    let report = match outcome {
        Ok(report) => report,
        Err(failure) => {
            return Err(format!(
                "{failure} (run log: {})",
                log_paths.run_log_path(&failure.run_id).to_string_lossy()
            ));
        }
    };

    eprintln!("Image uploaded: {}", report.uploaded_url);
    if json {
        let out = serde_json::to_string_pretty(&report).map_err(|e| e.to_string())?;
        println!("{out}");
    } else {
        print!("{}", report.results.to_text());
    }

    if let Some(path) = html_out {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent).map_err(|e| e.to_string())?;
            }
        }
        std::fs::write(&path, report.results.to_html()).map_err(|e| e.to_string())?;
        eprintln!("HTML results: {}", path.to_string_lossy());
    }
    eprintln!("Run log: {}", report.log_path.to_string_lossy());

    Ok(())
}

fn stage_label(stage: RunStage) -> Option<&'static str> {
    match stage {
        RunStage::SelectingImage => Some("Loading image..."),
        RunStage::Uploading => Some("Uploading image to imgBB..."),
        RunStage::Authenticating => Some("Requesting access token..."),
        RunStage::Searching => Some("Running visual search..."),
        RunStage::RenderingResults => Some("Resolving product thumbnails..."),
        RunStage::Failed => Some("Search failed."),
        RunStage::Idle => None,
    }
}

fn print_help() {
    println!(
        r#"vistashop_search

Finds catalog products that look like a local photo.

Usage:
  cargo run --bin vistashop_search -- <image>
  cargo run --bin vistashop_search -- --html results.html <image>

Options:
  --base-dir <path>   Directory holding config.yml and logs/ (default: $VISTASHOP_BASE_DIR,
                      else the executable's directory)
  --html <path>       Also write the results as HTML
  --json              Print the full run report as JSON instead of text
  -v, --verbose       Echo every run log event to stderr

Supported image types: {}
"#,
        SUPPORTED_EXTENSIONS.join(", ")
    );
}
