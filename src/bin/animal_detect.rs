//! animal_detect - decide whether an image shows an animal
//!
//! Prints exactly one JSON line on stdout: the analysis result on success
//! (exit 0) or `{"error": "..."}` on any failure (exit 1). Logs go to stderr.

use anyhow::Result;
use clap::error::ErrorKind;
use clap::Parser;
use std::path::PathBuf;
use std::process::ExitCode;

use animal_cascade::{AnalysisResult, AppConfig, BackendKind};

#[derive(Parser, Debug)]
#[command(author, version, about)]
struct Args {
    /// Image file to analyse.
    image: PathBuf,
    /// Config file (JSON, or TOML when the extension is .toml).
    #[arg(long, env = "ANIMAL_CASCADE_CONFIG")]
    config: Option<PathBuf>,
    /// Provider family (stub|tract); overrides the config file.
    #[arg(long, value_name = "BACKEND")]
    backend: Option<String>,
}

fn main() -> ExitCode {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();

    let args = match Args::try_parse() {
        Ok(args) => args,
        Err(e) if matches!(e.kind(), ErrorKind::DisplayHelp | ErrorKind::DisplayVersion) => {
            e.exit()
        }
        Err(e) => {
            let usage = e.render().to_string();
            let message = usage.lines().next().unwrap_or("invalid arguments");
            return fail(message.trim_start_matches("error: "));
        }
    };

    match run(&args) {
        Ok(result) => match serde_json::to_string(&result) {
            Ok(line) => {
                println!("{line}");
                ExitCode::SUCCESS
            }
            Err(e) => fail(&format!("failed to encode result: {e}")),
        },
        Err(e) => {
            log::error!("analysis of {} failed: {:#}", args.image.display(), e);
            fail(&format!("{:#}", e))
        }
    }
}

fn run(args: &Args) -> Result<AnalysisResult> {
    let mut cfg = AppConfig::load(args.config.as_deref())?;
    if let Some(backend) = args.backend.as_deref() {
        cfg.set_backend(backend.parse::<BackendKind>()?);
    }
    let registry = cfg.build_registry()?;
    log::debug!("registered backends: {}", registry.list().join(", "));
    let cascade = registry.build_cascade(&cfg.cascade)?;
    Ok(cascade.analyze(&args.image)?)
}

fn fail(message: &str) -> ExitCode {
    println!("{}", serde_json::json!({ "error": message }));
    ExitCode::FAILURE
}
