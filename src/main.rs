mod cli;

use segforge::{store_upload, SessionManager};
use segforge_av::{FfmpegEngine, MediaEngine, ToolRegistry};
use segforge_core::config::Config;
use segforge_core::{plan, SessionId, MAX_DURATION_SECS};

use anyhow::{Context, Result};
use clap::Parser;
use cli::{Cli, Commands};
use std::num::NonZeroU32;
use std::path::{Path, PathBuf};
use std::sync::Arc;

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Respect RUST_LOG if set, otherwise pick defaults from the verbose flag
    let env_filter = std::env::var("RUST_LOG").unwrap_or_else(|_| {
        if cli.verbose {
            "segforge=trace,segforge_av=trace,segforge_core=debug".to_string()
        } else {
            "segforge=info,segforge_av=info,segforge_core=info".to_string()
        }
    });

    tracing_subscriber::fmt()
        .with_env_filter(&env_filter)
        .with_writer(std::io::stderr)
        .init();

    match cli.command {
        Commands::Split {
            files,
            duration,
            output,
            keep,
        } => {
            let rt = tokio::runtime::Runtime::new()?;
            rt.block_on(split(
                &files,
                duration,
                &output,
                keep,
                cli.config.as_deref(),
            ))
        }
        Commands::Plan { total, duration } => print_plan(total, duration),
        Commands::Probe { file, json } => {
            let rt = tokio::runtime::Runtime::new()?;
            rt.block_on(probe_file(&file, json, cli.config.as_deref()))
        }
        Commands::CheckTools => check_tools(cli.config.as_deref()),
        Commands::Validate {
            config: config_path,
        } => {
            let path = config_path.or(cli.config);
            validate_config(path.as_deref())
        }
        Commands::Version => {
            println!("segforge {}", env!("CARGO_PKG_VERSION"));
            Ok(())
        }
    }
}

fn build_engine(config: &Config) -> Result<Arc<FfmpegEngine>> {
    let tools = ToolRegistry::discover(&config.tools);
    let engine = FfmpegEngine::from_registry(&tools, &config.segment)
        .context("ffmpeg and ffprobe are required; run `segforge check-tools`")?;
    Ok(Arc::new(engine))
}

async fn split(
    files: &[PathBuf],
    duration: Option<u32>,
    output: &Path,
    keep: bool,
    config_path: Option<&Path>,
) -> Result<()> {
    let config = Config::load_or_default(config_path);
    config.storage.ensure_dirs()?;
    let manager = SessionManager::new(build_engine(&config)?, &config);

    let part = duration.unwrap_or(config.sessions.default_part_duration_secs);
    let session = SessionId::new();
    tracing::info!(session_id = %session, files = files.len(), part_secs = part, "Starting split");

    let result = run_session(&manager, &config, session, files, part, output).await;

    if keep {
        println!("Session files kept under prefix {}", session.file_prefix());
    } else {
        let report = manager.reclaim(&session).await;
        if !report.is_clean() {
            tracing::warn!(session_id = %session, failed = report.failed, "Some session files could not be deleted");
        }
    }

    result
}

async fn run_session(
    manager: &SessionManager,
    config: &Config,
    session: SessionId,
    files: &[PathBuf],
    part: u32,
    output: &Path,
) -> Result<()> {
    let mut stored = Vec::with_capacity(files.len());
    for file in files {
        let name = file
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        stored.push(store_upload(&config.storage, &session, file, &name).await?);
    }

    manager.register(session, stored, part).await?;
    let archive = manager.process(&session).await?;
    let archive_path = manager.fetch_archive(&session).await?;

    tokio::fs::copy(&archive_path, output)
        .await
        .with_context(|| format!("Failed to write {}", output.display()))?;

    println!("Wrote {} ({} parts)", output.display(), archive.members.len());
    for member in &archive.members {
        println!("  {member}");
    }
    Ok(())
}

fn print_plan(total: f64, duration: u32) -> Result<()> {
    let part = NonZeroU32::new(duration).context("--duration must be at least 1 second")?;
    if !total.is_finite() || total < 0.0 {
        anyhow::bail!("--total must be a non-negative number of seconds");
    }
    if total > MAX_DURATION_SECS {
        anyhow::bail!("--total must not exceed {MAX_DURATION_SECS} seconds");
    }

    let windows = plan(total, part);
    println!("{} window(s) for {total}s in {duration}s parts", windows.len());
    for w in &windows {
        println!(
            "  [{}] start {:.3}s, length {:.3}s",
            w.index,
            w.start_secs,
            w.effective_length(total)
        );
    }
    Ok(())
}

async fn probe_file(file: &Path, json: bool, config_path: Option<&Path>) -> Result<()> {
    if !file.exists() {
        anyhow::bail!("File does not exist: {:?}", file);
    }

    let config = Config::load_or_default(config_path);
    let engine = build_engine(&config)?;
    let descriptor = engine.probe(file).await?;

    if json {
        println!("{}", serde_json::to_string_pretty(&descriptor)?);
    } else {
        let secs = descriptor.duration_secs as u64;
        println!("File: {}", descriptor.path.display());
        println!(
            "Duration: {:02}:{:02}:{:02} ({:.3}s)",
            secs / 3600,
            (secs / 60) % 60,
            secs % 60,
            descriptor.duration_secs
        );
        println!("Video: {}", if descriptor.has_video { "yes" } else { "no" });
        println!("Audio: {}", if descriptor.has_audio { "yes" } else { "no" });
    }

    Ok(())
}

fn check_tools(config_path: Option<&Path>) -> Result<()> {
    println!("Checking external tools...\n");

    let config = Config::load_or_default(config_path);
    let tools = ToolRegistry::discover(&config.tools).check_all();
    let mut all_ok = true;

    for tool in &tools {
        let status = if tool.available {
            "✓"
        } else {
            all_ok = false;
            "✗"
        };

        print!("{} {}", status, tool.name);

        if let Some(ref version) = tool.version {
            print!(" ({})", version);
        }

        if let Some(ref path) = tool.path {
            print!(" - {}", path.display());
        }

        println!();
    }

    println!();
    if all_ok {
        println!("All required tools are available!");
    } else {
        println!("Some tools are missing. Install ffmpeg to enable splitting.");
    }

    Ok(())
}

fn validate_config(path: Option<&Path>) -> Result<()> {
    let config = match path {
        Some(p) => {
            println!("Validating config: {:?}", p);
            let contents = std::fs::read_to_string(p)
                .with_context(|| format!("Failed to read {}", p.display()))?;
            let config = Config::from_json(&contents)?;
            println!("✓ Configuration is valid");
            config
        }
        None => {
            println!("No config file specified, using defaults");
            Config::default()
        }
    };

    println!("  Uploads: {}", config.storage.upload_dir.display());
    println!("  Outputs: {}", config.storage.output_dir.display());
    println!("  Idle timeout: {}s", config.sessions.idle_timeout_secs);
    println!("  Default part: {}s", config.sessions.default_part_duration_secs);
    println!("  Concurrency: {}", config.segment.concurrency());

    for warning in config.validate() {
        println!("  ⚠ {warning}");
    }

    Ok(())
}
