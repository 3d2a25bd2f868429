mod cli;

use rendition::{config, context::AppContext, import};
use rendition_common::{JobId, JobStatus, MediaKind, OriginalId, OwnerId};
use rendition_db::get_conn;
use rendition_db::queries::transcode_jobs;

use anyhow::{Context, Result};
use clap::Parser;
use cli::{Cli, Commands};
use std::path::Path;

async fn run_scheduler(config_path: Option<&Path>) -> Result<()> {
    let config = config::load_config_or_default(config_path)?;

    for (name, configured) in [
        ("ffmpeg", config.tools.ffmpeg_path.as_deref()),
        ("ffprobe", config.tools.ffprobe_path.as_deref()),
    ] {
        match rendition_av::resolve_tool(name, configured) {
            Ok(path) => tracing::debug!("Using {} at {}", name, path.display()),
            Err(e) => tracing::warn!("{}; transcodes will fail until it is installed", e),
        }
    }

    tracing::info!("Starting Rendition scheduler");
    tracing::info!("Data directory: {}", config.data_dir.display());

    let ctx = AppContext::open(config).context("Failed to open database")?;
    let scheduler = ctx.scheduler();
    let handle = scheduler.handle();
    let mut task = tokio::spawn(scheduler.run());

    tokio::select! {
        joined = &mut task => {
            joined.context("Scheduler task panicked")??;
            return Ok(());
        }
        signal = tokio::signal::ctrl_c() => {
            signal.context("Failed to listen for Ctrl-C")?;
        }
    }

    tracing::info!("Shutting down, waiting for running jobs...");
    handle.shutdown();
    task.await.context("Scheduler task panicked")??;

    Ok(())
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Respect RUST_LOG env var if set, otherwise use defaults based on verbose flag
    let env_filter = std::env::var("RUST_LOG").unwrap_or_else(|_| {
        if cli.verbose {
            "rendition=trace,rendition_db=debug,rendition_av=debug".to_string()
        } else {
            "rendition=info,rendition_db=info,rendition_av=info".to_string()
        }
    });

    tracing_subscriber::fmt()
        .with_env_filter(&env_filter)
        .init();

    match cli.command {
        Commands::Run => {
            let rt = tokio::runtime::Runtime::new()?;
            rt.block_on(run_scheduler(cli.config.as_deref()))
        }
        Commands::Import { file, owner, kind } => {
            let rt = tokio::runtime::Runtime::new()?;
            rt.block_on(import_file(&file, owner, kind, cli.config.as_deref()))
        }
        Commands::Enqueue { original_id } => {
            let rt = tokio::runtime::Runtime::new()?;
            rt.block_on(enqueue(original_id, cli.config.as_deref()))
        }
        Commands::Jobs { status, json } => list_jobs(status, json, cli.config.as_deref()),
        Commands::Retry { job_id } => retry_job(job_id, cli.config.as_deref()),
        Commands::Reconcile => {
            let rt = tokio::runtime::Runtime::new()?;
            rt.block_on(reconcile(cli.config.as_deref()))
        }
        Commands::CheckTools => check_tools(cli.config.as_deref()),
        Commands::Validate {
            config: config_path,
        } => {
            let path = config_path.or(cli.config);
            validate_config(path.as_deref())
        }
        Commands::Version => {
            println!("rendition {}", env!("CARGO_PKG_VERSION"));
            Ok(())
        }
    }
}

fn open_context(config_path: Option<&Path>) -> Result<AppContext> {
    let config = config::load_config_or_default(config_path)?;
    AppContext::open(config).context("Failed to open database")
}

async fn import_file(
    file: &Path,
    owner: i64,
    kind: MediaKind,
    config_path: Option<&Path>,
) -> Result<()> {
    let ctx = open_context(config_path)?;

    let imported = import::import_file(&ctx, file, OwnerId::from(owner), kind)
        .await
        .with_context(|| format!("Failed to import {:?}", file))?;
    println!(
        "Imported {} as original {} ({})",
        file.display(),
        imported.original_id,
        imported.source
    );

    let jobs = ctx
        .orchestrator()
        .transcode_source(imported.source)
        .await
        .context("Failed to plan renditions")?;
    print_enqueued(&jobs);
    ctx.reconciler.reconcile_all().await?;

    Ok(())
}

async fn enqueue(original_id: i64, config_path: Option<&Path>) -> Result<()> {
    let ctx = open_context(config_path)?;

    let jobs = ctx
        .orchestrator()
        .transcode_original(OriginalId::from(original_id))
        .await
        .with_context(|| format!("Failed to plan renditions for original {}", original_id))?;
    print_enqueued(&jobs);
    ctx.reconciler.reconcile_all().await?;

    Ok(())
}

fn print_enqueued(jobs: &[rendition_db::models::TranscodeJob]) {
    if jobs.is_empty() {
        println!("No jobs enqueued (source file missing?)");
        return;
    }
    println!("Enqueued {} job(s):", jobs.len());
    for job in jobs {
        println!("  #{} {}", job.id, job.kind);
    }
}

fn list_jobs(status: Option<JobStatus>, json: bool, config_path: Option<&Path>) -> Result<()> {
    let ctx = open_context(config_path)?;
    let conn = get_conn(&ctx.pool)?;
    let jobs = transcode_jobs::list_jobs(&conn, status)?;

    if json {
        println!("{}", serde_json::to_string_pretty(&jobs)?);
        return Ok(());
    }

    if jobs.is_empty() {
        println!("No jobs");
        return Ok(());
    }

    println!(
        "{:>6}  {:<8}  {:>8}  {:<24}  {}",
        "ID", "STATUS", "ORIGINAL", "KIND", "SUBMITTED"
    );
    for job in &jobs {
        println!(
            "{:>6}  {:<8}  {:>8}  {:<24}  {}",
            job.id,
            job.status,
            job.original_id,
            job.kind.to_string(),
            job.submitted_at
        );
        if let Some(ref error) = job.error {
            println!("        error: {}", error.lines().next().unwrap_or(""));
        }
    }

    Ok(())
}

fn retry_job(job_id: i64, config_path: Option<&Path>) -> Result<()> {
    let ctx = open_context(config_path)?;
    let conn = get_conn(&ctx.pool)?;
    let id = JobId::from(job_id);

    if !transcode_jobs::retry_failed(&conn, id)? {
        let job = transcode_jobs::get_job(&conn, id)?;
        anyhow::bail!("Job {} is {}, only failed jobs can be retried", id, job.status);
    }

    println!("Job {} returned to the queue", id);
    Ok(())
}

async fn reconcile(config_path: Option<&Path>) -> Result<()> {
    let ctx = open_context(config_path)?;
    let report = ctx.reconciler.reconcile_all().await?;
    println!("Reconciled: {}", report);
    Ok(())
}

fn check_tools(config_path: Option<&Path>) -> Result<()> {
    let config = config::load_config_or_default(config_path)?;
    println!("Checking external tools...\n");

    let tools = rendition_av::check_tools(&config.tools.ffmpeg(), &config.tools.ffprobe());
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
        println!("Some tools are missing. Transcoding needs both ffmpeg and ffprobe.");
    }

    Ok(())
}

fn validate_config(path: Option<&Path>) -> Result<()> {
    let config = match path {
        Some(p) => {
            println!("Validating config: {:?}", p);
            let config = config::load_config(p)?;
            println!("✓ Configuration is valid");
            config
        }
        None => {
            println!("No config file specified, using defaults");
            config::load_config_or_default(None)?
        }
    };

    println!("  Data dir: {}", config.data_dir.display());
    println!("  Database: {}", config.database_path().display());
    println!(
        "  Scheduler: {} concurrent, every {}s",
        config.scheduler.max_concurrent, config.scheduler.tick_secs
    );
    println!(
        "  Reference renditions: {}p video, {} kbps audio",
        config.scheduler.reference_video_height, config.scheduler.reference_audio_kbps
    );
    println!(
        "  Ladder: {:?} ({:?})",
        config.renditions.ladder, config.renditions.policy
    );

    Ok(())
}
