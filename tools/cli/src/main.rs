//! CourseSync CLI - Command line interface for pushing courses.
//!
//! This tool publishes locally authored courses to a Stepik-compatible
//! platform and keeps published courses up to date.

mod config;
mod terminal;

use anyhow::{Context, Result};
use clap::{Args, CommandFactory, Parser, Subcommand};
use clap_complete::Shell;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{info, warn, Level};
use tracing_subscriber::FmtSubscriber;

use coursesync_model::{Course, StudyItem};
use coursesync_remote::{create_default_registry, ResolvedGateway};
use coursesync_sync::{CancelFlag, CoursePusher, LogProgress, SyncReport, SyncStatus};

use crate::config::{CliConfig, TOKEN_ENV};
use crate::terminal::{TerminalConfirmation, TerminalNotifier};

#[derive(Parser)]
#[command(name = "coursesync")]
#[command(about = "CourseSync - Publish and update courses on a learning platform")]
#[command(version)]
struct Cli {
    /// Enable verbose logging.
    #[arg(short, long)]
    verbose: bool,

    /// Configuration file (default: <config dir>/coursesync/config.json).
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Args, Debug, Clone)]
struct PushArgs {
    /// Course file.
    #[arg(short, long)]
    course: PathBuf,

    /// Answer yes to every question.
    #[arg(short, long)]
    yes: bool,

    /// Open the course in the browser when done.
    #[arg(long)]
    open: bool,

    /// Ask for an API token if none is configured.
    #[arg(long)]
    login: bool,

    /// Push to an in-memory platform and leave the course file untouched.
    #[arg(long)]
    dry_run: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Publish a course, or update it if it was published before.
    Push {
        #[command(flatten)]
        args: PushArgs,
    },

    /// Publish a course as a new course, dropping its remote identity.
    Republish {
        #[command(flatten)]
        args: PushArgs,
    },

    /// Upload only the additional files of a published course.
    UpdateMaterials {
        #[command(flatten)]
        args: PushArgs,
    },

    /// Push one top-level section or lesson of a published course.
    PushItem {
        #[command(flatten)]
        args: PushArgs,

        /// Zero-based index of the item in the course.
        #[arg(short, long)]
        index: usize,
    },

    /// Show what a course file holds and what was pushed.
    Status {
        /// Course file.
        #[arg(short, long)]
        course: PathBuf,
    },

    /// Manage the configuration file.
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },

    /// Print shell completions.
    Completions {
        /// Target shell.
        shell: Shell,
    },
}

#[derive(Subcommand)]
enum ConfigAction {
    /// Write a default configuration file.
    Init {
        /// Overwrite an existing file.
        #[arg(short, long)]
        force: bool,
    },

    /// Print the effective configuration.
    Show,
}

#[derive(Debug, Clone, Copy)]
enum PushKind {
    Sync,
    Republish,
    Materials,
    Item(usize),
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Setup logging
    let level = if cli.verbose {
        Level::DEBUG
    } else {
        Level::INFO
    };

    let subscriber = FmtSubscriber::builder()
        .with_max_level(level)
        .with_target(false)
        .compact()
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    let config_path = match cli.config {
        Some(path) => path,
        None => CliConfig::default_path()?,
    };

    match cli.command {
        Commands::Push { args } => cmd_push(&config_path, &args, PushKind::Sync).await,

        Commands::Republish { args } => cmd_push(&config_path, &args, PushKind::Republish).await,

        Commands::UpdateMaterials { args } => {
            cmd_push(&config_path, &args, PushKind::Materials).await
        }

        Commands::PushItem { args, index } => {
            cmd_push(&config_path, &args, PushKind::Item(index)).await
        }

        Commands::Status { course } => cmd_status(&config_path, &course).await,

        Commands::Config { action } => match action {
            ConfigAction::Init { force } => cmd_config_init(&config_path, force).await,
            ConfigAction::Show => cmd_config_show(&config_path).await,
        },

        Commands::Completions { shell } => {
            let mut command = Cli::command();
            clap_complete::generate(shell, &mut command, "coursesync", &mut std::io::stdout());
            Ok(())
        }
    }
}

/// Resolve the gateway named in the configuration.
fn resolve_gateway(config: &CliConfig, args: &PushArgs) -> Result<ResolvedGateway> {
    let registry = create_default_registry();
    let name = if args.dry_run {
        "memory"
    } else {
        config.gateway.as_str()
    };

    let mut token = config.resolve_token(std::env::var(TOKEN_ENV).ok());
    if token.is_none() && args.login && name != "memory" {
        let entered = rpassword::prompt_password("API token: ").context("Failed to read token")?;
        if entered.trim().is_empty() {
            anyhow::bail!("Token cannot be empty");
        }
        token = Some(entered.trim().to_string());
    }

    registry
        .resolve(name, config.gateway_config(token))
        .with_context(|| format!("Failed to set up gateway '{}'", name))
}

/// Cancel the push on Ctrl-C.
fn watch_ctrl_c(cancel: CancelFlag) {
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("Cancelling after the current item");
            cancel.cancel();
        }
    });
}

/// Push a course file.
async fn cmd_push(config_path: &Path, args: &PushArgs, kind: PushKind) -> Result<()> {
    let config = CliConfig::load(config_path).await?;
    let course = Course::load(&args.course)
        .await
        .with_context(|| format!("Failed to load course {}", args.course.display()))?;
    info!("Loaded course '{}' from {}", course.name, args.course.display());

    let resolved = resolve_gateway(&config, args)?;
    let cancel = CancelFlag::new();
    watch_ctrl_c(cancel.clone());

    let pusher = CoursePusher::new(resolved.gateway, resolved.auth, config.sync.clone())
        .with_confirmation(Arc::new(TerminalConfirmation::new(args.yes)))
        .with_progress(Arc::new(LogProgress::new(cancel)))
        .with_notifications(Arc::new(TerminalNotifier::new(args.open)));

    // The push runs on its own task; prompts block only that task's worker.
    let push = tokio::spawn(async move {
        let mut course = course;
        let result = match kind {
            PushKind::Sync => pusher.sync(&mut course).await,
            PushKind::Republish => pusher.republish_as_new(&mut course).await,
            PushKind::Materials => pusher.update_additional_materials(&mut course).await,
            PushKind::Item(index) => pusher.push_item(&mut course, index).await,
        };
        (course, result)
    });
    let (course, result) = push.await.context("Push task failed")?;
    let report = result.context("Push failed")?;

    if args.dry_run {
        info!("Dry run, {} left unchanged", args.course.display());
    } else {
        course
            .save(&args.course)
            .await
            .with_context(|| format!("Failed to save course {}", args.course.display()))?;
    }

    print_report(&report);
    if report.status() == SyncStatus::PartiallyFailed {
        anyhow::bail!("{} items failed to push", report.failures.len());
    }
    Ok(())
}

fn print_report(report: &SyncReport) {
    let status = match report.status() {
        SyncStatus::Succeeded => "done",
        SyncStatus::PartiallyFailed => "done with failures",
        SyncStatus::Cancelled => "cancelled",
    };

    println!("Push {} in {:.1}s", status, report.duration.as_secs_f64());
    println!("  Course: {}", report.course_id);
    println!("  Created: {}", report.created);
    println!("  Updated: {}", report.updated);
    println!("  Deleted: {}", report.deleted);
    for failure in &report.failures {
        let retry = if failure.transient { " (retry later)" } else { "" };
        println!("  Failed {} '{}': {}{}", failure.kind, failure.name, failure.error, retry);
    }
}

/// Show course file contents.
async fn cmd_status(config_path: &Path, path: &Path) -> Result<()> {
    let config = CliConfig::load(config_path).await?;
    let course = Course::load(path)
        .await
        .with_context(|| format!("Failed to load course {}", path.display()))?;

    println!("Course: {} ({})", course.name, course.language);
    if course.is_pushed() {
        println!("  Published: {}", config.sync.course_url(course.id));
    } else {
        println!("  Published: no");
    }

    for (index, item) in course.items.iter().enumerate() {
        match item {
            StudyItem::Section(section) => {
                println!("  [{}] section {} {}", index, section.name, remote_mark(section.id));
                for lesson in &section.lessons {
                    println!(
                        "        lesson {} {} ({} tasks)",
                        lesson.name,
                        remote_mark(lesson.id),
                        lesson.tasks.len()
                    );
                }
            }
            StudyItem::Lesson(lesson) => println!(
                "  [{}] lesson {} {} ({} tasks)",
                index,
                lesson.name,
                remote_mark(lesson.id),
                lesson.tasks.len()
            ),
        }
    }

    if course.has_mixed_top_level() {
        println!("  Note: sections and top-level lessons are mixed");
    }
    println!("  Lessons: {}", course.lesson_count());
    println!("  Additional files: {}", course.additional_files.len());

    Ok(())
}

fn remote_mark(id: u64) -> String {
    if id == 0 {
        "(local)".to_string()
    } else {
        format!("#{}", id)
    }
}

/// Write a default configuration file.
async fn cmd_config_init(path: &Path, force: bool) -> Result<()> {
    if !force && tokio::fs::try_exists(path).await.unwrap_or(false) {
        anyhow::bail!("{} already exists, use --force to overwrite", path.display());
    }

    CliConfig::default().save(path).await?;
    println!("Configuration written to {}", path.display());
    Ok(())
}

/// Print the effective configuration.
async fn cmd_config_show(path: &Path) -> Result<()> {
    let config = CliConfig::load(path).await?;
    println!("# {}", path.display());
    println!("{}", serde_json::to_string_pretty(&config.redacted())?);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_definition() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_push_item() {
        let cli = Cli::try_parse_from([
            "coursesync",
            "push-item",
            "--course",
            "course.json",
            "--index",
            "2",
            "--dry-run",
        ])
        .unwrap();

        match cli.command {
            Commands::PushItem { args, index } => {
                assert_eq!(index, 2);
                assert!(args.dry_run);
                assert_eq!(args.course, PathBuf::from("course.json"));
            }
            _ => panic!("expected push-item"),
        }
    }

    #[test]
    fn test_remote_mark() {
        assert_eq!(remote_mark(0), "(local)");
        assert_eq!(remote_mark(12), "#12");
    }

    #[tokio::test]
    async fn test_dry_run_push_leaves_file_untouched() {
        let dir = tempfile::TempDir::new().unwrap();
        let config_path = dir.path().join("config.json");
        let course_path = dir.path().join("course.json");
        let course =
            Course::new("Demo", "rust").with_section(coursesync_model::Section::new("Intro"));
        course.save(&course_path).await.unwrap();
        let before = tokio::fs::read(&course_path).await.unwrap();

        let args = PushArgs {
            course: course_path.clone(),
            yes: true,
            open: false,
            login: false,
            dry_run: true,
        };
        cmd_push(&config_path, &args, PushKind::Sync).await.unwrap();

        assert_eq!(tokio::fs::read(&course_path).await.unwrap(), before);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_push_on_multi_thread_runtime() {
        let dir = tempfile::TempDir::new().unwrap();
        let config_path = dir.path().join("config.json");
        let course_path = dir.path().join("course.json");
        let course =
            Course::new("Demo", "rust").with_section(coursesync_model::Section::new("Intro"));
        course.save(&course_path).await.unwrap();

        let args = PushArgs {
            course: course_path.clone(),
            yes: true,
            open: false,
            login: false,
            dry_run: true,
        };
        cmd_push(&config_path, &args, PushKind::Sync).await.unwrap();

        // An unpublished course has no item to push on its own.
        let err = cmd_push(&config_path, &args, PushKind::Item(0)).await.unwrap_err();
        assert!(err.to_string().contains("Push failed"));
    }

    #[tokio::test]
    async fn test_config_init_refuses_overwrite() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("config.json");

        cmd_config_init(&path, false).await.unwrap();
        assert!(cmd_config_init(&path, false).await.is_err());
        cmd_config_init(&path, true).await.unwrap();
    }
}
