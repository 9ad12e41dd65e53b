use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use clap::{Arg, ArgAction, ArgMatches, Command};
use stale_file_archiver::services::FailureStage;
use stale_file_archiver::utils::time::{format_timestamp, parse_days};
use stale_file_archiver::{
    run_archive, AppConfig, ArchiveConfig, ArchiveReport, EnvCredentialStore,
    SharePointConnector, UploadTarget,
};
use std::path::PathBuf;
use std::process::ExitCode;
use tracing::{error, info, warn, Level};
use tracing_subscriber::EnvFilter;

/// Exit status for a run that completed with failed uploads
const PARTIAL_FAILURE_EXIT: u8 = 2;

#[tokio::main]
async fn main() -> Result<ExitCode> {
    let start = Utc::now();

    // Load .env first so it can feed the ARCHIVER_* argument fallbacks
    let dotenv_loaded = dotenvy::dotenv().is_ok();

    let matches = build_cli().get_matches();
    let config = create_app_config(&matches)?;

    initialize_logging(&config.log_level)?;
    if !dotenv_loaded {
        info!("No .env file found, using system environment variables");
    }

    info!(
        "Starting up (platform: {}/{}, current timestamp: {} (date: {}))",
        std::env::consts::OS,
        std::env::consts::ARCH,
        start.timestamp(),
        format_timestamp(start)
    );

    match run_application(config, start).await {
        Ok(code) => Ok(code),
        Err(e) => {
            error!("Archive run aborted: {:#}", e);
            Err(e)
        }
    }
}

/// Command line surface; every required option can also come from the environment
fn build_cli() -> Command {
    Command::new("stale-file-archiver")
        .version(env!("CARGO_PKG_VERSION"))
        .about("Upload files that meet the age criteria to a SharePoint document library")
        .arg(
            Arg::new("input-dir")
                .long("input-dir")
                .short('i')
                .alias("input_dir")
                .value_name("DIR")
                .env("ARCHIVER_INPUT_DIR")
                .required(true)
                .help("Directory to look for files in"),
        )
        .arg(
            Arg::new("working-dir")
                .long("working-dir")
                .short('w')
                .alias("working_dir")
                .value_name("DIR")
                .env("ARCHIVER_WORKING_DIR")
                .required(true)
                .help("Directory files are moved into before upload"),
        )
        .arg(
            Arg::new("host")
                .long("host")
                .aliases(["sharepoint-host", "sharepoint_host"])
                .value_name("HOST")
                .env("ARCHIVER_HOST")
                .required(true)
                .help("SharePoint host (e.g. example.sharepoint.com)"),
        )
        .arg(
            Arg::new("site")
                .long("site")
                .aliases(["sharepoint-site", "sharepoint_site"])
                .value_name("SITE")
                .env("ARCHIVER_SITE")
                .required(true)
                .help("Name of the SharePoint site to upload files to"),
        )
        .arg(
            Arg::new("library")
                .long("library")
                .aliases(["sharepoint-library", "sharepoint_library"])
                .value_name("LIBRARY")
                .env("ARCHIVER_LIBRARY")
                .required(true)
                .help("Name of the document library to upload files to"),
        )
        .arg(
            Arg::new("days")
                .long("days")
                .short('d')
                .value_name("DAYS")
                .env("ARCHIVER_DAYS")
                .required(true)
                .help("Only files older than that many days are uploaded"),
        )
        .arg(
            Arg::new("user")
                .long("user")
                .short('u')
                .value_name("USER")
                .env("ARCHIVER_USER")
                .required(true)
                .help("SharePoint user ID"),
        )
        .arg(
            Arg::new("delete")
                .long("delete")
                .action(ArgAction::SetTrue)
                .overrides_with("no-delete")
                .help("Delete files from the working directory once uploaded (default)"),
        )
        .arg(
            Arg::new("no-delete")
                .long("no-delete")
                .action(ArgAction::SetTrue)
                .overrides_with("delete")
                .help("Keep uploaded files in the working directory"),
        )
        .arg(
            Arg::new("dry-run")
                .long("dry-run")
                .action(ArgAction::SetTrue)
                .overrides_with("no-dry-run")
                .help("Only list eligible files; move, upload and delete nothing"),
        )
        .arg(
            Arg::new("no-dry-run")
                .long("no-dry-run")
                .action(ArgAction::SetTrue)
                .overrides_with("dry-run")
                .help("Perform the run (default)"),
        )
        .arg(
            Arg::new("log-level")
                .long("log-level")
                .value_name("LEVEL")
                .help("Set the log level (trace, debug, info, warn, error)")
                .default_value("info"),
        )
}

fn string_arg(matches: &ArgMatches, name: &str) -> Result<String> {
    matches
        .get_one::<String>(name)
        .cloned()
        .with_context(|| format!("Missing value for --{}", name))
}

/// Build the application configuration from parsed arguments
fn create_app_config(matches: &ArgMatches) -> Result<AppConfig> {
    let days = parse_days(&string_arg(matches, "days")?)?;

    let archive = ArchiveConfig {
        input_dir: PathBuf::from(string_arg(matches, "input-dir")?),
        working_dir: PathBuf::from(string_arg(matches, "working-dir")?),
        target: UploadTarget::new(
            string_arg(matches, "host")?,
            string_arg(matches, "site")?,
            string_arg(matches, "library")?,
        ),
        days,
        user: string_arg(matches, "user")?,
        delete: !matches.get_flag("no-delete"),
        dry_run: matches.get_flag("dry-run"),
    };

    Ok(AppConfig {
        archive,
        log_level: string_arg(matches, "log-level")?,
    })
}

/// Initialize structured logging with tracing
fn initialize_logging(log_level: &str) -> Result<()> {
    let level = match log_level.to_lowercase().as_str() {
        "trace" => Level::TRACE,
        "debug" => Level::DEBUG,
        "info" => Level::INFO,
        "warn" => Level::WARN,
        "error" => Level::ERROR,
        _ => Level::INFO,
    };

    let filter = EnvFilter::from_default_env()
        .add_directive(level.into())
        .add_directive("reqwest=warn".parse()?)
        .add_directive("hyper=warn".parse()?)
        .add_directive("rustls=warn".parse()?);

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false)
        .init();

    Ok(())
}

async fn run_application(config: AppConfig, start: DateTime<Utc>) -> Result<ExitCode> {
    info!("Configuration: {:#?}", config.archive);

    let credentials = EnvCredentialStore::new();
    let connector = SharePointConnector::new();
    let report = run_archive(&config.archive, start, &credentials, &connector).await?;

    print_selection_report(&report);
    print_upload_report(&report);
    print_final_summary(&report);

    if report.has_failures() {
        warn!("Run completed with {} failed uploads", report.failed_uploads());
        Ok(ExitCode::from(PARTIAL_FAILURE_EXIT))
    } else {
        info!("Application completed successfully");
        Ok(ExitCode::SUCCESS)
    }
}

fn print_selection_report(report: &ArchiveReport) {
    info!("=== SELECTION REPORT ===");
    info!("Run id: {}", report.run_id);
    info!("Cutoff: {}", format_timestamp(report.cutoff));
    info!("Files discovered: {}", report.discovered);
    info!("Files eligible: {}", report.eligible.len());
    if report.dry_run {
        info!("Dry run: no files were moved, uploaded or deleted");
    }
}

fn print_upload_report(report: &ArchiveReport) {
    let Some(upload) = report.upload.as_ref() else {
        return;
    };

    info!("=== UPLOAD REPORT ===");
    info!("Files staged: {}", report.staged);
    info!("Files in working directory: {}", report.rediscovered);
    info!("Successful uploads: {}", upload.successful_count());
    info!("Failed uploads: {}", upload.failed_count());
    info!("Success rate: {:.2}%", upload.success_rate() * 100.0);

    if !upload.failures.is_empty() {
        error!("Upload failures encountered:");
        for failure in &upload.failures {
            let stage = match failure.stage {
                FailureStage::Read => "read",
                FailureStage::CreateFolder => "create folder",
                FailureStage::Upload => "upload",
            };
            error!("  {:?} ({}): {}", failure.path, stage, failure.reason);
        }
    }

    for path in &upload.overwritten {
        warn!("  {:?} was replaced remotely by a later file with the same name", path);
    }
}

fn print_final_summary(report: &ArchiveReport) {
    info!("=== FINAL SUMMARY ===");
    info!("Files eligible: {}", report.eligible.len());
    info!("Files uploaded: {}", report.successful_uploads());
    info!("Files failed: {}", report.failed_uploads());
    info!("Files deleted: {}", report.deleted);
}

#[cfg(test)]
mod tests {
    use super::*;
    use stale_file_archiver::ArchiveError;

    const REQUIRED: [&str; 13] = [
        "stale-file-archiver",
        "-i",
        "/data/in",
        "-w",
        "/data/work",
        "--host",
        "contoso.sharepoint.com",
        "--site",
        "records",
        "--library",
        "Archive",
        "-u",
        "svc@contoso.com",
    ];

    fn config_from(days: &str, extra: &[&str]) -> Result<AppConfig> {
        let days_arg = format!("--days={}", days);
        let args: Vec<&str> = REQUIRED
            .iter()
            .copied()
            .chain(std::iter::once(days_arg.as_str()))
            .chain(extra.iter().copied())
            .collect();
        let matches = build_cli().try_get_matches_from(args)?;
        create_app_config(&matches)
    }

    #[test]
    fn test_defaults() {
        let config = config_from("30", &[]).unwrap();
        assert!(config.archive.delete);
        assert!(!config.archive.dry_run);
        assert_eq!(config.archive.days, 30.0);
        assert_eq!(config.archive.target.library, "Archive");
        assert_eq!(config.log_level, "info");
    }

    #[test]
    fn test_flag_pairs_last_wins() {
        let config = config_from("30", &["--no-delete", "--dry-run"]).unwrap();
        assert!(!config.archive.delete);
        assert!(config.archive.dry_run);

        let config = config_from("30", &["--no-delete", "--delete", "--dry-run", "--no-dry-run"]).unwrap();
        assert!(config.archive.delete);
        assert!(!config.archive.dry_run);
    }

    #[test]
    fn test_underscore_aliases() {
        let matches = build_cli()
            .try_get_matches_from([
                "stale-file-archiver",
                "--input_dir",
                "/in",
                "--working_dir",
                "/work",
                "--sharepoint_host",
                "h",
                "--sharepoint_site",
                "s",
                "--sharepoint_library",
                "l",
                "--days",
                "1.5",
                "--user",
                "u",
            ])
            .unwrap();
        let config = create_app_config(&matches).unwrap();
        assert_eq!(config.archive.input_dir, PathBuf::from("/in"));
        assert_eq!(config.archive.days, 1.5);
    }

    #[test]
    fn test_invalid_days() {
        for days in ["abc", "-3", "NaN"] {
            let err = config_from(days, &[]).unwrap_err();
            assert!(matches!(
                err.downcast_ref::<ArchiveError>(),
                Some(ArchiveError::InvalidDays(_))
            ));
        }
        assert!(config_from("0", &[]).is_ok());
    }
}
