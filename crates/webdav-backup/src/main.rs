//! # webdav-backup
//! One backup run per invocation, meant to be driven by an external
//! scheduler such as cron.
//!

use std::{fs, path::PathBuf, process::ExitCode};

use mimalloc::MiMalloc;
use tracing::{error, info};
use webdav_backup::{Config, NotificationKind, Notifier, OrFail, init_logger, run};

#[global_allocator]
static GLOBAL: MiMalloc = MiMalloc;

fn main() -> ExitCode {
    let _logger = init_logger().unwrap();

    // Initialize config if args include 'init'.
    if std::env::args().any(|arg| arg.eq("init")) {
        let config = Config::default();
        let contents = toml::to_string_pretty(&config).or_fail("Could not serialize config file");
        fs::write("config.toml", contents).or_fail("Could not create config file");
        return ExitCode::SUCCESS;
    }

    // Load config
    let config = match Config::load_toml(PathBuf::from("./config.toml")) {
        Ok(config) => config,
        Err(error) => {
            error!("Could not load config: {error}");
            return ExitCode::FAILURE;
        }
    };

    let notifier = Notifier::new(config.notification.clone());

    match run(&config) {
        Ok(summary) => {
            let body = format!(
                "Backup task complete!\nLocal backup file: {}\nWebDAV backup file: {}",
                summary.artifact.path.display(),
                summary.remote_url
            );
            info!("{body}");
            notifier.send(
                NotificationKind::Success,
                "WebDAV backup completed successfully",
                &body,
            );
            ExitCode::SUCCESS
        }
        Err(run_error) => {
            error!("Backup task failed: {run_error}");
            notifier.send(NotificationKind::Failure, run_error.subject(), &run_error.to_string());
            ExitCode::FAILURE
        }
    }
}
