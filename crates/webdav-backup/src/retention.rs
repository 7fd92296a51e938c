//! Retention pruning for local and remote backup sets.
//!

use core::time::Duration;
use std::{collections::BTreeSet, fs, path::Path};

use regex::Regex;
use tracing::{info, warn};

use crate::webdav::Client;

/// Bounds how many historical backups are kept, oldest discarded first.
///
/// Stateless, recomputed on each run.
#[derive(Debug, Clone)]
pub struct RetentionPolicy {
    /// The backup filename prefix.
    pub prefix: String,

    /// The maximum number of backups to keep.
    pub max_count: usize,
}

impl RetentionPolicy {
    fn pattern(&self) -> String {
        format!(
            r"{}_\d{{8}}_\d{{6}}\.(?:tar\.gz|zip)",
            regex::escape(&self.prefix)
        )
    }

    /// Matcher for a whole filename.
    pub fn matcher(&self) -> Regex {
        Regex::new(&format!("^{}$", self.pattern())).expect("retention pattern is valid")
    }

    /// Extract backup filenames out of a raw directory listing body,
    /// deduplicated and sorted.
    pub fn extract_from_listing(&self, body: &str) -> Vec<String> {
        let regex = Regex::new(&self.pattern()).expect("retention pattern is valid");

        let names: BTreeSet<String> = regex
            .find_iter(body)
            .map(|found| found.as_str().to_string())
            .collect();

        names.into_iter().collect()
    }

    /// The entries that fall outside the newest `max_count`, oldest first.
    ///
    /// `current` is the filename produced by this run and is never a
    /// deletion candidate, nor does it count toward the cap. Lexicographic
    /// order is chronological for the fixed-width timestamp format.
    pub fn stale_entries(
        &self,
        names: impl IntoIterator<Item = String>,
        current: &str,
    ) -> Vec<String> {
        let names: BTreeSet<String> = names.into_iter().filter(|name| name != current).collect();

        let excess = names.len().saturating_sub(self.max_count);
        names.into_iter().take(excess).collect()
    }
}

/// Delete local backups beyond the policy's cap. Every failure is logged
/// and skipped, pruning never fails the run.
pub fn prune_local(directory: &Path, policy: &RetentionPolicy, current: &str) {
    info!("Pruning old local backups...");

    let entries = match fs::read_dir(directory) {
        Ok(entries) => entries,
        Err(error) => {
            warn!("Could not read local backup directory {directory:?}: {error}");
            return;
        }
    };

    let matcher = policy.matcher();
    let names: Vec<String> = entries
        .filter_map(|entry| {
            let entry = match entry {
                Ok(entry) => entry,
                Err(error) => {
                    warn!("Could not read entry: {error}");
                    return None;
                }
            };

            let name = entry.file_name().into_string().ok()?;
            matcher.is_match(&name).then_some(name)
        })
        .collect();

    for name in policy.stale_entries(names, current) {
        let path = directory.join(&name);
        info!("Removing old local backup: {name}");

        if let Err(error) = fs::remove_file(&path) {
            warn!("Could not remove {path:?}: {error}");
        }
    }
}

/// Delete remote backups beyond the policy's cap. The collection listing is
/// scraped with the retention pattern, no structured listing format is
/// assumed. Best effort throughout, a listing failure only warns.
pub fn prune_remote(
    client: &Client,
    collection: &str,
    policy: &RetentionPolicy,
    current: &str,
    timeout: Duration,
) {
    info!("Pruning old remote backups...");

    let collection_url = client.collection_url(collection);
    let body = match client.list_collection(&collection_url, timeout) {
        Ok(body) => body,
        Err(error) => {
            warn!("Could not list remote collection: {error}");
            return;
        }
    };

    for name in policy.stale_entries(policy.extract_from_listing(&body), current) {
        info!("Removing old remote backup: {name}");
        client.delete(&format!("{collection_url}{name}"));
    }
}
