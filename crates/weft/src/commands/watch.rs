//! `weft watch` command implementation.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::RecvTimeoutError;
use std::time::Duration;

use clap::Args;
use weft_site::Site;
use weft_storage::ContentWatcher;

use super::{SiteArgs, print_paths, site_config};
use crate::error::CliError;
use crate::output::Output;

/// How often the loop checks for Ctrl-C while idle.
const POLL_INTERVAL: Duration = Duration::from_millis(200);

/// Arguments for the watch command.
#[derive(Args)]
pub(crate) struct WatchArgs {
    #[command(flatten)]
    pub site: SiteArgs,
}

impl WatchArgs {
    /// Execute the watch command.
    ///
    /// A failing build is reported and watching continues; the next change
    /// triggers a full build.
    ///
    /// # Errors
    ///
    /// Returns an error if configuration fails or the watcher cannot start.
    pub(crate) fn execute(self) -> Result<(), CliError> {
        let output = Output::new();
        let config = self.site.load()?;
        print_paths(&output, &config);

        let mut site = Site::new(site_config(&config));
        match site.build() {
            Ok(report) => output.report(&report),
            Err(e) => output.error(&format!("Build failed: {e}")),
        }

        let root = site.content_root()?;
        let ignore = site.ignore_rule(&root);
        let (changes, handle) = ContentWatcher::new(&root, config.watch.debounce(), ignore).start()?;

        let running = Arc::new(AtomicBool::new(true));
        let flag = Arc::clone(&running);
        ctrlc::set_handler(move || flag.store(false, Ordering::SeqCst))
            .map_err(|e| CliError::Watch(format!("Failed to set Ctrl-C handler: {e}")))?;

        output.watching(&root);
        while running.load(Ordering::SeqCst) {
            let batch = match changes.recv_timeout(POLL_INTERVAL) {
                Ok(batch) => batch,
                Err(RecvTimeoutError::Timeout) => continue,
                Err(RecvTimeoutError::Disconnected) => break,
            };
            tracing::debug!(changes = batch.len(), "Change batch");
            match site.rebuild(&batch) {
                Ok(outcome) => output.rebuilt(&outcome),
                Err(e) => output.error(&format!("Build failed: {e}")),
            }
        }

        handle.stop();
        output.info("Stopped watching");
        Ok(())
    }
}
