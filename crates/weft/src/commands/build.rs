//! `weft build` command implementation.

use clap::Args;
use weft_site::Site;

use super::{SiteArgs, print_paths, site_config};
use crate::error::CliError;
use crate::output::Output;

/// Arguments for the build command.
#[derive(Args)]
pub(crate) struct BuildArgs {
    #[command(flatten)]
    pub site: SiteArgs,
}

impl BuildArgs {
    /// Execute the build command.
    ///
    /// # Errors
    ///
    /// Returns an error if configuration fails or the build fails.
    pub(crate) fn execute(self) -> Result<(), CliError> {
        let output = Output::new();
        let config = self.site.load()?;
        print_paths(&output, &config);

        let mut site = Site::new(site_config(&config));
        let report = site.build()?;
        output.report(&report);
        Ok(())
    }
}
