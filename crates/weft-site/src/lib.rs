//! Content resolution and publication for weft.
//!
//! This crate provides:
//! - [`NameRegistry`]: unique link names with collision diagnostics
//! - [`LinkResolver`]: relative paths between content nodes
//! - [`Processor`]: the environment cascade and page rendering
//! - [`trace`]: reachability from published entry points
//! - [`Writer`]: emission of published nodes
//! - [`Site`]: full and incremental builds tying it all together
//!
//! # Quick Start
//!
//! ```no_run
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! use std::path::PathBuf;
//! use weft_site::{Site, SiteConfig};
//!
//! let mut site = Site::new(SiteConfig {
//!     source_dir: PathBuf::from("content"),
//!     output_dir: PathBuf::from("site"),
//!     clear_output: true,
//!     ..SiteConfig::default()
//! });
//! site.build()?;
//! site.rebuild_file("docs/guide.md")?;
//! # Ok(())
//! # }
//! ```

pub mod dir_config;
mod error;
pub mod frame;
pub mod planner;
mod processor;
mod registry;
mod resolver;
mod site;
pub mod sort;
mod state;
mod tracer;
mod writer;

pub use error::{BuildError, Collision, ConfigurationError, LinkError};
pub use frame::Frame;
pub use planner::RebuildPlan;
pub use processor::{ProcessOptions, Processor, Services};
pub use registry::NameRegistry;
pub use resolver::{LinkEdge, LinkResolver, relative_path};
pub use site::{BuildReport, RebuildOutcome, Site, SiteConfig};
pub use state::{BuildState, ChildOrder, NodeState, PageDates};
pub use tracer::trace;
pub use writer::{OutputOptions, Writer, output_rel_path, plan_outputs};
