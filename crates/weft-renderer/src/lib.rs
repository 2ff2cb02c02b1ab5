//! Page rendering collaborators for weft.
//!
//! The site engine depends on two traits:
//! - [`MarkdownCompiler`]: Markdown text to HTML plus front matter metadata
//!   ([`CommonMarkCompiler`], pulldown-cmark)
//! - [`TemplateEngine`]: template source plus [`Frame`] to text
//!   ([`MiniJinjaEngine`], minijinja)
//!
//! # Example
//!
//! ```
//! use weft_renderer::{CommonMarkCompiler, MarkdownCompiler};
//!
//! let compiled = CommonMarkCompiler::new().compile("# Hello\n\nWorld").unwrap();
//! assert_eq!(compiled.metadata["title"], "Hello");
//! ```

mod frame;
mod markdown;
mod template;

pub use frame::Frame;
pub use markdown::{CommonMarkCompiler, CompileError, Compiled, MarkdownCompiler};
pub use template::{MiniJinjaEngine, Rendered, TemplateCallbacks, TemplateEngine, TemplateError};
