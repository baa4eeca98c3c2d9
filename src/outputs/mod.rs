//! Output generation: Markdown digests and JSON run reports.
//!
//! # Submodules
//!
//! - [`json`]: writes a run's `WorkflowResult` to a dated JSON report
//! - [`markdown`]: renders category digests and article bodies, and the
//!   `MarkdownExporter` that writes digests to disk
//!
//! # Output Structure
//!
//! ```text
//! report_dir/
//! └── 2025-05-06/
//!     └── run-081500.json
//!
//! export_dir/
//! └── 2025-05-06/
//!     ├── technology.md
//!     └── world.md
//! ```

pub mod json;
pub mod markdown;

pub use json::write_report;
pub use markdown::MarkdownExporter;
