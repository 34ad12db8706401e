//! Command handlers - one module per subcommand
//!
//! Each handler takes the layered [`CliConfig`](crate::CliConfig) plus its
//! parsed arguments and returns a `CliResult` whose error maps to an exit code.

pub mod all;
pub mod combine;
pub mod erase;
pub mod html;
pub mod lcov;
pub mod report;
pub mod run;

pub use all::execute_all;
pub use combine::execute_combine;
pub use erase::execute_erase;
pub use html::{execute_html, html_config, open_in_browser, write_html};
pub use lcov::{execute_lcov, write_lcov};
pub use report::{check_threshold, execute_report, load_report, render_summary, text_options};
pub use run::{execute_run, measure, RunOutcome};
