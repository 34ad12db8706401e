//! Report Renderers
//!
//! Pure functions of an [`AggregateReport`](crate::report::AggregateReport):
//! text summary, linked HTML pages, and an LCOV tracefile for CI tools.

mod html;
mod lcov;
mod text;

pub use html::{escape_html, page_name, HtmlFormatter, HtmlPage, HtmlReportConfig, Theme};
pub use lcov::LcovFormatter;
pub use text::{TextFormatter, TextOptions};
