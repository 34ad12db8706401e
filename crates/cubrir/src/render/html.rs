//! Hierarchical HTML report
//!
//! `index.html` lists every unit with the same figures as the text report and
//! links to one page per unit showing its source with each line marked
//! `run`, `mis`, `exc` or `pln`. Rendering is pure ([`HtmlFormatter::render`]);
//! only [`HtmlFormatter::write_to_dir`] touches the filesystem.

use crate::report::{AggregateReport, LineState, UnitCoverage, UnitStatus};
use crate::result::{CubrirError, CubrirResult};
use sha2::{Digest, Sha256};
use std::fmt::Write;
use std::path::{Path, PathBuf};

/// Color theme of the generated pages
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Theme {
    /// Light background
    #[default]
    Light,
    /// Dark background
    Dark,
}

impl Theme {
    fn palette(self) -> &'static str {
        match self {
            Self::Light => {
                "--bg: #ffffff; --fg: #1f2328; --muted: #656d76; --border: #d0d7de; \
                 --run: #dafbe1; --mis: #ffebe9; --exc: #f6f8fa; --bar: #2da44e; --bar-bg: #ffcecb;"
            }
            Self::Dark => {
                "--bg: #0d1117; --fg: #e6edf3; --muted: #8d96a0; --border: #30363d; \
                 --run: #12261e; --mis: #3c1618; --exc: #161b22; --bar: #3fb950; --bar-bg: #6e2a2d;"
            }
        }
    }
}

/// HTML report settings
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HtmlReportConfig {
    /// Page title
    pub title: String,
    /// Color theme
    pub theme: Theme,
    /// Decimal places in percentages
    pub precision: usize,
}

impl Default for HtmlReportConfig {
    fn default() -> Self {
        Self {
            title: "Coverage report".to_string(),
            theme: Theme::Light,
            precision: 2,
        }
    }
}

/// One generated file
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HtmlPage {
    /// File name relative to the report directory
    pub name: String,
    /// File content
    pub content: String,
}

/// Renders an [`AggregateReport`] as a set of linked HTML pages
#[derive(Debug)]
pub struct HtmlFormatter<'a> {
    report: &'a AggregateReport,
    config: HtmlReportConfig,
}

/// Stable page file name for a unit: slug plus 8 hex digits of SHA-256
#[must_use]
pub fn page_name(unit_id: &str) -> String {
    let slug: String = unit_id
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() { c } else { '_' })
        .collect();
    let digest = Sha256::digest(unit_id.as_bytes());
    let short: String = digest.iter().take(4).map(|b| format!("{b:02x}")).collect();
    format!("{slug}_{short}.html")
}

/// Escape text for HTML element and attribute content
#[must_use]
pub fn escape_html(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#x27;"),
            _ => out.push(c),
        }
    }
    out
}

const STYLE_BODY: &str = r#"
body { background: var(--bg); color: var(--fg); font-family: -apple-system, BlinkMacSystemFont, 'Segoe UI', Roboto, sans-serif; margin: 20px; }
a { color: inherit; }
header { border-bottom: 1px solid var(--border); margin-bottom: 16px; }
header p { color: var(--muted); }
table.index { border-collapse: collapse; width: 100%; }
table.index th, table.index td { border-bottom: 1px solid var(--border); padding: 4px 8px; text-align: right; }
table.index th.name, table.index td.name { text-align: left; }
table.index tr.total td { font-weight: bold; }
.bar { background: var(--bar-bg); display: inline-block; height: 8px; width: 80px; vertical-align: middle; }
.bar span { background: var(--bar); display: block; height: 100%; }
.flag { color: #cf222e; font-weight: bold; }
.source { font-family: ui-monospace, SFMono-Regular, Menlo, monospace; font-size: 13px; }
.source p { margin: 0; white-space: pre; }
.source .n { color: var(--muted); display: inline-block; padding-right: 12px; text-align: right; width: 4em; }
.source .n a { text-decoration: none; }
.source p.run { background: var(--run); }
.source p.mis { background: var(--mis); }
.source p.exc { background: var(--exc); color: var(--muted); }
.legend span { margin-right: 12px; padding: 0 6px; }
.legend .run { background: var(--run); }
.legend .mis { background: var(--mis); }
.legend .exc { background: var(--exc); }
ul.recovered { color: var(--muted); }
"#;

impl<'a> HtmlFormatter<'a> {
    /// Create a formatter with default settings
    #[must_use]
    pub fn new(report: &'a AggregateReport) -> Self {
        Self {
            report,
            config: HtmlReportConfig::default(),
        }
    }

    /// Set the report settings
    #[must_use]
    pub fn with_config(mut self, config: HtmlReportConfig) -> Self {
        self.config = config;
        self
    }

    /// Shared stylesheet for every page
    #[must_use]
    pub fn stylesheet(&self) -> String {
        format!(":root {{ {} }}\n{}", self.config.theme.palette(), STYLE_BODY.trim_start())
    }

    /// Render every page: `index.html`, one page per unit, `style.css`
    #[must_use]
    pub fn render(&self) -> Vec<HtmlPage> {
        let mut pages = Vec::with_capacity(self.report.units().len() + 2);
        pages.push(HtmlPage {
            name: "index.html".to_string(),
            content: self.render_index(),
        });
        for unit in self.report.units() {
            pages.push(HtmlPage {
                name: page_name(unit.id.as_str()),
                content: self.render_unit(unit),
            });
        }
        pages.push(HtmlPage {
            name: "style.css".to_string(),
            content: self.stylesheet(),
        });
        pages
    }

    /// Write all pages under `dir` and return the index path
    pub fn write_to_dir(&self, dir: &Path) -> CubrirResult<PathBuf> {
        std::fs::create_dir_all(dir).map_err(|e| {
            CubrirError::report_render("html directory", format!("{}: {e}", dir.display()))
        })?;
        for page in self.render() {
            let path = dir.join(&page.name);
            std::fs::write(&path, page.content).map_err(|e| {
                CubrirError::report_render(format!("html page {}", page.name), e.to_string())
            })?;
        }
        tracing::info!(dir = %dir.display(), units = self.report.units().len(), "html report written");
        Ok(dir.join("index.html"))
    }

    fn page_head(title: &str) -> String {
        format!(
            r#"<!DOCTYPE html>
<html lang="en">
<head>
    <meta charset="UTF-8">
    <meta name="viewport" content="width=device-width, initial-scale=1">
    <title>{}</title>
    <link rel="stylesheet" href="style.css">
</head>
<body>
"#,
            escape_html(title)
        )
    }

    fn bar(percent: f64) -> String {
        format!(
            r#"<span class="bar"><span style="width: {:.0}%"></span></span>"#,
            percent.clamp(0.0, 100.0)
        )
    }

    fn render_index(&self) -> String {
        let precision = self.config.precision;
        let mut html = Self::page_head(&self.config.title);
        let totals = self.report.totals();

        let _ = write!(
            html,
            r#"<header>
    <h1>{}</h1>
    <p>Coverage: <strong>{}%</strong> ({} of {} statements)</p>
</header>
<table class="index">
    <thead>
        <tr><th class="name">Unit</th><th>Statements</th><th>Missing</th><th>Excluded</th><th>Coverage</th><th></th></tr>
    </thead>
    <tbody>
"#,
            escape_html(&self.config.title),
            totals.ratio().format(precision),
            totals.statements - totals.missed,
            totals.statements
        );

        for unit in self.report.units() {
            let flag = match unit.status {
                UnitStatus::Measured => "",
                UnitStatus::Unreadable { .. } => r#" <span class="flag" title="unreadable">!</span>"#,
                UnitStatus::NotMeasured { .. } => r#" <span class="flag" title="not measured">!</span>"#,
            };
            let percent = if !unit.is_measured() {
                0.0
            } else {
                unit.ratio().as_percent()
            };
            let _ = writeln!(
                html,
                r#"        <tr><td class="name"><a href="{}">{}</a>{}</td><td>{}</td><td>{}</td><td>{}</td><td>{}%</td><td>{}</td></tr>"#,
                page_name(unit.id.as_str()),
                escape_html(unit.id.as_str()),
                flag,
                unit.statements(),
                unit.missed(),
                unit.excluded.len(),
                unit.percent_text(precision),
                Self::bar(percent)
            );
        }

        let _ = write!(
            html,
            r#"    </tbody>
    <tfoot>
        <tr class="total"><td class="name">TOTAL</td><td>{}</td><td>{}</td><td></td><td>{}%</td><td>{}</td></tr>
    </tfoot>
</table>
"#,
            totals.statements,
            totals.missed,
            totals.ratio().format(precision),
            Self::bar(totals.ratio().as_percent())
        );

        if self.report.has_recovered() {
            html.push_str("<h2>Recovered measurement errors</h2>\n<ul class=\"recovered\">\n");
            for error in self.report.recovered() {
                let _ = writeln!(html, "    <li>{}</li>", escape_html(&error.to_string()));
            }
            html.push_str("</ul>\n");
        }

        html.push_str("</body>\n</html>\n");
        html
    }

    fn render_unit(&self, unit: &UnitCoverage) -> String {
        let precision = self.config.precision;
        let title = format!("{}: {}", self.config.title, unit.id);
        let mut html = Self::page_head(&title);

        let _ = write!(
            html,
            r#"<header>
    <h1>{}</h1>
    <p><a href="index.html">&larr; index</a> &middot; {}% &middot; {} statements, {} run, {} missing, {} excluded</p>
    <p class="legend"><span class="run">run</span><span class="mis">missing</span><span class="exc">excluded</span></p>
</header>
"#,
            escape_html(unit.id.as_str()),
            unit.percent_text(precision),
            unit.statements(),
            unit.hit.len(),
            unit.missed(),
            unit.excluded.len()
        );
        if let UnitStatus::NotMeasured { reason } = &unit.status {
            let _ = writeln!(
                html,
                r#"<p class="flag">This unit was not measured: {}</p>"#,
                escape_html(reason)
            );
        }

        match (&unit.source, &unit.status) {
            (Some(source), _) => {
                html.push_str("<div class=\"source\">\n");
                for (idx, text) in source.lines().enumerate() {
                    let line = idx as u32 + 1;
                    let class = match unit.line_state(line) {
                        LineState::Run => "run",
                        LineState::Missing => "mis",
                        LineState::Excluded => "exc",
                        LineState::Plain => "pln",
                    };
                    let _ = writeln!(
                        html,
                        r##"<p class="{class}" id="l{line}"><span class="n"><a href="#l{line}">{line}</a></span>{}</p>"##,
                        escape_html(text)
                    );
                }
                html.push_str("</div>\n");
            }
            (None, UnitStatus::Unreadable { reason }) => {
                let _ = writeln!(
                    html,
                    r#"<p class="flag">This unit could not be read and was not measured: {}</p>"#,
                    escape_html(reason)
                );
            }
            (None, _) => html.push_str("<p>Source unavailable.</p>\n"),
        }

        html.push_str("</body>\n</html>\n");
        html
    }
}
