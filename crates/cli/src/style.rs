//! Terminal styling for command output.

use aliassync_core::{Diagnostic, Diagnostics, Severity};
use console::Style;

/// A success line (green check mark).
pub fn success(msg: &str) -> String {
    let style = Style::new().green();
    format!("{} {}", style.apply_to("✓"), msg)
}

/// An error line (red cross).
pub fn error(msg: &str) -> String {
    let style = Style::new().red();
    format!("{} {}", style.apply_to("✗"), msg)
}

/// A warning line (yellow).
pub fn warn(msg: &str) -> String {
    let style = Style::new().yellow();
    format!("{} {}", style.apply_to("⚠"), msg)
}

/// Dimmed text, used for remediation detail.
pub fn dim(msg: &str) -> String {
    let style = Style::new().dim();
    style.apply_to(msg).to_string()
}

/// Render one diagnostic, with its detail indented below the summary.
pub fn diagnostic(diag: &Diagnostic) -> String {
    let mut out = match diag.severity {
        Severity::Error => error(&diag.summary),
        Severity::Warning => warn(&diag.summary),
    };
    if let Some(ref detail) = diag.detail {
        out.push('\n');
        out.push_str(&dim(&format!("  {}", detail)));
    }
    out
}

/// Print every diagnostic to stderr.
pub fn print_diagnostics(diags: &Diagnostics) {
    for diag in diags {
        eprintln!("{}", diagnostic(diag));
    }
}
