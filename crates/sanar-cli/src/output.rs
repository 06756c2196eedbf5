//! Output formatting

use console::{style, Term};

/// Applies (or skips) terminal styling
#[derive(Debug, Clone, Copy)]
pub struct Painter {
    color: bool,
}

impl Painter {
    /// Create a painter
    #[must_use]
    pub const fn new(color: bool) -> Self {
        Self { color }
    }

    /// Logical names and headings
    #[must_use]
    pub fn name(&self, text: &str) -> String {
        if self.color {
            style(text).cyan().bold().to_string()
        } else {
            text.to_string()
        }
    }

    /// Descriptors
    #[must_use]
    pub fn locator(&self, text: &str) -> String {
        if self.color {
            style(text).yellow().to_string()
        } else {
            text.to_string()
        }
    }

    /// Success counts
    #[must_use]
    pub fn good(&self, text: &str) -> String {
        if self.color {
            style(text).green().to_string()
        } else {
            text.to_string()
        }
    }

    /// Failure counts
    #[must_use]
    pub fn bad(&self, text: &str) -> String {
        if self.color {
            style(text).red().to_string()
        } else {
            text.to_string()
        }
    }

    /// Secondary detail
    #[must_use]
    pub fn dim(&self, text: &str) -> String {
        if self.color {
            style(text).dim().to_string()
        } else {
            text.to_string()
        }
    }
}

/// Writes command output to stdout and status messages to stderr
#[derive(Debug)]
pub struct Reporter {
    out: Term,
    err: Term,
    painter: Painter,
    /// Quiet mode
    pub quiet: bool,
}

impl Reporter {
    /// Create a reporter
    #[must_use]
    pub fn new(use_color: bool, quiet: bool) -> Self {
        Self {
            out: Term::stdout(),
            err: Term::stderr(),
            painter: Painter::new(use_color),
            quiet,
        }
    }

    /// Styling for this reporter
    #[must_use]
    pub const fn painter(&self) -> Painter {
        self.painter
    }

    /// Print command output; never suppressed
    pub fn print(&self, text: &str) {
        let _ = self.out.write_str(text);
        if !text.ends_with('\n') {
            let _ = self.out.write_line("");
        }
    }

    /// Print a success message
    pub fn success(&self, message: &str) {
        if self.quiet {
            return;
        }
        let prefix = if self.painter.color {
            style("✓").green().bold().to_string()
        } else {
            "OK".to_string()
        };
        let _ = self.err.write_line(&format!("{prefix} {message}"));
    }

    /// Print a warning message
    pub fn warning(&self, message: &str) {
        if self.quiet {
            return;
        }
        let prefix = if self.painter.color {
            style("⚠").yellow().bold().to_string()
        } else {
            "WARN".to_string()
        };
        let _ = self.err.write_line(&format!("{prefix} {message}"));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_plain_painter_passes_through() {
        let painter = Painter::new(false);
        assert_eq!(painter.name("login"), "login");
        assert_eq!(painter.bad("3"), "3");
    }

    #[test]
    fn test_color_painter_styles() {
        console::set_colors_enabled(true);
        let painter = Painter::new(true);
        assert_ne!(painter.good("ok"), "ok");
        assert!(painter.good("ok").contains("ok"));
    }

    #[test]
    fn test_quiet_reporter() {
        let reporter = Reporter::new(false, true);
        assert!(reporter.quiet);
        reporter.success("suppressed");
        reporter.warning("suppressed");
    }
}
