// Diagnostics for the PipeWrench build tool
// Warnings and errors raised while post-processing compiled Lua, rendered with colors

use colored::Colorize;
use std::collections::HashMap;
use std::fmt;
use std::path::Path;

/// Source location (line, column, file)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Span {
    pub file: String,
    pub line: usize,
    pub column: usize,
    pub length: usize,
}

impl Span {
    pub fn new(file: String, line: usize, column: usize, length: usize) -> Self {
        Self {
            file,
            line,
            column,
            length,
        }
    }

    /// Build a span from a byte range inside `source`.
    pub fn from_file_and_span(file: &str, source: &str, span: std::ops::Range<usize>) -> Self {
        let start = span.start.min(source.len());
        let before = source.get(..start).unwrap_or_default();
        let line = before.chars().filter(|&c| c == '\n').count() + 1;
        let column = before
            .rfind('\n')
            .map_or(before.len() + 1, |pos| before.len() - pos);
        let length = span.end.saturating_sub(span.start).max(1);

        Self {
            file: file.to_string(),
            line,
            column,
            length,
        }
    }

    /// Span covering a whole file
    pub fn from_path(path: &Path) -> Self {
        Self {
            file: path.display().to_string(),
            line: 0,
            column: 0,
            length: 0,
        }
    }
}

impl fmt::Display for Span {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        if self.line == 0 {
            write!(f, "{}", self.file)
        } else {
            write!(f, "{}:{}:{}", self.file, self.line, self.column)
        }
    }
}

/// Severity levels
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorLevel {
    Error,
    Warning,
}

impl ErrorLevel {
    fn label(self) -> &'static str {
        match self {
            ErrorLevel::Error => "error",
            ErrorLevel::Warning => "warning",
        }
    }
}

impl fmt::Display for ErrorLevel {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let label = self.label();
        match self {
            ErrorLevel::Error => write!(f, "{}", label.red().bold()),
            ErrorLevel::Warning => write!(f, "{}", label.yellow().bold()),
        }
    }
}

/// Structured diagnostic message
#[derive(Debug, Clone)]
pub struct Diagnostic {
    pub level: ErrorLevel,
    pub code: String,
    pub message: String,
    pub span: Span,
    pub notes: Vec<String>,
    pub help: Option<String>,
}

impl Diagnostic {
    pub fn new(level: ErrorLevel, code: &str, message: String, span: Span) -> Self {
        Self {
            level,
            code: code.to_string(),
            message,
            span,
            notes: Vec::new(),
            help: None,
        }
    }

    pub fn error(code: &str, message: String, span: Span) -> Self {
        Self::new(ErrorLevel::Error, code, message, span)
    }

    pub fn warning(code: &str, message: String, span: Span) -> Self {
        Self::new(ErrorLevel::Warning, code, message, span)
    }

    pub fn with_note(mut self, note: String) -> Self {
        self.notes.push(note);
        self
    }

    pub fn with_help(mut self, help: String) -> Self {
        self.help = Some(help);
        self
    }

    /// Format diagnostic in Rust-style, quoting the offending line of `source_code`
    pub fn format(&self, source_code: &str) -> String {
        let mut output = self.header();

        if let Some(snippet) = self.get_source_snippet(source_code) {
            output.push_str(&snippet);
        }

        output.push_str(&self.trailer());
        output
    }

    // error[W0101]: message
    //  --> file.lua:12:15
    fn header(&self) -> String {
        format!(
            "{}[{}]: {}\n {} {}\n",
            self.level,
            self.code,
            self.message.bold(),
            "-->".cyan().bold(),
            self.span
        )
    }

    fn trailer(&self) -> String {
        let mut output = String::new();

        for note in &self.notes {
            output.push_str(&format!(" {} {}\n", "=".cyan().bold(), note.cyan()));
        }

        if let Some(help) = &self.help {
            output.push_str(&format!(" {} {}\n", "help:".green().bold(), help));
        }

        output
    }

    /// Extract source snippet with the span underlined
    fn get_source_snippet(&self, source_code: &str) -> Option<String> {
        if self.span.line == 0 {
            return None;
        }

        let line = source_code.lines().nth(self.span.line - 1)?;
        let line_num_width = self.span.line.to_string().len().max(2);
        let gutter = " ".repeat(line_num_width + 1);

        let mut snippet = String::new();
        snippet.push_str(&format!(" {}\n", gutter.cyan()));
        snippet.push_str(&format!(
            " {} {} {}\n",
            format!("{:>width$}", self.span.line, width = line_num_width)
                .cyan()
                .bold(),
            "|".cyan().bold(),
            line
        ));

        let padding = " ".repeat(self.span.column.saturating_sub(1) + 2);
        let underline = "^".repeat(self.span.length.max(1));
        let underline = match self.level {
            ErrorLevel::Error => underline.red().bold(),
            ErrorLevel::Warning => underline.yellow().bold(),
        };
        snippet.push_str(&format!(" {}{}{}\n", gutter.cyan(), padding, underline));

        Some(snippet)
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}{}", self.header(), self.trailer())
    }
}

/// Diagnostic collection and reporting engine
///
/// Sources registered with `add_source` let `print_all` quote the offending line.
#[derive(Debug, Default)]
pub struct DiagnosticEngine {
    diagnostics: Vec<Diagnostic>,
    sources: HashMap<String, String>,
    error_count: usize,
    warning_count: usize,
}

impl DiagnosticEngine {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn emit(&mut self, diagnostic: Diagnostic) {
        match diagnostic.level {
            ErrorLevel::Error => self.error_count += 1,
            ErrorLevel::Warning => self.warning_count += 1,
        }
        self.diagnostics.push(diagnostic);
    }

    pub fn extend<I: IntoIterator<Item = Diagnostic>>(&mut self, diagnostics: I) {
        for diagnostic in diagnostics {
            self.emit(diagnostic);
        }
    }

    /// Text the spans of `file` point into
    pub fn add_source(&mut self, file: impl Into<String>, text: impl Into<String>) {
        self.sources.insert(file.into(), text.into());
    }

    pub fn error_count(&self) -> usize {
        self.error_count
    }

    pub fn warning_count(&self) -> usize {
        self.warning_count
    }

    pub fn diagnostics(&self) -> &[Diagnostic] {
        &self.diagnostics
    }

    /// Render one diagnostic, with a snippet when its source is known
    pub fn render(&self, diagnostic: &Diagnostic) -> String {
        match self.sources.get(&diagnostic.span.file) {
            Some(source) => diagnostic.format(source),
            None => diagnostic.to_string(),
        }
    }

    /// Print all diagnostics to stderr
    pub fn print_all(&self) {
        for diag in &self.diagnostics {
            eprintln!("{}", self.render(diag));
        }
    }

    /// Print summary statistics
    pub fn print_summary(&self) {
        if self.error_count > 0 {
            eprintln!(
                "{}: {} error{} emitted",
                "error".red().bold(),
                self.error_count,
                if self.error_count == 1 { "" } else { "s" }
            );
        }

        if self.warning_count > 0 {
            eprintln!(
                "{}: {} warning{} emitted",
                "warning".yellow().bold(),
                self.warning_count,
                if self.warning_count == 1 { "" } else { "s" }
            );
        }
    }
}

/// Diagnostic codes
pub mod error_codes {
    // Reference rewriting (W0100-W0199)
    pub const CROSS_SCOPE_REFERENCE: &str = "W0101";

    // Output layout (W0200-W0299, E0200-E0299)
    pub const UNLOADABLE_OUTPUT: &str = "W0201";
    pub const OUTPUT_COLLISION: &str = "E0202";

    // Manifest and config (W0300-W0399)
    pub const UNKNOWN_MANIFEST_KEY: &str = "W0301";
    pub const MISSING_RUNTIME_LIBRARY: &str = "W0302";
}

/// Fuzzy matching utilities for "did you mean?" suggestions
pub mod fuzzy {
    use strsim::jaro_winkler;

    /// Names similar to `target` (Jaro-Winkler score above `threshold`), best first
    pub fn find_similar_names(
        target: &str,
        candidates: &[&str],
        threshold: f64,
        max_suggestions: usize,
    ) -> Vec<String> {
        let mut scored: Vec<(&str, f64)> = candidates
            .iter()
            .map(|candidate| (*candidate, jaro_winkler(target, candidate)))
            .filter(|(_, score)| *score > threshold)
            .collect();

        scored.sort_by(|a, b| b.1.total_cmp(&a.1));

        scored
            .into_iter()
            .take(max_suggestions)
            .map(|(name, _)| name.to_string())
            .collect()
    }
}
