//! Source text around the current line.

use std::fmt;
use std::path::{Path, PathBuf};

use tracing::debug;

/// Lines surrounding a frame's current line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceWindow {
    /// Path the text was read from.
    pub path: PathBuf,
    /// Current line (1-based).
    pub current: u32,
    /// Numbered lines, ascending.
    pub lines: Vec<(u32, String)>,
}

impl SourceWindow {
    /// Cut a window of `context` lines either side of `current` out of
    /// `text`. Returns `None` when `current` is not a line of `text`.
    pub fn from_text(path: PathBuf, text: &str, current: u32, context: usize) -> Option<Self> {
        let total = text.lines().count();
        let idx = (current as usize).checked_sub(1)?;
        if idx >= total {
            return None;
        }
        let start = idx.saturating_sub(context);
        let lines = text
            .lines()
            .enumerate()
            .skip(start)
            .take(idx - start + context + 1)
            .map(|(i, l)| (i as u32 + 1, l.to_string()))
            .collect();
        Some(Self {
            path,
            current,
            lines,
        })
    }

    /// Text of the current line.
    pub fn current_line(&self) -> Option<&str> {
        self.lines
            .iter()
            .find(|(n, _)| *n == self.current)
            .map(|(_, l)| l.as_str())
    }
}

impl fmt::Display for SourceWindow {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let width = self
            .lines
            .last()
            .map_or(1, |(n, _)| n.to_string().len());
        for (n, text) in &self.lines {
            let marker = if *n == self.current { "=>" } else { "  " };
            writeln!(f, "{marker} {n:>width$} {text}")?;
        }
        Ok(())
    }
}

/// Candidate paths for `file`: itself when absolute, otherwise each source
/// root in order followed by the working directory.
pub fn candidate_paths(file: &str, roots: &[PathBuf]) -> Vec<PathBuf> {
    let path = Path::new(file);
    if path.is_absolute() {
        return vec![path.to_path_buf()];
    }
    roots
        .iter()
        .map(|root| root.join(path))
        .chain(std::iter::once(path.to_path_buf()))
        .collect()
}

/// Read the window around `file:line` from the first readable candidate.
pub async fn read_window(
    file: &str,
    line: u32,
    roots: &[PathBuf],
    context: usize,
) -> Option<SourceWindow> {
    for path in candidate_paths(file, roots) {
        match tokio::fs::read_to_string(&path).await {
            Ok(text) => return SourceWindow::from_text(path, &text, line, context),
            Err(e) => debug!(path = %path.display(), "source not readable: {e}"),
        }
    }
    None
}
