//! Log discovery and bounded tails

use crate::gateway::{glob_match, GatewayResult, PathGuard};
use std::fmt;
use std::fs::File;
use std::io::{Read, Seek, SeekFrom};
use std::path::{Path, PathBuf};
use tracing::debug;
use walkdir::WalkDir;

/// Directory, relative to the root, that log discovery walks
pub const LOGS_DIR: &str = "logs";

/// Default number of trailing lines
pub const DEFAULT_TAIL_LINES: usize = 200;

/// Upper bound on trailing lines regardless of the request
pub const MAX_TAIL_LINES: usize = 2000;

/// Clamp a requested line count into `[1, MAX_TAIL_LINES]`
pub fn clamp_tail_lines(requested: usize) -> usize {
    requested.clamp(1, MAX_TAIL_LINES)
}

/// Trailing view of one log file
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogTail {
    /// Root-relative path
    pub path: String,
    /// Tail text, lines joined with `\n`
    pub content: String,
}

impl fmt::Display for LogTail {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "--- {} ---\n{}", self.path, self.content)
    }
}

/// Read the trailing `tail_lines` lines that fall within the last `max_bytes` bytes
///
/// Only the byte window is read from disk. A line longer than the window is
/// cut at the window's start. When `contains` is given, lines without that
/// substring are dropped after tailing, so matches before the window are
/// never seen.
pub fn tail(
    path: &Path,
    tail_lines: usize,
    max_bytes: u64,
    contains: Option<&str>,
) -> GatewayResult<String> {
    let mut file = File::open(path)?;
    let len = file.metadata()?.len();
    let start = len.saturating_sub(max_bytes);
    file.seek(SeekFrom::Start(start))?;

    let mut window = Vec::with_capacity((len - start) as usize);
    file.take(max_bytes).read_to_end(&mut window)?;

    let text = String::from_utf8_lossy(&window);
    let lines: Vec<&str> = text.lines().collect();
    let keep = clamp_tail_lines(tail_lines);
    let tail = &lines[lines.len().saturating_sub(keep)..];

    let selected: Vec<&str> = match contains {
        Some(needle) => tail.iter().copied().filter(|l| l.contains(needle)).collect(),
        None => tail.to_vec(),
    };

    debug!(
        path = %path.display(),
        window_bytes = window.len(),
        lines = selected.len(),
        "Tailed log"
    );
    Ok(selected.join("\n"))
}

/// Finds log files under `logs/` by glob
#[derive(Debug, Clone)]
pub struct LogLocator {
    guard: PathGuard,
}

impl LogLocator {
    /// Create a locator rooted at the guard's root
    pub fn new(guard: PathGuard) -> Self {
        Self { guard }
    }

    /// Every regular file under `logs/` whose root-relative path matches `pattern`
    ///
    /// A missing `logs/` directory yields no files. Entries are visited in
    /// file name order and symlinks are not followed.
    pub fn find(&self, pattern: &str) -> GatewayResult<Vec<PathBuf>> {
        let dir = self.guard.resolve(LOGS_DIR)?;
        if !dir.is_dir() {
            debug!(dir = %dir.display(), "No logs directory");
            return Ok(Vec::new());
        }

        let files: Vec<PathBuf> = WalkDir::new(&dir)
            .follow_links(false)
            .sort_by_file_name()
            .into_iter()
            .filter_map(|e| e.ok())
            .filter(|e| e.file_type().is_file())
            .map(|e| e.into_path())
            .filter(|path| {
                self.guard
                    .relative(path)
                    .is_some_and(|rel| glob_match(pattern, &rel))
            })
            .collect();

        debug!(pattern = %pattern, matches = files.len(), "Located logs");
        Ok(files)
    }

    /// Root-relative display form of a located file
    pub fn display_path(&self, path: &Path) -> String {
        self.guard
            .relative(path)
            .unwrap_or_else(|| path.display().to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;
    use tempfile::TempDir;

    fn numbered(n: usize) -> String {
        (1..=n).map(|i| format!("line {}\n", i)).collect()
    }

    fn write(root: &Path, rel: &str, content: &str) -> PathBuf {
        let path = root.join(rel);
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(&path, content).unwrap();
        path
    }

    #[test]
    fn test_tail_returns_last_lines_in_order() {
        let dir = TempDir::new().unwrap();
        let path = write(dir.path(), "app.log", &numbered(15));

        let text = tail(&path, 10, 1_000_000, None).unwrap();
        let expected: Vec<String> = (6..=15).map(|i| format!("line {}", i)).collect();
        assert_eq!(text, expected.join("\n"));
    }

    #[test]
    fn test_tail_shorter_file_is_whole_file() {
        let dir = TempDir::new().unwrap();
        let path = write(dir.path(), "short.log", "a\nb\nc\n");

        assert_eq!(tail(&path, 5, 1_000_000, None).unwrap(), "a\nb\nc");
    }

    #[test]
    fn test_tail_clamps_line_count() {
        let dir = TempDir::new().unwrap();
        let path = write(dir.path(), "big.log", &numbered(2500));

        let text = tail(&path, 5000, 10_000_000, None).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines.len(), MAX_TAIL_LINES);
        assert_eq!(lines[0], "line 501");
        assert_eq!(lines[MAX_TAIL_LINES - 1], "line 2500");

        assert_eq!(tail(&path, 0, 10_000_000, None).unwrap(), "line 2500");
        assert_eq!(clamp_tail_lines(0), 1);
        assert_eq!(clamp_tail_lines(200), 200);
        assert_eq!(clamp_tail_lines(2001), 2000);
    }

    #[test]
    fn test_tail_respects_byte_window() {
        let dir = TempDir::new().unwrap();
        let path = write(dir.path(), "app.log", "first\nsecond\nthird\n");

        // "third\n" is the last 6 bytes; "d\nthird\n" cuts "second" mid-line
        assert_eq!(tail(&path, 10, 6, None).unwrap(), "third");
        assert_eq!(tail(&path, 10, 8, None).unwrap(), "d\nthird");
    }

    #[test]
    fn test_tail_handles_crlf() {
        let dir = TempDir::new().unwrap();
        let path = write(dir.path(), "win.log", "one\r\ntwo\r\nthree\r\n");

        assert_eq!(tail(&path, 2, 1_000, None).unwrap(), "two\nthree");
    }

    #[test]
    fn test_filter_applies_after_tail() {
        let dir = TempDir::new().unwrap();
        let content = "ERROR early\ninfo 1\ninfo 2\nERROR late\ninfo 3\n";
        let path = write(dir.path(), "app.log", content);

        assert_eq!(tail(&path, 3, 1_000, Some("ERROR")).unwrap(), "ERROR late");
        assert_eq!(tail(&path, 5, 1_000, Some("ERROR")).unwrap(), "ERROR early\nERROR late");
        assert_eq!(tail(&path, 1, 1_000, Some("ERROR")).unwrap(), "");
    }

    #[test]
    fn test_find_filters_by_glob() {
        let dir = TempDir::new().unwrap();
        write(dir.path(), "logs/app.log", "x\n");
        write(dir.path(), "logs/worker.log", "x\n");
        write(dir.path(), "logs/notes.txt", "x\n");
        write(dir.path(), "logs/nested/deep.log", "x\n");
        write(dir.path(), "other/app.log", "x\n");

        let locator = LogLocator::new(PathGuard::new(dir.path()));

        let found: HashSet<String> = locator
            .find("logs/*.log")
            .unwrap()
            .iter()
            .map(|p| locator.display_path(p))
            .collect();
        assert_eq!(
            found,
            HashSet::from(["logs/app.log".to_string(), "logs/worker.log".to_string()])
        );

        let recursive: HashSet<String> = locator
            .find("logs/**/*.log")
            .unwrap()
            .iter()
            .map(|p| locator.display_path(p))
            .collect();
        assert_eq!(recursive.len(), 3);
        assert!(recursive.contains("logs/nested/deep.log"));
    }

    #[test]
    fn test_find_is_deterministic() {
        let dir = TempDir::new().unwrap();
        for name in ["c.log", "a.log", "b.log"] {
            write(dir.path(), &format!("logs/{}", name), "x\n");
        }

        let locator = LogLocator::new(PathGuard::new(dir.path()));
        assert_eq!(locator.find("logs/*.log").unwrap(), locator.find("logs/*.log").unwrap());
    }

    #[test]
    fn test_find_without_logs_dir() {
        let dir = TempDir::new().unwrap();
        let locator = LogLocator::new(PathGuard::new(dir.path()));

        assert!(locator.find("logs/*.log").unwrap().is_empty());
    }

    #[test]
    fn test_log_tail_display() {
        let tail = LogTail {
            path: "logs/app.log".to_string(),
            content: "a\nb".to_string(),
        };
        assert_eq!(tail.to_string(), "--- logs/app.log ---\na\nb");
    }
}
