//! Logging utilities with colored output and progress bars.
//!
//! This module provides:
//! - `log!` macro for formatted terminal output with colored prefixes
//! - `ProgressBars` for displaying multiple progress bars simultaneously
//!
//! # Example
//!
//! ```ignore
//! // Simple logging
//! log!("content"; "rendering {} pages", count);
//!
//! // Progress bars for parallel stages
//! let progress = ProgressBars::new(&[("content", 12), ("write", 12)]);
//! progress.inc_by_name("content");
//! progress.finish(); // clear progress bars
//! ```

use colored::{ColoredString, Colorize};
use crossterm::{
    cursor, execute,
    terminal::{Clear, ClearType, size},
};
use std::{
    io::{Write, stdout},
    sync::{
        Mutex, OnceLock,
        atomic::{AtomicUsize, Ordering},
    },
};

/// Cached terminal width (fetched once on first use)
static TERMINAL_WIDTH: OnceLock<u16> = OnceLock::new();

/// Active progress bar count (for log coordination)
static BAR_COUNT: AtomicUsize = AtomicUsize::new(0);

// ============================================================================
// Layout Constants
// ============================================================================
//
// Progress bar format: "[stage] [████░░░░] 42/100"
//                       ^-----^ ^-------^ ^----^
//                       prefix  bar       count

/// Length of brackets around stage name: "[]"
const BRACKET_LEN: usize = 2;
/// Space after prefix: "[stage] " <- this space
const SPACE_AFTER_PREFIX: usize = 1;
/// Bar wrapper: " []" (space + brackets around progress bar)
const BAR_WRAPPER_LEN: usize = 3;
/// Space before count: "...] 42/100" <- this space
const SPACE_BEFORE_COUNT: usize = 1;
/// Minimum progress bar width in characters
const MIN_BAR_WIDTH: usize = 10;
/// Maximum progress bar width in characters
const MAX_BAR_WIDTH: usize = 40;

/// Calculate total prefix length for a stage name.
///
/// Returns: `stage.len() + 3` (for `[`, `]`, and trailing space)
#[inline]
const fn calc_prefix_len(stage_len: usize) -> usize {
    stage_len + BRACKET_LEN + SPACE_AFTER_PREFIX
}

/// Get terminal width, cached after first call.
/// Falls back to 120 columns if detection fails.
fn get_terminal_width() -> u16 {
    *TERMINAL_WIDTH.get_or_init(|| size().map(|(w, _)| w).unwrap_or(120))
}

// ============================================================================
// Log Macro
// ============================================================================

/// Log a message with a colored stage prefix.
///
/// # Usage
/// ```ignore
/// log!("stage"; "message with {} formatting", args);
/// ```
#[macro_export]
macro_rules! log {
    ($stage:expr; $($arg:tt)*) => {{
        $crate::logger::log($stage, &format!($($arg)*))
    }};
}

// ============================================================================
// Progress Bars
// ============================================================================

/// Manages multiple progress bars displayed on separate terminal lines.
///
/// Each bar occupies one line and updates in place using ANSI cursor
/// control. Bars are indexed by their creation order (0, 1, 2, ...).
///
/// # Thread Safety
/// Uses a mutex to synchronize terminal updates from multiple threads.
pub struct ProgressBars {
    bars: Vec<ProgressBar>,
    lock: Mutex<()>,
}

/// Internal state for a single progress bar.
struct ProgressBar {
    /// Colored prefix string (e.g., "[content]" in yellow)
    prefix: ColoredString,
    /// Pre-calculated display length of prefix
    prefix_len: usize,
    /// Total number of items to process
    total: usize,
    /// Current progress counter (atomic for thread-safe updates)
    current: AtomicUsize,
    /// Row index within the progress area (0 = first bar)
    row: usize,
}

impl ProgressBars {
    /// Create progress bars for multiple stages.
    ///
    /// # Arguments
    /// * `stages` - Slice of (`stage_name`, `total_count`) tuples
    ///
    /// # Example
    /// ```ignore
    /// let progress = ProgressBars::new(&[
    ///     ("content", descriptors.len()),
    /// ]);
    /// ```
    pub fn new(stages: &[(&'static str, usize)]) -> Self {
        // Reserve terminal lines for progress bars
        let mut stdout = stdout().lock();
        for _ in 0..stages.len() {
            writeln!(stdout).ok();
        }
        stdout.flush().ok();

        BAR_COUNT.store(stages.len(), Ordering::SeqCst);

        let bars = stages
            .iter()
            .enumerate()
            .map(|(row, (stage, total))| {
                let prefix = colorize_prefix(stage, &stage.to_ascii_lowercase());
                ProgressBar {
                    prefix,
                    prefix_len: calc_prefix_len(stage.len()),
                    total: *total,
                    current: AtomicUsize::new(0),
                    row,
                }
            })
            .collect();

        Self {
            bars,
            lock: Mutex::new(()),
        }
    }

    /// Increment progress for the bar with the given name.
    #[inline]
    pub fn inc_by_name(&self, name: &str) {
        for bar in &self.bars {
            // The prefix format is "[name]" so we check if it contains the name
            if bar.prefix.to_string().contains(name) {
                let current = bar.current.fetch_add(1, Ordering::Relaxed) + 1;
                self.display(bar, current);
                return;
            }
        }
    }

    /// Render a progress bar at its designated row.
    fn display(&self, bar: &ProgressBar, current: usize) {
        let _guard = self.lock.lock().ok();

        let width = get_terminal_width() as usize;

        // Calculate available width for the bar
        let progress_text = format!("{}/{}", current, bar.total);
        let overhead = bar.prefix_len + BAR_WRAPPER_LEN + SPACE_BEFORE_COUNT + progress_text.len();
        let available = width.saturating_sub(overhead);
        let bar_width = available.clamp(MIN_BAR_WIDTH, MAX_BAR_WIDTH);

        // Calculate filled/empty portions
        let filled = if bar.total > 0 {
            (current * bar_width) / bar.total
        } else {
            0
        };
        let empty = bar_width.saturating_sub(filled);

        let progress_bar: String = "█".repeat(filled) + &"░".repeat(empty);

        // Update the correct line using cursor movement
        let mut stdout = stdout().lock();
        #[allow(clippy::cast_possible_truncation)] // Safe: bars count is always small
        let lines_up = (self.bars.len() - bar.row) as u16;
        execute!(stdout, cursor::MoveUp(lines_up)).ok();
        execute!(stdout, Clear(ClearType::CurrentLine)).ok();
        write!(
            stdout,
            "{} [{}] {}",
            bar.prefix, progress_bar, progress_text
        )
        .ok();
        execute!(stdout, cursor::MoveDown(lines_up)).ok();
        write!(stdout, "\r").ok();
        stdout.flush().ok();
    }

    /// Clear all progress bars from the terminal.
    ///
    /// Call this when processing is complete to clean up the display.
    #[allow(clippy::cast_possible_truncation)] // Safe: bars count is always small
    pub fn finish(&self) {
        BAR_COUNT.store(0, Ordering::SeqCst);
        let _guard = self.lock.lock().ok();

        let mut stdout = stdout().lock();
        let bars_len = self.bars.len() as u16;

        // Move to top of progress area and clear each line
        execute!(stdout, cursor::MoveUp(bars_len)).ok();
        for _ in &self.bars {
            execute!(stdout, Clear(ClearType::CurrentLine)).ok();
            execute!(stdout, cursor::MoveDown(1)).ok();
        }

        // Return cursor to starting position
        execute!(stdout, cursor::MoveUp(bars_len)).ok();
        stdout.flush().ok();
    }
}

impl Drop for ProgressBars {
    fn drop(&mut self) {
        self.finish();
    }
}

// ============================================================================
// Helper Functions
// ============================================================================

/// Log a message with a colored stage prefix.
///
/// Automatically truncates long messages to fit terminal width.
#[inline]
#[allow(clippy::cast_possible_truncation)] // Safe: bars count is always small
pub fn log(stage: &str, message: &str) {
    let stage_lower = stage.to_ascii_lowercase();
    let prefix = colorize_prefix(stage, &stage_lower);
    let width = get_terminal_width() as usize;

    let mut stdout = stdout().lock();

    let bar_count = BAR_COUNT.load(Ordering::SeqCst);
    if bar_count > 0 {
        execute!(stdout, cursor::MoveUp(bar_count as u16)).ok();
        execute!(stdout, Clear(ClearType::FromCursorDown)).ok();
    } else {
        execute!(stdout, Clear(ClearType::UntilNewLine)).ok();
    }

    // Check for multiline
    if message.contains('\n') {
        // For multiline, we print the prefix with the first line,
        // and then the rest of the lines. We don't truncate.
        writeln!(stdout, "{prefix} {message}").ok();
    } else {
        // Truncate message if it exceeds available width
        let prefix_len = calc_prefix_len(stage.len());
        let max_msg_len = width.saturating_sub(prefix_len);

        let message = if message.len() > max_msg_len {
            truncate_str(message, max_msg_len)
        } else {
            message
        };

        writeln!(stdout, "{prefix} {message}").ok();
    }

    if bar_count > 0 {
        for _ in 0..bar_count {
            writeln!(stdout).ok();
        }
    }

    stdout.flush().ok();
}

/// Apply color to a stage prefix based on stage type.
#[inline]
fn colorize_prefix(stage: &str, stage_lower: &str) -> ColoredString {
    let prefix = format!("[{stage}]");
    match stage_lower {
        "pdf" => prefix.bright_blue().bold(),
        "error" => prefix.bright_red().bold(),
        "warn" => prefix.bright_magenta().bold(),
        _ => prefix.bright_yellow().bold(),
    }
}

/// Truncate a string to fit within `max_len` bytes.
///
/// Ensures the result is valid UTF-8 by finding the nearest character boundary.
#[inline]
fn truncate_str(s: &str, max_len: usize) -> &str {
    if s.len() <= max_len {
        return s;
    }
    // Find the last valid UTF-8 boundary within max_len
    let mut end = max_len;
    while end > 0 && !s.is_char_boundary(end) {
        end -= 1;
    }
    &s[..end]
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_calc_prefix_len_short_stage() {
        // "a" -> "[a] " = 1 + 2 + 1 = 4
        assert_eq!(calc_prefix_len(1), 4);
    }

    #[test]
    fn test_calc_prefix_len_typical_stage() {
        // "content" -> "[content] " = 7 + 2 + 1 = 10
        assert_eq!(calc_prefix_len(7), 10);
    }

    #[test]
    fn test_calc_prefix_len_empty() {
        // "" -> "[] " = 0 + 2 + 1 = 3
        assert_eq!(calc_prefix_len(0), 3);
    }

    #[test]
    fn test_truncate_str_short_string() {
        let s = "hello";
        assert_eq!(truncate_str(s, 10), "hello");
    }

    #[test]
    fn test_truncate_str_exact_length() {
        let s = "hello";
        assert_eq!(truncate_str(s, 5), "hello");
    }

    #[test]
    fn test_truncate_str_needs_truncation() {
        let s = "hello world";
        assert_eq!(truncate_str(s, 5), "hello");
    }

    #[test]
    fn test_truncate_str_unicode_boundary() {
        // UTF-8 multibyte: "€€" is 6 bytes (3 bytes per char)
        // Truncating at byte 4 should find boundary at byte 3
        let s = "€€";
        assert_eq!(truncate_str(s, 4), "€");
    }

    #[test]
    fn test_truncate_str_empty() {
        let s = "";
        assert_eq!(truncate_str(s, 10), "");
    }

    #[test]
    fn test_truncate_str_zero_limit() {
        let s = "hello";
        assert_eq!(truncate_str(s, 0), "");
    }

    #[test]
    fn test_constants_values() {
        assert_eq!(BRACKET_LEN, 2); // "[" and "]"
        assert_eq!(SPACE_AFTER_PREFIX, 1); // " "
        assert_eq!(BAR_WRAPPER_LEN, 3); // " []"
        assert_eq!(SPACE_BEFORE_COUNT, 1); // " "
        assert!(MIN_BAR_WIDTH < MAX_BAR_WIDTH);
    }
}
