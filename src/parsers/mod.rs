//! Shared building blocks for manager output parsers.
//!
//! Parsers are pure functions from captured text to records. They skip lines
//! that do not look like records and never fail on truncated input.

pub mod blocks;
pub mod tokens;

pub use blocks::{Block, parse_blocks};
pub use tokens::{is_known_arch, split_apk_name, split_name_arch, split_name_suite, split_nevra};

/// Split tool output into lines.
///
/// Carriage returns are dropped and exactly one trailing blank line (the
/// kind many tools print after their last record) is removed. Interior blank
/// lines are kept because block parsers use them as separators.
pub fn output_lines(text: &str) -> Vec<&str> {
    let mut lines: Vec<&str> = text.split('\n').map(|l| l.trim_end_matches('\r')).collect();
    // Newline terminating the last line
    if lines.last().is_some_and(|l| l.is_empty()) {
        lines.pop();
    }
    // One trailing blank line printed by the tool
    if lines.last().is_some_and(|l| l.trim().is_empty()) {
        lines.pop();
    }
    lines
}

/// Split a whitespace-separated table row into at most `columns` fields; the
/// last field keeps its internal spaces.
pub fn split_columns(line: &str, columns: usize) -> Vec<&str> {
    let mut fields = Vec::with_capacity(columns);
    let mut rest = line.trim();
    while fields.len() + 1 < columns && !rest.is_empty() {
        match rest.find(char::is_whitespace) {
            Some(end) => {
                fields.push(&rest[..end]);
                rest = rest[end..].trim_start();
            }
            None => {
                fields.push(rest);
                rest = "";
            }
        }
    }
    if !rest.is_empty() {
        fields.push(rest);
    }
    fields
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn trims_one_trailing_blank_line_only() {
        assert_eq!(output_lines("a\n\nb\n\n"), vec!["a", "", "b"]);
        assert_eq!(output_lines("a\n\nb\n\n\n"), vec!["a", "", "b", ""]);
        assert_eq!(output_lines("a\r\nb"), vec!["a", "b"]);
        assert!(output_lines("").is_empty());
        assert!(output_lines("\n").is_empty());
    }

    #[test]
    fn split_columns_keeps_tail_intact() {
        assert_eq!(
            split_columns("nvim   v0.9.5  neovim-snap  classic  Vim-fork focused on extensibility", 5),
            vec!["nvim", "v0.9.5", "neovim-snap", "classic", "Vim-fork focused on extensibility"]
        );
        assert_eq!(split_columns("short line", 5), vec!["short", "line"]);
        assert!(split_columns("   ", 3).is_empty());
    }
}
