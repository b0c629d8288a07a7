//! Stripping advisory warnings from admin CLI output.
//!
//! The keystone CLI prints deprecation and Python warnings ahead of its
//! result table. [`WarningFilter`] removes those lines and leaves everything
//! from the first table border onward untouched.

/// Pure text filter for admin command output.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WarningFilter {
    /// Lines starting with this prefix open a warning block.
    pub prefix: String,
    /// Lines containing any of these also open a warning block.
    pub contains: Vec<String>,
}

impl Default for WarningFilter {
    fn default() -> Self {
        Self {
            prefix: "WARNING".to_string(),
            contains: vec!["UserWarning".to_string()],
        }
    }
}

impl WarningFilter {
    /// Remove warning blocks that precede the result table.
    ///
    /// A warning block starts at a matching line and runs until the first
    /// table border (`+----+----+`); warnings can span several lines. Once a
    /// border has been seen every remaining line is kept. Kept lines retain
    /// their original line endings and order.
    pub fn apply(&self, output: &str) -> String {
        let mut kept = String::with_capacity(output.len());
        let mut found_table = false;
        let mut in_warning = false;

        for line in output.split_inclusive('\n') {
            if found_table {
                kept.push_str(line);
                continue;
            }

            let content = line.trim_end_matches(['\r', '\n']);
            if is_table_border(content) {
                found_table = true;
                in_warning = false;
                kept.push_str(line);
            } else if in_warning || self.is_warning(content) {
                in_warning = true;
            } else {
                kept.push_str(line);
            }
        }

        kept
    }

    fn is_warning(&self, line: &str) -> bool {
        line.starts_with(&self.prefix) || self.contains.iter().any(|c| line.contains(c.as_str()))
    }
}

/// `+` followed by one or more `-`/`+`, ending in `+`.
fn is_table_border(line: &str) -> bool {
    line.len() >= 3
        && line.starts_with('+')
        && line.ends_with('+')
        && line.chars().all(|c| c == '+' || c == '-')
}

#[cfg(test)]
mod tests {
    use super::*;

    fn strip(output: &str) -> String {
        WarningFilter::default().apply(output)
    }

    #[test]
    fn test_leading_warning_removed_trailing_kept() {
        assert_eq!(strip("WARNING\n+-+-+\nWARNING"), "+-+-+\nWARNING");
    }

    #[test]
    fn test_output_without_warnings_is_unchanged() {
        let table = "+----+------+\n| id | name |\n+----+------+\n| 1  | bob  |\n+----+------+\n";
        assert_eq!(strip(table), table);
    }

    #[test]
    fn test_multiline_warning_skipped_until_table() {
        let output = "/usr/lib/python2.7/site-packages/keystoneclient/shell.py:65: UserWarning: \
                      the --endpoint option is deprecated\n  warnings.warn(\n+---+\n| x |\n+---+\n";
        assert_eq!(strip(output), "+---+\n| x |\n+---+\n");
    }

    #[test]
    fn test_crlf_line_endings_preserved() {
        assert_eq!(strip("WARNING: old\r\n+--+\r\n| a |\r\n"), "+--+\r\n| a |\r\n");
    }

    #[test]
    fn test_lines_before_warning_kept() {
        assert_eq!(strip("note\nWARNING: x\ncontinued\n"), "note\n");
    }

    #[test]
    fn test_empty_output() {
        assert_eq!(strip(""), "");
    }

    #[test]
    fn test_table_border_detection() {
        assert!(is_table_border("+-+-+"));
        assert!(is_table_border("+--+"));
        assert!(!is_table_border("+"));
        assert!(!is_table_border("++"));
        assert!(!is_table_border("| a | b |"));
        assert!(!is_table_border("+ a +"));
    }
}
