//! Lexer / Preprocessor — strips comments and turns the raw source
//! into an ordered sequence of [`LineRecord`]s.

use regex::Regex;

/// A lexed source line: trimmed text, leading-whitespace column, and
/// the original 1-based line number (for diagnostics). Immutable
/// after lexing.
#[derive(Debug, Clone)]
pub struct LineRecord {
    pub text: String,
    pub indent: usize,
    pub line_number: usize,
}

/// Preprocess raw MULTIX source into line records. Block comments
/// (`;- ... -;`, non-nested, earliest closing delimiter wins) are
/// removed first; end-of-line comments (`;` to end of line) are
/// stripped per line; all-whitespace lines are discarded.
pub fn preprocess(source: &str) -> Vec<LineRecord> {
    let without_block_comments = strip_block_comments(source);

    without_block_comments
        .split('\n')
        .enumerate()
        .filter_map(|(index, raw_line)| {
            let code = match raw_line.find(';') {
                Some(at) => &raw_line[..at],
                None => raw_line,
            };
            let trimmed = code.trim();
            if trimmed.is_empty() {
                return None;
            }
            let indent = code.len() - code.trim_start().len();
            Some(LineRecord {
                text: trimmed.to_string(),
                indent,
                line_number: index + 1,
            })
        })
        .collect()
}

/// Blank out every `;- ... -;` span with spaces, preserving newlines
/// so line numbers downstream still match the original source.
fn strip_block_comments(source: &str) -> String {
    let re = Regex::new(r"(?s);-.*?-;").unwrap();
    let mut result = String::with_capacity(source.len());
    let mut last = 0;
    for m in re.find_iter(source) {
        result.push_str(&source[last..m.start()]);
        for ch in m.as_str().chars() {
            result.push(if ch == '\n' { '\n' } else { ' ' });
        }
        last = m.end();
    }
    result.push_str(&source[last..]);
    result
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strips_eol_comments_and_discards_blank_lines() {
        let lines = preprocess("x5 7 ; set x5\n\n  ; just a comment\nx6 8");
        assert_eq!(lines.len(), 2);
        assert_eq!(lines[0].text, "x5 7");
        assert_eq!(lines[0].line_number, 1);
        assert_eq!(lines[1].text, "x6 8");
        assert_eq!(lines[1].line_number, 4);
    }

    #[test]
    fn records_indentation_column() {
        let lines = preprocess("  x5 7");
        assert_eq!(lines[0].indent, 2);
        assert_eq!(lines[0].text, "x5 7");
    }

    #[test]
    fn strips_block_comments_spanning_multiple_lines_and_keeps_line_numbers() {
        let source = "x1 1\n;- this is\nall dropped -;\nx2 2";
        let lines = preprocess(source);
        assert_eq!(lines.len(), 2);
        assert_eq!(lines[0].text, "x1 1");
        assert_eq!(lines[1].text, "x2 2");
        assert_eq!(lines[1].line_number, 4);
    }

    #[test]
    fn earliest_closing_delimiter_wins_and_comments_do_not_nest() {
        // The first `;-` closes at the first `-;`; everything after
        // that, including the bare trailing `-;`, is live source, and
        // the bare `-;` is itself read as the start of an end-of-line
        // comment (since it is not preceded by another `;-`).
        let source = "x1 1 ;- dropped -; x2 2 ; trailing comment";
        let lines = preprocess(source);
        assert_eq!(lines.len(), 1);
        let tokens: Vec<&str> = lines[0].text.split_whitespace().collect();
        assert_eq!(tokens, vec!["x1", "1", "x2", "2"]);
    }
}
