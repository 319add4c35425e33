use super::parsers::{
    closing_tag_end, is_block_comment_end, is_block_comment_start, is_escape_string_start,
    is_line_comment_start, scan_identifier, try_start_dollar_quote,
};

#[derive(Clone)]
enum State {
    Normal,
    /// `true` inside `E'...'`, where backslashes escape.
    SingleQuoted(bool),
    DoubleQuoted,
    Backticked,
    LineComment,
    BlockComment(u32),
    DollarQuoted(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum MarkerKind<'a> {
    /// `:name`, carrying the name without the colon.
    Named(&'a str),
    /// A bare `?`.
    Positional,
}

/// A placeholder marker found in query text; `start..end` is its byte range.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct Marker<'a> {
    pub(crate) start: usize,
    pub(crate) end: usize,
    pub(crate) kind: MarkerKind<'a>,
}

/// Find placeholder markers outside string literals, quoted identifiers, comments and
/// dollar-quoted bodies, in left-to-right order.
///
/// `::` (a Postgres cast) is never a marker, and neither is `?` followed by a digit, which is
/// already a native numbered placeholder.
pub(crate) fn scan_markers(sql: &str) -> Vec<Marker<'_>> {
    let bytes = sql.as_bytes();
    let mut markers = Vec::new();
    let mut state = State::Normal;
    let mut idx = 0;

    while idx < bytes.len() {
        let b = bytes[idx];
        match state {
            State::Normal => match b {
                b'\'' => state = State::SingleQuoted(is_escape_string_start(bytes, idx)),
                b'"' => state = State::DoubleQuoted,
                b'`' => state = State::Backticked,
                b'-' if is_line_comment_start(bytes, idx) => {
                    state = State::LineComment;
                    idx += 1;
                }
                b'/' if is_block_comment_start(bytes, idx) => {
                    state = State::BlockComment(1);
                    idx += 1;
                }
                b'$' => {
                    if let Some((tag, opened)) = try_start_dollar_quote(bytes, idx) {
                        state = State::DollarQuoted(tag);
                        idx = opened;
                    }
                }
                b':' => {
                    if bytes.get(idx + 1) == Some(&b':') {
                        idx += 1;
                    } else if let Some(end) = scan_identifier(bytes, idx + 1) {
                        markers.push(Marker {
                            start: idx,
                            end,
                            kind: MarkerKind::Named(&sql[idx + 1..end]),
                        });
                        idx = end - 1;
                    }
                }
                b'?' if !bytes.get(idx + 1).is_some_and(u8::is_ascii_digit) => {
                    markers.push(Marker {
                        start: idx,
                        end: idx + 1,
                        kind: MarkerKind::Positional,
                    });
                }
                _ => {}
            },
            State::SingleQuoted(backslash) => {
                if backslash && b == b'\\' {
                    idx += 1;
                } else if b == b'\'' {
                    if bytes.get(idx + 1) == Some(&b'\'') {
                        idx += 1; // skip escaped quote
                    } else {
                        state = State::Normal;
                    }
                }
            }
            State::DoubleQuoted => {
                if b == b'"' {
                    if bytes.get(idx + 1) == Some(&b'"') {
                        idx += 1; // skip escaped quote
                    } else {
                        state = State::Normal;
                    }
                }
            }
            State::Backticked => {
                if b == b'`' {
                    if bytes.get(idx + 1) == Some(&b'`') {
                        idx += 1;
                    } else {
                        state = State::Normal;
                    }
                }
            }
            State::LineComment => {
                if b == b'\n' {
                    state = State::Normal;
                }
            }
            State::BlockComment(depth) => {
                if is_block_comment_start(bytes, idx) {
                    state = State::BlockComment(depth + 1);
                    idx += 1;
                } else if is_block_comment_end(bytes, idx) {
                    state = if depth == 1 {
                        State::Normal
                    } else {
                        State::BlockComment(depth - 1)
                    };
                    idx += 1;
                }
            }
            State::DollarQuoted(ref tag) => {
                if b == b'$'
                    && let Some(end) = closing_tag_end(bytes, idx, tag)
                {
                    state = State::Normal;
                    idx = end;
                }
            }
        }

        idx += 1;
    }

    markers
}

#[cfg(test)]
mod tests {
    use super::*;

    fn names(sql: &str) -> Vec<MarkerKind<'_>> {
        scan_markers(sql).into_iter().map(|m| m.kind).collect()
    }

    #[test]
    fn finds_named_markers_in_order() {
        let sql = "SELECT x WHERE y = :a AND z = :b_2 AND w = :a";
        assert_eq!(
            names(sql),
            vec![
                MarkerKind::Named("a"),
                MarkerKind::Named("b_2"),
                MarkerKind::Named("a")
            ]
        );
        let first = scan_markers(sql)[0];
        assert_eq!(&sql[first.start..first.end], ":a");
    }

    #[test]
    fn finds_bare_question_marks_only() {
        let sql = "insert into t values(?, ?1, ?)";
        assert_eq!(
            names(sql),
            vec![MarkerKind::Positional, MarkerKind::Positional]
        );
    }

    #[test]
    fn skips_inside_literals_and_comments() {
        let sql = "select ':a', \"?\", `:b` -- :c ?\n/* :d /* ? */ :e */ from t where a = :f";
        assert_eq!(names(sql), vec![MarkerKind::Named("f")]);
    }

    #[test]
    fn skips_escaped_quotes() {
        let sql = "select 'it''s :a' where b = :b";
        assert_eq!(names(sql), vec![MarkerKind::Named("b")]);
    }

    #[test]
    fn skips_backslash_escapes_in_escape_strings() {
        let sql = r"select E'it\'s :a', e'\\' where b = :b";
        assert_eq!(names(sql), vec![MarkerKind::Named("b")]);

        // only a lone E prefix makes an escape string
        let sql = r"select name'\' where c = :c";
        assert_eq!(names(sql), vec![MarkerKind::Named("c")]);
    }

    #[test]
    fn skips_casts_and_assignment() {
        let sql = "select a::int, b := 1 where c = :c::text";
        assert_eq!(names(sql), vec![MarkerKind::Named("c")]);
    }

    #[test]
    fn skips_dollar_quoted_blocks() {
        let sql = "$foo$ select :a from t $foo$ where a = :b and c = $1";
        assert_eq!(names(sql), vec![MarkerKind::Named("b")]);
    }

    #[test]
    fn handles_multibyte_text() {
        let sql = "select 'héllo' where a = :naïve";
        // the identifier stops at the first non-ASCII byte
        assert_eq!(names(sql), vec![MarkerKind::Named("na")]);
    }
}
