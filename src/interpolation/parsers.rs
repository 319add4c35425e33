pub(super) fn is_line_comment_start(bytes: &[u8], idx: usize) -> bool {
    bytes.get(idx) == Some(&b'-') && bytes.get(idx + 1) == Some(&b'-')
}

pub(super) fn is_block_comment_start(bytes: &[u8], idx: usize) -> bool {
    bytes.get(idx) == Some(&b'/') && bytes.get(idx + 1) == Some(&b'*')
}

pub(super) fn is_block_comment_end(bytes: &[u8], idx: usize) -> bool {
    bytes.get(idx) == Some(&b'*') && bytes.get(idx + 1) == Some(&b'/')
}

/// Whether the quote at `idx` opens a Postgres escape string (`E'...'`), where a backslash
/// escapes the next byte.
pub(super) fn is_escape_string_start(bytes: &[u8], idx: usize) -> bool {
    let Some(prefix) = idx.checked_sub(1) else {
        return false;
    };
    matches!(bytes[prefix], b'E' | b'e')
        && prefix
            .checked_sub(1)
            .is_none_or(|before| !is_identifier_byte(bytes[before]))
}

fn is_identifier_byte(b: u8) -> bool {
    b.is_ascii_alphanumeric() || b == b'_'
}

/// Returns the tag and the index of the `$` closing the opening delimiter.
///
/// Tags never start with a digit, so `$1` is left to the caller as a native placeholder.
pub(super) fn try_start_dollar_quote(bytes: &[u8], start: usize) -> Option<(String, usize)> {
    if bytes.get(start + 1).is_some_and(u8::is_ascii_digit) {
        return None;
    }
    let mut idx = start + 1;
    while idx < bytes.len() && bytes[idx] != b'$' {
        let b = bytes[idx];
        if !is_identifier_byte(b) {
            return None;
        }
        idx += 1;
    }

    if idx < bytes.len() && bytes[idx] == b'$' {
        let tag = String::from_utf8(bytes[start + 1..idx].to_vec()).ok()?;
        Some((tag, idx))
    } else {
        None
    }
}

/// Index of the `$` that closes a dollar-quoted body opened with `tag`, if `idx` starts one.
pub(super) fn closing_tag_end(bytes: &[u8], idx: usize, tag: &str) -> Option<usize> {
    let end = idx + 1 + tag.len();
    (end < bytes.len()
        && bytes[idx + 1..end] == *tag.as_bytes()
        && bytes.get(end) == Some(&b'$'))
    .then_some(end)
}

/// End (exclusive) of an ASCII identifier starting at `start`.
pub(super) fn scan_identifier(bytes: &[u8], start: usize) -> Option<usize> {
    let first = *bytes.get(start)?;
    if !(first.is_ascii_alphabetic() || first == b'_') {
        return None;
    }
    let mut idx = start + 1;
    while idx < bytes.len() && is_identifier_byte(bytes[idx]) {
        idx += 1;
    }
    Some(idx)
}
