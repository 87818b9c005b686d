pub(super) fn is_line_comment_start(bytes: &[u8], idx: usize) -> bool {
    bytes.get(idx) == Some(&b'-') && bytes.get(idx + 1) == Some(&b'-')
}

pub(super) fn is_block_comment_start(bytes: &[u8], idx: usize) -> bool {
    bytes.get(idx) == Some(&b'/') && bytes.get(idx + 1) == Some(&b'*')
}

pub(super) fn is_block_comment_end(bytes: &[u8], idx: usize) -> bool {
    bytes.get(idx) == Some(&b'*') && bytes.get(idx + 1) == Some(&b'/')
}

/// Returns the tag of a `$tag$` opener starting at `start`.
pub(super) fn try_start_dollar_quote(bytes: &[u8], start: usize) -> Option<String> {
    let mut idx = start + 1;
    while idx < bytes.len() && bytes[idx] != b'$' {
        let b = bytes[idx];
        if !(b.is_ascii_alphanumeric() || b == b'_') {
            return None;
        }
        idx += 1;
    }

    // `$1` style positional parameters are not quote openers.
    if bytes.get(start + 1).is_some_and(u8::is_ascii_digit) {
        return None;
    }

    if idx < bytes.len() && bytes[idx] == b'$' {
        String::from_utf8(bytes[start + 1..idx].to_vec()).ok()
    } else {
        None
    }
}

pub(super) fn matches_tag(bytes: &[u8], idx: usize, tag: &str) -> bool {
    let end = idx + 1 + tag.len();
    end < bytes.len()
        && bytes[idx + 1..end] == *tag.as_bytes()
        && bytes.get(end) == Some(&b'$')
}

pub(super) fn is_word_byte(b: u8) -> bool {
    b.is_ascii_alphanumeric() || b == b'_' || b >= 0x80
}

/// End offset of a bind name starting at `start`, if one is present.
pub(super) fn scan_bind_name(bytes: &[u8], start: usize) -> Option<usize> {
    let mut idx = start;
    while idx < bytes.len() && (bytes[idx].is_ascii_alphanumeric() || bytes[idx] == b'_') {
        idx += 1;
    }
    (idx > start).then_some(idx)
}

/// True when the text before a placeholder ends with the keyword `IN` plus whitespace.
pub(super) fn follows_in_keyword(prefix: &[u8]) -> bool {
    let trimmed = prefix.trim_ascii_end();
    if trimmed.len() == prefix.len() || trimmed.len() < 2 {
        return false;
    }
    let keyword = &trimmed[trimmed.len() - 2..];
    if !keyword.eq_ignore_ascii_case(b"in") {
        return false;
    }
    trimmed.len() == 2 || !is_word_byte(trimmed[trimmed.len() - 3])
}
