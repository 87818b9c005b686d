use std::ops::Range;

use super::parsers::{
    follows_in_keyword, is_block_comment_end, is_block_comment_start, is_line_comment_start,
    is_word_byte, matches_tag, scan_bind_name, try_start_dollar_quote,
};

#[derive(Clone)]
pub(super) enum State {
    Normal,
    SingleQuoted,
    DoubleQuoted,
    LineComment,
    BlockComment(u32),
    DollarQuoted(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub(super) enum Token {
    /// SQL outside quotes and comments.
    Code(Range<usize>),
    /// A quoted literal or identifier, or a dollar-quoted body.
    Quoted(Range<usize>),
    Comment(Range<usize>),
    /// `\:`, which stands for a literal colon.
    EscapedColon,
    /// A `:name` placeholder. `expanding` is set when it directly follows `IN`.
    Bind { name: Range<usize>, expanding: bool },
    /// A top-level `;`.
    Terminator,
}

struct Runs {
    tokens: Vec<Token>,
    start: usize,
}

impl Runs {
    fn flush(&mut self, state: &State, end: usize) {
        if end > self.start {
            let range = self.start..end;
            self.tokens.push(match state {
                State::Normal => Token::Code(range),
                State::SingleQuoted | State::DoubleQuoted | State::DollarQuoted(_) => {
                    Token::Quoted(range)
                }
                State::LineComment | State::BlockComment(_) => Token::Comment(range),
            });
        }
        self.start = end;
    }
}

/// Split SQL text into code, quoted, and comment runs plus placeholders and terminators.
pub(super) fn tokenize(sql: &str) -> Vec<Token> {
    let bytes = sql.as_bytes();
    let mut runs = Runs {
        tokens: Vec::new(),
        start: 0,
    };
    let mut state = State::Normal;
    let mut idx = 0;

    while idx < bytes.len() {
        let b = bytes[idx];
        match state {
            State::Normal => {
                let (next, width) = match b {
                    b'\'' => (Some(State::SingleQuoted), 1),
                    b'"' => (Some(State::DoubleQuoted), 1),
                    _ if is_line_comment_start(bytes, idx) => (Some(State::LineComment), 2),
                    _ if is_block_comment_start(bytes, idx) => (Some(State::BlockComment(1)), 2),
                    b'$' => match try_start_dollar_quote(bytes, idx) {
                        Some(tag) => {
                            let width = tag.len() + 2;
                            (Some(State::DollarQuoted(tag)), width)
                        }
                        None => (None, 1),
                    },
                    _ => (None, 1),
                };
                if let Some(next) = next {
                    runs.flush(&state, idx);
                    state = next;
                    idx += width;
                    continue;
                }

                match b {
                    b'\\' if bytes.get(idx + 1) == Some(&b':') => {
                        runs.flush(&state, idx);
                        runs.tokens.push(Token::EscapedColon);
                        idx += 2;
                        runs.start = idx;
                        continue;
                    }
                    b';' => {
                        runs.flush(&state, idx);
                        runs.tokens.push(Token::Terminator);
                        idx += 1;
                        runs.start = idx;
                        continue;
                    }
                    b':' if bytes.get(idx + 1) == Some(&b':') => {
                        // `::type` cast
                        idx += 2;
                        continue;
                    }
                    b':' if idx == 0 || !is_word_byte(bytes[idx - 1]) => {
                        if let Some(end) = scan_bind_name(bytes, idx + 1) {
                            let expanding = follows_in_keyword(&bytes[..idx]);
                            runs.flush(&state, idx);
                            runs.tokens.push(Token::Bind {
                                name: idx + 1..end,
                                expanding,
                            });
                            idx = end;
                            runs.start = idx;
                            continue;
                        }
                    }
                    _ => {}
                }
                idx += 1;
            }
            State::SingleQuoted | State::DoubleQuoted => {
                let quote = if matches!(state, State::SingleQuoted) {
                    b'\''
                } else {
                    b'"'
                };
                if quote == b'\'' && b == b'\\' && bytes.get(idx + 1) == Some(&b':') {
                    runs.flush(&state, idx);
                    runs.tokens.push(Token::EscapedColon);
                    idx += 2;
                    runs.start = idx;
                    continue;
                }
                if b == quote {
                    if bytes.get(idx + 1) == Some(&quote) {
                        idx += 2;
                        continue;
                    }
                    runs.flush(&state, idx + 1);
                    state = State::Normal;
                }
                idx += 1;
            }
            State::LineComment => {
                if b == b'\n' {
                    runs.flush(&state, idx);
                    state = State::Normal;
                }
                idx += 1;
            }
            State::BlockComment(depth) => {
                if is_block_comment_start(bytes, idx) {
                    state = State::BlockComment(depth + 1);
                    idx += 2;
                } else if is_block_comment_end(bytes, idx) {
                    idx += 2;
                    if depth == 1 {
                        runs.flush(&state, idx);
                        state = State::Normal;
                    } else {
                        state = State::BlockComment(depth - 1);
                    }
                } else {
                    idx += 1;
                }
            }
            State::DollarQuoted(ref tag) => {
                if b == b'$' && matches_tag(bytes, idx, tag) {
                    idx += tag.len() + 2;
                    runs.flush(&state, idx);
                    state = State::Normal;
                } else {
                    idx += 1;
                }
            }
        }
    }

    runs.flush(&state, bytes.len());
    runs.tokens
}
