//! Rewrites `?` placeholders into Postgres `$n` positional parameters.
//!
//! Builders emit `?` so fragments compose without renumbering. The rewrite
//! runs once, right before execution, and leaves string literals, quoted
//! identifiers, comments and dollar-quoted bodies untouched. `??` is an
//! escaped literal `?` (for the jsonb `?` operator).

/// Rewrite `?` into `$1`, `$2`, ... in order of appearance.
pub fn rewrite_placeholders(sql: &str) -> String {
    let mut out = String::with_capacity(sql.len() + 8);
    let mut index = 0usize;
    scan(sql, |event| match event {
        Token::Text(text) => out.push_str(text),
        Token::Placeholder => {
            index += 1;
            out.push('$');
            out.push_str(&index.to_string());
        }
        Token::EscapedQuestion => out.push('?'),
    });
    out
}

/// Count the `?` placeholders a fragment will consume.
pub fn count_placeholders(sql: &str) -> usize {
    let mut count = 0usize;
    scan(sql, |event| {
        if matches!(event, Token::Placeholder) {
            count += 1;
        }
    });
    count
}

enum Token<'a> {
    Text(&'a str),
    Placeholder,
    EscapedQuestion,
}

fn scan<'a>(sql: &'a str, mut emit: impl FnMut(Token<'a>)) {
    let bytes = sql.as_bytes();
    let len = bytes.len();
    let mut start = 0usize;
    let mut i = 0usize;

    while i < len {
        match bytes[i] {
            b'\'' => i = skip_quoted(bytes, i, b'\''),
            b'"' => i = skip_quoted(bytes, i, b'"'),
            b'-' if bytes.get(i + 1) == Some(&b'-') => {
                i = match sql[i..].find('\n') {
                    Some(offset) => i + offset + 1,
                    None => len,
                };
            }
            b'/' if bytes.get(i + 1) == Some(&b'*') => {
                i = match sql[i + 2..].find("*/") {
                    Some(offset) => i + 2 + offset + 2,
                    None => len,
                };
            }
            b'$' => match dollar_tag(sql, i) {
                Some(tag) => {
                    let body = i + tag.len();
                    i = match sql[body..].find(tag) {
                        Some(offset) => body + offset + tag.len(),
                        None => len,
                    };
                }
                None => i += 1,
            },
            b'?' => {
                emit(Token::Text(&sql[start..i]));
                if bytes.get(i + 1) == Some(&b'?') {
                    emit(Token::EscapedQuestion);
                    i += 2;
                } else {
                    emit(Token::Placeholder);
                    i += 1;
                }
                start = i;
            }
            _ => i += 1,
        }
    }
    emit(Token::Text(&sql[start..]));
}

/// Index just past the closing quote; a doubled quote stays inside.
fn skip_quoted(bytes: &[u8], open: usize, quote: u8) -> usize {
    let mut i = open + 1;
    while i < bytes.len() {
        if bytes[i] == quote {
            if bytes.get(i + 1) == Some(&quote) {
                i += 2;
                continue;
            }
            return i + 1;
        }
        i += 1;
    }
    bytes.len()
}

/// `$tag$` or `$$` starting at `at`, if present.
fn dollar_tag(sql: &str, at: usize) -> Option<&str> {
    let rest = &sql[at + 1..];
    let end = rest.find('$')?;
    let tag = &rest[..end];
    let valid = tag
        .chars()
        .enumerate()
        .all(|(i, c)| c == '_' || c.is_ascii_alphabetic() || (i > 0 && c.is_ascii_digit()));
    valid.then(|| &sql[at..at + end + 2])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn numbers_in_order() {
        assert_eq!(
            rewrite_placeholders("SELECT * FROM \"t\" WHERE \"a\" = ? AND \"b\" = ?"),
            "SELECT * FROM \"t\" WHERE \"a\" = $1 AND \"b\" = $2"
        );
    }

    #[test]
    fn skips_literals_and_identifiers() {
        assert_eq!(
            rewrite_placeholders("SELECT '?', \"?\" , 'it''s ?' WHERE x = ?"),
            "SELECT '?', \"?\" , 'it''s ?' WHERE x = $1"
        );
    }

    #[test]
    fn skips_comments() {
        assert_eq!(
            rewrite_placeholders("SELECT ? -- what?\n, /* ? */ ?"),
            "SELECT $1 -- what?\n, /* ? */ $2"
        );
    }

    #[test]
    fn skips_dollar_quotes() {
        assert_eq!(
            rewrite_placeholders("DO $body$ SELECT ?; $body$; SELECT $$?$$, ?"),
            "DO $body$ SELECT ?; $body$; SELECT $$?$$, $1"
        );
    }

    #[test]
    fn existing_positional_params_untouched() {
        assert_eq!(rewrite_placeholders("SELECT $1, ?"), "SELECT $1, $1");
    }

    #[test]
    fn double_question_is_literal() {
        assert_eq!(
            rewrite_placeholders("SELECT data ?? 'k' FROM t WHERE id = ?"),
            "SELECT data ? 'k' FROM t WHERE id = $1"
        );
        assert_eq!(count_placeholders("data ?? 'k' AND id = ?"), 1);
    }

    #[test]
    fn counts_placeholders() {
        assert_eq!(count_placeholders("a = ? OR b IN (?, ?)"), 3);
        assert_eq!(count_placeholders("'?'"), 0);
    }
}
