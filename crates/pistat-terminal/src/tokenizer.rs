//! Input tokenizer.
//!
//! A token is a double-quoted span, a single-quoted span, or a maximal run
//! of non-whitespace. Quotes are stripped. A token that opens with a quote
//! but never closes it ends the scan: nothing from that point on is
//! returned.

pub fn tokenize(raw: &str) -> Vec<String> {
    let mut tokens = Vec::new();
    let mut rest = raw;

    loop {
        rest = rest.trim_start();
        let Some(first) = rest.chars().next() else {
            break;
        };

        if first == '"' || first == '\'' {
            let body = &rest[1..];
            match body.find(first) {
                Some(end) => {
                    tokens.push(body[..end].to_string());
                    rest = &body[end + 1..];
                },
                None => break,
            }
            continue;
        }

        let end = rest.find(char::is_whitespace).unwrap_or(rest.len());
        tokens.push(rest[..end].to_string());
        rest = &rest[end..];
    }

    tokens
}
