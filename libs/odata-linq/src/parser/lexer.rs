//! Tokenizer for the filter grammar.

use crate::error::{Error, Result};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Token<'s> {
    /// Identifier, keyword or operator word.
    Word(&'s str),
    /// Raw literal text: quoted strings, numbers and prefixed forms such as `guid'...'`.
    Literal(&'s str),
    LParen,
    RParen,
    Comma,
    Colon,
    Slash,
    Minus,
}

impl Token<'_> {
    #[must_use]
    pub fn describe(&self) -> String {
        match self {
            Token::Word(w) | Token::Literal(w) => (*w).to_owned(),
            Token::LParen => "(".to_owned(),
            Token::RParen => ")".to_owned(),
            Token::Comma => ",".to_owned(),
            Token::Colon => ":".to_owned(),
            Token::Slash => "/".to_owned(),
            Token::Minus => "-".to_owned(),
        }
    }
}

pub fn tokenize(text: &str) -> Result<Vec<Token<'_>>> {
    let bytes = text.as_bytes();
    let mut tokens = Vec::new();
    let mut pos = 0;

    while pos < bytes.len() {
        let c = bytes[pos];
        match c {
            b' ' | b'\t' | b'\r' | b'\n' => pos += 1,
            b'(' => {
                tokens.push(Token::LParen);
                pos += 1;
            }
            b')' => {
                tokens.push(Token::RParen);
                pos += 1;
            }
            b',' => {
                tokens.push(Token::Comma);
                pos += 1;
            }
            b':' => {
                tokens.push(Token::Colon);
                pos += 1;
            }
            b'/' => {
                tokens.push(Token::Slash);
                pos += 1;
            }
            b'\'' => {
                let end = scan_quoted(text, pos)?;
                tokens.push(Token::Literal(&text[pos..end]));
                pos = end;
            }
            b'-' if bytes.get(pos + 1).is_some_and(u8::is_ascii_digit) => {
                let end = scan_number(bytes, pos + 1);
                tokens.push(Token::Literal(&text[pos..end]));
                pos = end;
            }
            b'-' => {
                tokens.push(Token::Minus);
                pos += 1;
            }
            b'0'..=b'9' => {
                let end = scan_number(bytes, pos);
                tokens.push(Token::Literal(&text[pos..end]));
                pos = end;
            }
            c if c.is_ascii_alphabetic() || c == b'_' => {
                let mut end = pos + 1;
                while end < bytes.len()
                    && (bytes[end].is_ascii_alphanumeric() || bytes[end] == b'_' || bytes[end] == b'.')
                {
                    end += 1;
                }
                if bytes.get(end) == Some(&b'\'') {
                    let close = scan_quoted(text, end)?;
                    tokens.push(Token::Literal(&text[pos..close]));
                    pos = close;
                } else {
                    tokens.push(Token::Word(&text[pos..end]));
                    pos = end;
                }
            }
            _ => {
                let ch = text[pos..].chars().next().unwrap_or('?');
                return Err(Error::format(format!(
                    "Unexpected character '{ch}' at position {pos}"
                )));
            }
        }
    }

    Ok(tokens)
}

/// End offset (exclusive) of the quoted run starting at `start`; `''` is an escaped quote.
fn scan_quoted(text: &str, start: usize) -> Result<usize> {
    let bytes = text.as_bytes();
    let mut pos = start + 1;
    while pos < bytes.len() {
        if bytes[pos] == b'\'' {
            if bytes.get(pos + 1) == Some(&b'\'') {
                pos += 2;
                continue;
            }
            return Ok(pos + 1);
        }
        pos += 1;
    }
    Err(Error::format(format!(
        "Unterminated literal starting at position {start}"
    )))
}

fn scan_number(bytes: &[u8], start: usize) -> usize {
    let mut pos = start;
    while pos < bytes.len() && bytes[pos].is_ascii_digit() {
        pos += 1;
    }
    if bytes.get(pos) == Some(&b'.') && bytes.get(pos + 1).is_some_and(u8::is_ascii_digit) {
        pos += 1;
        while pos < bytes.len() && bytes[pos].is_ascii_digit() {
            pos += 1;
        }
    }
    if matches!(bytes.get(pos), Some(b'e' | b'E')) {
        let mut exp = pos + 1;
        if matches!(bytes.get(exp), Some(b'+' | b'-')) {
            exp += 1;
        }
        if bytes.get(exp).is_some_and(u8::is_ascii_digit) {
            pos = exp;
            while pos < bytes.len() && bytes[pos].is_ascii_digit() {
                pos += 1;
            }
        }
    }
    if matches!(
        bytes.get(pos),
        Some(b'd' | b'D' | b'f' | b'F' | b'm' | b'M' | b'l' | b'L')
    ) && !bytes
        .get(pos + 1)
        .is_some_and(|b| b.is_ascii_alphanumeric() || *b == b'_')
    {
        pos += 1;
    }
    pos
}

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
mod tests {
    use super::*;

    #[test]
    fn test_tokenize_comparison() {
        let tokens = tokenize("Name eq 'blah'").unwrap();
        assert_eq!(
            tokens,
            vec![Token::Word("Name"), Token::Word("eq"), Token::Literal("'blah'")]
        );
    }

    #[test]
    fn test_tokenize_escaped_quote() {
        let tokens = tokenize("Name eq 'O''Neil'").unwrap();
        assert_eq!(tokens[2], Token::Literal("'O''Neil'"));
    }

    #[test]
    fn test_tokenize_prefixed_literals() {
        let tokens =
            tokenize("GlobalID ne guid'00000000-0000-0000-0000-000000000000' and C eq Tests.Choice'That'")
                .unwrap();
        assert_eq!(
            tokens[2],
            Token::Literal("guid'00000000-0000-0000-0000-000000000000'")
        );
        assert_eq!(tokens[6], Token::Literal("Tests.Choice'That'"));
    }

    #[test]
    fn test_tokenize_numbers_with_suffixes() {
        let tokens = tokenize("1.23d 5L -3 2.5e10 7m").unwrap();
        assert_eq!(
            tokens,
            vec![
                Token::Literal("1.23d"),
                Token::Literal("5L"),
                Token::Literal("-3"),
                Token::Literal("2.5e10"),
                Token::Literal("7m"),
            ]
        );
    }

    #[test]
    fn test_tokenize_quantifier() {
        let tokens = tokenize("Children/any(y: y/Text eq 'a')").unwrap();
        assert_eq!(tokens[0], Token::Word("Children"));
        assert_eq!(tokens[1], Token::Slash);
        assert_eq!(tokens[2], Token::Word("any"));
        assert_eq!(tokens[3], Token::LParen);
        assert_eq!(tokens[5], Token::Colon);
    }

    #[test]
    fn test_tokenize_rejects_unterminated_string() {
        assert!(tokenize("Name eq 'blah").unwrap_err().is_format());
    }

    #[test]
    fn test_tokenize_rejects_stray_character() {
        assert!(tokenize("Name eq #").is_err());
    }
}
