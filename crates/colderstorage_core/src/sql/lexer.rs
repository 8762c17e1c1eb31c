//! Tokenizer.

use super::error::{SqlError, SqlResult};

#[derive(Debug, Clone, PartialEq)]
pub(super) enum Token {
    /// A bare word: keyword or identifier, original case kept.
    Word(String),
    /// A `"quoted"` identifier, never a keyword.
    Quoted(String),
    /// Unsigned numeric literal as written.
    Number(String),
    /// `'text'` literal with `''` unescaped.
    Text(String),
    /// `X'..'` literal.
    Blob(Vec<u8>),
    LParen,
    RParen,
    Comma,
    Semicolon,
    Star,
    Minus,
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
}

impl Token {
    /// Whether this is the keyword `kw`, compared case-insensitively.
    pub(super) fn is_keyword(&self, kw: &str) -> bool {
        matches!(self, Token::Word(w) if w.eq_ignore_ascii_case(kw))
    }
}

impl std::fmt::Display for Token {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Token::Word(w) => f.write_str(w),
            Token::Quoted(w) => write!(f, "\"{w}\""),
            Token::Number(n) => f.write_str(n),
            Token::Text(s) => write!(f, "'{s}'"),
            Token::Blob(_) => f.write_str("blob literal"),
            Token::LParen => f.write_str("("),
            Token::RParen => f.write_str(")"),
            Token::Comma => f.write_str(","),
            Token::Semicolon => f.write_str(";"),
            Token::Star => f.write_str("*"),
            Token::Minus => f.write_str("-"),
            Token::Eq => f.write_str("="),
            Token::Ne => f.write_str("!="),
            Token::Lt => f.write_str("<"),
            Token::Le => f.write_str("<="),
            Token::Gt => f.write_str(">"),
            Token::Ge => f.write_str(">="),
        }
    }
}

pub(super) fn tokenize(input: &str) -> SqlResult<Vec<Token>> {
    let chars: Vec<char> = input.chars().collect();
    let mut tokens = Vec::new();
    let mut i = 0;

    while i < chars.len() {
        let c = chars[i];
        match c {
            c if c.is_whitespace() => i += 1,
            '-' if chars.get(i + 1) == Some(&'-') => {
                while i < chars.len() && chars[i] != '\n' {
                    i += 1;
                }
            }
            '(' => push(&mut tokens, &mut i, Token::LParen, 1),
            ')' => push(&mut tokens, &mut i, Token::RParen, 1),
            ',' => push(&mut tokens, &mut i, Token::Comma, 1),
            ';' => push(&mut tokens, &mut i, Token::Semicolon, 1),
            '*' => push(&mut tokens, &mut i, Token::Star, 1),
            '-' => push(&mut tokens, &mut i, Token::Minus, 1),
            '=' => push(&mut tokens, &mut i, Token::Eq, 1),
            '!' if chars.get(i + 1) == Some(&'=') => push(&mut tokens, &mut i, Token::Ne, 2),
            '<' => match chars.get(i + 1) {
                Some('=') => push(&mut tokens, &mut i, Token::Le, 2),
                Some('>') => push(&mut tokens, &mut i, Token::Ne, 2),
                _ => push(&mut tokens, &mut i, Token::Lt, 1),
            },
            '>' => match chars.get(i + 1) {
                Some('=') => push(&mut tokens, &mut i, Token::Ge, 2),
                _ => push(&mut tokens, &mut i, Token::Gt, 1),
            },
            '\'' => {
                let (text, end) = quoted(&chars, i, '\'')?;
                tokens.push(Token::Text(text));
                i = end;
            }
            '"' => {
                let (ident, end) = quoted(&chars, i, '"')?;
                tokens.push(Token::Quoted(ident));
                i = end;
            }
            'x' | 'X' if chars.get(i + 1) == Some(&'\'') => {
                let (hex, end) = quoted(&chars, i + 1, '\'')?;
                tokens.push(Token::Blob(decode_hex(&hex)?));
                i = end;
            }
            c if c.is_ascii_digit() || (c == '.' && next_is_digit(&chars, i)) => {
                let end = number_end(&chars, i);
                tokens.push(Token::Number(chars[i..end].iter().collect()));
                i = end;
            }
            c if c.is_alphabetic() || c == '_' => {
                let start = i;
                while i < chars.len() && (chars[i].is_alphanumeric() || chars[i] == '_') {
                    i += 1;
                }
                tokens.push(Token::Word(chars[start..i].iter().collect()));
            }
            other => {
                return Err(SqlError::parse(format!(
                    "unexpected character '{other}' at position {i}"
                )))
            }
        }
    }
    Ok(tokens)
}

fn push(tokens: &mut Vec<Token>, i: &mut usize, token: Token, width: usize) {
    tokens.push(token);
    *i += width;
}

fn next_is_digit(chars: &[char], i: usize) -> bool {
    chars.get(i + 1).is_some_and(char::is_ascii_digit)
}

/// Reads a literal opened by `quote` at `start`; a doubled quote escapes it.
fn quoted(chars: &[char], start: usize, quote: char) -> SqlResult<(String, usize)> {
    let mut out = String::new();
    let mut i = start + 1;
    loop {
        match chars.get(i) {
            None => return Err(SqlError::parse("unterminated quoted literal")),
            Some(&c) if c == quote => {
                if chars.get(i + 1) == Some(&quote) {
                    out.push(quote);
                    i += 2;
                } else {
                    return Ok((out, i + 1));
                }
            }
            Some(&c) => {
                out.push(c);
                i += 1;
            }
        }
    }
}

/// End of a number starting at `start`: digits, an optional fraction and an
/// optional exponent.
fn number_end(chars: &[char], start: usize) -> usize {
    let digits = |mut i: usize| {
        while i < chars.len() && chars[i].is_ascii_digit() {
            i += 1;
        }
        i
    };

    let mut i = digits(start);
    if chars.get(i) == Some(&'.') {
        i = digits(i + 1);
    }
    if matches!(chars.get(i), Some('e' | 'E')) {
        let mut j = i + 1;
        if matches!(chars.get(j), Some('+' | '-')) {
            j += 1;
        }
        if chars.get(j).is_some_and(char::is_ascii_digit) {
            i = digits(j);
        }
    }
    i
}

fn decode_hex(hex: &str) -> SqlResult<Vec<u8>> {
    if hex.len() % 2 != 0 {
        return Err(SqlError::parse("blob literal needs an even number of hex digits"));
    }
    let digits: Vec<u32> = hex
        .chars()
        .map(|c| c.to_digit(16))
        .collect::<Option<_>>()
        .ok_or_else(|| SqlError::parse(format!("invalid hex digit in X'{hex}'")))?;
    Ok(digits
        .chunks(2)
        .map(|pair| ((pair[0] << 4) | pair[1]) as u8)
        .collect())
}
