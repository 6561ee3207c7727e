use crate::script::error::ParseError;

#[derive(Debug, Clone, PartialEq)]
pub(crate) enum Tok {
    /// Integer literal without a fraction or exponent.
    Int(String),
    Float(f64),
    Str(String),
    Ident(String),
    Punct(&'static str),
    Eof,
}

#[derive(Debug, Clone, PartialEq)]
pub(crate) struct Token {
    pub tok: Tok,
    pub line: usize,
}

// Longest first so `===` wins over `==` and `=`.
const PUNCTUATION: &[&str] = &[
    "===", "!==", "==", "!=", "<=", ">=", "&&", "||", "(", ")", "{", "}", "[", "]", ",", ";",
    ":", ".", "=", "<", ">", "!", "-", "+",
];

pub(crate) fn tokenize(source: &str) -> Result<Vec<Token>, ParseError> {
    let chars: Vec<char> = source.chars().collect();
    let mut tokens = Vec::new();
    let mut pos = 0;
    let mut line = 1;

    while pos < chars.len() {
        let c = chars[pos];

        if c == '\n' {
            line += 1;
            pos += 1;
            continue;
        }
        if c.is_whitespace() {
            pos += 1;
            continue;
        }

        if c == '/' && chars.get(pos + 1) == Some(&'/') {
            while pos < chars.len() && chars[pos] != '\n' {
                pos += 1;
            }
            continue;
        }
        if c == '/' && chars.get(pos + 1) == Some(&'*') {
            let start_line = line;
            pos += 2;
            loop {
                match chars.get(pos) {
                    None => return Err(ParseError::new(start_line, "unterminated comment")),
                    Some('*') if chars.get(pos + 1) == Some(&'/') => {
                        pos += 2;
                        break;
                    }
                    Some('\n') => {
                        line += 1;
                        pos += 1;
                    }
                    Some(_) => pos += 1,
                }
            }
            continue;
        }

        let leading_dot = c == '.' && chars.get(pos + 1).is_some_and(char::is_ascii_digit);
        if c.is_ascii_digit() || leading_dot {
            let (tok, next) = number(&chars, pos, line)?;
            tokens.push(Token { tok, line });
            pos = next;
            continue;
        }

        if c == '"' || c == '\'' {
            let (text, next) = string(&chars, pos, line)?;
            tokens.push(Token {
                tok: Tok::Str(text),
                line,
            });
            pos = next;
            continue;
        }

        if is_ident_start(c) {
            let start = pos;
            while pos < chars.len() && is_ident_part(chars[pos]) {
                pos += 1;
            }
            tokens.push(Token {
                tok: Tok::Ident(chars[start..pos].iter().collect()),
                line,
            });
            continue;
        }

        let rest = &chars[pos..];
        let punct = PUNCTUATION.iter().find(|p| {
            let len = p.chars().count();
            rest.len() >= len && p.chars().zip(rest).all(|(a, b)| a == *b)
        });
        match punct {
            Some(p) => {
                pos += p.chars().count();
                tokens.push(Token {
                    tok: Tok::Punct(*p),
                    line,
                });
            }
            None => return Err(ParseError::new(line, format!("unexpected character '{c}'"))),
        }
    }

    tokens.push(Token {
        tok: Tok::Eof,
        line,
    });
    Ok(tokens)
}

fn is_ident_start(c: char) -> bool {
    c.is_alphabetic() || c == '_' || c == '$'
}

fn is_ident_part(c: char) -> bool {
    is_ident_start(c) || c.is_ascii_digit()
}

fn number(chars: &[char], start: usize, line: usize) -> Result<(Tok, usize), ParseError> {
    let mut pos = start;
    let mut is_float = false;
    while pos < chars.len() && chars[pos].is_ascii_digit() {
        pos += 1;
    }
    if chars.get(pos) == Some(&'.') && chars.get(pos + 1).is_some_and(char::is_ascii_digit) {
        is_float = true;
        pos += 1;
        while pos < chars.len() && chars[pos].is_ascii_digit() {
            pos += 1;
        }
    }
    if matches!(chars.get(pos), Some('e' | 'E')) {
        let mut exp = pos + 1;
        if matches!(chars.get(exp), Some('+' | '-')) {
            exp += 1;
        }
        if chars.get(exp).is_some_and(char::is_ascii_digit) {
            is_float = true;
            pos = exp;
            while pos < chars.len() && chars[pos].is_ascii_digit() {
                pos += 1;
            }
        }
    }
    let text: String = chars[start..pos].iter().collect();
    if is_float {
        let value = text
            .parse::<f64>()
            .map_err(|_| ParseError::new(line, format!("invalid number '{text}'")))?;
        Ok((Tok::Float(value), pos))
    } else {
        Ok((Tok::Int(text), pos))
    }
}

fn string(chars: &[char], start: usize, line: usize) -> Result<(String, usize), ParseError> {
    let quote = chars[start];
    let mut pos = start + 1;
    let mut out = String::new();
    loop {
        let Some(&c) = chars.get(pos) else {
            return Err(ParseError::new(line, "unterminated string"));
        };
        pos += 1;
        match c {
            '\n' => return Err(ParseError::new(line, "unterminated string")),
            c if c == quote => return Ok((out, pos)),
            '\\' => {
                let Some(&escaped) = chars.get(pos) else {
                    return Err(ParseError::new(line, "unterminated string"));
                };
                pos += 1;
                out.push(match escaped {
                    'n' => '\n',
                    't' => '\t',
                    'r' => '\r',
                    '0' => '\0',
                    other => other,
                });
            }
            c => out.push(c),
        }
    }
}
