//! Indentation-aware tokenizer for the supported Python subset.

use crate::error::{MutationError, Result};
use num_bigint::BigInt;

#[derive(Debug, Clone, PartialEq)]
pub enum Tok {
    Name(String),
    Int(BigInt),
    Float(f64),
    Imaginary(f64),
    Str(String),
    Bytes(Vec<u8>),
    /// Full source text of an f-string literal, prefix and quotes included.
    FString(String),
    Op(&'static str),
    Newline,
    Indent,
    Dedent,
    EndOfFile,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Token {
    pub kind: Tok,
    pub line: usize,
    pub column: usize,
}

// Longest first so that `**=` wins over `**` and `*`.
const OPERATORS: &[&str] = &[
    "**=", "//=", ">>=", "<<=", "...", "->", ":=", "**", "//", "<<", ">>", "<=", ">=", "==", "!=",
    "+=", "-=", "*=", "/=", "%=", "&=", "|=", "^=", "@=", "+", "-", "*", "/", "%", "@", "&", "|",
    "^", "~", "<", ">", "(", ")", "[", "]", "{", "}", ",", ":", ".", ";", "=",
];

const STRING_PREFIXES: &[&str] = &["r", "u", "b", "f", "br", "rb", "fr", "rf"];

pub struct Lexer<'a> {
    src: &'a str,
    i: usize,
    line: usize,
    line_start: usize,
}

impl<'a> Lexer<'a> {
    pub fn new(src: &'a str) -> Self {
        let src = src.strip_prefix('\u{feff}').unwrap_or(src);
        Self {
            src,
            i: 0,
            line: 1,
            line_start: 0,
        }
    }

    fn peek(&self) -> Option<char> {
        self.src[self.i..].chars().next()
    }

    fn peek_nth(&self, n: usize) -> Option<char> {
        self.src[self.i..].chars().nth(n)
    }

    fn bump(&mut self) -> Option<char> {
        let c = self.peek()?;
        self.i += c.len_utf8();
        if c == '\n' {
            self.line += 1;
            self.line_start = self.i;
        }
        Some(c)
    }

    fn column(&self) -> usize {
        self.src[self.line_start..self.i].chars().count() + 1
    }

    fn error(&self, message: impl Into<String>) -> MutationError {
        MutationError::Parse {
            line: self.line,
            column: self.column(),
            message: message.into(),
        }
    }

    fn skip_comment(&mut self) {
        while let Some(c) = self.peek() {
            if c == '\n' {
                break;
            }
            self.bump();
        }
    }

    /// Tokenize the whole input, ending with `Newline`, pending `Dedent`s and
    /// `EndOfFile`.
    pub fn tokenize(mut self) -> Result<Vec<Token>> {
        let mut tokens: Vec<Token> = Vec::new();
        let mut indents = vec![0usize];
        let mut depth = 0usize;
        let mut at_line_start = true;

        loop {
            if at_line_start && depth == 0 {
                let mut width = 0;
                while let Some(c) = self.peek() {
                    match c {
                        ' ' => width += 1,
                        '\t' => width = (width / 8 + 1) * 8,
                        '\x0c' => width = 0,
                        _ => break,
                    }
                    self.bump();
                }
                match self.peek() {
                    None => break,
                    Some('#') => {
                        self.skip_comment();
                        continue;
                    }
                    Some('\n') | Some('\r') => {
                        self.bump();
                        continue;
                    }
                    _ => {}
                }

                let (line, column) = (self.line, self.column());
                let current = *indents.last().unwrap_or(&0);
                if width > current {
                    indents.push(width);
                    tokens.push(Token {
                        kind: Tok::Indent,
                        line,
                        column,
                    });
                } else {
                    while width < *indents.last().unwrap_or(&0) {
                        indents.pop();
                        tokens.push(Token {
                            kind: Tok::Dedent,
                            line,
                            column,
                        });
                    }
                    if width != *indents.last().unwrap_or(&0) {
                        return Err(self.error("unindent does not match any outer indentation level"));
                    }
                }
                at_line_start = false;
            }

            let Some(c) = self.peek() else { break };
            let (line, column) = (self.line, self.column());

            match c {
                ' ' | '\t' | '\x0c' | '\r' => {
                    self.bump();
                }
                '#' => self.skip_comment(),
                '\n' => {
                    self.bump();
                    if depth == 0 {
                        if !matches!(tokens.last().map(|t| &t.kind), None | Some(Tok::Newline)) {
                            tokens.push(Token {
                                kind: Tok::Newline,
                                line,
                                column,
                            });
                        }
                        at_line_start = true;
                    }
                }
                '\\' => {
                    self.bump();
                    if self.peek() == Some('\r') {
                        self.bump();
                    }
                    if self.bump() != Some('\n') {
                        return Err(self.error("unexpected character after line continuation"));
                    }
                }
                '"' | '\'' => {
                    let kind = self.lex_string(self.i, "")?;
                    tokens.push(Token { kind, line, column });
                }
                c if c.is_ascii_digit()
                    || (c == '.' && self.peek_nth(1).is_some_and(|n| n.is_ascii_digit())) =>
                {
                    let kind = self.lex_number()?;
                    tokens.push(Token { kind, line, column });
                }
                c if c == '_' || c.is_alphabetic() => {
                    let start = self.i;
                    while let Some(c) = self.peek() {
                        if c == '_' || c.is_alphanumeric() {
                            self.bump();
                        } else {
                            break;
                        }
                    }
                    let word = self.src[start..self.i].to_string();
                    let lowered = word.to_ascii_lowercase();
                    let kind = if STRING_PREFIXES.contains(&lowered.as_str())
                        && matches!(self.peek(), Some('"') | Some('\''))
                    {
                        self.lex_string(start, &lowered)?
                    } else {
                        Tok::Name(word)
                    };
                    tokens.push(Token { kind, line, column });
                }
                _ => {
                    let rest = &self.src[self.i..];
                    let Some(&op) = OPERATORS.iter().find(|op| rest.starts_with(**op)) else {
                        return Err(self.error(format!("unexpected character {:?}", c)));
                    };
                    for _ in 0..op.len() {
                        self.bump();
                    }
                    match op {
                        "(" | "[" | "{" => depth += 1,
                        ")" | "]" | "}" => depth = depth.saturating_sub(1),
                        _ => {}
                    }
                    tokens.push(Token {
                        kind: Tok::Op(op),
                        line,
                        column,
                    });
                }
            }
        }

        let (line, column) = (self.line, self.column());
        if !matches!(tokens.last().map(|t| &t.kind), None | Some(Tok::Newline)) {
            tokens.push(Token {
                kind: Tok::Newline,
                line,
                column,
            });
        }
        while indents.len() > 1 {
            indents.pop();
            tokens.push(Token {
                kind: Tok::Dedent,
                line,
                column,
            });
        }
        tokens.push(Token {
            kind: Tok::EndOfFile,
            line,
            column,
        });
        Ok(tokens)
    }

    fn take_digits(&mut self, accept: impl Fn(char) -> bool) -> String {
        let mut digits = String::new();
        while let Some(c) = self.peek() {
            if accept(c) {
                digits.push(c);
                self.bump();
            } else if c == '_' {
                self.bump();
            } else {
                break;
            }
        }
        digits
    }

    fn lex_number(&mut self) -> Result<Tok> {
        if self.peek() == Some('0') {
            let radix = match self.peek_nth(1) {
                Some('x') | Some('X') => Some(16),
                Some('o') | Some('O') => Some(8),
                Some('b') | Some('B') => Some(2),
                _ => None,
            };
            if let Some(radix) = radix {
                self.bump();
                self.bump();
                let digits = self.take_digits(|c| c.is_digit(radix));
                return BigInt::parse_bytes(digits.as_bytes(), radix)
                    .map(Tok::Int)
                    .ok_or_else(|| self.error(format!("invalid integer literal (radix {})", radix)));
            }
        }

        let mut text = self.take_digits(|c| c.is_ascii_digit());
        let mut is_float = false;
        if self.peek() == Some('.') {
            is_float = true;
            self.bump();
            text.push('.');
            text.push_str(&self.take_digits(|c| c.is_ascii_digit()));
        }
        if matches!(self.peek(), Some('e') | Some('E')) {
            let sign = self.peek_nth(1);
            let exponent_follows = match sign {
                Some('+') | Some('-') => self.peek_nth(2).is_some_and(|c| c.is_ascii_digit()),
                Some(c) => c.is_ascii_digit(),
                None => false,
            };
            if exponent_follows {
                is_float = true;
                self.bump();
                text.push('e');
                if let Some(sign @ ('+' | '-')) = sign {
                    self.bump();
                    text.push(sign);
                }
                text.push_str(&self.take_digits(|c| c.is_ascii_digit()));
            }
        }
        if text.starts_with('.') {
            text.insert(0, '0');
        }

        if matches!(self.peek(), Some('j') | Some('J')) {
            self.bump();
            return text
                .parse::<f64>()
                .map(Tok::Imaginary)
                .map_err(|_| self.error(format!("invalid imaginary literal {}", text)));
        }
        if is_float {
            text.parse::<f64>()
                .map(Tok::Float)
                .map_err(|_| self.error(format!("invalid float literal {}", text)))
        } else {
            BigInt::parse_bytes(text.as_bytes(), 10)
                .map(Tok::Int)
                .ok_or_else(|| self.error(format!("invalid integer literal {}", text)))
        }
    }

    /// Lex a string literal whose prefix (if any) starts at `start` and has
    /// already been consumed; the lexer sits on the opening quote.
    fn lex_string(&mut self, start: usize, prefix: &str) -> Result<Tok> {
        let raw = prefix.contains('r');
        let bytes = prefix.contains('b');
        let formatted = prefix.contains('f');

        let Some(quote) = self.bump() else {
            return Err(self.error("expected string quote"));
        };
        let triple = self.peek() == Some(quote) && self.peek_nth(1) == Some(quote);
        if triple {
            self.bump();
            self.bump();
        }

        let mut value = String::new();
        loop {
            let Some(c) = self.bump() else {
                return Err(self.error("unterminated string literal"));
            };
            match c {
                c if c == quote => {
                    if !triple {
                        break;
                    }
                    if self.peek() == Some(quote) && self.peek_nth(1) == Some(quote) {
                        self.bump();
                        self.bump();
                        break;
                    }
                    value.push(c);
                }
                '\n' if !triple => return Err(self.error("unterminated string literal")),
                '\\' if raw || formatted => {
                    value.push('\\');
                    if let Some(next) = self.bump() {
                        value.push(next);
                    }
                }
                '\\' => self.lex_escape(&mut value, bytes)?,
                c => {
                    if bytes && !c.is_ascii() {
                        return Err(self.error("bytes can only contain ASCII literal characters"));
                    }
                    value.push(c);
                }
            }
        }

        if formatted {
            return Ok(Tok::FString(self.src[start..self.i].to_string()));
        }
        if bytes {
            return Ok(Tok::Bytes(value.chars().map(|c| c as u32 as u8).collect()));
        }
        Ok(Tok::Str(value))
    }

    fn read_hex(&mut self, count: usize) -> Result<u32> {
        let mut value = 0u32;
        for _ in 0..count {
            let digit = self
                .bump()
                .and_then(|c| c.to_digit(16))
                .ok_or_else(|| self.error("truncated \\x, \\u or \\U escape"))?;
            value = value * 16 + digit;
        }
        Ok(value)
    }

    /// `{NAME}` of a `\N{NAME}` escape.
    fn read_char_name(&mut self) -> Result<char> {
        if self.bump() != Some('{') {
            return Err(self.error("malformed \\N character escape"));
        }
        let mut name = String::new();
        loop {
            match self.bump() {
                Some('}') => break,
                Some('\n') | None => return Err(self.error("malformed \\N character escape")),
                Some(c) => name.push(c),
            }
        }
        unicode_names2::character(&name)
            .ok_or_else(|| self.error(format!("unknown Unicode character name {}", name)))
    }

    fn lex_escape(&mut self, value: &mut String, bytes: bool) -> Result<()> {
        let Some(c) = self.bump() else {
            return Err(self.error("unterminated string literal"));
        };
        let decoded = match c {
            '\n' => return Ok(()),
            '\\' => '\\',
            '\'' => '\'',
            '"' => '"',
            'a' => '\x07',
            'b' => '\x08',
            'f' => '\x0c',
            'n' => '\n',
            'r' => '\r',
            't' => '\t',
            'v' => '\x0b',
            '0'..='7' => {
                let mut code = c.to_digit(8).unwrap_or(0);
                for _ in 0..2 {
                    match self.peek().and_then(|d| d.to_digit(8)) {
                        Some(d) => {
                            code = code * 8 + d;
                            self.bump();
                        }
                        None => break,
                    }
                }
                if bytes {
                    code &= 0xff;
                }
                char::from_u32(code).ok_or_else(|| self.error("invalid octal escape"))?
            }
            'x' => {
                let code = self.read_hex(2)?;
                char::from_u32(code).ok_or_else(|| self.error("invalid \\x escape"))?
            }
            'u' if !bytes => {
                let code = self.read_hex(4)?;
                char::from_u32(code).ok_or_else(|| self.error("invalid \\u escape"))?
            }
            'U' if !bytes => {
                let code = self.read_hex(8)?;
                char::from_u32(code).ok_or_else(|| self.error("invalid \\U escape"))?
            }
            'N' if !bytes => self.read_char_name()?,
            other => {
                // Unknown escapes keep their backslash.
                value.push('\\');
                other
            }
        };
        value.push(decoded);
        Ok(())
    }
}

pub fn tokenize(src: &str) -> Result<Vec<Token>> {
    Lexer::new(src).tokenize()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kinds(src: &str) -> Vec<Tok> {
        tokenize(src).unwrap().into_iter().map(|t| t.kind).collect()
    }

    #[test]
    fn test_indent_and_dedent() {
        let toks = kinds("def f():\n    return 1\nx\n");
        assert_eq!(
            toks,
            vec![
                Tok::Name("def".into()),
                Tok::Name("f".into()),
                Tok::Op("("),
                Tok::Op(")"),
                Tok::Op(":"),
                Tok::Newline,
                Tok::Indent,
                Tok::Name("return".into()),
                Tok::Int(1.into()),
                Tok::Newline,
                Tok::Dedent,
                Tok::Name("x".into()),
                Tok::Newline,
                Tok::EndOfFile,
            ]
        );
    }

    #[test]
    fn test_brackets_join_lines_and_comments_vanish() {
        let toks = kinds("x = (1,\n     2)  # two\n\n# alone\n");
        assert_eq!(
            toks,
            vec![
                Tok::Name("x".into()),
                Tok::Op("="),
                Tok::Op("("),
                Tok::Int(1.into()),
                Tok::Op(","),
                Tok::Int(2.into()),
                Tok::Op(")"),
                Tok::Newline,
                Tok::EndOfFile,
            ]
        );
    }

    #[test]
    fn test_numbers() {
        assert_eq!(
            kinds("0x_ff 1_000 1.5 .5 2e3 3j 0o17 0b101"),
            vec![
                Tok::Int(255.into()),
                Tok::Int(1000.into()),
                Tok::Float(1.5),
                Tok::Float(0.5),
                Tok::Float(2000.0),
                Tok::Imaginary(3.0),
                Tok::Int(15.into()),
                Tok::Int(5.into()),
                Tok::Newline,
                Tok::EndOfFile,
            ]
        );
    }

    #[test]
    fn test_integers_beyond_i64() {
        let toks = kinds("0xFFFFFFFFFFFFFFFF 10000000000000000000000");
        assert_eq!(toks[0], Tok::Int(BigInt::from(u64::MAX)));
        assert_eq!(
            toks[1],
            Tok::Int(BigInt::parse_bytes(b"10000000000000000000000", 10).unwrap())
        );
        assert!(tokenize("0x").is_err());
    }

    #[test]
    fn test_named_unicode_escape() {
        let toks = kinds(r"'\N{BULLET} \N{LATIN SMALL LETTER A}'");
        assert_eq!(toks[0], Tok::Str("\u{2022} a".into()));
        assert!(tokenize(r"'\N{NO SUCH CHARACTER NAME}'").is_err());
        assert!(tokenize(r"'\N{BULLET'").is_err());
        // bytes keep the backslash
        assert_eq!(kinds(r"b'\N'")[0], Tok::Bytes(b"\\N".to_vec()));
    }

    #[test]
    fn test_leading_bom_is_skipped() {
        let toks = kinds("\u{feff}x = 1\n");
        assert_eq!(toks[0], Tok::Name("x".into()));
        let err = tokenize("\u{feff}x = $\n").unwrap_err();
        match err {
            MutationError::Parse { line, column, .. } => assert_eq!((line, column), (1, 5)),
            other => panic!("unexpected error {:?}", other),
        }
    }

    #[test]
    fn test_strings_and_prefixes() {
        let toks = kinds(r#"'a\n' r'a\n' b'\x00' f'{x}' """tri"ple""""#);
        assert_eq!(toks[0], Tok::Str("a\n".into()));
        assert_eq!(toks[1], Tok::Str("a\\n".into()));
        assert_eq!(toks[2], Tok::Bytes(vec![0]));
        assert_eq!(toks[3], Tok::FString("f'{x}'".into()));
        assert_eq!(toks[4], Tok::Str("tri\"ple".into()));
    }

    #[test]
    fn test_longest_operator_match() {
        assert_eq!(
            kinds("a **= b // c -> d"),
            vec![
                Tok::Name("a".into()),
                Tok::Op("**="),
                Tok::Name("b".into()),
                Tok::Op("//"),
                Tok::Name("c".into()),
                Tok::Op("->"),
                Tok::Name("d".into()),
                Tok::Newline,
                Tok::EndOfFile,
            ]
        );
    }

    #[test]
    fn test_errors_carry_position() {
        let err = tokenize("x = 1\ny = $\n").unwrap_err();
        match err {
            MutationError::Parse { line, column, .. } => {
                assert_eq!(line, 2);
                assert_eq!(column, 5);
            }
            other => panic!("unexpected error {:?}", other),
        }
        assert!(tokenize("if x:\n        a\n    b\n").is_err());
        assert!(tokenize("s = 'open\n").is_err());
    }
}
