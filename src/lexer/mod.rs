//! Lexer for QML and its embedded JavaScript
//!
//! A hand-written, single-pass, greedy tokenizer. Multi-character operators
//! are recognized with one or two characters of lookahead and committed via
//! pushback on the reader. Block comments nest; a depth counter tracks them.

pub mod reader;
pub mod tokens;

pub use tokens::{Token, TokenKind};

use crate::common::{Position, Value};
use crate::parser::errors::SyntaxError;
use reader::SourceReader;

/// Lex source code into tokens. The returned vector always ends with an
/// `Eof` token.
pub fn lex(source: &str) -> Result<Vec<Token>, SyntaxError> {
    let mut lexer = Lexer::new(source);
    let mut tokens = Vec::new();

    loop {
        let token = lexer.next_token()?;
        let done = token.kind == TokenKind::Eof;
        tokens.push(token);
        if done {
            return Ok(tokens);
        }
    }
}

/// Tokenizer state over one source buffer
pub struct Lexer {
    reader: SourceReader,
    text: String,
}

impl Lexer {
    pub fn new(source: &str) -> Self {
        Self {
            reader: SourceReader::new(source),
            text: String::new(),
        }
    }

    /// Scan the next token. Whitespace is any character at or below 0x20.
    pub fn next_token(&mut self) -> Result<Token, SyntaxError> {
        if !self.skip_whitespace_and_comments() {
            return Ok(Token::new(TokenKind::Eof, "", self.reader.position()));
        }

        let position = self.reader.position();
        self.text.clear();

        let c = match self.reader.get() {
            Some(c) => c,
            None => return Ok(Token::new(TokenKind::Eof, "", position)),
        };

        match c {
            '+' => Ok(self.operator(c, position, &[('+', TokenKind::Increment), ('=', TokenKind::AddAssign)], TokenKind::Add)),
            '-' => Ok(self.operator(c, position, &[('-', TokenKind::Decrement), ('=', TokenKind::SubAssign)], TokenKind::Sub)),
            '*' => Ok(self.operator(c, position, &[('=', TokenKind::MulAssign)], TokenKind::Mul)),
            '/' => Ok(self.operator(c, position, &[('=', TokenKind::DivAssign)], TokenKind::Div)),
            '%' => Ok(self.operator(c, position, &[('=', TokenKind::ModAssign)], TokenKind::Mod)),
            '^' => Ok(self.operator(c, position, &[('=', TokenKind::XorAssign)], TokenKind::BitXor)),
            '&' => Ok(self.operator(c, position, &[('&', TokenKind::LogicalAnd), ('=', TokenKind::AndAssign)], TokenKind::BitAnd)),
            '|' => Ok(self.operator(c, position, &[('|', TokenKind::LogicalOr), ('=', TokenKind::OrAssign)], TokenKind::BitOr)),
            '~' => {
                self.text.push(c);
                Ok(self.token(TokenKind::Complement, position))
            }

            '<' => {
                self.text.push(c);
                match self.reader.get() {
                    Some('=') => {
                        self.text.push('=');
                        Ok(self.token(TokenKind::LowerEquals, position))
                    }
                    Some('<') => {
                        self.text.push('<');
                        Ok(self.shift_or_assign(TokenKind::ShlAssign, TokenKind::Shl, position))
                    }
                    // Legacy: accept `<>` as `!=`
                    Some('>') => {
                        self.text.push('>');
                        Ok(self.token(TokenKind::NotEquals, position))
                    }
                    Some(d) => {
                        self.reader.unget(d);
                        Ok(self.token(TokenKind::Lower, position))
                    }
                    None => Ok(self.token(TokenKind::Lower, position)),
                }
            }

            '>' => {
                self.text.push(c);
                match self.reader.get() {
                    Some('=') => {
                        self.text.push('=');
                        Ok(self.token(TokenKind::GreaterEquals, position))
                    }
                    Some('>') => {
                        self.text.push('>');
                        Ok(self.shift_or_assign(TokenKind::ShrAssign, TokenKind::Shr, position))
                    }
                    Some(d) => {
                        self.reader.unget(d);
                        Ok(self.token(TokenKind::Greater, position))
                    }
                    None => Ok(self.token(TokenKind::Greater, position)),
                }
            }

            '=' => {
                self.text.push(c);
                match self.reader.get() {
                    Some('=') => {
                        self.text.push('=');
                        match self.reader.get() {
                            Some('=') => {
                                self.text.push('=');
                                Ok(self.token(TokenKind::EqualsCheck, position))
                            }
                            Some(e) => {
                                self.reader.unget(e);
                                Ok(self.token(TokenKind::Equals, position))
                            }
                            None => Ok(self.token(TokenKind::Equals, position)),
                        }
                    }
                    Some(d) => {
                        self.reader.unget(d);
                        Ok(self.token(TokenKind::Assign, position))
                    }
                    None => Ok(self.token(TokenKind::Assign, position)),
                }
            }

            '!' => {
                self.text.push(c);
                match self.reader.get() {
                    Some('!') => {
                        self.text.push('!');
                        Ok(self.token(TokenKind::NotNot, position))
                    }
                    Some('=') => {
                        self.text.push('=');
                        match self.reader.get() {
                            Some('=') => {
                                self.text.push('=');
                                Ok(self.token(TokenKind::NotEqualsCheck, position))
                            }
                            Some(e) => {
                                self.reader.unget(e);
                                Ok(self.token(TokenKind::NotEquals, position))
                            }
                            None => Ok(self.token(TokenKind::NotEquals, position)),
                        }
                    }
                    Some(d) => {
                        self.reader.unget(d);
                        Ok(self.token(TokenKind::Not, position))
                    }
                    None => Ok(self.token(TokenKind::Not, position)),
                }
            }

            // `[` followed by only whitespace then `]` is one dimension token
            '[' => {
                self.text.push(c);
                loop {
                    match self.reader.get() {
                        Some(d) if d > ' ' => {
                            if d == ']' {
                                self.text.push(d);
                                return Ok(self.token(TokenKind::Dimension, position));
                            }
                            self.reader.unget(d);
                            break;
                        }
                        Some(_) => {}
                        None => break,
                    }
                }
                Ok(self.token(TokenKind::LBracket, position))
            }

            '"' | '\'' => self.scan_string(c, position),

            '.' => match self.reader.get() {
                Some(d) if d.is_ascii_digit() => {
                    self.text.push('0');
                    self.text.push('.');
                    self.text.push(d);
                    self.scan_number(position, true, false)
                }
                Some(d) => {
                    self.reader.unget(d);
                    self.text.push(c);
                    Ok(self.token(TokenKind::Dot, position))
                }
                None => {
                    self.text.push(c);
                    Ok(self.token(TokenKind::Dot, position))
                }
            },

            _ if c.is_ascii_digit() => {
                if c == '0' {
                    match self.reader.get() {
                        Some(d) if d == 'x' || d == 'X' => {
                            self.text.push(c);
                            self.text.push(d);
                            return self.scan_number(position, false, true);
                        }
                        Some(d) => self.reader.unget(d),
                        None => {}
                    }
                }
                self.text.push(c);
                self.scan_number(position, false, false)
            }

            _ if c.is_ascii_alphabetic() || c == '_' || c == '$' => {
                Ok(self.scan_identifier(c, position))
            }

            '{' => Ok(self.single(c, TokenKind::LBrace, position)),
            '}' => Ok(self.single(c, TokenKind::RBrace, position)),
            '(' => Ok(self.single(c, TokenKind::LParen, position)),
            ')' => Ok(self.single(c, TokenKind::RParen, position)),
            ']' => Ok(self.single(c, TokenKind::RBracket, position)),
            ':' => Ok(self.single(c, TokenKind::Colon, position)),
            ';' => Ok(self.single(c, TokenKind::Semicolon, position)),
            ',' => Ok(self.single(c, TokenKind::Comma, position)),
            '?' => Ok(self.single(c, TokenKind::Question, position)),

            // Anything else falls through as a single-character token
            _ => Ok(self.single(c, TokenKind::Other, position)),
        }
    }

    /// Skip whitespace, line comments and nested block comments. Returns
    /// false when the end of input is reached.
    fn skip_whitespace_and_comments(&mut self) -> bool {
        let mut comment_level = 0u32;

        loop {
            let c = match self.reader.get() {
                Some(c) => c,
                None => return false,
            };

            if comment_level > 0 {
                if c == '*' {
                    match self.reader.get() {
                        Some('/') => comment_level -= 1,
                        Some(d) => self.reader.unget(d),
                        None => return false,
                    }
                } else if c == '/' {
                    match self.reader.get() {
                        Some('*') => comment_level += 1,
                        Some(d) => self.reader.unget(d),
                        None => return false,
                    }
                }
            } else if c == '/' {
                match self.reader.get() {
                    Some('*') => comment_level += 1,
                    Some('/') => {
                        // Line comment
                        loop {
                            match self.reader.get() {
                                Some('\n') => break,
                                Some(_) => {}
                                None => return false,
                            }
                        }
                    }
                    Some(d) => {
                        self.reader.unget(d);
                        self.reader.unget(c);
                        return true;
                    }
                    None => {
                        self.reader.unget(c);
                        return true;
                    }
                }
            } else if c > ' ' {
                self.reader.unget(c);
                return true;
            }
        }
    }

    fn token(&self, kind: TokenKind, position: Position) -> Token {
        Token::new(kind, self.text.clone(), position)
    }

    fn single(&mut self, c: char, kind: TokenKind, position: Position) -> Token {
        self.text.push(c);
        self.token(kind, position)
    }

    /// One-lookahead operator: `first` then any of `arms`, else `fallback`
    fn operator(
        &mut self,
        first: char,
        position: Position,
        arms: &[(char, TokenKind)],
        fallback: TokenKind,
    ) -> Token {
        self.text.push(first);
        match self.reader.get() {
            Some(d) => {
                for (ch, kind) in arms {
                    if d == *ch {
                        self.text.push(d);
                        return self.token(*kind, position);
                    }
                }
                self.reader.unget(d);
                self.token(fallback, position)
            }
            None => self.token(fallback, position),
        }
    }

    /// After `<<` or `>>`: a trailing `=` makes it a compound assignment
    fn shift_or_assign(
        &mut self,
        assign: TokenKind,
        plain: TokenKind,
        position: Position,
    ) -> Token {
        match self.reader.get() {
            Some('=') => {
                self.text.push('=');
                self.token(assign, position)
            }
            Some(e) => {
                self.reader.unget(e);
                self.token(plain, position)
            }
            None => self.token(plain, position),
        }
    }

    fn scan_string(&mut self, quote: char, position: Position) -> Result<Token, SyntaxError> {
        loop {
            let c = match self.reader.get() {
                Some(c) => c,
                None => {
                    return Err(SyntaxError::new(position, "unterminated string literal"));
                }
            };

            if c == quote {
                break;
            }

            if c == '\\' {
                let escaped = self.scan_escape(position)?;
                self.text.push(escaped);
            } else {
                self.text.push(c);
            }
        }

        let value = Value::String(self.text.clone());
        Ok(self.token(TokenKind::StringLiteral, position).with_value(value))
    }

    fn scan_escape(&mut self, start: Position) -> Result<char, SyntaxError> {
        let c = match self.reader.get() {
            Some(c) => c,
            None => return Err(SyntaxError::new(start, "unterminated string literal")),
        };

        let escaped = match c {
            '"' => '"',
            '\\' => '\\',
            'a' => '\x07',
            'b' => '\x08',
            'f' => '\x0C',
            'n' => '\n',
            'r' => '\r',
            't' => '\t',
            'v' => '\x0B',
            _ => {
                tracing::warn!("invalid escape character: '\\{}'", c);
                ' '
            }
        };

        Ok(escaped)
    }

    fn scan_number(
        &mut self,
        position: Position,
        mut is_float: bool,
        is_hex: bool,
    ) -> Result<Token, SyntaxError> {
        loop {
            let c = match self.reader.get() {
                Some(c) => c,
                None => break,
            };

            match c {
                '0'..='9' => self.text.push(c),
                'a'..='f' | 'A'..='F' => {
                    if is_hex {
                        self.text.push(c);
                    } else {
                        self.reader.unget(c);
                        break;
                    }
                }
                '.' => {
                    if !is_float && !is_hex {
                        is_float = true;
                        self.text.push(c);
                    } else {
                        self.reader.unget(c);
                        break;
                    }
                }
                _ => {
                    self.reader.unget(c);
                    break;
                }
            }
        }

        if is_float {
            let value: f64 = self
                .text
                .parse()
                .map_err(|_| SyntaxError::new(position, format!("invalid number: {}", self.text)))?;
            return Ok(self
                .token(TokenKind::RealConstant, position)
                .with_value(Value::Real(value)));
        }

        if is_hex {
            let digits = &self.text[2..];
            let value = i64::from_str_radix(digits, 16).map_err(|_| {
                SyntaxError::new(position, format!("invalid hexadecimal literal: {}", self.text))
            })?;
            return Ok(self
                .token(TokenKind::IntConstant, position)
                .with_value(Value::Int(value)));
        }

        let value: i64 = self
            .text
            .parse()
            .map_err(|_| SyntaxError::new(position, format!("invalid number: {}", self.text)))?;
        Ok(self
            .token(TokenKind::IntConstant, position)
            .with_value(Value::Int(value)))
    }

    fn scan_identifier(&mut self, first: char, position: Position) -> Token {
        self.text.push(first);

        loop {
            match self.reader.get() {
                Some(c) if c.is_ascii_alphanumeric() || c == '_' || c == '$' => {
                    self.text.push(c);
                }
                Some(c) => {
                    self.reader.unget(c);
                    break;
                }
                None => break,
            }
        }

        // `true` and `false` are matched case-insensitively, like the
        // identifier-to-keyword pass they short-circuit
        let lowered = self.text.to_ascii_lowercase();
        if lowered == "true" {
            return self
                .token(TokenKind::BoolConstant, position)
                .with_value(Value::Bool(true));
        }
        if lowered == "false" {
            return self
                .token(TokenKind::BoolConstant, position)
                .with_value(Value::Bool(false));
        }

        if let Some(keyword) = TokenKind::keyword(&self.text) {
            return self.token(keyword, position);
        }

        self.token(TokenKind::Identifier, position)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kinds(source: &str) -> Vec<TokenKind> {
        lex(source).unwrap().into_iter().map(|t| t.kind).collect()
    }

    #[test]
    fn test_lex_empty_source() {
        assert_eq!(kinds(""), vec![TokenKind::Eof]);
    }

    #[test]
    fn test_lex_operators() {
        assert_eq!(
            kinds("+ ++ += - -- -= == === != !== && || ! !!"),
            vec![
                TokenKind::Add,
                TokenKind::Increment,
                TokenKind::AddAssign,
                TokenKind::Sub,
                TokenKind::Decrement,
                TokenKind::SubAssign,
                TokenKind::Equals,
                TokenKind::EqualsCheck,
                TokenKind::NotEquals,
                TokenKind::NotEqualsCheck,
                TokenKind::LogicalAnd,
                TokenKind::LogicalOr,
                TokenKind::Not,
                TokenKind::NotNot,
                TokenKind::Eof,
            ]
        );
    }

    #[test]
    fn test_lex_shift_and_compound_assigns() {
        assert_eq!(
            kinds("<< <<= >> >>= <= >= < >"),
            vec![
                TokenKind::Shl,
                TokenKind::ShlAssign,
                TokenKind::Shr,
                TokenKind::ShrAssign,
                TokenKind::LowerEquals,
                TokenKind::GreaterEquals,
                TokenKind::Lower,
                TokenKind::Greater,
                TokenKind::Eof,
            ]
        );
    }

    #[test]
    fn test_lex_legacy_not_equals() {
        assert_eq!(kinds("a <> b")[1], TokenKind::NotEquals);
    }

    #[test]
    fn test_lex_dimension() {
        assert_eq!(kinds("[]")[0], TokenKind::Dimension);
        assert_eq!(kinds("[  \t ]")[0], TokenKind::Dimension);
        assert_eq!(
            kinds("[1]"),
            vec![
                TokenKind::LBracket,
                TokenKind::IntConstant,
                TokenKind::RBracket,
                TokenKind::Eof,
            ]
        );
    }

    #[test]
    fn test_lex_keywords_and_identifiers() {
        let tokens = lex("property int count").unwrap();
        assert_eq!(tokens[0].kind, TokenKind::Property);
        assert_eq!(tokens[1].kind, TokenKind::Identifier);
        assert_eq!(tokens[1].text, "int");
        assert_eq!(tokens[2].kind, TokenKind::Identifier);
        assert_eq!(tokens[2].text, "count");
    }

    #[test]
    fn test_lex_bool_constants_case_insensitive() {
        let tokens = lex("true False").unwrap();
        assert_eq!(tokens[0].kind, TokenKind::BoolConstant);
        assert_eq!(tokens[0].value, Value::Bool(true));
        assert_eq!(tokens[1].kind, TokenKind::BoolConstant);
        assert_eq!(tokens[1].value, Value::Bool(false));
    }

    #[test]
    fn test_lex_string_escapes() {
        let tokens = lex(r#""a\tb\"c""#).unwrap();
        assert_eq!(tokens[0].kind, TokenKind::StringLiteral);
        assert_eq!(tokens[0].value, Value::String("a\tb\"c".into()));
    }

    #[test]
    fn test_lex_unknown_escape_becomes_space() {
        let tokens = lex(r#""a\qb""#).unwrap();
        assert_eq!(tokens[0].value, Value::String("a b".into()));
    }

    #[test]
    fn test_lex_single_quoted_string() {
        let tokens = lex("'hello'").unwrap();
        assert_eq!(tokens[0].kind, TokenKind::StringLiteral);
        assert_eq!(tokens[0].value, Value::String("hello".into()));
    }

    #[test]
    fn test_lex_unterminated_string() {
        assert!(lex("\"abc").is_err());
    }

    #[test]
    fn test_lex_numbers() {
        let tokens = lex("5 2.5 .5 0x1F").unwrap();
        assert_eq!(tokens[0].value, Value::Int(5));
        assert_eq!(tokens[1].value, Value::Real(2.5));
        assert_eq!(tokens[2].value, Value::Real(0.5));
        assert_eq!(tokens[3].value, Value::Int(31));
    }

    #[test]
    fn test_lex_hex_without_digits_is_an_error() {
        assert!(lex("0x").is_err());
        assert!(lex("0xZ").is_err());
    }

    #[test]
    fn test_lex_float_promotion_stops_at_second_dot() {
        let tokens = lex("1.5.2").unwrap();
        assert_eq!(tokens[0].value, Value::Real(1.5));
        // The second dot starts a fresh leading-decimal float
        assert_eq!(tokens[1].value, Value::Real(0.2));
    }

    #[test]
    fn test_lex_line_comment() {
        assert_eq!(
            kinds("a // comment\nb"),
            vec![TokenKind::Identifier, TokenKind::Identifier, TokenKind::Eof]
        );
    }

    #[test]
    fn test_lex_nested_block_comment() {
        assert_eq!(
            kinds("a /* one /* two */ still a comment */ b"),
            vec![TokenKind::Identifier, TokenKind::Identifier, TokenKind::Eof]
        );
    }

    #[test]
    fn test_lex_token_positions() {
        let tokens = lex("a\n  b").unwrap();
        assert_eq!(tokens[0].position, crate::common::Position::new(0, 0));
        assert_eq!(tokens[1].position, crate::common::Position::new(1, 2));
    }

    #[test]
    fn test_lex_unknown_byte_is_self_token() {
        let tokens = lex("@").unwrap();
        assert_eq!(tokens[0].kind, TokenKind::Other);
        assert_eq!(tokens[0].text, "@");
    }
}
