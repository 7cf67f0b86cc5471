//! Token definitions for the QML lexer

use crate::common::{Position, Value};
use serde::{Deserialize, Serialize};

/// A token with its kind, literal text, converted value and source position
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Token {
    pub kind: TokenKind,
    pub text: String,
    pub value: Value,
    pub position: Position,
}

impl Token {
    pub fn new(kind: TokenKind, text: impl Into<String>, position: Position) -> Self {
        Self {
            kind,
            text: text.into(),
            value: Value::None,
            position,
        }
    }

    pub fn with_value(mut self, value: Value) -> Self {
        self.value = value;
        self
    }
}

/// Token kinds recognized by the lexer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TokenKind {
    // Literals
    Identifier,
    StringLiteral,
    BoolConstant,
    IntConstant,
    RealConstant,

    // Operators
    Assign,
    Add,
    Sub,
    Mul,
    Div,
    Mod,
    BitAnd,
    BitOr,
    BitXor,
    Shl,
    Shr,
    AddAssign,
    SubAssign,
    MulAssign,
    DivAssign,
    ModAssign,
    AndAssign,
    OrAssign,
    XorAssign,
    ShlAssign,
    ShrAssign,
    Lower,
    Greater,
    LowerEquals,
    GreaterEquals,
    Equals,
    EqualsCheck,
    NotEquals,
    NotEqualsCheck,
    LogicalAnd,
    LogicalOr,
    Not,
    NotNot,
    Increment,
    Decrement,
    Complement,
    /// `[` followed by only whitespace then `]`
    Dimension,

    // Punctuation
    LBrace,
    RBrace,
    LParen,
    RParen,
    LBracket,
    RBracket,
    Colon,
    Semicolon,
    Comma,
    Dot,
    Question,

    // Keywords
    Import,
    Property,
    Default,
    Readonly,
    Alias,
    Var,
    Function,
    If,
    Else,
    For,
    In,
    While,
    Switch,
    Case,
    Break,
    Continue,
    With,
    Return,
    Typeof,
    Pragma,
    On,
    As,
    Signal,
    New,

    /// Any byte the lexer does not recognize, passed through as itself
    Other,
    Eof,
}

impl TokenKind {
    /// Keyword lookup for an identifier-shaped token text
    pub fn keyword(text: &str) -> Option<TokenKind> {
        let kind = match text {
            "import" => TokenKind::Import,
            "property" => TokenKind::Property,
            "default" => TokenKind::Default,
            "readonly" => TokenKind::Readonly,
            "alias" => TokenKind::Alias,
            "var" => TokenKind::Var,
            "function" => TokenKind::Function,
            "if" => TokenKind::If,
            "else" => TokenKind::Else,
            "for" => TokenKind::For,
            "in" => TokenKind::In,
            "while" => TokenKind::While,
            "switch" => TokenKind::Switch,
            "case" => TokenKind::Case,
            "break" => TokenKind::Break,
            "continue" => TokenKind::Continue,
            "with" => TokenKind::With,
            "return" => TokenKind::Return,
            "typeof" => TokenKind::Typeof,
            "pragma" => TokenKind::Pragma,
            "on" => TokenKind::On,
            "as" => TokenKind::As,
            "signal" => TokenKind::Signal,
            "new" => TokenKind::New,
            _ => return None,
        };
        Some(kind)
    }

    pub fn is_keyword(&self) -> bool {
        matches!(
            self,
            TokenKind::Import
                | TokenKind::Property
                | TokenKind::Default
                | TokenKind::Readonly
                | TokenKind::Alias
                | TokenKind::Var
                | TokenKind::Function
                | TokenKind::If
                | TokenKind::Else
                | TokenKind::For
                | TokenKind::In
                | TokenKind::While
                | TokenKind::Switch
                | TokenKind::Case
                | TokenKind::Break
                | TokenKind::Continue
                | TokenKind::With
                | TokenKind::Return
                | TokenKind::Typeof
                | TokenKind::Pragma
                | TokenKind::On
                | TokenKind::As
                | TokenKind::Signal
                | TokenKind::New
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_keyword_lookup() {
        assert_eq!(TokenKind::keyword("property"), Some(TokenKind::Property));
        assert_eq!(TokenKind::keyword("signal"), Some(TokenKind::Signal));
        assert_eq!(TokenKind::keyword("Rectangle"), None);
        // Keyword matching is case-sensitive
        assert_eq!(TokenKind::keyword("Import"), None);
    }

    #[test]
    fn test_is_keyword() {
        assert!(TokenKind::Property.is_keyword());
        assert!(!TokenKind::Identifier.is_keyword());
        assert!(!TokenKind::Dimension.is_keyword());
    }
}
