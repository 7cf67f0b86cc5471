//! Parser for QML files and their embedded JavaScript
//!
//! A recursive descent parser over the token stream. It accepts QML files
//! (optional pragmas, imports, one top-level item) and plain JavaScript
//! files (a free statement sequence), with the usual JavaScript expression
//! precedence. Parser actions allocate entities into the file's arena and
//! adopt child ownership as they go.
//!
//! On the first syntax error the file is abandoned; no partial tree is
//! returned.

pub mod errors;

use crate::ast::{
    Arena, BinaryOperator, ComplexShape, EntityId, EntityKind, File, PropertyType, UnaryOperator,
};
use crate::common::Position;
use crate::lexer::{self, Token, TokenKind};
use errors::SyntaxError;
use std::path::Path;

/// Lex and parse one source buffer into a `File`
pub fn parse_source(source: &str, path: &Path) -> Result<File, SyntaxError> {
    let tokens = lexer::lex(source)?;
    let is_js = path.extension().is_some_and(|ext| ext == "js");

    let mut parser = Parser::new(&tokens, is_js);
    let contents = parser.parse_program()?;

    let mut file = File::new(path.to_path_buf());
    file.arena = parser.arena;
    file.contents = contents;
    file.parsed = true;
    Ok(file)
}

/// Parser state
pub struct Parser<'a> {
    tokens: &'a [Token],
    pos: usize,
    arena: Arena,
    is_js: bool,
}

impl<'a> Parser<'a> {
    pub fn new(tokens: &'a [Token], is_js: bool) -> Self {
        Self {
            tokens,
            pos: 0,
            arena: Arena::new(),
            is_js,
        }
    }

    fn current(&self) -> &Token {
        self.tokens.get(self.pos).unwrap_or_else(|| {
            self.tokens
                .last()
                .expect("token stream should end with Eof")
        })
    }

    fn peek(&self) -> TokenKind {
        self.current().kind
    }

    fn peek_n(&self, n: usize) -> TokenKind {
        self.tokens
            .get(self.pos + n)
            .map(|t| t.kind)
            .unwrap_or(TokenKind::Eof)
    }

    fn at(&self, kind: TokenKind) -> bool {
        self.peek() == kind
    }

    fn position(&self) -> Position {
        self.current().position
    }

    fn advance(&mut self) -> Token {
        let token = self.current().clone();
        if self.pos < self.tokens.len() {
            self.pos += 1;
        }
        token
    }

    fn eat(&mut self, kind: TokenKind) -> bool {
        if self.at(kind) {
            self.advance();
            return true;
        }
        false
    }

    fn expect(&mut self, kind: TokenKind) -> Result<Token, SyntaxError> {
        if self.at(kind) {
            Ok(self.advance())
        } else {
            Err(SyntaxError::new(
                self.position(),
                format!("expected {:?}, found '{}'", kind, self.current().text),
            ))
        }
    }

    fn alloc(&mut self, kind: EntityKind, position: Position) -> EntityId {
        self.arena.alloc(kind, position)
    }

    // ==================== FILE ====================

    /// A file: pragmas, imports, then one top-level item (QML) or a free
    /// statement sequence (JavaScript)
    pub fn parse_program(&mut self) -> Result<Vec<EntityId>, SyntaxError> {
        let mut contents = Vec::new();

        while self.at(TokenKind::Pragma) {
            contents.push(self.parse_pragma()?);
        }
        while self.at(TokenKind::Import) {
            contents.push(self.parse_import()?);
        }

        if self.is_js {
            while !self.at(TokenKind::Eof) {
                if self.eat(TokenKind::Semicolon) {
                    continue;
                }
                contents.push(self.parse_statement()?);
            }
        } else {
            if !self.at(TokenKind::Eof) {
                contents.push(self.parse_item()?);
            }
            if !self.at(TokenKind::Eof) {
                return Err(SyntaxError::new(
                    self.position(),
                    format!(
                        "expected end of file after top-level item, found '{}'",
                        self.current().text
                    ),
                ));
            }
        }

        Ok(contents)
    }

    fn parse_pragma(&mut self) -> Result<EntityId, SyntaxError> {
        let position = self.position();
        self.expect(TokenKind::Pragma)?;
        let name_token = self.expect(TokenKind::Identifier)?;
        let name = self.alloc(
            EntityKind::Identifier(name_token.text),
            name_token.position,
        );
        self.eat(TokenKind::Semicolon);
        Ok(self.alloc(EntityKind::Pragma { name }, position))
    }

    fn parse_import(&mut self) -> Result<EntityId, SyntaxError> {
        let position = self.position();
        self.expect(TokenKind::Import)?;

        let name = if self.at(TokenKind::StringLiteral) {
            let token = self.advance();
            self.alloc(EntityKind::Literal(token.value), token.position)
        } else {
            let (text, name_position) = self.parse_dotted_name()?;
            self.alloc(EntityKind::Identifier(text), name_position)
        };

        let version = if self.at(TokenKind::RealConstant) || self.at(TokenKind::IntConstant) {
            let token = self.advance();
            Some(self.alloc(EntityKind::Literal(token.value), token.position))
        } else {
            None
        };

        let alias = if self.eat(TokenKind::As) {
            let token = self.expect(TokenKind::Identifier)?;
            Some(self.alloc(EntityKind::Identifier(token.text), token.position))
        } else {
            None
        };

        self.eat(TokenKind::Semicolon);
        Ok(self.alloc(
            EntityKind::Import {
                name,
                version,
                alias,
            },
            position,
        ))
    }

    /// `a` or `a.b.c`, joined into one name
    fn parse_dotted_name(&mut self) -> Result<(String, Position), SyntaxError> {
        let first = self.expect(TokenKind::Identifier)?;
        let position = first.position;
        let mut text = first.text;

        while self.at(TokenKind::Dot) && self.peek_n(1) == TokenKind::Identifier {
            self.advance();
            let part = self.expect(TokenKind::Identifier)?;
            text.push('.');
            text.push_str(&part.text);
        }

        Ok((text, position))
    }

    // ==================== ITEMS ====================

    fn parse_item(&mut self) -> Result<EntityId, SyntaxError> {
        let (text, position) = self.parse_dotted_name()?;
        let name = self.alloc(EntityKind::Identifier(text), position);
        self.parse_item_body(name, position)
    }

    fn parse_item_body(
        &mut self,
        name: EntityId,
        position: Position,
    ) -> Result<EntityId, SyntaxError> {
        self.expect(TokenKind::LBrace)?;
        let mut children = Vec::new();

        while !self.at(TokenKind::RBrace) && !self.at(TokenKind::Eof) {
            if self.eat(TokenKind::Semicolon) {
                continue;
            }
            children.push(self.parse_item_child()?);
        }

        self.expect(TokenKind::RBrace)?;
        Ok(self.alloc(EntityKind::Item { name, children }, position))
    }

    fn parse_item_child(&mut self) -> Result<EntityId, SyntaxError> {
        match self.peek() {
            TokenKind::Default | TokenKind::Readonly | TokenKind::Property => {
                self.parse_property_declaration()
            }
            TokenKind::Signal => self.parse_signal(),
            TokenKind::Function => self.parse_function(false),
            TokenKind::Identifier => self.parse_item_member(),
            _ => Err(SyntaxError::new(
                self.position(),
                format!("unexpected '{}' in item body", self.current().text),
            )),
        }
    }

    fn parse_property_declaration(&mut self) -> Result<EntityId, SyntaxError> {
        let position = self.position();
        let mut is_default = false;
        let mut is_readonly = false;

        loop {
            if self.eat(TokenKind::Default) {
                is_default = true;
            } else if self.eat(TokenKind::Readonly) {
                is_readonly = true;
            } else {
                break;
            }
        }

        self.expect(TokenKind::Property)?;

        // `property alias name: dotted.path`
        if self.eat(TokenKind::Alias) {
            let name_token = self.expect(TokenKind::Identifier)?;
            let name = self.alloc(
                EntityKind::Identifier(name_token.text),
                name_token.position,
            );
            self.expect(TokenKind::Colon)?;
            let content = self.parse_expression()?;
            self.eat(TokenKind::Semicolon);
            return Ok(self.alloc(EntityKind::PropertyAlias { name, content }, position));
        }

        let ty_token = if self.at(TokenKind::Var) {
            self.advance()
        } else {
            self.expect(TokenKind::Identifier)?
        };
        let mut ty = PropertyType::from_name(&ty_token.text);
        if self.eat(TokenKind::Dimension) {
            ty = PropertyType::List(Box::new(ty));
        }
        let ty = self.alloc(EntityKind::Type(ty), ty_token.position);

        let name_token = self.expect(TokenKind::Identifier)?;
        let name = self.alloc(
            EntityKind::Identifier(name_token.text),
            name_token.position,
        );

        let content = if self.eat(TokenKind::Colon) {
            Some(self.parse_property_content()?)
        } else {
            None
        };

        self.eat(TokenKind::Semicolon);
        Ok(self.alloc(
            EntityKind::PropertyDeclaration {
                ty,
                name,
                content,
                is_default,
                is_readonly,
            },
            position,
        ))
    }

    fn parse_signal(&mut self) -> Result<EntityId, SyntaxError> {
        let position = self.position();
        self.expect(TokenKind::Signal)?;

        let name_token = self.expect(TokenKind::Identifier)?;
        let name = self.alloc(
            EntityKind::Identifier(name_token.text),
            name_token.position,
        );

        let mut parameters = Vec::new();
        if self.eat(TokenKind::LParen) {
            while !self.at(TokenKind::RParen) {
                // `int a` or bare `a`
                let first = self.expect(TokenKind::Identifier)?;
                let param = if self.at(TokenKind::Identifier) {
                    let second = self.advance();
                    self.alloc(EntityKind::Identifier(second.text), second.position)
                } else {
                    self.alloc(EntityKind::Identifier(first.text), first.position)
                };
                parameters.push(param);

                if !self.eat(TokenKind::Comma) {
                    break;
                }
            }
            self.expect(TokenKind::RParen)?;
        }

        let parameters = self.alloc(
            EntityKind::Complex {
                name: None,
                children: parameters,
                shape: ComplexShape::Parameters,
            },
            position,
        );
        self.eat(TokenKind::Semicolon);
        Ok(self.alloc(EntityKind::Signal { name, parameters }, position))
    }

    fn parse_function(&mut self, anonymous: bool) -> Result<EntityId, SyntaxError> {
        let position = self.position();
        self.expect(TokenKind::Function)?;

        let name = if self.at(TokenKind::Identifier) {
            let token = self.advance();
            Some(self.alloc(EntityKind::Identifier(token.text), token.position))
        } else if anonymous {
            None
        } else {
            let found = self.current().text.clone();
            return Err(SyntaxError::new(
                self.position(),
                format!("expected function name, found '{}'", found),
            ));
        };

        self.expect(TokenKind::LParen)?;
        let mut parameters = Vec::new();
        while self.at(TokenKind::Identifier) {
            let token = self.advance();
            parameters.push(self.alloc(EntityKind::Identifier(token.text), token.position));
            if !self.eat(TokenKind::Comma) {
                break;
            }
        }
        self.expect(TokenKind::RParen)?;

        let parameters = self.alloc(
            EntityKind::Complex {
                name: None,
                children: parameters,
                shape: ComplexShape::Parameters,
            },
            position,
        );
        let content = self.parse_block()?;

        Ok(self.alloc(
            EntityKind::Function {
                name,
                parameters,
                content,
            },
            position,
        ))
    }

    /// An item-body line starting with an identifier: a nested item, an
    /// `X on y { … }` decoration, or a (possibly dotted) property
    /// assignment.
    fn parse_item_member(&mut self) -> Result<EntityId, SyntaxError> {
        let (text, position) = self.parse_dotted_name()?;
        let name = self.alloc(EntityKind::Identifier(text), position);

        if self.eat(TokenKind::On) {
            let target_token = self.expect(TokenKind::Identifier)?;
            let target = self.alloc(
                EntityKind::Identifier(target_token.text),
                target_token.position,
            );
            let item = self.parse_item_body(name, position)?;
            return Ok(self.alloc(
                EntityKind::PropertyAssignment {
                    name: target,
                    content: item,
                },
                position,
            ));
        }

        if self.at(TokenKind::LBrace) {
            return self.parse_item_body(name, position);
        }

        self.expect(TokenKind::Colon)?;
        let content = self.parse_property_content()?;
        self.eat(TokenKind::Semicolon);
        Ok(self.alloc(EntityKind::PropertyAssignment { name, content }, position))
    }

    /// The right-hand side of a binding: an inline item, a script block or
    /// an expression
    fn parse_property_content(&mut self) -> Result<EntityId, SyntaxError> {
        if self.at(TokenKind::Identifier) && self.peek_n(1) == TokenKind::LBrace {
            return self.parse_item();
        }
        if self.at(TokenKind::LBrace) {
            return self.parse_block();
        }
        self.parse_expression()
    }

    // ==================== STATEMENTS ====================

    fn parse_block(&mut self) -> Result<EntityId, SyntaxError> {
        let position = self.position();
        self.expect(TokenKind::LBrace)?;

        let mut children = Vec::new();
        while !self.at(TokenKind::RBrace) && !self.at(TokenKind::Eof) {
            if self.eat(TokenKind::Semicolon) {
                continue;
            }
            children.push(self.parse_statement()?);
        }

        self.expect(TokenKind::RBrace)?;
        Ok(self.alloc(
            EntityKind::Complex {
                name: None,
                children,
                shape: ComplexShape::Block,
            },
            position,
        ))
    }

    fn parse_statement(&mut self) -> Result<EntityId, SyntaxError> {
        match self.peek() {
            TokenKind::LBrace => self.parse_block(),
            TokenKind::If => self.parse_if(),
            TokenKind::For => self.parse_for(),
            TokenKind::While => self.parse_while(),
            TokenKind::Switch => self.parse_switch(),
            TokenKind::With => self.parse_with(),
            TokenKind::Var => {
                let statement = self.parse_var_statement()?;
                self.eat(TokenKind::Semicolon);
                Ok(statement)
            }
            TokenKind::Function => self.parse_function(false),
            TokenKind::Break => {
                let position = self.position();
                self.advance();
                self.eat(TokenKind::Semicolon);
                Ok(self.alloc(EntityKind::Break, position))
            }
            TokenKind::Continue => {
                let position = self.position();
                self.advance();
                self.eat(TokenKind::Semicolon);
                Ok(self.alloc(EntityKind::Continue, position))
            }
            TokenKind::Return => {
                let position = self.position();
                self.advance();
                let expression = if self.statement_ended() {
                    None
                } else {
                    Some(self.parse_expression()?)
                };
                self.eat(TokenKind::Semicolon);
                Ok(self.alloc(EntityKind::Return { expression }, position))
            }
            _ => {
                let expression = self.parse_expression()?;
                self.eat(TokenKind::Semicolon);
                Ok(expression)
            }
        }
    }

    fn statement_ended(&self) -> bool {
        matches!(
            self.peek(),
            TokenKind::Semicolon
                | TokenKind::RBrace
                | TokenKind::Else
                | TokenKind::Case
                | TokenKind::Default
                | TokenKind::Eof
        )
    }

    fn parse_if(&mut self) -> Result<EntityId, SyntaxError> {
        let position = self.position();
        self.expect(TokenKind::If)?;
        self.expect(TokenKind::LParen)?;
        let condition = self.parse_expression()?;
        self.expect(TokenKind::RParen)?;

        let then_branch = if self.at(TokenKind::Else) {
            None
        } else {
            Some(self.parse_statement()?)
        };
        let else_branch = if self.eat(TokenKind::Else) {
            Some(self.parse_statement()?)
        } else {
            None
        };

        Ok(self.alloc(
            EntityKind::If {
                condition,
                then_branch,
                else_branch,
            },
            position,
        ))
    }

    fn parse_for(&mut self) -> Result<EntityId, SyntaxError> {
        let position = self.position();
        self.expect(TokenKind::For)?;
        self.expect(TokenKind::LParen)?;

        // for (var x in e) / for (x in e)
        let for_in_var = self.at(TokenKind::Var)
            && self.peek_n(1) == TokenKind::Identifier
            && self.peek_n(2) == TokenKind::In;
        let for_in_plain =
            self.at(TokenKind::Identifier) && self.peek_n(1) == TokenKind::In;

        if for_in_var || for_in_plain {
            let variable = if for_in_var {
                let var_position = self.position();
                self.advance();
                let token = self.expect(TokenKind::Identifier)?;
                let name = self.alloc(EntityKind::Identifier(token.text), token.position);
                self.alloc(
                    EntityKind::VariableDeclaration {
                        name,
                        content: None,
                    },
                    var_position,
                )
            } else {
                let token = self.expect(TokenKind::Identifier)?;
                self.alloc(EntityKind::Identifier(token.text), token.position)
            };

            self.expect(TokenKind::In)?;
            let expression = self.parse_expression()?;
            self.expect(TokenKind::RParen)?;
            let content = self.parse_loop_body()?;

            return Ok(self.alloc(
                EntityKind::ForIn {
                    variable,
                    expression,
                    content,
                },
                position,
            ));
        }

        let initialization = if self.at(TokenKind::Semicolon) {
            None
        } else if self.at(TokenKind::Var) {
            Some(self.parse_var_statement()?)
        } else {
            Some(self.parse_expression()?)
        };
        self.expect(TokenKind::Semicolon)?;

        let condition = if self.at(TokenKind::Semicolon) {
            None
        } else {
            Some(self.parse_expression()?)
        };
        self.expect(TokenKind::Semicolon)?;

        let incrementation = if self.at(TokenKind::RParen) {
            None
        } else {
            Some(self.parse_expression()?)
        };
        self.expect(TokenKind::RParen)?;

        let content = self.parse_loop_body()?;
        Ok(self.alloc(
            EntityKind::For {
                initialization,
                condition,
                incrementation,
                content,
            },
            position,
        ))
    }

    fn parse_loop_body(&mut self) -> Result<Option<EntityId>, SyntaxError> {
        if self.eat(TokenKind::Semicolon) {
            return Ok(None);
        }
        Ok(Some(self.parse_statement()?))
    }

    fn parse_while(&mut self) -> Result<EntityId, SyntaxError> {
        let position = self.position();
        self.expect(TokenKind::While)?;
        self.expect(TokenKind::LParen)?;
        let condition = self.parse_expression()?;
        self.expect(TokenKind::RParen)?;
        let content = self.parse_loop_body()?;

        Ok(self.alloc(EntityKind::While { condition, content }, position))
    }

    fn parse_switch(&mut self) -> Result<EntityId, SyntaxError> {
        let position = self.position();
        self.expect(TokenKind::Switch)?;
        self.expect(TokenKind::LParen)?;
        let expression = self.parse_expression()?;
        self.expect(TokenKind::RParen)?;
        self.expect(TokenKind::LBrace)?;

        let mut cases = Vec::new();
        while !self.at(TokenKind::RBrace) && !self.at(TokenKind::Eof) {
            let case_position = self.position();
            let value = if self.eat(TokenKind::Case) {
                let value = self.parse_expression()?;
                Some(value)
            } else if self.eat(TokenKind::Default) {
                None
            } else {
                return Err(SyntaxError::new(
                    self.position(),
                    format!("expected 'case' or 'default', found '{}'", self.current().text),
                ));
            };
            self.expect(TokenKind::Colon)?;

            let mut body = Vec::new();
            while !matches!(
                self.peek(),
                TokenKind::Case | TokenKind::Default | TokenKind::RBrace | TokenKind::Eof
            ) {
                if self.eat(TokenKind::Semicolon) {
                    continue;
                }
                body.push(self.parse_statement()?);
            }
            let content = self.alloc(
                EntityKind::Complex {
                    name: None,
                    children: body,
                    shape: ComplexShape::Block,
                },
                case_position,
            );

            cases.push(self.alloc(EntityKind::SwitchCase { value, content }, case_position));
        }
        self.expect(TokenKind::RBrace)?;

        let cases = self.alloc(
            EntityKind::Complex {
                name: None,
                children: cases,
                shape: ComplexShape::Cases,
            },
            position,
        );
        Ok(self.alloc(EntityKind::Switch { expression, cases }, position))
    }

    fn parse_with(&mut self) -> Result<EntityId, SyntaxError> {
        let position = self.position();
        self.expect(TokenKind::With)?;
        self.expect(TokenKind::LParen)?;
        let expression = self.parse_expression()?;
        self.expect(TokenKind::RParen)?;
        let content = self.parse_statement()?;

        Ok(self.alloc(
            EntityKind::With {
                expression,
                content,
            },
            position,
        ))
    }

    /// `var a = 1` or `var a = 1, b, c = 2` (wrapped in a block when there
    /// is more than one declarator)
    fn parse_var_statement(&mut self) -> Result<EntityId, SyntaxError> {
        let position = self.position();
        self.expect(TokenKind::Var)?;

        let mut declarations = Vec::new();
        loop {
            let var_position = if declarations.is_empty() {
                position
            } else {
                self.position()
            };
            let token = self.expect(TokenKind::Identifier)?;
            let name = self.alloc(EntityKind::Identifier(token.text), token.position);
            let content = if self.eat(TokenKind::Assign) {
                Some(self.parse_expression()?)
            } else {
                None
            };
            declarations.push(self.alloc(
                EntityKind::VariableDeclaration { name, content },
                var_position,
            ));

            if !self.eat(TokenKind::Comma) {
                break;
            }
        }

        if declarations.len() == 1 {
            return Ok(declarations[0]);
        }
        Ok(self.alloc(
            EntityKind::Complex {
                name: None,
                children: declarations,
                shape: ComplexShape::Block,
            },
            position,
        ))
    }

    // ==================== EXPRESSIONS ====================

    pub fn parse_expression(&mut self) -> Result<EntityId, SyntaxError> {
        let left = self.parse_conditional()?;
        let position = self.arena[left].position;

        let compound = match self.peek() {
            TokenKind::Assign => None,
            TokenKind::AddAssign => Some(BinaryOperator::Add),
            TokenKind::SubAssign => Some(BinaryOperator::Sub),
            TokenKind::MulAssign => Some(BinaryOperator::Mul),
            TokenKind::DivAssign => Some(BinaryOperator::Div),
            TokenKind::ModAssign => Some(BinaryOperator::Mod),
            TokenKind::AndAssign => Some(BinaryOperator::And),
            TokenKind::OrAssign => Some(BinaryOperator::Or),
            TokenKind::XorAssign => Some(BinaryOperator::Xor),
            TokenKind::ShlAssign => Some(BinaryOperator::Shl),
            TokenKind::ShrAssign => Some(BinaryOperator::Shr),
            _ => return Ok(left),
        };

        self.advance();
        let right = self.parse_expression()?;

        // Compound assignments desugar into the closed operator set
        let right = match compound {
            Some(op) => {
                let left_copy = self.arena.clone_subtree(left);
                self.alloc(
                    EntityKind::BinaryOperation {
                        op,
                        left: left_copy,
                        right,
                    },
                    position,
                )
            }
            None => right,
        };

        Ok(self.alloc(
            EntityKind::BinaryOperation {
                op: BinaryOperator::Assign,
                left,
                right,
            },
            position,
        ))
    }

    fn parse_conditional(&mut self) -> Result<EntityId, SyntaxError> {
        let condition = self.parse_binary(0)?;

        if self.eat(TokenKind::Question) {
            let position = self.arena[condition].position;
            let then_branch = self.parse_expression()?;
            self.expect(TokenKind::Colon)?;
            let else_branch = self.parse_expression()?;
            return Ok(self.alloc(
                EntityKind::Conditional {
                    condition,
                    then_branch,
                    else_branch,
                },
                position,
            ));
        }

        Ok(condition)
    }

    /// Left-associative binary levels, loosest first
    fn parse_binary(&mut self, level: usize) -> Result<EntityId, SyntaxError> {
        const LEVELS: &[&[(TokenKind, BinaryOperator)]] = &[
            &[(TokenKind::LogicalOr, BinaryOperator::LogicOr)],
            &[(TokenKind::LogicalAnd, BinaryOperator::LogicAnd)],
            &[(TokenKind::BitOr, BinaryOperator::Or)],
            &[(TokenKind::BitXor, BinaryOperator::Xor)],
            &[(TokenKind::BitAnd, BinaryOperator::And)],
            &[
                (TokenKind::Equals, BinaryOperator::Equals),
                (TokenKind::EqualsCheck, BinaryOperator::EqualsCheck),
                (TokenKind::NotEquals, BinaryOperator::NotEquals),
                (TokenKind::NotEqualsCheck, BinaryOperator::NotEqualsCheck),
            ],
            &[
                (TokenKind::Lower, BinaryOperator::Lower),
                (TokenKind::LowerEquals, BinaryOperator::LowerEquals),
                (TokenKind::Greater, BinaryOperator::Greater),
                (TokenKind::GreaterEquals, BinaryOperator::GreaterEquals),
            ],
            &[
                (TokenKind::Shl, BinaryOperator::Shl),
                (TokenKind::Shr, BinaryOperator::Shr),
            ],
            &[
                (TokenKind::Add, BinaryOperator::Add),
                (TokenKind::Sub, BinaryOperator::Sub),
            ],
            &[
                (TokenKind::Mul, BinaryOperator::Mul),
                (TokenKind::Div, BinaryOperator::Div),
                (TokenKind::Mod, BinaryOperator::Mod),
            ],
        ];

        if level >= LEVELS.len() {
            return self.parse_unary();
        }

        let mut left = self.parse_binary(level + 1)?;

        loop {
            let op = LEVELS[level]
                .iter()
                .find(|(kind, _)| self.at(*kind))
                .map(|(_, op)| *op);

            let Some(op) = op else {
                return Ok(left);
            };
            self.advance();

            let position = self.arena[left].position;
            let right = self.parse_binary(level + 1)?;
            left = self.alloc(EntityKind::BinaryOperation { op, left, right }, position);
        }
    }

    fn parse_unary(&mut self) -> Result<EntityId, SyntaxError> {
        let op = match self.peek() {
            TokenKind::Not => Some(UnaryOperator::Not),
            TokenKind::NotNot => Some(UnaryOperator::NotNot),
            TokenKind::Complement => Some(UnaryOperator::Complement),
            TokenKind::Sub => Some(UnaryOperator::Minus),
            TokenKind::Add => Some(UnaryOperator::Plus),
            TokenKind::Increment => Some(UnaryOperator::Increment),
            TokenKind::Decrement => Some(UnaryOperator::Decrement),
            TokenKind::Typeof => Some(UnaryOperator::Typeof),
            _ => None,
        };

        if let Some(op) = op {
            let position = self.position();
            self.advance();
            let operand = self.parse_unary()?;
            return Ok(self.alloc(
                EntityKind::UnaryOperation {
                    op,
                    operand,
                    prefix: true,
                },
                position,
            ));
        }

        if self.at(TokenKind::New) {
            let position = self.position();
            self.advance();
            let content = self.parse_postfix()?;
            return Ok(self.alloc(EntityKind::NewOperation { content }, position));
        }

        self.parse_postfix()
    }

    fn parse_postfix(&mut self) -> Result<EntityId, SyntaxError> {
        let mut expression = self.parse_primary()?;

        loop {
            match self.peek() {
                TokenKind::Dot => {
                    self.advance();
                    let token = self.expect(TokenKind::Identifier)?;
                    let member = self.alloc(EntityKind::Identifier(token.text), token.position);
                    let position = self.arena[expression].position;
                    expression = self.alloc(
                        EntityKind::MemberAccess {
                            object: expression,
                            member,
                        },
                        position,
                    );
                }
                TokenKind::LParen => {
                    let position = self.arena[expression].position;
                    self.advance();
                    let mut arguments = Vec::new();
                    while !self.at(TokenKind::RParen) {
                        arguments.push(self.parse_expression()?);
                        if !self.eat(TokenKind::Comma) {
                            break;
                        }
                    }
                    self.expect(TokenKind::RParen)?;
                    let parameters = self.alloc(
                        EntityKind::Complex {
                            name: None,
                            children: arguments,
                            shape: ComplexShape::Parameters,
                        },
                        position,
                    );
                    expression = self.alloc(
                        EntityKind::FunctionCall {
                            name: expression,
                            parameters,
                        },
                        position,
                    );
                }
                TokenKind::LBracket => {
                    let position = self.arena[expression].position;
                    self.advance();
                    let index = self.parse_expression()?;
                    self.expect(TokenKind::RBracket)?;
                    expression = self.alloc(
                        EntityKind::ArrayAccess {
                            content: expression,
                            expression: index,
                        },
                        position,
                    );
                }
                TokenKind::Increment | TokenKind::Decrement => {
                    let op = if self.at(TokenKind::Increment) {
                        UnaryOperator::Increment
                    } else {
                        UnaryOperator::Decrement
                    };
                    let position = self.arena[expression].position;
                    self.advance();
                    expression = self.alloc(
                        EntityKind::UnaryOperation {
                            op,
                            operand: expression,
                            prefix: false,
                        },
                        position,
                    );
                }
                _ => return Ok(expression),
            }
        }
    }

    fn parse_primary(&mut self) -> Result<EntityId, SyntaxError> {
        match self.peek() {
            TokenKind::Identifier => {
                let token = self.advance();
                Ok(self.alloc(EntityKind::Identifier(token.text), token.position))
            }
            TokenKind::IntConstant
            | TokenKind::RealConstant
            | TokenKind::StringLiteral
            | TokenKind::BoolConstant => {
                let token = self.advance();
                Ok(self.alloc(EntityKind::Literal(token.value), token.position))
            }
            TokenKind::LParen => {
                self.advance();
                let expression = self.parse_expression()?;
                self.expect(TokenKind::RParen)?;
                self.arena[expression].parenthesized = true;
                Ok(expression)
            }
            TokenKind::LBracket => {
                let position = self.position();
                self.advance();
                let mut elements = Vec::new();
                while !self.at(TokenKind::RBracket) {
                    elements.push(self.parse_array_element()?);
                    if !self.eat(TokenKind::Comma) {
                        break;
                    }
                }
                self.expect(TokenKind::RBracket)?;
                Ok(self.alloc(
                    EntityKind::Complex {
                        name: None,
                        children: elements,
                        shape: ComplexShape::Array,
                    },
                    position,
                ))
            }
            // `[]` with nothing but whitespace inside lexes as one token
            TokenKind::Dimension => {
                let position = self.position();
                self.advance();
                Ok(self.alloc(
                    EntityKind::Complex {
                        name: None,
                        children: Vec::new(),
                        shape: ComplexShape::Array,
                    },
                    position,
                ))
            }
            TokenKind::LBrace => {
                let position = self.position();
                self.advance();
                let mut properties = Vec::new();
                while !self.at(TokenKind::RBrace) {
                    let key = match self.peek() {
                        TokenKind::Identifier => {
                            let token = self.advance();
                            self.alloc(EntityKind::Identifier(token.text), token.position)
                        }
                        TokenKind::StringLiteral => {
                            let token = self.advance();
                            self.alloc(EntityKind::Literal(token.value), token.position)
                        }
                        _ => {
                            return Err(SyntaxError::new(
                                self.position(),
                                format!(
                                    "expected object literal key, found '{}'",
                                    self.current().text
                                ),
                            ))
                        }
                    };
                    self.expect(TokenKind::Colon)?;
                    let value = self.parse_expression()?;
                    let key_position = self.arena[key].position;
                    properties.push(self.alloc(
                        EntityKind::PropertyAssignment {
                            name: key,
                            content: value,
                        },
                        key_position,
                    ));
                    if !self.eat(TokenKind::Comma) {
                        break;
                    }
                }
                self.expect(TokenKind::RBrace)?;
                Ok(self.alloc(
                    EntityKind::Complex {
                        name: None,
                        children: properties,
                        shape: ComplexShape::Object,
                    },
                    position,
                ))
            }
            TokenKind::Function => self.parse_function(true),
            _ => Err(SyntaxError::new(
                self.position(),
                format!("unexpected token '{}'", self.current().text),
            )),
        }
    }

    /// Array elements may be nested items (model data in QML)
    fn parse_array_element(&mut self) -> Result<EntityId, SyntaxError> {
        if self.at(TokenKind::Identifier) && self.peek_n(1) == TokenKind::LBrace {
            return self.parse_item();
        }
        self.parse_expression()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::common::Value;

    fn parse_qml(source: &str) -> File {
        parse_source(source, Path::new("test.qml")).unwrap()
    }

    fn parse_js(source: &str) -> File {
        parse_source(source, Path::new("test.js")).unwrap()
    }

    #[test]
    fn test_parse_minimal_item() {
        let file = parse_qml("Rectangle { }");
        assert_eq!(file.contents.len(), 1);
        let root = file.contents[0];
        assert_eq!(file.arena.class_name(root), "QMLItem");
        assert_eq!(
            file.arena.to_source(file.arena.member(root, "name").unwrap()),
            "Rectangle"
        );
    }

    #[test]
    fn test_parse_pragma_and_imports() {
        let file = parse_qml("pragma Singleton\nimport QtQuick 2.5\nimport \"utils.js\" as Utils\nItem { }");
        assert_eq!(file.arena.class_name(file.contents[0]), "QMLPragma");
        assert_eq!(file.arena.class_name(file.contents[1]), "QMLImport");
        assert_eq!(file.arena.class_name(file.contents[2]), "QMLImport");

        let import = file.contents[1];
        let version = file.arena.member(import, "version").unwrap();
        assert_eq!(file.arena.value(version), Value::Real(2.5));

        let aliased = file.contents[2];
        let alias = file.arena.member(aliased, "as").unwrap();
        assert_eq!(file.arena.to_source(alias), "Utils");
    }

    #[test]
    fn test_parse_property_declarations() {
        let file = parse_qml(
            "Item { property int count: 5\ndefault property var data\nreadonly property string title: \"x\" }",
        );
        let root = file.contents[0];
        let children = file.arena.children(root);
        assert_eq!(children.len(), 3);

        match &file.arena[children[0]].kind {
            EntityKind::PropertyDeclaration {
                is_default,
                is_readonly,
                content,
                ..
            } => {
                assert!(!is_default && !is_readonly);
                assert!(content.is_some());
            }
            other => panic!("expected property declaration, got {:?}", other),
        }
        match &file.arena[children[1]].kind {
            EntityKind::PropertyDeclaration { is_default, .. } => assert!(is_default),
            other => panic!("expected property declaration, got {:?}", other),
        }
        match &file.arena[children[2]].kind {
            EntityKind::PropertyDeclaration { is_readonly, .. } => assert!(is_readonly),
            other => panic!("expected property declaration, got {:?}", other),
        }
    }

    #[test]
    fn test_parse_property_alias() {
        let file = parse_qml("Item { property alias text: label.text }");
        let root = file.contents[0];
        let alias = file.arena.children(root)[0];
        assert_eq!(file.arena.class_name(alias), "QMLPropertyAlias");
        let content = file.arena.member(alias, "content").unwrap();
        assert_eq!(file.arena.class_name(content), "QMLMemberAccess");
    }

    #[test]
    fn test_parse_id_assignment_and_nested_item() {
        let file = parse_qml("Item { id: root\nRectangle { color: \"red\" } }");
        let root = file.contents[0];
        let children = file.arena.children(root);
        assert_eq!(file.arena.class_name(children[0]), "QMLPropertyAssignment");
        assert_eq!(file.arena.class_name(children[1]), "QMLItem");
    }

    #[test]
    fn test_parse_dotted_assignment() {
        let file = parse_qml("Item { anchors.fill: parent }");
        let root = file.contents[0];
        let assignment = file.arena.children(root)[0];
        let name = file.arena.member(assignment, "name").unwrap();
        assert_eq!(file.arena.identifier_text(name), Some("anchors.fill"));
    }

    #[test]
    fn test_parse_on_decoration() {
        let file = parse_qml("Item { Behavior on opacity { } }");
        let root = file.contents[0];
        let assignment = file.arena.children(root)[0];
        assert_eq!(file.arena.class_name(assignment), "QMLPropertyAssignment");
        let name = file.arena.member(assignment, "name").unwrap();
        assert_eq!(file.arena.identifier_text(name), Some("opacity"));
        let content = file.arena.member(assignment, "content").unwrap();
        assert_eq!(file.arena.class_name(content), "QMLItem");
    }

    #[test]
    fn test_parse_signal() {
        let file = parse_qml("Item { signal clicked\nsignal moved(int x, int y) }");
        let root = file.contents[0];
        let children = file.arena.children(root);
        assert_eq!(file.arena.class_name(children[0]), "QMLSignal");

        let parameters = file.arena.member(children[1], "parameters").unwrap();
        let names: Vec<_> = file
            .arena
            .children(parameters)
            .iter()
            .map(|&id| file.arena.to_source(id))
            .collect();
        assert_eq!(names, vec!["x", "y"]);
    }

    #[test]
    fn test_parse_function_with_statements() {
        let file = parse_qml(
            "Item { function f(a, b) { var x = a + b; if (x > 0) return x; return 0 } }",
        );
        let root = file.contents[0];
        let function = file.arena.children(root)[0];
        assert_eq!(file.arena.class_name(function), "QMLFunction");

        let content = file.arena.member(function, "content").unwrap();
        assert_eq!(file.arena.children(content).len(), 3);
    }

    #[test]
    fn test_parse_expression_precedence() {
        let file = parse_js("var x = 1 + 2 * 3");
        let decl = file.contents[0];
        let content = file.arena.member(decl, "content").unwrap();
        match &file.arena[content].kind {
            EntityKind::BinaryOperation { op, right, .. } => {
                assert_eq!(*op, BinaryOperator::Add);
                match &file.arena[*right].kind {
                    EntityKind::BinaryOperation { op, .. } => {
                        assert_eq!(*op, BinaryOperator::Mul)
                    }
                    other => panic!("expected multiplication on the right, got {:?}", other),
                }
            }
            other => panic!("expected addition, got {:?}", other),
        }
    }

    #[test]
    fn test_parse_compound_assignment_desugars() {
        let file = parse_js("a += 1");
        let assignment = file.contents[0];
        match &file.arena[assignment].kind {
            EntityKind::BinaryOperation { op, right, .. } => {
                assert_eq!(*op, BinaryOperator::Assign);
                match &file.arena[*right].kind {
                    EntityKind::BinaryOperation { op, left, .. } => {
                        assert_eq!(*op, BinaryOperator::Add);
                        assert_eq!(file.arena.identifier_text(*left), Some("a"));
                    }
                    other => panic!("expected desugared addition, got {:?}", other),
                }
            }
            other => panic!("expected assignment, got {:?}", other),
        }
    }

    #[test]
    fn test_parse_parenthesized_flag() {
        let file = parse_js("var x = (1 + 2) * 3");
        let decl = file.contents[0];
        let content = file.arena.member(decl, "content").unwrap();
        let left = file.arena.member(content, "left").unwrap();
        assert!(file.arena[left].parenthesized);
        assert!(!file.arena[content].parenthesized);
    }

    #[test]
    fn test_parse_ternary_and_calls() {
        let file = parse_js("var y = f(a, b) > 0 ? o.m(1) : arr[2]");
        let decl = file.contents[0];
        let content = file.arena.member(decl, "content").unwrap();
        assert_eq!(file.arena.class_name(content), "QMLConditional");
    }

    #[test]
    fn test_parse_for_and_for_in() {
        let file = parse_js("for (var i = 0; i < 10; i++) { f(i) }\nfor (k in map) g(k)");
        assert_eq!(file.arena.class_name(file.contents[0]), "QMLFor");
        assert_eq!(file.arena.class_name(file.contents[1]), "QMLForIn");
    }

    #[test]
    fn test_parse_switch() {
        let file = parse_js("switch (x) { case 1: f(); break; default: g() }");
        let switch = file.contents[0];
        let cases = file.arena.member(switch, "cases").unwrap();
        assert_eq!(file.arena.children(cases).len(), 2);
        let first = file.arena.children(cases)[0];
        assert_eq!(file.arena.class_name(first), "QMLSwitchCase");
    }

    #[test]
    fn test_parse_with_and_typeof_and_new() {
        let file = parse_js("with (o) { f() }\nvar t = typeof x\nvar d = new Date()");
        assert_eq!(file.arena.class_name(file.contents[0]), "QMLWith");
        let t = file.arena.member(file.contents[1], "content").unwrap();
        assert_eq!(file.arena.class_name(t), "QMLUnaryOperation");
        let d = file.arena.member(file.contents[2], "content").unwrap();
        assert_eq!(file.arena.class_name(d), "QMLNewOperation");
    }

    #[test]
    fn test_parse_array_and_object_literals() {
        let file = parse_js("var a = [1, 2, 3]\nvar e = []\nvar o = { x: 1, \"y\": 2 }");
        let a = file.arena.member(file.contents[0], "content").unwrap();
        assert_eq!(file.arena.children(a).len(), 3);
        let e = file.arena.member(file.contents[1], "content").unwrap();
        assert!(file.arena.children(e).is_empty());
        let o = file.arena.member(file.contents[2], "content").unwrap();
        assert_eq!(file.arena.children(o).len(), 2);
    }

    #[test]
    fn test_parse_error_reports_position() {
        let err = parse_source("Item {\n  property\n}", Path::new("bad.qml")).unwrap_err();
        assert_eq!(err.position.line, 2);
    }

    #[test]
    fn test_parse_error_on_unbalanced_braces() {
        assert!(parse_source("Item {", Path::new("bad.qml")).is_err());
    }

    #[test]
    fn test_parse_js_file_statement_sequence() {
        let file = parse_js("function helper(v) { return v * 2 }\nvar cache = {}");
        assert_eq!(file.contents.len(), 2);
        assert_eq!(file.arena.class_name(file.contents[0]), "QMLFunction");
    }

    #[test]
    fn test_parent_back_references_cover_the_tree() {
        let file = parse_qml("Item { id: root\nproperty int count: 1 + 2 }");
        let root = file.contents[0];

        // Every entity except the root reachable from the root has a parent
        // whose member/children sets contain it
        let mut stack = vec![root];
        while let Some(id) = stack.pop() {
            for (_, member) in file.arena.members(id) {
                if let Some(member) = member {
                    assert_eq!(file.arena[member].parent, Some(id));
                    stack.push(member);
                }
            }
            for &child in file.arena.children(id) {
                assert_eq!(file.arena[child].parent, Some(id));
                stack.push(child);
            }
        }
    }
}
