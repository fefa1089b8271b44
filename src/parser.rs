use crate::{
    ast::{
        BinaryOp, DeclKind, Declarator, Expr, ExprKind, Literal, LogicalOp, Program, Stmt,
        StmtKind, TemplatePart, UnaryOp,
    },
    diagnostics::{Diagnostic, DiagnosticKind, SourceSpan},
    lexer::{self, Keyword, Lexer, TemplateChunk, Token, TokenKind},
};

/// Parses a sequence of statements.
pub fn parse_program(source: &str) -> Result<Program, Diagnostic> {
    let tokens = Lexer::new(source).tokenize()?;
    Parser::new(tokens).parse_program()
}

/// Parses exactly one expression, optionally followed by a `;`.
pub fn parse_expression(source: &str) -> Result<Expr, Diagnostic> {
    parse_expression_at(source, 0)
}

/// Parses the body of a template literal (the text between backticks).
pub fn parse_template(source: &str) -> Result<Vec<TemplatePart>, Diagnostic> {
    template_parts(lexer::template_body(source)?)
}

fn parse_expression_at(source: &str, offset: usize) -> Result<Expr, Diagnostic> {
    let tokens = Lexer::with_offset(source, offset).tokenize()?;
    let mut parser = Parser::new(tokens);
    let expr = parser.parse_expression()?;
    parser.consume_optional_semicolon();
    if !parser.is_at_end() {
        let token = parser.advance();
        return Err(parser.error(&token, "unexpected token after expression"));
    }
    Ok(expr)
}

fn template_parts(chunks: Vec<TemplateChunk>) -> Result<Vec<TemplatePart>, Diagnostic> {
    chunks
        .into_iter()
        .map(|chunk| match chunk {
            TemplateChunk::Text(text) => Ok(TemplatePart::Text(text)),
            TemplateChunk::Code { source, offset } => {
                if source.trim().is_empty() {
                    return Err(Diagnostic::new(
                        DiagnosticKind::Parser,
                        "empty template expression",
                    )
                    .with_span(SourceSpan::new(offset, offset + source.len())));
                }
                let tokens = Lexer::with_offset(&source, offset).tokenize()?;
                let mut parser = Parser::new(tokens);
                let expr = parser.parse_expression()?;
                if !parser.is_at_end() {
                    let token = parser.advance();
                    return Err(parser.error(&token, "expected `}` after template expression"));
                }
                Ok(TemplatePart::Expr(expr))
            }
        })
        .collect()
}

struct Parser {
    tokens: Vec<Token>,
    current: usize,
}

impl Parser {
    fn new(tokens: Vec<Token>) -> Self {
        Self { tokens, current: 0 }
    }

    fn parse_program(&mut self) -> Result<Program, Diagnostic> {
        let mut items = Vec::new();
        while !self.check(TokenKind::Eof) {
            items.push(self.parse_statement()?);
        }
        Ok(Program { items })
    }

    fn parse_block(&mut self) -> Result<(Vec<Stmt>, SourceSpan), Diagnostic> {
        let lbrace = self.consume(TokenKind::LBrace, "expected `{` to start block")?;
        let mut items = Vec::new();
        while !self.check(TokenKind::RBrace) && !self.check(TokenKind::Eof) {
            items.push(self.parse_statement()?);
        }
        let rbrace = self.consume(TokenKind::RBrace, "expected `}` after block")?;
        Ok((items, lbrace.span.to(rbrace.span)))
    }

    fn parse_statement(&mut self) -> Result<Stmt, Diagnostic> {
        if let Some(token) = self.peek() {
            match &token.kind {
                TokenKind::Keyword(Keyword::Let) => return self.parse_declaration(DeclKind::Let),
                TokenKind::Keyword(Keyword::Const) => {
                    return self.parse_declaration(DeclKind::Const)
                }
                TokenKind::Keyword(Keyword::Var) => return self.parse_declaration(DeclKind::Var),
                TokenKind::Keyword(Keyword::If) => return self.parse_if(),
                TokenKind::Keyword(Keyword::While) => return self.parse_while(),
                TokenKind::Keyword(Keyword::Break) => {
                    let token = self.advance();
                    self.consume_optional_semicolon();
                    return Ok(Stmt {
                        span: token.span,
                        kind: StmtKind::Break,
                    });
                }
                TokenKind::Keyword(Keyword::Continue) => {
                    let token = self.advance();
                    self.consume_optional_semicolon();
                    return Ok(Stmt {
                        span: token.span,
                        kind: StmtKind::Continue,
                    });
                }
                TokenKind::Semicolon => {
                    let token = self.advance();
                    return Ok(Stmt {
                        span: token.span,
                        kind: StmtKind::Empty,
                    });
                }
                TokenKind::LBrace => {
                    let (items, span) = self.parse_block()?;
                    return Ok(Stmt {
                        kind: StmtKind::Block(items),
                        span,
                    });
                }
                _ => {}
            }
        }
        self.parse_expression_statement()
    }

    fn parse_declaration(&mut self, kind: DeclKind) -> Result<Stmt, Diagnostic> {
        let start = self.advance().span;
        let mut declarators = Vec::new();
        loop {
            let name = self.consume_identifier("expected variable name in declaration")?;
            let initializer = if self.matches(TokenKind::Assign) {
                Some(self.parse_assignment()?)
            } else {
                None
            };
            if kind == DeclKind::Const && initializer.is_none() {
                return Err(self.error(&name, "missing initializer in const declaration"));
            }
            let end = initializer.as_ref().map(|expr| expr.span).unwrap_or(name.span);
            declarators.push(Declarator {
                name: name.lexeme.clone(),
                initializer,
                span: name.span.to(end),
            });
            if !self.matches(TokenKind::Comma) {
                break;
            }
        }
        self.consume_optional_semicolon();
        let end = self.previous().span;
        Ok(Stmt {
            span: start.to(end),
            kind: StmtKind::Declaration { kind, declarators },
        })
    }

    fn parse_condition(&mut self, keyword: &str) -> Result<Expr, Diagnostic> {
        self.consume(TokenKind::LParen, &format!("expected `(` after `{keyword}`"))?;
        let condition = self.parse_expression()?;
        self.consume(TokenKind::RParen, "expected `)` after condition")?;
        Ok(condition)
    }

    fn parse_if(&mut self) -> Result<Stmt, Diagnostic> {
        let start = self.advance().span;
        let condition = self.parse_condition("if")?;
        let then_branch = Box::new(self.parse_statement()?);
        let else_branch = if self.matches_keyword(Keyword::Else) {
            Some(Box::new(self.parse_statement()?))
        } else {
            None
        };
        let end = else_branch
            .as_ref()
            .map(|stmt| stmt.span)
            .unwrap_or(then_branch.span);
        Ok(Stmt {
            span: start.to(end),
            kind: StmtKind::If {
                condition,
                then_branch,
                else_branch,
            },
        })
    }

    fn parse_while(&mut self) -> Result<Stmt, Diagnostic> {
        let start = self.advance().span;
        let condition = self.parse_condition("while")?;
        let body = Box::new(self.parse_statement()?);
        Ok(Stmt {
            span: start.to(body.span),
            kind: StmtKind::While { condition, body },
        })
    }

    fn parse_expression_statement(&mut self) -> Result<Stmt, Diagnostic> {
        let expr = self.parse_expression()?;
        self.consume_optional_semicolon();
        Ok(Stmt {
            span: expr.span,
            kind: StmtKind::Expr(expr),
        })
    }

    fn parse_expression(&mut self) -> Result<Expr, Diagnostic> {
        self.parse_assignment()
    }

    fn parse_assignment(&mut self) -> Result<Expr, Diagnostic> {
        let expr = self.parse_conditional()?;
        let op = if self.matches(TokenKind::Assign) {
            None
        } else if self.matches(TokenKind::PlusAssign) {
            Some(BinaryOp::Add)
        } else if self.matches(TokenKind::MinusAssign) {
            Some(BinaryOp::Sub)
        } else if self.matches(TokenKind::StarAssign) {
            Some(BinaryOp::Mul)
        } else if self.matches(TokenKind::SlashAssign) {
            Some(BinaryOp::Div)
        } else if self.matches(TokenKind::PercentAssign) {
            Some(BinaryOp::Mod)
        } else {
            return Ok(expr);
        };
        let equals = self.previous().span;
        let value = self.parse_assignment()?;
        if !expr.is_assignable() {
            return Err(
                Diagnostic::new(DiagnosticKind::Parser, "invalid assignment target")
                    .with_span(equals),
            );
        }
        Ok(Expr {
            span: expr.span.to(value.span),
            kind: ExprKind::Assign {
                op,
                target: Box::new(expr),
                value: Box::new(value),
            },
        })
    }

    fn parse_conditional(&mut self) -> Result<Expr, Diagnostic> {
        let test = self.parse_nullish()?;
        if !self.matches(TokenKind::Question) {
            return Ok(test);
        }
        let consequent = self.parse_assignment()?;
        self.consume(TokenKind::Colon, "expected `:` in conditional expression")?;
        let alternate = self.parse_assignment()?;
        Ok(Expr {
            span: test.span.to(alternate.span),
            kind: ExprKind::Conditional {
                test: Box::new(test),
                consequent: Box::new(consequent),
                alternate: Box::new(alternate),
            },
        })
    }

    fn parse_nullish(&mut self) -> Result<Expr, Diagnostic> {
        let mut expr = self.parse_or()?;
        while self.matches(TokenKind::DoubleQuestion) {
            let right = self.parse_or()?;
            expr = logical(LogicalOp::Nullish, expr, right);
        }
        Ok(expr)
    }

    fn parse_or(&mut self) -> Result<Expr, Diagnostic> {
        let mut expr = self.parse_and()?;
        while self.matches(TokenKind::DoublePipe) {
            let right = self.parse_and()?;
            expr = logical(LogicalOp::Or, expr, right);
        }
        Ok(expr)
    }

    fn parse_and(&mut self) -> Result<Expr, Diagnostic> {
        let mut expr = self.parse_equality()?;
        while self.matches(TokenKind::DoubleAmpersand) {
            let right = self.parse_equality()?;
            expr = logical(LogicalOp::And, expr, right);
        }
        Ok(expr)
    }

    fn parse_equality(&mut self) -> Result<Expr, Diagnostic> {
        let mut expr = self.parse_comparison()?;
        while let Some(op) = if self.matches(TokenKind::EqualEqual) {
            Some(BinaryOp::Equal)
        } else if self.matches(TokenKind::BangEqual) {
            Some(BinaryOp::NotEqual)
        } else if self.matches(TokenKind::EqualEqualEqual) {
            Some(BinaryOp::StrictEqual)
        } else if self.matches(TokenKind::BangEqualEqual) {
            Some(BinaryOp::StrictNotEqual)
        } else {
            None
        } {
            let right = self.parse_comparison()?;
            expr = binary(op, expr, right);
        }
        Ok(expr)
    }

    fn parse_comparison(&mut self) -> Result<Expr, Diagnostic> {
        let mut expr = self.parse_term()?;
        while let Some(op) = if self.matches(TokenKind::LessEqual) {
            Some(BinaryOp::LessEqual)
        } else if self.matches(TokenKind::GreaterEqual) {
            Some(BinaryOp::GreaterEqual)
        } else if self.matches(TokenKind::Less) {
            Some(BinaryOp::Less)
        } else if self.matches(TokenKind::Greater) {
            Some(BinaryOp::Greater)
        } else {
            None
        } {
            let right = self.parse_term()?;
            expr = binary(op, expr, right);
        }
        Ok(expr)
    }

    fn parse_term(&mut self) -> Result<Expr, Diagnostic> {
        let mut expr = self.parse_factor()?;
        while let Some(op) = if self.matches(TokenKind::Plus) {
            Some(BinaryOp::Add)
        } else if self.matches(TokenKind::Minus) {
            Some(BinaryOp::Sub)
        } else {
            None
        } {
            let right = self.parse_factor()?;
            expr = binary(op, expr, right);
        }
        Ok(expr)
    }

    fn parse_factor(&mut self) -> Result<Expr, Diagnostic> {
        let mut expr = self.parse_unary()?;
        while let Some(op) = if self.matches(TokenKind::Star) {
            Some(BinaryOp::Mul)
        } else if self.matches(TokenKind::Slash) {
            Some(BinaryOp::Div)
        } else if self.matches(TokenKind::Percent) {
            Some(BinaryOp::Mod)
        } else {
            None
        } {
            let right = self.parse_unary()?;
            expr = binary(op, expr, right);
        }
        Ok(expr)
    }

    fn parse_unary(&mut self) -> Result<Expr, Diagnostic> {
        let op = if self.matches(TokenKind::Minus) {
            UnaryOp::Negate
        } else if self.matches(TokenKind::Plus) {
            UnaryOp::Plus
        } else if self.matches(TokenKind::Bang) {
            UnaryOp::Not
        } else if self.matches_keyword(Keyword::TypeOf) {
            UnaryOp::TypeOf
        } else if self.matches_keyword(Keyword::Delete) {
            let start = self.previous().span;
            let target = self.parse_unary()?;
            return Ok(Expr {
                span: start.to(target.span),
                kind: ExprKind::Delete(Box::new(target)),
            });
        } else if self.matches(TokenKind::PlusPlus) || self.matches(TokenKind::MinusMinus) {
            let operator = self.previous().clone();
            let target = self.parse_unary()?;
            if !target.is_assignable() {
                return Err(self.error(&operator, "invalid update target"));
            }
            return Ok(Expr {
                span: operator.span.to(target.span),
                kind: ExprKind::Update {
                    increment: operator.kind == TokenKind::PlusPlus,
                    prefix: true,
                    target: Box::new(target),
                },
            });
        } else {
            return self.parse_postfix();
        };
        let start = self.previous().span;
        let expr = self.parse_unary()?;
        Ok(Expr {
            span: start.to(expr.span),
            kind: ExprKind::Unary {
                op,
                expr: Box::new(expr),
            },
        })
    }

    fn parse_postfix(&mut self) -> Result<Expr, Diagnostic> {
        let expr = self.parse_call()?;
        if expr.is_assignable()
            && (self.check(TokenKind::PlusPlus) || self.check(TokenKind::MinusMinus))
        {
            let operator = self.advance();
            return Ok(Expr {
                span: expr.span.to(operator.span),
                kind: ExprKind::Update {
                    increment: operator.kind == TokenKind::PlusPlus,
                    prefix: false,
                    target: Box::new(expr),
                },
            });
        }
        Ok(expr)
    }

    fn parse_call(&mut self) -> Result<Expr, Diagnostic> {
        let mut expr = self.parse_primary()?;
        loop {
            if self.matches(TokenKind::LParen) {
                let mut args = Vec::new();
                if !self.check(TokenKind::RParen) {
                    loop {
                        args.push(self.parse_assignment()?);
                        if !self.matches(TokenKind::Comma) || self.check(TokenKind::RParen) {
                            break;
                        }
                    }
                }
                let paren = self.consume(TokenKind::RParen, "expected `)` after arguments")?;
                expr = Expr {
                    span: expr.span.to(paren.span),
                    kind: ExprKind::Call {
                        callee: Box::new(expr),
                        args,
                    },
                };
            } else if self.matches(TokenKind::LBracket) {
                let index = self.parse_expression()?;
                let bracket = self.consume(TokenKind::RBracket, "expected `]` after index")?;
                expr = Expr {
                    span: expr.span.to(bracket.span),
                    kind: ExprKind::Index {
                        target: Box::new(expr),
                        index: Box::new(index),
                    },
                };
            } else if self.matches(TokenKind::Dot) {
                let ident = self.consume_property_name("expected property name after `.`")?;
                expr = Expr {
                    span: expr.span.to(ident.span),
                    kind: ExprKind::Field {
                        target: Box::new(expr),
                        field: ident.lexeme.clone(),
                    },
                };
            } else {
                break;
            }
        }
        Ok(expr)
    }

    fn parse_primary(&mut self) -> Result<Expr, Diagnostic> {
        let Some(token) = self.peek() else {
            return Err(self.error_eof("unexpected end of expression"));
        };
        match &token.kind {
            TokenKind::Keyword(Keyword::True) => Ok(self.literal(Literal::Bool(true))),
            TokenKind::Keyword(Keyword::False) => Ok(self.literal(Literal::Bool(false))),
            TokenKind::Keyword(Keyword::Null) => Ok(self.literal(Literal::Null)),
            TokenKind::Number => {
                let tok = self.advance();
                let value = number_value(&tok.lexeme).ok_or_else(|| {
                    self.error(&tok, &format!("invalid number literal `{}`", tok.lexeme))
                })?;
                Ok(Expr {
                    span: tok.span,
                    kind: ExprKind::Literal(Literal::Number(value)),
                })
            }
            TokenKind::String => {
                let tok = self.advance();
                Ok(Expr {
                    span: tok.span,
                    kind: ExprKind::Literal(Literal::String(tok.lexeme.clone())),
                })
            }
            TokenKind::Template(chunks) => {
                let chunks = chunks.clone();
                let tok = self.advance();
                Ok(Expr {
                    span: tok.span,
                    kind: ExprKind::Template(template_parts(chunks)?),
                })
            }
            TokenKind::Identifier => {
                let tok = self.advance();
                Ok(Expr {
                    span: tok.span,
                    kind: ExprKind::Identifier(tok.lexeme.clone()),
                })
            }
            TokenKind::LParen => {
                let lparen = self.advance();
                let inner = self.parse_expression()?;
                let rparen = self.consume(TokenKind::RParen, "expected `)` after expression")?;
                Ok(Expr {
                    span: lparen.span.to(rparen.span),
                    kind: ExprKind::Group(Box::new(inner)),
                })
            }
            TokenKind::LBracket => {
                let lbracket = self.advance();
                let mut elements = Vec::new();
                while !self.check(TokenKind::RBracket) {
                    elements.push(self.parse_assignment()?);
                    if !self.matches(TokenKind::Comma) {
                        break;
                    }
                }
                let rbracket =
                    self.consume(TokenKind::RBracket, "expected `]` after array literal")?;
                Ok(Expr {
                    span: lbracket.span.to(rbracket.span),
                    kind: ExprKind::ArrayLiteral(elements),
                })
            }
            TokenKind::LBrace => self.parse_object_literal(),
            _ => {
                let token = token.clone();
                Err(self.error(&token, "unexpected token in expression"))
            }
        }
    }

    fn parse_object_literal(&mut self) -> Result<Expr, Diagnostic> {
        let lbrace = self.advance();
        let mut entries = Vec::new();
        while !self.check(TokenKind::RBrace) {
            let key = self.advance();
            let name = match &key.kind {
                TokenKind::Identifier | TokenKind::String | TokenKind::Keyword(_) => {
                    key.lexeme.clone()
                }
                TokenKind::Number => match number_value(&key.lexeme) {
                    Some(n) => crate::value::format_number(n),
                    None => return Err(self.error(&key, "invalid number literal")),
                },
                _ => return Err(self.error(&key, "expected property name in object literal")),
            };
            let value = if self.matches(TokenKind::Colon) {
                self.parse_assignment()?
            } else if key.kind == TokenKind::Identifier {
                Expr {
                    span: key.span,
                    kind: ExprKind::Identifier(name.clone()),
                }
            } else {
                return Err(self.error(&key, "expected `:` in object literal"));
            };
            entries.push((name, value));
            if !self.matches(TokenKind::Comma) {
                break;
            }
        }
        let rbrace = self.consume(TokenKind::RBrace, "expected `}` after object literal")?;
        Ok(Expr {
            span: lbrace.span.to(rbrace.span),
            kind: ExprKind::ObjectLiteral(entries),
        })
    }

    fn literal(&mut self, literal: Literal) -> Expr {
        let tok = self.advance();
        Expr {
            span: tok.span,
            kind: ExprKind::Literal(literal),
        }
    }

    fn consume_optional_semicolon(&mut self) {
        let _ = self.matches(TokenKind::Semicolon);
    }

    fn matches(&mut self, kind: TokenKind) -> bool {
        if self.check(kind) {
            self.advance();
            true
        } else {
            false
        }
    }

    fn matches_keyword(&mut self, keyword: Keyword) -> bool {
        self.matches(TokenKind::Keyword(keyword))
    }

    fn consume(&mut self, kind: TokenKind, message: &str) -> Result<Token, Diagnostic> {
        if self.check(kind) {
            Ok(self.advance())
        } else {
            Err(self
                .peek()
                .map(|tok| self.error(tok, message))
                .unwrap_or_else(|| self.error_eof(message)))
        }
    }

    fn consume_identifier(&mut self, message: &str) -> Result<Token, Diagnostic> {
        self.consume(TokenKind::Identifier, message)
    }

    /// Property names may reuse keywords, as in `state.delete`.
    fn consume_property_name(&mut self, message: &str) -> Result<Token, Diagnostic> {
        if let Some(token) = self.peek() {
            match &token.kind {
                TokenKind::Identifier | TokenKind::Keyword(_) => Ok(self.advance()),
                _ => Err(self.error(token, message)),
            }
        } else {
            Err(self.error_eof(message))
        }
    }

    fn check(&self, kind: TokenKind) -> bool {
        if let Some(token) = self.peek() {
            token.kind == kind
        } else {
            false
        }
    }

    fn advance(&mut self) -> Token {
        if !self.is_at_end() {
            self.current += 1;
        }
        self.previous().clone()
    }

    fn previous(&self) -> &Token {
        &self.tokens[self.current.saturating_sub(1)]
    }

    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.current)
    }

    fn is_at_end(&self) -> bool {
        matches!(self.peek().map(|t| &t.kind), Some(TokenKind::Eof) | None)
    }

    fn error(&self, token: &Token, message: &str) -> Diagnostic {
        Diagnostic::new(DiagnosticKind::Parser, message.to_string()).with_span(token.span)
    }

    fn error_eof(&self, message: &str) -> Diagnostic {
        Diagnostic::new(DiagnosticKind::Parser, message.to_string())
    }
}

fn binary(op: BinaryOp, left: Expr, right: Expr) -> Expr {
    Expr {
        span: left.span.to(right.span),
        kind: ExprKind::Binary {
            op,
            left: Box::new(left),
            right: Box::new(right),
        },
    }
}

fn logical(op: LogicalOp, left: Expr, right: Expr) -> Expr {
    Expr {
        span: left.span.to(right.span),
        kind: ExprKind::Logical {
            op,
            left: Box::new(left),
            right: Box::new(right),
        },
    }
}

fn number_value(lexeme: &str) -> Option<f64> {
    let digits = lexeme.replace('_', "");
    if let Some(hex) = digits
        .strip_prefix("0x")
        .or_else(|| digits.strip_prefix("0X"))
    {
        return u64::from_str_radix(hex, 16).ok().map(|n| n as f64);
    }
    digits.parse().ok()
}
