use crate::diagnostics::{Diagnostic, DiagnosticKind, SourceSpan};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Keyword {
    Let,
    Const,
    Var,
    If,
    Else,
    While,
    Break,
    Continue,
    True,
    False,
    Null,
    Delete,
    TypeOf,
}

/// Raw piece of a template literal, before its expressions are parsed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TemplateChunk {
    Text(String),
    /// Source of a `${...}` segment and its absolute byte offset.
    Code { source: String, offset: usize },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TokenKind {
    Identifier,
    Number,
    String,
    Template(Vec<TemplateChunk>),
    Keyword(Keyword),
    LParen,
    RParen,
    LBrace,
    RBrace,
    LBracket,
    RBracket,
    Comma,
    Dot,
    Colon,
    Semicolon,
    Question,
    DoubleQuestion,
    Assign,
    PlusAssign,
    MinusAssign,
    StarAssign,
    SlashAssign,
    PercentAssign,
    Plus,
    PlusPlus,
    Minus,
    MinusMinus,
    Star,
    Slash,
    Percent,
    DoubleAmpersand,
    DoublePipe,
    Bang,
    BangEqual,
    BangEqualEqual,
    EqualEqual,
    EqualEqualEqual,
    Less,
    LessEqual,
    Greater,
    GreaterEqual,
    Unknown,
    Eof,
}

#[derive(Debug, Clone)]
pub struct Token {
    pub kind: TokenKind,
    pub lexeme: String,
    pub span: SourceSpan,
}

pub struct Lexer<'a> {
    source: &'a str,
    chars: std::str::CharIndices<'a>,
    current: usize,
    peeked: Option<(usize, char)>,
    base: usize,
}

impl<'a> Lexer<'a> {
    pub fn new(source: &'a str) -> Self {
        Self::with_offset(source, 0)
    }

    /// Lexes a fragment that starts at byte `base` of a larger source, so
    /// spans stay absolute.
    pub fn with_offset(source: &'a str, base: usize) -> Self {
        Self {
            source,
            chars: source.char_indices(),
            current: 0,
            peeked: None,
            base,
        }
    }

    fn span(&self, start: usize, end: usize) -> SourceSpan {
        SourceSpan::new(self.base + start, self.base + end)
    }

    fn bump(&mut self) -> Option<(usize, char)> {
        let next = if let Some((idx, ch)) = self.peeked.take() {
            Some((idx, ch))
        } else {
            self.chars.next()
        };
        if let Some((idx, ch)) = next {
            self.current = idx + ch.len_utf8();
            Some((idx, ch))
        } else {
            None
        }
    }

    fn peek(&mut self) -> Option<(usize, char)> {
        if self.peeked.is_none() {
            self.peeked = self.chars.next();
        }
        self.peeked
    }

    /// Character after the peeked one.
    fn peek_second(&mut self) -> Option<char> {
        self.peek();
        self.chars.clone().next().map(|(_, ch)| ch)
    }

    fn match_next(&mut self, expected: char) -> bool {
        if let Some((idx, ch)) = self.peek() {
            if ch == expected {
                self.peeked = None;
                self.current = idx + ch.len_utf8();
                true
            } else {
                false
            }
        } else {
            false
        }
    }

    fn collect_while<F>(&mut self, start: usize, mut predicate: F) -> String
    where
        F: FnMut(char) -> bool,
    {
        let mut end = self.current;
        while let Some((idx, ch)) = self.peek() {
            if predicate(ch) {
                self.bump();
                end = idx + ch.len_utf8();
            } else {
                break;
            }
        }
        self.source[start..end].to_string()
    }

    fn skip_whitespace_and_comments(&mut self) {
        loop {
            let mut progressed = false;

            while let Some((_, ch)) = self.peek() {
                if ch.is_whitespace() {
                    self.bump();
                    progressed = true;
                } else {
                    break;
                }
            }

            if let Some((_, '/')) = self.peek() {
                match self.peek_second() {
                    Some('/') => {
                        self.bump();
                        self.bump();
                        while let Some((_, ch)) = self.peek() {
                            if ch == '\n' {
                                break;
                            }
                            self.bump();
                        }
                        progressed = true;
                    }
                    Some('*') => {
                        self.bump();
                        self.bump();
                        while let Some((_, ch)) = self.bump() {
                            if ch == '*' && self.match_next('/') {
                                break;
                            }
                        }
                        progressed = true;
                    }
                    _ => {}
                }
            }

            if !progressed {
                break;
            }
        }
    }

    fn identifier_or_keyword(&mut self, start: usize) -> Token {
        let lexeme = self.collect_while(start, |ch| ch.is_alphanumeric() || ch == '_' || ch == '$');
        let end = self.current;
        let kind = keyword_for(&lexeme).unwrap_or(TokenKind::Identifier);
        Token {
            kind,
            lexeme,
            span: self.span(start, end),
        }
    }

    fn number_literal(&mut self, start: usize, first: char) -> Token {
        if first == '0' {
            if let Some((_, 'x' | 'X')) = self.peek() {
                self.bump();
                let lexeme = self.collect_while(start, |ch| ch.is_ascii_hexdigit() || ch == '_');
                return Token {
                    kind: TokenKind::Number,
                    lexeme,
                    span: self.span(start, self.current),
                };
            }
        }
        let mut end = self.current;
        let mut seen_dot = first == '.';
        let mut seen_exponent = false;
        while let Some((idx, ch)) = self.peek() {
            match ch {
                '0'..='9' | '_' => {
                    self.bump();
                    end = idx + ch.len_utf8();
                }
                '.' if !seen_dot && !seen_exponent => {
                    seen_dot = true;
                    self.bump();
                    end = idx + 1;
                }
                'e' | 'E' if !seen_exponent => {
                    seen_exponent = true;
                    self.bump();
                    end = idx + 1;
                    if let Some((_, sign @ ('+' | '-'))) = self.peek() {
                        self.bump();
                        end += sign.len_utf8();
                    }
                }
                _ => break,
            }
        }
        Token {
            kind: TokenKind::Number,
            lexeme: self.source[start..end].to_string(),
            span: self.span(start, end),
        }
    }

    fn string_literal(&mut self, start: usize, quote: char) -> Result<Token, Diagnostic> {
        let mut value = String::new();
        while let Some((_, ch)) = self.bump() {
            match ch {
                '\\' => match self.bump() {
                    Some((_, esc)) => push_escape(&mut value, esc),
                    None => break,
                },
                '\n' => break,
                _ if ch == quote => {
                    return Ok(Token {
                        kind: TokenKind::String,
                        lexeme: value,
                        span: self.span(start, self.current),
                    });
                }
                _ => value.push(ch),
            }
        }
        Err(
            Diagnostic::new(DiagnosticKind::Lexer, "unterminated string literal")
                .with_span(self.span(start, self.current)),
        )
    }

    /// Scans template text up to the closing backtick (or end of input when
    /// `closed` is false), splitting out `${...}` segments.
    fn template_chunks(
        &mut self,
        start: usize,
        closed: bool,
    ) -> Result<Vec<TemplateChunk>, Diagnostic> {
        let mut chunks = Vec::new();
        let mut text = String::new();
        loop {
            let Some((idx, ch)) = self.bump() else {
                if closed {
                    return Err(Diagnostic::new(
                        DiagnosticKind::Lexer,
                        "unterminated template literal",
                    )
                    .with_span(self.span(start, self.current)));
                }
                break;
            };
            match ch {
                '`' if closed => break,
                '\\' => match self.bump() {
                    Some((_, '\n')) => {}
                    Some((_, esc)) => push_escape(&mut text, esc),
                    None => text.push('\\'),
                },
                '$' if self.match_next('{') => {
                    if !text.is_empty() {
                        chunks.push(TemplateChunk::Text(std::mem::take(&mut text)));
                    }
                    let code_start = self.current;
                    let code_end = self.skip_template_code(idx)?;
                    chunks.push(TemplateChunk::Code {
                        source: self.source[code_start..code_end].to_string(),
                        offset: self.base + code_start,
                    });
                }
                _ => text.push(ch),
            }
        }
        if !text.is_empty() {
            chunks.push(TemplateChunk::Text(text));
        }
        Ok(chunks)
    }

    /// Advances past the `}` matching an opened `${`, returning the end of
    /// the embedded code.
    fn skip_template_code(&mut self, start: usize) -> Result<usize, Diagnostic> {
        let mut depth = 1usize;
        while let Some((idx, ch)) = self.bump() {
            match ch {
                '{' => depth += 1,
                '}' => {
                    depth -= 1;
                    if depth == 0 {
                        return Ok(idx);
                    }
                }
                '"' | '\'' => {
                    self.string_literal(idx, ch)?;
                }
                '`' => {
                    self.template_chunks(idx, true)?;
                }
                _ => {}
            }
        }
        Err(
            Diagnostic::new(DiagnosticKind::Lexer, "unterminated template expression")
                .with_span(self.span(start, self.current)),
        )
    }

    fn simple_token(&mut self, start: usize, kind: TokenKind) -> Token {
        let end = self.current;
        Token {
            kind,
            lexeme: self.source[start..end].to_string(),
            span: self.span(start, end),
        }
    }

    /// Chooses between `single`, `op=` and, if given, a doubled operator.
    fn operator(
        &mut self,
        start: usize,
        ch: char,
        single: TokenKind,
        assign: TokenKind,
        doubled: Option<TokenKind>,
    ) -> Token {
        if let Some(kind) = doubled {
            if self.match_next(ch) {
                return self.simple_token(start, kind);
            }
        }
        if self.match_next('=') {
            self.simple_token(start, assign)
        } else {
            self.simple_token(start, single)
        }
    }

    pub fn tokenize(mut self) -> Result<Vec<Token>, Diagnostic> {
        let mut tokens = Vec::new();
        loop {
            self.skip_whitespace_and_comments();
            let (start, ch) = match self.bump() {
                Some(pair) => pair,
                None => {
                    tokens.push(Token {
                        kind: TokenKind::Eof,
                        lexeme: String::new(),
                        span: self.span(self.current, self.current),
                    });
                    break;
                }
            };

            let token = match ch {
                ch if ch.is_alphabetic() || ch == '_' || ch == '$' => {
                    self.identifier_or_keyword(start)
                }
                '0'..='9' => self.number_literal(start, ch),
                '.' if matches!(self.peek(), Some((_, '0'..='9'))) => {
                    self.number_literal(start, ch)
                }
                '"' | '\'' => self.string_literal(start, ch)?,
                '`' => {
                    let chunks = self.template_chunks(start, true)?;
                    self.simple_token(start, TokenKind::Template(chunks))
                }
                '(' => self.simple_token(start, TokenKind::LParen),
                ')' => self.simple_token(start, TokenKind::RParen),
                '{' => self.simple_token(start, TokenKind::LBrace),
                '}' => self.simple_token(start, TokenKind::RBrace),
                '[' => self.simple_token(start, TokenKind::LBracket),
                ']' => self.simple_token(start, TokenKind::RBracket),
                ',' => self.simple_token(start, TokenKind::Comma),
                '.' => self.simple_token(start, TokenKind::Dot),
                ';' => self.simple_token(start, TokenKind::Semicolon),
                ':' => self.simple_token(start, TokenKind::Colon),
                '?' => {
                    if self.match_next('?') {
                        self.simple_token(start, TokenKind::DoubleQuestion)
                    } else {
                        self.simple_token(start, TokenKind::Question)
                    }
                }
                '+' => self.operator(
                    start,
                    ch,
                    TokenKind::Plus,
                    TokenKind::PlusAssign,
                    Some(TokenKind::PlusPlus),
                ),
                '-' => self.operator(
                    start,
                    ch,
                    TokenKind::Minus,
                    TokenKind::MinusAssign,
                    Some(TokenKind::MinusMinus),
                ),
                '*' => self.operator(start, ch, TokenKind::Star, TokenKind::StarAssign, None),
                '/' => self.operator(start, ch, TokenKind::Slash, TokenKind::SlashAssign, None),
                '%' => self.operator(
                    start,
                    ch,
                    TokenKind::Percent,
                    TokenKind::PercentAssign,
                    None,
                ),
                '=' => {
                    if self.match_next('=') {
                        if self.match_next('=') {
                            self.simple_token(start, TokenKind::EqualEqualEqual)
                        } else {
                            self.simple_token(start, TokenKind::EqualEqual)
                        }
                    } else {
                        self.simple_token(start, TokenKind::Assign)
                    }
                }
                '!' => {
                    if self.match_next('=') {
                        if self.match_next('=') {
                            self.simple_token(start, TokenKind::BangEqualEqual)
                        } else {
                            self.simple_token(start, TokenKind::BangEqual)
                        }
                    } else {
                        self.simple_token(start, TokenKind::Bang)
                    }
                }
                '&' if self.match_next('&') => {
                    self.simple_token(start, TokenKind::DoubleAmpersand)
                }
                '|' if self.match_next('|') => self.simple_token(start, TokenKind::DoublePipe),
                '<' => {
                    if self.match_next('=') {
                        self.simple_token(start, TokenKind::LessEqual)
                    } else {
                        self.simple_token(start, TokenKind::Less)
                    }
                }
                '>' => {
                    if self.match_next('=') {
                        self.simple_token(start, TokenKind::GreaterEqual)
                    } else {
                        self.simple_token(start, TokenKind::Greater)
                    }
                }
                _ => self.simple_token(start, TokenKind::Unknown),
            };
            tokens.push(token);
        }
        Ok(tokens)
    }
}

/// Splits a whole input into template chunks, as if it were wrapped in
/// backticks.
pub fn template_body(source: &str) -> Result<Vec<TemplateChunk>, Diagnostic> {
    Lexer::new(source).template_chunks(0, false)
}

fn push_escape(out: &mut String, esc: char) {
    match esc {
        'n' => out.push('\n'),
        'r' => out.push('\r'),
        't' => out.push('\t'),
        '0' => out.push('\0'),
        'b' => out.push('\u{8}'),
        'f' => out.push('\u{c}'),
        'v' => out.push('\u{b}'),
        other => out.push(other),
    }
}

fn keyword_for(ident: &str) -> Option<TokenKind> {
    use self::Keyword as Kw;
    let keyword = match ident {
        "let" => Kw::Let,
        "const" => Kw::Const,
        "var" => Kw::Var,
        "if" => Kw::If,
        "else" => Kw::Else,
        "while" => Kw::While,
        "break" => Kw::Break,
        "continue" => Kw::Continue,
        "true" => Kw::True,
        "false" => Kw::False,
        "null" => Kw::Null,
        "delete" => Kw::Delete,
        "typeof" => Kw::TypeOf,
        _ => return None,
    };
    Some(TokenKind::Keyword(keyword))
}
