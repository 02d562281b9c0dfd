use anyhow::{anyhow, Result};

/// Directive named after a `#` that starts a line
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DirectiveKind {
    Include,
    IncludeNext,
    Define,
    Undef,
    If,
    Ifdef,
    Ifndef,
    Elif,
    Else,
    Endif,
    Line,
    Pragma,
    Error,
    Warning,
    /// Null directive, line marker, `#ident` and friends
    Other,
}

impl DirectiveKind {
    fn from_name(name: &str) -> Self {
        match name {
            "include" => DirectiveKind::Include,
            "include_next" => DirectiveKind::IncludeNext,
            "define" => DirectiveKind::Define,
            "undef" => DirectiveKind::Undef,
            "if" => DirectiveKind::If,
            "ifdef" => DirectiveKind::Ifdef,
            "ifndef" => DirectiveKind::Ifndef,
            "elif" => DirectiveKind::Elif,
            "else" => DirectiveKind::Else,
            "endif" => DirectiveKind::Endif,
            "line" => DirectiveKind::Line,
            "pragma" => DirectiveKind::Pragma,
            "error" => DirectiveKind::Error,
            "warning" => DirectiveKind::Warning,
            _ => DirectiveKind::Other,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum TokenType {
    Directive(DirectiveKind),
    Identifier(String),
    Number(String),
    /// Contents between the quotes, escapes kept verbatim
    StringLiteral(String),
    CharLiteral(String),

    // Operators of `#if` expressions and macro parameter lists
    LeftParen,
    RightParen,
    Comma,
    Plus,
    Minus,
    Star,
    Slash,
    Percent,
    Ampersand,
    Pipe,
    Caret,
    Tilde,
    Bang,
    Question,
    Colon,
    Less,
    Greater,
    LessEqual,
    GreaterEqual,
    EqualEqual,
    NotEqual,
    LogicalAnd,
    LogicalOr,
    LeftShift,
    RightShift,
    Ellipsis,
    /// Any other punctuator, passed through as text
    Punct(String),

    Newline,
    Whitespace(String),
    Comment(String),
    Eof,
}

impl TokenType {
    /// Separates tokens without meaning anything
    pub fn is_blank(&self) -> bool {
        matches!(self, TokenType::Whitespace(_) | TokenType::Comment(_))
    }
}

#[derive(Debug, Clone)]
pub struct Token {
    pub token_type: TokenType,
    /// Source text, except that a line continuation reads as one space
    pub text: String,
    pub line: usize,
    pub column: usize,
}

/// Multi-character punctuators, longest first
const PUNCTUATORS: &[&str] = &[
    "...", "<<=", ">>=", "&&", "||", "==", "!=", "<=", ">=", "<<", ">>", "->", "++", "--", "##", "+=", "-=", "*=",
    "/=", "%=", "&=", "|=", "^=",
];

fn punctuator(text: &str) -> TokenType {
    match text {
        "(" => TokenType::LeftParen,
        ")" => TokenType::RightParen,
        "," => TokenType::Comma,
        "+" => TokenType::Plus,
        "-" => TokenType::Minus,
        "*" => TokenType::Star,
        "/" => TokenType::Slash,
        "%" => TokenType::Percent,
        "&" => TokenType::Ampersand,
        "|" => TokenType::Pipe,
        "^" => TokenType::Caret,
        "~" => TokenType::Tilde,
        "!" => TokenType::Bang,
        "?" => TokenType::Question,
        ":" => TokenType::Colon,
        "<" => TokenType::Less,
        ">" => TokenType::Greater,
        "<=" => TokenType::LessEqual,
        ">=" => TokenType::GreaterEqual,
        "==" => TokenType::EqualEqual,
        "!=" => TokenType::NotEqual,
        "&&" => TokenType::LogicalAnd,
        "||" => TokenType::LogicalOr,
        "<<" => TokenType::LeftShift,
        ">>" => TokenType::RightShift,
        "..." => TokenType::Ellipsis,
        other => TokenType::Punct(other.to_string()),
    }
}

fn is_identifier_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '_' || c == '$'
}

/// Splits source text into preprocessing tokens. Positions are byte
/// offsets into the source; lines and columns are 1-based.
pub struct Lexer<'a> {
    source: &'a str,
    pos: usize,
    line: usize,
    column: usize,
    /// Only whitespace and comments seen since the last newline
    at_line_start: bool,
}

impl<'a> Lexer<'a> {
    pub fn new(source: &'a str) -> Self {
        Self {
            source,
            pos: 0,
            line: 1,
            column: 1,
            at_line_start: true,
        }
    }

    pub fn tokenize(mut self) -> Result<Vec<Token>> {
        let mut tokens = Vec::new();
        while let Some(token) = self.next_token()? {
            match token.token_type {
                TokenType::Newline => self.at_line_start = true,
                ref kind if kind.is_blank() => {}
                _ => self.at_line_start = false,
            }
            tokens.push(token);
        }
        tokens.push(Token {
            token_type: TokenType::Eof,
            text: String::new(),
            line: self.line,
            column: self.column,
        });
        Ok(tokens)
    }

    fn next_token(&mut self) -> Result<Option<Token>> {
        let (start, line, column) = (self.pos, self.line, self.column);
        let Some(c) = self.peek() else {
            return Ok(None);
        };

        let token_type = match c {
            '\n' => {
                self.bump();
                TokenType::Newline
            }
            '\\' if self.rest()[1..].starts_with('\n') || self.rest()[1..].starts_with("\r\n") => {
                self.bump_while(|c| c != '\n');
                self.bump();
                return Ok(Some(Token {
                    token_type: TokenType::Whitespace(" ".to_string()),
                    text: " ".to_string(),
                    line,
                    column,
                }));
            }
            c if c.is_whitespace() => {
                self.bump_while(|c| c.is_whitespace() && c != '\n');
                TokenType::Whitespace(self.text_from(start).to_string())
            }
            '#' if self.at_line_start && !self.rest().starts_with("##") => {
                self.bump();
                self.bump_while(|c| c == ' ' || c == '\t');
                let name_start = self.pos;
                self.bump_while(|c| c.is_ascii_alphabetic() || c == '_');
                let name = self.text_from(name_start);
                return Ok(Some(Token {
                    token_type: TokenType::Directive(DirectiveKind::from_name(name)),
                    text: format!("#{}", name),
                    line,
                    column,
                }));
            }
            '/' if self.rest().starts_with("//") => {
                self.bump_while(|c| c != '\n');
                TokenType::Comment(self.text_from(start).to_string())
            }
            '/' if self.rest().starts_with("/*") => {
                self.advance_by(2);
                while !self.rest().starts_with("*/") {
                    if self.bump().is_none() {
                        return Err(anyhow!("Unterminated comment starting at line {}", line));
                    }
                }
                self.advance_by(2);
                TokenType::Comment(self.text_from(start).to_string())
            }
            '"' | '\'' => {
                let contents = self.scan_quoted(c);
                if c == '"' {
                    TokenType::StringLiteral(contents)
                } else {
                    TokenType::CharLiteral(contents)
                }
            }
            c if c.is_ascii_digit() || (c == '.' && self.rest()[1..].starts_with(|d: char| d.is_ascii_digit())) => {
                self.scan_number();
                TokenType::Number(self.text_from(start).to_string())
            }
            c if c.is_ascii_alphabetic() || c == '_' || c == '$' => {
                self.bump_while(is_identifier_char);
                TokenType::Identifier(self.text_from(start).to_string())
            }
            _ => {
                match PUNCTUATORS.iter().find(|p| self.rest().starts_with(**p)) {
                    Some(p) => self.advance_by(p.len()),
                    None => {
                        self.bump();
                    }
                }
                punctuator(self.text_from(start))
            }
        };

        Ok(Some(Token {
            token_type,
            text: self.text_from(start).to_string(),
            line,
            column,
        }))
    }

    /// Contents of a string or character literal; an unterminated one ends
    /// at the end of the line
    fn scan_quoted(&mut self, quote: char) -> String {
        self.bump();
        let start = self.pos;
        loop {
            match self.peek() {
                None | Some('\n') => return self.text_from(start).to_string(),
                Some(c) if c == quote => {
                    let contents = self.text_from(start).to_string();
                    self.bump();
                    return contents;
                }
                Some('\\') => {
                    self.bump();
                    self.bump();
                }
                Some(_) => {
                    self.bump();
                }
            }
        }
    }

    /// pp-number: digits, letters, `.`, `_` and signed exponents
    fn scan_number(&mut self) {
        let mut previous = '\0';
        while let Some(c) = self.peek() {
            let exponent_sign = (c == '+' || c == '-') && matches!(previous, 'e' | 'E' | 'p' | 'P');
            if !(c.is_ascii_alphanumeric() || c == '.' || c == '_' || exponent_sign) {
                break;
            }
            self.bump();
            previous = c;
        }
    }

    fn rest(&self) -> &'a str {
        &self.source[self.pos..]
    }

    fn text_from(&self, start: usize) -> &'a str {
        &self.source[start..self.pos]
    }

    fn peek(&self) -> Option<char> {
        self.rest().chars().next()
    }

    fn bump(&mut self) -> Option<char> {
        let c = self.peek()?;
        self.pos += c.len_utf8();
        if c == '\n' {
            self.line += 1;
            self.column = 1;
        } else {
            self.column += 1;
        }
        Some(c)
    }

    fn bump_while(&mut self, keep: impl Fn(char) -> bool) {
        while self.peek().is_some_and(&keep) {
            self.bump();
        }
    }

    /// Skip `len` bytes of ASCII text known not to contain a newline
    fn advance_by(&mut self, len: usize) {
        self.pos += len;
        self.column += len;
    }
}

/// Tokenize `input`, ending with an `Eof` token
pub fn tokenize(input: &str) -> Result<Vec<Token>> {
    Lexer::new(input).tokenize()
}
