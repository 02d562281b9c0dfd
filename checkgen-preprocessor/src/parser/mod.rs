//! Splits a token stream into directives and runs of ordinary text

use crate::lexer::{DirectiveKind, Token, TokenType};
use anyhow::{anyhow, Result};

#[derive(Debug, Clone, PartialEq)]
pub enum Directive {
    Include {
        path: String,
        is_system: bool,
        is_next: bool,
    },
    Define {
        name: String,
        params: Option<Vec<String>>,
        body: String,
        is_variadic: bool,
    },
    Undef {
        name: String,
    },
    If {
        condition: String,
    },
    Ifdef {
        name: String,
    },
    Ifndef {
        name: String,
    },
    Elif {
        condition: String,
    },
    Else,
    Endif,
    Line {
        number: usize,
        file: Option<String>,
    },
    Pragma {
        content: String,
    },
    Error {
        message: String,
    },
    Warning {
        message: String,
    },
    /// Null directive, `#ident`, or an input line marker
    Unknown {
        content: String,
    },
    Text(String),
}

/// A directive together with the source line it starts on
#[derive(Debug, Clone, PartialEq)]
pub struct SourceDirective {
    pub line: usize,
    pub directive: Directive,
}

/// The tokens of one directive line after its name
struct Operands<'t> {
    tokens: std::slice::Iter<'t, Token>,
}

impl<'t> Operands<'t> {
    fn new(tokens: &'t [Token]) -> Self {
        Self { tokens: tokens.iter() }
    }

    /// Next token of the line, blanks included
    fn next_raw(&mut self) -> Option<&'t Token> {
        self.tokens
            .next()
            .filter(|t| !matches!(t.token_type, TokenType::Newline | TokenType::Eof))
    }

    /// Next token of the line that is not a blank
    fn next_significant(&mut self) -> Option<&'t Token> {
        loop {
            match self.next_raw() {
                Some(token) if token.token_type.is_blank() => continue,
                other => return other,
            }
        }
    }

    fn next_is(&self, token_type: &TokenType) -> bool {
        self.tokens.clone().next().is_some_and(|t| &t.token_type == token_type)
    }

    fn identifier(&mut self, directive: &str, line: usize) -> Result<String> {
        match self.next_significant().map(|t| &t.token_type) {
            Some(TokenType::Identifier(name)) => Ok(name.clone()),
            _ => Err(anyhow!("Expected identifier in {} directive at line {}", directive, line)),
        }
    }

    /// The rest of the line with comments as spaces, trimmed
    fn remainder(&mut self) -> String {
        let mut text = String::new();
        while let Some(token) = self.next_raw() {
            match token.token_type {
                TokenType::Comment(_) => text.push(' '),
                _ => text.push_str(&token.text),
            }
        }
        text.trim().to_string()
    }
}

/// Group `tokens` into directives and the text between them
pub fn parse(tokens: &[Token]) -> Result<Vec<SourceDirective>> {
    let mut directives = Vec::new();
    let mut text = String::new();
    let mut text_line = 1;

    for line in tokens.split_inclusive(|t| t.token_type == TokenType::Newline) {
        let directive = line.iter().enumerate().find(|(_, t)| !t.token_type.is_blank()).and_then(
            |(index, token)| match token.token_type {
                TokenType::Directive(kind) => Some((index, token, kind)),
                _ => None,
            },
        );

        let Some((index, token, kind)) = directive else {
            for token in line.iter().filter(|t| t.token_type != TokenType::Eof) {
                if text.is_empty() {
                    text_line = token.line;
                }
                match &token.token_type {
                    // Comments become a space, keeping their line breaks
                    TokenType::Comment(comment) => {
                        text.push(' ');
                        text.extend(comment.matches('\n'));
                    }
                    _ => text.push_str(&token.text),
                }
            }
            continue;
        };

        if !text.is_empty() {
            directives.push(SourceDirective {
                line: text_line,
                directive: Directive::Text(std::mem::take(&mut text)),
            });
        }
        let operands = Operands::new(&line[index + 1..]);
        directives.push(SourceDirective {
            line: token.line,
            directive: parse_directive(kind, token, operands)?,
        });
    }

    if !text.is_empty() {
        directives.push(SourceDirective {
            line: text_line,
            directive: Directive::Text(text),
        });
    }
    Ok(directives)
}

fn parse_directive(kind: DirectiveKind, hash: &Token, mut operands: Operands<'_>) -> Result<Directive> {
    let line = hash.line;
    Ok(match kind {
        DirectiveKind::Include => parse_include(&mut operands, false, line)?,
        DirectiveKind::IncludeNext => parse_include(&mut operands, true, line)?,
        DirectiveKind::Define => parse_define(&mut operands, line)?,
        DirectiveKind::Undef => Directive::Undef {
            name: operands.identifier("undef", line)?,
        },
        DirectiveKind::Ifdef => Directive::Ifdef {
            name: operands.identifier("ifdef", line)?,
        },
        DirectiveKind::Ifndef => Directive::Ifndef {
            name: operands.identifier("ifndef", line)?,
        },
        DirectiveKind::If => Directive::If {
            condition: operands.remainder(),
        },
        DirectiveKind::Elif => Directive::Elif {
            condition: operands.remainder(),
        },
        DirectiveKind::Else => Directive::Else,
        DirectiveKind::Endif => Directive::Endif,
        DirectiveKind::Line => parse_line(&mut operands)?,
        DirectiveKind::Pragma => Directive::Pragma {
            content: operands.remainder(),
        },
        DirectiveKind::Error => Directive::Error {
            message: operands.remainder(),
        },
        DirectiveKind::Warning => Directive::Warning {
            message: operands.remainder(),
        },
        DirectiveKind::Other => {
            let content = format!("{} {}", hash.text.trim_start_matches('#'), operands.remainder());
            Directive::Unknown {
                content: content.trim().to_string(),
            }
        }
    })
}

fn parse_include(operands: &mut Operands<'_>, is_next: bool, line: usize) -> Result<Directive> {
    let (path, is_system) = match operands.next_significant().map(|t| &t.token_type) {
        Some(TokenType::StringLiteral(path)) => (path.clone(), false),
        Some(TokenType::Less) => {
            let mut path = String::new();
            loop {
                match operands.next_raw() {
                    Some(token) if token.token_type == TokenType::Greater => break,
                    Some(token) => path.push_str(&token.text),
                    None => return Err(anyhow!("Unterminated include directive at line {}", line)),
                }
            }
            (path, true)
        }
        _ => return Err(anyhow!("Invalid include directive at line {}", line)),
    };
    Ok(Directive::Include {
        path,
        is_system,
        is_next,
    })
}

fn parse_define(operands: &mut Operands<'_>, line: usize) -> Result<Directive> {
    let name = operands.identifier("define", line)?;

    // Function-like only when `(` touches the name
    let (params, is_variadic) = if operands.next_is(&TokenType::LeftParen) {
        operands.next_raw();
        let (params, is_variadic) = parse_macro_params(operands, line)?;
        (Some(params), is_variadic)
    } else {
        (None, false)
    };

    Ok(Directive::Define {
        name,
        params,
        body: operands.remainder(),
        is_variadic,
    })
}

/// Parameters after the opening parenthesis, through the closing one
fn parse_macro_params(operands: &mut Operands<'_>, line: usize) -> Result<(Vec<String>, bool)> {
    let mut params = Vec::new();
    loop {
        match operands.next_significant().map(|t| &t.token_type) {
            Some(TokenType::RightParen) if params.is_empty() => return Ok((params, false)),
            Some(TokenType::Ellipsis) => {
                return match operands.next_significant().map(|t| &t.token_type) {
                    Some(TokenType::RightParen) => Ok((params, true)),
                    _ => Err(anyhow!("Expected ')' after '...' in macro parameters at line {}", line)),
                };
            }
            Some(TokenType::Identifier(name)) => params.push(name.clone()),
            _ => return Err(anyhow!("Expected parameter name in macro definition at line {}", line)),
        }

        match operands.next_significant().map(|t| &t.token_type) {
            Some(TokenType::Comma) => {}
            Some(TokenType::RightParen) => return Ok((params, false)),
            Some(TokenType::Ellipsis) => return Err(anyhow!("Named variadic macro parameters are not supported")),
            _ => return Err(anyhow!("Expected ',' or ')' in macro parameters at line {}", line)),
        }
    }
}

fn parse_line(operands: &mut Operands<'_>) -> Result<Directive> {
    let number = match operands.next_significant().map(|t| &t.token_type) {
        Some(TokenType::Number(n)) => n.parse::<usize>().map_err(|_| anyhow!("Invalid line number '{}'", n))?,
        _ => return Err(anyhow!("Expected line number in line directive")),
    };
    let file = match operands.next_significant().map(|t| &t.token_type) {
        Some(TokenType::StringLiteral(file)) => Some(file.clone()),
        _ => None,
    };
    Ok(Directive::Line { number, file })
}
