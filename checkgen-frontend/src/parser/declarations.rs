//! Top-level declaration parsing
//!
//! Handles typedefs, prototypes, function definitions, object
//! declarations and `extern "C"` blocks.

use crate::ast::{Declaration, FunctionSignature, Typedef};
use crate::lexer::TokenType;
use crate::parser::errors::ParseError;
use crate::parser::types::StorageClass;
use crate::parser::Parser;
use crate::types::TypeExpr;
use log::debug;

impl Parser {
    /// Parse a top-level item. One declaration may declare several names;
    /// `extern "C"` braces and stray semicolons declare none.
    pub fn parse_top_level_item(&mut self) -> Result<Vec<Declaration>, ParseError> {
        if self.match_token(&TokenType::Semicolon) {
            return Ok(Vec::new());
        }

        if self.check(&TokenType::Extern)
            && matches!(self.peek_nth(1).map(|t| &t.token_type), Some(TokenType::StringLiteral(_)))
        {
            self.advance();
            self.advance();
            if self.match_token(&TokenType::LeftBrace) {
                self.extern_c_depth += 1;
                return Ok(Vec::new());
            }
        }

        if self.extern_c_depth > 0 && self.match_token(&TokenType::RightBrace) {
            self.extern_c_depth -= 1;
            return Ok(Vec::new());
        }

        let specifiers = self.parse_declaration_specifiers()?;

        // Tag declaration or definition only
        if self.match_token(&TokenType::Semicolon) {
            return Ok(Vec::new());
        }

        let mut declarations = Vec::new();
        loop {
            let declarator = self.parse_declarator()?;
            let Some(name) = declarator.name.clone() else {
                return Err(self.unexpected("a declarator name"));
            };
            let location = declarator.location.clone();
            let origin = self.origin_of(&location);
            let ty = declarator.apply(specifiers.base.clone());

            if specifiers.storage == Some(StorageClass::Typedef) {
                debug!("{}: typedef {} = {}", location, name, ty);
                self.typedef_names.insert(name.clone());
                declarations.push(Declaration::Typedef(Typedef {
                    name,
                    ty,
                    location,
                    origin,
                }));
            } else if let TypeExpr::Function(function) = ty {
                let signature = FunctionSignature::new(name, *function, location, origin);
                if declarations.is_empty() && self.check(&TokenType::LeftBrace) {
                    debug!(
                        "{}: skipping body of {}function '{}'",
                        signature.location,
                        if specifiers.is_inline { "inline " } else { "" },
                        signature.name
                    );
                    self.skip_balanced()?;
                    declarations.push(Declaration::FunctionDefinition(signature));
                    return Ok(declarations);
                }
                declarations.push(Declaration::Function(signature));
            } else {
                if self.match_token(&TokenType::Equal) {
                    self.skip_initializer()?;
                }
                declarations.push(Declaration::Variable {
                    name,
                    ty,
                    location,
                    origin,
                });
            }

            if !self.match_token(&TokenType::Comma) {
                break;
            }
        }

        self.expect(TokenType::Semicolon, "declaration")?;
        Ok(declarations)
    }

    /// Skip a bracketed group starting at the current opening token
    pub(crate) fn skip_balanced(&mut self) -> Result<(), ParseError> {
        let mut depth = 0usize;
        loop {
            let Some(token) = self.advance() else {
                return Err(self.unexpected("a closing bracket"));
            };
            match token.token_type {
                TokenType::LeftParen | TokenType::LeftBracket | TokenType::LeftBrace => depth += 1,
                TokenType::RightParen | TokenType::RightBracket | TokenType::RightBrace => {
                    depth = depth.saturating_sub(1);
                    if depth == 0 {
                        return Ok(());
                    }
                }
                _ => {}
            }
        }
    }

    /// Skip an initializer up to the `,` or `;` that ends it
    fn skip_initializer(&mut self) -> Result<(), ParseError> {
        loop {
            match self.peek_type() {
                None => return Err(self.unexpected("';' after initializer")),
                Some(TokenType::Comma) | Some(TokenType::Semicolon) => return Ok(()),
                Some(TokenType::LeftParen) | Some(TokenType::LeftBracket) | Some(TokenType::LeftBrace) => {
                    self.skip_balanced()?;
                }
                Some(_) => {
                    self.advance();
                }
            }
        }
    }
}
