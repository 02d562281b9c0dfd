//! Declaration specifiers and declarators
//!
//! Declarators are parsed into a list of derivations (pointer, array,
//! function) that is folded over the specifier type, so `int *(*f)(void)`
//! becomes pointer-to-function-returning-pointer-to-int.

use crate::lexer::TokenType;
use crate::parser::errors::ParseError;
use crate::parser::Parser;
use crate::types::{FunctionType, Parameter, Qualifiers, TagKind, TypeExpr};
use checkgen_common::SourceLocation;

/// Storage class specifier
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StorageClass {
    Typedef,
    Extern,
    Static,
    Auto,
    Register,
}

/// Everything before the declarators of a declaration
#[derive(Debug, Clone)]
pub struct DeclSpecifiers {
    pub storage: Option<StorageClass>,
    pub is_inline: bool,
    pub base: TypeExpr,
}

#[derive(Debug, Clone)]
pub(crate) enum Derivation {
    Pointer(Qualifiers),
    Array(Option<String>),
    Function { parameters: Vec<Parameter>, is_variadic: bool },
}

/// A parsed declarator, not yet applied to its specifier type
#[derive(Debug, Clone)]
pub(crate) struct Declarator {
    pub name: Option<String>,
    pub location: SourceLocation,
    /// Applied to the base type first to last
    pub derivations: Vec<Derivation>,
}

impl Declarator {
    pub fn apply(self, base: TypeExpr) -> TypeExpr {
        self.derivations.into_iter().fold(base, |ty, derivation| match derivation {
            Derivation::Pointer(qualifiers) => TypeExpr::qualified(qualifiers, TypeExpr::pointer(ty)),
            Derivation::Array(size) => TypeExpr::Array {
                element: Box::new(ty),
                size,
            },
            Derivation::Function { parameters, is_variadic } => TypeExpr::Function(Box::new(FunctionType {
                return_type: ty,
                parameters,
                is_variadic,
            })),
        })
    }
}

/// Builtin type keywords seen in one specifier list
#[derive(Debug, Default)]
struct ScalarWords {
    void: u32,
    bool: u32,
    char: u32,
    short: u32,
    int: u32,
    long: u32,
    float: u32,
    double: u32,
    signed: u32,
    unsigned: u32,
    complex: u32,
}

impl ScalarWords {
    fn is_empty(&self) -> bool {
        self.void + self.bool + self.char + self.short + self.int + self.long
            + self.float + self.double + self.signed + self.unsigned + self.complex
            == 0
    }

    fn add(&mut self, token: &TokenType) {
        match token {
            TokenType::Void => self.void += 1,
            TokenType::Bool => self.bool += 1,
            TokenType::Char => self.char += 1,
            TokenType::Short => self.short += 1,
            TokenType::Int => self.int += 1,
            TokenType::Long => self.long += 1,
            TokenType::Float => self.float += 1,
            TokenType::Double => self.double += 1,
            TokenType::Signed => self.signed += 1,
            TokenType::Unsigned => self.unsigned += 1,
            TokenType::Complex => self.complex += 1,
            _ => {}
        }
    }

    /// Canonical spelling: `unsigned` prefix, `int` dropped after
    /// `short`/`long`, plain `signed` folded away except for `char`
    fn canonical(&self) -> Result<String, String> {
        if self.signed > 0 && self.unsigned > 0 {
            return Err("both 'signed' and 'unsigned' in declaration specifiers".to_string());
        }
        if self.long > 2 {
            return Err("too many 'long' specifiers".to_string());
        }
        let complex = if self.complex > 0 { " _Complex" } else { "" };
        let unsigned = if self.unsigned > 0 { "unsigned " } else { "" };

        let name = if self.void > 0 {
            "void".to_string()
        } else if self.bool > 0 {
            "_Bool".to_string()
        } else if self.float > 0 {
            format!("float{complex}")
        } else if self.double > 0 {
            let long = if self.long > 0 { "long " } else { "" };
            format!("{long}double{complex}")
        } else if self.char > 0 {
            let sign = if self.signed > 0 { "signed " } else { unsigned };
            format!("{sign}char")
        } else if self.short > 0 {
            format!("{unsigned}short")
        } else if self.long == 2 {
            format!("{unsigned}long long")
        } else if self.long == 1 {
            format!("{unsigned}long")
        } else if self.complex > 0 {
            "double _Complex".to_string()
        } else {
            format!("{unsigned}int")
        };
        Ok(name)
    }
}

impl Parser {
    /// Parse declaration specifiers. An identifier is taken as a typedef
    /// name when no type specifier has been seen yet in the list.
    pub fn parse_declaration_specifiers(&mut self) -> Result<DeclSpecifiers, ParseError> {
        let location = self.current_location();
        let mut storage = None;
        let mut is_inline = false;
        let mut qualifiers = Qualifiers::default();
        let mut words = ScalarWords::default();
        let mut named: Option<TypeExpr> = None;
        let mut seen_any = false;

        while let Some(token_type) = self.peek_type().cloned() {
            match token_type {
                TokenType::Typedef => storage = Some(StorageClass::Typedef),
                TokenType::Extern => storage = Some(StorageClass::Extern),
                TokenType::Static => storage = Some(StorageClass::Static),
                TokenType::Auto => storage = Some(StorageClass::Auto),
                TokenType::Register => storage = Some(StorageClass::Register),
                TokenType::ThreadLocal => {}
                TokenType::Inline | TokenType::Noreturn => is_inline = true,
                TokenType::Const | TokenType::Volatile | TokenType::Restrict => {
                    qualifiers = qualifiers.union(qualifier(&token_type));
                }
                TokenType::Atomic => {
                    if matches!(self.peek_nth(1).map(|t| &t.token_type), Some(TokenType::LeftParen)) {
                        // `_Atomic(type-name)` specifier
                        self.advance();
                        self.advance();
                        let inner = self.parse_type_name()?;
                        self.expect(TokenType::RightParen, "_Atomic type specifier")?;
                        named = Some(TypeExpr::qualified(qualifier(&TokenType::Atomic), inner));
                        seen_any = true;
                        continue;
                    }
                    qualifiers = qualifiers.union(qualifier(&token_type));
                }
                TokenType::Void | TokenType::Bool | TokenType::Char | TokenType::Short | TokenType::Int
                | TokenType::Long | TokenType::Float | TokenType::Double | TokenType::Signed
                | TokenType::Unsigned | TokenType::Complex => {
                    if named.is_some() {
                        return Err(ParseError::InvalidDeclaration {
                            message: format!("unexpected '{}' after a type name", token_type),
                            location: self.current_location(),
                        });
                    }
                    words.add(&token_type);
                }
                TokenType::Struct | TokenType::Union | TokenType::Enum => {
                    if named.is_some() || !words.is_empty() {
                        return Err(ParseError::InvalidDeclaration {
                            message: format!("unexpected '{}' after a type specifier", token_type),
                            location: self.current_location(),
                        });
                    }
                    named = Some(self.parse_tag_specifier()?);
                    seen_any = true;
                    continue;
                }
                TokenType::Identifier(name) if named.is_none() && words.is_empty() => {
                    named = Some(TypeExpr::TypedefRef(name));
                }
                _ => break,
            }
            self.advance();
            seen_any = true;
        }

        if !seen_any {
            return Err(self.unexpected("declaration specifiers"));
        }

        let base = match named {
            Some(ty) => ty,
            // Implicit int (`static x;`, `unsigned;` handled by the words)
            None if words.is_empty() => TypeExpr::scalar("int"),
            None => {
                let name = words
                    .canonical()
                    .map_err(|message| ParseError::InvalidDeclaration { message, location })?;
                TypeExpr::Scalar(name)
            }
        };

        Ok(DeclSpecifiers {
            storage,
            is_inline,
            base: TypeExpr::qualified(qualifiers, base),
        })
    }

    /// Parse `struct`/`union`/`enum` with an optional tag name and an
    /// optional body; bodies are skipped and the tag stays opaque
    fn parse_tag_specifier(&mut self) -> Result<TypeExpr, ParseError> {
        let kind = match self.advance().map(|t| t.token_type) {
            Some(TokenType::Struct) => TagKind::Struct,
            Some(TokenType::Union) => TagKind::Union,
            _ => TagKind::Enum,
        };

        let name = match self.peek_type() {
            Some(TokenType::Identifier(name)) => {
                let name = name.clone();
                self.advance();
                Some(name)
            }
            _ => None,
        };

        if self.check(&TokenType::LeftBrace) {
            self.skip_balanced()?;
        } else if name.is_none() {
            return Err(self.unexpected(&format!("{} name or body", kind)));
        }

        Ok(TypeExpr::Tag { kind, name })
    }

    /// Parse a declarator; the name is optional so the same routine
    /// handles abstract declarators in parameter lists and type names
    pub(crate) fn parse_declarator(&mut self) -> Result<Declarator, ParseError> {
        let mut location = self.current_location();

        let mut pointers = Vec::new();
        while self.match_token(&TokenType::Star) {
            pointers.push(Derivation::Pointer(self.parse_qualifier_list()));
        }

        let mut name = None;
        let mut inner = Vec::new();
        if self.check(&TokenType::LeftParen) && self.is_nested_declarator() {
            self.advance();
            let nested = self.parse_declarator()?;
            self.expect(TokenType::RightParen, "parenthesized declarator")?;
            name = nested.name;
            location = nested.location;
            inner = nested.derivations;
        } else if let Some(TokenType::Identifier(ident)) = self.peek_type() {
            name = Some(ident.clone());
            location = self.current_location();
            self.advance();
        }

        let mut suffixes = Vec::new();
        loop {
            if self.match_token(&TokenType::LeftBracket) {
                suffixes.push(Derivation::Array(self.parse_array_size()?));
            } else if self.match_token(&TokenType::LeftParen) {
                let (parameters, is_variadic) = self.parse_parameter_list()?;
                suffixes.push(Derivation::Function { parameters, is_variadic });
            } else {
                break;
            }
        }

        let mut derivations = pointers;
        derivations.extend(suffixes.into_iter().rev());
        derivations.extend(inner);

        Ok(Declarator {
            name,
            location,
            derivations,
        })
    }

    /// After `(` in declarator position: a nested declarator such as
    /// `(*fp)` rather than a parameter list
    fn is_nested_declarator(&self) -> bool {
        match self.peek_nth(1).map(|t| &t.token_type) {
            Some(TokenType::Star) | Some(TokenType::LeftParen) | Some(TokenType::LeftBracket) => true,
            Some(TokenType::Identifier(name)) => !self.typedef_names.contains(name),
            _ => false,
        }
    }

    fn parse_qualifier_list(&mut self) -> Qualifiers {
        let mut qualifiers = Qualifiers::default();
        while let Some(token_type) = self.peek_type() {
            match token_type {
                TokenType::Const | TokenType::Volatile | TokenType::Restrict | TokenType::Atomic => {
                    qualifiers = qualifiers.union(qualifier(token_type));
                    self.advance();
                }
                _ => break,
            }
        }
        qualifiers
    }

    /// Parse the parameters after `(` up to and including `)`
    fn parse_parameter_list(&mut self) -> Result<(Vec<Parameter>, bool), ParseError> {
        let mut parameters = Vec::new();
        let mut is_variadic = false;

        if self.match_token(&TokenType::RightParen) {
            return Ok((parameters, false));
        }

        // `(void)` declares no parameters, `(void *p)` does
        if self.check(&TokenType::Void)
            && matches!(self.peek_nth(1).map(|t| &t.token_type), Some(TokenType::RightParen))
        {
            self.advance();
            self.advance();
            return Ok((parameters, false));
        }

        loop {
            if self.match_token(&TokenType::Ellipsis) {
                is_variadic = true;
                break;
            }

            let specifiers = self.parse_declaration_specifiers()?;
            let declarator = self.parse_declarator()?;
            let name = declarator.name.clone();
            parameters.push(Parameter {
                name,
                ty: declarator.apply(specifiers.base),
            });

            if !self.match_token(&TokenType::Comma) {
                break;
            }
        }

        self.expect(TokenType::RightParen, "parameter list")?;
        Ok((parameters, is_variadic))
    }

    /// Array size text after `[` up to and including `]`
    fn parse_array_size(&mut self) -> Result<Option<String>, ParseError> {
        let mut parts = Vec::new();
        let mut depth = 0usize;
        loop {
            let Some(token) = self.advance() else {
                return Err(self.unexpected("']' in array declarator"));
            };
            match token.token_type {
                TokenType::RightBracket if depth == 0 => break,
                TokenType::LeftBracket | TokenType::LeftParen => depth += 1,
                TokenType::RightBracket | TokenType::RightParen => depth = depth.saturating_sub(1),
                _ => {}
            }
            parts.push(token.token_type.to_string());
        }
        Ok(if parts.is_empty() { None } else { Some(parts.join(" ")) })
    }

    /// Parse a type name (specifiers plus abstract declarator)
    pub fn parse_type_name(&mut self) -> Result<TypeExpr, ParseError> {
        let specifiers = self.parse_declaration_specifiers()?;
        let declarator = self.parse_declarator()?;
        Ok(declarator.apply(specifiers.base))
    }
}

fn qualifier(token_type: &TokenType) -> Qualifiers {
    let mut qualifiers = Qualifiers::default();
    match token_type {
        TokenType::Const => qualifiers.is_const = true,
        TokenType::Volatile => qualifiers.is_volatile = true,
        TokenType::Restrict => qualifiers.is_restrict = true,
        TokenType::Atomic => qualifiers.is_atomic = true,
        _ => {}
    }
    qualifiers
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lexer::Lexer;
    use pretty_assertions::assert_eq;

    fn type_name(input: &str) -> TypeExpr {
        let tokens = Lexer::new(input, "t.h").tokenize().unwrap();
        Parser::new(tokens, "t.h").parse_type_name().unwrap()
    }

    #[test]
    fn test_canonical_scalars() {
        assert_eq!(type_name("signed"), TypeExpr::scalar("int"));
        assert_eq!(type_name("unsigned"), TypeExpr::scalar("unsigned int"));
        assert_eq!(type_name("signed char"), TypeExpr::scalar("signed char"));
        assert_eq!(type_name("long int long unsigned"), TypeExpr::scalar("unsigned long long"));
        assert_eq!(type_name("long double"), TypeExpr::scalar("long double"));
        assert_eq!(type_name("_Bool"), TypeExpr::scalar("_Bool"));
        assert_eq!(type_name("double _Complex"), TypeExpr::scalar("double _Complex"));
    }

    #[test]
    fn test_invalid_scalar_combination() {
        let tokens = Lexer::new("signed unsigned x", "t.h").tokenize().unwrap();
        let err = Parser::new(tokens, "t.h").parse_type_name().unwrap_err();
        assert!(matches!(err, ParseError::InvalidDeclaration { .. }));
    }

    #[test]
    fn test_abstract_declarators() {
        assert_eq!(type_name("const char *").to_string(), "const char *");
        assert_eq!(type_name("int (*)[8]").to_string(), "int (*)[8]");
        assert_eq!(type_name("void (*)(int, ...)").to_string(), "void (*)(int, ...)");
    }

    #[test]
    fn test_atomic_specifier() {
        assert_eq!(type_name("_Atomic(int)").to_string(), "_Atomic int");
    }

    #[test]
    fn test_tag_without_name_or_body_is_an_error() {
        let tokens = Lexer::new("struct ;", "t.h").tokenize().unwrap();
        assert!(Parser::new(tokens, "t.h").parse_type_name().is_err());
    }

    #[test]
    fn test_array_size_text() {
        assert_eq!(
            type_name("char [N + 1]"),
            TypeExpr::Array {
                element: Box::new(TypeExpr::scalar("char")),
                size: Some("N + 1".to_string()),
            }
        );
    }
}
