//! Declaration parser
//!
//! A recursive descent parser for the declaration subset of C. Function
//! bodies, initializers, tag bodies and array sizes are skipped by bracket
//! matching; everything the generator needs (typedefs and prototypes) is
//! parsed into [`Declaration`]s.
//!
//! Included headers are parsed leniently: a declaration that cannot be
//! parsed there is logged and skipped. The main header is parsed strictly.

pub mod errors;
pub mod types;
pub mod declarations;

use crate::ast::{Declaration, Origin, TranslationUnit};
use crate::lexer::{Token, TokenType};
use checkgen_common::{GeneratorError, SourceLocation};
use log::warn;
use std::collections::{HashSet, VecDeque};

pub use errors::ParseError;

/// Declaration parser
pub struct Parser {
    pub(crate) tokens: VecDeque<Token>,
    pub(crate) main_file: String,
    /// Names declared by typedefs so far
    pub(crate) typedef_names: HashSet<String>,
    /// Open `extern "C" {` blocks
    pub(crate) extern_c_depth: usize,
    eof_location: SourceLocation,
}

impl Parser {
    /// Create a parser for the tokens of a header reported as `main_file`
    pub fn new(tokens: Vec<Token>, main_file: &str) -> Self {
        let mut tokens: VecDeque<Token> = tokens.into();
        let eof_location = match tokens.back() {
            Some(last) if last.token_type == TokenType::EndOfFile => last.span.start.clone(),
            Some(last) => last.span.end.clone(),
            None => SourceLocation::new(main_file, 1, 1),
        };
        if matches!(tokens.back(), Some(t) if t.token_type == TokenType::EndOfFile) {
            tokens.pop_back();
        }

        Self {
            tokens,
            main_file: main_file.to_string(),
            typedef_names: HashSet::new(),
            extern_c_depth: 0,
            eof_location,
        }
    }

    /// Peek at current token without consuming
    pub(crate) fn peek(&self) -> Option<&Token> {
        self.tokens.front()
    }

    /// Peek `offset` tokens ahead
    pub(crate) fn peek_nth(&self, offset: usize) -> Option<&Token> {
        self.tokens.get(offset)
    }

    pub(crate) fn peek_type(&self) -> Option<&TokenType> {
        self.peek().map(|t| &t.token_type)
    }

    /// Get current token and advance
    pub(crate) fn advance(&mut self) -> Option<Token> {
        self.tokens.pop_front()
    }

    /// Check if current token matches expected type
    pub(crate) fn check(&self, token_type: &TokenType) -> bool {
        if let Some(token) = self.peek() {
            std::mem::discriminant(&token.token_type) == std::mem::discriminant(token_type)
        } else {
            matches!(token_type, TokenType::EndOfFile)
        }
    }

    /// Consume token if it matches expected type
    pub(crate) fn match_token(&mut self, token_type: &TokenType) -> bool {
        if self.check(token_type) && self.peek().is_some() {
            self.advance();
            true
        } else {
            false
        }
    }

    /// Expect and consume a specific token type. A mismatching token is
    /// left in place so recovery can resynchronize from it.
    pub(crate) fn expect(&mut self, token_type: TokenType, context: &str) -> Result<Token, ParseError> {
        if self.check(&token_type) {
            if let Some(token) = self.advance() {
                return Ok(token);
            }
        }
        Err(self.unexpected(&format!("'{}' in {}", token_type, context)))
    }

    /// Error for the current token (or end of file)
    pub(crate) fn unexpected(&self, expected: &str) -> ParseError {
        match self.peek() {
            Some(token) => ParseError::UnexpectedToken {
                expected: expected.to_string(),
                found: token.clone(),
            },
            None => ParseError::UnexpectedEndOfFile {
                expected: expected.to_string(),
                location: self.eof_location.clone(),
            },
        }
    }

    /// Get current location for error reporting
    pub(crate) fn current_location(&self) -> SourceLocation {
        match self.peek() {
            Some(token) => token.span.start.clone(),
            None => self.eof_location.clone(),
        }
    }

    pub(crate) fn origin_of(&self, location: &SourceLocation) -> Origin {
        if location.filename == self.main_file {
            Origin::MainFile
        } else {
            Origin::Included(location.filename.clone())
        }
    }

    /// Parse a complete translation unit
    pub fn parse_translation_unit(&mut self) -> Result<TranslationUnit, GeneratorError> {
        let mut declarations: Vec<Declaration> = Vec::new();

        while self.peek().is_some() {
            let start = self.current_location();
            match self.parse_top_level_item() {
                Ok(items) => declarations.extend(items),
                Err(err) if start.filename != self.main_file && err.location().filename != self.main_file => {
                    warn!(
                        "{}: skipping declaration that cannot be parsed: {}",
                        start,
                        GeneratorError::from(err)
                    );
                    self.synchronize();
                }
                Err(err) => return Err(err.into()),
            }
        }

        Ok(TranslationUnit {
            main_file: self.main_file.clone(),
            declarations,
        })
    }

    /// Skip to the end of the current top-level declaration
    fn synchronize(&mut self) {
        let mut depth = 0usize;
        while let Some(token) = self.advance() {
            match token.token_type {
                TokenType::LeftParen | TokenType::LeftBracket | TokenType::LeftBrace => depth += 1,
                TokenType::RightParen | TokenType::RightBracket => depth = depth.saturating_sub(1),
                TokenType::RightBrace => {
                    depth = depth.saturating_sub(1);
                    if depth == 0 {
                        self.match_token(&TokenType::Semicolon);
                        return;
                    }
                }
                TokenType::Semicolon if depth == 0 => return,
                _ => {}
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::FunctionSignature;
    use crate::lexer::Lexer;
    use crate::types::{Qualifiers, TagKind, TypeExpr};
    use indoc::indoc;
    use pretty_assertions::assert_eq;

    fn parse(input: &str) -> Result<TranslationUnit, GeneratorError> {
        let tokens = Lexer::new(input, "api.h").tokenize()?;
        Parser::new(tokens, "api.h").parse_translation_unit()
    }

    fn functions(unit: &TranslationUnit) -> Vec<&FunctionSignature> {
        unit.declarations
            .iter()
            .filter_map(|d| match d {
                Declaration::Function(f) => Some(f),
                _ => None,
            })
            .collect()
    }

    fn const_char_ptr() -> TypeExpr {
        TypeExpr::pointer(TypeExpr::qualified(Qualifiers::CONST, TypeExpr::scalar("char")))
    }

    #[test]
    fn test_simple_prototype() {
        let unit = parse("int add(int a, int b);").unwrap();
        let add = functions(&unit)[0];
        assert_eq!(add.name, "add");
        assert_eq!(add.return_type, TypeExpr::scalar("int"));
        assert_eq!(add.parameters.len(), 2);
        assert_eq!(add.parameters[1].name.as_deref(), Some("b"));
        assert!(!add.is_variadic);
        assert_eq!(add.origin, Origin::MainFile);
        assert_eq!(add.location, SourceLocation::new("api.h", 1, 5));
    }

    #[test]
    fn test_pointer_return_and_qualified_parameter() {
        let unit = parse("char *dup(const char *s);").unwrap();
        let dup = functions(&unit)[0];
        assert_eq!(dup.return_type, TypeExpr::pointer(TypeExpr::scalar("char")));
        assert_eq!(dup.parameters[0].ty, const_char_ptr());
    }

    #[test]
    fn test_variadic_prototype() {
        let unit = parse("void log_msg(const char *fmt, ...);").unwrap();
        let log_msg = functions(&unit)[0];
        assert!(log_msg.is_variadic);
        assert_eq!(log_msg.parameters.len(), 1);
        assert!(log_msg.return_type.is_void());
    }

    #[test]
    fn test_void_and_empty_parameter_lists() {
        let unit = parse("int a(void);\nint b();\nvoid *c(void *);").unwrap();
        let fns = functions(&unit);
        assert!(fns[0].parameters.is_empty());
        assert!(fns[1].parameters.is_empty());
        assert_eq!(fns[2].parameters[0].name, None);
        assert_eq!(fns[2].parameters[0].ty, TypeExpr::pointer(TypeExpr::scalar("void")));
    }

    #[test]
    fn test_scalar_keywords_are_normalized() {
        let unit = parse("long unsigned int f(short signed x, long long y, unsigned z, char unsigned c);").unwrap();
        let f = functions(&unit)[0];
        assert_eq!(f.return_type, TypeExpr::scalar("unsigned long"));
        let types: Vec<_> = f.parameters.iter().map(|p| p.ty.clone()).collect();
        assert_eq!(
            types,
            vec![
                TypeExpr::scalar("short"),
                TypeExpr::scalar("long long"),
                TypeExpr::scalar("unsigned int"),
                TypeExpr::scalar("unsigned char"),
            ]
        );
    }

    #[test]
    fn test_typedefs() {
        let input = indoc! {"
            typedef unsigned int uint32_t;
            typedef struct Module *module_t, **module_list_t;
            typedef struct { int x; int y; } point_t;
            typedef enum color { RED, GREEN = 2 } color_t;
            typedef int (*compare_fn)(const void *, const void *);
        "};
        let unit = parse(input).unwrap();
        let typedefs: Vec<_> = unit
            .declarations
            .iter()
            .filter_map(|d| match d {
                Declaration::Typedef(t) => Some((t.name.as_str(), t.ty.clone())),
                _ => None,
            })
            .collect();

        assert_eq!(typedefs[0], ("uint32_t", TypeExpr::scalar("unsigned int")));
        assert_eq!(typedefs[1], ("module_t", TypeExpr::pointer(TypeExpr::tag(TagKind::Struct, "Module"))));
        assert_eq!(
            typedefs[2],
            (
                "module_list_t",
                TypeExpr::pointer(TypeExpr::pointer(TypeExpr::tag(TagKind::Struct, "Module")))
            )
        );
        assert_eq!(typedefs[3], ("point_t", TypeExpr::Tag { kind: TagKind::Struct, name: None }));
        assert_eq!(typedefs[4], ("color_t", TypeExpr::tag(TagKind::Enum, "color")));
        assert!(matches!(&typedefs[5].1, TypeExpr::Pointer(inner) if matches!(**inner, TypeExpr::Function(_))));
    }

    #[test]
    fn test_typedef_names_as_types() {
        let input = indoc! {"
            typedef struct WASMModuleCommon *wasm_module_t;
            wasm_module_t wasm_runtime_load(uint8_t *buf, uint32_t size, char *error_buf);
        "};
        let unit = parse(input).unwrap();
        let load = functions(&unit)[0];
        assert_eq!(load.return_type, TypeExpr::typedef_ref("wasm_module_t"));
        assert_eq!(load.parameters[0].ty, TypeExpr::pointer(TypeExpr::typedef_ref("uint8_t")));
        assert_eq!(load.parameters[1].ty, TypeExpr::typedef_ref("uint32_t"));
    }

    #[test]
    fn test_function_pointer_parameter_and_array_parameter() {
        let unit = parse("int run(int (*cb)(void *ctx), char name[32], int rows[][4]);").unwrap();
        let run = functions(&unit)[0];
        assert_eq!(run.parameters[0].name.as_deref(), Some("cb"));
        assert!(matches!(&run.parameters[0].ty, TypeExpr::Pointer(inner) if matches!(**inner, TypeExpr::Function(_))));
        assert_eq!(
            run.parameters[1].ty,
            TypeExpr::Array { element: Box::new(TypeExpr::scalar("char")), size: Some("32".to_string()) }
        );
        assert_eq!(run.parameters[2].ty.to_string(), "int [][4]");
    }

    #[test]
    fn test_function_returning_function_pointer() {
        let unit = parse("void (*signal(int sig, void (*handler)(int)))(int);").unwrap();
        let signal = functions(&unit)[0];
        assert_eq!(signal.name, "signal");
        assert_eq!(signal.parameters.len(), 2);
        assert_eq!(signal.return_type.to_string(), "void (*)(int)");
    }

    #[test]
    fn test_bodies_initializers_and_definitions_are_skipped() {
        let input = indoc! {"
            static inline int twice(int x) { return x * 2; }
            extern const int table[3];
            int counter = (1 + 2) * 3, limit = 4;
            struct config { int a; struct { char b; } nested; };
            enum { FLAG_A = 1 << 0, FLAG_B = 1 << 1 };
            int after(void);
        "};
        let unit = parse(input).unwrap();
        let names: Vec<_> = unit.declarations.iter().map(|d| d.name()).collect();
        assert_eq!(names, vec!["twice", "table", "counter", "limit", "after"]);
        assert!(matches!(unit.declarations[0], Declaration::FunctionDefinition(_)));
        assert!(matches!(unit.declarations[4], Declaration::Function(_)));
    }

    #[test]
    fn test_extern_c_block_is_tolerated() {
        let input = "extern \"C\" {\nint f(void);\n}\nextern \"C\" int g(void);\n";
        let unit = parse(input).unwrap();
        let names: Vec<_> = functions(&unit).iter().map(|f| f.name.clone()).collect();
        assert_eq!(names, vec!["f", "g"]);
    }

    #[test]
    fn test_specifiers_and_qualifiers_in_any_order() {
        let unit = parse("extern _Noreturn void stop(int const code, char *restrict out);").unwrap();
        let stop = functions(&unit)[0];
        assert_eq!(stop.parameters[0].ty, TypeExpr::qualified(Qualifiers::CONST, TypeExpr::scalar("int")));
        assert_eq!(stop.parameters[1].ty.to_string(), "char *restrict");
    }

    #[test]
    fn test_origin_follows_line_markers() {
        let input = "# 1 \"api.h\"\n# 1 \"types.h\" 1\ntypedef int handle_t;\nint helper(void);\n# 2 \"api.h\" 2\nhandle_t open_handle(void);\n";
        let unit = parse(input).unwrap();
        assert_eq!(unit.declarations[0].origin(), &Origin::Included("types.h".to_string()));
        assert_eq!(unit.declarations[1].origin(), &Origin::Included("types.h".to_string()));
        assert_eq!(unit.declarations[2].origin(), &Origin::MainFile);
    }

    #[test]
    fn test_error_in_included_header_is_recovered() {
        let input = "# 1 \"sys.h\"\nint broken(int x;\ntypedef int ok_t;\n# 1 \"api.h\"\nok_t f(void);\n";
        let unit = parse(input).unwrap();
        let names: Vec<_> = unit.declarations.iter().map(|d| d.name()).collect();
        assert_eq!(names, vec!["ok_t", "f"]);
    }

    #[test]
    fn test_error_in_main_header_fails() {
        let err = parse("int broken(int x;\nint fine(void);\n").unwrap_err();
        match err {
            GeneratorError::ParseError { location, .. } => assert_eq!(location.filename, "api.h"),
            other => panic!("Expected parse error, got {other:?}"),
        }
    }

    #[test]
    fn test_missing_semicolon_at_end_of_file() {
        let err = parse("int f(void)").unwrap_err();
        assert!(err.to_string().contains("end of file"));
    }
}
