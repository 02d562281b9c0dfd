//! Header front end for the checked header generator
//!
//! Turns a C header into an ordered list of top-level declarations:
//! - Lexer: tokenizes preprocessed C and follows line markers
//! - Parser: parses declarations, skipping bodies and initializers
//! - Front ends: the builtin preprocessor or an external `cpp` program

pub mod ast;
pub mod cpp;
pub mod lexer;
pub mod parser;
pub mod types;

pub use ast::{Declaration, FunctionSignature, Origin, TranslationUnit, Typedef};
pub use cpp::ExternalFrontEnd;
pub use lexer::{Lexer, Token, TokenType};
pub use parser::{ParseError, Parser};
pub use types::{declare, parameter_list, FunctionType, Parameter, Qualifiers, TagKind, TypeExpr};

use checkgen_common::{GeneratorError, SourceLocation};
use checkgen_preprocessor::Preprocessor;
use std::fs;
use std::path::{Path, PathBuf};

/// Definitions that hide compiler extensions the parser does not model
pub const NEUTRALIZING_DEFINES: &[&str] = &[
    "__attribute__(x)=",
    "__asm__(x)=",
    "__asm(x)=",
    "__builtin_va_list=int",
    "__extension__=",
    "__inline__=",
    "__restrict=",
    "__restrict__=",
    "_Static_assert(x, y)=",
    "__signed=",
    "__volatile__(x)=",
    "static_assert(x, y)=",
];

/// Preprocessing options shared by every front end
#[derive(Debug, Clone, Default)]
pub struct FrontEndOptions {
    /// `NAME`, `NAME=VALUE` or `NAME(args)=BODY`, applied after
    /// [`NEUTRALIZING_DEFINES`]
    pub defines: Vec<String>,
    pub include_dirs: Vec<PathBuf>,
    /// External preprocessor program; the builtin one is used when unset
    pub cpp: Option<String>,
}

impl FrontEndOptions {
    /// Every definition to apply, neutralizing ones first
    pub fn all_defines(&self) -> impl Iterator<Item = &str> {
        NEUTRALIZING_DEFINES
            .iter()
            .copied()
            .chain(self.defines.iter().map(String::as_str))
    }
}

/// Produces the declarations of a header
pub trait FrontEnd: Send + Sync {
    fn parse_header(&self, path: &Path, options: &FrontEndOptions) -> Result<TranslationUnit, GeneratorError>;
}

/// Select the front end named by the options
pub fn front_end_for(options: &FrontEndOptions) -> Result<Box<dyn FrontEnd>, GeneratorError> {
    match &options.cpp {
        Some(program) => Ok(Box::new(ExternalFrontEnd::locate(program)?)),
        None => Ok(Box::new(BuiltinFrontEnd)),
    }
}

/// Front end backed by the in-tree preprocessor
#[derive(Debug, Clone, Copy, Default)]
pub struct BuiltinFrontEnd;

impl FrontEnd for BuiltinFrontEnd {
    fn parse_header(&self, path: &Path, options: &FrontEndOptions) -> Result<TranslationUnit, GeneratorError> {
        let source = fs::read_to_string(path).map_err(|e| GeneratorError::IoError {
            message: format!("cannot read '{}': {}", path.display(), e),
        })?;
        let main_file = path.display().to_string();
        let failed = |e: anyhow::Error| {
            GeneratorError::parse_error(format!("preprocessing failed: {:#}", e), SourceLocation::new(&main_file, 1, 1))
        };

        let mut preprocessor = Preprocessor::new();
        for define in options.all_defines() {
            preprocessor.define_from_spec(define).map_err(failed)?;
        }
        for dir in &options.include_dirs {
            preprocessor.add_include_dir(dir.clone());
        }

        let text = preprocessor.process(&source, path.to_path_buf()).map_err(failed)?;
        parse_source(&text, &main_file)
    }
}

/// Parse preprocessed source whose main file is reported as `main_file`
pub fn parse_source(source: &str, main_file: &str) -> Result<TranslationUnit, GeneratorError> {
    let tokens = Lexer::new(source, main_file).tokenize()?;
    let mut parser = Parser::new(tokens, main_file);
    let unit = parser.parse_translation_unit()?;
    log::debug!("{}: {} top-level declarations", main_file, unit.declarations.len());
    Ok(unit)
}
