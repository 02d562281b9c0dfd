//! Top-level declarations of a header
//!
//! The front end only keeps what the generator consumes: typedefs,
//! function prototypes, function definitions (recorded so they can be
//! skipped) and object declarations.

use crate::types::{FunctionType, Parameter, TypeExpr};
use checkgen_common::SourceLocation;
use serde::{Deserialize, Serialize};

/// Which file of the translation unit a declaration was written in
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Origin {
    /// The header handed to the front end
    MainFile,
    /// A header it includes, directly or not
    Included(String),
}

impl Origin {
    pub fn is_main_file(&self) -> bool {
        matches!(self, Origin::MainFile)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Typedef {
    pub name: String,
    pub ty: TypeExpr,
    pub location: SourceLocation,
    pub origin: Origin,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FunctionSignature {
    pub name: String,
    pub parameters: Vec<Parameter>,
    pub return_type: TypeExpr,
    pub is_variadic: bool,
    pub location: SourceLocation,
    pub origin: Origin,
}

impl FunctionSignature {
    pub fn new(name: String, function: FunctionType, location: SourceLocation, origin: Origin) -> Self {
        Self {
            name,
            parameters: function.parameters,
            return_type: function.return_type,
            is_variadic: function.is_variadic,
            location,
            origin,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Declaration {
    Typedef(Typedef),
    /// A prototype without a body
    Function(FunctionSignature),
    /// A function with a body, such as a `static inline` helper
    FunctionDefinition(FunctionSignature),
    Variable {
        name: String,
        ty: TypeExpr,
        location: SourceLocation,
        origin: Origin,
    },
}

impl Declaration {
    pub fn name(&self) -> &str {
        match self {
            Declaration::Typedef(typedef) => &typedef.name,
            Declaration::Function(function) | Declaration::FunctionDefinition(function) => &function.name,
            Declaration::Variable { name, .. } => name,
        }
    }

    pub fn origin(&self) -> &Origin {
        match self {
            Declaration::Typedef(typedef) => &typedef.origin,
            Declaration::Function(function) | Declaration::FunctionDefinition(function) => &function.origin,
            Declaration::Variable { origin, .. } => origin,
        }
    }
}

/// Ordered top-level declarations of one preprocessed header
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TranslationUnit {
    /// Name the main header is reported under in line markers
    pub main_file: String,
    pub declarations: Vec<Declaration>,
}
