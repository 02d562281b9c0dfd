//! Checked header generator core
//!
//! Two passes over one header's declarations:
//! 1. collect prototypes and typedefs, resolve return types and build the
//!    shared Result schema;
//! 2. synthesize one wrapper plan per prototype and render the header.

pub mod collector;
pub mod emit;
pub mod resolver;
pub mod schema;
pub mod sim;
pub mod synth;

pub use collector::{collect, DeclarationSet};
pub use emit::CheckedHeader;
pub use resolver::{BaseType, ResolvedType, Resolver, TagName};
pub use schema::{ResultSchema, SchemaBuilder, SchemaField};
pub use sim::{simulate, CheckedResult, Invocation, Payload, Value};
pub use synth::{synthesize, Outcome, Step, WrapperSpec};

use checkgen_common::GeneratorError;
use checkgen_frontend::TranslationUnit;
use std::path::Path;

/// Suffix of every generated file stem
pub const OUTPUT_SUFFIX: &str = "_checked";

/// Generator settings that shape the emitted header
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GeneratorOptions {
    /// Name of the shared Result type
    pub result_type: String,
    /// Text placed verbatim before the generated-file banner
    pub preamble: Option<String>,
    /// System includes of the generated header
    pub includes: Vec<String>,
}

impl Default for GeneratorOptions {
    fn default() -> Self {
        Self {
            result_type: "Result".to_string(),
            preamble: None,
            includes: vec![
                "<stdbool.h>".to_string(),
                "<stdint.h>".to_string(),
                "<stdlib.h>".to_string(),
            ],
        }
    }
}

/// Schema and wrappers of one header, ready for rendering
#[derive(Debug, Clone)]
pub struct GenerationPlan {
    pub schema: ResultSchema,
    pub wrappers: Vec<WrapperSpec>,
}

/// Generated header text and where it goes
#[derive(Debug, Clone)]
pub struct GeneratedHeader {
    pub file_name: String,
    pub contents: String,
    pub wrapper_count: usize,
}

/// Run both passes over `unit`
pub fn plan(unit: &TranslationUnit, options: &GeneratorOptions) -> Result<GenerationPlan, GeneratorError> {
    let declarations = collect(unit);
    let mut resolver = Resolver::new(&declarations.typedefs);

    let mut builder = SchemaBuilder::new(&options.result_type);
    let mut return_types = Vec::with_capacity(declarations.functions.len());
    for function in &declarations.functions {
        let resolved = resolver.resolve_expr(&function.return_type, &function.name, &function.location)?;
        builder.add(&resolved);
        return_types.push(resolved);
    }
    let schema = builder.finish();

    let wrappers = declarations
        .functions
        .iter()
        .zip(&return_types)
        .map(|(function, return_type)| {
            synthesize(function, return_type, &mut resolver, &schema, &declarations.callable)
        })
        .collect::<Result<Vec<_>, _>>()?;

    Ok(GenerationPlan { schema, wrappers })
}

/// `include/api.h` -> `api_checked.h`
pub fn checked_file_name(header: &Path) -> Result<String, GeneratorError> {
    let stem = header
        .file_stem()
        .and_then(|stem| stem.to_str())
        .ok_or_else(|| GeneratorError::IoError {
            message: format!("'{}' does not name a header file", header.display()),
        })?;
    Ok(format!("{}{}.h", stem, OUTPUT_SUFFIX))
}

/// Generate the checked header for `header`, whose declarations are `unit`
pub fn generate(
    unit: &TranslationUnit,
    header: &Path,
    options: &GeneratorOptions,
) -> Result<GeneratedHeader, GeneratorError> {
    let file_name = checked_file_name(header)?;
    let header_name = header
        .file_name()
        .and_then(|name| name.to_str())
        .ok_or_else(|| GeneratorError::IoError {
            message: format!("'{}' does not name a header file", header.display()),
        })?;

    let plan = plan(unit, options)?;
    let contents = CheckedHeader {
        header_name,
        output_name: &file_name,
        preamble: options.preamble.as_deref(),
        includes: &options.includes,
        schema: &plan.schema,
        wrappers: &plan.wrappers,
    }
    .to_string();

    Ok(GeneratedHeader {
        file_name,
        contents,
        wrapper_count: plan.wrappers.len(),
    })
}
