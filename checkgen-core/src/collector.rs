//! Declaration collection
//!
//! Indexes the typedefs and callable functions of the whole translation
//! unit and picks out the prototypes of the input header that get wrappers.

use checkgen_frontend::{Declaration, FunctionSignature, TranslationUnit, Typedef};
use log::debug;
use std::collections::{BTreeMap, HashSet};

/// Declarations relevant to generation, in source order
#[derive(Debug, Clone, Default)]
pub struct DeclarationSet {
    pub typedefs: BTreeMap<String, Typedef>,
    /// Prototypes to wrap
    pub functions: Vec<FunctionSignature>,
    /// Every declared or defined function, from any file
    pub callable: BTreeMap<String, FunctionSignature>,
}

pub fn collect(unit: &TranslationUnit) -> DeclarationSet {
    let mut set = DeclarationSet::default();
    let mut seen_functions = HashSet::new();

    for declaration in &unit.declarations {
        match declaration {
            Declaration::Typedef(typedef) => {
                if set.typedefs.contains_key(&typedef.name) {
                    debug!("{}: keeping first definition of typedef {}", typedef.location, typedef.name);
                    continue;
                }
                set.typedefs.insert(typedef.name.clone(), typedef.clone());
            }
            Declaration::Function(function) => {
                set.callable.entry(function.name.clone()).or_insert_with(|| function.clone());
                if !function.origin.is_main_file() {
                    debug!("{}: skipping {} from an included header", function.location, function.name);
                    continue;
                }
                if !seen_functions.insert(function.name.clone()) {
                    debug!("{}: {} already declared", function.location, function.name);
                    continue;
                }
                set.functions.push(function.clone());
            }
            Declaration::FunctionDefinition(function) => {
                set.callable.entry(function.name.clone()).or_insert_with(|| function.clone());
                debug!("{}: skipping definition of {}", function.location, function.name);
            }
            Declaration::Variable { .. } => {}
        }
    }

    debug!(
        "{}: {} typedefs, {} prototypes to wrap",
        unit.main_file,
        set.typedefs.len(),
        set.functions.len()
    );
    set
}
