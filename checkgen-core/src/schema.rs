//! The shared Result type
//!
//! One payload field per distinct resolved return type, in first-seen
//! order, next to the `error_code` field.

use crate::resolver::{BaseType, ResolvedType, TagName};
use std::collections::HashSet;

pub const ERROR_CODE_FIELD: &str = "error_code";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SchemaField {
    pub ty: ResolvedType,
    pub name: String,
}

impl SchemaField {
    /// Field declaration inside the payload union, e.g. `char *char_ptr_value`
    pub fn declaration(&self) -> String {
        self.ty.declare(&self.name)
    }
}

/// Immutable Result schema of one header
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResultSchema {
    type_name: String,
    fields: Vec<SchemaField>,
}

impl ResultSchema {
    pub fn type_name(&self) -> &str {
        &self.type_name
    }

    pub fn fields(&self) -> &[SchemaField] {
        &self.fields
    }

    pub fn field_for(&self, ty: &ResolvedType) -> Option<&SchemaField> {
        self.fields.iter().find(|field| &field.ty == ty)
    }
}

/// Append-only builder used during the first pass
#[derive(Debug)]
pub struct SchemaBuilder {
    type_name: String,
    fields: Vec<SchemaField>,
    taken: HashSet<String>,
}

impl SchemaBuilder {
    pub fn new(type_name: &str) -> Self {
        Self {
            type_name: type_name.to_string(),
            fields: Vec::new(),
            taken: HashSet::new(),
        }
    }

    /// Register a return type; `void` and already known types add nothing
    pub fn add(&mut self, ty: &ResolvedType) {
        if ty.is_void() || self.fields.iter().any(|field| &field.ty == ty) {
            return;
        }

        let base = field_name(ty);
        let mut name = base.clone();
        let mut suffix = 2;
        while !self.taken.insert(name.clone()) {
            name = format!("{}_{}", base, suffix);
            suffix += 1;
        }
        self.fields.push(SchemaField { ty: ty.clone(), name });
    }

    pub fn finish(self) -> ResultSchema {
        ResultSchema {
            type_name: self.type_name,
            fields: self.fields,
        }
    }
}

/// `struct Module *` -> `struct_Module_ptr_value`
fn field_name(ty: &ResolvedType) -> String {
    let mut words: Vec<String> = match &ty.base {
        BaseType::Scalar(name) => name.split_whitespace().map(sanitize).collect(),
        BaseType::Tag { kind, name: TagName::Named(name) } => vec![kind.to_string(), sanitize(name)],
        BaseType::Tag { name: TagName::Anonymous { typedef }, .. } => vec![sanitize(typedef)],
    };
    words.extend((0..ty.pointer_depth).map(|_| "ptr".to_string()));
    words.push("value".to_string());
    words.retain(|word| !word.is_empty());
    words.join("_")
}

fn sanitize(word: &str) -> String {
    word.chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '_' { c } else { '_' })
        .collect()
}
