//! Type expressions as spelled in C declarations
//!
//! A [`TypeExpr`] records a type exactly as written, before any typedef is
//! looked through. [`declare`] turns one back into C source text.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Kind of a tagged type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum TagKind {
    Struct,
    Union,
    Enum,
}

impl fmt::Display for TagKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TagKind::Struct => write!(f, "struct"),
            TagKind::Union => write!(f, "union"),
            TagKind::Enum => write!(f, "enum"),
        }
    }
}

/// Type qualifiers
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Qualifiers {
    pub is_const: bool,
    pub is_volatile: bool,
    pub is_restrict: bool,
    pub is_atomic: bool,
}

impl Qualifiers {
    pub const CONST: Qualifiers = Qualifiers {
        is_const: true,
        is_volatile: false,
        is_restrict: false,
        is_atomic: false,
    };

    pub fn is_empty(&self) -> bool {
        !(self.is_const || self.is_volatile || self.is_restrict || self.is_atomic)
    }

    pub fn union(self, other: Qualifiers) -> Qualifiers {
        Qualifiers {
            is_const: self.is_const || other.is_const,
            is_volatile: self.is_volatile || other.is_volatile,
            is_restrict: self.is_restrict || other.is_restrict,
            is_atomic: self.is_atomic || other.is_atomic,
        }
    }
}

impl fmt::Display for Qualifiers {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let words = [
            (self.is_const, "const"),
            (self.is_volatile, "volatile"),
            (self.is_restrict, "restrict"),
            (self.is_atomic, "_Atomic"),
        ];
        let mut first = true;
        for (_, word) in words.iter().filter(|(set, _)| *set) {
            if !first {
                write!(f, " ")?;
            }
            write!(f, "{word}")?;
            first = false;
        }
        Ok(())
    }
}

/// A type as written in a declaration
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TypeExpr {
    /// Builtin arithmetic type or `void`, in canonical keyword order
    /// (`unsigned int`, `long long`, `_Bool`)
    Scalar(String),
    Pointer(Box<TypeExpr>),
    /// `struct`, `union` or `enum`; anonymous tags have no name
    Tag { kind: TagKind, name: Option<String> },
    /// An identifier used as a type name
    TypedefRef(String),
    Qualified { qualifiers: Qualifiers, inner: Box<TypeExpr> },
    /// Array with its size expression as written
    Array { element: Box<TypeExpr>, size: Option<String> },
    Function(Box<FunctionType>),
}

/// Function type: return type, parameters and variadic flag
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct FunctionType {
    pub return_type: TypeExpr,
    pub parameters: Vec<Parameter>,
    pub is_variadic: bool,
}

/// Function parameter; the name is absent in abstract declarations
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Parameter {
    pub name: Option<String>,
    pub ty: TypeExpr,
}

impl TypeExpr {
    pub fn scalar(name: &str) -> Self {
        TypeExpr::Scalar(name.to_string())
    }

    pub fn typedef_ref(name: &str) -> Self {
        TypeExpr::TypedefRef(name.to_string())
    }

    pub fn pointer(inner: TypeExpr) -> Self {
        TypeExpr::Pointer(Box::new(inner))
    }

    pub fn tag(kind: TagKind, name: &str) -> Self {
        TypeExpr::Tag {
            kind,
            name: Some(name.to_string()),
        }
    }

    /// Wrap `inner` in qualifiers, merging with qualifiers already present
    pub fn qualified(qualifiers: Qualifiers, inner: TypeExpr) -> Self {
        if qualifiers.is_empty() {
            return inner;
        }
        match inner {
            TypeExpr::Qualified { qualifiers: existing, inner } => TypeExpr::Qualified {
                qualifiers: existing.union(qualifiers),
                inner,
            },
            other => TypeExpr::Qualified {
                qualifiers,
                inner: Box::new(other),
            },
        }
    }

    /// The type with outer qualifiers removed
    pub fn unqualified(&self) -> &TypeExpr {
        match self {
            TypeExpr::Qualified { inner, .. } => inner.unqualified(),
            other => other,
        }
    }

    pub fn is_void(&self) -> bool {
        matches!(self.unqualified(), TypeExpr::Scalar(name) if name == "void")
    }
}

impl fmt::Display for TypeExpr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", declare(self, ""))
    }
}

/// Spell a declaration of `declarator` with type `ty` in C syntax.
/// An empty declarator yields the abstract type name.
///
/// ```
/// use checkgen_frontend::types::{declare, Qualifiers, TypeExpr};
///
/// let s = TypeExpr::pointer(TypeExpr::qualified(Qualifiers::CONST, TypeExpr::scalar("char")));
/// assert_eq!(declare(&s, "s"), "const char *s");
/// ```
pub fn declare(ty: &TypeExpr, declarator: &str) -> String {
    match ty {
        TypeExpr::Scalar(name) | TypeExpr::TypedefRef(name) => join(name, declarator),
        TypeExpr::Tag { kind, name: Some(name) } => join(&format!("{kind} {name}"), declarator),
        TypeExpr::Tag { kind, name: None } => join(&kind.to_string(), declarator),
        TypeExpr::Qualified { qualifiers, inner } => match inner.unqualified() {
            // Qualifiers of a pointer follow its `*`
            TypeExpr::Pointer(_) => declare(inner, &join(&qualifiers.to_string(), declarator)),
            _ => format!("{qualifiers} {}", declare(inner, declarator)),
        },
        TypeExpr::Pointer(inner) => {
            let pointer = format!("*{declarator}");
            match inner.unqualified() {
                TypeExpr::Array { .. } | TypeExpr::Function(_) => declare(inner, &format!("({pointer})")),
                _ => declare(inner, &pointer),
            }
        }
        TypeExpr::Array { element, size } => {
            let size = size.as_deref().unwrap_or("");
            declare(element, &format!("{declarator}[{size}]"))
        }
        TypeExpr::Function(function) => {
            let params = parameter_list(&function.parameters, function.is_variadic);
            declare(&function.return_type, &format!("{declarator}({params})"))
        }
    }
}

/// Parameter list text without the parentheses; empty lists become `void`
pub fn parameter_list(parameters: &[Parameter], is_variadic: bool) -> String {
    if parameters.is_empty() && !is_variadic {
        return "void".to_string();
    }
    let mut parts: Vec<String> = parameters
        .iter()
        .map(|p| declare(&p.ty, p.name.as_deref().unwrap_or("")))
        .collect();
    if is_variadic {
        parts.push("...".to_string());
    }
    parts.join(", ")
}

fn join(specifier: &str, declarator: &str) -> String {
    if declarator.is_empty() {
        specifier.to_string()
    } else {
        format!("{specifier} {declarator}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn const_char() -> TypeExpr {
        TypeExpr::qualified(Qualifiers::CONST, TypeExpr::scalar("char"))
    }

    #[test]
    fn test_declare_scalars_and_pointers() {
        assert_eq!(declare(&TypeExpr::scalar("unsigned int"), "n"), "unsigned int n");
        assert_eq!(declare(&TypeExpr::pointer(const_char()), "s"), "const char *s");
        assert_eq!(
            declare(&TypeExpr::pointer(TypeExpr::pointer(TypeExpr::scalar("char"))), "argv"),
            "char **argv"
        );
        assert_eq!(declare(&TypeExpr::pointer(TypeExpr::scalar("void")), ""), "void *");
    }

    #[test]
    fn test_declare_const_pointer() {
        let ty = TypeExpr::qualified(Qualifiers::CONST, TypeExpr::pointer(TypeExpr::scalar("char")));
        assert_eq!(declare(&ty, "p"), "char *const p");
    }

    #[test]
    fn test_declare_tags_and_typedefs() {
        let module = TypeExpr::pointer(TypeExpr::tag(TagKind::Struct, "Module"));
        assert_eq!(declare(&module, "m"), "struct Module *m");
        assert_eq!(declare(&TypeExpr::typedef_ref("size_t"), "len"), "size_t len");
    }

    #[test]
    fn test_declare_function_pointer() {
        let callback = TypeExpr::pointer(TypeExpr::Function(Box::new(FunctionType {
            return_type: TypeExpr::scalar("int"),
            parameters: vec![Parameter {
                name: None,
                ty: TypeExpr::pointer(TypeExpr::scalar("void")),
            }],
            is_variadic: false,
        })));
        assert_eq!(declare(&callback, "cb"), "int (*cb)(void *)");
    }

    #[test]
    fn test_declare_array_parameter() {
        let ty = TypeExpr::Array {
            element: Box::new(TypeExpr::scalar("int")),
            size: Some("4".to_string()),
        };
        assert_eq!(declare(&ty, "values"), "int values[4]");
        let pointer_to_array = TypeExpr::pointer(ty);
        assert_eq!(declare(&pointer_to_array, "rows"), "int (*rows)[4]");
    }

    #[test]
    fn test_parameter_list_forms() {
        assert_eq!(parameter_list(&[], false), "void");
        let fmt = Parameter {
            name: Some("fmt".to_string()),
            ty: TypeExpr::pointer(const_char()),
        };
        assert_eq!(parameter_list(&[fmt], true), "const char *fmt, ...");
    }

    #[test]
    fn test_qualified_merges_and_unqualified_strips() {
        let ty = TypeExpr::qualified(
            Qualifiers { is_volatile: true, ..Qualifiers::default() },
            const_char(),
        );
        assert_eq!(ty.to_string(), "const volatile char");
        assert_eq!(ty.unqualified(), &TypeExpr::scalar("char"));
        assert!(TypeExpr::qualified(Qualifiers::CONST, TypeExpr::scalar("void")).is_void());
    }
}
