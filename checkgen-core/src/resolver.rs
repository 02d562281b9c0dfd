//! Typedef resolution
//!
//! Reduces type expressions to a [`ResolvedType`]: a scalar or opaque tag
//! base plus a pointer depth. Typedef names are resolved once per run and
//! cached; a typedef reached again while it is being resolved is a cycle.

use checkgen_common::{GeneratorError, SourceLocation};
use checkgen_frontend::{TagKind, TypeExpr, Typedef};
use log::debug;
use std::collections::{BTreeMap, HashMap};
use std::fmt;

/// Name of a tag; anonymous tags are known by the typedef naming them
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum TagName {
    Named(String),
    Anonymous { typedef: String },
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum BaseType {
    /// Builtin scalar, or a type name with no visible typedef
    Scalar(String),
    /// Opaque `struct`, `union` or `enum`
    Tag { kind: TagKind, name: TagName },
}

impl fmt::Display for BaseType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BaseType::Scalar(name) => write!(f, "{name}"),
            BaseType::Tag { kind, name: TagName::Named(name) } => write!(f, "{kind} {name}"),
            BaseType::Tag { name: TagName::Anonymous { typedef }, .. } => write!(f, "{typedef}"),
        }
    }
}

/// Canonical type shape after unwinding every typedef
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ResolvedType {
    pub base: BaseType,
    pub pointer_depth: u32,
}

impl ResolvedType {
    pub fn scalar(name: &str) -> Self {
        Self {
            base: BaseType::Scalar(name.to_string()),
            pointer_depth: 0,
        }
    }

    fn deeper(self, levels: u32) -> Self {
        Self {
            pointer_depth: self.pointer_depth + levels,
            ..self
        }
    }

    pub fn is_void(&self) -> bool {
        self.pointer_depth == 0 && matches!(&self.base, BaseType::Scalar(name) if name == "void")
    }

    pub fn is_pointer(&self) -> bool {
        self.pointer_depth > 0
    }

    pub fn is_bool(&self) -> bool {
        self.pointer_depth == 0 && matches!(&self.base, BaseType::Scalar(name) if name == "_Bool")
    }

    /// C spelling of the type with `declarator` declared, e.g.
    /// `struct Module *field`
    pub fn declare(&self, declarator: &str) -> String {
        let stars = "*".repeat(self.pointer_depth as usize);
        match (stars.is_empty(), declarator.is_empty()) {
            (true, true) => self.base.to_string(),
            (true, false) => format!("{} {}", self.base, declarator),
            (false, _) => format!("{} {}{}", self.base, stars, declarator),
        }
    }
}

/// C spelling of the type: `char *`, `unsigned int`, `struct Module **`
impl fmt::Display for ResolvedType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.declare(""))
    }
}

/// Memoizing typedef resolver for one header
pub struct Resolver<'a> {
    typedefs: &'a BTreeMap<String, Typedef>,
    cache: HashMap<String, ResolvedType>,
    /// Typedefs whose resolution is in progress, outermost first
    in_progress: Vec<String>,
}

impl<'a> Resolver<'a> {
    pub fn new(typedefs: &'a BTreeMap<String, Typedef>) -> Self {
        Self {
            typedefs,
            cache: HashMap::new(),
            in_progress: Vec::new(),
        }
    }

    /// Resolve a type name. A name with no registered typedef is already
    /// canonical.
    pub fn resolve(&mut self, name: &str) -> Result<ResolvedType, GeneratorError> {
        if let Some(resolved) = self.cache.get(name) {
            return Ok(resolved.clone());
        }

        let Some(typedef) = self.typedefs.get(name) else {
            // <stdbool.h> may not have been found; `bool` is `_Bool` regardless
            let canonical = if name == "bool" { "_Bool" } else { name };
            debug!("'{}' has no typedef, treating it as canonical", name);
            return Ok(ResolvedType::scalar(canonical));
        };

        if let Some(start) = self.in_progress.iter().position(|n| n == name) {
            let mut chain = self.in_progress[start..].to_vec();
            chain.push(name.to_string());
            return Err(GeneratorError::CyclicTypedef {
                name: name.to_string(),
                location: typedef.location.clone(),
                chain,
            });
        }

        self.in_progress.push(name.to_string());
        let resolved = self.resolve_typedef(typedef);
        self.in_progress.pop();

        let resolved = resolved?;
        debug!("typedef {} resolves to {}", name, resolved);
        self.cache.insert(name.to_string(), resolved.clone());
        Ok(resolved)
    }

    fn resolve_typedef(&mut self, typedef: &Typedef) -> Result<ResolvedType, GeneratorError> {
        let unsupported = |message: &str| {
            GeneratorError::unsupported_typedef(&typedef.name, message.to_string(), typedef.location.clone())
        };

        let mut depth = 0;
        let mut expr = typedef.ty.unqualified();
        while let TypeExpr::Pointer(inner) = expr {
            depth += 1;
            expr = inner.unqualified();
        }

        match expr {
            TypeExpr::Scalar(name) => Ok(ResolvedType::scalar(name).deeper(depth)),
            TypeExpr::TypedefRef(name) => Ok(self.resolve(name)?.deeper(depth)),
            TypeExpr::Tag { kind, name: Some(name) } => Ok(ResolvedType {
                base: BaseType::Tag {
                    kind: *kind,
                    name: TagName::Named(name.clone()),
                },
                pointer_depth: depth,
            }),
            TypeExpr::Tag { kind, name: None } if depth == 0 => Ok(ResolvedType {
                base: BaseType::Tag {
                    kind: *kind,
                    name: TagName::Anonymous {
                        typedef: typedef.name.clone(),
                    },
                },
                pointer_depth: 0,
            }),
            TypeExpr::Tag { name: None, .. } => Err(unsupported("pointer to an anonymous tag has no spelling")),
            TypeExpr::Array { .. } => Err(unsupported("array typedefs are not supported")),
            TypeExpr::Function(_) => Err(unsupported("function and function pointer typedefs are not supported")),
            TypeExpr::Pointer(_) | TypeExpr::Qualified { .. } => {
                Err(GeneratorError::InternalError {
                    message: format!("typedef '{}' was not fully unwrapped", typedef.name),
                })
            }
        }
    }

    /// Resolve a type written inline in a declaration of `owner`. Arrays
    /// decay to pointers and qualifiers are ignored.
    pub fn resolve_expr(
        &mut self,
        expr: &TypeExpr,
        owner: &str,
        location: &SourceLocation,
    ) -> Result<ResolvedType, GeneratorError> {
        match expr.unqualified() {
            TypeExpr::Scalar(name) => Ok(ResolvedType::scalar(name)),
            TypeExpr::TypedefRef(name) => self.resolve(name),
            TypeExpr::Pointer(inner) | TypeExpr::Array { element: inner, .. } => {
                Ok(self.resolve_expr(inner, owner, location)?.deeper(1))
            }
            TypeExpr::Tag { kind, name: Some(name) } => Ok(ResolvedType {
                base: BaseType::Tag {
                    kind: *kind,
                    name: TagName::Named(name.clone()),
                },
                pointer_depth: 0,
            }),
            TypeExpr::Tag { kind, name: None } => Err(GeneratorError::classification(
                owner,
                format!("anonymous {} declared inline has no name to refer to", kind),
                location.clone(),
            )),
            TypeExpr::Function(_) => Err(GeneratorError::classification(
                owner,
                format!("function type '{}' is not supported", expr),
                location.clone(),
            )),
            TypeExpr::Qualified { .. } => Err(GeneratorError::InternalError {
                message: format!("qualifiers of '{}' were not stripped", expr),
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use checkgen_frontend::{FunctionType, Origin, Qualifiers};
    use pretty_assertions::assert_eq;

    fn typedefs(entries: &[(&str, TypeExpr)]) -> BTreeMap<String, Typedef> {
        entries
            .iter()
            .enumerate()
            .map(|(i, (name, ty))| {
                (
                    name.to_string(),
                    Typedef {
                        name: name.to_string(),
                        ty: ty.clone(),
                        location: SourceLocation::new("api.h", i as u32 + 1, 1),
                        origin: Origin::MainFile,
                    },
                )
            })
            .collect()
    }

    fn module_tag() -> ResolvedType {
        ResolvedType {
            base: BaseType::Tag {
                kind: TagKind::Struct,
                name: TagName::Named("Module".to_string()),
            },
            pointer_depth: 1,
        }
    }

    #[test]
    fn test_unregistered_name_is_canonical() {
        let table = typedefs(&[]);
        let mut resolver = Resolver::new(&table);
        assert_eq!(resolver.resolve("uint32_t").unwrap(), ResolvedType::scalar("uint32_t"));
        assert_eq!(resolver.resolve("bool").unwrap(), ResolvedType::scalar("_Bool"));
    }

    #[test]
    fn test_pointer_chain_through_typedefs() {
        let table = typedefs(&[
            ("module_t", TypeExpr::pointer(TypeExpr::tag(TagKind::Struct, "Module"))),
            ("module_ref", TypeExpr::typedef_ref("module_t")),
            ("module_list", TypeExpr::pointer(TypeExpr::typedef_ref("module_ref"))),
        ]);
        let mut resolver = Resolver::new(&table);
        assert_eq!(resolver.resolve("module_ref").unwrap(), module_tag());
        assert_eq!(resolver.resolve("module_list").unwrap(), module_tag().deeper(1));
        assert_eq!(resolver.resolve("module_list").unwrap().to_string(), "struct Module **");
    }

    #[test]
    fn test_scalar_and_qualified_typedefs() {
        let table = typedefs(&[
            ("u32", TypeExpr::scalar("unsigned int")),
            ("name_t", TypeExpr::pointer(TypeExpr::qualified(Qualifiers::CONST, TypeExpr::scalar("char")))),
        ]);
        let mut resolver = Resolver::new(&table);
        assert_eq!(resolver.resolve("u32").unwrap(), ResolvedType::scalar("unsigned int"));
        assert_eq!(resolver.resolve("name_t").unwrap().to_string(), "char *");
    }

    #[test]
    fn test_anonymous_tag_is_named_by_its_typedef() {
        let table = typedefs(&[("point_t", TypeExpr::Tag { kind: TagKind::Struct, name: None })]);
        let mut resolver = Resolver::new(&table);
        let point = resolver.resolve("point_t").unwrap();
        assert_eq!(point.to_string(), "point_t");
        assert_eq!(point.declare("p"), "point_t p");
    }

    #[test]
    fn test_function_pointer_typedef_is_unsupported() {
        let callback = TypeExpr::pointer(TypeExpr::Function(Box::new(FunctionType {
            return_type: TypeExpr::scalar("void"),
            parameters: vec![],
            is_variadic: false,
        })));
        let table = typedefs(&[("callback_t", callback)]);
        let mut resolver = Resolver::new(&table);
        let err = resolver.resolve("callback_t").unwrap_err();
        assert!(matches!(err, GeneratorError::UnsupportedTypedef { ref name, .. } if name == "callback_t"));
    }

    #[test]
    fn test_cycle_is_reported_with_its_chain() {
        let table = typedefs(&[
            ("a_t", TypeExpr::typedef_ref("b_t")),
            ("b_t", TypeExpr::pointer(TypeExpr::typedef_ref("c_t"))),
            ("c_t", TypeExpr::typedef_ref("a_t")),
        ]);
        let mut resolver = Resolver::new(&table);
        let err = resolver.resolve("a_t").unwrap_err();
        match err {
            GeneratorError::CyclicTypedef { name, chain, .. } => {
                assert_eq!(name, "a_t");
                assert_eq!(chain, vec!["a_t", "b_t", "c_t", "a_t"]);
            }
            other => panic!("Expected cyclic typedef error, got {other:?}"),
        }
        // Nothing half-resolved is cached
        assert!(resolver.resolve("b_t").is_err());
    }

    #[test]
    fn test_results_are_memoized() {
        let table = typedefs(&[("handle_t", TypeExpr::pointer(TypeExpr::scalar("void")))]);
        let mut resolver = Resolver::new(&table);
        let first = resolver.resolve("handle_t").unwrap();
        assert_eq!(resolver.cache.len(), 1);
        assert_eq!(resolver.resolve("handle_t").unwrap(), first);
    }

    #[test]
    fn test_inline_expressions() {
        let table = typedefs(&[("module_t", TypeExpr::pointer(TypeExpr::tag(TagKind::Struct, "Module")))]);
        let mut resolver = Resolver::new(&table);
        let location = SourceLocation::new("api.h", 9, 1);

        let array = TypeExpr::Array {
            element: Box::new(TypeExpr::scalar("char")),
            size: Some("16".to_string()),
        };
        assert_eq!(resolver.resolve_expr(&array, "f", &location).unwrap().to_string(), "char *");

        let modules = TypeExpr::pointer(TypeExpr::typedef_ref("module_t"));
        assert_eq!(resolver.resolve_expr(&modules, "f", &location).unwrap(), module_tag().deeper(1));

        let inline_anonymous = TypeExpr::Tag { kind: TagKind::Union, name: None };
        let err = resolver.resolve_expr(&inline_anonymous, "f", &location).unwrap_err();
        assert!(matches!(err, GeneratorError::Classification { .. }));
    }
}
