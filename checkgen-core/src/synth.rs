//! Wrapper synthesis
//!
//! Turns one prototype into a [`WrapperSpec`]: the checked function's
//! signature plus an ordered plan of steps. The plan is rendered to C by
//! the emitter and executed directly by [`crate::sim`].

use crate::resolver::{ResolvedType, Resolver};
use crate::schema::ResultSchema;
use checkgen_common::{GeneratorError, SourceLocation};
use checkgen_frontend::{FunctionSignature, Parameter, TypeExpr};
use log::debug;
use std::collections::{BTreeMap, HashSet};

pub const CHECKED_SUFFIX: &str = "_checked";

/// `error_code` when a pointer parameter is NULL
pub const NULL_ARGUMENT: i32 = -1;
/// `error_code` when the original returns NULL or false
pub const FAILED_RESULT: i32 = -2;

/// How the original's return value becomes the Result
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    Void,
    /// Success only when true
    Boolean { field: String },
    /// Success only when non-NULL; the payload is cast to `field_type`
    Pointer { field: String, field_type: String },
    /// Always a success
    Value { field: String },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Step {
    NullGuard { parameter: String },
    /// Open `list` on the arguments following `anchor`
    VariadicForward { anchor: String, list: String },
    Call {
        /// The original, or its `va_list` counterpart
        callee: String,
        arguments: Vec<String>,
        /// `va_list` passed after the named arguments
        forwarded: Option<String>,
        /// Local receiving the return value
        capture: Option<String>,
    },
    VariadicEnd { list: String },
    Populate(Outcome),
}

/// Names of the wrapper's locals, renamed away from every other name in the body
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Locals {
    pub result: String,
    pub original_result: String,
    pub args: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WrapperSpec {
    pub name: String,
    pub original: String,
    pub result_type: String,
    /// Every parameter is named; unnamed ones become `argN`
    pub parameters: Vec<Parameter>,
    pub is_variadic: bool,
    pub return_type: TypeExpr,
    pub locals: Locals,
    pub steps: Vec<Step>,
    pub location: SourceLocation,
}

impl WrapperSpec {
    pub fn guarded_parameters(&self) -> impl Iterator<Item = &str> {
        self.steps.iter().filter_map(|step| match step {
            Step::NullGuard { parameter } => Some(parameter.as_str()),
            _ => None,
        })
    }

    pub fn forwards_variadic(&self) -> bool {
        self.steps.iter().any(|step| matches!(step, Step::VariadicForward { .. }))
    }

    pub fn outcome(&self) -> Option<&Outcome> {
        self.steps.iter().find_map(|step| match step {
            Step::Populate(outcome) => Some(outcome),
            _ => None,
        })
    }
}

/// Build the wrapper of `function`, whose return type resolved to
/// `return_type` during the first pass. Variadic functions are called
/// through their `va_list` counterpart in `callable`.
pub fn synthesize(
    function: &FunctionSignature,
    return_type: &ResolvedType,
    resolver: &mut Resolver<'_>,
    schema: &ResultSchema,
    callable: &BTreeMap<String, FunctionSignature>,
) -> Result<WrapperSpec, GeneratorError> {
    let callee = if function.is_variadic {
        va_list_counterpart(function, return_type, resolver, callable)?.name.clone()
    } else {
        function.name.clone()
    };

    // Identifiers the wrapper body refers to besides its own locals
    let mut taken: HashSet<String> = [function.name.as_str(), callee.as_str(), schema.type_name()]
        .into_iter()
        .map(str::to_string)
        .collect();
    let parameters = name_parameters(&function.parameters, &mut taken);
    let locals = Locals {
        result: unique_name("res", &mut taken),
        original_result: unique_name("original_result", &mut taken),
        args: unique_name("args", &mut taken),
    };

    let mut steps = Vec::new();
    let mut arguments = Vec::with_capacity(parameters.len());
    for parameter in &parameters {
        let name = parameter.name.clone().unwrap_or_default();
        let resolved = resolver.resolve_expr(&parameter.ty, &function.name, &function.location)?;
        if resolved.is_pointer() {
            steps.push(Step::NullGuard { parameter: name.clone() });
        }
        arguments.push(name);
    }

    let forwarded = if function.is_variadic {
        let Some(anchor) = arguments.last() else {
            return Err(GeneratorError::classification(
                &function.name,
                "variadic function has no named parameter to anchor its argument list".to_string(),
                function.location.clone(),
            ));
        };
        steps.push(Step::VariadicForward {
            anchor: anchor.clone(),
            list: locals.args.clone(),
        });
        Some(locals.args.clone())
    } else {
        None
    };

    let outcome = classify_return(function, return_type, schema)?;
    steps.push(Step::Call {
        callee,
        arguments,
        forwarded: forwarded.clone(),
        capture: (outcome != Outcome::Void).then(|| locals.original_result.clone()),
    });
    if let Some(list) = forwarded {
        steps.push(Step::VariadicEnd { list });
    }
    steps.push(Step::Populate(outcome));

    let spec = WrapperSpec {
        name: format!("{}{}", function.name, CHECKED_SUFFIX),
        original: function.name.clone(),
        result_type: schema.type_name().to_string(),
        parameters,
        is_variadic: function.is_variadic,
        return_type: function.return_type.clone(),
        locals,
        steps,
        location: function.location.clone(),
    };
    debug!(
        "{}: {} guards {:?}",
        spec.location,
        spec.name,
        spec.guarded_parameters().collect::<Vec<_>>()
    );
    Ok(spec)
}

/// Names the `va_list` form of `name` may go by, innermost word first:
/// `_log_printf` -> `_log_vprintf`, `_vlog_printf`, `v_log_printf`
pub fn va_list_names(name: &str) -> Vec<String> {
    let mut starts: Vec<usize> = name
        .match_indices('_')
        .map(|(index, _)| index + 1)
        .filter(|&start| start < name.len())
        .collect();
    starts.reverse();
    starts.push(0);
    starts
        .into_iter()
        .map(|start| format!("{}v{}", &name[..start], &name[start..]))
        .collect()
}

/// The function taking the named parameters of `function` followed by a
/// `va_list`, with the same return type
fn va_list_counterpart<'c>(
    function: &FunctionSignature,
    return_type: &ResolvedType,
    resolver: &mut Resolver<'_>,
    callable: &'c BTreeMap<String, FunctionSignature>,
) -> Result<&'c FunctionSignature, GeneratorError> {
    let candidates = va_list_names(&function.name);
    let Some(counterpart) = candidates
        .iter()
        .filter_map(|name| callable.get(name))
        .find(|candidate| takes_va_list(candidate, function.parameters.len()))
    else {
        return Err(GeneratorError::classification(
            &function.name,
            format!(
                "variadic function cannot forward its arguments: no va_list counterpart ({}) is declared",
                candidates.join(", ")
            ),
            function.location.clone(),
        ));
    };

    let counterpart_return =
        resolver.resolve_expr(&counterpart.return_type, &counterpart.name, &counterpart.location)?;
    if &counterpart_return != return_type {
        return Err(GeneratorError::classification(
            &function.name,
            format!(
                "returns '{}' but its va_list counterpart {} returns '{}'",
                return_type, counterpart.name, counterpart_return
            ),
            function.location.clone(),
        ));
    }
    debug!("{}: forwarding {} through {}", function.location, function.name, counterpart.name);
    Ok(counterpart)
}

fn takes_va_list(candidate: &FunctionSignature, named: usize) -> bool {
    let Some((last, leading)) = candidate.parameters.split_last() else {
        return false;
    };
    !candidate.is_variadic
        && leading.len() == named
        && matches!(last.ty.unqualified(), TypeExpr::TypedefRef(name) if name.ends_with("va_list"))
}

fn classify_return(
    function: &FunctionSignature,
    return_type: &ResolvedType,
    schema: &ResultSchema,
) -> Result<Outcome, GeneratorError> {
    if return_type.is_void() {
        return Ok(Outcome::Void);
    }

    let field = schema
        .field_for(return_type)
        .ok_or_else(|| GeneratorError::InternalError {
            message: format!("no {} field for '{}' returned by {}", schema.type_name(), return_type, function.name),
        })?
        .name
        .clone();

    Ok(if return_type.is_pointer() {
        Outcome::Pointer {
            field,
            field_type: return_type.to_string(),
        }
    } else if return_type.is_bool() {
        Outcome::Boolean { field }
    } else {
        Outcome::Value { field }
    })
}

/// Name every parameter, renaming those that would shadow a name in `taken`
fn name_parameters(parameters: &[Parameter], taken: &mut HashSet<String>) -> Vec<Parameter> {
    let reserved = taken.clone();
    taken.extend(parameters.iter().filter_map(|p| p.name.clone()));
    parameters
        .iter()
        .enumerate()
        .map(|(index, parameter)| {
            let name = match &parameter.name {
                Some(name) if !reserved.contains(name) => name.clone(),
                Some(name) => unique_name(name, taken),
                None => unique_name(&format!("arg{}", index), taken),
            };
            Parameter {
                name: Some(name),
                ty: parameter.ty.clone(),
            }
        })
        .collect()
}

fn unique_name(base: &str, taken: &mut HashSet<String>) -> String {
    let mut name = base.to_string();
    while taken.contains(&name) {
        name.push('_');
    }
    taken.insert(name.clone());
    name
}
