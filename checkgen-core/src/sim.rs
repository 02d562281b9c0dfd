//! Reference evaluator for wrapper plans
//!
//! Executes a [`WrapperSpec`] step by step against a stand-in for the
//! original function, producing the Result the generated C would return.

use crate::synth::{Outcome, Step, WrapperSpec, FAILED_RESULT, NULL_ARGUMENT};
use checkgen_common::GeneratorError;
use std::collections::HashMap;

/// Most arguments a C call is required to support
pub const MAX_FORWARDED_ARGUMENTS: usize = 127;

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Value {
    Void,
    Int(i64),
    Float(f64),
    Bool(bool),
    /// Address; zero is NULL
    Pointer(usize),
}

impl Value {
    pub const NULL: Value = Value::Pointer(0);

    pub fn is_null(&self) -> bool {
        matches!(self, Value::Pointer(0))
    }

    fn is_truthy(&self) -> bool {
        match self {
            Value::Void => false,
            Value::Int(n) => *n != 0,
            Value::Float(x) => *x != 0.0,
            Value::Bool(b) => *b,
            Value::Pointer(address) => *address != 0,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Payload {
    pub field: String,
    pub value: Value,
}

/// Result value produced by a checked wrapper
#[derive(Debug, Clone, PartialEq)]
pub struct CheckedResult {
    pub error_code: i32,
    pub payload: Option<Payload>,
}

impl CheckedResult {
    fn failed(error_code: i32) -> Self {
        Self {
            error_code,
            payload: None,
        }
    }

    fn success(payload: Option<Payload>) -> Self {
        Self { error_code: 0, payload }
    }
}

/// The call a wrapper makes
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Invocation<'a> {
    /// The original function, or its `va_list` counterpart
    pub function: &'a str,
    pub arguments: &'a [Value],
    /// Contents of the `va_list` passed after `arguments`, if any
    pub va_list: Option<&'a [Value]>,
}

/// Run `spec` with named `arguments` and trailing `variadic` ones against
/// `callee`, which stands in for every function the wrapper calls.
pub fn simulate<F>(
    spec: &WrapperSpec,
    arguments: &[Value],
    variadic: &[Value],
    mut callee: F,
) -> Result<CheckedResult, GeneratorError>
where
    F: FnMut(&Invocation<'_>) -> Value,
{
    if arguments.len() != spec.parameters.len() {
        return Err(GeneratorError::InternalError {
            message: format!(
                "{} takes {} arguments, {} given",
                spec.name,
                spec.parameters.len(),
                arguments.len()
            ),
        });
    }
    if !spec.is_variadic && !variadic.is_empty() {
        return Err(GeneratorError::InternalError {
            message: format!("{} is not variadic", spec.name),
        });
    }
    if arguments.len() + variadic.len() > MAX_FORWARDED_ARGUMENTS {
        return Err(GeneratorError::InternalError {
            message: format!("{} called with more than {} arguments", spec.name, MAX_FORWARDED_ARGUMENTS),
        });
    }

    let environment: HashMap<&str, Value> = spec
        .parameters
        .iter()
        .filter_map(|p| p.name.as_deref())
        .zip(arguments.iter().copied())
        .collect();
    let lookup = |name: &str| {
        environment.get(name).copied().ok_or_else(|| GeneratorError::InternalError {
            message: format!("{} refers to unknown parameter '{}'", spec.name, name),
        })
    };

    let mut open_list: Option<&[Value]> = None;
    let mut captured = Value::Void;
    let mut result = CheckedResult::success(None);

    for step in &spec.steps {
        match step {
            Step::NullGuard { parameter } => {
                if lookup(parameter)?.is_null() {
                    return Ok(CheckedResult::failed(NULL_ARGUMENT));
                }
            }
            Step::VariadicForward { .. } => open_list = Some(variadic),
            Step::Call {
                callee: function,
                arguments,
                forwarded,
                ..
            } => {
                let named = arguments.iter().map(|name| lookup(name)).collect::<Result<Vec<_>, _>>()?;
                let va_list = match forwarded {
                    Some(_) => Some(open_list.ok_or_else(|| GeneratorError::InternalError {
                        message: format!("{} forwards an argument list it never opened", spec.name),
                    })?),
                    None => None,
                };
                captured = callee(&Invocation {
                    function,
                    arguments: &named,
                    va_list,
                });
            }
            Step::VariadicEnd { .. } => open_list = None,
            Step::Populate(outcome) => result = populate(outcome, captured),
        }
    }

    Ok(result)
}

fn populate(outcome: &Outcome, value: Value) -> CheckedResult {
    let payload = |field: &str| {
        Some(Payload {
            field: field.to_string(),
            value,
        })
    };
    match outcome {
        Outcome::Void => CheckedResult::success(None),
        Outcome::Boolean { field } | Outcome::Pointer { field, .. } => {
            if value.is_truthy() {
                CheckedResult::success(payload(field))
            } else {
                CheckedResult::failed(FAILED_RESULT)
            }
        }
        Outcome::Value { field } => CheckedResult::success(payload(field)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{plan, GeneratorOptions};
    use checkgen_frontend::parse_source;
    use pretty_assertions::assert_eq;

    fn wrapper(source: &str) -> WrapperSpec {
        let unit = parse_source(source, "api.h").unwrap();
        plan(&unit, &GeneratorOptions::default()).unwrap().wrappers.remove(0)
    }

    #[test]
    fn test_boolean_result() {
        let spec = wrapper("bool ready(int id);\n");

        let ok = simulate(&spec, &[Value::Int(1)], &[], |_| Value::Bool(true)).unwrap();
        assert_eq!(
            ok,
            CheckedResult {
                error_code: 0,
                payload: Some(Payload {
                    field: "_Bool_value".to_string(),
                    value: Value::Bool(true)
                })
            }
        );

        let not_ready = simulate(&spec, &[Value::Int(1)], &[], |_| Value::Bool(false)).unwrap();
        assert_eq!(not_ready, CheckedResult::failed(FAILED_RESULT));
    }

    #[test]
    fn test_null_return_is_a_failure() {
        let spec = wrapper("void *lookup(int key);\n");
        let missing = simulate(&spec, &[Value::Int(7)], &[], |_| Value::NULL).unwrap();
        assert_eq!(missing.error_code, FAILED_RESULT);
        assert_eq!(missing.payload, None);

        let found = simulate(&spec, &[Value::Int(7)], &[], |_| Value::Pointer(0x1000)).unwrap();
        assert_eq!(found.error_code, 0);
        assert_eq!(found.payload.unwrap().value, Value::Pointer(0x1000));
    }

    #[test]
    fn test_zero_scalar_is_still_a_success() {
        let spec = wrapper("double scale(double x);\n");
        let result = simulate(&spec, &[Value::Float(0.0)], &[], |call| call.arguments[0]).unwrap();
        assert_eq!(result.error_code, 0);
        assert_eq!(result.payload.unwrap().value, Value::Float(0.0));
    }

    #[test]
    fn test_first_failing_guard_short_circuits() {
        let spec = wrapper("int copy(char *dst, const char *src);\n");
        let mut calls = 0;
        let result = simulate(&spec, &[Value::NULL, Value::NULL], &[], |_| {
            calls += 1;
            Value::Int(0)
        })
        .unwrap();
        assert_eq!(result, CheckedResult::failed(NULL_ARGUMENT));
        assert_eq!(calls, 0);
    }

    #[test]
    fn test_variadic_call_goes_to_va_list_counterpart() {
        let spec = wrapper("int sum_ints(int count, ...);\nint vsum_ints(int count, va_list ap);\n");
        let result = simulate(&spec, &[Value::Int(3)], &[Value::Int(10), Value::Int(20), Value::Int(30)], |call| {
            assert_eq!(call.function, "vsum_ints");
            assert_eq!(call.arguments, &[Value::Int(3)]);
            let total = call
                .va_list
                .unwrap()
                .iter()
                .map(|value| match value {
                    Value::Int(n) => *n,
                    _ => 0,
                })
                .sum();
            Value::Int(total)
        })
        .unwrap();
        assert_eq!(result.payload.unwrap().value, Value::Int(60));

        let spec = wrapper("int vsum_ints(int count, va_list ap);\n");
        simulate(&spec, &[Value::Int(0), Value::Int(0)], &[], |call| {
            assert_eq!(call.function, "vsum_ints");
            assert_eq!(call.va_list, None);
            Value::Int(0)
        })
        .unwrap();
    }

    #[test]
    fn test_argument_count_is_checked() {
        let spec = wrapper("int add(int a, int b);\n");
        assert!(simulate(&spec, &[Value::Int(1)], &[], |_| Value::Int(0)).is_err());
        assert!(simulate(&spec, &[Value::Int(1), Value::Int(2)], &[Value::Int(3)], |_| Value::Int(0)).is_err());

        let spec = wrapper("void log_msg(const char *fmt, ...);\nvoid vlog_msg(const char *fmt, va_list ap);\n");
        let too_many = vec![Value::Int(0); MAX_FORWARDED_ARGUMENTS];
        assert!(simulate(&spec, &[Value::Pointer(8)], &too_many, |_| Value::Void).is_err());
    }
}
