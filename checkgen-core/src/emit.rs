//! C rendering of the checked header
//!
//! Everything is rendered through `Display` so the output depends only on
//! the ordered schema and wrapper plans.

use crate::schema::{ResultSchema, ERROR_CODE_FIELD};
use crate::synth::{Outcome, Step, WrapperSpec, FAILED_RESULT, NULL_ARGUMENT};
use checkgen_frontend::{declare, parameter_list};
use std::fmt;

pub const BANNER: &str = "/*\n * THIS FILE IS GENERATED AUTOMATICALLY, DO NOT EDIT!\n */";

const STDARG: &str = "<stdarg.h>";
const INDENT: &str = "    ";

/// `api_checked.h` -> `API_CHECKED_H`
pub fn include_guard(output_name: &str) -> String {
    output_name
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() { c.to_ascii_uppercase() } else { '_' })
        .collect()
}

/// `stdio.h` -> `<stdio.h>`; quoted or bracketed names are kept
fn include_spelling(include: &str) -> String {
    if include.starts_with('<') || include.starts_with('"') {
        include.to_string()
    } else {
        format!("<{}>", include)
    }
}

/// The complete `<stem>_checked.h`
pub struct CheckedHeader<'a> {
    /// File name of the wrapped header, as included by the output
    pub header_name: &'a str,
    pub output_name: &'a str,
    pub preamble: Option<&'a str>,
    pub includes: &'a [String],
    pub schema: &'a ResultSchema,
    pub wrappers: &'a [WrapperSpec],
}

impl CheckedHeader<'_> {
    fn system_includes(&self) -> Vec<String> {
        let mut includes: Vec<String> = self.includes.iter().map(|i| include_spelling(i)).collect();
        if self.wrappers.iter().any(WrapperSpec::forwards_variadic) && !includes.iter().any(|i| i == STDARG) {
            includes.push(STDARG.to_string());
        }
        includes
    }
}

impl fmt::Display for CheckedHeader<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(preamble) = self.preamble {
            writeln!(f, "{}", preamble.trim_end())?;
            writeln!(f)?;
        }
        writeln!(f, "{}", BANNER)?;

        let guard = include_guard(self.output_name);
        writeln!(f)?;
        writeln!(f, "#ifndef {}", guard)?;
        writeln!(f, "#define {}", guard)?;
        writeln!(f)?;

        for include in self.system_includes() {
            writeln!(f, "#include {}", include)?;
        }
        writeln!(f)?;
        writeln!(f, "#include \"{}\"", self.header_name)?;
        writeln!(f)?;

        writeln!(f, "{}", self.schema)?;
        for wrapper in self.wrappers {
            writeln!(f, "{}", wrapper)?;
        }

        writeln!(f, "#endif /* {} */", guard)
    }
}

impl fmt::Display for ResultSchema {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "typedef struct {{")?;
        writeln!(f, "{INDENT}int {};", ERROR_CODE_FIELD)?;
        writeln!(f, "{INDENT}union {{")?;
        if self.fields().is_empty() {
            writeln!(f, "{INDENT}{INDENT}char _unused;")?;
        }
        for field in self.fields() {
            writeln!(f, "{INDENT}{INDENT}{};", field.declaration())?;
        }
        writeln!(f, "{INDENT}}} value;")?;
        writeln!(f, "}} {};", self.type_name())
    }
}

impl fmt::Display for WrapperSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let res = &self.locals.result;

        writeln!(f, "static inline {}", self.result_type)?;
        writeln!(f, "{}({})", self.name, parameter_list(&self.parameters, self.is_variadic))?;
        writeln!(f, "{{")?;
        writeln!(f, "{INDENT}{} {} = {{ 0 }};", self.result_type, res)?;

        for step in &self.steps {
            match step {
                Step::NullGuard { parameter } => {
                    writeln!(f, "{INDENT}// Check for null pointer parameter: {}", parameter)?;
                    writeln!(f, "{INDENT}if ({} == NULL) {{", parameter)?;
                    writeln!(f, "{INDENT}{INDENT}{}.{} = {};", res, ERROR_CODE_FIELD, NULL_ARGUMENT)?;
                    writeln!(f, "{INDENT}{INDENT}return {};", res)?;
                    writeln!(f, "{INDENT}}}")?;
                }
                Step::VariadicForward { anchor, list } => {
                    writeln!(f, "{INDENT}va_list {};", list)?;
                    writeln!(f, "{INDENT}va_start({}, {});", list, anchor)?;
                }
                Step::Call {
                    callee,
                    arguments,
                    forwarded,
                    capture,
                } => {
                    let arguments: Vec<&str> =
                        arguments.iter().chain(forwarded.iter()).map(String::as_str).collect();
                    let call = format!("{}({})", callee, arguments.join(", "));
                    writeln!(f, "{INDENT}// Execute the original function")?;
                    match capture {
                        Some(local) => writeln!(f, "{INDENT}{} = {};", declare(&self.return_type, local), call)?,
                        None => writeln!(f, "{INDENT}{};", call)?,
                    }
                }
                Step::VariadicEnd { list } => writeln!(f, "{INDENT}va_end({});", list)?,
                Step::Populate(outcome) => self.fmt_populate(f, outcome)?,
            }
        }

        writeln!(f, "{INDENT}return {};", res)?;
        writeln!(f, "}}")
    }
}

impl WrapperSpec {
    fn fmt_populate(&self, f: &mut fmt::Formatter<'_>, outcome: &Outcome) -> fmt::Result {
        let res = &self.locals.result;
        let value = &self.locals.original_result;

        writeln!(f, "{INDENT}// Assign return value and error code")?;
        let (condition, field, assigned) = match outcome {
            Outcome::Void => return writeln!(f, "{INDENT}{}.{} = 0;", res, ERROR_CODE_FIELD),
            Outcome::Value { field } => {
                writeln!(f, "{INDENT}{}.{} = 0;", res, ERROR_CODE_FIELD)?;
                return writeln!(f, "{INDENT}{}.value.{} = {};", res, field, value);
            }
            Outcome::Boolean { field } => (value.clone(), field, value.clone()),
            Outcome::Pointer { field, field_type } => (
                format!("{} != NULL", value),
                field,
                format!("({}){}", field_type, value),
            ),
        };

        writeln!(f, "{INDENT}if ({}) {{", condition)?;
        writeln!(f, "{INDENT}{INDENT}{}.{} = 0;", res, ERROR_CODE_FIELD)?;
        writeln!(f, "{INDENT}{INDENT}{}.value.{} = {};", res, field, assigned)?;
        writeln!(f, "{INDENT}}}")?;
        writeln!(f, "{INDENT}else {{")?;
        writeln!(f, "{INDENT}{INDENT}{}.{} = {};", res, ERROR_CODE_FIELD, FAILED_RESULT)?;
        writeln!(f, "{INDENT}}}")
    }
}
