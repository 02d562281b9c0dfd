mod condition;

use crate::{Macro, Preprocessor};
use anyhow::{anyhow, Context, Result};
use once_cell::sync::Lazy;
use regex::Regex;
use std::fs;
use std::path::PathBuf;

/// Maximum nesting of macro expansions
const MAX_EXPANSION_DEPTH: usize = 100;

/// Token paste operator together with the whitespace around it
static PASTE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s*##\s*").expect("paste pattern is valid"));

/// GNU `, ## __VA_ARGS__`: the comma disappears when no variadic arguments are given
static GNU_COMMA: Lazy<Regex> =
    Lazy::new(|| Regex::new(r",\s*##\s*__VA_ARGS__").expect("comma paste pattern is valid"));

impl Preprocessor {
    /// Handle include directive implementation
    pub fn handle_include_impl(
        &mut self,
        path: String,
        is_system: bool,
        is_next: bool,
        output: &mut String,
    ) -> Result<()> {
        if self.include_depth >= crate::MAX_INCLUDE_DEPTH {
            return Err(anyhow!("Maximum include depth ({}) exceeded", crate::MAX_INCLUDE_DEPTH));
        }

        let Some(file_path) = self.find_include_file(&path, is_system, is_next) else {
            // Declarations the generator needs come from the input header;
            // unresolved names fall back to opaque type names.
            let (open, close) = if is_system { ('<', '>') } else { ('"', '"') };
            log::warn!(
                "{}: cannot find include file {}{}{}, skipping",
                self.presumed_name, open, path, close
            );
            return Ok(());
        };

        let canonical_path = file_path.canonicalize().unwrap_or_else(|_| file_path.clone());
        if self.pragma_once_files.contains(&canonical_path) {
            return Ok(());
        }

        let content = fs::read_to_string(&file_path)
            .with_context(|| format!("Failed to read include file '{}'", file_path.display()))?;

        log::debug!("entering include file {}", file_path.display());
        self.include_depth += 1;
        let result = self.process_source(&content, canonical_path, file_path.display().to_string(), output);
        self.include_depth -= 1;

        result
    }

    /// Find include file in search paths
    fn find_include_file(&self, path: &str, is_system: bool, is_next: bool) -> Option<PathBuf> {
        let current = self.current_file.as_ref();
        let is_current = |candidate: &PathBuf| {
            current.is_some_and(|c| candidate.canonicalize().map(|p| &p == c).unwrap_or(false))
        };

        // Quoted includes look next to the including file first
        if !is_system && !is_next {
            if let Some(dir) = self.current_dir() {
                let relative_path = dir.join(path);
                if relative_path.is_file() {
                    return Some(relative_path);
                }
            }
        }

        let from_dirs = self
            .include_dirs
            .iter()
            .map(|dir| dir.join(path))
            .filter(|candidate| candidate.is_file())
            .find(|candidate| !is_next || !is_current(candidate));
        if from_dirs.is_some() {
            return from_dirs;
        }

        let path_buf = PathBuf::from(path);
        if !is_system && path_buf.is_file() {
            Some(path_buf)
        } else {
            None
        }
    }

    /// Handle define directive implementation
    pub fn handle_define_impl(&mut self, name: String, params: Option<Vec<String>>, body: String, is_variadic: bool) {
        if let Some(existing) = self.macros.get(&name) {
            if existing.body != body || existing.params != params {
                log::debug!("{}: redefining macro '{}'", self.presumed_name, name);
            }
        }
        self.macros.insert(
            name.clone(),
            Macro {
                name,
                params,
                body,
                is_variadic,
            },
        );
    }

    /// Expand macros in text implementation
    pub fn expand_macros_impl(&self, text: &str) -> Result<String> {
        let mut active = Vec::new();
        self.expand_text(text, &mut active, 0)
    }

    /// Expand every macro invocation in `text`. `active` holds the macros
    /// currently being expanded; they are not expanded again.
    fn expand_text(&self, text: &str, active: &mut Vec<String>, depth: usize) -> Result<String> {
        if depth > MAX_EXPANSION_DEPTH {
            return Err(anyhow!("Maximum macro expansion depth exceeded"));
        }

        let chars: Vec<char> = text.chars().collect();
        let mut result = String::with_capacity(text.len());
        let mut i = 0;

        while i < chars.len() {
            let ch = chars[i];

            if ch == '"' || ch == '\'' {
                let end = skip_literal(&chars, i);
                result.extend(&chars[i..end]);
                i = end;
                continue;
            }

            if ch.is_ascii_digit() {
                // pp-numbers such as 10UL never contain macro names
                let start = i;
                while i < chars.len() && (chars[i].is_ascii_alphanumeric() || chars[i] == '.' || chars[i] == '_') {
                    i += 1;
                }
                result.extend(&chars[start..i]);
                continue;
            }

            if !is_ident_start(ch) {
                result.push(ch);
                i += 1;
                continue;
            }

            let start = i;
            while i < chars.len() && is_ident_char(chars[i]) {
                i += 1;
            }
            let name: String = chars[start..i].iter().collect();

            let macro_def = match self.macros.get(&name) {
                Some(m) if !active.contains(&name) => m,
                _ => {
                    result.push_str(&name);
                    continue;
                }
            };

            let Some(params) = &macro_def.params else {
                active.push(name);
                let expanded = self.expand_text(&macro_def.body, active, depth + 1);
                active.pop();
                result.push_str(&expanded?);
                continue;
            };

            // A function-like macro name without arguments is left alone
            let mut open = i;
            while open < chars.len() && chars[open].is_whitespace() {
                open += 1;
            }
            if chars.get(open) != Some(&'(') {
                result.push_str(&name);
                continue;
            }

            let (args, close) = parse_macro_arguments(&chars, open + 1)
                .with_context(|| format!("in invocation of macro '{}'", name))?;
            let args = check_arity(&name, macro_def, params, args)?;

            let substituted = self.substitute(macro_def, params, &args, active, depth)?;
            active.push(name);
            let expanded = self.expand_text(&substituted, active, depth + 1);
            active.pop();
            result.push_str(&expanded?);

            // Keep the line count stable when an invocation spans lines
            let consumed_newlines = chars[i..=close].iter().filter(|&&c| c == '\n').count();
            for _ in 0..consumed_newlines {
                result.push('\n');
            }
            i = close + 1;
        }

        Ok(result)
    }

    /// Replace parameters in a function-like macro body, handling `#`
    /// stringification and `##` pasting
    fn substitute(
        &self,
        macro_def: &Macro,
        params: &[String],
        args: &[String],
        active: &mut Vec<String>,
        depth: usize,
    ) -> Result<String> {
        let variadic_args = if macro_def.is_variadic {
            args.get(params.len()..).map(|rest| rest.join(", ")).unwrap_or_default()
        } else {
            String::new()
        };

        let body = if macro_def.is_variadic && variadic_args.is_empty() {
            GNU_COMMA.replace_all(&macro_def.body, "").into_owned()
        } else {
            macro_def.body.clone()
        };

        let mut bindings: Vec<(&str, &str)> = params
            .iter()
            .map(String::as_str)
            .zip(args.iter().map(String::as_str))
            .collect();
        if macro_def.is_variadic {
            bindings.push(("__VA_ARGS__", variadic_args.as_str()));
        }

        let chars: Vec<char> = body.chars().collect();
        let mut out = String::with_capacity(body.len());
        let mut i = 0;

        while i < chars.len() {
            let ch = chars[i];

            if ch == '"' || ch == '\'' {
                let end = skip_literal(&chars, i);
                out.extend(&chars[i..end]);
                i = end;
                continue;
            }

            if ch == '#' {
                if chars.get(i + 1) == Some(&'#') {
                    out.push_str("##");
                    i += 2;
                    continue;
                }
                let mut j = i + 1;
                while j < chars.len() && chars[j].is_whitespace() {
                    j += 1;
                }
                let name_end = ident_end(&chars, j);
                let name: String = chars[j..name_end].iter().collect();
                if let Some(arg) = binding(&bindings, &name) {
                    out.push_str(&stringify(arg));
                    i = name_end;
                } else {
                    out.push('#');
                    i += 1;
                }
                continue;
            }

            if !is_ident_start(ch) {
                out.push(ch);
                i += 1;
                continue;
            }

            let end = ident_end(&chars, i);
            let name: String = chars[i..end].iter().collect();
            match binding(&bindings, &name) {
                Some(arg) => {
                    // Operands of ## are pasted unexpanded
                    let rest: String = chars[end..].iter().collect();
                    let pasted = out.trim_end().ends_with("##") || rest.trim_start().starts_with("##");
                    if pasted {
                        out.push_str(arg);
                    } else {
                        out.push_str(&self.expand_text(arg, active, depth + 1)?);
                    }
                }
                None => out.push_str(&name),
            }
            i = end;
        }

        Ok(PASTE.replace_all(&out, "").into_owned())
    }
}

fn binding<'a>(bindings: &[(&str, &'a str)], name: &str) -> Option<&'a str> {
    bindings.iter().find(|(param, _)| *param == name).map(|(_, arg)| *arg)
}

fn check_arity(name: &str, macro_def: &Macro, params: &[String], mut args: Vec<String>) -> Result<Vec<String>> {
    // `F()` passes one empty argument to a one-parameter macro
    if args.is_empty() && params.len() == 1 {
        args.push(String::new());
    }

    let too_few = args.len() < params.len();
    let too_many = args.len() > params.len() && !macro_def.is_variadic;
    if too_few || too_many {
        return Err(anyhow!(
            "Macro '{}' expects {} arguments, got {}",
            name,
            params.len(),
            args.len()
        ));
    }
    Ok(args)
}

/// Parse macro arguments starting just after the opening parenthesis.
/// Returns the arguments and the index of the closing parenthesis.
fn parse_macro_arguments(chars: &[char], start: usize) -> Result<(Vec<String>, usize)> {
    let mut args = Vec::new();
    let mut current_arg = String::new();
    let mut paren_depth = 0;
    let mut i = start;

    while i < chars.len() {
        let ch = chars[i];
        match ch {
            '"' | '\'' => {
                let end = skip_literal(chars, i);
                current_arg.extend(&chars[i..end]);
                i = end;
                continue;
            }
            '(' => {
                paren_depth += 1;
                current_arg.push(ch);
            }
            ')' if paren_depth == 0 => {
                if !current_arg.trim().is_empty() || !args.is_empty() {
                    args.push(current_arg.trim().to_string());
                }
                return Ok((args, i));
            }
            ')' => {
                paren_depth -= 1;
                current_arg.push(ch);
            }
            ',' if paren_depth == 0 => {
                args.push(current_arg.trim().to_string());
                current_arg.clear();
            }
            '\n' => current_arg.push(' '),
            _ => current_arg.push(ch),
        }
        i += 1;
    }

    Err(anyhow!("Unterminated macro arguments"))
}

/// Index just past the string or character literal starting at `start`
fn skip_literal(chars: &[char], start: usize) -> usize {
    let quote = chars[start];
    let mut i = start + 1;
    while i < chars.len() {
        match chars[i] {
            '\\' => i += 2,
            c if c == quote => return i + 1,
            '\n' => return i,
            _ => i += 1,
        }
    }
    chars.len()
}

fn stringify(arg: &str) -> String {
    let mut out = String::with_capacity(arg.len() + 2);
    out.push('"');
    for ch in arg.trim().chars() {
        if ch == '"' || ch == '\\' {
            out.push('\\');
        }
        out.push(ch);
    }
    out.push('"');
    out
}

fn ident_end(chars: &[char], start: usize) -> usize {
    let mut i = start;
    if i < chars.len() && is_ident_start(chars[i]) {
        while i < chars.len() && is_ident_char(chars[i]) {
            i += 1;
        }
    }
    i
}

fn is_ident_start(ch: char) -> bool {
    ch.is_ascii_alphabetic() || ch == '_' || ch == '$'
}

fn is_ident_char(ch: char) -> bool {
    ch.is_ascii_alphanumeric() || ch == '_' || ch == '$'
}
