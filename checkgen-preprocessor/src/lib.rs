//! C preprocessor used by the builtin front end
//!
//! Produces preprocessed text annotated with GCC-style line markers
//! (`# <line> "<file>"`) so that every declaration downstream can be
//! attributed to the file and line it came from.

pub mod lexer;
pub mod parser;
pub mod directives;

use anyhow::{anyhow, Result};
use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::{BTreeMap, HashSet};
use std::path::{Path, PathBuf};

pub use lexer::Token;
pub use parser::{Directive, SourceDirective};

/// Main preprocessor struct
pub struct Preprocessor {
    /// Defined macros, ordered so expansion never depends on hash order
    macros: BTreeMap<String, Macro>,
    /// Include search paths
    include_dirs: Vec<PathBuf>,
    /// Stack of conditional compilation states
    conditional_stack: Vec<ConditionalState>,
    /// Current file being processed
    current_file: Option<PathBuf>,
    /// File name written into line markers for the current file
    presumed_name: String,
    /// Offset applied to source lines by `#line`
    line_delta: i64,
    /// Current include depth
    include_depth: usize,
    /// Files marked with #pragma once
    pragma_once_files: HashSet<PathBuf>,
    /// File and line the next output line is attributed to
    output_position: Option<(String, usize)>,
}

/// Maximum include depth (standard is usually 200-1024)
const MAX_INCLUDE_DEPTH: usize = 200;

/// `NAME`, `NAME=VALUE` or `NAME(a, b)=BODY`
static DEFINE_SPEC: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^\s*([A-Za-z_$][A-Za-z0-9_$]*)(?:\(([^)]*)\))?(?:=(.*))?$")
        .expect("define spec pattern is valid")
});

/// Represents a macro definition
#[derive(Debug, Clone, PartialEq)]
pub struct Macro {
    pub name: String,
    pub params: Option<Vec<String>>,
    pub body: String,
    pub is_variadic: bool,
}

/// State for conditional compilation
#[derive(Debug, Clone)]
struct ConditionalState {
    active: bool,
    /// Some branch of this group has already been selected
    taken: bool,
    has_else: bool,
    parent_active: bool,
}

impl Preprocessor {
    /// Create a new preprocessor
    pub fn new() -> Self {
        Self {
            macros: BTreeMap::new(),
            include_dirs: vec![],
            conditional_stack: vec![],
            current_file: None,
            presumed_name: String::new(),
            line_delta: 0,
            include_depth: 0,
            pragma_once_files: HashSet::new(),
            output_position: None,
        }
    }

    /// Add an include directory
    pub fn add_include_dir(&mut self, dir: PathBuf) {
        self.include_dirs.push(dir);
    }

    /// Define an object-like macro
    pub fn define(&mut self, name: String, value: Option<String>) {
        let body = value.unwrap_or_else(|| "1".to_string());
        self.macros.insert(
            name.clone(),
            Macro {
                name,
                params: None,
                body,
                is_variadic: false,
            },
        );
    }

    /// Define a macro from command-line syntax: `NAME`, `NAME=VALUE`,
    /// or `NAME(a, b)=BODY`
    pub fn define_from_spec(&mut self, spec: &str) -> Result<()> {
        let caps = DEFINE_SPEC
            .captures(spec)
            .ok_or_else(|| anyhow!("Invalid macro definition '{}'", spec))?;
        let name = caps[1].to_string();
        let value = caps.get(3).map(|m| m.as_str().trim().to_string());

        let Some(param_list) = caps.get(2) else {
            self.define(name, value);
            return Ok(());
        };

        let mut params = Vec::new();
        let mut is_variadic = false;
        for param in param_list.as_str().split(',').map(str::trim).filter(|p| !p.is_empty()) {
            if param == "..." {
                is_variadic = true;
            } else if is_variadic {
                return Err(anyhow!("Parameter after '...' in macro definition '{}'", spec));
            } else {
                params.push(param.to_string());
            }
        }

        self.macros.insert(
            name.clone(),
            Macro {
                name,
                params: Some(params),
                body: value.unwrap_or_default(),
                is_variadic,
            },
        );
        Ok(())
    }

    /// Undefine a macro
    pub fn undefine(&mut self, name: &str) {
        self.macros.remove(name);
    }

    pub fn is_defined(&self, name: &str) -> bool {
        self.macros.contains_key(name)
    }

    /// Process a source file
    pub fn process(&mut self, input: &str, source_file: PathBuf) -> Result<String> {
        let mut output = String::new();
        self.output_position = None;

        let name = source_file.display().to_string();
        self.process_source(input, source_file, name, &mut output)?;

        if !output.is_empty() && !output.ends_with('\n') {
            output.push('\n');
        }
        Ok(output)
    }

    /// Preprocess one file's text, appending to `output`
    fn process_source(
        &mut self,
        input: &str,
        path: PathBuf,
        name: String,
        output: &mut String,
    ) -> Result<()> {
        let saved_file = self.current_file.replace(path);
        let saved_name = std::mem::replace(&mut self.presumed_name, name);
        let saved_delta = std::mem::replace(&mut self.line_delta, 0);
        let conditional_depth = self.conditional_stack.len();

        let result = lexer::tokenize(input)
            .and_then(|tokens| parser::parse(&tokens))
            .and_then(|directives| self.process_directives(directives, output));

        let result = result.and_then(|()| {
            if self.conditional_stack.len() != conditional_depth {
                Err(anyhow!("{}: unterminated conditional directive", self.presumed_name))
            } else {
                Ok(())
            }
        });

        self.current_file = saved_file;
        self.presumed_name = saved_name;
        self.line_delta = saved_delta;

        result
    }

    /// Process parsed directives
    fn process_directives(&mut self, directives: Vec<SourceDirective>, output: &mut String) -> Result<()> {
        for SourceDirective { line, directive } in directives {
            // Conditionals must be tracked even inside skipped regions
            match directive {
                Directive::If { .. } | Directive::Ifdef { .. } | Directive::Ifndef { .. } => {
                    self.handle_conditional_start(directive)?;
                    continue;
                }
                Directive::Elif { .. } | Directive::Else => {
                    self.handle_conditional_else(directive)?;
                    continue;
                }
                Directive::Endif => {
                    self.handle_conditional_end()?;
                    continue;
                }
                _ => {}
            }

            if !self.should_output() {
                continue;
            }

            match directive {
                Directive::Include { path, is_system, is_next } => {
                    self.handle_include_impl(path, is_system, is_next, output)?;
                }
                Directive::Define { name, params, body, is_variadic } => {
                    self.handle_define_impl(name, params, body, is_variadic);
                }
                Directive::Undef { name } => {
                    self.undefine(&name);
                }
                Directive::Line { number, file } => {
                    self.handle_line(line, number, file);
                }
                Directive::Pragma { content } => {
                    if content.trim() == "once" {
                        if let Some(file) = &self.current_file {
                            self.pragma_once_files.insert(file.clone());
                        }
                    }
                }
                Directive::Error { message } => {
                    return Err(anyhow!("{}:{}: #error {}", self.presumed_name, self.presumed_line(line), message));
                }
                Directive::Warning { message } => {
                    log::warn!("{}:{}: #warning {}", self.presumed_name, self.presumed_line(line), message);
                }
                Directive::Unknown { content } => {
                    self.handle_unknown(line, &content);
                }
                Directive::Text(text) => {
                    self.emit_text(output, line, &text)?;
                }
                Directive::If { .. } | Directive::Ifdef { .. } | Directive::Ifndef { .. }
                | Directive::Elif { .. } | Directive::Else | Directive::Endif => {}
            }
        }

        Ok(())
    }

    /// Expand a text chunk and append it, preceded by a line marker when
    /// the output position has drifted from the source position
    fn emit_text(&mut self, output: &mut String, source_line: usize, text: &str) -> Result<()> {
        let expanded = self.expand_macros(text)?;
        if expanded.trim().is_empty() {
            return Ok(());
        }

        // Leading blank lines are dropped; the marker accounts for them
        let mut body = expanded.as_str();
        let mut line = self.presumed_line(source_line);
        while let Some(pos) = body.find('\n') {
            if !body[..pos].trim().is_empty() {
                break;
            }
            body = &body[pos + 1..];
            line += 1;
        }

        let in_sync = matches!(
            &self.output_position,
            Some((file, next)) if *file == self.presumed_name && *next == line
        );
        if !in_sync {
            if !output.is_empty() && !output.ends_with('\n') {
                output.push('\n');
            }
            output.push_str(&line_marker(line, &self.presumed_name));
        }

        output.push_str(body);
        let end_line = line + body.matches('\n').count();
        self.output_position = Some((self.presumed_name.clone(), end_line));
        Ok(())
    }

    fn presumed_line(&self, source_line: usize) -> usize {
        (source_line as i64 + self.line_delta).max(1) as usize
    }

    /// Check if we should output based on conditional stack
    fn should_output(&self) -> bool {
        self.conditional_stack.iter().all(|c| c.active)
    }

    /// Expand macros in text
    pub fn expand_macros(&self, text: &str) -> Result<String> {
        self.expand_macros_impl(text)
    }

    /// Handle conditional start directives
    fn handle_conditional_start(&mut self, directive: Directive) -> Result<()> {
        let parent_active = self.should_output();
        let active = match directive {
            Directive::If { condition } => parent_active && self.evaluate_condition(&condition)?,
            Directive::Ifdef { name } => parent_active && self.macros.contains_key(&name),
            Directive::Ifndef { name } => parent_active && !self.macros.contains_key(&name),
            _ => return Ok(()),
        };

        self.conditional_stack.push(ConditionalState {
            active,
            taken: active,
            has_else: false,
            parent_active,
        });

        Ok(())
    }

    /// Handle else/elif directives
    fn handle_conditional_else(&mut self, directive: Directive) -> Result<()> {
        let Some(state) = self.conditional_stack.last() else {
            return Err(anyhow!("{}: #else or #elif without matching #if", self.presumed_name));
        };
        if state.has_else {
            return Err(anyhow!("{}: #else or #elif after #else", self.presumed_name));
        }
        let candidate = state.parent_active && !state.taken;
        let is_else = matches!(directive, Directive::Else);

        let active = match directive {
            Directive::Else => candidate,
            Directive::Elif { condition } => candidate && self.evaluate_condition(&condition)?,
            _ => return Ok(()),
        };

        if let Some(state) = self.conditional_stack.last_mut() {
            state.has_else = is_else;
            state.active = active;
            state.taken |= active;
        }

        Ok(())
    }

    /// Handle endif directive
    fn handle_conditional_end(&mut self) -> Result<()> {
        if self.conditional_stack.pop().is_none() {
            return Err(anyhow!("{}: #endif without matching #if", self.presumed_name));
        }
        Ok(())
    }

    /// Handle `#line N ["file"]`: the line after the directive becomes N
    fn handle_line(&mut self, directive_line: usize, number: usize, file: Option<String>) {
        self.line_delta = number as i64 - (directive_line as i64 + 1);
        if let Some(file) = file {
            self.presumed_name = file;
        }
    }

    /// Input line markers (`# 12 "file.h"`) act like `#line`; anything
    /// else (`#ident`, null directive) is ignored
    fn handle_unknown(&mut self, directive_line: usize, content: &str) {
        let mut parts = content.split_whitespace();
        match parts.next().map(str::parse::<usize>) {
            Some(Ok(number)) => {
                let file = parts
                    .next()
                    .filter(|f| f.len() >= 2 && f.starts_with('"') && f.ends_with('"'))
                    .map(|f| f[1..f.len() - 1].to_string());
                self.handle_line(directive_line, number, file);
            }
            _ => log::debug!("{}: ignoring directive '#{}'", self.presumed_name, content),
        }
    }

    fn current_dir(&self) -> Option<&Path> {
        self.current_file.as_deref().and_then(Path::parent)
    }
}

impl Default for Preprocessor {
    fn default() -> Self {
        Self::new()
    }
}

fn line_marker(line: usize, file: &str) -> String {
    let escaped = file.replace('\\', "\\\\").replace('"', "\\\"");
    format!("# {} \"{}\"\n", line, escaped)
}
