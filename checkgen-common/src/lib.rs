//! Checked header generator - Common Types and Utilities
//!
//! This crate contains the error taxonomy, diagnostics and source
//! locations shared by the front end, the generator core and the driver.

pub mod error;
pub mod source_loc;

pub use error::{Diagnostic, ErrorReporter, GeneratorError, Severity};
pub use source_loc::{SourceLocation, SourceSpan};
