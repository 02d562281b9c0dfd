//! Checked header generator driver
//!
//! Runs the front end and the generator over each header and writes, checks
//! or prints the results. Headers are independent; one failing header never
//! stops the others.

pub mod config;
pub mod output;

use checkgen_common::GeneratorError;
use checkgen_core::{generate, GeneratedHeader, GeneratorOptions};
use checkgen_frontend::{front_end_for, FrontEnd, FrontEndOptions};
use log::info;
use rayon::prelude::*;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OutputMode {
    #[default]
    Write,
    /// Compare with the existing outputs and write nothing
    Check,
    Stdout,
}

#[derive(Debug, Clone, Default)]
pub struct Settings {
    pub generator: GeneratorOptions,
    pub front_end: FrontEndOptions,
    /// Outputs go next to their headers when unset
    pub output_dir: Option<PathBuf>,
    pub mode: OutputMode,
    pub parallel: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HeaderStatus {
    Written,
    Unchanged,
    /// Differs from, or is missing at, the output path
    Stale,
    Printed,
}

#[derive(Debug, Clone)]
pub struct HeaderOutcome {
    pub output: PathBuf,
    pub status: HeaderStatus,
    pub generated: GeneratedHeader,
}

#[derive(Debug, Clone)]
pub struct HeaderReport {
    pub header: PathBuf,
    pub result: Result<HeaderOutcome, GeneratorError>,
}

impl HeaderReport {
    pub fn succeeded(&self) -> bool {
        matches!(&self.result, Ok(outcome) if outcome.status != HeaderStatus::Stale)
    }
}

pub fn output_path(header: &Path, file_name: &str, output_dir: Option<&Path>) -> PathBuf {
    match output_dir {
        Some(dir) => dir.join(file_name),
        None => header.with_file_name(file_name),
    }
}

/// Generate the checked header of one input
pub fn process_header(
    header: &Path,
    front_end: &dyn FrontEnd,
    settings: &Settings,
) -> Result<HeaderOutcome, GeneratorError> {
    let unit = front_end.parse_header(header, &settings.front_end)?;
    let generated = generate(&unit, header, &settings.generator)?;
    let output = output_path(header, &generated.file_name, settings.output_dir.as_deref());

    let status = match settings.mode {
        OutputMode::Stdout => HeaderStatus::Printed,
        OutputMode::Check if output::is_up_to_date(&output, &generated.contents)? => HeaderStatus::Unchanged,
        OutputMode::Check => HeaderStatus::Stale,
        OutputMode::Write if output::is_up_to_date(&output, &generated.contents)? => HeaderStatus::Unchanged,
        OutputMode::Write => {
            output::write_atomic(&output, &generated.contents)?;
            HeaderStatus::Written
        }
    };

    info!(
        "{}: {} wrappers, {} ({:?})",
        header.display(),
        generated.wrapper_count,
        output.display(),
        status
    );
    Ok(HeaderOutcome {
        output,
        status,
        generated,
    })
}

/// Process every header, in parallel when allowed. Reports come back in
/// input order.
pub fn run(headers: &[PathBuf], settings: &Settings) -> Result<Vec<HeaderReport>, GeneratorError> {
    let front_end = front_end_for(&settings.front_end)?;
    let process = |header: &PathBuf| HeaderReport {
        header: header.clone(),
        result: process_header(header, front_end.as_ref(), settings),
    };

    let reports: Vec<HeaderReport> = if settings.parallel && headers.len() > 1 {
        headers.par_iter().map(process).collect()
    } else {
        headers.iter().map(process).collect()
    };
    Ok(reports)
}
