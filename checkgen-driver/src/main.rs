//! checkgen
//!
//! Generates `<stem>_checked.h` for each C header given on the command
//! line: one `static inline` wrapper per function prototype, returning a
//! shared Result type and rejecting NULL pointer arguments.

use anyhow::{ensure, Context, Result};
use checkgen_common::{ErrorReporter, SourceLocation, SourceSpan};
use checkgen_driver::config::Config;
use checkgen_driver::{run, HeaderReport, HeaderStatus, OutputMode, Settings};
use clap::Parser;
use std::fs;
use std::path::PathBuf;
use std::process::ExitCode;

#[derive(Parser, Debug)]
#[command(name = "checkgen")]
#[command(about = "Generate null-checked wrappers for the functions of C headers")]
#[command(version)]
struct Cli {
    /// Headers to wrap
    #[arg(required = true, value_name = "HEADERS")]
    headers: Vec<PathBuf>,

    /// Directory for generated headers (defaults to each header's directory)
    #[arg(short, long, value_name = "DIR")]
    out_dir: Option<PathBuf>,

    /// Include directories
    #[arg(short = 'I', long = "include", value_name = "DIR")]
    include_dirs: Vec<PathBuf>,

    /// Define macro
    #[arg(short = 'D', long = "define", value_name = "NAME[=VALUE]")]
    defines: Vec<String>,

    /// Preprocess with an external program (gcc, clang, cc) instead of the builtin preprocessor
    #[arg(long, value_name = "PROGRAM")]
    cpp: Option<String>,

    /// JSON configuration file
    #[arg(long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Name of the generated Result type
    #[arg(long, value_name = "NAME")]
    result_type: Option<String>,

    /// File whose text is placed at the top of every generated header
    #[arg(long, value_name = "FILE")]
    preamble_file: Option<PathBuf>,

    /// Fail if any generated header is missing or out of date; write nothing
    #[arg(long, conflicts_with = "stdout")]
    check: bool,

    /// Print generated headers instead of writing them
    #[arg(long)]
    stdout: bool,

    /// Process headers one at a time
    #[arg(long)]
    no_parallel: bool,

    /// Verbose output
    #[arg(short, long)]
    verbose: bool,
}

impl Cli {
    /// Configuration file settings, overridden or extended by the command line
    fn settings(&self) -> Result<Settings> {
        let config = match &self.config {
            Some(path) => Config::load(path)?,
            None => Config::default(),
        };

        let mut generator = config.generator_options();
        if let Some(name) = &self.result_type {
            generator.result_type = name.clone();
        }
        ensure!(
            is_identifier(&generator.result_type),
            "result type '{}' is not a C identifier",
            generator.result_type
        );
        if let Some(path) = &self.preamble_file {
            let preamble =
                fs::read_to_string(path).with_context(|| format!("cannot read preamble '{}'", path.display()))?;
            generator.preamble = Some(preamble);
        }

        let mut front_end = config.front_end_options();
        front_end.defines.extend(self.defines.iter().cloned());
        front_end.include_dirs.extend(self.include_dirs.iter().cloned());
        if self.cpp.is_some() {
            front_end.cpp = self.cpp.clone();
        }

        let mode = if self.check {
            OutputMode::Check
        } else if self.stdout {
            OutputMode::Stdout
        } else {
            OutputMode::Write
        };

        Ok(Settings {
            generator,
            front_end,
            output_dir: self.out_dir.clone().or(config.output_dir),
            mode,
            parallel: !self.no_parallel,
        })
    }
}

fn is_identifier(name: &str) -> bool {
    let mut chars = name.chars();
    matches!(chars.next(), Some(c) if c.is_ascii_alphabetic() || c == '_')
        && chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    let level = if cli.verbose { "debug" } else { "warn" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level)).init();

    match generate_all(&cli) {
        Ok(code) => code,
        Err(e) => {
            eprintln!("error: {:#}", e);
            ExitCode::FAILURE
        }
    }
}

fn generate_all(cli: &Cli) -> Result<ExitCode> {
    let settings = cli.settings()?;
    let reports = run(&cli.headers, &settings)?;

    for outcome in reports.iter().filter_map(|report| report.result.as_ref().ok()) {
        if outcome.status == HeaderStatus::Printed {
            print!("{}", outcome.generated.contents);
        }
    }

    let reporter = diagnose(&reports);
    reporter.print_diagnostics();
    if reporter.has_errors() || reporter.warning_count() > 0 {
        eprintln!("{}", reporter.summary());
    }
    if reporter.has_errors() {
        return Ok(ExitCode::FAILURE);
    }
    Ok(ExitCode::SUCCESS)
}

/// Errors for failed and stale headers, warnings for headers with nothing to wrap
fn diagnose(reports: &[HeaderReport]) -> ErrorReporter {
    let mut reporter = ErrorReporter::new();
    for report in reports {
        let header = report.header.display().to_string();
        match &report.result {
            Ok(outcome) => {
                if outcome.generated.wrapper_count == 0 {
                    reporter.warning(
                        format!("{} declares no functions; {} has no wrappers", header, outcome.generated.file_name),
                        SourceSpan::from_location(SourceLocation::new(&header, 1, 1)),
                    );
                }
                if outcome.status == HeaderStatus::Stale {
                    reporter.error(format!("{} is out of date", outcome.output.display()), SourceSpan::dummy());
                }
            }
            Err(e) => reporter.report(e.to_diagnostic().with_note(format!("no output generated for {}", header))),
        }
    }
    reporter
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_command_line_extends_config() {
        let dir = tempfile::tempdir().unwrap();
        let config = dir.path().join("checkgen.json");
        fs::write(&config, r#"{ "defines": ["A=1"], "result_type": "ApiResult", "output_dir": "out" }"#).unwrap();

        let cli = Cli::parse_from([
            "checkgen",
            "--config",
            config.to_str().unwrap(),
            "-D",
            "B=2",
            "--check",
            "api.h",
        ]);
        let settings = cli.settings().unwrap();

        assert_eq!(settings.front_end.defines, vec!["A=1", "B=2"]);
        assert_eq!(settings.generator.result_type, "ApiResult");
        assert_eq!(settings.output_dir, Some(dir.path().join("out")));
        assert_eq!(settings.mode, OutputMode::Check);
        assert!(settings.parallel);
    }

    #[test]
    fn test_result_type_must_be_an_identifier() {
        let cli = Cli::parse_from(["checkgen", "--result-type", "2fast", "api.h"]);
        assert!(cli.settings().is_err());
        assert!(is_identifier("_Result1"));
    }

    #[test]
    fn test_headers_without_functions_are_warned_about() {
        let dir = tempfile::tempdir().unwrap();
        let types = dir.path().join("types.h");
        let api = dir.path().join("api.h");
        fs::write(&types, "typedef struct Module *module_t;\n").unwrap();
        fs::write(&api, "int add(int a, int b);\n").unwrap();

        let settings = Settings {
            mode: OutputMode::Stdout,
            ..Settings::default()
        };
        let reports = run(&[types, api], &settings).unwrap();
        let reporter = diagnose(&reports);

        assert!(!reporter.has_errors());
        assert_eq!(reporter.warning_count(), 1);
        assert!(reporter.diagnostics()[0].message.contains("types.h declares no functions"));
        assert_eq!(reporter.summary(), "1 warning");
    }

    #[test]
    fn test_stale_and_failed_headers_are_errors() {
        let dir = tempfile::tempdir().unwrap();
        let api = dir.path().join("api.h");
        let bad = dir.path().join("bad.h");
        fs::write(&api, "int add(int a, int b);\n").unwrap();
        fs::write(&bad, "int broken(int (*callback)(void));\n").unwrap();

        let settings = Settings {
            mode: OutputMode::Check,
            ..Settings::default()
        };
        let reporter = diagnose(&run(&[api, bad], &settings).unwrap());

        assert_eq!(reporter.error_count(), 2);
        assert_eq!(reporter.warning_count(), 0);
        assert!(reporter.diagnostics()[1].notes[0].starts_with("no output generated for"));
    }

    #[test]
    fn test_check_conflicts_with_stdout() {
        assert!(Cli::try_parse_from(["checkgen", "--check", "--stdout", "api.h"]).is_err());
        assert!(Cli::try_parse_from(["checkgen"]).is_err());
    }
}
