//! Front end backed by an external C preprocessor (`gcc -E`, `cc -E`,
//! `clang -E`). Useful when a header depends on the real system headers
//! or on compiler predefined macros.

use crate::{parse_source, FrontEnd, FrontEndOptions, TranslationUnit};
use checkgen_common::{GeneratorError, SourceLocation};
use std::path::{Path, PathBuf};
use std::process::Command;

#[derive(Debug, Clone)]
pub struct ExternalFrontEnd {
    program: PathBuf,
}

impl ExternalFrontEnd {
    /// Find `program` on `PATH` (or accept it as a path)
    pub fn locate(program: &str) -> Result<Self, GeneratorError> {
        let program = which::which(program).map_err(|e| GeneratorError::IoError {
            message: format!("cannot find preprocessor '{}': {}", program, e),
        })?;
        Ok(Self { program })
    }

    pub fn program(&self) -> &Path {
        &self.program
    }

    /// Command-line arguments for preprocessing `path`
    pub fn arguments(&self, path: &Path, options: &FrontEndOptions) -> Vec<String> {
        let mut args = vec!["-E".to_string()];
        args.extend(options.all_defines().map(|define| format!("-D{}", define)));
        args.extend(options.include_dirs.iter().map(|dir| format!("-I{}", dir.display())));
        args.push(path.display().to_string());
        args
    }
}

impl FrontEnd for ExternalFrontEnd {
    fn parse_header(&self, path: &Path, options: &FrontEndOptions) -> Result<TranslationUnit, GeneratorError> {
        let main_file = path.display().to_string();
        let args = self.arguments(path, options);
        log::debug!("running {} {}", self.program.display(), args.join(" "));

        let output = Command::new(&self.program).args(&args).output().map_err(|e| GeneratorError::IoError {
            message: format!("cannot run '{}': {}", self.program.display(), e),
        })?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(GeneratorError::parse_error(
                format!("{} failed ({}): {}", self.program.display(), output.status, stderr.trim()),
                SourceLocation::new(&main_file, 1, 1),
            ));
        }

        let text = String::from_utf8_lossy(&output.stdout);
        parse_source(&text, &main_file)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::NEUTRALIZING_DEFINES;

    #[test]
    fn test_arguments_order() {
        let front_end = ExternalFrontEnd {
            program: PathBuf::from("/usr/bin/gcc"),
        };
        let options = FrontEndOptions {
            defines: vec!["API_EXPORT=".to_string()],
            include_dirs: vec![PathBuf::from("include")],
            cpp: Some("gcc".to_string()),
        };
        let args = front_end.arguments(Path::new("include/api.h"), &options);

        assert_eq!(args[0], "-E");
        assert_eq!(args[1], format!("-D{}", NEUTRALIZING_DEFINES[0]));
        assert_eq!(args[NEUTRALIZING_DEFINES.len() + 1], "-DAPI_EXPORT=");
        assert_eq!(args[args.len() - 2], "-Iinclude");
        assert_eq!(args[args.len() - 1], "include/api.h");
    }

    #[test]
    fn test_missing_program() {
        let err = ExternalFrontEnd::locate("checkgen-no-such-preprocessor").unwrap_err();
        assert!(matches!(err, GeneratorError::IoError { .. }));
    }
}
