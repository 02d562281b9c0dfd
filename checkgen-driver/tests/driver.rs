use checkgen_common::GeneratorError;
use checkgen_driver::{run, HeaderStatus, OutputMode, Settings};
use indoc::indoc;
use pretty_assertions::assert_eq;
use std::fs;
use std::path::{Path, PathBuf};

const API: &str = indoc! {"
    #ifndef API_H
    #define API_H
    typedef struct Module *module_t;
    module_t load(const char *path);
    int add(int a, int b);
    #endif
"};

fn write_header(dir: &Path, name: &str, contents: &str) -> PathBuf {
    let path = dir.join(name);
    fs::write(&path, contents).unwrap();
    path
}

fn statuses(settings: &Settings, headers: &[PathBuf]) -> Vec<Result<HeaderStatus, GeneratorError>> {
    run(headers, settings)
        .unwrap()
        .into_iter()
        .map(|report| report.result.map(|outcome| outcome.status))
        .collect()
}

#[test]
fn test_writes_next_to_header() {
    let dir = tempfile::tempdir().unwrap();
    let header = write_header(dir.path(), "api.h", API);

    let settings = Settings::default();
    assert_eq!(statuses(&settings, &[header.clone()]), vec![Ok(HeaderStatus::Written)]);

    let generated = fs::read_to_string(dir.path().join("api_checked.h")).unwrap();
    assert!(generated.contains("load_checked(const char *path)"));
    assert!(generated.contains("#include \"api.h\""));

    // A second run finds nothing to do
    assert_eq!(statuses(&settings, &[header]), vec![Ok(HeaderStatus::Unchanged)]);
}

#[test]
fn test_failing_header_does_not_stop_others() {
    let dir = tempfile::tempdir().unwrap();
    let out = dir.path().join("out");
    fs::create_dir(&out).unwrap();
    let headers = vec![
        write_header(dir.path(), "good.h", API),
        write_header(dir.path(), "bad.h", "int broken(int (*callback)(void));\n"),
        write_header(dir.path(), "other.h", "void reset(void);\n"),
    ];

    let settings = Settings {
        output_dir: Some(out.clone()),
        parallel: true,
        ..Settings::default()
    };
    let reports = run(&headers, &settings).unwrap();

    assert_eq!(reports.len(), 3);
    assert_eq!(reports[0].header, headers[0]);
    assert!(reports[0].succeeded());
    assert!(matches!(reports[1].result, Err(GeneratorError::Classification { .. })));
    assert!(!reports[1].succeeded());
    assert!(reports[2].succeeded());

    assert!(out.join("good_checked.h").exists());
    assert!(!out.join("bad_checked.h").exists());
    assert!(out.join("other_checked.h").exists());
}

#[test]
fn test_check_mode_writes_nothing() {
    let dir = tempfile::tempdir().unwrap();
    let header = write_header(dir.path(), "api.h", API);
    let output = dir.path().join("api_checked.h");

    let check = Settings {
        mode: OutputMode::Check,
        ..Settings::default()
    };
    assert_eq!(statuses(&check, &[header.clone()]), vec![Ok(HeaderStatus::Stale)]);
    assert!(!output.exists());

    statuses(&Settings::default(), &[header.clone()]);
    assert_eq!(statuses(&check, &[header.clone()]), vec![Ok(HeaderStatus::Unchanged)]);

    fs::write(&header, API.replace("int add", "long add")).unwrap();
    assert_eq!(statuses(&check, &[header]), vec![Ok(HeaderStatus::Stale)]);
}

#[test]
fn test_stdout_mode_returns_contents() {
    let dir = tempfile::tempdir().unwrap();
    let header = write_header(dir.path(), "api.h", API);
    let settings = Settings {
        mode: OutputMode::Stdout,
        ..Settings::default()
    };

    let reports = run(&[header], &settings).unwrap();
    let outcome = reports[0].result.as_ref().unwrap();
    assert_eq!(outcome.status, HeaderStatus::Printed);
    assert!(outcome.generated.contents.starts_with("/*\n * THIS FILE IS GENERATED AUTOMATICALLY"));
    assert!(!dir.path().join("api_checked.h").exists());
}

#[test]
fn test_missing_header_is_reported() {
    let dir = tempfile::tempdir().unwrap();
    let results = statuses(&Settings::default(), &[dir.path().join("absent.h")]);
    assert!(matches!(results[0], Err(GeneratorError::IoError { .. })));
}
