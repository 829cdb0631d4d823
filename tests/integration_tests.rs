//! Integration Tests

use assert_cli::{Assert, Environment};
use lazy_static::lazy_static;
use std::collections::HashMap;
use std::fs::{self, DirEntry};
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};
use tempdir::TempDir;

struct ScriptData<'a> {
    pub stdout: &'a str,
    /// Must not appear anywhere in stdout
    pub absent: Option<&'a str>,
}

lazy_static! {
    static ref SMSH_SCRIPTS_MAP: HashMap<&'static str, ScriptData<'static>> = {
        let mut map = HashMap::new();
        map.insert("simple_echo.smsh", ScriptData { stdout: "test\n", absent: None });
        map.insert("simple_pipeline.smsh", ScriptData { stdout: "a\nb\nc\n", absent: None });
        map.insert("simple_three_stages.smsh", ScriptData {
            stdout: "NEEDLE HAYSTACK\n",
            absent: None
        });
        map.insert("simple_cd.smsh", ScriptData { stdout: "/\n", absent: None });
        map.insert("simple_exit.smsh", ScriptData {
            stdout: "before\n",
            absent: Some("after")
        });
        map
    };
}

fn smsh() -> Assert {
    Assert::command(&[env!("CARGO_BIN_EXE_smsh")])
}

#[test]
fn test_all_simple_smsh_scripts() {
    let simple_scripts = get_path_to_test_scripts()
        .read_dir()
        .expect("read_dir failed")
        .map(|entry| entry.expect("filename should be valid Unicode"))
        .filter(|entry| is_simple_smsh_script(entry));

    let mut count = 0;
    for entry in simple_scripts {
        let temp_dir = TempDir::new("smsh").expect("unable to generate temp dir");
        let file_path = entry.path();
        let unicode_file_path = file_path
            .to_str()
            .expect("file path should be valid Unicode");

        let filename = entry.file_name();
        let expected_data = SMSH_SCRIPTS_MAP
            .get(filename.to_str().expect("filename should be valid Unicode"))
            .expect("simple script should have matching data in SMSH_SCRIPTS_MAP");

        let mut assert = smsh()
            .current_dir(temp_dir.path())
            .with_args(&[unicode_file_path])
            .stdout()
            .contains(expected_data.stdout);
        if let Some(absent) = expected_data.absent {
            assert = assert.stdout().doesnt_contain(absent);
        }
        assert.succeeds().unwrap();
        count += 1;
    }

    assert_eq!(SMSH_SCRIPTS_MAP.len(), count);
}

fn get_path_to_test_scripts() -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR"))
        .join("tests")
        .join("fixtures")
        .join("scripts")
}

/// Does filename start with 'simple' and end with '.smsh'?
fn is_simple_smsh_script(entry: &DirEntry) -> bool {
    let filename = entry.file_name();
    let unicode_filename = filename.to_str().expect("filename should be valid Unicode");
    unicode_filename.starts_with("simple") && unicode_filename.ends_with(".smsh")
}

fn write_script(dir: &Path, lines: &[&str]) -> PathBuf {
    let path = dir.join("script.smsh");
    fs::write(&path, lines.join("\n") + "\n").expect("unable to write script");
    path
}

#[test]
fn test_echo_round_trip() {
    smsh()
        .with_args(&["-c", "echo hello"])
        .stdout()
        .contains("hello\n")
        .stderr()
        .is("")
        .succeeds()
        .unwrap();
}

#[test]
fn test_version() {
    smsh()
        .with_args(&["--version"])
        .stdout()
        .contains(concat!("smsh version ", env!("CARGO_PKG_VERSION")))
        .succeeds()
        .unwrap();
}

#[test]
fn test_pipeline_sorts_output() {
    smsh()
        .with_args(&["-c", "printf b\\na\\nc\\n | sort"])
        .stdout()
        .contains("a\nb\nc\n")
        .succeeds()
        .unwrap();
}

#[test]
fn test_cd_expands_home_marker() {
    let home = TempDir::new("smsh-home").expect("unable to generate temp dir");
    fs::create_dir(home.path().join("sub")).expect("unable to create dir");
    let script = write_script(home.path(), &["cd ~/sub", "pwd -P", "cd", "pwd -P"]);
    let expected = format!(
        "{sub}\n{home}\n",
        sub = home.path().join("sub").canonicalize().unwrap().display(),
        home = home.path().canonicalize().unwrap().display()
    );

    smsh()
        .with_env(Environment::inherit().insert("HOME", home.path().to_str().unwrap()))
        .with_args(&[script.to_str().unwrap()])
        .stdout()
        .contains(expected.as_str())
        .succeeds()
        .unwrap();
}

#[test]
fn test_cd_with_two_arguments_is_rejected() {
    let dir = TempDir::new("smsh").expect("unable to generate temp dir");
    let script = write_script(dir.path(), &["cd / /tmp", "pwd -P"]);

    smsh()
        .current_dir(dir.path())
        .with_args(&[script.to_str().unwrap()])
        .stdout()
        .contains(format!("{}\n", dir.path().canonicalize().unwrap().display()).as_str())
        .stderr()
        .contains("smsh: cd: usage: cd [dir]")
        .succeeds()
        .unwrap();
}

#[test]
fn test_cd_enters_directory_named_like_an_option() {
    let dir = TempDir::new("smsh").expect("unable to generate temp dir");
    let target = dir.path().join("-foo");
    fs::create_dir(&target).unwrap();
    let script = write_script(dir.path(), &["cd -foo", "pwd -P"]);

    smsh()
        .current_dir(dir.path())
        .with_args(&[script.to_str().unwrap()])
        .stdout()
        .contains(format!("{}\n", target.canonicalize().unwrap().display()).as_str())
        .stderr()
        .is("")
        .succeeds()
        .unwrap();
}

#[test]
fn test_cd_to_missing_directory_is_not_fatal() {
    smsh()
        .with_args(&["-c", "cd /smsh/does/not/exist"])
        .stderr()
        .contains("smsh: cd: /smsh/does/not/exist")
        .succeeds()
        .unwrap();
}

#[test]
fn test_check_env_filters_and_sorts() {
    smsh()
        .with_env(
            Environment::inherit()
                .insert("PAGER", "cat")
                .insert("SMSH_TEST_B", "2")
                .insert("SMSH_TEST_A", "1"),
        )
        .with_args(&["-c", "checkEnv SMSH_TEST_"])
        .stdout()
        .contains("SMSH_TEST_A=1\nSMSH_TEST_B=2\n")
        .succeeds()
        .unwrap();
}

#[test]
fn test_background_job_returns_immediately() {
    let dir = TempDir::new("smsh").expect("unable to generate temp dir");
    let script = write_script(dir.path(), &["sleep 5 &", "echo launched", "exit"]);

    let started = Instant::now();
    smsh()
        .with_args(&[script.to_str().unwrap()])
        .stdout()
        .contains("launched\n")
        .succeeds()
        .unwrap();
    assert!(started.elapsed() < Duration::from_secs(4));
}

#[test]
fn test_interactive_messages_on_piped_input() {
    let home = TempDir::new("smsh-home").expect("unable to generate temp dir");

    smsh()
        .with_env(Environment::inherit().insert("HOME", home.path().to_str().unwrap()))
        .stdin("sleep 0.2 &\nsleep 0.5\necho hi\n")
        .stdout()
        .contains(" ms\n")
        .stdout()
        .contains(" done\n")
        .stdout()
        .contains("hi\n")
        .stdout()
        .contains("exit\n")
        .succeeds()
        .unwrap();
}

#[test]
fn test_background_marker_before_pipe() {
    smsh()
        .with_args(&["-c", "echo a &|"])
        .stdout()
        .is("")
        .stderr()
        .contains("inaccurate use of background character '&' (|)")
        .succeeds()
        .unwrap();
}

#[test]
fn test_misplaced_background_marker() {
    smsh()
        .with_args(&["-c", "echo a & echo b"])
        .stdout()
        .is("")
        .stderr()
        .contains("inaccurate use of background character '&'")
        .succeeds()
        .unwrap();
}

#[test]
fn test_empty_pipeline_stage() {
    smsh()
        .with_args(&["-c", "echo a | | sort"])
        .stdout()
        .is("")
        .stderr()
        .contains("missing command in pipeline")
        .succeeds()
        .unwrap();
}

#[test]
fn test_missing_program_is_reported() {
    smsh()
        .with_args(&["-c", "smsh-no-such-program --flag"])
        .stderr()
        .contains("smsh: smsh-no-such-program: ")
        .succeeds()
        .unwrap();
}

#[test]
fn test_exit_terminates_background_jobs() {
    let dir = TempDir::new("smsh").expect("unable to generate temp dir");
    let script = write_script(dir.path(), &["sleep 30 &", "exit", "echo unreachable"]);

    let started = Instant::now();
    smsh()
        .with_args(&[script.to_str().unwrap()])
        .stdout()
        .doesnt_contain("unreachable")
        .succeeds()
        .unwrap();
    assert!(started.elapsed() < Duration::from_secs(20));
}

#[test]
fn test_missing_script_fails() {
    smsh()
        .with_args(&["/smsh/does/not/exist.smsh"])
        .stderr()
        .contains("smsh: ")
        .fails_with(1)
        .unwrap();
}
