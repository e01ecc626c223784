//! Spawns `bin/testchildprocess` as a real separate process image, so the
//! three testcases other scenarios take on faith are exercised end to end
//! at least once here: exit-code propagation through `fork_exec`/`wait`,
//! and its two `std::process`-captured stdout testcases.

use kcore_toolkit::{platform::process, test_trace};
use std::os::unix::process::CommandExt;
use std::process::Command;

fn testchildprocess_path() -> &'static str {
    env!("CARGO_BIN_EXE_testchildprocess")
}

#[test]
fn exitcode_testcase_reports_its_argument_as_the_exit_status() {
    let path = testchildprocess_path();
    let handle = process::fork_exec(move || {
        // `exec` replaces this child's image outright; it only returns if
        // the exec itself failed to launch.
        let err = Command::new(path).args(["1", "42"]).exec();
        eprintln!("exec failed: {err}");
        127
    })
    .expect("fork succeeds");
    let state = process::wait(handle).expect("wait succeeds");
    test_trace!(module_path!(), "child exited with {state:?}");
    assert_eq!(state, process::ExitState::Exited(42));
}

#[test]
fn open_files_testcase_reports_a_plausible_fd_count() {
    let output = Command::new(testchildprocess_path())
        .arg("2")
        .output()
        .expect("spawns successfully");
    assert!(output.status.success());
    let n: usize = String::from_utf8(output.stderr)
        .unwrap()
        .trim()
        .parse()
        .expect("testcase 2 prints a decimal fd count");
    assert!(n >= 3, "expected at least stdin/stdout/stderr open, got {n}");
}

#[test]
fn process_name_testcase_reports_the_binary_name() {
    let output = Command::new(testchildprocess_path())
        .arg("3")
        .output()
        .expect("spawns successfully");
    assert!(output.status.success());
    let name = String::from_utf8(output.stderr).unwrap();
    assert_eq!(name, "testchildprocess");
}
