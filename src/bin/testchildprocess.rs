//! A tiny helper process that integration tests spawn via
//! `platform::process::fork_exec` to exercise real process lifecycle
//! behavior end to end, grounded on
//! `C-kern/main/testchildprocess_main.c`.
//!
//! Usage: `testchildprocess <testcase> [arg]`
//!   1 <exitcode>  — exit immediately with `exitcode`
//!   2             — print this process's open file descriptor count
//!   3             — print this process's name (`/proc/self/comm`)

use std::env;
use std::fs;
use std::io::Write;
use std::process::exit;

const TESTCASE_RETURN_EXITCODE: &str = "1";
const TESTCASE_OPEN_FILES: &str = "2";
const TESTCASE_WRITE_PROCESS_NAME: &str = "3";

fn count_open_fds() -> std::io::Result<usize> {
    Ok(fs::read_dir("/proc/self/fd")?.count())
}

fn process_name() -> std::io::Result<String> {
    Ok(fs::read_to_string("/proc/self/comm")?.trim_end().to_string())
}

fn main() {
    let args: Vec<String> = env::args().collect();
    if args.len() < 2 {
        eprintln!("usage: testchildprocess <testcase> [arg]");
        std::process::abort();
    }

    match args[1].as_str() {
        TESTCASE_RETURN_EXITCODE => {
            if args.len() != 3 {
                std::process::abort();
            }
            let code: i32 = args[2].parse().unwrap_or_else(|_| std::process::abort());
            exit(code);
        }
        TESTCASE_OPEN_FILES => {
            if args.len() != 2 {
                std::process::abort();
            }
            match count_open_fds() {
                Ok(n) => {
                    let _ = write!(std::io::stderr(), "{n}");
                    exit(0);
                }
                Err(_) => exit(1),
            }
        }
        TESTCASE_WRITE_PROCESS_NAME => {
            if args.len() != 2 {
                std::process::abort();
            }
            match process_name() {
                Ok(name) => {
                    let _ = write!(std::io::stderr(), "{name}");
                    exit(0);
                }
                Err(_) => exit(1),
            }
        }
        _ => std::process::abort(),
    }
}
