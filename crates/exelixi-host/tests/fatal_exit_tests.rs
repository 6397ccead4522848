//! The fatal path terminates the process, so it is exercised in a child: this
//! test binary re-invokes itself with `EXELIXI_FATAL_CHILD` set and runs only
//! the aborting test.

use assert_cmd::Command;
use exelixi_host::check_or_abort;
use predicates::prelude::*;

const CHILD_ENV: &str = "EXELIXI_FATAL_CHILD";

// ── Child side ───────────────────────────────────────────────────────────────

#[test]
fn abort_on_invalid_binary() {
    if std::env::var_os(CHILD_ENV).is_none() {
        return;
    }
    check_or_abort(-42, "ERROR: Failed to load binary.", || {
        println!("cleanup: released context");
    });
    println!("unreachable: still running after abort");
}

#[test]
fn abort_not_taken_on_success() {
    if std::env::var_os(CHILD_ENV).is_none() {
        return;
    }
    check_or_abort(0, "ERROR: unused.", || println!("cleanup: released context"));
    println!("continued after success");
}

// ── Parent side ──────────────────────────────────────────────────────────────

fn child(test: &str) -> Command {
    let exe = std::env::current_exe().unwrap();
    let mut cmd = Command::new(exe);
    cmd.env(CHILD_ENV, "1")
        .args([test, "--exact", "--nocapture", "--test-threads=1"]);
    cmd
}

#[test]
fn check_or_abort_reports_cleans_up_and_exits_with_status() {
    let assert = child("abort_on_invalid_binary")
        .assert()
        .failure()
        .stdout(predicate::str::contains(
            "ERROR: Failed to load binary. CL_INVALID_BINARY",
        ))
        .stdout(predicate::str::contains("cleanup: released context"))
        .stdout(predicate::str::contains("unreachable").not());
    // -42 truncated to the 8-bit exit status.
    #[cfg(unix)]
    assert.code(214);
    #[cfg(not(unix))]
    assert.code(-42);
}

#[test]
fn check_or_abort_returns_on_success_in_child() {
    child("abort_not_taken_on_success")
        .assert()
        .success()
        .stdout(predicate::str::contains("continued after success"))
        .stdout(predicate::str::contains("cleanup").not());
}
