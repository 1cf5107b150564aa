// Copyright 2025 Jonas Kruckenberg
//
// Licensed under the Apache License, Version 2.0, <LICENSE-APACHE or
// http://apache.org/licenses/LICENSE-2.0> or the MIT license <LICENSE-MIT or
// http://opensource.org/licenses/MIT>, at your option. This file may not be
// copied, modified, or distributed except according to those terms.

use std::env;
use std::process::Command;

/// Set in the environment of a child test process that is expected to abort.
const FATAL_CHILD: &str = "IPC_FATAL_CHILD";

pub(crate) fn is_fatal_child() -> bool {
    env::var_os(FATAL_CHILD).is_some()
}

/// Re-runs the test at `path` (as reported by `module_path!`) in a child process with
/// `FATAL_CHILD` set, asserts that it was killed by an abort and returns what it printed.
///
/// A child that panics or exits normally fails the assertion, and so does a path that matches
/// no test, since the child then runs nothing and succeeds.
pub(crate) fn assert_child_aborts(path: &str) -> String {
    let name = path
        .split_once("::")
        .map_or(path, |(_crate_name, rest)| rest);

    let exe = env::current_exe().unwrap();
    let output = Command::new(exe)
        .args(["--exact", name, "--nocapture", "--test-threads=1"])
        .env(FATAL_CHILD, "1")
        .output()
        .unwrap();
    let status = output.status;

    assert!(!status.success(), "{name} did not abort");
    #[cfg(unix)]
    {
        use std::os::unix::process::ExitStatusExt;
        assert_eq!(status.signal(), Some(libc::SIGABRT), "{name} did not abort");
    }

    let mut printed = String::from_utf8_lossy(&output.stdout).into_owned();
    printed.push_str(&String::from_utf8_lossy(&output.stderr));
    printed
}

/// Declares a test whose body must abort the process.
///
/// The test re-runs itself in a child process, which executes the body. The parent only checks
/// how the child died.
macro_rules! fatal_test {
    ($(#[$attr:meta])* fn $name:ident() $body:block) => {
        $(#[$attr])*
        #[test]
        fn $name() {
            if $crate::test_util::is_fatal_child() {
                $body
            } else {
                $crate::test_util::assert_child_aborts(concat!(
                    module_path!(),
                    "::",
                    stringify!($name)
                ));
            }
        }
    };
}
pub(crate) use fatal_test;
