//! Regenerate `src/scripts.rs` from the `--help` of every check
//!
//! Run from the repository root after `cargo build`:
//!
//! ```plain
//! cargo run -p make-docs > src/scripts.rs
//! ```

use std::error::Error;
use std::process::Command;

struct Check {
    name: &'static str,
    about: &'static str,
}

const PREAMBLE: &str = "Documentation about the various scripts contained herein\n";

const REQUIREMENTS: &str = "All of them need to run as a user that can source the instance profile
(`<instance home>/sqllib/db2profile`), and all of them exit with `3`
(UNKNOWN) after printing the help or version.";

const CHECKS: [Check; 4] = [
    Check {
        name: "check-tablespace-size",
        about: "Connects to the database.",
    },
    Check {
        name: "check-log-consumption",
        about: "Connects to the database, except for HADR standby databases.",
    },
    Check {
        name: "check-instance-memory",
        about: "Runs `db2pd`, does not connect to any database.",
    },
    Check {
        name: "check-database-size",
        about: "Connects to the database.",
    },
];

fn main() -> Result<(), Box<dyn Error>> {
    let mut out = cp(PREAMBLE.lines());
    out.push_str("\n//!\n");
    out.push_str(&cp(CHECKS.iter().map(|c| format!("- [{0}](#{0})", c.name))));
    out.push_str("\n//!\n");
    out.push_str(&cp(REQUIREMENTS.lines()));
    out.push('\n');
    for check in &CHECKS {
        out.push_str(&format!(
            "//!\n//! # {0}\n//!\n//! {1}\n//!\n//! ```plain\n//! $ {0} --help\n",
            check.name, check.about
        ));
        // the checks print their help on stdout and exit UNKNOWN
        let output = Command::new(format!("target/debug/{}", check.name))
            .arg("--help")
            .output()
            .map_err(|e| format!("couldn't execute {}: {}", check.name, e))?;
        let help = String::from_utf8(output.stdout)
            .map_err(|e| format!("help of {} is not utf8: {}", check.name, e))?;
        out.push_str(&cp(help.trim_end().lines()));
        out.push_str("\n//! ```\n");
    }
    print!("{}", out);
    Ok(())
}

/// Comment each line in the iterator
fn cp<S: AsRef<str>, I: Iterator<Item = S>>(s: I) -> String {
    s.map(|s| format!("//! {}", s.as_ref()).trim_end().to_owned())
        .collect::<Vec<String>>()
        .join("\n")
}
