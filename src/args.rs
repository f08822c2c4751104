//! Command line pieces shared by every check

use std::path::PathBuf;

use structopt::StructOpt;

use crate::output::OutputMode;

/// Flags understood by every check
///
/// Flattened into each check's own argument struct.
#[derive(StructOpt, Debug, Default)]
pub struct CommonArgs {
    #[structopt(
        short = "i",
        long = "instance",
        parse(from_os_str),
        help = "Home directory of the DB2 instance, the one containing sqllib/db2profile"
    )]
    pub instance: Option<PathBuf>,

    #[structopt(
        short = "v",
        long = "verbose",
        parse(from_occurrences),
        help = "Print diagnostics to stderr. Twice prints the executed commands, \
                three times their raw output"
    )]
    pub verbose: u8,

    #[structopt(short = "V", long = "version", help = "Prints version information")]
    pub version: bool,

    #[structopt(
        short = "K",
        long = "mk",
        help = "Print the result as a Check_MK local check line"
    )]
    pub mk: bool,

    #[structopt(
        short = "T",
        long = "trace",
        help = "Append timestamped diagnostics to the trace log file"
    )]
    pub trace: bool,
}

impl CommonArgs {
    pub fn output_mode(&self) -> OutputMode {
        if self.mk {
            OutputMode::Tabular
        } else {
            OutputMode::Standard
        }
    }
}

/// Parse a number from the first whitespace-delimited token of `s`
///
/// Anything after the first token is ignored, so `"80 percent"` is `80`.
pub fn lenient_number(s: &str) -> Result<f64, String> {
    let token = s
        .split_whitespace()
        .next()
        .ok_or_else(|| "expected a number, got an empty value".to_owned())?;
    token
        .parse::<f64>()
        .map_err(|e| format!("`{}` is not a number: {}", token, e))
}

/// Like [`lenient_number`], for whole numbers
pub fn lenient_integer(s: &str) -> Result<i64, String> {
    let token = s
        .split_whitespace()
        .next()
        .ok_or_else(|| "expected an integer, got an empty value".to_owned())?;
    token
        .parse::<i64>()
        .map_err(|e| format!("`{}` is not an integer: {}", token, e))
}

/// Like [`lenient_integer`], for ids, which are never negative
pub fn lenient_id(s: &str) -> Result<u32, String> {
    let token = s
        .split_whitespace()
        .next()
        .ok_or_else(|| "expected an id, got an empty value".to_owned())?;
    token
        .parse::<u32>()
        .map_err(|e| format!("`{}` is not an id: {}", token, e))
}

#[cfg(test)]
mod unit {
    use structopt::StructOpt;

    use super::{lenient_id, lenient_integer, lenient_number, CommonArgs};
    use crate::output::OutputMode;

    #[test]
    fn numbers_tolerate_trailing_garbage() {
        assert_eq!(lenient_number("80"), Ok(80.0));
        assert_eq!(lenient_number("  85.5 percent"), Ok(85.5));
        assert_eq!(lenient_integer("12\tfiles"), Ok(12));
        assert_eq!(lenient_id("2 x"), Ok(2));
    }

    #[test]
    fn numbers_reject_garbage_in_front() {
        assert!(lenient_number("high").is_err());
        assert!(lenient_number("").is_err());
        assert!(lenient_integer("1.5").is_err());
        assert!(lenient_id("-2").is_err());
        assert!(lenient_id(" ").is_err());
    }

    #[test]
    fn common_flags() {
        let args = CommonArgs::from_iter(
            ["check", "-i", "/home/db2inst1", "-vvv", "-K", "--trace"].iter(),
        );
        assert_eq!(args.instance.unwrap().to_str(), Some("/home/db2inst1"));
        assert_eq!(args.verbose, 3);
        assert!(args.trace);
        assert!(!args.version);

        let args = CommonArgs::from_iter(["check", "--mk"].iter());
        assert_eq!(args.output_mode(), OutputMode::Tabular);
        let args = CommonArgs::from_iter(["check"].iter());
        assert_eq!(args.output_mode(), OutputMode::Standard);
    }
}
