//! Check how much of the transaction log is in use

use structopt::clap::AppSettings;
use structopt::StructOpt;

use db2_plugins::args::{lenient_number, CommonArgs};
use db2_plugins::config::{Candidate, CheckConfiguration, Descriptor, Scope, TargetRule};
use db2_plugins::db2::parse::{cfg_value, first_row};
use db2_plugins::db2::{shell_quote, CollectionError, Db2Cli, MetricCollector};
use db2_plugins::output::{CheckResult, PerfField};
use db2_plugins::plugin::{self, Check};
use db2_plugins::thresholds::ThresholdKind;
use db2_plugins::Status;

/// Check the transaction log utilization of a database.
///
/// By default the used space is compared, as a percentage, against the
/// thresholds. With --files the number of active log files is compared
/// against the configured primary and secondary log files instead, and the
/// thresholds are ignored.
///
/// HADR standby databases are always OK.
#[derive(StructOpt, Debug)]
#[structopt(
    name = "check-log-consumption (part of db2-plugins)",
    setting = AppSettings::ColoredHelp,
    setting = AppSettings::DisableVersion
)]
struct Args {
    #[structopt(flatten)]
    common: CommonArgs,
    #[structopt(short = "d", long = "database", help = "Database to check")]
    database: Option<String>,
    #[structopt(
        short = "w",
        long = "warning",
        default_value = "80",
        parse(try_from_str = lenient_number),
        help = "Percent of the log used to warn at"
    )]
    warning: f64,
    #[structopt(
        short = "c",
        long = "critical",
        default_value = "90",
        parse(try_from_str = lenient_number),
        help = "Percent of the log used to go critical at"
    )]
    critical: f64,
    #[structopt(
        short = "f",
        long = "files",
        help = "Count active log files against LOGPRIMARY and LOGSECOND"
    )]
    files: bool,
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum Mode {
    Percentage,
    Files,
}

#[derive(Debug, Clone, PartialEq)]
enum LogUsage {
    /// The database is a HADR standby and its log is not looked at
    Standby,
    /// Bytes, as reported by `MON_GET_TRANSACTION_LOG`
    Space { used: f64, available: f64 },
    Files {
        primary: u32,
        secondary: u32,
        used: i64,
    },
}

struct LogConsumption;

impl Check for LogConsumption {
    type Args = Args;
    type Options = Mode;
    type Measurement = LogUsage;

    const DESCRIPTOR: Descriptor = Descriptor {
        name: "check-log-consumption",
        scope: Scope::Database,
        target: TargetRule::None,
        disable_with_zero: false,
    };

    fn candidate(args: Args) -> Candidate<Mode> {
        Candidate {
            common: args.common,
            database: args.database,
            target_name: None,
            target_id: None,
            warning: args.warning,
            critical: args.critical,
            kind: ThresholdKind::Percentage,
            options: if args.files {
                Mode::Files
            } else {
                Mode::Percentage
            },
        }
    }

    fn evaluate(config: &CheckConfiguration<Mode>, usage: LogUsage) -> CheckResult {
        match usage {
            LogUsage::Standby => CheckResult::new(
                Status::Ok,
                "The database is a HADR standby, the transaction log is not checked.",
            ),
            LogUsage::Space { used, available } => space(config, used, available),
            LogUsage::Files {
                primary,
                secondary,
                used,
            } => files(primary, secondary, used),
        }
    }
}

fn summary(status: Status, detail: &str) -> String {
    match status {
        Status::Ok => "The transaction log utilization is OK.".to_owned(),
        Status::Warning => format!("The transaction log utilization is high ({}).", detail),
        Status::Critical => format!("The transaction log utilization is critical ({}).", detail),
        Status::Unknown => "The transaction log utilization is unknown.".to_owned(),
    }
}

fn space(config: &CheckConfiguration<Mode>, used: f64, available: f64) -> CheckResult {
    if available < 0.0 {
        return CheckResult::unknown(
            "The database uses infinite logging, the log utilization cannot be computed.",
        );
    }
    if used + available <= 0.0 {
        return CheckResult::unknown("The database reports an empty transaction log.");
    }

    let thresholds = config.thresholds();
    let percent = used / (used + available) * 100.0;
    let status = thresholds.status_of(percent);
    let detail = format!("{:.0}%", percent);
    CheckResult::new(status, summary(status, &detail))
        .with_detail(format!(
            "{:.2}% of the transaction log of {} is used, {} of {} bytes ({}).",
            percent,
            config.database().unwrap_or_default(),
            used,
            used + available,
            thresholds
        ))
        .with_perf(
            PerfField::new("Log_usage", percent)
                .unit("%")
                .thresholds(thresholds.warning, thresholds.critical)
                .range(Some(0.0), Some(100.0)),
        )
}

fn files(primary: u32, secondary: u32, used: i64) -> CheckResult {
    let primary = i64::from(primary);
    let total = primary + i64::from(secondary);
    let status = if used <= primary {
        Status::Ok
    } else if used < total {
        Status::Warning
    } else {
        Status::Critical
    };
    let detail = format!("{} of {} log files", used, total);
    CheckResult::new(status, summary(status, &detail))
        .with_detail(format!(
            "{} active log files, {} primary and {} secondary are configured.",
            used, primary, secondary
        ))
        .with_perf(
            PerfField::new("Log_files", used as f64)
                .thresholds(Some(primary as f64), Some(total as f64))
                .range(Some(0.0), Some(total as f64)),
        )
}

/// Reads the log configuration and the current log usage
struct TransactionLog(Db2Cli);

impl TransactionLog {
    fn monitor(
        &self,
        config: &CheckConfiguration<Mode>,
        columns: &str,
    ) -> Result<Vec<f64>, CollectionError> {
        let output = self.0.clp(
            &config.profile(),
            config.database(),
            &format!(
                "-x \"SELECT {} FROM TABLE(MON_GET_TRANSACTION_LOG(-1)) AS T\"",
                columns
            ),
        )?;
        let row = first_row(&output);
        if row.len() < 2 {
            return Err(CollectionError::no_measurement(format!(
                "Unexpected output from DB2: {}",
                output.trim()
            )));
        }
        Ok(row)
    }
}

fn log_files(cfg: &str, key: &str) -> Result<u32, CollectionError> {
    cfg_value(cfg, key)
        .and_then(|value| value.parse().ok())
        .ok_or_else(|| {
            CollectionError::no_measurement(format!(
                "{} was not found in the database configuration.",
                key
            ))
        })
}

impl MetricCollector<Mode> for TransactionLog {
    type Measurement = LogUsage;

    fn collect(&mut self, config: &CheckConfiguration<Mode>) -> Result<LogUsage, CollectionError> {
        let database = config.database().unwrap_or_default();
        // no connection: a standby refuses them
        let cfg = self.0.clp(
            &config.profile(),
            None,
            &format!("get db cfg for {}", shell_quote(database)),
        )?;
        if cfg_value(&cfg, "HADR database role") == Some("STANDBY") {
            return Ok(LogUsage::Standby);
        }

        match *config.options() {
            Mode::Percentage => {
                let row = self.monitor(config, "TOTAL_LOG_USED, TOTAL_LOG_AVAILABLE")?;
                Ok(LogUsage::Space {
                    used: row[0],
                    available: row[1],
                })
            }
            Mode::Files => {
                let primary = log_files(&cfg, "(LOGPRIMARY)")?;
                let secondary = log_files(&cfg, "(LOGSECOND)")?;
                let row = self.monitor(config, "FIRST_ACTIVE_LOG, CURRENT_ACTIVE_LOG")?;
                Ok(LogUsage::Files {
                    primary,
                    secondary,
                    used: active_log_files(row[0], row[1])?,
                })
            }
        }
    }
}

/// The number of log files from the first active one to the current one
fn active_log_files(first: f64, current: f64) -> Result<i64, CollectionError> {
    let used = (current as i64).saturating_sub(first as i64).saturating_add(1);
    if used < 1 {
        return Err(CollectionError::no_measurement(format!(
            "DB2 reported the current log file ({}) before the first active one ({}).",
            current, first
        )));
    }
    Ok(used)
}

#[cfg_attr(test, allow(dead_code))]
fn main() {
    plugin::main::<LogConsumption, _>(TransactionLog(Db2Cli::new()))
}

#[cfg(test)]
mod test {
    use std::fs;

    use tempfile::TempDir;

    use db2_plugins::config::CheckConfiguration;
    use db2_plugins::db2::{CollectionError, Db2Cli, MetricCollector};
    use db2_plugins::lock::ProcessTable;
    use db2_plugins::plugin::{Outcome, Runner};
    use db2_plugins::Status;

    use super::{active_log_files, summary, LogConsumption, LogUsage, Mode, TransactionLog};

    struct Fixed(LogUsage);

    impl MetricCollector<Mode> for Fixed {
        type Measurement = LogUsage;

        fn collect(&mut self, _: &CheckConfiguration<Mode>) -> Result<LogUsage, CollectionError> {
            Ok(self.0.clone())
        }
    }

    fn instance(profile: &str) -> TempDir {
        let home = tempfile::tempdir().unwrap();
        fs::create_dir_all(home.path().join("sqllib")).unwrap();
        fs::write(home.path().join("sqllib/db2profile"), profile).unwrap();
        home
    }

    fn run<M>(home: &TempDir, extra: &[&str], collector: &mut M) -> Outcome
    where
        M: MetricCollector<Mode, Measurement = LogUsage>,
    {
        let locks = tempfile::tempdir().unwrap();
        let mut argv = vec![
            "check-log-consumption",
            "-i",
            home.path().to_str().unwrap(),
            "-d",
            "SAMPLE",
        ];
        argv.extend_from_slice(extra);
        Runner::new(locks.path().to_owned(), locks.path().join("trace.log"), &ProcessTable)
            .run::<LogConsumption, _, _, _>(argv, collector)
    }

    fn files(primary: u32, secondary: u32, used: i64) -> Outcome {
        let home = instance("");
        run(
            &home,
            &["-f"],
            &mut Fixed(LogUsage::Files {
                primary,
                secondary,
                used,
            }),
        )
    }

    #[test]
    fn files_within_primary_are_ok() {
        let outcome = files(3, 1, 3);
        assert_eq!(outcome.status, Status::Ok);
        assert!(outcome.text.starts_with("The transaction log utilization is OK.|"));
    }

    #[test]
    fn files_in_secondary_are_high() {
        let outcome = files(3, 2, 4);
        assert_eq!(outcome.status, Status::Warning);
        assert!(outcome
            .text
            .starts_with("The transaction log utilization is high (4 of 5 log files)."));
    }

    #[test]
    fn all_files_in_use_are_critical() {
        assert_eq!(files(3, 1, 4).status, Status::Critical);
        assert_eq!(files(3, 0, 4).status, Status::Critical);
    }

    #[test]
    fn used_space() {
        let home = instance("");
        let outcome = run(
            &home,
            &[],
            &mut Fixed(LogUsage::Space {
                used: 850.0,
                available: 150.0,
            }),
        );
        assert_eq!(outcome.status, Status::Warning);
        assert!(outcome.text.starts_with(
            "The transaction log utilization is high (85%).|'Log_usage'=85%;80;90;0;100\n"
        ));

        let outcome = run(
            &home,
            &["-w", "50", "-c", "60"],
            &mut Fixed(LogUsage::Space {
                used: 100.0,
                available: 900.0,
            }),
        );
        assert_eq!(outcome.status, Status::Ok);
    }

    #[test]
    fn infinite_logging_is_unknown() {
        let home = instance("");
        let outcome = run(
            &home,
            &[],
            &mut Fixed(LogUsage::Space {
                used: 100.0,
                available: -1.0,
            }),
        );
        assert_eq!(outcome.status, Status::Unknown);
        assert!(outcome.text.contains("infinite logging"));
    }

    #[test]
    fn standby_is_ok() {
        let home = instance("");
        let outcome = run(&home, &[], &mut Fixed(LogUsage::Standby));
        assert_eq!(outcome.status, Status::Ok);
        assert_eq!(
            outcome.text,
            "The database is a HADR standby, the transaction log is not checked.\n"
        );
    }

    const CFG: &str = "
 Number of primary log files                (LOGPRIMARY) = 3
 Number of secondary log files               (LOGSECOND) = 2
 HADR database role                                      = PRIMARY
";

    /// A profile whose db2 prints the configuration or a monitor row
    fn scripted(role: &str, row: &str) -> String {
        format!(
            "db2() {{\n  case \"$1\" in\n    get) printf '%s\\n' \"{}\" ;;\n    -x) echo '{}' ;;\n  esac\n}}\n",
            CFG.replace("PRIMARY\n", &format!("{}\n", role)).replace('"', "\\\""),
            row
        )
    }

    #[test]
    fn collects_through_the_command_line_processor() {
        let home = instance(&scripted("PRIMARY", "     12      15"));
        let outcome = run(&home, &["-f"], &mut TransactionLog(Db2Cli::new()));
        assert_eq!(outcome.status, Status::Warning);
        assert!(outcome.text.contains("(4 of 5 log files)"));

        let outcome = run(&home, &[], &mut TransactionLog(Db2Cli::new()));
        assert_eq!(outcome.status, Status::Ok);
        assert!(outcome.text.contains("'Log_usage'=44.44%"));
    }

    #[test]
    fn standby_is_not_queried() {
        let home = instance(&scripted("STANDBY", "garbage"));
        let outcome = run(&home, &["-f"], &mut TransactionLog(Db2Cli::new()));
        assert_eq!(outcome.status, Status::Ok);
        assert!(outcome.text.starts_with("The database is a HADR standby"));
    }

    #[test]
    fn log_files_out_of_order_are_unknown() {
        let home = instance(&scripted("PRIMARY", "     15      12"));
        let outcome = run(&home, &["-f"], &mut TransactionLog(Db2Cli::new()));
        assert_eq!(outcome.status, Status::Unknown);
        assert_eq!(
            outcome.text,
            "DB2 reported the current log file (12) before the first active one (15).\n"
        );
    }

    #[test]
    fn active_log_files_saturate() {
        assert_eq!(active_log_files(12.0, 12.0).unwrap(), 1);
        assert_eq!(active_log_files(0.0, 1e300).unwrap(), i64::MAX);
        assert!(active_log_files(1e300, -1e300).is_err());
    }

    #[test]
    fn summary_names_every_status() {
        assert_eq!(summary(Status::Ok, "x"), "The transaction log utilization is OK.");
        assert_eq!(
            summary(Status::Critical, "5 of 5 log files"),
            "The transaction log utilization is critical (5 of 5 log files)."
        );
        assert_eq!(summary(Status::Unknown, "x"), "The transaction log utilization is unknown.");
    }
}
