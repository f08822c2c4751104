//! Check the size of a database against fixed limits or its capacity

use structopt::clap::AppSettings;
use structopt::StructOpt;

use db2_plugins::args::{lenient_integer, lenient_number, CommonArgs};
use db2_plugins::config::{Candidate, CheckConfiguration, Descriptor, Scope, TargetRule};
use db2_plugins::db2::parse::procedure_parameter;
use db2_plugins::db2::{CollectionError, Db2Cli, MetricCollector};
use db2_plugins::output::{CheckResult, PerfField};
use db2_plugins::plugin::{self, Check};
use db2_plugins::thresholds::ThresholdKind;
use db2_plugins::Status;

/// Check the size of a database.
///
/// The thresholds are byte counts, or with --percentage percentages of the
/// database capacity. A threshold of 0 is disabled, and both are disabled
/// by default.
#[derive(StructOpt, Debug)]
#[structopt(
    name = "check-database-size (part of db2-plugins)",
    setting = AppSettings::ColoredHelp,
    setting = AppSettings::DisableVersion,
    setting = AppSettings::AllowNegativeNumbers
)]
struct Args {
    #[structopt(flatten)]
    common: CommonArgs,
    #[structopt(short = "d", long = "database", help = "Database to check")]
    database: Option<String>,
    #[structopt(
        short = "w",
        long = "warning",
        default_value = "0",
        parse(try_from_str = lenient_number),
        help = "Size to warn at, in bytes or percent; 0 disables"
    )]
    warning: f64,
    #[structopt(
        short = "c",
        long = "critical",
        default_value = "0",
        parse(try_from_str = lenient_number),
        help = "Size to go critical at, in bytes or percent; 0 disables"
    )]
    critical: f64,
    #[structopt(
        short = "p",
        long = "percentage",
        help = "Compare the size as a percentage of the database capacity"
    )]
    percentage: bool,
    #[structopt(
        short = "r",
        long = "refresh",
        default_value = "-1",
        parse(try_from_str = lenient_integer),
        help = "Refresh the cached size when it is older than this many minutes, -1 for the DB2 default"
    )]
    refresh: i64,
}

#[derive(Debug, Clone, Copy, PartialEq)]
struct SizeOptions {
    percentage: bool,
    refresh: i64,
}

/// Bytes, as reported by `GET_DBSIZE_INFO`
#[derive(Debug, Clone, Copy, PartialEq)]
struct DatabaseSize {
    size: f64,
    /// Negative when DB2 could not determine it
    capacity: f64,
}

struct DatabaseSizeCheck;

impl Check for DatabaseSizeCheck {
    type Args = Args;
    type Options = SizeOptions;
    type Measurement = DatabaseSize;

    const DESCRIPTOR: Descriptor = Descriptor {
        name: "check-database-size",
        scope: Scope::Database,
        target: TargetRule::None,
        disable_with_zero: true,
    };

    fn candidate(args: Args) -> Candidate<SizeOptions> {
        Candidate {
            common: args.common,
            database: args.database,
            target_name: None,
            target_id: None,
            warning: args.warning,
            critical: args.critical,
            kind: if args.percentage {
                ThresholdKind::Percentage
            } else {
                ThresholdKind::Absolute
            },
            options: SizeOptions {
                percentage: args.percentage,
                refresh: args.refresh,
            },
        }
    }

    fn evaluate(config: &CheckConfiguration<SizeOptions>, measured: DatabaseSize) -> CheckResult {
        let thresholds = config.thresholds();
        let DatabaseSize { size, capacity } = measured;
        let capacity = if capacity > 0.0 { Some(capacity) } else { None };

        let (value, shown, perf) = if config.options().percentage {
            let capacity = match capacity {
                Some(capacity) => capacity,
                None => {
                    return CheckResult::unknown(
                        "The database capacity is unknown, the size cannot be compared to it.",
                    )
                }
            };
            let percent = size / capacity * 100.0;
            let perf = PerfField::new("Database_size", percent)
                .unit("%")
                .thresholds(thresholds.warning, thresholds.critical)
                .range(Some(0.0), Some(100.0));
            (percent, format!("{:.0}%", percent), perf)
        } else {
            let perf = PerfField::new("Database_size", size)
                .unit("B")
                .thresholds(thresholds.warning, thresholds.critical)
                .range(Some(0.0), capacity);
            (size, megabytes(size), perf)
        };

        let status = thresholds.status_of(value);
        let summary = match status {
            Status::Ok => format!("Database size is normal ({}).", shown),
            Status::Warning => format!("Database size is getting bigger ({}).", shown),
            Status::Critical => format!("Database size is critical ({}).", shown),
            Status::Unknown => String::new(),
        };
        let capacity_text = capacity.map_or_else(|| "an unknown capacity".to_owned(), megabytes);
        let mut result = CheckResult::new(status, summary)
            .with_detail(format!(
                "Database {} uses {} bytes of {} ({}).",
                config.database().unwrap_or_default(),
                size,
                capacity_text,
                thresholds
            ))
            .with_perf(perf);
        if let Some(capacity) = capacity {
            result = result.with_long_perf(PerfField::new("Database_capacity", capacity).unit("B"));
        }
        result
    }
}

fn megabytes(bytes: f64) -> String {
    format!("{:.0} MB", bytes / 1024.0 / 1024.0)
}

/// Calls `GET_DBSIZE_INFO` in the connected database
struct DbSizeInfo(Db2Cli);

fn parameter(output: &str, name: &str) -> Result<f64, CollectionError> {
    procedure_parameter(output, name)
        .and_then(|value| value.parse().ok())
        .ok_or_else(|| {
            CollectionError::no_measurement(format!(
                "GET_DBSIZE_INFO did not return {}: {}",
                name,
                output.trim()
            ))
        })
}

impl MetricCollector<SizeOptions> for DbSizeInfo {
    type Measurement = DatabaseSize;

    fn collect(
        &mut self,
        config: &CheckConfiguration<SizeOptions>,
    ) -> Result<DatabaseSize, CollectionError> {
        let output = self.0.clp(
            &config.profile(),
            config.database(),
            &format!(
                "\"CALL GET_DBSIZE_INFO(?, ?, ?, {})\"",
                config.options().refresh
            ),
        )?;
        Ok(DatabaseSize {
            size: parameter(&output, "DATABASESIZE")?,
            capacity: parameter(&output, "DATABASECAPACITY")?,
        })
    }
}

#[cfg_attr(test, allow(dead_code))]
fn main() {
    plugin::main::<DatabaseSizeCheck, _>(DbSizeInfo(Db2Cli::new()))
}
