//! Check how full a tablespace is

use structopt::clap::AppSettings;
use structopt::StructOpt;

use db2_plugins::args::{lenient_id, lenient_number, CommonArgs};
use db2_plugins::config::{Candidate, CheckConfiguration, Descriptor, Scope, Target, TargetRule};
use db2_plugins::db2::parse::first_row;
use db2_plugins::db2::{shell_quote, sql_quote, CollectionError, Db2Cli, MetricCollector};
use db2_plugins::output::{CheckResult, PerfField};
use db2_plugins::plugin::{self, Check};
use db2_plugins::thresholds::ThresholdKind;
use db2_plugins::Status;

/// Check the usage of a tablespace, as a percentage of its size.
///
/// The tablespace is selected either by name or by id.
#[derive(StructOpt, Debug)]
#[structopt(
    name = "check-tablespace-size (part of db2-plugins)",
    setting = AppSettings::ColoredHelp,
    setting = AppSettings::DisableVersion
)]
struct Args {
    #[structopt(flatten)]
    common: CommonArgs,
    #[structopt(short = "d", long = "database", help = "Database holding the tablespace")]
    database: Option<String>,
    #[structopt(
        short = "n",
        long = "name",
        conflicts_with = "id",
        help = "Name of the tablespace"
    )]
    name: Option<String>,
    #[structopt(long = "id", parse(try_from_str = lenient_id), help = "Id of the tablespace")]
    id: Option<u32>,
    #[structopt(
        short = "w",
        long = "warning",
        default_value = "80",
        parse(try_from_str = lenient_number),
        help = "Percent used to warn at"
    )]
    warning: f64,
    #[structopt(
        short = "c",
        long = "critical",
        default_value = "90",
        parse(try_from_str = lenient_number),
        help = "Percent used to go critical at"
    )]
    critical: f64,
}

struct TablespaceSize;

impl Check for TablespaceSize {
    type Args = Args;
    type Options = ();
    /// Percent used, when the tablespace reports it
    type Measurement = Option<f64>;

    const DESCRIPTOR: Descriptor = Descriptor {
        name: "check-tablespace-size",
        scope: Scope::Database,
        target: TargetRule::NameOrId,
        disable_with_zero: false,
    };

    fn candidate(args: Args) -> Candidate<()> {
        Candidate {
            common: args.common,
            database: args.database,
            target_name: args.name,
            target_id: args.id,
            warning: args.warning,
            critical: args.critical,
            kind: ThresholdKind::Percentage,
            options: (),
        }
    }

    fn evaluate(config: &CheckConfiguration<()>, used: Option<f64>) -> CheckResult {
        let thresholds = config.thresholds();
        let tablespace = config
            .target()
            .map(ToString::to_string)
            .unwrap_or_default();
        let used = match used {
            Some(used) => used,
            None => {
                return CheckResult::unknown(format!(
                    "Tablespace {} does not report its utilization.",
                    tablespace
                ))
            }
        };

        let status = thresholds.evaluate(Some(used));
        let percent = format!("{:.0}%", used);
        let summary = match status {
            Status::Ok => format!("Tablespace size is normal ({}).", percent),
            Status::Warning => format!("Tablespace size is getting bigger ({}).", percent),
            Status::Critical => format!("Tablespace size is critical ({}).", percent),
            Status::Unknown => String::new(),
        };
        CheckResult::new(status, summary)
            .with_detail(format!(
                "Tablespace {} of database {} is {:.2}% used ({}).",
                tablespace,
                config.database().unwrap_or_default(),
                used,
                thresholds
            ))
            .with_perf(
                PerfField::new(format!("Tablespace_{}", tablespace), used)
                    .unit("%")
                    .thresholds(thresholds.warning, thresholds.critical)
                    .range(Some(0.0), Some(100.0)),
            )
    }
}

/// Reads the utilization from `SYSIBMADM.TBSP_UTILIZATION`
struct TablespaceQuery(Db2Cli);

impl MetricCollector<()> for TablespaceQuery {
    type Measurement = Option<f64>;

    fn collect(&mut self, config: &CheckConfiguration<()>) -> Result<Option<f64>, CollectionError> {
        let filter = match config.target() {
            Some(Target::Name(name)) => format!("TBSP_NAME = {}", sql_quote(name)),
            Some(Target::Id(id)) => format!("TBSP_ID = {}", id),
            None => return Err(CollectionError::no_measurement("No tablespace was selected.")),
        };
        let query = format!(
            "SELECT TBSP_UTILIZATION_PERCENT FROM SYSIBMADM.TBSP_UTILIZATION WHERE {}",
            filter
        );
        let output = self.0.clp(
            &config.profile(),
            config.database(),
            &format!("-x {}", shell_quote(&query)),
        )?;

        if output.trim().is_empty() || output.contains("SQL0100W") {
            return Err(CollectionError::no_measurement(format!(
                "Tablespace {} was not found.",
                config.target().map(ToString::to_string).unwrap_or_default()
            )));
        }
        match first_row(&output).first() {
            Some(used) => Ok(Some(*used)),
            // a dash is printed for tablespaces without a known size
            None if output.trim() == "-" => Ok(None),
            None => Err(CollectionError::no_measurement(format!(
                "Unexpected output from DB2: {}",
                output.trim()
            ))),
        }
    }
}

#[cfg_attr(test, allow(dead_code))]
fn main() {
    plugin::main::<TablespaceSize, _>(TablespaceQuery(Db2Cli::new()))
}
