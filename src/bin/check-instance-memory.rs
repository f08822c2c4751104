//! Check the memory used by the members of an instance

use structopt::clap::AppSettings;
use structopt::StructOpt;

use db2_plugins::args::{lenient_number, CommonArgs};
use db2_plugins::config::{Candidate, CheckConfiguration, Descriptor, Scope, TargetRule};
use db2_plugins::db2::parse::{member_memory, MemberMemory};
use db2_plugins::db2::{CollectionError, Db2Cli, MetricCollector};
use db2_plugins::output::{CheckResult, PerfField};
use db2_plugins::plugin::{self, Check};
use db2_plugins::thresholds::{combine, SubResult, ThresholdKind, Thresholds};
use db2_plugins::Status;

/// Check the memory used by every member of an instance.
///
/// Without --limit the usage is only reported. With it the usage of each
/// member is compared, as a percentage of the member's memory limit, against
/// the thresholds, and the worst member decides the status.
#[derive(StructOpt, Debug)]
#[structopt(
    name = "check-instance-memory (part of db2-plugins)",
    setting = AppSettings::ColoredHelp,
    setting = AppSettings::DisableVersion
)]
struct Args {
    #[structopt(flatten)]
    common: CommonArgs,
    #[structopt(
        short = "w",
        long = "warning",
        default_value = "80",
        parse(try_from_str = lenient_number),
        help = "Percent of the memory limit to warn at"
    )]
    warning: f64,
    #[structopt(
        short = "c",
        long = "critical",
        default_value = "90",
        parse(try_from_str = lenient_number),
        help = "Percent of the memory limit to go critical at"
    )]
    critical: f64,
    #[structopt(
        short = "l",
        long = "limit",
        help = "Compare the usage against the memory limit of each member"
    )]
    limit: bool,
}

struct InstanceMemory;

impl Check for InstanceMemory {
    type Args = Args;
    /// Whether usage is compared against the memory limit
    type Options = bool;
    type Measurement = Vec<MemberMemory>;

    const DESCRIPTOR: Descriptor = Descriptor {
        name: "check-instance-memory",
        scope: Scope::Instance,
        target: TargetRule::None,
        disable_with_zero: false,
    };

    fn candidate(args: Args) -> Candidate<bool> {
        Candidate {
            common: args.common,
            database: None,
            target_name: None,
            target_id: None,
            warning: args.warning,
            critical: args.critical,
            kind: ThresholdKind::Percentage,
            options: args.limit,
        }
    }

    fn evaluate(config: &CheckConfiguration<bool>, members: Vec<MemberMemory>) -> CheckResult {
        let thresholds = config.thresholds();
        let with_limit = *config.options();

        let results: Vec<SubResult> = members
            .iter()
            .map(|member| judge(member, thresholds, with_limit))
            .collect();
        let (status, detail) = combine(&results);

        let used: u64 = members.iter().filter_map(|m| m.usage_kb).sum();
        let limit: u64 = members.iter().filter_map(|m| m.limit_kb).sum();
        let figures = if limit > 0 {
            format!("{} of {}", mb_text(used), mb_text(limit))
        } else {
            mb_text(used)
        };
        let summary = match status {
            Status::Unknown => {
                return CheckResult::new(status, "No member reported its memory usage.")
                    .with_detail(detail)
            }
            _ if !with_limit => format!("Instance memory usage is {}.", figures),
            Status::Ok => format!("Instance memory usage is normal ({}).", figures),
            Status::Warning => format!("Instance memory usage is high ({}).", figures),
            Status::Critical => format!("Instance memory usage is critical ({}).", figures),
        };

        let total = PerfField::new("Instance_memory", mb(used))
            .unit("MB")
            .range(Some(0.0), if limit > 0 { Some(mb(limit)) } else { None });
        let mut result = CheckResult::new(status, summary)
            .with_detail(detail)
            .with_perf(total);
        for member in &members {
            if let Some(usage) = member.usage_kb {
                result = result.with_long_perf(member_perf(member, usage, thresholds, with_limit));
            }
        }
        result
    }
}

fn mb(kb: u64) -> f64 {
    kb as f64 / 1024.0
}

fn mb_text(kb: u64) -> String {
    format!("{:.0} MB", mb(kb))
}

/// The status and detail of one member
///
/// Without `with_limit` a member that reports its usage is always OK.
fn judge(member: &MemberMemory, thresholds: &Thresholds, with_limit: bool) -> SubResult {
    match (member.usage_kb, member.limit_kb) {
        (None, _) => SubResult {
            status: Status::Unknown,
            detail: format!("Member {} did not report its memory usage.", member.member),
        },
        (Some(usage), _) if !with_limit => SubResult {
            status: Status::Ok,
            detail: format!("Member {} uses {}.", member.member, mb_text(usage)),
        },
        (Some(usage), Some(limit)) if limit > 0 => {
            let percent = usage as f64 / limit as f64 * 100.0;
            SubResult {
                status: thresholds.evaluate(Some(percent)),
                detail: format!(
                    "Member {} uses {} of {} ({:.1}%).",
                    member.member,
                    mb_text(usage),
                    mb_text(limit),
                    percent
                ),
            }
        }
        (Some(usage), _) => SubResult {
            status: Status::Unknown,
            detail: format!(
                "Member {} uses {} but has no memory limit.",
                member.member,
                mb_text(usage)
            ),
        },
    }
}

fn member_perf(
    member: &MemberMemory,
    usage: u64,
    thresholds: &Thresholds,
    with_limit: bool,
) -> PerfField {
    let field = PerfField::new(format!("Member_{}", member.member), mb(usage)).unit("MB");
    match member.limit_kb {
        Some(limit) => {
            let at = |percent: Option<f64>| percent.map(|p| mb(limit) * p / 100.0);
            let field = field.range(Some(0.0), Some(mb(limit)));
            if with_limit {
                field.thresholds(at(thresholds.warning), at(thresholds.critical))
            } else {
                field
            }
        }
        None => field,
    }
}

/// Reads the memory controller statistics from `db2pd`
struct PartitionMemory(Db2Cli);

impl MetricCollector<bool> for PartitionMemory {
    type Measurement = Vec<MemberMemory>;

    fn collect(
        &mut self,
        config: &CheckConfiguration<bool>,
    ) -> Result<Vec<MemberMemory>, CollectionError> {
        let output = self.0.db2pd(&config.profile(), "-dbptnmem")?;
        let members = member_memory(&output);
        if members.is_empty() {
            return Err(CollectionError::no_measurement(format!(
                "No database member found in the db2pd output: {}",
                output.trim()
            )));
        }
        Ok(members)
    }
}

#[cfg_attr(test, allow(dead_code))]
fn main() {
    plugin::main::<InstanceMemory, _>(PartitionMemory(Db2Cli::new()))
}

#[cfg(test)]
mod test {
    use std::fs;

    use tempfile::TempDir;

    use db2_plugins::config::CheckConfiguration;
    use db2_plugins::db2::parse::MemberMemory;
    use db2_plugins::db2::{CollectionError, Db2Cli, MetricCollector};
    use db2_plugins::lock::ProcessTable;
    use db2_plugins::plugin::{Outcome, Runner};
    use db2_plugins::Status;

    use super::{InstanceMemory, PartitionMemory};

    struct Fixed(Vec<MemberMemory>);

    impl MetricCollector<bool> for Fixed {
        type Measurement = Vec<MemberMemory>;

        fn collect(
            &mut self,
            _: &CheckConfiguration<bool>,
        ) -> Result<Vec<MemberMemory>, CollectionError> {
            Ok(self.0.clone())
        }
    }

    fn member(member: u32, usage_mb: u64, limit_mb: u64) -> MemberMemory {
        MemberMemory {
            member,
            limit_kb: Some(limit_mb * 1024),
            usage_kb: Some(usage_mb * 1024),
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
        M: MetricCollector<bool, Measurement = Vec<MemberMemory>>,
    {
        let locks = tempfile::tempdir().unwrap();
        let mut argv = vec!["check-instance-memory", "-i", home.path().to_str().unwrap()];
        argv.extend_from_slice(extra);
        Runner::new(locks.path().to_owned(), locks.path().join("trace.log"), &ProcessTable)
            .run::<InstanceMemory, _, _, _>(argv, collector)
    }

    #[test]
    fn without_limit_is_always_ok() {
        let home = instance("");
        let outcome = run(
            &home,
            &["-w", "10", "-c", "20"],
            &mut Fixed(vec![member(0, 1000, 1000), member(1, 990, 1000)]),
        );
        assert_eq!(outcome.status, Status::Ok);
        assert_eq!(
            outcome.text,
            "Instance memory usage is 1990 MB of 2000 MB.|'Instance_memory'=1990MB;;;0;2000\n\
             Member 0 uses 1000 MB. Member 1 uses 990 MB.|'Member_0'=1000MB;;;0;1000 'Member_1'=990MB;;;0;1000\n"
        );
    }

    #[test]
    fn worst_member_wins() {
        let home = instance("");
        let outcome = run(
            &home,
            &["-l"],
            &mut Fixed(vec![member(0, 100, 1000), member(1, 850, 1000)]),
        );
        assert_eq!(outcome.status, Status::Warning);
        assert!(outcome
            .text
            .starts_with("Instance memory usage is high (950 MB of 2000 MB)."));
        assert!(outcome.text.contains(
            "Member 0 uses 100 MB of 1000 MB (10.0%). Member 1 uses 850 MB of 1000 MB (85.0%).|"
        ));
        assert!(outcome.text.contains("'Member_1'=850MB;800;900;0;1000"));

        let outcome = run(
            &home,
            &["-l"],
            &mut Fixed(vec![member(0, 950, 1000), member(1, 850, 1000)]),
        );
        assert_eq!(outcome.status, Status::Critical);
    }

    #[test]
    fn members_without_figures() {
        let home = instance("");
        let silent = MemberMemory {
            member: 2,
            limit_kb: None,
            usage_kb: None,
        };

        // one readable member is enough for a status
        let outcome = run(&home, &["-l"], &mut Fixed(vec![member(0, 100, 1000), silent.clone()]));
        assert_eq!(outcome.status, Status::Ok);
        assert!(outcome.text.contains("Member 2 did not report its memory usage."));

        let outcome = run(&home, &["-l"], &mut Fixed(vec![silent]));
        assert_eq!(outcome.status, Status::Unknown);
        assert!(outcome.text.starts_with("No member reported its memory usage."));
    }

    #[test]
    fn silent_members_are_unknown_without_limit_too() {
        let home = instance("");
        let silent = MemberMemory {
            member: 0,
            limit_kb: None,
            usage_kb: None,
        };
        let outcome = run(&home, &[], &mut Fixed(vec![silent]));
        assert_eq!(outcome.status, Status::Unknown);
        assert_eq!(
            outcome.text,
            "No member reported its memory usage.\nMember 0 did not report its memory usage.\n"
        );
    }

    #[test]
    fn tabular_has_no_database() {
        let home = instance("");
        let name = home.path().file_name().unwrap().to_str().unwrap().to_owned();
        let outcome = run(&home, &["-K"], &mut Fixed(vec![member(0, 512, 1024)]));
        assert_eq!(
            outcome.text,
            format!(
                "0 check-instance-memory-{} Instance_memory=512;;;0;1024|Member_0=512;;;0;1024 Instance memory usage is 512 MB of 1024 MB.\n",
                name
            )
        );
    }

    #[test]
    fn collects_through_db2pd() {
        let home = instance(
            "db2pd() {\n  echo 'Database Member 0 -- Active'\n  echo 'Memory Limit:         1048576 KB'\n  echo 'Current usage:        943719 KB'\n}\n",
        );
        let outcome = run(&home, &["-l"], &mut PartitionMemory(Db2Cli::new()));
        assert_eq!(outcome.status, Status::Critical);
        assert!(outcome.text.contains("(90.0%)"));
    }

    #[test]
    fn no_members_is_unknown() {
        let home = instance("db2pd() { echo 'Database Member Memory Controller Statistics'; }\n");
        let outcome = run(&home, &["-l"], &mut PartitionMemory(Db2Cli::new()));
        assert_eq!(outcome.status, Status::Unknown);
        assert!(outcome.text.starts_with("No database member found"));
    }
}
