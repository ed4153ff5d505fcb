use super::unit::Outcome;
use chrono::{DateTime, Local};
use colored::*;
use std::time::Duration;

/// Exit code when every executed test passed.
pub const AUTOMAKE_PASSED: i32 = 0;
/// Exit code when every selected test was skipped.
pub const AUTOMAKE_SKIPPED: i32 = 77;
/// Exit code when no test was selected at all.
pub const AUTOMAKE_HARD_ERROR: i32 = 99;
/// Largest failure count reported through the exit code. Higher counts
/// would collide with the skip and hard error codes or wrap at 256.
pub const MAX_FAILURE_EXIT_CODE: i32 = AUTOMAKE_SKIPPED - 1;

const RULE: &str = "-----------------------------------------------------------------";
const LABEL_WIDTH: usize = 35;
const VALUE_WIDTH: usize = 15;

/// Store information related to one executed unit.
#[derive(Debug, Clone, PartialEq)]
pub struct Record {
    /// File name of the unit.
    pub filename: String,
    /// Time spent in the unit.
    pub elapsed: Duration,
    /// How the unit ended.
    pub outcome: Outcome,
}

/// Number of units per outcome.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Summary {
    pub passed: usize,
    pub failed: usize,
    pub skipped: usize,
}

impl Summary {
    /// Map the counts to an automake test driver exit code. Failures are
    /// counted up to [MAX_FAILURE_EXIT_CODE].
    pub fn exit_code(&self) -> i32 {
        if self.failed > 0 {
            self.failed.min(MAX_FAILURE_EXIT_CODE as usize) as i32
        } else if self.passed > 0 {
            AUTOMAKE_PASSED
        } else if self.skipped > 0 {
            AUTOMAKE_SKIPPED
        } else {
            AUTOMAKE_HARD_ERROR
        }
    }
}

/// Records of a whole run, grouped by outcome in execution order.
#[derive(Debug, Default)]
pub struct Results {
    pub passed: Vec<Record>,
    pub failed: Vec<Record>,
    pub skipped: Vec<Record>,
    /// Time spent in the run's setup.
    pub setup: Duration,
    /// Time spent in the run's teardown.
    pub teardown: Duration,
}

fn row(label: &str, value: &str) -> String {
    format!("\t{:<lw$}{:>vw$}\n", label, value, lw = LABEL_WIDTH, vw = VALUE_WIDTH)
}

fn timing_row(label: &str, width: usize, time: Duration) -> String {
    format!(
        "\t{:<w$}{:>vw$}\n",
        label,
        format!("{:.2}", time.as_secs_f64()),
        w = width,
        vw = VALUE_WIDTH
    )
}

impl Results {
    pub fn push(&mut self, record: Record) {
        match record.outcome {
            Outcome::Passed => self.passed.push(record),
            Outcome::Failed(_) => self.failed.push(record),
            Outcome::Skipped(_) => self.skipped.push(record),
        }
    }

    pub fn summary(&self) -> Summary {
        Summary {
            passed: self.passed.len(),
            failed: self.failed.len(),
            skipped: self.skipped.len(),
        }
    }

    /// Setup, teardown and every passed or failed unit. Skipped units are
    /// left out.
    pub fn total_run_time(&self) -> Duration {
        self.passed
            .iter()
            .chain(self.failed.iter())
            .map(|record| record.elapsed)
            .fold(self.setup + self.teardown, |total, elapsed| total + elapsed)
    }

    /// Every record, sorted by file name.
    pub fn sorted_records(&self) -> Vec<&Record> {
        let mut all: Vec<&Record> = self
            .passed
            .iter()
            .chain(self.skipped.iter())
            .chain(self.failed.iter())
            .collect();
        all.sort_by(|a, b| a.filename.cmp(&b.filename));
        all
    }

    /// Render the summary and, with `verbose`, the timing table.
    pub fn report_str(&self, verbose: bool, date: DateTime<Local>) -> String {
        let Summary {
            passed,
            failed,
            skipped,
        } = self.summary();

        let mut buf = String::with_capacity(1024);
        buf.push_str(RULE);
        buf.push('\n');
        buf.push_str(&format!("{}\n", "Test Results:".bold()));
        buf.push_str(&row("Run Date:", &date.format("%b %d %H:%M:%S").to_string()));

        let passed_row = row("Passed:", &format!("{} test(s)", passed));
        let skipped_row = row("Skipped:", &format!("{} test(s)", skipped));
        let failed_row = row("Failed:", &format!("{} test(s)", failed));
        buf.push_str(&passed_row.green().to_string());
        buf.push_str(&skipped_row.yellow().to_string());
        if failed > 0 {
            buf.push_str(&failed_row.red().to_string());
        } else {
            buf.push_str(&failed_row);
        }

        for record in &self.failed {
            let line = format!(
                "\t\tTest:\t\t\t\t{} - {}",
                record.filename,
                record.outcome.cause().unwrap_or_default()
            );
            buf.push_str(&line.red().to_string());
            buf.push('\n');
        }
        buf.push_str(RULE);
        buf.push('\n');

        if verbose {
            buf.push_str(&self.timing_str());
        }
        buf
    }

    fn timing_str(&self) -> String {
        let records = self.sorted_records();
        let width = records
            .iter()
            .map(|record| record.filename.len())
            .chain(Some("Total Run Time".len()))
            .max()
            .unwrap_or_default();
        let separator = format!("\t{}\n", "-".repeat(width + VALUE_WIDTH));

        let mut buf = String::new();
        buf.push_str(&format!("{}\n", "Timing Results:".bold()));
        buf.push_str(&format!(
            "\t{:<w$}{:>vw$}\n",
            "Test",
            "Time (sec)",
            w = width,
            vw = VALUE_WIDTH
        ));
        buf.push_str(&separator);
        buf.push_str(&timing_row("setup", width, self.setup));
        for record in records {
            buf.push_str(&timing_row(&record.filename, width, record.elapsed));
        }
        buf.push_str(&timing_row("teardown", width, self.teardown));
        buf.push_str(&separator);
        buf.push_str(&timing_row("Total Run Time", width, self.total_run_time()));
        buf
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn record(filename: &str, millis: u64, outcome: Outcome) -> Record {
        Record {
            filename: filename.to_string(),
            elapsed: Duration::from_millis(millis),
            outcome,
        }
    }

    fn mixed() -> Results {
        let mut results = Results {
            setup: Duration::from_millis(100),
            teardown: Duration::from_millis(200),
            ..Results::default()
        };
        results.push(record("010-cause-b.ftest", 1000, Outcome::Passed));
        results.push(record("002-effect-a.ftest", 500, Outcome::failed("boom")));
        results.push(record("9-cause-z.ftest", 4000, Outcome::skipped("no psi")));
        results.push(record("001-cause-c.ftest", 250, Outcome::Passed));
        results
    }

    fn summary(passed: usize, failed: usize, skipped: usize) -> Summary {
        Summary {
            passed,
            failed,
            skipped,
        }
    }

    #[test]
    fn exit_codes() {
        assert_eq!(summary(3, 1, 2).exit_code(), 1);
        assert_eq!(summary(0, 4, 0).exit_code(), 4);
        assert_eq!(summary(2, 0, 5).exit_code(), AUTOMAKE_PASSED);
        assert_eq!(summary(0, 0, 5).exit_code(), AUTOMAKE_SKIPPED);
        assert_eq!(summary(0, 0, 0).exit_code(), AUTOMAKE_HARD_ERROR);
    }

    #[test]
    fn large_failure_counts_stay_distinct() {
        assert_eq!(summary(0, 76, 0).exit_code(), 76);
        assert_eq!(summary(0, 77, 0).exit_code(), MAX_FAILURE_EXIT_CODE);
        assert_eq!(summary(0, 99, 0).exit_code(), MAX_FAILURE_EXIT_CODE);
        assert_eq!(summary(1, 256, 0).exit_code(), MAX_FAILURE_EXIT_CODE);
    }

    #[test]
    fn records_are_bucketed_by_outcome() {
        let results = mixed();
        assert_eq!(results.summary(), summary(2, 1, 1));
        assert_eq!(results.passed[0].filename, "010-cause-b.ftest");
        assert_eq!(results.passed[1].filename, "001-cause-c.ftest");
    }

    #[test]
    fn total_excludes_skipped_time() {
        // 100 + 200 + 1000 + 500 + 250
        assert_eq!(mixed().total_run_time(), Duration::from_millis(2050));
    }

    #[test]
    fn records_sort_by_name_not_number() {
        let results = mixed();
        let names: Vec<_> = results
            .sorted_records()
            .into_iter()
            .map(|r| r.filename.as_str())
            .collect();
        assert_eq!(
            names,
            [
                "001-cause-c.ftest",
                "002-effect-a.ftest",
                "010-cause-b.ftest",
                "9-cause-z.ftest"
            ]
        );
    }

    #[test]
    fn report_lists_counts_and_failures() {
        colored::control::set_override(false);
        let date = Local.with_ymd_and_hms(2024, 3, 1, 10, 0, 0).unwrap();
        let report = mixed().report_str(false, date);

        assert!(report.contains(&format!("\t{:<35}{:>15}\n", "Run Date:", "Mar 01 10:00:00")));
        assert!(report.contains(&format!("\t{:<35}{:>15}\n", "Passed:", "2 test(s)")));
        assert!(report.contains(&format!("\t{:<35}{:>15}\n", "Skipped:", "1 test(s)")));
        assert!(report.contains(&format!("\t{:<35}{:>15}\n", "Failed:", "1 test(s)")));
        assert!(report.contains("\t\tTest:\t\t\t\t002-effect-a.ftest - boom\n"));
        assert!(!report.contains("Timing Results:"));
    }

    #[test]
    fn verbose_report_has_timing_table() {
        colored::control::set_override(false);
        let date = Local.with_ymd_and_hms(2024, 3, 1, 10, 0, 0).unwrap();
        let report = mixed().report_str(true, date);
        let timing: Vec<_> = report
            .lines()
            .skip_while(|line| *line != "Timing Results:")
            .collect();

        assert_eq!(timing.len(), 11);
        assert!(timing[3].starts_with("\tsetup"));
        assert!(timing[3].ends_with("0.10"));
        assert!(timing[4].starts_with("\t001-cause-c.ftest"));
        assert!(timing[7].starts_with("\t9-cause-z.ftest"));
        assert!(timing[7].ends_with("4.00"));
        assert!(timing[8].starts_with("\tteardown"));
        assert!(timing[10].starts_with("\tTotal Run Time"));
        assert!(timing[10].ends_with("2.05"));
    }
}
