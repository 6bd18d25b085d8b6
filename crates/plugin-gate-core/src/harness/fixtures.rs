//! Fixture runner
//!
//! Runs the validator pair and the scorer against every case listed in
//! `fixtures/fixtures.toml` and compares the observed outcome with the
//! expected one. Cases share no state and are spread over scoped worker
//! threads; only the aggregate verdict matters.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::config::Config;
use crate::error::{GateError, Result};
use crate::score::Scorer;
use crate::validate::{validate_plugin, Violation, ViolationKind};

/// Fixture table, relative to the marketplace root
pub const FIXTURES_FILE: &str = "fixtures/fixtures.toml";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Expectation {
    Pass,
    Fail,
}

/// A curated plugin tree plus its expected outcome
#[derive(Debug, Clone, Deserialize)]
pub struct FixtureCase {
    pub name: String,
    /// Plugin directory, relative to the marketplace root
    pub path: PathBuf,
    pub expect: Expectation,
    /// Expected kind of the first reported violation
    #[serde(default)]
    pub violation: Option<ViolationKind>,
    #[serde(default)]
    pub min_score: Option<u32>,
    #[serde(default)]
    pub max_score: Option<u32>,
}

#[derive(Debug, Deserialize)]
struct FixtureTable {
    #[serde(default, rename = "case")]
    cases: Vec<FixtureCase>,
}

/// Observed outcome of one case
#[derive(Debug, Clone, Serialize)]
pub struct FixtureOutcome {
    pub name: String,
    pub passed_validation: bool,
    pub first_violation: Option<Violation>,
    pub score: Option<u32>,
    /// Differences from the expectation; empty when the case matched
    pub mismatches: Vec<String>,
}

impl FixtureOutcome {
    pub fn matched(&self) -> bool {
        self.mismatches.is_empty()
    }
}

/// Aggregate of every case, sorted by name
#[derive(Debug, Clone, Serialize)]
pub struct FixtureReport {
    pub outcomes: Vec<FixtureOutcome>,
}

impl FixtureReport {
    pub fn passed(&self) -> bool {
        self.outcomes.iter().all(FixtureOutcome::matched)
    }

    pub fn matched_count(&self) -> usize {
        self.outcomes.iter().filter(|o| o.matched()).count()
    }

    /// One line per mismatch, prefixed with the case name
    pub fn failures(&self) -> Vec<String> {
        self.outcomes
            .iter()
            .flat_map(|o| o.mismatches.iter().map(move |m| format!("{}: {}", o.name, m)))
            .collect()
    }

    pub fn into_result(self) -> Result<Self> {
        if self.passed() {
            Ok(self)
        } else {
            Err(GateError::Harness {
                failures: self.failures(),
            })
        }
    }
}

/// Parse a fixture table
pub fn load_cases(path: &Path) -> Result<Vec<FixtureCase>> {
    let content = fs::read_to_string(path).map_err(|e| GateError::ConfigParse {
        path: path.to_path_buf(),
        message: e.to_string(),
    })?;
    let table: FixtureTable = toml::from_str(&content).map_err(|e| GateError::ConfigParse {
        path: path.to_path_buf(),
        message: e.to_string(),
    })?;
    Ok(table.cases)
}

pub struct FixtureRunner {
    root: PathBuf,
    scorer: Scorer,
    workers: usize,
}

impl FixtureRunner {
    pub fn new(root: impl Into<PathBuf>, config: &Config) -> Self {
        let workers = std::thread::available_parallelism()
            .map(|n| n.get())
            .unwrap_or(1);
        Self {
            root: root.into(),
            scorer: Scorer::new(&config.scoring),
            workers,
        }
    }

    pub fn with_workers(mut self, workers: usize) -> Self {
        self.workers = workers.max(1);
        self
    }

    /// Load the marketplace's fixture table and run it
    pub fn run_default(&self) -> Result<FixtureReport> {
        let cases = load_cases(&self.root.join(FIXTURES_FILE))?;
        self.run(&cases)
    }

    pub fn run(&self, cases: &[FixtureCase]) -> Result<FixtureReport> {
        let workers = self.workers.min(cases.len()).max(1);
        let next = AtomicUsize::new(0);

        let mut outcomes = std::thread::scope(|s| {
            let handles: Vec<_> = (0..workers)
                .map(|_| {
                    s.spawn(|| {
                        let mut local = Vec::new();
                        loop {
                            let index = next.fetch_add(1, Ordering::Relaxed);
                            let Some(case) = cases.get(index) else {
                                break;
                            };
                            local.push(self.run_case(case));
                        }
                        local
                    })
                })
                .collect();

            let mut outcomes = Vec::with_capacity(cases.len());
            for handle in handles {
                let local = handle.join().map_err(|_| GateError::Harness {
                    failures: vec!["fixture worker panicked".to_string()],
                })?;
                outcomes.extend(local);
            }
            Ok::<_, GateError>(outcomes)
        })?;
        outcomes.sort_by(|a, b| a.name.cmp(&b.name));

        let report = FixtureReport { outcomes };
        info!(
            cases = report.outcomes.len(),
            matched = report.matched_count(),
            workers,
            "fixtures finished"
        );
        Ok(report)
    }

    /// Evaluate one case; never fails, problems become mismatches
    pub fn run_case(&self, case: &FixtureCase) -> FixtureOutcome {
        let dir = self.root.join(&case.path);
        let mut outcome = FixtureOutcome {
            name: case.name.clone(),
            passed_validation: false,
            first_violation: None,
            score: None,
            mismatches: Vec::new(),
        };

        let result = match validate_plugin(&dir) {
            Ok(result) => result,
            Err(e) => {
                outcome.mismatches.push(e.to_string());
                return outcome;
            }
        };
        outcome.passed_validation = result.passed();
        outcome.first_violation = result.violations.first().cloned();

        match (case.expect, result.passed()) {
            (Expectation::Pass, false) => outcome.mismatches.push(format!(
                "expected pass, got {}",
                outcome
                    .first_violation
                    .as_ref()
                    .map(|v| v.to_string())
                    .unwrap_or_default()
            )),
            (Expectation::Fail, true) => outcome
                .mismatches
                .push("expected a violation, validation passed".to_string()),
            _ => {}
        }

        if let Some(expected) = case.violation {
            let observed = outcome.first_violation.as_ref().map(|v| v.kind);
            if observed != Some(expected) {
                outcome.mismatches.push(format!(
                    "expected first violation {}, got {}",
                    expected,
                    observed.map(|k| k.as_str()).unwrap_or("none")
                ));
            }
        }

        if case.min_score.is_some() || case.max_score.is_some() {
            let total = self.scorer.score(&dir).total;
            outcome.score = Some(total);
            if let Some(min) = case.min_score.filter(|min| total < *min) {
                outcome
                    .mismatches
                    .push(format!("score {} below expected minimum {}", total, min));
            }
            if let Some(max) = case.max_score.filter(|max| total > *max) {
                outcome
                    .mismatches
                    .push(format!("score {} above expected maximum {}", total, max));
            }
        }

        debug!(case = %case.name, matched = outcome.matched(), "fixture evaluated");
        outcome
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::validate::testing::*;
    use tempfile::TempDir;

    const TABLE: &str = r#"
[[case]]
name = "good"
path = "fixtures/good-plugin"
expect = "pass"
min_score = 40

[[case]]
name = "bad-version"
path = "fixtures/bad-version"
expect = "fail"
violation = "version-mismatch"
max_score = 95
"#;

    fn marketplace() -> TempDir {
        let temp = TempDir::new().unwrap();
        let fixtures = temp.path().join("fixtures");
        valid_plugin(&fixtures, "good-plugin");
        let bad = valid_plugin(&fixtures, "bad-version");
        write(
            &bad.join(".claude-plugin/plugin.json"),
            &manifest_json("bad-version", "1.0.0"),
        );
        write(&bad.join("VERSION"), "2.0.0\n");
        write(&temp.path().join(FIXTURES_FILE), TABLE);
        temp
    }

    #[test]
    fn table_parses_expectations() {
        let temp = marketplace();
        let cases = load_cases(&temp.path().join(FIXTURES_FILE)).unwrap();
        assert_eq!(cases.len(), 2);
        assert_eq!(cases[1].expect, Expectation::Fail);
        assert_eq!(cases[1].violation, Some(ViolationKind::VersionMismatch));
        assert_eq!(cases[0].max_score, None);
    }

    #[test]
    fn matching_cases_pass() {
        let temp = marketplace();
        let report = FixtureRunner::new(temp.path(), &Config::default())
            .run_default()
            .unwrap();

        assert!(report.passed(), "{:?}", report.failures());
        let names: Vec<&str> = report.outcomes.iter().map(|o| o.name.as_str()).collect();
        assert_eq!(names, vec!["bad-version", "good"]);
        assert!(report.outcomes[1].score.unwrap() >= 40);
    }

    #[test]
    fn worker_count_does_not_change_the_verdict() {
        let temp = marketplace();
        let config = Config::default();
        let serial = FixtureRunner::new(temp.path(), &config)
            .with_workers(1)
            .run_default()
            .unwrap();
        let parallel = FixtureRunner::new(temp.path(), &config)
            .with_workers(8)
            .run_default()
            .unwrap();

        assert_eq!(serial.passed(), parallel.passed());
        assert_eq!(
            serde_json::to_value(&serial).unwrap(),
            serde_json::to_value(&parallel).unwrap()
        );
    }

    #[test]
    fn mismatches_are_reported_per_case() {
        let temp = marketplace();
        let cases = vec![
            FixtureCase {
                name: "wrong-expectation".to_string(),
                path: PathBuf::from("fixtures/good-plugin"),
                expect: Expectation::Fail,
                violation: None,
                min_score: None,
                max_score: None,
            },
            FixtureCase {
                name: "wrong-kind".to_string(),
                path: PathBuf::from("fixtures/bad-version"),
                expect: Expectation::Fail,
                violation: Some(ViolationKind::Naming),
                min_score: None,
                max_score: None,
            },
            FixtureCase {
                name: "missing-tree".to_string(),
                path: PathBuf::from("fixtures/nowhere"),
                expect: Expectation::Pass,
                violation: None,
                min_score: None,
                max_score: None,
            },
        ];

        let report = FixtureRunner::new(temp.path(), &Config::default())
            .run(&cases)
            .unwrap();
        assert!(!report.passed());
        assert_eq!(report.matched_count(), 0);

        let err = report.into_result().unwrap_err();
        match err {
            GateError::Harness { failures } => {
                assert_eq!(failures.len(), 3);
                assert!(failures[0].starts_with("missing-tree:"));
                assert!(failures[2].contains("expected first violation naming"));
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn score_range_is_enforced() {
        let temp = marketplace();
        let case = FixtureCase {
            name: "too-good".to_string(),
            path: PathBuf::from("fixtures/good-plugin"),
            expect: Expectation::Pass,
            violation: None,
            min_score: None,
            max_score: Some(10),
        };
        let outcome = FixtureRunner::new(temp.path(), &Config::default()).run_case(&case);
        assert!(!outcome.matched());
        assert!(outcome.mismatches[0].contains("above expected maximum 10"));
    }

    #[test]
    fn unreadable_table_is_a_parse_error() {
        let temp = TempDir::new().unwrap();
        write(&temp.path().join(FIXTURES_FILE), "[[case]]\nname = 3\n");
        let err = FixtureRunner::new(temp.path(), &Config::default())
            .run_default()
            .unwrap_err();
        assert!(matches!(err, GateError::ConfigParse { .. }));
    }
}
