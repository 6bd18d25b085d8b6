//! Test Harness Module
//!
//! - `fixtures`: curated plugin trees checked against expected outcomes
//! - `e2e`: scaffold-to-registry scenario with guaranteed cleanup

pub mod e2e;
pub mod fixtures;

pub use e2e::{
    new_plugin_id, recover, E2eReport, E2eRunner, E2eStep, ScaffoldHandle, StepFailure,
    E2E_PREFIX, STATE_DIR,
};
pub use fixtures::{
    load_cases, Expectation, FixtureCase, FixtureOutcome, FixtureReport, FixtureRunner,
    FIXTURES_FILE,
};
