mod assert;
pub mod config;
mod report;
pub mod runner;
pub mod script;
pub mod suite;
pub mod tags;

pub use report::{AssertionResult, ResultKind, RunState, TestReport, Verdict};
pub use runner::{RunOptions, Runner, run_script};
pub use suite::{ScriptOutcome, SuiteOptions, SuiteReport, discover, run_suite};
