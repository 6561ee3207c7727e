use std::sync::atomic::{AtomicU64, Ordering};

use docket_client::{ClientError, ClientFactory, Database};
use tracing::{debug, warn};

use crate::report::{RunState, TestReport};
use crate::script::{Fault, Interpreter, ScriptError};

pub const DEFAULT_DB_PREFIX: &str = "docket";

#[derive(Debug, Clone)]
pub struct RunOptions {
    /// Each run gets its own database, `{db_prefix}_{run_id}`.
    pub db_prefix: String,
    /// Leave the run's database in place after the script finishes.
    pub keep_data: bool,
}

impl Default for RunOptions {
    fn default() -> Self {
        Self {
            db_prefix: DEFAULT_DB_PREFIX.to_string(),
            keep_data: false,
        }
    }
}

/// Runs scripts, each against a fresh client and its own database.
pub struct Runner<'f, F: ClientFactory> {
    factory: &'f F,
    options: RunOptions,
    next_run: AtomicU64,
}

impl<'f, F: ClientFactory> Runner<'f, F> {
    pub fn new(factory: &'f F, options: RunOptions) -> Self {
        Self {
            factory,
            options,
            next_run: AtomicU64::new(1),
        }
    }

    /// Database name for the next run. Unique within this process and, via
    /// the pid, across harness processes sharing a server.
    fn next_db_name(&self) -> String {
        let run = self.next_run.fetch_add(1, Ordering::Relaxed);
        format!("{}_{}_{run}", self.options.db_prefix, std::process::id())
    }

    /// Execute `source` to completion and return its report.
    ///
    /// Client failures and script errors end the run and are recorded as a
    /// single runner error; they are never returned.
    pub fn run_script(&self, name: &str, source: &str) -> TestReport {
        let mut report = TestReport::new();
        report.start();
        debug!(script = name, state = ?report.state(), "run started");

        let client = match self.factory.connect() {
            Ok(client) => client,
            Err(e) => {
                report.record_runner_error(format!("cannot connect: {e}"));
                report.finish();
                return report;
            }
        };

        let db_name = self.next_db_name();
        let db = Database::new(&client, db_name.clone());
        if let Err(e) = db.drop_database() {
            report.record_runner_error(format!("cannot reset database {db_name}: {e}"));
            report.finish();
            return report;
        }

        let outcome = Interpreter::new(Database::new(&client, db_name.clone()), &mut report)
            .run(source);
        let mut connection_lost = false;
        if let Err(e) = outcome {
            debug!(script = name, error = %e, "run aborted");
            connection_lost = matches!(
                &e,
                ScriptError::Runtime { fault: Fault::Client(c), .. } if !c.is_store_error()
            );
            report.record_runner_error(e.to_string());
        }

        if !self.options.keep_data {
            let dropped = if connection_lost {
                self.drop_with_fresh_client(&db_name)
            } else {
                db.drop_database()
            };
            if let Err(e) = dropped {
                warn!(script = name, db = %db_name, error = %e, "cleanup failed");
            }
        }

        let verdict = report.finish();
        debug!(script = name, state = ?RunState::Completed(verdict), "run finished");
        report
    }

    /// The run's own client failed mid-exchange; clean up over a new one.
    fn drop_with_fresh_client(&self, db_name: &str) -> Result<u64, ClientError> {
        debug!(db = %db_name, "reconnecting for cleanup");
        let client = self.factory.connect()?;
        Database::new(&client, db_name).drop_database()
    }
}

/// Run one script with default options.
pub fn run_script<F: ClientFactory>(source: &str, factory: &F) -> TestReport {
    Runner::new(factory, RunOptions::default()).run_script("<script>", source)
}

#[cfg(test)]
mod tests {
    use super::*;
    use docket_client::LocalFactory;

    use crate::report::{ResultKind, Verdict};

    #[test]
    fn green_script_completes_with_pass() {
        let factory = LocalFactory::default();
        let report = run_script("assert(true, 'ok');", &factory);
        assert_eq!(report.state(), RunState::Completed(Verdict::Pass));
        assert_eq!(report.results().len(), 1);
    }

    #[test]
    fn runtime_error_becomes_single_runner_result() {
        let factory = LocalFactory::default();
        let report = run_script("assert(true);\nnope();\nassert(true);", &factory);
        assert_eq!(report.state(), RunState::Completed(Verdict::Fail));
        assert_eq!(report.results().len(), 2);
        let error = report.runner_error().unwrap();
        assert_eq!(error.kind, ResultKind::Runner);
        assert!(error.message.contains("line 2"), "{}", error.message);
    }

    #[test]
    fn out_of_range_array_index_is_a_runner_error() {
        let report = run_script("o = [1];\no[4e18] = 2;\n", &LocalFactory::default());
        assert_eq!(report.state(), RunState::Completed(Verdict::Fail));
        assert_eq!(report.results().len(), 1);
        assert!(report.runner_error().unwrap().message.starts_with("line 2: TypeError"));
    }

    #[test]
    fn run_database_is_dropped_afterwards() {
        let factory = LocalFactory::default();
        let runner = Runner::new(
            &factory,
            RunOptions {
                db_prefix: "gone".into(),
                keep_data: false,
            },
        );
        assert!(runner.run_script("drop", "db.c.insertOne({ a: 1 });").is_green());
        let db = format!("gone_{}_1", std::process::id());
        assert!(factory.store().list_collections(&db).unwrap().is_empty());
    }

    #[test]
    fn keep_data_leaves_the_database() {
        let factory = LocalFactory::default();
        let runner = Runner::new(
            &factory,
            RunOptions {
                db_prefix: "kept".into(),
                keep_data: true,
            },
        );
        let report = runner.run_script("keep", "db.c.insertOne({ a: 1 });");
        assert!(report.is_green());
        let db = format!("kept_{}_1", std::process::id());
        assert_eq!(factory.store().list_collections(&db).unwrap(), vec!["c"]);
    }

    #[test]
    fn runs_do_not_share_collections() {
        let factory = LocalFactory::default();
        let runner = Runner::new(
            &factory,
            RunOptions {
                db_prefix: "iso".into(),
                keep_data: true,
            },
        );
        let script = "t = db.c; t.insertOne({ a: 1 }); assert.eq(1, t.countDocuments());";
        assert!(runner.run_script("first", script).is_green());
        assert!(runner.run_script("second", script).is_green());
    }
}
