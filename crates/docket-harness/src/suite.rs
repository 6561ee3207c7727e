use std::fmt::Write as _;
use std::path::{Path, PathBuf};

use docket_client::ClientFactory;
use serde::Serialize;
use tracing::{debug, info};

use crate::report::{AssertionResult, ResultKind, TestReport};
use crate::runner::{RunOptions, Runner};
use crate::tags::parse_tags;

#[derive(Debug, Clone)]
pub struct SuiteOptions {
    /// Scripts run concurrently on this many worker threads.
    pub jobs: usize,
    /// Scripts carrying any of these tags are skipped.
    pub exclude_tags: Vec<String>,
    pub run: RunOptions,
}

impl Default for SuiteOptions {
    fn default() -> Self {
        Self {
            jobs: 1,
            exclude_tags: Vec::new(),
            run: RunOptions::default(),
        }
    }
}

#[derive(Debug)]
pub struct ScriptOutcome {
    pub name: String,
    pub tags: Vec<String>,
    pub report: TestReport,
}

#[derive(Debug)]
pub struct Skipped {
    pub name: String,
    pub tag: String,
}

#[derive(Debug, Default)]
pub struct SuiteReport {
    /// In discovery order, regardless of which worker ran them.
    pub scripts: Vec<ScriptOutcome>,
    pub skipped: Vec<Skipped>,
}

/// `.js` files under `paths`, recursively, sorted and deduplicated.
///
/// Files named explicitly are taken whatever their extension.
pub fn discover(paths: &[PathBuf]) -> std::io::Result<Vec<PathBuf>> {
    let mut found = Vec::new();
    for path in paths {
        if path.is_dir() {
            walk(path, &mut found)?;
        } else if path.is_file() {
            found.push(path.clone());
        } else {
            return Err(std::io::Error::new(
                std::io::ErrorKind::NotFound,
                format!("no such file or directory: {}", path.display()),
            ));
        }
    }
    found.sort();
    found.dedup();
    Ok(found)
}

fn walk(dir: &Path, found: &mut Vec<PathBuf>) -> std::io::Result<()> {
    for entry in std::fs::read_dir(dir)? {
        let path = entry?.path();
        if path.is_dir() {
            walk(&path, found)?;
        } else if path.extension().is_some_and(|ext| ext == "js") {
            found.push(path);
        }
    }
    Ok(())
}

enum Job {
    Run {
        index: usize,
        name: String,
        source: String,
        tags: Vec<String>,
    },
    Unreadable {
        index: usize,
        name: String,
        error: String,
    },
}

/// Run every script in `files`, `options.jobs` at a time.
pub fn run_suite<F: ClientFactory>(
    files: &[PathBuf],
    factory: &F,
    options: &SuiteOptions,
) -> SuiteReport {
    let mut report = SuiteReport::default();
    let mut jobs = Vec::new();

    for path in files {
        let name = path.display().to_string();
        let index = jobs.len();
        match std::fs::read_to_string(path) {
            Ok(source) => {
                let tags = parse_tags(&source);
                if let Some(tag) = tags.iter().find(|t| options.exclude_tags.contains(t)) {
                    debug!(script = %name, %tag, "skipped");
                    report.skipped.push(Skipped {
                        name,
                        tag: tag.clone(),
                    });
                    continue;
                }
                jobs.push(Job::Run {
                    index,
                    name,
                    source,
                    tags,
                });
            }
            Err(e) => jobs.push(Job::Unreadable {
                index,
                name,
                error: e.to_string(),
            }),
        }
    }

    let total = jobs.len();
    let runner = Runner::new(factory, options.run.clone());
    let (job_tx, job_rx) = crossbeam::channel::unbounded::<Job>();
    let (done_tx, done_rx) = crossbeam::channel::unbounded::<(usize, ScriptOutcome)>();
    for job in jobs {
        // The receiver is alive until the scope below ends.
        let _ = job_tx.send(job);
    }
    drop(job_tx);

    std::thread::scope(|s| {
        for _ in 0..options.jobs.clamp(1, total.max(1)) {
            let job_rx = job_rx.clone();
            let done_tx = done_tx.clone();
            let runner = &runner;
            s.spawn(move || {
                for job in job_rx {
                    let (index, outcome) = execute(runner, job);
                    let _ = done_tx.send((index, outcome));
                }
            });
        }
    });
    drop(done_tx);

    let mut finished: Vec<(usize, ScriptOutcome)> = done_rx.into_iter().collect();
    finished.sort_by_key(|(index, _)| *index);
    report.scripts = finished.into_iter().map(|(_, outcome)| outcome).collect();

    info!(
        scripts = report.scripts.len(),
        failed = report.failed(),
        skipped = report.skipped.len(),
        "suite finished"
    );
    report
}

fn execute<F: ClientFactory>(runner: &Runner<'_, F>, job: Job) -> (usize, ScriptOutcome) {
    match job {
        Job::Run {
            index,
            name,
            source,
            tags,
        } => {
            let report = runner.run_script(&name, &source);
            (index, ScriptOutcome { name, tags, report })
        }
        Job::Unreadable { index, name, error } => {
            let mut report = TestReport::new();
            report.start();
            report.record_runner_error(format!("cannot read script: {error}"));
            report.finish();
            (
                index,
                ScriptOutcome {
                    name,
                    tags: Vec::new(),
                    report,
                },
            )
        }
    }
}

#[derive(Serialize)]
struct JsonSuite<'a> {
    green: bool,
    scripts: Vec<JsonScript<'a>>,
    skipped: Vec<&'a str>,
}

#[derive(Serialize)]
struct JsonScript<'a> {
    name: &'a str,
    tags: &'a [String],
    green: bool,
    results: &'a [AssertionResult],
}

impl SuiteReport {
    /// Green iff every script that ran is green.
    pub fn is_green(&self) -> bool {
        self.scripts.iter().all(|s| s.report.is_green())
    }

    pub fn failed(&self) -> usize {
        self.scripts.iter().filter(|s| !s.report.is_green()).count()
    }

    /// One line per script; failing scripts list every recorded failure and
    /// the error that aborted them.
    pub fn render_text(&self) -> String {
        let mut out = String::new();
        for script in &self.scripts {
            let results = script.report.results();
            if script.report.is_green() {
                let _ = writeln!(out, "ok    {} ({} assertions)", script.name, results.len());
                continue;
            }
            let failed = script
                .report
                .failures()
                .filter(|r| r.kind == ResultKind::Assertion)
                .count();
            let _ = writeln!(
                out,
                "FAIL  {} ({} assertions, {failed} failed)",
                script.name,
                results.len()
            );
            for result in script.report.failures() {
                let marker = match result.kind {
                    ResultKind::Assertion => '-',
                    ResultKind::Runner => '!',
                };
                let _ = writeln!(out, "      {marker} {}", result.diagnostic());
            }
        }
        for skipped in &self.skipped {
            let _ = writeln!(out, "skip  {} (tag {})", skipped.name, skipped.tag);
        }
        let _ = writeln!(
            out,
            "{} scripts, {} passed, {} failed, {} skipped",
            self.scripts.len() + self.skipped.len(),
            self.scripts.len() - self.failed(),
            self.failed(),
            self.skipped.len()
        );
        out
    }

    pub fn to_json(&self) -> serde_json::Result<String> {
        let suite = JsonSuite {
            green: self.is_green(),
            scripts: self
                .scripts
                .iter()
                .map(|s| JsonScript {
                    name: &s.name,
                    tags: &s.tags,
                    green: s.report.is_green(),
                    results: s.report.results(),
                })
                .collect(),
            skipped: self.skipped.iter().map(|s| s.name.as_str()).collect(),
        };
        serde_json::to_string_pretty(&suite)
    }
}
