use bson::Bson;
use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ResultKind {
    /// Recorded by an assertion call in the script.
    Assertion,
    /// The script aborted: parse error, runtime error or client failure.
    Runner,
}

/// One recorded assertion. Immutable once pushed onto a [`TestReport`].
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AssertionResult {
    pub pass: bool,
    pub kind: ResultKind,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub expected: Option<Bson>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub actual: Option<Bson>,
}

impl AssertionResult {
    /// Human-readable line including both values when a comparison failed.
    pub fn diagnostic(&self) -> String {
        match (&self.expected, &self.actual) {
            (Some(expected), Some(actual)) if !self.pass => {
                format!("{}: expected {expected}, got {actual}", self.message)
            }
            _ => self.message.clone(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Verdict {
    Pass,
    Fail,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunState {
    Idle,
    Running,
    Completed(Verdict),
}

/// Results of one script execution, in the order they were recorded.
///
/// A report is owned by the run that fills it; assertions are methods on it
/// rather than process-wide counters.
#[derive(Debug, Clone)]
pub struct TestReport {
    results: Vec<AssertionResult>,
    state: RunState,
}

impl Default for TestReport {
    fn default() -> Self {
        Self::new()
    }
}

impl TestReport {
    pub fn new() -> Self {
        Self {
            results: Vec::new(),
            state: RunState::Idle,
        }
    }

    pub fn state(&self) -> RunState {
        self.state
    }

    pub fn results(&self) -> &[AssertionResult] {
        &self.results
    }

    pub fn failures(&self) -> impl Iterator<Item = &AssertionResult> {
        self.results.iter().filter(|r| !r.pass)
    }

    /// Green iff every result passed. A runner error is a failed result, so
    /// an aborted run is never green.
    pub fn is_green(&self) -> bool {
        self.results.iter().all(|r| r.pass)
    }

    pub fn runner_error(&self) -> Option<&AssertionResult> {
        self.results.iter().find(|r| r.kind == ResultKind::Runner)
    }

    /// Idle → Running. Starting twice is a no-op.
    pub fn start(&mut self) {
        if self.state == RunState::Idle {
            self.state = RunState::Running;
        }
    }

    /// Running → Completed, fixing the verdict.
    pub fn finish(&mut self) -> Verdict {
        if let RunState::Completed(verdict) = self.state {
            return verdict;
        }
        let verdict = if self.is_green() {
            Verdict::Pass
        } else {
            Verdict::Fail
        };
        self.state = RunState::Completed(verdict);
        verdict
    }

    /// Record the error that aborted the script.
    pub fn record_runner_error(&mut self, message: impl Into<String>) -> &AssertionResult {
        self.push(AssertionResult {
            pass: false,
            kind: ResultKind::Runner,
            message: message.into(),
            expected: None,
            actual: None,
        })
    }

    pub(crate) fn push(&mut self, result: AssertionResult) -> &AssertionResult {
        self.results.push(result);
        &self.results[self.results.len() - 1]
    }
}
