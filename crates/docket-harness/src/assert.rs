use bson::Bson;
use docket_query::values_equal;

use crate::report::{AssertionResult, ResultKind, TestReport};

impl TestReport {
    /// Passes iff `condition` holds. `message` is recorded verbatim.
    pub fn assert_true(&mut self, condition: bool, message: impl Into<String>) -> &AssertionResult {
        self.push(AssertionResult {
            pass: condition,
            kind: ResultKind::Assertion,
            message: message.into(),
            expected: None,
            actual: None,
        })
    }

    /// Passes iff the values are deeply equal. Both values are kept so a
    /// failure can show them.
    pub fn assert_eq(
        &mut self,
        expected: &Bson,
        actual: &Bson,
        message: impl Into<String>,
    ) -> &AssertionResult {
        self.push(AssertionResult {
            pass: values_equal(expected, actual),
            kind: ResultKind::Assertion,
            message: message.into(),
            expected: Some(expected.clone()),
            actual: Some(actual.clone()),
        })
    }

    pub fn assert_neq(
        &mut self,
        unexpected: &Bson,
        actual: &Bson,
        message: impl Into<String>,
    ) -> &AssertionResult {
        self.push(AssertionResult {
            pass: !values_equal(unexpected, actual),
            kind: ResultKind::Assertion,
            message: message.into(),
            expected: Some(unexpected.clone()),
            actual: Some(actual.clone()),
        })
    }
}
