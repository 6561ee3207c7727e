use bson::Bson;
use regex::Regex;

/// A recursive filter expression tree.
///
/// Owns field names and values so the expression can outlive the filter
/// document it was parsed from. Field names may be dotted paths.
#[derive(Debug, Clone)]
pub enum Expression {
    // Logical. An empty `And` matches every document.
    And(Vec<Expression>),
    Or(Vec<Expression>),
    // Comparison
    Eq(String, Bson),
    Ne(String, Bson),
    Gt(String, Bson),
    Gte(String, Bson),
    Lt(String, Bson),
    Lte(String, Bson),
    In(String, Vec<Bson>),
    // Pattern
    Regex(String, Regex),
    // Existence
    Exists(String, bool),
}

impl Expression {
    /// The expression an empty filter document parses to.
    pub fn match_all() -> Self {
        Expression::And(Vec::new())
    }
}
