mod compare;
mod eval;
mod expression;
pub mod mutation;
mod parse_filter;

pub use compare::{compare_values, documents_equal, values_equal};
pub use eval::{lookup, matches};
pub use expression::Expression;
pub use mutation::{FieldMutation, MutationOp, Update, UpdateError, UpdateErrorKind, parse_update};
pub use parse_filter::{FilterParseError, parse_filter};
