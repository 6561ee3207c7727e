//! The script language: a small mongo-shell flavoured statement language.
//!
//! Scripts are lexed and parsed up front, so a syntax error aborts the run
//! before any store call is made.

mod ast;
mod error;
mod interp;
mod lexer;
mod parser;
mod value;

pub use ast::{BinaryOp, Expr, Statement, StmtKind, UnaryOp};
pub use error::{Fault, ParseError, ScriptError};
pub use interp::Interpreter;
pub use parser::parse;
pub use value::Value;
