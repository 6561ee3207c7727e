use bson::Bson;

use crate::script::ast::{BinaryOp, Expr, Statement, StmtKind, UnaryOp};
use crate::script::error::ParseError;
use crate::script::lexer::{Tok, Token, tokenize};

/// Parse a whole script into statements.
pub fn parse(source: &str) -> Result<Vec<Statement>, ParseError> {
    let tokens = tokenize(source)?;
    let mut parser = Parser { tokens, pos: 0 };
    let mut statements = Vec::new();
    while !parser.at_eof() {
        if parser.eat(";") {
            continue;
        }
        statements.push(parser.statement()?);
    }
    Ok(statements)
}

struct Parser {
    tokens: Vec<Token>,
    pos: usize,
}

impl Parser {
    fn peek(&self) -> &Tok {
        &self.tokens[self.pos].tok
    }

    fn line(&self) -> usize {
        self.tokens[self.pos].line
    }

    fn at_eof(&self) -> bool {
        matches!(self.peek(), Tok::Eof)
    }

    fn advance(&mut self) -> Tok {
        let tok = self.tokens[self.pos].tok.clone();
        if !matches!(tok, Tok::Eof) {
            self.pos += 1;
        }
        tok
    }

    fn check(&self, punct: &str) -> bool {
        matches!(self.peek(), Tok::Punct(p) if *p == punct)
    }

    fn eat(&mut self, punct: &str) -> bool {
        if self.check(punct) {
            self.pos += 1;
            true
        } else {
            false
        }
    }

    fn expect(&mut self, punct: &str) -> Result<(), ParseError> {
        if self.eat(punct) {
            Ok(())
        } else {
            Err(self.unexpected(&format!("'{punct}'")))
        }
    }

    fn unexpected(&self, wanted: &str) -> ParseError {
        let found = match self.peek() {
            Tok::Int(text) => text.clone(),
            Tok::Float(n) => n.to_string(),
            Tok::Str(s) => format!("'{s}'"),
            Tok::Ident(name) => name.clone(),
            Tok::Punct(p) => format!("'{p}'"),
            Tok::Eof => "end of input".to_string(),
        };
        ParseError::new(self.line(), format!("expected {wanted}, found {found}"))
    }

    fn ident(&mut self) -> Result<String, ParseError> {
        match self.peek() {
            Tok::Ident(name) => {
                let name = name.clone();
                self.pos += 1;
                Ok(name)
            }
            _ => Err(self.unexpected("identifier")),
        }
    }

    // ── Statements ──────────────────────────────────────────────

    fn statement(&mut self) -> Result<Statement, ParseError> {
        let line = self.line();
        let kind = match self.peek() {
            Tok::Ident(kw) if matches!(kw.as_str(), "var" | "let" | "const") => {
                self.pos += 1;
                let name = self.ident()?;
                let init = if self.eat("=") {
                    Some(self.expression()?)
                } else {
                    None
                };
                StmtKind::Declare { name, init }
            }
            Tok::Ident(kw) if kw == "delete" => {
                self.pos += 1;
                let target = self.expression()?;
                if !matches!(target, Expr::Member(..) | Expr::Index(..)) {
                    return Err(ParseError::new(line, "delete needs a property reference"));
                }
                StmtKind::Delete(target)
            }
            _ => {
                let expr = self.expression()?;
                if self.eat("=") {
                    if !matches!(expr, Expr::Ident(_) | Expr::Member(..) | Expr::Index(..)) {
                        return Err(ParseError::new(line, "invalid assignment target"));
                    }
                    let value = self.expression()?;
                    StmtKind::Assign {
                        target: expr,
                        value,
                    }
                } else {
                    StmtKind::Expr(expr)
                }
            }
        };
        // Semicolons are optional; a statement otherwise ends at a newline.
        if !self.eat(";") && !self.at_eof() && self.line() == line && !self.check("}") {
            return Err(self.unexpected("';' or newline"));
        }
        Ok(Statement { line, kind })
    }

    // ── Expressions, lowest precedence first ────────────────────

    fn expression(&mut self) -> Result<Expr, ParseError> {
        self.or()
    }

    fn or(&mut self) -> Result<Expr, ParseError> {
        let mut left = self.and()?;
        while self.eat("||") {
            let right = self.and()?;
            left = Expr::Binary(BinaryOp::Or, Box::new(left), Box::new(right));
        }
        Ok(left)
    }

    fn and(&mut self) -> Result<Expr, ParseError> {
        let mut left = self.equality()?;
        while self.eat("&&") {
            let right = self.equality()?;
            left = Expr::Binary(BinaryOp::And, Box::new(left), Box::new(right));
        }
        Ok(left)
    }

    fn equality(&mut self) -> Result<Expr, ParseError> {
        let mut left = self.comparison()?;
        loop {
            let op = if self.eat("===") {
                BinaryOp::StrictEq
            } else if self.eat("!==") {
                BinaryOp::StrictNe
            } else if self.eat("==") {
                BinaryOp::LooseEq
            } else if self.eat("!=") {
                BinaryOp::LooseNe
            } else {
                return Ok(left);
            };
            let right = self.comparison()?;
            left = Expr::Binary(op, Box::new(left), Box::new(right));
        }
    }

    fn comparison(&mut self) -> Result<Expr, ParseError> {
        let mut left = self.additive()?;
        loop {
            let op = if self.eat("<=") {
                BinaryOp::Le
            } else if self.eat(">=") {
                BinaryOp::Ge
            } else if self.eat("<") {
                BinaryOp::Lt
            } else if self.eat(">") {
                BinaryOp::Gt
            } else {
                return Ok(left);
            };
            let right = self.additive()?;
            left = Expr::Binary(op, Box::new(left), Box::new(right));
        }
    }

    fn additive(&mut self) -> Result<Expr, ParseError> {
        let mut left = self.unary()?;
        loop {
            let op = if self.eat("+") {
                BinaryOp::Add
            } else if self.eat("-") {
                BinaryOp::Sub
            } else {
                return Ok(left);
            };
            let right = self.unary()?;
            left = Expr::Binary(op, Box::new(left), Box::new(right));
        }
    }

    fn unary(&mut self) -> Result<Expr, ParseError> {
        if self.eat("!") {
            return Ok(Expr::Unary(UnaryOp::Not, Box::new(self.unary()?)));
        }
        if self.eat("-") {
            return Ok(Expr::Unary(UnaryOp::Neg, Box::new(self.unary()?)));
        }
        self.postfix()
    }

    fn postfix(&mut self) -> Result<Expr, ParseError> {
        let mut expr = self.primary()?;
        loop {
            if self.eat(".") {
                let name = self.ident()?;
                expr = Expr::Member(Box::new(expr), name);
            } else if self.eat("[") {
                let index = self.expression()?;
                self.expect("]")?;
                expr = Expr::Index(Box::new(expr), Box::new(index));
            } else if self.eat("(") {
                let args = self.list(")")?;
                expr = Expr::Call(Box::new(expr), args);
            } else {
                return Ok(expr);
            }
        }
    }

    /// Comma-separated expressions up to `close`; a trailing comma is allowed.
    fn list(&mut self, close: &str) -> Result<Vec<Expr>, ParseError> {
        let mut items = Vec::new();
        while !self.eat(close) {
            items.push(self.expression()?);
            if !self.eat(",") {
                self.expect(close)?;
                break;
            }
        }
        Ok(items)
    }

    fn primary(&mut self) -> Result<Expr, ParseError> {
        let line = self.line();
        match self.advance() {
            Tok::Int(text) => Ok(Expr::Literal(integer(&text, line)?)),
            Tok::Float(n) => Ok(Expr::Literal(Bson::Double(n))),
            Tok::Str(s) => Ok(Expr::Literal(Bson::String(s))),
            Tok::Ident(name) => Ok(match name.as_str() {
                "true" => Expr::Literal(Bson::Boolean(true)),
                "false" => Expr::Literal(Bson::Boolean(false)),
                "null" => Expr::Literal(Bson::Null),
                "undefined" => Expr::Literal(Bson::Undefined),
                _ => Expr::Ident(name),
            }),
            Tok::Punct("(") => {
                let expr = self.expression()?;
                self.expect(")")?;
                Ok(expr)
            }
            Tok::Punct("[") => Ok(Expr::Array(self.list("]")?)),
            Tok::Punct("{") => self.object(),
            _ => {
                self.pos = self.pos.saturating_sub(1);
                Err(self.unexpected("expression"))
            }
        }
    }

    fn object(&mut self) -> Result<Expr, ParseError> {
        let mut fields = Vec::new();
        while !self.eat("}") {
            let key = match self.advance() {
                Tok::Ident(name) => name,
                Tok::Str(s) => s,
                Tok::Int(text) => text,
                _ => {
                    self.pos = self.pos.saturating_sub(1);
                    return Err(self.unexpected("property name"));
                }
            };
            self.expect(":")?;
            fields.push((key, self.expression()?));
            if !self.eat(",") {
                self.expect("}")?;
                break;
            }
        }
        Ok(Expr::Object(fields))
    }
}

/// Integer literals are Int32 when they fit, Int64 otherwise, and Double
/// beyond that.
fn integer(text: &str, line: usize) -> Result<Bson, ParseError> {
    if let Ok(n) = text.parse::<i64>() {
        return Ok(match i32::try_from(n) {
            Ok(small) => Bson::Int32(small),
            Err(_) => Bson::Int64(n),
        });
    }
    text.parse::<f64>()
        .map(Bson::Double)
        .map_err(|_| ParseError::new(line, format!("invalid number '{text}'")))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn expr(source: &str) -> Expr {
        match parse(source).unwrap().remove(0).kind {
            StmtKind::Expr(e) => e,
            other => panic!("expected expression statement, got {other:?}"),
        }
    }

    #[test]
    fn parses_the_classic_script() {
        let source = r#"
            t = db.basic1;
            t.drop();
            o = { a : 1 };
            t.insertOne( o );
            assert.eq( 1 , t.findOne().a , "first" );
            assert( o._id , "now had id" );
            delete o._id;
            o.a = 2;
            assert(db.currentOp().inprog != null);
        "#;
        let statements = parse(source).unwrap();
        assert_eq!(statements.len(), 9);
        assert!(matches!(statements[0].kind, StmtKind::Assign { .. }));
        assert!(matches!(statements[6].kind, StmtKind::Delete(_)));
        assert_eq!(statements[0].line, 2);
    }

    #[test]
    fn integer_literal_widths() {
        assert_eq!(expr("1"), Expr::Literal(Bson::Int32(1)));
        assert_eq!(expr("3000000000"), Expr::Literal(Bson::Int64(3_000_000_000)));
        assert_eq!(expr("1.5"), Expr::Literal(Bson::Double(1.5)));
    }

    #[test]
    fn object_keys_may_be_operators_or_quoted() {
        let e = expr(r#"({ $set: { "a.b": 2 }, })"#);
        let Expr::Object(fields) = e else {
            panic!("expected object");
        };
        assert_eq!(fields[0].0, "$set");
        assert!(matches!(&fields[0].1, Expr::Object(inner) if inner[0].0 == "a.b"));
    }

    #[test]
    fn precedence_binds_comparison_tighter_than_logic() {
        let e = expr("a < 1 && b == 2 || c");
        let Expr::Binary(BinaryOp::Or, left, _) = e else {
            panic!("expected ||");
        };
        assert!(matches!(*left, Expr::Binary(BinaryOp::And, ..)));
    }

    #[test]
    fn declarations_and_semicolon_free_lines() {
        let statements = parse("var x = 1\nlet y\nconst z = x").unwrap();
        assert_eq!(statements.len(), 3);
        assert!(matches!(
            &statements[1].kind,
            StmtKind::Declare { name, init: None } if name == "y"
        ));
    }

    #[test]
    fn two_statements_on_one_line_need_a_semicolon() {
        let err = parse("a = 1 b = 2").unwrap_err();
        assert_eq!(err.line, 1);
    }

    #[test]
    fn invalid_assignment_target() {
        assert!(parse("f() = 1").is_err());
        assert!(parse("delete x").is_err());
    }

    #[test]
    fn error_reports_line() {
        let err = parse("a = 1;\nb = ;").unwrap_err();
        assert_eq!(err.line, 2);
        assert!(err.to_string().contains("SyntaxError"));
    }
}
