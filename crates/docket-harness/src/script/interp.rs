use std::cmp::Ordering;
use std::collections::HashMap;

use bson::oid::ObjectId;
use bson::{Bson, Document, doc};
use docket_client::{ClientError, Database, DocumentClient};
use docket_query::{compare_values, values_equal};
use tracing::info;

use crate::report::TestReport;
use crate::script::ast::{BinaryOp, Expr, Statement, StmtKind, UnaryOp};
use crate::script::error::{Fault, ScriptError};
use crate::script::parser::parse;
use crate::script::value::{Builtin, Value, count_value};

enum Segment {
    Key(String),
    Pos(usize),
}

/// Executes scripts against one database, recording assertions into a report.
pub struct Interpreter<'c, 'r, C: DocumentClient + ?Sized> {
    db: Database<'c, C>,
    report: &'r mut TestReport,
    vars: HashMap<String, Value>,
}

impl<'c, 'r, C: DocumentClient + ?Sized> Interpreter<'c, 'r, C> {
    pub fn new(db: Database<'c, C>, report: &'r mut TestReport) -> Self {
        Self {
            db,
            report,
            vars: HashMap::new(),
        }
    }

    /// Parse and execute `source`. Stops at the first error; assertion
    /// failures are not errors.
    pub fn run(&mut self, source: &str) -> Result<(), ScriptError> {
        let statements = parse(source)?;
        self.execute(&statements)
    }

    pub fn execute(&mut self, statements: &[Statement]) -> Result<(), ScriptError> {
        for statement in statements {
            self.statement(statement)
                .map_err(|fault| ScriptError::Runtime {
                    line: statement.line,
                    fault,
                })?;
        }
        Ok(())
    }

    /// Current binding of a script variable.
    pub fn var(&self, name: &str) -> Option<&Value> {
        self.vars.get(name)
    }

    fn statement(&mut self, statement: &Statement) -> Result<(), Fault> {
        match &statement.kind {
            StmtKind::Declare { name, init } => {
                let value = match init {
                    Some(expr) => self.eval(expr)?,
                    None => Value::undefined(),
                };
                self.vars.insert(name.clone(), value);
            }
            StmtKind::Assign { target, value } => {
                let value = self.eval(value)?;
                match target {
                    Expr::Ident(name) => {
                        self.vars.insert(name.clone(), value);
                    }
                    _ => self.assign_path(target, value.into_bson()?)?,
                }
            }
            StmtKind::Delete(target) => self.delete_path(target)?,
            StmtKind::Expr(expr) => {
                self.eval(expr)?;
            }
        }
        Ok(())
    }

    // ── Expressions ─────────────────────────────────────────────

    fn eval(&mut self, expr: &Expr) -> Result<Value, Fault> {
        match expr {
            Expr::Literal(b) => Ok(Value::Bson(b.clone())),
            Expr::Ident(name) => self.lookup(name),
            Expr::Object(fields) => {
                let mut doc = Document::new();
                for (key, field) in fields {
                    let value = self.eval(field)?.into_bson()?;
                    doc.insert(key.clone(), value);
                }
                Ok(doc.into())
            }
            Expr::Array(items) => {
                let mut values = Vec::with_capacity(items.len());
                for item in items {
                    values.push(self.eval(item)?.into_bson()?);
                }
                Ok(Value::Bson(Bson::Array(values)))
            }
            Expr::Member(base, name) => {
                let base = self.eval(base)?;
                member(base, name)
            }
            Expr::Index(base, index) => {
                let base = self.eval(base)?;
                match self.eval(index)? {
                    Value::Bson(Bson::String(key)) => member(base, &key),
                    Value::Bson(n) => match (base, index_of(&n)) {
                        (Value::Bson(Bson::Array(items)), Some(i)) => Ok(items
                            .into_iter()
                            .nth(i)
                            .map(Value::Bson)
                            .unwrap_or_else(Value::undefined)),
                        (base, _) => member(base, &Value::Bson(n).display()),
                    },
                    other => Err(Fault::Type(format!(
                        "cannot index with a {}",
                        other.type_name()
                    ))),
                }
            }
            Expr::Call(callee, args) => self.call(callee, args),
            Expr::Unary(op, operand) => {
                let value = self.eval(operand)?;
                Ok(match op {
                    UnaryOp::Not => Value::Bson(Bson::Boolean(!value.truthy())),
                    UnaryOp::Neg => Value::Bson(negate(&value)),
                })
            }
            Expr::Binary(BinaryOp::And, left, right) => {
                let left = self.eval(left)?;
                if left.truthy() {
                    self.eval(right)
                } else {
                    Ok(left)
                }
            }
            Expr::Binary(BinaryOp::Or, left, right) => {
                let left = self.eval(left)?;
                if left.truthy() {
                    Ok(left)
                } else {
                    self.eval(right)
                }
            }
            Expr::Binary(op, left, right) => {
                let left = self.eval(left)?;
                let right = self.eval(right)?;
                binary(*op, &left, &right)
            }
        }
    }

    fn lookup(&self, name: &str) -> Result<Value, Fault> {
        if let Some(value) = self.vars.get(name) {
            return Ok(value.clone());
        }
        match name {
            "db" => Ok(Value::Db),
            "assert" => Ok(Value::Assert),
            "ObjectId" => Ok(Value::Builtin(Builtin::ObjectId)),
            "NumberInt" => Ok(Value::Builtin(Builtin::NumberInt)),
            "NumberLong" => Ok(Value::Builtin(Builtin::NumberLong)),
            "print" => Ok(Value::Builtin(Builtin::Print)),
            _ => Err(Fault::Reference(name.to_string())),
        }
    }

    fn eval_args(&mut self, args: &[Expr]) -> Result<Vec<Value>, Fault> {
        args.iter().map(|arg| self.eval(arg)).collect()
    }

    // ── Calls ───────────────────────────────────────────────────

    fn call(&mut self, callee: &Expr, args: &[Expr]) -> Result<Value, Fault> {
        if let Expr::Member(base, method) = callee {
            let target = self.eval(base)?;
            let values = self.eval_args(args)?;
            return match target {
                Value::Db => self.db_method(method, values),
                Value::Collection(name) => self.collection_method(&name, method, values, args),
                Value::Assert => self.assert_method(method, values),
                Value::Bson(Bson::Array(items)) if method == "toArray" => {
                    Ok(Value::Bson(Bson::Array(items)))
                }
                Value::Bson(Bson::ObjectId(oid))
                    if matches!(method.as_str(), "toString" | "toHexString" | "valueOf") =>
                {
                    Ok(Value::Bson(Bson::String(oid.to_hex())))
                }
                other => Err(Fault::Type(format!(
                    "{}.{method} is not a function",
                    other.type_name()
                ))),
            };
        }

        let function = self.eval(callee)?;
        let values = self.eval_args(args)?;
        match function {
            Value::Assert => {
                let mut values = values.into_iter();
                let condition = values.next().unwrap_or_else(Value::undefined);
                let message = message_arg(values.next(), "assert failed");
                self.report.assert_true(condition.truthy(), message);
                Ok(Value::undefined())
            }
            Value::Builtin(builtin) => call_builtin(builtin, values),
            other => Err(Fault::Type(format!("{} is not a function", other.type_name()))),
        }
    }

    fn assert_method(&mut self, method: &str, values: Vec<Value>) -> Result<Value, Fault> {
        let mut values = values.into_iter();
        let mut next = || values.next().unwrap_or_else(Value::undefined);
        match method {
            "eq" | "neq" => {
                let expected = next().into_bson()?;
                let actual = next().into_bson()?;
                let message = message_arg(Some(next()), &format!("assert.{method} failed"));
                if method == "eq" {
                    self.report.assert_eq(&expected, &actual, message);
                } else {
                    self.report.assert_neq(&expected, &actual, message);
                }
            }
            "writeOK" | "writeError" => {
                let result = next().into_bson()?;
                let write_error = match &result {
                    Bson::Document(d) => d.get_document("writeError").ok().cloned(),
                    _ => None,
                };
                let expect_error = method == "writeError";
                let default = match (&write_error, expect_error) {
                    (Some(e), false) => format!(
                        "write failed: {}",
                        e.get_str("errmsg").unwrap_or("unknown error")
                    ),
                    (None, true) => "expected a write error".to_string(),
                    _ => format!("assert.{method}"),
                };
                let message = message_arg(Some(next()), &default);
                self.report
                    .assert_true(write_error.is_some() == expect_error, message);
            }
            _ => return Err(Fault::Type(format!("assert.{method} is not a function"))),
        }
        Ok(Value::undefined())
    }

    fn db_method(&mut self, method: &str, values: Vec<Value>) -> Result<Value, Fault> {
        match method {
            "getCollection" => match values.into_iter().next() {
                Some(Value::Bson(Bson::String(name))) if !name.is_empty() => {
                    Ok(Value::Collection(name))
                }
                _ => Err(Fault::Type(
                    "getCollection needs a non-empty collection name".into(),
                )),
            },
            "getName" => Ok(Value::Bson(Bson::String(self.db.name().to_string()))),
            "currentOp" => Ok(self.db.current_op()?.to_document().into()),
            "dropDatabase" => {
                self.db.drop_database()?;
                Ok(doc! { "dropped": self.db.name(), "ok": 1.0 }.into())
            }
            "getCollectionNames" => {
                let names = self.db.list_collections()?;
                Ok(Value::Bson(Bson::Array(
                    names.into_iter().map(Bson::String).collect(),
                )))
            }
            _ => Err(Fault::Type(format!("db.{method} is not a function"))),
        }
    }

    fn collection_method(
        &mut self,
        name: &str,
        method: &str,
        values: Vec<Value>,
        args: &[Expr],
    ) -> Result<Value, Fault> {
        let coll = self.db.get_collection(name);
        let mut values = values.into_iter();
        let mut next = || values.next().unwrap_or_else(Value::undefined);

        match method {
            "drop" => {
                coll.drop()?;
                Ok(Value::Bson(Bson::Boolean(true)))
            }
            "insertOne" => {
                let doc = next().into_document("document")?;
                let result = coll.insert_one(doc.clone())?;
                self.write_back(args.first(), with_id(doc, &result.inserted_id));
                Ok(doc! { "acknowledged": true, "insertedId": result.inserted_id }.into())
            }
            "insert" => {
                let docs = match next().into_bson()? {
                    Bson::Document(doc) => vec![doc],
                    Bson::Array(items) => items
                        .into_iter()
                        .map(|item| Value::Bson(item).into_document("document"))
                        .collect::<Result<_, _>>()?,
                    other => {
                        return Err(Fault::Type(format!(
                            "insert needs a document, got {}",
                            Value::Bson(other).type_name()
                        )));
                    }
                };
                let single = docs.len() == 1;
                let mut inserted = 0;
                for doc in docs {
                    match coll.insert_one(doc.clone()) {
                        Ok(result) => {
                            inserted += 1;
                            if single {
                                self.write_back(args.first(), with_id(doc, &result.inserted_id));
                            }
                        }
                        Err(ClientError::Store(e)) => {
                            return Ok(doc! {
                                "nInserted": inserted,
                                "writeError": { "code": e.code().code(), "errmsg": e.message() },
                            }
                            .into());
                        }
                        Err(e) => return Err(e.into()),
                    }
                }
                Ok(doc! { "nInserted": inserted }.into())
            }
            "findOne" => {
                let filter = filter_arg(next())?;
                Ok(match coll.find_one(filter.as_ref())? {
                    Some(doc) => doc.into(),
                    None => Value::Bson(Bson::Null),
                })
            }
            "find" => {
                let filter = filter_arg(next())?;
                let docs = coll.find(filter.as_ref())?;
                Ok(Value::Bson(Bson::Array(
                    docs.into_iter().map(Bson::Document).collect(),
                )))
            }
            "countDocuments" | "count" => {
                let filter = filter_arg(next())?;
                Ok(Value::Bson(count_value(coll.count_documents(filter.as_ref())?)))
            }
            "updateOne" | "replaceOne" => {
                let filter = filter_arg(next())?.unwrap_or_default();
                let update = next().into_document("update")?;
                let result = if method == "updateOne" {
                    coll.update_one(&filter, &update)?
                } else {
                    coll.replace_one(&filter, update)?
                };
                Ok(doc! {
                    "acknowledged": true,
                    "matchedCount": count_value(result.matched_count),
                    "modifiedCount": count_value(result.modified_count),
                }
                .into())
            }
            "update" => {
                let filter = filter_arg(next())?.unwrap_or_default();
                let update = next().into_document("update")?;
                match coll.update_one(&filter, &update) {
                    Ok(result) => Ok(doc! {
                        "nMatched": count_value(result.matched_count),
                        "nUpserted": 0,
                        "nModified": count_value(result.modified_count),
                    }
                    .into()),
                    Err(ClientError::Store(e)) => Ok(doc! {
                        "nMatched": 0,
                        "nUpserted": 0,
                        "nModified": 0,
                        "writeError": { "code": e.code().code(), "errmsg": e.message() },
                    }
                    .into()),
                    Err(e) => Err(e.into()),
                }
            }
            "getName" => Ok(Value::Bson(Bson::String(coll.name().to_string()))),
            "getFullName" => Ok(Value::Bson(Bson::String(coll.namespace().to_string()))),
            _ => Err(Fault::Type(format!("{name}.{method} is not a function"))),
        }
    }

    /// `insertOne(x)` on a bare variable rebinds `x` to the stored document,
    /// so the script observes the assigned `_id`.
    fn write_back(&mut self, arg: Option<&Expr>, stored: Document) {
        if let Some(Expr::Ident(name)) = arg {
            if self.vars.contains_key(name) {
                self.vars.insert(name.clone(), stored.into());
            }
        }
    }

    // ── Property assignment ─────────────────────────────────────

    fn path(&mut self, target: &Expr) -> Result<(String, Vec<Segment>), Fault> {
        let mut segments = Vec::new();
        let mut current = target;
        loop {
            match current {
                Expr::Member(base, name) => {
                    segments.push(Segment::Key(name.clone()));
                    current = base;
                }
                Expr::Index(base, index) => {
                    let segment = match self.eval(index)? {
                        Value::Bson(Bson::String(key)) => Segment::Key(key),
                        Value::Bson(n) => match index_of(&n) {
                            Some(i) => Segment::Pos(i),
                            None => Segment::Key(Value::Bson(n).display()),
                        },
                        other => {
                            return Err(Fault::Type(format!(
                                "cannot index with a {}",
                                other.type_name()
                            )));
                        }
                    };
                    segments.push(segment);
                    current = base;
                }
                Expr::Ident(name) => {
                    segments.reverse();
                    return Ok((name.clone(), segments));
                }
                _ => return Err(Fault::Type("invalid assignment target".into())),
            }
        }
    }

    /// The value holding the last segment of `target`.
    fn parent_mut(&mut self, target: &Expr) -> Result<(&mut Bson, Segment), Fault> {
        let (root, mut segments) = self.path(target)?;
        let Some(last) = segments.pop() else {
            return Err(Fault::Type("invalid assignment target".into()));
        };
        let mut current = match self.vars.get_mut(&root) {
            Some(Value::Bson(b)) => b,
            Some(other) => {
                return Err(Fault::Type(format!(
                    "cannot set properties of a {}",
                    other.type_name()
                )));
            }
            None => return Err(Fault::Reference(root)),
        };
        for segment in segments {
            let child = match (current, &segment) {
                (Bson::Document(doc), Segment::Key(key)) => doc.get_mut(key),
                (Bson::Array(items), Segment::Pos(i)) => items.get_mut(*i),
                _ => None,
            };
            current = child.ok_or_else(|| {
                Fault::Type("cannot set properties of undefined".to_string())
            })?;
        }
        if matches!(current, Bson::Null | Bson::Undefined) {
            return Err(Fault::Type(format!(
                "cannot set properties of {}",
                Value::Bson(current.clone()).display()
            )));
        }
        Ok((current, last))
    }

    fn assign_path(&mut self, target: &Expr, value: Bson) -> Result<(), Fault> {
        let (parent, last) = self.parent_mut(target)?;
        match (parent, last) {
            (Bson::Document(doc), Segment::Key(key)) => {
                doc.insert(key, value);
            }
            (Bson::Document(doc), Segment::Pos(i)) => {
                doc.insert(i.to_string(), value);
            }
            // Arrays grow by at most one element per assignment.
            (Bson::Array(items), Segment::Pos(i)) => {
                let len = items.len();
                match items.get_mut(i) {
                    Some(slot) => *slot = value,
                    None if i == len => items.push(value),
                    None => {
                        return Err(Fault::Type(format!(
                            "index {i} is past the end of an array of length {len}"
                        )));
                    }
                }
            }
            // Assigning a property of a scalar has no effect.
            _ => {}
        }
        Ok(())
    }

    fn delete_path(&mut self, target: &Expr) -> Result<(), Fault> {
        let (parent, last) = self.parent_mut(target)?;
        match (parent, last) {
            (Bson::Document(doc), Segment::Key(key)) => {
                doc.remove(&key);
            }
            (Bson::Array(items), Segment::Pos(i)) => {
                if let Some(slot) = items.get_mut(i) {
                    *slot = Bson::Undefined;
                }
            }
            _ => {}
        }
        Ok(())
    }
}

fn member(base: Value, name: &str) -> Result<Value, Fault> {
    match base {
        Value::Db => Ok(Value::Collection(name.to_string())),
        // `db.a.b` names the collection "a.b", as in the shell.
        Value::Collection(coll) => Ok(Value::Collection(format!("{coll}.{name}"))),
        Value::Bson(b) => match (b, name) {
            (nullish @ (Bson::Null | Bson::Undefined), _) => Err(Fault::Type(format!(
                "cannot read property '{name}' of {}",
                Value::Bson(nullish).display()
            ))),
            (Bson::Document(mut doc), _) => {
                Ok(doc.remove(name).map(Value::Bson).unwrap_or_else(Value::undefined))
            }
            (Bson::ObjectId(oid), "str") => Ok(Value::Bson(Bson::String(oid.to_hex()))),
            (Bson::Array(items), "length") => Ok(Value::Bson(count_value(items.len() as u64))),
            (Bson::String(s), "length") => {
                Ok(Value::Bson(count_value(s.chars().count() as u64)))
            }
            _ => Ok(Value::undefined()),
        },
        other => Err(Fault::Type(format!(
            "{}.{name} must be called",
            other.display()
        ))),
    }
}

fn call_builtin(builtin: Builtin, values: Vec<Value>) -> Result<Value, Fault> {
    let first = values.first().cloned().unwrap_or_else(Value::undefined);
    match builtin {
        Builtin::ObjectId => match first {
            Value::Bson(Bson::Undefined) => Ok(Value::Bson(Bson::ObjectId(ObjectId::new()))),
            Value::Bson(Bson::String(hex)) => ObjectId::parse_str(&hex)
                .map(|oid| Value::Bson(Bson::ObjectId(oid)))
                .map_err(|_| Fault::Type(format!("invalid ObjectId hex string '{hex}'"))),
            Value::Bson(Bson::ObjectId(oid)) => Ok(Value::Bson(Bson::ObjectId(oid))),
            other => Err(Fault::Type(format!(
                "ObjectId needs a hex string, got {}",
                other.type_name()
            ))),
        },
        Builtin::NumberInt => {
            let n = to_i64(&first, "NumberInt")?;
            i32::try_from(n)
                .map(|n| Value::Bson(Bson::Int32(n)))
                .map_err(|_| Fault::Type(format!("NumberInt out of range: {n}")))
        }
        Builtin::NumberLong => Ok(Value::Bson(Bson::Int64(to_i64(&first, "NumberLong")?))),
        Builtin::Print => {
            let line: Vec<String> = values.iter().map(Value::display).collect();
            info!(target: "docket::print", "{}", line.join(" "));
            Ok(Value::undefined())
        }
    }
}

fn to_i64(value: &Value, what: &str) -> Result<i64, Fault> {
    match value {
        Value::Bson(Bson::Int32(n)) => Ok(i64::from(*n)),
        Value::Bson(Bson::Int64(n)) => Ok(*n),
        Value::Bson(Bson::Double(n)) if n.is_finite() => Ok(n.trunc() as i64),
        Value::Bson(Bson::String(s)) => s
            .trim()
            .parse::<i64>()
            .map_err(|_| Fault::Type(format!("{what} cannot parse '{s}'"))),
        other => Err(Fault::Type(format!(
            "{what} needs a number, got {}",
            other.type_name()
        ))),
    }
}

fn message_arg(value: Option<Value>, default: &str) -> String {
    match value {
        None | Some(Value::Bson(Bson::Undefined)) => default.to_string(),
        Some(v) => v.display(),
    }
}

/// Optional filter argument: absent, `null` and `undefined` match everything.
fn filter_arg(value: Value) -> Result<Option<Document>, Fault> {
    if value.is_nullish() {
        return Ok(None);
    }
    value.into_document("filter").map(Some)
}

/// The stored form of an inserted document: `_id` first.
fn with_id(mut doc: Document, id: &Bson) -> Document {
    doc.remove("_id");
    let mut stored = doc! { "_id": id.clone() };
    stored.extend(doc);
    stored
}

fn index_of(n: &Bson) -> Option<usize> {
    match n {
        Bson::Int32(i) => usize::try_from(*i).ok(),
        Bson::Int64(i) => usize::try_from(*i).ok(),
        Bson::Double(d) if d.fract() == 0.0 && *d >= 0.0 => Some(*d as usize),
        _ => None,
    }
}

fn negate(value: &Value) -> Bson {
    match value {
        Value::Bson(Bson::Int32(n)) => n
            .checked_neg()
            .map(Bson::Int32)
            .unwrap_or(Bson::Int64(-i64::from(*n))),
        Value::Bson(Bson::Int64(n)) => n
            .checked_neg()
            .map(Bson::Int64)
            .unwrap_or(Bson::Double(-(*n as f64))),
        Value::Bson(Bson::Double(n)) => Bson::Double(-n),
        _ => Bson::Double(f64::NAN),
    }
}

fn binary(op: BinaryOp, left: &Value, right: &Value) -> Result<Value, Fault> {
    let result = match op {
        BinaryOp::LooseEq => Bson::Boolean(loose_eq(left, right)),
        BinaryOp::LooseNe => Bson::Boolean(!loose_eq(left, right)),
        BinaryOp::StrictEq => Bson::Boolean(strict_eq(left, right)),
        BinaryOp::StrictNe => Bson::Boolean(!strict_eq(left, right)),
        BinaryOp::Lt => Bson::Boolean(ordering(left, right) == Some(Ordering::Less)),
        BinaryOp::Le => Bson::Boolean(matches!(
            ordering(left, right),
            Some(Ordering::Less | Ordering::Equal)
        )),
        BinaryOp::Gt => Bson::Boolean(ordering(left, right) == Some(Ordering::Greater)),
        BinaryOp::Ge => Bson::Boolean(matches!(
            ordering(left, right),
            Some(Ordering::Greater | Ordering::Equal)
        )),
        BinaryOp::Add => add(left, right),
        BinaryOp::Sub => match (left, right) {
            (Value::Bson(Bson::Int32(a)), Value::Bson(Bson::Int32(b))) => a
                .checked_sub(*b)
                .map(Bson::Int32)
                .unwrap_or(Bson::Int64(i64::from(*a) - i64::from(*b))),
            _ => match (as_number(left), as_number(right)) {
                (Some(a), Some(b)) => Bson::Double(a - b),
                _ => Bson::Double(f64::NAN),
            },
        },
        BinaryOp::And | BinaryOp::Or => {
            return Err(Fault::Type("logical operators short-circuit".into()));
        }
    };
    Ok(Value::Bson(result))
}

/// `==`: `null` and `undefined` are equal to each other and nothing else.
fn loose_eq(left: &Value, right: &Value) -> bool {
    match (left.is_nullish(), right.is_nullish()) {
        (true, true) => true,
        (true, false) | (false, true) => false,
        (false, false) => strict_eq(left, right),
    }
}

fn strict_eq(left: &Value, right: &Value) -> bool {
    match (left, right) {
        (Value::Bson(a), Value::Bson(b)) => values_equal(a, b),
        _ => left == right,
    }
}

fn ordering(left: &Value, right: &Value) -> Option<Ordering> {
    match (left, right) {
        (Value::Bson(a), Value::Bson(b)) => compare_values(a, b),
        _ => None,
    }
}

fn as_number(value: &Value) -> Option<f64> {
    match value {
        Value::Bson(Bson::Int32(n)) => Some(f64::from(*n)),
        Value::Bson(Bson::Int64(n)) => Some(*n as f64),
        Value::Bson(Bson::Double(n)) => Some(*n),
        _ => None,
    }
}

fn add(left: &Value, right: &Value) -> Bson {
    match (left, right) {
        (Value::Bson(Bson::String(_)), _) | (_, Value::Bson(Bson::String(_))) => {
            Bson::String(format!("{}{}", left.display(), right.display()))
        }
        (Value::Bson(Bson::Int32(a)), Value::Bson(Bson::Int32(b))) => a
            .checked_add(*b)
            .map(Bson::Int32)
            .unwrap_or(Bson::Int64(i64::from(*a) + i64::from(*b))),
        _ => match (as_number(left), as_number(right)) {
            (Some(a), Some(b)) => Bson::Double(a + b),
            _ => Bson::String(format!("{}{}", left.display(), right.display())),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use docket_client::LocalClient;
    use docket_store::MemoryStore;

    fn run(source: &str) -> (TestReport, Result<(), ScriptError>) {
        let client = LocalClient::new(Arc::new(MemoryStore::new()));
        let mut report = TestReport::new();
        let result = {
            let mut interp = Interpreter::new(Database::new(&client, "test"), &mut report);
            interp.run(source)
        };
        (report, result)
    }

    #[test]
    fn insert_rebinds_variable_with_id() {
        let (report, result) = run(r#"
            t = db.basic1;
            t.drop();
            o = { a: 1 };
            t.insertOne(o);
            assert(o._id, "has id");
            assert(o._id.str, "id has str");
            assert.eq(o._id, t.findOne()._id, "same id");
        "#);
        result.unwrap();
        assert!(report.is_green(), "{:?}", report.results());
        assert_eq!(report.results().len(), 3);
    }

    #[test]
    fn failed_assertions_keep_running() {
        let (report, result) = run(r#"
            assert.eq(1, 2, "first");
            assert(true, "second");
        "#);
        result.unwrap();
        assert_eq!(report.results().len(), 2);
        assert!(!report.results()[0].pass);
        assert_eq!(report.results()[0].message, "first");
        assert!(report.results()[1].pass);
    }

    #[test]
    fn update_then_find() {
        let (report, result) = run(r#"
            t = db.getCollection("c");
            t.insertOne({ a: 1 });
            var r = t.updateOne({ a: 1 }, { $set: { a: 2 } });
            assert.eq(1, r.modifiedCount);
            assert.eq(2, t.findOne().a, "second");
            assert.eq(0, t.updateOne({ a: 99 }, { $set: { a: 3 } }).matchedCount);
        "#);
        result.unwrap();
        assert!(report.is_green(), "{:?}", report.results());
    }

    #[test]
    fn duplicate_insert_aborts_the_run() {
        let (_, result) = run(r#"
            t = db.c;
            o = { a: 1 };
            t.insertOne(o);
            t.insertOne(o);
        "#);
        let err = result.unwrap_err();
        assert_eq!(err.line(), 5);
        assert!(err.to_string().contains("11000"), "{err}");
    }

    #[test]
    fn legacy_insert_reports_write_error() {
        let (report, result) = run(r#"
            t = db.c;
            t.insert({ _id: 1 });
            var res = t.insert({ _id: 1 });
            assert.writeError(res);
            assert.eq(11000, res.writeError.code);
            assert.writeOK(t.insert({ _id: 2 }));
        "#);
        result.unwrap();
        assert!(report.is_green(), "{:?}", report.results());
    }

    #[test]
    fn property_of_null_is_a_type_error() {
        let (_, result) = run("t = db.c;\nt.findOne().a;");
        match result.unwrap_err() {
            ScriptError::Runtime {
                line: 2,
                fault: Fault::Type(_),
            } => {}
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn undefined_variable_is_a_reference_error() {
        let (_, result) = run("assert(missing);");
        assert!(matches!(
            result.unwrap_err(),
            ScriptError::Runtime {
                fault: Fault::Reference(name),
                ..
            } if name == "missing"
        ));
    }

    #[test]
    fn assignment_copies_values() {
        let (report, result) = run(r#"
            o = { a: 1 };
            p = o;
            p.a = 2;
            assert.eq(1, o.a);
            delete p.a;
            assert.eq(undefined, p.a);
        "#);
        result.unwrap();
        assert!(report.is_green(), "{:?}", report.results());
    }

    #[test]
    fn array_assignment_appends_or_overwrites() {
        let (report, result) = run(r#"
            o = { a: [1] };
            o.a[0] = 5;
            o.a[1] = 6;
            assert.eq([5, 6], o.a);
        "#);
        result.unwrap();
        assert!(report.is_green(), "{:?}", report.results());
    }

    #[test]
    fn far_array_index_is_a_type_error() {
        let sources = [
            "o = [1];\no[4e18] = 2;",
            "o = { a: [1] };\no.a[1e19] = 2;",
            "o = [];\no[2] = 1;",
        ];
        for source in sources {
            match run(source).1.unwrap_err() {
                ScriptError::Runtime {
                    line: 2,
                    fault: Fault::Type(message),
                } => assert!(message.contains("past the end"), "{message}"),
                other => panic!("unexpected error: {other}"),
            }
        }
    }

    #[test]
    fn current_op_has_inprog() {
        let (report, result) = run(r#"
            assert(db.currentOp().inprog != null);
            assert(db.currentOp().inprog.length >= 1);
        "#);
        result.unwrap();
        assert!(report.is_green(), "{:?}", report.results());
    }

    #[test]
    fn builtins_build_typed_values() {
        let (report, result) = run(r#"
            assert.eq("number", "number");
            var id = ObjectId("507f1f77bcf86cd799439011");
            assert.eq("507f1f77bcf86cd799439011", id.str);
            assert.eq(NumberLong(5), NumberInt("5"));
            assert(1 + 1 === 2 && "a" + 1 == "a1");
        "#);
        result.unwrap();
        assert!(report.is_green(), "{:?}", report.results());
    }

    #[test]
    fn syntax_error_is_reported_before_running() {
        let (report, result) = run("assert(true);\nassert(;");
        assert!(matches!(result.unwrap_err(), ScriptError::Parse(_)));
        assert!(report.results().is_empty());
    }
}
