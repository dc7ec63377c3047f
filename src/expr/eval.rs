use super::parser::{BinaryOp, Builtin, Expr, UnaryOp};
use crate::error::{Error, Result};
use crate::value::Value;
use std::borrow::Cow;
use std::cmp::Ordering;

fn type_error(what: &str, l: &Value, r: &Value) -> Error {
    Error::Evaluation(format!(
        "cannot {what} {} and {}",
        l.type_name(),
        r.type_name()
    ))
}

/// Evaluates `expr` with `args` bound positionally. Arguments and literals
/// are borrowed, never cloned, unless an operation produces a new value.
pub(crate) fn eval<'a>(expr: &'a Expr, args: &[&'a Value]) -> Result<Cow<'a, Value>> {
    Ok(match expr {
        Expr::Literal(v) => Cow::Borrowed(v),
        Expr::Param(i) => Cow::Borrowed(args[*i]),
        Expr::List(items) => Cow::Owned(Value::List(
            items
                .iter()
                .map(|e| eval(e, args).map(Cow::into_owned))
                .collect::<Result<_>>()?,
        )),
        Expr::Unary(op, operand) => Cow::Owned(unary(*op, &*eval(operand, args)?)?),
        Expr::Binary(op, l, r) => {
            let l = eval(l, args)?;
            let r = eval(r, args)?;
            Cow::Owned(binary(*op, &l, &r)?)
        }
        Expr::And(l, r) => {
            let pass = eval(l, args)?.is_truthy() && eval(r, args)?.is_truthy();
            Cow::Owned(Value::Bool(pass))
        }
        Expr::Or(l, r) => {
            let pass = eval(l, args)?.is_truthy() || eval(r, args)?.is_truthy();
            Cow::Owned(Value::Bool(pass))
        }
        Expr::Coalesce(l, r) => {
            let l = eval(l, args)?;
            if l.is_null() {
                eval(r, args)?
            } else {
                l
            }
        }
        Expr::Conditional(cond, then, otherwise) => {
            if eval(cond, args)?.is_truthy() {
                eval(then, args)?
            } else {
                eval(otherwise, args)?
            }
        }
        Expr::Index(base, index) => {
            let base = eval(base, args)?;
            let index = eval(index, args)?;
            lookup(base, &index)?
        }
        Expr::Call(builtin, call_args) => {
            let values = call_args
                .iter()
                .map(|e| eval(e, args))
                .collect::<Result<Vec<_>>>()?;
            Cow::Owned(call(*builtin, &values)?)
        }
    })
}

enum Member<'a> {
    Borrowed(&'a Value),
    Owned(Value),
}

fn member<'a>(base: &'a Value, index: &Value) -> Result<Member<'a>> {
    Ok(match (base, index) {
        (Value::Null, _) => Member::Owned(Value::Null),
        (Value::List(items), _) => {
            let Some(i) = index.as_int() else {
                return Err(Error::Evaluation(format!(
                    "list index must be int, got {}",
                    index.type_name()
                )));
            };
            usize::try_from(i)
                .ok()
                .and_then(|i| items.get(i))
                .map_or(Member::Owned(Value::Null), Member::Borrowed)
        }
        (Value::Record(fields), Value::Str(name)) => fields
            .get(name)
            .map_or(Member::Owned(Value::Null), Member::Borrowed),
        (Value::Object(o), Value::Str(name)) => Member::Owned(o.get(name).unwrap_or_default()),
        (Value::Map(m), _) => {
            let map = m
                .try_borrow()
                .ok_or_else(|| Error::Evaluation("map is being modified".to_owned()))?;
            Member::Owned(map.get(index)?.cloned().unwrap_or_default())
        }
        _ => return Err(type_error("index", base, index)),
    })
}

fn lookup<'a>(base: Cow<'a, Value>, index: &Value) -> Result<Cow<'a, Value>> {
    Ok(match base {
        Cow::Borrowed(b) => match member(b, index)? {
            Member::Borrowed(v) => Cow::Borrowed(v),
            Member::Owned(v) => Cow::Owned(v),
        },
        Cow::Owned(o) => Cow::Owned(match member(&o, index)? {
            Member::Borrowed(v) => v.clone(),
            Member::Owned(v) => v,
        }),
    })
}

fn unary(op: UnaryOp, v: &Value) -> Result<Value> {
    match (op, v) {
        (UnaryOp::Not, v) => Ok(Value::Bool(!v.is_truthy())),
        (UnaryOp::Neg, Value::Int(i)) => i
            .checked_neg()
            .map(Value::Int)
            .ok_or_else(|| Error::Evaluation("integer overflow".to_owned())),
        (UnaryOp::Neg, Value::Float(f)) => Ok(Value::Float(-f)),
        (UnaryOp::Neg, other) => Err(Error::Evaluation(format!(
            "cannot negate {}",
            other.type_name()
        ))),
    }
}

#[derive(Clone, Copy)]
enum Num {
    Int(i64),
    Float(f64),
}

impl Num {
    fn of(v: &Value) -> Option<Num> {
        match v {
            Value::Int(i) => Some(Num::Int(*i)),
            Value::Float(f) => Some(Num::Float(*f)),
            Value::Bool(b) => Some(Num::Int(i64::from(*b))),
            _ => None,
        }
    }

    fn as_f64(self) -> f64 {
        match self {
            Num::Int(i) => i as f64,
            Num::Float(f) => f,
        }
    }

    fn as_i64(self) -> i64 {
        match self {
            Num::Int(i) => i,
            Num::Float(f) => f as i64,
        }
    }
}

fn overflow() -> Error {
    Error::Evaluation("integer overflow".to_owned())
}

fn division_by_zero() -> Error {
    Error::Evaluation("division by zero".to_owned())
}

fn arithmetic(op: BinaryOp, l: &Value, r: &Value) -> Result<Value> {
    let (Some(a), Some(b)) = (Num::of(l), Num::of(r)) else {
        return Err(type_error("do arithmetic on", l, r));
    };
    if op == BinaryOp::Rem {
        let (a, b) = (a.as_i64(), b.as_i64());
        if b == 0 {
            return Err(division_by_zero());
        }
        return a.checked_rem(b).map(Value::Int).ok_or_else(overflow);
    }
    match (a, b) {
        (Num::Int(a), Num::Int(b)) => {
            let result = match op {
                BinaryOp::Add => a.checked_add(b),
                BinaryOp::Sub => a.checked_sub(b),
                BinaryOp::Mul => a.checked_mul(b),
                BinaryOp::Div => {
                    if b == 0 {
                        return Err(division_by_zero());
                    }
                    match a.checked_rem(b) {
                        None => return Err(overflow()),
                        Some(0) => a.checked_div(b),
                        Some(_) => return Ok(Value::Float(a as f64 / b as f64)),
                    }
                }
                _ => unreachable!("not an arithmetic operator"),
            };
            result.map(Value::Int).ok_or_else(overflow)
        }
        (a, b) => {
            let (a, b) = (a.as_f64(), b.as_f64());
            Ok(Value::Float(match op {
                BinaryOp::Add => a + b,
                BinaryOp::Sub => a - b,
                BinaryOp::Mul => a * b,
                BinaryOp::Div => {
                    if b == 0.0 {
                        return Err(division_by_zero());
                    }
                    a / b
                }
                _ => unreachable!("not an arithmetic operator"),
            }))
        }
    }
}

/// Numbers (including bools) compare by value; everything else by
/// [`PartialEq`], which is structural for data and identity for shared values.
fn loose_eq(l: &Value, r: &Value) -> bool {
    match (Num::of(l), Num::of(r)) {
        (Some(Num::Int(a)), Some(Num::Int(b))) => a == b,
        (Some(a), Some(b)) => a.as_f64() == b.as_f64(),
        _ => l == r,
    }
}

fn compare(l: &Value, r: &Value) -> Result<Option<Ordering>> {
    match (l, r) {
        (Value::Str(a), Value::Str(b)) => Ok(Some(a.cmp(b))),
        _ => match (Num::of(l), Num::of(r)) {
            (Some(Num::Int(a)), Some(Num::Int(b))) => Ok(Some(a.cmp(&b))),
            (Some(a), Some(b)) => Ok(a.as_f64().partial_cmp(&b.as_f64())),
            _ => Err(type_error("compare", l, r)),
        },
    }
}

fn binary(op: BinaryOp, l: &Value, r: &Value) -> Result<Value> {
    match op {
        BinaryOp::Eq => Ok(Value::Bool(loose_eq(l, r))),
        BinaryOp::Ne => Ok(Value::Bool(!loose_eq(l, r))),
        BinaryOp::Lt | BinaryOp::Le | BinaryOp::Gt | BinaryOp::Ge => {
            let ord = compare(l, r)?;
            Ok(Value::Bool(match (op, ord) {
                (_, None) => false,
                (BinaryOp::Lt, Some(o)) => o == Ordering::Less,
                (BinaryOp::Le, Some(o)) => o != Ordering::Greater,
                (BinaryOp::Gt, Some(o)) => o == Ordering::Greater,
                (_, Some(o)) => o != Ordering::Less,
            }))
        }
        BinaryOp::Add => match (l, r) {
            (Value::Str(_), _) | (_, Value::Str(_)) => Ok(Value::Str(format!("{l}{r}"))),
            (Value::List(a), Value::List(b)) => {
                Ok(Value::List(a.iter().chain(b.iter()).cloned().collect()))
            }
            _ => arithmetic(op, l, r),
        },
        _ => arithmetic(op, l, r),
    }
}

fn call(builtin: Builtin, args: &[Cow<'_, Value>]) -> Result<Value> {
    let arg: &Value = &args[0];
    let wrong = || {
        Error::Evaluation(format!(
            "{builtin:?} is not defined for {}",
            arg.type_name()
        ))
    };
    Ok(match builtin {
        Builtin::Len => Value::Int(match arg {
            Value::Str(s) => s.chars().count() as i64,
            Value::List(items) => items.len() as i64,
            Value::Record(fields) => fields.len() as i64,
            Value::Object(o) => o.fields().len() as i64,
            Value::Map(m) => m
                .try_borrow()
                .ok_or_else(|| Error::Evaluation("map is being modified".to_owned()))?
                .len() as i64,
            _ => return Err(wrong()),
        }),
        Builtin::Abs => match arg {
            Value::Int(i) => Value::Int(i.checked_abs().ok_or_else(overflow)?),
            Value::Float(f) => Value::Float(f.abs()),
            _ => return Err(wrong()),
        },
        Builtin::Str => Value::Str(arg.to_string()),
        Builtin::Int => match arg {
            Value::Str(s) => {
                let s = s.trim();
                match s.parse::<i64>() {
                    Ok(i) => Value::Int(i),
                    Err(_) => Value::Int(s.parse::<f64>().map_err(|_| wrong())? as i64),
                }
            }
            other => Value::Int(Num::of(other).ok_or_else(wrong)?.as_i64()),
        },
        Builtin::Float => match arg {
            Value::Str(s) => Value::Float(s.trim().parse().map_err(|_| wrong())?),
            other => Value::Float(Num::of(other).ok_or_else(wrong)?.as_f64()),
        },
        Builtin::IsNull => Value::Bool(arg.is_null()),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::expr::parser::parse;

    fn run(source: &str, value: Value, key: Value) -> Result<Value> {
        let expr = parse(source, &["value", "key"]).expect("parses");
        eval(&expr, &[&value, &key]).map(Cow::into_owned)
    }

    #[test]
    fn parameters_are_borrowed() {
        let expr = parse("value", &["value"]).unwrap();
        let v = Value::from(vec![1, 2]);
        assert!(matches!(eval(&expr, &[&v]).unwrap(), Cow::Borrowed(_)));
    }

    #[test]
    fn integer_division_stays_integral_when_exact() {
        assert_eq!(run("value / 2", Value::Int(6), Value::Null), Ok(Value::Int(3)));
        assert_eq!(run("value / 2", Value::Int(7), Value::Null), Ok(Value::Float(3.5)));
    }

    #[test]
    fn division_by_zero_is_an_error() {
        assert!(matches!(
            run("value / 0", Value::Int(1), Value::Null),
            Err(Error::Evaluation(_))
        ));
        assert!(matches!(
            run("value % 0", Value::Int(1), Value::Null),
            Err(Error::Evaluation(_))
        ));
    }

    #[test]
    fn logical_operators_short_circuit() {
        // The right side would fail if evaluated.
        assert_eq!(run("false && value / 0", Value::Int(1), Value::Null), Ok(Value::Bool(false)));
        assert_eq!(run("true || value / 0", Value::Int(1), Value::Null), Ok(Value::Bool(true)));
    }

    #[test]
    fn mismatched_types_are_errors() {
        assert!(run("value - 1", Value::from("a"), Value::Null).is_err());
        assert!(run("value < 1", Value::from("a"), Value::Null).is_err());
    }
}
