//! Expressions: the caller-supplied logic that drives every query.
//!
//! An [`Expression`] is either a Rust closure or source text compiled into a
//! small sandboxed language whose only inputs are its positional
//! parameters. Query operations bind fixed parameter names:
//!
//! | use | parameters |
//! |---|---|
//! | predicates, transforms, guards | `value`, `key` |
//! | reduce step | `carry`, `value`, `key` |
//! | reduce finish | `carry` |
//!
//! The language has literals (`1`, `2.5`, `'text'`, `"text"`, `true`,
//! `false`, `null`, `[a, b]`), indexing (`value[0]`, `value.name`), unary
//! `!` and `-`, arithmetic `* / % + -` (`+` also joins text and lists),
//! comparisons, `&&`, `||`, `??`, `cond ? a : b`, and the builtins `len`,
//! `abs`, `str`, `int`, `float` and `is_null`.

mod eval;
mod lexer;
mod parser;

use crate::error::{Error, Result};
use crate::value::Value;
use log::debug;
use std::borrow::Cow;
use std::fmt;
use std::rc::Rc;
use thiserror::Error as ThisError;

/// Lexing or parsing failure, reported through [`Error::InvalidExpression`].
#[derive(ThisError, Debug, Clone, PartialEq)]
#[error("{message} at offset {offset}")]
pub(crate) struct SyntaxError {
    pub(crate) offset: usize,
    pub(crate) message: String,
}

impl SyntaxError {
    pub(crate) fn new(offset: usize, message: impl Into<String>) -> Self {
        Self {
            offset,
            message: message.into(),
        }
    }
}

type NativeFn = dyn Fn(&[&Value]) -> Result<Value>;

enum Body {
    Native(Box<NativeFn>),
    Compiled { source: String, ast: parser::Expr },
}

/// A compiled, cheaply clonable unit of fixed arity.
#[derive(Clone)]
pub struct Expression {
    arity: usize,
    body: Rc<Body>,
}

impl Expression {
    /// Compiles `source` with `params` bound positionally.
    pub fn compile(source: &str, params: &[&str]) -> Result<Self> {
        let ast = parser::parse(source, params).map_err(|e| {
            debug!("rejected expression {source:?}: {e}");
            Error::InvalidExpression {
                source_text: source.to_owned(),
                reason: e.to_string(),
            }
        })?;
        Ok(Self {
            arity: params.len(),
            body: Rc::new(Body::Compiled {
                source: source.to_owned(),
                ast,
            }),
        })
    }

    fn native(arity: usize, f: impl Fn(&[&Value]) -> Result<Value> + 'static) -> Self {
        Self {
            arity,
            body: Rc::new(Body::Native(Box::new(f))),
        }
    }

    pub fn unary<F, R>(f: F) -> Self
    where
        F: Fn(&Value) -> R + 'static,
        R: Into<Value>,
    {
        Self::native(1, move |args| Ok(f(args[0]).into()))
    }

    pub fn binary<F, R>(f: F) -> Self
    where
        F: Fn(&Value, &Value) -> R + 'static,
        R: Into<Value>,
    {
        Self::native(2, move |args| Ok(f(args[0], args[1]).into()))
    }

    pub fn ternary<F, R>(f: F) -> Self
    where
        F: Fn(&Value, &Value, &Value) -> R + 'static,
        R: Into<Value>,
    {
        Self::native(3, move |args| Ok(f(args[0], args[1], args[2]).into()))
    }

    pub fn arity(&self) -> usize {
        self.arity
    }

    /// Source text, for compiled expressions.
    pub fn source(&self) -> Option<&str> {
        match &*self.body {
            Body::Native(_) => None,
            Body::Compiled { source, .. } => Some(source),
        }
    }

    pub fn evaluate(&self, args: &[&Value]) -> Result<Value> {
        if args.len() != self.arity {
            return Err(Error::InvalidArgument(format!(
                "expression takes {} argument(s), got {}",
                self.arity,
                args.len()
            )));
        }
        match &*self.body {
            Body::Native(f) => f(args),
            Body::Compiled { ast, .. } => eval::eval(ast, args).map(Cow::into_owned),
        }
    }
}

impl fmt::Debug for Expression {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &*self.body {
            Body::Native(_) => write!(f, "Expression(<native/{}>)", self.arity),
            Body::Compiled { source, .. } => write!(f, "Expression({source:?})"),
        }
    }
}

/// Parameter list an expression is compiled against.
pub trait Arity {
    const PARAMS: &'static [&'static str];
}

/// `carry`: the finishing step of `reduce_with`.
pub enum Unary {}

/// `value`, `key`: predicates, transforms and guards.
pub enum Binary {}

/// `carry`, `value`, `key`: the step of `reduce`.
pub enum Ternary {}

impl Arity for Unary {
    const PARAMS: &'static [&'static str] = &["carry"];
}

impl Arity for Binary {
    const PARAMS: &'static [&'static str] = &["value", "key"];
}

impl Arity for Ternary {
    const PARAMS: &'static [&'static str] = &["carry", "value", "key"];
}

/// Anything a query operation accepts as its expression: source text, an
/// [`Expression`], or a closure of the matching shape.
///
/// Closures passed directly need annotated parameters
/// (`|v: &Value, k: &Value| ...`); [`Expression::binary`] and friends infer
/// them.
pub trait IntoExpression<A: Arity> {
    fn into_expression(self) -> Result<Expression>;
}

impl<A: Arity> IntoExpression<A> for &str {
    fn into_expression(self) -> Result<Expression> {
        Expression::compile(self, A::PARAMS)
    }
}

impl<A: Arity> IntoExpression<A> for String {
    fn into_expression(self) -> Result<Expression> {
        Expression::compile(&self, A::PARAMS)
    }
}

impl<A: Arity> IntoExpression<A> for Expression {
    fn into_expression(self) -> Result<Expression> {
        if self.arity != A::PARAMS.len() {
            return Err(Error::InvalidArgument(format!(
                "expected an expression of {} argument(s), got {}",
                A::PARAMS.len(),
                self.arity
            )));
        }
        Ok(self)
    }
}

impl<A: Arity> IntoExpression<A> for &Expression {
    fn into_expression(self) -> Result<Expression> {
        <Expression as IntoExpression<A>>::into_expression(self.clone())
    }
}

impl<F, R> IntoExpression<Unary> for F
where
    F: Fn(&Value) -> R + 'static,
    R: Into<Value>,
{
    fn into_expression(self) -> Result<Expression> {
        Ok(Expression::unary(self))
    }
}

impl<F, R> IntoExpression<Binary> for F
where
    F: Fn(&Value, &Value) -> R + 'static,
    R: Into<Value>,
{
    fn into_expression(self) -> Result<Expression> {
        Ok(Expression::binary(self))
    }
}

impl<F, R> IntoExpression<Ternary> for F
where
    F: Fn(&Value, &Value, &Value) -> R + 'static,
    R: Into<Value>,
{
    fn into_expression(self) -> Result<Expression> {
        Ok(Expression::ternary(self))
    }
}
