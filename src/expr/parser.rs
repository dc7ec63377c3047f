use super::lexer::{Lexeme, TokenKind, tokenize};
use super::SyntaxError;
use crate::value::Value;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum UnaryOp {
    Not,
    Neg,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum BinaryOp {
    Add,
    Sub,
    Mul,
    Div,
    Rem,
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Builtin {
    Len,
    Abs,
    Str,
    Int,
    Float,
    IsNull,
}

impl Builtin {
    fn from_name(name: &str) -> Option<Self> {
        Some(match name {
            "len" => Builtin::Len,
            "abs" => Builtin::Abs,
            "str" => Builtin::Str,
            "int" => Builtin::Int,
            "float" => Builtin::Float,
            "is_null" => Builtin::IsNull,
            _ => return None,
        })
    }

    pub(crate) fn arity(self) -> usize {
        1
    }
}

#[derive(Debug, Clone, PartialEq)]
pub(crate) enum Expr {
    Literal(Value),
    /// Positional argument, resolved from its name at compile time.
    Param(usize),
    List(Vec<Expr>),
    Unary(UnaryOp, Box<Expr>),
    Binary(BinaryOp, Box<Expr>, Box<Expr>),
    And(Box<Expr>, Box<Expr>),
    Or(Box<Expr>, Box<Expr>),
    Coalesce(Box<Expr>, Box<Expr>),
    Conditional(Box<Expr>, Box<Expr>, Box<Expr>),
    Index(Box<Expr>, Box<Expr>),
    Call(Builtin, Vec<Expr>),
}

pub(crate) fn parse(source: &str, params: &[&str]) -> Result<Expr, SyntaxError> {
    let tokens = tokenize(source)?;
    let mut parser = Parser {
        tokens,
        pos: 0,
        params,
    };
    let expr = parser.parse_expr()?;
    let trailing = parser.peek();
    if trailing.kind != TokenKind::Eof {
        return Err(SyntaxError::new(trailing.offset, "unexpected trailing input"));
    }
    Ok(expr)
}

struct Parser<'p> {
    tokens: Vec<Lexeme>,
    pos: usize,
    params: &'p [&'p str],
}

// Loosest first. All binary operators are left-associative.
fn binary_precedence(kind: &TokenKind) -> Option<u8> {
    Some(match kind {
        TokenKind::Coalesce => 1,
        TokenKind::OrOr => 2,
        TokenKind::AndAnd => 3,
        TokenKind::EqEq | TokenKind::NeEq => 4,
        TokenKind::Lt | TokenKind::Lte | TokenKind::Gt | TokenKind::Gte => 5,
        TokenKind::Plus | TokenKind::Minus => 6,
        TokenKind::Star | TokenKind::Slash | TokenKind::Percent => 7,
        _ => return None,
    })
}

fn combine(kind: &TokenKind, lhs: Expr, rhs: Expr) -> Expr {
    let (lhs, rhs) = (Box::new(lhs), Box::new(rhs));
    let op = match kind {
        TokenKind::Coalesce => return Expr::Coalesce(lhs, rhs),
        TokenKind::OrOr => return Expr::Or(lhs, rhs),
        TokenKind::AndAnd => return Expr::And(lhs, rhs),
        TokenKind::EqEq => BinaryOp::Eq,
        TokenKind::NeEq => BinaryOp::Ne,
        TokenKind::Lt => BinaryOp::Lt,
        TokenKind::Lte => BinaryOp::Le,
        TokenKind::Gt => BinaryOp::Gt,
        TokenKind::Gte => BinaryOp::Ge,
        TokenKind::Plus => BinaryOp::Add,
        TokenKind::Minus => BinaryOp::Sub,
        TokenKind::Star => BinaryOp::Mul,
        TokenKind::Slash => BinaryOp::Div,
        TokenKind::Percent => BinaryOp::Rem,
        _ => unreachable!("combine called with a non-operator token"),
    };
    Expr::Binary(op, lhs, rhs)
}

impl Parser<'_> {
    fn peek(&self) -> &Lexeme {
        // The token stream always ends with Eof and the parser never moves past it.
        &self.tokens[self.pos.min(self.tokens.len() - 1)]
    }

    fn advance(&mut self) -> Lexeme {
        let lexeme = self.peek().clone();
        if lexeme.kind != TokenKind::Eof {
            self.pos += 1;
        }
        lexeme
    }

    fn expect(&mut self, kind: TokenKind, what: &str) -> Result<Lexeme, SyntaxError> {
        let next = self.advance();
        if next.kind == kind {
            Ok(next)
        } else {
            Err(SyntaxError::new(next.offset, format!("expected {what}")))
        }
    }

    fn parse_expr(&mut self) -> Result<Expr, SyntaxError> {
        self.parse_conditional()
    }

    fn parse_conditional(&mut self) -> Result<Expr, SyntaxError> {
        let cond = self.parse_binary(1)?;
        if self.peek().kind != TokenKind::Question {
            return Ok(cond);
        }
        self.advance();
        let then = self.parse_conditional()?;
        self.expect(TokenKind::Colon, "`:` in conditional")?;
        let otherwise = self.parse_conditional()?;
        Ok(Expr::Conditional(
            Box::new(cond),
            Box::new(then),
            Box::new(otherwise),
        ))
    }

    fn parse_binary(&mut self, min_prec: u8) -> Result<Expr, SyntaxError> {
        let mut lhs = self.parse_unary()?;
        while let Some(prec) = binary_precedence(&self.peek().kind) {
            if prec < min_prec {
                break;
            }
            let op = self.advance();
            let rhs = self.parse_binary(prec + 1)?;
            lhs = combine(&op.kind, lhs, rhs);
        }
        Ok(lhs)
    }

    fn parse_unary(&mut self) -> Result<Expr, SyntaxError> {
        let op = match self.peek().kind {
            TokenKind::Bang => UnaryOp::Not,
            TokenKind::Minus => UnaryOp::Neg,
            _ => return self.parse_postfix(),
        };
        self.advance();
        let operand = self.parse_unary()?;
        Ok(Expr::Unary(op, Box::new(operand)))
    }

    fn parse_postfix(&mut self) -> Result<Expr, SyntaxError> {
        let mut expr = self.parse_primary()?;
        loop {
            match self.peek().kind {
                TokenKind::LBracket => {
                    self.advance();
                    let index = self.parse_expr()?;
                    self.expect(TokenKind::RBracket, "`]`")?;
                    expr = Expr::Index(Box::new(expr), Box::new(index));
                }
                TokenKind::Dot => {
                    self.advance();
                    let field = self.advance();
                    let TokenKind::Ident(name) = field.kind else {
                        return Err(SyntaxError::new(field.offset, "expected field name after `.`"));
                    };
                    expr = Expr::Index(Box::new(expr), Box::new(Expr::Literal(Value::Str(name))));
                }
                _ => return Ok(expr),
            }
        }
    }

    fn parse_primary(&mut self) -> Result<Expr, SyntaxError> {
        let lexeme = self.advance();
        Ok(match lexeme.kind {
            TokenKind::Int(i) => Expr::Literal(Value::Int(i)),
            TokenKind::Float(f) => Expr::Literal(Value::Float(f)),
            TokenKind::Str(s) => Expr::Literal(Value::Str(s)),
            TokenKind::True => Expr::Literal(Value::Bool(true)),
            TokenKind::False => Expr::Literal(Value::Bool(false)),
            TokenKind::Null => Expr::Literal(Value::Null),
            TokenKind::LParen => {
                let inner = self.parse_expr()?;
                self.expect(TokenKind::RParen, "`)`")?;
                inner
            }
            TokenKind::LBracket => Expr::List(self.parse_list(TokenKind::RBracket, "`]`")?),
            TokenKind::Ident(name) => {
                if self.peek().kind == TokenKind::LParen {
                    self.advance();
                    return self.parse_call(&name, lexeme.offset);
                }
                match self.params.iter().position(|p| *p == name) {
                    Some(i) => Expr::Param(i),
                    None => {
                        return Err(SyntaxError::new(
                            lexeme.offset,
                            format!("unknown name `{name}`"),
                        ))
                    }
                }
            }
            TokenKind::Eof => return Err(SyntaxError::new(lexeme.offset, "unexpected end of input")),
            other => {
                return Err(SyntaxError::new(
                    lexeme.offset,
                    format!("unexpected token {other:?}"),
                ))
            }
        })
    }

    fn parse_call(&mut self, name: &str, offset: usize) -> Result<Expr, SyntaxError> {
        let builtin = Builtin::from_name(name)
            .ok_or_else(|| SyntaxError::new(offset, format!("unknown function `{name}`")))?;
        let args = self.parse_list(TokenKind::RParen, "`)`")?;
        if args.len() != builtin.arity() {
            return Err(SyntaxError::new(
                offset,
                format!("`{name}` takes {} argument(s), got {}", builtin.arity(), args.len()),
            ));
        }
        Ok(Expr::Call(builtin, args))
    }

    // Comma-separated expressions up to and including `close`.
    fn parse_list(&mut self, close: TokenKind, what: &str) -> Result<Vec<Expr>, SyntaxError> {
        let mut items = Vec::new();
        if self.peek().kind == close {
            self.advance();
            return Ok(items);
        }
        loop {
            items.push(self.parse_expr()?);
            if self.peek().kind == TokenKind::Comma {
                self.advance();
                continue;
            }
            self.expect(close.clone(), what)?;
            return Ok(items);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const PARAMS: &[&str] = &["value", "key"];

    fn binary(op: BinaryOp, l: Expr, r: Expr) -> Expr {
        Expr::Binary(op, Box::new(l), Box::new(r))
    }

    #[test]
    fn multiplicative_binds_tighter_than_additive() {
        let expr = parse("value + 2 * key", PARAMS).unwrap();
        assert_eq!(
            expr,
            binary(
                BinaryOp::Add,
                Expr::Param(0),
                binary(BinaryOp::Mul, Expr::Literal(Value::Int(2)), Expr::Param(1)),
            )
        );
    }

    #[test]
    fn subtraction_is_left_associative() {
        let expr = parse("value - 1 - 2", PARAMS).unwrap();
        assert_eq!(
            expr,
            binary(
                BinaryOp::Sub,
                binary(BinaryOp::Sub, Expr::Param(0), Expr::Literal(Value::Int(1))),
                Expr::Literal(Value::Int(2)),
            )
        );
    }

    #[test]
    fn conditional_nests_to_the_right() {
        let expr = parse("value ? 1 : key ? 2 : 3", PARAMS).unwrap();
        let Expr::Conditional(_, _, otherwise) = expr else {
            panic!("expected conditional");
        };
        assert!(matches!(*otherwise, Expr::Conditional(..)));
    }

    #[test]
    fn field_access_is_sugar_for_index() {
        assert_eq!(
            parse("value.name", PARAMS).unwrap(),
            parse("value['name']", PARAMS).unwrap()
        );
    }

    #[test]
    fn unknown_names_are_rejected() {
        let err = parse("x % 2", PARAMS).unwrap_err();
        assert_eq!(err.offset, 0);
        assert!(err.message.contains("unknown name"));
    }

    #[test]
    fn builtin_arity_is_checked() {
        assert!(parse("len(value)", PARAMS).is_ok());
        assert!(parse("len(value, key)", PARAMS).is_err());
        assert!(parse("nope(value)", PARAMS).is_err());
    }

    #[test]
    fn incomplete_input_is_rejected() {
        assert!(parse("value ==", PARAMS).is_err());
        assert!(parse("(value", PARAMS).is_err());
        assert!(parse("value key", PARAMS).is_err());
        assert!(parse("", PARAMS).is_err());
        assert!(parse("value ? 1", PARAMS).is_err());
    }
}
