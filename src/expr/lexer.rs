use super::SyntaxError;
use nom::Parser;
use nom::{
    IResult,
    branch::alt,
    bytes::complete::{escaped_transform, tag},
    character::complete::{alpha1, alphanumeric1, char, digit1, multispace0, none_of},
    combinator::{map, map_res, opt, recognize, value},
    multi::many0,
    sequence::{delimited, pair},
};

#[derive(Debug, Clone, PartialEq)]
pub(crate) enum TokenKind {
    Int(i64),
    Float(f64),
    Str(String),
    Ident(String),
    True,
    False,
    Null,
    LParen,
    RParen,
    LBracket,
    RBracket,
    Comma,
    Dot,
    Question,
    Coalesce,
    Colon,
    Bang,
    Plus,
    Minus,
    Star,
    Slash,
    Percent,
    EqEq,
    NeEq,
    Lt,
    Lte,
    Gt,
    Gte,
    AndAnd,
    OrOr,
    Eof,
}

#[derive(Debug, Clone, PartialEq)]
pub(crate) struct Lexeme {
    pub kind: TokenKind,
    /// Byte offset into the source text.
    pub offset: usize,
}

pub(crate) fn tokenize(source: &str) -> Result<Vec<Lexeme>, SyntaxError> {
    let mut rest = source;
    let mut out = Vec::new();
    loop {
        let (r, _) = multispace0::<&str, nom::error::Error<&str>>(rest)
            .map_err(|_| SyntaxError::new(source.len() - rest.len(), "unreadable input"))?;
        rest = r;
        let offset = source.len() - rest.len();
        if rest.is_empty() {
            out.push(Lexeme {
                kind: TokenKind::Eof,
                offset,
            });
            return Ok(out);
        }
        match token(rest) {
            Ok((r, kind)) => {
                out.push(Lexeme { kind, offset });
                rest = r;
            }
            Err(_) => {
                let found = rest.chars().next().unwrap_or(' ');
                return Err(SyntaxError::new(offset, format!("unexpected character `{found}`")));
            }
        }
    }
}

fn token(input: &str) -> IResult<&str, TokenKind> {
    alt((number_literal, string_literal, word, operator, punctuation)).parse(input)
}

fn number_literal(input: &str) -> IResult<&str, TokenKind> {
    map_res(
        recognize(pair(digit1, opt(pair(char('.'), digit1)))),
        |s: &str| {
            if s.contains('.') {
                s.parse().map(TokenKind::Float).map_err(|e| e.to_string())
            } else {
                s.parse().map(TokenKind::Int).map_err(|e| e.to_string())
            }
        },
    )
    .parse(input)
}

fn escape(input: &str) -> IResult<&str, char> {
    alt((
        value('\\', char('\\')),
        value('"', char('"')),
        value('\'', char('\'')),
        value('\n', char('n')),
        value('\t', char('t')),
        value('\r', char('r')),
    ))
    .parse(input)
}

fn double_quoted(input: &str) -> IResult<&str, TokenKind> {
    alt((
        value(TokenKind::Str(String::new()), tag("\"\"")),
        map(
            delimited(
                char('"'),
                escaped_transform(none_of("\"\\"), '\\', escape),
                char('"'),
            ),
            TokenKind::Str,
        ),
    ))
    .parse(input)
}

fn single_quoted(input: &str) -> IResult<&str, TokenKind> {
    alt((
        value(TokenKind::Str(String::new()), tag("''")),
        map(
            delimited(
                char('\''),
                escaped_transform(none_of("'\\"), '\\', escape),
                char('\''),
            ),
            TokenKind::Str,
        ),
    ))
    .parse(input)
}

fn string_literal(input: &str) -> IResult<&str, TokenKind> {
    alt((double_quoted, single_quoted)).parse(input)
}

fn word(input: &str) -> IResult<&str, TokenKind> {
    map(
        recognize(pair(
            alt((alpha1, tag("_"))),
            many0(alt((alphanumeric1, tag("_")))),
        )),
        |s: &str| match s {
            "true" => TokenKind::True,
            "false" => TokenKind::False,
            "null" => TokenKind::Null,
            _ => TokenKind::Ident(s.to_owned()),
        },
    )
    .parse(input)
}

fn operator(input: &str) -> IResult<&str, TokenKind> {
    alt((
        value(TokenKind::EqEq, tag("==")),
        value(TokenKind::NeEq, tag("!=")),
        value(TokenKind::Lte, tag("<=")),
        value(TokenKind::Gte, tag(">=")),
        value(TokenKind::AndAnd, tag("&&")),
        value(TokenKind::OrOr, tag("||")),
        value(TokenKind::Coalesce, tag("??")),
        value(TokenKind::Lt, char('<')),
        value(TokenKind::Gt, char('>')),
        value(TokenKind::Bang, char('!')),
        value(TokenKind::Plus, char('+')),
        value(TokenKind::Minus, char('-')),
        value(TokenKind::Star, char('*')),
        value(TokenKind::Slash, char('/')),
        value(TokenKind::Percent, char('%')),
        value(TokenKind::Question, char('?')),
        value(TokenKind::Colon, char(':')),
    ))
    .parse(input)
}

fn punctuation(input: &str) -> IResult<&str, TokenKind> {
    alt((
        value(TokenKind::LParen, char('(')),
        value(TokenKind::RParen, char(')')),
        value(TokenKind::LBracket, char('[')),
        value(TokenKind::RBracket, char(']')),
        value(TokenKind::Comma, char(',')),
        value(TokenKind::Dot, char('.')),
    ))
    .parse(input)
}
