use nom::error::{Error, ErrorKind};
use nom::IResult;
use nom::{
    branch::alt,
    bytes::complete::tag,
    character::complete::{alpha1, alphanumeric1, char, one_of, space0},
    combinator::{cut, map, map_res, recognize},
    multi::{many0, many0_count},
    number::complete::double,
    sequence::{delimited, pair, preceded},
};

use builder::{Expression, Operator};

/// Deepest tree, and deepest parenthesis nesting, accepted from text
pub const MAX_DEPTH: usize = 256;

const TOO_DEEP: &str = "Expression nested too deeply";

fn parse_identifier(i: &str) -> IResult<&str, &str> {
    recognize(pair(
        alt((alpha1, tag("_"))),
        many0_count(alt((alphanumeric1, tag("_")))),
    ))(i)
}

fn parse_constant(i: &str) -> IResult<&str, f64> {
    map_res(double, |value: f64| {
        if value.is_finite() {
            Ok(value)
        } else {
            Err("non-finite constant")
        }
    })(i)
}

fn parse_operand(i: &str) -> IResult<&str, Expression> {
    let enclosed_expression = delimited(
        char('('),
        parse_expression,
        preceded(space0, cut(char(')'))),
    );

    preceded(
        space0,
        alt((
            // Identifiers first, so names such as `inf` are not read as numbers
            map(parse_identifier, |name: &str| Expression::variable(name)),
            map(parse_constant, Expression::number),
            enclosed_expression,
        )),
    )(i)
}

fn operator(symbol: char) -> Operator {
    match symbol {
        '+' => Operator::Add,
        '-' => Operator::Sub,
        '*' => Operator::Mul,
        _ => Operator::Div,
    }
}

// Left-associative chain of `init op r op r ...`, failing once the tree
// would grow deeper than MAX_DEPTH
fn fold_binary(
    i: &str,
    init: Expression,
    rest: Vec<(char, Expression)>,
) -> IResult<&str, Expression> {
    let mut depth = init.depth();
    let mut expr = init;
    for (op, r) in rest {
        depth = 1 + depth.max(r.depth());
        if depth > MAX_DEPTH {
            return Err(nom::Err::Failure(Error::new(i, ErrorKind::TooLarge)));
        }
        expr = Expression::binary(expr, operator(op), r);
    }
    Ok((i, expr))
}

fn parse_multiply(i: &str) -> IResult<&str, Expression> {
    let (i, init) = parse_operand(i)?;
    let (i, rest) = many0(pair(preceded(space0, one_of("*/")), cut(parse_operand)))(i)?;
    fold_binary(i, init, rest)
}

fn parse_expression(i: &str) -> IResult<&str, Expression> {
    let (i, init) = parse_multiply(i)?;
    let (i, rest) = many0(pair(preceded(space0, one_of("+-")), cut(parse_multiply)))(i)?;
    fold_binary(i, init, rest)
}

// Every `(` recurses through the parser, so bound it before parsing
fn nesting(i: &str) -> usize {
    let mut max = 0;
    let mut open = 0usize;
    for c in i.chars() {
        match c {
            '(' => {
                open += 1;
                max = max.max(open);
            }
            ')' => open = open.saturating_sub(1),
            _ => {}
        }
    }
    max
}

#[derive(Debug, Clone, PartialEq)]
pub struct ParseError(pub String);

impl std::fmt::Display for ParseError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "ParseError: {}", self.0)
    }
}

impl std::error::Error for ParseError {}

/// Parses infix text such as `2 * (x + 1.5)` into an [`Expression`]
pub fn parse(i: &str) -> Result<Expression, ParseError> {
    if nesting(i) > MAX_DEPTH {
        return Err(ParseError(TOO_DEEP.to_string()));
    }

    match parse_expression(i) {
        Ok((remaining, r)) => {
            let remaining = remaining.trim_start();
            if !remaining.is_empty() {
                return Err(ParseError(format!("Unexpected token at \"{}\"", remaining)));
            }
            Ok(r)
        }
        Err(nom::Err::Failure(e)) if e.code == ErrorKind::TooLarge => {
            Err(ParseError(TOO_DEEP.to_string()))
        }
        Err(nom::Err::Error(e)) | Err(nom::Err::Failure(e)) => Err(ParseError(format!(
            "Unexpected token at \"{}\"",
            e.input.trim_start()
        ))),
        Err(_) => Err(ParseError("Parse Error".to_string())),
    }
}
