use chumsky::{prelude::*, Stream};

use crate::{
    prelude::*,
    term::{Operator, Term, MAX_DEPTH},
};

pub trait SimpleParser<I: Clone + std::hash::Hash, O>:
    Parser<I, O, Error = Error<I>> + Clone
{
    #[allow(clippy::type_complexity)]
    fn spanned(self) -> chumsky::combinator::MapWithSpan<Self, fn(O, Span) -> Spanned<O>, O>
    where
        Self: Sized,
        I: std::cmp::Eq,
    {
        self.map_with_span(|value, span| Spanned { span, value })
    }
}
impl<I: Clone + std::hash::Hash, O, T> SimpleParser<I, O> for T where
    T: Parser<I, O, Error = Error<I>> + Clone
{
}

#[derive(PartialEq, Eq, Hash, Clone, derive_more::Display, Debug)]
pub enum Token {
    #[display(fmt = "(")]
    LParen,
    #[display(fmt = ")")]
    RParen,
    #[display(fmt = "[")]
    LBracket,
    #[display(fmt = "]")]
    RBracket,
    #[display(fmt = "=")]
    Equals,
    #[display(fmt = ",")]
    Comma,
    #[display(fmt = ";")]
    Semi,
    #[display(fmt = "lambda")]
    Lambda,
    #[display(fmt = "fv")]
    Fv,
    #[display(fmt = "alpha")]
    Alpha,
    #[display(fmt = "{}", "_0")]
    Op(Operator),
    /// Digits as written; converted when the expression is built.
    #[display(fmt = "{}", "_0")]
    Number(Identifier),
    /// Already uppercased.
    #[display(fmt = "{}", "_0")]
    Name(Identifier),
}

pub fn lexer() -> impl SimpleParser<char, Vec<Spanned<Token>>> {
    let symbols = choice((
        just('(').to(Token::LParen),
        just(')').to(Token::RParen),
        just('[').to(Token::LBracket),
        just(']').to(Token::RBracket),
        just('=').to(Token::Equals),
        just(',').to(Token::Comma),
        just(';').to(Token::Semi),
        just('+').to(Token::Op(Operator::Add)),
        just('-').to(Token::Op(Operator::Sub)),
        just('*').to(Token::Op(Operator::Mul)),
        just('/').to(Token::Op(Operator::Div)),
    ));
    let digit = filter(|c: &char| c.is_ascii_digit());
    let number = digit
        .clone()
        .repeated()
        .at_least(1)
        .chain::<char, _, _>(
            just('.')
                .chain::<char, _, _>(digit.repeated())
                .or_not()
                .map(Option::unwrap_or_default),
        )
        .collect::<String>()
        .map(|digits| Token::Number(Identifier::new(digits)));
    // Reserved words are matched case-insensitively; everything else is a name.
    let word = filter(|c: &char| c.is_ascii_alphabetic())
        .chain::<char, _, _>(filter(|c: &char| c.is_ascii_alphanumeric() || *c == '_').repeated())
        .collect::<String>()
        .map(|word| match word.to_ascii_lowercase().as_str() {
            "lambda" => Token::Lambda,
            "fv" => Token::Fv,
            "alpha" => Token::Alpha,
            _ => Token::Name(Identifier::new(word.to_ascii_uppercase())),
        });
    let token = choice((symbols, number, word));

    let comment = just('#')
        .then(filter(|c: &char| *c != '\n').repeated())
        .ignored();
    let trivia = filter(|c: &char| c.is_whitespace())
        .ignored()
        .or(comment)
        .repeated()
        .ignored();
    trivia
        .clone()
        .ignore_then(token.spanned().then_ignore(trivia).repeated())
        .then_ignore(end())
}

#[derive(Clone, Debug)]
pub enum Statement {
    /// `e;`
    Expr(Term),
    /// `e[x = v];`
    Substitute {
        term: Term,
        var: Identifier,
        value: Term,
    },
    /// `fv[e];`
    FreeVariables(Term),
    /// `alpha[e, x];`
    Alpha(Term, Identifier),
}

fn expr_parser() -> impl SimpleParser<Token, Term> {
    recursive(|expr: Recursive<_, Term, _>| {
        let number = select! { Token::Number(digits) => digits }
            .try_map(|digits, span| match digits.parse::<f64>() {
                Ok(value) if value.is_finite() => Ok(Term::number(value)),
                Ok(_) => Err(Simple::custom(span, "Number literal out of range")),
                Err(e) => Err(Simple::custom(span, format!("{e}"))),
            })
            .labelled("number");
        let name = select! { Token::Name(name) => name }
            .map(Term::name)
            .labelled("name");

        // (lambda x e)
        let lambda = just(Token::Lambda)
            .ignore_then(select! { Token::Name(var) => var })
            .then(expr.clone())
            .map(|(var, body)| Term::lambda(var, body))
            .labelled("lambda");

        // (op e e)
        let arith = select! { Token::Op(op) => op }
            .then(expr.clone())
            .then(expr.clone())
            .map(|((op, lhs), rhs)| Term::op(op, lhs, rhs))
            .labelled("arithmetic");

        // (e e)
        let apply = expr
            .clone()
            .then(expr)
            .map(|(function, argument)| Term::apply(function, argument))
            .labelled("application");

        let compound =
            choice((lambda, arith, apply)).delimited_by(just(Token::LParen), just(Token::RParen));

        choice((number, name, compound))
    })
    .labelled("expression")
}

fn statement_parser() -> impl SimpleParser<Token, Statement> {
    let var = select! { Token::Name(var) => var }.labelled("name");

    let substitution = var
        .clone()
        .then_ignore(just(Token::Equals))
        .then(expr_parser())
        .delimited_by(just(Token::LBracket), just(Token::RBracket));
    let expr = expr_parser()
        .then(substitution.or_not())
        .map(|(term, substitution)| match substitution {
            None => Statement::Expr(term),
            Some((var, value)) => Statement::Substitute { term, var, value },
        });

    let free_variables = just(Token::Fv)
        .ignore_then(expr_parser().delimited_by(just(Token::LBracket), just(Token::RBracket)))
        .map(Statement::FreeVariables)
        .labelled("fv");

    let alpha = just(Token::Alpha)
        .ignore_then(
            expr_parser()
                .then_ignore(just(Token::Comma))
                .then(var)
                .delimited_by(just(Token::LBracket), just(Token::RBracket)),
        )
        .map(|(term, var)| Statement::Alpha(term, var))
        .labelled("alpha");

    choice((free_variables, alpha, expr))
        .then_ignore(just(Token::Semi))
        .then_ignore(end())
        .labelled("statement")
}

#[derive(Clone, Debug)]
pub enum ParseError {
    /// A character that starts no token.
    Lex(Vec<Error>),
    /// Tokens that do not form a statement.
    Syntax(Vec<Error>),
}
impl ParseError {
    pub fn errors(&self) -> &[Error] {
        match self {
            ParseError::Lex(es) | ParseError::Syntax(es) => es,
        }
    }
    pub fn into_errors(self) -> Vec<Error> {
        match self {
            ParseError::Lex(es) | ParseError::Syntax(es) => es,
        }
    }
}

fn stringify<T: std::fmt::Display + std::hash::Hash + Eq>(es: Vec<Error<T>>) -> Vec<Error> {
    es.into_iter().map(|e| e.map(|t| t.to_string())).collect()
}

pub fn tokenize(s: &str) -> Result<Vec<Spanned<Token>>, ParseError> {
    lexer()
        .parse(s)
        .map_err(|es| ParseError::Lex(stringify(es)))
}

/// The parser recurses once per bracket, each level taking several combinator frames.
const PARSER_STACK: usize = 64 * 1024 * 1024;

/// Rejects bracket nesting that would build a term deeper than [`MAX_DEPTH`].
fn check_nesting(tokens: &[Spanned<Token>]) -> Result<(), ParseError> {
    let mut depth = 0usize;
    for token in tokens {
        match token.value {
            Token::LParen | Token::LBracket => depth += 1,
            Token::RParen | Token::RBracket => depth = depth.saturating_sub(1),
            _ => continue,
        }
        if depth >= MAX_DEPTH {
            return Err(ParseError::Syntax(vec![Simple::custom(
                token.span.clone(),
                format!("Expression nested deeper than {MAX_DEPTH} levels"),
            )]));
        }
    }
    Ok(())
}

pub fn parse_statement(s: &str) -> Result<Statement, ParseError> {
    let len = s.chars().count();
    let eoi = len..len + 1;
    let tokens = tokenize(s)?;
    check_nesting(&tokens)?;
    stacker::grow(PARSER_STACK, || {
        statement_parser().parse(Stream::from_iter(eoi, tokens.into_iter().map(Into::into)))
    })
    .map_err(|es| ParseError::Syntax(stringify(es)))
}

/// Parses `e;`, rejecting the meta statements.
pub fn parse_term(s: &str) -> Result<Term, ParseError> {
    match parse_statement(s)? {
        Statement::Expr(term) => Ok(term),
        _ => Err(ParseError::Syntax(vec![Simple::custom(
            0..s.chars().count(),
            "Expected a plain expression statement",
        )])),
    }
}

/// One-line description of a parse error, in the same words the REPL report uses.
pub fn describe(e: &Error) -> String {
    use chumsky::error::SimpleReason;
    let found = e.found().map(String::as_str).unwrap_or("end of the input");
    match e.reason() {
        SimpleReason::Unexpected => {
            let mut expected = e
                .expected()
                .map(|t| t.as_ref().map(String::as_str).unwrap_or("end of the input"))
                .collect::<Vec<_>>();
            expected.sort_unstable();
            if expected.is_empty() {
                format!("Unexpected {found}")
            } else {
                format!("Unexpected {found}, expected {}", expected.join(", "))
            }
        }
        SimpleReason::Unclosed { delimiter, .. } => {
            format!("Unclosed delimiter {delimiter}, found {found}")
        }
        SimpleReason::Custom(msg) => msg.clone(),
    }
}
