use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

use crate::{
    arith,
    codec::{decode, encode, Document, DocumentError, NodeKind},
    parser::{self, ParseError, Statement},
    prelude::*,
    reduce::beta_reduce,
    subst::{alpha_rename, free_variables, substitute, FreshNames},
    term::{AddressedTerm, Node, Term, MAX_DEPTH},
};

#[derive(Debug, Error)]
pub enum EngineError {
    #[error("Illegal character `{found}`")]
    Lex { found: String, span: Span },
    #[error("Syntax error: {message}")]
    Syntax { message: String, span: Span },
    #[error("No node at address `{0}`")]
    InvalidAddress(String),
    #[error("Node `{0}` is not a beta-redex")]
    NotARedex(String),
    #[error("Node `{0}` is not an arithmetic operator")]
    NotAnOperator(String),
    #[error(transparent)]
    Document(#[from] DocumentError),
}

impl From<ParseError> for EngineError {
    fn from(e: ParseError) -> Self {
        let span = e.errors().first().map(|e| e.span()).unwrap_or_default();
        match e {
            ParseError::Lex(es) => EngineError::Lex {
                found: es
                    .first()
                    .and_then(|e| e.found().cloned())
                    .unwrap_or_else(|| "end of the input".to_string()),
                span,
            },
            ParseError::Syntax(es) => EngineError::Syntax {
                message: es.iter().map(parser::describe).collect::<Vec<_>>().join("; "),
                span,
            },
        }
    }
}

/// Result of [`parse`], shaped for callers that only speak JSON.
#[derive(PartialEq, Clone, Serialize, Deserialize, Debug)]
#[serde(tag = "status")]
pub enum ParseOutcome {
    #[serde(rename = "OK")]
    Ok { document: Document },
    #[serde(rename = "ERROR")]
    Error { message: String },
}

pub fn parse(text: &str) -> ParseOutcome {
    match try_parse(text) {
        Ok(document) => ParseOutcome::Ok { document },
        Err(e) => {
            debug!("rejected input: {e}");
            ParseOutcome::Error {
                message: e.to_string(),
            }
        }
    }
}

/// Parses one `e;` statement into an addressed document.
pub fn try_parse(text: &str) -> Result<Document, EngineError> {
    let term = parser::parse_term(text)?;
    debug!(%term, "parsed");
    emit(&term.readdress())
}

fn ingest(document: &Document) -> Result<AddressedTerm, EngineError> {
    Ok(decode(document)?.readdress())
}

/// Encodes a result, refusing one too deep for [`decode`] to take back.
fn emit(term: &AddressedTerm) -> Result<Document, EngineError> {
    let depth = term.depth();
    if depth > MAX_DEPTH {
        return Err(DocumentError::TooDeep { depth }.into());
    }
    Ok(encode(term))
}

/// One beta-reduction at `node_id`.
pub fn step(document: &Document, node_id: &str) -> Result<Document, EngineError> {
    let term = ingest(document)?;
    debug!(node_id, %term, "step");
    emit(&beta_reduce(&term, node_id)?)
}

/// Folds the operator at `node_id` and all arithmetic beneath it.
pub fn fold_arithmetic(document: &Document, node_id: &str) -> Result<Document, EngineError> {
    let term = ingest(document)?;
    debug!(node_id, %term, "fold");
    emit(&arith::fold_arithmetic(&term, node_id)?)
}

/// Re-flags and re-addresses a document received from elsewhere.
pub fn normalize(document: &Document) -> Result<Document, EngineError> {
    emit(&ingest(document)?)
}

pub fn render(document: &Document) -> Result<String, EngineError> {
    Ok(decode(document)?.to_string())
}

#[derive(PartialEq, Eq, Clone, Debug)]
pub struct Reducible {
    pub nodeid: String,
    pub kind: NodeKind,
}

/// Every node [`step`] or [`fold_arithmetic`] would accept, in pre-order.
pub fn reducible_nodes(document: &Document) -> Result<Vec<Reducible>, EngineError> {
    fn rec(term: &AddressedTerm, out: &mut Vec<Reducible>) {
        let reducible = |kind| Reducible {
            nodeid: term.address().to_string(),
            kind,
        };
        match term.node() {
            Node::Name(_) | Node::Number(_) => {}
            Node::Lambda(_, body) => rec(body, out),
            Node::Apply {
                function,
                argument,
                redex,
            } => {
                if *redex {
                    out.push(reducible(NodeKind::Apply));
                }
                rec(function, out);
                rec(argument, out);
            }
            Node::Op(_, lhs, rhs) => {
                out.push(reducible(NodeKind::Op));
                rec(lhs, out);
                rec(rhs, out);
            }
        }
    }
    let mut out = vec![];
    rec(&ingest(document)?, &mut out);
    Ok(out)
}

#[derive(PartialEq, Clone, Debug)]
pub enum Outcome {
    Expression(Document),
    Substituted(Document),
    FreeVariables(Vec<String>),
    Renamed(Document),
}

/// Runs any statement form, including the substitution, `fv` and `alpha` requests.
pub fn evaluate(statement: &Statement) -> Result<Outcome, EngineError> {
    let emit_term = |term: &Term| emit(&term.readdress());
    Ok(match statement {
        Statement::Expr(term) => Outcome::Expression(emit_term(term)?),
        Statement::Substitute { term, var, value } => {
            let mut fresh = FreshNames::avoiding([term, value]);
            let result = substitute(term, var, value, &mut fresh);
            debug!(%term, %var, %value, %result, "substituted");
            Outcome::Substituted(emit_term(&result)?)
        }
        Statement::FreeVariables(term) => Outcome::FreeVariables(
            free_variables(term)
                .into_iter()
                .map(|name| name.to_string())
                .collect(),
        ),
        Statement::Alpha(term, var) => {
            Outcome::Renamed(emit_term(&alpha_rename(term, var.clone()))?)
        }
    })
}
