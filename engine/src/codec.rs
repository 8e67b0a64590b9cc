use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::{
    prelude::*,
    term::{AddressedTerm, Node, Operator, Term, MAX_DEPTH},
};

#[derive(PartialEq, Eq, Hash, Clone, Copy, Serialize, Deserialize, derive_more::Display, Debug)]
#[serde(rename_all = "lowercase")]
pub enum NodeKind {
    #[display(fmt = "name")]
    Name,
    #[display(fmt = "num")]
    Num,
    #[display(fmt = "lambda")]
    Lambda,
    #[display(fmt = "apply")]
    Apply,
    #[display(fmt = "op")]
    Op,
}

#[derive(PartialEq, Eq, Hash, Clone, Copy, Serialize, Deserialize, Debug)]
pub enum Beta {
    #[serde(rename = "YES")]
    Yes,
    #[serde(rename = "NO")]
    No,
}

/// The tree exchanged with callers. One record per node, children in order.
#[derive(PartialEq, Eq, Clone, Serialize, Deserialize, Debug)]
pub struct Document {
    pub nodeid: String,
    #[serde(rename = "type")]
    pub kind: NodeKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub var: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub beta: Option<Beta>,
    #[serde(default)]
    pub children: Vec<Document>,
}

#[derive(Debug, Error)]
pub enum DocumentError {
    #[error("Node `{nodeid}` of type {kind} has no `{field}`")]
    MissingField {
        nodeid: String,
        kind: NodeKind,
        field: &'static str,
    },
    #[error("Node `{nodeid}` of type {kind} has {found} children, expected {expected}")]
    ChildCount {
        nodeid: String,
        kind: NodeKind,
        expected: usize,
        found: usize,
    },
    #[error("Node `{nodeid}` holds `{value}`, which is not a number")]
    InvalidNumber { nodeid: String, value: String },
    #[error("Node `{nodeid}` holds `{value}`, which is not an operator")]
    UnknownOperator { nodeid: String, value: String },
    #[error("Document is {depth} levels deep, the limit is {}", MAX_DEPTH)]
    TooDeep { depth: usize },
    #[error("Malformed JSON: {0}")]
    Json(#[from] serde_json::Error),
}

impl Document {
    pub fn to_json(&self) -> String {
        // A tree of strings and enums always serialises.
        serde_json::to_string(self).unwrap_or_default()
    }

    pub fn to_json_pretty(&self) -> String {
        serde_json::to_string_pretty(self).unwrap_or_default()
    }

    /// Each tree level takes two JSON levels (the node and its `children`), so the nesting
    /// is checked up front and serde_json's own recursion limit is lifted.
    pub fn from_json(json: &str) -> Result<Self, DocumentError> {
        let nesting = json_nesting(json);
        if nesting > 2 * MAX_DEPTH {
            return Err(DocumentError::TooDeep {
                depth: (nesting + 1) / 2,
            });
        }
        let mut deserializer = serde_json::Deserializer::from_str(json);
        deserializer.disable_recursion_limit();
        let document = Self::deserialize(serde_stacker::Deserializer::new(&mut deserializer))?;
        deserializer.end()?;
        Ok(document)
    }

    /// Number of levels, counting this node as 1.
    pub fn depth(&self) -> usize {
        let mut deepest = 0;
        let mut pending = vec![(self, 1)];
        while let Some((document, depth)) = pending.pop() {
            deepest = deepest.max(depth);
            pending.extend(document.children.iter().map(|child| (child, depth + 1)));
        }
        deepest
    }

    fn field(&self, field: &'static str, value: &Option<String>) -> Result<String, DocumentError> {
        value.clone().ok_or_else(|| DocumentError::MissingField {
            nodeid: self.nodeid.clone(),
            kind: self.kind,
            field,
        })
    }

    fn children<const N: usize>(&self) -> Result<&[Document; N], DocumentError> {
        self.children
            .as_slice()
            .try_into()
            .map_err(|_| DocumentError::ChildCount {
                nodeid: self.nodeid.clone(),
                kind: self.kind,
                expected: N,
                found: self.children.len(),
            })
    }
}

/// Deepest `{`/`[` nesting outside string literals.
fn json_nesting(json: &str) -> usize {
    let (mut depth, mut deepest) = (0usize, 0);
    let (mut in_string, mut escaped) = (false, false);
    for c in json.chars() {
        match c {
            _ if escaped => escaped = false,
            '\\' if in_string => escaped = true,
            '"' => in_string = !in_string,
            _ if in_string => {}
            '{' | '[' => {
                depth += 1;
                deepest = deepest.max(depth);
            }
            '}' | ']' => depth = depth.saturating_sub(1),
            _ => {}
        }
    }
    deepest
}

pub fn encode(term: &AddressedTerm) -> Document {
    fn leaf(nodeid: String, kind: NodeKind, value: String) -> Document {
        Document {
            nodeid,
            kind,
            value: Some(value),
            var: None,
            beta: None,
            children: vec![],
        }
    }
    let nodeid = term.address().to_string();
    match term.node() {
        Node::Name(name) => leaf(nodeid, NodeKind::Name, name.to_string()),
        Node::Number(value) => leaf(nodeid, NodeKind::Num, value.to_string()),
        Node::Lambda(var, body) => Document {
            nodeid,
            kind: NodeKind::Lambda,
            value: None,
            var: Some(var.to_string()),
            beta: None,
            children: vec![encode(body)],
        },
        Node::Apply {
            function,
            argument,
            redex,
        } => Document {
            nodeid,
            kind: NodeKind::Apply,
            value: None,
            var: None,
            beta: Some(if *redex { Beta::Yes } else { Beta::No }),
            children: vec![encode(function), encode(argument)],
        },
        Node::Op(op, lhs, rhs) => Document {
            nodeid,
            kind: NodeKind::Op,
            value: Some(op.to_string()),
            var: None,
            beta: None,
            children: vec![encode(lhs), encode(rhs)],
        },
    }
}

/// Rebuilds the bare term. `nodeid`s are ignored and a missing `beta` reads as `NO`;
/// callers re-flag and re-address the result.
pub fn decode(document: &Document) -> Result<Term, DocumentError> {
    let depth = document.depth();
    if depth > MAX_DEPTH {
        return Err(DocumentError::TooDeep { depth });
    }
    decode_node(document)
}

fn decode_node(document: &Document) -> Result<Term, DocumentError> {
    Ok(match document.kind {
        NodeKind::Name => {
            document.children::<0>()?;
            Term::name(Identifier::new(document.field("value", &document.value)?))
        }
        NodeKind::Num => {
            document.children::<0>()?;
            let value = document.field("value", &document.value)?;
            let number = value
                .trim()
                .parse::<f64>()
                .map_err(|_| DocumentError::InvalidNumber {
                    nodeid: document.nodeid.clone(),
                    value,
                })?;
            Term::number(number)
        }
        NodeKind::Lambda => {
            let [body] = document.children::<1>()?;
            let var = document.field("var", &document.var)?;
            Term::lambda(Identifier::new(var), decode_node(body)?)
        }
        NodeKind::Apply => {
            let [function, argument] = document.children::<2>()?;
            Node::Apply {
                function: decode_node(function)?,
                argument: decode_node(argument)?,
                redex: document.beta == Some(Beta::Yes),
            }
            .into()
        }
        NodeKind::Op => {
            let [lhs, rhs] = document.children::<2>()?;
            let symbol = document.field("value", &document.value)?;
            let op = Operator::from_symbol(&symbol).ok_or_else(|| {
                DocumentError::UnknownOperator {
                    nodeid: document.nodeid.clone(),
                    value: symbol.clone(),
                }
            })?;
            Term::op(op, decode_node(lhs)?, decode_node(rhs)?)
        }
    })
}
