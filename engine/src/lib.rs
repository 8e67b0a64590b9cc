//! Stepwise reduction engine for the untyped lambda calculus with arithmetic.
//!
//! A caller parses text into a [`Document`], picks a node by its `nodeid`, and asks the
//! engine to beta-reduce ([`step`]) or fold ([`fold_arithmetic`]) exactly there. Every
//! returned document is re-addressed from scratch, so ids from an older document must not
//! be reused.

#[cfg(test)]
#[macro_use]
mod macros;

pub mod arith;
pub mod codec;
pub mod engine;
pub mod parser;
pub mod prelude;
pub mod reduce;
pub mod subst;
pub mod term;

pub use codec::{Beta, Document, DocumentError, NodeKind};
pub use engine::{
    evaluate, fold_arithmetic, normalize, parse, reducible_nodes, render, step, try_parse,
    EngineError, Outcome, ParseOutcome, Reducible,
};
