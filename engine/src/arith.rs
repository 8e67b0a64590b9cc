use tracing::debug;

use crate::{
    engine::EngineError,
    term::{AddressedTerm, Node, Operator, Term},
};

/// Folds the operator at `address` together with everything beneath both of its operands.
///
/// Unlike [`crate::reduce::beta_reduce`] this is not a single step: nested operators
/// (including ones under abstractions and applications inside the operands) are folded
/// bottom-up first. Nodes outside the target subtree are untouched.
pub fn fold_arithmetic(term: &AddressedTerm, address: &str) -> Result<AddressedTerm, EngineError> {
    let located = term
        .locate(address)
        .ok_or_else(|| EngineError::InvalidAddress(address.to_string()))?;
    let Node::Op(op, lhs, rhs) = located.node().node() else {
        return Err(EngineError::NotAnOperator(address.to_string()));
    };
    let folded = combine(
        *op,
        fold(&lhs.strip_addresses()),
        fold(&rhs.strip_addresses()),
    );
    debug!(address, %folded, "folded");
    Ok(located.splice(folded).readdress())
}

pub fn fold(term: &Term) -> Term {
    match term.node() {
        Node::Name(_) | Node::Number(_) => term.clone(),
        Node::Lambda(var, body) => Term::lambda(var.clone(), fold(body)),
        Node::Apply {
            function,
            argument,
            redex,
        } => Node::Apply {
            function: fold(function),
            argument: fold(argument),
            redex: *redex,
        }
        .into(),
        Node::Op(op, lhs, rhs) => combine(*op, fold(lhs), fold(rhs)),
    }
}

fn combine(op: Operator, lhs: Term, rhs: Term) -> Term {
    match (lhs.node(), rhs.node()) {
        (Node::Number(lhs), Node::Number(rhs)) => Term::number(op.apply(*lhs, *rhs)),
        _ => Term::op(op, lhs, rhs),
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::parser::parse_term;

    fn fold_at(input: &str, address: &str) -> Result<AddressedTerm, EngineError> {
        fold_arithmetic(&parse_term(input).unwrap().readdress(), address)
    }

    #[test]
    fn test_fold() {
        assert_eq!(
            fold_at("(+ 2 3);", "R").unwrap().strip_addresses(),
            num!(5.0)
        );
        assert_eq!(
            fold_at("(- 2 3.5);", "R").unwrap().strip_addresses(),
            num!(-1.5)
        );
    }

    #[test]
    fn test_fold_is_deep() {
        assert_eq!(
            fold_at("(* (+ 1 2) 4);", "R").unwrap().strip_addresses(),
            num!(12.0)
        );
        assert_eq!(
            fold_at("(+ ((lambda x (+ x (* 1 2))) 3) 1);", "R")
                .unwrap()
                .to_string(),
            "(+ ((LAMBDA X (+ X 2)) 3) 1)"
        );
    }

    #[test]
    fn test_division_by_zero() {
        let result = fold_at("(/ 1 0);", "R").unwrap();
        let Node::Number(value) = result.node() else {
            panic!("expected a number");
        };
        assert!(value.is_nan());
        assert_eq!(result.to_string(), "NaN");
    }

    #[test]
    fn test_partial_fold() {
        assert_eq!(
            fold_at("(+ x (* 2 3));", "R").unwrap().to_string(),
            "(+ X 6)"
        );
        assert_eq!(fold_at("(+ x y);", "R").unwrap().to_string(), "(+ X Y)");
    }

    #[test]
    fn test_outside_is_untouched() {
        assert_eq!(
            fold_at("(+ (* 2 3) (* 4 5));", "R0").unwrap().to_string(),
            "(+ 6 (* 4 5))"
        );
        let result = fold_at("((lambda x (+ 1 1)) (+ 2 2));", "R1").unwrap();
        assert_eq!(result.to_string(), "((LAMBDA X (+ 1 1)) 4)");
        assert!(matches!(result.node(), Node::Apply { redex: true, .. }));
        assert_eq!(result.locate("R1").unwrap().node().address().as_str(), "R1");
    }

    #[test]
    fn test_errors() {
        assert!(matches!(
            fold_at("((lambda x x) 5);", "R"),
            Err(EngineError::NotAnOperator(id)) if id == "R"
        ));
        assert!(matches!(
            fold_at("(+ 1 2);", "R01"),
            Err(EngineError::InvalidAddress(_))
        ));
    }
}
