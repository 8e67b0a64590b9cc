use tracing::debug;

use crate::{
    engine::EngineError,
    subst::{substitute, FreshNames},
    term::{AddressedTerm, Node},
};

/// Beta-reduces the application at `address`, and only that one.
///
/// Fails with [`EngineError::InvalidAddress`] when this snapshot has no such node and with
/// [`EngineError::NotARedex`] when the node is not an application of an abstraction.
pub fn beta_reduce(term: &AddressedTerm, address: &str) -> Result<AddressedTerm, EngineError> {
    let located = term
        .locate(address)
        .ok_or_else(|| EngineError::InvalidAddress(address.to_string()))?;
    let Node::Apply {
        function,
        argument,
        redex: true,
    } = located.node().node()
    else {
        return Err(EngineError::NotARedex(address.to_string()));
    };
    let Node::Lambda(var, body) = function.node() else {
        return Err(EngineError::NotARedex(address.to_string()));
    };

    let mut fresh = FreshNames::avoiding([&term.strip_addresses()]);
    let reduced = substitute(
        &body.strip_addresses(),
        var,
        &argument.strip_addresses(),
        &mut fresh,
    );
    debug!(address, %reduced, "beta-reduced");
    Ok(located.splice(reduced).readdress())
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::{parser::parse_term, term::Term};

    fn step(input: &str, address: &str) -> Result<AddressedTerm, EngineError> {
        beta_reduce(&parse_term(input).unwrap().readdress(), address)
    }

    #[test]
    fn test_identity() {
        let result = step("((lambda x x) 5);", "R").unwrap();
        assert_eq!(result.strip_addresses(), num!(5.0));
        assert_eq!(result.address().as_str(), "R");
    }

    #[test]
    fn test_only_target_is_reduced() {
        let result = step("(((lambda x x) a) ((lambda y y) b));", "R1").unwrap();
        assert_eq!(result.to_string(), "(((LAMBDA X X) A) B)");
        let result = step("(lambda z ((lambda x (x z)) w));", "R0").unwrap();
        assert_eq!(result.to_string(), "(LAMBDA Z (W Z))");
    }

    #[test]
    fn test_new_redex_is_flagged() {
        let result = step("((lambda f (f 1)) (lambda x x));", "R").unwrap();
        assert_eq!(result.to_string(), "((LAMBDA X X) 1)");
        assert!(matches!(result.node(), Node::Apply { redex: true, .. }));
        let result = beta_reduce(&result, "R").unwrap();
        assert_eq!(result.strip_addresses(), num!(1.0));
    }

    #[test]
    fn test_capture_during_step() {
        let result = step("((lambda x (lambda y x)) y);", "R").unwrap();
        assert_eq!(result.strip_addresses(), lambda!("_0", name!("Y")));
    }

    #[test]
    fn test_fresh_names_do_not_repeat() {
        let term: Term = apply!(
            lambda!("X", lambda!("Y", apply!(name!("X"), name!("_0")))),
            name!("Y")
        );
        let result = beta_reduce(&term.readdress(), "R").unwrap();
        assert_eq!(
            result.strip_addresses(),
            lambda!("_1", apply!(name!("Y"), name!("_0")))
        );
    }

    #[test]
    fn test_errors() {
        assert!(matches!(
            step("(f 5);", "R"),
            Err(EngineError::NotARedex(id)) if id == "R"
        ));
        assert!(matches!(
            step("((lambda x x) 5);", "R0"),
            Err(EngineError::NotARedex(_))
        ));
        assert!(matches!(
            step("((lambda x x) 5);", "R2"),
            Err(EngineError::InvalidAddress(id)) if id == "R2"
        ));
        assert!(matches!(
            step("5;", "R0"),
            Err(EngineError::InvalidAddress(_))
        ));
    }
}
