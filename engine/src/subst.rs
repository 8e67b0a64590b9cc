use std::collections::BTreeSet;

use crate::{
    prelude::*,
    term::{Annotated, Node, NodeVisitor, Operator, Term},
};

pub fn free_variables<C>(term: &Annotated<C>) -> BTreeSet<Identifier> {
    struct V;
    impl<C> NodeVisitor<C, BTreeSet<Identifier>> for V {
        fn visit_name(&mut self, _: &C, name: &Identifier) -> BTreeSet<Identifier> {
            BTreeSet::from([name.clone()])
        }

        fn visit_number(&mut self, _: &C, _: f64) -> BTreeSet<Identifier> {
            BTreeSet::new()
        }

        fn visit_lambda(
            &mut self,
            _: &C,
            var: &Identifier,
            body: &Annotated<C>,
        ) -> BTreeSet<Identifier> {
            let mut free = body.accept(self);
            free.remove(var);
            free
        }

        fn visit_apply(
            &mut self,
            _: &C,
            function: &Annotated<C>,
            argument: &Annotated<C>,
            _: bool,
        ) -> BTreeSet<Identifier> {
            let mut free = function.accept(self);
            free.extend(argument.accept(self));
            free
        }

        fn visit_op(
            &mut self,
            _: &C,
            _: Operator,
            lhs: &Annotated<C>,
            rhs: &Annotated<C>,
        ) -> BTreeSet<Identifier> {
            let mut free = lhs.accept(self);
            free.extend(rhs.accept(self));
            free
        }
    }
    term.accept(&mut V)
}

/// Source of `_0`, `_1`, ... for alpha-renaming.
///
/// The lexer only produces names starting with a letter, so these never clash with user
/// input. Seed it with [`FreshNames::avoid`] on every term in play so names minted by an
/// earlier step are skipped as well.
#[derive(Clone, Default, Debug)]
pub struct FreshNames {
    next: usize,
}
impl FreshNames {
    pub fn avoiding<'a>(terms: impl IntoIterator<Item = &'a Term>) -> Self {
        let mut names = Self::default();
        for term in terms {
            names.avoid(term);
        }
        names
    }

    pub fn avoid(&mut self, term: &Term) {
        let mut bump = |name: &Identifier| {
            if let Some(index) = name.strip_prefix('_').and_then(|n| n.parse::<usize>().ok()) {
                self.next = self.next.max(index + 1);
            }
        };
        fn rec(term: &Term, bump: &mut impl FnMut(&Identifier)) {
            match term.node() {
                Node::Name(name) => bump(name),
                Node::Number(_) => {}
                Node::Lambda(var, body) => {
                    bump(var);
                    rec(body, bump);
                }
                Node::Apply {
                    function: lhs,
                    argument: rhs,
                    ..
                }
                | Node::Op(_, lhs, rhs) => {
                    rec(lhs, bump);
                    rec(rhs, bump);
                }
            }
        }
        rec(term, &mut bump);
    }

    pub fn fresh(&mut self) -> Identifier {
        let name = Identifier::new(format!("_{}", self.next));
        self.next += 1;
        name
    }
}

/// Replaces the free occurrences of `old` with `new`, stopping at binders of `old`.
fn rename_free(term: &Term, old: &Identifier, new: &Identifier) -> Term {
    match term.node() {
        Node::Name(name) if name == old => Term::name(new.clone()),
        Node::Name(_) | Node::Number(_) => term.clone(),
        Node::Lambda(var, _) if var == old => term.clone(),
        Node::Lambda(var, body) => Term::lambda(var.clone(), rename_free(body, old, new)),
        Node::Apply {
            function,
            argument,
            redex,
        } => Node::Apply {
            function: rename_free(function, old, new),
            argument: rename_free(argument, old, new),
            redex: *redex,
        }
        .into(),
        Node::Op(op, lhs, rhs) => {
            Term::op(*op, rename_free(lhs, old, new), rename_free(rhs, old, new))
        }
    }
}

/// Renames the binder of an abstraction. Anything else is returned unchanged.
pub fn alpha_rename(term: &Term, new: Identifier) -> Term {
    match term.node() {
        Node::Lambda(var, body) => {
            let body = rename_free(body, var, &new);
            Term::lambda(new, body)
        }
        _ => term.clone(),
    }
}

/// Capture-avoiding `term[var := value]`.
///
/// Applications keep their old redex flags; run [`Term::recompute_redex_flags`] on the
/// result.
pub fn substitute(term: &Term, var: &Identifier, value: &Term, fresh: &mut FreshNames) -> Term {
    fn rec(
        term: &Term,
        var: &Identifier,
        value: &Term,
        value_free: &BTreeSet<Identifier>,
        fresh: &mut FreshNames,
    ) -> Term {
        match term.node() {
            Node::Name(name) if name == var => value.clone(),
            Node::Name(_) | Node::Number(_) => term.clone(),
            Node::Lambda(bound, _) if bound == var => term.clone(),
            Node::Lambda(bound, body) if !value_free.contains(bound) => {
                Term::lambda(bound.clone(), rec(body, var, value, value_free, fresh))
            }
            Node::Lambda(bound, body) => {
                let renamed = fresh.fresh();
                let body = rename_free(body, bound, &renamed);
                Term::lambda(renamed, rec(&body, var, value, value_free, fresh))
            }
            Node::Apply {
                function,
                argument,
                redex,
            } => Node::Apply {
                function: rec(function, var, value, value_free, fresh),
                argument: rec(argument, var, value, value_free, fresh),
                redex: *redex,
            }
            .into(),
            Node::Op(op, lhs, rhs) => Term::op(
                *op,
                rec(lhs, var, value, value_free, fresh),
                rec(rhs, var, value, value_free, fresh),
            ),
        }
    }
    rec(term, var, value, &free_variables(value), fresh)
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::parser::parse_term;

    fn ident(s: &str) -> Identifier {
        Identifier::new(s.to_string())
    }

    fn subst(term: &str, var: &str, value: &str) -> Term {
        let term = parse_term(term).unwrap();
        let value = parse_term(value).unwrap();
        let mut fresh = FreshNames::avoiding([&term, &value]);
        substitute(&term, &ident(var), &value, &mut fresh).recompute_redex_flags()
    }

    #[test]
    fn test_free_variables() {
        let term = parse_term("((lambda x (+ x y)) (lambda y (z 1)));").unwrap();
        assert_eq!(
            free_variables(&term),
            BTreeSet::from([ident("Y"), ident("Z")])
        );
        assert!(free_variables(&parse_term("(lambda x 3);").unwrap()).is_empty());
        assert_eq!(
            free_variables(&term.assign_addresses()),
            free_variables(&term)
        );
    }

    #[test]
    fn test_substitute() {
        assert_eq!(subst("(x (y x));", "X", "5;"), parse_term("(5 (Y 5));").unwrap());
        assert_eq!(subst("(+ x 1);", "X", "2;"), parse_term("(+ 2 1);").unwrap());
        assert_eq!(
            subst("(lambda y (x y));", "X", "z;"),
            parse_term("(lambda y (z y));").unwrap()
        );
    }

    #[test]
    fn test_shadowed_binder() {
        assert_eq!(subst("(lambda x x);", "X", "y;"), lambda!("X", name!("X")));
    }

    #[test]
    fn test_capture_is_avoided() {
        let result = subst("(lambda y x);", "X", "y;");
        assert_eq!(result, lambda!("_0", name!("Y")));
        let Node::Lambda(var, _) = result.node() else {
            panic!("expected an abstraction");
        };
        assert!(!free_variables(&result).is_empty());
        assert_ne!(var.as_str(), "Y");
    }

    #[test]
    fn test_capture_renames_inner_occurrences() {
        assert_eq!(
            subst("(lambda y (lambda z (x (y z))));", "X", "(y z);"),
            lambda!(
                "_0",
                lambda!(
                    "_1",
                    apply!(
                        apply!(name!("Y"), name!("Z")),
                        apply!(name!("_0"), name!("_1"))
                    )
                )
            )
        );
    }

    #[test]
    fn test_substitution_keeps_redex_flags() {
        let term = parse_term("(f 1);").unwrap();
        let value = parse_term("(lambda x x);").unwrap();
        let result = substitute(&term, &ident("F"), &value, &mut FreshNames::default());
        assert!(matches!(result.node(), Node::Apply { redex: false, .. }));
        assert!(matches!(
            result.recompute_redex_flags().node(),
            Node::Apply { redex: true, .. }
        ));
    }

    #[test]
    fn test_alpha_rename() {
        let term = parse_term("(lambda x (x (lambda x x)));").unwrap();
        assert_eq!(
            alpha_rename(&term, ident("Z")),
            lambda!(
                "Z",
                apply!(name!("Z"), lambda!("X", name!("X")))
            )
        );
        let term = parse_term("(x y);").unwrap();
        assert_eq!(alpha_rename(&term, ident("Z")), term);
    }

    #[test]
    fn test_fresh_names() {
        let term = lambda!("_4", apply!(name!("_1"), name!("_X")));
        let mut fresh = FreshNames::avoiding([&term]);
        assert_eq!(fresh.fresh(), ident("_5"));
        assert_eq!(fresh.fresh(), ident("_6"));
        assert_eq!(FreshNames::default().fresh(), ident("_0"));
    }
}
