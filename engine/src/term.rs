use std::rc::Rc;

use crate::prelude::*;

#[derive(PartialEq, Eq, Hash, Clone, Copy, derive_more::Display, Debug)]
pub enum Operator {
    #[display(fmt = "+")]
    Add,
    #[display(fmt = "-")]
    Sub,
    #[display(fmt = "*")]
    Mul,
    #[display(fmt = "/")]
    Div,
}
impl Operator {
    pub fn from_symbol(symbol: &str) -> Option<Self> {
        Some(match symbol {
            "+" => Self::Add,
            "-" => Self::Sub,
            "*" => Self::Mul,
            "/" => Self::Div,
            _ => return None,
        })
    }

    /// Division by zero gives NaN rather than an infinity.
    pub fn apply(self, lhs: f64, rhs: f64) -> f64 {
        match self {
            Self::Add => lhs + rhs,
            Self::Sub => lhs - rhs,
            Self::Mul => lhs * rhs,
            Self::Div if rhs != 0.0 => lhs / rhs,
            Self::Div => f64::NAN,
        }
    }
}

/// Position of a node relative to the root of one particular tree: `R` followed by one
/// digit per descent, `0` into the first (or only) child and `1` into the second.
#[derive(PartialEq, Eq, Hash, Clone, derive_more::Display, Debug)]
pub struct Address(String);
impl Address {
    pub const ROOT: &'static str = "R";

    pub fn root() -> Self {
        Self(Self::ROOT.to_string())
    }
    fn child(&self, branch: char) -> Self {
        let mut path = self.0.clone();
        path.push(branch);
        Self(path)
    }
    pub fn as_str(&self) -> &str {
        &self.0
    }
    pub fn descends_from(&self, ancestor: &Address) -> bool {
        self.0.starts_with(&ancestor.0)
    }
}

/// Deepest term the engine accepts or produces, counting the root as level 1.
pub const MAX_DEPTH: usize = 500;

#[derive(PartialEq, Clone, Debug)]
pub struct Annotated<C> {
    context: C,
    node: Rc<Node<C>>,
}

/// A term without addresses.
pub type Term = Annotated<()>;
/// A term whose every node carries its [`Address`]. Only meaningful for the single
/// snapshot it was computed from.
pub type AddressedTerm = Annotated<Address>;

#[derive(PartialEq, Debug)]
pub enum Node<C> {
    Name(Identifier),
    Number(f64),
    Lambda(Identifier, Annotated<C>),
    /// `redex` is true iff `function` was an abstraction when this node was last built.
    Apply {
        function: Annotated<C>,
        argument: Annotated<C>,
        redex: bool,
    },
    Op(Operator, Annotated<C>, Annotated<C>),
}

pub trait NodeVisitor<C, T> {
    fn visit_name(&mut self, context: &C, name: &Identifier) -> T;
    fn visit_number(&mut self, context: &C, value: f64) -> T;
    fn visit_lambda(&mut self, context: &C, var: &Identifier, body: &Annotated<C>) -> T;
    fn visit_apply(
        &mut self,
        context: &C,
        function: &Annotated<C>,
        argument: &Annotated<C>,
        redex: bool,
    ) -> T;
    fn visit_op(
        &mut self,
        context: &C,
        op: Operator,
        lhs: &Annotated<C>,
        rhs: &Annotated<C>,
    ) -> T;
}

impl<C> Annotated<C> {
    pub fn new(context: C, node: Rc<Node<C>>) -> Self {
        Self { context, node }
    }
    pub fn context(&self) -> &C {
        &self.context
    }
    pub fn node(&self) -> &Node<C> {
        &self.node
    }
    pub fn is_lambda(&self) -> bool {
        matches!(self.node(), Node::Lambda(_, _))
    }

    pub fn depth(&self) -> usize {
        1 + match self.node() {
            Node::Name(_) | Node::Number(_) => 0,
            Node::Lambda(_, body) => body.depth(),
            Node::Apply {
                function: lhs,
                argument: rhs,
                ..
            }
            | Node::Op(_, lhs, rhs) => lhs.depth().max(rhs.depth()),
        }
    }

    pub fn accept<T>(&self, visitor: &mut impl NodeVisitor<C, T>) -> T {
        match self.node() {
            Node::Name(name) => visitor.visit_name(&self.context, name),
            Node::Number(value) => visitor.visit_number(&self.context, *value),
            Node::Lambda(var, body) => visitor.visit_lambda(&self.context, var, body),
            Node::Apply {
                function,
                argument,
                redex,
            } => visitor.visit_apply(&self.context, function, argument, *redex),
            Node::Op(op, lhs, rhs) => visitor.visit_op(&self.context, *op, lhs, rhs),
        }
    }

    pub fn map_context<D>(&self, f: impl FnMut(&C) -> D) -> Annotated<D> {
        struct V<C, D, F>(F, std::marker::PhantomData<(C, D)>);
        impl<C, D, F: FnMut(&C) -> D> NodeVisitor<C, Annotated<D>> for V<C, D, F> {
            fn visit_name(&mut self, context: &C, name: &Identifier) -> Annotated<D> {
                Annotated::new((self.0)(context), Node::Name(name.clone()).into())
            }

            fn visit_number(&mut self, context: &C, value: f64) -> Annotated<D> {
                Annotated::new((self.0)(context), Node::Number(value).into())
            }

            fn visit_lambda(
                &mut self,
                context: &C,
                var: &Identifier,
                body: &Annotated<C>,
            ) -> Annotated<D> {
                let context = (self.0)(context);
                Annotated::new(context, Node::Lambda(var.clone(), body.accept(self)).into())
            }

            fn visit_apply(
                &mut self,
                context: &C,
                function: &Annotated<C>,
                argument: &Annotated<C>,
                redex: bool,
            ) -> Annotated<D> {
                let context = (self.0)(context);
                let node = Node::Apply {
                    function: function.accept(self),
                    argument: argument.accept(self),
                    redex,
                };
                Annotated::new(context, node.into())
            }

            fn visit_op(
                &mut self,
                context: &C,
                op: Operator,
                lhs: &Annotated<C>,
                rhs: &Annotated<C>,
            ) -> Annotated<D> {
                let context = (self.0)(context);
                Annotated::new(context, Node::Op(op, lhs.accept(self), rhs.accept(self)).into())
            }
        }
        self.accept(&mut V(f, std::marker::PhantomData))
    }

    pub fn forget_context(&self) -> Term {
        self.map_context(|_| ())
    }
}

impl From<Node<()>> for Term {
    fn from(n: Node<()>) -> Self {
        Self::new((), n.into())
    }
}

impl Term {
    pub fn name(name: Identifier) -> Self {
        Node::Name(name).into()
    }
    pub fn number(value: f64) -> Self {
        Node::Number(value).into()
    }
    pub fn lambda(var: Identifier, body: Term) -> Self {
        Node::Lambda(var, body).into()
    }
    pub fn apply(function: Term, argument: Term) -> Self {
        let redex = function.is_lambda();
        Node::Apply {
            function,
            argument,
            redex,
        }
        .into()
    }
    pub fn op(op: Operator, lhs: Term, rhs: Term) -> Self {
        Node::Op(op, lhs, rhs).into()
    }

    /// Rebuilds every application so its redex flag matches its current function position.
    pub fn recompute_redex_flags(&self) -> Term {
        match self.node() {
            Node::Name(_) | Node::Number(_) => self.clone(),
            Node::Lambda(var, body) => Term::lambda(var.clone(), body.recompute_redex_flags()),
            Node::Apply {
                function, argument, ..
            } => Term::apply(
                function.recompute_redex_flags(),
                argument.recompute_redex_flags(),
            ),
            Node::Op(op, lhs, rhs) => Term::op(
                *op,
                lhs.recompute_redex_flags(),
                rhs.recompute_redex_flags(),
            ),
        }
    }

    /// Recomputes redex flags, then addresses from the root. Every rewrite ends here.
    pub fn readdress(&self) -> AddressedTerm {
        self.recompute_redex_flags().assign_addresses()
    }

    pub fn assign_addresses(&self) -> AddressedTerm {
        self.assign_addresses_from(Address::root())
    }

    pub fn assign_addresses_from(&self, address: Address) -> AddressedTerm {
        let node = match self.node() {
            Node::Name(name) => Node::Name(name.clone()),
            Node::Number(value) => Node::Number(*value),
            Node::Lambda(var, body) => {
                Node::Lambda(var.clone(), body.assign_addresses_from(address.child('0')))
            }
            Node::Apply {
                function,
                argument,
                redex,
            } => Node::Apply {
                function: function.assign_addresses_from(address.child('0')),
                argument: argument.assign_addresses_from(address.child('1')),
                redex: *redex,
            },
            Node::Op(op, lhs, rhs) => Node::Op(
                *op,
                lhs.assign_addresses_from(address.child('0')),
                rhs.assign_addresses_from(address.child('1')),
            ),
        };
        AddressedTerm::new(address, node.into())
    }
}

impl AddressedTerm {
    pub fn address(&self) -> &Address {
        self.context()
    }

    pub fn strip_addresses(&self) -> Term {
        self.forget_context()
    }

    /// Finds the node at `address` in this snapshot.
    pub fn locate(&self, address: &str) -> Option<Located<'_>> {
        let path = address.strip_prefix(Address::ROOT)?;
        let mut node = self;
        for branch in path.chars() {
            node = match (node.node(), branch) {
                (Node::Lambda(_, body), '0') => body,
                (Node::Apply { function, .. }, '0') => function,
                (Node::Apply { argument, .. }, '1') => argument,
                (Node::Op(_, lhs, _), '0') => lhs,
                (Node::Op(_, _, rhs), '1') => rhs,
                _ => return None,
            };
        }
        (node.address().as_str() == address).then(|| Located { root: self, node })
    }
}

/// A node resolved against the snapshot that owns it.
#[derive(Clone, Copy, Debug)]
pub struct Located<'a> {
    root: &'a AddressedTerm,
    node: &'a AddressedTerm,
}
impl<'a> Located<'a> {
    pub fn node(&self) -> &'a AddressedTerm {
        self.node
    }

    /// The whole snapshot, without addresses, with this node replaced by `replacement`.
    /// Redex flags on the path to the root are left as they were.
    pub fn splice(&self, replacement: Term) -> Term {
        fn rec(term: &AddressedTerm, target: &Address, replacement: &Term) -> Term {
            if term.address() == target {
                return replacement.clone();
            }
            if !target.descends_from(term.address()) {
                return term.forget_context();
            }
            match term.node() {
                Node::Name(_) | Node::Number(_) => term.forget_context(),
                Node::Lambda(var, body) => Term::lambda(var.clone(), rec(body, target, replacement)),
                Node::Apply {
                    function,
                    argument,
                    redex,
                } => Node::Apply {
                    function: rec(function, target, replacement),
                    argument: rec(argument, target, replacement),
                    redex: *redex,
                }
                .into(),
                Node::Op(op, lhs, rhs) => Term::op(
                    *op,
                    rec(lhs, target, replacement),
                    rec(rhs, target, replacement),
                ),
            }
        }
        rec(self.root, self.node.address(), &replacement)
    }
}

impl<C> std::fmt::Display for Annotated<C> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        struct Render<'a, 'b>(&'a mut std::fmt::Formatter<'b>);
        impl<C> NodeVisitor<C, std::fmt::Result> for Render<'_, '_> {
            fn visit_name(&mut self, _: &C, name: &Identifier) -> std::fmt::Result {
                self.0.write_str(name)
            }

            fn visit_number(&mut self, _: &C, value: f64) -> std::fmt::Result {
                self.0.write_fmt(format_args!("{value}"))
            }

            fn visit_lambda(
                &mut self,
                _: &C,
                var: &Identifier,
                body: &Annotated<C>,
            ) -> std::fmt::Result {
                self.0.write_fmt(format_args!("(LAMBDA {var} "))?;
                body.accept(self)?;
                self.0.write_str(")")
            }

            fn visit_apply(
                &mut self,
                _: &C,
                function: &Annotated<C>,
                argument: &Annotated<C>,
                _: bool,
            ) -> std::fmt::Result {
                self.0.write_str("(")?;
                function.accept(self)?;
                self.0.write_str(" ")?;
                argument.accept(self)?;
                self.0.write_str(")")
            }

            fn visit_op(
                &mut self,
                _: &C,
                op: Operator,
                lhs: &Annotated<C>,
                rhs: &Annotated<C>,
            ) -> std::fmt::Result {
                self.0.write_fmt(format_args!("({op} "))?;
                lhs.accept(self)?;
                self.0.write_str(" ")?;
                rhs.accept(self)?;
                self.0.write_str(")")
            }
        }
        self.accept(&mut Render(f))
    }
}

#[cfg(test)]
mod test {
    use super::*;

    fn addresses(term: &AddressedTerm, out: &mut Vec<(String, Option<String>)>) {
        let children: Vec<&AddressedTerm> = match term.node() {
            Node::Name(_) | Node::Number(_) => vec![],
            Node::Lambda(_, body) => vec![body],
            Node::Apply {
                function, argument, ..
            } => vec![function, argument],
            Node::Op(_, lhs, rhs) => vec![lhs, rhs],
        };
        for child in children {
            out.push((
                child.address().to_string(),
                Some(term.address().to_string()),
            ));
            addresses(child, out);
        }
    }

    fn sample() -> Term {
        // ((LAMBDA X (+ X 1)) (Y 2))
        apply!(
            lambda!("X", op!(Operator::Add, name!("X"), num!(1.0))),
            apply!(name!("Y"), num!(2.0))
        )
    }

    #[test]
    fn test_addresses() {
        let term = sample().assign_addresses();
        assert_eq!(term.address().as_str(), "R");
        let mut seen = vec![];
        addresses(&term, &mut seen);
        let mut ids = seen.iter().map(|(id, _)| id.clone()).collect::<Vec<_>>();
        ids.push("R".to_string());
        ids.sort();
        ids.dedup();
        assert_eq!(ids.len(), seen.len() + 1);
        for (id, parent) in &seen {
            let parent = parent.as_ref().unwrap();
            assert_eq!(id.len(), parent.len() + 1);
            assert!(id.starts_with(parent.as_str()));
        }
        assert_eq!(
            ids,
            ["R", "R0", "R00", "R000", "R001", "R1", "R10", "R11"]
        );
    }

    #[test]
    fn test_strip_is_inverse() {
        let term = sample();
        assert_eq!(term.assign_addresses().strip_addresses(), term);
    }

    #[test]
    fn test_redex_flags() {
        let term = sample();
        assert!(matches!(term.node(), Node::Apply { redex: true, .. }));

        let stale: Term = Node::Apply {
            function: name!("F"),
            argument: num!(1.0),
            redex: true,
        }
        .into();
        assert_eq!(
            stale.recompute_redex_flags(),
            apply!(name!("F"), num!(1.0))
        );
        assert!(matches!(
            stale.recompute_redex_flags().node(),
            Node::Apply { redex: false, .. }
        ));
    }

    #[test]
    fn test_locate() {
        let term = sample().assign_addresses();
        let located = term.locate("R001").unwrap();
        assert_eq!(located.node().strip_addresses(), num!(1.0));
        assert!(term.locate("R2").is_none());
        assert!(term.locate("R0000").is_none());
        assert!(term.locate("").is_none());
        assert!(term.locate("X0").is_none());
    }

    #[test]
    fn test_splice() {
        let term = sample().assign_addresses();
        let located = term.locate("R10").unwrap();
        assert_eq!(
            located.splice(lambda!("Z", name!("Z"))).to_string(),
            "((LAMBDA X (+ X 1)) ((LAMBDA Z Z) 2))"
        );
    }

    #[test]
    fn test_render() {
        assert_eq!(sample().to_string(), "((LAMBDA X (+ X 1)) (Y 2))");
        assert_eq!(num!(2.5).to_string(), "2.5");
        assert_eq!(
            op!(Operator::Div, num!(1.0), num!(0.0)).to_string(),
            "(/ 1 0)"
        );
    }

    #[test]
    fn test_depth() {
        assert_eq!(num!(1.0).depth(), 1);
        assert_eq!(sample().depth(), 4);
        assert_eq!(sample().assign_addresses().depth(), 4);
    }

    #[test]
    fn test_operator() {
        assert_eq!(Operator::Sub.apply(1.0, 3.0), -2.0);
        assert_eq!(Operator::Div.apply(1.0, 4.0), 0.25);
        assert!(Operator::Div.apply(1.0, 0.0).is_nan());
        assert_eq!(Operator::from_symbol("*"), Some(Operator::Mul));
        assert_eq!(Operator::from_symbol("%"), None);
    }
}
