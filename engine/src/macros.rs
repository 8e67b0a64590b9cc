macro_rules! name {
    ($x:expr) => {
        $crate::term::Term::name($crate::prelude::Identifier::new($x.to_string()))
    };
}
macro_rules! num {
    ($v:expr) => {
        $crate::term::Term::number($v)
    };
}
macro_rules! lambda {
    ($x:expr, $body:expr) => {
        $crate::term::Term::lambda($crate::prelude::Identifier::new($x.to_string()), $body)
    };
}
macro_rules! apply {
    ($lhs:expr, $rhs:expr) => {
        $crate::term::Term::apply($lhs, $rhs)
    };
}
macro_rules! op {
    ($op:expr, $lhs:expr, $rhs:expr) => {
        $crate::term::Term::op($op, $lhs, $rhs)
    };
}
