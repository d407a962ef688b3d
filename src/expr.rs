//! Terms of a generalized algebraic theory.
//!
//! An [`Expr`] is a variable, an operator application or a sort. Every
//! constructor validates the local shape, so a value of type `Expr` is always
//! well formed:
//!
//! - the symbol is non-empty;
//! - a variable has exactly one child, which is a sort;
//! - only the first child of an application may be a sort (the elaborated
//!   sort prepended by [`Theory::upgrade`](crate::theory::Theory::upgrade));
//! - a sort has no sort children.
//!
//! Positions are index paths from the root; the empty path is the root.
//! Matching returns a [`MatchDict`], where failure is a dictionary holding
//! the reserved empty key.

use crate::error::ValidationError;
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

/// Index path from the root of a term to one of its subterms.
pub type Position = Vec<usize>;

/// The three kinds of term.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ExprKind {
    Var,
    App,
    Sort,
}

impl ExprKind {
    /// Stable one-byte tag used in canonical encodings.
    pub const fn tag(self) -> u8 {
        match self {
            ExprKind::Var => 0,
            ExprKind::App => 1,
            ExprKind::Sort => 2,
        }
    }
}

/// A well-formed term.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Expr {
    sym: String,
    kind: ExprKind,
    args: Vec<Expr>,
}

impl Expr {
    /// Builds a term after checking its local shape.
    pub fn new(
        sym: impl Into<String>,
        kind: ExprKind,
        args: Vec<Expr>,
    ) -> Result<Self, ValidationError> {
        let sym = sym.into();
        check_shape(&sym, kind, &args)?;
        Ok(Self { sym, kind, args })
    }

    /// Variable `name` of sort `sort`.
    pub fn var(name: impl Into<String>, sort: Expr) -> Result<Self, ValidationError> {
        Self::new(name, ExprKind::Var, vec![sort])
    }

    /// Operator application.
    pub fn app(sym: impl Into<String>, args: Vec<Expr>) -> Result<Self, ValidationError> {
        Self::new(sym, ExprKind::App, args)
    }

    /// Sort (type) expression.
    pub fn sort(sym: impl Into<String>, args: Vec<Expr>) -> Result<Self, ValidationError> {
        Self::new(sym, ExprKind::Sort, args)
    }

    /// Builds without checking. Callers guarantee the shape invariants.
    pub(crate) fn from_parts(sym: String, kind: ExprKind, args: Vec<Expr>) -> Self {
        debug_assert!(check_shape(&sym, kind, &args).is_ok(), "malformed term {}", sym);
        Self { sym, kind, args }
    }

    pub fn sym(&self) -> &str {
        &self.sym
    }

    pub fn kind(&self) -> ExprKind {
        self.kind
    }

    pub fn args(&self) -> &[Expr] {
        &self.args
    }

    pub fn is_var(&self) -> bool {
        self.kind == ExprKind::Var
    }

    pub fn is_app(&self) -> bool {
        self.kind == ExprKind::App
    }

    pub fn is_sort(&self) -> bool {
        self.kind == ExprKind::Sort
    }

    /// True for an application whose first child is its elaborated sort.
    pub fn is_elaborated_app(&self) -> bool {
        self.is_app() && self.args.first().map_or(false, Expr::is_sort)
    }

    /// The sort carried by this term: the child of a variable, or the
    /// leading sort child of an elaborated application.
    pub fn sort_of(&self) -> Option<&Expr> {
        match self.kind {
            ExprKind::Var => self.args.first(),
            ExprKind::App if self.is_elaborated_app() => self.args.first(),
            _ => None,
        }
    }

    /// Children that are not the leading elaborated sort.
    pub fn operands(&self) -> &[Expr] {
        if self.is_elaborated_app() {
            &self.args[1..]
        } else {
            &self.args
        }
    }

    /// Subterm at `pos`, or `None` if the path leaves the term.
    pub fn subexpr(&self, pos: &[usize]) -> Option<&Expr> {
        let mut current = self;
        for &i in pos {
            current = current.args.get(i)?;
        }
        Some(current)
    }

    /// All positions in deterministic preorder, root first.
    pub fn positions(&self) -> Vec<Position> {
        let mut positions = Vec::new();
        let mut stack: Vec<(Position, &Expr)> = vec![(Vec::new(), self)];
        while let Some((path, expr)) = stack.pop() {
            for (i, arg) in expr.args.iter().enumerate().rev() {
                let mut child = path.clone();
                child.push(i);
                stack.push((child, arg));
            }
            positions.push(path);
        }
        positions
    }

    /// Maximum path length to a leaf.
    pub fn depth(&self) -> usize {
        self.args.iter().map(|a| a.depth() + 1).max().unwrap_or(0)
    }

    /// Collects every symbol occurring in the term.
    pub fn collect_symbols(&self, out: &mut BTreeSet<String>) {
        out.insert(self.sym.clone());
        for arg in &self.args {
            arg.collect_symbols(out);
        }
    }

    /// Names of all variables occurring in the term, including inside sorts.
    pub fn var_names(&self) -> BTreeSet<String> {
        let mut out = BTreeSet::new();
        self.collect_var_names(&mut out);
        out
    }

    fn collect_var_names(&self, out: &mut BTreeSet<String>) {
        if self.is_var() {
            out.insert(self.sym.clone());
        }
        for arg in &self.args {
            arg.collect_var_names(out);
        }
    }

    /// Matches `self` as a pattern against the concrete term `concrete`.
    ///
    /// A pattern variable matches any subterm that carries a sort, and its
    /// declared sort is matched against that sort. Anything else must agree
    /// on kind, symbol and number of children. Conflicting bindings and
    /// mismatches produce a failed dictionary.
    pub fn patmatch(&self, concrete: &Expr) -> MatchDict {
        if self.is_var() {
            let Some(concrete_sort) = concrete.sort_of() else {
                return MatchDict::failed();
            };
            let mut dict = MatchDict::new();
            dict.bind(&self.sym, concrete.clone());
            return dict.merge(self.args[0].patmatch(concrete_sort));
        }
        if self.kind != concrete.kind
            || self.sym != concrete.sym
            || self.args.len() != concrete.args.len()
        {
            return MatchDict::failed();
        }
        let mut dict = MatchDict::new();
        for (p, c) in self.args.iter().zip(&concrete.args) {
            dict = dict.merge(p.patmatch(c));
            if dict.is_failed() {
                break;
            }
        }
        dict
    }

    /// Replaces every variable bound in `dict` by its binding.
    ///
    /// Unbound variables are kept, with substitution applied to their sort.
    /// A [`MatchDict`] never binds a sort, so the result stays well formed.
    pub fn sub(&self, dict: &MatchDict) -> Expr {
        if self.is_var() {
            if let Some(bound) = dict.get(&self.sym) {
                return bound.clone();
            }
        }
        let args = self.args.iter().map(|a| a.sub(dict)).collect();
        Expr::from_parts(self.sym.clone(), self.kind, args)
    }

    /// Strips elaborated sorts from applications, recursively.
    pub fn uninfer(&self) -> Expr {
        let args = if self.is_app() {
            self.args.iter().filter(|a| !a.is_sort()).map(Expr::uninfer).collect()
        } else {
            self.args.iter().map(Expr::uninfer).collect()
        };
        Expr::from_parts(self.sym.clone(), self.kind, args)
    }
}

fn check_shape(sym: &str, kind: ExprKind, args: &[Expr]) -> Result<(), ValidationError> {
    if sym.is_empty() {
        return Err(ValidationError::EmptySymbol);
    }
    match kind {
        ExprKind::Var => {
            if args.len() != 1 {
                return Err(ValidationError::VarArity { sym: sym.to_string(), found: args.len() });
            }
            if !args[0].is_sort() {
                return Err(ValidationError::VarSortKind { sym: sym.to_string() });
            }
        }
        ExprKind::App => {
            if let Some(index) = args.iter().skip(1).position(Expr::is_sort) {
                return Err(ValidationError::SortUnderApp { sym: sym.to_string(), index: index + 1 });
            }
        }
        ExprKind::Sort => {
            if args.iter().any(Expr::is_sort) {
                return Err(ValidationError::SortUnderSort { sym: sym.to_string() });
            }
        }
    }
    Ok(())
}

impl fmt::Display for Expr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_var() {
            return write!(f, "{}:{}", self.sym, self.args[0]);
        }
        let elaborated = self.is_elaborated_app();
        let operands = self.operands();
        if elaborated && !operands.is_empty() {
            write!(f, "(")?;
        }
        write!(f, "{}", self.sym)?;
        if !operands.is_empty() {
            write!(f, "(")?;
            for (i, arg) in operands.iter().enumerate() {
                if i > 0 {
                    write!(f, ",")?;
                }
                write!(f, "{}", arg)?;
            }
            write!(f, ")")?;
        }
        if elaborated {
            if !operands.is_empty() {
                write!(f, ")")?;
            }
            write!(f, "::{}", self.args[0])?;
        }
        Ok(())
    }
}

/// Key reserved to mark a failed match.
pub const FAILURE_KEY: &str = "";

/// Variable bindings produced by matching.
///
/// A failed match is represented in-band by the presence of
/// [`FAILURE_KEY`]; merging with a failed dictionary yields a failed one.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MatchDict(BTreeMap<String, Expr>);

impl MatchDict {
    pub fn new() -> Self {
        Self::default()
    }

    /// The failure sentinel.
    pub fn failed() -> Self {
        let mut map = BTreeMap::new();
        map.insert(
            FAILURE_KEY.to_string(),
            Expr { sym: FAILURE_KEY.to_string(), kind: ExprKind::Sort, args: Vec::new() },
        );
        Self(map)
    }

    pub fn is_failed(&self) -> bool {
        self.0.contains_key(FAILURE_KEY)
    }

    pub fn get(&self, name: &str) -> Option<&Expr> {
        if name == FAILURE_KEY {
            return None;
        }
        self.0.get(name)
    }

    /// Binds `name`, turning the dictionary into the failure sentinel if the
    /// name is already bound to a different term.
    ///
    /// Variables stand for sorted terms, so binding one to a sort fails too.
    pub fn bind(&mut self, name: &str, value: Expr) {
        if self.is_failed() {
            return;
        }
        if value.is_sort() {
            *self = Self::failed();
            return;
        }
        match self.0.get(name) {
            Some(existing) if *existing != value => *self = Self::failed(),
            Some(_) => {}
            None => {
                self.0.insert(name.to_string(), value);
            }
        }
    }

    /// Union of two dictionaries; conflicts and failures yield failure.
    pub fn merge(mut self, other: MatchDict) -> MatchDict {
        if self.is_failed() || other.is_failed() {
            return Self::failed();
        }
        for (name, value) in other.0 {
            self.bind(&name, value);
            if self.is_failed() {
                break;
            }
        }
        self
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Expr)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v))
    }
}

/// Variables of `x` that do not occur in `y`, numbered from 1 in name order.
pub fn freevar(x: &Expr, y: &Expr) -> BTreeMap<String, usize> {
    let bound = y.var_names();
    x.var_names()
        .into_iter()
        .filter(|name| !bound.contains(name))
        .enumerate()
        .map(|(i, name)| (name, i + 1))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ob() -> Expr {
        Expr::sort("Ob", vec![]).unwrap()
    }

    fn v(name: &str) -> Expr {
        Expr::var(name, ob()).unwrap()
    }

    fn m(a: Expr, b: Expr) -> Expr {
        Expr::app("M", vec![ob(), a, b]).unwrap()
    }

    #[test]
    fn rejects_malformed_terms() {
        assert_eq!(Expr::sort("", vec![]), Err(ValidationError::EmptySymbol));
        assert_eq!(
            Expr::new("x", ExprKind::Var, vec![]),
            Err(ValidationError::VarArity { sym: "x".into(), found: 0 })
        );
        assert_eq!(
            Expr::var("x", v("y")),
            Err(ValidationError::VarSortKind { sym: "x".into() })
        );
        assert_eq!(
            Expr::app("M", vec![v("x"), ob()]),
            Err(ValidationError::SortUnderApp { sym: "M".into(), index: 1 })
        );
        assert_eq!(
            Expr::sort("Hom", vec![ob()]),
            Err(ValidationError::SortUnderSort { sym: "Hom".into() })
        );
        // A leading sort child is the elaborated form.
        assert!(Expr::app("e", vec![ob()]).unwrap().is_elaborated_app());
    }

    #[test]
    fn positions_are_preorder() {
        let t = m(v("x"), v("y"));
        let positions = t.positions();
        assert_eq!(positions[0], Vec::<usize>::new());
        assert_eq!(positions[1], vec![0]);
        assert_eq!(positions[2], vec![1]);
        assert_eq!(positions[3], vec![1, 0]);
        assert_eq!(positions.len(), 6);
        assert_eq!(t.subexpr(&[2, 0]), Some(&ob()));
        assert_eq!(t.subexpr(&[3]), None);
    }

    #[test]
    fn match_then_substitute_reproduces_concrete() {
        let pat = m(v("x"), m(v("y"), v("z")));
        let concrete = m(v("a"), m(m(v("b"), v("c")), v("a")));
        let dict = pat.patmatch(&concrete);
        assert!(!dict.is_failed());
        assert_eq!(dict.get("y"), Some(&m(v("b"), v("c"))));
        assert_eq!(pat.sub(&dict), concrete);
    }

    #[test]
    fn conflicting_bindings_fail() {
        let pat = m(v("x"), v("x"));
        assert!(pat.patmatch(&m(v("a"), v("b"))).is_failed());
        assert!(!pat.patmatch(&m(v("a"), v("a"))).is_failed());
    }

    #[test]
    fn symbol_and_arity_mismatch_fail() {
        let pat = m(v("x"), v("y"));
        let other = Expr::app("N", vec![ob(), v("a"), v("b")]).unwrap();
        assert!(pat.patmatch(&other).is_failed());
        let short = Expr::app("M", vec![ob(), v("a")]).unwrap();
        assert!(pat.patmatch(&short).is_failed());
        // A variable pattern needs a sorted subterm.
        assert!(v("x").patmatch(&ob()).is_failed());
    }

    #[test]
    fn variable_sort_is_matched() {
        let hom = |a: Expr, b: Expr| Expr::sort("Hom", vec![a, b]).unwrap();
        let f = Expr::var("f", hom(v("A"), v("B"))).unwrap();
        let g = Expr::var("g", hom(v("X"), v("X"))).unwrap();
        let dict = f.patmatch(&g);
        assert_eq!(dict.get("A"), Some(&v("X")));
        assert_eq!(dict.get("B"), Some(&v("X")));
        assert_eq!(dict.get("f"), Some(&g));
    }

    #[test]
    fn merge_propagates_failure() {
        let mut a = MatchDict::new();
        a.bind("x", v("a"));
        let mut b = MatchDict::new();
        b.bind("x", v("b"));
        assert!(a.clone().merge(b).is_failed());
        assert!(a.merge(MatchDict::failed()).is_failed());
        assert_eq!(MatchDict::failed().get(FAILURE_KEY), None);
    }

    #[test]
    fn sorts_cannot_be_bound() {
        let mut dict = MatchDict::new();
        dict.bind("x", ob());
        assert!(dict.is_failed());
        assert_eq!(dict.get("x"), None);
        // Substituting a failed dictionary leaves the pattern intact.
        let pat = m(v("x"), v("x"));
        assert_eq!(pat.sub(&dict), pat);
        assert!(Expr::new(pat.sym(), pat.kind(), pat.sub(&dict).args().to_vec()).is_ok());
    }

    #[test]
    fn freevar_numbers_from_one() {
        let lhs = v("x");
        let rhs = m(v("x"), m(v("y"), v("w")));
        let fv = freevar(&rhs, &lhs);
        assert_eq!(fv.get("w"), Some(&1));
        assert_eq!(fv.get("y"), Some(&2));
        assert_eq!(fv.get("x"), None);
        assert!(freevar(&lhs, &rhs).is_empty());
    }

    #[test]
    fn uninfer_strips_leading_sorts() {
        let t = m(v("x"), Expr::app("e", vec![ob()]).unwrap());
        let bare = t.uninfer();
        assert_eq!(bare.args().len(), 2);
        assert_eq!(bare.args()[1], Expr::app("e", vec![]).unwrap());
        assert_eq!(bare.args()[0], v("x"));
    }

    #[test]
    fn display_shows_sorts_on_variables() {
        assert_eq!(m(v("x"), v("y")).to_string(), "(M(x:Ob,y:Ob))::Ob");
        assert_eq!(Expr::app("e", vec![ob()]).unwrap().to_string(), "e::Ob");
        assert_eq!(m(v("x"), v("y")).uninfer().to_string(), "M(x:Ob,y:Ob)");
    }
}
