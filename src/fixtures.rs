//! Small theories shared by the unit tests.

use crate::expr::Expr;
use crate::theory::{OpDecl, Rule, SortDecl, Theory};

pub(crate) fn srt(sym: &str, args: Vec<Expr>) -> Expr {
    Expr::sort(sym, args).unwrap()
}

pub(crate) fn var(name: &str, sort: &Expr) -> Expr {
    Expr::var(name, sort.clone()).unwrap()
}

pub(crate) fn app(sym: &str, args: Vec<Expr>) -> Expr {
    Expr::app(sym, args).unwrap()
}

/// Monoid: one sort, a binary product and a unit.
pub(crate) fn monoid() -> Theory {
    let ob = srt("Ob", vec![]);
    let (x, y, z) = (var("x", &ob), var("y", &ob), var("z", &ob));
    let e = app("e", vec![]);
    let mul = |a: &Expr, b: &Expr| app("M", vec![a.clone(), b.clone()]);
    Theory::new(
        "monoid",
        vec![SortDecl::new("Ob", "Ob", vec![], "Some set")],
        vec![
            OpDecl::new("M", "({}⋅{})", ob.clone(), vec![x.clone(), y.clone()], "Multiplication"),
            OpDecl::new("e", "e", ob.clone(), vec![], "Identity element"),
        ],
        vec![
            Rule::new("Left identity", "", x.clone(), mul(&e, &x)),
            Rule::new("Right identity", "", x.clone(), mul(&x, &e)),
            Rule::new("Associativity", "", mul(&x, &mul(&y, &z)), mul(&mul(&x, &y), &z)),
        ],
    )
    .unwrap()
}

/// Categories: objects, hom-sets, identities and composition.
pub(crate) fn cat() -> Theory {
    let ob = srt("Ob", vec![]);
    let (a, b, c, d) = (var("A", &ob), var("B", &ob), var("C", &ob), var("D", &ob));
    let hom = |x: &Expr, y: &Expr| srt("Hom", vec![x.clone(), y.clone()]);
    let f = var("f", &hom(&a, &b));
    let g = var("g", &hom(&b, &c));
    let h = var("h", &hom(&c, &d));
    let id = |x: &Expr| app("id", vec![x.clone()]);
    let cmp = |x: &Expr, y: &Expr| app("cmp", vec![x.clone(), y.clone()]);
    Theory::new(
        "cat",
        vec![
            SortDecl::new("Ob", "Ob", vec![], "Objects in a category"),
            SortDecl::new("Hom", "({}⇒{})", vec![a.clone(), b.clone()], "Hom-set of morphisms"),
        ],
        vec![
            OpDecl::new("id", "id({})", hom(&a, &a), vec![a.clone()], "Identity morphism"),
            OpDecl::new("cmp", "({} ⋅ {})", hom(&a, &c), vec![f.clone(), g.clone()], "Composition of morphisms"),
        ],
        vec![
            Rule::new("idl", "Left identity", f.clone(), cmp(&id(&a), &f)),
            Rule::new("idr", "Right identity", f.clone(), cmp(&f, &id(&b))),
            Rule::new("asc", "Associativity", cmp(&f, &cmp(&g, &h)), cmp(&cmp(&f, &g), &h)),
        ],
    )
    .unwrap()
}
