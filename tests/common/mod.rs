//! Theories and term builders shared by the integration tests.

#![allow(dead_code)]

use gatrewrite::{Expr, OpDecl, Rule, SortDecl, Theory};

pub fn ob() -> Expr {
    Expr::sort("Ob", vec![]).unwrap()
}

pub fn var(name: &str, sort: &Expr) -> Expr {
    Expr::var(name, sort.clone()).unwrap()
}

pub fn app(sym: &str, args: Vec<Expr>) -> Expr {
    Expr::app(sym, args).unwrap()
}

pub fn hom(a: &Expr, b: &Expr) -> Expr {
    Expr::sort("Hom", vec![a.clone(), b.clone()]).unwrap()
}

pub fn mul(a: &Expr, b: &Expr) -> Expr {
    app("M", vec![a.clone(), b.clone()])
}

pub fn unit() -> Expr {
    app("e", vec![])
}

/// Monoid with left identity, right identity and associativity.
pub fn monoid() -> Theory {
    let ob = ob();
    let (x, y, z) = (var("x", &ob), var("y", &ob), var("z", &ob));
    Theory::new(
        "monoid",
        vec![SortDecl::new("Ob", "Ob", vec![], "Some set")],
        vec![
            OpDecl::new("M", "({}⋅{})", ob.clone(), vec![x.clone(), y.clone()], "Multiplication"),
            OpDecl::new("e", "e", ob.clone(), vec![], "Identity element"),
        ],
        vec![
            Rule::new("Left identity", "", x.clone(), mul(&unit(), &x)),
            Rule::new("Right identity", "", x.clone(), mul(&x, &unit())),
            Rule::new("Associativity", "", mul(&x, &mul(&y, &z)), mul(&mul(&x, &y), &z)),
        ],
    )
    .unwrap()
}

pub fn id(a: &Expr) -> Expr {
    app("id", vec![a.clone()])
}

pub fn cmp(f: &Expr, g: &Expr) -> Expr {
    app("cmp", vec![f.clone(), g.clone()])
}

/// Categories with identity and associativity laws.
pub fn cat() -> Theory {
    let ob = ob();
    let (a, b, c, d) = (var("A", &ob), var("B", &ob), var("C", &ob), var("D", &ob));
    let f = var("f", &hom(&a, &b));
    let g = var("g", &hom(&b, &c));
    let h = var("h", &hom(&c, &d));
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
