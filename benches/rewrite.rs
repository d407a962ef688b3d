//! Benchmarks for building and evaluating the rewrite functions.

use criterion::{black_box, criterion_group, criterion_main, Criterion};
use gatrewrite::construct::construct;
use gatrewrite::prelude::*;

fn ob() -> Expr {
    Expr::sort("Ob", vec![]).unwrap()
}

fn var(name: &str) -> Expr {
    Expr::var(name, ob()).unwrap()
}

fn mul(a: &Expr, b: &Expr) -> Expr {
    Expr::app("M", vec![a.clone(), b.clone()]).unwrap()
}

fn monoid() -> Theory {
    let (x, y, z) = (var("x"), var("y"), var("z"));
    let e = Expr::app("e", vec![]).unwrap();
    Theory::new(
        "monoid",
        vec![SortDecl::new("Ob", "Ob", vec![], "")],
        vec![
            OpDecl::new("M", "({}⋅{})", ob(), vec![x.clone(), y.clone()], ""),
            OpDecl::new("e", "e", ob(), vec![], ""),
        ],
        vec![
            Rule::new("Left identity", "", x.clone(), mul(&e, &x)),
            Rule::new("Right identity", "", x.clone(), mul(&x, &e)),
            Rule::new("Associativity", "", mul(&x, &mul(&y, &z)), mul(&mul(&x, &y), &z)),
        ],
    )
    .unwrap()
}

/// Left-nested product of `n` copies of `x`.
fn chain(n: usize) -> Expr {
    let x = var("x");
    (1..n).fold(x.clone(), |acc, _| mul(&acc, &x))
}

/// Builds every rewrite function of the monoid theory at depth 2.
fn bench_engine_construction(c: &mut Criterion) {
    let theory = monoid();
    c.bench_function("engine_construction_depth2", |b| {
        b.iter(|| {
            let engine = RewriteEngine::new(black_box(&theory), 2).unwrap();
            black_box(engine.functions().len())
        });
    });
}

/// Symbolic construction of the associativity right-hand side.
fn bench_construct_assoc(c: &mut Criterion) {
    let engine = RewriteEngine::new(&monoid(), 2).unwrap();
    let rule = &engine.theory().rules()[2];
    let x = Term::var("x", Sort::Ast);
    let step = Term::var("step", Sort::Int);
    let width = engine.domains().width();
    c.bench_function("construct_assoc_rhs", |b| {
        b.iter(|| {
            let term = construct(engine.book(), width, black_box(&rule.t2), Some((&rule.t1, &x)), &step);
            black_box(term.dag_size())
        });
    });
}

/// One associativity step at the root of a four-element product.
fn bench_single_rewrite(c: &mut Criterion) {
    let engine = RewriteEngine::new(&monoid(), 2).unwrap();
    let (w, x) = (var("w"), var("x"));
    let (y, z) = (var("y"), var("z"));
    let start = engine.encode(&mul(&w, &mul(&x, &mul(&y, &z)))).unwrap();
    let tag = RuleTag::new(2, Direction::Forward);
    let root = Path::empty();
    c.bench_function("rewrite_assoc_root", |b| {
        b.iter(|| {
            let result = engine.rewrite(black_box(&start), tag, &root, 0).unwrap();
            assert!(!result.is_error());
        });
    });
}

/// Bounded search that exhausts three steps without reaching the goal.
fn bench_unreachable_search(c: &mut Criterion) {
    let config = SearchConfig::default().with_depth(1).with_max_steps(3);
    let query = ReachabilityQuery::new(&monoid(), &chain(3), &var("y"), config).unwrap();
    c.bench_function("search_unreachable_3_steps", |b| {
        b.iter(|| {
            let outcome = query.run_explicit().unwrap();
            assert!(!outcome.is_reachable());
        });
    });
}

criterion_group!(
    benches,
    bench_engine_construction,
    bench_construct_assoc,
    bench_single_rewrite,
    bench_unreachable_search
);
criterion_main!(benches);
