//! The rewrite engine: rule application as named total functions.
//!
//! For an elaborated theory and a path depth, [`RewriteEngine`] defines the
//! following functions over the encoding domains:
//!
//! | name | signature | meaning |
//! |---|---|---|
//! | `getAt` | `(x: AST, p: Path) → AST` | subterm at `p` |
//! | `replaceAt` | `(x: AST, y: AST, p: Path) → AST` | `x` with the subterm at `p` replaced by `y` |
//! | `pat_R{i}{f,r}` | `(x: AST) → Bool` | `x` matches one side of rule `i` |
//! | `rterm_R{i}{f,r}` | `(x: AST, step: Int) → AST` | the other side, sharing `x` |
//! | `rewriteTop` | `(x: AST, r: Rule, step: Int) → AST` | rule `r` applied at the root |
//! | `rewrite` | `(x: AST, r: Rule, p: Path, step: Int) → AST` | rule `r` applied at `p` |
//!
//! All of them are total. A failed match, an invalid path or an operand that
//! is not a node produces `Error`, which every later step propagates.
//!
//! # Citations
//! - Term rewriting: Baader & Nipkow, "Term Rewriting and All That" (1998)
//! - Bounded model checking: Biere et al., "Symbolic model checking without BDDs" (1999)

use crate::construct::construct;
use crate::encoding::{Ast, CodeBook, Direction, Domains, Path, RuleTag};
use crate::error::{EvalError, InferenceError};
use crate::expr::Expr;
use crate::fingerprint::distinct;
use crate::term::{Evaluator, FunDef, FunctionTable, Sort, Term, Value};
use crate::theory::{Rule, Theory};
use tracing::debug;

pub const GET_AT: &str = "getAt";
pub const REPLACE_AT: &str = "replaceAt";
pub const REWRITE_TOP: &str = "rewriteTop";
pub const REWRITE: &str = "rewrite";

/// Name of the pattern test for a rule tag.
pub fn pat_name(tag: RuleTag) -> String {
    format!("pat_{}", tag)
}

/// Name of the result-term function for a rule tag.
pub fn rterm_name(tag: RuleTag) -> String {
    format!("rterm_{}", tag)
}

/// Compiled rewrite functions of one theory.
#[derive(Debug, Clone)]
pub struct RewriteEngine {
    theory: Theory,
    book: CodeBook,
    domains: Domains,
    funs: FunctionTable,
}

impl RewriteEngine {
    /// Elaborates `theory` and defines its rewrite functions for paths of
    /// length up to `depth`.
    pub fn new(theory: &Theory, depth: usize) -> Result<Self, InferenceError> {
        let theory = theory.upgrade()?;
        let book = CodeBook::new(&theory);
        let domains = Domains::new(theory.max_arity(), depth, theory.rules().len());
        let mut engine = Self { theory, book, domains, funs: FunctionTable::new() };
        for def in engine.build_definitions() {
            engine.funs.insert(def);
        }
        debug!(
            theory = engine.theory.name(),
            functions = engine.funs.len(),
            paths = engine.domains.paths().len(),
            rule_tags = engine.domains.rule_tags().len(),
            "rewrite engine ready"
        );
        Ok(engine)
    }

    /// The elaborated theory.
    pub fn theory(&self) -> &Theory {
        &self.theory
    }

    pub fn book(&self) -> &CodeBook {
        &self.book
    }

    /// Mutable code book, for registering terms to decode.
    pub fn book_mut(&mut self) -> &mut CodeBook {
        &mut self.book
    }

    pub fn domains(&self) -> &Domains {
        &self.domains
    }

    pub fn functions(&self) -> &FunctionTable {
        &self.funs
    }

    /// Definitions in dependency order, callees first.
    pub fn definitions(&self) -> impl Iterator<Item = &FunDef> {
        self.funs.iter()
    }

    /// The rule and orientation named by `tag`.
    pub fn rule(&self, tag: RuleTag) -> Option<&Rule> {
        self.theory.rules().get(tag.rule)
    }

    /// Elaborates and encodes a term.
    pub fn encode(&self, expr: &Expr) -> Result<Ast, InferenceError> {
        let elaborated = self.theory.upgrade_expr(expr)?;
        Ok(self.book.encode(&elaborated, self.domains.width()))
    }

    fn build_definitions(&self) -> Vec<FunDef> {
        let mut defs = vec![self.get_at_def(), self.replace_at_def()];
        let mut branches = Vec::new();
        let x = Term::var("x", Sort::Ast);
        let step = Term::var("step", Sort::Int);
        let r = Term::var("r", Sort::Rule);
        for tag in self.domains.rule_tags() {
            let Some(rule) = self.rule(tag) else { continue };
            let (lhs, rhs) = sides(rule, tag.direction);
            let pat = FunDef::new(
                pat_name(tag),
                vec![("x".into(), Sort::Ast)],
                Sort::Bool,
                self.pattern_test(&x, lhs),
            );
            let rterm = FunDef::new(
                rterm_name(tag),
                vec![("x".into(), Sort::Ast), ("step".into(), Sort::Int)],
                Sort::Ast,
                construct(&self.book, self.domains.width(), rhs, Some((lhs, &x)), &step),
            );
            let cond = Term::and(vec![
                Term::eq(r.clone(), Term::rule(tag)),
                pat.call(vec![x.clone()]),
            ]);
            branches.push((cond, rterm.call(vec![x.clone(), step.clone()])));
            defs.push(pat);
            defs.push(rterm);
        }
        let top_body = Term::ite(
            x.is_node(),
            Term::ite_chain(branches, Term::ast(Ast::Error)),
            Term::ast(Ast::Error),
        );
        let top = FunDef::new(
            REWRITE_TOP,
            vec![("x".into(), Sort::Ast), ("r".into(), Sort::Rule), ("step".into(), Sort::Int)],
            Sort::Ast,
            top_body,
        );
        let rewrite = self.rewrite_def(&top);
        defs.push(top);
        defs.push(rewrite);
        defs
    }

    /// Boolean term that holds when `x` matches `pattern`.
    ///
    /// Positions of `pattern` are grouped into classes of identical
    /// subterms. A class whose subterm is not a variable fixes the tag at
    /// its representative and requires the unused slots to be empty; every
    /// further member must equal the representative.
    pub fn pattern_test(&self, x: &Term, pattern: &Expr) -> Term {
        let mut conds = Vec::new();
        for class in distinct(pattern) {
            let Some((rep, rest)) = class.split_first() else { continue };
            let Some(sub) = pattern.subexpr(rep) else { continue };
            let at_rep = x.select_path(rep);
            if !sub.is_var() {
                conds.push(Term::eq(at_rep.tag_of(), Term::int(self.book.code(sub.sym()))));
                for slot in sub.args().len()..self.domains.width() {
                    conds.push(at_rep.select(slot).is_none());
                }
            }
            for pos in rest {
                conds.push(Term::eq(x.select_path(pos), at_rep.clone()));
            }
        }
        Term::and(conds)
    }

    fn get_at_def(&self) -> FunDef {
        let x = Term::var("x", Sort::Ast);
        let p = Term::var("p", Sort::Path);
        let branches = self
            .domains
            .paths()
            .into_iter()
            .filter(|path| !path.is_empty())
            .map(|path| (Term::eq(p.clone(), Term::path(path.clone())), x.select_path(path.indices())))
            .collect();
        let otherwise = Term::ite(Term::eq(p.clone(), Term::path(Path::empty())), x, Term::ast(Ast::Error));
        FunDef::new(
            GET_AT,
            vec![("x".into(), Sort::Ast), ("p".into(), Sort::Path)],
            Sort::Ast,
            Term::ite_chain(branches, otherwise),
        )
    }

    fn replace_at_def(&self) -> FunDef {
        let x = Term::var("x", Sort::Ast);
        let y = Term::var("y", Sort::Ast);
        let p = Term::var("p", Sort::Path);
        let width = self.domains.width();
        let branches = self
            .domains
            .paths()
            .into_iter()
            .filter(|path| !path.is_empty())
            .map(|path| {
                let rebuilt = rebuild_along(&x, path.indices(), y.clone(), width);
                (Term::eq(p.clone(), Term::path(path)), rebuilt)
            })
            .collect();
        let otherwise = Term::ite(Term::eq(p.clone(), Term::path(Path::empty())), y, Term::ast(Ast::Error));
        FunDef::new(
            REPLACE_AT,
            vec![("x".into(), Sort::Ast), ("y".into(), Sort::Ast), ("p".into(), Sort::Path)],
            Sort::Ast,
            Term::ite_chain(branches, otherwise),
        )
    }

    fn rewrite_def(&self, top: &FunDef) -> FunDef {
        let x = Term::var("x", Sort::Ast);
        let r = Term::var("r", Sort::Rule);
        let p = Term::var("p", Sort::Path);
        let step = Term::var("step", Sort::Int);
        let sub = Term::apply(GET_AT, vec![x.clone(), p.clone()], Sort::Ast);
        let rewritten = top.call(vec![sub, r, step]);
        let replaced = Term::apply(REPLACE_AT, vec![x.clone(), rewritten, p], Sort::Ast);
        FunDef::new(
            REWRITE,
            vec![
                ("x".into(), Sort::Ast),
                ("r".into(), Sort::Rule),
                ("p".into(), Sort::Path),
                ("step".into(), Sort::Int),
            ],
            Sort::Ast,
            Term::ite(x.is_node(), replaced, Term::ast(Ast::Error)),
        )
    }

    fn call(&self, name: &str, args: Vec<Value>) -> Result<Ast, EvalError> {
        Evaluator::new(&self.funs).call(name, args)?.into_ast()
    }

    /// Evaluates `getAt`.
    pub fn get_at(&self, x: &Ast, path: &Path) -> Result<Ast, EvalError> {
        self.call(GET_AT, vec![Value::Ast(x.clone()), Value::Path(path.clone())])
    }

    /// Evaluates `replaceAt`.
    pub fn replace_at(&self, x: &Ast, y: &Ast, path: &Path) -> Result<Ast, EvalError> {
        self.call(
            REPLACE_AT,
            vec![Value::Ast(x.clone()), Value::Ast(y.clone()), Value::Path(path.clone())],
        )
    }

    /// Evaluates the pattern test of `tag`; false for unknown tags.
    pub fn matches(&self, x: &Ast, tag: RuleTag) -> Result<bool, EvalError> {
        let name = pat_name(tag);
        if !self.funs.contains(&name) {
            return Ok(false);
        }
        Evaluator::new(&self.funs).call(&name, vec![Value::Ast(x.clone())])?.as_bool()
    }

    /// Evaluates `rewriteTop`.
    pub fn rewrite_top(&self, x: &Ast, tag: RuleTag, step: i64) -> Result<Ast, EvalError> {
        self.call(REWRITE_TOP, vec![Value::Ast(x.clone()), Value::Rule(tag), Value::Int(step)])
    }

    /// Evaluates `rewrite`.
    pub fn rewrite(&self, x: &Ast, tag: RuleTag, path: &Path, step: i64) -> Result<Ast, EvalError> {
        self.call(
            REWRITE,
            vec![
                Value::Ast(x.clone()),
                Value::Rule(tag),
                Value::Path(path.clone()),
                Value::Int(step),
            ],
        )
    }
}

/// The matched side and the produced side of `rule` in `direction`.
pub fn sides(rule: &Rule, direction: Direction) -> (&Expr, &Expr) {
    match direction {
        Direction::Forward => (&rule.t1, &rule.t2),
        Direction::Reverse => (&rule.t2, &rule.t1),
    }
}

/// `x` with the subterm at `path` replaced by `y`; every ancestor keeps its
/// tag and its other children.
fn rebuild_along(x: &Term, path: &[usize], y: Term, width: usize) -> Term {
    let Some((&first, rest)) = path.split_first() else {
        return y;
    };
    let children = (0..width)
        .map(|slot| {
            if slot == first {
                rebuild_along(&x.select(first), rest, y.clone(), width)
            } else {
                x.select(slot)
            }
        })
        .collect();
    Term::node(x.tag_of(), children, width)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixtures::{app, cat, monoid, srt, var};

    fn ob() -> Expr {
        srt("Ob", vec![])
    }

    fn m(a: &Expr, b: &Expr) -> Expr {
        app("M", vec![a.clone(), b.clone()])
    }

    fn fwd(rule: usize) -> RuleTag {
        RuleTag::new(rule, Direction::Forward)
    }

    fn rev(rule: usize) -> RuleTag {
        RuleTag::new(rule, Direction::Reverse)
    }

    #[test]
    fn associativity_at_the_root() {
        let engine = RewriteEngine::new(&monoid(), 2).unwrap();
        let (x, y, z) = (var("x", &ob()), var("y", &ob()), var("z", &ob()));
        let start = engine.encode(&m(&x, &m(&y, &z))).unwrap();
        let goal = engine.encode(&m(&m(&x, &y), &z)).unwrap();
        assert!(engine.matches(&start, fwd(2)).unwrap());
        assert_eq!(engine.rewrite(&start, fwd(2), &Path::empty(), 0).unwrap(), goal);
        assert_eq!(engine.rewrite(&goal, rev(2), &Path::empty(), 1).unwrap(), start);
        // The reverse side does not match the start term.
        assert_eq!(engine.rewrite(&start, rev(2), &Path::empty(), 0).unwrap(), Ast::Error);
    }

    #[test]
    fn identity_round_trip_in_a_category() {
        let engine = RewriteEngine::new(&cat(), 2).unwrap();
        let (a, b) = (var("A", &ob()), var("B", &ob()));
        let f = var("f", &srt("Hom", vec![a.clone(), b]));
        let start = engine.encode(&f).unwrap();
        let expanded = engine.encode(&app("cmp", vec![app("id", vec![a]), f])).unwrap();
        let once = engine.rewrite(&start, fwd(0), &Path::empty(), 0).unwrap();
        assert_eq!(once, expanded);
        let back = engine.rewrite(&once, rev(0), &Path::empty(), 1).unwrap();
        assert_eq!(back, start);
    }

    #[test]
    fn rewrites_below_the_root() {
        let engine = RewriteEngine::new(&monoid(), 2).unwrap();
        let (x, y, z, w) = (var("x", &ob()), var("y", &ob()), var("z", &ob()), var("w", &ob()));
        let start = engine.encode(&m(&w, &m(&x, &m(&y, &z)))).unwrap();
        let goal = engine.encode(&m(&w, &m(&m(&x, &y), &z))).unwrap();
        let at = Path::new(vec![2]);
        assert_eq!(engine.rewrite(&start, fwd(2), &at, 0).unwrap(), goal);
        // Slot 0 holds the sort, which no rule matches.
        assert_eq!(engine.rewrite(&start, fwd(2), &Path::new(vec![0]), 0).unwrap(), Ast::Error);
    }

    #[test]
    fn error_and_none_are_absorbing() {
        let engine = RewriteEngine::new(&monoid(), 2).unwrap();
        for tag in engine.domains().rule_tags() {
            for path in engine.domains().paths() {
                assert_eq!(engine.rewrite(&Ast::Error, tag, &path, 0).unwrap(), Ast::Error);
                assert_eq!(engine.rewrite(&Ast::None, tag, &path, 0).unwrap(), Ast::Error);
            }
            assert_eq!(engine.rewrite_top(&Ast::None, tag, 0).unwrap(), Ast::Error);
        }
        // Paths that run into an empty slot fail.
        let x = engine.encode(&var("x", &ob())).unwrap();
        assert_eq!(engine.rewrite(&x, fwd(0), &Path::new(vec![1, 0]), 0).unwrap(), Ast::Error);
    }

    #[test]
    fn symbolic_path_access_agrees_with_concrete() {
        let engine = RewriteEngine::new(&monoid(), 2).unwrap();
        let (x, y) = (var("x", &ob()), var("y", &ob()));
        let t = engine.encode(&m(&x, &m(&y, &app("e", vec![])))).unwrap();
        let marker = Ast::node(99, vec![], engine.domains().width());
        for path in engine.domains().paths() {
            assert_eq!(engine.get_at(&t, &path).unwrap(), t.get_at(&path));
            assert_eq!(
                engine.replace_at(&t, &marker, &path).unwrap(),
                t.replace_at(&path, marker.clone())
            );
        }
        let outside = Path::new(vec![0, 0, 0]);
        assert_eq!(engine.get_at(&t, &outside).unwrap(), Ast::Error);
    }

    #[test]
    fn repeated_pattern_variables_must_agree() {
        let (x, y) = (var("x", &ob()), var("y", &ob()));
        let base = monoid();
        let theory = Theory::new(
            "monoid+square",
            base.sorts().values().cloned().collect(),
            base.ops().values().cloned().collect(),
            vec![Rule::new("square", "", m(&x, &x), x.clone())],
        )
        .unwrap();
        let engine = RewriteEngine::new(&theory, 1).unwrap();
        let same = engine.encode(&m(&y, &y)).unwrap();
        let different = engine.encode(&m(&x, &y)).unwrap();
        assert!(engine.matches(&same, fwd(0)).unwrap());
        assert!(!engine.matches(&different, fwd(0)).unwrap());
        assert_eq!(engine.rewrite_top(&same, fwd(0), 0).unwrap(), engine.encode(&y).unwrap());
    }

    #[test]
    fn pattern_sorts_are_checked() {
        let engine = RewriteEngine::new(&cat(), 1).unwrap();
        // `A:Ob` is not a morphism, so identity expansion does not apply.
        let a = engine.encode(&var("A", &ob())).unwrap();
        assert!(!engine.matches(&a, fwd(0)).unwrap());
        assert_eq!(engine.rewrite_top(&a, fwd(0), 0).unwrap(), Ast::Error);
    }

    #[test]
    fn definitions_are_ordered_callees_first() {
        let engine = RewriteEngine::new(&monoid(), 2).unwrap();
        let names: Vec<&str> = engine.definitions().map(|d| d.name.as_str()).collect();
        assert_eq!(names.first(), Some(&GET_AT));
        assert_eq!(names.last(), Some(&REWRITE));
        assert_eq!(names[names.len() - 2], REWRITE_TOP);
        assert!(names.contains(&"pat_R3f"));
        assert!(names.contains(&"rterm_R1r"));
        for (i, def) in engine.definitions().enumerate() {
            for callee in def.body.called_functions() {
                let pos = names.iter().position(|n| *n == callee).unwrap();
                assert!(pos < i, "{} calls {} before it is defined", def.name, callee);
            }
        }
    }
}
