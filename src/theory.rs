//! Declarations, rules and theories.
//!
//! A [`Theory`] is built once from raw declarations and then elaborated with
//! [`Theory::upgrade`]: every application occurring in a declaration or rule
//! gets its inferred sort prepended as first child. Elaboration is
//! idempotent.
//!
//! Operator declarations are elaborated in dependency order, since inferring
//! the sort of an application needs the elaborated argument patterns of its
//! operator.
//!
//! # Citations
//! - Generalized algebraic theories: Cartmell, "Generalised algebraic theories and contextual categories" (1986)
//! - Topological sorting: Kahn, "Topological sorting of large networks" (1962)

use crate::constants::DOMAIN_THEORY_V1;
use crate::error::{InferenceError, ValidationError};
use crate::expr::{Expr, MatchDict};
use crate::fingerprint::{expr_hash, HashValue};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use tracing::debug;

/// Declaration of a sort constructor.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SortDecl {
    pub sym: String,
    /// Print pattern with one `{}` per argument.
    pub pattern: String,
    /// Parameters of the sort, as variables.
    pub args: Vec<Expr>,
    pub desc: String,
}

impl SortDecl {
    pub fn new(
        sym: impl Into<String>,
        pattern: impl Into<String>,
        args: Vec<Expr>,
        desc: impl Into<String>,
    ) -> Self {
        Self { sym: sym.into(), pattern: pattern.into(), args, desc: desc.into() }
    }

    /// The sort expression `sym(args)`.
    pub fn sort_expr(&self) -> Result<Expr, ValidationError> {
        Expr::sort(self.sym.clone(), self.args.clone())
    }
}

/// Declaration of an operator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OpDecl {
    pub sym: String,
    /// Print pattern with one `{}` per argument.
    pub pattern: String,
    /// Result sort, in terms of the argument variables.
    pub sort: Expr,
    /// Argument patterns matched against argument terms during inference.
    pub args: Vec<Expr>,
    pub desc: String,
}

impl OpDecl {
    pub fn new(
        sym: impl Into<String>,
        pattern: impl Into<String>,
        sort: Expr,
        args: Vec<Expr>,
        desc: impl Into<String>,
    ) -> Self {
        Self { sym: sym.into(), pattern: pattern.into(), sort, args, desc: desc.into() }
    }

    fn operator_deps(&self, ops: &BTreeMap<String, OpDecl>) -> BTreeSet<String> {
        let mut syms = BTreeSet::new();
        self.sort.collect_symbols(&mut syms);
        for arg in &self.args {
            arg.collect_symbols(&mut syms);
        }
        syms.retain(|s| ops.contains_key(s));
        syms
    }
}

/// A bidirectional rewrite rule `t1 = t2`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Rule {
    pub name: String,
    pub desc: String,
    pub t1: Expr,
    pub t2: Expr,
}

impl Rule {
    pub fn new(name: impl Into<String>, desc: impl Into<String>, t1: Expr, t2: Expr) -> Self {
        Self { name: name.into(), desc: desc.into(), t1, t2 }
    }
}

/// A named collection of sort and operator declarations with rules.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Theory {
    name: String,
    sorts: BTreeMap<String, SortDecl>,
    ops: BTreeMap<String, OpDecl>,
    rules: Vec<Rule>,
    elaborated: bool,
}

impl Theory {
    /// Builds a raw theory from declaration lists.
    pub fn new(
        name: impl Into<String>,
        sorts: Vec<SortDecl>,
        ops: Vec<OpDecl>,
        rules: Vec<Rule>,
    ) -> Result<Self, ValidationError> {
        let mut sort_map = BTreeMap::new();
        for decl in sorts {
            if decl.sym.is_empty() {
                return Err(ValidationError::EmptySymbol);
            }
            decl.sort_expr()?;
            if sort_map.contains_key(&decl.sym) {
                return Err(ValidationError::DuplicateDeclaration { sym: decl.sym });
            }
            sort_map.insert(decl.sym.clone(), decl);
        }
        let mut op_map = BTreeMap::new();
        for decl in ops {
            if decl.sym.is_empty() {
                return Err(ValidationError::EmptySymbol);
            }
            if sort_map.contains_key(&decl.sym) {
                return Err(ValidationError::KindClash { sym: decl.sym });
            }
            if !decl.sort.is_sort() {
                return Err(ValidationError::DeclarationShape {
                    sym: decl.sym,
                    reason: "result is not a sort".to_string(),
                });
            }
            if decl.args.iter().any(Expr::is_sort) {
                return Err(ValidationError::DeclarationShape {
                    sym: decl.sym,
                    reason: "argument pattern is a sort".to_string(),
                });
            }
            if op_map.contains_key(&decl.sym) {
                return Err(ValidationError::DuplicateDeclaration { sym: decl.sym });
            }
            op_map.insert(decl.sym.clone(), decl);
        }
        Ok(Self { name: name.into(), sorts: sort_map, ops: op_map, rules, elaborated: false })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn sorts(&self) -> &BTreeMap<String, SortDecl> {
        &self.sorts
    }

    pub fn ops(&self) -> &BTreeMap<String, OpDecl> {
        &self.ops
    }

    pub fn rules(&self) -> &[Rule] {
        &self.rules
    }

    pub fn is_elaborated(&self) -> bool {
        self.elaborated
    }

    /// Sort of the application `sym(args)`, where `args` are elaborated.
    ///
    /// Each argument is matched against the declared argument pattern; the
    /// bindings are merged and substituted into the declared result sort.
    pub fn infer(&self, sym: &str, args: &[Expr]) -> Result<Expr, InferenceError> {
        let decl = self
            .ops
            .get(sym)
            .ok_or_else(|| InferenceError::UnknownOperator { sym: sym.to_string() })?;
        if decl.args.len() != args.len() {
            return Err(InferenceError::ArityMismatch {
                sym: sym.to_string(),
                expected: decl.args.len(),
                found: args.len(),
            });
        }
        let mut dict = MatchDict::new();
        for (index, (pattern, arg)) in decl.args.iter().zip(args).enumerate() {
            let m = pattern.patmatch(arg);
            if m.is_failed() {
                return Err(InferenceError::ArgumentMismatch { sym: sym.to_string(), index });
            }
            dict = dict.merge(m);
            if dict.is_failed() {
                return Err(InferenceError::ConflictingBindings { sym: sym.to_string(), index });
            }
        }
        Ok(decl.sort.sub(&dict))
    }

    /// Elaborates a term bottom-up.
    ///
    /// Already elaborated applications have their sort recomputed, so the
    /// operation is idempotent.
    pub fn upgrade_expr(&self, expr: &Expr) -> Result<Expr, InferenceError> {
        if expr.is_app() {
            let operands = expr
                .operands()
                .iter()
                .map(|a| self.upgrade_expr(a))
                .collect::<Result<Vec<_>, _>>()?;
            let sort = self.infer(expr.sym(), &operands)?;
            let mut args = Vec::with_capacity(operands.len() + 1);
            args.push(sort);
            args.extend(operands);
            return Ok(Expr::app(expr.sym(), args)?);
        }
        let args = expr
            .args()
            .iter()
            .map(|a| self.upgrade_expr(a))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Expr::new(expr.sym(), expr.kind(), args)?)
    }

    /// Elaborates every declaration and rule.
    pub fn upgrade(&self) -> Result<Theory, InferenceError> {
        if self.elaborated {
            return Ok(self.clone());
        }
        let order = self.operator_order()?;
        debug!(theory = %self.name, order = ?order, "elaborating operators");
        let mut work = self.clone();
        for sym in &order {
            let Some(decl) = self.ops.get(sym) else { continue };
            let elaborated = OpDecl {
                sort: work.upgrade_expr(&decl.sort)?,
                args: decl.args.iter().map(|a| work.upgrade_expr(a)).collect::<Result<_, _>>()?,
                ..decl.clone()
            };
            work.ops.insert(sym.clone(), elaborated);
        }
        let mut sorts = BTreeMap::new();
        for (sym, decl) in &self.sorts {
            let args = decl.args.iter().map(|a| work.upgrade_expr(a)).collect::<Result<_, _>>()?;
            sorts.insert(sym.clone(), SortDecl { args, ..decl.clone() });
        }
        let rules = self
            .rules
            .iter()
            .map(|r| -> Result<Rule, InferenceError> {
                Ok(Rule {
                    t1: work.upgrade_expr(&r.t1)?,
                    t2: work.upgrade_expr(&r.t2)?,
                    ..r.clone()
                })
            })
            .collect::<Result<Vec<_>, _>>()?;
        work.sorts = sorts;
        work.rules = rules;
        work.elaborated = true;
        Ok(work)
    }

    /// Operators in an order where every operator follows the operators its
    /// patterns mention. Ties are broken by symbol.
    fn operator_order(&self) -> Result<Vec<String>, InferenceError> {
        let mut pending: BTreeMap<String, BTreeSet<String>> = self
            .ops
            .iter()
            .map(|(sym, decl)| (sym.clone(), decl.operator_deps(&self.ops)))
            .collect();
        let mut order = Vec::with_capacity(pending.len());
        loop {
            let ready: Vec<String> = pending
                .iter()
                .filter(|(_, deps)| deps.is_empty())
                .map(|(sym, _)| sym.clone())
                .collect();
            if ready.is_empty() {
                break;
            }
            for sym in &ready {
                pending.remove(sym);
            }
            for deps in pending.values_mut() {
                for sym in &ready {
                    deps.remove(sym);
                }
            }
            order.extend(ready);
        }
        if !pending.is_empty() {
            return Err(InferenceError::CyclicDeclarations { syms: pending.into_keys().collect() });
        }
        Ok(order)
    }

    /// Largest argument count over all declarations, at least 1.
    pub fn max_arity(&self) -> usize {
        let sorts = self.sorts.values().map(|d| d.args.len());
        let ops = self.ops.values().map(|d| d.args.len());
        sorts.chain(ops).fold(1, usize::max)
    }

    /// Every symbol mentioned in the theory, numbered from 1 in lexicographic order.
    pub fn symcode(&self) -> BTreeMap<String, i64> {
        let mut syms: BTreeSet<String> = BTreeSet::new();
        for decl in self.sorts.values() {
            syms.insert(decl.sym.clone());
            for arg in &decl.args {
                arg.collect_symbols(&mut syms);
            }
        }
        for decl in self.ops.values() {
            syms.insert(decl.sym.clone());
            decl.sort.collect_symbols(&mut syms);
            for arg in &decl.args {
                arg.collect_symbols(&mut syms);
            }
        }
        for rule in &self.rules {
            rule.t1.collect_symbols(&mut syms);
            rule.t2.collect_symbols(&mut syms);
        }
        syms.into_iter().zip(1..).collect()
    }

    /// Deterministic fingerprint of the declarations and rules.
    pub fn fingerprint(&self) -> HashValue {
        fn put_str(data: &mut Vec<u8>, s: &str) {
            data.extend_from_slice(&(s.len() as u64).to_le_bytes());
            data.extend_from_slice(s.as_bytes());
        }
        let mut data = Vec::new();
        put_str(&mut data, &self.name);
        data.extend_from_slice(&(self.sorts.len() as u64).to_le_bytes());
        for decl in self.sorts.values() {
            put_str(&mut data, &decl.sym);
            data.extend_from_slice(&(decl.args.len() as u64).to_le_bytes());
            for arg in &decl.args {
                data.extend_from_slice(expr_hash(arg).as_bytes());
            }
        }
        data.extend_from_slice(&(self.ops.len() as u64).to_le_bytes());
        for decl in self.ops.values() {
            put_str(&mut data, &decl.sym);
            data.extend_from_slice(expr_hash(&decl.sort).as_bytes());
            data.extend_from_slice(&(decl.args.len() as u64).to_le_bytes());
            for arg in &decl.args {
                data.extend_from_slice(expr_hash(arg).as_bytes());
            }
        }
        data.extend_from_slice(&(self.rules.len() as u64).to_le_bytes());
        for rule in &self.rules {
            put_str(&mut data, &rule.name);
            data.extend_from_slice(expr_hash(&rule.t1).as_bytes());
            data.extend_from_slice(expr_hash(&rule.t2).as_bytes());
        }
        HashValue::hash_with_domain(DOMAIN_THEORY_V1, &data)
    }

    /// Prints a term with the declared print patterns.
    ///
    /// Elaborated sorts are omitted; variables print as `name:sort`.
    /// Symbols without a declaration print as `sym(args)`.
    pub fn render(&self, expr: &Expr) -> String {
        if expr.is_var() {
            return format!("{}:{}", expr.sym(), self.render(&expr.args()[0]));
        }
        let children: Vec<String> = expr.operands().iter().map(|a| self.render(a)).collect();
        let pattern = if expr.is_sort() {
            self.sorts.get(expr.sym()).map(|d| d.pattern.as_str())
        } else {
            self.ops.get(expr.sym()).map(|d| d.pattern.as_str())
        };
        if let Some(pattern) = pattern {
            let pieces: Vec<&str> = pattern.split("{}").collect();
            if pieces.len() == children.len() + 1 {
                let mut out = String::new();
                for (piece, child) in pieces.iter().zip(&children) {
                    out.push_str(piece);
                    out.push_str(child);
                }
                out.push_str(pieces[children.len()]);
                return out;
            }
        }
        if children.is_empty() {
            expr.sym().to_string()
        } else {
            format!("{}({})", expr.sym(), children.join(","))
        }
    }

    /// Prints a rule with arrows for the given orientation.
    pub fn render_rule(&self, rule: &Rule, forward: bool) -> String {
        let (a1, a2) = if forward { ("⟶", "⟵") } else { ("⟵", "⟶") };
        format!(
            "Rule: {}\n\t{}\t{}\n\t{}\t{}",
            rule.name,
            a1,
            self.render(&rule.t1.uninfer()),
            a2,
            self.render(&rule.t2.uninfer())
        )
    }
}

impl fmt::Display for Theory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "{}", self.name)?;
        for decl in self.sorts.values() {
            write!(f, "\nSort: {} {}", decl.sym, decl.pattern)?;
            for arg in &decl.args {
                write!(f, "\n\t{}", self.render(&arg.uninfer()))?;
            }
        }
        for decl in self.ops.values() {
            write!(f, "\nOp: {} {}", decl.sym, decl.pattern)?;
            for arg in &decl.args {
                write!(f, "\n\t{}", self.render(&arg.uninfer()))?;
            }
        }
        for rule in &self.rules {
            write!(f, "\n{}", self.render_rule(rule, true))?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixtures::{app, cat, monoid, srt, var};

    #[test]
    fn rejects_duplicate_and_clashing_declarations() {
        let ob = srt("Ob", vec![]);
        let twice = Theory::new(
            "t",
            vec![SortDecl::new("Ob", "Ob", vec![], ""), SortDecl::new("Ob", "Ob", vec![], "")],
            vec![],
            vec![],
        );
        assert_eq!(twice, Err(ValidationError::DuplicateDeclaration { sym: "Ob".into() }));
        let clash = Theory::new(
            "t",
            vec![SortDecl::new("Ob", "Ob", vec![], "")],
            vec![OpDecl::new("Ob", "Ob", ob.clone(), vec![], "")],
            vec![],
        );
        assert_eq!(clash, Err(ValidationError::KindClash { sym: "Ob".into() }));
        let bad_result = Theory::new(
            "t",
            vec![],
            vec![OpDecl::new("f", "f", var("x", &ob), vec![], "")],
            vec![],
        );
        assert!(matches!(bad_result, Err(ValidationError::DeclarationShape { .. })));
    }

    #[test]
    fn upgrade_prepends_inferred_sorts() {
        let theory = monoid().upgrade().unwrap();
        let assoc = &theory.rules()[2];
        let ob = srt("Ob", vec![]);
        assert_eq!(assoc.t1.args()[0], ob);
        assert_eq!(assoc.t1.args()[2].args()[0], ob);
        assert!(theory.rules()[0].t2.args()[1].is_elaborated_app());
        assert!(theory.is_elaborated());
    }

    #[test]
    fn upgrade_is_idempotent() {
        let once = cat().upgrade().unwrap();
        let twice = once.upgrade().unwrap();
        assert_eq!(once, twice);
        for rule in once.rules() {
            assert_eq!(once.upgrade_expr(&rule.t2).unwrap(), rule.t2);
        }
    }

    #[test]
    fn uninfer_inverts_upgrade() {
        let raw = cat();
        let theory = raw.upgrade().unwrap();
        for (raw_rule, rule) in raw.rules().iter().zip(theory.rules()) {
            assert_eq!(rule.t1.uninfer(), raw_rule.t1);
            assert_eq!(rule.t2.uninfer(), raw_rule.t2);
        }
    }

    #[test]
    fn infers_identity_composition_sort() {
        let theory = cat().upgrade().unwrap();
        let ob = srt("Ob", vec![]);
        let (a, b) = (var("A", &ob), var("B", &ob));
        let f = var("f", &srt("Hom", vec![a.clone(), b.clone()]));
        let term = app("cmp", vec![app("id", vec![a.clone()]), f]);
        let elaborated = theory.upgrade_expr(&term).unwrap();
        assert_eq!(elaborated.sort_of(), Some(&srt("Hom", vec![a.clone(), b])));
        let id_sort = elaborated.args()[1].sort_of().unwrap();
        assert_eq!(*id_sort, srt("Hom", vec![a.clone(), a]));
    }

    #[test]
    fn inference_errors() {
        let theory = cat().upgrade().unwrap();
        let ob = srt("Ob", vec![]);
        let (a, b, c) = (var("A", &ob), var("B", &ob), var("C", &ob));
        let hom = |x: &Expr, y: &Expr| srt("Hom", vec![x.clone(), y.clone()]);
        let f = var("f", &hom(&a, &b));
        let g = var("g", &hom(&c, &a));
        // Hom(A,B) then Hom(C,A) do not compose: B is bound to both B and C.
        assert_eq!(
            theory.upgrade_expr(&app("cmp", vec![f.clone(), g])),
            Err(InferenceError::ConflictingBindings { sym: "cmp".into(), index: 1 })
        );
        assert_eq!(
            theory.upgrade_expr(&app("cmp", vec![f.clone()])),
            Err(InferenceError::ArityMismatch { sym: "cmp".into(), expected: 2, found: 1 })
        );
        assert_eq!(
            theory.upgrade_expr(&app("zz", vec![])),
            Err(InferenceError::UnknownOperator { sym: "zz".into() })
        );
        assert_eq!(
            theory.upgrade_expr(&app("id", vec![f])),
            Err(InferenceError::ArgumentMismatch { sym: "id".into(), index: 0 })
        );
    }

    #[test]
    fn operators_elaborate_in_dependency_order() {
        let ob = srt("Ob", vec![]);
        let x = var("x", &ob);
        let unit = app("u", vec![]);
        // `P`'s result sort mentions `u`, so `u` must be elaborated first.
        let theory = Theory::new(
            "deps",
            vec![
                SortDecl::new("Ob", "Ob", vec![], ""),
                SortDecl::new("P", "P({})", vec![x.clone()], ""),
            ],
            vec![
                OpDecl::new("a", "a", srt("P", vec![unit.clone()]), vec![], ""),
                OpDecl::new("u", "u", ob.clone(), vec![], ""),
            ],
            vec![],
        )
        .unwrap();
        assert_eq!(theory.operator_order().unwrap(), vec!["u".to_string(), "a".to_string()]);
        let up = theory.upgrade().unwrap();
        assert!(up.ops()["a"].sort.args()[0].is_elaborated_app());

        let cyclic = Theory::new(
            "cyclic",
            vec![SortDecl::new("P", "P({})", vec![x.clone()], ""), SortDecl::new("Ob", "Ob", vec![], "")],
            vec![
                OpDecl::new("a", "a", srt("P", vec![app("b", vec![])]), vec![], ""),
                OpDecl::new("b", "b", srt("P", vec![app("a", vec![])]), vec![], ""),
            ],
            vec![],
        )
        .unwrap();
        assert_eq!(
            cyclic.upgrade(),
            Err(InferenceError::CyclicDeclarations { syms: vec!["a".into(), "b".into()] })
        );
    }

    #[test]
    fn symcode_is_dense_and_ordered() {
        let codes = monoid().upgrade().unwrap().symcode();
        let syms: Vec<&str> = codes.keys().map(String::as_str).collect();
        assert_eq!(syms, vec!["M", "Ob", "e", "x", "y", "z"]);
        assert_eq!(codes.values().copied().collect::<Vec<_>>(), vec![1, 2, 3, 4, 5, 6]);
    }

    #[test]
    fn max_arity_counts_sorts_and_ops() {
        assert_eq!(monoid().max_arity(), 2);
        assert_eq!(cat().max_arity(), 2);
        let tiny = Theory::new("tiny", vec![SortDecl::new("Ob", "Ob", vec![], "")], vec![], vec![]).unwrap();
        assert_eq!(tiny.max_arity(), 1);
    }

    #[test]
    fn render_uses_print_patterns() {
        let theory = cat().upgrade().unwrap();
        let idl = &theory.rules()[0];
        assert_eq!(theory.render(&idl.t2), "(id(A:Ob) ⋅ f:(A:Ob⇒B:Ob))");
        assert!(theory.render_rule(idl, false).starts_with("Rule: idl\n\t⟵"));
        assert!(theory.to_string().contains("Op: cmp ({} ⋅ {})"));
        let stray = var("q", &srt("Ob", vec![]));
        assert_eq!(theory.render(&stray), "q:Ob");
    }

    #[test]
    fn fingerprint_tracks_elaboration() {
        let raw = monoid();
        let up = raw.upgrade().unwrap();
        assert_eq!(raw.fingerprint(), monoid().fingerprint());
        assert_ne!(raw.fingerprint(), up.fingerprint());
    }
}
