//! Backend-neutral symbolic terms over the encoding domains.
//!
//! The rewrite engine compiles pattern tests, rule right-hand sides and
//! path access into [`Term`]s: shared, immutable expression DAGs over five
//! sorts (`Ast`, `Path`, `Rule`, `Int`, `Bool`). Named total functions
//! ([`FunDef`]) are collected in a [`FunctionTable`] and handed to a
//! backend, which decides how to reason about them.
//!
//! [`Evaluator`] gives the terms their reference semantics. It evaluates
//! `ite` and the boolean connectives lazily and memoizes shared subterms
//! per function frame, so evaluation cost follows the size of the DAG
//! rather than of its unfolding.
//!
//! Every operation is total on well-sorted input: selecting into `None` or
//! `Error` gives `Error`, and the tag of a non-node is 0.
//!
//! # Citations
//! - SMT-LIB datatypes: Barrett, Fontaine, Tinelli, "The SMT-LIB Standard: Version 2.6" (2017)
//! - Hash-consed DAG evaluation: Filliâtre & Conchon, "Type-safe modular hash-consing" (2006)

use crate::encoding::{Ast, Path, RuleTag};
use crate::error::EvalError;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap, HashSet};
use std::fmt;
use std::rc::Rc;

/// Sort of a symbolic term.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Sort {
    Ast,
    Path,
    Rule,
    Int,
    Bool,
}

impl fmt::Display for Sort {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Sort::Ast => "AST",
            Sort::Path => "Path",
            Sort::Rule => "Rule",
            Sort::Int => "Int",
            Sort::Bool => "Bool",
        };
        write!(f, "{}", name)
    }
}

/// A concrete value of one of the five sorts.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Value {
    Ast(Ast),
    Path(Path),
    Rule(RuleTag),
    Int(i64),
    Bool(bool),
}

impl Value {
    pub fn sort(&self) -> Sort {
        match self {
            Value::Ast(_) => Sort::Ast,
            Value::Path(_) => Sort::Path,
            Value::Rule(_) => Sort::Rule,
            Value::Int(_) => Sort::Int,
            Value::Bool(_) => Sort::Bool,
        }
    }

    fn mismatch(&self, expected: Sort) -> EvalError {
        EvalError::SortMismatch { expected: expected.to_string(), found: self.sort().to_string() }
    }

    pub fn as_ast(&self) -> Result<&Ast, EvalError> {
        match self {
            Value::Ast(a) => Ok(a),
            other => Err(other.mismatch(Sort::Ast)),
        }
    }

    pub fn as_int(&self) -> Result<i64, EvalError> {
        match self {
            Value::Int(i) => Ok(*i),
            other => Err(other.mismatch(Sort::Int)),
        }
    }

    pub fn as_bool(&self) -> Result<bool, EvalError> {
        match self {
            Value::Bool(b) => Ok(*b),
            other => Err(other.mismatch(Sort::Bool)),
        }
    }

    pub fn into_ast(self) -> Result<Ast, EvalError> {
        match self {
            Value::Ast(a) => Ok(a),
            other => Err(other.mismatch(Sort::Ast)),
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Ast(a) => write!(f, "{}", a),
            Value::Path(p) => write!(f, "{}", p),
            Value::Rule(r) => write!(f, "{}", r),
            Value::Int(i) => write!(f, "{}", i),
            Value::Bool(b) => write!(f, "{}", b),
        }
    }
}

/// One node of a symbolic term.
#[derive(Debug)]
pub enum TermNode {
    Const(Value),
    Var(String, Sort),
    /// Node constructor; absorbs `Error` children and pads with `None`.
    Node { tag: Term, children: Vec<Term>, width: usize },
    /// Child selector; `Error` on non-nodes.
    Select { arg: Term, index: usize },
    /// Tag of a node; 0 on non-nodes.
    TagOf(Term),
    IsNode(Term),
    IsNone(Term),
    IsError(Term),
    Eq(Term, Term),
    And(Vec<Term>),
    Or(Vec<Term>),
    Not(Term),
    Ite(Term, Term, Term),
    Add(Term, Term),
    Mul(Term, Term),
    /// Application of a function from the [`FunctionTable`].
    Apply { fun: String, args: Vec<Term>, sort: Sort },
}

/// Shared handle to a symbolic term.
#[derive(Debug, Clone)]
pub struct Term(Rc<TermNode>);

impl Term {
    fn mk(node: TermNode) -> Self {
        Self(Rc::new(node))
    }

    pub fn node_ref(&self) -> &TermNode {
        &self.0
    }

    pub fn constant(value: Value) -> Self {
        Self::mk(TermNode::Const(value))
    }

    pub fn ast(value: Ast) -> Self {
        Self::constant(Value::Ast(value))
    }

    pub fn int(value: i64) -> Self {
        Self::constant(Value::Int(value))
    }

    pub fn bool(value: bool) -> Self {
        Self::constant(Value::Bool(value))
    }

    pub fn path(value: Path) -> Self {
        Self::constant(Value::Path(value))
    }

    pub fn rule(value: RuleTag) -> Self {
        Self::constant(Value::Rule(value))
    }

    pub fn var(name: impl Into<String>, sort: Sort) -> Self {
        Self::mk(TermNode::Var(name.into(), sort))
    }

    pub fn node(tag: Term, children: Vec<Term>, width: usize) -> Self {
        Self::mk(TermNode::Node { tag, children, width })
    }

    pub fn select(&self, index: usize) -> Self {
        Self::mk(TermNode::Select { arg: self.clone(), index })
    }

    /// Follows `path` by repeated selection.
    pub fn select_path(&self, path: &[usize]) -> Self {
        path.iter().fold(self.clone(), |t, &i| t.select(i))
    }

    pub fn tag_of(&self) -> Self {
        Self::mk(TermNode::TagOf(self.clone()))
    }

    pub fn is_node(&self) -> Self {
        Self::mk(TermNode::IsNode(self.clone()))
    }

    pub fn is_none(&self) -> Self {
        Self::mk(TermNode::IsNone(self.clone()))
    }

    pub fn is_error(&self) -> Self {
        Self::mk(TermNode::IsError(self.clone()))
    }

    pub fn eq(a: Term, b: Term) -> Self {
        Self::mk(TermNode::Eq(a, b))
    }

    /// Conjunction; the empty conjunction is `true`.
    pub fn and(args: Vec<Term>) -> Self {
        match args.len() {
            0 => Self::bool(true),
            1 => args.into_iter().next().unwrap_or_else(|| Self::bool(true)),
            _ => Self::mk(TermNode::And(args)),
        }
    }

    /// Disjunction; the empty disjunction is `false`.
    pub fn or(args: Vec<Term>) -> Self {
        match args.len() {
            0 => Self::bool(false),
            1 => args.into_iter().next().unwrap_or_else(|| Self::bool(false)),
            _ => Self::mk(TermNode::Or(args)),
        }
    }

    pub fn not(&self) -> Self {
        Self::mk(TermNode::Not(self.clone()))
    }

    pub fn ite(cond: Term, then: Term, otherwise: Term) -> Self {
        Self::mk(TermNode::Ite(cond, then, otherwise))
    }

    /// Nested `ite` over `(condition, value)` pairs in order, with a default.
    pub fn ite_chain(branches: Vec<(Term, Term)>, default: Term) -> Self {
        branches
            .into_iter()
            .rev()
            .fold(default, |acc, (cond, then)| Self::ite(cond, then, acc))
    }

    pub fn add(a: Term, b: Term) -> Self {
        Self::mk(TermNode::Add(a, b))
    }

    pub fn mul(a: Term, b: Term) -> Self {
        Self::mk(TermNode::Mul(a, b))
    }

    pub fn apply(fun: impl Into<String>, args: Vec<Term>, sort: Sort) -> Self {
        Self::mk(TermNode::Apply { fun: fun.into(), args, sort })
    }

    /// Result sort, read off the structure.
    pub fn sort(&self) -> Sort {
        match self.node_ref() {
            TermNode::Const(v) => v.sort(),
            TermNode::Var(_, s) => *s,
            TermNode::Node { .. } | TermNode::Select { .. } => Sort::Ast,
            TermNode::TagOf(_) | TermNode::Add(..) | TermNode::Mul(..) => Sort::Int,
            TermNode::IsNode(_)
            | TermNode::IsNone(_)
            | TermNode::IsError(_)
            | TermNode::Eq(..)
            | TermNode::And(_)
            | TermNode::Or(_)
            | TermNode::Not(_) => Sort::Bool,
            TermNode::Ite(_, t, _) => t.sort(),
            TermNode::Apply { sort, .. } => *sort,
        }
    }

    fn id(&self) -> *const TermNode {
        Rc::as_ptr(&self.0)
    }

    fn children(&self) -> Vec<&Term> {
        match self.node_ref() {
            TermNode::Const(_) | TermNode::Var(..) => Vec::new(),
            TermNode::Node { tag, children, .. } => {
                std::iter::once(tag).chain(children.iter()).collect()
            }
            TermNode::Select { arg, .. }
            | TermNode::TagOf(arg)
            | TermNode::IsNode(arg)
            | TermNode::IsNone(arg)
            | TermNode::IsError(arg)
            | TermNode::Not(arg) => vec![arg],
            TermNode::Eq(a, b) | TermNode::Add(a, b) | TermNode::Mul(a, b) => vec![a, b],
            TermNode::And(args) | TermNode::Or(args) | TermNode::Apply { args, .. } => {
                args.iter().collect()
            }
            TermNode::Ite(c, t, e) => vec![c, t, e],
        }
    }

    /// Number of distinct shared nodes.
    pub fn dag_size(&self) -> usize {
        let mut seen = HashSet::new();
        let mut stack = vec![self];
        while let Some(t) = stack.pop() {
            if seen.insert(t.id()) {
                stack.extend(t.children());
            }
        }
        seen.len()
    }

    /// Names of applied functions, for dependency checks.
    pub fn called_functions(&self) -> Vec<String> {
        let mut seen = HashSet::new();
        let mut names = Vec::new();
        let mut stack = vec![self];
        while let Some(t) = stack.pop() {
            if !seen.insert(t.id()) {
                continue;
            }
            if let TermNode::Apply { fun, .. } = t.node_ref() {
                if !names.contains(fun) {
                    names.push(fun.clone());
                }
            }
            stack.extend(t.children());
        }
        names
    }
}

impl fmt::Display for Term {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fn list(f: &mut fmt::Formatter<'_>, head: &str, args: &[&Term]) -> fmt::Result {
            write!(f, "({}", head)?;
            for a in args {
                write!(f, " {}", a)?;
            }
            write!(f, ")")
        }
        match self.node_ref() {
            TermNode::Const(v) => write!(f, "{}", v),
            TermNode::Var(name, _) => write!(f, "{}", name),
            TermNode::Node { tag, children, .. } => {
                let mut args = vec![tag];
                args.extend(children.iter());
                list(f, "ast", &args)
            }
            TermNode::Select { arg, index } => list(f, &format!("a{}", index), &[arg]),
            TermNode::TagOf(a) => list(f, "node", &[a]),
            TermNode::IsNode(a) => list(f, "(_ is ast)", &[a]),
            TermNode::IsNone(a) => list(f, "(_ is None)", &[a]),
            TermNode::IsError(a) => list(f, "(_ is Error)", &[a]),
            TermNode::Eq(a, b) => list(f, "=", &[a, b]),
            TermNode::And(args) => list(f, "and", &args.iter().collect::<Vec<_>>()),
            TermNode::Or(args) => list(f, "or", &args.iter().collect::<Vec<_>>()),
            TermNode::Not(a) => list(f, "not", &[a]),
            TermNode::Ite(c, t, e) => list(f, "ite", &[c, t, e]),
            TermNode::Add(a, b) => list(f, "+", &[a, b]),
            TermNode::Mul(a, b) => list(f, "*", &[a, b]),
            TermNode::Apply { fun, args, .. } => list(f, fun, &args.iter().collect::<Vec<_>>()),
        }
    }
}

/// A named total function over the encoding sorts.
#[derive(Debug, Clone)]
pub struct FunDef {
    pub name: String,
    pub params: Vec<(String, Sort)>,
    pub result: Sort,
    pub body: Term,
}

impl FunDef {
    pub fn new(
        name: impl Into<String>,
        params: Vec<(String, Sort)>,
        result: Sort,
        body: Term,
    ) -> Self {
        Self { name: name.into(), params, result, body }
    }

    /// A term applying this function to `args`.
    pub fn call(&self, args: Vec<Term>) -> Term {
        Term::apply(self.name.clone(), args, self.result)
    }
}

/// Function definitions by name, kept in definition order.
#[derive(Debug, Clone, Default)]
pub struct FunctionTable {
    defs: BTreeMap<String, Rc<FunDef>>,
    order: Vec<String>,
}

impl FunctionTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a definition. Returns `false` if the name is taken.
    pub fn insert(&mut self, def: FunDef) -> bool {
        if self.defs.contains_key(&def.name) {
            return false;
        }
        self.order.push(def.name.clone());
        self.defs.insert(def.name.clone(), Rc::new(def));
        true
    }

    pub fn get(&self, name: &str) -> Option<&FunDef> {
        self.defs.get(name).map(|d| d.as_ref())
    }

    pub fn contains(&self, name: &str) -> bool {
        self.defs.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.defs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.defs.is_empty()
    }

    /// Definitions in the order they were added.
    pub fn iter(&self) -> impl Iterator<Item = &FunDef> {
        self.order.iter().filter_map(|n| self.get(n))
    }
}

/// Variable assignment.
pub type Env = BTreeMap<String, Value>;

/// Reference evaluator for [`Term`]s.
pub struct Evaluator<'a> {
    funs: &'a FunctionTable,
}

struct Frame<'e> {
    env: &'e Env,
    memo: HashMap<*const TermNode, Value>,
}

impl<'a> Evaluator<'a> {
    pub fn new(funs: &'a FunctionTable) -> Self {
        Self { funs }
    }

    /// Evaluates `term` under `env`.
    pub fn eval(&self, term: &Term, env: &Env) -> Result<Value, EvalError> {
        let mut frame = Frame { env, memo: HashMap::new() };
        self.eval_in(term, &mut frame)
    }

    /// Calls the function `name` on concrete arguments.
    pub fn call(&self, name: &str, args: Vec<Value>) -> Result<Value, EvalError> {
        let def = self.funs.get(name).ok_or_else(|| EvalError::UnknownFunction(name.to_string()))?;
        if def.params.len() != args.len() {
            return Err(EvalError::ArityMismatch {
                name: name.to_string(),
                expected: def.params.len(),
                found: args.len(),
            });
        }
        let mut env = Env::new();
        for ((param, sort), value) in def.params.iter().zip(args) {
            if value.sort() != *sort {
                return Err(EvalError::SortMismatch {
                    expected: sort.to_string(),
                    found: value.sort().to_string(),
                });
            }
            env.insert(param.clone(), value);
        }
        self.eval(&def.body, &env)
    }

    fn eval_in(&self, term: &Term, frame: &mut Frame<'_>) -> Result<Value, EvalError> {
        if let Some(v) = frame.memo.get(&term.id()) {
            return Ok(v.clone());
        }
        let value = match term.node_ref() {
            TermNode::Const(v) => v.clone(),
            TermNode::Var(name, sort) => {
                let v = frame
                    .env
                    .get(name)
                    .ok_or_else(|| EvalError::UnboundVariable(name.clone()))?;
                if v.sort() != *sort {
                    return Err(v.mismatch(*sort));
                }
                v.clone()
            }
            TermNode::Node { tag, children, width } => {
                let tag = self.eval_in(tag, frame)?.as_int()?;
                let mut kids = Vec::with_capacity(children.len());
                for c in children {
                    kids.push(self.eval_in(c, frame)?.into_ast()?);
                }
                Value::Ast(Ast::node(tag, kids, *width))
            }
            TermNode::Select { arg, index } => {
                let a = self.eval_in(arg, frame)?;
                Value::Ast(a.as_ast()?.child(*index).clone())
            }
            TermNode::TagOf(a) => Value::Int(self.eval_in(a, frame)?.as_ast()?.tag()),
            TermNode::IsNode(a) => Value::Bool(self.eval_in(a, frame)?.as_ast()?.is_node()),
            TermNode::IsNone(a) => Value::Bool(self.eval_in(a, frame)?.as_ast()?.is_none()),
            TermNode::IsError(a) => Value::Bool(self.eval_in(a, frame)?.as_ast()?.is_error()),
            TermNode::Eq(a, b) => {
                let (a, b) = (self.eval_in(a, frame)?, self.eval_in(b, frame)?);
                if a.sort() != b.sort() {
                    return Err(b.mismatch(a.sort()));
                }
                Value::Bool(a == b)
            }
            TermNode::And(args) => {
                let mut result = true;
                for a in args {
                    if !self.eval_in(a, frame)?.as_bool()? {
                        result = false;
                        break;
                    }
                }
                Value::Bool(result)
            }
            TermNode::Or(args) => {
                let mut result = false;
                for a in args {
                    if self.eval_in(a, frame)?.as_bool()? {
                        result = true;
                        break;
                    }
                }
                Value::Bool(result)
            }
            TermNode::Not(a) => Value::Bool(!self.eval_in(a, frame)?.as_bool()?),
            TermNode::Ite(c, t, e) => {
                if self.eval_in(c, frame)?.as_bool()? {
                    self.eval_in(t, frame)?
                } else {
                    self.eval_in(e, frame)?
                }
            }
            TermNode::Add(a, b) => {
                let (a, b) = (self.eval_in(a, frame)?.as_int()?, self.eval_in(b, frame)?.as_int()?);
                Value::Int(a.wrapping_add(b))
            }
            TermNode::Mul(a, b) => {
                let (a, b) = (self.eval_in(a, frame)?.as_int()?, self.eval_in(b, frame)?.as_int()?);
                Value::Int(a.wrapping_mul(b))
            }
            TermNode::Apply { fun, args, .. } => {
                let mut values = Vec::with_capacity(args.len());
                for a in args {
                    values.push(self.eval_in(a, frame)?);
                }
                self.call(fun, values)?
            }
        };
        frame.memo.insert(term.id(), value.clone());
        Ok(value)
    }
}
