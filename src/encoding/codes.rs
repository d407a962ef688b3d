//! Integer codes for symbols.
//!
//! Three disjoint code ranges share the tag field of an encoded node:
//!
//! | range | meaning |
//! |---|---|
//! | `1..=n` | symbols of the theory, numbered by [`Theory::symcode`] |
//! | `FALLBACK_BASE..` | any other symbol, from a hash of its name |
//! | `..=-1` | fresh variables introduced by a rewrite step |
//!
//! Fresh codes are `-(step * stride + index)` with `index` in `1..stride`,
//! where `stride` exceeds the largest number of fresh variables any rule
//! direction introduces. Codes from different steps never collide.

use super::Ast;
use crate::constants::DOMAIN_FALLBACK_CODE_V1;
use crate::error::DecodeError;
use crate::expr::{freevar, Expr, ExprKind};
use crate::fingerprint::HashValue;
use crate::theory::Theory;
use std::collections::{BTreeMap, BTreeSet};
use tracing::{debug, warn};

/// First code of the fallback range.
pub const FALLBACK_BASE: i64 = 1 << 40;

/// Symbol-code table of one theory.
#[derive(Debug, Clone)]
pub struct CodeBook {
    codes: BTreeMap<String, i64>,
    names: BTreeMap<i64, String>,
    sorts: BTreeSet<String>,
    ops: BTreeSet<String>,
    stride: i64,
}

impl CodeBook {
    pub fn new(theory: &Theory) -> Self {
        let codes = theory.symcode();
        let names = codes.iter().map(|(s, c)| (*c, s.clone())).collect();
        let max_fresh = theory
            .rules()
            .iter()
            .map(|r| freevar(&r.t2, &r.t1).len().max(freevar(&r.t1, &r.t2).len()))
            .max()
            .unwrap_or(0);
        let stride = max_fresh as i64 + 1;
        debug!(theory = theory.name(), symbols = codes.len(), stride, "built code book");
        Self {
            codes,
            names,
            sorts: theory.sorts().keys().cloned().collect(),
            ops: theory.ops().keys().cloned().collect(),
            stride,
        }
    }

    /// Code of a theory symbol.
    pub fn symcode(&self, sym: &str) -> Option<i64> {
        self.codes.get(sym).copied()
    }

    /// Code used for `sym`: its symcode, or else its fallback code.
    pub fn code(&self, sym: &str) -> i64 {
        self.symcode(sym).unwrap_or_else(|| Self::fallback_code(sym))
    }

    /// Deterministic code for a symbol outside the theory.
    pub fn fallback_code(sym: &str) -> i64 {
        let hash = HashValue::hash_with_domain(DOMAIN_FALLBACK_CODE_V1, sym.as_bytes());
        FALLBACK_BASE + (hash.prefix_u64() % (FALLBACK_BASE as u64)) as i64
    }

    /// Spacing between the fresh-code blocks of consecutive steps.
    pub fn fresh_stride(&self) -> i64 {
        self.stride
    }

    /// Fresh code of the `index`-th (from 1) new variable at `step`.
    pub fn fresh_code(&self, step: i64, index: usize) -> i64 {
        -(step * self.stride + index as i64)
    }

    /// Records the symbols of `expr` so their fallback codes can be decoded.
    ///
    /// A code already taken by another symbol keeps its first name.
    pub fn register(&mut self, expr: &Expr) {
        let mut syms = BTreeSet::new();
        expr.collect_symbols(&mut syms);
        for sym in syms {
            if self.codes.contains_key(&sym) {
                continue;
            }
            let code = Self::fallback_code(&sym);
            match self.names.get(&code) {
                Some(existing) if *existing != sym => {
                    warn!(code, %existing, symbol = %sym, "fallback code collision, keeping first symbol");
                }
                Some(_) => {}
                None => {
                    self.names.insert(code, sym);
                }
            }
        }
    }

    /// Symbol name for a code, if it has one.
    pub fn symbol(&self, code: i64) -> Option<String> {
        if code < 0 {
            let n = -code;
            let (step, index) = (n / self.stride, n % self.stride);
            return (index > 0).then(|| format!("_v{}_{}", step, index));
        }
        self.names.get(&code).cloned()
    }

    /// Encodes a term outright, every symbol by its code.
    pub fn encode(&self, expr: &Expr, width: usize) -> Ast {
        let children = expr.args().iter().map(|a| self.encode(a, width)).collect();
        Ast::node(self.code(expr.sym()), children, width)
    }

    /// Decodes an encoded term.
    ///
    /// The kind of each node follows from its symbol: declared sorts and
    /// operators decode as such, every other symbol as a variable. Empty
    /// slots are dropped.
    pub fn decode(&self, ast: &Ast) -> Result<Expr, DecodeError> {
        let Ast::Node { tag, children } = ast else {
            return Err(DecodeError::NotANode { found: ast.to_string() });
        };
        let sym = self.symbol(*tag).ok_or(DecodeError::UnknownCode(*tag))?;
        let kind = if self.sorts.contains(&sym) {
            ExprKind::Sort
        } else if self.ops.contains(&sym) {
            ExprKind::App
        } else {
            ExprKind::Var
        };
        let args = children
            .iter()
            .filter(|c| !c.is_none())
            .map(|c| self.decode(c))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Expr::new(sym, kind, args)?)
    }
}
