//! Symbolic construction of encoded terms.
//!
//! [`construct`] renders a target term as a symbolic [`Term`] of sort
//! `Ast`. When a source term and its symbolic value are supplied, every
//! target position whose subterm also occurs in the source is emitted as a
//! selector chain into the source value instead of being rebuilt. Applying a
//! rule therefore costs the size of the rule, not of the term it is applied
//! to.
//!
//! Variables that occur in the target but not in the source get fresh,
//! step-scoped codes (see [`CodeBook::fresh_code`]); every other symbol is
//! encoded by its code.

use crate::encoding::CodeBook;
use crate::expr::{freevar, Expr, Position};
use crate::fingerprint::{representatives, structural_hashes, HashValue};
use crate::term::Term;
use std::collections::{BTreeMap, HashMap};
use tracing::{trace, warn};

struct Builder<'a> {
    book: &'a CodeBook,
    width: usize,
    tar_hashes: BTreeMap<Position, HashValue>,
    src: Option<(&'a Expr, &'a Term)>,
    reps: BTreeMap<HashValue, Position>,
    fresh: BTreeMap<String, usize>,
    step: &'a Term,
    built: HashMap<HashValue, (Expr, Term)>,
}

/// Encodes `tar` symbolically, sharing the subterms it has in common with
/// `src`.
///
/// `src` pairs the source term with the symbolic value it is matched
/// against; `step` is the rewrite step used to allocate fresh codes. Without
/// a source, the result evaluates to [`CodeBook::encode`] of `tar`.
pub fn construct(
    book: &CodeBook,
    width: usize,
    tar: &Expr,
    src: Option<(&Expr, &Term)>,
    step: &Term,
) -> Term {
    Builder::new(book, width, tar, src, step).build(tar, &mut Vec::new())
}

impl<'a> Builder<'a> {
    fn new(
        book: &'a CodeBook,
        width: usize,
        tar: &Expr,
        src: Option<(&'a Expr, &'a Term)>,
        step: &'a Term,
    ) -> Self {
        let (reps, fresh) = match src {
            Some((src_expr, _)) => {
                (representatives(&structural_hashes(src_expr)), freevar(tar, src_expr))
            }
            None => (BTreeMap::new(), BTreeMap::new()),
        };
        trace!(target_term = %tar, shared = reps.len(), fresh = fresh.len(), "constructing");
        Self {
            book,
            width,
            tar_hashes: structural_hashes(tar),
            src,
            reps,
            fresh,
            step,
            built: HashMap::new(),
        }
    }

    fn build(&mut self, tar: &Expr, pos: &mut Position) -> Term {
        let Some(hash) = self.tar_hashes.get(pos.as_slice()).copied() else {
            return self.synthesize(tar, pos);
        };
        if let Some(reference) = self.reference(tar, &hash) {
            return reference;
        }
        match self.built.get(&hash) {
            Some((expr, done)) if expr == tar => return done.clone(),
            Some(_) => {
                warn!(%hash, position = ?pos, "structural hash collision, not reusing subterm");
                return self.synthesize(tar, pos);
            }
            None => {}
        }
        let term = self.synthesize(tar, pos);
        self.built.insert(hash, (tar.clone(), term.clone()));
        term
    }

    /// Selector chain into the source value, if `tar` occurs in the source.
    fn reference(&self, tar: &Expr, hash: &HashValue) -> Option<Term> {
        let (src_expr, src_term) = self.src?;
        let rep = self.reps.get(hash)?;
        if src_expr.subexpr(rep) != Some(tar) {
            warn!(%hash, position = ?rep, "structural hash collision, rebuilding subterm");
            return None;
        }
        Some(src_term.select_path(rep))
    }

    fn synthesize(&mut self, tar: &Expr, pos: &mut Position) -> Term {
        let tag = match self.fresh.get(tar.sym()) {
            Some(&index) if tar.is_var() => {
                // -(step * stride + index)
                let scaled = Term::mul(Term::int(-self.book.fresh_stride()), self.step.clone());
                Term::add(scaled, Term::int(-(index as i64)))
            }
            _ => Term::int(self.book.code(tar.sym())),
        };
        let mut children = Vec::with_capacity(tar.args().len());
        for (i, arg) in tar.args().iter().enumerate() {
            pos.push(i);
            children.push(self.build(arg, pos));
            pos.pop();
        }
        Term::node(tag, children, self.width)
    }
}
