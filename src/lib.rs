//! gatrewrite: bounded rewriting search over generalized algebraic theories.
//!
//! A theory declares parameterized sorts, typed operators and equational
//! rules. Given a start term and a goal term, this crate decides whether the
//! start rewrites to the goal in a bounded number of rule applications,
//! each rule usable in either direction at any position up to a bounded
//! depth.
//!
//! The search runs on a finite encoding. Terms become fixed-width tagged
//! trees ([`encoding::Ast`]) with `None` slots and an absorbing `Error`
//! value. Applying a rule at a position becomes a total function on that
//! encoding ([`rewrite::RewriteEngine`]). A bounded reachability backend
//! ([`backend::Backend`]) then explores rule and position choices step by
//! step.
//!
//! # Layers
//!
//! - [`expr`], [`theory`]: terms, declarations, sort elaboration
//! - [`fingerprint`]: structural hashes and classes of identical subterms
//! - [`encoding`]: the bounded encoding and its symbol codes
//! - [`term`], [`construct`], [`rewrite`]: rewrite functions as symbolic terms
//! - [`backend`], [`search`], [`traceability`]: reachability and witnesses
//!
//! # References
//!
//! - Cartmell, J. "Generalised algebraic theories and contextual categories" (1986)
//! - Baader, F., Nipkow, T. "Term Rewriting and All That" (1998)
//! - Biere, A. et al. "Symbolic model checking without BDDs" (1999)
//!
//! # Example
//!
//! ```
//! use gatrewrite::prelude::*;
//!
//! let ob = Expr::sort("Ob", vec![])?;
//! let x = Expr::var("x", ob.clone())?;
//! let y = Expr::var("y", ob.clone())?;
//! let z = Expr::var("z", ob.clone())?;
//! let m = |a: &Expr, b: &Expr| Expr::app("M", vec![a.clone(), b.clone()]);
//! let lhs = m(&x, &m(&y, &z)?)?;
//! let rhs = m(&m(&x, &y)?, &z)?;
//! let theory = Theory::new(
//!     "semigroup",
//!     vec![SortDecl::new("Ob", "Ob", vec![], "")],
//!     vec![OpDecl::new("M", "({}⋅{})", ob.clone(), vec![x.clone(), y.clone()], "")],
//!     vec![Rule::new("assoc", "", lhs.clone(), rhs.clone())],
//! )?;
//!
//! let config = SearchConfig::default().with_max_steps(1);
//! let query = ReachabilityQuery::new(&theory, &lhs, &rhs, config)?;
//! let outcome = query.run_explicit()?;
//! assert_eq!(outcome.trace().map(|t| t.step_count()), Some(1));
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

pub mod backend;
pub mod config;
pub mod constants;
pub mod construct;
pub mod encoding;
pub mod error;
pub mod expr;
pub mod fingerprint;
pub mod rewrite;
pub mod search;
pub mod term;
pub mod theory;
pub mod traceability;

#[cfg(test)]
mod fixtures;

pub use error::{Error, Result};
pub use expr::{Expr, ExprKind};
pub use search::{ReachabilityQuery, SearchOutcome};
pub use theory::{OpDecl, Rule, SortDecl, Theory};
pub use traceability::{RewriteStep, RewriteTrace, TraceabilityError};

/// Prelude for convenient usage.
pub mod prelude {
    pub use crate::backend::explicit::ExplicitBmc;
    pub use crate::backend::{Backend, CheckOutcome, TransitionSystem, Witness};
    pub use crate::config::SearchConfig;
    pub use crate::encoding::{Ast, CodeBook, Direction, Domains, Path, RuleTag};
    pub use crate::error::{Error, Result};
    pub use crate::expr::{Expr, ExprKind, MatchDict};
    pub use crate::fingerprint::HashValue;
    pub use crate::rewrite::RewriteEngine;
    pub use crate::search::{ReachabilityQuery, SearchOutcome};
    pub use crate::term::{FunDef, Sort, Term, Value};
    pub use crate::theory::{OpDecl, Rule, SortDecl, Theory};
    pub use crate::traceability::{RewriteStep, RewriteTrace};
}
