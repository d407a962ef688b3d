//! Bounded reachability between two terms.
//!
//! A [`ReachabilityQuery`] asks whether `start` rewrites to `goal` in at
//! most `max_steps` rule applications. It hands the rewrite functions to a
//! [`Backend`] together with the transition system
//!
//! ```text
//! state  x: AST, step: Int      input  r: Rule, p: Path
//! init   x = encode(start), step = 0
//! next   x' = rewrite(x, r, p, step), step' = step + 1
//! target x = encode(goal)
//! ```
//!
//! and decodes a witness into a [`RewriteTrace`], which is replayed through
//! the engine before it is returned.

use crate::backend::explicit::ExplicitBmc;
use crate::backend::{Backend, CheckOutcome, TransitionSystem};
use crate::config::SearchConfig;
use crate::encoding::Ast;
use crate::error::Result;
use crate::expr::Expr;
use crate::rewrite::{RewriteEngine, REWRITE};
use crate::term::{Sort, Term};
use crate::theory::Theory;
use crate::traceability::RewriteTrace;
use tracing::info;

/// State variable holding the encoded term.
pub const STATE_TERM: &str = "x";
/// State variable counting rewrite steps.
pub const STATE_STEP: &str = "step";
/// Input choosing the rule and direction.
pub const INPUT_RULE: &str = "r";
/// Input choosing the rewrite position.
pub const INPUT_PATH: &str = "p";

/// Answer to a reachability query.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SearchOutcome {
    /// The goal is reachable; the trace leads there.
    Reachable(RewriteTrace),
    /// The goal is not reachable within the step bound.
    Unreachable,
    /// The backend gave up.
    Unknown(String),
}

impl SearchOutcome {
    pub fn is_reachable(&self) -> bool {
        matches!(self, SearchOutcome::Reachable(_))
    }

    pub fn trace(&self) -> Option<&RewriteTrace> {
        match self {
            SearchOutcome::Reachable(trace) => Some(trace),
            _ => None,
        }
    }
}

/// Can `start` be rewritten into `goal`?
#[derive(Debug, Clone)]
pub struct ReachabilityQuery {
    engine: RewriteEngine,
    start: Expr,
    goal: Expr,
    config: SearchConfig,
}

impl ReachabilityQuery {
    /// Elaborates the theory and both terms.
    pub fn new(theory: &Theory, start: &Expr, goal: &Expr, config: SearchConfig) -> Result<Self> {
        config.validate()?;
        let mut engine = RewriteEngine::new(theory, config.depth)?;
        let start = engine.theory().upgrade_expr(start)?;
        let goal = engine.theory().upgrade_expr(goal)?;
        engine.book_mut().register(&start);
        engine.book_mut().register(&goal);
        Ok(Self { engine, start, goal, config })
    }

    pub fn engine(&self) -> &RewriteEngine {
        &self.engine
    }

    pub fn config(&self) -> &SearchConfig {
        &self.config
    }

    /// The elaborated start term.
    pub fn start(&self) -> &Expr {
        &self.start
    }

    /// The elaborated goal term.
    pub fn goal(&self) -> &Expr {
        &self.goal
    }

    pub fn start_ast(&self) -> Ast {
        self.engine.book().encode(&self.start, self.engine.domains().width())
    }

    pub fn goal_ast(&self) -> Ast {
        self.engine.book().encode(&self.goal, self.engine.domains().width())
    }

    /// The transition system applying `rewrite` once per step.
    pub fn transition_system(&self) -> TransitionSystem {
        let mut ts = TransitionSystem::new();
        let x = ts.add_state(STATE_TERM, Sort::Ast);
        let step = ts.add_state(STATE_STEP, Sort::Int);
        let r = ts.add_input(INPUT_RULE, Sort::Rule);
        let p = ts.add_input(INPUT_PATH, Sort::Path);
        ts.set_init(STATE_TERM, Term::ast(self.start_ast()));
        ts.set_init(STATE_STEP, Term::int(0));
        ts.set_next(STATE_TERM, Term::apply(REWRITE, vec![x.clone(), r, p, step.clone()], Sort::Ast));
        ts.set_next(STATE_STEP, Term::add(step, Term::int(1)));
        ts.set_target(Term::eq(x, Term::ast(self.goal_ast())));
        ts
    }

    /// Runs the query on `backend`.
    pub fn run<B: Backend>(&self, backend: &mut B) -> Result<SearchOutcome> {
        info!(
            backend = backend.name(),
            theory = self.engine.theory().name(),
            start = %self.start,
            goal = %self.goal,
            max_steps = self.config.max_steps,
            depth = self.config.depth,
            "starting reachability search"
        );
        backend.declare_datatypes(self.engine.domains())?;
        for def in self.engine.definitions() {
            backend.define_fun(def.clone())?;
        }
        let outcome = match backend.check(&self.transition_system(), self.config.max_steps)? {
            CheckOutcome::Sat(witness) => {
                let trace = RewriteTrace::from_witness(&self.engine, &witness)?;
                trace.replay(&self.engine)?;
                info!(steps = trace.step_count(), "goal reachable");
                SearchOutcome::Reachable(trace)
            }
            CheckOutcome::Unsat => {
                info!("goal unreachable within bound");
                SearchOutcome::Unreachable
            }
            CheckOutcome::Unknown(reason) => {
                info!(%reason, "search inconclusive");
                SearchOutcome::Unknown(reason)
            }
        };
        Ok(outcome)
    }

    /// Runs the query on an [`ExplicitBmc`] configured from the search
    /// configuration.
    pub fn run_explicit(&self) -> Result<SearchOutcome> {
        let mut backend = ExplicitBmc::new(self.config.max_states);
        if let Some(path) = &self.config.witness_path {
            backend = backend.with_witness_path(path.clone());
        }
        self.run(&mut backend)
    }
}
