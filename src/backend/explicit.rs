//! Explicit-state bounded model checking.
//!
//! [`ExplicitBmc`] explores a [`TransitionSystem`] breadth first. Every
//! input ranges over its finite domain, the next-state terms are evaluated
//! for every combination, and states already seen are dropped. The first
//! state satisfying the target is reported with the shortest witness
//! leading to it.
//!
//! # Citations
//! - Explicit-state model checking: Holzmann, "The model checker SPIN" (1997)
//! - Bounded model checking: Biere et al., "Symbolic model checking without BDDs" (1999)

use super::{Backend, CheckOutcome, TransitionSystem, Witness, WitnessFrame};
use crate::encoding::Domains;
use crate::error::{BackendError, EvalError};
use crate::term::{Env, Evaluator, FunDef, FunctionTable, Sort, Value};
use std::collections::{BTreeMap, HashSet};
use std::path::PathBuf;
use tracing::{debug, info};

/// Default bound on the number of distinct states explored.
pub const DEFAULT_MAX_STATES: usize = 200_000;

struct Visited {
    state: Vec<Value>,
    /// Predecessor index and the inputs that led here.
    parent: Option<(usize, Vec<Value>)>,
}

/// Breadth-first reference backend.
#[derive(Debug)]
pub struct ExplicitBmc {
    domains: Option<Domains>,
    funs: FunctionTable,
    max_states: usize,
    witness_path: Option<PathBuf>,
}

impl Default for ExplicitBmc {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_STATES)
    }
}

impl ExplicitBmc {
    pub fn new(max_states: usize) -> Self {
        Self { domains: None, funs: FunctionTable::new(), max_states, witness_path: None }
    }

    /// Writes the witness of every satisfiable check to `path`, in CBOR.
    pub fn with_witness_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.witness_path = Some(path.into());
        self
    }

    pub fn functions(&self) -> &FunctionTable {
        &self.funs
    }

    fn input_domain(&self, domains: &Domains, name: &str, sort: Sort) -> Result<Vec<Value>, BackendError> {
        match sort {
            Sort::Path => Ok(domains.paths().into_iter().map(Value::Path).collect()),
            Sort::Rule => Ok(domains.rule_tags().into_iter().map(Value::Rule).collect()),
            Sort::Bool => Ok(vec![Value::Bool(false), Value::Bool(true)]),
            Sort::Ast | Sort::Int => Err(BackendError::System(format!(
                "input '{}' has unbounded sort {}",
                name, sort
            ))),
        }
    }

    fn input_combinations(
        &self,
        domains: &Domains,
        system: &TransitionSystem,
    ) -> Result<Vec<Vec<Value>>, BackendError> {
        let mut combos = vec![Vec::new()];
        for (name, sort) in system.inputs() {
            let values = self.input_domain(domains, name, *sort)?;
            combos = combos
                .into_iter()
                .flat_map(|prefix| {
                    values.iter().map(move |v| {
                        let mut next = prefix.clone();
                        next.push(v.clone());
                        next
                    })
                })
                .collect();
        }
        Ok(combos)
    }

    fn witness(&self, system: &TransitionSystem, arena: &[Visited], end: usize) -> Witness {
        let mut frames = Vec::new();
        let mut inputs = BTreeMap::new();
        let mut cursor = Some(end);
        while let Some(i) = cursor {
            let node = &arena[i];
            frames.push(WitnessFrame {
                state: bind(system.states(), &node.state),
                inputs: std::mem::take(&mut inputs),
            });
            cursor = node.parent.as_ref().map(|(parent, combo)| {
                inputs = bind(system.inputs(), combo);
                *parent
            });
        }
        frames.reverse();
        Witness::new(frames)
    }
}

fn bind(vars: &[(String, Sort)], values: &[Value]) -> BTreeMap<String, Value> {
    vars.iter().map(|(n, _)| n.clone()).zip(values.iter().cloned()).collect()
}

impl Backend for ExplicitBmc {
    fn name(&self) -> &str {
        "explicit-bmc"
    }

    fn declare_datatypes(&mut self, domains: &Domains) -> Result<(), BackendError> {
        debug!(
            width = domains.width(),
            paths = domains.paths().len(),
            rule_tags = domains.rule_tags().len(),
            "declaring datatypes"
        );
        self.domains = Some(domains.clone());
        Ok(())
    }

    fn define_fun(&mut self, def: FunDef) -> Result<(), BackendError> {
        if self.domains.is_none() {
            return Err(BackendError::NotDeclared);
        }
        if let Some(missing) = def
            .body
            .called_functions()
            .into_iter()
            .find(|f| *f != def.name && !self.funs.contains(f))
        {
            return Err(EvalError::UnknownFunction(missing).into());
        }
        let name = def.name.clone();
        let size = def.body.dag_size();
        if !self.funs.insert(def) {
            return Err(BackendError::DuplicateDefinition(name));
        }
        debug!(function = %name, size, "defined function");
        Ok(())
    }

    fn check(&mut self, system: &TransitionSystem, bound: usize) -> Result<CheckOutcome, BackendError> {
        let domains = self.domains.as_ref().ok_or(BackendError::NotDeclared)?;
        system.validate()?;
        let target = system
            .target()
            .ok_or_else(|| BackendError::System("no target".to_string()))?;
        let eval = Evaluator::new(&self.funs);
        let combos = self.input_combinations(domains, system)?;

        let mut init = Vec::with_capacity(system.states().len());
        for (name, _) in system.states() {
            let term = system
                .init(name)
                .ok_or_else(|| BackendError::System(format!("state '{}' has no initial value", name)))?;
            init.push(eval.eval(term, &Env::new())?);
        }
        let mut seen: HashSet<Vec<Value>> = HashSet::from([init.clone()]);
        let mut arena = vec![Visited { state: init, parent: None }];
        let mut frontier = vec![0];

        for depth in 0..=bound {
            for &i in &frontier {
                let env = bind(system.states(), &arena[i].state);
                if eval.eval(target, &env)?.as_bool()? {
                    let witness = self.witness(system, &arena, i);
                    info!(depth, explored = arena.len(), "target reached");
                    if let Some(path) = &self.witness_path {
                        witness.save_to_file(path)?;
                        debug!(path = %path.display(), "wrote witness");
                    }
                    return Ok(CheckOutcome::Sat(witness));
                }
            }
            if depth == bound {
                break;
            }
            let mut next_frontier = Vec::new();
            for &i in &frontier {
                let state_env = bind(system.states(), &arena[i].state);
                for combo in &combos {
                    let mut env = state_env.clone();
                    env.extend(bind(system.inputs(), combo));
                    let mut next = Vec::with_capacity(system.states().len());
                    for (name, _) in system.states() {
                        let term = system.next(name).ok_or_else(|| {
                            BackendError::System(format!("state '{}' has no next value", name))
                        })?;
                        next.push(eval.eval(term, &env)?);
                    }
                    if !seen.insert(next.clone()) {
                        continue;
                    }
                    if arena.len() >= self.max_states {
                        info!(depth, explored = arena.len(), "state budget exhausted");
                        return Ok(CheckOutcome::Unknown(format!(
                            "state budget of {} exceeded at depth {}",
                            self.max_states,
                            depth + 1
                        )));
                    }
                    arena.push(Visited { state: next, parent: Some((i, combo.clone())) });
                    next_frontier.push(arena.len() - 1);
                }
            }
            debug!(depth = depth + 1, frontier = next_frontier.len(), explored = arena.len(), "explored layer");
            if next_frontier.is_empty() {
                break;
            }
            frontier = next_frontier;
        }
        info!(bound, explored = arena.len(), "target unreachable within bound");
        Ok(CheckOutcome::Unsat)
    }
}
