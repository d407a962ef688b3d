//! Backend interface for bounded reachability.
//!
//! A backend receives the finite encoding domains, the rewrite functions as
//! named definitions, and a [`TransitionSystem`] whose next-state relation
//! applies them. It answers whether a target state is reachable within a
//! number of transitions and, if so, returns a step-indexed [`Witness`].
//!
//! [`explicit::ExplicitBmc`] is the bundled reference backend.

pub mod explicit;

use crate::constants::WITNESS_FORMAT_VERSION;
use crate::encoding::Domains;
use crate::error::BackendError;
use crate::term::{FunDef, Sort, Term, Value};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// A bounded reachability backend.
pub trait Backend {
    /// The name of this backend.
    fn name(&self) -> &str;

    /// Declares the `AST`, `Path` and `Rule` datatypes.
    fn declare_datatypes(&mut self, domains: &Domains) -> Result<(), BackendError>;

    /// Defines a named function. Definitions arrive callees first.
    fn define_fun(&mut self, def: FunDef) -> Result<(), BackendError>;

    /// Searches for a path of at most `bound` transitions from an initial
    /// state to a target state.
    fn check(&mut self, system: &TransitionSystem, bound: usize) -> Result<CheckOutcome, BackendError>;
}

/// State variables with initial values and next-state terms, input
/// variables, and a target predicate over the state.
#[derive(Debug, Clone, Default)]
pub struct TransitionSystem {
    states: Vec<(String, Sort)>,
    inputs: Vec<(String, Sort)>,
    init: BTreeMap<String, Term>,
    next: BTreeMap<String, Term>,
    target: Option<Term>,
}

impl TransitionSystem {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_state(&mut self, name: impl Into<String>, sort: Sort) -> Term {
        let name = name.into();
        let var = Term::var(name.clone(), sort);
        self.states.push((name, sort));
        var
    }

    pub fn add_input(&mut self, name: impl Into<String>, sort: Sort) -> Term {
        let name = name.into();
        let var = Term::var(name.clone(), sort);
        self.inputs.push((name, sort));
        var
    }

    /// Initial value of a state variable, as a closed term.
    pub fn set_init(&mut self, name: impl Into<String>, value: Term) {
        self.init.insert(name.into(), value);
    }

    /// Next-state value of a state variable, over states and inputs.
    pub fn set_next(&mut self, name: impl Into<String>, value: Term) {
        self.next.insert(name.into(), value);
    }

    pub fn set_target(&mut self, target: Term) {
        self.target = Some(target);
    }

    pub fn states(&self) -> &[(String, Sort)] {
        &self.states
    }

    pub fn inputs(&self) -> &[(String, Sort)] {
        &self.inputs
    }

    pub fn init(&self, name: &str) -> Option<&Term> {
        self.init.get(name)
    }

    pub fn next(&self, name: &str) -> Option<&Term> {
        self.next.get(name)
    }

    pub fn target(&self) -> Option<&Term> {
        self.target.as_ref()
    }

    /// Checks that every state has well-sorted initial and next values and
    /// that the target is a predicate.
    pub fn validate(&self) -> Result<(), BackendError> {
        let mut names: Vec<&str> = Vec::new();
        for (name, _) in self.states.iter().chain(&self.inputs) {
            if names.contains(&name.as_str()) {
                return Err(BackendError::System(format!("variable '{}' declared twice", name)));
            }
            names.push(name.as_str());
        }
        for (name, sort) in &self.states {
            for (what, map) in [("initial", &self.init), ("next", &self.next)] {
                let term = map.get(name).ok_or_else(|| {
                    BackendError::System(format!("state '{}' has no {} value", name, what))
                })?;
                if term.sort() != *sort {
                    return Err(BackendError::System(format!(
                        "{} value of '{}' has sort {}, expected {}",
                        what,
                        name,
                        term.sort(),
                        sort
                    )));
                }
            }
        }
        match &self.target {
            Some(t) if t.sort() == Sort::Bool => Ok(()),
            Some(t) => Err(BackendError::System(format!("target has sort {}", t.sort()))),
            None => Err(BackendError::System("no target".to_string())),
        }
    }
}

/// Result of a bounded check.
#[derive(Debug, Clone, PartialEq)]
pub enum CheckOutcome {
    /// A target state is reachable.
    Sat(Witness),
    /// No target state is reachable within the bound.
    Unsat,
    /// The backend gave up.
    Unknown(String),
}

impl CheckOutcome {
    pub fn is_sat(&self) -> bool {
        matches!(self, CheckOutcome::Sat(_))
    }

    pub fn is_unsat(&self) -> bool {
        matches!(self, CheckOutcome::Unsat)
    }

    pub fn is_unknown(&self) -> bool {
        matches!(self, CheckOutcome::Unknown(_))
    }
}

/// State and input values at one step of a witness. The inputs of frame `k`
/// drive the transition to frame `k + 1`; the last frame has none.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WitnessFrame {
    pub state: BTreeMap<String, Value>,
    pub inputs: BTreeMap<String, Value>,
}

/// A path from an initial state to a target state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Witness {
    format_version: u32,
    pub frames: Vec<WitnessFrame>,
}

impl Witness {
    pub fn new(frames: Vec<WitnessFrame>) -> Self {
        Self { format_version: WITNESS_FORMAT_VERSION, frames }
    }

    /// Number of transitions.
    pub fn len(&self) -> usize {
        self.frames.len().saturating_sub(1)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Serializes the witness to CBOR bytes.
    pub fn to_cbor(&self) -> Result<Vec<u8>, BackendError> {
        serde_cbor::to_vec(self).map_err(|e| BackendError::Serialization(e.to_string()))
    }

    /// Deserializes a witness from CBOR bytes.
    pub fn from_cbor(bytes: &[u8]) -> Result<Self, BackendError> {
        let witness: Self =
            serde_cbor::from_slice(bytes).map_err(|e| BackendError::Serialization(e.to_string()))?;
        if witness.format_version != WITNESS_FORMAT_VERSION {
            return Err(BackendError::Serialization(format!(
                "witness format version mismatch: loaded {}, current {}",
                witness.format_version, WITNESS_FORMAT_VERSION
            )));
        }
        Ok(witness)
    }

    /// Saves the witness to a file, in CBOR.
    pub fn save_to_file(&self, path: &std::path::Path) -> Result<(), BackendError> {
        std::fs::write(path, self.to_cbor()?)?;
        Ok(())
    }

    /// Loads a witness saved with [`Witness::save_to_file`].
    pub fn load_from_file(path: &std::path::Path) -> Result<Self, BackendError> {
        let bytes = std::fs::read(path)?;
        Self::from_cbor(&bytes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::encoding::Ast;

    fn counter() -> TransitionSystem {
        let mut ts = TransitionSystem::new();
        let n = ts.add_state("n", Sort::Int);
        ts.set_init("n", Term::int(0));
        ts.set_next("n", Term::add(n.clone(), Term::int(1)));
        ts.set_target(Term::eq(n, Term::int(3)));
        ts
    }

    #[test]
    fn validate_accepts_complete_systems() {
        assert!(counter().validate().is_ok());
    }

    #[test]
    fn validate_reports_missing_and_ill_sorted_parts() {
        let mut ts = counter();
        ts.set_next("n", Term::bool(true));
        assert!(matches!(ts.validate(), Err(BackendError::System(msg)) if msg.contains("sort Bool")));

        let mut ts = TransitionSystem::new();
        ts.add_state("x", Sort::Ast);
        ts.set_init("x", Term::ast(Ast::None));
        assert!(matches!(ts.validate(), Err(BackendError::System(msg)) if msg.contains("no next")));

        let mut ts = counter();
        ts.add_input("n", Sort::Bool);
        assert!(matches!(ts.validate(), Err(BackendError::System(msg)) if msg.contains("twice")));
    }

    #[test]
    fn witness_survives_cbor() {
        let frame = |n: i64| WitnessFrame {
            state: BTreeMap::from([("n".to_string(), Value::Int(n))]),
            inputs: BTreeMap::new(),
        };
        let witness = Witness::new(vec![frame(0), frame(1)]);
        assert_eq!(witness.len(), 1);
        let bytes = witness.to_cbor().unwrap();
        assert_eq!(Witness::from_cbor(&bytes).unwrap(), witness);
        assert!(Witness::from_cbor(&bytes[..bytes.len() / 2]).is_err());
    }
}
