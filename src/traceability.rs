//! Traceability and replay for rewrite sequences.
//!
//! A [`RewriteTrace`] is the human-readable form of a reachability witness:
//! the start term followed by one [`RewriteStep`] per applied rule, each
//! with its rule, direction, path, resulting term and the fingerprints of
//! the encoded states around it. Traces can be extended step by step,
//! rolled back, and replayed against a [`RewriteEngine`] to validate them.
//!
//! # Citations
//! - Transformation traces: Jouault & Kurtev, "Transforming models with ATL" (2005)
//! - Rewrite derivations: Baader & Nipkow, "Term Rewriting and All That" (1998), ch. 2

use crate::backend::Witness;
use crate::encoding::{Ast, Direction, Path, RuleTag};
use crate::error::{DecodeError, EvalError};
use crate::expr::Expr;
use crate::fingerprint::HashValue;
use crate::rewrite::RewriteEngine;
use crate::search::{INPUT_PATH, INPUT_RULE, STATE_STEP, STATE_TERM};
use crate::term::Value;
use std::collections::BTreeMap;
use std::fmt;
use tracing::debug;

/// One rule application.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RewriteStep {
    tag: RuleTag,
    rule_name: String,
    path: Path,
    /// Step counter the rule was applied with; scopes fresh variables.
    step: i64,
    result: Ast,
    term: Expr,
    pre_fingerprint: HashValue,
    post_fingerprint: HashValue,
}

impl RewriteStep {
    /// Returns the applied rule and direction.
    pub fn tag(&self) -> RuleTag {
        self.tag
    }

    /// Returns the name of the applied rule.
    pub fn rule_name(&self) -> &str {
        &self.rule_name
    }

    /// Returns the position the rule was applied at.
    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn step(&self) -> i64 {
        self.step
    }

    /// Returns the encoded term after the step.
    pub fn result(&self) -> &Ast {
        &self.result
    }

    /// Returns the decoded term after the step.
    pub fn term(&self) -> &Expr {
        &self.term
    }

    pub fn pre_fingerprint(&self) -> HashValue {
        self.pre_fingerprint
    }

    pub fn post_fingerprint(&self) -> HashValue {
        self.post_fingerprint
    }
}

/// A start term and the rewrite steps applied to it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RewriteTrace {
    theory_fingerprint: HashValue,
    initial: Ast,
    initial_term: Expr,
    steps: Vec<RewriteStep>,
    /// Number of steps currently in effect.
    current_version: usize,
}

impl RewriteTrace {
    /// Starts an empty trace at an encoded term.
    pub fn new(engine: &RewriteEngine, initial: Ast) -> Result<Self, TraceabilityError> {
        let initial_term = engine.book().decode(&initial)?;
        Ok(Self {
            theory_fingerprint: engine.theory().fingerprint(),
            initial,
            initial_term,
            steps: Vec::new(),
            current_version: 0,
        })
    }

    /// Decodes a witness over the state variables of
    /// [`ReachabilityQuery`](crate::search::ReachabilityQuery).
    pub fn from_witness(engine: &RewriteEngine, witness: &Witness) -> Result<Self, TraceabilityError> {
        let first = witness
            .frames
            .first()
            .ok_or_else(|| TraceabilityError::MalformedWitness("no frames".to_string()))?;
        let mut trace = Self::new(engine, state_ast(&first.state, 0)?.clone())?;
        for (k, pair) in witness.frames.windows(2).enumerate() {
            let (before, after) = (&pair[0], &pair[1]);
            let tag = match before.inputs.get(INPUT_RULE) {
                Some(Value::Rule(tag)) => *tag,
                _ => return Err(missing(INPUT_RULE, k)),
            };
            let path = match before.inputs.get(INPUT_PATH) {
                Some(Value::Path(path)) => path.clone(),
                _ => return Err(missing(INPUT_PATH, k)),
            };
            let step = match before.state.get(STATE_STEP) {
                Some(Value::Int(step)) => *step,
                _ => return Err(missing(STATE_STEP, k)),
            };
            let pre = state_ast(&before.state, k)?;
            let post = state_ast(&after.state, k + 1)?;
            trace.record_step(rewrite_step(engine, tag, path, step, pre, post.clone())?);
        }
        debug!(steps = trace.step_count(), "decoded witness");
        Ok(trace)
    }

    /// Records a rewrite step and updates the current version.
    pub fn record_step(&mut self, step: RewriteStep) {
        self.steps.truncate(self.current_version);
        self.steps.push(step);
        self.current_version = self.steps.len();
    }

    /// Applies a rule to the current term and records the step.
    ///
    /// Steps after the current version are discarded first.
    pub fn apply(
        &mut self,
        engine: &RewriteEngine,
        tag: RuleTag,
        path: Path,
    ) -> Result<&RewriteStep, TraceabilityError> {
        let step = self.current_version as i64;
        let current = self.current().clone();
        let result = engine.rewrite(&current, tag, &path, step)?;
        if result.is_error() {
            return Err(TraceabilityError::PatternNoLongerMatches { step: self.current_version });
        }
        let recorded = rewrite_step(engine, tag, path, step, &current, result)?;
        self.record_step(recorded);
        Ok(&self.steps[self.steps.len() - 1])
    }

    /// Returns the encoded term at the current version.
    pub fn current(&self) -> &Ast {
        match self.current_version.checked_sub(1) {
            Some(i) => &self.steps[i].result,
            None => &self.initial,
        }
    }

    /// Returns the decoded term at the current version.
    pub fn current_term(&self) -> &Expr {
        match self.current_version.checked_sub(1) {
            Some(i) => &self.steps[i].term,
            None => &self.initial_term,
        }
    }

    pub fn initial(&self) -> &Ast {
        &self.initial
    }

    pub fn initial_term(&self) -> &Expr {
        &self.initial_term
    }

    /// Returns the number of recorded steps.
    pub fn step_count(&self) -> usize {
        self.steps.len()
    }

    /// Returns the current version index.
    pub fn current_version(&self) -> usize {
        self.current_version
    }

    /// Returns a reference to a specific rewrite step.
    pub fn get_step(&self, index: usize) -> Option<&RewriteStep> {
        self.steps.get(index)
    }

    /// Returns an iterator over all rewrite steps.
    pub fn steps(&self) -> impl Iterator<Item = &RewriteStep> {
        self.steps.iter()
    }

    /// Rolls back to a previous version.
    pub fn rollback_to(&mut self, target_version: usize) -> Result<(), TraceabilityError> {
        if target_version > self.steps.len() {
            return Err(TraceabilityError::VersionMismatch);
        }
        self.current_version = target_version;
        Ok(())
    }

    /// Returns the fingerprint of the initial term (version 0).
    pub fn initial_fingerprint(&self) -> HashValue {
        self.initial.fingerprint()
    }

    /// Re-applies the first `target_version` steps through `engine` and
    /// returns the resulting term.
    ///
    /// Every step must apply, and the states before and after it must have
    /// the recorded fingerprints.
    pub fn replay_to(&self, engine: &RewriteEngine, target_version: usize) -> Result<Ast, TraceabilityError> {
        if target_version > self.steps.len() {
            return Err(TraceabilityError::VersionMismatch);
        }
        if engine.theory().fingerprint() != self.theory_fingerprint {
            return Err(TraceabilityError::TheoryMismatch);
        }
        let mut current = self.initial.clone();
        for (i, step) in self.steps[..target_version].iter().enumerate() {
            if current.fingerprint() != step.pre_fingerprint {
                return Err(TraceabilityError::FingerprintMismatch { step: i });
            }
            let next = engine.rewrite(&current, step.tag, &step.path, step.step)?;
            if next.is_error() {
                return Err(TraceabilityError::PatternNoLongerMatches { step: i });
            }
            if next.fingerprint() != step.post_fingerprint {
                return Err(TraceabilityError::FingerprintMismatch { step: i });
            }
            current = next;
        }
        Ok(current)
    }

    /// Replays every step.
    pub fn replay(&self, engine: &RewriteEngine) -> Result<Ast, TraceabilityError> {
        self.replay_to(engine, self.steps.len())
    }

    /// Renders the trace step by step with the theory's print patterns.
    pub fn render(&self, engine: &RewriteEngine) -> String {
        let theory = engine.theory();
        let mut out = format!("Start: {}", theory.render(&self.initial_term.uninfer()));
        for (i, step) in self.steps.iter().enumerate() {
            let direction = match step.tag.direction {
                Direction::Forward => "forward",
                Direction::Reverse => "reverse",
            };
            out.push_str(&format!(
                "\nStep {}: {} ({}) {} at {}\n\t{}",
                i + 1,
                step.rule_name,
                step.tag,
                direction,
                step.path,
                theory.render(&step.term.uninfer())
            ));
        }
        out
    }
}

fn rewrite_step(
    engine: &RewriteEngine,
    tag: RuleTag,
    path: Path,
    step: i64,
    pre: &Ast,
    result: Ast,
) -> Result<RewriteStep, TraceabilityError> {
    let rule_name = engine
        .rule(tag)
        .map(|r| r.name.clone())
        .ok_or_else(|| TraceabilityError::MalformedWitness(format!("unknown rule tag {}", tag)))?;
    let term = engine.book().decode(&result)?;
    Ok(RewriteStep {
        tag,
        rule_name,
        path,
        step,
        pre_fingerprint: pre.fingerprint(),
        post_fingerprint: result.fingerprint(),
        result,
        term,
    })
}

fn state_ast(state: &BTreeMap<String, Value>, frame: usize) -> Result<&Ast, TraceabilityError> {
    match state.get(STATE_TERM) {
        Some(Value::Ast(ast)) => Ok(ast),
        _ => Err(missing(STATE_TERM, frame)),
    }
}

fn missing(var: &str, frame: usize) -> TraceabilityError {
    TraceabilityError::MalformedWitness(format!("frame {} has no value for '{}'", frame, var))
}

/// Error type for traceability and replay operations.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TraceabilityError {
    /// Cannot replay step: the rule no longer applies.
    PatternNoLongerMatches { step: usize },
    /// Requested version is past the end of the trace.
    VersionMismatch,
    /// A state does not have its recorded fingerprint.
    FingerprintMismatch { step: usize },
    /// The trace was recorded against a different theory.
    TheoryMismatch,
    /// A witness lacks a variable or names an unknown rule.
    MalformedWitness(String),
    /// An encoded state does not decode.
    Decode(DecodeError),
    /// Evaluating the rewrite functions failed.
    Eval(EvalError),
}

impl fmt::Display for TraceabilityError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TraceabilityError::PatternNoLongerMatches { step } => {
                write!(f, "step {}: pattern no longer matches", step)
            }
            TraceabilityError::VersionMismatch => write!(f, "version mismatch"),
            TraceabilityError::FingerprintMismatch { step } => {
                write!(f, "step {}: fingerprint mismatch", step)
            }
            TraceabilityError::TheoryMismatch => write!(f, "trace belongs to a different theory"),
            TraceabilityError::MalformedWitness(msg) => write!(f, "malformed witness: {}", msg),
            TraceabilityError::Decode(err) => write!(f, "{}", err),
            TraceabilityError::Eval(err) => write!(f, "{}", err),
        }
    }
}

impl std::error::Error for TraceabilityError {}

impl From<DecodeError> for TraceabilityError {
    fn from(err: DecodeError) -> Self {
        TraceabilityError::Decode(err)
    }
}

impl From<EvalError> for TraceabilityError {
    fn from(err: EvalError) -> Self {
        TraceabilityError::Eval(err)
    }
}
