//! Bounded finite-tree encoding of terms.
//!
//! An encoded term is an [`Ast`]: a node carrying an integer tag and a fixed
//! number of child slots, `None` for an empty slot, or the absorbing `Error`
//! value that marks a failed rewrite. Slot 0 of a variable or an elaborated
//! application holds its sort; arguments follow. With `max_arity` the
//! largest declared argument count, every node has `max_arity + 1` slots.
//!
//! Positions inside an `Ast` that a rewrite may target are enumerated by
//! [`Domains`]: the empty path plus every index sequence of length
//! `1..=depth` over `0..=max_arity`. Rules are addressed by [`RuleTag`], a
//! rule index with a direction.
//!
//! # Citations
//! - Algebraic datatypes in SMT: Barrett, Shikanian, Tinelli, "An abstract decision procedure for a theory of inductive data types" (2007)

mod codes;

pub use codes::{CodeBook, FALLBACK_BASE};

use crate::constants::DOMAIN_AST_V1;
use crate::fingerprint::HashValue;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Encoded term value.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Ast {
    /// Tagged node with exactly `width` children.
    Node { tag: i64, children: Vec<Ast> },
    /// Empty child slot.
    None,
    /// Failed computation; absorbing under node construction.
    Error,
}

impl Ast {
    /// Builds a node with `width` slots.
    ///
    /// Missing trailing slots are filled with `None`. Any `Error` child, or
    /// more children than slots, yields `Error`.
    pub fn node(tag: i64, mut children: Vec<Ast>, width: usize) -> Ast {
        if children.len() > width || children.iter().any(Ast::is_error) {
            return Ast::Error;
        }
        children.resize(width, Ast::None);
        Ast::Node { tag, children }
    }

    pub fn is_node(&self) -> bool {
        matches!(self, Ast::Node { .. })
    }

    pub fn is_none(&self) -> bool {
        matches!(self, Ast::None)
    }

    pub fn is_error(&self) -> bool {
        matches!(self, Ast::Error)
    }

    /// Tag of a node; 0 (never a symbol code) otherwise.
    pub fn tag(&self) -> i64 {
        match self {
            Ast::Node { tag, .. } => *tag,
            _ => 0,
        }
    }

    /// Child `i` of a node. Selecting into `None`, `Error` or past the last
    /// slot gives `Error`.
    pub fn child(&self, i: usize) -> &Ast {
        match self {
            Ast::Node { children, .. } => children.get(i).unwrap_or(&Ast::Error),
            _ => &Ast::Error,
        }
    }

    /// Subterm at `path`.
    pub fn get_at(&self, path: &Path) -> Ast {
        let mut current = self;
        for &i in path.indices() {
            current = current.child(i);
            if current.is_error() {
                return Ast::Error;
            }
        }
        current.clone()
    }

    /// Replaces the subterm at `path` with `value`, rebuilding each ancestor.
    pub fn replace_at(&self, path: &Path, value: Ast) -> Ast {
        self.replace_from(path.indices(), value)
    }

    fn replace_from(&self, path: &[usize], value: Ast) -> Ast {
        let Some((&first, rest)) = path.split_first() else {
            return value;
        };
        match self {
            Ast::Node { tag, children } if first < children.len() => {
                let replaced = children[first].replace_from(rest, value);
                let mut children = children.clone();
                children[first] = replaced;
                let width = children.len();
                Ast::node(*tag, children, width)
            }
            _ => Ast::Error,
        }
    }

    /// Number of nodes.
    pub fn size(&self) -> usize {
        match self {
            Ast::Node { children, .. } => 1 + children.iter().map(Ast::size).sum::<usize>(),
            _ => 0,
        }
    }

    /// Deterministic fingerprint of the value.
    pub fn fingerprint(&self) -> HashValue {
        let mut buf = Vec::new();
        self.write_canonical_bytes(&mut buf);
        HashValue::hash_with_domain(DOMAIN_AST_V1, &buf)
    }

    /// Layout: variant tag (u8); nodes add the tag (i64 LE), the child
    /// count (u64 LE) and the children.
    fn write_canonical_bytes(&self, buf: &mut Vec<u8>) {
        match self {
            Ast::Error => buf.push(0),
            Ast::None => buf.push(1),
            Ast::Node { tag, children } => {
                buf.push(2);
                buf.extend_from_slice(&tag.to_le_bytes());
                buf.extend_from_slice(&(children.len() as u64).to_le_bytes());
                for child in children {
                    child.write_canonical_bytes(buf);
                }
            }
        }
    }
}

impl fmt::Display for Ast {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Ast::Error => write!(f, "Error"),
            Ast::None => write!(f, "None"),
            Ast::Node { tag, children } => {
                write!(f, "(ast {}", tag)?;
                for child in children {
                    write!(f, " {}", child)?;
                }
                write!(f, ")")
            }
        }
    }
}

/// A rewrite position: the empty path or a sequence of slot indices.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Path(Vec<usize>);

impl Path {
    pub fn empty() -> Self {
        Self(Vec::new())
    }

    pub fn new(indices: Vec<usize>) -> Self {
        Self(indices)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn indices(&self) -> &[usize] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }
}

impl fmt::Display for Path {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.0.is_empty() {
            return write!(f, "Empty");
        }
        write!(f, "P")?;
        for (i, idx) in self.0.iter().enumerate() {
            if i > 0 && self.0.iter().any(|&j| j > 9) {
                write!(f, "_")?;
            }
            write!(f, "{}", idx)?;
        }
        Ok(())
    }
}

/// Orientation in which a rule is applied.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Direction {
    /// `t1 → t2`
    Forward,
    /// `t2 → t1`
    Reverse,
}

impl Direction {
    pub fn suffix(self) -> char {
        match self {
            Direction::Forward => 'f',
            Direction::Reverse => 'r',
        }
    }
}

/// A rule (zero-based index into the theory's rules) with a direction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct RuleTag {
    pub rule: usize,
    pub direction: Direction,
}

impl RuleTag {
    pub fn new(rule: usize, direction: Direction) -> Self {
        Self { rule, direction }
    }
}

impl fmt::Display for RuleTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "R{}{}", self.rule + 1, self.direction.suffix())
    }
}

/// All index sequences of length `n` over `0..=arity`, in lexicographic order.
pub fn paths_n(n: usize, arity: usize) -> Vec<Vec<usize>> {
    let mut out = vec![Vec::new()];
    for _ in 0..n {
        out = out
            .into_iter()
            .flat_map(|prefix| {
                (0..=arity).map(move |i| {
                    let mut next = prefix.clone();
                    next.push(i);
                    next
                })
            })
            .collect();
    }
    out
}

/// `paths_n(k, arity)` for every `k` in `1..=depth`.
pub fn all_paths(depth: usize, arity: usize) -> Vec<Vec<Vec<usize>>> {
    (1..=depth).map(|n| paths_n(n, arity)).collect()
}

/// The finite value domains of one encoding: node width, paths and rule tags.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Domains {
    arity: usize,
    depth: usize,
    rule_count: usize,
}

impl Domains {
    pub fn new(arity: usize, depth: usize, rule_count: usize) -> Self {
        Self { arity, depth, rule_count }
    }

    /// Largest argument count; selector indices range over `0..=arity`.
    pub fn arity(&self) -> usize {
        self.arity
    }

    /// Maximum length of a rewrite path.
    pub fn depth(&self) -> usize {
        self.depth
    }

    /// Child slots per node.
    pub fn width(&self) -> usize {
        self.arity + 1
    }

    pub fn rule_count(&self) -> usize {
        self.rule_count
    }

    /// Every path value: `Empty` first, then by length, then lexicographically.
    pub fn paths(&self) -> Vec<Path> {
        let mut out = vec![Path::empty()];
        for layer in all_paths(self.depth, self.arity) {
            out.extend(layer.into_iter().map(Path::new));
        }
        out
    }

    /// Every rule tag: `R1f, R1r, R2f, …`. Empty when there are no rules.
    pub fn rule_tags(&self) -> Vec<RuleTag> {
        (0..self.rule_count)
            .flat_map(|r| {
                [Direction::Forward, Direction::Reverse].map(|d| RuleTag::new(r, d))
            })
            .collect()
    }

    /// True when `path` is one of [`Domains::paths`].
    pub fn contains_path(&self, path: &Path) -> bool {
        path.len() <= self.depth && path.indices().iter().all(|&i| i <= self.arity)
    }
}
