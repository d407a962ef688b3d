//! Structural hashing of terms.
//!
//! Every position of a term receives a 256-bit hash of its kind, its symbol
//! and the hashes of its children. Equal subterms therefore get equal
//! hashes, which is what the encoder uses to share subterms between the two
//! sides of a rule and to derive equality constraints for patterns.
//!
//! Hashes use domain separation and length prefixing so that fingerprints
//! are identical across fresh builds and never collide across encodings by
//! construction. A SHA-256 collision between two different subterms is still
//! possible in principle; [`distinct`] compares the grouped subterms and
//! splits any class whose members differ.
//!
//! # Citations
//! - SHA-256: NIST FIPS 180-4 (2015)
//! - Domain separation & length prefixing: Bernstein et al., "How to hash into elliptic curves" (2009)
//! - Hash-consing: Filliâtre & Conchon, "Type-safe modular hash-consing" (2006)

use crate::constants::DOMAIN_EXPR_NODE_V1;
use crate::expr::{Expr, Position};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::BTreeMap;
use tracing::warn;

/// A 256-bit hash value.
#[repr(transparent)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct HashValue(pub [u8; 32]);

impl HashValue {
    /// Creates a zero hash (all zeros).
    #[inline]
    pub fn zero() -> Self {
        Self([0u8; 32])
    }

    /// Creates a hash from a raw byte array.
    #[inline]
    pub const fn from_bytes(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }

    /// Returns the raw byte array.
    #[inline]
    pub const fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    /// Computes SHA-256 of the given data with domain separation.
    ///
    /// Domain separation prefix is applied as `b"GAT:<domain>:v1" || length_prefix(data) || data`.
    /// Length prefix is a 64-bit little-endian count of bytes.
    pub fn hash_with_domain(domain: &[u8], data: &[u8]) -> Self {
        let mut hasher = Sha256::new();
        hasher.update(b"GAT:");
        hasher.update(domain);
        hasher.update(b":v1");
        hasher.update((data.len() as u64).to_le_bytes());
        hasher.update(data);
        Self(hasher.finalize().into())
    }

    /// First eight bytes as a little-endian integer.
    pub fn prefix_u64(&self) -> u64 {
        let mut bytes = [0u8; 8];
        bytes.copy_from_slice(&self.0[..8]);
        u64::from_le_bytes(bytes)
    }
}

impl std::fmt::Display for HashValue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        // First 4 bytes are enough to tell hashes apart in logs.
        write!(
            f,
            "HashValue({:02x}{:02x}{:02x}{:02x}…)",
            self.0[0], self.0[1], self.0[2], self.0[3]
        )
    }
}

/// Hash of a single subterm, given the hashes of its children.
///
/// Layout: kind tag (u8), symbol length (u64 LE), symbol bytes, child count
/// (u64 LE), child hashes in order.
fn node_hash(expr: &Expr, child_hashes: &[HashValue]) -> HashValue {
    let sym = expr.sym().as_bytes();
    let mut data = Vec::with_capacity(17 + sym.len() + 32 * child_hashes.len());
    data.push(expr.kind().tag());
    data.extend_from_slice(&(sym.len() as u64).to_le_bytes());
    data.extend_from_slice(sym);
    data.extend_from_slice(&(child_hashes.len() as u64).to_le_bytes());
    for child in child_hashes {
        data.extend_from_slice(child.as_bytes());
    }
    HashValue::hash_with_domain(DOMAIN_EXPR_NODE_V1, &data)
}

/// Hash of the whole term (the root entry of [`structural_hashes`]).
pub fn expr_hash(expr: &Expr) -> HashValue {
    let children: Vec<HashValue> = expr.args().iter().map(expr_hash).collect();
    node_hash(expr, &children)
}

/// Hash of every position of `expr`, keyed by position.
///
/// Each subterm is hashed once, bottom-up.
pub fn structural_hashes(expr: &Expr) -> BTreeMap<Position, HashValue> {
    let mut out = BTreeMap::new();
    let mut path = Vec::new();
    fill_hashes(expr, &mut path, &mut out);
    out
}

fn fill_hashes(
    expr: &Expr,
    path: &mut Position,
    out: &mut BTreeMap<Position, HashValue>,
) -> HashValue {
    let mut children = Vec::with_capacity(expr.args().len());
    for (i, arg) in expr.args().iter().enumerate() {
        path.push(i);
        children.push(fill_hashes(arg, path, out));
        path.pop();
    }
    let hash = node_hash(expr, &children);
    out.insert(path.clone(), hash);
    hash
}

/// Maps each distinct subterm hash to its first position in position order.
pub fn representatives(hashes: &BTreeMap<Position, HashValue>) -> BTreeMap<HashValue, Position> {
    let mut reps = BTreeMap::new();
    for (pos, hash) in hashes {
        reps.entry(*hash).or_insert_with(|| pos.clone());
    }
    reps
}

/// Groups the positions of `expr` into classes of syntactically identical
/// subterms.
///
/// Positions inside a class are in position order, so the first one is the
/// class representative; classes are ordered by representative.
pub fn distinct(expr: &Expr) -> Vec<Vec<Position>> {
    let hashes = structural_hashes(expr);
    let mut by_hash: BTreeMap<HashValue, Vec<Vec<Position>>> = BTreeMap::new();
    for (pos, hash) in hashes {
        let groups = by_hash.entry(hash).or_default();
        let Some(sub) = expr.subexpr(&pos) else { continue };
        match groups.iter_mut().find(|g| expr.subexpr(&g[0]) == Some(sub)) {
            Some(group) => group.push(pos),
            None => {
                if !groups.is_empty() {
                    warn!(%hash, position = ?pos, "structural hash collision, splitting class");
                }
                groups.push(vec![pos]);
            }
        }
    }
    let mut classes: Vec<Vec<Position>> = by_hash.into_values().flatten().collect();
    classes.sort();
    classes
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ob() -> Expr {
        Expr::sort("Ob", vec![]).unwrap()
    }

    fn v(name: &str) -> Expr {
        Expr::var(name, ob()).unwrap()
    }

    fn m(a: Expr, b: Expr) -> Expr {
        Expr::app("M", vec![ob(), a, b]).unwrap()
    }

    #[test]
    fn equal_subterms_share_a_hash() {
        let t = m(v("x"), m(v("y"), v("x")));
        let hashes = structural_hashes(&t);
        assert_eq!(hashes[&vec![1]], hashes[&vec![2, 2]]);
        assert_ne!(hashes[&vec![1]], hashes[&vec![2, 1]]);
        assert_eq!(hashes[&vec![]], expr_hash(&t));
        assert_eq!(hashes.len(), t.positions().len());
    }

    #[test]
    fn kind_is_part_of_the_hash() {
        let as_sort = Expr::sort("e", vec![]).unwrap();
        let as_app = Expr::app("e", vec![]).unwrap();
        assert_ne!(expr_hash(&as_sort), expr_hash(&as_app));
    }

    #[test]
    fn distinct_groups_identical_subterms() {
        let t = m(v("x"), v("x"));
        let classes = distinct(&t);
        // Ob appears at [0], [1,0], [2,0]; x:Ob at [1], [2].
        assert!(classes.contains(&vec![vec![0], vec![1, 0], vec![2, 0]]));
        assert!(classes.contains(&vec![vec![1], vec![2]]));
        assert!(classes.contains(&vec![vec![]]));
        assert_eq!(classes.len(), 3);
        assert_eq!(classes[0], vec![Vec::<usize>::new()]);
    }

    #[test]
    fn representatives_take_first_position() {
        let t = m(v("x"), v("x"));
        let hashes = structural_hashes(&t);
        let reps = representatives(&hashes);
        assert_eq!(reps[&hashes[&vec![2]]], vec![1]);
        assert_eq!(reps[&hashes[&vec![2, 0]]], vec![0]);
    }

    #[test]
    fn hashes_are_stable_across_calls() {
        let t = m(v("x"), v("y"));
        assert_eq!(expr_hash(&t), expr_hash(&t.clone()));
        assert_eq!(HashValue::hash_with_domain(b"T", b"abc"), HashValue::hash_with_domain(b"T", b"abc"));
        assert_ne!(HashValue::hash_with_domain(b"T", b"abc"), HashValue::hash_with_domain(b"U", b"abc"));
    }
}
