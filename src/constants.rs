//! Centralized domain separation tags.
//!
//! Every hash domain used by the crate is defined here so that no two
//! encodings share a domain by accident.

/// Structural hash of one subterm of an [`Expr`](crate::expr::Expr).
pub const DOMAIN_EXPR_NODE_V1: &[u8] = b"EXPR_NODE_V1";

/// Fingerprint of an encoded [`Ast`](crate::encoding::Ast) value.
pub const DOMAIN_AST_V1: &[u8] = b"AST_V1";

/// Fallback code for symbols outside the theory's code table.
pub const DOMAIN_FALLBACK_CODE_V1: &[u8] = b"FALLBACK_CODE_V1";

/// Fingerprint of an elaborated theory.
pub const DOMAIN_THEORY_V1: &[u8] = b"THEORY_V1";

/// Version of the serialized [`Witness`](crate::backend::Witness) layout.
pub const WITNESS_FORMAT_VERSION: u32 = 1;
