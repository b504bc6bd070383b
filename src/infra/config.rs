//! Parser configuration.
//!
//! Everything here has a safe default; callers that just want to parse a
//! blob never need to touch it.

use serde::{Deserialize, Serialize};

/// Default bound on nested-signature recursion.
pub const DEFAULT_MAX_NESTED_DEPTH: usize = 8;

/// Knobs for a single parse run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ParserConfig {
    /// Maximum depth of nested Authenticode signatures and PKCS#9
    /// counter-signature chains. Branches beyond the cap are dropped with a
    /// warning.
    pub max_nested_depth: usize,

    /// Optional ceiling on the input size in bytes. Exceeding it is the one
    /// hard failure the parser reports.
    pub max_input_len: Option<usize>,
}

impl Default for ParserConfig {
    fn default() -> Self {
        Self {
            max_nested_depth: DEFAULT_MAX_NESTED_DEPTH,
            max_input_len: None,
        }
    }
}
