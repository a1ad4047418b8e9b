//! The synthesized-symbol naming contract.
//!
//! Downstream passes resolve storage geometry through variables with these
//! names; upstream passes promise not to collide with them. Both lowering
//! passes and the tests build every such name through this module.

/// Reserved suffix marking a shadow binding that overrides the unsuffixed
/// symbol during addressing while in scope.
pub const CONSTRAINED_SUFFIX: &str = ".constrained";

/// Induction-variable suffixes marking a parallel loop as a GPU block-index
/// loop, one per spatial tiling dimension.
pub const BLOCK_INDEX_SUFFIXES: [&str; 2] = [".blockidx", ".blockidy"];

/// `<buffer>.min.<dim>` — low bound of one dimension.
pub fn min_name(buffer: &str, dim: usize) -> String {
    format!("{buffer}.min.{dim}")
}

/// `<buffer>.extent.<dim>` — size of one dimension.
pub fn extent_name(buffer: &str, dim: usize) -> String {
    format!("{buffer}.extent.{dim}")
}

/// `<buffer>.stride.<dim>` — element stride of one dimension.
pub fn stride_name(buffer: &str, dim: usize) -> String {
    format!("{buffer}.stride.{dim}")
}

/// `<buffer>.buffer` — the opaque descriptor handle.
pub fn descriptor_name(buffer: &str) -> String {
    format!("{buffer}.buffer")
}

/// `<buffer>.<index>` — per-element buffer name of a tuple-valued region.
pub fn element_name(buffer: &str, index: usize) -> String {
    format!("{buffer}.{index}")
}

/// `<element>.value` — staged value binding of a tuple write.
pub fn staged_value_name(element: &str) -> String {
    format!("{element}.value")
}

/// The constrained shadow of `symbol`.
pub fn constrained(symbol: &str) -> String {
    format!("{symbol}{CONSTRAINED_SUFFIX}")
}

pub fn is_constrained(name: &str) -> bool {
    name.ends_with(CONSTRAINED_SUFFIX)
}

pub fn is_block_index_loop(name: &str) -> bool {
    BLOCK_INDEX_SUFFIXES.iter().any(|suffix| name.ends_with(suffix))
}
