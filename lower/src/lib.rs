//! Lowering passes that take the region-level tree to flat memory.
//!
//! # Module Organization
//!
//! - [`flatten`] - Storage flattening (region declare/write/read →
//!   allocate/store/load at computed flat offsets)
//! - [`texture`] - Texture rewrite for GPU block loops, run before
//!   flattening on targets with [`Feature::Textures`]
//! - [`scope`] - Name-keyed scoped stacks shared by both passes
//! - [`error`] - Pass errors, split by [`Severity`] into user-facing and
//!   internal-invariant failures
//!
//! The passes never mutate their input: they hand back a new tree, sharing
//! every untouched subtree with the old one.

pub mod error;
pub mod flatten;
pub mod scope;
pub mod texture;


pub use error::{Error, Result, Severity};
pub use flatten::Flattener;
pub use scope::Scope;
pub use texture::TextureRewrite;

use std::sync::Arc;

use ravel_ir::{Feature, FunctionEnv, Stmt, Target};

/// Flatten every region in `stmt` to linear memory for `target`.
///
/// With [`Feature::Textures`] enabled, kernel-resident accesses are first
/// rewritten to texture intrinsics and the flattener starts from the
/// descriptor needs that rewrite recorded; otherwise flattening runs alone.
#[tracing::instrument(skip_all, fields(textures = target.has(Feature::Textures)))]
pub fn flatten_storage(
    stmt: &Arc<Stmt>,
    env: &FunctionEnv,
    target: &Target,
) -> Result<Arc<Stmt>> {
    if target.has(Feature::Textures) {
        let mut textures = TextureRewrite::new();
        let rewritten = textures.rewrite(stmt)?;
        Flattener::with_registry(env, textures.into_needs()).rewrite(&rewritten)
    } else {
        Flattener::new(env).rewrite(stmt)
    }
}
