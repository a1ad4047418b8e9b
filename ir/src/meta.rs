//! Function metadata consumed by the lowering passes.

use std::collections::HashMap;

/// Dimension declarations for one pipeline function.
#[derive(Debug, Clone)]
pub struct FuncMeta {
    /// Declared argument names: logical dimension order, the order
    /// coordinates are written in.
    args: Vec<String>,
    /// Declared storage-dimension names: physical layout order, innermost
    /// first. A permutation of `args`.
    storage_dims: Vec<String>,
}

impl FuncMeta {
    /// Metadata with explicit storage order.
    pub fn with_storage_order(
        args: impl IntoIterator<Item = impl Into<String>>,
        storage_dims: impl IntoIterator<Item = impl Into<String>>,
    ) -> Self {
        Self {
            args: args.into_iter().map(Into::into).collect(),
            storage_dims: storage_dims.into_iter().map(Into::into).collect(),
        }
    }

    /// Metadata with the default storage order: physical layout follows the
    /// argument order, first argument innermost.
    pub fn new(args: impl IntoIterator<Item = impl Into<String>>) -> Self {
        let args: Vec<String> = args.into_iter().map(Into::into).collect();
        Self { storage_dims: args.clone(), args }
    }

    pub fn args(&self) -> &[String] {
        &self.args
    }

    pub fn storage_dims(&self) -> &[String] {
        &self.storage_dims
    }
}

/// Region-name-keyed metadata map.
///
/// Membership doubles as the internal/external distinction: names absent from
/// the environment are externally supplied buffers.
#[derive(Debug, Clone, Default)]
pub struct FunctionEnv {
    funcs: HashMap<String, FuncMeta>,
}

impl FunctionEnv {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, name: impl Into<String>, meta: FuncMeta) -> &mut Self {
        self.funcs.insert(name.into(), meta);
        self
    }

    pub fn meta(&self, name: &str) -> Option<&FuncMeta> {
        self.funcs.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.funcs.contains_key(name)
    }
}
