//! Expression/statement tree for the ravel lowering stage.
//!
//! The tree still speaks in named multi-dimensional regions (declare, write,
//! read-element); the lowering passes in `ravel-lower` rewrite it into flat
//! allocate/store/load form. Everything here is immutable: nodes are built
//! once, shared via [`std::sync::Arc`], and replaced rather than mutated.

pub mod expr;
pub mod fold;
pub mod intrinsic;
pub mod meta;
pub mod printer;
pub mod stmt;
pub mod sym;
pub mod target;
pub mod types;

pub use expr::{Expr, ExprKind};
pub use fold::{fold, substitute};
pub use meta::{FuncMeta, FunctionEnv};
pub use stmt::{Stmt, StmtKind};
pub use target::{Feature, Target};
pub use types::{BinaryOp, Bound, BufferOrigin, CallKind, ConstValue, LoopKind};

// The dtype crate is part of this API surface.
pub use ravel_dtype::{DType, ScalarClass};
