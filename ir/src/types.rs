//! Payload types carried by tree nodes.

use std::sync::Arc;

use crate::expr::Expr;

/// Constant value stored in a constant node.
///
/// The node's dtype decides how the payload is interpreted; the payload
/// itself is kept at maximum width.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ConstValue {
    Int(i64),
    UInt(u64),
    Float(f64),
    Bool(bool),
}

/// Binary arithmetic operators.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, derive_more::Display)]
pub enum BinaryOp {
    #[display("+")]
    Add,
    #[display("-")]
    Sub,
    #[display("*")]
    Mul,
    #[display("/")]
    Div,
    #[display("%")]
    Mod,
    #[display("min")]
    Min,
    #[display("max")]
    Max,
}

/// How an opaque call is resolved downstream.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CallKind {
    /// Known to the code generator by name.
    Intrinsic,
    /// External symbol linked in at runtime.
    Extern,
}

/// Loop execution strategies.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, derive_more::Display)]
pub enum LoopKind {
    #[display("for")]
    Serial,
    #[display("parallel")]
    Parallel,
    #[display("vectorized")]
    Vectorized,
    #[display("unrolled")]
    Unrolled,
}

/// Where the buffer behind an element-read or flat-load lives.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BufferOrigin {
    /// Output of a function declared in this pipeline. `outputs` is the
    /// producing function's tuple width; reads of multi-output functions are
    /// addressed per element.
    Internal { outputs: usize },
    /// Externally supplied input image.
    ExternalImage,
    /// Externally supplied scalar/buffer parameter.
    ExternalParam,
}

impl BufferOrigin {
    /// Tuple width of the producing function; external buffers are single.
    pub fn outputs(&self) -> usize {
        match self {
            Self::Internal { outputs } => *outputs,
            Self::ExternalImage | Self::ExternalParam => 1,
        }
    }
}

/// Per-dimension bounds of a region declaration.
#[derive(Debug, Clone)]
pub struct Bound {
    pub min: Arc<Expr>,
    pub extent: Arc<Expr>,
}

impl Bound {
    pub fn new(min: Arc<Expr>, extent: Arc<Expr>) -> Self {
        Self { min, extent }
    }
}
