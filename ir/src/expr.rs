//! Expression nodes and their constructors.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use ravel_dtype::DType;
use smallvec::SmallVec;

use crate::types::{BinaryOp, BufferOrigin, CallKind, ConstValue};

// Monotonic node ids; relaxed suffices, only uniqueness matters.
static NEXT_NODE_ID: AtomicU64 = AtomicU64::new(0);

pub(crate) fn next_node_id() -> u64 {
    NEXT_NODE_ID.fetch_add(1, Ordering::Relaxed)
}

/// A typed expression node.
///
/// Nodes are immutable and shared via [`Arc`]; rewrites build new nodes and
/// reuse untouched subtrees. Identity ([`Expr::same_as`]) is pointer
/// identity, not structural equality.
#[derive(Debug)]
pub struct Expr {
    id: u64,
    kind: ExprKind,
    dtype: DType,
}

/// The closed set of expression variants.
#[derive(Debug)]
pub enum ExprKind {
    /// Literal constant.
    Const(ConstValue),
    /// Free variable, resolved by an enclosing binding or by the caller.
    Var { name: String },
    /// Conversion of `value` to the node's dtype.
    Cast { value: Arc<Expr> },
    /// Binary arithmetic; operands share the node's dtype.
    Binary {
        op: BinaryOp,
        lhs: Arc<Expr>,
        rhs: Arc<Expr>,
    },
    /// Read of one element of a named region at multi-dimensional
    /// coordinates. `value_index` selects the element of a tuple-valued
    /// source.
    RegionRead {
        name: String,
        coords: SmallVec<[Arc<Expr>; 4]>,
        value_index: usize,
        origin: BufferOrigin,
    },
    /// Intrinsic or extern invocation, opaque to this stage.
    Call {
        name: String,
        args: SmallVec<[Arc<Expr>; 4]>,
        kind: CallKind,
    },
    /// Load from flat linear memory at a computed offset.
    Load {
        name: String,
        offset: Arc<Expr>,
        origin: BufferOrigin,
    },
}

impl Expr {
    fn new(kind: ExprKind, dtype: DType) -> Arc<Self> {
        Arc::new(Self { id: next_node_id(), kind, dtype })
    }

    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn kind(&self) -> &ExprKind {
        &self.kind
    }

    pub fn dtype(&self) -> DType {
        self.dtype
    }

    /// Pointer identity. The relation behind identity-preserving rebuilds:
    /// a rewrite that changes nothing hands back the same allocation.
    pub fn same_as(self: &Arc<Self>, other: &Arc<Self>) -> bool {
        Arc::ptr_eq(self, other)
    }

    // ===== Constructors =====

    pub fn constant(dtype: DType, value: ConstValue) -> Arc<Self> {
        Self::new(ExprKind::Const(value), dtype)
    }

    /// 32-bit signed integer immediate, the coordinate/offset currency.
    pub fn int(value: i64) -> Arc<Self> {
        Self::constant(DType::I32, ConstValue::Int(value))
    }

    /// 32-bit float immediate.
    pub fn f32(value: f64) -> Arc<Self> {
        Self::constant(DType::F32, ConstValue::Float(value))
    }

    pub fn var(dtype: DType, name: impl Into<String>) -> Arc<Self> {
        Self::new(ExprKind::Var { name: name.into() }, dtype)
    }

    pub fn cast(dtype: DType, value: Arc<Self>) -> Arc<Self> {
        Self::new(ExprKind::Cast { value }, dtype)
    }

    /// Binary node over same-typed operands; the result keeps that dtype.
    pub fn binary(op: BinaryOp, lhs: Arc<Self>, rhs: Arc<Self>) -> Arc<Self> {
        debug_assert_eq!(
            lhs.dtype, rhs.dtype,
            "binary {op} operands must agree on dtype ({} vs {})",
            lhs.dtype, rhs.dtype
        );
        let dtype = lhs.dtype;
        Self::new(ExprKind::Binary { op, lhs, rhs }, dtype)
    }

    pub fn region_read(
        dtype: DType,
        name: impl Into<String>,
        coords: impl IntoIterator<Item = Arc<Self>>,
        value_index: usize,
        origin: BufferOrigin,
    ) -> Arc<Self> {
        Self::new(
            ExprKind::RegionRead {
                name: name.into(),
                coords: coords.into_iter().collect(),
                value_index,
                origin,
            },
            dtype,
        )
    }

    pub fn call(
        dtype: DType,
        name: impl Into<String>,
        args: impl IntoIterator<Item = Arc<Self>>,
        kind: CallKind,
    ) -> Arc<Self> {
        Self::new(
            ExprKind::Call { name: name.into(), args: args.into_iter().collect(), kind },
            dtype,
        )
    }

    pub fn load(
        dtype: DType,
        name: impl Into<String>,
        offset: Arc<Self>,
        origin: BufferOrigin,
    ) -> Arc<Self> {
        Self::new(ExprKind::Load { name: name.into(), offset, origin }, dtype)
    }

    // ===== Arithmetic helpers =====

    pub fn add(self: &Arc<Self>, rhs: &Arc<Self>) -> Arc<Self> {
        Self::binary(BinaryOp::Add, self.clone(), rhs.clone())
    }

    pub fn sub(self: &Arc<Self>, rhs: &Arc<Self>) -> Arc<Self> {
        Self::binary(BinaryOp::Sub, self.clone(), rhs.clone())
    }

    pub fn mul(self: &Arc<Self>, rhs: &Arc<Self>) -> Arc<Self> {
        Self::binary(BinaryOp::Mul, self.clone(), rhs.clone())
    }

    pub fn div(self: &Arc<Self>, rhs: &Arc<Self>) -> Arc<Self> {
        Self::binary(BinaryOp::Div, self.clone(), rhs.clone())
    }
}
