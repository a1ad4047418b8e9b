//! Statement nodes and their constructors.

use std::sync::Arc;

use ravel_dtype::DType;
use smallvec::SmallVec;

use crate::expr::{Expr, next_node_id};
use crate::types::{Bound, LoopKind};

/// A statement node. Immutable, shared via [`Arc`], pointer identity.
#[derive(Debug)]
pub struct Stmt {
    id: u64,
    kind: StmtKind,
}

/// The closed set of statement variants.
#[derive(Debug)]
pub enum StmtKind {
    /// Declares a named multi-dimensional region over `body`. Tuple-valued
    /// regions carry one element type per output.
    RegionDecl {
        name: String,
        bounds: SmallVec<[Bound; 4]>,
        types: SmallVec<[DType; 1]>,
        body: Arc<Stmt>,
    },
    /// Writes one value per tuple element at a multi-dimensional coordinate.
    RegionWrite {
        name: String,
        coords: SmallVec<[Arc<Expr>; 4]>,
        values: SmallVec<[Arc<Expr>; 1]>,
    },
    /// Flat allocation of `extents` elements of `dtype` over `body`.
    Alloc {
        name: String,
        dtype: DType,
        extents: SmallVec<[Arc<Expr>; 4]>,
        body: Arc<Stmt>,
    },
    /// Store to flat linear memory at a computed offset.
    Store {
        name: String,
        offset: Arc<Expr>,
        value: Arc<Expr>,
    },
    /// Binds `name` to `value` over `body`.
    Let {
        name: String,
        value: Arc<Expr>,
        body: Arc<Stmt>,
    },
    /// Loop over `[min, min + extent)` with induction variable `name`.
    For {
        name: String,
        kind: LoopKind,
        min: Arc<Expr>,
        extent: Arc<Expr>,
        body: Arc<Stmt>,
    },
    /// Ordered statement sequence.
    Block { stmts: SmallVec<[Arc<Stmt>; 2]> },
    /// Evaluates an expression for effect (e.g. a texture-store intrinsic).
    Evaluate { value: Arc<Expr> },
}

impl Stmt {
    fn new(kind: StmtKind) -> Arc<Self> {
        Arc::new(Self { id: next_node_id(), kind })
    }

    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn kind(&self) -> &StmtKind {
        &self.kind
    }

    /// Pointer identity, as for expressions.
    pub fn same_as(self: &Arc<Self>, other: &Arc<Self>) -> bool {
        Arc::ptr_eq(self, other)
    }

    // ===== Constructors =====

    pub fn region_decl(
        name: impl Into<String>,
        bounds: impl IntoIterator<Item = Bound>,
        types: impl IntoIterator<Item = DType>,
        body: Arc<Stmt>,
    ) -> Arc<Self> {
        Self::new(StmtKind::RegionDecl {
            name: name.into(),
            bounds: bounds.into_iter().collect(),
            types: types.into_iter().collect(),
            body,
        })
    }

    pub fn region_write(
        name: impl Into<String>,
        coords: impl IntoIterator<Item = Arc<Expr>>,
        values: impl IntoIterator<Item = Arc<Expr>>,
    ) -> Arc<Self> {
        Self::new(StmtKind::RegionWrite {
            name: name.into(),
            coords: coords.into_iter().collect(),
            values: values.into_iter().collect(),
        })
    }

    pub fn alloc(
        name: impl Into<String>,
        dtype: DType,
        extents: impl IntoIterator<Item = Arc<Expr>>,
        body: Arc<Stmt>,
    ) -> Arc<Self> {
        Self::new(StmtKind::Alloc {
            name: name.into(),
            dtype,
            extents: extents.into_iter().collect(),
            body,
        })
    }

    pub fn store(name: impl Into<String>, offset: Arc<Expr>, value: Arc<Expr>) -> Arc<Self> {
        Self::new(StmtKind::Store { name: name.into(), offset, value })
    }

    pub fn let_stmt(name: impl Into<String>, value: Arc<Expr>, body: Arc<Stmt>) -> Arc<Self> {
        Self::new(StmtKind::Let { name: name.into(), value, body })
    }

    pub fn for_loop(
        name: impl Into<String>,
        kind: LoopKind,
        min: Arc<Expr>,
        extent: Arc<Expr>,
        body: Arc<Stmt>,
    ) -> Arc<Self> {
        Self::new(StmtKind::For { name: name.into(), kind, min, extent, body })
    }

    pub fn block(stmts: impl IntoIterator<Item = Arc<Stmt>>) -> Arc<Self> {
        Self::new(StmtKind::Block { stmts: stmts.into_iter().collect() })
    }

    pub fn evaluate(value: Arc<Expr>) -> Arc<Self> {
        Self::new(StmtKind::Evaluate { value })
    }
}
