//! Storage flattening: named multi-dimensional regions become flat memory.
//!
//! Region declarations turn into allocations wrapped in synthesized
//! min/extent/stride bindings; writes and reads turn into stores and loads at
//! computed flat offsets. Two offset shapes are produced on purpose: accesses
//! to internally declared regions emit `(coord - min) * stride` terms that
//! later simplification cancels against loop induction variables, while
//! accesses to external buffers emit a linear term minus a loop-invariant
//! base that later passes hoist.

use std::sync::Arc;

use itertools::izip;
use ravel_dtype::DType;
use ravel_ir::{
    Bound, BufferOrigin, CallKind, Expr, ExprKind, FunctionEnv, Stmt, StmtKind, intrinsic, sym,
};
use smallvec::SmallVec;
use snafu::{OptionExt, ensure};

use crate::error::{
    DescriptorIndexSnafu, MissingMetadataSnafu, PermutationLengthSnafu, Result,
    UnknownStorageDimSnafu,
};
use crate::scope::Scope;

/// One flattening run: metadata environment, constrained-shadow tracker, and
/// the descriptor-need registry (seeded by the texture rewrite when the
/// target uses it).
pub struct Flattener<'env> {
    env: &'env FunctionEnv,
    shadows: Scope<()>,
    descriptor_needs: Scope<usize>,
}

impl<'env> Flattener<'env> {
    pub fn new(env: &'env FunctionEnv) -> Self {
        Self::with_registry(env, Scope::new())
    }

    /// A flattener whose registry starts with entries recorded by an earlier
    /// pass.
    pub fn with_registry(env: &'env FunctionEnv, registry: Scope<usize>) -> Self {
        Self { env, shadows: Scope::new(), descriptor_needs: registry }
    }

    pub fn rewrite(&mut self, stmt: &Arc<Stmt>) -> Result<Arc<Stmt>> {
        self.rewrite_stmt(stmt)
    }

    // ===== Addressing =====

    /// Resolve `symbol`, preferring its constrained shadow while one is in
    /// scope.
    fn shadowed(&self, symbol: String) -> String {
        let shadow = sym::constrained(&symbol);
        if self.shadows.contains(&shadow) { shadow } else { symbol }
    }

    /// Flat offset of `coords` into `buffer`.
    fn flat_offset(&self, buffer: &str, coords: &[Arc<Expr>]) -> Arc<Expr> {
        let mut mins = Vec::with_capacity(coords.len());
        let mut strides = Vec::with_capacity(coords.len());
        for dim in 0..coords.len() {
            mins.push(Expr::var(DType::I32, self.shadowed(sym::min_name(buffer, dim))));
            strides.push(Expr::var(DType::I32, self.shadowed(sym::stride_name(buffer, dim))));
        }
        if self.env.contains(buffer) {
            // Cancelling shape for internal regions.
            sum(izip!(coords, &mins, &strides).map(|(coord, min, stride)| coord.sub(min).mul(stride)))
                .unwrap_or_else(|| Expr::int(0))
        } else {
            // Hoistable shape for external buffers: linear term minus a
            // loop-invariant base.
            let linear = sum(coords.iter().zip(&strides).map(|(coord, stride)| coord.mul(stride)));
            let base = sum(mins.iter().zip(&strides).map(|(min, stride)| min.mul(stride)));
            match (linear, base) {
                (Some(linear), Some(base)) => linear.sub(&base),
                _ => Expr::int(0),
            }
        }
    }

    // ===== Statements =====

    fn rewrite_stmt(&mut self, stmt: &Arc<Stmt>) -> Result<Arc<Stmt>> {
        match stmt.kind() {
            StmtKind::RegionDecl { name, bounds, types, body } => {
                self.lower_region_decl(name, bounds, types, body)
            }
            StmtKind::RegionWrite { name, coords, values } => {
                self.lower_region_write(name, coords, values)
            }
            StmtKind::Let { name, value, body } => {
                let tracked = sym::is_constrained(name);
                if tracked {
                    self.shadows.push(name, ());
                }
                let value_result = self.rewrite_expr(value);
                let body_result = self.rewrite_stmt(body);
                if tracked {
                    // Pop before propagating so shadows unwind on error paths.
                    self.shadows.pop(name);
                }
                let (new_value, new_body) = (value_result?, body_result?);
                Ok(if new_value.same_as(value) && new_body.same_as(body) {
                    stmt.clone()
                } else {
                    Stmt::let_stmt(name.clone(), new_value, new_body)
                })
            }
            StmtKind::Alloc { name, dtype, extents, body } => {
                let (new_extents, changed) = self.rewrite_exprs(extents)?;
                let new_body = self.rewrite_stmt(body)?;
                Ok(if !changed && new_body.same_as(body) {
                    stmt.clone()
                } else {
                    Stmt::alloc(name.clone(), *dtype, new_extents, new_body)
                })
            }
            StmtKind::Store { name, offset, value } => {
                let new_offset = self.rewrite_expr(offset)?;
                let new_value = self.rewrite_expr(value)?;
                Ok(if new_offset.same_as(offset) && new_value.same_as(value) {
                    stmt.clone()
                } else {
                    Stmt::store(name.clone(), new_offset, new_value)
                })
            }
            StmtKind::For { name, kind, min, extent, body } => {
                let new_min = self.rewrite_expr(min)?;
                let new_extent = self.rewrite_expr(extent)?;
                let new_body = self.rewrite_stmt(body)?;
                Ok(
                    if new_min.same_as(min)
                        && new_extent.same_as(extent)
                        && new_body.same_as(body)
                    {
                        stmt.clone()
                    } else {
                        Stmt::for_loop(name.clone(), *kind, new_min, new_extent, new_body)
                    },
                )
            }
            StmtKind::Block { stmts } => {
                let mut out: SmallVec<[Arc<Stmt>; 2]> = SmallVec::with_capacity(stmts.len());
                let mut changed = false;
                for inner in stmts {
                    let rewritten = self.rewrite_stmt(inner)?;
                    changed |= !rewritten.same_as(inner);
                    out.push(rewritten);
                }
                Ok(if changed { Stmt::block(out) } else { stmt.clone() })
            }
            StmtKind::Evaluate { value } => {
                let new_value = self.rewrite_expr(value)?;
                Ok(if new_value.same_as(value) { stmt.clone() } else { Stmt::evaluate(new_value) })
            }
        }
    }

    /// Region declaration: allocate each tuple element and bind its storage
    /// geometry around the already-lowered body.
    fn lower_region_decl(
        &mut self,
        name: &str,
        bounds: &[Bound],
        types: &[DType],
        body: &Arc<Stmt>,
    ) -> Result<Arc<Stmt>> {
        // Inside-out: the body is lowered first, so nested declarations have
        // already drained their own registry entries.
        let body = self.rewrite_stmt(body)?;

        let mut wants_descriptor = vec![false; types.len()];
        while let Some(index) = self.descriptor_needs.pop(name) {
            ensure!(
                index < types.len(),
                DescriptorIndexSnafu { name, index, elements: types.len() }
            );
            wants_descriptor[index] = true;
        }

        let meta = self.env.meta(name).context(MissingMetadataSnafu { name })?;
        // Storage permutation: the logical dimension at each physical
        // position, innermost first.
        let mut permutation = Vec::with_capacity(meta.storage_dims().len());
        for dim in meta.storage_dims() {
            let logical = meta
                .args()
                .iter()
                .position(|arg| arg == dim)
                .context(UnknownStorageDimSnafu { name, dim: dim.as_str() })?;
            permutation.push(logical);
        }
        ensure!(
            permutation.len() == bounds.len(),
            PermutationLengthSnafu { name, expected: bounds.len(), actual: permutation.len() }
        );

        let dims = bounds.len();
        // Allocation extents are rewritten once and shared by all tuple
        // elements; the min/extent bindings below take the declared bounds
        // as written.
        let mut extents: SmallVec<[Arc<Expr>; 4]> = SmallVec::with_capacity(dims);
        for bound in bounds {
            extents.push(self.rewrite_expr(&bound.extent)?);
        }

        let mut result = body;
        for (index, elem_type) in types.iter().enumerate() {
            let buffer =
                if types.len() > 1 { sym::element_name(name, index) } else { name.to_string() };
            let min_vars: Vec<Arc<Expr>> =
                (0..dims).map(|d| Expr::var(DType::I32, sym::min_name(&buffer, d))).collect();
            let extent_vars: Vec<Arc<Expr>> =
                (0..dims).map(|d| Expr::var(DType::I32, sym::extent_name(&buffer, d))).collect();
            let stride_vars: Vec<Arc<Expr>> =
                (0..dims).map(|d| Expr::var(DType::I32, sym::stride_name(&buffer, d))).collect();

            result = Stmt::alloc(buffer.clone(), elem_type.promoted(), extents.clone(), result);

            if wants_descriptor[index] {
                let mut args: SmallVec<[Arc<Expr>; 4]> = SmallVec::with_capacity(2 + dims * 3);
                args.push(Expr::call(
                    DType::HANDLE,
                    intrinsic::NULL_HANDLE,
                    std::iter::empty::<Arc<Expr>>(),
                    CallKind::Intrinsic,
                ));
                args.push(Expr::int(elem_type.bytes() as i64));
                for d in 0..dims {
                    args.push(min_vars[d].clone());
                    args.push(extent_vars[d].clone());
                    args.push(stride_vars[d].clone());
                }
                let descriptor = Expr::call(
                    DType::HANDLE,
                    intrinsic::MAKE_BUFFER_DESCRIPTOR,
                    args,
                    CallKind::Intrinsic,
                );
                result = Stmt::let_stmt(sym::descriptor_name(&buffer), descriptor, result);
            }

            // Strides bind in storage order: physical position 0 is the
            // innermost dimension and gets stride 1; each later position is
            // the previous position's stride times its extent.
            for position in (1..dims).rev() {
                let prev = permutation[position - 1];
                let logical = permutation[position];
                let stride = stride_vars[prev].mul(&extent_vars[prev]);
                result = Stmt::let_stmt(sym::stride_name(&buffer, logical), stride, result);
            }
            if dims > 0 {
                result =
                    Stmt::let_stmt(sym::stride_name(&buffer, permutation[0]), Expr::int(1), result);
            }

            for d in (0..dims).rev() {
                result = Stmt::let_stmt(sym::min_name(&buffer, d), bounds[d].min.clone(), result);
                result =
                    Stmt::let_stmt(sym::extent_name(&buffer, d), bounds[d].extent.clone(), result);
            }
        }
        tracing::debug!(region = %name, elements = types.len(), dims, "lowered region declaration");
        Ok(result)
    }

    /// Region write: promote values, then store flat. Tuple writes stage
    /// every value in a binding before any store runs, so evaluation order
    /// is declaration order and each value is evaluated exactly once.
    fn lower_region_write(
        &mut self,
        name: &str,
        coords: &[Arc<Expr>],
        values: &[Arc<Expr>],
    ) -> Result<Arc<Stmt>> {
        let mut promoted: SmallVec<[Arc<Expr>; 1]> = SmallVec::with_capacity(values.len());
        for value in values {
            let value = self.rewrite_expr(value)?;
            let wide = value.dtype().promoted();
            promoted.push(if wide.bits() != value.dtype().bits() {
                Expr::cast(wide, value)
            } else {
                value
            });
        }

        match promoted.as_slice() {
            [value] => {
                let raw = self.flat_offset(name, coords);
                let offset = self.rewrite_expr(&raw)?;
                Ok(Stmt::store(name.to_string(), offset, value.clone()))
            }
            _ => {
                let mut stores: SmallVec<[Arc<Stmt>; 2]> = SmallVec::with_capacity(promoted.len());
                let mut bindings = Vec::with_capacity(promoted.len());
                for (index, value) in promoted.iter().enumerate() {
                    let element = sym::element_name(name, index);
                    let raw = self.flat_offset(&element, coords);
                    let offset = self.rewrite_expr(&raw)?;
                    let staged = sym::staged_value_name(&element);
                    stores.push(Stmt::store(
                        element,
                        offset,
                        Expr::var(value.dtype(), staged.clone()),
                    ));
                    bindings.push((staged, value.clone()));
                }
                tracing::trace!(region = %name, elements = promoted.len(), "staged tuple write");
                let mut result = Stmt::block(stores);
                for (staged, value) in bindings.into_iter().rev() {
                    result = Stmt::let_stmt(staged, value, result);
                }
                Ok(result)
            }
        }
    }

    // ===== Expressions =====

    fn rewrite_expr(&mut self, expr: &Arc<Expr>) -> Result<Arc<Expr>> {
        match expr.kind() {
            ExprKind::Const(_) | ExprKind::Var { .. } => Ok(expr.clone()),
            ExprKind::Cast { value } => {
                let new_value = self.rewrite_expr(value)?;
                Ok(if new_value.same_as(value) {
                    expr.clone()
                } else {
                    Expr::cast(expr.dtype(), new_value)
                })
            }
            ExprKind::Binary { op, lhs, rhs } => {
                let new_lhs = self.rewrite_expr(lhs)?;
                let new_rhs = self.rewrite_expr(rhs)?;
                Ok(if new_lhs.same_as(lhs) && new_rhs.same_as(rhs) {
                    expr.clone()
                } else {
                    Expr::binary(*op, new_lhs, new_rhs)
                })
            }
            ExprKind::Load { name, offset, origin } => {
                let new_offset = self.rewrite_expr(offset)?;
                Ok(if new_offset.same_as(offset) {
                    expr.clone()
                } else {
                    Expr::load(expr.dtype(), name.clone(), new_offset, *origin)
                })
            }
            ExprKind::Call { name, args, kind } => {
                // Opaque calls pass through; reusing the node when nothing
                // changed keeps subtree sharing intact.
                let (new_args, changed) = self.rewrite_exprs(args)?;
                Ok(if changed {
                    Expr::call(expr.dtype(), name.clone(), new_args, *kind)
                } else {
                    expr.clone()
                })
            }
            ExprKind::RegionRead { name, coords, value_index, origin } => {
                self.lower_region_read(expr, name, coords, *value_index, *origin)
            }
        }
    }

    /// Element read: promote the type, load flat, cast back if narrowed.
    fn lower_region_read(
        &mut self,
        expr: &Arc<Expr>,
        name: &str,
        coords: &[Arc<Expr>],
        value_index: usize,
        origin: BufferOrigin,
    ) -> Result<Arc<Expr>> {
        let buffer = if origin.outputs() > 1 {
            sym::element_name(name, value_index)
        } else {
            name.to_string()
        };
        let wide = expr.dtype().promoted();
        let raw = self.flat_offset(&buffer, coords);
        let offset = self.rewrite_expr(&raw)?;
        let load = Expr::load(wide, buffer, offset, origin);
        Ok(if wide.bits() != expr.dtype().bits() { Expr::cast(expr.dtype(), load) } else { load })
    }

    fn rewrite_exprs(
        &mut self,
        items: &[Arc<Expr>],
    ) -> Result<(SmallVec<[Arc<Expr>; 4]>, bool)> {
        let mut out = SmallVec::with_capacity(items.len());
        let mut changed = false;
        for item in items {
            let rewritten = self.rewrite_expr(item)?;
            changed |= !rewritten.same_as(item);
            out.push(rewritten);
        }
        Ok((out, changed))
    }
}

fn sum(terms: impl Iterator<Item = Arc<Expr>>) -> Option<Arc<Expr>> {
    terms.reduce(|acc, term| acc.add(&term))
}
