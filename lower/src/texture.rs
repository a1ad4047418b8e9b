//! Texture rewrite for GPU block loops.
//!
//! Inside a kernel loop nest, region writes and element reads cannot go
//! through flat memory: the device stores through normalized texture
//! intrinsics instead. This pass runs before flattening, replaces kernel
//! writes with `texture_store` calls and kernel reads with `texture_load`
//! calls, and records which buffers now need a descriptor so the flattener
//! binds one at the matching declaration.
//!
//! Texture channels are normalized: stored values are divided by the
//! element type's maximum and loaded values multiplied back, with sample
//! coordinates shifted to texel centers.

use std::sync::Arc;

use ravel_dtype::{DType, ScalarClass};
use ravel_ir::{
    Bound, BufferOrigin, CallKind, Expr, ExprKind, LoopKind, Stmt, StmtKind, intrinsic, sym,
};
use smallvec::SmallVec;
use snafu::ensure;

use crate::error::{
    LoadCoordinateCountSnafu, NormalizationBoundSnafu, Result, StoreCoordinateCountSnafu,
    StoreValueCountSnafu,
};
use crate::scope::Scope;

/// One texture-rewrite run. Consumed by [`TextureRewrite::into_needs`] to
/// seed the flattener's descriptor registry.
#[derive(Debug, Default)]
pub struct TextureRewrite {
    shadows: Scope<()>,
    needs: Scope<usize>,
}

impl TextureRewrite {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn rewrite(&mut self, stmt: &Arc<Stmt>) -> Result<Arc<Stmt>> {
        self.rewrite_stmt(stmt, false)
    }

    /// The descriptor-need registry accumulated by the rewrite, keyed by
    /// region name with one entry per touched tuple element.
    pub fn into_needs(self) -> Scope<usize> {
        self.needs
    }

    fn shadowed(&self, symbol: String) -> String {
        let shadow = sym::constrained(&symbol);
        if self.shadows.contains(&shadow) { shadow } else { symbol }
    }

    fn rewrite_stmt(&mut self, stmt: &Arc<Stmt>, in_kernel: bool) -> Result<Arc<Stmt>> {
        match stmt.kind() {
            StmtKind::RegionDecl { name, bounds, types, body } => {
                let mut new_bounds: SmallVec<[Bound; 4]> = SmallVec::with_capacity(bounds.len());
                let mut changed = false;
                for bound in bounds {
                    let min = self.rewrite_expr(&bound.min, in_kernel)?;
                    let extent = self.rewrite_expr(&bound.extent, in_kernel)?;
                    changed |= !min.same_as(&bound.min) || !extent.same_as(&bound.extent);
                    new_bounds.push(Bound::new(min, extent));
                }
                let new_body = self.rewrite_stmt(body, in_kernel)?;
                Ok(if !changed && new_body.same_as(body) {
                    stmt.clone()
                } else {
                    Stmt::region_decl(name.clone(), new_bounds, types.iter().copied(), new_body)
                })
            }
            StmtKind::RegionWrite { name, coords, values } => {
                if in_kernel {
                    self.lower_kernel_write(name, coords, values)
                } else {
                    let (new_coords, coords_changed) = self.rewrite_exprs(coords, in_kernel)?;
                    let (new_values, values_changed) = self.rewrite_exprs(values, in_kernel)?;
                    Ok(if coords_changed || values_changed {
                        Stmt::region_write(name.clone(), new_coords, new_values)
                    } else {
                        stmt.clone()
                    })
                }
            }
            StmtKind::Let { name, value, body } => {
                let tracked = sym::is_constrained(name);
                if tracked {
                    self.shadows.push(name, ());
                }
                let value_result = self.rewrite_expr(value, in_kernel);
                let body_result = self.rewrite_stmt(body, in_kernel);
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
                let (new_extents, changed) = self.rewrite_exprs(extents, in_kernel)?;
                let new_body = self.rewrite_stmt(body, in_kernel)?;
                Ok(if !changed && new_body.same_as(body) {
                    stmt.clone()
                } else {
                    Stmt::alloc(name.clone(), *dtype, new_extents, new_body)
                })
            }
            StmtKind::Store { name, offset, value } => {
                let new_offset = self.rewrite_expr(offset, in_kernel)?;
                let new_value = self.rewrite_expr(value, in_kernel)?;
                Ok(if new_offset.same_as(offset) && new_value.same_as(value) {
                    stmt.clone()
                } else {
                    Stmt::store(name.clone(), new_offset, new_value)
                })
            }
            StmtKind::For { name, kind, min, extent, body } => {
                // A parallel block-index loop opens a kernel; everything
                // beneath it is device code.
                let inner =
                    in_kernel || (*kind == LoopKind::Parallel && sym::is_block_index_loop(name));
                let new_min = self.rewrite_expr(min, inner)?;
                let new_extent = self.rewrite_expr(extent, inner)?;
                let new_body = self.rewrite_stmt(body, inner)?;
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
                    let rewritten = self.rewrite_stmt(inner, in_kernel)?;
                    changed |= !rewritten.same_as(inner);
                    out.push(rewritten);
                }
                Ok(if changed { Stmt::block(out) } else { stmt.clone() })
            }
            StmtKind::Evaluate { value } => {
                let new_value = self.rewrite_expr(value, in_kernel)?;
                Ok(if new_value.same_as(value) { stmt.clone() } else { Stmt::evaluate(new_value) })
            }
        }
    }

    fn rewrite_expr(&mut self, expr: &Arc<Expr>, in_kernel: bool) -> Result<Arc<Expr>> {
        match expr.kind() {
            ExprKind::Const(_) | ExprKind::Var { .. } => Ok(expr.clone()),
            ExprKind::Cast { value } => {
                let new_value = self.rewrite_expr(value, in_kernel)?;
                Ok(if new_value.same_as(value) {
                    expr.clone()
                } else {
                    Expr::cast(expr.dtype(), new_value)
                })
            }
            ExprKind::Binary { op, lhs, rhs } => {
                let new_lhs = self.rewrite_expr(lhs, in_kernel)?;
                let new_rhs = self.rewrite_expr(rhs, in_kernel)?;
                Ok(if new_lhs.same_as(lhs) && new_rhs.same_as(rhs) {
                    expr.clone()
                } else {
                    Expr::binary(*op, new_lhs, new_rhs)
                })
            }
            ExprKind::Load { name, offset, origin } => {
                let new_offset = self.rewrite_expr(offset, in_kernel)?;
                Ok(if new_offset.same_as(offset) {
                    expr.clone()
                } else {
                    Expr::load(expr.dtype(), name.clone(), new_offset, *origin)
                })
            }
            ExprKind::Call { name, args, kind } => {
                let (new_args, changed) = self.rewrite_exprs(args, in_kernel)?;
                Ok(if changed {
                    Expr::call(expr.dtype(), name.clone(), new_args, *kind)
                } else {
                    expr.clone()
                })
            }
            ExprKind::RegionRead { name, coords, value_index, origin } => {
                if in_kernel {
                    self.lower_kernel_read(expr, name, coords, *value_index, *origin)
                } else {
                    let (new_coords, changed) = self.rewrite_exprs(coords, in_kernel)?;
                    Ok(if changed {
                        Expr::region_read(
                            expr.dtype(),
                            name.clone(),
                            new_coords,
                            *value_index,
                            *origin,
                        )
                    } else {
                        expr.clone()
                    })
                }
            }
        }
    }

    /// Kernel write: one value, three coordinates, stored through the
    /// normalizing texture intrinsic.
    fn lower_kernel_write(
        &mut self,
        name: &str,
        coords: &[Arc<Expr>],
        values: &[Arc<Expr>],
    ) -> Result<Arc<Stmt>> {
        ensure!(values.len() == 1, StoreValueCountSnafu { name, count: values.len() });
        ensure!(coords.len() == 3, StoreCoordinateCountSnafu { name, count: coords.len() });
        let value = self.rewrite_expr(&values[0], true)?;
        let bound = normalization_bound(value.dtype())?;
        self.needs.push(name, 0);

        let normalized = Expr::cast(DType::F32, value.clone()).div(&Expr::f32(bound));
        let mut args: SmallVec<[Arc<Expr>; 4]> = SmallVec::with_capacity(6);
        args.push(Expr::var(value.dtype(), name));
        // Coordinates go in untouched; element-reads inside them are the
        // flattening pass's to lower.
        args.extend(coords.iter().cloned());
        args.push(normalized);
        args.push(Expr::var(DType::HANDLE, sym::descriptor_name(name)));
        tracing::debug!(region = %name, "rewrote kernel write to texture store");
        Ok(Stmt::evaluate(Expr::call(
            DType::F32,
            intrinsic::TEXTURE_STORE,
            args,
            CallKind::Intrinsic,
        )))
    }

    /// Kernel read: three coordinates, the spatial two shifted to texel
    /// centers and normalized by the extent, the channel zero-based.
    fn lower_kernel_read(
        &mut self,
        expr: &Arc<Expr>,
        name: &str,
        coords: &[Arc<Expr>],
        value_index: usize,
        origin: BufferOrigin,
    ) -> Result<Arc<Expr>> {
        ensure!(coords.len() == 3, LoadCoordinateCountSnafu { name, count: coords.len() });
        let buffer = if origin.outputs() > 1 {
            sym::element_name(name, value_index)
        } else {
            name.to_string()
        };
        let bound = normalization_bound(expr.dtype())?;
        self.needs.push(name, value_index);

        let mut args: SmallVec<[Arc<Expr>; 4]> = SmallVec::with_capacity(5);
        args.push(Expr::var(expr.dtype(), buffer.clone()));
        for (dim, coord) in coords.iter().enumerate() {
            let min = Expr::var(DType::I32, self.shadowed(sym::min_name(&buffer, dim)));
            let zeroed = coord.sub(&min);
            args.push(if dim < 2 {
                let extent =
                    Expr::var(DType::I32, self.shadowed(sym::extent_name(&buffer, dim)));
                Expr::cast(DType::F32, zeroed)
                    .add(&Expr::f32(0.5))
                    .div(&Expr::cast(DType::F32, extent))
            } else {
                zeroed
            });
        }
        args.push(Expr::var(DType::HANDLE, sym::descriptor_name(&buffer)));
        let load = Expr::call(DType::F32, intrinsic::TEXTURE_LOAD, args, CallKind::Intrinsic);
        tracing::debug!(region = %name, element = value_index, "rewrote kernel read to texture load");
        Ok(Expr::cast(expr.dtype(), load.mul(&Expr::f32(bound))))
    }

    fn rewrite_exprs(
        &mut self,
        items: &[Arc<Expr>],
        in_kernel: bool,
    ) -> Result<(SmallVec<[Arc<Expr>; 4]>, bool)> {
        let mut out = SmallVec::with_capacity(items.len());
        let mut changed = false;
        for item in items {
            let rewritten = self.rewrite_expr(item, in_kernel)?;
            changed |= !rewritten.same_as(item);
            out.push(rewritten);
        }
        Ok((out, changed))
    }
}

/// Maximum representable value of a texture element type; the divisor/factor
/// of channel normalization.
fn normalization_bound(dtype: DType) -> Result<f64> {
    match (dtype.class(), dtype.bits()) {
        (ScalarClass::UInt, 8) => Ok(255.0),
        (ScalarClass::UInt, 16) => Ok(65535.0),
        _ => NormalizationBoundSnafu { dtype }.fail(),
    }
}
