//! Driver orchestration: pass ordering, registry threading, and feature
//! gating.

use std::sync::Arc;

use ravel_dtype::DType;
use ravel_ir::{
    BufferOrigin, Expr, ExprKind, Feature, FunctionEnv, Stmt, StmtKind, Target, intrinsic,
};

use crate::error::{Error, Severity};
use crate::flatten_storage;
use crate::test::helpers::{
    assert_fully_flattened, block_index_loop, bound, collect_allocs, collect_calls,
    collect_let_names, collect_stores, each_stmt, env_with, kernel_coords,
};

/// `f(x, y, c)` over a 64x64x3 box, written inside a kernel loop.
fn kernel_pipeline() -> (FunctionEnv, Arc<Stmt>) {
    let env = env_with("f", &["x", "y", "c"]);
    let [x, y, c] = kernel_coords();
    let write = Stmt::region_write("f", [x, y, c], [Expr::var(DType::U8, "v")]);
    let decl = Stmt::region_decl(
        "f",
        [bound(0, 64), bound(0, 64), bound(0, 3)],
        [DType::U8],
        block_index_loop("f", write),
    );
    (env, decl)
}

#[test]
fn test_texture_target_threads_descriptor_needs() {
    let (env, decl) = kernel_pipeline();
    let target = Target::new().with(Feature::Textures);
    let out = flatten_storage(&decl, &env, &target).expect("lower");

    assert_fully_flattened(&out);
    assert_eq!(collect_calls(&out, intrinsic::TEXTURE_STORE).len(), 1);

    let descriptors: Vec<String> =
        collect_let_names(&out).into_iter().filter(|n| n.ends_with(".buffer")).collect();
    assert_eq!(descriptors, ["f.buffer"], "the kernel access requests exactly one descriptor");

    let mut shape_checked = false;
    each_stmt(&out, &mut |s| {
        if let StmtKind::Let { name, value, .. } = s.kind() {
            if name != "f.buffer" {
                return;
            }
            match value.kind() {
                ExprKind::Call { name, args, .. } => {
                    assert_eq!(name, intrinsic::MAKE_BUFFER_DESCRIPTOR);
                    assert_eq!(args.len(), 11, "handle + byte size + (min, extent, stride) * 3");
                }
                other => panic!("expected descriptor call, got {other:?}"),
            }
            shape_checked = true;
        }
    });
    assert!(shape_checked);
}

#[test]
fn test_plain_target_skips_texture_rewrite() {
    let (env, decl) = kernel_pipeline();
    let out = flatten_storage(&decl, &env, &Target::new()).expect("lower");

    assert_fully_flattened(&out);
    assert!(collect_calls(&out, intrinsic::TEXTURE_STORE).is_empty());
    assert_eq!(collect_stores(&out).len(), 1, "the write lowers to a flat store");
    assert!(
        !collect_let_names(&out).iter().any(|n| n.ends_with(".buffer")),
        "no descriptor without the texture backend"
    );
}

#[test]
fn test_descriptors_cover_only_touched_elements() {
    let env = env_with("g", &["x", "y", "c"]);
    let [x, y, c] = kernel_coords();
    let read = Expr::region_read(DType::U8, "g", [x, y, c], 1, BufferOrigin::Internal {
        outputs: 2,
    });
    let decl = Stmt::region_decl(
        "g",
        [bound(0, 64), bound(0, 64), bound(0, 3)],
        [DType::U8, DType::U8],
        block_index_loop("g", Stmt::evaluate(read)),
    );
    let target = Target::new().with(Feature::Textures);
    let out = flatten_storage(&decl, &env, &target).expect("lower");

    let descriptors: Vec<String> =
        collect_let_names(&out).into_iter().filter(|n| n.ends_with(".buffer")).collect();
    assert_eq!(descriptors, ["g.1.buffer"], "untouched elements get no descriptor");
    assert_eq!(collect_allocs(&out).len(), 2, "both elements are still allocated");
}

#[test]
fn test_driver_propagates_pass_errors() {
    let decl =
        Stmt::region_decl("f", [bound(0, 8)], [DType::I32], Stmt::evaluate(Expr::int(0)));
    let err = flatten_storage(&decl, &FunctionEnv::new(), &Target::new()).unwrap_err();

    assert!(matches!(&err, Error::MissingMetadata { .. }), "{err}");
    assert_eq!(err.severity(), Severity::Internal);
}
