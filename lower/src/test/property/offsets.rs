//! Randomized checks of the addressing algorithm against a direct row-major
//! reference.

use std::collections::HashMap;

use proptest::prelude::*;
use ravel_dtype::DType;
use ravel_ir::{BufferOrigin, Expr, FuncMeta, FunctionEnv, Stmt, fold, substitute};

use crate::flatten::Flattener;
use crate::test::helpers::{as_int, bound, collect_loads, load_offset, resolve_lets};

/// Per-dimension (coordinate, min, extent) with the coordinate in bounds.
fn dims() -> impl Strategy<Value = Vec<(i64, i64, i64)>> {
    prop::collection::vec(
        (-16i64..16, 1i64..32, 0i64..32)
            .prop_map(|(min, extent, off)| (min + off % extent, min, extent)),
        1..=3,
    )
}

fn row_major_reference(dims: &[(i64, i64, i64)]) -> i64 {
    let mut stride = 1i64;
    let mut expected = 0i64;
    for (coord, min, extent) in dims {
        expected += (coord - min) * stride;
        stride *= extent;
    }
    expected
}

proptest! {
    /// Cancelling-strategy offsets, once the synthesized bindings resolve,
    /// equal the plain row-major formula.
    #[test]
    fn internal_offsets_match_row_major_reference(dims in dims()) {
        let args: Vec<String> = (0..dims.len()).map(|i| format!("d{i}")).collect();
        let mut env = FunctionEnv::new();
        env.insert("f", FuncMeta::new(args));

        let coords = dims.iter().map(|(coord, _, _)| Expr::int(*coord));
        let bounds = dims.iter().map(|&(_, min, extent)| bound(min, extent));
        let read =
            Expr::region_read(DType::I32, "f", coords, 0, BufferOrigin::Internal { outputs: 1 });
        let decl = Stmt::region_decl("f", bounds, [DType::I32], Stmt::evaluate(read));
        let out = Flattener::new(&env).rewrite(&decl).expect("flatten");

        let (bindings, _) = resolve_lets(&out);
        let offset = fold(&substitute(&load_offset(&collect_loads(&out)[0]), &bindings));
        prop_assert_eq!(as_int(&offset), Some(row_major_reference(&dims)));
    }

    /// The hoistable shape for external buffers is algebraically the same
    /// offset once mins and strides take concrete values.
    #[test]
    fn external_offsets_agree_with_reference(dims in dims()) {
        let env = FunctionEnv::new();
        let coords = dims.iter().map(|(coord, _, _)| Expr::int(*coord));
        let read =
            Expr::region_read(DType::U8, "p", coords, 0, BufferOrigin::ExternalImage);
        let out = Flattener::new(&env).rewrite(&Stmt::evaluate(read)).expect("flatten");

        let mut bindings = HashMap::new();
        let mut stride = 1i64;
        for (i, (_, min, extent)) in dims.iter().enumerate() {
            bindings.insert(format!("p.min.{i}"), Expr::int(*min));
            bindings.insert(format!("p.stride.{i}"), Expr::int(stride));
            stride *= extent;
        }
        let offset = fold(&substitute(&load_offset(&collect_loads(&out)[0]), &bindings));
        prop_assert_eq!(as_int(&offset), Some(row_major_reference(&dims)));
    }
}
