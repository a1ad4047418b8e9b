//! Text rendering of trees.
//!
//! Stable, fully parenthesized, meant for logs and test assertions; not a
//! parseable surface syntax.

use std::fmt;

use crate::expr::{Expr, ExprKind};
use crate::stmt::{Stmt, StmtKind};
use crate::types::{BinaryOp, ConstValue};

impl fmt::Display for Expr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.kind() {
            ExprKind::Const(value) => match value {
                ConstValue::Int(v) => write!(f, "{v}"),
                ConstValue::UInt(v) => write!(f, "{v}"),
                ConstValue::Float(v) => write!(f, "{v}f"),
                ConstValue::Bool(v) => write!(f, "{v}"),
            },
            ExprKind::Var { name } => write!(f, "{name}"),
            ExprKind::Cast { value } => write!(f, "{}({value})", self.dtype()),
            ExprKind::Binary { op, lhs, rhs } => match op {
                BinaryOp::Min | BinaryOp::Max => write!(f, "{op}({lhs}, {rhs})"),
                _ => write!(f, "({lhs} {op} {rhs})"),
            },
            ExprKind::RegionRead { name, coords, value_index, origin } => {
                write!(f, "{name}(")?;
                write_list(f, coords)?;
                write!(f, ")")?;
                if origin.outputs() > 1 {
                    write!(f, "[{value_index}]")?;
                }
                Ok(())
            }
            ExprKind::Call { name, args, .. } => {
                write!(f, "{name}(")?;
                write_list(f, args)?;
                write!(f, ")")
            }
            ExprKind::Load { name, offset, .. } => write!(f, "{name}[{offset}]"),
        }
    }
}

impl fmt::Display for Stmt {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write_stmt(self, f, 0)
    }
}

fn write_list<T: fmt::Display>(f: &mut fmt::Formatter<'_>, items: &[T]) -> fmt::Result {
    for (i, item) in items.iter().enumerate() {
        if i > 0 {
            write!(f, ", ")?;
        }
        write!(f, "{item}")?;
    }
    Ok(())
}

fn pad(f: &mut fmt::Formatter<'_>, depth: usize) -> fmt::Result {
    write!(f, "{:1$}", "", depth * 2)
}

fn write_stmt(stmt: &Stmt, f: &mut fmt::Formatter<'_>, depth: usize) -> fmt::Result {
    match stmt.kind() {
        StmtKind::RegionDecl { name, bounds, types, body } => {
            pad(f, depth)?;
            write!(f, "region {name}(")?;
            for (i, bound) in bounds.iter().enumerate() {
                if i > 0 {
                    write!(f, ", ")?;
                }
                write!(f, "[{}, {}]", bound.min, bound.extent)?;
            }
            write!(f, ") : ")?;
            write_list(f, types)?;
            writeln!(f, " {{")?;
            write_stmt(body, f, depth + 1)?;
            pad(f, depth)?;
            writeln!(f, "}}")
        }
        StmtKind::RegionWrite { name, coords, values } => {
            pad(f, depth)?;
            write!(f, "{name}(")?;
            write_list(f, coords)?;
            write!(f, ") = ")?;
            if values.len() == 1 {
                writeln!(f, "{}", values[0])
            } else {
                write!(f, "{{")?;
                write_list(f, values)?;
                writeln!(f, "}}")
            }
        }
        StmtKind::Alloc { name, dtype, extents, body } => {
            pad(f, depth)?;
            write!(f, "allocate {name}[{dtype}")?;
            for extent in extents {
                write!(f, " * {extent}")?;
            }
            writeln!(f, "] {{")?;
            write_stmt(body, f, depth + 1)?;
            pad(f, depth)?;
            writeln!(f, "}}")
        }
        StmtKind::Store { name, offset, value } => {
            pad(f, depth)?;
            writeln!(f, "{name}[{offset}] = {value}")
        }
        StmtKind::Let { name, value, body } => {
            pad(f, depth)?;
            writeln!(f, "let {name} = {value}")?;
            write_stmt(body, f, depth)
        }
        StmtKind::For { name, kind, min, extent, body } => {
            pad(f, depth)?;
            writeln!(f, "{kind} ({name}, {min}, {extent}) {{")?;
            write_stmt(body, f, depth + 1)?;
            pad(f, depth)?;
            writeln!(f, "}}")
        }
        StmtKind::Block { stmts } => {
            for inner in stmts {
                write_stmt(inner, f, depth)?;
            }
            Ok(())
        }
        StmtKind::Evaluate { value } => {
            pad(f, depth)?;
            writeln!(f, "{value}")
        }
    }
}
