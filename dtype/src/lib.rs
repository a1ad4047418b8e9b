//! Scalar element types for the ravel IR.
//!
//! A type is a [`ScalarClass`] plus a bit width. Widths are not required to
//! be byte multiples: packed formats (say `uint7`) are legal in region
//! declarations, and the lowering stage promotes them to the next whole byte
//! before any flat memory operation is emitted.

use std::fmt;

/// Classification of a scalar element type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[derive(strum::EnumCount, strum::EnumIter)]
pub enum ScalarClass {
    /// Signed two's-complement integer.
    Int,
    /// Unsigned integer.
    UInt,
    /// IEEE floating point.
    Float,
    /// Opaque pointer-sized value: buffer handles, descriptors.
    Handle,
}

/// A scalar element type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct DType {
    class: ScalarClass,
    bits: u16,
}

impl DType {
    pub const I32: DType = DType::int(32);
    pub const U8: DType = DType::uint(8);
    pub const U16: DType = DType::uint(16);
    pub const F32: DType = DType::float(32);
    pub const HANDLE: DType = DType::new(ScalarClass::Handle, 64);

    pub const fn new(class: ScalarClass, bits: u16) -> Self {
        Self { class, bits }
    }

    pub const fn int(bits: u16) -> Self {
        Self::new(ScalarClass::Int, bits)
    }

    pub const fn uint(bits: u16) -> Self {
        Self::new(ScalarClass::UInt, bits)
    }

    pub const fn float(bits: u16) -> Self {
        Self::new(ScalarClass::Float, bits)
    }

    pub const fn class(&self) -> ScalarClass {
        self.class
    }

    pub const fn bits(&self) -> u16 {
        self.bits
    }

    /// Storage size in whole bytes, rounding partial bytes up.
    pub const fn bytes(&self) -> usize {
        (self.bits as usize).div_ceil(8)
    }

    /// The same class widened to the next byte-multiple width.
    ///
    /// Identity on types that are already byte multiples, so applying it
    /// twice is the same as applying it once.
    pub const fn promoted(&self) -> Self {
        Self::new(self.class, (self.bytes() * 8) as u16)
    }

    pub const fn is_int(&self) -> bool {
        matches!(self.class, ScalarClass::Int)
    }

    pub const fn is_uint(&self) -> bool {
        matches!(self.class, ScalarClass::UInt)
    }

    pub const fn is_float(&self) -> bool {
        matches!(self.class, ScalarClass::Float)
    }

    pub const fn is_handle(&self) -> bool {
        matches!(self.class, ScalarClass::Handle)
    }
}

impl fmt::Display for DType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.class {
            ScalarClass::Int => write!(f, "int{}", self.bits),
            ScalarClass::UInt => write!(f, "uint{}", self.bits),
            ScalarClass::Float => write!(f, "float{}", self.bits),
            ScalarClass::Handle => write!(f, "handle"),
        }
    }
}
