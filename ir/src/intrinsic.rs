//! Intrinsic names this stage emits.
//!
//! The calls stay opaque here; the code generator resolves them by name.

/// Builds a buffer descriptor: (null handle, element byte size, then one
/// (min, extent, stride) triple per dimension).
pub const MAKE_BUFFER_DESCRIPTOR: &str = "make_buffer_descriptor";

/// Placeholder for a not-yet-bound buffer pointer inside a descriptor.
pub const NULL_HANDLE: &str = "null_handle";

/// Samples a texture at normalized coordinates; result is float32.
pub const TEXTURE_LOAD: &str = "texture_load";

/// Stores a normalized float32 value to a texture texel.
pub const TEXTURE_STORE: &str = "texture_store";
