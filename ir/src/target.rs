//! Compilation target description.

use enumset::{EnumSet, EnumSetType};

/// Backend capabilities a target may request.
#[derive(Debug, Hash, EnumSetType)]
pub enum Feature {
    /// Lower kernel-loop region accesses to texture intrinsics.
    Textures,
}

/// The slice of the target description this stage consults.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Target {
    features: EnumSet<Feature>,
}

impl Target {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, feature: Feature) -> Self {
        self.features.insert(feature);
        self
    }

    pub fn has(&self, feature: Feature) -> bool {
        self.features.contains(feature)
    }
}
