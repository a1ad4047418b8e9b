//! Errors raised by the lowering passes.

use ravel_dtype::DType;
use snafu::Snafu;

pub type Result<T, E = Error> = std::result::Result<T, E>;

/// Who broke the contract: the pipeline author or an upstream stage.
///
/// User errors point at a construct in the user's pipeline; internal errors
/// mean an upstream pass handed this stage a tree violating its own
/// invariants. Both abort the pass — there is no partial rewrite.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    User,
    Internal,
}

#[derive(Debug, Snafu)]
#[snafu(visibility(pub(crate)))]
pub enum Error {
    #[snafu(display("texture store to {name}: kernel writes take exactly one value, got {count}"))]
    StoreValueCount { name: String, count: usize },

    #[snafu(display(
        "texture store to {name}: kernel writes take exactly three coordinates (x, y, channel), got {count}"
    ))]
    StoreCoordinateCount { name: String, count: usize },

    #[snafu(display(
        "texture load from {name}: kernel reads take exactly three coordinates (x, y, channel), got {count}"
    ))]
    LoadCoordinateCount { name: String, count: usize },

    #[snafu(display(
        "no texture normalization bound for {dtype}; only uint8 and uint16 elements are supported"
    ))]
    NormalizationBound { dtype: DType },

    #[snafu(display("region {name} has no function metadata"))]
    MissingMetadata { name: String },

    #[snafu(display("storage dimension {dim:?} of {name} does not name a declared argument"))]
    UnknownStorageDim { name: String, dim: String },

    #[snafu(display(
        "storage permutation of {name} covers {actual} dimensions, declaration has {expected}"
    ))]
    PermutationLength { name: String, expected: usize, actual: usize },

    #[snafu(display(
        "descriptor requested for element {index} of {name}, which declares {elements} element(s)"
    ))]
    DescriptorIndex { name: String, index: usize, elements: usize },
}

impl Error {
    pub fn severity(&self) -> Severity {
        match self {
            Error::StoreValueCount { .. }
            | Error::StoreCoordinateCount { .. }
            | Error::LoadCoordinateCount { .. } => Severity::User,
            Error::NormalizationBound { .. }
            | Error::MissingMetadata { .. }
            | Error::UnknownStorageDim { .. }
            | Error::PermutationLength { .. }
            | Error::DescriptorIndex { .. } => Severity::Internal,
        }
    }
}
