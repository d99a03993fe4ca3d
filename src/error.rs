//! Error types for the editor map database.

use thiserror::Error;

pub type Result<T> = std::result::Result<T, EmdbError>;

/// Failure modes surfaced by container, allocator, and entity operations.
///
/// `Full`-class variants are recovered locally by the caller invoking
/// [`crate::container::Container::grow`] and retrying once; everything else
/// propagates.
#[derive(Error, Debug)]
pub enum EmdbError {
    #[error("container for fips {0} not found")]
    NotFound(u32),

    #[error("container fips {0} has no base map counterpart")]
    NoCounty(u32),

    #[error("container rm_map_date {container} does not match active base map date {base_map}")]
    VersionMismatch { container: String, base_map: String },

    #[error("data_blocks pool exhausted")]
    Full,

    #[error("section is hard-capped at max_blocks")]
    SectionFull,

    #[error("data_blocks pool exhausted while growing")]
    PoolFull,

    #[error("item {0} has no backing block allocated")]
    NotAllocated(i32),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("position does not resolve to any fips")]
    Unknown,

    #[error("section tree corruption: {0}")]
    Corruption(String),

    #[error("no container is currently active")]
    NoActiveContainer,
}
