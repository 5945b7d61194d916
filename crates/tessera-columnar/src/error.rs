#![forbid(unsafe_code)]

pub type ColumnarResult<T> = Result<T, ColumnarError>;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ColumnarError {
    #[error("attribute length mismatch: domain has {expected} elements, got {actual} values")]
    LengthMismatch { expected: usize, actual: usize },

    #[error("tile {tile} length mismatch: expected {expected} values, got {actual}")]
    TileLengthMismatch {
        tile: usize,
        expected: usize,
        actual: usize,
    },

    #[error("tile {tile} was never written")]
    TileNotWritten { tile: usize },

    #[error("tile {tile} out of range for a domain with {tiles} tiles")]
    TileOutOfRange { tile: usize, tiles: usize },

    #[error("domain element count overflows the addressable range")]
    DomainOverflow,
}
