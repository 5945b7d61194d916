#![forbid(unsafe_code)]

use crate::error::{ColumnarError, ColumnarResult};
use std::sync::Arc;

/// One contiguous slice of a domain.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct TileRange {
    pub offset: usize,
    pub len: usize,
}

impl TileRange {
    pub fn end(&self) -> usize {
        self.offset + self.len
    }
}

/// An ordered, countable set of elements split into tiles.
///
/// Tile sizes always sum to [`Domain::len`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Domain {
    count: usize,
    tiles: Vec<TileRange>,
}

impl Domain {
    /// A domain stored as a single tile.
    pub fn new(count: usize) -> Self {
        let tiles = if count == 0 {
            Vec::new()
        } else {
            vec![TileRange {
                offset: 0,
                len: count,
            }]
        };
        Self { count, tiles }
    }

    /// The one-element domain total aggregations write into.
    pub fn unit() -> Self {
        Self::new(1)
    }

    /// Tiles of `tile_size` elements; the last tile holds the remainder.
    pub fn tiled(count: usize, tile_size: usize) -> Self {
        if tile_size == 0 || tile_size >= count {
            return Self::new(count);
        }
        let mut tiles = Vec::with_capacity(count.div_ceil(tile_size));
        let mut offset = 0;
        while offset < count {
            let len = tile_size.min(count - offset);
            tiles.push(TileRange { offset, len });
            offset += len;
        }
        Self { count, tiles }
    }

    /// Explicit tile sizes, in order. Empty tiles are kept.
    pub fn with_tile_sizes(sizes: &[usize]) -> ColumnarResult<Self> {
        let mut tiles = Vec::with_capacity(sizes.len());
        let mut offset = 0usize;
        for &len in sizes {
            tiles.push(TileRange { offset, len });
            offset = offset
                .checked_add(len)
                .ok_or(ColumnarError::DomainOverflow)?;
        }
        Ok(Self {
            count: offset,
            tiles,
        })
    }

    pub fn len(&self) -> usize {
        self.count
    }

    pub fn is_empty(&self) -> bool {
        self.count == 0
    }

    pub fn tile_count(&self) -> usize {
        self.tiles.len()
    }

    pub fn tiles(&self) -> &[TileRange] {
        &self.tiles
    }

    pub fn tile(&self, tile: usize) -> ColumnarResult<TileRange> {
        self.tiles
            .get(tile)
            .copied()
            .ok_or(ColumnarError::TileOutOfRange {
                tile,
                tiles: self.tiles.len(),
            })
    }

    /// Tile holding element `index`.
    pub fn tile_of(&self, index: usize) -> Option<usize> {
        if index >= self.count {
            return None;
        }
        let t = self.tiles.partition_point(|r| r.end() <= index);
        Some(t)
    }

    /// Whether attributes on `a` and `b` line up tile for tile.
    pub fn unify(a: &Arc<Domain>, b: &Arc<Domain>) -> bool {
        Arc::ptr_eq(a, b) || a == b
    }
}
