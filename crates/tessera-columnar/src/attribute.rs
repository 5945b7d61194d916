#![forbid(unsafe_code)]

use crate::bitpacking::PackedBits;
use crate::cache::{AttributeId, TileCache};
use crate::domain::{Domain, TileRange};
use crate::element::{Element, ValueRange};
use crate::error::{ColumnarError, ColumnarResult};
use crate::stats::AttributeStats;
use std::ops::Deref;
use std::sync::{Arc, OnceLock};

/// The set an attribute's values are drawn from.
#[derive(Clone, Debug, PartialEq)]
pub enum ValuesUnit {
    Unbounded,
    Range(ValueRange),
    /// Values are positions in another domain (relations, partitions).
    Domain(Arc<Domain>),
}

impl ValuesUnit {
    pub fn range(&self) -> Option<ValueRange> {
        match self {
            ValuesUnit::Unbounded => None,
            ValuesUnit::Range(r) => Some(*r),
            ValuesUnit::Domain(d) => Some(ValueRange::zero_based(d.len())),
        }
    }

    pub fn as_domain(&self) -> Option<&Arc<Domain>> {
        match self {
            ValuesUnit::Domain(d) => Some(d),
            _ => None,
        }
    }
}

/// Storage of one tile.
#[derive(Clone, Debug)]
pub enum StoredTile<T> {
    Plain(Arc<Vec<T>>),
    Packed(PackedBits),
}

impl<T> StoredTile<T> {
    fn len(&self) -> usize {
        match self {
            StoredTile::Plain(v) => v.len(),
            StoredTile::Packed(p) => p.len(),
        }
    }
}

/// A shared read handle on one tile. The tile stays alive while any handle
/// to it exists.
#[derive(Clone, Debug)]
pub struct TileRead<T> {
    data: Arc<Vec<T>>,
    range: TileRange,
}

impl<T> TileRead<T> {
    pub fn range(&self) -> TileRange {
        self.range
    }

    pub fn offset(&self) -> usize {
        self.range.offset
    }
}

impl<T> Deref for TileRead<T> {
    type Target = [T];

    fn deref(&self) -> &[T] {
        &self.data
    }
}

/// A typed array aligned 1:1 with a domain, stored per tile.
///
/// Attributes are immutable; they are produced by an [`AttributeWriter`].
pub struct Attribute<T: Element> {
    id: AttributeId,
    domain: Arc<Domain>,
    values: ValuesUnit,
    may_have_undefined: bool,
    tiles: Vec<StoredTile<T>>,
    cache: Arc<TileCache>,
    stats: OnceLock<AttributeStats>,
}

impl<T: Element> std::fmt::Debug for Attribute<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Attribute")
            .field("id", &self.id)
            .field("kind", &T::KIND)
            .field("len", &self.domain.len())
            .field("tiles", &self.tiles.len())
            .field("values", &self.values)
            .field("may_have_undefined", &self.may_have_undefined)
            .finish()
    }
}

impl<T: Element> Attribute<T> {
    /// Builds an attribute on `domain` from values in domain order.
    pub fn from_values(
        cache: &Arc<TileCache>,
        domain: Arc<Domain>,
        values: Vec<T>,
    ) -> ColumnarResult<Self> {
        let mut writer = AttributeWriter::new(cache, domain, ValuesUnit::Unbounded);
        writer.write_all(values)?;
        writer.commit()
    }

    pub fn with_values_unit(mut self, values: ValuesUnit) -> Self {
        self.values = values;
        self.stats = OnceLock::new();
        self
    }

    pub fn id(&self) -> AttributeId {
        self.id
    }

    pub fn domain(&self) -> &Arc<Domain> {
        &self.domain
    }

    pub fn values_unit(&self) -> &ValuesUnit {
        &self.values
    }

    pub fn len(&self) -> usize {
        self.domain.len()
    }

    pub fn is_empty(&self) -> bool {
        self.domain.is_empty()
    }

    pub fn tile_count(&self) -> usize {
        self.tiles.len()
    }

    /// False only when no element is undefined.
    pub fn may_have_undefined(&self) -> bool {
        self.may_have_undefined
    }

    /// Ordinals the values are counted over: the declared range, else the
    /// element type's natural range. `None` for uncountable kinds.
    pub fn countable_range(&self) -> Option<ValueRange> {
        if !T::COUNTABLE {
            return None;
        }
        self.values.range().or_else(T::natural_range)
    }

    pub fn read_tile(&self, tile: usize) -> ColumnarResult<TileRead<T>> {
        let range = self.domain.tile(tile)?;
        let data = match &self.tiles[tile] {
            StoredTile::Plain(values) => values.clone(),
            StoredTile::Packed(packed) => self.cache.get_or_decode(self.id, tile, || {
                T::decode_packed(packed).unwrap_or_default()
            }),
        };
        Ok(TileRead { data, range })
    }

    /// All values in domain order.
    pub fn to_vec(&self) -> ColumnarResult<Vec<T>> {
        let mut out = Vec::with_capacity(self.len());
        for t in 0..self.tile_count() {
            out.extend_from_slice(&self.read_tile(t)?);
        }
        Ok(out)
    }

    pub fn get(&self, index: usize) -> ColumnarResult<Option<T>> {
        let Some(t) = self.domain.tile_of(index) else {
            return Ok(None);
        };
        let tile = self.read_tile(t)?;
        Ok(tile.get(index - tile.offset()).cloned())
    }

    pub fn stats(&self) -> &AttributeStats {
        self.stats.get_or_init(|| AttributeStats::compute(self))
    }

    pub fn compressed_size_bytes(&self) -> usize {
        self.tiles
            .iter()
            .map(|t| match t {
                StoredTile::Plain(v) => v.len() * std::mem::size_of::<T>(),
                StoredTile::Packed(p) => p.heap_size_bytes(),
            })
            .sum()
    }
}

impl<T: Element> Drop for Attribute<T> {
    fn drop(&mut self) {
        if self
            .tiles
            .iter()
            .any(|t| matches!(t, StoredTile::Packed(_)))
        {
            self.cache.invalidate(self.id);
        }
    }
}

/// Exclusive, tile-by-tile writer for a result attribute.
///
/// Nothing is visible to readers until [`AttributeWriter::commit`]; dropping
/// the writer discards the partial result.
pub struct AttributeWriter<T: Element> {
    domain: Arc<Domain>,
    values: ValuesUnit,
    cache: Arc<TileCache>,
    tiles: Vec<Option<Vec<T>>>,
}

impl<T: Element> AttributeWriter<T> {
    pub fn new(cache: &Arc<TileCache>, domain: Arc<Domain>, values: ValuesUnit) -> Self {
        let tiles = (0..domain.tile_count()).map(|_| None).collect();
        Self {
            domain,
            values,
            cache: cache.clone(),
            tiles,
        }
    }

    pub fn domain(&self) -> &Arc<Domain> {
        &self.domain
    }

    pub fn write_tile(&mut self, tile: usize, values: Vec<T>) -> ColumnarResult<()> {
        let range = self.domain.tile(tile)?;
        if values.len() != range.len {
            return Err(ColumnarError::TileLengthMismatch {
                tile,
                expected: range.len,
                actual: values.len(),
            });
        }
        self.tiles[tile] = Some(values);
        Ok(())
    }

    /// Splits `values` (in domain order) over the tiles.
    pub fn write_all(&mut self, values: Vec<T>) -> ColumnarResult<()> {
        if values.len() != self.domain.len() {
            return Err(ColumnarError::LengthMismatch {
                expected: self.domain.len(),
                actual: values.len(),
            });
        }
        let mut rest = values.into_iter();
        for t in 0..self.domain.tile_count() {
            let len = self.domain.tiles()[t].len;
            self.tiles[t] = Some(rest.by_ref().take(len).collect());
        }
        Ok(())
    }

    pub fn commit(self) -> ColumnarResult<Attribute<T>> {
        let mut may_have_undefined = false;
        let mut tiles = Vec::with_capacity(self.tiles.len());
        for (t, values) in self.tiles.into_iter().enumerate() {
            let values = values.ok_or(ColumnarError::TileNotWritten { tile: t })?;
            may_have_undefined |= values.iter().any(|v| !v.is_defined());
            let stored = T::encode_tile(values);
            debug_assert_eq!(stored.len(), self.domain.tiles()[t].len);
            tiles.push(stored);
        }
        Ok(Attribute {
            id: self.cache.allocate_id(),
            domain: self.domain,
            values: self.values,
            may_have_undefined,
            tiles,
            cache: self.cache,
            stats: OnceLock::new(),
        })
    }
}
