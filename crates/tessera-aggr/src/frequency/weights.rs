#![forbid(unsafe_code)]

use super::Tally;
use crate::error::{AggrError, AggrResult};
use std::sync::Arc;
use tessera_columnar::{dispatch_scalar, AnyAttribute, Domain, ScalarElement};

/// Where the count contributed by each element comes from.
pub trait WeightSource: Sync {
    type Tally: Tally;
    type Tile;

    fn tile(&self, tile: usize) -> AggrResult<Self::Tile>;

    /// Weight of element `i` of the tile; `None` excludes the element.
    fn weight(tile: &Self::Tile, i: usize) -> Option<Self::Tally>;
}

/// Every element counts once.
#[derive(Debug, Clone, Copy, Default)]
pub struct Unweighted;

impl WeightSource for Unweighted {
    type Tally = u64;
    type Tile = ();

    fn tile(&self, _tile: usize) -> AggrResult<()> {
        Ok(())
    }

    fn weight(_tile: &(), _i: usize) -> Option<u64> {
        Some(1)
    }
}

/// Elements count with a numeric weight; undefined and zero weights exclude
/// the element.
#[derive(Debug, Clone, Copy)]
pub struct Weighted<'a> {
    operator: &'a str,
    argument: usize,
    weights: &'a AnyAttribute,
}

impl<'a> Weighted<'a> {
    pub fn new(
        operator: &'a str,
        argument: usize,
        weights: &'a AnyAttribute,
        values_domain: &Arc<Domain>,
    ) -> AggrResult<Self> {
        if !matches!(weights.kind(), tessera_columnar::ValueKind::Scalar(_)) {
            return Err(AggrError::type_mismatch(
                operator,
                argument,
                "numeric weights",
                weights.kind(),
            ));
        }
        if !Domain::unify(weights.domain(), values_domain) {
            return Err(AggrError::domain_mismatch(operator, argument));
        }
        Ok(Self {
            operator,
            argument,
            weights,
        })
    }
}

fn as_f64<T: ScalarElement>(w: &T) -> f64 {
    if w.is_defined() {
        w.to_f64()
    } else {
        f64::NAN
    }
}

impl WeightSource for Weighted<'_> {
    type Tally = f64;
    type Tile = Vec<f64>;

    fn tile(&self, tile: usize) -> AggrResult<Vec<f64>> {
        dispatch_scalar!(
            self.weights,
            w => Ok(w.read_tile(tile)?.iter().map(as_f64).collect()),
            other => Err(AggrError::type_mismatch(
                self.operator,
                self.argument,
                "numeric weights",
                other.kind()
            ))
        )
    }

    fn weight(tile: &Vec<f64>, i: usize) -> Option<f64> {
        tile.get(i).copied().filter(|w| !w.is_nan() && *w != 0.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tessera_columnar::{Attribute, TileCache};

    #[test]
    fn undefined_and_zero_weights_are_excluded() {
        let cache = Arc::new(TileCache::default());
        let domain = Arc::new(Domain::new(4));
        let w: AnyAttribute =
            Attribute::from_values(&cache, domain.clone(), vec![2i32, 0, i32::MIN, -1]).unwrap().into();
        let weights = Weighted::new("modus_weighted", 1, &w, &domain).unwrap();
        let tile = weights.tile(0).unwrap();
        let got: Vec<Option<f64>> = (0..4).map(|i| Weighted::weight(&tile, i)).collect();
        assert_eq!(got, vec![Some(2.0), None, None, Some(-1.0)]);
    }

    #[test]
    fn errors_name_the_weights_argument() {
        let cache = Arc::new(TileCache::default());
        let domain = Arc::new(Domain::new(2));
        let w: AnyAttribute =
            Attribute::from_values(&cache, domain.clone(), vec![tessera_columnar::text("x"), None])
                .unwrap()
                .into();
        let err = Weighted::new("modus_weighted", 1, &w, &domain).unwrap_err();
        assert!(matches!(
            err,
            AggrError::TypeMismatch { ref operator, argument: 1, .. } if operator == "modus_weighted"
        ));
    }

    #[test]
    fn weights_must_share_the_values_domain() {
        let cache = Arc::new(TileCache::default());
        let w: AnyAttribute =
            Attribute::from_values(&cache, Arc::new(Domain::new(3)), vec![1.0f32; 3]).unwrap().into();
        let err = Weighted::new("modus_weighted", 1, &w, &Arc::new(Domain::new(4))).unwrap_err();
        assert_eq!(err, AggrError::domain_mismatch("modus_weighted", 1));
    }
}
