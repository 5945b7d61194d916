use pretty_assertions::assert_eq;
use std::sync::Arc;
use tessera_columnar::{
    text, AnyAttribute, Attribute, AttributeWriter, Bits, Domain, Element, Point, TileCache,
    TileCacheConfig, ValueKind, ValueRange, ValuesUnit,
};

fn cache() -> Arc<TileCache> {
    Arc::new(TileCache::new(TileCacheConfig { max_entries: 2 }))
}

#[test]
fn writer_commits_tiles_in_any_order() {
    let cache = cache();
    let domain = Arc::new(Domain::with_tile_sizes(&[3, 1, 2]).unwrap());
    let mut writer = AttributeWriter::new(&cache, domain.clone(), ValuesUnit::Unbounded);
    writer.write_tile(2, vec![5i64, 6]).unwrap();
    writer.write_tile(0, vec![1, 2, 3]).unwrap();
    writer.write_tile(1, vec![i64::MIN]).unwrap();
    let attr = writer.commit().unwrap();

    assert_eq!(attr.to_vec().unwrap(), vec![1, 2, 3, i64::MIN, 5, 6]);
    assert!(attr.may_have_undefined());
    assert_eq!(attr.stats().undefined_count, 1);
    assert!(Domain::unify(attr.domain(), &domain));
}

#[test]
fn packed_reads_survive_cache_eviction() {
    let cache = cache();
    let values: Vec<Bits<4>> = (0..40u8).map(Bits::truncating).collect();
    let attr = Attribute::from_values(&cache, Arc::new(Domain::tiled(40, 8)), values.clone())
        .unwrap();

    let first = attr.read_tile(0).unwrap();
    for t in 1..attr.tile_count() {
        attr.read_tile(t).unwrap();
    }
    assert!(cache.stats().evictions > 0);
    // The evicted tile stays readable through the handle taken earlier.
    assert_eq!(&*first, &values[..8]);
    assert_eq!(attr.to_vec().unwrap(), values);
}

#[test]
fn attributes_of_every_family_report_their_kind() {
    let cache = cache();
    let domain = Arc::new(Domain::new(3));

    let ints = AnyAttribute::new(
        Attribute::from_values(&cache, domain.clone(), vec![1u16, 2, u16::MAX])
            .unwrap()
            .with_values_unit(ValuesUnit::Range(ValueRange::new(0, 3))),
    );
    let points = AnyAttribute::new(
        Attribute::from_values(
            &cache,
            domain.clone(),
            vec![Point::new(0i32, 0), Point::undefined(), Point::new(2, 1)],
        )
        .unwrap(),
    );
    let strings = AnyAttribute::new(
        Attribute::from_values(&cache, domain, vec![text("x"), text(""), None]).unwrap(),
    );

    assert_eq!(ints.kind(), ValueKind::Scalar(tessera_columnar::ScalarKind::UInt16));
    assert_eq!(ints.values_unit().range(), Some(ValueRange::new(0, 3)));
    assert!(ints.kind().is_countable());
    assert!(!points.kind().is_countable());
    assert!(points.may_have_undefined());
    assert_eq!(strings.kind().to_string(), "string");
}
