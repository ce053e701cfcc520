use crate::geofile::feature::{Feature, FeatureCollection};

use super::{bbox::WgsBoundingBox, predicate::PredicateSet};

/// Select the features satisfying every predicate and, when `bbox` is valid, lying inside it.
///
/// The input is left untouched; the result keeps the input order and collection kind. An invalid
/// bounding box leaves the spatial axis unconstrained. Only point features can pass a spatial test.
pub fn filter(
    collection: &FeatureCollection,
    predicates: &PredicateSet,
    bbox: Option<&WgsBoundingBox>,
) -> FeatureCollection {
    let bbox = bbox.filter(|bbox| bbox.is_valid());
    let features: Vec<Feature> = collection
        .iter()
        .filter(|feature| bbox.map_or(true, |bbox| within(feature, bbox)))
        .filter(|feature| predicates.matches(feature))
        .cloned()
        .collect();
    log::debug!(
        "Filter retained {} of {} features",
        features.len(),
        collection.len()
    );
    collection.with_features(features)
}

fn within(feature: &Feature, bbox: &WgsBoundingBox) -> bool {
    feature
        .point()
        .map_or(false, |point| bbox.contains(&point))
}



#[cfg(test)]
#[generic_tests::define]
mod laws {

    use crate::filter::predicate::PredicateSet;

    use super::{filter, fixtures::FilterFixture};

    #[test]
    fn test_identity_without_constraints<F: FilterFixture>() {
        let collection = F::collection();
        let filtered = filter(&collection, &PredicateSet::new(), None);
        assert_eq!(filtered, collection);
    }

    #[test]
    fn test_result_is_subset_satisfying_every_axis<F: FilterFixture>() {
        let collection = F::collection();
        let predicates = F::predicates();
        let bbox = F::bbox();
        let filtered = filter(&collection, &predicates, bbox.as_ref());

        assert_eq!(filtered.kind, collection.kind);
        for feature in filtered.iter() {
            assert!(collection.features.contains(feature));
            for predicate in predicates.iter() {
                assert!(predicate.matches(feature));
            }
            if let Some(bbox) = &bbox {
                assert!(bbox.contains(&feature.point().unwrap()));
            }
        }
    }

    #[test]
    fn test_idempotent<F: FilterFixture>() {
        let collection = F::collection();
        let predicates = F::predicates();
        let bbox = F::bbox();
        let once = filter(&collection, &predicates, bbox.as_ref());
        let twice = filter(&once, &predicates, bbox.as_ref());
        assert_eq!(once, twice);
    }

    #[test]
    fn test_keeps_input_order<F: FilterFixture>() {
        let collection = F::collection();
        let filtered = filter(&collection, &F::predicates(), F::bbox().as_ref());

        let positions: Vec<usize> = filtered
            .iter()
            .map(|feature| {
                collection
                    .iter()
                    .position(|candidate| candidate == feature)
                    .unwrap()
            })
            .collect();
        let mut sorted = positions.clone();
        sorted.sort();
        assert_eq!(positions, sorted);
        assert!(!filtered.is_empty());
    }

    #[instantiate_tests(<crate::filter::feature_filter::fixtures::EarthquakeFixture>)]
    mod earthquake {}

    #[instantiate_tests(<crate::filter::feature_filter::fixtures::FloodFixture>)]
    mod flood {}

    #[instantiate_tests(<crate::filter::feature_filter::fixtures::AshFixture>)]
    mod ash {}
}
