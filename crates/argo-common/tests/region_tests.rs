//! Region table integration tests.

use argo_common::{BoundingBox, Region, REGIONS};

#[test]
fn region_names_are_unique_and_lowercase() {
    let mut seen = std::collections::HashSet::new();
    for region in REGIONS {
        assert_eq!(region.name, region.name.to_lowercase());
        assert!(seen.insert(region.name), "duplicate region {}", region.name);
    }
}

#[test]
fn region_boxes_are_well_formed() {
    for region in REGIONS {
        assert!(
            region.bbox.min_lon < region.bbox.max_lon,
            "{} lon order",
            region.name
        );
        assert!(
            region.bbox.min_lat < region.bbox.max_lat,
            "{} lat order",
            region.name
        );
        assert!(region.bbox.min_lat >= -90.0 && region.bbox.max_lat <= 90.0);
    }
}

#[test]
fn find_in_prefers_longer_names_over_substrings() {
    // "indian ocean" must not shadow a longer, more specific name when
    // both appear.
    let question = "compare the indian ocean with the mozambique channel";
    let region = Region::find_in(question).unwrap();
    assert_eq!(region.name, "mozambique channel");
}

#[test]
fn bbox_param_round_trip_matches_table() {
    let bengal = Region::by_name("bay of bengal").unwrap();
    let parsed = BoundingBox::from_param("80,5,95,22").unwrap();
    assert_eq!(bengal.bbox, parsed);
}
