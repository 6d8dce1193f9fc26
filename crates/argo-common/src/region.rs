//! Named ocean regions with fixed bounding boxes.
//!
//! Region names are matched case-insensitively inside free text. The
//! boxes are deliberately coarse; they bound SQL filters, not coastline
//! geometry.

use crate::bbox::BoundingBox;

/// A named geographic region users can reference in questions.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Region {
    pub name: &'static str,
    pub bbox: BoundingBox,
    /// Representative point as (lat, lon), used for proximity searches
    /// anchored on the region name.
    pub center: (f64, f64),
}

/// Fixed lookup table of supported regions.
///
/// Latitude-band entries (equator, tropics, southern ocean) span all
/// longitudes.
pub const REGIONS: &[Region] = &[
    // Indian Ocean
    Region { name: "indian ocean", bbox: BoundingBox::new(30.0, -40.0, 120.0, 25.0), center: (0.0, 75.0) },
    Region { name: "arabian sea", bbox: BoundingBox::new(50.0, 5.0, 75.0, 25.0), center: (15.0, 62.5) },
    Region { name: "bay of bengal", bbox: BoundingBox::new(80.0, 5.0, 95.0, 22.0), center: (13.5, 87.5) },
    Region { name: "andaman sea", bbox: BoundingBox::new(92.0, 5.0, 98.0, 15.0), center: (10.0, 95.0) },
    Region { name: "laccadive sea", bbox: BoundingBox::new(71.0, 8.0, 77.0, 14.0), center: (11.0, 74.0) },
    Region { name: "red sea", bbox: BoundingBox::new(32.0, 12.0, 44.0, 30.0), center: (20.0, 38.0) },
    Region { name: "persian gulf", bbox: BoundingBox::new(48.0, 24.0, 56.0, 30.0), center: (27.0, 52.0) },
    Region { name: "mozambique channel", bbox: BoundingBox::new(35.0, -25.0, 45.0, -10.0), center: (-18.0, 40.0) },
    // Pacific Ocean
    Region { name: "pacific ocean", bbox: BoundingBox::new(100.0, -60.0, 180.0, 60.0), center: (0.0, 160.0) },
    Region { name: "south china sea", bbox: BoundingBox::new(100.0, 0.0, 121.0, 25.0), center: (15.0, 115.0) },
    Region { name: "philippine sea", bbox: BoundingBox::new(120.0, 5.0, 140.0, 35.0), center: (20.0, 130.0) },
    Region { name: "coral sea", bbox: BoundingBox::new(145.0, -25.0, 165.0, -10.0), center: (-16.0, 155.0) },
    Region { name: "tasman sea", bbox: BoundingBox::new(150.0, -45.0, 175.0, -30.0), center: (-37.0, 162.0) },
    // Atlantic Ocean
    Region { name: "atlantic ocean", bbox: BoundingBox::new(-80.0, -60.0, 0.0, 60.0), center: (25.0, -40.0) },
    Region { name: "caribbean sea", bbox: BoundingBox::new(-88.0, 10.0, -60.0, 22.0), center: (17.0, -75.0) },
    Region { name: "gulf of mexico", bbox: BoundingBox::new(-98.0, 18.0, -80.0, 30.0), center: (25.0, -90.0) },
    Region { name: "mediterranean sea", bbox: BoundingBox::new(-6.0, 30.0, 36.0, 46.0), center: (38.0, 18.0) },
    Region { name: "north sea", bbox: BoundingBox::new(-5.0, 51.0, 10.0, 62.0), center: (56.0, 3.0) },
    // Cities and ports
    Region { name: "chennai", bbox: BoundingBox::new(80.0, 12.5, 81.0, 14.0), center: (13.08, 80.27) },
    Region { name: "mumbai", bbox: BoundingBox::new(72.0, 18.0, 73.5, 20.0), center: (18.97, 72.82) },
    Region { name: "sri lanka", bbox: BoundingBox::new(79.0, 5.0, 82.0, 10.0), center: (7.5, 80.5) },
    Region { name: "singapore", bbox: BoundingBox::new(103.0, 0.0, 105.0, 3.0), center: (1.3, 104.0) },
    Region { name: "tokyo", bbox: BoundingBox::new(139.0, 34.0, 141.0, 36.0), center: (35.5, 140.0) },
    Region { name: "sydney", bbox: BoundingBox::new(150.0, -35.0, 152.0, -33.0), center: (-34.0, 151.0) },
    Region { name: "cape town", bbox: BoundingBox::new(17.0, -35.0, 19.0, -33.0), center: (-34.0, 18.0) },
    Region { name: "miami", bbox: BoundingBox::new(-81.0, 25.0, -79.0, 27.0), center: (26.0, -80.0) },
    // Latitude bands
    Region { name: "equator", bbox: BoundingBox::new(-180.0, -2.0, 180.0, 2.0), center: (0.0, 80.0) },
    Region { name: "tropics", bbox: BoundingBox::new(-180.0, -23.5, 180.0, 23.5), center: (10.0, 80.0) },
    Region { name: "southern ocean", bbox: BoundingBox::new(-180.0, -65.0, 180.0, -40.0), center: (-55.0, 0.0) },
];

impl Region {
    /// Exact lookup by name (case-insensitive).
    pub fn by_name(name: &str) -> Option<&'static Region> {
        let lowered = name.trim().to_lowercase();
        REGIONS.iter().find(|r| r.name == lowered)
    }

    /// Find a region mentioned anywhere in free text.
    ///
    /// The longest matching name wins, so "north indian ocean" resolves
    /// to "indian ocean" rather than a shorter accidental substring.
    pub fn find_in(text: &str) -> Option<&'static Region> {
        let lowered = text.to_lowercase();
        REGIONS
            .iter()
            .filter(|r| lowered.contains(r.name))
            .max_by_key(|r| r.name.len())
    }

    /// All supported region names, for help responses.
    pub fn names() -> Vec<&'static str> {
        REGIONS.iter().map(|r| r.name).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_by_name_case_insensitive() {
        let region = Region::by_name("Bay of Bengal").unwrap();
        assert_eq!(region.bbox.min_lon, 80.0);
        assert_eq!(region.bbox.max_lat, 22.0);
        assert!(Region::by_name("sea of nowhere").is_none());
    }

    #[test]
    fn test_find_in_free_text() {
        let region = Region::find_in("average temperature in the Arabian Sea last year").unwrap();
        assert_eq!(region.name, "arabian sea");
    }

    #[test]
    fn test_longest_match_wins() {
        // "south china sea" contains no other region name, but a question
        // naming two candidates resolves to the longer one.
        let region = Region::find_in("floats in the mozambique channel").unwrap();
        assert_eq!(region.name, "mozambique channel");
    }

    #[test]
    fn test_latitude_bands_span_all_longitudes() {
        let equator = Region::by_name("equator").unwrap();
        assert!(equator.bbox.contains_point(-150.0, 0.0));
        assert!(equator.bbox.contains_point(150.0, 1.5));
        assert!(!equator.bbox.contains_point(0.0, 5.0));
    }

    #[test]
    fn test_every_region_center_is_inside_or_near_its_bbox() {
        for region in REGIONS {
            let (lat, lon) = region.center;
            // Centers are representative points; for basins they sit inside
            // the box.
            if region.bbox.width() > 10.0 {
                assert!(
                    region.bbox.contains_point(lon, lat),
                    "center of {} outside its bbox",
                    region.name
                );
            }
        }
    }
}
