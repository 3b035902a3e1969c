//! Zone classification of a position against the Home and University anchors

use crate::domain::types::{AnchorPoint, GeoPoint, Zone};

/// Classify `position` as Home, University or Unknown.
///
/// An unset anchor is infinitely far away. A distance equal to the radius is
/// inside, and a position equally close to both anchors is Home.
pub fn classify(
    position: &GeoPoint,
    home: Option<&AnchorPoint>,
    university: Option<&AnchorPoint>,
    radius_m: f64,
) -> Zone {
    let home_distance = home.map_or(f64::INFINITY, |anchor| position.distance_to(anchor));
    let university_distance =
        university.map_or(f64::INFINITY, |anchor| position.distance_to(anchor));

    let nearest = home_distance.min(university_distance);
    if nearest > radius_m {
        return Zone::Unknown;
    }

    if home_distance <= university_distance {
        Zone::Home
    } else {
        Zone::University
    }
}
