use serde::Deserialize;

/// Viewport rectangle in WGS84 degrees, as drawn on the map.
#[derive(Deserialize, Debug, Clone, Copy, PartialEq)]
pub struct WgsBoundingBox {
    pub left_lon: f64,
    pub right_lon: f64,
    pub bottom_lat: f64,
    pub top_lat: f64,
}

impl WgsBoundingBox {
    /// Build from corners in `west, south, east, north` order.
    pub fn new(west: f64, south: f64, east: f64, north: f64) -> Self {
        Self {
            left_lon: west,
            right_lon: east,
            bottom_lat: south,
            top_lat: north,
        }
    }

    /// A box that was never drawn, or drawn inside out, disables the spatial axis.
    pub fn is_valid(&self) -> bool {
        [self.left_lon, self.right_lon, self.bottom_lat, self.top_lat]
            .iter()
            .all(|value| value.is_finite())
            && self.left_lon <= self.right_lon
            && self.bottom_lat <= self.top_lat
    }

    /// Containment is inclusive of the edges.
    pub fn contains(&self, point: &geo::Point) -> bool {
        point.x() >= self.left_lon
            && point.x() <= self.right_lon
            && point.y() >= self.bottom_lat
            && point.y() <= self.top_lat
    }

    /// Value of the `in_bbox` query parameter: `west,south,east,north`.
    pub fn to_bbox_string(&self) -> String {
        format!(
            "{},{},{},{}",
            self.left_lon, self.bottom_lat, self.right_lon, self.top_lat
        )
    }
}
