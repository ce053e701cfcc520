use serde_json::Value;

/// Attribute mapping of a feature, or the whole of a plain record.
pub type Attributes = serde_json::Map<String, Value>;

/// The shape a collection arrived in. Filtering carries it through unchanged.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CollectionKind {
    /// A GeoJSON `FeatureCollection` object.
    FeatureCollection,
    /// A plain array of domain records without geometry.
    Records,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Feature {
    pub geometry: Option<geojson::Geometry>,
    pub attributes: Attributes,
    pub id: Option<geojson::feature::Id>,
}

impl Feature {
    pub fn new(geometry: Option<geojson::Geometry>, attributes: Attributes) -> Self {
        Self {
            geometry,
            attributes,
            id: None,
        }
    }

    /// The location of a point feature. Polygons, lines and records have none.
    pub fn point(&self) -> Option<geo::Point> {
        match &self.geometry.as_ref()?.value {
            geojson::Value::Point(position) if position.len() >= 2 => {
                Some(geo::Point::new(position[0], position[1]))
            }
            _ => None,
        }
    }

    pub fn attribute(&self, key: &str) -> Option<&Value> {
        self.attributes.get(key)
    }

    /// Attribute rendered as display text. Strings are returned without quotes, null as absent.
    pub fn attribute_text(&self, key: &str) -> Option<String> {
        match self.attribute(key)? {
            Value::Null => None,
            Value::String(text) => Some(text.clone()),
            other => Some(other.to_string()),
        }
    }
}

impl From<geojson::Feature> for Feature {
    fn from(value: geojson::Feature) -> Self {
        Self {
            geometry: value.geometry,
            attributes: value.properties.unwrap_or_default(),
            id: value.id,
        }
    }
}

impl From<Feature> for geojson::Feature {
    fn from(value: Feature) -> Self {
        geojson::Feature {
            bbox: None,
            geometry: value.geometry,
            id: value.id,
            properties: Some(value.attributes),
            foreign_members: None,
        }
    }
}

impl From<Attributes> for Feature {
    fn from(value: Attributes) -> Self {
        Self::new(None, value)
    }
}

/// Ordered events from one query or dataset. Never mutated in place; filtering builds a new one.
#[derive(Debug, Clone, PartialEq)]
pub struct FeatureCollection {
    pub kind: CollectionKind,
    pub features: Vec<Feature>,
}

impl FeatureCollection {
    pub fn new(kind: CollectionKind, features: Vec<Feature>) -> Self {
        Self { kind, features }
    }

    pub fn from_records(records: Vec<Attributes>) -> Self {
        Self::new(
            CollectionKind::Records,
            records.into_iter().map(Feature::from).collect(),
        )
    }

    /// A collection of the same kind holding `features`.
    pub fn with_features(&self, features: Vec<Feature>) -> Self {
        Self::new(self.kind, features)
    }

    pub fn len(&self) -> usize {
        self.features.len()
    }

    pub fn is_empty(&self) -> bool {
        self.features.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Feature> {
        self.features.iter()
    }

    /// First feature whose `attribute` reads as `id`.
    pub fn find(&self, attribute: &str, id: &str) -> Option<&Feature> {
        self.features
            .iter()
            .find(|feature| feature.attribute_text(attribute).as_deref() == Some(id))
    }
}

impl From<geojson::FeatureCollection> for FeatureCollection {
    fn from(value: geojson::FeatureCollection) -> Self {
        Self::new(
            CollectionKind::FeatureCollection,
            value.features.into_iter().map(Feature::from).collect(),
        )
    }
}
