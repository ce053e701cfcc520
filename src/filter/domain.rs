use serde::Deserialize;
use std::fmt;

use super::predicate::{non_empty, parse_timestamp, AxisDescriptor, AxisKind, PredicateSource};

const EARTHQUAKE_AXES: [AxisDescriptor; 4] = [
    AxisDescriptor {
        attribute: "magnitude",
        label: "magnitudes",
        kind: AxisKind::NumericRange {
            min_field: "minimum_magnitude",
            max_field: "maximum_magnitude",
        },
    },
    AxisDescriptor {
        attribute: "depth",
        label: "depths",
        kind: AxisKind::NumericRange {
            min_field: "min_depth",
            max_field: "max_depth",
        },
    },
    AxisDescriptor {
        attribute: "time",
        label: "time",
        kind: AxisKind::DateRange {
            min_field: "start_date",
            max_field: "end_date",
        },
    },
    AxisDescriptor {
        attribute: "felt",
        label: "felt",
        kind: AxisKind::Toggle { field: "felt" },
    },
];

const FLOOD_AXES: [AxisDescriptor; 3] = [
    AxisDescriptor {
        attribute: "total_affected",
        label: "people affected",
        kind: AxisKind::NumericRange {
            min_field: "min_people_affected",
            max_field: "max_people_affected",
        },
    },
    AxisDescriptor {
        attribute: "boundary_flooded",
        label: "RW flooded",
        kind: AxisKind::NumericRange {
            min_field: "min_boundary_flooded",
            max_field: "max_boundary_flooded",
        },
    },
    AxisDescriptor {
        attribute: "time",
        label: "time",
        kind: AxisKind::DateRange {
            min_field: "start_date",
            max_field: "end_date",
        },
    },
];

const ASH_AXES: [AxisDescriptor; 1] = [AxisDescriptor {
    attribute: "event_time",
    label: "time",
    kind: AxisKind::DateRange {
        min_field: "start_date",
        max_field: "end_date",
    },
}];

/// Hazard type shown on a dashboard. Each one is the same filter configured with its own axes.
#[derive(Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum Domain {
    Earthquake,
    Flood,
    Ash,
}

impl Domain {
    pub fn axes(&self) -> &'static [AxisDescriptor] {
        match self {
            Domain::Earthquake => &EARTHQUAKE_AXES,
            Domain::Flood => &FLOOD_AXES,
            Domain::Ash => &ASH_AXES,
        }
    }

    /// Flood events arrive as plain records without geometry, so they have no spatial axis.
    pub fn supports_spatial_filter(&self) -> bool {
        !matches!(self, Domain::Flood)
    }

    /// Attribute identifying an event in row actions and report lookups.
    pub fn id_attribute(&self) -> &'static str {
        match self {
            Domain::Earthquake => "shake_id",
            Domain::Flood => "event_id",
            Domain::Ash => "id",
        }
    }

    pub fn time_attribute(&self) -> &'static str {
        match self {
            Domain::Earthquake | Domain::Flood => "time",
            Domain::Ash => "event_time",
        }
    }

    pub fn title(&self) -> &'static str {
        match self {
            Domain::Earthquake => "Earthquake events",
            Domain::Flood => "Flood events",
            Domain::Ash => "Volcanic ash events",
        }
    }

    /// Caption for the map describing the active filters, e.g.
    /// "Earthquake events with magnitudes greater or equal than 5 after February 1, 2020".
    pub fn describe(&self, source: &dyn PredicateSource) -> String {
        let mut phrases = Vec::new();
        for axis in self.axes() {
            if let AxisKind::NumericRange {
                min_field,
                max_field,
            } = axis.kind
            {
                let phrase = match (non_empty(source, min_field), non_empty(source, max_field)) {
                    (Some(min), Some(max)) => {
                        format!("with {} between {} and {}", axis.label, min, max)
                    }
                    (Some(min), None) => {
                        format!("with {} greater or equal than {}", axis.label, min)
                    }
                    (None, Some(max)) => format!("with {} less or equal than {}", axis.label, max),
                    (None, None) => continue,
                };
                phrases.push(phrase);
            }
        }
        for axis in self.axes() {
            if let AxisKind::DateRange {
                min_field,
                max_field,
            } = axis.kind
            {
                let start = non_empty(source, min_field).map(long_date);
                let end = non_empty(source, max_field).map(long_date);
                let phrase = match (start, end) {
                    (Some(start), Some(end)) => format!("over the period {} and {}", start, end),
                    (Some(start), None) => format!("after {}", start),
                    (None, Some(end)) => format!("before {}", end),
                    (None, None) => continue,
                };
                phrases.push(phrase);
            }
        }

        let mut description = self.title().to_string();
        for phrase in phrases {
            description.push(' ');
            description.push_str(&phrase);
        }
        description
    }
}

/// "February 1, 2020"; unparseable input is shown as typed.
fn long_date(value: &str) -> String {
    match parse_timestamp(value) {
        Ok(time) => time.format("%B %-d, %Y").to_string(),
        Err(_) => value.to_string(),
    }
}

impl fmt::Display for Domain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Domain::Earthquake => "earthquake",
            Domain::Flood => "flood",
            Domain::Ash => "ash",
        };
        f.write_str(name)
    }
}
