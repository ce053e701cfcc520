use anyhow::{anyhow, Context};
use serde_json::Value;
use std::{fs, path::Path};

use super::feature::{Attributes, CollectionKind, FeatureCollection};

/// Interpret a query payload as a collection.
///
/// Accepts a GeoJSON object with a `features` member, a plain array of records, or a paginated
/// object whose `results` member is such an array. Array items that are not objects are skipped.
pub fn parse_payload(payload: Value) -> anyhow::Result<FeatureCollection> {
    match payload {
        Value::Array(items) => Ok(records_from_items(items)),
        Value::Object(mut object) => {
            if object.contains_key("features") {
                let geojson = geojson::GeoJson::from_json_value(Value::Object(object))
                    .map_err(|err| anyhow!("Could not read GeoJSON payload, {}", err))?;
                match geojson {
                    geojson::GeoJson::FeatureCollection(collection) => Ok(collection.into()),
                    _ => Err(anyhow!("Expected a GeoJSON FeatureCollection")),
                }
            } else if let Some(Value::Array(items)) = object.remove("results") {
                Ok(records_from_items(items))
            } else {
                Err(anyhow!(
                    "Payload object has neither 'features' nor 'results' member"
                ))
            }
        }
        other => Err(anyhow!("Cannot read a collection from {}", other)),
    }
}

fn records_from_items(items: Vec<Value>) -> FeatureCollection {
    let num_items = items.len();
    let records: Vec<Attributes> = items
        .into_iter()
        .filter_map(|item| match item {
            Value::Object(record) => Some(record),
            _ => None,
        })
        .collect();
    if records.len() != num_items {
        log::warn!(
            "Out of {} items read, only {} were records.",
            num_items,
            records.len()
        )
    }
    FeatureCollection::from_records(records)
}

/// Serialize a collection back into the shape it arrived in.
pub fn collection_to_json(collection: &FeatureCollection) -> anyhow::Result<Value> {
    Ok(match collection.kind {
        CollectionKind::FeatureCollection => {
            let feature_collection: geojson::FeatureCollection = collection
                .iter()
                .cloned()
                .map(geojson::Feature::from)
                .collect();
            serde_json::to_value(&feature_collection)?
        }
        CollectionKind::Records => Value::Array(
            collection
                .iter()
                .map(|feature| Value::Object(feature.attributes.clone()))
                .collect(),
        ),
    })
}

pub fn read_collection_from_file(filepath: &Path) -> anyhow::Result<FeatureCollection> {
    let contents = fs::read_to_string(filepath)
        .with_context(|| format!("Reading collection from {:?}", filepath))?;
    let payload: Value = serde_json::from_str(&contents)
        .with_context(|| format!("Decoding JSON in {:?}", filepath))?;
    parse_payload(payload)
}

pub fn write_collection_to_file(
    collection: &FeatureCollection,
    output_filepath: &Path,
) -> anyhow::Result<()> {
    fs::write(output_filepath, collection_to_json(collection)?.to_string())
        .with_context(|| format!("Writing collection to {:?}", output_filepath))
}
