use crate::data::{Layer, Session};
use crate::types::{GeometryKind, SourceFeature};
use anyhow::Result;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};
use serde_json::{json, Value};

/// Picks up to `count` distinct records in random order.
pub fn sample_features<'a, R: Rng + ?Sized>(
    features: &'a [SourceFeature],
    count: usize,
    rng: &mut R,
) -> Vec<&'a SourceFeature> {
    features.choose_multiple(rng, count).collect()
}

/// One record as JSON, attributes only (geometry replaced by its type).
pub fn describe(feature: &SourceFeature) -> Value {
    json!({
        "id": feature.id,
        "geometry_type": GeometryKind::of(feature.geometry.as_ref()).to_string(),
        "properties": feature.properties,
    })
}

pub fn print_sample(session: &Session, layer: Layer, count: usize, seed: Option<u64>) -> Result<()> {
    let features = session.load(layer)?;

    let mut rng = match seed {
        Some(seed) => StdRng::seed_from_u64(seed),
        None => StdRng::from_entropy(),
    };

    println!(
        "Sample of {} from {} ({} records):",
        count.min(features.len()),
        layer.table_name(),
        features.len()
    );
    for feature in sample_features(&features, count, &mut rng) {
        println!("{}", describe(feature));
    }

    Ok(())
}
