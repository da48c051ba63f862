//! Two-decimal rounding for display.
//!
//! Analysis structs keep raw `f64` values; fields tagged with
//! `#[serde(serialize_with = "round2_serialize")]` are rounded only when
//! written out.

use serde::Serializer;

pub fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

pub fn round2_serialize<S: Serializer>(value: &f64, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.serialize_f64(round2(*value))
}

pub fn round2_serialize_vec<S: Serializer>(
    values: &[f64],
    serializer: S,
) -> Result<S::Ok, S::Error> {
    serializer.collect_seq(values.iter().map(|v| round2(*v)))
}
