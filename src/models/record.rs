use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Result record handed to the result sink.
///
/// Field names follow the backend's JSON contract.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResultRecord {
    /// Bubbled student identifier, if any cell was marked
    pub ext_id: Option<String>,
    /// Mean fill ratio of the accepted identifier cells
    pub ext_id_confidence: Option<f64>,
    /// Chosen labels per question
    pub answers: BTreeMap<i64, Vec<String>>,
    /// Fill ratio per question and label, rounded to 4 decimals
    pub answers_confidence: BTreeMap<i64, BTreeMap<String, f64>>,
    /// Student match, resolved by the backend
    pub student_pk: Option<i64>,
    /// Where the name crop was stored, if it was
    pub name_crop_path: Option<String>,
}
