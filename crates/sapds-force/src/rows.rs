//! Typed views over upstream Force Element records.
//!
//! Every field is optional and read leniently: strings are trimmed, numbers
//! and booleans are rendered as text, and empty values count as absent.

use std::collections::BTreeSet;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Deserializer};
use serde_json::{Map, Value};
use tracing::debug;

use crate::constants::*;

/// Text form of a scalar JSON value, or `None` if empty or not scalar.
pub fn value_text(value: &Value) -> Option<String> {
    let text = match value {
        Value::String(s) => s.trim().to_string(),
        Value::Number(n) => n.to_string(),
        Value::Bool(b) => b.to_string(),
        _ => return None,
    };
    Some(text).filter(|t| !t.is_empty())
}

fn lenient_text<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<String>, D::Error> {
    let value = Option::<Value>::deserialize(deserializer)?;
    Ok(value.as_ref().and_then(value_text))
}

/// One row of the network graph entity set.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct EdgeRow {
    #[serde(rename = "ForceElementOrgID", default, deserialize_with = "lenient_text")]
    pub source: Option<String>,
    #[serde(rename = "FrcElmntOrgRelatedOrgID", default, deserialize_with = "lenient_text")]
    pub target: Option<String>,
    #[serde(rename = "FrcElmntOrgSubType", default, deserialize_with = "lenient_text")]
    pub relation: Option<String>,
}

/// One row of the Force Element entity set, whatever subset was selected.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ForceElementRow {
    #[serde(rename = "ForceElementOrgID", default, deserialize_with = "lenient_text")]
    pub id: Option<String>,

    #[serde(rename = "FrcElmntOrgName", default, deserialize_with = "lenient_text")]
    pub name: Option<String>,
    #[serde(rename = "FrcElmntOrgShortName", default, deserialize_with = "lenient_text")]
    pub short_name: Option<String>,
    #[serde(rename = "FrcElmntOrgConcatenatedName", default, deserialize_with = "lenient_text")]
    pub concatenated_name: Option<String>,
    #[serde(rename = "ForceElementOrgName", default, deserialize_with = "lenient_text")]
    pub org_name: Option<String>,
    #[serde(rename = "Name", default, deserialize_with = "lenient_text")]
    pub plain_name: Option<String>,
    #[serde(rename = "Description", default, deserialize_with = "lenient_text")]
    pub description: Option<String>,

    #[serde(rename = "FrcElmntOrgSymbol", default, deserialize_with = "lenient_text")]
    pub symbol: Option<String>,

    #[serde(rename = "FrcElmntOrgMatlRdnssPct", default)]
    pub material_pct: Option<Value>,
    #[serde(rename = "FrcElmntOrgPrsnlRdnssPct", default)]
    pub personnel_pct: Option<Value>,
    #[serde(rename = "FrcElmntOrgTrngRdnssPct", default)]
    pub training_pct: Option<Value>,

    #[serde(rename = "FrcElmntOrgStrucParentID", default, deserialize_with = "lenient_text")]
    pub parent_structure: Option<String>,
    #[serde(rename = "FrcElmntOrgPeaceTimeParentID", default, deserialize_with = "lenient_text")]
    pub parent_peacetime: Option<String>,
    #[serde(rename = "FrcElmntOrgWarTimeParentID", default, deserialize_with = "lenient_text")]
    pub parent_wartime: Option<String>,
    #[serde(rename = "FrcElmntOrgOplAssgmtParentID", default, deserialize_with = "lenient_text")]
    pub parent_operation: Option<String>,
    #[serde(rename = "FrcElmntOrgExerAssgmtParentID", default, deserialize_with = "lenient_text")]
    pub parent_exercise: Option<String>,

    /// Everything else, e.g. whichever property carries the symbol code.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl ForceElementRow {
    /// Text of the upstream property `field`, looked up on the typed fields first.
    pub fn text(&self, field: &str) -> Option<String> {
        let typed = match field {
            ID_FIELD => &self.id,
            "FrcElmntOrgName" => &self.name,
            "FrcElmntOrgShortName" => &self.short_name,
            "FrcElmntOrgConcatenatedName" => &self.concatenated_name,
            "ForceElementOrgName" => &self.org_name,
            "Name" => &self.plain_name,
            "Description" => &self.description,
            SYMBOL_FIELD => &self.symbol,
            PARENT_STRUCTURE_FIELD => &self.parent_structure,
            PARENT_PEACETIME_FIELD => &self.parent_peacetime,
            PARENT_WARTIME_FIELD => &self.parent_wartime,
            PARENT_OPERATION_FIELD => &self.parent_operation,
            PARENT_EXERCISE_FIELD => &self.parent_exercise,
            MATERIAL_PCT_FIELD => return self.material_pct.as_ref().and_then(value_text),
            PERSONNEL_PCT_FIELD => return self.personnel_pct.as_ref().and_then(value_text),
            TRAINING_PCT_FIELD => return self.training_pct.as_ref().and_then(value_text),
            _ => return self.extra.get(field).and_then(value_text),
        };
        typed.clone()
    }

    /// First non-empty name candidate.
    pub fn display_name(&self) -> Option<String> {
        NAME_FIELDS.iter().find_map(|field| self.text(field))
    }
}

/// Deserialize rows, skipping any that are not record-shaped.
pub fn parse_rows<T: DeserializeOwned>(rows: Vec<Value>) -> Vec<T> {
    rows.into_iter()
        .filter_map(|row| match serde_json::from_value(row) {
            Ok(parsed) => Some(parsed),
            Err(e) => {
                debug!(error = %e, "skipping malformed row");
                None
            }
        })
        .collect()
}

/// Trimmed, non-empty, deduplicated, sorted IDs.
pub fn normalize_ids<I, S>(ids: I) -> Vec<String>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    ids.into_iter()
        .map(|id| id.as_ref().trim().to_string())
        .filter(|id| !id.is_empty())
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect()
}
