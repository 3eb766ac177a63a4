//! Response Projector
//!
//! Shapes filtered volumes into the two outputs the dashboard datasource
//! protocol expects: a typed table, and a list of distinct field values.

use super::filter::FilterField;
use crate::domain::ports::VolumeInfo;
use indexmap::IndexSet;
use serde::{Deserialize, Serialize};

/// Table column headers, in row order
pub const TABLE_COLUMNS: [&str; 12] = [
    "Namespace",
    "Persistent Volume",
    "Status",
    "Persistent Volume Claim",
    "CSI Driver",
    "Created",
    "Provisioned Size",
    "Storage Class",
    "Storage System Volume Name",
    "Storage Pool",
    "Storage System",
    "Protocol",
];

/// Column type reported for every column
const COLUMN_TYPE_STRING: &str = "string";

/// Response type tag for tables
const RESPONSE_TYPE_TABLE: &str = "table";

/// Table column header
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TableColumn {
    pub text: String,
    #[serde(rename = "type")]
    pub column_type: String,
}

/// Table query response
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TableResponse {
    #[serde(rename = "type")]
    pub response_type: String,
    pub columns: Vec<TableColumn>,
    pub rows: Vec<Vec<String>>,
}

/// Row values of `volume`, ordered like [`TABLE_COLUMNS`]
pub fn table_row(volume: &VolumeInfo) -> Vec<String> {
    vec![
        volume.namespace.clone(),
        volume.persistent_volume.clone(),
        volume.volume_status.clone(),
        volume.volume_claim_name.clone(),
        volume.driver.clone(),
        volume.created_time.clone(),
        volume.provisioned_size.clone(),
        volume.storage_class.clone(),
        volume.storage_system_volume_name.clone(),
        volume.storage_pool_name.clone(),
        volume.storage_system.clone(),
        volume.protocol.clone(),
    ]
}

/// Build the table for `volumes`; the column list is fixed even when empty
pub fn project_table<'a, I>(volumes: I) -> TableResponse
where
    I: IntoIterator<Item = &'a VolumeInfo>,
{
    TableResponse {
        response_type: RESPONSE_TYPE_TABLE.to_string(),
        columns: TABLE_COLUMNS
            .iter()
            .map(|text| TableColumn {
                text: text.to_string(),
                column_type: COLUMN_TYPE_STRING.to_string(),
            })
            .collect(),
        rows: volumes.into_iter().map(table_row).collect(),
    }
}

/// Distinct values of the display field `field_name` across `volumes`
///
/// Values keep first-seen order. Unsupported field names yield nothing.
pub fn project_distinct<'a, I>(volumes: I, field_name: &str) -> Vec<String>
where
    I: IntoIterator<Item = &'a VolumeInfo>,
{
    let Some(field) = FilterField::from_name(field_name) else {
        return Vec::new();
    };

    volumes
        .into_iter()
        .map(|volume| field.value(volume).to_string())
        .collect::<IndexSet<_>>()
        .into_iter()
        .collect()
}
