use serde::Deserialize;

/// Response of `values.update`.
#[derive(Deserialize, Debug)]
#[serde(rename_all = "camelCase")]
pub struct UpdateValuesResponse {
    pub spreadsheet_id: String,
    #[serde(default)]
    pub updated_range: Option<String>,
    #[serde(default)]
    pub updated_rows: Option<i64>,
}

/// Response of `values.clear`.
#[derive(Deserialize, Debug)]
#[serde(rename_all = "camelCase")]
pub struct ClearValuesResponse {
    pub spreadsheet_id: String,
    #[serde(default)]
    pub cleared_range: Option<String>,
}
