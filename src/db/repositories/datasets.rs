use anyhow::{Context, Result};
use rusqlite::{params, OptionalExtension, Row};

use crate::db::{
    helpers::{assigned_id, from_json, to_json},
    Database,
};
use crate::models::Dataset;

const DATASET_COLUMNS: &str = "id, name, typename, description, titles, feature_values,
     values_normalized, raw_data, normalize_factor";

fn row_to_dataset(row: &Row) -> Result<Dataset> {
    let titles: String = row.get("titles")?;
    let values: String = row.get("feature_values")?;
    let values_normalized: String = row.get("values_normalized")?;
    let raw_data: String = row.get("raw_data")?;
    let normalize_factor: String = row.get("normalize_factor")?;

    Ok(Dataset {
        id: row.get("id")?,
        name: row.get("name")?,
        typename: row.get("typename")?,
        description: row.get("description")?,
        titles: from_json(&titles, "titles")?,
        values: from_json(&values, "feature_values")?,
        values_normalized: from_json(&values_normalized, "values_normalized")?,
        raw_data: from_json(&raw_data, "raw_data")?,
        normalize_factor: from_json(&normalize_factor, "normalize_factor")?,
    })
}

impl Database {
    /// Stores a dataset and returns its id. A zero id lets SQLite pick one.
    pub async fn insert_dataset(&self, dataset: &Dataset) -> Result<i64> {
        let record = dataset.clone();
        self.execute(move |conn| {
            conn.execute(
                "INSERT INTO datasets (id, name, typename, description, titles, feature_values,
                     values_normalized, raw_data, normalize_factor)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
                params![
                    assigned_id(record.id),
                    record.name,
                    record.typename,
                    record.description,
                    to_json(&record.titles, "titles")?,
                    to_json(&record.values, "feature_values")?,
                    to_json(&record.values_normalized, "values_normalized")?,
                    to_json(&record.raw_data, "raw_data")?,
                    to_json(&record.normalize_factor, "normalize_factor")?,
                ],
            )
            .with_context(|| format!("failed to insert dataset {}", record.name))?;
            Ok(conn.last_insert_rowid())
        })
        .await
    }

    pub async fn get_dataset(&self, dataset_id: i64) -> Result<Option<Dataset>> {
        self.execute(move |conn| {
            let mut stmt = conn.prepare(&format!(
                "SELECT {DATASET_COLUMNS} FROM datasets WHERE id = ?1"
            ))?;
            let dataset = stmt
                .query_row(params![dataset_id], |row| Ok(row_to_dataset(row)))
                .optional()?
                .transpose()?;
            Ok(dataset)
        })
        .await
    }
}
