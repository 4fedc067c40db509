use anyhow::{Context, Result};
use rusqlite::{params, OptionalExtension, Row};

use crate::db::{
    helpers::{assigned_id, from_json, parse_mode, to_json},
    Database,
};
use crate::models::Setup;

const SETUP_COLUMNS: &str = "id, name, description, params, raw_data, rewindable, subspaces,
     subspace_grids, subspace_grids_normalized, max_answer_time, creation_time,
     finished_creation, creator, iterations, query_strategy, history_mode, feedback_mode,
     dataset_id, classifier";

fn row_to_setup(row: &Row) -> Result<Setup> {
    let params: String = row.get("params")?;
    let subspaces: String = row.get("subspaces")?;
    let grids: String = row.get("subspace_grids")?;
    let grids_normalized: String = row.get("subspace_grids_normalized")?;
    let history_mode: String = row.get("history_mode")?;
    let feedback_mode: String = row.get("feedback_mode")?;

    Ok(Setup {
        id: row.get("id")?,
        name: row.get("name")?,
        description: row.get("description")?,
        params: from_json(&params, "params")?,
        raw_data: row.get("raw_data")?,
        rewindable: row.get("rewindable")?,
        subspaces: from_json(&subspaces, "subspaces")?,
        subspace_grids: from_json(&grids, "subspace_grids")?,
        subspace_grids_normalized: from_json(&grids_normalized, "subspace_grids_normalized")?,
        max_answer_time: row.get("max_answer_time")?,
        creation_time: row.get("creation_time")?,
        finished_creation: row.get("finished_creation")?,
        creator: row.get("creator")?,
        iterations: row.get("iterations")?,
        query_strategy: row.get("query_strategy")?,
        history_mode: parse_mode(&history_mode, "history_mode")?,
        feedback_mode: parse_mode(&feedback_mode, "feedback_mode")?,
        dataset: row.get("dataset_id")?,
        classifier: row.get("classifier")?,
    })
}

impl Database {
    /// Stores a setup and returns its id. Setup names are unique.
    pub async fn insert_setup(&self, setup: &Setup) -> Result<i64> {
        let record = setup.clone();
        self.execute(move |conn| {
            conn.execute(
                "INSERT INTO setups (id, name, description, params, raw_data, rewindable, subspaces,
                     subspace_grids, subspace_grids_normalized, max_answer_time, creation_time,
                     finished_creation, creator, iterations, query_strategy, history_mode,
                     feedback_mode, dataset_id, classifier)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16, ?17, ?18, ?19)",
                params![
                    assigned_id(record.id),
                    record.name,
                    record.description,
                    to_json(&record.params, "params")?,
                    record.raw_data,
                    record.rewindable,
                    to_json(&record.subspaces, "subspaces")?,
                    to_json(&record.subspace_grids, "subspace_grids")?,
                    to_json(&record.subspace_grids_normalized, "subspace_grids_normalized")?,
                    record.max_answer_time,
                    record.creation_time,
                    record.finished_creation,
                    record.creator,
                    record.iterations,
                    record.query_strategy,
                    record.history_mode.as_str(),
                    record.feedback_mode.as_str(),
                    record.dataset,
                    record.classifier,
                ],
            )
            .with_context(|| format!("failed to insert setup {}", record.name))?;
            Ok(conn.last_insert_rowid())
        })
        .await
    }

    pub async fn get_setup(&self, setup_id: i64) -> Result<Option<Setup>> {
        self.execute(move |conn| {
            let mut stmt =
                conn.prepare(&format!("SELECT {SETUP_COLUMNS} FROM setups WHERE id = ?1"))?;
            let setup = stmt
                .query_row(params![setup_id], |row| Ok(row_to_setup(row)))
                .optional()?
                .transpose()?;
            Ok(setup)
        })
        .await
    }

    /// Setups ordered newest first.
    pub async fn list_setups(&self) -> Result<Vec<Setup>> {
        self.execute(|conn| {
            let mut stmt = conn.prepare(&format!(
                "SELECT {SETUP_COLUMNS} FROM setups ORDER BY creation_time DESC, id DESC"
            ))?;

            let mut rows = stmt.query([])?;
            let mut setups = Vec::new();
            while let Some(row) = rows.next()? {
                setups.push(row_to_setup(row)?);
            }

            Ok(setups)
        })
        .await
    }

    /// Marks a draft setup as finished; sessions may only start afterwards.
    pub async fn finish_setup_creation(&self, setup_id: i64) -> Result<()> {
        self.execute(move |conn| {
            let changed = conn.execute(
                "UPDATE setups SET finished_creation = 1 WHERE id = ?1",
                params![setup_id],
            )?;
            if changed == 0 {
                anyhow::bail!("setup {setup_id} not found");
            }
            Ok(())
        })
        .await
    }
}

#[cfg(test)]
mod tests {
    use crate::db::test_support::temp_database;
    use crate::fixtures;
    use crate::models::FeedbackMode;

    #[tokio::test]
    async fn setup_round_trip() {
        let (_dir, db) = temp_database();
        let dataset_id = db.insert_dataset(&fixtures::dataset()).await.unwrap();
        let mut setup = fixtures::setup();
        setup.id = 0;
        setup.dataset = dataset_id;
        setup.finished_creation = false;

        let id = db.insert_setup(&setup).await.unwrap();
        let stored = db.get_setup(id).await.unwrap().unwrap();
        assert_eq!(stored.subspaces, setup.subspaces);
        assert_eq!(stored.subspace_grids_normalized, setup.subspace_grids_normalized);
        assert_eq!(stored.params, setup.params);
        assert_eq!(stored.feedback_mode, FeedbackMode::Hybrid);
        assert!(stored.rewindable);
        assert!(!stored.finished_creation);

        db.finish_setup_creation(id).await.unwrap();
        assert!(db.get_setup(id).await.unwrap().unwrap().finished_creation);
        assert!(db.finish_setup_creation(id + 10).await.is_err());
    }

    #[tokio::test]
    async fn setup_names_are_unique_and_listed_newest_first() {
        let (_dir, db) = temp_database();
        let dataset_id = db.insert_dataset(&fixtures::dataset()).await.unwrap();
        let mut first = fixtures::setup();
        first.id = 0;
        first.dataset = dataset_id;
        first.creation_time = 100;
        db.insert_setup(&first).await.unwrap();
        assert!(db.insert_setup(&first).await.is_err());

        let mut second = first.clone();
        second.name = "later".into();
        second.creation_time = 200;
        db.insert_setup(&second).await.unwrap();

        let names: Vec<String> = db
            .list_setups()
            .await
            .unwrap()
            .into_iter()
            .map(|s| s.name)
            .collect();
        assert_eq!(names, vec!["later".to_string(), "toy setup".to_string()]);
    }
}
