use anyhow::{bail, Context, Result};
use rusqlite::{params, OptionalExtension, Row};

use crate::db::{
    helpers::{assigned_id, from_json, to_json},
    Database,
};
use crate::models::{Session, SessionOverview};

const SESSION_COLUMNS: &str = "id, setup_id, user_id, iteration, in_progress, finished, pauses,
     rewinds, labels, final_labels, history, heatmaps, userlabel_matches_api";

fn row_to_session(row: &Row) -> Result<Session> {
    let labels: String = row.get("labels")?;
    let final_labels: String = row.get("final_labels")?;
    let history: String = row.get("history")?;
    let heatmaps: String = row.get("heatmaps")?;
    let matches: String = row.get("userlabel_matches_api")?;

    Ok(Session {
        id: row.get("id")?,
        setup: row.get("setup_id")?,
        user: row.get("user_id")?,
        iteration: row.get("iteration")?,
        in_progress: row.get("in_progress")?,
        finished: row.get("finished")?,
        pauses: row.get("pauses")?,
        rewinds: row.get("rewinds")?,
        labels: from_json(&labels, "labels")?,
        final_labels: from_json(&final_labels, "final_labels")?,
        history: from_json(&history, "history")?,
        heatmaps: from_json(&heatmaps, "heatmaps")?,
        userlabel_matches_api: from_json(&matches, "userlabel_matches_api")?,
    })
}

impl Database {
    pub async fn insert_session(&self, session: &Session) -> Result<i64> {
        let record = session.clone();
        self.execute(move |conn| {
            conn.execute(
                "INSERT INTO sessions (id, setup_id, user_id, iteration, in_progress, finished,
                     pauses, rewinds, labels, final_labels, history, heatmaps, userlabel_matches_api)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13)",
                params![
                    assigned_id(record.id),
                    record.setup,
                    record.user,
                    record.iteration,
                    record.in_progress,
                    record.finished,
                    record.pauses,
                    record.rewinds,
                    to_json(&record.labels, "labels")?,
                    to_json(&record.final_labels, "final_labels")?,
                    to_json(&record.history, "history")?,
                    to_json(&record.heatmaps, "heatmaps")?,
                    to_json(&record.userlabel_matches_api, "userlabel_matches_api")?,
                ],
            )
            .with_context(|| format!("failed to insert session for setup {}", record.setup))?;
            Ok(conn.last_insert_rowid())
        })
        .await
    }

    pub async fn get_session(&self, session_id: i64) -> Result<Option<Session>> {
        self.execute(move |conn| {
            let mut stmt = conn.prepare(&format!(
                "SELECT {SESSION_COLUMNS} FROM sessions WHERE id = ?1"
            ))?;
            let session = stmt
                .query_row(params![session_id], |row| Ok(row_to_session(row)))
                .optional()?
                .transpose()?;
            Ok(session)
        })
        .await
    }

    /// Overwrites every mutable field of a stored session.
    ///
    /// A finished session is terminal; updating it again fails.
    pub async fn update_session(&self, session: &Session) -> Result<()> {
        let record = session.clone();
        self.execute(move |conn| {
            let finished: Option<bool> = conn
                .query_row(
                    "SELECT finished FROM sessions WHERE id = ?1",
                    params![record.id],
                    |row| row.get(0),
                )
                .optional()?;
            match finished {
                None => bail!("session {} not found", record.id),
                Some(true) => bail!("session {} is already finished", record.id),
                Some(false) => {}
            }

            conn.execute(
                "UPDATE sessions
                 SET iteration = ?1,
                     in_progress = ?2,
                     finished = ?3,
                     pauses = ?4,
                     rewinds = ?5,
                     labels = ?6,
                     final_labels = ?7,
                     history = ?8,
                     heatmaps = ?9,
                     userlabel_matches_api = ?10
                 WHERE id = ?11",
                params![
                    record.iteration,
                    record.in_progress,
                    record.finished,
                    record.pauses,
                    record.rewinds,
                    to_json(&record.labels, "labels")?,
                    to_json(&record.final_labels, "final_labels")?,
                    to_json(&record.history, "history")?,
                    to_json(&record.heatmaps, "heatmaps")?,
                    to_json(&record.userlabel_matches_api, "userlabel_matches_api")?,
                    record.id,
                ],
            )
            .with_context(|| format!("failed to update session {}", record.id))?;
            Ok(())
        })
        .await
    }

    /// Replaces only the oracle-facing final labels.
    pub async fn update_final_labels(&self, session_id: i64, final_labels: &[String]) -> Result<()> {
        let encoded = to_json(final_labels, "final_labels")?;
        self.execute(move |conn| {
            conn.execute(
                "UPDATE sessions SET final_labels = ?1 WHERE id = ?2",
                params![encoded, session_id],
            )?;
            Ok(())
        })
        .await
    }

    pub async fn list_sessions_for_setup(&self, setup_id: i64) -> Result<Vec<Session>> {
        self.execute(move |conn| {
            let mut stmt = conn.prepare(&format!(
                "SELECT {SESSION_COLUMNS} FROM sessions WHERE setup_id = ?1 ORDER BY id ASC"
            ))?;

            let mut rows = stmt.query(params![setup_id])?;
            let mut sessions = Vec::new();
            while let Some(row) = rows.next()? {
                sessions.push(row_to_session(row)?);
            }

            Ok(sessions)
        })
        .await
    }

    /// Counters only, without the large arrays.
    pub async fn list_session_overviews(&self, setup_id: i64) -> Result<Vec<SessionOverview>> {
        self.execute(move |conn| {
            let mut stmt = conn.prepare(
                "SELECT iteration, in_progress, finished FROM sessions
                 WHERE setup_id = ?1 ORDER BY id ASC",
            )?;

            let mut rows = stmt.query(params![setup_id])?;
            let mut overviews = Vec::new();
            while let Some(row) = rows.next()? {
                overviews.push(SessionOverview {
                    iteration: Some(row.get(0)?),
                    in_progress: Some(row.get(1)?),
                    finished: Some(row.get(2)?),
                });
            }

            Ok(overviews)
        })
        .await
    }
}

#[cfg(test)]
mod tests {
    use crate::calc::calc_average_time_session;
    use crate::db::test_support::temp_database;
    use crate::db::Database;
    use crate::fixtures;
    use crate::models::{Label, Session};

    async fn seed(db: &Database) -> i64 {
        let dataset_id = db.insert_dataset(&fixtures::dataset()).await.unwrap();
        let mut setup = fixtures::setup();
        setup.id = 0;
        setup.dataset = dataset_id;
        db.insert_setup(&setup).await.unwrap()
    }

    fn new_session(setup_id: i64) -> Session {
        Session::new(setup_id, Some(7), 4)
    }

    #[tokio::test]
    async fn session_updates_round_trip() {
        let (_dir, db) = temp_database();
        let setup_id = seed(&db).await;
        let id = db.insert_session(&new_session(setup_id)).await.unwrap();

        let mut session = db.get_session(id).await.unwrap().unwrap();
        assert_eq!(session.labels, vec![Label::Undefined; 4]);
        session.iteration = 2;
        session.in_progress = 42;
        session.labels[2] = Label::Outlier;
        session.history.push(vec![2]);
        session.heatmaps.push(vec!["{}".into()]);
        session.userlabel_matches_api.push(vec![false]);
        db.update_session(&session).await.unwrap();

        let stored = db.get_session(id).await.unwrap().unwrap();
        assert_eq!(stored, session);
        assert!(stored.records_consistent());
    }

    #[tokio::test]
    async fn finished_sessions_are_frozen() {
        let (_dir, db) = temp_database();
        let setup_id = seed(&db).await;
        let id = db.insert_session(&new_session(setup_id)).await.unwrap();

        let mut session = db.get_session(id).await.unwrap().unwrap();
        session.finished = true;
        db.update_session(&session).await.unwrap();

        session.iteration += 1;
        assert!(db.update_session(&session).await.is_err());

        let mut ghost = session.clone();
        ghost.id = id + 100;
        assert!(db.update_session(&ghost).await.is_err());
    }

    #[tokio::test]
    async fn overviews_feed_average_time() {
        let (_dir, db) = temp_database();
        let setup_id = seed(&db).await;
        for (in_progress, finished) in [(100, true), (300, true), (50, false)] {
            let mut session = new_session(setup_id);
            session.in_progress = in_progress;
            session.finished = finished;
            db.insert_session(&session).await.unwrap();
        }

        let overviews = db.list_session_overviews(setup_id).await.unwrap();
        assert_eq!(overviews.len(), 3);
        assert_eq!(calc_average_time_session(Some(overviews.as_slice())), 200);
        assert_eq!(db.list_sessions_for_setup(setup_id).await.unwrap().len(), 3);

        db.update_final_labels(1, &vec!["outlier".to_string(); 4]).await.unwrap();
        let first = db.get_session(1).await.unwrap().unwrap();
        assert_eq!(first.final_labels[0], "outlier");
    }
}
