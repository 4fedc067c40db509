//! The persistence collaborator of the iteration controller.
//!
//! [`LabelingBackend`] is what a session view needs from the server: load
//! records, save the session, and the combined "save and ask the oracle"
//! round trip. [`LocalBackend`] implements it over the SQLite store and any
//! [`Oracle`].

use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;

use crate::db::Database;
use crate::models::{Dataset, Session, Setup};
use crate::ocal::{OcalReply, OcalRequest, Oracle};
use crate::setup::SetupDraft;
use crate::{log_info, log_warn};

const ENABLE_LOGS: bool = true;

#[async_trait]
pub trait LabelingBackend: Send + Sync {
    async fn fetch_session(&self, session_id: i64) -> Result<Session>;

    async fn fetch_setup(&self, setup_id: i64) -> Result<Setup>;

    async fn fetch_dataset(&self, dataset_id: i64) -> Result<Dataset>;

    async fn update_session(&self, session: &Session) -> Result<()>;

    /// Oracle answer for the stored state of a session.
    async fn fetch_session_ocal(&self, session_id: i64) -> Result<OcalReply>;

    /// Saves `session`, then asks the oracle about the saved state.
    async fn alter_session_with_ocal(&self, session: &Session) -> Result<OcalReply>;
}

pub struct LocalBackend<O> {
    db: Database,
    oracle: O,
}

impl<O: Oracle> LocalBackend<O> {
    pub fn new(db: Database, oracle: O) -> Self {
        Self { db, oracle }
    }

    pub fn database(&self) -> &Database {
        &self.db
    }

    /// Validates a setup form against its dataset and stores the result.
    pub async fn create_setup(&self, draft: &SetupDraft, now: i64) -> Result<i64> {
        let dataset_id = draft
            .dataset
            .ok_or_else(|| anyhow!("setup draft has no dataset"))?;
        let dataset = self.fetch_dataset(dataset_id).await?;
        let setup = draft.build(&dataset, now)?;
        let id = self.db.insert_setup(&setup).await?;
        log_info!("Created setup {} ({}) on dataset {}", id, setup.name, dataset_id);
        Ok(id)
    }

    /// A fresh session for `user` over every point of the setup's dataset.
    pub async fn start_session(&self, setup_id: i64, user: Option<i64>) -> Result<i64> {
        let setup = self.fetch_setup(setup_id).await?;
        if !setup.finished_creation {
            return Err(anyhow!("setup {setup_id} is still being created"));
        }
        let dataset = self.fetch_dataset(setup.dataset).await?;
        let session = Session::new(setup_id, user, dataset.point_count());
        self.db.insert_session(&session).await
    }

    /// Oracle answer for a setup with nothing labeled yet.
    pub async fn setup_preview_ocal(&self, setup_id: i64) -> Result<OcalReply> {
        let setup = self.fetch_setup(setup_id).await?;
        let dataset = self.fetch_dataset(setup.dataset).await?;
        Ok(self.oracle.query(&OcalRequest::for_setup(&setup, &dataset)).await)
    }

    async fn query_for(&self, session: &Session) -> Result<OcalReply> {
        let setup = self.fetch_setup(session.setup).await?;
        let dataset = self.fetch_dataset(setup.dataset).await?;
        let reply = self
            .oracle
            .query(&OcalRequest::for_session(&setup, &dataset, session))
            .await;

        match &reply.prediction_global {
            Some(prediction) => self
                .db
                .update_final_labels(session.id, prediction)
                .await
                .with_context(|| format!("failed to store final labels of session {}", session.id))?,
            None => log_warn!("OcalAPI returned no prediction for session {}", session.id),
        }
        Ok(reply)
    }
}

#[async_trait]
impl<O: Oracle> LabelingBackend for LocalBackend<O> {
    async fn fetch_session(&self, session_id: i64) -> Result<Session> {
        self.db
            .get_session(session_id)
            .await?
            .ok_or_else(|| anyhow!("session {session_id} not found"))
    }

    async fn fetch_setup(&self, setup_id: i64) -> Result<Setup> {
        self.db
            .get_setup(setup_id)
            .await?
            .ok_or_else(|| anyhow!("setup {setup_id} not found"))
    }

    async fn fetch_dataset(&self, dataset_id: i64) -> Result<Dataset> {
        self.db
            .get_dataset(dataset_id)
            .await?
            .ok_or_else(|| anyhow!("dataset {dataset_id} not found"))
    }

    async fn update_session(&self, session: &Session) -> Result<()> {
        self.db.update_session(session).await
    }

    async fn fetch_session_ocal(&self, session_id: i64) -> Result<OcalReply> {
        let session = self.fetch_session(session_id).await?;
        self.query_for(&session).await
    }

    async fn alter_session_with_ocal(&self, session: &Session) -> Result<OcalReply> {
        self.db.update_session(session).await?;
        self.query_for(session).await
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use super::*;
    use crate::db::test_support::temp_database;
    use crate::fixtures;
    use crate::models::{FeedbackMode, HistoryMode, Label};

    /// Replays a fixed reply and records every request.
    struct StubOracle {
        reply: OcalReply,
        requests: Mutex<Vec<OcalRequest>>,
    }

    impl StubOracle {
        fn new(reply: OcalReply) -> Self {
            Self {
                reply,
                requests: Mutex::new(Vec::new()),
            }
        }
    }

    #[async_trait]
    impl Oracle for StubOracle {
        async fn query(&self, request: &OcalRequest) -> OcalReply {
            self.requests.lock().unwrap().push(request.clone());
            self.reply.clone()
        }
    }

    fn good_reply() -> OcalReply {
        let output = fixtures::output();
        OcalReply {
            prediction_global: Some(output.prediction_global),
            prediction_subspaces: Some(output.prediction_subspaces),
            query_ids: Some(output.query_ids),
            score_subspace_grids: Some(output.score_subspace_grids),
            ..OcalReply::default()
        }
    }

    fn draft(dataset: i64) -> SetupDraft {
        SetupDraft {
            name: "labeling".into(),
            description: "round one".into(),
            c: Some(0.5),
            gamma: Some(1.0),
            rewindable: true,
            subspaces: "1,2".into(),
            grid_resolution: Some(4),
            iterations: Some(3),
            max_answer_time: Some(-1),
            dataset: Some(dataset),
            feedback_mode: Some(FeedbackMode::User),
            history_mode: Some(HistoryMode::NoHistory),
            query_strategy: Some("random".into()),
            classifier: Some("svdd".into()),
            finished_creation: true,
            ..SetupDraft::default()
        }
    }

    async fn backend(reply: OcalReply) -> (tempfile::TempDir, LocalBackend<StubOracle>, i64) {
        let (dir, db) = temp_database();
        let backend = LocalBackend::new(db, StubOracle::new(reply));
        let dataset_id = backend.database().insert_dataset(&fixtures::dataset()).await.unwrap();
        let setup_id = backend.create_setup(&draft(dataset_id), 1_000).await.unwrap();
        (dir, backend, setup_id)
    }

    #[tokio::test]
    async fn created_setup_has_grids_and_sessions_start_unlabeled() {
        let (_dir, backend, setup_id) = backend(good_reply()).await;
        let setup = backend.fetch_setup(setup_id).await.unwrap();
        assert_eq!(setup.subspace_grids[0].len(), 7 * 7);
        assert_eq!(setup.creation_time, 1_000);

        let session_id = backend.start_session(setup_id, Some(5)).await.unwrap();
        let session = backend.fetch_session(session_id).await.unwrap();
        assert_eq!(session.iteration, 0);
        assert_eq!(session.labels, vec![Label::Undefined; 4]);
    }

    #[tokio::test]
    async fn oracle_prediction_becomes_final_labels() {
        let (_dir, backend, setup_id) = backend(good_reply()).await;
        let session_id = backend.start_session(setup_id, None).await.unwrap();

        let mut session = backend.fetch_session(session_id).await.unwrap();
        session.iteration = 1;
        session.labels[0] = Label::Inlier;
        let reply = backend.alter_session_with_ocal(&session).await.unwrap();
        assert!(reply.failure().is_none());

        let stored = backend.fetch_session(session_id).await.unwrap();
        assert_eq!(stored.iteration, 1);
        assert_eq!(stored.final_labels[3], "outlier");

        let requests = backend.oracle.requests.lock().unwrap();
        assert_eq!(requests.len(), 1);
        assert_eq!(requests[0].labels[0], "Lin");
    }

    #[tokio::test]
    async fn failed_oracle_leaves_final_labels() {
        let (_dir, backend, setup_id) = backend(OcalReply::connection_failed()).await;
        let session_id = backend.start_session(setup_id, None).await.unwrap();

        let reply = backend.fetch_session_ocal(session_id).await.unwrap();
        assert_eq!(reply.failure().as_deref(), Some("Connection to API failed"));
        let stored = backend.fetch_session(session_id).await.unwrap();
        assert!(stored.final_labels.iter().all(|l| l == "NOT DEFINED"));
    }

    #[tokio::test]
    async fn missing_records_are_errors() {
        let (_dir, backend, _) = backend(good_reply()).await;
        assert!(backend.fetch_session(99).await.is_err());
        assert!(backend.fetch_setup(99).await.is_err());
        assert!(backend.start_session(99, None).await.is_err());
        assert!(backend.setup_preview_ocal(99).await.is_err());
    }

    #[tokio::test]
    async fn unfinished_setups_cannot_start_sessions() {
        let (_dir, backend, setup_id) = backend(good_reply()).await;
        let dataset_id = backend.fetch_setup(setup_id).await.unwrap().dataset;
        let mut unfinished = draft(dataset_id);
        unfinished.name = "draft".into();
        unfinished.finished_creation = false;
        let id = backend.create_setup(&unfinished, 0).await.unwrap();
        assert!(backend.start_session(id, None).await.is_err());
    }
}
