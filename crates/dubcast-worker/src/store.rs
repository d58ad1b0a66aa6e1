//! Persistence interfaces for transformations and team credits.
//!
//! The pipeline only needs a handful of row operations, so the database is
//! abstracted behind two small traits. [`InMemoryStore`] implements both and
//! backs the standalone binary and the tests.

use async_trait::async_trait;
use std::collections::{BTreeMap, HashMap};
use std::sync::{Mutex, MutexGuard};
use thiserror::Error;

use dubcast_models::{
    CreditBalance, InvalidTransition, NewTransformation, Transcript, Transformation,
    TransformationId, TransformationStatus,
};

pub type StoreResult<T> = Result<T, StoreError>;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Transformation {0} not found")]
    NotFound(TransformationId),

    #[error("Team {0} not found")]
    TeamNotFound(i64),

    #[error(transparent)]
    Transition(#[from] InvalidTransition),

    #[error("Store backend error: {0}")]
    Backend(String),
}

#[async_trait]
pub trait TransformationStore: Send + Sync {
    async fn create(&self, new: NewTransformation) -> StoreResult<Transformation>;

    async fn get(&self, id: TransformationId) -> StoreResult<Transformation>;

    async fn find_by_project_language(
        &self,
        project_id: i64,
        target_language: &str,
    ) -> StoreResult<Option<Transformation>>;

    /// Change status; illegal transitions (including any write to a
    /// terminal row) are rejected.
    async fn update_status(
        &self,
        id: TransformationId,
        status: TransformationStatus,
    ) -> StoreResult<Transformation>;

    async fn update_progress(&self, id: TransformationId, progress: f64)
        -> StoreResult<Transformation>;

    async fn update_transcript(
        &self,
        id: TransformationId,
        transcript: Transcript,
    ) -> StoreResult<Transformation>;
}

#[async_trait]
pub trait CreditStore: Send + Sync {
    async fn get_balance(&self, team_id: i64) -> StoreResult<CreditBalance>;

    async fn set_balance(&self, team_id: i64, remaining_credits: i64) -> StoreResult<()>;
}

#[derive(Debug, Default)]
struct Inner {
    next_id: i64,
    rows: BTreeMap<TransformationId, Transformation>,
    progress_history: HashMap<TransformationId, Vec<f64>>,
    credits: HashMap<i64, i64>,
}

/// Process-local store.
#[derive(Debug, Default)]
pub struct InMemoryStore {
    inner: Mutex<Inner>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed a team's credit balance.
    pub fn with_team(self, team_id: i64, remaining_credits: i64) -> Self {
        if let Ok(mut inner) = self.inner.lock() {
            inner.credits.insert(team_id, remaining_credits);
        }
        self
    }

    /// Every progress value written for a row, in order.
    pub fn progress_history(&self, id: TransformationId) -> Vec<f64> {
        self.lock()
            .map(|inner| inner.progress_history.get(&id).cloned().unwrap_or_default())
            .unwrap_or_default()
    }

    fn lock(&self) -> StoreResult<MutexGuard<'_, Inner>> {
        self.inner
            .lock()
            .map_err(|_| StoreError::Backend("store mutex poisoned".to_string()))
    }

    fn with_row<F>(&self, id: TransformationId, f: F) -> StoreResult<Transformation>
    where
        F: FnOnce(&mut Transformation, &mut Vec<f64>) -> StoreResult<()>,
    {
        let mut inner = self.lock()?;
        let Inner {
            rows,
            progress_history,
            ..
        } = &mut *inner;
        let row = rows.get_mut(&id).ok_or(StoreError::NotFound(id))?;
        f(row, progress_history.entry(id).or_default())?;
        Ok(row.clone())
    }
}

#[async_trait]
impl TransformationStore for InMemoryStore {
    async fn create(&self, new: NewTransformation) -> StoreResult<Transformation> {
        let mut inner = self.lock()?;
        inner.next_id += 1;
        let id = TransformationId(inner.next_id);
        let row = new.into_transformation(id);
        inner.rows.insert(id, row.clone());
        Ok(row)
    }

    async fn get(&self, id: TransformationId) -> StoreResult<Transformation> {
        self.lock()?
            .rows
            .get(&id)
            .cloned()
            .ok_or(StoreError::NotFound(id))
    }

    async fn find_by_project_language(
        &self,
        project_id: i64,
        target_language: &str,
    ) -> StoreResult<Option<Transformation>> {
        Ok(self
            .lock()?
            .rows
            .values()
            .find(|t| {
                t.project_id == project_id
                    && !t.is_source
                    && t.target_language.eq_ignore_ascii_case(target_language)
            })
            .cloned())
    }

    async fn update_status(
        &self,
        id: TransformationId,
        status: TransformationStatus,
    ) -> StoreResult<Transformation> {
        self.with_row(id, |row, _| Ok(row.transition(status)?))
    }

    async fn update_progress(
        &self,
        id: TransformationId,
        progress: f64,
    ) -> StoreResult<Transformation> {
        self.with_row(id, |row, history| {
            row.progress = progress.clamp(0.0, 100.0);
            history.push(row.progress);
            Ok(())
        })
    }

    async fn update_transcript(
        &self,
        id: TransformationId,
        transcript: Transcript,
    ) -> StoreResult<Transformation> {
        self.with_row(id, |row, _| {
            row.transcript = Some(transcript);
            Ok(())
        })
    }
}

#[async_trait]
impl CreditStore for InMemoryStore {
    async fn get_balance(&self, team_id: i64) -> StoreResult<CreditBalance> {
        self.lock()?
            .credits
            .get(&team_id)
            .map(|remaining| CreditBalance::new(team_id, *remaining))
            .ok_or(StoreError::TeamNotFound(team_id))
    }

    async fn set_balance(&self, team_id: i64, remaining_credits: i64) -> StoreResult<()> {
        let mut inner = self.lock()?;
        match inner.credits.get_mut(&team_id) {
            Some(balance) => {
                *balance = remaining_credits;
                Ok(())
            }
            None => Err(StoreError::TeamNotFound(team_id)),
        }
    }
}
