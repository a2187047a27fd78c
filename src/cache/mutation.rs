use std::future::Future;
use std::sync::Arc;

use super::{QueryClient, QueryKey, SharedError};
use crate::error::ApiResult;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MutationStatus {
    Idle,
    Pending,
    Success,
    Error,
}

/// A view's handle on one kind of state-changing request.
///
/// `run` takes `&mut self`, so a handler cannot be re-entered before the
/// previous outcome resolves. The last error stays available for display
/// until the next run or [`Mutation::reset`].
pub struct Mutation {
    client: QueryClient,
    invalidates: Vec<QueryKey>,
    status: MutationStatus,
    error: Option<SharedError>,
}

impl Mutation {
    pub fn new(client: QueryClient, invalidates: impl IntoIterator<Item = QueryKey>) -> Self {
        Self {
            client,
            invalidates: invalidates.into_iter().collect(),
            status: MutationStatus::Idle,
            error: None,
        }
    }

    pub fn status(&self) -> MutationStatus {
        self.status
    }

    pub fn is_pending(&self) -> bool {
        self.status == MutationStatus::Pending
    }

    pub fn error(&self) -> Option<&SharedError> {
        self.error.as_ref()
    }

    pub fn reset(&mut self) {
        self.status = MutationStatus::Idle;
        self.error = None;
    }

    pub async fn run<T, Fut>(&mut self, request: Fut) -> Result<T, SharedError>
    where
        Fut: Future<Output = ApiResult<T>>,
    {
        self.status = MutationStatus::Pending;
        self.error = None;
        match self.client.mutate(request, &self.invalidates).await {
            Ok(value) => {
                self.status = MutationStatus::Success;
                Ok(value)
            }
            Err(err) => {
                let err = Arc::new(err);
                self.status = MutationStatus::Error;
                self.error = Some(Arc::clone(&err));
                Err(err)
            }
        }
    }
}
