use std::cell::RefCell;
use std::future::Future;
use std::rc::Rc;

use serde::de::DeserializeOwned;
use serde_json::Value;

use coursereg_client::Error;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum QueryStatus {
    #[default]
    Idle,
    Loading,
    Success,
    Error,
}

/// The state of a list query as seen by render paths.
///
/// `data` holds the rows of the latest successful read. A failed re-fetch keeps them around
/// next to the error, so a screen can keep showing the list.
#[derive(Clone, Debug)]
pub struct QueryState<T> {
    pub status: QueryStatus,
    pub data: Option<Vec<T>>,
    pub error: Option<Error>,
}

impl<T> Default for QueryState<T> {
    fn default() -> Self {
        Self::idle()
    }
}

impl<T> QueryState<T> {
    pub fn idle() -> Self {
        Self {
            status: QueryStatus::Idle,
            data: None,
            error: None,
        }
    }

    /// Never fetched.
    pub fn is_idle(&self) -> bool {
        self.status == QueryStatus::Idle
    }

    pub fn is_loading(&self) -> bool {
        self.status == QueryStatus::Loading
    }

    pub fn is_success(&self) -> bool {
        self.status == QueryStatus::Success
    }

    pub fn is_error(&self) -> bool {
        self.status == QueryStatus::Error
    }

    /// The rows to display, empty if nothing was loaded yet.
    pub fn rows(&self) -> &[T] {
        self.data.as_deref().unwrap_or(&[])
    }

    /// The message of the last failure, if the latest applied response was one.
    pub fn error_message(&self) -> Option<String> {
        self.error.as_ref().map(Error::message)
    }
}

impl QueryState<Value> {
    /// Decode the cached rows into `T`.
    ///
    /// A row which does not decode turns the whole state into an error, keeping the status
    /// information otherwise.
    pub fn decode<T: DeserializeOwned>(&self) -> QueryState<T> {
        let data = match &self.data {
            None => None,
            Some(rows) => match rows
                .iter()
                .map(|row| T::deserialize(row))
                .collect::<Result<Vec<T>, _>>()
            {
                Ok(rows) => Some(rows),
                Err(err) => {
                    return QueryState {
                        status: QueryStatus::Error,
                        data: None,
                        error: Some(Error::bad_api("failed to decode cached rows", err)),
                    };
                }
            },
        };

        QueryState {
            status: self.status,
            data,
            error: self.error.clone(),
        }
    }
}

/// The outcome of a create, update, delete or custom action.
#[derive(Clone, Debug, Default)]
pub enum MutationState<R = Value> {
    #[default]
    Idle,
    Pending,
    Success(R),
    Error(Error),
}

impl<R> MutationState<R> {
    pub fn is_idle(&self) -> bool {
        matches!(self, MutationState::Idle)
    }

    pub fn is_pending(&self) -> bool {
        matches!(self, MutationState::Pending)
    }

    pub fn is_success(&self) -> bool {
        matches!(self, MutationState::Success(_))
    }

    pub fn is_error(&self) -> bool {
        matches!(self, MutationState::Error(_))
    }

    pub fn error(&self) -> Option<&Error> {
        match self {
            MutationState::Error(err) => Some(err),
            _ => None,
        }
    }

    /// The normalized message of a failed mutation.
    pub fn error_message(&self) -> Option<String> {
        self.error().map(Error::message)
    }

    pub fn into_result(self) -> Option<Result<R, Error>> {
        match self {
            MutationState::Success(value) => Some(Ok(value)),
            MutationState::Error(err) => Some(Err(err)),
            MutationState::Idle | MutationState::Pending => None,
        }
    }
}

/// Observable state of one user action, e.g. the submit button of an edit dialog.
///
/// Clones share the state, so a screen can hand one clone to the task running the mutation and
/// keep another one to disable its controls while [`is_pending`](Self::is_pending) holds.
#[derive(Clone, Debug, Default)]
pub struct Mutation {
    state: Rc<RefCell<MutationState>>,
}

impl Mutation {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> MutationState {
        self.state.borrow().clone()
    }

    pub fn is_pending(&self) -> bool {
        self.state.borrow().is_pending()
    }

    /// Back to idle, e.g. when the dialog owning this mutation is closed.
    pub fn reset(&self) {
        *self.state.borrow_mut() = MutationState::Idle;
    }

    /// Track `mutation` (one of the binding's mutation futures) until it resolves.
    pub async fn run<F>(&self, mutation: F) -> MutationState
    where
        F: Future<Output = MutationState>,
    {
        *self.state.borrow_mut() = MutationState::Pending;
        let outcome = mutation.await;
        *self.state.borrow_mut() = outcome.clone();
        outcome
    }
}
