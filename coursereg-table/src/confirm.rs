use std::mem;

/// Confirmation gate for destructive row actions.
///
/// ```text
/// Idle --request(row)--> ConfirmPending(row) --take()/cancel()--> Idle
/// ```
///
/// A new request while one is pending replaces the pending row.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ConfirmState<T> {
    Idle,
    ConfirmPending(T),
}

impl<T> Default for ConfirmState<T> {
    fn default() -> Self {
        ConfirmState::Idle
    }
}

impl<T> ConfirmState<T> {
    pub fn request(&mut self, row: T) {
        *self = ConfirmState::ConfirmPending(row);
    }

    /// Leave the pending state, handing out the row that was confirmed.
    pub fn take(&mut self) -> Option<T> {
        match mem::take(self) {
            ConfirmState::ConfirmPending(row) => Some(row),
            ConfirmState::Idle => None,
        }
    }

    pub fn cancel(&mut self) {
        *self = ConfirmState::Idle;
    }

    pub fn pending(&self) -> Option<&T> {
        match self {
            ConfirmState::ConfirmPending(row) => Some(row),
            ConfirmState::Idle => None,
        }
    }

    pub fn is_pending(&self) -> bool {
        matches!(self, ConfirmState::ConfirmPending(_))
    }
}
