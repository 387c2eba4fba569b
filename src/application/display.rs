use serde::Serialize;
use thiserror::Error;

#[derive(Error, Debug, PartialEq, Eq)]
pub enum DisplayError {
    #[error("Display state already resolved")]
    AlreadyResolved,
}

/// Result view state: `Loading` until a single resolution to `Success` or
/// `Error`, both of which are final.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum DisplayState<T, E> {
    Loading,
    Success { view: T },
    Error { reason: E },
}

impl<T, E> Default for DisplayState<T, E> {
    fn default() -> Self {
        DisplayState::Loading
    }
}

impl<T, E> DisplayState<T, E> {
    pub fn is_terminal(&self) -> bool {
        !matches!(self, DisplayState::Loading)
    }

    pub fn succeed(&mut self, view: T) -> Result<(), DisplayError> {
        self.settle(Ok(view))
    }

    pub fn fail(&mut self, reason: E) -> Result<(), DisplayError> {
        self.settle(Err(reason))
    }

    pub fn settle(&mut self, outcome: Result<T, E>) -> Result<(), DisplayError> {
        if self.is_terminal() {
            return Err(DisplayError::AlreadyResolved);
        }

        *self = match outcome {
            Ok(view) => DisplayState::Success { view },
            Err(reason) => DisplayState::Error { reason },
        };
        Ok(())
    }

    pub fn view(&self) -> Option<&T> {
        match self {
            DisplayState::Success { view } => Some(view),
            _ => None,
        }
    }

    pub fn reason(&self) -> Option<&E> {
        match self {
            DisplayState::Error { reason } => Some(reason),
            _ => None,
        }
    }
}
