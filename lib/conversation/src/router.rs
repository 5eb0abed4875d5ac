//! Turn state machine.
//!
//! ```text
//! AwaitingModel --ModelResponded{tool calls}--> ExecutingTools
//! AwaitingModel --ModelResponded{no calls}----> Done
//! ExecutingTools --ToolsCompleted--> AwaitingModel        (round trips < cap)
//! ExecutingTools --ToolsCompleted--> LoopLimitExceeded    (round trips = cap)
//! ```
//!
//! A round trip is one model invocation. `Done` and `LoopLimitExceeded` are
//! terminal.

use crate::error::TransitionError;
use serde::{Deserialize, Serialize};

/// Default cap on model round trips per turn.
pub const DEFAULT_MAX_ITERATIONS: u32 = 25;

/// Where a turn currently is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TurnState {
    /// The model is about to be invoked.
    AwaitingModel,
    /// Requested tools are running.
    ExecutingTools,
    /// The model answered without tool calls.
    Done,
    /// The round-trip cap was reached.
    LoopLimitExceeded,
}

impl TurnState {
    /// Returns true if no further transitions are possible.
    #[must_use]
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Done | Self::LoopLimitExceeded)
    }
}

/// Something that happened during a turn.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TurnEvent {
    /// The model answered.
    ModelResponded { has_tool_calls: bool },
    /// Every requested tool finished.
    ToolsCompleted,
}

/// Drives one turn through its states and counts round trips.
#[derive(Debug, Clone)]
pub struct Router {
    state: TurnState,
    round_trips: u32,
    max_iterations: u32,
}

impl Router {
    /// Creates a router for a new turn.
    ///
    /// A cap of zero is treated as one; a turn always gets one model call.
    #[must_use]
    pub fn new(max_iterations: u32) -> Self {
        Self {
            state: TurnState::AwaitingModel,
            round_trips: 0,
            max_iterations: max_iterations.max(1),
        }
    }

    /// Returns the current state.
    #[must_use]
    pub fn state(&self) -> TurnState {
        self.state
    }

    /// Returns how many model round trips have happened.
    #[must_use]
    pub fn round_trips(&self) -> u32 {
        self.round_trips
    }

    /// Returns the round-trip cap.
    #[must_use]
    pub fn max_iterations(&self) -> u32 {
        self.max_iterations
    }

    /// Applies an event and returns the new state.
    ///
    /// # Errors
    ///
    /// Returns [`TransitionError`] if the current state does not accept the
    /// event. The state is left unchanged.
    pub fn apply(&mut self, event: TurnEvent) -> Result<TurnState, TransitionError> {
        let next = match (self.state, event) {
            (TurnState::AwaitingModel, TurnEvent::ModelResponded { has_tool_calls }) => {
                self.round_trips += 1;
                if has_tool_calls {
                    TurnState::ExecutingTools
                } else {
                    TurnState::Done
                }
            }
            (TurnState::ExecutingTools, TurnEvent::ToolsCompleted) => {
                if self.round_trips >= self.max_iterations {
                    TurnState::LoopLimitExceeded
                } else {
                    TurnState::AwaitingModel
                }
            }
            (from, event) => return Err(TransitionError { from, event }),
        };
        self.state = next;
        Ok(next)
    }

    /// Records a model response.
    ///
    /// # Errors
    ///
    /// Returns [`TransitionError`] unless the router was awaiting the model.
    pub fn model_responded(&mut self, has_tool_calls: bool) -> Result<TurnState, TransitionError> {
        self.apply(TurnEvent::ModelResponded { has_tool_calls })
    }

    /// Records that every requested tool finished.
    ///
    /// # Errors
    ///
    /// Returns [`TransitionError`] unless tools were executing.
    pub fn tools_completed(&mut self) -> Result<TurnState, TransitionError> {
        self.apply(TurnEvent::ToolsCompleted)
    }
}

impl Default for Router {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_ITERATIONS)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn plain_answer_finishes_turn() {
        let mut router = Router::default();
        assert_eq!(router.model_responded(false).unwrap(), TurnState::Done);
        assert_eq!(router.round_trips(), 1);
        assert!(router.state().is_terminal());
    }

    #[test]
    fn tool_round_trip_returns_to_model() {
        let mut router = Router::new(3);
        assert_eq!(router.model_responded(true).unwrap(), TurnState::ExecutingTools);
        assert_eq!(router.tools_completed().unwrap(), TurnState::AwaitingModel);
        assert_eq!(router.model_responded(false).unwrap(), TurnState::Done);
        assert_eq!(router.round_trips(), 2);
    }

    #[test]
    fn cap_is_reached_after_last_tool_batch() {
        let mut router = Router::new(2);
        router.model_responded(true).unwrap();
        router.tools_completed().unwrap();
        router.model_responded(true).unwrap();

        assert_eq!(router.tools_completed().unwrap(), TurnState::LoopLimitExceeded);
        assert_eq!(router.round_trips(), 2);
    }

    #[test]
    fn terminal_states_reject_events() {
        let mut router = Router::default();
        router.model_responded(false).unwrap();

        let err = router.model_responded(true).unwrap_err();
        assert_eq!(err.from, TurnState::Done);
        assert_eq!(router.state(), TurnState::Done);
    }

    #[test]
    fn tools_cannot_complete_before_model() {
        let mut router = Router::default();
        let err = router.tools_completed().unwrap_err();
        assert_eq!(err.event, TurnEvent::ToolsCompleted);
    }

    #[test]
    fn zero_cap_still_allows_one_call() {
        let router = Router::new(0);
        assert_eq!(router.max_iterations(), 1);
    }
}
