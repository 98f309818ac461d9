//! One-shot executor state with a stale-response guard.
//!
//! Every invocation takes a [`Ticket`]. Resetting the executor bumps its
//! generation, so a response that lands after a reset carries an old ticket
//! and is dropped instead of overwriting the fresh `Idle` state.

use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExecutorState<T> {
    Idle,
    Running,
    Success(T),
    Error(String),
}

impl<T> ExecutorState<T> {
    pub fn is_terminal(&self) -> bool {
        matches!(self, ExecutorState::Success(_) | ExecutorState::Error(_))
    }

    pub fn label(&self) -> &'static str {
        match self {
            ExecutorState::Idle => "idle",
            ExecutorState::Running => "running",
            ExecutorState::Success(_) => "success",
            ExecutorState::Error(_) => "error",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Ticket(u64);

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ExecutorError {
    #[error("action is already running")]
    AlreadyRunning,
    #[error("response belongs to an abandoned invocation")]
    Stale,
}

impl ExecutorError {
    pub fn kind(&self) -> &str {
        match *self {
            ExecutorError::AlreadyRunning => "AlreadyRunning",
            ExecutorError::Stale => "Stale",
        }
    }
}

#[derive(Debug)]
pub struct Executor<T> {
    state: ExecutorState<T>,
    generation: u64,
}

impl<T> Default for Executor<T> {
    fn default() -> Self {
        Self {
            state: ExecutorState::Idle,
            generation: 0,
        }
    }
}

impl<T> Executor<T> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> &ExecutorState<T> {
        &self.state
    }

    /// Enter `Running`. Allowed from `Idle` and from either terminal state so
    /// a failed action can be re-invoked deliberately.
    pub fn start(&mut self) -> Result<Ticket, ExecutorError> {
        if self.is_running() {
            return Err(ExecutorError::AlreadyRunning);
        }
        self.generation += 1;
        self.state = ExecutorState::Running;
        Ok(Ticket(self.generation))
    }

    pub fn is_running(&self) -> bool {
        matches!(self.state, ExecutorState::Running)
    }

    pub fn finish(
        &mut self,
        ticket: Ticket,
        outcome: Result<T, String>,
    ) -> Result<(), ExecutorError> {
        if ticket.0 != self.generation || !self.is_running() {
            return Err(ExecutorError::Stale);
        }
        self.state = match outcome {
            Ok(value) => ExecutorState::Success(value),
            Err(message) => ExecutorState::Error(message),
        };
        Ok(())
    }

    /// Abandon whatever is in flight.
    pub fn reset(&mut self) {
        self.generation += 1;
        self.state = ExecutorState::Idle;
    }

    pub fn is_current(&self, ticket: Ticket) -> bool {
        ticket.0 == self.generation
    }
}
