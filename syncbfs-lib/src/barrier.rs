use parking_lot::{Condvar, Mutex};
use tracing::trace;

use crate::error::Error;

/// Outcome of an arrival at the [`RoundBarrier`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Arrival {
    /// The barrier moved on to the given phase.
    Advanced(u64),
    /// The barrier was force-terminated, nobody waits anymore.
    Terminated,
}

#[derive(Debug)]
struct State {
    registered: usize,
    arrived: usize,
    phase: u64,
    terminated: bool,
}

/// Reusable phase barrier with permanent deregistration and forced
/// termination. Only counts parties, it never knows who they are.
#[derive(Debug)]
pub struct RoundBarrier {
    state: Mutex<State>,
    advanced: Condvar,
}

impl RoundBarrier {
    pub fn new(parties: usize) -> Self {
        Self {
            state: Mutex::new(State {
                registered: parties,
                arrived: 0,
                phase: 0,
                terminated: false,
            }),
            advanced: Condvar::new(),
        }
    }

    /// Arrives and blocks until every registered party has arrived for the
    /// current phase, or until the barrier is terminated.
    pub fn arrive_and_await_advance(&self) -> Result<Arrival, Error> {
        let mut state = self.state.lock();

        if state.terminated {
            return Ok(Arrival::Terminated);
        }

        Self::arrive(&mut state)?;

        if state.arrived == state.registered {
            return Ok(Arrival::Advanced(self.advance(&mut state)));
        }

        let phase = state.phase;
        while state.phase == phase && !state.terminated {
            self.advanced.wait(&mut state);
        }

        // An advance that happened before termination still counts.
        if state.phase != phase {
            Ok(Arrival::Advanced(phase + 1))
        } else {
            Ok(Arrival::Terminated)
        }
    }

    /// Arrives for the current phase and leaves the barrier for good, without
    /// waiting. Later phases need one party fewer.
    pub fn arrive_and_deregister(&self) -> Result<Arrival, Error> {
        let mut state = self.state.lock();

        if state.terminated {
            return Ok(Arrival::Terminated);
        }

        Self::arrive(&mut state)?;
        state.arrived -= 1;
        state.registered -= 1;

        if state.registered == 0 {
            trace!(phase = state.phase, "last party left the barrier");
            state.terminated = true;
            self.advanced.notify_all();
            return Ok(Arrival::Terminated);
        }

        if state.arrived == state.registered {
            return Ok(Arrival::Advanced(self.advance(&mut state)));
        }

        Ok(Arrival::Advanced(state.phase))
    }

    /// Irrevocably terminates the barrier and releases every blocked party.
    pub fn force_termination(&self) {
        let mut state = self.state.lock();

        if !state.terminated {
            trace!(phase = state.phase, "barrier force-terminated");
            state.terminated = true;
            self.advanced.notify_all();
        }
    }

    pub fn is_terminated(&self) -> bool {
        self.state.lock().terminated
    }

    pub fn phase(&self) -> u64 {
        self.state.lock().phase
    }

    pub fn registered(&self) -> usize {
        self.state.lock().registered
    }

    fn arrive(state: &mut State) -> Result<(), Error> {
        if state.arrived >= state.registered {
            return Err(Error::Barrier(format!(
                "arrival {} in phase {} exceeds {} registered parties",
                state.arrived + 1,
                state.phase,
                state.registered
            )));
        }

        state.arrived += 1;
        Ok(())
    }

    fn advance(&self, state: &mut State) -> u64 {
        state.arrived = 0;
        state.phase += 1;
        trace!(phase = state.phase, registered = state.registered, "barrier advanced");
        self.advanced.notify_all();

        state.phase
    }
}
