//! Scripted randomness source for testing.

use super::traits::{Delivery, RandomValue, RandomnessError, RandomnessRequest, RandomnessSource, RequestId};
use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::sync::Arc;

/// One scripted answer
#[derive(Clone, Copy, Debug)]
pub enum Scripted {
    /// Deliver this value immediately
    Value(RandomValue),
    /// Return a pending request id
    Defer,
    /// Fail the request
    Fail,
}

#[derive(Default)]
struct MockRandomnessState {
    script: VecDeque<Scripted>,
    requests: Vec<RandomnessRequest>,
    deferred: Vec<RequestId>,
}

/// Randomness source that replays a script.
///
/// Once the script runs out every request fails, so a test never settles on
/// a value it did not choose.
#[derive(Clone, Default)]
pub struct MockRandomness {
    state: Arc<Mutex<MockRandomnessState>>,
}

impl MockRandomness {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue an immediate value that resolves to `mv`
    pub fn push_move(&self, mv: crate::games::Move) -> &Self {
        self.push(Scripted::Value(RandomValue::for_move(mv)))
    }

    pub fn push(&self, answer: Scripted) -> &Self {
        self.state.lock().script.push_back(answer);
        self
    }

    /// Requests received so far
    pub fn requests(&self) -> Vec<RandomnessRequest> {
        self.state.lock().requests.clone()
    }

    /// Ids handed out for deferred answers, oldest first
    pub fn deferred(&self) -> Vec<RequestId> {
        self.state.lock().deferred.clone()
    }
}

#[async_trait]
impl RandomnessSource for MockRandomness {
    async fn request(&self, request: RandomnessRequest) -> Result<Delivery, RandomnessError> {
        let mut state = self.state.lock();
        state.requests.push(request);

        match state.script.pop_front() {
            Some(Scripted::Value(value)) => Ok(Delivery::Ready(value)),
            Some(Scripted::Defer) => {
                let id = RequestId::new();
                state.deferred.push(id);
                Ok(Delivery::Pending(id))
            }
            Some(Scripted::Fail) => Err(RandomnessError::Unavailable("scripted failure".to_string())),
            None => Err(RandomnessError::Unavailable("script exhausted".to_string())),
        }
    }
}
