//! Production randomness sources.

use super::traits::{Delivery, RandomValue, RandomnessError, RandomnessRequest, RandomnessSource, RequestId};
use async_trait::async_trait;
use rand::RngCore;
use tracing::info;

/// Answers every request immediately from the thread RNG
#[derive(Clone, Copy, Debug, Default)]
pub struct LocalRandomness;

#[async_trait]
impl RandomnessSource for LocalRandomness {
    async fn request(&self, _request: RandomnessRequest) -> Result<Delivery, RandomnessError> {
        let mut bytes = [0u8; 32];
        rand::thread_rng()
            .try_fill_bytes(&mut bytes)
            .map_err(|e| RandomnessError::Unavailable(e.to_string()))?;
        Ok(Delivery::Ready(RandomValue::from_bytes(bytes)))
    }
}

/// Hands out request ids for an external service (a VRF coordinator, say)
/// that later posts the value back to the engine
#[derive(Clone, Copy, Debug, Default)]
pub struct ExternalRandomness;

#[async_trait]
impl RandomnessSource for ExternalRandomness {
    async fn request(&self, request: RandomnessRequest) -> Result<Delivery, RandomnessError> {
        let request_id = RequestId::new();
        info!(
            %request_id,
            game_id = %request.game_id,
            initiator = %request.initiator,
            "randomness requested from external source"
        );
        Ok(Delivery::Pending(request_id))
    }
}
