//! Randomness for the automated opponent.
//!
//! The engine only consumes delivered values; where they come from is up to
//! the `RandomnessSource` it was built with.

mod mock;
mod sources;
mod traits;

pub use mock::{MockRandomness, Scripted};
pub use sources::{ExternalRandomness, LocalRandomness};
pub use traits::{Delivery, RandomValue, RandomnessError, RandomnessRequest, RandomnessSource, RequestId};
