pub mod envelope;
pub mod error;

pub use envelope::{Fields, ResultEnvelope, ERROR_KEY, OK_KEY};
pub use error::{EnvelopeError, EnvelopeResult};
