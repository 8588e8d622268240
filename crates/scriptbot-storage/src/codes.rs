//! Script code generation.
//!
//! Codes double as deep-link payloads, so they are restricted to ASCII
//! letters and digits. Uniqueness is enforced by the store, not here.

use rand::distributions::Alphanumeric;
use rand::Rng;

use scriptbot_types::ScriptCode;

/// Source of candidate script codes.
pub trait CodeGenerator: Send + Sync {
    /// Produces one candidate code.
    fn generate(&self) -> ScriptCode;
}

/// Random `[A-Za-z0-9]{length}` codes from the thread-local RNG.
#[derive(Clone, Debug)]
pub struct RandomCodes {
    length: usize,
}

impl RandomCodes {
    /// Creates a generator producing codes of `length` characters.
    pub fn new(length: usize) -> Self {
        Self { length }
    }
}

impl CodeGenerator for RandomCodes {
    fn generate(&self) -> ScriptCode {
        let code: String = rand::thread_rng()
            .sample_iter(&Alphanumeric)
            .take(self.length)
            .map(char::from)
            .collect();
        ScriptCode::new(code)
    }
}
