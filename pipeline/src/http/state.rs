//! Shared state for the stub service handlers.

use crate::remote::LocalServices;

/// State passed to every stub handler.
#[derive(Clone, Default)]
pub struct StubState {
    /// Scripted backend answering all three contracts
    pub services: LocalServices,
}

impl StubState {
    pub fn new(services: LocalServices) -> Self {
        Self { services }
    }
}
