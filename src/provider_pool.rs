//! Ordered pool of equivalent node endpoints with a round-robin cursor.

use crate::{SupervisorError, client::Endpoint};

/// Ordered endpoints plus the index of the one currently in use.
///
/// Invariant: `cursor < endpoints.len()` whenever the pool is non-empty.
#[derive(Debug, Clone, Default)]
pub struct ProviderPool {
    endpoints: Vec<Endpoint>,
    cursor: usize,
}

impl ProviderPool {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the pool and reset the cursor to the first endpoint.
    ///
    /// # Errors
    ///
    /// Returns [`SupervisorError::InvalidConfig`] if `endpoints` is empty. The previous pool is
    /// kept in that case.
    pub fn set_providers<I, E>(&mut self, endpoints: I) -> Result<(), SupervisorError>
    where
        I: IntoIterator<Item = E>,
        E: Into<Endpoint>,
    {
        let endpoints: Vec<Endpoint> = endpoints.into_iter().map(Into::into).collect();
        if endpoints.is_empty() {
            return Err(SupervisorError::InvalidConfig("provider list is empty"));
        }
        self.endpoints = endpoints;
        self.cursor = 0;
        Ok(())
    }

    /// The endpoint at the cursor.
    ///
    /// # Errors
    ///
    /// Returns [`SupervisorError::NotConfigured`] if the pool is empty.
    pub fn current(&self) -> Result<&Endpoint, SupervisorError> {
        self.endpoints.get(self.cursor).ok_or(SupervisorError::NotConfigured)
    }

    /// Advance the cursor, wrapping to the first endpoint, and return the new current endpoint.
    pub fn rotate(&mut self) -> Option<&Endpoint> {
        if self.endpoints.is_empty() {
            return None;
        }
        self.cursor = (self.cursor + 1) % self.endpoints.len();
        self.endpoints.get(self.cursor)
    }

    #[must_use]
    pub fn cursor(&self) -> usize {
        self.cursor
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.endpoints.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.endpoints.is_empty()
    }

    #[must_use]
    pub fn endpoints(&self) -> &[Endpoint] {
        &self.endpoints
    }
}
