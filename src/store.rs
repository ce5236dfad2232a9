//! Ticket and session persistence.
//!
//! [`TicketStore`] maps validated tickets to their [`AuthenticationResponse`];
//! [`SessionStore`] maps local session identifiers to tickets. Both must be
//! safe for concurrent use by every in-flight request. The in-memory
//! implementations guard a single map with a read/write lock; external
//! implementations must give read-after-write visibility per key.
//!
//! Stores enforce no expiry. A session whose ticket is gone is treated as
//! unauthenticated on its next lookup.
//!
//! # Example
//!
//! ```rust,ignore
//! impl TicketStore for RedisTickets {
//!     async fn read(&self, ticket: &str) -> Result<Option<Arc<AuthenticationResponse>>, StoreError> {
//!         let raw: Option<String> = self.conn().get(ticket).await?;
//!         Ok(raw.map(|r| serde_json::from_str(&r)).transpose()?.map(Arc::new))
//!     }
//!     // ...
//! }
//! ```

use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use parking_lot::RwLock;

use crate::response::AuthenticationResponse;

/// Error type returned by store implementations.
pub type StoreError = Box<dyn std::error::Error + Send + Sync>;

pub(crate) type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// Validated tickets and the identity each one established.
pub trait TicketStore: Send + Sync + 'static {
    /// Look up a ticket. `None` means the ticket is unknown or was revoked.
    fn read(
        &self,
        ticket: &str,
    ) -> impl Future<Output = Result<Option<Arc<AuthenticationResponse>>, StoreError>> + Send;

    /// Record a validated ticket.
    fn write(
        &self,
        ticket: &str,
        response: Arc<AuthenticationResponse>,
    ) -> impl Future<Output = Result<(), StoreError>> + Send;

    /// Revoke a ticket. Deleting an unknown ticket succeeds.
    fn delete(&self, ticket: &str) -> impl Future<Output = Result<(), StoreError>> + Send;

    /// Revoke every ticket.
    fn clear(&self) -> impl Future<Output = Result<(), StoreError>> + Send;
}

/// Local session identifiers and the ticket each is bound to.
pub trait SessionStore: Send + Sync + 'static {
    /// Ticket bound to `session_id`, if any.
    fn get(
        &self,
        session_id: &str,
    ) -> impl Future<Output = Result<Option<String>, StoreError>> + Send;

    /// Bind `session_id` to `ticket`, replacing any previous binding.
    fn set(
        &self,
        session_id: &str,
        ticket: &str,
    ) -> impl Future<Output = Result<(), StoreError>> + Send;

    /// Remove the binding for `session_id`. Removing an unknown session succeeds.
    fn delete(&self, session_id: &str) -> impl Future<Output = Result<(), StoreError>> + Send;

    /// Remove every binding.
    fn clear(&self) -> impl Future<Output = Result<(), StoreError>> + Send;
}

/// In-memory [`TicketStore`].
#[derive(Debug, Default)]
pub struct MemoryTicketStore {
    tickets: RwLock<HashMap<String, Arc<AuthenticationResponse>>>,
}

impl MemoryTicketStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

impl TicketStore for MemoryTicketStore {
    async fn read(&self, ticket: &str) -> Result<Option<Arc<AuthenticationResponse>>, StoreError> {
        Ok(self.tickets.read().get(ticket).cloned())
    }

    async fn write(
        &self,
        ticket: &str,
        response: Arc<AuthenticationResponse>,
    ) -> Result<(), StoreError> {
        self.tickets.write().insert(ticket.to_string(), response);
        Ok(())
    }

    async fn delete(&self, ticket: &str) -> Result<(), StoreError> {
        self.tickets.write().remove(ticket);
        Ok(())
    }

    async fn clear(&self) -> Result<(), StoreError> {
        self.tickets.write().clear();
        Ok(())
    }
}

/// In-memory [`SessionStore`].
#[derive(Debug, Default)]
pub struct MemorySessionStore {
    sessions: RwLock<HashMap<String, String>>,
}

impl MemorySessionStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

impl SessionStore for MemorySessionStore {
    async fn get(&self, session_id: &str) -> Result<Option<String>, StoreError> {
        Ok(self.sessions.read().get(session_id).cloned())
    }

    async fn set(&self, session_id: &str, ticket: &str) -> Result<(), StoreError> {
        self.sessions
            .write()
            .insert(session_id.to_string(), ticket.to_string());
        Ok(())
    }

    async fn delete(&self, session_id: &str) -> Result<(), StoreError> {
        self.sessions.write().remove(session_id);
        Ok(())
    }

    async fn clear(&self) -> Result<(), StoreError> {
        self.sessions.write().clear();
        Ok(())
    }
}

/// Object-safe wrapper for TicketStore (needed for Arc<dyn>).
pub(crate) trait TicketStoreDyn: Send + Sync {
    fn read_dyn<'a>(
        &'a self,
        ticket: &'a str,
    ) -> BoxFuture<'a, Result<Option<Arc<AuthenticationResponse>>, StoreError>>;

    fn write_dyn<'a>(
        &'a self,
        ticket: &'a str,
        response: Arc<AuthenticationResponse>,
    ) -> BoxFuture<'a, Result<(), StoreError>>;

    fn delete_dyn<'a>(&'a self, ticket: &'a str) -> BoxFuture<'a, Result<(), StoreError>>;
}

impl<T: TicketStore> TicketStoreDyn for T {
    fn read_dyn<'a>(
        &'a self,
        ticket: &'a str,
    ) -> BoxFuture<'a, Result<Option<Arc<AuthenticationResponse>>, StoreError>> {
        Box::pin(self.read(ticket))
    }

    fn write_dyn<'a>(
        &'a self,
        ticket: &'a str,
        response: Arc<AuthenticationResponse>,
    ) -> BoxFuture<'a, Result<(), StoreError>> {
        Box::pin(self.write(ticket, response))
    }

    fn delete_dyn<'a>(&'a self, ticket: &'a str) -> BoxFuture<'a, Result<(), StoreError>> {
        Box::pin(self.delete(ticket))
    }
}

/// Object-safe wrapper for SessionStore (needed for Arc<dyn>).
pub(crate) trait SessionStoreDyn: Send + Sync {
    fn get_dyn<'a>(&'a self, session_id: &'a str)
    -> BoxFuture<'a, Result<Option<String>, StoreError>>;

    fn set_dyn<'a>(
        &'a self,
        session_id: &'a str,
        ticket: &'a str,
    ) -> BoxFuture<'a, Result<(), StoreError>>;

    fn delete_dyn<'a>(&'a self, session_id: &'a str) -> BoxFuture<'a, Result<(), StoreError>>;
}

impl<T: SessionStore> SessionStoreDyn for T {
    fn get_dyn<'a>(
        &'a self,
        session_id: &'a str,
    ) -> BoxFuture<'a, Result<Option<String>, StoreError>> {
        Box::pin(self.get(session_id))
    }

    fn set_dyn<'a>(
        &'a self,
        session_id: &'a str,
        ticket: &'a str,
    ) -> BoxFuture<'a, Result<(), StoreError>> {
        Box::pin(self.set(session_id, ticket))
    }

    fn delete_dyn<'a>(&'a self, session_id: &'a str) -> BoxFuture<'a, Result<(), StoreError>> {
        Box::pin(self.delete(session_id))
    }
}
