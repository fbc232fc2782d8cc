use std::collections::{BTreeMap, BTreeSet, HashMap};

use tokio::sync::{Mutex, mpsc};
use tracing::debug;

use crate::cowsay;

/// Stable key of one connection, the peer address in practice.
pub type ConnectionKey = String;

/// Name a connection logs in as, drawn from the directory catalog.
pub type Identity = String;

/// Consumer side of a connection's outbound queue.
pub type Outbox = mpsc::UnboundedReceiver<String>;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RegisterError {
    #[error("connection {0} is already registered")]
    AlreadyRegistered(ConnectionKey),
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum LoginError {
    #[error("already logged as {0}")]
    AlreadyLoggedIn(Identity),
    #[error("{0} is not available")]
    IdentityTaken(Identity),
    #[error("connection {0} is not registered")]
    NotRegistered(ConnectionKey),
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SendError {
    #[error("{0} is not logged")]
    NotLogged(Identity),
}

/// Registry of open connections and the identities bound to them.
///
/// Every operation takes the single state lock for its whole duration, so the
/// bindings, their inverse and the available pool always move together.
pub struct Directory {
    catalog: BTreeSet<Identity>,
    state: Mutex<DirectoryState>,
}

struct DirectoryState {
    connections: HashMap<ConnectionKey, mpsc::UnboundedSender<String>>,
    bindings: HashMap<ConnectionKey, Identity>,
    holders: BTreeMap<Identity, ConnectionKey>,
    available: BTreeSet<Identity>,
}

impl DirectoryState {
    fn release(&mut self, key: &str) -> Option<Identity> {
        let identity = self.bindings.remove(key)?;
        self.holders.remove(&identity);
        self.available.insert(identity.clone());
        Some(identity)
    }

    fn enqueue(&self, key: &str, message: String) {
        if let Some(outbox) = self.connections.get(key) {
            // A closed receiver means the session is already tearing down.
            let _ = outbox.send(message);
        }
    }
}

impl Default for Directory {
    fn default() -> Self {
        Self::new(cowsay::names())
    }
}

impl Directory {
    pub fn new<I, S>(catalog: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<Identity>,
    {
        let catalog: BTreeSet<Identity> = catalog.into_iter().map(Into::into).collect();
        Self {
            state: Mutex::new(DirectoryState {
                connections: HashMap::new(),
                bindings: HashMap::new(),
                holders: BTreeMap::new(),
                available: catalog.clone(),
            }),
            catalog,
        }
    }

    /// Every identity known at startup, held or not.
    pub fn catalog(&self) -> impl Iterator<Item = &str> {
        self.catalog.iter().map(String::as_str)
    }

    /// Opens the outbound queue for a freshly accepted connection.
    pub async fn register(&self, key: impl Into<ConnectionKey>) -> Result<Outbox, RegisterError> {
        let key = key.into();
        let mut state = self.state.lock().await;
        if state.connections.contains_key(&key) {
            return Err(RegisterError::AlreadyRegistered(key));
        }

        let (tx, rx) = mpsc::unbounded_channel();
        state.connections.insert(key, tx);
        Ok(rx)
    }

    /// Drops the connection and frees its identity. Safe to call repeatedly.
    pub async fn unregister(&self, key: &str) -> Option<Identity> {
        let mut state = self.state.lock().await;
        let released = state.release(key);
        state.connections.remove(key);
        released
    }

    pub async fn login(&self, key: &str, identity: &str) -> Result<(), LoginError> {
        let mut state = self.state.lock().await;
        if !state.connections.contains_key(key) {
            return Err(LoginError::NotRegistered(key.to_string()));
        }
        if let Some(current) = state.bindings.get(key) {
            return Err(LoginError::AlreadyLoggedIn(current.clone()));
        }
        if !state.available.remove(identity) {
            return Err(LoginError::IdentityTaken(identity.to_string()));
        }

        state.bindings.insert(key.to_string(), identity.to_string());
        state.holders.insert(identity.to_string(), key.to_string());
        debug!(peer = %key, identity, "logged in");
        Ok(())
    }

    /// Releases the identity bound to `key`, if any.
    pub async fn logout(&self, key: &str) -> Option<Identity> {
        let released = self.state.lock().await.release(key);
        if let Some(identity) = &released {
            debug!(peer = %key, identity = %identity, "logged out");
        }
        released
    }

    pub async fn identity_of(&self, key: &str) -> Option<Identity> {
        self.state.lock().await.bindings.get(key).cloned()
    }

    /// Queues `message` for `key`. Messages to unknown keys are dropped.
    pub async fn send_to(&self, key: &str, message: impl Into<String>) {
        self.state.lock().await.enqueue(key, message.into());
    }

    pub async fn send_to_identity(
        &self,
        identity: &str,
        message: impl Into<String>,
    ) -> Result<(), SendError> {
        let state = self.state.lock().await;
        let Some(key) = state.holders.get(identity) else {
            return Err(SendError::NotLogged(identity.to_string()));
        };
        state.enqueue(key, message.into());
        Ok(())
    }

    /// Queues `message` for every logged-in connection except `except_key`.
    pub async fn broadcast(&self, except_key: &str, message: impl Into<String>) {
        let message = message.into();
        let state = self.state.lock().await;
        for key in state.holders.values().filter(|key| key.as_str() != except_key) {
            state.enqueue(key, message.clone());
        }
    }

    /// Sends `farewell` to every open connection, then drops all of them.
    ///
    /// Each session drains what is already queued before it sees its queue
    /// close, so the farewell is the last line its peer receives.
    pub async fn disconnect_all(&self, farewell: &str) -> usize {
        let mut state = self.state.lock().await;
        for outbox in state.connections.values() {
            let _ = outbox.send(farewell.to_string());
        }

        let closed = state.connections.len();
        let keys: Vec<ConnectionKey> = state.bindings.keys().cloned().collect();
        for key in keys {
            state.release(&key);
        }
        state.connections.clear();
        closed
    }

    pub async fn list_logged(&self) -> Vec<Identity> {
        self.state.lock().await.holders.keys().cloned().collect()
    }

    pub async fn list_available(&self) -> Vec<Identity> {
        self.state.lock().await.available.iter().cloned().collect()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;

    fn herd() -> Directory {
        Directory::new(["cow", "milk", "tux"])
    }

    async fn assert_partition(directory: &Directory) {
        let logged: BTreeSet<Identity> = directory.list_logged().await.into_iter().collect();
        let available: BTreeSet<Identity> =
            directory.list_available().await.into_iter().collect();
        let catalog: BTreeSet<Identity> = directory.catalog().map(String::from).collect();

        assert!(logged.is_disjoint(&available), "{logged:?} overlaps {available:?}");
        let union: BTreeSet<Identity> = logged.union(&available).cloned().collect();
        assert_eq!(union, catalog);
    }

    #[tokio::test]
    async fn register_rejects_duplicate_keys() {
        let directory = herd();
        let _outbox = directory.register("a").await.expect("first registration");
        assert_eq!(
            directory.register("a").await.err(),
            Some(RegisterError::AlreadyRegistered("a".into()))
        );
    }

    #[tokio::test]
    async fn login_binds_identity_once() {
        let directory = herd();
        let _a = directory.register("a").await.expect("register a");
        let _b = directory.register("b").await.expect("register b");

        directory.login("a", "milk").await.expect("a logs in");
        assert_eq!(
            directory.login("b", "milk").await,
            Err(LoginError::IdentityTaken("milk".into()))
        );
        assert_eq!(
            directory.login("a", "tux").await,
            Err(LoginError::AlreadyLoggedIn("milk".into()))
        );
        assert_eq!(directory.identity_of("a").await.as_deref(), Some("milk"));
        assert_eq!(directory.list_logged().await, vec!["milk".to_string()]);
        assert_partition(&directory).await;
    }

    #[tokio::test]
    async fn identities_outside_catalog_are_never_available() {
        let directory = herd();
        let _a = directory.register("a").await.expect("register a");
        assert_eq!(
            directory.login("a", "Milk").await,
            Err(LoginError::IdentityTaken("Milk".into()))
        );
    }

    #[tokio::test]
    async fn login_requires_a_registered_connection() {
        let directory = herd();
        assert_eq!(
            directory.login("ghost", "milk").await,
            Err(LoginError::NotRegistered("ghost".into()))
        );
        assert!(directory.list_logged().await.is_empty());
        assert_eq!(directory.list_available().await, vec!["cow", "milk", "tux"]);
        assert_eq!(directory.identity_of("ghost").await, None);

        let _ghost = directory.register("ghost").await.expect("register");
        directory.unregister("ghost").await;
        assert_eq!(
            directory.login("ghost", "milk").await,
            Err(LoginError::NotRegistered("ghost".into()))
        );
        assert_partition(&directory).await;
    }

    #[tokio::test]
    async fn disconnect_all_says_goodbye_and_frees_everyone() {
        let directory = herd();
        let mut a = directory.register("a").await.expect("register a");
        let mut b = directory.register("b").await.expect("register b");
        directory.login("a", "milk").await.expect("login");
        directory.send_to("b", "queued").await;

        assert_eq!(directory.disconnect_all("closing").await, 2);

        assert_eq!(a.recv().await.as_deref(), Some("closing"));
        assert_eq!(a.recv().await, None);
        assert_eq!(b.recv().await.as_deref(), Some("queued"));
        assert_eq!(b.recv().await.as_deref(), Some("closing"));
        assert_eq!(b.recv().await, None);
        assert!(directory.list_logged().await.is_empty());
        assert_eq!(directory.unregister("a").await, None);
        assert_partition(&directory).await;
    }

    #[tokio::test]
    async fn logout_and_unregister_are_idempotent() {
        let directory = herd();
        let _a = directory.register("a").await.expect("register a");
        directory.login("a", "cow").await.expect("login");

        assert_eq!(directory.logout("a").await.as_deref(), Some("cow"));
        assert_eq!(directory.logout("a").await, None);
        directory.login("a", "cow").await.expect("login again");

        assert_eq!(directory.unregister("a").await.as_deref(), Some("cow"));
        assert_eq!(directory.unregister("a").await, None);
        assert!(directory.list_available().await.contains(&"cow".to_string()));
        assert_partition(&directory).await;
    }

    #[tokio::test]
    async fn send_to_identity_requires_a_holder() {
        let directory = herd();
        let mut outbox = directory.register("a").await.expect("register a");

        assert_eq!(
            directory.send_to_identity("milk", "hello").await,
            Err(SendError::NotLogged("milk".into()))
        );
        directory.login("a", "milk").await.expect("login");
        directory
            .send_to_identity("milk", "hello")
            .await
            .expect("milk is logged");
        assert_eq!(outbox.recv().await.as_deref(), Some("hello"));
    }

    #[tokio::test]
    async fn send_to_unknown_key_is_dropped() {
        let directory = herd();
        directory.send_to("ghost", "boo").await;
        let mut outbox = directory.register("ghost").await.expect("register");
        assert!(outbox.try_recv().is_err());
    }

    #[tokio::test]
    async fn broadcast_skips_sender_and_anonymous_connections() {
        let directory = herd();
        let mut a = directory.register("a").await.expect("register a");
        let mut b = directory.register("b").await.expect("register b");
        let mut c = directory.register("c").await.expect("register c");
        let mut d = directory.register("d").await.expect("register d");
        directory.login("a", "cow").await.expect("a");
        directory.login("b", "milk").await.expect("b");
        directory.login("c", "tux").await.expect("c");

        directory.broadcast("a", "moo").await;

        assert!(a.try_recv().is_err());
        assert_eq!(b.try_recv().ok().as_deref(), Some("moo"));
        assert_eq!(c.try_recv().ok().as_deref(), Some("moo"));
        assert!(b.try_recv().is_err());
        assert!(d.try_recv().is_err());
    }

    #[tokio::test]
    async fn outbox_preserves_enqueue_order() {
        let directory = herd();
        let mut outbox = directory.register("a").await.expect("register");
        for n in 0..5 {
            directory.send_to("a", format!("m{n}")).await;
        }
        for n in 0..5 {
            assert_eq!(outbox.recv().await, Some(format!("m{n}")));
        }
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_logins_have_exactly_one_winner() {
        let directory = Arc::new(herd());
        let mut outboxes = Vec::new();
        for n in 0..16 {
            outboxes.push(directory.register(format!("peer-{n}")).await.expect("register"));
        }

        let attempts: Vec<_> = (0..16)
            .map(|n| {
                let directory = Arc::clone(&directory);
                tokio::spawn(async move { directory.login(&format!("peer-{n}"), "milk").await })
            })
            .collect();

        let mut winners = 0;
        for attempt in attempts {
            match attempt.await.expect("login task") {
                Ok(()) => winners += 1,
                Err(err) => assert_eq!(err, LoginError::IdentityTaken("milk".into())),
            }
        }
        assert_eq!(winners, 1);
        assert_partition(&directory).await;
    }

    #[tokio::test]
    async fn partition_holds_across_mixed_operations() {
        let directory = herd();
        let keys = ["a", "b", "c", "d"];
        let mut outboxes = Vec::new();
        for key in keys {
            outboxes.push(directory.register(key).await.expect("register"));
        }

        let identities = ["cow", "milk", "tux", "cow", "milk"];
        for round in 0..40usize {
            let key = keys[round % keys.len()];
            match round % 5 {
                0 | 3 => {
                    let _ = directory.login(key, identities[round % identities.len()]).await;
                }
                1 => {
                    directory.logout(key).await;
                }
                2 => {
                    directory.unregister(key).await;
                    outboxes.push(directory.register(key).await.expect("re-register"));
                }
                _ => {
                    let _ = directory.login(key, identities[(round / 2) % identities.len()]).await;
                }
            }
            assert_partition(&directory).await;
        }
    }
}
