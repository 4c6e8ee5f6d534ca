//! Per-session state that lives outside the durable store: the cart and
//! pending flash messages.
//!
//! Sessions idle for longer than the configured TTL are evicted lazily on
//! writes, at most once per TTL period.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use common::SessionId;
use domain::Cart;
use serde::Serialize;
use tokio::sync::{Mutex, OwnedMutexGuard, RwLock, RwLockWriteGuard};

/// How long a session may sit untouched before it is evicted.
pub const DEFAULT_IDLE_TTL: Duration = Duration::from_secs(2 * 60 * 60);

/// Severity of a flash message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Level {
    Success,
    Info,
    Warning,
}

/// A one-shot message shown on the next view.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FlashMessage {
    pub level: Level,
    pub text: String,
}

struct Session {
    /// Held for the whole of a cart action, so that concurrent requests of
    /// one session apply one after the other.
    cart: Arc<Mutex<Cart>>,
    messages: Vec<FlashMessage>,
    last_seen: Instant,
}

impl Session {
    fn new(now: Instant) -> Self {
        Self {
            cart: Arc::default(),
            messages: Vec::new(),
            last_seen: now,
        }
    }

    fn cart_in_use(&self) -> bool {
        Arc::strong_count(&self.cart) > 1
    }

    /// Nothing pending and an empty cart that no request is working on.
    fn is_disposable(&self) -> bool {
        self.messages.is_empty()
            && !self.cart_in_use()
            && self.cart.try_lock().is_ok_and(|cart| cart.is_empty())
    }

    fn is_idle(&self, now: Instant, ttl: Duration) -> bool {
        !self.cart_in_use() && now.saturating_duration_since(self.last_seen) > ttl
    }
}

struct Sessions {
    map: HashMap<SessionId, Session>,
    last_sweep: Instant,
}

impl Sessions {
    fn touch(&mut self, id: SessionId, now: Instant) -> &mut Session {
        let session = self.map.entry(id).or_insert_with(|| Session::new(now));
        session.last_seen = now;
        session
    }

    /// Drops idle sessions and returns how many were evicted.
    fn sweep(&mut self, now: Instant, ttl: Duration) -> usize {
        let before = self.map.len();
        self.map.retain(|_, session| !session.is_idle(now, ttl));
        self.last_sweep = now;
        before - self.map.len()
    }
}

/// In-process session storage keyed by [`SessionId`].
#[derive(Clone)]
pub struct SessionStore {
    inner: Arc<RwLock<Sessions>>,
    idle_ttl: Duration,
}

impl Default for SessionStore {
    fn default() -> Self {
        Self::with_idle_ttl(DEFAULT_IDLE_TTL)
    }
}

impl SessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_idle_ttl(idle_ttl: Duration) -> Self {
        Self {
            inner: Arc::new(RwLock::new(Sessions {
                map: HashMap::new(),
                last_sweep: Instant::now(),
            })),
            idle_ttl,
        }
    }

    /// Write access to the sessions, evicting idle ones first when a sweep
    /// is due.
    async fn write(&self) -> RwLockWriteGuard<'_, Sessions> {
        let mut sessions = self.inner.write().await;
        let now = Instant::now();
        if now.saturating_duration_since(sessions.last_sweep) >= self.idle_ttl {
            let evicted = sessions.sweep(now, self.idle_ttl);
            if evicted > 0 {
                tracing::debug!(evicted, "evicted idle sessions");
            }
        }
        sessions
    }

    /// Returns a copy of the session's cart (empty if there is none).
    pub async fn cart(&self, id: SessionId) -> Cart {
        let cart = self
            .inner
            .read()
            .await
            .map
            .get(&id)
            .map(|s| Arc::clone(&s.cart));

        match cart {
            Some(cart) => cart.lock().await.clone(),
            None => Cart::new(),
        }
    }

    /// Locks the session's cart for one read-modify-write.
    ///
    /// Other requests of the same session wait until the guard is dropped.
    pub async fn lock_cart(&self, id: SessionId) -> OwnedMutexGuard<Cart> {
        let cart = {
            let mut sessions = self.write().await;
            Arc::clone(&sessions.touch(id, Instant::now()).cart)
        };
        cart.lock_owned().await
    }

    /// Queues a message for the next view of this session.
    pub async fn flash(&self, id: SessionId, level: Level, text: impl Into<String>) {
        self.write()
            .await
            .touch(id, Instant::now())
            .messages
            .push(FlashMessage {
                level,
                text: text.into(),
            });
    }

    /// Removes and returns the pending messages of a session.
    pub async fn take_messages(&self, id: SessionId) -> Vec<FlashMessage> {
        let mut sessions = self.write().await;
        let Some(session) = sessions.map.get_mut(&id) else {
            return Vec::new();
        };
        let messages = std::mem::take(&mut session.messages);
        if session.is_disposable() {
            sessions.map.remove(&id);
        }
        messages
    }

    /// Number of sessions currently holding state.
    pub async fn len(&self) -> usize {
        self.inner.read().await.map.len()
    }
}
