// The set of live sessions.
//
// `SessionRegistry` maps `ClientId` to `Arc<Session>` behind its own lock,
// independent of the simulation lock. Broadcasts copy the recipient list
// out under the lock, release it, then queue; sessions that join or leave
// mid-broadcast simply are or aren't in that copy. A broadcast encodes the
// message once and queues the same frame bytes for every recipient.
//
// Queueing never blocks (see `session.rs`), so a broadcast costs the same
// whether or not a recipient is reading. A recipient whose queue is full or
// whose writer has died is logged and skipped; it shuts its own socket down
// and is deregistered later by its inbound thread, never from here.

use std::collections::BTreeMap;
use std::sync::Arc;

use parking_lot::Mutex;
use particle_sync_protocol::{ClientId, ServerMessage};
use tracing::{debug, error, warn};

use crate::session::Session;

#[derive(Default)]
pub struct SessionRegistry {
    sessions: Mutex<BTreeMap<ClientId, Arc<Session>>>,
}

impl SessionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&self, session: Arc<Session>) {
        let id = session.id();
        if self.sessions.lock().insert(id, session).is_some() {
            warn!(client_id = %id, "replaced an existing session with the same id");
        }
    }

    pub fn deregister(&self, id: ClientId) -> Option<Arc<Session>> {
        self.sessions.lock().remove(&id)
    }

    pub fn len(&self) -> usize {
        self.sessions.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.lock().is_empty()
    }

    pub fn ids(&self) -> Vec<ClientId> {
        self.sessions.lock().keys().copied().collect()
    }

    pub fn get(&self, id: ClientId) -> Option<Arc<Session>> {
        self.sessions.lock().get(&id).cloned()
    }

    /// Send to every registered session. `supplier` runs once, after the
    /// recipient set is fixed. Returns how many sessions were written to.
    pub fn broadcast_all<F>(&self, supplier: F) -> usize
    where
        F: FnOnce() -> ServerMessage,
    {
        let recipients = self.snapshot(None);
        if recipients.is_empty() {
            return 0;
        }
        deliver(&recipients, &supplier())
    }

    /// Send to every registered session except `excluded`.
    pub fn broadcast_except(&self, excluded: ClientId, msg: &ServerMessage) -> usize {
        deliver(&self.snapshot(Some(excluded)), msg)
    }

    fn snapshot(&self, excluded: Option<ClientId>) -> Vec<Arc<Session>> {
        self.sessions
            .lock()
            .values()
            .filter(|s| Some(s.id()) != excluded)
            .cloned()
            .collect()
    }
}

fn deliver(recipients: &[Arc<Session>], msg: &ServerMessage) -> usize {
    if recipients.is_empty() {
        return 0;
    }
    let frame: Arc<[u8]> = match msg.encode_frame() {
        Ok(Some(frame)) => frame.into(),
        Ok(None) => {
            debug!(tag = msg.tag().as_str(), "not broadcasting empty message");
            return 0;
        }
        Err(e) => {
            error!(tag = msg.tag().as_str(), error = %e, "failed to encode broadcast");
            return 0;
        }
    };
    recipients
        .iter()
        .filter(|session| session.send_frame(frame.clone()).is_ok())
        .count()
}
