//! Per-user mutable session state and the bounded outbound queue.

use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;

use chrono::{DateTime, Utc};
use tokio::sync::mpsc::error::TrySendError;
use tokio::sync::mpsc::{channel, Receiver, Sender};
use tokio::sync::Notify;
use uuid::Uuid;

use parlor_shared::wire::userinfo::{userflag, TlvUserInfo};
use parlor_shared::wire::SnacMessage;
use parlor_shared::{DisplayScreenName, IdentScreenName};

/// Outbound messages buffered per session before the writer falls behind.
const OUTBOUND_QUEUE_SIZE: usize = 128;

/// Outcome of a non-blocking relay.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RelayResult {
    Sent,
    /// Queue full. The message was dropped and the session marked for
    /// disconnection.
    Dropped,
    /// The session was already closed; the relay was a no-op.
    Closed,
}

#[derive(Debug)]
struct SessionState {
    warning: u16,
    away_message: Option<String>,
    idle_since: Option<DateTime<Utc>>,
    invisible: bool,
    base_flags: u16,
    capabilities: Vec<[u8; 16]>,
    client_id: String,
    transient_buddies: HashSet<IdentScreenName>,
    signon_complete: bool,
}

/// A connected client. BOS sessions live in the session registry; chat
/// sessions are independent objects keyed by (ident, chat cookie).
#[derive(Debug)]
pub struct Session {
    id: Uuid,
    ident: IdentScreenName,
    display: DisplayScreenName,
    signon_time: DateTime<Utc>,
    chat_cookie: Option<String>,
    state: Mutex<SessionState>,
    tx: Sender<SnacMessage>,
    rx: Mutex<Option<Receiver<SnacMessage>>>,
    closed: AtomicBool,
    close_notify: Notify,
}

impl Session {
    pub fn new(display: DisplayScreenName) -> Self {
        Self::with_chat_cookie(display, None)
    }

    pub fn with_chat_cookie(display: DisplayScreenName, chat_cookie: Option<String>) -> Self {
        let (tx, rx) = channel(OUTBOUND_QUEUE_SIZE);
        Self {
            id: Uuid::new_v4(),
            ident: display.ident(),
            display,
            signon_time: Utc::now(),
            chat_cookie,
            state: Mutex::new(SessionState {
                warning: 0,
                away_message: None,
                idle_since: None,
                invisible: false,
                base_flags: userflag::OSCAR_FREE,
                capabilities: Vec::new(),
                client_id: String::new(),
                transient_buddies: HashSet::new(),
                signon_complete: false,
            }),
            tx,
            rx: Mutex::new(Some(rx)),
            closed: AtomicBool::new(false),
            close_notify: Notify::new(),
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn ident(&self) -> &IdentScreenName {
        &self.ident
    }

    pub fn display(&self) -> &DisplayScreenName {
        &self.display
    }

    pub fn signon_time(&self) -> DateTime<Utc> {
        self.signon_time
    }

    pub fn chat_cookie(&self) -> Option<&str> {
        self.chat_cookie.as_deref()
    }

    /// Enqueue a message without blocking. A full queue means a stuck or
    /// slow client; the message is dropped and the session closed.
    pub fn relay(&self, msg: SnacMessage) -> RelayResult {
        if self.is_closed() {
            return RelayResult::Closed;
        }
        match self.tx.try_send(msg) {
            Ok(()) => RelayResult::Sent,
            Err(TrySendError::Full(_)) => {
                tracing::warn!(ident = %self.ident, "outbound queue full, disconnecting session");
                self.close();
                RelayResult::Dropped
            }
            Err(TrySendError::Closed(_)) => RelayResult::Closed,
        }
    }

    /// Hand the queue receiver to the connection's writer task. Panics if
    /// called twice; each session has exactly one writer.
    pub fn take_receiver(&self) -> Receiver<SnacMessage> {
        self.rx
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .take()
            .expect("session receiver already taken")
    }

    /// Idempotently signal the writer loop to stop.
    pub fn close(&self) {
        if !self.closed.swap(true, Ordering::SeqCst) {
            self.close_notify.notify_waiters();
        }
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    /// Resolves once the session has been closed.
    pub async fn closed(&self) {
        let notified = self.close_notify.notified();
        tokio::pin!(notified);
        // register before checking the flag so a concurrent close() cannot
        // slip between the check and the await
        notified.as_mut().enable();
        if self.is_closed() {
            return;
        }
        notified.await;
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, SessionState> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    pub fn warning(&self) -> u16 {
        self.lock().warning
    }

    /// Raise the warning level, capped at 100%.
    pub fn increase_warning(&self, delta: u16) -> u16 {
        let mut state = self.lock();
        state.warning = (state.warning + delta).min(1000);
        state.warning
    }

    pub fn away_message(&self) -> Option<String> {
        self.lock().away_message.clone()
    }

    pub fn set_away_message(&self, msg: Option<String>) {
        self.lock().away_message = msg;
    }

    pub fn set_idle_secs(&self, secs: u32) {
        let mut state = self.lock();
        state.idle_since = if secs == 0 {
            None
        } else {
            Some(Utc::now() - chrono::Duration::seconds(secs as i64))
        };
    }

    pub fn invisible(&self) -> bool {
        self.lock().invisible
    }

    pub fn set_invisible(&self, invisible: bool) {
        self.lock().invisible = invisible;
    }

    pub fn set_base_flag(&self, flag: u16) {
        self.lock().base_flags |= flag;
    }

    pub fn capabilities(&self) -> Vec<[u8; 16]> {
        self.lock().capabilities.clone()
    }

    pub fn set_capabilities(&self, caps: Vec<[u8; 16]>) {
        self.lock().capabilities = caps;
    }

    pub fn client_id(&self) -> String {
        self.lock().client_id.clone()
    }

    pub fn set_client_id(&self, client_id: String) {
        self.lock().client_id = client_id;
    }

    pub fn add_transient_buddies(&self, buddies: &[IdentScreenName]) {
        self.lock().transient_buddies.extend(buddies.iter().cloned());
    }

    pub fn remove_transient_buddies(&self, buddies: &[IdentScreenName]) {
        let mut state = self.lock();
        for b in buddies {
            state.transient_buddies.remove(b);
        }
    }

    pub fn has_transient_buddy(&self, ident: &IdentScreenName) -> bool {
        self.lock().transient_buddies.contains(ident)
    }

    pub fn signon_complete(&self) -> bool {
        self.lock().signon_complete
    }

    pub fn set_signon_complete(&self) {
        self.lock().signon_complete = true;
    }

    /// Consistent snapshot of this user as seen by other clients.
    pub fn user_info(&self) -> TlvUserInfo {
        let state = self.lock();
        let mut flags = state.base_flags;
        if state.away_message.is_some() {
            flags |= userflag::UNAVAILABLE;
        }
        if state.invisible {
            flags |= userflag::INVISIBLE;
        }
        let mut info = TlvUserInfo::new(self.display.as_str(), state.warning)
            .with_flags(flags)
            .with_signon_time(self.signon_time.timestamp() as u32);
        if let Some(idle_since) = state.idle_since {
            let minutes = (Utc::now() - idle_since).num_minutes().max(0) as u16;
            info = info.with_idle_minutes(minutes);
        }
        info
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use parlor_shared::wire::snac::{foodgroup, SnacFrame};

    fn message() -> SnacMessage {
        SnacMessage::new(SnacFrame::new(foodgroup::BUDDY, 0x0B), vec![1, 2, 3])
    }

    #[tokio::test]
    async fn test_relay_preserves_fifo_order() {
        let sess = Session::new(DisplayScreenName::new("chuck"));
        for i in 0..3u8 {
            let msg = SnacMessage::new(SnacFrame::new(foodgroup::BUDDY, 0x0B), vec![i]);
            assert_eq!(sess.relay(msg), RelayResult::Sent);
        }
        let mut rx = sess.take_receiver();
        for i in 0..3u8 {
            assert_eq!(rx.recv().await.unwrap().body, vec![i]);
        }
    }

    #[test]
    fn test_full_queue_drops_and_closes() {
        let sess = Session::new(DisplayScreenName::new("chuck"));
        for _ in 0..OUTBOUND_QUEUE_SIZE {
            assert_eq!(sess.relay(message()), RelayResult::Sent);
        }
        assert_eq!(sess.relay(message()), RelayResult::Dropped);
        assert!(sess.is_closed());
        assert_eq!(sess.relay(message()), RelayResult::Closed);
    }

    #[test]
    fn test_close_is_idempotent() {
        let sess = Session::new(DisplayScreenName::new("chuck"));
        sess.close();
        sess.close();
        assert!(sess.is_closed());
    }

    #[tokio::test]
    async fn test_closed_resolves_after_close() {
        let sess = std::sync::Arc::new(Session::new(DisplayScreenName::new("chuck")));
        let waiter = {
            let sess = sess.clone();
            tokio::spawn(async move { sess.closed().await })
        };
        sess.close();
        waiter.await.unwrap();
    }

    #[test]
    fn test_user_info_reflects_state() {
        let sess = Session::new(DisplayScreenName::new("Chatting Chuck"));
        sess.set_away_message(Some("brb".to_string()));
        sess.set_invisible(true);
        sess.increase_warning(300);

        let info = sess.user_info();
        assert_eq!(info.screen_name, "Chatting Chuck");
        assert_eq!(info.warning_level, 300);
        let flags = info.tlvs.u16(0x0001).unwrap();
        assert_ne!(flags & userflag::UNAVAILABLE, 0);
        assert_ne!(flags & userflag::INVISIBLE, 0);
    }

    #[test]
    fn test_warning_capped() {
        let sess = Session::new(DisplayScreenName::new("chuck"));
        sess.increase_warning(900);
        sess.increase_warning(900);
        assert_eq!(sess.warning(), 1000);
    }

    #[test]
    fn test_transient_buddies() {
        let sess = Session::new(DisplayScreenName::new("chuck"));
        let bob = IdentScreenName::new("bob");
        sess.add_transient_buddies(std::slice::from_ref(&bob));
        assert!(sess.has_transient_buddy(&bob));
        sess.remove_transient_buddies(std::slice::from_ref(&bob));
        assert!(!sess.has_transient_buddy(&bob));
    }
}
