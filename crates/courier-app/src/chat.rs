//! Conversation view model.
//!
//! [`Chat`] is the handle screens bind to: send with optimistic insert,
//! subscribe to live snapshots, trigger history loads. It owns the single
//! authoritative [`Inbox`] and a spawned fold task that applies inbound
//! pushes in arrival order; subscribers observe changes through `watch`
//! channels instead of polling or keeping copies.

use std::{
    collections::{HashMap, HashSet},
    sync::{Arc, Weak},
    time::{SystemTime, UNIX_EPOCH},
};

use courier_client::{CallError, Caller, SessionState, transport::PushFrame};
use courier_proto::{
    CallRef,
    payloads::{
        message::{ContentKind, HistoryRequest, HistoryPage, SendMessageRequest, SendReceipt},
        session::UserProfile,
    },
};
use tokio::sync::{Mutex, broadcast, watch};

use crate::{
    state::{ConversationSnapshot, Delivery, Direction, LoadPhase, Message},
    stream::{Inbox, StreamEvent},
};

/// Current wall clock in Unix milliseconds.
fn now_millis() -> u64 {
    SystemTime::now().duration_since(UNIX_EPOCH).map_or(0, |d| d.as_millis() as u64)
}

struct ChatInner {
    caller: Caller,
    session: watch::Receiver<SessionState>,
    inbox: Mutex<Inbox>,
    watchers: Mutex<HashMap<String, watch::Sender<ConversationSnapshot>>>,
}

/// Handle to the conversation view model. Cheap to clone.
#[derive(Clone)]
pub struct Chat {
    inner: Arc<ChatInner>,
}

impl Chat {
    /// Build the view model and spawn its fold task.
    ///
    /// The fold task subscribes to transport pushes and stops on its own
    /// when the last `Chat` handle is dropped.
    pub fn spawn(caller: Caller, session: watch::Receiver<SessionState>) -> Self {
        let pushes = caller.transport().subscribe_pushes();
        let inner = Arc::new(ChatInner {
            caller,
            session,
            inbox: Mutex::new(Inbox::new()),
            watchers: Mutex::new(HashMap::new()),
        });

        tokio::spawn(run_fold(Arc::downgrade(&inner), pushes));
        Self { inner }
    }

    /// Live, continuously updated snapshot of a conversation.
    ///
    /// The receiver observes every change; the first value is the current
    /// state (possibly empty).
    pub async fn subscribe(&self, conversation: &str) -> watch::Receiver<ConversationSnapshot> {
        // Inbox stays locked until the watcher is registered so no fold can
        // slip between the snapshot and the registration.
        let inbox = self.inner.inbox.lock().await;
        let snapshot = inbox
            .conversation(conversation)
            .map_or_else(|| ConversationSnapshot::empty(conversation), |c| c.snapshot());

        let mut watchers = self.inner.watchers.lock().await;
        drop(inbox);
        match watchers.entry(conversation.to_owned()) {
            std::collections::hash_map::Entry::Occupied(entry) => entry.get().subscribe(),
            std::collections::hash_map::Entry::Vacant(entry) => {
                let (tx, rx) = watch::channel(snapshot);
                entry.insert(tx);
                rx
            },
        }
    }

    /// Send a message.
    ///
    /// The optimistic entry appears in the list before the network call; on
    /// failure it is marked [`Delivery::Failed`] in place so the user can
    /// retry, never silently removed. Empty content is rejected before
    /// anything is inserted or sent.
    pub async fn send(
        &self,
        conversation: &str,
        content: &str,
        kind: ContentKind,
    ) -> Result<(), CallError> {
        if content.trim().is_empty() {
            return Err(CallError::Validation("message is empty".to_owned()));
        }

        let sender = self.own_profile();
        let client_ref = CallRef::fresh();
        let message = Message {
            id: format!("local-{client_ref}"),
            conversation: conversation.to_owned(),
            sender,
            kind,
            content: content.to_owned(),
            timestamp: now_millis(),
            direction: Direction::Outbound,
            delivery: Delivery::Pending,
            client_ref: Some(client_ref),
        };

        {
            let mut inbox = self.inner.inbox.lock().await;
            let conv = inbox.ensure_conversation(conversation);
            conv.touch(message.timestamp);
            conv.messages.push(message);
            self.publish(&inbox, conversation).await;
        }

        self.dispatch(conversation, client_ref, kind, content).await
    }

    /// Re-send a failed optimistic entry, flipping it back to pending.
    pub async fn retry(&self, conversation: &str, message_id: &str) -> Result<(), CallError> {
        let (client_ref, kind, content) = {
            let mut inbox = self.inner.inbox.lock().await;
            let conv = inbox.ensure_conversation(conversation);
            let Some(pos) = conv.position_of(message_id) else {
                return Err(CallError::Validation(format!("no message {message_id}")));
            };
            if conv.messages[pos].delivery != Delivery::Failed {
                return Err(CallError::Validation(format!("message {message_id} is not failed")));
            }
            let Some(client_ref) = conv.messages[pos].client_ref else {
                return Err(CallError::Validation(format!("message {message_id} is not local")));
            };
            conv.messages[pos].delivery = Delivery::Pending;
            let entry = &conv.messages[pos];
            let out = (client_ref, entry.kind, entry.content.clone());
            self.publish(&inbox, conversation).await;
            out
        };

        self.dispatch(conversation, client_ref, kind, &content).await
    }

    /// Trigger a history load if the conversation is not already loaded.
    ///
    /// A load already in flight (or completed) makes this a no-op, so two
    /// screens racing to open the same conversation issue one request.
    pub async fn load_history(&self, conversation: &str) -> Result<(), CallError> {
        {
            let mut inbox = self.inner.inbox.lock().await;
            let conv = inbox.ensure_conversation(conversation);
            match conv.phase {
                LoadPhase::Loading | LoadPhase::Ready => return Ok(()),
                LoadPhase::Empty => conv.phase = LoadPhase::Loading,
            }
            self.publish(&inbox, conversation).await;
        }

        let request = HistoryRequest { conversation: conversation.to_owned() };
        match self.inner.caller.call_typed::<_, HistoryPage>("message", "history", &request).await
        {
            Ok(page) => {
                let mut inbox = self.inner.inbox.lock().await;
                self.sync_identity(&mut inbox);
                let changed = inbox.apply(StreamEvent::HistoryLoaded(page));
                for id in &changed {
                    self.publish(&inbox, id).await;
                }
                Ok(())
            },
            Err(e) => {
                // Back to Empty: the load is user-retriable.
                let mut inbox = self.inner.inbox.lock().await;
                inbox.ensure_conversation(conversation).phase = LoadPhase::Empty;
                self.publish(&inbox, conversation).await;
                Err(e)
            },
        }
    }

    /// Mark a conversation active; its arrivals stop counting as unread.
    pub async fn set_active(&self, conversation: Option<&str>) {
        let mut inbox = self.inner.inbox.lock().await;
        inbox.set_active(conversation);
        if let Some(id) = conversation {
            self.publish(&inbox, id).await;
        }
    }

    /// User ids currently online.
    pub async fn online_users(&self) -> HashSet<String> {
        self.inner.inbox.lock().await.online().clone()
    }

    /// Issue the `message/send` call and mark the optimistic entry with the
    /// outcome.
    async fn dispatch(
        &self,
        conversation: &str,
        client_ref: CallRef,
        kind: ContentKind,
        content: &str,
    ) -> Result<(), CallError> {
        let request = SendMessageRequest {
            to: conversation.to_owned(),
            kind,
            content: content.to_owned(),
            client_ref: Some(client_ref),
        };

        match self.inner.caller.call_typed::<_, SendReceipt>("message", "send", &request).await {
            Ok(receipt) => {
                let mut inbox = self.inner.inbox.lock().await;
                let conv = inbox.ensure_conversation(conversation);
                if let Some(pos) = conv.position_of_ref(client_ref) {
                    // Adopt the server id unless the authoritative push got
                    // here first; either way the entry is confirmed now.
                    if conv.messages[pos].delivery != Delivery::Confirmed {
                        conv.messages[pos].id = receipt.id;
                    }
                    conv.messages[pos].delivery = Delivery::Confirmed;
                }
                self.publish(&inbox, conversation).await;
                Ok(())
            },
            Err(e) => {
                tracing::warn!(conversation, %client_ref, error = %e, "send failed");
                let mut inbox = self.inner.inbox.lock().await;
                let conv = inbox.ensure_conversation(conversation);
                if let Some(pos) = conv.position_of_ref(client_ref) {
                    conv.messages[pos].delivery = Delivery::Failed;
                }
                self.publish(&inbox, conversation).await;
                Err(e)
            },
        }
    }

    /// Our identity as a message sender (empty profile when anonymous).
    fn own_profile(&self) -> UserProfile {
        match &*self.inner.session.borrow() {
            SessionState::Authenticated(identity) => UserProfile {
                id: identity.user_id.clone(),
                username: identity.username.clone(),
            },
            SessionState::Anonymous => {
                UserProfile { id: String::new(), username: String::new() }
            },
        }
    }

    fn sync_identity(&self, inbox: &mut Inbox) {
        let me = self.inner.session.borrow().identity().map(|i| i.user_id.clone());
        inbox.set_identity(me);
    }

    /// Push the current snapshot of `conversation` to its watcher, if any.
    async fn publish(&self, inbox: &Inbox, conversation: &str) {
        let Some(conv) = inbox.conversation(conversation) else { return };
        let watchers = self.inner.watchers.lock().await;
        if let Some(tx) = watchers.get(conversation) {
            tx.send_replace(conv.snapshot());
        }
    }
}

/// Fold task: applies transport pushes to the inbox in arrival order.
///
/// Holds only a weak reference so dropping the last `Chat` handle ends the
/// task; a lagged subscription logs and continues rather than tearing the
/// fold down.
async fn run_fold(inner: Weak<ChatInner>, mut pushes: broadcast::Receiver<PushFrame>) {
    loop {
        match pushes.recv().await {
            Ok(push) => {
                let Some(inner) = inner.upgrade() else { break };
                fold_one(&inner, push).await;
            },
            Err(broadcast::error::RecvError::Lagged(missed)) => {
                tracing::warn!(missed, "push subscriber lagged; some events were dropped");
            },
            Err(broadcast::error::RecvError::Closed) => break,
        }
    }
}

async fn fold_one(inner: &ChatInner, push: PushFrame) {
    match StreamEvent::from_push(&push.event, push.data) {
        Ok(Some(event)) => {
            let me = inner.session.borrow().identity().map(|i| i.user_id.clone());
            let mut inbox = inner.inbox.lock().await;
            inbox.set_identity(me);
            let changed = inbox.apply(event);

            let watchers = inner.watchers.lock().await;
            for id in changed {
                if let (Some(conv), Some(tx)) = (inbox.conversation(&id), watchers.get(&id)) {
                    tx.send_replace(conv.snapshot());
                }
            }
        },
        Ok(None) => tracing::debug!(event = %push.event, "ignoring unknown push"),
        Err(e) => tracing::warn!(event = %push.event, error = %e, "undecodable push"),
    }
}
