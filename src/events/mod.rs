//! Change notifications for document queries.
//!
//! Clients register interest in a [`QueryKey`] and receive every
//! [`StoreEvent`] that may change that query's result. Dropping the
//! [`Subscription`] deregisters it.

use futures::Stream;
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

use crate::auth::models::AuthenticatedUser;
use crate::db::models::Document;
use crate::store::access::authorize_read;

/// Default number of events buffered per subscriber before it lags.
pub const DEFAULT_CAPACITY: usize = 256;

/// A store query a client can subscribe to.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "query", rename_all = "snake_case")]
pub enum QueryKey {
    /// Non-archived children of `parent_document` (roots when `None`).
    Sidebar {
        user_id: String,
        parent_document: Option<String>,
    },
    /// Every non-archived document of the user.
    Search { user_id: String },
    /// Every archived document of the user.
    Trash { user_id: String },
    /// A single document.
    Document { id: String },
}

/// A change published by the document store.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum StoreEvent {
    /// A document was created or modified. `detached_from` names the parent
    /// it was removed from, if the change detached it.
    DocumentChanged {
        document: Document,
        #[serde(skip_serializing_if = "Option::is_none")]
        detached_from: Option<String>,
    },
    /// A document was permanently deleted.
    DocumentRemoved { document: Document },
    /// An archive/restore cascade finished.
    CascadeCompleted {
        user_id: String,
        root_id: String,
        archived: bool,
        updated: Vec<String>,
    },
    /// An archive/restore cascade stopped on an error. Some descendants may
    /// carry the new state, others the old one.
    CascadeFailed {
        user_id: String,
        root_id: String,
        archived: bool,
        error: String,
    },
    /// The subscriber fell behind and missed events; refetch.
    Resync { missed: u64 },
    /// The subscribed document is no longer visible to the subscriber. Last
    /// event of its stream.
    AccessRevoked { id: String },
}

impl StoreEvent {
    /// Whether this event may change the result of `key`.
    pub fn affects(&self, key: &QueryKey) -> bool {
        match self {
            StoreEvent::DocumentChanged {
                document,
                detached_from,
            } => {
                document_affects(document, key)
                    || matches!(key, QueryKey::Sidebar { user_id, parent_document }
                        if *user_id == document.user_id
                            && detached_from.is_some()
                            && parent_document == detached_from)
            }
            StoreEvent::DocumentRemoved { document } => document_affects(document, key),
            StoreEvent::CascadeCompleted {
                user_id,
                root_id,
                updated,
                ..
            } => match key {
                QueryKey::Document { id } => id == root_id || updated.contains(id),
                other => owner_of(other) == Some(user_id.as_str()),
            },
            StoreEvent::CascadeFailed {
                user_id, root_id, ..
            } => match key {
                QueryKey::Document { id } => id == root_id,
                other => owner_of(other) == Some(user_id.as_str()),
            },
            StoreEvent::Resync { .. } => true,
            StoreEvent::AccessRevoked { id } => {
                matches!(key, QueryKey::Document { id: watched } if watched == id)
            }
        }
    }

    /// The document carried by the event, if any.
    pub fn document(&self) -> Option<&Document> {
        match self {
            StoreEvent::DocumentChanged { document, .. } | StoreEvent::DocumentRemoved { document } => {
                Some(document)
            }
            _ => None,
        }
    }
}

fn owner_of(key: &QueryKey) -> Option<&str> {
    match key {
        QueryKey::Sidebar { user_id, .. }
        | QueryKey::Search { user_id }
        | QueryKey::Trash { user_id } => Some(user_id),
        QueryKey::Document { .. } => None,
    }
}

fn document_affects(document: &Document, key: &QueryKey) -> bool {
    match key {
        QueryKey::Document { id } => *id == document.id,
        QueryKey::Sidebar {
            user_id,
            parent_document,
        } => *user_id == document.user_id && *parent_document == document.parent_document,
        QueryKey::Search { user_id } | QueryKey::Trash { user_id } => *user_id == document.user_id,
    }
}

/// Fan-out point for store events.
#[derive(Debug, Clone)]
pub struct EventHub {
    sender: broadcast::Sender<StoreEvent>,
}

impl Default for EventHub {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}

impl EventHub {
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    /// Publish an event. Having no subscribers is not an error.
    pub fn publish(&self, event: StoreEvent) {
        let _ = self.sender.send(event);
    }

    /// Register interest in `key`, receiving every matching event.
    pub fn subscribe(&self, key: QueryKey) -> Subscription {
        Subscription {
            key,
            receiver: self.sender.subscribe(),
            viewer: None,
            revoked: false,
        }
    }

    /// Register interest in `key` on behalf of `viewer`.
    ///
    /// Document keys re-check read access on every event and end with
    /// [`StoreEvent::AccessRevoked`] once the viewer may no longer read it.
    pub fn subscribe_as(&self, key: QueryKey, viewer: Option<AuthenticatedUser>) -> Subscription {
        Subscription {
            viewer: Some(Viewer(viewer)),
            ..self.subscribe(key)
        }
    }

    /// Number of live subscriptions.
    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

/// The principal a subscription delivers to. `None` inside is anonymous.
#[derive(Debug, Clone)]
struct Viewer(Option<AuthenticatedUser>);

impl Viewer {
    fn owns(&self, user_id: &str) -> bool {
        self.0.as_ref().is_some_and(|u| u.user_id == user_id)
    }
}

enum Screened {
    Deliver(StoreEvent),
    Skip,
    Revoke,
}

/// Decide what a document subscription may see of `event`.
fn screen(viewer: &Viewer, event: StoreEvent) -> Screened {
    match &event {
        StoreEvent::DocumentChanged { document, .. } | StoreEvent::DocumentRemoved { document } => {
            match authorize_read(document.clone(), viewer.0.as_ref()) {
                Ok(_) => Screened::Deliver(event),
                Err(_) => Screened::Revoke,
            }
        }
        StoreEvent::CascadeCompleted {
            user_id, archived, ..
        }
        | StoreEvent::CascadeFailed {
            user_id, archived, ..
        } => {
            if viewer.owns(user_id) {
                Screened::Deliver(event)
            } else if *archived {
                Screened::Revoke
            } else {
                Screened::Skip
            }
        }
        StoreEvent::Resync { .. } | StoreEvent::AccessRevoked { .. } => Screened::Deliver(event),
    }
}

/// A registered interest in one query key.
#[derive(Debug)]
pub struct Subscription {
    key: QueryKey,
    receiver: broadcast::Receiver<StoreEvent>,
    viewer: Option<Viewer>,
    revoked: bool,
}

impl Subscription {
    pub fn key(&self) -> &QueryKey {
        &self.key
    }

    /// Wait for the next event affecting this subscription's key.
    ///
    /// Returns `None` once the hub is gone or access was revoked.
    pub async fn recv(&mut self) -> Option<StoreEvent> {
        loop {
            if self.revoked {
                return None;
            }

            let event = match self.receiver.recv().await {
                Ok(event) if event.affects(&self.key) => event,
                Ok(_) => continue,
                Err(broadcast::error::RecvError::Lagged(missed)) => {
                    return Some(StoreEvent::Resync { missed })
                }
                Err(broadcast::error::RecvError::Closed) => return None,
            };

            let (Some(viewer), QueryKey::Document { id }) = (&self.viewer, &self.key) else {
                return Some(event);
            };
            match screen(viewer, event) {
                Screened::Deliver(event) => return Some(event),
                Screened::Skip => continue,
                Screened::Revoke => {
                    tracing::debug!(document_id = %id, "Document no longer visible to subscriber");
                    self.revoked = true;
                    return Some(StoreEvent::AccessRevoked { id: id.clone() });
                }
            }
        }
    }

    /// Turn the subscription into a stream of matching events.
    pub fn into_stream(self) -> impl Stream<Item = StoreEvent> + Send {
        let mut subscription = self;
        async_stream::stream! {
            while let Some(event) = subscription.recv().await {
                yield event;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn doc(user: &str, parent: Option<&str>) -> Document {
        Document::new("Doc", parent.map(str::to_string), user)
    }

    #[test]
    fn test_sidebar_key_matches_parent() {
        let child = doc("u1", Some("p1"));
        let event = StoreEvent::DocumentChanged {
            document: child.clone(),
            detached_from: None,
        };

        let same_parent = QueryKey::Sidebar {
            user_id: "u1".into(),
            parent_document: Some("p1".into()),
        };
        let roots = QueryKey::Sidebar {
            user_id: "u1".into(),
            parent_document: None,
        };
        let other_user = QueryKey::Sidebar {
            user_id: "u2".into(),
            parent_document: Some("p1".into()),
        };

        assert!(event.affects(&same_parent));
        assert!(!event.affects(&roots));
        assert!(!event.affects(&other_user));
        assert!(event.affects(&QueryKey::Document { id: child.id.clone() }));
    }

    #[test]
    fn test_detached_document_notifies_old_parent() {
        // Restored to the root after its parent stayed archived
        let event = StoreEvent::DocumentChanged {
            document: doc("u1", None),
            detached_from: Some("p1".into()),
        };

        assert!(event.affects(&QueryKey::Sidebar {
            user_id: "u1".into(),
            parent_document: Some("p1".into()),
        }));
        assert!(event.affects(&QueryKey::Sidebar {
            user_id: "u1".into(),
            parent_document: None,
        }));
    }

    #[test]
    fn test_cascade_event_scope() {
        let event = StoreEvent::CascadeCompleted {
            user_id: "u1".into(),
            root_id: "root".into(),
            archived: true,
            updated: vec!["child".into()],
        };

        assert!(event.affects(&QueryKey::Trash { user_id: "u1".into() }));
        assert!(!event.affects(&QueryKey::Trash { user_id: "u2".into() }));
        assert!(event.affects(&QueryKey::Document { id: "child".into() }));
        assert!(!event.affects(&QueryKey::Document { id: "unrelated".into() }));
    }

    #[tokio::test]
    async fn test_subscription_filters_and_deregisters() {
        let hub = EventHub::default();
        let mut sub = hub.subscribe(QueryKey::Search { user_id: "u1".into() });
        assert_eq!(hub.subscriber_count(), 1);

        hub.publish(StoreEvent::DocumentChanged {
            document: doc("u2", None),
            detached_from: None,
        });
        let mine = doc("u1", None);
        hub.publish(StoreEvent::DocumentChanged {
            document: mine.clone(),
            detached_from: None,
        });

        let event = tokio::time::timeout(Duration::from_secs(1), sub.recv())
            .await
            .unwrap()
            .unwrap();
        match event {
            StoreEvent::DocumentChanged { document, .. } => assert_eq!(document.id, mine.id),
            other => panic!("unexpected event: {other:?}"),
        }

        drop(sub);
        assert_eq!(hub.subscriber_count(), 0);
    }

    #[tokio::test]
    async fn test_lagging_subscriber_gets_resync() {
        let hub = EventHub::new(2);
        let mut sub = hub.subscribe(QueryKey::Search { user_id: "u1".into() });

        for _ in 0..5 {
            hub.publish(StoreEvent::DocumentChanged {
                document: doc("u1", None),
                detached_from: None,
            });
        }

        match sub.recv().await {
            Some(StoreEvent::Resync { missed }) => assert_eq!(missed, 3),
            other => panic!("expected resync, got {other:?}"),
        }
    }

    async fn next(sub: &mut Subscription) -> Option<StoreEvent> {
        tokio::time::timeout(Duration::from_secs(1), sub.recv())
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn test_unpublished_document_revokes_anonymous_viewer() {
        let hub = EventHub::default();
        let mut published = doc("u1", None);
        published.is_published = true;
        let mut sub = hub.subscribe_as(
            QueryKey::Document {
                id: published.id.clone(),
            },
            None,
        );

        hub.publish(StoreEvent::DocumentChanged {
            document: published.clone(),
            detached_from: None,
        });
        assert!(matches!(next(&mut sub).await, Some(StoreEvent::DocumentChanged { .. })));

        let mut private = published.clone();
        private.is_published = false;
        private.content = Some("secret".into());
        hub.publish(StoreEvent::DocumentChanged {
            document: private,
            detached_from: None,
        });

        match next(&mut sub).await {
            Some(StoreEvent::AccessRevoked { id }) => assert_eq!(id, published.id),
            other => panic!("expected revocation, got {other:?}"),
        }
        assert!(next(&mut sub).await.is_none());
    }

    #[tokio::test]
    async fn test_owner_keeps_private_document_events() {
        let hub = EventHub::default();
        let owner = AuthenticatedUser::new("u1", "u1@example.com", "U1");
        let private = doc("u1", None);
        let mut sub = hub.subscribe_as(
            QueryKey::Document {
                id: private.id.clone(),
            },
            Some(owner),
        );

        hub.publish(StoreEvent::CascadeCompleted {
            user_id: "u1".into(),
            root_id: private.id.clone(),
            archived: true,
            updated: vec![],
        });
        assert!(matches!(next(&mut sub).await, Some(StoreEvent::CascadeCompleted { .. })));

        hub.publish(StoreEvent::DocumentChanged {
            document: private,
            detached_from: None,
        });
        assert!(matches!(next(&mut sub).await, Some(StoreEvent::DocumentChanged { .. })));
    }

    #[tokio::test]
    async fn test_archived_cascade_revokes_stranger() {
        let hub = EventHub::default();
        let stranger = AuthenticatedUser::new("u2", "u2@example.com", "U2");
        let mut sub = hub.subscribe_as(QueryKey::Document { id: "child".into() }, Some(stranger));

        hub.publish(StoreEvent::CascadeCompleted {
            user_id: "u1".into(),
            root_id: "root".into(),
            archived: true,
            updated: vec!["child".into()],
        });

        assert!(matches!(
            next(&mut sub).await,
            Some(StoreEvent::AccessRevoked { id }) if id == "child"
        ));
    }

    #[test]
    fn test_query_key_deserializes_tagged() {
        let key: QueryKey =
            serde_json::from_str(r#"{"query":"sidebar","user_id":"u1","parent_document":null}"#)
                .unwrap();
        assert_eq!(
            key,
            QueryKey::Sidebar {
                user_id: "u1".into(),
                parent_document: None
            }
        );
    }
}
