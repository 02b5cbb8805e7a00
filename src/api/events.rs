use std::convert::Infallible;

use axum::extract::{Query, State};
use axum::response::sse::{Event, KeepAlive, Sse};
use futures::{Stream, StreamExt};
use serde::Deserialize;

use crate::api::documents::PreviewDocument;
use crate::app::AppState;
use crate::auth::middleware::Principal;
use crate::auth::models::AuthenticatedUser;
use crate::error::AppError;
use crate::events::{QueryKey, StoreEvent};
use crate::store::access::require_principal;

/// Query string selecting what to subscribe to.
#[derive(Debug, Deserialize)]
pub struct EventsQuery {
    /// One of `sidebar`, `search`, `trash`, `document`.
    pub query: String,
    #[serde(default)]
    pub parent_document: Option<String>,
    #[serde(default)]
    pub id: Option<String>,
}

impl EventsQuery {
    /// Build the query key, binding owner-scoped keys to the caller.
    pub fn into_key(self, principal: Option<&AuthenticatedUser>) -> Result<QueryKey, AppError> {
        let owner = || require_principal(principal).map(|u| u.user_id.clone());

        match self.query.as_str() {
            "sidebar" => Ok(QueryKey::Sidebar {
                user_id: owner()?,
                parent_document: self.parent_document.filter(|p| !p.is_empty()),
            }),
            "search" => Ok(QueryKey::Search { user_id: owner()? }),
            "trash" => Ok(QueryKey::Trash { user_id: owner()? }),
            "document" => {
                let id = self
                    .id
                    .ok_or_else(|| AppError::BadRequest("Missing 'id' for document query".into()))?;
                Ok(QueryKey::Document { id })
            }
            other => Err(AppError::BadRequest(format!("Unknown query '{other}'"))),
        }
    }
}

fn event_name(event: &StoreEvent) -> &'static str {
    match event {
        StoreEvent::DocumentChanged { .. } => "document_changed",
        StoreEvent::DocumentRemoved { .. } => "document_removed",
        StoreEvent::CascadeCompleted { .. } => "cascade_completed",
        StoreEvent::CascadeFailed { .. } => "cascade_failed",
        StoreEvent::Resync { .. } => "resync",
        StoreEvent::AccessRevoked { .. } => "access_revoked",
    }
}

/// Event body as sent to `viewer`. Documents owned by someone else are
/// reduced to their public projection.
fn event_payload(
    event: &StoreEvent,
    viewer: Option<&AuthenticatedUser>,
) -> serde_json::Result<serde_json::Value> {
    let mut payload = serde_json::to_value(event)?;
    if let Some(document) = event.document() {
        if viewer.is_none_or(|u| u.user_id != document.user_id) {
            payload["document"] = serde_json::to_value(PreviewDocument::from(document.clone()))?;
        }
    }
    Ok(payload)
}

/// `GET /api/v1/events`: Server-Sent Events stream for one query key.
///
/// The subscription is dropped, and thereby deregistered, when the client
/// disconnects. A document stream ends after `access_revoked`.
pub async fn events_handler(
    State(state): State<AppState>,
    principal: Principal,
    Query(query): Query<EventsQuery>,
) -> Result<Sse<impl Stream<Item = Result<Event, Infallible>>>, AppError> {
    let key = query.into_key(principal.user())?;
    let subscription = state.store.subscribe(principal.user(), key).await?;
    let viewer = principal.0;

    let stream = subscription.into_stream().map(move |event| {
        let sse = event_payload(&event, viewer.as_ref())
            .map_err(axum::Error::new)
            .and_then(|payload| Event::default().event(event_name(&event)).json_data(payload));
        Ok(sse.unwrap_or_else(|e| {
            tracing::warn!("Failed to serialize store event: {e}");
            Event::default().event("resync").data("{}")
        }))
    });

    Ok(Sse::new(stream).keep_alive(KeepAlive::default()))
}
