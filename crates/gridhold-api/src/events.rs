use std::collections::HashMap;
use std::convert::Infallible;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use axum::{
    Extension,
    extract::State,
    response::sse::{Event, KeepAlive, Sse},
};
use futures_util::stream::Stream;
use tokio::sync::broadcast::{self, error::RecvError};
use tracing::{debug, warn};
use uuid::Uuid;

use gridhold_types::api::Claims;
use gridhold_types::events::MapEvent;

use crate::state::AppState;

const KEEP_ALIVE: Duration = Duration::from_secs(30);

/// Fan-out of map events to every open `/api/events` stream, plus a
/// registry of who is connected.
#[derive(Clone)]
pub struct EventHub {
    inner: Arc<EventHubInner>,
}

struct EventHubInner {
    broadcast_tx: broadcast::Sender<MapEvent>,

    /// client_id -> username
    clients: Mutex<HashMap<Uuid, String>>,
}

impl EventHub {
    pub fn new() -> Self {
        let (broadcast_tx, _) = broadcast::channel(256);
        Self {
            inner: Arc::new(EventHubInner {
                broadcast_tx,
                clients: Mutex::new(HashMap::new()),
            }),
        }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<MapEvent> {
        self.inner.broadcast_tx.subscribe()
    }

    /// Send to all subscribers. No subscribers is not an error.
    pub fn publish(&self, event: MapEvent) {
        let _ = self.inner.broadcast_tx.send(event);
    }

    /// Adds a client to the registry. It stays registered until the returned
    /// guard is dropped.
    pub fn register(&self, username: &str) -> ClientGuard {
        let id = Uuid::new_v4();
        if let Ok(mut clients) = self.inner.clients.lock() {
            clients.insert(id, username.to_string());
        }
        debug!("Event client {} ({}) connected", id, username);
        ClientGuard {
            hub: self.clone(),
            id,
        }
    }

    pub fn client_count(&self) -> usize {
        self.inner.clients.lock().map(|c| c.len()).unwrap_or(0)
    }

    fn unregister(&self, id: Uuid) {
        if let Ok(mut clients) = self.inner.clients.lock() {
            clients.remove(&id);
        }
        debug!("Event client {} disconnected", id);
    }
}

impl Default for EventHub {
    fn default() -> Self {
        Self::new()
    }
}

pub struct ClientGuard {
    hub: EventHub,
    id: Uuid,
}

impl ClientGuard {
    pub fn id(&self) -> Uuid {
        self.id
    }
}

impl Drop for ClientGuard {
    fn drop(&mut self) {
        self.hub.unregister(self.id);
    }
}

/// GET /api/events — server-sent events. The stream (and its registry entry)
/// is dropped when the client disconnects.
pub async fn stream_events(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    let hub = state.events.clone();
    let mut rx = hub.subscribe();
    let guard = hub.register(&claims.username);
    let hello = MapEvent::Hello {
        client_id: guard.id().to_string(),
        clients: hub.client_count(),
    };

    let stream = async_stream::stream! {
        // Held for the life of the stream; dropping it unregisters the client
        let client = guard;
        yield Ok::<_, Infallible>(to_sse(&hello));

        loop {
            match rx.recv().await {
                Ok(event) => yield Ok(to_sse(&event)),
                Err(RecvError::Lagged(n)) => {
                    warn!("Event client {} lagged, skipped {} events", client.id(), n);
                }
                Err(RecvError::Closed) => break,
            }
        }
    };

    Sse::new(stream).keep_alive(KeepAlive::new().interval(KEEP_ALIVE).text("ping"))
}

fn to_sse(event: &MapEvent) -> Event {
    Event::default()
        .event(event.name())
        .json_data(event)
        .unwrap_or_else(|e| {
            warn!("Failed to encode event: {}", e);
            Event::default().comment("encode error")
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use gridhold_types::events::PointAction;

    #[test]
    fn guard_drop_unregisters() {
        let hub = EventHub::new();
        let a = hub.register("alice");
        let b = hub.register("bob");
        assert_eq!(hub.client_count(), 2);

        drop(a);
        assert_eq!(hub.client_count(), 1);
        drop(b);
        assert_eq!(hub.client_count(), 0);
    }

    #[tokio::test]
    async fn published_events_reach_subscribers() {
        let hub = EventHub::new();
        let mut rx = hub.subscribe();
        let event = MapEvent::BasePointsChanged {
            action: PointAction::Saved,
            user_id: Some("u1".into()),
            count: 1,
        };

        hub.publish(event.clone());
        assert_eq!(rx.recv().await.unwrap(), event);
    }

    #[test]
    fn publish_without_subscribers_is_fine() {
        EventHub::new().publish(MapEvent::Hello {
            client_id: "x".into(),
            clients: 0,
        });
    }
}
