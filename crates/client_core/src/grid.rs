use std::{collections::HashMap, sync::Arc};

use shared::domain::{Event, EventId, SortOrder};
use tokio::sync::{broadcast, Mutex};
use tracing::{debug, info, warn};

use crate::{backend::EventBackend, error::ClientError, ClientEvent};

/// A page request from a large-collection view.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct GridParams {
    pub page: u32,
    pub page_size: u32,
    pub sort_orders: Vec<SortOrder>,
}

impl GridParams {
    pub fn new(page: u32, page_size: u32) -> Self {
        Self {
            page,
            page_size,
            sort_orders: Vec::new(),
        }
    }

    pub fn sorted_by(mut self, sort_orders: Vec<SortOrder>) -> Self {
        self.sort_orders = sort_orders;
        self
    }

    /// Offset of the first row of this page.
    pub fn index(&self) -> u64 {
        u64::from(self.page) * u64::from(self.page_size)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SelectionOutcome {
    /// The full entity was fetched into the edit form.
    Loaded(Event),
    /// The row no longer exists; pages and selection were dropped.
    Stale,
    /// Nothing is selected any more.
    Cleared,
    /// Another row was selected while this one was loading.
    Superseded,
}

#[derive(Default)]
struct GridState {
    size: u64,
    /// Bumped on every invalidation; a page fetched under an older
    /// generation is returned to its caller but never cached.
    generation: u64,
    pages: HashMap<GridParams, Vec<Event>>,
    selected: Option<EventId>,
    form: Option<Event>,
}

/// Pull-based data source for a paged event grid with a side edit form.
///
/// The row count is fetched once on `mount` and only changes through `save`
/// of a new entity or an explicit `reload_size`.
pub struct EventGridSource {
    backend: Arc<dyn EventBackend>,
    inner: Mutex<GridState>,
    events: broadcast::Sender<ClientEvent>,
}

impl EventGridSource {
    pub fn new(backend: Arc<dyn EventBackend>, events: broadcast::Sender<ClientEvent>) -> Self {
        Self {
            backend,
            inner: Mutex::new(GridState::default()),
            events,
        }
    }

    pub async fn mount(&self) -> Result<u64, ClientError> {
        self.reload_size().await
    }

    pub async fn reload_size(&self) -> Result<u64, ClientError> {
        let size = self.backend.count_events().await?;
        self.inner.lock().await.size = size;
        let _ = self.events.send(ClientEvent::GridSizeChanged(size));
        Ok(size)
    }

    pub async fn size(&self) -> u64 {
        self.inner.lock().await.size
    }

    pub async fn form(&self) -> Option<Event> {
        self.inner.lock().await.form.clone()
    }

    pub async fn selected_id(&self) -> Option<EventId> {
        self.inner.lock().await.selected
    }

    pub async fn request(&self, params: &GridParams) -> Result<Vec<Event>, ClientError> {
        if params.page_size == 0 {
            return Err(ClientError::InvalidPageSize);
        }
        let generation = {
            let guard = self.inner.lock().await;
            if let Some(page) = guard.pages.get(params) {
                return Ok(page.clone());
            }
            guard.generation
        };

        let index = params.index();
        debug!(index, count = params.page_size, "requesting event page");
        let page = self
            .backend
            .list_events(index, params.page_size, &params.sort_orders)
            .await?;

        let mut guard = self.inner.lock().await;
        if guard.generation == generation {
            guard.pages.insert(params.clone(), page.clone());
        } else {
            debug!(index, "grid invalidated while page was loading; not caching");
        }
        Ok(page)
    }

    /// Callback form of `request`, matching views that hand in a completion
    /// callback. The callback is not told the total row count.
    pub async fn fetch_page<F>(&self, params: &GridParams, callback: F) -> Result<(), ClientError>
    where
        F: FnOnce(Vec<Event>) + Send,
    {
        let page = self.request(params).await?;
        callback(page);
        Ok(())
    }

    /// Loads the full entity behind a selected row into the form. A row that
    /// vanished on the server invalidates the page cache instead.
    pub async fn select(&self, row: Option<&Event>) -> Result<SelectionOutcome, ClientError> {
        let Some(row) = row else {
            self.cancel().await;
            return Ok(SelectionOutcome::Cleared);
        };
        let id = row.id.ok_or(ClientError::MissingEventId)?;
        self.inner.lock().await.selected = Some(id);

        let fetched = match self.backend.get_event(id).await {
            Ok(fetched) => fetched,
            Err(err) => {
                let mut guard = self.inner.lock().await;
                if guard.selected == Some(id) {
                    guard.selected = guard.form.as_ref().and_then(|form| form.id);
                }
                return Err(err.into());
            }
        };

        let mut guard = self.inner.lock().await;
        if guard.selected != Some(id) {
            debug!(event_id = id.0, "selection changed while loading; ignoring");
            return Ok(SelectionOutcome::Superseded);
        }
        match fetched {
            Some(event) => {
                guard.form = Some(event.clone());
                drop(guard);
                let _ = self.events.send(ClientEvent::FormChanged(Some(id)));
                Ok(SelectionOutcome::Loaded(event))
            }
            None => {
                warn!(event_id = id.0, "selected event is gone; invalidating grid");
                guard.form = None;
                Self::invalidate(&mut guard);
                drop(guard);
                let _ = self.events.send(ClientEvent::FormChanged(None));
                let _ = self.events.send(ClientEvent::GridInvalidated);
                Ok(SelectionOutcome::Stale)
            }
        }
    }

    /// Creates or updates the entity in the form. A new entity grows the row
    /// count by one. Endpoint errors are returned for display.
    pub async fn save(&self, form: Event) -> Result<Event, ClientError> {
        let is_new = form.is_new();
        let saved = self.backend.update_event(&form).await?;
        info!(event_id = ?saved.id, is_new, "event details stored");

        let mut guard = self.inner.lock().await;
        if is_new {
            guard.size += 1;
        }
        let size = guard.size;
        guard.form = None;
        Self::invalidate(&mut guard);
        drop(guard);

        if is_new {
            let _ = self.events.send(ClientEvent::GridSizeChanged(size));
        }
        let _ = self.events.send(ClientEvent::FormChanged(None));
        let _ = self.events.send(ClientEvent::GridInvalidated);
        Ok(saved)
    }

    pub async fn cancel(&self) {
        {
            let mut guard = self.inner.lock().await;
            guard.selected = None;
            guard.form = None;
        }
        let _ = self.events.send(ClientEvent::FormChanged(None));
    }

    /// Drops cached pages and the selection so the view re-requests rows.
    pub async fn refresh_grid(&self) {
        Self::invalidate(&mut *self.inner.lock().await);
        let _ = self.events.send(ClientEvent::GridInvalidated);
    }

    fn invalidate(state: &mut GridState) {
        state.generation += 1;
        state.pages.clear();
        state.selected = None;
    }
}

#[cfg(test)]
#[path = "tests/grid_tests.rs"]
mod tests;
