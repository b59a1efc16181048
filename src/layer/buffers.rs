//! Per-context buffer manager
//!
//! Contexts move through `Added -> Activated <-> Deactivated -> (deleted)`.
//! The three render slots are shared, so activating one context first
//! deactivates whichever other context holds them. Every side effect is
//! published as a [`LayerEvent`].

use indexmap::IndexMap;
use serde::Serialize;
use std::sync::Arc;

use super::context::{Context, ContextDef, ContextField, ContextId, ContextUpdate};
use super::events::{BufferSlot, LayerEvent, RedrawRequest};
use super::panel::{ResultsDialog, ResultsPanel};
use super::record::FetchRecord;
use crate::error::LayerError;
use crate::geometry::Rect;
use crate::regions::RegionIndex;
use crate::runtime::ObserverList;
use crate::source::{FieldMap, RecordKey};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ContextState {
    Added,
    Activated,
    Deactivated,
}

struct Entry {
    context: Context,
    state: ContextState,
    panel: ResultsPanel,
}

pub struct BufferManager {
    contexts: IndexMap<ContextId, Entry>,
    active: Option<ContextId>,
    visible: [bool; 3],
    dialog: ResultsDialog,
    viewport: Rect,
    index: Arc<RegionIndex>,
    fetching: bool,
    next_id: u64,
    events: Arc<ObserverList<LayerEvent>>,
}

impl BufferManager {
    pub fn new(index: Arc<RegionIndex>, viewport: Rect) -> Self {
        Self {
            contexts: IndexMap::new(),
            active: None,
            visible: [false; 3],
            dialog: ResultsDialog::default(),
            viewport,
            index,
            fetching: false,
            next_id: 1,
            events: Arc::new(ObserverList::new()),
        }
    }

    /// Listeners for every display-side effect
    pub fn events(&self) -> &Arc<ObserverList<LayerEvent>> {
        &self.events
    }

    fn emit(&self, event: LayerEvent) {
        self.events.broadcast(&event);
    }

    /// Register a context. No buffers are touched.
    pub fn add(&mut self, def: ContextDef) -> ContextId {
        let id = ContextId(self.next_id);
        self.next_id += 1;
        tracing::debug!(context = %id, name = %def.name, "Context added");
        self.contexts.insert(
            id,
            Entry {
                context: Context::new(id, def),
                state: ContextState::Added,
                panel: ResultsPanel::new(id),
            },
        );
        id
    }

    pub fn activate(&mut self, id: ContextId) -> Result<(), LayerError> {
        self.entry(id)?;
        if self.active == Some(id) {
            return Ok(());
        }
        if let Some(previous) = self.active {
            self.deactivate(previous)?;
        }

        self.active = Some(id);
        if let Some(entry) = self.contexts.get_mut(&id) {
            entry.state = ContextState::Activated;
        }
        tracing::debug!(context = %id, "Context activated");

        self.visible = [true; 3];
        self.emit(LayerEvent::BuffersShown {
            context: id,
            slots: BufferSlot::ALL.to_vec(),
        });
        self.request_redraw(id, &BufferSlot::ALL);
        self.dialog.attach(id);
        self.emit(LayerEvent::PanelAttached { context: id });
        self.refresh_title();
        Ok(())
    }

    /// Hide the slots and detach the panel. A context that is not active
    /// has nothing on screen, so this is a no-op for it.
    pub fn deactivate(&mut self, id: ContextId) -> Result<(), LayerError> {
        self.entry(id)?;
        if self.active != Some(id) {
            return Ok(());
        }

        self.active = None;
        if let Some(entry) = self.contexts.get_mut(&id) {
            entry.state = ContextState::Deactivated;
        }
        tracing::debug!(context = %id, "Context deactivated");

        self.visible = [false; 3];
        self.emit(LayerEvent::BuffersHidden {
            context: id,
            slots: BufferSlot::ALL.to_vec(),
        });
        if self.dialog.detach().is_some() {
            self.emit(LayerEvent::PanelDetached { context: id });
        }
        self.refresh_title();
        Ok(())
    }

    /// Apply an edit. Returns the fields that changed.
    pub fn update(&mut self, id: ContextId, update: ContextUpdate) -> Result<Vec<ContextField>, LayerError> {
        let entry = self
            .contexts
            .get_mut(&id)
            .ok_or(LayerError::UnknownContext(id))?;
        let changed = entry.context.apply(update);

        if changed.iter().any(|f| f.invalidates_rows()) {
            entry.panel.clear();
            self.emit(LayerEvent::RowsCleared { context: id });
        }

        if self.active == Some(id) {
            if changed.iter().any(|f| f.needs_redraw()) {
                self.request_redraw(id, &BufferSlot::ALL);
            }
            if changed.contains(&ContextField::Name) {
                self.refresh_title();
            }
        }
        tracing::debug!(context = %id, ?changed, "Context updated");
        Ok(changed)
    }

    /// Remove a context, deactivating it first when it is active
    pub fn delete(&mut self, id: ContextId) -> Result<Context, LayerError> {
        self.deactivate(id)?;
        let entry = self
            .contexts
            .shift_remove(&id)
            .ok_or(LayerError::UnknownContext(id))?;
        tracing::debug!(context = %id, "Context deleted");
        self.emit(LayerEvent::ContextDeleted { context: id });
        Ok(entry.context)
    }

    pub fn viewport(&self) -> Rect {
        self.viewport
    }

    /// Redraws the active context, if any
    pub fn set_viewport(&mut self, viewport: Rect) {
        self.viewport = viewport;
        if let Some(id) = self.active {
            self.request_redraw(id, &BufferSlot::ALL);
        }
    }

    /// Swap the world index after a projection change and redraw
    pub fn set_region_index(&mut self, index: Arc<RegionIndex>) {
        self.index = index;
        if let Some(id) = self.active {
            self.request_redraw(id, &BufferSlot::ALL);
        }
    }

    fn request_redraw(&self, id: ContextId, slots: &[BufferSlot]) {
        let regions = self.index.regions_under_viewport(&self.viewport);
        self.emit(LayerEvent::Redraw(RedrawRequest {
            context: id,
            slots: slots.to_vec(),
            viewport: self.viewport,
            regions: regions.into_iter().collect(),
        }));
    }

    /// Track the worker's in-flight flag for the title indicator
    pub fn set_fetching(&mut self, fetching: bool) {
        self.fetching = fetching;
        self.refresh_title();
    }

    pub fn is_fetching(&self) -> bool {
        self.fetching
    }

    /// Hand a fetch result to the context's panel. Results for a context
    /// deleted in the meantime are dropped.
    pub fn apply_fetch(&mut self, id: ContextId, records: Vec<FetchRecord>, toggle: bool) {
        let Some(entry) = self.contexts.get_mut(&id) else {
            tracing::debug!(context = %id, "Dropping fetch result for deleted context");
            return;
        };
        entry.panel.apply_selection(records.clone(), toggle);
        let selected: Vec<RecordKey> = entry.panel.selected().cloned().collect();

        self.emit(LayerEvent::RecordsFetched {
            context: id,
            toggle,
            records,
            selected,
        });
        if self.active == Some(id) {
            self.request_redraw(id, &[BufferSlot::Selection]);
        }
    }

    pub fn apply_fields(&mut self, id: ContextId, rows: Vec<(RecordKey, FieldMap)>) {
        let Some(entry) = self.contexts.get_mut(&id) else {
            return;
        };
        let updated = entry.panel.apply_fields(rows.clone());
        tracing::debug!(context = %id, updated, "Applied enrichment fields");
        self.emit(LayerEvent::FieldsEnriched { context: id, rows });
    }

    pub fn report_failure(&self, id: ContextId, message: String) {
        self.emit(LayerEvent::FetchFailed { context: id, message });
    }

    pub fn active(&self) -> Option<&Context> {
        self.active
            .and_then(|id| self.contexts.get(&id))
            .map(|e| &e.context)
    }

    pub fn active_id(&self) -> Option<ContextId> {
        self.active
    }

    pub fn context(&self, id: ContextId) -> Option<&Context> {
        self.contexts.get(&id).map(|e| &e.context)
    }

    pub fn contexts(&self) -> impl Iterator<Item = &Context> {
        self.contexts.values().map(|e| &e.context)
    }

    pub fn state(&self, id: ContextId) -> Option<ContextState> {
        self.contexts.get(&id).map(|e| e.state)
    }

    pub fn panel(&self, id: ContextId) -> Option<&ResultsPanel> {
        self.contexts.get(&id).map(|e| &e.panel)
    }

    pub fn dialog(&self) -> &ResultsDialog {
        &self.dialog
    }

    pub fn slot_visible(&self, slot: BufferSlot) -> bool {
        self.visible[slot.index()]
    }

    fn entry(&self, id: ContextId) -> Result<&Entry, LayerError> {
        self.contexts.get(&id).ok_or(LayerError::UnknownContext(id))
    }

    fn refresh_title(&mut self) {
        let name = self
            .active
            .and_then(|id| self.contexts.get(&id))
            .map(|e| e.context.def.name.clone());
        if let Some(title) = self.dialog.refresh_title(name.as_deref(), self.fetching) {
            let title = title.to_string();
            self.emit(LayerEvent::TitleChanged { title });
        }
    }
}
