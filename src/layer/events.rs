//! Display-side events published by a layer view

use serde::Serialize;

use super::context::ContextId;
use super::record::FetchRecord;
use crate::geometry::Rect;
use crate::regions::RegionId;
use crate::source::{FieldMap, RecordKey};

/// The three render buffers shared by whichever context is active
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub enum BufferSlot {
    Data = 0,
    Selection = 1,
    Grid = 2,
}

impl BufferSlot {
    pub const ALL: [BufferSlot; 3] = [BufferSlot::Data, BufferSlot::Selection, BufferSlot::Grid];

    pub fn index(self) -> usize {
        self as usize
    }
}

/// Ask the display to repaint some slots for a context
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RedrawRequest {
    pub context: ContextId,
    pub slots: Vec<BufferSlot>,
    /// World-space viewport at the time of the request
    pub viewport: Rect,
    /// Regions under the viewport, ascending
    pub regions: Vec<RegionId>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum LayerEvent {
    #[serde(rename_all = "camelCase")]
    BuffersShown { context: ContextId, slots: Vec<BufferSlot> },
    #[serde(rename_all = "camelCase")]
    BuffersHidden { context: ContextId, slots: Vec<BufferSlot> },
    Redraw(RedrawRequest),
    #[serde(rename_all = "camelCase")]
    PanelAttached { context: ContextId },
    #[serde(rename_all = "camelCase")]
    PanelDetached { context: ContextId },
    #[serde(rename_all = "camelCase")]
    RowsCleared { context: ContextId },
    #[serde(rename_all = "camelCase")]
    TitleChanged { title: String },
    /// A fetch result has been merged into the context's panel
    #[serde(rename_all = "camelCase")]
    RecordsFetched {
        context: ContextId,
        toggle: bool,
        records: Vec<FetchRecord>,
        selected: Vec<RecordKey>,
    },
    #[serde(rename_all = "camelCase")]
    FieldsEnriched {
        context: ContextId,
        rows: Vec<(RecordKey, FieldMap)>,
    },
    #[serde(rename_all = "camelCase")]
    FetchFailed { context: ContextId, message: String },
    #[serde(rename_all = "camelCase")]
    ContextDeleted { context: ContextId },
}
