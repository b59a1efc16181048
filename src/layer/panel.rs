//! Results panel (one per context) and the shared results dialog

use indexmap::{IndexMap, IndexSet};

use super::context::ContextId;
use super::record::FetchRecord;
use crate::source::{FieldMap, RecordKey};

pub const DEFAULT_TITLE: &str = "Records";
const FETCHING_SUFFIX: &str = " (fetching...)";

/// Rows fetched for one context plus the user's selection
#[derive(Debug, Clone)]
pub struct ResultsPanel {
    context: ContextId,
    rows: IndexMap<RecordKey, FetchRecord>,
    selected: IndexSet<RecordKey>,
}

impl ResultsPanel {
    pub fn new(context: ContextId) -> Self {
        Self {
            context,
            rows: IndexMap::new(),
            selected: IndexSet::new(),
        }
    }

    pub fn context(&self) -> ContextId {
        self.context
    }

    pub fn rows(&self) -> impl Iterator<Item = &FetchRecord> {
        self.rows.values()
    }

    pub fn row(&self, key: &RecordKey) -> Option<&FetchRecord> {
        self.rows.get(key)
    }

    pub fn row_count(&self) -> usize {
        self.rows.len()
    }

    pub fn selected(&self) -> impl Iterator<Item = &RecordKey> {
        self.selected.iter()
    }

    pub fn is_selected(&self, key: &RecordKey) -> bool {
        self.selected.contains(key)
    }

    /// Merge a fetch result.
    ///
    /// Rows keep their first-seen position; a refetched row takes the new
    /// content. Without `toggle` the selection becomes exactly the result
    /// keys, with `toggle` each result key flips membership.
    pub fn apply_selection(&mut self, records: Vec<FetchRecord>, toggle: bool) {
        if !toggle {
            self.selected.clear();
        }
        for record in records {
            let key = record.key.clone();
            if toggle {
                if !self.selected.shift_remove(&key) {
                    self.selected.insert(key.clone());
                }
            } else {
                self.selected.insert(key.clone());
            }
            self.rows.insert(key, record);
        }
    }

    /// Returns the number of rows that were updated
    pub fn apply_fields(&mut self, rows: Vec<(RecordKey, FieldMap)>) -> usize {
        let mut updated = 0;
        for (key, fields) in rows {
            if let Some(row) = self.rows.get_mut(&key) {
                row.merge_fields(fields);
                updated += 1;
            }
        }
        updated
    }

    pub fn clear(&mut self) {
        self.rows.clear();
        self.selected.clear();
    }
}

/// The single dialog that shows the active context's panel
#[derive(Debug, Clone)]
pub struct ResultsDialog {
    attached: Option<ContextId>,
    title: String,
}

impl Default for ResultsDialog {
    fn default() -> Self {
        Self {
            attached: None,
            title: DEFAULT_TITLE.to_string(),
        }
    }
}

impl ResultsDialog {
    pub fn attached(&self) -> Option<ContextId> {
        self.attached
    }

    pub fn title(&self) -> &str {
        &self.title
    }

    pub fn attach(&mut self, context: ContextId) {
        self.attached = Some(context);
    }

    /// Returns the context that was attached, if any
    pub fn detach(&mut self) -> Option<ContextId> {
        self.attached.take()
    }

    /// Recompute the title. Returns the new title when it changed.
    pub fn refresh_title(&mut self, context_name: Option<&str>, fetching: bool) -> Option<&str> {
        let title = title_for(context_name, fetching);
        if title == self.title {
            return None;
        }
        self.title = title;
        Some(&self.title)
    }
}

pub fn title_for(context_name: Option<&str>, fetching: bool) -> String {
    match context_name {
        None => DEFAULT_TITLE.to_string(),
        Some(name) => {
            let mut title = format!("{DEFAULT_TITLE} - {name}");
            if fetching {
                title.push_str(FETCHING_SUFFIX);
            }
            title
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::Polygon;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    fn record(key: &str, tag: i64) -> FetchRecord {
        let mut fields = FieldMap::new();
        fields.insert("tag".to_string(), json!(tag));
        FetchRecord {
            key: RecordKey::from(key),
            fields,
            polygon: Polygon::default(),
            color: None,
        }
    }

    fn keys<'a>(it: impl Iterator<Item = &'a RecordKey>) -> Vec<&'a str> {
        it.map(|k| k.0.as_str()).collect()
    }

    #[test]
    fn replace_selection_without_toggle() {
        let mut panel = ResultsPanel::new(ContextId(1));
        panel.apply_selection(vec![record("a", 1), record("b", 1)], false);
        panel.apply_selection(vec![record("c", 1), record("a", 2)], false);

        assert_eq!(keys(panel.selected()), vec!["c", "a"]);
        assert_eq!(keys(panel.rows().map(|r| &r.key)), vec!["a", "b", "c"]);
        assert_eq!(panel.row(&RecordKey::from("a")).unwrap().fields["tag"], json!(2));
    }

    #[test]
    fn toggle_flips_membership() {
        let mut panel = ResultsPanel::new(ContextId(1));
        panel.apply_selection(vec![record("a", 1), record("b", 1)], false);
        panel.apply_selection(vec![record("b", 1), record("c", 1)], true);
        assert_eq!(keys(panel.selected()), vec!["a", "c"]);
        assert_eq!(panel.row_count(), 3);
    }

    #[test]
    fn enrichment_only_touches_known_rows() {
        let mut panel = ResultsPanel::new(ContextId(1));
        panel.apply_selection(vec![record("a", 1)], false);
        let mut extra = FieldMap::new();
        extra.insert("exposure".to_string(), json!(0.5));
        let updated = panel.apply_fields(vec![
            (RecordKey::from("a"), extra.clone()),
            (RecordKey::from("zz"), extra),
        ]);
        assert_eq!(updated, 1);
        assert_eq!(panel.row(&RecordKey::from("a")).unwrap().fields["exposure"], json!(0.5));
    }

    #[test]
    fn dialog_titles() {
        let mut dialog = ResultsDialog::default();
        assert_eq!(dialog.title(), "Records");
        assert_eq!(dialog.refresh_title(Some("Craters"), true), Some("Records - Craters (fetching...)"));
        assert_eq!(dialog.refresh_title(Some("Craters"), true), None);
        assert_eq!(dialog.refresh_title(Some("Craters"), false), Some("Records - Craters"));
        assert_eq!(dialog.refresh_title(None, true), Some("Records"));
    }
}
