//! AI-derived checklist analysis layered on top of a session snapshot.
//!
//! [`ChecklistResult`] is also the structured-output contract sent to the
//! model, so its JSON schema is generated with `schemars` and its field names
//! follow the camelCase wire shape the prompt asks for.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// One actionable review item.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct ChecklistItem {
    pub id: String,
    pub description: String,
    pub is_checked: bool,
}

/// Checklist generated for a single file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct ChecklistResult {
    pub filename: String,
    pub explanation: String,
    pub checklist_items: Vec<ChecklistItem>,
}

/// Analysis attached to a session record, keyed by file path.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct AnalysisResult {
    #[serde(default)]
    pub checklists: BTreeMap<String, ChecklistResult>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<DateTime<Utc>>,
}

impl AnalysisResult {
    /// Insert or replace the checklist for `checklist.filename`.
    pub fn with_checklist(mut self, checklist: ChecklistResult) -> Self {
        self.checklists.insert(checklist.filename.clone(), checklist);
        self
    }

    pub fn checklist(&self, path: &str) -> Option<&ChecklistResult> {
        self.checklists.get(path)
    }

    /// Toggle a checklist item. Returns `false` if the file or item is unknown.
    pub fn set_checked(&mut self, path: &str, item_id: &str, checked: bool) -> bool {
        let Some(item) = self
            .checklists
            .get_mut(path)
            .and_then(|c| c.checklist_items.iter_mut().find(|i| i.id == item_id))
        else {
            return false;
        };
        item.is_checked = checked;
        true
    }
}
