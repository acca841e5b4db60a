use serde::{Deserialize, Serialize};

/// One line of a pick list, as loaded from the server. Never mutated by the
/// scan flow.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkItem {
    /// Row index of the line inside its pick list.
    pub idx: u32,
    pub item_code: String,
    /// Primary barcode, when it differs from the item code.
    pub expected_barcode: Option<String>,
    pub required_qty: u32,
    pub has_batch_tracking: bool,
    /// Location (or warehouse) the line is expected to be picked from.
    pub target_location_hint: String,
    /// Batch suggested by the server for tracked items.
    pub batch_hint: Option<String>,
    /// Sales order (or other grouping) the line belongs to.
    pub group: Option<String>,
    pub assigned_container: Option<String>,
}

impl WorkItem {
    pub fn new(item_code: impl Into<String>, required_qty: u32) -> Self {
        Self {
            idx: 1,
            item_code: item_code.into(),
            expected_barcode: None,
            required_qty,
            has_batch_tracking: false,
            target_location_hint: String::new(),
            batch_hint: None,
            group: None,
            assigned_container: None,
        }
    }

    pub fn with_idx(mut self, idx: u32) -> Self {
        self.idx = idx;
        self
    }

    pub fn with_barcode(mut self, barcode: impl Into<String>) -> Self {
        self.expected_barcode = Some(barcode.into());
        self
    }

    pub fn with_batch_tracking(mut self, tracked: bool) -> Self {
        self.has_batch_tracking = tracked;
        self
    }

    pub fn with_location(mut self, location: impl Into<String>) -> Self {
        self.target_location_hint = location.into();
        self
    }

    pub fn with_group(mut self, group: impl Into<String>) -> Self {
        self.group = Some(group.into());
        self
    }

    pub fn with_container(mut self, container: impl Into<String>) -> Self {
        self.assigned_container = Some(container.into());
        self
    }

    /// True when `scanned` is this item's barcode or item code.
    pub fn matches_scan(&self, scanned: &str) -> bool {
        scanned == self.item_code || self.expected_barcode.as_deref() == Some(scanned)
    }
}

/// A [`WorkItem`] together with the quantity the server already holds as
/// confirmed for it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PickLine {
    pub item: WorkItem,
    pub confirmed_qty: u32,
}

impl PickLine {
    pub fn new(item: WorkItem) -> Self {
        Self {
            item,
            confirmed_qty: 0,
        }
    }

    pub fn with_confirmed(mut self, confirmed_qty: u32) -> Self {
        self.confirmed_qty = confirmed_qty;
        self
    }

    pub fn is_completed(&self) -> bool {
        self.confirmed_qty >= self.item.required_qty
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn matches_item_code_or_barcode() {
        let item = WorkItem::new("SKU-1", 2).with_barcode("7891000100103");
        assert!(item.matches_scan("SKU-1"));
        assert!(item.matches_scan("7891000100103"));
        assert!(!item.matches_scan("SKU-2"));
        assert!(!item.matches_scan(""));
    }

    #[test]
    fn line_completion_follows_confirmed_qty() {
        let line = PickLine::new(WorkItem::new("SKU-1", 3));
        assert!(!line.is_completed());
        assert!(!line.clone().with_confirmed(2).is_completed());
        assert!(line.with_confirmed(3).is_completed());
    }
}
