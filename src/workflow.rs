//! Iteration over the lines of one pick list or delivery note.
//!
//! [`ItemWorkflow`] owns the list, the currently selected line and that
//! line's [`ScanSequencer`]. Box assignments for automatic mode come from a
//! [`ContainerPlan`] built outside the workflow.

use std::collections::HashMap;
use std::fmt;

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::error::WorkflowError;
use crate::scan::{
    ContainerMode, PickLine, QuantityGate, ScanRules, ScanSequencer, StepOrder,
};

/// Package used for packed lines that arrive without a box or package.
pub const DEFAULT_PACKAGE: &str = "PKG-001";

/// The document a workflow walks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ListKind {
    /// Pick list: scan where and what, then count.
    #[default]
    Pick,
    /// Delivery note: count what goes into each package.
    Pack,
}

impl ListKind {
    pub fn noun(self) -> &'static str {
        match self {
            ListKind::Pick => "Pick list",
            ListKind::Pack => "Delivery note",
        }
    }
}

impl fmt::Display for ListKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.noun())
    }
}

/// Lines of a delivery note that share one package.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Package {
    pub package_no: String,
    pub items: Vec<PackedItem>,
    pub items_count: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PackedItem {
    pub idx: u32,
    pub item_code: String,
    pub qty: u32,
}

/// Group → box map used in automatic container mode.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ContainerPlan {
    by_group: HashMap<String, String>,
    ungrouped: Option<String>,
}

impl ContainerPlan {
    /// Numbers one box per distinct group, in first-seen order:
    /// `BOX-001`, `BOX-002`, ... Lines without a group share a box.
    pub fn for_lines(lines: &[PickLine], prefix: &str) -> Self {
        let mut plan = Self::default();
        let mut next = 1u32;
        let mut label = || {
            let name = format!("{prefix}-{next:03}");
            next += 1;
            name
        };
        for line in lines {
            match &line.item.group {
                Some(group) => {
                    if !plan.by_group.contains_key(group) {
                        plan.by_group.insert(group.clone(), label());
                    }
                }
                None => {
                    if plan.ungrouped.is_none() {
                        plan.ungrouped = Some(label());
                    }
                }
            }
        }
        plan
    }

    pub fn assign(&mut self, group: Option<&str>, container: impl Into<String>) {
        match group {
            Some(group) => {
                self.by_group.insert(group.to_string(), container.into());
            }
            None => self.ungrouped = Some(container.into()),
        }
    }

    pub fn container_for(&self, group: Option<&str>) -> Option<&str> {
        match group {
            Some(group) => self.by_group.get(group).map(String::as_str),
            None => self.ungrouped.as_deref(),
        }
    }
}

/// What [`ItemWorkflow::advance_after_confirm`] moved to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Advance {
    Next(usize),
    AllComplete,
}

pub struct ItemWorkflow {
    kind: ListKind,
    lines: Vec<PickLine>,
    order: StepOrder,
    rules: ScanRules,
    containers: ContainerPlan,
    current_index: usize,
    sequencer: ScanSequencer,
}

impl ItemWorkflow {
    /// Pick-list workflow. Selects the first line that is not yet complete,
    /// or the first line if all are; callers check
    /// [`is_all_complete`](Self::is_all_complete) before scanning.
    pub fn new(
        lines: Vec<PickLine>,
        order: StepOrder,
        rules: ScanRules,
        containers: ContainerPlan,
    ) -> Result<Self, WorkflowError> {
        Self::build(ListKind::Pick, lines, order, rules, containers)
    }

    /// Workflow over a delivery note. Each line starts at its full quantity
    /// in its assigned package (or [`DEFAULT_PACKAGE`]); any positive count
    /// may be confirmed.
    pub fn packing(lines: Vec<PickLine>) -> Result<Self, WorkflowError> {
        let rules = ScanRules {
            container_mode: ContainerMode::Manual,
            quantity_gate: QuantityGate::AnyPositive,
        };
        Self::build(
            ListKind::Pack,
            lines,
            StepOrder::pack(),
            rules,
            ContainerPlan::default(),
        )
    }

    fn build(
        kind: ListKind,
        lines: Vec<PickLine>,
        order: StepOrder,
        rules: ScanRules,
        containers: ContainerPlan,
    ) -> Result<Self, WorkflowError> {
        let start = lines
            .iter()
            .position(|line| !line.is_completed())
            .unwrap_or(0);
        let first = lines.get(start).ok_or(WorkflowError::EmptyList)?;
        let sequencer = build_sequencer(kind, first, &order, rules, &containers);
        Ok(Self {
            kind,
            lines,
            order,
            rules,
            containers,
            current_index: start,
            sequencer,
        })
    }

    pub fn kind(&self) -> ListKind {
        self.kind
    }

    pub fn lines(&self) -> &[PickLine] {
        &self.lines
    }

    pub fn order(&self) -> &StepOrder {
        &self.order
    }

    pub fn current_index(&self) -> usize {
        self.current_index
    }

    pub fn current_line(&self) -> &PickLine {
        &self.lines[self.current_index]
    }

    pub fn sequencer(&self) -> &ScanSequencer {
        &self.sequencer
    }

    pub fn sequencer_mut(&mut self) -> &mut ScanSequencer {
        &mut self.sequencer
    }

    pub fn total(&self) -> usize {
        self.lines.len()
    }

    pub fn completed_count(&self) -> usize {
        self.lines.iter().filter(|line| line.is_completed()).count()
    }

    pub fn is_all_complete(&self) -> bool {
        self.lines.iter().all(PickLine::is_completed)
    }

    /// Resets scanning for line `index`. Picking resumes from the line's
    /// confirmed quantity; packing starts from the full quantity.
    pub fn select_item(&mut self, index: usize) -> Result<&ScanSequencer, WorkflowError> {
        let line = self.lines.get(index).ok_or(WorkflowError::IndexOutOfRange {
            index,
            len: self.lines.len(),
        })?;
        self.sequencer =
            build_sequencer(self.kind, line, &self.order, self.rules, &self.containers);
        self.current_index = index;
        debug!(
            index,
            item = %line.item.item_code,
            step = %self.sequencer.current_step(),
            "selected item"
        );
        Ok(&self.sequencer)
    }

    /// Stores a quantity the server accepted for the current line.
    pub fn record_confirmation(&mut self, confirmed_qty: u32, container: Option<String>) {
        let line = &mut self.lines[self.current_index];
        line.confirmed_qty = confirmed_qty;
        if container.is_some() {
            line.item.assigned_container = container;
        }
        info!(
            item = %line.item.item_code,
            confirmed_qty,
            required_qty = line.item.required_qty,
            "line confirmed"
        );
    }

    /// Selects the next incomplete line after the current one, wrapping to
    /// the start of the list.
    pub fn advance_after_confirm(&mut self) -> Result<Advance, WorkflowError> {
        let len = self.lines.len();
        let next = (1..=len)
            .map(|offset| (self.current_index + offset) % len)
            .find(|idx| !self.lines[*idx].is_completed());
        match next {
            Some(idx) => {
                self.select_item(idx)?;
                Ok(Advance::Next(idx))
            }
            None => {
                info!(total = len, "all lines complete");
                Ok(Advance::AllComplete)
            }
        }
    }

    /// Confirmed lines grouped by package, in first-seen order.
    pub fn packages(&self) -> Vec<Package> {
        let mut packages: Vec<Package> = Vec::new();
        for line in self.lines.iter().filter(|line| line.confirmed_qty > 0) {
            let package_no = line
                .item
                .assigned_container
                .as_deref()
                .unwrap_or(DEFAULT_PACKAGE);
            let item = PackedItem {
                idx: line.item.idx,
                item_code: line.item.item_code.clone(),
                qty: line.confirmed_qty,
            };
            match packages.iter_mut().find(|p| p.package_no == package_no) {
                Some(package) => {
                    package.items.push(item);
                    package.items_count += 1;
                }
                None => packages.push(Package {
                    package_no: package_no.to_string(),
                    items: vec![item],
                    items_count: 1,
                }),
            }
        }
        packages
    }
}

fn build_sequencer(
    kind: ListKind,
    line: &PickLine,
    order: &StepOrder,
    rules: ScanRules,
    containers: &ContainerPlan,
) -> ScanSequencer {
    let assigned = line.item.assigned_container.clone();
    let (start_qty, container) = match (kind, rules.container_mode) {
        (ListKind::Pack, _) => (
            line.item.required_qty,
            Some(assigned.unwrap_or_else(|| DEFAULT_PACKAGE.to_string())),
        ),
        (ListKind::Pick, ContainerMode::AutomaticPerGroup) => (
            line.confirmed_qty,
            containers
                .container_for(line.item.group.as_deref())
                .map(str::to_string)
                .or(assigned),
        ),
        (ListKind::Pick, ContainerMode::Manual) => (line.confirmed_qty, assigned),
    };
    ScanSequencer::resume(line.item.clone(), order, rules, start_qty, container)
}
