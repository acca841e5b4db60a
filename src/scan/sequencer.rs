use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use super::item::WorkItem;
use super::quantity::{self, Adjusted, Bound, Tally};
use super::step::{ApplicableSteps, Step, StepKind, StepOrder};
use crate::error::WorkflowError;

/// Where box/container assignments come from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ContainerMode {
    /// The operator scans the box as a step of its own.
    Manual,
    /// One box per group, assigned before scanning starts.
    #[default]
    #[serde(rename = "automatic")]
    AutomaticPerGroup,
}

/// How much of the required quantity must be collected before confirming.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum QuantityGate {
    /// Any positive quantity; partial picks are allowed.
    #[default]
    #[serde(rename = "any")]
    AnyPositive,
    /// The full required quantity.
    Exact,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ScanRules {
    #[serde(default)]
    pub container_mode: ContainerMode,
    #[serde(default)]
    pub quantity_gate: QuantityGate,
}

/// Observable side effects of a scan or quantity change.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Signal {
    Verified(StepKind),
    /// The scanned value is not the expected item. Nothing advanced.
    WrongItem { expected: String, scanned: String },
    QuantityChanged(u32),
    MaxQuantityReached,
    MinQuantityReached,
    ContainerAssigned(String),
    /// Input had no effect in the current step.
    Ignored,
}

/// Result of a single sequencer input.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScanOutcome {
    pub step: Step,
    pub signals: Vec<Signal>,
}

impl ScanOutcome {
    pub fn has(&self, signal: &Signal) -> bool {
        self.signals.contains(signal)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SequencerState {
    pub current_step: Step,
    pub verified: BTreeSet<StepKind>,
    pub tally: Tally,
    pub container: Option<String>,
    pub scanned_location: Option<String>,
    pub scanned_batch: Option<String>,
}

impl SequencerState {
    pub fn accumulated_qty(&self) -> u32 {
        self.tally.accumulated()
    }
}

/// The payload handed to the persistence collaborator on confirm.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Confirmation {
    pub idx: u32,
    pub item_code: String,
    pub confirmed_qty: u32,
    pub container: Option<String>,
    pub location: String,
    pub batch: Option<String>,
}

/// Per-item state machine for guided scanning.
///
/// Walks the applicable steps of one [`WorkItem`] in order:
///
/// - `Location`, `Batch`: any non-empty scan verifies the step.
/// - `Item`: the scan must match the item code or barcode. A match verifies
///   the step and picks one unit; a mismatch emits [`Signal::WrongItem`] and
///   leaves everything as it was.
/// - `Container`: any non-empty scan verifies and becomes the box.
/// - `Quantity`: each matching scan picks one more unit; other scans are
///   ignored. The sequencer stays here until the item is confirmed.
///
/// Steps already verified (a pre-assigned box) are skipped.
#[derive(Debug, Clone)]
pub struct ScanSequencer {
    item: WorkItem,
    steps: ApplicableSteps,
    rules: ScanRules,
    state: SequencerState,
}

impl ScanSequencer {
    pub fn new(item: WorkItem, order: &StepOrder, rules: ScanRules) -> Self {
        let container = item.assigned_container.clone();
        Self::resume(item, order, rules, 0, container)
    }

    /// Starts a sequencer for an item that may already be partly picked.
    ///
    /// `confirmed_qty` seeds the tally. A known `container` pre-verifies the
    /// `Container` step.
    pub fn resume(
        item: WorkItem,
        order: &StepOrder,
        rules: ScanRules,
        confirmed_qty: u32,
        container: Option<String>,
    ) -> Self {
        let steps = ApplicableSteps::resolve(order, &item);
        let mut verified = BTreeSet::new();
        if container.is_some() && steps.contains(StepKind::Container) {
            verified.insert(StepKind::Container);
        }
        let mut sequencer = Self {
            state: SequencerState {
                current_step: steps.first_applicable(),
                verified,
                tally: Tally::new(confirmed_qty, item.required_qty),
                container,
                scanned_location: None,
                scanned_batch: None,
            },
            item,
            steps,
            rules,
        };
        sequencer.state.current_step = sequencer.next_open(None);
        sequencer
    }

    pub fn item(&self) -> &WorkItem {
        &self.item
    }

    pub fn state(&self) -> &SequencerState {
        &self.state
    }

    pub fn rules(&self) -> ScanRules {
        self.rules
    }

    pub fn current_step(&self) -> Step {
        self.state.current_step
    }

    pub fn applicable(&self) -> &ApplicableSteps {
        &self.steps
    }

    pub fn accumulated_qty(&self) -> u32 {
        self.state.tally.accumulated()
    }

    pub fn container(&self) -> Option<&str> {
        self.state.container.as_deref()
    }

    pub fn is_verified(&self, kind: StepKind) -> bool {
        self.state.verified.contains(&kind)
    }

    /// Feeds one scanned value into the current step.
    pub fn submit_scan(&mut self, raw: &str) -> ScanOutcome {
        let scanned = raw.trim();
        let Step::Scan(kind) = self.state.current_step else {
            return self.outcome(vec![Signal::Ignored]);
        };
        if scanned.is_empty() {
            return self.outcome(vec![Signal::Ignored]);
        }

        let mut signals = Vec::new();
        match kind {
            StepKind::Location => {
                self.state.scanned_location = Some(scanned.to_string());
                self.verify(kind, &mut signals);
            }
            StepKind::Batch => {
                self.state.scanned_batch = Some(scanned.to_string());
                self.verify(kind, &mut signals);
            }
            StepKind::Item => {
                if !self.item.matches_scan(scanned) {
                    warn!(
                        expected = %self.item.item_code,
                        scanned,
                        "wrong item scanned"
                    );
                    return self.outcome(vec![Signal::WrongItem {
                        expected: self.item.item_code.clone(),
                        scanned: scanned.to_string(),
                    }]);
                }
                self.verify(kind, &mut signals);
                // The first correct scan also counts as one picked unit.
                self.apply(quantity::increment(self.state.tally), &mut signals);
            }
            StepKind::Container => {
                self.state.container = Some(scanned.to_string());
                signals.push(Signal::ContainerAssigned(scanned.to_string()));
                self.verify(kind, &mut signals);
            }
            StepKind::Quantity => {
                if self.item.matches_scan(scanned) {
                    self.apply(quantity::increment(self.state.tally), &mut signals);
                } else {
                    signals.push(Signal::Ignored);
                }
                return self.outcome(signals);
            }
        }

        self.state.current_step = self.next_open(Some(kind));
        debug!(
            item = %self.item.item_code,
            step = %self.state.current_step,
            "advanced scan step"
        );
        self.outcome(signals)
    }

    /// Moves the picked quantity by `delta`, clamped to `[0, required]`.
    pub fn adjust_quantity(&mut self, delta: i64) -> ScanOutcome {
        let mut signals = Vec::new();
        self.apply(quantity::adjust(self.state.tally, delta), &mut signals);
        self.outcome(signals)
    }

    pub fn increment(&mut self) -> ScanOutcome {
        self.adjust_quantity(1)
    }

    pub fn decrement(&mut self) -> ScanOutcome {
        self.adjust_quantity(-1)
    }

    /// Every gating step verified and enough quantity collected.
    pub fn can_confirm(&self) -> bool {
        let steps_done = self.steps.gating().all(|kind| self.is_verified(kind));
        let qty = self.state.tally.accumulated();
        let qty_ok = match self.rules.quantity_gate {
            QuantityGate::AnyPositive => qty > 0,
            QuantityGate::Exact => qty > 0 && self.state.tally.is_full(),
        };
        steps_done && qty_ok
    }

    /// Builds the confirmation record. Does not change the sequencer.
    pub fn confirm(&self) -> Result<Confirmation, WorkflowError> {
        if !self.can_confirm() {
            return Err(WorkflowError::ConfirmNotAllowed {
                item_code: self.item.item_code.clone(),
            });
        }
        Ok(Confirmation {
            idx: self.item.idx,
            item_code: self.item.item_code.clone(),
            confirmed_qty: self.state.tally.accumulated(),
            container: self.state.container.clone(),
            location: self
                .state
                .scanned_location
                .clone()
                .unwrap_or_else(|| self.item.target_location_hint.clone()),
            batch: self
                .state
                .scanned_batch
                .clone()
                .or_else(|| self.item.batch_hint.clone()),
        })
    }

    fn verify(&mut self, kind: StepKind, signals: &mut Vec<Signal>) {
        self.state.verified.insert(kind);
        signals.push(Signal::Verified(kind));
    }

    fn apply(&mut self, adjusted: Adjusted, signals: &mut Vec<Signal>) {
        if adjusted.changed_from(self.state.tally) {
            signals.push(Signal::QuantityChanged(adjusted.tally.accumulated()));
        }
        match adjusted.clamped {
            Some(Bound::Max) => signals.push(Signal::MaxQuantityReached),
            Some(Bound::Min) => signals.push(Signal::MinQuantityReached),
            None => {}
        }
        self.state.tally = adjusted.tally;
    }

    // First applicable step after `current` that still needs a scan.
    fn next_open(&self, current: Option<StepKind>) -> Step {
        self.steps
            .after(current)
            .find(|kind| !self.is_verified(*kind))
            .map_or(Step::Complete, Step::Scan)
    }

    fn outcome(&self, signals: Vec<Signal>) -> ScanOutcome {
        ScanOutcome {
            step: self.state.current_step,
            signals,
        }
    }
}
