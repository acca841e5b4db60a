use std::collections::HashSet;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use super::item::WorkItem;
use crate::error::StepOrderError;

/// The verification categories of a guided pick.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StepKind {
    Location,
    Batch,
    Item,
    #[serde(rename = "box", alias = "container")]
    Container,
    Quantity,
}

impl StepKind {
    /// Lower-case name used in config files and on the wire.
    pub fn as_str(self) -> &'static str {
        match self {
            StepKind::Location => "location",
            StepKind::Batch => "batch",
            StepKind::Item => "item",
            StepKind::Container => "box",
            StepKind::Quantity => "quantity",
        }
    }

    /// Whether this step has to be performed for `item` at all.
    pub fn applies_to(self, item: &WorkItem) -> bool {
        match self {
            StepKind::Batch => item.has_batch_tracking,
            StepKind::Quantity => item.required_qty > 1,
            StepKind::Location | StepKind::Item | StepKind::Container => true,
        }
    }
}

impl fmt::Display for StepKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StepKind::Location => write!(f, "LOCATION"),
            StepKind::Batch => write!(f, "BATCH"),
            StepKind::Item => write!(f, "ITEM"),
            StepKind::Container => write!(f, "BOX"),
            StepKind::Quantity => write!(f, "QUANTITY"),
        }
    }
}

impl FromStr for StepKind {
    type Err = StepOrderError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "location" => Ok(StepKind::Location),
            "batch" => Ok(StepKind::Batch),
            "item" => Ok(StepKind::Item),
            "box" | "container" => Ok(StepKind::Container),
            "quantity" => Ok(StepKind::Quantity),
            _ => Err(StepOrderError::UnknownKind(s.trim().to_string())),
        }
    }
}

/// Where a sequencer currently stands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Step {
    Scan(StepKind),
    Complete,
}

impl Step {
    pub fn kind(self) -> Option<StepKind> {
        match self {
            Step::Scan(kind) => Some(kind),
            Step::Complete => None,
        }
    }

    pub fn is_complete(self) -> bool {
        matches!(self, Step::Complete)
    }
}

impl fmt::Display for Step {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Step::Scan(kind) => write!(f, "{kind}"),
            Step::Complete => write!(f, "COMPLETE"),
        }
    }
}

/// Operator-configured order of verification steps.
///
/// Construction rejects an empty order, duplicate kinds and unknown names.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "Vec<String>", into = "Vec<String>")]
pub struct StepOrder(Vec<StepKind>);

impl StepOrder {
    pub fn new(kinds: Vec<StepKind>) -> Result<Self, StepOrderError> {
        if kinds.is_empty() {
            return Err(StepOrderError::Empty);
        }
        let mut seen = HashSet::new();
        for kind in &kinds {
            if !seen.insert(*kind) {
                return Err(StepOrderError::Duplicate(kind.as_str().to_string()));
            }
        }
        Ok(Self(kinds))
    }

    /// Parses step names such as `["location", "batch", "item"]`.
    pub fn parse<I, S>(names: I) -> Result<Self, StepOrderError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let kinds = names
            .into_iter()
            .map(|name| name.as_ref().parse::<StepKind>())
            .collect::<Result<Vec<_>, _>>()?;
        Self::new(kinds)
    }

    /// Default order for picking with automatic per-order boxes.
    pub fn pick() -> Self {
        Self(vec![StepKind::Location, StepKind::Batch, StepKind::Item])
    }

    /// Default order when the box is scanned by hand.
    pub fn pick_with_container() -> Self {
        Self(vec![
            StepKind::Location,
            StepKind::Batch,
            StepKind::Item,
            StepKind::Container,
        ])
    }

    /// Packing counts units only; there is nothing to scan first.
    pub fn pack() -> Self {
        Self(vec![StepKind::Quantity])
    }

    pub fn kinds(&self) -> &[StepKind] {
        &self.0
    }

    pub fn contains(&self, kind: StepKind) -> bool {
        self.0.contains(&kind)
    }
}

impl Default for StepOrder {
    fn default() -> Self {
        Self::pick()
    }
}

impl TryFrom<Vec<String>> for StepOrder {
    type Error = StepOrderError;

    fn try_from(names: Vec<String>) -> Result<Self, Self::Error> {
        Self::parse(names)
    }
}

impl From<StepOrder> for Vec<String> {
    fn from(order: StepOrder) -> Self {
        order.0.iter().map(|k| k.as_str().to_string()).collect()
    }
}

/// The steps of a [`StepOrder`] that actually apply to one item, in order.
///
/// `Quantity` is never taken from its configured position: it is appended
/// last, and only when the item needs more than one unit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ApplicableSteps(Vec<StepKind>);

impl ApplicableSteps {
    pub fn resolve(order: &StepOrder, item: &WorkItem) -> Self {
        let mut steps: Vec<StepKind> = order
            .kinds()
            .iter()
            .copied()
            .filter(|kind| *kind != StepKind::Quantity && kind.applies_to(item))
            .collect();
        if StepKind::Quantity.applies_to(item) {
            steps.push(StepKind::Quantity);
        }
        Self(steps)
    }

    pub fn first_applicable(&self) -> Step {
        self.0.first().map_or(Step::Complete, |kind| Step::Scan(*kind))
    }

    /// The step following `current`, or [`Step::Complete`] past the end.
    pub fn next_applicable(&self, current: StepKind) -> Step {
        self.after(Some(current))
            .next()
            .map_or(Step::Complete, Step::Scan)
    }

    /// Steps strictly after `current`; all of them when `current` is `None`.
    pub fn after(&self, current: Option<StepKind>) -> impl Iterator<Item = StepKind> + '_ {
        let start = match current {
            Some(kind) => self
                .0
                .iter()
                .position(|k| *k == kind)
                .map_or(self.0.len(), |pos| pos + 1),
            None => 0,
        };
        self.0[start..].iter().copied()
    }

    pub fn contains(&self, kind: StepKind) -> bool {
        self.0.contains(&kind)
    }

    pub fn as_slice(&self) -> &[StepKind] {
        &self.0
    }

    /// Applicable steps that gate confirmation (everything but `Quantity`).
    pub fn gating(&self) -> impl Iterator<Item = StepKind> + '_ {
        self.0
            .iter()
            .copied()
            .filter(|kind| *kind != StepKind::Quantity)
    }
}
