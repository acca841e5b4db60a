//! Terminal output for an interactive pick or pack session.
//!
//! Uses `indicatif` for a spinner while the server is working and `console`
//! for colored feedback, green for verified steps, red for wrong scans and
//! yellow for quantity limits.

use std::time::Duration;

use console::Style;
use indicatif::{ProgressBar, ProgressStyle};

use pickscan::backend::{ConfirmationRecord, Finalized};
use pickscan::scan::{ScanOutcome, ScanSequencer, Signal, Step, StepKind};
use pickscan::workflow::{ItemWorkflow, ListKind};

pub struct ScanConsole {
    green: Style,
    red: Style,
    yellow: Style,
    dim: Style,
}

impl Default for ScanConsole {
    fn default() -> Self {
        Self::new()
    }
}

impl ScanConsole {
    pub fn new() -> Self {
        Self {
            green: Style::new().green().bold(),
            red: Style::new().red().bold(),
            yellow: Style::new().yellow(),
            dim: Style::new().dim(),
        }
    }

    /// Starts a spinner for a server round-trip. Call `finish_and_clear` on
    /// the returned bar when the call is done.
    pub fn waiting(&self, message: &str) -> ProgressBar {
        let pb = ProgressBar::new_spinner();
        if let Ok(style) = ProgressStyle::default_spinner().template("{spinner:.cyan} {msg}") {
            pb.set_style(style);
        }
        pb.set_message(message.to_string());
        pb.enable_steady_tick(Duration::from_millis(100));
        pb
    }

    pub fn progress(&self, workflow: &ItemWorkflow) {
        let label = match workflow.kind() {
            ListKind::Pick => "Picked",
            ListKind::Pack => "Packed",
        };
        println!(
            "{}",
            self.dim.apply_to(format!(
                "{label}: {} / {}",
                workflow.completed_count(),
                workflow.total()
            ))
        );
    }

    /// Shows the current item, its step indicator and what to do next.
    pub fn item(&self, workflow: &ItemWorkflow) {
        let sequencer = workflow.sequencer();
        let item = sequencer.item();
        println!();
        println!(
            "[{}] {}  {} / {}",
            workflow.current_index() + 1,
            self.green.apply_to(&item.item_code),
            sequencer.accumulated_qty(),
            item.required_qty
        );
        match workflow.kind() {
            ListKind::Pick => {
                if !item.target_location_hint.is_empty() {
                    println!("    Location: {}", item.target_location_hint);
                }
                if let Some(batch) = &item.batch_hint {
                    println!("    Batch: {batch}");
                }
                if let Some(container) = sequencer.container() {
                    println!("    Add to box: {container}");
                }
            }
            ListKind::Pack => {
                println!("    Already packed: {}", workflow.current_line().confirmed_qty);
                if let Some(package) = sequencer.container() {
                    println!("    Package: {package}");
                }
            }
        }
        if !sequencer.applicable().as_slice().is_empty() {
            println!("    {}", self.indicator(sequencer));
        }
        println!(
            "    {}",
            self.dim
                .apply_to(prompt(workflow.kind(), sequencer.current_step()))
        );
    }

    fn indicator(&self, sequencer: &ScanSequencer) -> String {
        sequencer
            .applicable()
            .as_slice()
            .iter()
            .map(|kind| {
                let label = kind.to_string();
                if sequencer.is_verified(*kind) {
                    self.green.apply_to(format!("✓ {label}")).to_string()
                } else if sequencer.current_step() == Step::Scan(*kind) {
                    format!("> {label}")
                } else {
                    self.dim.apply_to(label).to_string()
                }
            })
            .collect::<Vec<_>>()
            .join("  ")
    }

    pub fn outcome(&self, outcome: &ScanOutcome) {
        for signal in &outcome.signals {
            match signal {
                Signal::Verified(kind) => {
                    println!("  {} {} verified", self.green.apply_to("✓"), label(*kind));
                }
                Signal::WrongItem { expected, scanned } => {
                    println!(
                        "  {} Wrong item {scanned}! Expected: {expected}",
                        self.red.apply_to("✗")
                    );
                }
                Signal::QuantityChanged(qty) => println!("  qty {qty}"),
                Signal::MaxQuantityReached => {
                    println!("  {}", self.yellow.apply_to("Maximum quantity reached"));
                }
                Signal::MinQuantityReached => {
                    println!("  {}", self.yellow.apply_to("Quantity is already zero"));
                }
                Signal::ContainerAssigned(container) => println!("  box {container}"),
                Signal::Ignored => {}
            }
        }
    }

    pub fn confirmed(&self, kind: ListKind, item_code: &str, qty: u32) {
        let verb = match kind {
            ListKind::Pick => "picked",
            ListKind::Pack => "packed",
        };
        println!("  {} Item {item_code} {verb} ({qty})", self.green.apply_to("✓"));
    }

    /// Prints confirmation records as pretty JSON.
    pub fn print_records(&self, records: &[ConfirmationRecord]) {
        println!();
        println!("{}", self.dim.apply_to("─── Confirmations ───"));
        println!(
            "{}",
            serde_json::to_string_pretty(records).unwrap_or_default()
        );
    }

    pub fn finished(&self, kind: ListKind, finalized: &Finalized) {
        let (banner, documents) = match kind {
            ListKind::Pick => ("─── Picking Complete ───", "delivery note(s)"),
            ListKind::Pack => ("─── Packing Complete ───", "shipment(s)"),
        };
        println!();
        println!("{}", self.green.apply_to(banner));
        if finalized.created_documents.is_empty() {
            println!("No {documents} created.");
        } else {
            println!(
                "Created {} {documents}: {}",
                finalized.created_documents.len(),
                finalized.created_documents.join(", ")
            );
        }
    }

    pub fn failure(&self, message: &str) {
        println!("  {} {message}", self.red.apply_to("✗"));
    }

    pub fn notice(&self, message: &str) {
        println!("  {}", self.yellow.apply_to(message));
    }
}

fn label(kind: StepKind) -> &'static str {
    match kind {
        StepKind::Location => "Location",
        StepKind::Batch => "Batch",
        StepKind::Item => "Item",
        StepKind::Container => "Box",
        StepKind::Quantity => "Quantity",
    }
}

fn prompt(kind: ListKind, step: Step) -> &'static str {
    match (kind, step) {
        (ListKind::Pack, Step::Scan(StepKind::Quantity)) => {
            "Use +/- to set the packed quantity, then c to confirm"
        }
        (_, step) => scan_prompt(step),
    }
}

fn scan_prompt(step: Step) -> &'static str {
    match step {
        Step::Scan(StepKind::Location) => "Scan location barcode or enter manually",
        Step::Scan(StepKind::Batch) => "Scan batch number or enter manually",
        Step::Scan(StepKind::Item) => "Scan item barcode",
        Step::Scan(StepKind::Container) => "Scan box barcode or enter box number",
        Step::Scan(StepKind::Quantity) => "Scan item again or use +/- to adjust quantity",
        Step::Complete => "All steps verified - enter c to confirm",
    }
}
