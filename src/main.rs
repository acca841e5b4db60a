mod cli;
mod ui;

use std::future::Future;
use std::pin::Pin;

use anyhow::Result;
use clap::Parser;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing_subscriber::EnvFilter;

use cli::{Cli, Command};
use pickscan::PickscanError;
use pickscan::backend::{Finalized, HttpBackend, MemoryBackend, ShipmentDetails, WarehouseBackend};
use pickscan::config::PickscanConfig;
use pickscan::scan::{ApplicableSteps, PickLine, WorkItem};
use pickscan::session::{ConfirmOutcome, ListSession, Opened, SessionSettings};
use ui::ScanConsole;

const DEMO_LIST: &str = "PL-DEMO-0001";

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let config = PickscanConfig::load_from(&cli.config)?;
    let console = ScanConsole::new();

    match cli.command {
        Command::Pick { list } => {
            let settings = config.session_settings();
            run_session(&config, &list, &settings, &console).await
        }
        Command::Pack {
            delivery_note,
            shipment,
        } => {
            let settings = config.session_settings().packing(shipment.into());
            run_session(&config, &delivery_note, &settings, &console).await
        }
        Command::Demo => {
            let backend = MemoryBackend::new().with_lock_timeout(config.scan.lock_timeout()?);
            play_demo(&backend, &config, &console).await?;
            console.print_records(&backend.confirmations().await);
            Ok(())
        }
        Command::Steps { batch, qty } => {
            run_steps(&config, batch, qty);
            Ok(())
        }
    }
}

fn init_tracing(verbose: bool) {
    let default = if verbose { "debug" } else { "warn" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

/// Ctrl-C watcher shared by every await of one session.
///
/// Server calls run to completion even when interrupted, so a lock taken by
/// `open` is always known and can be released.
struct Interrupt {
    signal: Pin<Box<dyn Future<Output = std::io::Result<()>> + Send>>,
    fired: bool,
}

impl Interrupt {
    fn new() -> Self {
        Self {
            signal: Box::pin(tokio::signal::ctrl_c()),
            fired: false,
        }
    }

    fn fired(&self) -> bool {
        self.fired
    }

    /// Drives `work` to completion, noting a Ctrl-C that arrives meanwhile.
    async fn finish<F: Future>(&mut self, work: F) -> F::Output {
        tokio::pin!(work);
        if !self.fired {
            tokio::select! {
                out = &mut work => return out,
                _ = &mut self.signal => self.fired = true,
            }
        }
        work.await
    }

    /// Drives `work` unless Ctrl-C arrives first; `None` when interrupted.
    async fn race<F: Future>(&mut self, work: F) -> Option<F::Output> {
        if self.fired {
            return None;
        }
        tokio::select! {
            out = work => Some(out),
            _ = &mut self.signal => {
                self.fired = true;
                None
            }
        }
    }
}

async fn run_session(
    config: &PickscanConfig,
    list: &str,
    settings: &SessionSettings,
    console: &ScanConsole,
) -> Result<()> {
    let backend = HttpBackend::new(
        config.server.base_url.clone(),
        &config.server.api_key,
        &config.server.api_secret,
    )?;
    let mut interrupt = Interrupt::new();

    let spinner = console.waiting(&format!("Opening {list}..."));
    let opened = interrupt
        .finish(ListSession::open(&backend, list, settings))
        .await;
    spinner.finish_and_clear();

    let mut session = match opened {
        Ok(Opened::Ready(session)) => session,
        Ok(Opened::Finished(finalized)) => {
            console.finished(settings.kind, &finalized);
            return Ok(());
        }
        Err(e @ PickscanError::LockDenied { .. }) => {
            console.failure(&e.to_string());
            console.notice("Wait until they complete or the lock expires.");
            return Ok(());
        }
        Err(e) => return Err(e.into()),
    };

    let result = if interrupt.fired() {
        Ok(())
    } else {
        interactive(&mut session, console, &mut interrupt).await
    };
    if interrupt.fired() {
        console.notice("Interrupted, releasing the lock.");
    }
    session.close().await;
    result
}

/// One line of operator input.
#[derive(Debug, PartialEq, Eq)]
enum Input<'a> {
    Scan(&'a str),
    Increment,
    Decrement,
    Confirm,
    Select(usize),
    Quit,
}

impl<'a> Input<'a> {
    fn parse(line: &'a str) -> Self {
        let line = line.trim();
        match line {
            "+" => Input::Increment,
            "-" => Input::Decrement,
            "c" => Input::Confirm,
            "q" => Input::Quit,
            _ => match line.strip_prefix("s ").map(|n| n.trim().parse::<usize>()) {
                Some(Ok(n)) if n > 0 => Input::Select(n - 1),
                _ => Input::Scan(line),
            },
        }
    }
}

async fn interactive<B: WarehouseBackend>(
    session: &mut ListSession<'_, B>,
    console: &ScanConsole,
    interrupt: &mut Interrupt,
) -> Result<()> {
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    console.progress(session.workflow());
    console.item(session.workflow());

    loop {
        let Some(line) = interrupt.race(lines.next_line()).await else {
            return Ok(());
        };
        let Some(line) = line? else {
            return Ok(());
        };

        match Input::parse(&line) {
            Input::Quit => return Ok(()),
            Input::Increment => console.outcome(&session.increment()),
            Input::Decrement => console.outcome(&session.decrement()),
            Input::Select(index) => match session.select_item(index) {
                Ok(_) => console.item(session.workflow()),
                Err(e) => console.failure(&e.to_string()),
            },
            Input::Confirm => {
                let kind = session.kind();
                let item_code = session.sequencer().item().item_code.clone();
                let qty = session.sequencer().accumulated_qty();
                let spinner = console.waiting("Saving...");
                let confirmed = interrupt.finish(session.confirm()).await;
                spinner.finish_and_clear();
                match confirmed {
                    Ok(ConfirmOutcome::Next(_)) => {
                        console.confirmed(kind, &item_code, qty);
                        console.progress(session.workflow());
                        console.item(session.workflow());
                    }
                    Ok(ConfirmOutcome::Finished(finalized)) => {
                        console.confirmed(kind, &item_code, qty);
                        console.finished(kind, &finalized);
                        return Ok(());
                    }
                    // Every confirm failure is retryable from the same state.
                    Err(e) => console.failure(&e.to_string()),
                }
                if interrupt.fired() {
                    return Ok(());
                }
            }
            Input::Scan(value) => {
                let outcome = session.scan(value);
                console.outcome(&outcome);
                console.item(session.workflow());
            }
        }
    }
}

/// Documents the demo created along the way.
#[derive(Debug, Default)]
struct DemoSummary {
    delivery_notes: Vec<String>,
    shipments: Vec<String>,
}

/// Picks a three-line list, then packs every delivery note it produced.
async fn play_demo(
    backend: &MemoryBackend,
    config: &PickscanConfig,
    console: &ScanConsole,
) -> Result<DemoSummary> {
    backend.insert_list(DEMO_LIST, demo_lines()).await;
    let mut summary = DemoSummary::default();

    let pick_script: &[&str] = &[
        "A1-01", "SKU-RED", "+", "+", "c", // three red shirts
        "B2-04", "LOT-2024-11", "SKU-BLUE", "c", // one tracked blue shirt
        "C3-02", "SKU-GREEN-WRONG", "7891000100127", "c",
    ];
    let settings = config.session_settings();
    if let Some(picked) = play(backend, DEMO_LIST, &settings, pick_script, console).await? {
        summary.delivery_notes = picked.created_documents;
    }

    let packing = settings.packing(ShipmentDetails {
        carrier: Some("Demo Express".to_string()),
        ..ShipmentDetails::default()
    });
    for note in &summary.delivery_notes {
        let lines = backend.lines(packing.kind, note).await.map_or(0, |l| l.len());
        let pack_script = vec!["c"; lines];
        if let Some(shipped) = play(backend, note, &packing, &pack_script, console).await? {
            summary.shipments.extend(shipped.created_documents);
        }
    }
    Ok(summary)
}

/// Feeds `script` to a session; returns what finishing the list created.
async fn play(
    backend: &MemoryBackend,
    list: &str,
    settings: &SessionSettings,
    script: &[&str],
    console: &ScanConsole,
) -> Result<Option<Finalized>> {
    let kind = settings.kind;
    let mut session = match ListSession::open(backend, list, settings).await? {
        Opened::Ready(session) => session,
        Opened::Finished(finalized) => {
            console.finished(kind, &finalized);
            return Ok(Some(finalized));
        }
    };

    console.item(session.workflow());
    let mut finished = None;
    for step in script {
        println!("> {step}");
        match Input::parse(step) {
            Input::Increment => console.outcome(&session.increment()),
            Input::Decrement => console.outcome(&session.decrement()),
            Input::Confirm => match session.confirm().await {
                Ok(ConfirmOutcome::Next(_)) => console.item(session.workflow()),
                Ok(ConfirmOutcome::Finished(finalized)) => {
                    console.finished(kind, &finalized);
                    finished = Some(finalized);
                    break;
                }
                Err(e) => console.failure(&e.to_string()),
            },
            Input::Scan(value) => console.outcome(&session.scan(value)),
            Input::Select(_) | Input::Quit => {}
        }
    }
    session.close().await;
    Ok(finished)
}

fn demo_lines() -> Vec<PickLine> {
    vec![
        PickLine::new(
            WorkItem::new("SKU-RED", 3)
                .with_idx(1)
                .with_location("A1-01")
                .with_group("SO-1001"),
        ),
        PickLine::new(
            WorkItem::new("SKU-BLUE", 1)
                .with_idx(2)
                .with_location("B2-04")
                .with_batch_tracking(true)
                .with_group("SO-1001"),
        ),
        PickLine::new(
            WorkItem::new("SKU-GREEN", 1)
                .with_idx(3)
                .with_location("C3-02")
                .with_barcode("7891000100127")
                .with_group("SO-1002"),
        ),
    ]
}

fn run_steps(config: &PickscanConfig, batch: bool, qty: u32) {
    let item = WorkItem::new("ITEM", qty).with_batch_tracking(batch);
    let steps = ApplicableSteps::resolve(&config.scan.steps, &item);
    let names: Vec<String> = steps.as_slice().iter().map(ToString::to_string).collect();
    println!("{}", names.join(" -> "));
}
