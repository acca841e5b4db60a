//! Guided scan verification for warehouse pick lists and delivery notes.
//!
//! A pick walks each line of a list through a configurable sequence of
//! scans (location, batch, item, box) and a quantity count before the line
//! is confirmed to the server. Finishing a pick list yields delivery notes;
//! packing one counts its lines into packages and ends with a shipment.
//! [`scan`] holds the per-line state machine, [`workflow`] iterates the
//! list and [`session`] wires both to a [`backend::WarehouseBackend`].

pub mod backend;
pub mod config;
pub mod error;
pub mod scan;
pub mod session;
pub mod workflow;

pub use error::{PickscanError, StepOrderError, WorkflowError};
