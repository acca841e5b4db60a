//! Command line interface.

use std::path::PathBuf;

use chrono::NaiveDate;
use clap::{Args, Parser, Subcommand};

use pickscan::backend::ShipmentDetails;

/// pickscan: guided barcode verification for warehouse pick and pack.
#[derive(Debug, Parser)]
#[command(name = "pickscan", version, about)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    /// Path to the config file.
    #[arg(long, global = true, default_value = pickscan::config::DEFAULT_CONFIG_FILE)]
    pub config: PathBuf,

    /// Enable debug logging.
    #[arg(long, short, global = true, default_value_t = false)]
    pub verbose: bool,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Pick a list interactively against the configured server.
    Pick {
        /// Pick list id.
        list: String,
    },

    /// Pack a delivery note and create its shipment.
    Pack {
        /// Delivery note id.
        delivery_note: String,

        #[command(flatten)]
        shipment: ShipmentArgs,
    },

    /// Run a scripted pick and pack against in-memory lists.
    Demo,

    /// Print the steps an item would go through with the configured order.
    Steps {
        /// The item is batch tracked.
        #[arg(long, default_value_t = false)]
        batch: bool,

        /// Required quantity.
        #[arg(long, default_value_t = 1)]
        qty: u32,
    },
}

/// Carrier details sent with the shipment once packing is done.
#[derive(Debug, Args)]
pub struct ShipmentArgs {
    #[arg(long)]
    pub carrier: Option<String>,

    /// Tracking number.
    #[arg(long = "tracking")]
    pub tracking_no: Option<String>,

    /// Shipment date (YYYY-MM-DD); defaults to today.
    #[arg(long)]
    pub date: Option<NaiveDate>,

    #[arg(long)]
    pub notes: Option<String>,
}

impl From<ShipmentArgs> for ShipmentDetails {
    fn from(args: ShipmentArgs) -> Self {
        Self {
            carrier: args.carrier,
            tracking_no: args.tracking_no,
            shipment_date: args.date,
            notes: args.notes,
        }
    }
}
