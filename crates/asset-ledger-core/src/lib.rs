//! Identity reconciliation and lifecycle/ledger consistency for IT assets
//! and software licenses.

pub mod analysis;
pub mod bulk;
pub mod clock;
pub mod config;
pub mod directory;
pub mod engine;
pub mod error;
pub mod inventory;
pub mod ledger;
pub mod lifecycle;
pub mod model;
pub mod progress;
pub mod storage;

pub use analysis::reconcile::{reconcile, ReconcileOptions, ReconcileOutcome};
pub use bulk::{BulkCoordinator, BulkResult};
pub use clock::{Clock, FixedClock, SystemClock};
pub use config::AppConfig;
pub use engine::{ReconcileEngine, ReconcileReport};
pub use error::{EntityKind, Error, ErrorKind, Result};
pub use inventory::Inventory;
pub use progress::{ProgressReporter, SilentReporter};
