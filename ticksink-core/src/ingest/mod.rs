//! From raw feed updates to persisted points

pub mod dispatcher;
pub mod fields;
pub mod instruments;
pub mod registry;

pub use dispatcher::{DispatchOutcome, UpdateDispatcher};
pub use fields::TickFields;
pub use instruments::{load_instruments, parse_instruments};
pub use registry::InstrumentRegistry;
