//! Usage: Process wiring (logging bootstrap and the coordinator handle).

pub(crate) mod app_state;
pub mod logging;
