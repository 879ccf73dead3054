//! Config entries
//!
//! Config entries are the configured instances of integrations. This crate
//! holds the entry model and its lifecycle, the manager that persists
//! entries and drives setup/unload through [`Integration`]s, and the config
//! flows that create new entries.
//!
//! Entries persist in `<config_dir>/.storage/core.config_entries`.

pub mod entry;
pub mod flow;
pub mod integration;
pub mod manager;
pub mod state_machine;
pub mod storage;

pub use entry::{ConfigEntry, ConfigEntrySource, ConfigEntryState};
pub use flow::{
    ConfigFlow, FlowContext, FlowError, FlowFactory, FlowManager, FlowResult, FlowStep, FormField,
    ABORT_ALREADY_CONFIGURED, STEP_USER,
};
pub use integration::Integration;
pub use manager::{
    ConfigEntries, ConfigEntriesData, ConfigEntriesError, ConfigEntriesResult, STORAGE_KEY,
};
pub use state_machine::{calculate_retry_delay, InvalidTransition};
pub use storage::{StorageError, Store};
