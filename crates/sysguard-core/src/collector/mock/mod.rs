//! Mock filesystem and probes for testing without real `/proc`.

mod filesystem;
mod probe;
mod scenarios;

pub use filesystem::MockFs;
pub use probe::ScriptedProbe;
