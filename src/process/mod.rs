// Process module - Entry command lifecycle

mod entry;
mod launcher;
pub mod spawner;

pub use entry::{exit_code, parse_signal, EntryProcess};
pub use launcher::launch;
pub use spawner::{spawn_process, EntrySpec, SpawnedProcess};
