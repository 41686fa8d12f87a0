//! Process lifecycle: signal handling and cooperative stop

mod shutdown;

pub use shutdown::{ShutdownSignal, StopFlag};
