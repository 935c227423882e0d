pub mod command;
pub mod display;
pub mod listener;
pub mod supervisor;

pub use command::DecoderPlan;
pub use display::DisplaySupervisor;
pub use listener::{SquitterListener, StderrWatchdog};
pub use supervisor::{DecoderExit, ProcessSupervisor, Reconcile, Supervisor, SupervisorError};
