mod executor;
mod process;

pub use executor::Executor;
pub use process::{fork_or_die, reap};
