pub mod controller;
pub mod repl;

pub use controller::{Controller, Mirror, SubmitError};
pub use repl::{Action, Repl};
