//! Terminal front end for the demo binary

pub mod command;
pub mod console;
pub mod renderer;

pub use command::ConsoleCommand;
pub use console::Console;
pub use renderer::{ConsoleRenderer, RenderOutcome};
