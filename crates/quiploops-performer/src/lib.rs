mod generator;
mod prompts;

pub use generator::{Draft, Generator};
pub use prompts::GeneratorPrompts;
