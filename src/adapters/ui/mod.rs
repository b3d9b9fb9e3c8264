pub mod banner;
pub mod notify;
pub mod repl;
pub mod view;

pub use notify::ConsoleNotifier;
pub use repl::ReplInputPort;

/// Prints the welcome banner and applies the prompt theme for all
/// subsequent inquire prompts. Call once at startup after tracing init.
pub fn init_ui() {
    banner::print_welcome();
    repl::apply_theme();
}
