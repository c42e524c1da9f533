// gRPC Gen - Console Output
// Colored status lines and the process-wide verbose switch

use std::fmt::Display;
use std::sync::atomic::{AtomicBool, Ordering};

use colored::Colorize;

use crate::error::{GenError, Warning};

static VERBOSE: AtomicBool = AtomicBool::new(false);

/// Enable or disable verbose output for the whole process
pub fn set_verbose(enabled: bool) {
    VERBOSE.store(enabled, Ordering::Relaxed);
}

pub fn is_verbose() -> bool {
    VERBOSE.load(Ordering::Relaxed)
}

/// Print a line only in verbose mode
pub fn verbose(message: impl Display) {
    if is_verbose() {
        println!("{} {}", "[VERBOSE]".bright_black(), message);
    }
}

/// Print a status line: a green verb followed by the details
pub fn status(verb: &str, message: impl Display) {
    println!("{} {}", verb.green().bold(), message);
}

/// Print a step inside the current status block
pub fn step(message: impl Display) {
    println!("  {} {}", "→".blue(), message);
}

pub fn warning(warning: &Warning) {
    eprint!("{}", warning.format_colored());
}

pub fn error(error: &GenError) {
    eprint!("{}", error.format_colored());
}

/// Local wall-clock time used to prefix watch-mode lines
pub fn timestamp() -> String {
    chrono::Local::now().format("%H:%M:%S").to_string()
}
