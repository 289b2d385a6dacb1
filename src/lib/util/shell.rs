//! Pretty-printing to the user. Distinct from `slog` logging: this is for
//! things the user wants to see, not for debugging the tool itself.

use console::style;

/// The requested verbosity of user-facing output.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verbosity {
    Verbose,
    Normal,
    Quiet,
}

#[derive(Debug, Clone)]
pub struct Shell {
    verbosity: Verbosity,
}

impl Shell {
    pub fn new(verbosity: Verbosity) -> Self {
        Shell { verbosity }
    }

    pub fn status(&self, tag: &str, message: impl AsRef<str>) {
        if self.verbosity != Verbosity::Quiet {
            println!("{:>7} {}", style(tag).green().bold(), message.as_ref());
        }
    }

    pub fn warn(&self, message: impl AsRef<str>) {
        if self.verbosity != Verbosity::Quiet {
            eprintln!("{} {}", style("[warn]").yellow().bold(), message.as_ref());
        }
    }
}

impl Default for Shell {
    fn default() -> Self {
        Shell::new(Verbosity::Normal)
    }
}
