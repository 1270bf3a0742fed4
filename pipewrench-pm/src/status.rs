// Progress lines printed while building and watching

use colored::*;
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Compiler,
    Watcher,
}

impl Stage {
    fn prefix(self) -> ColoredString {
        match self {
            Stage::Compiler => "[COMPILER]".cyan().bold(),
            Stage::Watcher => "[WATCHER]".magenta().bold(),
        }
    }

    /// Per-file action
    pub fn info(self, message: impl fmt::Display) {
        println!("{} {}", self.prefix(), message.to_string().bright_black());
    }

    /// Pass start and completion
    pub fn success(self, message: impl fmt::Display) {
        println!("{} {}", self.prefix(), message.to_string().bright_green());
    }

    pub fn warn(self, message: impl fmt::Display) {
        println!("{} {}", self.prefix(), message.to_string().yellow());
    }
}
