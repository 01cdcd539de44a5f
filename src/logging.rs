/* ************************************************************************ **
** This file is part of elph, and is licensed under EITHER the MIT license  **
** or the Apache 2.0 license, at your option.                               **
**                                                                          **
**     http://www.apache.org/licenses/LICENSE-2.0                           **
**     http://opensource.org/licenses/MIT                                   **
**                                                                          **
** Be aware that not all of elph is provided under this permissive license, **
** and that the project as a whole is licensed under the GPL 3.0.           **
** ************************************************************************ */

use std::fmt;
use std::path::{Path, PathBuf};

use ansi_term::{Colour, Style};
use log::{Level, LevelFilter};

use elph_derivatives::FailResult;

/// Builder-style setup for logging
#[derive(Debug, Clone, Default)]
pub struct GlobalLogger {
    path: Option<PathBuf>,
    verbosity: Verbosity,
    color: bool,
}

impl GlobalLogger {
    /// Also write the log to a file.
    ///
    /// Relative paths will not be resolved until apply() is called.
    pub fn path<P: AsRef<Path>>(&mut self, path: P) -> &mut Self
    { self.path = Some(path.as_ref().to_owned()); self }

    /// Any integer will be accepted; the level will be truncated
    /// to the most extreme value supported.
    pub fn verbosity(&mut self, level: i32) -> &mut Self
    {
        self.verbosity = match level {
            i32::MIN..=-1 => Verbosity::Quiet,
            0 => Verbosity::Default,
            _ => Verbosity::Loud,
        };
        self
    }

    /// Colorize the level names.
    pub fn color(&mut self, color: bool) -> &mut Self
    { self.color = color; self }
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord)]
enum Verbosity { Quiet, Default, Loud }

impl Default for Verbosity {
    fn default() -> Self { Verbosity::Default }
}

impl Verbosity {
    fn elph_level(self) -> LevelFilter {
        match self {
            Verbosity::Quiet => LevelFilter::Warn,
            Verbosity::Default => LevelFilter::Info,
            Verbosity::Loud => LevelFilter::Trace,
        }
    }
}

/// Log targets of the workspace crates, which follow the verbosity.
/// Everything else is limited to warnings.
const ELPH_CRATES: &[&str] = &[
    "elph",
    "elph_linalg",
    "elph_structure",
    "elph_derivatives",
];

impl GlobalLogger {
    /// Install the logger. This can only succeed once per process.
    pub fn apply(&mut self) -> FailResult<()>
    {
        use std::time::Instant;

        let start = Instant::now();
        let color = self.color;
        let level = self.verbosity.elph_level();
        let mut fern = fern::Dispatch::new()
            .format(move |out, message, record| {
                let t = start.elapsed();
                out.finish(format_args!("[{:>4}.{:03}s][{}][{}] {}",
                    t.as_secs(),
                    t.subsec_millis(),
                    record.target(),
                    ColorizedLevel { level: record.level(), color },
                    message))
            })
            .level(LevelFilter::Warn)
            .chain(std::io::stdout());
        for &target in ELPH_CRATES {
            fern = fern.level_for(target, level);
        }

        if let Some(path) = self.path.as_ref() {
            fern = fern.chain(fern::log_file(path)?);
        }

        fern.apply()?;
        Ok(())
    }
}

#[derive(Debug, Copy, Clone)]
pub struct ColorizedLevel {
    pub level: Level,
    pub color: bool,
}

impl fmt::Display for ColorizedLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if !self.color {
            return write!(f, "{}", self.level);
        }
        let style: Style = match self.level {
            Level::Error => Colour::Red.bold(),
            Level::Warn  => Colour::Red.normal(),
            Level::Info  => Colour::Cyan.bold(),
            Level::Debug => Colour::Yellow.dimmed(),
            Level::Trace => Colour::Cyan.normal(),
        };
        write!(f, "{}", style.paint(self.level.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn verbosity_levels() {
        let mut logger = GlobalLogger::default();
        assert_eq!(logger.verbosity.elph_level(), LevelFilter::Info);
        assert_eq!(logger.verbosity(-3).verbosity.elph_level(), LevelFilter::Warn);
        assert_eq!(logger.verbosity(100).verbosity.elph_level(), LevelFilter::Trace);
    }

    #[test]
    fn workspace_crates_follow_verbosity() {
        for krate in &["elph_linalg", "elph_structure", "elph_derivatives"] {
            assert!(ELPH_CRATES.contains(krate), "{}", krate);
        }
        assert_eq!(module_path!().split("::").next(), Some("elph"));
        assert!(ELPH_CRATES.contains(&"elph"));
    }

    #[test]
    fn plain_level_names() {
        let level = ColorizedLevel { level: Level::Warn, color: false };
        assert_eq!(level.to_string(), "WARN");
        let colored = ColorizedLevel { level: Level::Warn, color: true };
        assert!(colored.to_string().contains("WARN"));
        assert_ne!(colored.to_string(), "WARN");
    }
}
