// Copyright 2025 JiangLong.
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

use tracing::Level;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Verbosity {
    Quiet,
    #[default]
    Normal,
    Verbose,
}

/// Output settings chosen on the command line and handed to the subscriber.
#[derive(Debug, Clone, Copy, Default)]
pub struct LogConfig {
    pub verbosity: Verbosity,
}

impl LogConfig {
    /// `quiet` wins when both flags are given.
    pub fn from_flags(verbose: bool, quiet: bool) -> Self {
        let verbosity = if quiet {
            Verbosity::Quiet
        } else if verbose {
            Verbosity::Verbose
        } else {
            Verbosity::Normal
        };
        Self { verbosity }
    }

    pub fn max_level(&self) -> Level {
        match self.verbosity {
            Verbosity::Quiet => Level::ERROR,
            Verbosity::Normal => Level::INFO,
            Verbosity::Verbose => Level::DEBUG,
        }
    }

    pub fn init_subscriber(&self) {
        let _ = tracing_subscriber::fmt()
            .with_max_level(self.max_level())
            .with_target(self.verbosity == Verbosity::Verbose)
            .try_init();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_flags() {
        assert_eq!(LogConfig::from_flags(false, false).max_level(), Level::INFO);
        assert_eq!(LogConfig::from_flags(true, false).max_level(), Level::DEBUG);
        assert_eq!(LogConfig::from_flags(true, true).max_level(), Level::ERROR);
    }
}
