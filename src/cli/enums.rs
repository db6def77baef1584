//! CLI enum types for the preview options.

use clap::ValueEnum;

use crate::preview;

/// ASCII character set for the preview.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum CharacterSet {
    #[default]
    Standard,
    Blocks,
    Minimal,
}

impl From<CharacterSet> for preview::CharSet {
    fn from(c: CharacterSet) -> Self {
        match c {
            CharacterSet::Standard => preview::CharSet::Standard,
            CharacterSet::Blocks => preview::CharSet::Blocks,
            CharacterSet::Minimal => preview::CharSet::Minimal,
        }
    }
}

impl CharacterSet {
    /// Name as written in the config file.
    pub fn config_name(self) -> &'static str {
        preview::CharSet::from(self).name()
    }
}
