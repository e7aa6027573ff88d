//! Codename generation
//!
//! Builds requested without a name get a memorable `ADJECTIVE_NOUN` codename.

use rand::seq::SliceRandom;

use crate::error::BuildError;

/// Source of build codenames
pub trait CodenameGenerator: Send + Sync {
    /// Produce the next codename
    fn next(&self) -> Result<String, BuildError>;
}

const ADJECTIVES: &[&str] = &[
    "AMBER", "ASHEN", "BITTER", "BOLD", "BRAVE", "BRISK", "CALM", "CLEVER", "COLD", "CRIMSON",
    "DARK", "DUSTY", "EAGER", "FADED", "FIERCE", "GENTLE", "GOLDEN", "HIDDEN", "HOLLOW", "IRON",
    "JADE", "LONELY", "LUCKY", "MIDNIGHT", "MISTY", "NIMBLE", "OLD", "PALE", "QUIET", "RAPID",
    "RUSTY", "SILENT", "SILVER", "SLEEPY", "SOLAR", "STORMY", "SWIFT", "TIDY", "VELVET", "WILD",
];

const NOUNS: &[&str] = &[
    "BADGER", "BEACON", "CANYON", "CEDAR", "COMET", "CRANE", "DELTA", "EMBER", "FALCON", "FERRY",
    "GLACIER", "HARBOR", "HERON", "ISLAND", "JACKAL", "LANTERN", "MAPLE", "MEADOW", "OTTER", "PEBBLE",
    "PRISM", "RAVEN", "REEF", "SPARROW", "SUMMIT", "THISTLE", "TIDE", "TUNDRA", "VIPER", "WILLOW",
];

/// Picks a random adjective and noun from built-in word lists
#[derive(Debug, Clone)]
pub struct WordListCodenames {
    adjectives: Vec<String>,
    nouns: Vec<String>,
}

impl WordListCodenames {
    /// Use the built-in word lists
    pub fn new() -> Self {
        Self::with_words(
            ADJECTIVES.iter().map(|w| (*w).to_string()).collect(),
            NOUNS.iter().map(|w| (*w).to_string()).collect(),
        )
    }

    /// Use custom word lists
    pub fn with_words(adjectives: Vec<String>, nouns: Vec<String>) -> Self {
        Self { adjectives, nouns }
    }

    /// Built-in lists, each replaced when an override is given
    pub fn with_overrides(adjectives: Option<Vec<String>>, nouns: Option<Vec<String>>) -> Self {
        let builtin = Self::new();
        Self {
            adjectives: adjectives.unwrap_or(builtin.adjectives),
            nouns: nouns.unwrap_or(builtin.nouns),
        }
    }
}

impl Default for WordListCodenames {
    fn default() -> Self {
        Self::new()
    }
}

impl CodenameGenerator for WordListCodenames {
    fn next(&self) -> Result<String, BuildError> {
        let mut rng = rand::thread_rng();
        let adjective = self.adjectives.choose(&mut rng);
        let noun = self.nouns.choose(&mut rng);
        match (adjective, noun) {
            (Some(adjective), Some(noun)) => Ok(format!("{adjective}_{noun}")),
            _ => Err(BuildError::Codename {
                error: "word list is empty".to_string(),
            }),
        }
    }
}
