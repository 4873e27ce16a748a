//! Joke API type definitions
//!
//! These types mirror the joke API responses and are used for deserialization.

use std::fmt;
use std::str::FromStr;

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Lowest joke id served by the joke API
pub const MIN_JOKE_ID: u32 = 1;

/// Highest joke id served by the joke API
pub const MAX_JOKE_ID: u32 = 451;

/// Whether `id` falls inside the joke API's id range
pub fn is_valid_joke_id(id: u32) -> bool {
    (MIN_JOKE_ID..=MAX_JOKE_ID).contains(&id)
}

/// Joke category
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "kebab-case")]
pub enum JokeType {
    General,
    KnockKnock,
    Programming,
    Dad,
}

impl JokeType {
    /// Every category, in API order
    pub const ALL: [JokeType; 4] = [
        JokeType::General,
        JokeType::KnockKnock,
        JokeType::Programming,
        JokeType::Dad,
    ];

    /// Tag used by the joke API
    pub fn as_str(&self) -> &'static str {
        match self {
            JokeType::General => "general",
            JokeType::KnockKnock => "knock-knock",
            JokeType::Programming => "programming",
            JokeType::Dad => "dad",
        }
    }
}

impl fmt::Display for JokeType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for JokeType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        JokeType::ALL
            .into_iter()
            .find(|t| t.as_str() == s.trim())
            .ok_or_else(|| {
                let valid: Vec<&str> = JokeType::ALL.iter().map(JokeType::as_str).collect();
                format!("unknown joke type '{}', expected one of {:?}", s, valid)
            })
    }
}

/// A single joke
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Joke {
    /// Category of the joke
    #[serde(rename = "type")]
    pub joke_type: JokeType,

    /// Setup line
    pub setup: String,

    /// Punchline
    pub punchline: String,

    /// Joke identifier (1-451)
    pub id: u32,
}

/// An ordered collection of jokes
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct JokeCollection {
    jokes: Vec<Joke>,
}

impl JokeCollection {
    pub fn new(jokes: Vec<Joke>) -> Self {
        Self { jokes }
    }

    pub fn jokes(&self) -> &[Joke] {
        &self.jokes
    }

    pub fn first(&self) -> Option<&Joke> {
        self.jokes.first()
    }

    pub fn len(&self) -> usize {
        self.jokes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.jokes.is_empty()
    }

    /// Keep at most `count` jokes
    pub fn truncated(mut self, count: usize) -> Self {
        self.jokes.truncate(count);
        self
    }
}

impl From<Vec<Joke>> for JokeCollection {
    fn from(jokes: Vec<Joke>) -> Self {
        Self::new(jokes)
    }
}
