//! Joke API module
//!
//! Contains the joke value types and the HTTP client for the joke API.

pub mod client;
pub mod types;

pub use client::JokeApiClient;
pub use types::{Joke, JokeCollection, JokeType};
