use anyhow::{Context, Result};
use async_trait::async_trait;
use booth_core::cards::{self, Card};
use std::path::PathBuf;
use tracing::info;

#[async_trait]
pub trait DeckLoader: Send + Sync {
    /// Fetch the deck in file order. Shuffling is the controller's job.
    async fn load(&self) -> Result<Vec<Card>>;
}

/// Loads the deck from a JSON file (an array of cards).
pub struct JsonDeckLoader {
    path: PathBuf,
}

impl JsonDeckLoader {
    pub fn new(path: PathBuf) -> Self {
        Self { path }
    }
}

#[async_trait]
impl DeckLoader for JsonDeckLoader {
    async fn load(&self) -> Result<Vec<Card>> {
        let contents = tokio::fs::read_to_string(&self.path)
            .await
            .with_context(|| format!("reading deck from {}", self.path.display()))?;
        let deck = cards::parse_deck(&contents)?;
        info!(path = %self.path.display(), size = deck.len(), "deck read");
        Ok(deck)
    }
}
