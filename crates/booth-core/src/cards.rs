use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Languages that built-in cards are translated into.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Language {
    En,
    Es,
    Ca,
}

impl Language {
    /// Parse a language code; anything unsupported becomes English.
    pub fn from_code(code: &str) -> Self {
        match code.trim().to_lowercase().as_str() {
            "es" => Language::Es,
            "ca" => Language::Ca,
            _ => Language::En,
        }
    }

    pub fn code(self) -> &'static str {
        match self {
            Language::En => "en",
            Language::Es => "es",
            Language::Ca => "ca",
        }
    }
}

/// A prompt card. Deck files may give either a single `text` or a map of
/// per-language `texts`; `type` is a category tag the display styles on.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Card {
    #[serde(rename = "type", default = "Card::default_kind")]
    pub kind: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub texts: BTreeMap<String, String>,
}

impl Card {
    fn default_kind() -> String { "none".into() }

    pub fn new(kind: &str, text: &str) -> Self {
        Self {
            kind: kind.into(),
            text: Some(text.into()),
            texts: BTreeMap::new(),
        }
    }

    fn localized(kind: &str, texts: [(&str, &str); 3]) -> Self {
        Self {
            kind: kind.into(),
            text: None,
            texts: texts
                .into_iter()
                .map(|(lang, text)| (lang.to_string(), text.to_string()))
                .collect(),
        }
    }

    /// Text to display for `lang`: the matching translation, else the first
    /// translation, else the plain `text`, else empty.
    pub fn text_for(&self, lang: Language) -> &str {
        if !self.texts.is_empty() {
            return self
                .texts
                .get(lang.code())
                .or_else(|| self.texts.values().next())
                .map(String::as_str)
                .unwrap_or("");
        }
        self.text.as_deref().unwrap_or("")
    }
}

pub fn start_card() -> Card {
    Card::localized(
        "none",
        [
            ("en", "Click to start\n(📸 / ⚡️ / 💬)"),
            ("es", "Haz clic para empezar\n(📸 / ⚡️ / 💬)"),
            ("ca", "Fes clic per començar\n(📸 / ⚡️ / 💬)"),
        ],
    )
}

pub fn end_card() -> Card {
    Card::localized(
        "none",
        [
            ("en", "No more cards!"),
            ("es", "No hay más tarjetas!"),
            ("ca", "No queden targetes!"),
        ],
    )
}

pub fn burst_card() -> Card {
    Card::localized(
        "burst",
        [
            ("en", "Burst photo! 📸"),
            ("es", "¡Foto ráfaga! 📸"),
            ("ca", "Foto ràfega! 📸"),
        ],
    )
}

/// Parse a deck file: a JSON array of cards.
pub fn parse_deck(json: &str) -> Result<Vec<Card>> {
    serde_json::from_str(json).context("parsing deck JSON")
}
