use std::fs;
use std::path::Path;

use anyhow::{Context as _, Result, bail, ensure};
use rust_embed::Embed;
use serde::Deserialize;

#[derive(Embed)]
#[folder = "assets/decks/"]
struct DeckAssets;

/// A vocabulary deck: categories of prompt words with accepted answers.
#[derive(Clone, Debug, Deserialize)]
pub struct Deck {
    pub name: String,
    pub prompt_language: String,
    pub answer_language: String,
    pub categories: Vec<Category>,
}

#[derive(Clone, Debug, Deserialize)]
pub struct Category {
    pub name: String,
    #[serde(default)]
    pub entries: Vec<Entry>,
}

#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
pub struct Entry {
    pub prompt: String,
    pub answers: Vec<String>,
}

impl Deck {
    pub fn from_json(json: &str) -> Result<Self> {
        let deck: Deck = serde_json::from_str(json)?;
        deck.validate()?;
        Ok(deck)
    }

    pub fn from_file(path: &Path) -> Result<Self> {
        let content =
            fs::read_to_string(path).with_context(|| format!("reading deck {}", path.display()))?;
        Self::from_json(&content).with_context(|| format!("loading deck {}", path.display()))
    }

    /// Every deck bundled with the binary, ordered by file name.
    pub fn embedded() -> Result<Vec<Self>> {
        let mut names: Vec<String> = DeckAssets::iter()
            .filter(|name| name.ends_with(".json"))
            .map(|name| name.to_string())
            .collect();
        names.sort();

        let mut decks = Vec::with_capacity(names.len());
        for name in names {
            let Some(file) = DeckAssets::get(&name) else {
                continue;
            };
            let json = std::str::from_utf8(file.data.as_ref())
                .with_context(|| format!("deck {name} is not UTF-8"))?;
            decks.push(Self::from_json(json).with_context(|| format!("loading deck {name}"))?);
        }
        if decks.is_empty() {
            bail!("no decks bundled");
        }
        Ok(decks)
    }

    pub fn languages(&self) -> String {
        format!("{} -> {}", self.prompt_language, self.answer_language)
    }

    /// Words from the selected categories. A prompt repeated across
    /// categories keeps the answers of the last one.
    pub fn words(&self, categories: &[usize]) -> Vec<Entry> {
        let mut words: Vec<Entry> = Vec::new();
        for category in categories.iter().filter_map(|&index| self.categories.get(index)) {
            for entry in &category.entries {
                match words.iter_mut().find(|word| word.prompt == entry.prompt) {
                    Some(existing) => existing.answers.clone_from(&entry.answers),
                    None => words.push(entry.clone()),
                }
            }
        }
        words
    }

    fn validate(&self) -> Result<()> {
        ensure!(!self.name.trim().is_empty(), "deck has no name");
        ensure!(!self.categories.is_empty(), "deck {} has no categories", self.name);
        for category in &self.categories {
            for entry in &category.entries {
                ensure!(
                    !entry.answers.is_empty(),
                    "word {:?} in {} has no answers",
                    entry.prompt,
                    category.name
                );
            }
        }
        Ok(())
    }
}
