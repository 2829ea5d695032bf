use std::collections::VecDeque;

use icu_normalizer::ComposingNormalizerBorrowed;
use rand::SeedableRng;
use rand::rngs::SmallRng;
use rand::seq::SliceRandom;

use super::deck::Entry;

const RECENT_WORDS: usize = 10;
/// Streaks shorter than this are not shown.
pub const MIN_STREAK_DISPLAY: u32 = 5;

const CONGRATULATIONS: &[&str] = &[
    "That is correct!",
    "Correct!",
    "Well done!",
    "This is proof of your genius",
];

const COMMISERATIONS: &[&str] = &[
    "Too bad!",
    "Too difficult?",
    "Oofie-doodle",
    "You didn't get that one",
];

/// Running state of a practice session across rounds.
pub struct Session {
    words: Vec<Entry>,
    recent: VecDeque<String>,
    rng: SmallRng,
    pub total_tests: u32,
    pub streak: u32,
    pub missed_words: Vec<String>,
    pub practice_words: Vec<String>,
}

impl Session {
    pub fn new(words: Vec<Entry>, seed: Option<u64>) -> Self {
        let rng = match seed {
            Some(seed) => SmallRng::seed_from_u64(seed),
            None => SmallRng::from_entropy(),
        };
        Self {
            words,
            recent: VecDeque::with_capacity(RECENT_WORDS),
            rng,
            total_tests: 0,
            streak: 0,
            missed_words: Vec::new(),
            practice_words: Vec::new(),
        }
    }

    /// Pick a word not seen in the last few rounds and count the test.
    ///
    /// Recency is only tracked when the deck has more words than the window.
    pub fn next_word(&mut self) -> Option<Entry> {
        let fresh: Vec<&Entry> = self
            .words
            .iter()
            .filter(|entry| !self.recent.contains(&entry.prompt))
            .collect();
        let entry = match fresh.choose(&mut self.rng) {
            Some(entry) => (*entry).clone(),
            None => self.words.choose(&mut self.rng)?.clone(),
        };

        if self.words.len() > RECENT_WORDS {
            self.recent.push_back(entry.prompt.clone());
            if self.recent.len() > RECENT_WORDS {
                self.recent.pop_front();
            }
        }
        self.total_tests += 1;
        Some(entry)
    }

    pub fn note_practice(&mut self, word: &str) {
        if !self.practice_words.iter().any(|w| w == word) {
            self.practice_words.push(word.to_string());
        }
    }

    pub fn note_missed(&mut self, word: &str) {
        if !self.missed_words.iter().any(|w| w == word) {
            self.missed_words.push(word.to_string());
        }
    }

    pub fn congratulation(&mut self) -> &'static str {
        CONGRATULATIONS.choose(&mut self.rng).copied().unwrap_or("Correct!")
    }

    pub fn commiseration(&mut self) -> &'static str {
        COMMISERATIONS.choose(&mut self.rng).copied().unwrap_or("Too bad!")
    }
}

/// Canonical form for comparing answers: NFC, trimmed, lowercased.
pub fn normalize_answer(text: &str) -> String {
    ComposingNormalizerBorrowed::new_nfc()
        .normalize(text.trim())
        .to_lowercase()
}

pub fn is_correct(answer: &str, entry: &Entry) -> bool {
    let answer = normalize_answer(answer);
    entry
        .answers
        .iter()
        .any(|accepted| normalize_answer(accepted) == answer)
}
