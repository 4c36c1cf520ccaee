use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Token substituted for words outside the vocabulary
pub const OOV_TOKEN: &str = "<unk>";

/// Separator between haiku lines
pub const LINE_TOKEN: &str = "<line>";

/// Marks the end of a haiku
pub const END_TOKEN: &str = "<end>";

/// Characters replaced by spaces before splitting. `<` and `>` are kept so
/// the marker tokens survive.
const FILTERS: &str = "!\"#$%&()*+,-./:;=?@[\\]^_`{|}~\t\n";

/// Word-level tokenizer. Ids start at 1 (0 is padding), id 1 is the
/// out-of-vocabulary token, the rest are ordered by descending frequency
/// in the fitted texts with ties broken by first appearance.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "TokenizerFile", into = "TokenizerFile")]
pub struct Tokenizer {
    words: Vec<String>,
    index: HashMap<String, u32>,
}

#[derive(Serialize, Deserialize)]
struct TokenizerFile {
    /// `words[i]` has id `i + 1`
    words: Vec<String>,
}

impl From<TokenizerFile> for Tokenizer {
    fn from(file: TokenizerFile) -> Self {
        Self::from_words(file.words)
    }
}

impl From<Tokenizer> for TokenizerFile {
    fn from(tokenizer: Tokenizer) -> Self {
        Self {
            words: tokenizer.words,
        }
    }
}

impl Tokenizer {
    fn from_words(words: Vec<String>) -> Self {
        let index = words
            .iter()
            .enumerate()
            .map(|(i, w)| (w.clone(), i as u32 + 1))
            .collect();
        Self { words, index }
    }

    /// Build the vocabulary from `texts`
    pub fn fit<S: AsRef<str>>(texts: &[S]) -> Self {
        let mut counts: HashMap<String, usize> = HashMap::new();
        let mut order: Vec<String> = Vec::new();

        for text in texts {
            for word in split_words(text.as_ref()) {
                if word == OOV_TOKEN {
                    continue;
                }
                let count = counts.entry(word.clone()).or_insert(0);
                if *count == 0 {
                    order.push(word);
                }
                *count += 1;
            }
        }

        // Stable sort keeps first-appearance order among equal counts
        order.sort_by(|a, b| counts[b].cmp(&counts[a]));

        let mut words = Vec::with_capacity(order.len() + 1);
        words.push(OOV_TOKEN.to_string());
        words.extend(order);

        Self::from_words(words)
    }

    /// Map a text to token ids; unknown words become the OOV id
    pub fn texts_to_sequence(&self, text: &str) -> Vec<u32> {
        let oov = self.oov_id();
        split_words(text)
            .into_iter()
            .map(|word| self.index.get(&word).copied().unwrap_or(oov))
            .collect()
    }

    pub fn id_of(&self, word: &str) -> Option<u32> {
        self.index.get(word).copied()
    }

    pub fn word_of(&self, id: u32) -> Option<&str> {
        if id == 0 {
            return None;
        }
        self.words.get(id as usize - 1).map(String::as_str)
    }

    pub fn oov_id(&self) -> u32 {
        1
    }

    /// Number of ids including padding
    pub fn vocab_size(&self) -> usize {
        self.words.len() + 1
    }
}

/// Lowercase, replace filter characters with spaces, split on spaces
pub fn split_words(text: &str) -> Vec<String> {
    let filtered: String = text
        .to_lowercase()
        .chars()
        .map(|c| if FILTERS.contains(c) { ' ' } else { c })
        .collect();

    filtered
        .split(' ')
        .filter(|w| !w.is_empty())
        .map(str::to_string)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_split_words_keeps_markers() {
        assert_eq!(
            split_words("Утренний туман, <line> Стелется!\tнад рекой <end>"),
            vec!["утренний", "туман", "<line>", "стелется", "над", "рекой", "<end>"]
        );
    }

    #[test]
    fn test_fit_orders_by_frequency_then_appearance() {
        let tokenizer = Tokenizer::fit(&["b a c <line>", "c <line> a", "a"]);

        assert_eq!(tokenizer.word_of(1), Some(OOV_TOKEN));
        // a:3, c:2, <line>:2, b:1
        assert_eq!(tokenizer.id_of("a"), Some(2));
        assert_eq!(tokenizer.id_of("c"), Some(3));
        assert_eq!(tokenizer.id_of("<line>"), Some(4));
        assert_eq!(tokenizer.id_of("b"), Some(5));
        assert_eq!(tokenizer.vocab_size(), 6);
    }

    #[test]
    fn test_unknown_words_map_to_oov() {
        let tokenizer = Tokenizer::fit(&["снег падает"]);

        assert_eq!(tokenizer.texts_to_sequence("Снег идёт"), vec![2, 1]);
        assert_eq!(tokenizer.word_of(0), None);
        assert_eq!(tokenizer.word_of(99), None);
    }

    #[test]
    fn test_serde_rebuilds_index() {
        let tokenizer = Tokenizer::fit(&["luna sol luna"]);
        let json = serde_json::to_string(&tokenizer).unwrap();
        assert_eq!(json, r#"{"words":["<unk>","luna","sol"]}"#);

        let restored: Tokenizer = serde_json::from_str(&json).unwrap();
        assert_eq!(restored, tokenizer);
        assert_eq!(restored.id_of("sol"), Some(3));
    }
}
