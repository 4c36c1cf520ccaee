use crate::error::{HaikuError, Result};
use crate::haiku::dataset::Haiku;
use crate::haiku::model::{sample_with_temperature, NGramModel, TrainingPair};
use crate::haiku::tokenizer::{Tokenizer, END_TOKEN, LINE_TOKEN, OOV_TOKEN};
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

/// Model artifact file name
pub const MODEL_FILE: &str = "haiku_model.json";

/// Tokenizer artifact file name
pub const TOKENIZER_FILE: &str = "tokenizer.json";

/// Default n-gram order
pub const DEFAULT_ORDER: usize = 3;

/// Training pairs derived from a corpus
#[derive(Debug, Clone)]
pub struct TrainingData {
    pub pairs: Vec<TrainingPair>,
    pub max_sequence_length: usize,
}

/// Summary of a finished training run
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TrainingSummary {
    pub haiku: usize,
    pub pairs: usize,
    pub vocab_size: usize,
}

#[derive(Serialize, Deserialize)]
struct ModelFile {
    max_sequence_length: usize,
    model: NGramModel,
}

/// Completes haiku from their first line
#[derive(Debug, Clone)]
pub struct HaikuGenerator {
    order: usize,
    tokenizer: Option<Tokenizer>,
    model: Option<NGramModel>,
    max_sequence_length: usize,
}

impl Default for HaikuGenerator {
    fn default() -> Self {
        Self::new(DEFAULT_ORDER)
    }
}

/// `l1 <line> l2 <line> l3 <end>`
fn training_text(haiku: &Haiku) -> String {
    format!(
        "{} {} {} {} {} {}",
        haiku[0], LINE_TOKEN, haiku[1], LINE_TOKEN, haiku[2], END_TOKEN
    )
}

impl HaikuGenerator {
    pub fn new(order: usize) -> Self {
        Self {
            order,
            tokenizer: None,
            model: None,
            max_sequence_length: 0,
        }
    }

    pub fn is_trained(&self) -> bool {
        self.tokenizer.is_some() && self.model.is_some()
    }

    pub fn tokenizer(&self) -> Option<&Tokenizer> {
        self.tokenizer.as_ref()
    }

    pub fn max_sequence_length(&self) -> usize {
        self.max_sequence_length
    }

    /// Fit the tokenizer and build next-token pairs.
    ///
    /// For each haiku, every position after the first `<line>` marker yields
    /// a pair of (all preceding tokens, token at that position). Haiku with
    /// no marker contribute nothing.
    pub fn prepare_data(&mut self, haiku: &[Haiku]) -> Result<TrainingData> {
        let texts: Vec<String> = haiku.iter().map(training_text).collect();
        let tokenizer = Tokenizer::fit(&texts);

        let line_id = tokenizer.id_of(LINE_TOKEN).unwrap_or(0);
        let mut pairs = Vec::new();

        for text in &texts {
            let sequence = tokenizer.texts_to_sequence(text);
            let Some(first_line_end) = sequence.iter().position(|&id| id == line_id) else {
                continue;
            };

            for i in first_line_end + 1..sequence.len() {
                pairs.push((sequence[..i].to_vec(), sequence[i]));
            }
        }

        if pairs.is_empty() {
            return Err(HaikuError::TrainingError(
                "could not build any training sequences".to_string(),
            ));
        }

        let max_sequence_length = pairs.iter().map(|(input, _)| input.len()).max().unwrap_or(0);
        self.max_sequence_length = max_sequence_length;
        self.tokenizer = Some(tokenizer);

        Ok(TrainingData {
            pairs,
            max_sequence_length,
        })
    }

    pub fn train(&mut self, haiku: &[Haiku]) -> Result<TrainingSummary> {
        let data = self.prepare_data(haiku)?;
        let vocab_size = self
            .tokenizer
            .as_ref()
            .map(Tokenizer::vocab_size)
            .unwrap_or(0);

        tracing::info!(
            "Training {}-gram model: {} haiku, {} pairs, vocabulary {}",
            self.order,
            haiku.len(),
            data.pairs.len(),
            vocab_size
        );

        self.model = Some(NGramModel::train(&data.pairs, vocab_size, self.order)?);

        Ok(TrainingSummary {
            haiku: haiku.len(),
            pairs: data.pairs.len(),
            vocab_size,
        })
    }

    /// Generate the second and third lines for `first_line`
    pub fn generate_haiku_completion(
        &self,
        first_line: &str,
        max_length: usize,
        temperature: f64,
    ) -> Result<String> {
        self.generate_with_rng(first_line, max_length, temperature, &mut rand::rng())
    }

    pub fn generate_with_rng<R: Rng>(
        &self,
        first_line: &str,
        max_length: usize,
        temperature: f64,
        rng: &mut R,
    ) -> Result<String> {
        let (Some(tokenizer), Some(model)) = (&self.tokenizer, &self.model) else {
            return Err(HaikuError::ModelNotReady(
                "the model must be trained before generating".to_string(),
            ));
        };

        let mut tokens = tokenizer.texts_to_sequence(&format!("{} {}", first_line, LINE_TOKEN));
        let mut generated: Vec<&str> = Vec::new();

        for _ in 0..max_length {
            let start = tokens.len().saturating_sub(self.max_sequence_length.max(1));
            let probs = model.predict(&tokens[start..]);
            let id = sample_with_temperature(&probs, temperature, rng)?;
            let word = tokenizer.word_of(id).unwrap_or(OOV_TOKEN);

            if word == END_TOKEN {
                break;
            }
            if word == OOV_TOKEN {
                continue;
            }

            generated.push(word);
            tokens.push(id);
        }

        Ok(format_completion(&generated))
    }

    /// Write both artifacts into `dir`
    pub fn save(&self, dir: &Path) -> Result<()> {
        let (Some(tokenizer), Some(model)) = (&self.tokenizer, &self.model) else {
            return Err(HaikuError::ModelSaveError(
                "nothing to save, the model is not trained".to_string(),
            ));
        };

        fs::create_dir_all(dir)
            .map_err(|e| HaikuError::ModelSaveError(format!("{}: {}", dir.display(), e)))?;

        let model_file = ModelFile {
            max_sequence_length: self.max_sequence_length,
            model: model.clone(),
        };
        write_json_atomic(&dir.join(MODEL_FILE), &model_file)?;
        write_json_atomic(&dir.join(TOKENIZER_FILE), tokenizer)?;

        tracing::info!("Saved model to {}", dir.display());
        Ok(())
    }

    pub fn load(dir: &Path) -> Result<Self> {
        let model_file: ModelFile = read_json(&dir.join(MODEL_FILE))?;
        let tokenizer: Tokenizer = read_json(&dir.join(TOKENIZER_FILE))?;

        model_file.model.validate()?;
        if model_file.model.vocab_size() != tokenizer.vocab_size() {
            return Err(HaikuError::ModelLoadError(format!(
                "model vocabulary {} does not match tokenizer vocabulary {}",
                model_file.model.vocab_size(),
                tokenizer.vocab_size()
            )));
        }

        Ok(Self {
            order: model_file.model.order(),
            tokenizer: Some(tokenizer),
            model: Some(model_file.model),
            max_sequence_length: model_file.max_sequence_length,
        })
    }

    /// Whether both artifacts exist in `dir`
    pub fn artifacts_exist(dir: &Path) -> bool {
        dir.join(MODEL_FILE).is_file() && dir.join(TOKENIZER_FILE).is_file()
    }
}

/// Split generated words into at most two lines
pub fn format_completion(words: &[&str]) -> String {
    let text = words.join(" ");
    let separator = format!(" {} ", LINE_TOKEN);

    text.split(separator.as_str())
        .map(|line| line.replace(LINE_TOKEN, "").replace(END_TOKEN, ""))
        .map(|line| line.trim().to_string())
        .filter(|line| !line.is_empty())
        .take(2)
        .collect::<Vec<_>>()
        .join("\n")
}

fn write_json_atomic<T: Serialize>(path: &Path, value: &T) -> Result<()> {
    let json = serde_json::to_vec(value)
        .map_err(|e| HaikuError::ModelSaveError(format!("{}: {}", path.display(), e)))?;

    let tmp = path.with_extension("json.tmp");
    fs::write(&tmp, json)
        .map_err(|e| HaikuError::ModelSaveError(format!("{}: {}", tmp.display(), e)))?;
    fs::rename(&tmp, path)
        .map_err(|e| HaikuError::ModelSaveError(format!("{}: {}", path.display(), e)))?;

    Ok(())
}

fn read_json<T: for<'de> Deserialize<'de>>(path: &Path) -> Result<T> {
    let contents = fs::read(path)
        .map_err(|e| HaikuError::ModelLoadError(format!("{}: {}", path.display(), e)))?;
    serde_json::from_slice(&contents)
        .map_err(|e| HaikuError::ModelLoadError(format!("{}: {}", path.display(), e)))
}
