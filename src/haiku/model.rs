// Next-token language model over tokenizer ids

use crate::error::{HaikuError, Result};
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Weight applied each time scoring falls back to a shorter context
const BACKOFF: f64 = 0.4;

/// One training example: the tokens seen so far and the token that follows
pub type TrainingPair = (Vec<u32>, u32);

/// N-gram model with stupid-backoff scoring.
///
/// `tables[k]` maps a context of the last `k` tokens (space-joined ids) to
/// counts of the token that followed it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NGramModel {
    order: usize,
    vocab_size: usize,
    tables: Vec<HashMap<String, HashMap<u32, u32>>>,
}

impl NGramModel {
    /// Count every context of length `0..order` ending at each pair's target
    pub fn train(pairs: &[TrainingPair], vocab_size: usize, order: usize) -> Result<Self> {
        if order == 0 {
            return Err(HaikuError::TrainingError(
                "model order must be at least 1".to_string(),
            ));
        }
        if pairs.is_empty() {
            return Err(HaikuError::TrainingError(
                "no training pairs".to_string(),
            ));
        }

        let mut tables = vec![HashMap::new(); order];

        for (input, target) in pairs {
            if *target as usize >= vocab_size {
                return Err(HaikuError::TrainingError(format!(
                    "token id {} outside vocabulary of {}",
                    target, vocab_size
                )));
            }
            for (k, table) in tables.iter_mut().enumerate() {
                if input.len() < k {
                    break;
                }
                let counts: &mut HashMap<u32, u32> =
                    table.entry(context_key(&input[input.len() - k..])).or_default();
                *counts.entry(*target).or_insert(0) += 1;
            }
        }

        Ok(Self {
            order,
            vocab_size,
            tables,
        })
    }

    pub fn order(&self) -> usize {
        self.order
    }

    pub fn vocab_size(&self) -> usize {
        self.vocab_size
    }

    /// Check that a deserialized model can be scored without going out of bounds
    pub fn validate(&self) -> Result<()> {
        if self.order == 0 {
            return Err(HaikuError::ModelLoadError(
                "model order must be at least 1".to_string(),
            ));
        }
        if self.tables.len() != self.order {
            return Err(HaikuError::ModelLoadError(format!(
                "model of order {} has {} context tables",
                self.order,
                self.tables.len()
            )));
        }

        let out_of_range = self
            .tables
            .iter()
            .flat_map(|table| table.values())
            .flat_map(|counts| counts.keys())
            .find(|&&id| id as usize >= self.vocab_size);
        if let Some(id) = out_of_range {
            return Err(HaikuError::ModelLoadError(format!(
                "token id {} outside vocabulary of {}",
                id, self.vocab_size
            )));
        }

        Ok(())
    }

    /// Probability of every id (index = id) following `context`.
    /// Id 0 is always 0.
    pub fn predict(&self, context: &[u32]) -> Vec<f64> {
        let mut scores = vec![0.0; self.vocab_size];
        let mut assigned = vec![false; self.vocab_size];
        let mut weight = 1.0;

        let longest = context.len().min(self.order - 1);
        for k in (0..=longest).rev() {
            let key = context_key(&context[context.len() - k..]);
            let Some(counts) = self.tables[k].get(&key) else {
                continue;
            };

            let total: u32 = counts.values().sum();
            for (&id, &count) in counts {
                let id = id as usize;
                if id == 0 || assigned[id] {
                    continue;
                }
                scores[id] = weight * f64::from(count) / f64::from(total);
                assigned[id] = true;
            }
            weight *= BACKOFF;
        }

        let sum: f64 = scores.iter().sum();
        if sum > 0.0 {
            scores.iter_mut().for_each(|s| *s /= sum);
        }
        scores
    }
}

/// Reshape `probs` with `temperature` and draw an id, never 0.
pub fn sample_with_temperature<R: Rng>(
    probs: &[f64],
    temperature: f64,
    rng: &mut R,
) -> Result<u32> {
    if !(temperature.is_finite() && temperature > 0.0) {
        return Err(HaikuError::GenerationError(format!(
            "temperature must be positive, got {}",
            temperature
        )));
    }

    let weights: Vec<f64> = probs
        .iter()
        .skip(1)
        .map(|p| p.max(0.0).powf(1.0 / temperature))
        .collect();
    let total: f64 = weights.iter().sum();
    if !(total.is_finite() && total > 0.0) {
        return Err(HaikuError::GenerationError(
            "empty prediction".to_string(),
        ));
    }

    let mut threshold = rng.random::<f64>() * total;
    let mut last_positive = 0;
    for (i, w) in weights.iter().enumerate() {
        if *w <= 0.0 {
            continue;
        }
        last_positive = i;
        if threshold < *w {
            return Ok(i as u32 + 1);
        }
        threshold -= w;
    }

    // Rounding left a sliver past the end
    Ok(last_positive as u32 + 1)
}

fn context_key(context: &[u32]) -> String {
    context
        .iter()
        .map(|id| id.to_string())
        .collect::<Vec<_>>()
        .join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn pairs() -> Vec<TrainingPair> {
        vec![
            (vec![2, 3], 4),
            (vec![2, 3, 4], 5),
            (vec![6, 3], 7),
            (vec![6, 3, 7], 5),
        ]
    }

    #[test]
    fn test_train_rejects_empty() {
        assert!(matches!(
            NGramModel::train(&[], 8, 3),
            Err(HaikuError::TrainingError(_))
        ));
        assert!(NGramModel::train(&pairs(), 8, 0).is_err());
        assert!(NGramModel::train(&pairs(), 5, 3).is_err());
    }

    #[test]
    fn test_predict_prefers_longest_context() {
        let model = NGramModel::train(&pairs(), 8, 3).unwrap();

        let probs = model.predict(&[2, 3]);
        assert_eq!(probs.len(), 8);
        assert_eq!(probs[0], 0.0);
        // "2 3" -> 4 outweighs everything backed off from shorter contexts
        let best = (0..probs.len())
            .max_by(|&a, &b| probs[a].partial_cmp(&probs[b]).unwrap())
            .unwrap();
        assert_eq!(best, 4);
        assert!((probs.iter().sum::<f64>() - 1.0).abs() < 1e-9);
    }

    #[test]
    fn test_predict_unseen_context_backs_off() {
        let model = NGramModel::train(&pairs(), 8, 3).unwrap();

        let probs = model.predict(&[1, 1]);
        // Only the unigram table applies: 5 was seen twice
        assert!(probs[5] > probs[4]);
        assert_eq!(probs[1], 0.0);
    }

    #[test]
    fn test_validate_rejects_inconsistent_model() {
        let model = NGramModel::train(&pairs(), 8, 3).unwrap();
        assert!(model.validate().is_ok());

        let mut truncated = model.clone();
        truncated.tables.truncate(1);
        assert!(matches!(
            truncated.validate(),
            Err(HaikuError::ModelLoadError(_))
        ));

        let mut zero_order = model.clone();
        zero_order.order = 0;
        zero_order.tables.clear();
        assert!(zero_order.validate().is_err());

        let mut small_vocab = model;
        small_vocab.vocab_size = 5;
        assert!(small_vocab.validate().is_err());
    }

    #[test]
    fn test_sampling_never_returns_padding() {
        let mut rng = StdRng::seed_from_u64(7);
        let probs = vec![0.9, 0.05, 0.05];

        for _ in 0..100 {
            let id = sample_with_temperature(&probs, 0.8, &mut rng).unwrap();
            assert!(id == 1 || id == 2);
        }
    }

    #[test]
    fn test_low_temperature_is_greedy() {
        let mut rng = StdRng::seed_from_u64(1);
        let probs = vec![0.0, 0.1, 0.7, 0.2];

        for _ in 0..20 {
            assert_eq!(sample_with_temperature(&probs, 0.05, &mut rng).unwrap(), 2);
        }
    }

    #[test]
    fn test_sampling_errors() {
        let mut rng = StdRng::seed_from_u64(1);
        assert!(sample_with_temperature(&[0.0, 1.0], 0.0, &mut rng).is_err());
        assert!(sample_with_temperature(&[1.0, 0.0], 1.0, &mut rng).is_err());
    }
}
