// Haiku module - Text model that completes a haiku from its first line

pub mod dataset;
mod generator;
pub mod model;
pub mod tokenizer;

pub use dataset::{builtin_haiku, get_haiku_dataset, Haiku};
pub use generator::{
    format_completion, HaikuGenerator, TrainingData, TrainingSummary, DEFAULT_ORDER, MODEL_FILE,
    TOKENIZER_FILE,
};
pub use tokenizer::Tokenizer;
