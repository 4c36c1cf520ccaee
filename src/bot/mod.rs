// Bot module - Transport-independent conversation logic and model lifecycle

pub mod messages;
mod stats;

pub use stats::{BotStats, StatsSnapshot};

use crate::config::ServiceConfig;
use crate::error::{HaikuError, Result};
use crate::haiku::{get_haiku_dataset, HaikuGenerator, TrainingSummary};
use rand::seq::IndexedRandom;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, Mutex, RwLock};
use tokio::time::Instant;
use tracing::{error, info, warn};

/// Longest accepted first line, in characters
pub const MAX_FIRST_LINE_CHARS: usize = 100;

/// Shortest accepted first line, in characters
pub const MIN_FIRST_LINE_CHARS: usize = 3;

/// Telegram rejects inline buttons whose payload exceeds this many bytes
pub const CALLBACK_DATA_LIMIT: usize = 64;

const PROGRESS_INTERVAL: Duration = Duration::from_secs(60);

/// Where replies go as they are produced
pub type ReplySender = mpsc::UnboundedSender<Reply>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ModelStatus {
    NotLoaded,
    Training,
    Ready,
}

impl ModelStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ModelStatus::NotLoaded => "not_loaded",
            ModelStatus::Training => "training",
            ModelStatus::Ready => "ready",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    Start,
    Help,
    Example,
    Stats,
    Retrain,
}

impl Command {
    /// Parse `/name` or `/name@botname`, ignoring arguments
    pub fn parse(text: &str) -> Option<Self> {
        let word = text.trim().split_whitespace().next()?;
        let name = word.strip_prefix('/')?;
        let name = name.split('@').next().unwrap_or(name);

        match name {
            "start" => Some(Command::Start),
            "help" => Some(Command::Help),
            "example" => Some(Command::Example),
            "stats" => Some(Command::Stats),
            "retrain" => Some(Command::Retrain),
            _ => None,
        }
    }
}

/// Something a user sent
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Incoming {
    Command(Command),
    Text(String),
    Callback(String),
}

impl Incoming {
    /// Classify a chat message as a command or free text
    pub fn from_message(text: &str) -> Option<Self> {
        if text.trim_start().starts_with('/') {
            return Command::parse(text).map(Incoming::Command);
        }
        Some(Incoming::Text(text.to_string()))
    }

    /// Whether handling this input runs the model
    pub fn runs_generation(&self) -> bool {
        match self {
            Incoming::Text(_) => true,
            Incoming::Callback(data) => data.starts_with("regenerate:"),
            Incoming::Command(_) => false,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Button {
    pub text: String,
    pub callback_data: String,
}

impl Button {
    pub fn new(text: &str, callback_data: impl Into<String>) -> Self {
        Self {
            text: text.to_string(),
            callback_data: callback_data.into(),
        }
    }
}

/// A message to show the user
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reply {
    pub text: String,
    /// Inline keyboard, one inner vec per row
    pub buttons: Vec<Vec<Button>>,
    pub markdown: bool,
    /// Replace the message the callback came from instead of sending a new one
    pub edit: bool,
}

impl Reply {
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            buttons: Vec::new(),
            markdown: false,
            edit: false,
        }
    }

    fn with_buttons(mut self, buttons: Vec<Vec<Button>>) -> Self {
        self.buttons = buttons;
        self
    }

    fn markdown(mut self) -> Self {
        self.markdown = true;
        self
    }

    fn edit_if(mut self, edit: bool) -> Self {
        self.edit = edit;
        self
    }
}

/// Result of one generation request
#[derive(Debug, Clone, PartialEq)]
pub enum GenerateOutcome {
    Generated {
        first_line: String,
        completion: String,
    },
    NotReady(ModelStatus),
    TooLong,
    TooShort,
    Empty,
    Failed(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TrainingOutcome {
    Loaded,
    Trained(TrainingSummary),
    /// The wait gave up; training finishes in the background
    StillTraining,
}

#[derive(Debug, Clone)]
pub struct BotSettings {
    pub admin_ids: Vec<i64>,
    pub model_dir: PathBuf,
    pub corpus: Option<PathBuf>,
    pub order: usize,
    pub max_length: usize,
    pub temperature: f64,
    pub regenerate_temperature: f64,
    pub training_timeout: Duration,
}

impl BotSettings {
    pub fn from_config(config: &ServiceConfig) -> Self {
        Self {
            admin_ids: config.bot.admin_ids.clone(),
            model_dir: config.model_dir(),
            corpus: config.model.corpus.clone(),
            order: config.model.order,
            max_length: config.model.max_length,
            temperature: config.model.temperature,
            regenerate_temperature: config.model.regenerate_temperature,
            training_timeout: config.model.training_timeout(),
        }
    }
}

#[derive(Default)]
struct ModelState {
    generator: RwLock<Option<HaikuGenerator>>,
    training: AtomicBool,
}

/// Shared bot state. Cloning is cheap and every clone sees the same model
/// and counters.
#[derive(Clone)]
pub struct HaikuBot {
    settings: Arc<BotSettings>,
    state: Arc<ModelState>,
    stats: Arc<Mutex<BotStats>>,
}

impl HaikuBot {
    pub fn new(settings: BotSettings) -> Self {
        Self {
            settings: Arc::new(settings),
            state: Arc::new(ModelState::default()),
            stats: Arc::new(Mutex::new(BotStats::default())),
        }
    }

    /// Start with an already trained generator
    pub fn with_generator(settings: BotSettings, generator: HaikuGenerator) -> Self {
        Self {
            settings: Arc::new(settings),
            state: Arc::new(ModelState {
                generator: RwLock::new(Some(generator)),
                training: AtomicBool::new(false),
            }),
            stats: Arc::new(Mutex::new(BotStats::default())),
        }
    }

    pub fn settings(&self) -> &BotSettings {
        &self.settings
    }

    pub async fn is_loaded(&self) -> bool {
        self.state.generator.read().await.is_some()
    }

    pub fn is_training(&self) -> bool {
        self.state.training.load(Ordering::SeqCst)
    }

    pub async fn status(&self) -> ModelStatus {
        if self.is_loaded().await {
            ModelStatus::Ready
        } else if self.is_training() {
            ModelStatus::Training
        } else {
            ModelStatus::NotLoaded
        }
    }

    pub async fn stats(&self) -> StatsSnapshot {
        self.stats.lock().await.snapshot()
    }

    /// Respond to one user input, collecting every reply
    pub async fn handle(&self, user_id: i64, incoming: Incoming) -> Vec<Reply> {
        let (tx, mut rx) = mpsc::unbounded_channel();
        self.respond(user_id, incoming, &tx).await;
        drop(tx);

        let mut replies = Vec::new();
        while let Some(reply) = rx.recv().await {
            replies.push(reply);
        }
        replies
    }

    /// Respond to one user input, sending each reply as soon as it is ready.
    ///
    /// A closed receiver only means nobody is listening anymore; the work
    /// (a retrain, for instance) still runs to completion.
    pub async fn respond(&self, user_id: i64, incoming: Incoming, replies: &ReplySender) {
        let reply = match incoming {
            Incoming::Command(Command::Start) => {
                self.stats.lock().await.record_user(user_id);
                Reply::text(messages::WELCOME).with_buttons(vec![
                    vec![Button::new("📖 Примеры", "examples")],
                    vec![Button::new("❓ Помощь", "help")],
                    vec![Button::new("📊 Статистика", "stats")],
                ])
            }
            Incoming::Command(Command::Help) => Reply::text(messages::HELP),
            Incoming::Command(Command::Example) => self.examples_reply(false),
            Incoming::Command(Command::Stats) => self.stats_reply(false).await,
            Incoming::Command(Command::Retrain) => return self.retrain(user_id, replies).await,
            Incoming::Text(text) => self.text_reply(user_id, &text).await,
            Incoming::Callback(data) => self.callback_reply(&data).await,
        };
        let _ = replies.send(reply);
    }

    async fn text_reply(&self, user_id: i64, text: &str) -> Reply {
        match self
            .generate(Some(user_id), text, self.settings.temperature)
            .await
        {
            GenerateOutcome::Generated {
                first_line,
                completion,
            } => haiku_reply(&first_line, &completion, false),
            GenerateOutcome::NotReady(ModelStatus::Training) => {
                Reply::text(messages::STILL_TRAINING)
            }
            GenerateOutcome::NotReady(_) => Reply::text(messages::NOT_LOADED),
            GenerateOutcome::TooLong => Reply::text(messages::TOO_LONG),
            GenerateOutcome::TooShort => Reply::text(messages::TOO_SHORT),
            GenerateOutcome::Empty => Reply::text(messages::EMPTY_RESULT),
            GenerateOutcome::Failed(_) => Reply::text(messages::GENERATION_FAILED),
        }
    }

    async fn callback_reply(&self, data: &str) -> Reply {
        match data {
            "examples" => return self.examples_reply(true),
            "help" => return Reply::text(messages::HELP).edit_if(true),
            "stats" => return self.stats_reply(true).await,
            "random_start" => {
                let first_line = random_start();
                return Reply::text(messages::random_start_text(first_line))
                    .markdown()
                    .edit_if(true);
            }
            _ => {}
        }

        if let Some(first_line) = data.strip_prefix("regenerate:") {
            return match self.regenerate(first_line).await {
                GenerateOutcome::Generated {
                    first_line,
                    completion,
                } => haiku_reply(&first_line, &completion, true),
                GenerateOutcome::Empty => Reply::text(messages::EMPTY_REGENERATION),
                _ => Reply::text(messages::REGENERATION_FAILED),
            };
        }

        if let Some(rest) = data.strip_prefix("save:") {
            if let Some((first_line, completion)) = rest.split_once(':') {
                return Reply::text(messages::saved_text(first_line, completion))
                    .markdown()
                    .edit_if(true);
            }
        }

        warn!("Ignoring unknown callback data: {}", data);
        Reply::text(messages::UNKNOWN_ACTION)
    }

    fn examples_reply(&self, edit: bool) -> Reply {
        Reply::text(messages::examples_text())
            .with_buttons(vec![vec![Button::new("🎲 Случайная строка", "random_start")]])
            .edit_if(edit)
    }

    async fn stats_reply(&self, edit: bool) -> Reply {
        let stats = self.stats().await;
        let loaded = self.is_loaded().await;

        let text = format!(
            "📊 СТАТИСТИКА БОТА\n\n\
             👥 Пользователей: {}\n\
             📝 Всего запросов: {}\n\
             ✅ Успешных генераций: {}\n\
             ❌ Ошибок: {}\n\
             🎯 Успешность: {:.1}%\n\n\
             🤖 Статус модели: {}\n\
             🏋️ Обучение: {}\n\n\
             ⏰ Время работы: {}",
            stats.users,
            stats.total_requests,
            stats.successful_generations,
            stats.failed_generations,
            stats.success_rate,
            if loaded { "✅ Загружена" } else { "❌ Не загружена" },
            if self.is_training() {
                "🔄 В процессе"
            } else {
                "✅ Завершено"
            },
            chrono::Local::now().format("%H:%M:%S"),
        );

        Reply::text(text).edit_if(edit)
    }

    /// Complete a user-supplied first line.
    ///
    /// Nothing is counted while the model is unavailable. Otherwise the
    /// request is counted before length validation.
    pub async fn generate(
        &self,
        user_id: Option<i64>,
        text: &str,
        temperature: f64,
    ) -> GenerateOutcome {
        let status = self.status().await;
        if status != ModelStatus::Ready {
            return GenerateOutcome::NotReady(status);
        }

        {
            let mut stats = self.stats.lock().await;
            if let Some(user_id) = user_id {
                stats.record_user(user_id);
            }
            stats.record_request();
        }

        let first_line = text.trim();
        let chars = first_line.chars().count();
        if chars > MAX_FIRST_LINE_CHARS {
            return GenerateOutcome::TooLong;
        }
        if chars < MIN_FIRST_LINE_CHARS {
            return GenerateOutcome::TooShort;
        }

        self.complete(first_line, temperature).await
    }

    /// Another variant for a line that was already accepted
    pub async fn regenerate(&self, first_line: &str) -> GenerateOutcome {
        self.complete(first_line, self.settings.regenerate_temperature)
            .await
    }

    async fn complete(&self, first_line: &str, temperature: f64) -> GenerateOutcome {
        let result = {
            let generator = self.state.generator.read().await;
            match generator.as_ref() {
                Some(generator) => generator.generate_haiku_completion(
                    first_line,
                    self.settings.max_length,
                    temperature,
                ),
                None => Err(HaikuError::ModelNotReady(
                    "no model is loaded".to_string(),
                )),
            }
        };

        let mut stats = self.stats.lock().await;
        match result {
            Ok(completion) if !completion.trim().is_empty() => {
                stats.record_success();
                GenerateOutcome::Generated {
                    first_line: first_line.to_string(),
                    completion,
                }
            }
            Ok(_) => {
                stats.record_failure();
                GenerateOutcome::Empty
            }
            Err(e) => {
                error!("Haiku generation failed for {:?}: {}", first_line, e);
                stats.record_failure();
                GenerateOutcome::Failed(e.to_string())
            }
        }
    }

    async fn retrain(&self, user_id: i64, replies: &ReplySender) {
        if !self.settings.admin_ids.contains(&user_id) {
            warn!("User {} is not allowed to retrain the model", user_id);
            let _ = replies.send(Reply::text(messages::NOT_ADMIN));
            return;
        }
        if self.is_training() {
            let _ = replies.send(Reply::text(messages::ALREADY_TRAINING));
            return;
        }

        info!("Retraining requested by {}", user_id);
        let _ = replies.send(Reply::text(messages::RETRAIN_STARTED));

        let done = match self.train_model().await {
            Ok(TrainingOutcome::StillTraining) => messages::RETRAIN_PENDING,
            Ok(_) => messages::RETRAIN_DONE,
            Err(e) => {
                error!("Retraining failed: {}", e);
                messages::RETRAIN_FAILED
            }
        };
        let _ = replies.send(Reply::text(done));
    }

    /// Load saved artifacts, or train and save a new model when they are
    /// missing or unreadable.
    pub async fn load_or_train(&self) -> Result<TrainingOutcome> {
        let dir = self.settings.model_dir.clone();

        if HaikuGenerator::artifacts_exist(&dir) {
            let load_dir = dir.clone();
            let loaded = tokio::task::spawn_blocking(move || HaikuGenerator::load(&load_dir))
                .await
                .map_err(|e| HaikuError::ModelLoadError(e.to_string()))?;

            match loaded {
                Ok(generator) => {
                    *self.state.generator.write().await = Some(generator);
                    info!("Loaded model from {}", dir.display());
                    return Ok(TrainingOutcome::Loaded);
                }
                Err(e) => warn!("Could not load saved model, training a new one: {}", e),
            }
        } else {
            info!("No saved model in {}, training a new one", dir.display());
        }

        self.train_model().await
    }

    /// Train on the corpus in a blocking task and swap the result in.
    ///
    /// Waits at most the configured training timeout, logging progress
    /// every minute. A run that outlives the wait keeps going and still
    /// installs its model when it finishes.
    pub async fn train_model(&self) -> Result<TrainingOutcome> {
        if self
            .state
            .training
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            return Err(HaikuError::TrainingError(
                "training is already in progress".to_string(),
            ));
        }

        let settings = Arc::clone(&self.settings);
        let state = Arc::clone(&self.state);
        let mut task = tokio::spawn(async move {
            let trained = tokio::task::spawn_blocking(move || train_and_save(&settings))
                .await
                .map_err(|e| HaikuError::TrainingError(e.to_string()))
                .and_then(|result| result);

            let outcome = match trained {
                Ok((generator, summary)) => {
                    *state.generator.write().await = Some(generator);
                    Ok(summary)
                }
                Err(e) => Err(e),
            };
            state.training.store(false, Ordering::SeqCst);
            outcome
        });

        let started = Instant::now();
        let deadline = started + self.settings.training_timeout;
        let mut progress = tokio::time::interval_at(started + PROGRESS_INTERVAL, PROGRESS_INTERVAL);

        loop {
            tokio::select! {
                joined = &mut task => {
                    let summary = joined
                        .map_err(|e| HaikuError::TrainingError(e.to_string()))??;
                    info!(
                        "Training finished in {:.1}s: {} haiku, {} pairs, vocabulary {}",
                        started.elapsed().as_secs_f64(),
                        summary.haiku,
                        summary.pairs,
                        summary.vocab_size
                    );
                    return Ok(TrainingOutcome::Trained(summary));
                }
                _ = progress.tick() => {
                    info!("Training in progress... {}s elapsed", started.elapsed().as_secs());
                }
                _ = tokio::time::sleep_until(deadline) => {
                    warn!(
                        "Stopped waiting for training after {}s, it continues in the background",
                        started.elapsed().as_secs()
                    );
                    return Ok(TrainingOutcome::StillTraining);
                }
            }
        }
    }
}

fn train_and_save(settings: &BotSettings) -> Result<(HaikuGenerator, TrainingSummary)> {
    let dataset = get_haiku_dataset(settings.corpus.as_deref())?;
    let mut generator = HaikuGenerator::new(settings.order);
    let summary = generator.train(&dataset)?;

    if let Err(e) = generator.save(&settings.model_dir) {
        warn!("Model trained but could not be saved: {}", e);
    }

    Ok((generator, summary))
}

fn haiku_reply(first_line: &str, completion: &str, regenerated: bool) -> Reply {
    let again = if regenerated {
        "🔄 Еще вариант"
    } else {
        "🔄 Другой вариант"
    };

    let mut buttons = vec![vec![Button::new(
        again,
        truncate_callback(&format!("regenerate:{}", first_line)),
    )]];

    let save = format!("save:{}:{}", first_line, completion);
    if save.len() <= CALLBACK_DATA_LIMIT {
        buttons.push(vec![Button::new("💾 Сохранить", save)]);
    }

    Reply::text(messages::haiku_text(first_line, completion, regenerated))
        .with_buttons(buttons)
        .markdown()
}

/// Cut callback data to the size limit on a character boundary
fn truncate_callback(data: &str) -> String {
    if data.len() <= CALLBACK_DATA_LIMIT {
        return data.to_string();
    }
    let mut end = CALLBACK_DATA_LIMIT;
    while !data.is_char_boundary(end) {
        end -= 1;
    }
    data[..end].to_string()
}

pub fn random_start() -> &'static str {
    messages::RANDOM_STARTS
        .choose(&mut rand::rng())
        .copied()
        .unwrap_or(messages::RANDOM_STARTS[0])
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::haiku::builtin_haiku;
    use tempfile::TempDir;

    fn settings(dir: &std::path::Path) -> BotSettings {
        BotSettings {
            admin_ids: vec![42],
            model_dir: dir.to_path_buf(),
            corpus: None,
            order: 3,
            max_length: 15,
            temperature: 0.8,
            regenerate_temperature: 0.9,
            training_timeout: Duration::from_secs(60),
        }
    }

    fn trained_bot(dir: &std::path::Path) -> HaikuBot {
        let mut generator = HaikuGenerator::new(3);
        generator.train(&builtin_haiku()).unwrap();
        HaikuBot::with_generator(settings(dir), generator)
    }

    #[test]
    fn test_command_parsing() {
        assert_eq!(Command::parse("/start"), Some(Command::Start));
        assert_eq!(Command::parse("/stats@haiku_bot"), Some(Command::Stats));
        assert_eq!(Command::parse("/retrain now"), Some(Command::Retrain));
        assert_eq!(Command::parse("/unknown"), None);
        assert_eq!(Command::parse("start"), None);

        assert_eq!(
            Incoming::from_message("Утренний туман"),
            Some(Incoming::Text("Утренний туман".to_string()))
        );
        assert_eq!(Incoming::from_message("/nope"), None);
    }

    #[test]
    fn test_runs_generation() {
        assert!(Incoming::Text("abc".into()).runs_generation());
        assert!(Incoming::Callback("regenerate:abc".into()).runs_generation());
        assert!(!Incoming::Callback("stats".into()).runs_generation());
        assert!(!Incoming::Command(Command::Help).runs_generation());
    }

    #[test]
    fn test_truncate_callback_respects_char_boundaries() {
        let long = format!("regenerate:{}", "туман ".repeat(20));
        let cut = truncate_callback(&long);
        assert!(cut.len() <= CALLBACK_DATA_LIMIT);
        assert!(long.starts_with(&cut));
    }

    #[tokio::test]
    async fn test_text_without_model_is_not_counted() {
        let temp_dir = TempDir::new().unwrap();
        let bot = HaikuBot::new(settings(temp_dir.path()));

        let replies = bot
            .handle(1, Incoming::Text("Утренний туман".to_string()))
            .await;
        assert_eq!(replies, vec![Reply::text(messages::NOT_LOADED)]);
        assert_eq!(bot.stats().await.total_requests, 0);
        assert_eq!(bot.status().await, ModelStatus::NotLoaded);
    }

    #[tokio::test]
    async fn test_length_validation_counts_request() {
        let temp_dir = TempDir::new().unwrap();
        let bot = trained_bot(temp_dir.path());

        let short = bot.generate(Some(1), "  аб ", 0.8).await;
        assert_eq!(short, GenerateOutcome::TooShort);

        let long = bot.generate(Some(2), &"я".repeat(101), 0.8).await;
        assert_eq!(long, GenerateOutcome::TooLong);

        // Exactly 100 characters is accepted
        let edge = bot.generate(Some(2), &"я".repeat(100), 0.8).await;
        assert!(!matches!(edge, GenerateOutcome::TooLong));

        let stats = bot.stats().await;
        assert_eq!(stats.total_requests, 3);
        assert_eq!(stats.users, 2);
    }

    /// One memorised haiku and a near-greedy temperature make the output fixed
    fn memorized_bot(dir: &std::path::Path) -> HaikuBot {
        let mut generator = HaikuGenerator::new(3);
        generator
            .train(&[[
                "тихий пруд".to_string(),
                "лягушка прыгнула".to_string(),
                "всплеск воды".to_string(),
            ]])
            .unwrap();

        let mut settings = settings(dir);
        settings.temperature = 0.05;
        settings.regenerate_temperature = 0.05;
        HaikuBot::with_generator(settings, generator)
    }

    #[tokio::test]
    async fn test_generation_reply_has_buttons() {
        let temp_dir = TempDir::new().unwrap();
        let bot = memorized_bot(temp_dir.path());

        let replies = bot
            .handle(7, Incoming::Text("  Тихий пруд ".to_string()))
            .await;
        assert_eq!(replies.len(), 1);

        let reply = &replies[0];
        assert!(reply.markdown);
        assert!(!reply.edit);
        assert!(reply
            .text
            .contains("*Тихий пруд*\nлягушка прыгнула\nвсплеск воды"));
        assert_eq!(reply.buttons[0][0].callback_data, "regenerate:Тихий пруд");
        // The full haiku is over the callback size limit, so no save button
        assert_eq!(reply.buttons.len(), 1);

        let stats = bot.stats().await;
        assert_eq!(stats.total_requests, 1);
        assert_eq!(stats.successful_generations, 1);
        assert_eq!(stats.failed_generations, 0);

        let again = bot
            .handle(7, Incoming::Callback("regenerate:Тихий пруд".to_string()))
            .await;
        assert!(again[0].text.contains("Новый вариант хокку"));
        assert!(again[0].text.contains("лягушка прыгнула\nвсплеск воды"));

        // Regeneration is a generation, not a new request
        let stats = bot.stats().await;
        assert_eq!(stats.total_requests, 1);
        assert_eq!(stats.successful_generations, 2);
    }

    #[tokio::test]
    async fn test_callbacks() {
        let temp_dir = TempDir::new().unwrap();
        let bot = trained_bot(temp_dir.path());

        let random = bot.handle(1, Incoming::Callback("random_start".into())).await;
        assert!(random[0].edit);
        assert!(messages::RANDOM_STARTS
            .iter()
            .any(|line| random[0].text.contains(line)));

        let saved = bot
            .handle(1, Incoming::Callback("save:Строка:Вторая\nТретья".into()))
            .await;
        assert!(saved[0].edit);
        assert!(saved[0].text.contains("Строка\nВторая\nТретья"));

        let unknown = bot.handle(1, Incoming::Callback("bogus".into())).await;
        assert_eq!(unknown[0].text, messages::UNKNOWN_ACTION);

        let stats = bot.handle(1, Incoming::Callback("stats".into())).await;
        assert!(stats[0].edit);
        assert!(stats[0].text.contains("✅ Загружена"));
    }

    #[tokio::test]
    async fn test_retrain_requires_admin() {
        let temp_dir = TempDir::new().unwrap();
        let bot = HaikuBot::new(settings(temp_dir.path()));

        let replies = bot.handle(1, Incoming::Command(Command::Retrain)).await;
        assert_eq!(replies, vec![Reply::text(messages::NOT_ADMIN)]);
        assert!(!bot.is_loaded().await);
    }

    #[tokio::test]
    async fn test_retrain_by_admin() {
        let temp_dir = TempDir::new().unwrap();
        let bot = HaikuBot::new(settings(temp_dir.path()));

        let replies = bot.handle(42, Incoming::Command(Command::Retrain)).await;
        assert_eq!(replies.len(), 2);
        assert_eq!(replies[0].text, messages::RETRAIN_STARTED);
        assert_eq!(replies[1].text, messages::RETRAIN_DONE);
        assert_eq!(bot.status().await, ModelStatus::Ready);
        assert!(HaikuGenerator::artifacts_exist(temp_dir.path()));
    }

    #[tokio::test]
    async fn test_retrain_announces_start_before_training_ends() {
        let temp_dir = TempDir::new().unwrap();
        let bot = HaikuBot::new(settings(temp_dir.path()));

        // Holding a read lock keeps the trained model from being installed
        let held = bot.state.generator.read().await;

        let (tx, mut rx) = mpsc::unbounded_channel();
        let task = {
            let bot = bot.clone();
            tokio::spawn(async move {
                bot.respond(42, Incoming::Command(Command::Retrain), &tx)
                    .await
            })
        };

        let first = tokio::time::timeout(Duration::from_secs(5), rx.recv())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(first.text, messages::RETRAIN_STARTED);

        tokio::time::sleep(Duration::from_millis(200)).await;
        assert!(bot.is_training());
        assert!(rx.try_recv().is_err());

        drop(held);
        let done = tokio::time::timeout(Duration::from_secs(30), rx.recv())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(done.text, messages::RETRAIN_DONE);
        task.await.unwrap();
        assert_eq!(bot.status().await, ModelStatus::Ready);
    }

    #[tokio::test]
    async fn test_load_or_train_then_load() {
        let temp_dir = TempDir::new().unwrap();

        let first = HaikuBot::new(settings(temp_dir.path()));
        let outcome = first.load_or_train().await.unwrap();
        assert!(matches!(outcome, TrainingOutcome::Trained(_)));
        assert!(!first.is_training());

        let second = HaikuBot::new(settings(temp_dir.path()));
        assert_eq!(
            second.load_or_train().await.unwrap(),
            TrainingOutcome::Loaded
        );
        assert_eq!(second.status().await, ModelStatus::Ready);
    }

    #[tokio::test]
    async fn test_corrupt_artifacts_fall_back_to_training() {
        let temp_dir = TempDir::new().unwrap();
        std::fs::write(temp_dir.path().join(crate::haiku::MODEL_FILE), "{").unwrap();
        std::fs::write(temp_dir.path().join(crate::haiku::TOKENIZER_FILE), "{").unwrap();

        let bot = HaikuBot::new(settings(temp_dir.path()));
        let outcome = bot.load_or_train().await.unwrap();
        assert!(matches!(outcome, TrainingOutcome::Trained(_)));
        assert!(HaikuGenerator::load(temp_dir.path()).is_ok());
    }
}
