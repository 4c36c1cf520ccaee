// Integration tests for the HTTP API

use haiku::bot::{BotSettings, HaikuBot};
use haiku::config::ServiceConfig;
use haiku::haiku::{builtin_haiku, HaikuGenerator};
use haiku::server;
use haiku::service;
use haiku::shutdown::{self, ShutdownTrigger};
use serde_json::{json, Value};
use std::net::SocketAddr;
use std::path::Path;
use std::time::Duration;
use tempfile::TempDir;
use tokio::task::JoinHandle;

fn settings(dir: &Path) -> BotSettings {
    let mut config = ServiceConfig::default();
    config.workdir = dir.to_path_buf();
    BotSettings::from_config(&config)
}

fn trained_bot(dir: &Path) -> HaikuBot {
    let mut generator = HaikuGenerator::default();
    generator.train(&builtin_haiku()).unwrap();
    HaikuBot::with_generator(settings(dir), generator)
}

/// A single memorised haiku: near-zero temperature always reproduces it
fn memorized_bot(dir: &Path) -> HaikuBot {
    let mut generator = HaikuGenerator::new(3);
    generator
        .train(&[[
            "тихий пруд".to_string(),
            "лягушка прыгнула".to_string(),
            "всплеск воды".to_string(),
        ]])
        .unwrap();
    HaikuBot::with_generator(settings(dir), generator)
}

async fn start(bot: HaikuBot) -> (SocketAddr, ShutdownTrigger, JoinHandle<haiku::error::Result<()>>) {
    let listener = server::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let (trigger, stop) = shutdown::channel();
    let handle = tokio::spawn(server::serve(listener, bot, stop));
    (addr, trigger, handle)
}

async fn post_generate(addr: SocketAddr, body: Value) -> (u16, Value) {
    let response = reqwest::Client::new()
        .post(format!("http://{}/generate", addr))
        .json(&body)
        .send()
        .await
        .unwrap();
    let status = response.status().as_u16();
    let body = response.json::<Value>().await.unwrap_or(Value::Null);
    (status, body)
}

#[tokio::test]
async fn test_health_reports_model_state() {
    let temp_dir = TempDir::new().unwrap();
    let (addr, trigger, handle) = start(HaikuBot::new(settings(temp_dir.path()))).await;

    let body: Value = reqwest::get(format!("http://{}/health", addr))
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(body, json!({"status": "ok", "model": "not_loaded"}));

    trigger.trigger();
    tokio::time::timeout(Duration::from_secs(5), handle)
        .await
        .unwrap()
        .unwrap()
        .unwrap();

    // The port is released after shutdown
    assert!(tokio::net::TcpStream::connect(addr).await.is_err());
}

#[tokio::test]
async fn test_generate_while_not_ready() {
    let temp_dir = TempDir::new().unwrap();
    let bot = HaikuBot::new(settings(temp_dir.path()));
    let (addr, trigger, _handle) = start(bot.clone()).await;

    let (status, body) = post_generate(addr, json!({"first_line": "Утренний туман"})).await;
    assert_eq!(status, 503);
    assert!(body["error"].as_str().unwrap().contains("not_loaded"));

    // Unavailable requests are not counted
    assert_eq!(bot.stats().await.total_requests, 0);
    trigger.trigger();
}

#[tokio::test]
async fn test_generate_validation() {
    let temp_dir = TempDir::new().unwrap();
    let bot = trained_bot(temp_dir.path());
    let (addr, trigger, _handle) = start(bot.clone()).await;

    let (status, _) = post_generate(addr, json!({"first_line": "ab"})).await;
    assert_eq!(status, 400);

    let (status, _) = post_generate(addr, json!({"first_line": "я".repeat(101)})).await;
    assert_eq!(status, 400);

    let (status, _) = post_generate(
        addr,
        json!({"first_line": "Утренний туман", "temperature": -1.0}),
    )
    .await;
    assert_eq!(status, 400);

    // Both length failures were counted, the bad temperature was not
    assert_eq!(bot.stats().await.total_requests, 2);
    trigger.trigger();
}

#[tokio::test]
async fn test_generate_haiku() {
    let temp_dir = TempDir::new().unwrap();
    let bot = memorized_bot(temp_dir.path());
    let (addr, trigger, _handle) = start(bot.clone()).await;

    let (status, body) = post_generate(
        addr,
        json!({"first_line": "  Тихий пруд ", "user_id": 7, "temperature": 0.05}),
    )
    .await;

    assert_eq!(status, 200);
    assert_eq!(body["first_line"], "Тихий пруд");
    assert_eq!(body["completion"], "лягушка прыгнула\nвсплеск воды");
    assert_eq!(body["haiku"], "Тихий пруд\nлягушка прыгнула\nвсплеск воды");

    let stats: Value = reqwest::get(format!("http://{}/stats", addr))
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(stats["users"], 1);
    assert_eq!(stats["total_requests"], 1);
    assert_eq!(stats["successful_generations"], 1);
    assert_eq!(stats["failed_generations"], 0);
    assert_eq!(stats["model"], "ready");
    trigger.trigger();
}

#[tokio::test]
async fn test_examples_and_random_start() {
    let temp_dir = TempDir::new().unwrap();
    let (addr, trigger, _handle) = start(HaikuBot::new(settings(temp_dir.path()))).await;

    let examples: Value = reqwest::get(format!("http://{}/examples", addr))
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(examples.as_array().unwrap().len(), 5);
    assert_eq!(examples[0]["first_line"], "Утренний туман");

    let random: Value = reqwest::get(format!("http://{}/random-start", addr))
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    let first_line = random["first_line"].as_str().unwrap();
    assert!(haiku::bot::messages::RANDOM_STARTS
        .iter()
        .any(|start| *start == first_line));
    trigger.trigger();
}

#[tokio::test]
async fn test_service_trains_and_becomes_ready() {
    let temp_dir = TempDir::new().unwrap();
    let mut config = ServiceConfig::default();
    config.workdir = temp_dir.path().to_path_buf();

    let listener = server::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let (trigger, stop) = shutdown::channel();
    let handle = tokio::spawn(async move { service::run(&config, listener, stop).await });

    let mut ready = false;
    for _ in 0..200 {
        if let Ok(response) = reqwest::get(format!("http://{}/health", addr)).await {
            let body: Value = response.json().await.unwrap();
            if body["model"] == "ready" {
                ready = true;
                break;
            }
        }
        tokio::time::sleep(Duration::from_millis(100)).await;
    }
    assert!(ready, "model never became ready");
    assert!(HaikuGenerator::artifacts_exist(temp_dir.path()));

    trigger.trigger();
    tokio::time::timeout(Duration::from_secs(5), handle)
        .await
        .unwrap()
        .unwrap()
        .unwrap();
}
