//! Alternative-exercise suggestions from a text-generation endpoint.
//!
//! Fetches run on their own thread and only ever touch the scoreboard; the
//! frame pass never waits for them. Failures are logged, not retried.

use anyhow::{Result, anyhow};
use log::{error, info};
use reqwest::blocking::Client;
use serde_json::json;
use std::{
    env,
    sync::{Arc, Mutex},
    thread,
    time::Duration,
};

use crate::config::RecommendationConfig;
use crate::display::Scoreboard;

/// Spawns a fetch tagged with `epoch`; the result is dropped if the
/// scoreboard has been reset since.
pub fn spawn_fetch(cfg: RecommendationConfig, epoch: u64, board: Arc<Mutex<Scoreboard>>) {
    if !cfg.enabled {
        return;
    }
    let spawned = thread::Builder::new()
        .name("recommend".into())
        .spawn(move || match fetch(&cfg) {
            Ok(items) => match board.lock() {
                Ok(mut b) => {
                    if b.set_recommendations(epoch, items) {
                        info!("recommendations updated");
                    }
                }
                Err(e) => error!("scoreboard lock poisoned: {e}"),
            },
            Err(e) => error!("recommendation fetch failed: {e}"),
        });
    if let Err(e) = spawned {
        error!("failed to spawn recommendation fetch: {e}");
    }
}

fn fetch(cfg: &RecommendationConfig) -> Result<Vec<String>> {
    let key = env::var(&cfg.api_key_env).unwrap_or_default();
    if key.trim().is_empty() {
        return Err(anyhow!("{} is not set", cfg.api_key_env));
    }

    let body = json!({
        "prompt": cfg.prompt,
        "max_tokens": cfg.max_tokens,
        "temperature": cfg.temperature,
        "n": cfg.count,
    });

    let client = Client::builder()
        .timeout(Duration::from_secs(cfg.timeout_secs))
        .build()?;

    let response = client
        .post(&cfg.endpoint)
        .header("Content-Type", "application/json")
        .header("Authorization", format!("Bearer {key}"))
        .body(body.to_string())
        .send()?;

    if !response.status().is_success() {
        return Err(anyhow!("endpoint returned {}", response.status()));
    }

    let v: serde_json::Value = response.json()?;
    numbered_choices(&v, cfg.count)
}

/// Maps `choices[i].text` to `"{i+1}. {text}"`, keeping at most `count`.
pub fn numbered_choices(v: &serde_json::Value, count: usize) -> Result<Vec<String>> {
    let choices = v
        .get("choices")
        .and_then(|c| c.as_array())
        .ok_or_else(|| anyhow!("response has no 'choices' array"))?;

    choices
        .iter()
        .take(count)
        .enumerate()
        .map(|(i, choice)| {
            let text = choice
                .get("text")
                .and_then(|t| t.as_str())
                .ok_or_else(|| anyhow!("choice {i} has no 'text'"))?;
            Ok(format!("{}. {}", i + 1, text.trim()))
        })
        .collect()
}
