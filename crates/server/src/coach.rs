//! AI coaching surface: prompt templates plus the upstream text-generation
//! call. The generation call is a thin boundary over the Gemini REST API;
//! everything interesting (prompt construction, fallback) is local.

use anyhow::{anyhow, Result};
use serde_json::Value;

/// Static fallback returned when the upstream generator is unavailable.
pub const FALLBACK_MESSAGE: &str = "AI temporarily unavailable";

const DEFAULT_MODEL: &str = "gemini-2.5-flash";

/// Build the prompt for a coaching request, or `None` for an unknown type.
pub fn build_prompt(request_type: &str, data: &Value) -> Option<String> {
    match request_type {
        "chat" => Some(format!(
            "You are a friendly AI study coach.\n\n\
             Student data:\n\
             Learning time: {}\n\
             Distraction time: {}\n\
             Best study hours: {}\n\
             Recent pattern: {}\n\n\
             Student question:\n\"{}\"\n\n\
             Rules:\n\
             - Be supportive and concise\n\
             - Give practical advice\n\
             - Do NOT mention AI, Gemini, or models\n",
            text(data, "learningTime"),
            text(data, "distractionTime"),
            text(data, "bestHours"),
            text(data, "pattern"),
            text(data, "question"),
        )),
        "reflection" => Some(format!(
            "You are an academic mentor.\n\n\
             Weekly summary:\n\
             Learning time: {}\n\
             Distraction time: {}\n\
             Mixed time: {}\n\
             Best study hours: {}\n\
             Trend: {}\n\n\
             Write a 1-2 sentence weekly reflection.\n\
             End with one gentle suggestion.\n\
             Do NOT mention AI or models.\n",
            text(data, "learningTime"),
            text(data, "distractionTime"),
            text(data, "mixedTime"),
            text(data, "bestHours"),
            text(data, "trend"),
        )),
        "motivation" => Some(format!(
            "Generate ONE short motivational message for a student.\n\n\
             Event: {}\n\
             Details: {}\n\n\
             Rules:\n\
             - One sentence only\n\
             - Friendly and encouraging\n\
             - No emojis\n\
             - Do NOT mention AI or models\n",
            text(data, "event"),
            text(data, "details"),
        )),
        _ => None,
    }
}

/// Render a data field for prompt interpolation: strings verbatim, other
/// JSON values via their compact form, missing fields as empty.
fn text(data: &Value, key: &str) -> String {
    match data.get(key) {
        None | Some(Value::Null) => String::new(),
        Some(Value::String(s)) => s.clone(),
        Some(other) => other.to_string(),
    }
}

/// Client for the Gemini `generateContent` REST endpoint.
#[derive(Clone)]
pub struct GeminiClient {
    http: reqwest::Client,
    api_key: String,
    model: String,
}

impl GeminiClient {
    pub fn new(api_key: String) -> Self {
        Self {
            http: reqwest::Client::new(),
            api_key,
            model: DEFAULT_MODEL.to_string(),
        }
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    /// One-shot text completion. Any transport, status, or shape problem
    /// surfaces as an error; the route layer degrades to the fallback.
    pub async fn generate(&self, prompt: &str) -> Result<String> {
        let url = format!(
            "https://generativelanguage.googleapis.com/v1beta/models/{}:generateContent?key={}",
            self.model, self.api_key
        );
        let body = serde_json::json!({
            "contents": [
                { "role": "user", "parts": [{ "text": prompt }] }
            ]
        });

        let resp = self.http.post(&url).json(&body).send().await?;
        let status = resp.status();
        if !status.is_success() {
            return Err(anyhow!("generation upstream returned {status}"));
        }

        let payload: Value = resp.json().await?;
        let message = payload
            .pointer("/candidates/0/content/parts/0/text")
            .and_then(Value::as_str)
            .ok_or_else(|| anyhow!("generation upstream returned no text"))?;
        Ok(message.trim().to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn chat_prompt_interpolates_data() {
        let data = json!({
            "learningTime": 3600,
            "distractionTime": "45m",
            "bestHours": [9, 14],
            "pattern": "steady",
            "question": "How do I focus longer?"
        });
        let prompt = build_prompt("chat", &data).unwrap();
        assert!(prompt.contains("Learning time: 3600"));
        assert!(prompt.contains("Distraction time: 45m"));
        assert!(prompt.contains("Best study hours: [9,14]"));
        assert!(prompt.contains("\"How do I focus longer?\""));
    }

    #[test]
    fn reflection_and_motivation_prompts_exist() {
        let data = json!({"event": "rank_up", "details": "now #1"});
        assert!(build_prompt("reflection", &data).is_some());
        let motivation = build_prompt("motivation", &data).unwrap();
        assert!(motivation.contains("Event: rank_up"));
        assert!(motivation.contains("Details: now #1"));
    }

    #[test]
    fn unknown_type_builds_no_prompt() {
        assert!(build_prompt("roast", &json!({})).is_none());
    }

    #[test]
    fn missing_fields_render_empty() {
        let prompt = build_prompt("chat", &json!({})).unwrap();
        assert!(prompt.contains("Learning time: \n"));
    }
}
