// SPDX-License-Identifier: MIT OR Apache-2.0
//! Gemini implementation of the vision contract.

use crate::contract::{Detection, ParsedRow, VisionError, VisionModel, CSV_PROMPT_VERSION};
use crate::scan::parse_detections;
use bgw_config::VisionSettings;
use base64::Engine;
use async_trait::async_trait;
use serde::Deserialize;
use serde_json::json;
use tracing::warn;

const DEFAULT_BASE_URL: &str = "https://generativelanguage.googleapis.com";

/// The versioned CSV parsing prompt. The version constant rides in the
/// cache key; change the text, bump the version.
fn csv_prompt() -> String {
    format!(
        "[{CSV_PROMPT_VERSION}] You are given the raw text of a CSV export of a \
         personal book collection. Identify the title, author, and ISBN columns \
         regardless of their header names or order. Answer with ONLY a JSON array \
         of objects with keys \"title\", \"author\", \"isbn\" (omit keys you \
         cannot determine). No prose, no markdown fences."
    )
}

const SCAN_PROMPT: &str = "This photo shows a bookshelf. List every distinct book spine you can \
     read. Answer with ONLY a JSON array of objects with keys \"title\", \
     \"author\", \"isbn\", \"confidence\" (0 to 1), and \"boundingBox\" \
     ({x, y, width, height} as fractions of the image). No prose.";

/// Gemini `generateContent` client.
pub struct GeminiVision {
    http: reqwest::Client,
    base_url: String,
    settings: VisionSettings,
}

impl GeminiVision {
    pub fn new(settings: VisionSettings) -> Self {
        let base_url = settings
            .base_url
            .clone()
            .unwrap_or_else(|| DEFAULT_BASE_URL.to_string());
        Self {
            http: reqwest::Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
            settings,
        }
    }

    async fn generate(&self, parts: serde_json::Value) -> Result<String, VisionError> {
        let key = self
            .settings
            .api_key
            .as_ref()
            .ok_or_else(|| VisionError::Rejected("vision API key not configured".into()))?;

        let url = format!(
            "{}/v1beta/models/{}:generateContent",
            self.base_url, self.settings.model
        );
        let response = self
            .http
            .post(url)
            .query(&[("key", key.expose())])
            .json(&json!({ "contents": [{ "parts": parts }] }))
            .send()
            .await
            .map_err(|e| VisionError::Unavailable(e.to_string()))?;

        let status = response.status();
        if status.as_u16() == 400 {
            return Err(VisionError::Rejected(format!("status {status}")));
        }
        if !status.is_success() {
            return Err(VisionError::Unavailable(format!("status {status}")));
        }

        let body: GenerateResponse = response
            .json()
            .await
            .map_err(|_| VisionError::BadModelOutput)?;
        body.first_text().ok_or(VisionError::BadModelOutput)
    }
}

#[async_trait]
impl VisionModel for GeminiVision {
    async fn parse_csv(&self, csv_text: &str) -> Result<Vec<ParsedRow>, VisionError> {
        let text = self
            .generate(json!([
                { "text": csv_prompt() },
                { "text": csv_text },
            ]))
            .await?;
        let stripped = text
            .trim()
            .trim_start_matches("```json")
            .trim_start_matches("```")
            .trim_end_matches("```")
            .trim();
        serde_json::from_str(stripped).map_err(|_| {
            warn!("vision model returned unparseable CSV rows");
            VisionError::BadModelOutput
        })
    }

    async fn detect_books(
        &self,
        image: &[u8],
        content_type: &str,
    ) -> Result<Vec<Detection>, VisionError> {
        let encoded = base64::engine::general_purpose::STANDARD.encode(image);
        let text = self
            .generate(json!([
                { "text": SCAN_PROMPT },
                { "inline_data": { "mime_type": content_type, "data": encoded } },
            ]))
            .await?;
        parse_detections(&text)
    }
}

// ---------------------------------------------------------------------------
// Wire types
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
struct GenerateResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Debug, Deserialize)]
struct Candidate {
    content: Option<Content>,
}

#[derive(Debug, Deserialize)]
struct Content {
    #[serde(default)]
    parts: Vec<Part>,
}

#[derive(Debug, Deserialize)]
struct Part {
    text: Option<String>,
}

impl GenerateResponse {
    fn first_text(&self) -> Option<String> {
        self.candidates
            .first()?
            .content
            .as_ref()?
            .parts
            .iter()
            .find_map(|p| p.text.clone())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use bgw_config::Secret;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn settings(server: &MockServer, key: Option<&str>) -> VisionSettings {
        VisionSettings {
            api_key: key.map(Secret::new),
            base_url: Some(server.uri()),
            ..VisionSettings::default()
        }
    }

    fn model_answer(text: &str) -> serde_json::Value {
        json!({
            "candidates": [{ "content": { "parts": [{ "text": text }] } }]
        })
    }

    #[tokio::test]
    async fn csv_rows_parse_from_model_answer() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1beta/models/gemini-2.0-flash:generateContent"))
            .respond_with(ResponseTemplate::new(200).set_body_json(model_answer(
                r#"[{"title": "1984", "author": "George Orwell"}]"#,
            )))
            .mount(&server)
            .await;

        let vision = GeminiVision::new(settings(&server, Some("v-key")));
        let rows = vision.parse_csv("Title,Author\n1984,George Orwell\n").await.unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].title, "1984");
    }

    #[tokio::test]
    async fn fenced_model_answer_still_parses() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_json(model_answer(
                "```json\n[{\"title\": \"Dune\"}]\n```",
            )))
            .mount(&server)
            .await;

        let vision = GeminiVision::new(settings(&server, Some("v-key")));
        let rows = vision.parse_csv("Title\nDune\n").await.unwrap();
        assert_eq!(rows[0].title, "Dune");
    }

    #[tokio::test]
    async fn detections_roundtrip_through_scan_parser() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_json(model_answer(
                r#"[{"title": "Dune", "confidence": 0.93,
                     "boundingBox": {"x": 0.1, "y": 0.2, "width": 0.05, "height": 0.5}}]"#,
            )))
            .mount(&server)
            .await;

        let vision = GeminiVision::new(settings(&server, Some("v-key")));
        let detections = vision.detect_books(b"fake-jpeg", "image/jpeg").await.unwrap();
        assert_eq!(detections.len(), 1);
        assert!(detections[0].bounding_box.is_some());
    }

    #[tokio::test]
    async fn missing_key_is_rejected_without_io() {
        let server = MockServer::start().await;
        let vision = GeminiVision::new(settings(&server, None));
        assert!(matches!(
            vision.parse_csv("Title\nDune\n").await.unwrap_err(),
            VisionError::Rejected(_)
        ));
    }

    #[tokio::test]
    async fn upstream_5xx_is_unavailable() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(500))
            .mount(&server)
            .await;

        let vision = GeminiVision::new(settings(&server, Some("k")));
        assert!(matches!(
            vision.parse_csv("Title\nDune\n").await.unwrap_err(),
            VisionError::Unavailable(_)
        ));
    }

    #[test]
    fn prompt_carries_its_version() {
        assert!(csv_prompt().contains(CSV_PROMPT_VERSION));
    }
}
