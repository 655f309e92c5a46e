use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use std::time::Duration;

const CHAT_COMPLETIONS_URL: &str = "https://api.openai.com/v1/chat/completions";
const CLASSIFY_TIMEOUT: Duration = Duration::from_secs(20);

const PROCTOR_PROMPT: &str = r#"You are an AI proctor analyzing a student's webcam feed during an exam. Your primary goal is to detect behaviors indicative of cheating.

Strictly consider the following as suspicious activities:
1. Multiple Faces: more than one distinct face is clearly visible.
2. Unauthorized Sounds: the student is visibly talking or whispering, or is clearly engaged in a conversation.
3. Looking Away: the student's gaze is consistently directed away from the screen, suggesting notes, another device or another person.
4. Use of Unauthorized Devices: any visual evidence of a phone, tablet, smartwatch or other electronic device.
5. Leaving the View: the student's face is partially or fully out of the camera's view.

If ANY of these is detected set "isSuspicious" to true and give a clear, concise "reason" naming the observed activity, e.g. "Multiple faces detected in the webcam feed."
Otherwise set "isSuspicious" to false with a neutral reason such as "No suspicious behavior detected."

Return JSON: { "isSuspicious": <bool>, "reason": "<string>" }. Base the decision only on the snapshot."#;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BehaviorVerdict {
    pub is_suspicious: bool,
    pub reason: String,
}

#[derive(Debug, thiserror::Error)]
pub enum ClassifierError {
    #[error("classifier request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("classifier returned {status}: {body}")]
    Status { status: u16, body: String },

    #[error("malformed classifier response: {0}")]
    Malformed(String),

    #[error("classifier timed out")]
    Timeout,
}

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait BehaviorClassifier: Send + Sync {
    async fn classify(
        &self,
        frame_data_uri: &str,
        elapsed_seconds: u32,
        question_number: usize,
    ) -> Result<BehaviorVerdict, ClassifierError>;
}

#[derive(Clone)]
pub struct OpenAiBehaviorClassifier {
    client: Client,
    api_key: String,
    model: String,
}

impl OpenAiBehaviorClassifier {
    pub fn new(api_key: String, model: String, client: Client) -> Self {
        Self {
            client,
            api_key,
            model,
        }
    }

    fn build_payload(&self, frame_data_uri: &str, elapsed_seconds: u32, question_number: usize) -> JsonValue {
        serde_json::json!({
            "model": self.model,
            "messages": [
                {"role": "system", "content": PROCTOR_PROMPT},
                {"role": "user", "content": [
                    {
                        "type": "text",
                        "text": format!(
                            "Exam session context:\nTime elapsed: {} seconds\nCurrent question: {}",
                            elapsed_seconds, question_number
                        )
                    },
                    {
                        "type": "image_url",
                        "image_url": { "url": frame_data_uri, "detail": "low" }
                    }
                ]}
            ],
            "response_format": { "type": "json_object" },
            "temperature": 0.0
        })
    }
}

#[async_trait]
impl BehaviorClassifier for OpenAiBehaviorClassifier {
    async fn classify(
        &self,
        frame_data_uri: &str,
        elapsed_seconds: u32,
        question_number: usize,
    ) -> Result<BehaviorVerdict, ClassifierError> {
        let payload = self.build_payload(frame_data_uri, elapsed_seconds, question_number);

        let res = self
            .client
            .post(CHAT_COMPLETIONS_URL)
            .bearer_auth(&self.api_key)
            .json(&payload)
            .timeout(CLASSIFY_TIMEOUT)
            .send()
            .await
            .map_err(map_transport_error)?;

        if !res.status().is_success() {
            let status = res.status().as_u16();
            let body = res.text().await.unwrap_or_default();
            return Err(ClassifierError::Status { status, body });
        }

        let body: JsonValue = res.json().await.map_err(map_transport_error)?;
        parse_completion(&body)
    }
}

fn map_transport_error(err: reqwest::Error) -> ClassifierError {
    if err.is_timeout() {
        ClassifierError::Timeout
    } else {
        ClassifierError::Http(err)
    }
}

/// Pulls the verdict out of a chat-completions body.
pub fn parse_completion(body: &JsonValue) -> Result<BehaviorVerdict, ClassifierError> {
    let content = body
        .get("choices")
        .and_then(|c| c.get(0))
        .and_then(|c| c.get("message"))
        .and_then(|m| m.get("content"))
        .and_then(|c| c.as_str())
        .ok_or_else(|| ClassifierError::Malformed("missing message content".to_string()))?;

    let value: JsonValue = serde_json::from_str(content)
        .map_err(|e| ClassifierError::Malformed(format!("content is not JSON: {}", e)))?;
    parse_verdict(&value)
}

pub fn parse_verdict(value: &JsonValue) -> Result<BehaviorVerdict, ClassifierError> {
    let is_suspicious = value
        .get("isSuspicious")
        .and_then(|v| v.as_bool())
        .ok_or_else(|| ClassifierError::Malformed("isSuspicious must be a boolean".to_string()))?;
    let reason = value
        .get("reason")
        .and_then(|v| v.as_str())
        .map(|s| s.trim().to_string())
        .ok_or_else(|| ClassifierError::Malformed("reason must be a string".to_string()))?;

    let reason = if reason.is_empty() && is_suspicious {
        "Suspicious behavior detected".to_string()
    } else {
        reason
    };

    Ok(BehaviorVerdict {
        is_suspicious,
        reason,
    })
}
