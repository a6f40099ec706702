use std::io::Cursor;
use std::time::Duration;

use base64::{engine::general_purpose, Engine as _};
use image::{DynamicImage, ImageFormat};
use reqwest::blocking::Client;
use serde::Deserialize;
use serde_json::{json, Value};

use super::{ApiKey, DescribeError, DescribeResult, Describer};

const ANTHROPIC_VERSION: &str = "2023-06-01";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DescribeSettings {
    pub base_url: String,
    pub model: String,
    pub max_tokens: u32,
    pub timeout: Duration,
}

/// Blocking client for the Anthropic Messages API. Meant to run on a worker
/// thread.
pub struct AnthropicDescriber {
    client: Client,
    settings: DescribeSettings,
    api_key: ApiKey,
}

impl AnthropicDescriber {
    pub fn new(settings: DescribeSettings, api_key: ApiKey) -> DescribeResult<Self> {
        let client = Client::builder()
            .timeout(settings.timeout)
            .build()
            .map_err(DescribeError::Http)?;
        Ok(Self {
            client,
            settings,
            api_key,
        })
    }

    fn endpoint(&self) -> String {
        format!("{}/v1/messages", self.settings.base_url.trim_end_matches('/'))
    }
}

impl Describer for AnthropicDescriber {
    fn describe(&self, image: &DynamicImage, prompt: &str) -> DescribeResult<String> {
        let png = encode_png_base64(image)?;
        let body = build_request_body(&self.settings, prompt, &png);

        tracing::info!(
            model = %self.settings.model,
            image_bytes = png.len(),
            "sending image description request"
        );
        let start = std::time::Instant::now();

        let response = self
            .client
            .post(self.endpoint())
            .header("x-api-key", self.api_key.expose())
            .header("anthropic-version", ANTHROPIC_VERSION)
            .json(&body)
            .send()
            .map_err(|err| self.classify_transport_error(err))?;

        let status = response.status();
        let text = response
            .text()
            .map_err(|err| self.classify_transport_error(err))?;
        if !status.is_success() {
            tracing::error!(status = status.as_u16(), "description request rejected");
            return Err(DescribeError::Api {
                status: status.as_u16(),
                body: text,
            });
        }

        let reply = parse_reply(&text)?;
        tracing::info!(
            elapsed_ms = start.elapsed().as_millis() as u64,
            reply_chars = reply.chars().count(),
            "received image description"
        );
        Ok(reply)
    }
}

impl AnthropicDescriber {
    fn classify_transport_error(&self, err: reqwest::Error) -> DescribeError {
        if err.is_timeout() {
            DescribeError::Timeout {
                seconds: self.settings.timeout.as_secs(),
            }
        } else {
            DescribeError::Http(err)
        }
    }
}

fn encode_png_base64(image: &DynamicImage) -> DescribeResult<String> {
    let mut png_bytes: Vec<u8> = Vec::new();
    image.write_to(&mut Cursor::new(&mut png_bytes), ImageFormat::Png)?;
    Ok(general_purpose::STANDARD.encode(png_bytes))
}

fn build_request_body(settings: &DescribeSettings, prompt: &str, png_base64: &str) -> Value {
    json!({
        "model": settings.model,
        "max_tokens": settings.max_tokens,
        "messages": [
            {
                "role": "user",
                "content": [
                    { "type": "text", "text": prompt },
                    {
                        "type": "image",
                        "source": {
                            "type": "base64",
                            "media_type": "image/png",
                            "data": png_base64
                        }
                    }
                ]
            }
        ]
    })
}

#[derive(Debug, Deserialize)]
struct MessagesResponse {
    content: Vec<ContentBlock>,
}

#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum ContentBlock {
    Text {
        text: String,
    },
    #[serde(other)]
    Other,
}

fn parse_reply(body: &str) -> DescribeResult<String> {
    let response: MessagesResponse =
        serde_json::from_str(body).map_err(|err| DescribeError::MalformedResponse {
            message: err.to_string(),
        })?;

    response
        .content
        .into_iter()
        .find_map(|block| match block {
            ContentBlock::Text { text } => Some(text),
            ContentBlock::Other => None,
        })
        .ok_or_else(|| DescribeError::MalformedResponse {
            message: "response has no text content".to_string(),
        })
}
