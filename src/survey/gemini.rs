// The Gemini generateContent endpoint as a classifier collaborator.

use reqwest::blocking::Client;
use serde::{Deserialize, Serialize};

use crate::survey::config_reader::GeminiSettings;
use crate::survey::*;

#[derive(Serialize, Debug)]
struct Part<'a> {
    text: &'a str,
}

#[derive(Serialize, Debug)]
struct Content<'a> {
    parts: Vec<Part<'a>>,
}

#[derive(Serialize, Debug)]
struct GenerateRequest<'a> {
    contents: Vec<Content<'a>>,
}

#[derive(Deserialize, Debug, Default)]
struct ReplyPart {
    #[serde(default)]
    text: Option<String>,
}

#[derive(Deserialize, Debug, Default)]
struct ReplyContent {
    #[serde(default)]
    parts: Vec<ReplyPart>,
}

#[derive(Deserialize, Debug)]
struct Candidate {
    #[serde(default)]
    content: ReplyContent,
}

#[derive(Deserialize, Debug)]
struct GenerateResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

/// The text of the first candidate, `None` if there is no text at all.
fn extract_text(response: &GenerateResponse) -> Option<String> {
    let candidate = response.candidates.first()?;
    let text: String = candidate
        .content
        .parts
        .iter()
        .filter_map(|p| p.text.as_deref())
        .collect();
    if text.trim().is_empty() {
        None
    } else {
        Some(text)
    }
}

pub struct GeminiCollaborator {
    client: Client,
    url: String,
    api_key: String,
}

impl GeminiCollaborator {
    pub fn new(settings: &GeminiSettings, api_key: String) -> SurveyResult<GeminiCollaborator> {
        let client = Client::builder()
            .timeout(settings.timeout)
            .build()
            .context(HttpClientSnafu {})?;
        let url = format!(
            "{}/models/{}:generateContent",
            settings.endpoint.trim_end_matches('/'),
            settings.model
        );
        debug!("GeminiCollaborator: url {:?}", url);
        Ok(GeminiCollaborator {
            client,
            url,
            api_key,
        })
    }
}

impl Collaborator for GeminiCollaborator {
    fn generate(&self, prompt: &str) -> Result<String, CollaboratorError> {
        let body = GenerateRequest {
            contents: vec![Content {
                parts: vec![Part { text: prompt }],
            }],
        };
        let response = self
            .client
            .post(&self.url)
            .query(&[("key", self.api_key.as_str())])
            .json(&body)
            .send()
            .map_err(|e| CollaboratorError::Transport {
                message: e.without_url().to_string(),
            })?;

        let status = response.status();
        if !status.is_success() {
            return Err(CollaboratorError::Rejected {
                status: status.as_u16(),
            });
        }

        let decoded: GenerateResponse =
            response.json().map_err(|e| CollaboratorError::Transport {
                message: e.without_url().to_string(),
            })?;
        extract_text(&decoded).ok_or(CollaboratorError::EmptyReply)
    }
}
