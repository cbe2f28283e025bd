use crate::{
    config::ProviderConfig,
    error::{EngineError, Result},
    model::Artifact,
};
use async_trait::async_trait;
use base64::{engine::general_purpose, Engine};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChatRole {
    User,
    Model,
}

#[derive(Debug, Clone)]
pub struct ChatTurn {
    pub role: ChatRole,
    pub text: String,
}

#[derive(Debug, Clone, Default)]
pub struct ChatRequest {
    pub system_instruction: Option<String>,
    pub turns: Vec<ChatTurn>,
    /// JPEG bytes attached ahead of the final turn (listing generation,
    /// document scanning).
    pub inline_image: Option<Vec<u8>>,
    /// Ground the reply in web search results (pricing advice).
    pub web_search: bool,
    /// Ground the reply in Google Maps results (supplier lookup).
    pub maps_search: bool,
    /// Token budget for the model's internal reasoning pass. `None` leaves
    /// the provider default.
    pub thinking_budget: Option<u32>,
}

impl ChatRequest {
    pub fn single(text: impl Into<String>) -> Self {
        Self {
            system_instruction: None,
            turns: vec![ChatTurn {
                role: ChatRole::User,
                text: text.into(),
            }],
            inline_image: None,
            web_search: false,
            maps_search: false,
            thinking_budget: None,
        }
    }
}

/// A cited web or maps source backing a grounded reply.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceRef {
    pub uri: String,
    pub title: Option<String>,
}

/// A reply produced with tool grounding, plus the sources the provider cited.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GroundedAnswer {
    pub text: String,
    pub sources: Vec<SourceRef>,
}

/// Free-text or structured reasoning backend. The negotiation engine and the
/// market assistant only see this seam, so tests script it directly.
#[async_trait]
pub trait ReasoningProvider: Send + Sync {
    async fn chat(&self, request: ChatRequest) -> Result<String>;

    /// Request a reply conforming to a JSON schema. Implementations return
    /// the parsed JSON value; schema violations surface as `Serialization`.
    async fn chat_structured(
        &self,
        request: ChatRequest,
        schema: serde_json::Value,
    ) -> Result<serde_json::Value>;

    /// Like `chat`, but also surfaces the grounding sources the provider
    /// cited. Callers set `web_search` or `maps_search` on the request.
    async fn chat_grounded(&self, request: ChatRequest) -> Result<GroundedAnswer>;
}

/// Handle to a long-running provider operation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OperationHandle(pub String);

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OperationStatus {
    Pending,
    Done { video_uri: Option<String> },
}

/// A freshly submitted video operation: handle plus the initial done flag.
#[derive(Debug, Clone)]
pub struct VideoOperation {
    pub handle: OperationHandle,
    pub status: OperationStatus,
}

#[async_trait]
pub trait GenerationProvider: Send + Sync {
    async fn generate_image(
        &self,
        prompt: &str,
        source_image: Option<&[u8]>,
        aspect_ratio: &str,
    ) -> Result<Artifact>;

    async fn start_video(&self, prompt: &str, source_image: Option<&[u8]>)
        -> Result<VideoOperation>;

    async fn poll_video(&self, handle: &OperationHandle) -> Result<OperationStatus>;

    /// Download the finished artifact. The provider's result URI requires the
    /// API key as a query parameter.
    async fn fetch_artifact(&self, uri: &str) -> Result<Artifact>;
}

pub struct GeminiClient {
    config: ProviderConfig,
    client: Client,
}

impl GeminiClient {
    pub fn new(config: ProviderConfig) -> Result<Self> {
        let mut builder = Client::builder();
        if let Some(secs) = config.timeout_seconds {
            builder = builder.timeout(Duration::from_secs(secs));
        }
        let client = builder.build()?;
        Ok(Self { config, client })
    }

    fn api_key(&self) -> Result<&str> {
        self.config
            .api_key
            .as_deref()
            .ok_or_else(|| EngineError::Config("Provider API key is not set".to_string()))
    }

    fn model_url(&self, model: &str, verb: &str) -> Result<String> {
        Ok(format!(
            "{}/models/{}:{}?key={}",
            self.config.api_base,
            model,
            verb,
            self.api_key()?
        ))
    }

    async fn generate_content(
        &self,
        model: &str,
        body: &GenerateContentRequest,
    ) -> Result<GenerateContentResponse> {
        let url = self.model_url(model, "generateContent")?;
        let response = self.client.post(&url).json(body).send().await?;

        if !response.status().is_success() {
            let status = response.status();
            let detail = response.text().await.unwrap_or_default();
            return Err(EngineError::ProviderUnavailable(format!(
                "generateContent returned {}: {}",
                status, detail
            )));
        }

        Ok(response.json().await?)
    }

    fn chat_body(&self, request: &ChatRequest) -> GenerateContentRequest {
        let last_turn = request.turns.len().saturating_sub(1);
        let contents = request
            .turns
            .iter()
            .enumerate()
            .map(|(i, turn)| {
                let mut parts = Vec::new();
                if i == last_turn {
                    if let Some(bytes) = &request.inline_image {
                        parts.push(Part::inline_jpeg(bytes));
                    }
                }
                parts.push(Part::text(&turn.text));
                Content {
                    role: Some(
                        match turn.role {
                            ChatRole::User => "user",
                            ChatRole::Model => "model",
                        }
                        .to_string(),
                    ),
                    parts,
                }
            })
            .collect();

        let mut tools = Vec::new();
        if request.web_search {
            tools.push(Tool::google_search());
        }
        if request.maps_search {
            tools.push(Tool::google_maps());
        }

        GenerateContentRequest {
            contents,
            system_instruction: request
                .system_instruction
                .as_ref()
                .map(|text| SystemInstruction {
                    parts: vec![Part::text(text)],
                }),
            generation_config: request.thinking_budget.map(|budget| GenerationConfigBody {
                thinking_config: Some(ThinkingConfigBody {
                    thinking_budget: budget,
                }),
                ..GenerationConfigBody::default()
            }),
            tools: (!tools.is_empty()).then_some(tools),
        }
    }
}

#[async_trait]
impl ReasoningProvider for GeminiClient {
    async fn chat(&self, request: ChatRequest) -> Result<String> {
        let body = self.chat_body(&request);
        let response = self
            .generate_content(&self.config.chat_model, &body)
            .await?;

        response
            .text()
            .ok_or_else(|| EngineError::ProviderUnavailable("Empty chat response".to_string()))
    }

    async fn chat_structured(
        &self,
        request: ChatRequest,
        schema: serde_json::Value,
    ) -> Result<serde_json::Value> {
        let mut body = self.chat_body(&request);
        let mut config = body.generation_config.take().unwrap_or_default();
        config.response_mime_type = Some("application/json".to_string());
        config.response_schema = Some(schema);
        body.generation_config = Some(config);

        let response = self
            .generate_content(&self.config.chat_model, &body)
            .await?;
        let text = response.text().ok_or_else(|| {
            EngineError::ProviderUnavailable("Empty structured response".to_string())
        })?;

        Ok(serde_json::from_str(&text)?)
    }

    async fn chat_grounded(&self, request: ChatRequest) -> Result<GroundedAnswer> {
        let body = self.chat_body(&request);
        let response = self
            .generate_content(&self.config.chat_model, &body)
            .await?;

        let text = response.text().ok_or_else(|| {
            EngineError::ProviderUnavailable("Empty grounded response".to_string())
        })?;
        let sources = response.sources();

        Ok(GroundedAnswer { text, sources })
    }
}

#[async_trait]
impl GenerationProvider for GeminiClient {
    async fn generate_image(
        &self,
        prompt: &str,
        source_image: Option<&[u8]>,
        aspect_ratio: &str,
    ) -> Result<Artifact> {
        let mut parts = Vec::new();
        if let Some(bytes) = source_image {
            parts.push(Part::inline_jpeg(bytes));
        }
        parts.push(Part::text(prompt));

        let body = GenerateContentRequest {
            contents: vec![Content { role: None, parts }],
            system_instruction: None,
            generation_config: Some(GenerationConfigBody {
                image_config: Some(ImageConfigBody {
                    aspect_ratio: aspect_ratio.to_string(),
                }),
                ..GenerationConfigBody::default()
            }),
            tools: None,
        };

        let response = self
            .generate_content(&self.config.image_model, &body)
            .await?;

        let inline = response
            .inline_data()
            .ok_or_else(|| EngineError::GenerationFailed("No image in response".to_string()))?;
        let data = general_purpose::STANDARD
            .decode(&inline.data)
            .map_err(|e| EngineError::Serialization(e.to_string()))?;

        Ok(Artifact {
            mime_type: inline.mime_type.clone(),
            data,
        })
    }

    async fn start_video(
        &self,
        prompt: &str,
        source_image: Option<&[u8]>,
    ) -> Result<VideoOperation> {
        let url = self.model_url(&self.config.video_model, "predictLongRunning")?;
        let body = GenerateVideosRequest {
            prompt: prompt.to_string(),
            image: source_image.map(|bytes| InlineImage {
                image_bytes: general_purpose::STANDARD.encode(bytes),
                mime_type: "image/jpeg".to_string(),
            }),
            config: VideoConfigBody {
                number_of_videos: 1,
                resolution: "720p".to_string(),
                aspect_ratio: "16:9".to_string(),
            },
        };

        let response = self.client.post(&url).json(&body).send().await?;
        if !response.status().is_success() {
            let status = response.status();
            let detail = response.text().await.unwrap_or_default();
            return Err(EngineError::ProviderUnavailable(format!(
                "Video submission returned {}: {}",
                status, detail
            )));
        }

        let operation: OperationResponse = response.json().await?;
        Ok(operation.into_status())
    }

    async fn poll_video(&self, handle: &OperationHandle) -> Result<OperationStatus> {
        let url = format!(
            "{}/{}?key={}",
            self.config.api_base,
            handle.0,
            self.api_key()?
        );
        let response = self.client.get(&url).send().await?;
        if !response.status().is_success() {
            let status = response.status();
            return Err(EngineError::ProviderUnavailable(format!(
                "Operation poll returned {}",
                status
            )));
        }

        let operation: OperationResponse = response.json().await?;
        Ok(operation.into_status().status)
    }

    async fn fetch_artifact(&self, uri: &str) -> Result<Artifact> {
        let url = format!("{}&key={}", uri, self.api_key()?);
        let response = self.client.get(&url).send().await?;
        if !response.status().is_success() {
            let status = response.status();
            return Err(EngineError::GenerationFailed(format!(
                "Artifact download returned {}",
                status
            )));
        }

        let mime_type = response
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|value| value.to_str().ok())
            .unwrap_or("video/mp4")
            .to_string();
        let data = response.bytes().await?.to_vec();

        Ok(Artifact { mime_type, data })
    }
}

// Wire types for the generateContent surface.

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerateContentRequest {
    contents: Vec<Content>,
    #[serde(skip_serializing_if = "Option::is_none")]
    system_instruction: Option<SystemInstruction>,
    #[serde(skip_serializing_if = "Option::is_none")]
    generation_config: Option<GenerationConfigBody>,
    #[serde(skip_serializing_if = "Option::is_none")]
    tools: Option<Vec<Tool>>,
}

#[derive(Debug, Serialize, Deserialize)]
struct Content {
    #[serde(skip_serializing_if = "Option::is_none")]
    role: Option<String>,
    #[serde(default)]
    parts: Vec<Part>,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Part {
    #[serde(skip_serializing_if = "Option::is_none")]
    text: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    inline_data: Option<InlineData>,
}

impl Part {
    fn text(text: &str) -> Self {
        Self {
            text: Some(text.to_string()),
            inline_data: None,
        }
    }

    fn inline_jpeg(bytes: &[u8]) -> Self {
        Self {
            text: None,
            inline_data: Some(InlineData {
                mime_type: "image/jpeg".to_string(),
                data: general_purpose::STANDARD.encode(bytes),
            }),
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct InlineData {
    mime_type: String,
    data: String,
}

#[derive(Debug, Serialize)]
struct SystemInstruction {
    parts: Vec<Part>,
}

#[derive(Debug, Serialize, Default)]
#[serde(rename_all = "camelCase")]
struct GenerationConfigBody {
    #[serde(skip_serializing_if = "Option::is_none")]
    response_mime_type: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    response_schema: Option<serde_json::Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    image_config: Option<ImageConfigBody>,
    #[serde(skip_serializing_if = "Option::is_none")]
    thinking_config: Option<ThinkingConfigBody>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct ThinkingConfigBody {
    thinking_budget: u32,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct ImageConfigBody {
    aspect_ratio: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct Tool {
    #[serde(skip_serializing_if = "Option::is_none")]
    google_search: Option<serde_json::Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    google_maps: Option<serde_json::Value>,
}

impl Tool {
    fn google_search() -> Self {
        Self {
            google_search: Some(serde_json::json!({})),
            google_maps: None,
        }
    }

    fn google_maps() -> Self {
        Self {
            google_search: None,
            google_maps: Some(serde_json::json!({})),
        }
    }
}

#[derive(Debug, Deserialize)]
struct GenerateContentResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Candidate {
    content: Option<Content>,
    grounding_metadata: Option<GroundingMetadataBody>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GroundingMetadataBody {
    #[serde(default)]
    grounding_chunks: Vec<GroundingChunkBody>,
}

#[derive(Debug, Deserialize)]
struct GroundingChunkBody {
    web: Option<WebSourceBody>,
}

#[derive(Debug, Deserialize)]
struct WebSourceBody {
    uri: Option<String>,
    title: Option<String>,
}

impl GenerateContentResponse {
    fn text(&self) -> Option<String> {
        let parts = &self.candidates.first()?.content.as_ref()?.parts;
        let text: String = parts
            .iter()
            .filter_map(|part| part.text.as_deref())
            .collect();
        if text.is_empty() {
            None
        } else {
            Some(text)
        }
    }

    fn inline_data(&self) -> Option<&InlineData> {
        self.candidates
            .first()?
            .content
            .as_ref()?
            .parts
            .iter()
            .find_map(|part| part.inline_data.as_ref())
    }

    fn sources(&self) -> Vec<SourceRef> {
        self.candidates
            .first()
            .and_then(|candidate| candidate.grounding_metadata.as_ref())
            .map(|metadata| {
                metadata
                    .grounding_chunks
                    .iter()
                    .filter_map(|chunk| {
                        let web = chunk.web.as_ref()?;
                        Some(SourceRef {
                            uri: web.uri.clone()?,
                            title: web.title.clone(),
                        })
                    })
                    .collect()
            })
            .unwrap_or_default()
    }
}

// Wire types for long-running video operations.

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerateVideosRequest {
    prompt: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    image: Option<InlineImage>,
    config: VideoConfigBody,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct InlineImage {
    image_bytes: String,
    mime_type: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct VideoConfigBody {
    number_of_videos: u32,
    resolution: String,
    aspect_ratio: String,
}

#[derive(Debug, Deserialize)]
struct OperationResponse {
    name: String,
    #[serde(default)]
    done: bool,
    response: Option<VideosPayload>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct VideosPayload {
    #[serde(default)]
    generated_videos: Vec<GeneratedVideo>,
}

#[derive(Debug, Deserialize)]
struct GeneratedVideo {
    video: Option<VideoRef>,
}

#[derive(Debug, Deserialize)]
struct VideoRef {
    uri: Option<String>,
}

impl OperationResponse {
    fn into_status(self) -> VideoOperation {
        let status = if self.done {
            let video_uri = self
                .response
                .and_then(|payload| payload.generated_videos.into_iter().next())
                .and_then(|generated| generated.video)
                .and_then(|video| video.uri);
            OperationStatus::Done { video_uri }
        } else {
            OperationStatus::Pending
        };
        VideoOperation {
            handle: OperationHandle(self.name),
            status,
        }
    }
}
