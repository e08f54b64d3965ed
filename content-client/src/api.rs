use async_trait::async_trait;
use reqwest::{Client, Method, Response};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use std::time::Duration;
use threadist_core::{
    AppConfig, AudioSource, AudioStreamResponse, CategorySubreddit, ContentApiError,
    ContentSource, CoreError, InterestCategory, Recommendation, SpeechSynthesizer, Story,
    StorySort, SubredditInfo, UserProfile, Voice,
};
use tracing::{debug, error, info};
use url::Url;

/// The backend refuses to synthesise longer texts.
pub const MAX_SPEECH_TEXT_LENGTH: usize = 5000;

/// Error payload the backend attaches to non-2xx responses.
#[derive(Debug, Deserialize)]
struct ErrorBody {
    detail: String,
}

/// HTTP client for the Threadist content, recommendation and TTS API.
///
/// Every call is a single request/response. Nothing is retried here; a
/// failure surfaces as [`CoreError`] and the caller decides what the user sees.
#[derive(Debug, Clone)]
pub struct ContentApiClient {
    http_client: Client,
    base_url: Url,
    default_voice_id: String,
}

impl ContentApiClient {
    pub fn new(config: &AppConfig) -> Result<Self, CoreError> {
        let http_client = Client::builder()
            .user_agent(concat!("threadist/", env!("CARGO_PKG_VERSION")))
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .build()
            .map_err(|e| CoreError::Internal {
                message: format!("Failed to create HTTP client: {}", e),
            })?;

        Ok(Self::with_client(
            http_client,
            config.api_base_url.clone(),
            config.default_voice_id.clone(),
        ))
    }

    /// Builds a client on top of an existing [`reqwest::Client`] so connection
    /// pools can be shared.
    pub fn with_client(http_client: Client, base_url: Url, default_voice_id: String) -> Self {
        Self {
            http_client,
            base_url,
            default_voice_id,
        }
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    fn endpoint(&self, segments: &[&str]) -> Result<Url, CoreError> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|_| CoreError::InvalidInput {
                message: format!("{} cannot be used as a base URL", self.base_url),
            })?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    async fn make_request(
        &self,
        method: Method,
        url: Url,
        query_params: &[(&str, String)],
    ) -> Result<Response, CoreError> {
        info!("Making content API request: {} {}", method, url.path());

        let mut request_builder = self.http_client.request(method.clone(), url.clone());
        if !query_params.is_empty() {
            request_builder = request_builder.query(query_params);
        }

        let response = request_builder.send().await.map_err(|e| {
            error!("Network error for {} {}: {}", method, url.path(), e);
            CoreError::from(e)
        })?;

        let status = response.status();
        if status.is_success() {
            debug!("Request successful: {} {}", status, url.path());
            return Ok(response);
        }

        // FastAPI puts the reason in `detail`; fall back to the bare status.
        let body = response.text().await.unwrap_or_default();
        let detail = serde_json::from_str::<ErrorBody>(&body)
            .map(|b| b.detail)
            .unwrap_or_else(|_| format!("HTTP error! status: {}", status.as_u16()));

        error!(
            "Request failed with status: {} for {}: {}",
            status,
            url.path(),
            detail
        );
        Err(CoreError::RequestFailed {
            status: status.as_u16(),
            detail,
        })
    }

    async fn get_json<T: DeserializeOwned>(
        &self,
        segments: &[&str],
        query_params: &[(&str, String)],
    ) -> Result<T, CoreError> {
        let url = self.endpoint(segments)?;
        let path = url.path().to_string();
        let response = self.make_request(Method::GET, url, query_params).await?;
        parse_json(response, &path).await
    }

    pub async fn trending_recommendations(
        &self,
        limit: usize,
        page: u32,
    ) -> Result<Vec<Recommendation>, CoreError> {
        let params = [("limit", limit.to_string()), ("page", page.to_string())];
        let recommendations: Vec<Recommendation> = self
            .get_json(&["api", "recommendations", "trending"], &params)
            .await?;
        info!("Retrieved {} trending stories", recommendations.len());
        Ok(recommendations)
    }

    pub async fn subreddit_info(&self, subreddit: &str) -> Result<SubredditInfo, CoreError> {
        let info: SubredditInfo = self
            .get_json(&["api", "reddit", "subreddit", subreddit, "info"], &[])
            .await?;
        debug!("Retrieved info for r/{}", subreddit);
        Ok(info)
    }

    pub async fn search_subreddits(
        &self,
        query: &str,
        limit: usize,
    ) -> Result<Vec<SubredditInfo>, CoreError> {
        let params = [("query", query.to_string()), ("limit", limit.to_string())];
        self.get_json(&["api", "reddit", "subreddits", "search"], &params)
            .await
    }

    pub async fn available_voices(&self) -> Result<Vec<Voice>, CoreError> {
        self.get_json(&["api", "tts", "voices"], &[]).await
    }

    /// Legacy profile path; interests are normally read from the directory.
    pub async fn user_profile(&self, user_id: &str) -> Result<UserProfile, CoreError> {
        self.get_json(&["api", "user", user_id, "profile"], &[]).await
    }

    pub async fn categories(&self) -> Result<Vec<InterestCategory>, CoreError> {
        self.get_json(&["api", "categories"], &[]).await
    }

    pub async fn category_subreddits(
        &self,
        category_id: &str,
    ) -> Result<Vec<CategorySubreddit>, CoreError> {
        self.get_json(&["api", "categories", category_id, "subreddits"], &[])
            .await
    }

    /// Public URL for a generated audio file.
    pub fn audio_url(&self, filename: &str) -> Result<Url, CoreError> {
        self.endpoint(&["api", "tts", "audio", filename])
    }

    pub async fn generate_audio(
        &self,
        text: &str,
        voice_id: Option<&str>,
    ) -> Result<AudioStreamResponse, CoreError> {
        let length = text.chars().count();
        if text.trim().is_empty() {
            return Err(CoreError::InvalidInput {
                message: "Cannot synthesise empty text".to_string(),
            });
        }
        if length > MAX_SPEECH_TEXT_LENGTH {
            return Err(ContentApiError::TextTooLong {
                length,
                max: MAX_SPEECH_TEXT_LENGTH,
            }
            .into());
        }

        let voice = voice_id.unwrap_or(&self.default_voice_id);
        let params = [("text", text.to_string()), ("voice_id", voice.to_string())];
        let url = self.endpoint(&["api", "tts", "generate"])?;
        let path = url.path().to_string();
        let response = self.make_request(Method::POST, url, &params).await?;
        let generated: AudioStreamResponse = parse_json(response, &path).await?;

        info!(
            "Generated audio for {} characters: {}",
            generated.text_length, generated.audio_url
        );
        Ok(generated)
    }
}

async fn parse_json<T: DeserializeOwned>(response: Response, path: &str) -> Result<T, CoreError> {
    response.json().await.map_err(|e| {
        error!("Failed to parse response from {}: {}", path, e);
        CoreError::ContentApi(ContentApiError::InvalidResponse {
            details: format!("Failed to parse response from {}", path),
        })
    })
}

#[async_trait]
impl ContentSource for ContentApiClient {
    async fn fetch_trending(&self, limit: usize, page: u32) -> Result<Vec<Story>, CoreError> {
        let recommendations = self.trending_recommendations(limit, page).await?;
        Ok(recommendations.into_iter().map(|r| r.story).collect())
    }

    async fn fetch_recommended(
        &self,
        user_id: &str,
        limit: usize,
        page: u32,
    ) -> Result<Vec<Recommendation>, CoreError> {
        let params = [
            ("user_id", user_id.to_string()),
            ("limit", limit.to_string()),
            ("page", page.to_string()),
        ];
        let recommendations: Vec<Recommendation> = self
            .get_json(&["api", "recommendations", "stories"], &params)
            .await?;
        info!(
            "Retrieved {} recommendations for user {}",
            recommendations.len(),
            user_id
        );
        Ok(recommendations)
    }

    async fn fetch_for_subreddit(
        &self,
        subreddit: &str,
        limit: usize,
        sort: StorySort,
        page: u32,
    ) -> Result<Vec<Story>, CoreError> {
        let params = [
            ("limit", limit.to_string()),
            ("sort", sort.to_string()),
            ("page", page.to_string()),
        ];
        let stories: Vec<Story> = self
            .get_json(&["api", "reddit", "subreddit", subreddit, "stories"], &params)
            .await?;
        info!("Retrieved {} stories from r/{}", stories.len(), subreddit);
        Ok(stories)
    }

    async fn search(
        &self,
        query: &str,
        subreddit: Option<&str>,
        limit: usize,
    ) -> Result<Vec<Story>, CoreError> {
        let mut params = vec![("query", query.to_string()), ("limit", limit.to_string())];
        if let Some(name) = subreddit {
            params.push(("subreddit", name.to_string()));
        }
        let stories: Vec<Story> = self.get_json(&["api", "reddit", "search"], &params).await?;
        info!("Search for {:?} returned {} stories", query, stories.len());
        Ok(stories)
    }
}

#[async_trait]
impl SpeechSynthesizer for ContentApiClient {
    async fn synthesize(&self, text: &str, voice_id: Option<&str>) -> Result<AudioSource, CoreError> {
        let generated = self.generate_audio(text, voice_id).await?;

        let filename = generated
            .audio_url
            .rsplit('/')
            .next()
            .filter(|name| !name.is_empty())
            .ok_or_else(|| {
                CoreError::ContentApi(ContentApiError::InvalidResponse {
                    details: format!("audio_url has no file name: {}", generated.audio_url),
                })
            })?;

        Ok(AudioSource {
            url: self.audio_url(filename)?,
            duration_ms: generated
                .duration
                .filter(|seconds| seconds.is_finite() && *seconds > 0.0)
                .map(|seconds| (seconds * 1000.0).round() as u64),
        })
    }
}
