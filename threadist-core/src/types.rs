use chrono::{DateTime, TimeZone, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use std::fmt;

/// Normalised identity key for a subreddit name. Subreddit names compare
/// case-insensitively everywhere in the client.
pub fn subreddit_key(name: &str) -> String {
    name.trim().to_ascii_lowercase()
}

/// A single story as returned by the content API.
///
/// Two stories are the same story iff their ids match; titles and bodies may
/// legitimately repeat between different ids.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Story {
    pub id: String,
    pub title: String,
    #[serde(rename = "content", default)]
    pub body: String,
    pub author: String,
    pub subreddit: String,
    pub score: i64,
    pub num_comments: u32,
    #[serde(deserialize_with = "deserialize_epoch_seconds")]
    pub created_utc: i64,
    pub url: String,
    pub is_self: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub selftext: Option<String>,
}

impl Story {
    pub fn subreddit_key(&self) -> String {
        subreddit_key(&self.subreddit)
    }

    pub fn in_subreddit(&self, name: &str) -> bool {
        self.subreddit.trim().eq_ignore_ascii_case(name.trim())
    }

    pub fn created_at(&self) -> Option<DateTime<Utc>> {
        Utc.timestamp_opt(self.created_utc, 0).single()
    }

    /// Text handed to speech synthesis: the self text when present, the body
    /// otherwise, and the title as a last resort.
    pub fn narration_text(&self) -> &str {
        match self.selftext.as_deref() {
            Some(text) if !text.trim().is_empty() => text,
            _ if !self.body.trim().is_empty() => self.body.as_str(),
            _ => self.title.as_str(),
        }
    }
}

impl PartialEq for Story {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for Story {}

// The API serialises timestamps as floats.
fn deserialize_epoch_seconds<'de, D>(deserializer: D) -> Result<i64, D::Error>
where
    D: Deserializer<'de>,
{
    let seconds = f64::deserialize(deserializer)?;
    Ok(seconds as i64)
}

/// A story paired with the relevance score the recommendation service gave it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Recommendation {
    #[serde(rename = "post")]
    pub story: Story,
    #[serde(rename = "score")]
    pub relevance: f64,
    pub reason: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StorySort {
    #[default]
    Hot,
    New,
    Top,
    Rising,
}

impl StorySort {
    pub fn as_str(&self) -> &'static str {
        match self {
            StorySort::Hot => "hot",
            StorySort::New => "new",
            StorySort::Top => "top",
            StorySort::Rising => "rising",
        }
    }
}

impl fmt::Display for StorySort {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InterestCategory {
    pub category_id: String,
    pub slug: String,
    pub label: String,
    #[serde(default)]
    pub emoji: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
}

/// One row of the many-to-many category/subreddit mapping.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CategorySubreddit {
    pub csid: String,
    #[serde(default)]
    pub category_id: Option<String>,
    pub subreddit: String,
}

/// A persisted selection row: one subscribed category/subreddit pair.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserInterest {
    pub interest_id: String,
    pub csid: String,
    pub user_id: String,
    pub weight: i64,
}

/// A category the user follows together with the subreddits selected under it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CategoryInterests {
    pub category: InterestCategory,
    pub subreddits: Vec<String>,
}

impl CategoryInterests {
    pub fn covers(&self, story: &Story) -> bool {
        self.subreddits.iter().any(|name| story.in_subreddit(name))
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SubredditInfo {
    pub name: String,
    pub display_name: String,
    pub description: String,
    pub subscribers: u64,
    pub url: String,
    pub is_nsfw: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AudioStreamResponse {
    pub audio_url: String,
    #[serde(default)]
    pub duration: Option<f64>,
    pub text_length: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Voice {
    pub voice_id: String,
    pub name: String,
    #[serde(default)]
    pub category: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserProfile {
    pub user_id: String,
    pub email: String,
    #[serde(default)]
    pub interests: Vec<UserInterest>,
}

/// Playable audio produced by speech synthesis.
#[derive(Debug, Clone, PartialEq)]
pub struct AudioSource {
    pub url: url::Url,
    pub duration_ms: Option<u64>,
}

/// The signed-in identity as reported by the identity provider.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthUser {
    pub id: String,
    pub email: String,
    pub email_confirmed: bool,
}
