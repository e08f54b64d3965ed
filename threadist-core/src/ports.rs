//! Service contracts between the client logic and its external collaborators:
//! the content/recommendation API and the interest directory. Feed loading and
//! playback depend only on these traits.

use crate::{
    AudioSource, CategoryInterests, CategorySubreddit, CoreError, InterestCategory,
    Recommendation, Story, StorySort, UserInterest,
};
use async_trait::async_trait;

/// Read access to stories and recommendations.
#[async_trait]
pub trait ContentSource: Send + Sync {
    /// Trending stories, best first. `page` starts at 1.
    async fn fetch_trending(&self, limit: usize, page: u32) -> Result<Vec<Story>, CoreError>;

    async fn fetch_recommended(
        &self,
        user_id: &str,
        limit: usize,
        page: u32,
    ) -> Result<Vec<Recommendation>, CoreError>;

    async fn fetch_for_subreddit(
        &self,
        subreddit: &str,
        limit: usize,
        sort: StorySort,
        page: u32,
    ) -> Result<Vec<Story>, CoreError>;

    async fn search(
        &self,
        query: &str,
        subreddit: Option<&str>,
        limit: usize,
    ) -> Result<Vec<Story>, CoreError>;
}

/// Text-to-speech synthesis.
#[async_trait]
pub trait SpeechSynthesizer: Send + Sync {
    async fn synthesize(&self, text: &str, voice_id: Option<&str>) -> Result<AudioSource, CoreError>;
}

/// Interest categories and the per-user subreddit selection.
#[async_trait]
pub trait InterestDirectory: Send + Sync {
    async fn list_categories(&self) -> Result<Vec<InterestCategory>, CoreError>;

    async fn list_subreddits_for_categories(
        &self,
        category_ids: &[String],
    ) -> Result<Vec<CategorySubreddit>, CoreError>;

    /// Replaces the user's whole selection with `csids` as one transaction.
    async fn replace_user_selection(&self, user_id: &str, csids: &[String]) -> Result<(), CoreError>;

    async fn user_selection(&self, user_id: &str) -> Result<Vec<UserInterest>, CoreError>;

    async fn has_completed_selection(&self, user_id: &str) -> Result<bool, CoreError>;

    async fn resolve_user_interests_with_categories(
        &self,
        user_id: &str,
    ) -> Result<Vec<CategoryInterests>, CoreError>;
}
