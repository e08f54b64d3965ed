use async_trait::async_trait;
use feed_assembler::{FeedLoader, LoadOutcome, SectionKey, SectionPager};
use std::sync::{Arc, Mutex};
use threadist_core::{
    CategoryInterests, CategorySubreddit, ContentSource, CoreError, DirectoryError, FeedSettings,
    InterestCategory, InterestDirectory, Recommendation, Story, StorySort, UserInterest,
};
use tokio::sync::Notify;

fn story(id: &str, subreddit: &str) -> Story {
    Story {
        id: id.to_string(),
        title: format!("Story {}", id),
        body: "Body".to_string(),
        author: "narrator".to_string(),
        subreddit: subreddit.to_string(),
        score: 1,
        num_comments: 0,
        created_utc: 0,
        url: String::new(),
        is_self: true,
        selftext: None,
    }
}

fn numbered(prefix: &str, subreddit: &str, count: usize) -> Vec<Story> {
    (0..count)
        .map(|i| story(&format!("{}{}", prefix, i), subreddit))
        .collect()
}

fn tech_group() -> CategoryInterests {
    CategoryInterests {
        category: InterestCategory {
            category_id: "cat-tech".to_string(),
            slug: "tech".to_string(),
            label: "Tech".to_string(),
            emoji: None,
            description: None,
        },
        subreddits: vec!["programming".to_string(), "rust".to_string()],
    }
}

#[derive(Default)]
struct FakeContent {
    fail_trending: bool,
    fail_recommended: bool,
    /// Recommended fetches for this user wait until notified.
    slow_user: Option<(String, Arc<Notify>)>,
    calls: Mutex<Vec<String>>,
}

impl FakeContent {
    fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    fn record(&self, call: String) {
        self.calls.lock().unwrap().push(call);
    }
}

fn unavailable() -> CoreError {
    CoreError::NetworkUnavailable {
        reason: "connection refused".to_string(),
    }
}

#[async_trait]
impl ContentSource for FakeContent {
    async fn fetch_trending(&self, limit: usize, page: u32) -> Result<Vec<Story>, CoreError> {
        self.record(format!("trending:{}:{}", limit, page));
        if self.fail_trending {
            return Err(unavailable());
        }
        Ok(numbered(&format!("t{}-", page), "popular", limit.min(3)))
    }

    async fn fetch_recommended(
        &self,
        user_id: &str,
        limit: usize,
        page: u32,
    ) -> Result<Vec<Recommendation>, CoreError> {
        self.record(format!("recommended:{}:{}:{}", user_id, limit, page));
        if let Some((slow, gate)) = &self.slow_user {
            if slow == user_id {
                gate.notified().await;
            }
        }
        if self.fail_recommended {
            return Err(CoreError::RequestFailed {
                status: 500,
                detail: "Error getting recommendations".to_string(),
            });
        }
        // Pages of 20 until page 3, which comes back short.
        let count = if page >= 3 { 5 } else { limit };
        Ok(numbered(&format!("r{}-", page), "askreddit", count)
            .into_iter()
            .map(|story| Recommendation {
                story,
                relevance: 1.0,
                reason: "Because you liked it".to_string(),
            })
            .collect())
    }

    async fn fetch_for_subreddit(
        &self,
        subreddit: &str,
        limit: usize,
        sort: StorySort,
        page: u32,
    ) -> Result<Vec<Story>, CoreError> {
        self.record(format!("subreddit:{}:{}:{}:{}", subreddit, limit, sort, page));
        if subreddit == "broken" {
            return Err(unavailable());
        }
        Ok(numbered(&format!("{}-{}-", subreddit, page), subreddit, limit))
    }

    async fn search(
        &self,
        _query: &str,
        _subreddit: Option<&str>,
        _limit: usize,
    ) -> Result<Vec<Story>, CoreError> {
        Ok(Vec::new())
    }
}

#[derive(Default)]
struct FakeDirectory {
    groups: Vec<CategoryInterests>,
    broken: bool,
}

#[async_trait]
impl InterestDirectory for FakeDirectory {
    async fn list_categories(&self) -> Result<Vec<InterestCategory>, CoreError> {
        Ok(self.groups.iter().map(|g| g.category.clone()).collect())
    }

    async fn list_subreddits_for_categories(
        &self,
        _category_ids: &[String],
    ) -> Result<Vec<CategorySubreddit>, CoreError> {
        Ok(Vec::new())
    }

    async fn replace_user_selection(&self, _user_id: &str, _csids: &[String]) -> Result<(), CoreError> {
        Ok(())
    }

    async fn user_selection(&self, _user_id: &str) -> Result<Vec<UserInterest>, CoreError> {
        Ok(Vec::new())
    }

    async fn has_completed_selection(&self, _user_id: &str) -> Result<bool, CoreError> {
        Ok(!self.groups.is_empty())
    }

    async fn resolve_user_interests_with_categories(
        &self,
        _user_id: &str,
    ) -> Result<Vec<CategoryInterests>, CoreError> {
        if self.broken {
            return Err(DirectoryError::DataInconsistency {
                details: "selection row without category".to_string(),
            }
            .into());
        }
        Ok(self.groups.clone())
    }
}

fn loader(content: FakeContent, directory: FakeDirectory) -> (Arc<FakeContent>, FeedLoader) {
    let content = Arc::new(content);
    let loader = FeedLoader::new(content.clone(), Arc::new(directory), FeedSettings::default());
    (content, loader)
}

fn loaded(outcome: LoadOutcome) -> feed_assembler::LoadedFeed {
    match outcome {
        LoadOutcome::Loaded(feed) => feed,
        LoadOutcome::Superseded { generation } => panic!("pass {} was superseded", generation),
    }
}

#[tokio::test]
async fn test_authenticated_load_builds_category_sections() {
    let (content, loader) = loader(
        FakeContent::default(),
        FakeDirectory {
            groups: vec![tech_group()],
            broken: false,
        },
    );

    let result = loaded(loader.load(Some("user-1")).await.unwrap());

    assert!(result.notices.is_empty());
    assert!(!result.needs_onboarding);
    assert!(result
        .feed
        .section(&SectionKey::Interest(tech_group()))
        .is_some());

    let calls = content.calls();
    assert!(calls.contains(&"trending:15:1".to_string()));
    assert!(calls.contains(&"recommended:user-1:20:1".to_string()));
    assert!(calls.contains(&"subreddit:programming:6:hot:1".to_string()));
    assert!(calls.contains(&"subreddit:rust:6:hot:1".to_string()));
}

#[tokio::test]
async fn test_anonymous_load_substitutes_trending_for_recommended() {
    let (content, loader) = loader(FakeContent::default(), FakeDirectory::default());

    let result = loaded(loader.load(None).await.unwrap());

    let calls = content.calls();
    assert!(calls.contains(&"trending:15:1".to_string()));
    assert!(calls.contains(&"trending:20:2".to_string()));
    assert!(calls.iter().all(|c| !c.starts_with("recommended")));
    assert!(result.feed.sections.iter().all(|s| matches!(
        s.key,
        SectionKey::Hot | SectionKey::Followed | SectionKey::Recommended
    )));
}

#[tokio::test]
async fn test_failures_degrade_to_one_notice_per_kind() {
    let (_, loader) = loader(
        FakeContent {
            fail_trending: true,
            ..FakeContent::default()
        },
        FakeDirectory::default(),
    );

    // Both trending fetches fail the same way; the user hears about it once.
    let result = loaded(loader.load(None).await.unwrap());
    assert!(result.feed.is_empty());
    assert_eq!(result.notices.len(), 1);
    assert!(matches!(
        result.notices[0],
        CoreError::NetworkUnavailable { .. }
    ));
}

#[tokio::test]
async fn test_recommendation_failure_keeps_other_sections() {
    let (_, loader) = loader(
        FakeContent {
            fail_recommended: true,
            ..FakeContent::default()
        },
        FakeDirectory {
            groups: vec![tech_group()],
            broken: false,
        },
    );

    let result = loaded(loader.load(Some("user-1")).await.unwrap());
    assert!(result.feed.section(&SectionKey::Hot).is_some());
    assert!(matches!(
        result.notices.as_slice(),
        [CoreError::RequestFailed { status: 500, .. }]
    ));
}

#[tokio::test]
async fn test_directory_failure_requests_onboarding() {
    let (_, loader) = loader(
        FakeContent::default(),
        FakeDirectory {
            groups: vec![],
            broken: true,
        },
    );

    let result = loaded(loader.load(Some("user-1")).await.unwrap());
    assert!(result.needs_onboarding);
    assert!(result.feed.section(&SectionKey::Hot).is_some());
}

#[tokio::test]
async fn test_stale_pass_is_superseded() {
    let gate = Arc::new(Notify::new());
    let (_, loader) = loader(
        FakeContent {
            slow_user: Some(("slow".to_string(), gate.clone())),
            ..FakeContent::default()
        },
        FakeDirectory::default(),
    );

    let (first, second) = tokio::join!(loader.load(Some("slow")), async {
        let outcome = loader.load(Some("fast")).await;
        gate.notify_one();
        outcome
    });

    let first = first.unwrap();
    let second = loaded(second.unwrap());
    assert!(first.is_superseded());
    assert_eq!(second.generation, 2);
    assert!(loader.is_current(2));
}

#[tokio::test]
async fn test_pager_appends_pages_until_short_page() {
    let content = Arc::new(FakeContent::default());
    let mut pager = SectionPager::new(
        content.clone(),
        SectionKey::Followed,
        Some("user-1".to_string()),
        20,
    );

    let first = pager.refresh().await.unwrap();
    assert_eq!((first.page, first.added, first.has_more), (1, 20, true));

    let second = pager.load_more().await.unwrap();
    assert_eq!((second.page, second.added, second.has_more), (2, 20, true));

    let third = pager.load_more().await.unwrap();
    assert_eq!((third.page, third.added, third.has_more), (3, 5, false));

    let done = pager.load_more().await.unwrap();
    assert_eq!(done.added, 0);
    assert_eq!(pager.stories().len(), 45);
    assert_eq!(
        content
            .calls()
            .iter()
            .filter(|c| c.starts_with("recommended"))
            .count(),
        3
    );
}

#[tokio::test]
async fn test_pager_spreads_interest_pages_and_skips_failures() {
    let content = Arc::new(FakeContent::default());
    let mut group = tech_group();
    group.subreddits.push("broken".to_string());

    let mut pager = SectionPager::new(content.clone(), SectionKey::Interest(group), None, 20);
    let outcome = pager.refresh().await.unwrap();

    // 20 over three subreddits is 7 each; the broken one answers nothing.
    assert_eq!(outcome.added, 14);
    assert!(!outcome.has_more);
    assert!(content
        .calls()
        .contains(&"subreddit:programming:7:hot:1".to_string()));
}

#[tokio::test]
async fn test_pager_failure_stops_paging() {
    let content = Arc::new(FakeContent {
        fail_trending: true,
        ..FakeContent::default()
    });
    let mut pager = SectionPager::new(content, SectionKey::Hot, None, 20);

    assert!(pager.refresh().await.is_err());
    assert!(!pager.has_more());
    assert!(pager.stories().is_empty());
}
