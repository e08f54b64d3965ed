//! One home feed pass: fetch, degrade failures, assemble.
//!
//! Each pass is tagged with a generation number. When a newer pass starts
//! before an older one finishes, the older result is reported as superseded
//! and must not replace what is on screen.

use crate::{Feed, FeedAssembler, FeedInput, FeedOptions};
use futures::future::join_all;
use std::collections::HashSet;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use threadist_core::{
    subreddit_key, CategoryInterests, ContentSource, CoreError, ErrorExt, ErrorRecovery, FeedSettings,
    InterestDirectory, Recommendation, RecoveryStrategy, Story, StorySort,
};
use tracing::{debug, info, warn};

#[derive(Debug)]
pub struct LoadedFeed {
    pub generation: u64,
    pub feed: Feed,
    /// Failures absorbed while loading, at most one per error code.
    pub notices: Vec<CoreError>,
    /// The interest directory could not be read; the caller should offer the
    /// interests onboarding path.
    pub needs_onboarding: bool,
}

#[derive(Debug)]
pub enum LoadOutcome {
    Loaded(LoadedFeed),
    /// A newer pass started while this one was in flight.
    Superseded { generation: u64 },
}

impl LoadOutcome {
    pub fn is_superseded(&self) -> bool {
        matches!(self, LoadOutcome::Superseded { .. })
    }
}

pub struct FeedLoader {
    content: Arc<dyn ContentSource>,
    directory: Arc<dyn InterestDirectory>,
    settings: FeedSettings,
    generation: AtomicU64,
}

impl FeedLoader {
    pub fn new(
        content: Arc<dyn ContentSource>,
        directory: Arc<dyn InterestDirectory>,
        settings: FeedSettings,
    ) -> Self {
        Self {
            content,
            directory,
            settings,
            generation: AtomicU64::new(0),
        }
    }

    pub fn settings(&self) -> &FeedSettings {
        &self.settings
    }

    pub fn current_generation(&self) -> u64 {
        self.generation.load(Ordering::SeqCst)
    }

    pub fn is_current(&self, generation: u64) -> bool {
        self.current_generation() == generation
    }

    /// Invalidates any pass in flight.
    pub fn invalidate(&self) -> u64 {
        self.generation.fetch_add(1, Ordering::SeqCst) + 1
    }

    /// Loads the home feed for `user_id`, or for an anonymous viewer.
    ///
    /// Fetch failures never fail the pass: they become empty lists plus a
    /// notice. Only errors the user cannot recover from are returned.
    pub async fn load(&self, user_id: Option<&str>) -> Result<LoadOutcome, CoreError> {
        let generation = self.invalidate();
        let mut pass = Pass::default();

        let input = match user_id {
            Some(user_id) => self.fetch_for_user(user_id, &mut pass).await?,
            None => self.fetch_anonymous(&mut pass).await?,
        };

        if !self.is_current(generation) {
            debug!("Discarding feed pass {}; a newer pass started", generation);
            return Ok(LoadOutcome::Superseded { generation });
        }

        let assembler = FeedAssembler::new(FeedOptions::from_settings(&self.settings, generation));
        let feed = assembler.assemble(&input);
        info!(
            "Feed pass {} ready: {} sections, {} notices",
            generation,
            feed.sections.len(),
            pass.notices.len()
        );

        Ok(LoadOutcome::Loaded(LoadedFeed {
            generation,
            feed,
            notices: pass.notices,
            needs_onboarding: pass.needs_onboarding,
        }))
    }

    async fn fetch_for_user(&self, user_id: &str, pass: &mut Pass) -> Result<FeedInput, CoreError> {
        let settings = &self.settings;
        let (hot, recommended, interests) = futures::join!(
            self.content.fetch_trending(settings.hot_limit, 1),
            self.content
                .fetch_recommended(user_id, settings.recommended_limit, 1),
            self.directory.resolve_user_interests_with_categories(user_id),
        );

        let hot = pass.absorb(hot)?;
        let recommended = pass.absorb(recommended)?;
        let interests: Vec<CategoryInterests> = pass.absorb(interests)?;

        let known = self.fetch_subscribed(&interests, pass).await?;

        Ok(FeedInput {
            hot,
            recommended,
            interests,
            known,
            authenticated: true,
        })
    }

    /// Anonymous viewers have no recommendations. The next page of trending
    /// stands in for them.
    async fn fetch_anonymous(&self, pass: &mut Pass) -> Result<FeedInput, CoreError> {
        let settings = &self.settings;
        let (hot, substitute) = futures::join!(
            self.content.fetch_trending(settings.hot_limit, 1),
            self.content.fetch_trending(settings.recommended_limit, 2),
        );

        let hot = pass.absorb(hot)?;
        let substitute = pass.absorb(substitute)?;
        debug!(
            "Anonymous feed: using {} trending stories as recommendations",
            substitute.len()
        );

        Ok(FeedInput {
            hot,
            recommended: trending_as_recommendations(substitute),
            interests: Vec::new(),
            known: Vec::new(),
            authenticated: false,
        })
    }

    /// One page per subscribed subreddit so category and subreddit sections
    /// have stories beyond what hot and recommended happened to include.
    async fn fetch_subscribed(
        &self,
        interests: &[CategoryInterests],
        pass: &mut Pass,
    ) -> Result<Vec<Story>, CoreError> {
        let mut seen = HashSet::new();
        let subreddits: Vec<&String> = interests
            .iter()
            .flat_map(|group| group.subreddits.iter())
            .filter(|name| seen.insert(subreddit_key(name)))
            .take(self.settings.max_subreddit_sections)
            .collect();

        let fetches = subreddits.iter().map(|name| {
            self.content
                .fetch_for_subreddit(name, self.settings.section_size, StorySort::Hot, 1)
        });

        let mut known = Vec::new();
        for result in join_all(fetches).await {
            known.extend(pass.absorb(result)?);
        }
        Ok(known)
    }
}

/// Wraps trending stories so they rank in their trending order.
fn trending_as_recommendations(stories: Vec<Story>) -> Vec<Recommendation> {
    let count = stories.len();
    stories
        .into_iter()
        .enumerate()
        .map(|(rank, story)| Recommendation {
            story,
            relevance: (count - rank) as f64,
            reason: "Trending".to_string(),
        })
        .collect()
}

#[derive(Default)]
struct Pass {
    notices: Vec<CoreError>,
    needs_onboarding: bool,
}

impl Pass {
    fn absorb<T: Default>(&mut self, result: Result<T, CoreError>) -> Result<T, CoreError> {
        let error = match result {
            Ok(value) => return Ok(value),
            Err(error) => error,
        };

        let strategy = ErrorRecovery::determine_strategy(&error);
        if strategy == RecoveryStrategy::Onboard {
            self.needs_onboarding = true;
        }

        let (value, degraded) = ErrorRecovery::recover(Err(error), T::default).into_parts()?;
        if let Some(error) = degraded {
            self.notice(error);
        }
        Ok(value)
    }

    fn notice(&mut self, error: CoreError) {
        let code = error.error_code();
        if self.notices.iter().any(|n| n.error_code() == code) {
            warn!("Suppressing repeated {} notice: {}", code, error);
            return;
        }
        self.notices.push(error);
    }
}
