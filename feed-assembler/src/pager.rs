//! Paging through one feed section on its own screen.

use crate::SectionKey;
use futures::future::join_all;
use std::collections::HashSet;
use std::sync::Arc;
use threadist_core::{ContentSource, CoreError, ErrorExt, Story, StorySort};
use tracing::{debug, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageOutcome {
    pub page: u32,
    /// Stories appended by this page after de-duplication.
    pub added: usize,
    pub has_more: bool,
}

/// Loads successive pages of stories for one section, keeping only stories
/// not already shown.
///
/// There is no dedicated endpoint per section kind. Hot pages come from
/// trending, followed pages from the viewer's recommendations (trending for
/// anonymous viewers), interest pages from each of the category's subreddits.
pub struct SectionPager {
    content: Arc<dyn ContentSource>,
    key: SectionKey,
    user_id: Option<String>,
    page_size: usize,
    page: u32,
    stories: Vec<Story>,
    seen: HashSet<String>,
    has_more: bool,
}

impl SectionPager {
    pub fn new(
        content: Arc<dyn ContentSource>,
        key: SectionKey,
        user_id: Option<String>,
        page_size: usize,
    ) -> Self {
        Self {
            content,
            key,
            user_id,
            page_size: page_size.max(1),
            page: 0,
            stories: Vec::new(),
            seen: HashSet::new(),
            has_more: true,
        }
    }

    pub fn key(&self) -> &SectionKey {
        &self.key
    }

    pub fn stories(&self) -> &[Story] {
        &self.stories
    }

    pub fn page(&self) -> u32 {
        self.page
    }

    pub fn has_more(&self) -> bool {
        self.has_more
    }

    /// Drops everything loaded so far and loads page 1.
    pub async fn refresh(&mut self) -> Result<PageOutcome, CoreError> {
        self.stories.clear();
        self.seen.clear();
        self.page = 0;
        self.has_more = true;
        self.load_page(1).await
    }

    /// Loads the next page, or does nothing once the section is exhausted.
    pub async fn load_more(&mut self) -> Result<PageOutcome, CoreError> {
        if !self.has_more {
            return Ok(PageOutcome {
                page: self.page,
                added: 0,
                has_more: false,
            });
        }
        self.load_page(self.page + 1).await
    }

    async fn load_page(&mut self, page: u32) -> Result<PageOutcome, CoreError> {
        let fetched = match self.fetch(page).await {
            Ok(stories) => stories,
            Err(error) => {
                error.log_warn();
                self.has_more = false;
                return Err(error);
            }
        };

        let mut page_ids = HashSet::new();
        let unique: Vec<Story> = fetched
            .into_iter()
            .filter(|story| page_ids.insert(story.id.clone()))
            .collect();
        let full_page = unique.len() >= self.page_size;

        let mut added = 0;
        for story in unique {
            if self.seen.insert(story.id.clone()) {
                self.stories.push(story);
                added += 1;
            }
        }

        self.page = page;
        self.has_more = full_page;
        debug!(
            "Section {:?} page {}: {} new stories, has_more={}",
            self.key, page, added, self.has_more
        );

        Ok(PageOutcome {
            page,
            added,
            has_more: self.has_more,
        })
    }

    async fn fetch(&self, page: u32) -> Result<Vec<Story>, CoreError> {
        let limit = self.page_size;
        match &self.key {
            SectionKey::Hot => self.content.fetch_trending(limit, page).await,
            SectionKey::Recommended | SectionKey::Followed => match &self.user_id {
                Some(user_id) => Ok(self
                    .content
                    .fetch_recommended(user_id, limit, page)
                    .await?
                    .into_iter()
                    .map(|rec| rec.story)
                    .collect()),
                None => self.content.fetch_trending(limit, page).await,
            },
            SectionKey::Subreddit(name) => {
                self.content
                    .fetch_for_subreddit(name, limit, StorySort::Hot, page)
                    .await
            }
            SectionKey::Interest(group) => self.fetch_interest(&group.subreddits, page).await,
        }
    }

    /// Spreads one page across the category's subreddits. A subreddit that
    /// fails is skipped as long as another one answered.
    async fn fetch_interest(&self, subreddits: &[String], page: u32) -> Result<Vec<Story>, CoreError> {
        if subreddits.is_empty() {
            return Ok(Vec::new());
        }

        let per_subreddit = self.page_size.div_ceil(subreddits.len());
        let fetches = subreddits.iter().map(|name| {
            self.content
                .fetch_for_subreddit(name, per_subreddit, StorySort::Hot, page)
        });

        let mut stories = Vec::new();
        let mut first_error = None;
        let mut answered = 0;
        for (name, result) in subreddits.iter().zip(join_all(fetches).await) {
            match result {
                Ok(batch) => {
                    answered += 1;
                    stories.extend(batch);
                }
                Err(error) => {
                    warn!("Skipping r/{} for this page: {}", name, error);
                    first_error.get_or_insert(error);
                }
            }
        }

        match first_error {
            Some(error) if answered == 0 => Err(error),
            _ => Ok(stories),
        }
    }
}
