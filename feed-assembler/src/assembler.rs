//! Home feed assembly.
//!
//! The assembler turns several overlapping story lists into titled sections.
//! A single exclusion set is threaded through the section builders in
//! priority order (hot, followed, interest categories, subreddits,
//! recommended) so a story id never appears twice in one feed. Assembly does
//! no I/O and, for a given seed, always produces the same feed.

use fastrand::Rng;
use std::collections::{HashMap, HashSet};
use threadist_core::{subreddit_key, CategoryInterests, FeedSettings, Recommendation, Story};
use tracing::debug;

/// Identifies what a section holds, and therefore how to page through more of
/// it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SectionKey {
    Hot,
    Followed,
    Interest(CategoryInterests),
    Subreddit(String),
    Recommended,
}

#[derive(Debug, Clone)]
pub struct FeedSection {
    pub key: SectionKey,
    pub title: String,
    pub subtitle: Option<String>,
    pub stories: Vec<Story>,
}

#[derive(Debug, Clone, Default)]
pub struct Feed {
    pub sections: Vec<FeedSection>,
}

impl Feed {
    pub fn is_empty(&self) -> bool {
        self.sections.is_empty()
    }

    pub fn section(&self, key: &SectionKey) -> Option<&FeedSection> {
        self.sections.iter().find(|section| &section.key == key)
    }

    /// Every story id in display order.
    pub fn story_ids(&self) -> Vec<&str> {
        self.sections
            .iter()
            .flat_map(|section| section.stories.iter().map(|story| story.id.as_str()))
            .collect()
    }

    pub fn story_count(&self) -> usize {
        self.sections.iter().map(|section| section.stories.len()).sum()
    }
}

/// Raw lists for one assembly pass.
#[derive(Debug, Clone, Default)]
pub struct FeedInput {
    pub hot: Vec<Story>,
    pub recommended: Vec<Recommendation>,
    /// The viewer's categories in directory order. Ignored for anonymous
    /// viewers.
    pub interests: Vec<CategoryInterests>,
    /// Further stories the caller already holds (for example per-subreddit
    /// fetches); they join the pool after hot and recommended.
    pub known: Vec<Story>,
    pub authenticated: bool,
}

impl FeedInput {
    /// Every distinct story across the input lists, first occurrence wins.
    pub fn pool(&self) -> Vec<&Story> {
        let mut seen = HashSet::new();
        self.hot
            .iter()
            .chain(self.recommended.iter().map(|rec| &rec.story))
            .chain(self.known.iter())
            .filter(|story| seen.insert(story.id.as_str()))
            .collect()
    }

    /// The union of the viewer's subscribed subreddits, in category order,
    /// compared case-insensitively.
    pub fn subscribed_subreddits(&self) -> Vec<String> {
        if !self.authenticated {
            return Vec::new();
        }
        let mut seen = HashSet::new();
        self.interests
            .iter()
            .flat_map(|group| group.subreddits.iter())
            .filter(|name| seen.insert(subreddit_key(name)))
            .cloned()
            .collect()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FeedOptions {
    pub hot_limit: usize,
    pub section_size: usize,
    pub section_min_native: usize,
    pub min_subreddit_sections: usize,
    pub max_subreddit_sections: usize,
    pub recommended_limit: usize,
    /// Seed for backfill selection.
    pub seed: u64,
}

impl FeedOptions {
    pub fn from_settings(settings: &FeedSettings, seed: u64) -> Self {
        Self {
            hot_limit: settings.hot_limit,
            section_size: settings.section_size,
            section_min_native: settings.section_min_native,
            min_subreddit_sections: settings.min_subreddit_sections,
            max_subreddit_sections: settings.max_subreddit_sections,
            recommended_limit: settings.recommended_limit,
            seed,
        }
    }
}

impl Default for FeedOptions {
    fn default() -> Self {
        Self::from_settings(&FeedSettings::default(), 0)
    }
}

/// Ids already placed in an earlier section.
#[derive(Default)]
struct Exclusion {
    used: HashSet<String>,
}

impl Exclusion {
    fn contains(&self, story: &Story) -> bool {
        self.used.contains(&story.id)
    }

    fn take(&mut self, stories: &[Story]) {
        self.used
            .extend(stories.iter().map(|story| story.id.clone()));
    }
}

pub struct FeedAssembler {
    options: FeedOptions,
}

impl FeedAssembler {
    pub fn new(options: FeedOptions) -> Self {
        Self { options }
    }

    pub fn options(&self) -> &FeedOptions {
        &self.options
    }

    pub fn assemble(&self, input: &FeedInput) -> Feed {
        let pool = input.pool();
        let subscribed = input.subscribed_subreddits();
        let mut rng = Rng::with_seed(self.options.seed);
        let mut excluded = Exclusion::default();
        let mut sections = Vec::new();

        let hot = self.hot_stories(&input.hot, &mut excluded);
        push_section(&mut sections, SectionKey::Hot, "Hot Right Now", None, hot);

        let followed = self.followed_stories(&pool, &subscribed, &mut excluded);
        let followed_subtitle = if input.authenticated {
            "A mix from the communities you follow"
        } else {
            "A mix from across Threadist"
        };
        push_section(
            &mut sections,
            SectionKey::Followed,
            "From Your Subreddits",
            Some(followed_subtitle.to_string()),
            followed,
        );

        let mut category_sections = 0;
        if input.authenticated {
            for group in &input.interests {
                let stories = self.category_stories(group, &pool, &mut excluded, &mut rng);
                let title = match &group.category.emoji {
                    Some(emoji) => format!("{} {}", emoji, group.category.label),
                    None => group.category.label.clone(),
                };
                if push_section(
                    &mut sections,
                    SectionKey::Interest(group.clone()),
                    &title,
                    group.category.description.clone(),
                    stories,
                ) {
                    category_sections += 1;
                }
            }

            // Too few category sections to cover the feed on their own.
            if category_sections < self.options.min_subreddit_sections {
                for (name, stories) in self.subreddit_sections(&pool, &subscribed, &mut excluded) {
                    push_section(
                        &mut sections,
                        SectionKey::Subreddit(name.clone()),
                        &format!("r/{}", name),
                        None,
                        stories,
                    );
                }
            }
        }

        let recommended = self.recommended_stories(&input.recommended, &mut excluded);
        push_section(
            &mut sections,
            SectionKey::Recommended,
            "Recommended For You",
            None,
            recommended,
        );

        let feed = Feed { sections };
        debug!(
            "Assembled feed: {} sections, {} stories ({} category sections)",
            feed.sections.len(),
            feed.story_count(),
            category_sections
        );
        feed
    }

    fn hot_stories(&self, hot: &[Story], excluded: &mut Exclusion) -> Vec<Story> {
        let mut seen = HashSet::new();
        let stories: Vec<Story> = hot
            .iter()
            .filter(|story| seen.insert(story.id.as_str()))
            .take(self.options.hot_limit)
            .cloned()
            .collect();
        excluded.take(&stories);
        stories
    }

    /// One story per followed subreddit in target order, then one story per
    /// further subreddit in pool order until the section is full.
    fn followed_stories(
        &self,
        pool: &[&Story],
        targets: &[String],
        excluded: &mut Exclusion,
    ) -> Vec<Story> {
        let size = self.options.section_size;
        let mut picked: Vec<Story> = Vec::new();
        let mut represented: HashSet<String> = HashSet::new();

        for target in targets {
            if picked.len() >= size {
                break;
            }
            let candidate = pool.iter().find(|story| {
                !excluded.contains(story)
                    && story.in_subreddit(target)
                    && !picked.iter().any(|p| p.id == story.id)
            });
            if let Some(story) = candidate {
                represented.insert(story.subreddit_key());
                picked.push((*story).clone());
            }
        }

        for story in pool {
            if picked.len() >= size {
                break;
            }
            if excluded.contains(story) || picked.iter().any(|p| p.id == story.id) {
                continue;
            }
            if represented.insert(story.subreddit_key()) {
                picked.push((*story).clone());
            }
        }

        excluded.take(&picked);
        picked
    }

    /// Native matches first. Below the native minimum the section is topped
    /// up with randomly chosen non-matching stories.
    fn category_stories(
        &self,
        group: &CategoryInterests,
        pool: &[&Story],
        excluded: &mut Exclusion,
        rng: &mut Rng,
    ) -> Vec<Story> {
        let size = self.options.section_size;
        let mut stories: Vec<Story> = pool
            .iter()
            .filter(|story| !excluded.contains(story) && group.covers(story))
            .take(size)
            .map(|story| (*story).clone())
            .collect();

        if stories.len() < self.options.section_min_native {
            let mut fillers: Vec<&Story> = pool
                .iter()
                .copied()
                .filter(|story| !excluded.contains(story) && !group.covers(story))
                .collect();
            rng.shuffle(&mut fillers);
            let missing = size.saturating_sub(stories.len());
            stories.extend(fillers.into_iter().take(missing).cloned());
        }

        excluded.take(&stories);
        stories
    }

    fn subreddit_sections(
        &self,
        pool: &[&Story],
        subscribed: &[String],
        excluded: &mut Exclusion,
    ) -> Vec<(String, Vec<Story>)> {
        let mut sections: Vec<(String, Vec<Story>)> = Vec::new();
        let mut covered: HashSet<String> = HashSet::new();

        for name in subscribed.iter().take(self.options.max_subreddit_sections) {
            covered.insert(subreddit_key(name));
            let stories = self.subreddit_stories(name, pool, excluded);
            if !stories.is_empty() {
                sections.push((name.clone(), stories));
            }
        }

        if sections.len() < self.options.min_subreddit_sections {
            for name in most_populous_subreddits(pool, excluded, &covered) {
                if sections.len() >= self.options.min_subreddit_sections {
                    break;
                }
                let stories = self.subreddit_stories(&name, pool, excluded);
                if !stories.is_empty() {
                    sections.push((name, stories));
                }
            }
        }

        sections
    }

    fn subreddit_stories(&self, name: &str, pool: &[&Story], excluded: &mut Exclusion) -> Vec<Story> {
        let stories: Vec<Story> = pool
            .iter()
            .filter(|story| !excluded.contains(story) && story.in_subreddit(name))
            .take(self.options.section_size)
            .map(|story| (*story).clone())
            .collect();
        excluded.take(&stories);
        stories
    }

    fn recommended_stories(
        &self,
        recommended: &[Recommendation],
        excluded: &mut Exclusion,
    ) -> Vec<Story> {
        let mut seen = HashSet::new();
        let mut remaining: Vec<&Recommendation> = recommended
            .iter()
            .filter(|rec| !excluded.contains(&rec.story) && seen.insert(rec.story.id.as_str()))
            .collect();
        // Stable, so equal scores keep the service's order.
        remaining.sort_by(|a, b| b.relevance.total_cmp(&a.relevance));

        let stories: Vec<Story> = remaining
            .into_iter()
            .take(self.options.recommended_limit)
            .map(|rec| rec.story.clone())
            .collect();
        excluded.take(&stories);
        stories
    }
}

impl Default for FeedAssembler {
    fn default() -> Self {
        Self::new(FeedOptions::default())
    }
}

fn push_section(
    sections: &mut Vec<FeedSection>,
    key: SectionKey,
    title: &str,
    subtitle: Option<String>,
    stories: Vec<Story>,
) -> bool {
    if stories.is_empty() {
        return false;
    }
    sections.push(FeedSection {
        key,
        title: title.to_string(),
        subtitle,
        stories,
    });
    true
}

/// Subreddits of the not-yet-used pool stories, most stories first. Ties keep
/// the order in which the subreddit first appears in the pool.
fn most_populous_subreddits(
    pool: &[&Story],
    excluded: &Exclusion,
    covered: &HashSet<String>,
) -> Vec<String> {
    let mut order: Vec<(String, String)> = Vec::new();
    let mut counts: HashMap<String, usize> = HashMap::new();

    for story in pool.iter().filter(|story| !excluded.contains(story)) {
        let key = story.subreddit_key();
        if covered.contains(&key) {
            continue;
        }
        let count = counts.entry(key.clone()).or_insert(0);
        if *count == 0 {
            order.push((key, story.subreddit.clone()));
        }
        *count += 1;
    }

    order.sort_by(|(a, _), (b, _)| counts[b].cmp(&counts[a]));
    order.into_iter().map(|(_, name)| name).collect()
}
