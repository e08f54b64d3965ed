use feed_assembler::{Feed, FeedAssembler, FeedInput, FeedOptions, SectionKey};
use std::collections::HashSet;
use threadist_core::{CategoryInterests, InterestCategory, Recommendation, Story};

fn story(id: &str, subreddit: &str) -> Story {
    Story {
        id: id.to_string(),
        title: format!("Story {}", id),
        body: "Body".to_string(),
        author: "narrator".to_string(),
        subreddit: subreddit.to_string(),
        score: 10,
        num_comments: 1,
        created_utc: 1_700_000_000,
        url: format!("https://reddit.com/r/{}/{}", subreddit, id),
        is_self: true,
        selftext: None,
    }
}

fn rec(id: &str, subreddit: &str, relevance: f64) -> Recommendation {
    Recommendation {
        story: story(id, subreddit),
        relevance,
        reason: "Recommended".to_string(),
    }
}

fn group(id: &str, label: &str, subreddits: &[&str]) -> CategoryInterests {
    CategoryInterests {
        category: InterestCategory {
            category_id: id.to_string(),
            slug: label.to_lowercase(),
            label: label.to_string(),
            emoji: None,
            description: None,
        },
        subreddits: subreddits.iter().map(|s| s.to_string()).collect(),
    }
}

fn ids(stories: &[Story]) -> Vec<&str> {
    stories.iter().map(|s| s.id.as_str()).collect()
}

fn assert_unique(feed: &Feed) {
    let all = feed.story_ids();
    let unique: HashSet<&str> = all.iter().copied().collect();
    assert_eq!(all.len(), unique.len(), "duplicate story in feed: {:?}", all);
}

/// A varied pool: several subreddits with uneven story counts, shared between
/// hot, recommended and known lists so that overlaps are common.
fn busy_input(authenticated: bool, interests: Vec<CategoryInterests>) -> FeedInput {
    let subreddits = ["tech", "gaming", "nosleep", "tifu", "AskReddit", "history"];
    let mut known = Vec::new();
    for i in 0..60 {
        let subreddit = subreddits[(i * i + i / 3) % subreddits.len()];
        known.push(story(&format!("k{}", i), subreddit));
    }
    let hot = known[0..12].to_vec();
    let recommended = known
        .iter()
        .skip(8)
        .take(30)
        .enumerate()
        .map(|(i, s)| Recommendation {
            story: s.clone(),
            relevance: (i % 7) as f64,
            reason: "Similar".to_string(),
        })
        .collect();

    FeedInput {
        hot,
        recommended,
        interests,
        known,
        authenticated,
    }
}

#[test]
fn test_no_story_repeats_across_sections() {
    let inputs = vec![
        busy_input(true, vec![group("c1", "Tech", &["tech", "Gaming"])]),
        busy_input(
            true,
            vec![
                group("c1", "Tech", &["tech"]),
                group("c2", "Spooky", &["nosleep", "TECH"]),
                group("c3", "Empty", &["doesnotexist"]),
            ],
        ),
        busy_input(true, vec![]),
        busy_input(false, vec![group("c1", "Tech", &["tech"])]),
    ];

    for input in &inputs {
        for seed in 0..20 {
            let feed = FeedAssembler::new(FeedOptions {
                seed,
                ..FeedOptions::default()
            })
            .assemble(input);
            assert_unique(&feed);
        }
    }
}

#[test]
fn test_backfill_only_below_native_minimum() {
    let input = busy_input(
        true,
        vec![
            group("c1", "Tech", &["tech"]),
            group("c2", "History", &["history"]),
            group("c3", "Rare", &["doesnotexist"]),
        ],
    );

    for seed in 0..20 {
        let feed = FeedAssembler::new(FeedOptions {
            seed,
            ..FeedOptions::default()
        })
        .assemble(&input);

        for section in &feed.sections {
            if let SectionKey::Interest(group) = &section.key {
                let native = section.stories.iter().filter(|s| group.covers(s)).count();
                let foreign = section.stories.len() - native;
                assert!(section.stories.len() <= 6);
                if native >= 4 {
                    assert_eq!(foreign, 0, "backfilled {} despite native matches", group.category.label);
                }
            }
        }
    }
}

#[test]
fn test_category_with_no_matches_is_backfilled_not_omitted() {
    let input = FeedInput {
        hot: vec![],
        recommended: vec![],
        interests: vec![group("c1", "Rare", &["doesnotexist"])],
        known: (0..10).map(|i| story(&format!("s{}", i), "tech")).collect(),
        authenticated: true,
    };

    let feed = FeedAssembler::default().assemble(&input);
    let followed = feed.section(&SectionKey::Followed).unwrap();
    assert_eq!(ids(&followed.stories), vec!["s0"]);

    let rare = feed
        .section(&SectionKey::Interest(group("c1", "Rare", &["doesnotexist"])))
        .unwrap();
    assert_eq!(rare.stories.len(), 6);
    assert!(rare.stories.iter().all(|s| s.id != "s0"));
    assert_unique(&feed);
}

#[test]
fn test_category_yielding_nothing_is_omitted() {
    let input = FeedInput {
        hot: vec![story("a", "tech")],
        recommended: vec![],
        interests: vec![group("c1", "Tech", &["tech"])],
        known: vec![],
        authenticated: true,
    };

    let feed = FeedAssembler::default().assemble(&input);
    assert!(feed
        .sections
        .iter()
        .all(|section| !matches!(section.key, SectionKey::Interest(_))));
}

#[test]
fn test_backfill_is_deterministic_for_a_seed() {
    let input = busy_input(true, vec![group("c1", "Rare", &["doesnotexist"])]);
    let options = FeedOptions {
        seed: 42,
        ..FeedOptions::default()
    };

    let first = FeedAssembler::new(options.clone()).assemble(&input);
    let second = FeedAssembler::new(options).assemble(&input);
    assert_eq!(first.story_ids(), second.story_ids());
}

#[test]
fn test_hot_scenario_with_tech_category() {
    let input = FeedInput {
        hot: vec![story("A", "tech"), story("B", "tech"), story("C", "gaming")],
        recommended: vec![rec("D", "tech", 0.9)],
        interests: vec![group("tech-cat", "Tech", &["tech"])],
        known: vec![],
        authenticated: true,
    };

    let feed = FeedAssembler::default().assemble(&input);

    let hot = feed.section(&SectionKey::Hot).unwrap();
    assert_eq!(ids(&hot.stories), vec!["A", "B", "C"]);

    let followed = feed.section(&SectionKey::Followed).unwrap();
    assert_eq!(ids(&followed.stories), vec!["D"]);

    // Every tech story is already placed, so the category has nothing left.
    assert!(feed
        .section(&SectionKey::Interest(group("tech-cat", "Tech", &["tech"])))
        .is_none());
    assert!(feed.section(&SectionKey::Recommended).is_none());
    assert_unique(&feed);
}

#[test]
fn test_followed_takes_one_per_target_then_diversifies() {
    let known = vec![
        story("t1", "tech"),
        story("t2", "tech"),
        story("g1", "gaming"),
        story("n1", "nosleep"),
        story("n2", "nosleep"),
        story("h1", "history"),
        story("a1", "AskReddit"),
        story("f1", "funny"),
        story("p1", "pics"),
    ];
    let input = FeedInput {
        hot: vec![],
        recommended: vec![],
        interests: vec![group("c1", "Mixed", &["nosleep", "TECH"])],
        known,
        authenticated: true,
    };

    let feed = FeedAssembler::default().assemble(&input);
    let followed = feed.section(&SectionKey::Followed).unwrap();
    assert_eq!(
        ids(&followed.stories),
        vec!["n1", "t1", "g1", "h1", "a1", "f1"]
    );
}

#[test]
fn test_subreddit_sections_when_no_category_section() {
    let mut known = Vec::new();
    for (subreddit, count) in [("tech", 2), ("gaming", 3), ("tifu", 5), ("pics", 5), ("funny", 1)] {
        for i in 0..count {
            known.push(story(&format!("{}{}", subreddit, i), subreddit));
        }
    }
    let input = FeedInput {
        hot: vec![],
        recommended: vec![],
        // No selection, so every subreddit section is a population backfill.
        interests: vec![],
        known,
        authenticated: true,
    };

    let feed = FeedAssembler::default().assemble(&input);
    let subreddit_titles: Vec<&str> = feed
        .sections
        .iter()
        .filter(|s| matches!(s.key, SectionKey::Subreddit(_)))
        .map(|s| s.title.as_str())
        .collect();

    // Followed takes tech0, gaming0, tifu0, pics0, funny0. What is left:
    // tifu 4, pics 4, gaming 2, tech 1.
    assert_eq!(subreddit_titles, vec!["r/tifu", "r/pics", "r/gaming", "r/tech"]);
    assert_unique(&feed);
}

#[test]
fn test_subscribed_subreddit_gets_its_own_section() {
    let mut known: Vec<Story> = (0..10).map(|i| story(&format!("n{}", i), "nosleep")).collect();
    known.push(story("tifu0", "tifu"));
    known.push(story("tifu1", "tifu"));
    let horror = group("c1", "Horror", &["nosleep"]);
    let input = FeedInput {
        hot: vec![],
        recommended: vec![],
        interests: vec![horror.clone()],
        known,
        authenticated: true,
    };

    let feed = FeedAssembler::default().assemble(&input);

    let followed = feed.section(&SectionKey::Followed).unwrap();
    assert_eq!(ids(&followed.stories), vec!["n0", "tifu0"]);
    let category = feed.section(&SectionKey::Interest(horror)).unwrap();
    assert_eq!(ids(&category.stories), vec!["n1", "n2", "n3", "n4", "n5", "n6"]);

    // One category section is not enough, so the leftovers of the followed
    // subreddit get a section before the population backfill.
    let nosleep = feed
        .section(&SectionKey::Subreddit("nosleep".to_string()))
        .unwrap();
    assert_eq!(nosleep.title, "r/nosleep");
    assert_eq!(ids(&nosleep.stories), vec!["n7", "n8", "n9"]);

    let subreddit_titles: Vec<&str> = feed
        .sections
        .iter()
        .filter(|s| matches!(s.key, SectionKey::Subreddit(_)))
        .map(|s| s.title.as_str())
        .collect();
    assert_eq!(subreddit_titles, vec!["r/nosleep", "r/tifu"]);
    assert_unique(&feed);
}

#[test]
fn test_enough_category_sections_skip_subreddit_sections() {
    let mut known = Vec::new();
    for subreddit in ["tech", "gaming", "nosleep", "tifu"] {
        for i in 0..10 {
            known.push(story(&format!("{}{}", subreddit, i), subreddit));
        }
    }
    let input = FeedInput {
        hot: vec![],
        recommended: vec![],
        interests: vec![
            group("c1", "Tech", &["tech"]),
            group("c2", "Gaming", &["gaming"]),
            group("c3", "Horror", &["nosleep"]),
            group("c4", "Humor", &["tifu"]),
        ],
        known,
        authenticated: true,
    };

    let feed = FeedAssembler::default().assemble(&input);
    let categories = feed
        .sections
        .iter()
        .filter(|s| matches!(s.key, SectionKey::Interest(_)))
        .count();
    assert_eq!(categories, 4);
    assert!(feed
        .sections
        .iter()
        .all(|s| !matches!(s.key, SectionKey::Subreddit(_))));
}

#[test]
fn test_anonymous_viewer_gets_no_personal_sections() {
    let input = busy_input(false, vec![group("c1", "Tech", &["tech"])]);
    let feed = FeedAssembler::default().assemble(&input);

    assert!(feed.sections.iter().all(|s| matches!(
        s.key,
        SectionKey::Hot | SectionKey::Followed | SectionKey::Recommended
    )));

    let followed = feed.section(&SectionKey::Followed).unwrap();
    let subreddits: HashSet<String> = followed
        .stories
        .iter()
        .map(|s| s.subreddit.to_lowercase())
        .collect();
    assert_eq!(subreddits.len(), followed.stories.len());
}

#[test]
fn test_recommended_sorted_by_relevance_and_limited() {
    let recommended: Vec<Recommendation> = (0..30)
        .map(|i| rec(&format!("r{}", i), "tech", (i % 10) as f64))
        .collect();
    let input = FeedInput {
        hot: vec![],
        recommended,
        interests: vec![],
        known: vec![],
        authenticated: false,
    };

    let feed = FeedAssembler::new(FeedOptions {
        recommended_limit: 5,
        ..FeedOptions::default()
    })
    .assemble(&input);

    let section = feed.section(&SectionKey::Recommended).unwrap();
    // r0 went to the followed section.
    assert_eq!(ids(&section.stories), vec!["r9", "r19", "r29", "r8", "r18"]);
}

#[test]
fn test_empty_input_gives_empty_feed() {
    let feed = FeedAssembler::default().assemble(&FeedInput::default());
    assert!(feed.is_empty());
    assert_eq!(feed.story_count(), 0);
}
