use crate::navigation::{CategoryParams, NavigationIntent, Navigator, Screen};
use crate::notifier::{Notice, Notifier};
use crate::routing::route_for_user;
use feed_assembler::{Feed, FeedLoader, LoadOutcome, SectionPager};
use playback::{AudioEngine, AudioHandle, EngineEvent, PlaybackSession, PlaybackSnapshot, PlaybackStatus};
use std::sync::Arc;
use threadist_core::{
    AppConfig, AuthError, AuthUser, ContentSource, CoreError, ErrorRecovery, InterestDirectory,
    RecoveryStrategy, SpeechSynthesizer, Story,
};
use tracing::{debug, info};

const SEARCH_LIMIT: usize = 20;

/// Collaborators the application is composed from.
pub struct AppContext {
    pub config: AppConfig,
    pub content: Arc<dyn ContentSource>,
    pub directory: Arc<dyn InterestDirectory>,
    pub synthesizer: Arc<dyn SpeechSynthesizer>,
    pub engine: Arc<dyn AudioEngine>,
}

#[derive(Debug, Clone)]
pub enum PlayerCommand {
    Pause,
    Resume,
    Stop,
    Seek(u64),
    SetSpeed(f32),
}

#[derive(Debug)]
pub enum Message {
    /// The identity provider reported a new auth state.
    AuthChanged(Option<AuthUser>),
    /// An auth redirect decided outside `update`, stamped with the navigation
    /// generation it was computed for.
    AuthRouted { screen: Screen, issued_at: u64 },
    Refresh,
    /// A feed pass run outside `update` through [`App::feed_loader`].
    FeedLoaded(LoadOutcome),
    Search(String),
    StoryPressed(Story),
    OpenSection(CategoryParams),
    LoadMore,
    SaveInterests { csids: Vec<String> },
    Navigate(Screen),
    Back,
    SignOut,
    Player(PlayerCommand),
    EngineEvent(AudioHandle, EngineEvent),
}

pub struct App {
    config: AppConfig,
    content: Arc<dyn ContentSource>,
    directory: Arc<dyn InterestDirectory>,
    loader: Arc<FeedLoader>,
    playback: PlaybackSession,
    navigator: Navigator,
    notifier: Notifier,
    user: Option<AuthUser>,
    feed: Feed,
    search_results: Vec<Story>,
    pager: Option<SectionPager>,
}

impl App {
    pub fn new(context: AppContext) -> Self {
        let loader = FeedLoader::new(
            context.content.clone(),
            context.directory.clone(),
            context.config.feed.clone(),
        );
        Self {
            playback: PlaybackSession::new(context.engine, context.synthesizer),
            loader: Arc::new(loader),
            config: context.config,
            content: context.content,
            directory: context.directory,
            navigator: Navigator::new(Screen::Welcome),
            notifier: Notifier::default(),
            user: None,
            feed: Feed::default(),
            search_results: Vec::new(),
            pager: None,
        }
    }

    pub fn screen(&self) -> &Screen {
        self.navigator.current()
    }

    pub fn navigator(&self) -> &Navigator {
        &self.navigator
    }

    pub fn user(&self) -> Option<&AuthUser> {
        self.user.as_ref()
    }

    pub fn feed(&self) -> &Feed {
        &self.feed
    }

    pub fn search_results(&self) -> &[Story] {
        &self.search_results
    }

    pub fn pager(&self) -> Option<&SectionPager> {
        self.pager.as_ref()
    }

    pub fn player(&self) -> &PlaybackSnapshot {
        self.playback.snapshot()
    }

    pub fn playback(&self) -> &PlaybackSession {
        &self.playback
    }

    pub fn feed_loader(&self) -> Arc<FeedLoader> {
        self.loader.clone()
    }

    pub fn directory(&self) -> Arc<dyn InterestDirectory> {
        self.directory.clone()
    }

    pub fn take_notices(&mut self) -> Vec<Notice> {
        self.notifier.drain()
    }

    fn authenticated(&self) -> bool {
        self.user.is_some()
    }

    /// Handles one message. Failures the user can act on become notices;
    /// only unrecoverable ones are returned.
    pub async fn update(&mut self, message: Message) -> Result<(), CoreError> {
        let result = match message {
            Message::AuthChanged(user) => self.auth_changed(user).await,
            Message::AuthRouted { screen, issued_at } => {
                self.redirect(screen, issued_at).await;
                Ok(())
            }
            Message::Refresh => self.refresh_feed().await,
            Message::FeedLoaded(outcome) => {
                self.apply_feed(outcome);
                Ok(())
            }
            Message::Search(query) => self.search(&query).await,
            Message::StoryPressed(story) => self.story_pressed(story).await,
            Message::OpenSection(params) => self.open_section(params).await,
            Message::LoadMore => self.load_more().await,
            Message::SaveInterests { csids } => self.save_interests(&csids).await,
            Message::Navigate(screen) => {
                let authenticated = self.authenticated();
                self.navigator
                    .apply(NavigationIntent::Push(screen), authenticated);
                Ok(())
            }
            Message::Back => {
                let authenticated = self.authenticated();
                self.navigator.apply(NavigationIntent::Back, authenticated);
                if !matches!(self.screen(), Screen::Category(_)) {
                    self.pager = None;
                }
                Ok(())
            }
            Message::SignOut => {
                self.sign_out().await;
                Ok(())
            }
            Message::Player(command) => self.player_command(command).await,
            Message::EngineEvent(handle, event) => {
                self.playback.handle_event(handle, event).await;
                if let Some(error) = self.playback.take_error() {
                    self.notifier.error(&error);
                }
                Ok(())
            }
        };

        match result {
            Err(error) if ErrorRecovery::determine_strategy(&error) == RecoveryStrategy::Fail => {
                Err(error)
            }
            Err(error) => {
                self.notifier.error(&error);
                Ok(())
            }
            Ok(()) => Ok(()),
        }
    }

    async fn auth_changed(&mut self, user: Option<AuthUser>) -> Result<(), CoreError> {
        if user.is_none() && self.user.is_some() {
            self.sign_out().await;
            return Ok(());
        }

        let switched = match (&self.user, &user) {
            (Some(current), Some(next)) => current.id != next.id,
            _ => false,
        };
        if switched {
            self.playback.unload().await;
            self.loader.invalidate();
            self.search_results.clear();
            self.pager = None;
            info!("Switched user; previous playback released");
        }

        let issued_at = self.navigator.ticket();
        self.user = user;
        let screen = route_for_user(self.directory.as_ref(), self.user.as_ref()).await;
        self.redirect(screen, issued_at).await;
        Ok(())
    }

    async fn redirect(&mut self, screen: Screen, issued_at: u64) {
        let going_home = screen == Screen::Home;
        let authenticated = self.authenticated();
        let applied = self.navigator.apply(
            NavigationIntent::Redirect { screen, issued_at },
            authenticated,
        );

        if applied && going_home {
            if let Err(error) = self.refresh_feed().await {
                self.notifier.error(&error);
            }
        }
    }

    async fn refresh_feed(&mut self) -> Result<(), CoreError> {
        let user_id = self.user.as_ref().map(|user| user.id.clone());
        let outcome = self.loader.load(user_id.as_deref()).await?;
        self.apply_feed(outcome);
        Ok(())
    }

    fn apply_feed(&mut self, outcome: LoadOutcome) {
        let loaded = match outcome {
            LoadOutcome::Loaded(loaded) if self.loader.is_current(loaded.generation) => loaded,
            LoadOutcome::Loaded(loaded) => {
                debug!("Ignoring feed pass {}; a newer one exists", loaded.generation);
                return;
            }
            LoadOutcome::Superseded { generation } => {
                debug!("Feed pass {} was superseded", generation);
                return;
            }
        };

        for notice in &loaded.notices {
            self.notifier.warning(notice);
        }
        self.feed = loaded.feed;

        if loaded.needs_onboarding && *self.screen() == Screen::Home {
            let issued_at = self.navigator.ticket();
            let authenticated = self.authenticated();
            self.navigator.apply(
                NavigationIntent::Redirect {
                    screen: Screen::Interests,
                    issued_at,
                },
                authenticated,
            );
        }
    }

    async fn search(&mut self, query: &str) -> Result<(), CoreError> {
        let query = query.trim();
        if query.is_empty() {
            self.search_results.clear();
            return Ok(());
        }

        match self.content.search(query, None, SEARCH_LIMIT).await {
            Ok(results) => {
                info!("Search '{}' returned {} stories", query, results.len());
                self.search_results = results;
                Ok(())
            }
            Err(error) => {
                self.search_results.clear();
                Err(error)
            }
        }
    }

    /// Tapping the current story toggles it, replaying a finished one from
    /// the resource it already holds. Any other story is loaded with the
    /// default voice and played.
    async fn story_pressed(&mut self, story: Story) -> Result<(), CoreError> {
        let status = self.playback.status();
        if self.playback.snapshot().is_current_story(&story.id) {
            match status {
                PlaybackStatus::Paused | PlaybackStatus::Loaded => {
                    return self.playback.play().await
                }
                PlaybackStatus::Playing => return self.playback.pause().await,
                _ => {}
            }
        }

        let text = story.narration_text().to_string();
        let voice_id = self.config.default_voice_id.clone();
        if self.playback.load(&text, Some(&voice_id), story).await {
            self.playback.play().await
        } else {
            match self.playback.take_error() {
                Some(error) => Err(error),
                None => Ok(()),
            }
        }
    }

    async fn open_section(&mut self, params: CategoryParams) -> Result<(), CoreError> {
        let user_id = self.user.as_ref().map(|user| user.id.clone());
        let mut pager = SectionPager::new(
            self.content.clone(),
            params.key.clone(),
            user_id,
            self.config.feed.page_size,
        );

        let authenticated = self.authenticated();
        self.navigator
            .apply(NavigationIntent::Push(Screen::Category(params)), authenticated);

        let result = pager.refresh().await;
        self.pager = Some(pager);
        result.map(|_| ())
    }

    async fn load_more(&mut self) -> Result<(), CoreError> {
        match self.pager.as_mut() {
            Some(pager) => pager.load_more().await.map(|_| ()),
            None => Ok(()),
        }
    }

    async fn save_interests(&mut self, csids: &[String]) -> Result<(), CoreError> {
        let user_id = match &self.user {
            Some(user) => user.id.clone(),
            None => return Err(AuthError::SessionExpired.into()),
        };
        if csids.is_empty() {
            return Err(CoreError::InvalidInput {
                message: "pick at least one subreddit".to_string(),
            });
        }

        self.directory.replace_user_selection(&user_id, csids).await?;
        info!("Saved {} interests for user {}", csids.len(), user_id);

        let authenticated = self.authenticated();
        self.navigator
            .apply(NavigationIntent::Reset(Screen::Home), authenticated);
        self.refresh_feed().await
    }

    /// Releases playback before the user is forgotten.
    async fn sign_out(&mut self) {
        self.playback.unload().await;
        self.loader.invalidate();
        self.user = None;
        self.feed = Feed::default();
        self.search_results.clear();
        self.pager = None;
        self.navigator
            .apply(NavigationIntent::Reset(Screen::Welcome), false);
        info!("Signed out");
    }

    async fn player_command(&mut self, command: PlayerCommand) -> Result<(), CoreError> {
        match command {
            PlayerCommand::Pause => self.playback.pause().await,
            PlayerCommand::Resume => self.playback.play().await,
            PlayerCommand::Stop => self.playback.stop().await,
            PlayerCommand::Seek(position_ms) => self.playback.seek(position_ms).await,
            PlayerCommand::SetSpeed(multiplier) => self.playback.set_speed(multiplier).await,
        }
    }
}
