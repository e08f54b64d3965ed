//! Screens, the navigation stack and the serialized intent queue that both
//! user taps and auth-driven redirects go through.

use feed_assembler::SectionKey;
use std::collections::VecDeque;
use threadist_core::Story;
use tracing::debug;

/// Parameters for the section drill-down screen.
#[derive(Debug, Clone, PartialEq)]
pub struct CategoryParams {
    pub key: SectionKey,
    pub title: String,
    pub subtitle: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Screen {
    Welcome,
    SignUp,
    Login,
    EmailConfirmation { email: String },
    Interests,
    InterestSelection,
    SubredditSelection { category_ids: Vec<String> },
    Home,
    Category(CategoryParams),
    StoryDetails { story: Story },
}

impl Screen {
    pub fn name(&self) -> &'static str {
        match self {
            Screen::Welcome => "Welcome",
            Screen::SignUp => "SignUp",
            Screen::Login => "Login",
            Screen::EmailConfirmation { .. } => "EmailConfirmation",
            Screen::Interests => "Interests",
            Screen::InterestSelection => "InterestSelection",
            Screen::SubredditSelection { .. } => "SubredditSelection",
            Screen::Home => "Home",
            Screen::Category(_) => "Category",
            Screen::StoryDetails { .. } => "StoryDetails",
        }
    }
}

/// Explicit stack of screens. Never empty.
#[derive(Debug, Clone)]
pub struct NavigationStack {
    frames: Vec<Screen>,
}

impl NavigationStack {
    pub fn new(root: Screen) -> Self {
        Self { frames: vec![root] }
    }

    pub fn current(&self) -> &Screen {
        // Construction and every mutation keep at least one frame.
        &self.frames[self.frames.len() - 1]
    }

    pub fn depth(&self) -> usize {
        self.frames.len()
    }

    pub fn push(&mut self, screen: Screen) {
        self.frames.push(screen);
    }

    /// Goes back one frame, landing on `Home` when there is nothing to go
    /// back to. A signed-in user is never returned to `Welcome`.
    pub fn pop(&mut self, authenticated: bool) -> &Screen {
        if self.frames.len() > 1 {
            self.frames.pop();
        } else {
            self.frames[0] = Screen::Home;
        }

        if authenticated && *self.current() == Screen::Welcome {
            let last = self.frames.len() - 1;
            self.frames[last] = Screen::Home;
        }
        self.current()
    }

    /// Replaces the whole history with `root`.
    pub fn reset(&mut self, root: Screen) {
        self.frames.clear();
        self.frames.push(root);
    }
}

impl Default for NavigationStack {
    fn default() -> Self {
        Self::new(Screen::Welcome)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum NavigationIntent {
    Push(Screen),
    Back,
    /// User-initiated jump that clears the history.
    Reset(Screen),
    /// Automatic redirect computed for the navigation generation `issued_at`.
    /// It is dropped if anything navigated since.
    Redirect { screen: Screen, issued_at: u64 },
}

/// Applies navigation intents strictly in arrival order. Every applied intent
/// advances the generation, which is how stale redirects are recognised.
#[derive(Debug, Default)]
pub struct Navigator {
    stack: NavigationStack,
    generation: u64,
    queue: VecDeque<NavigationIntent>,
}

impl Navigator {
    pub fn new(root: Screen) -> Self {
        Self {
            stack: NavigationStack::new(root),
            generation: 0,
            queue: VecDeque::new(),
        }
    }

    pub fn current(&self) -> &Screen {
        self.stack.current()
    }

    pub fn stack(&self) -> &NavigationStack {
        &self.stack
    }

    /// Generation to stamp on a redirect before starting the async work that
    /// decides it.
    pub fn ticket(&self) -> u64 {
        self.generation
    }

    pub fn enqueue(&mut self, intent: NavigationIntent) {
        self.queue.push_back(intent);
    }

    /// Applies queued intents. Returns how many took effect.
    pub fn process(&mut self, authenticated: bool) -> usize {
        let mut applied = 0;
        while let Some(intent) = self.queue.pop_front() {
            match intent {
                NavigationIntent::Push(screen) => self.stack.push(screen),
                NavigationIntent::Back => {
                    self.stack.pop(authenticated);
                }
                NavigationIntent::Reset(screen) => self.stack.reset(screen),
                NavigationIntent::Redirect { screen, issued_at } => {
                    if issued_at != self.generation {
                        debug!(
                            "Dropping redirect to {} from generation {} (now {})",
                            screen.name(),
                            issued_at,
                            self.generation
                        );
                        continue;
                    }
                    self.stack.reset(screen);
                }
            }
            self.generation += 1;
            applied += 1;
        }
        if applied > 0 {
            debug!("Navigated to {}", self.current().name());
        }
        applied
    }

    /// Enqueues and processes a single intent.
    pub fn apply(&mut self, intent: NavigationIntent, authenticated: bool) -> bool {
        self.enqueue(intent);
        self.process(authenticated) > 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pop_to_welcome_while_authenticated_lands_on_home() {
        let mut stack = NavigationStack::new(Screen::Welcome);
        stack.push(Screen::Home);

        assert_eq!(stack.pop(true), &Screen::Home);
        assert_eq!(stack.depth(), 1);
    }

    #[test]
    fn test_pop_to_welcome_while_signed_out_is_kept() {
        let mut stack = NavigationStack::new(Screen::Welcome);
        stack.push(Screen::Login);

        assert_eq!(stack.pop(false), &Screen::Welcome);
    }

    #[test]
    fn test_pop_from_root_defaults_to_home() {
        let mut stack = NavigationStack::new(Screen::Interests);
        assert_eq!(stack.pop(false), &Screen::Home);
        assert_eq!(stack.depth(), 1);
    }

    #[test]
    fn test_stale_redirect_is_dropped() {
        let mut navigator = Navigator::new(Screen::Welcome);
        let ticket = navigator.ticket();

        // The user moves on while the redirect is being decided.
        navigator.apply(NavigationIntent::Push(Screen::Login), false);

        let applied = navigator.apply(
            NavigationIntent::Redirect {
                screen: Screen::Interests,
                issued_at: ticket,
            },
            true,
        );

        assert!(!applied);
        assert_eq!(navigator.current(), &Screen::Login);
    }

    #[test]
    fn test_current_redirect_resets_history() {
        let mut navigator = Navigator::new(Screen::Welcome);
        navigator.apply(NavigationIntent::Push(Screen::Login), false);

        let ticket = navigator.ticket();
        navigator.enqueue(NavigationIntent::Redirect {
            screen: Screen::Home,
            issued_at: ticket,
        });
        navigator.enqueue(NavigationIntent::Push(Screen::InterestSelection));

        assert_eq!(navigator.process(true), 2);
        assert_eq!(navigator.current(), &Screen::InterestSelection);
        assert_eq!(navigator.stack().depth(), 2);
        assert_eq!(navigator.ticket(), ticket + 2);
    }
}
