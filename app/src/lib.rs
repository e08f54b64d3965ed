//! Application composition root: screen navigation, auth routing, the home
//! feed, search and the shared playback session, driven by [`Message`]s.

pub mod app;
pub mod navigation;
pub mod notifier;
pub mod routing;

pub use app::{App, AppContext, Message, PlayerCommand};
pub use navigation::{CategoryParams, NavigationIntent, NavigationStack, Navigator, Screen};
pub use notifier::{Notice, NoticeLevel, Notifier};
pub use routing::route_for_user;
