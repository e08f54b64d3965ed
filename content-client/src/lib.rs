pub mod api;


pub use api::{ContentApiClient, MAX_SPEECH_TEXT_LENGTH};
