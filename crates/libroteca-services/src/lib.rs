//! # Libroteca Services
//!
//! Concrete HTTP collaborators behind the capability traits in
//! `libroteca-core`: the chat-channel and repository document sources, the
//! OpenAI inference client, and the cover image host.

pub mod discord;
pub mod github;
pub mod imagehost;
pub mod openai;
pub mod parse;

pub use discord::DiscordSource;
pub use github::GithubSource;
pub use imagehost::ImageHostClient;
pub use openai::OpenAiClient;
pub use parse::parse_keyword_list;
