pub mod ids;
pub mod user;
pub mod profile;
pub mod chat_session;
pub mod chat_message;
pub mod app_config;
pub mod user_file;

pub use app_config::AppConfig;
pub use chat_message::{ChatMessage, MessageRole, MessageType, UpdateChatMessage};
pub use chat_session::{ChatSession, UpdateChatSession};
pub use profile::{Profile, Properties, Property, UpdateProfile};
pub use user::User;
pub use user_file::UserFile;
