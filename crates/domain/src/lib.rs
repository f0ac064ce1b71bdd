//! 聊天室系统核心领域模型
//!
//! 包含用户、聊天室、消息等核心实体，以及成员关系的一致性规则。

pub mod chat;
pub mod errors;
pub mod message;
pub mod user;
pub mod value_objects;

pub use chat::Chat;
pub use errors::{DomainError, RepositoryError};
pub use message::{Author, Message};
pub use user::{NewUser, User};
pub use value_objects::{ChatId, MessageText, PasswordHash, UserEmail, UserId, Username, Version};
