//! 用户实体定义

use crate::value_objects::{ChatId, PasswordHash, UserEmail, UserId, Username, Version};

/// 注册时提交给存储层的用户数据，ID 由存储层分配。
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewUser {
    pub username: Username,
    pub email: UserEmail,
    pub password: PasswordHash,
}

/// 用户实体
///
/// `chats` 是用户所属聊天室的集合（无序、无重复），必须与 `Chat::members` 保持双向一致。
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct User {
    pub id: UserId,
    pub username: Username,
    pub email: UserEmail,
    pub password: PasswordHash,
    pub chats: Vec<ChatId>,
    pub version: Version,
}

impl User {
    pub fn is_member_of(&self, chat_id: ChatId) -> bool {
        self.chats.contains(&chat_id)
    }

    /// 记录加入聊天室，已存在时返回 `false`。
    pub fn add_chat(&mut self, chat_id: ChatId) -> bool {
        if self.is_member_of(chat_id) {
            return false;
        }
        self.chats.push(chat_id);
        true
    }

    /// 移除聊天室，不存在时返回 `false`。
    pub fn remove_chat(&mut self, chat_id: ChatId) -> bool {
        let before = self.chats.len();
        self.chats.retain(|id| *id != chat_id);
        self.chats.len() != before
    }
}
