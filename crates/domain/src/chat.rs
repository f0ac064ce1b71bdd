//! 聊天室实体定义

use crate::message::{Author, Message};
use crate::value_objects::{ChatId, MessageText, PasswordHash, UserId, Version};

/// 聊天室实体
///
/// 成员只记录用户 id，展示用的用户名在读取时解析。
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Chat {
    pub id: ChatId,
    pub password: PasswordHash,
    pub messages: Vec<Message>,
    pub members: Vec<UserId>,
    pub version: Version,
}

impl Chat {
    pub fn has_member(&self, user_id: UserId) -> bool {
        self.members.contains(&user_id)
    }

    /// 添加成员，已存在时返回 `false`。
    pub fn add_member(&mut self, user_id: UserId) -> bool {
        if self.has_member(user_id) {
            return false;
        }
        self.members.push(user_id);
        true
    }

    /// 移除成员，不存在时返回 `false`。
    pub fn remove_member(&mut self, user_id: UserId) -> bool {
        let before = self.members.len();
        self.members.retain(|id| *id != user_id);
        self.members.len() != before
    }

    /// 追加一条消息并返回它的副本。
    pub fn append_message(&mut self, author: Author, text: MessageText) -> Message {
        let message = Message {
            chat_id: self.id,
            text,
            author,
        };
        self.messages.push(message.clone());
        message
    }
}
