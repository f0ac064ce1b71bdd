use domain::{Author, ChatId, Message, User, UserId};
use serde::Serialize;

/// 对外暴露的用户资料，不包含密码哈希。
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UserDto {
    pub id: UserId,
    pub username: String,
    pub email: String,
}

impl From<&User> for UserDto {
    fn from(user: &User) -> Self {
        Self {
            id: user.id,
            username: user.username.as_str().to_owned(),
            email: user.email.as_str().to_owned(),
        }
    }
}

/// 聊天室视图：消息序列加上已解析用户名的成员列表。
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ChatDto {
    pub id: ChatId,
    pub messages: Vec<Message>,
    pub users: Vec<Author>,
}

impl ChatDto {
    pub fn member_ids(&self) -> Vec<UserId> {
        self.users.iter().map(|author| author.id).collect()
    }
}
