use serde::{Deserialize, Serialize};

use crate::value_objects::{ChatId, MessageText, UserId, Username};

/// 消息作者：发送时刻的 id 与用户名快照。
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Author {
    pub id: UserId,
    pub username: Username,
}

/// 聊天消息，写入后不可修改。
///
/// 整个消息序列以 JSON 形式存放在聊天室记录中，字段名与存储格式保持一致。
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Message {
    pub chat_id: ChatId,
    pub text: MessageText,
    pub author: Author,
}
