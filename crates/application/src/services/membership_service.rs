//! 聊天室成员关系的授权与一致性。
//!
//! 决定谁可以创建、读取、加入、离开聊天室以及发消息，并保证
//! `chat_id ∈ user.chats ⇔ user.id ∈ chat.members` 在每次操作后成立。
//! 服务本身不持有状态，所有状态都通过持久化网关按请求读取。

use std::collections::HashMap;
use std::sync::Arc;

use domain::{
    Author, Chat, ChatId, Message, MessageText, RepositoryError, User, UserId, Username,
};

use crate::{
    dto::ChatDto,
    error::ApplicationError,
    password::PasswordHasher,
    repository::{ChatRepository, UserRepository},
};

#[derive(Debug, Clone)]
pub struct CreateChatRequest {
    pub password: String,
}

#[derive(Debug, Clone)]
pub struct JoinChatRequest {
    pub chat_id: ChatId,
    pub password: String,
}

#[derive(Debug, Clone)]
pub struct PostMessageRequest {
    pub chat_id: ChatId,
    pub text: String,
}

pub struct MembershipServiceDependencies {
    pub user_repository: Arc<dyn UserRepository>,
    pub chat_repository: Arc<dyn ChatRepository>,
    pub password_hasher: Arc<dyn PasswordHasher>,
}

pub struct MembershipService {
    deps: MembershipServiceDependencies,
}

impl MembershipService {
    pub fn new(deps: MembershipServiceDependencies) -> Self {
        Self { deps }
    }

    pub async fn create_chat(
        &self,
        creator: &User,
        request: CreateChatRequest,
    ) -> Result<ChatDto, ApplicationError> {
        let password = self.deps.password_hasher.hash(&request.password).await?;

        let (chat, creator) = self
            .deps
            .chat_repository
            .create_with_creator(password, creator.clone())
            .await?;

        tracing::info!(chat_id = %chat.id, user_id = %creator.id, "chat created");
        self.view(&chat).await
    }

    /// 非成员与聊天室不存在返回同样的 `NotFound`，避免泄露成员关系。
    pub async fn get_chat(
        &self,
        requester: &User,
        chat_id: ChatId,
    ) -> Result<ChatDto, ApplicationError> {
        let chat = self.load_member_chat(requester, chat_id).await?;
        self.view(&chat).await
    }

    /// 已经是成员时不做任何写入，直接返回当前状态。
    pub async fn join_chat(
        &self,
        requester: &User,
        request: JoinChatRequest,
    ) -> Result<ChatDto, ApplicationError> {
        let mut chat = self
            .deps
            .chat_repository
            .find_by_id(request.chat_id)
            .await?
            .ok_or(ApplicationError::NotFound)?;

        let password_ok = self
            .deps
            .password_hasher
            .verify(&request.password, &chat.password)
            .await?;
        if !password_ok {
            tracing::warn!(chat_id = %chat.id, user_id = %requester.id, "join rejected: wrong chat password");
            return Err(ApplicationError::Authentication);
        }

        let mut user = requester.clone();
        // 两侧分别判断，顺便修复只有一侧记录了成员关系的历史数据
        let user_changed = user.add_chat(chat.id);
        let chat_changed = chat.add_member(user.id);
        if !user_changed && !chat_changed {
            return self.view(&chat).await;
        }

        let (chat, user) = self
            .deps
            .chat_repository
            .save_membership(chat, user)
            .await?;

        tracing::info!(chat_id = %chat.id, user_id = %user.id, "user joined chat");
        self.view(&chat).await
    }

    pub async fn leave_chat(
        &self,
        requester: &User,
        chat_id: ChatId,
    ) -> Result<(), ApplicationError> {
        let mut chat = self.load_member_chat(requester, chat_id).await?;

        let mut user = requester.clone();
        chat.remove_member(user.id);
        user.remove_chat(chat.id);

        let (chat, user) = self
            .deps
            .chat_repository
            .save_membership(chat, user)
            .await?;

        tracing::info!(chat_id = %chat.id, user_id = %user.id, "user left chat");
        Ok(())
    }

    pub async fn post_message(
        &self,
        author: &User,
        request: PostMessageRequest,
    ) -> Result<Message, ApplicationError> {
        let text = MessageText::new(request.text)?;
        let mut chat = self.load_member_chat(author, request.chat_id).await?;

        let message = chat.append_message(
            Author {
                id: author.id,
                username: author.username.clone(),
            },
            text,
        );
        self.deps.chat_repository.update(chat).await?;

        tracing::debug!(chat_id = %message.chat_id, user_id = %author.id, "message posted");
        Ok(message)
    }

    /// 解析作者列表，保持输入顺序。
    ///
    /// 存储层按 id 返回用户名映射，这里再按输入顺序投影；结果与输入等长，重复 id 按位置保留。
    pub async fn list_authors(&self, ids: &[UserId]) -> Result<Vec<Author>, ApplicationError> {
        let usernames = self.deps.user_repository.find_usernames(ids).await?;
        project_authors(ids, &usernames)
    }

    /// 登录时返回用户所在的全部聊天室，顺序与 `user.chats` 一致。
    pub async fn list_chats(&self, user: &User) -> Result<Vec<ChatDto>, ApplicationError> {
        if user.chats.is_empty() {
            return Ok(Vec::new());
        }

        let mut chats: HashMap<ChatId, Chat> = self
            .deps
            .chat_repository
            .find_by_ids(&user.chats)
            .await?
            .into_iter()
            .map(|chat| (chat.id, chat))
            .collect();

        let mut member_ids: Vec<UserId> = chats
            .values()
            .flat_map(|chat| chat.members.iter().copied())
            .collect();
        member_ids.sort_unstable();
        member_ids.dedup();
        let usernames = self
            .deps
            .user_repository
            .find_usernames(&member_ids)
            .await?;

        user.chats
            .iter()
            .filter_map(|id| chats.remove(id))
            .map(|chat| {
                Ok::<_, ApplicationError>(ChatDto {
                    id: chat.id,
                    users: project_authors(&chat.members, &usernames)?,
                    messages: chat.messages,
                })
            })
            .collect()
    }

    async fn load_member_chat(
        &self,
        requester: &User,
        chat_id: ChatId,
    ) -> Result<Chat, ApplicationError> {
        if !requester.is_member_of(chat_id) {
            return Err(ApplicationError::NotFound);
        }
        self.deps
            .chat_repository
            .find_by_id(chat_id)
            .await?
            .ok_or(ApplicationError::NotFound)
    }

    async fn view(&self, chat: &Chat) -> Result<ChatDto, ApplicationError> {
        Ok(ChatDto {
            id: chat.id,
            messages: chat.messages.clone(),
            users: self.list_authors(&chat.members).await?,
        })
    }
}

/// 按输入顺序投影，结果与输入等长。
///
/// 成员 id 找不到对应用户说明成员关系已损坏，作为存储错误上报。
fn project_authors(
    ids: &[UserId],
    usernames: &HashMap<UserId, Username>,
) -> Result<Vec<Author>, ApplicationError> {
    ids.iter()
        .map(|id| match usernames.get(id) {
            Some(username) => Ok(Author {
                id: *id,
                username: username.clone(),
            }),
            None => {
                tracing::error!(user_id = %id, "member has no user record");
                Err(ApplicationError::Repository(RepositoryError::storage(format!(
                    "user {id} referenced by a chat does not exist"
                ))))
            }
        })
        .collect()
}
