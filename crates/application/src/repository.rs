use std::collections::HashMap;

use async_trait::async_trait;
use domain::{Chat, ChatId, NewUser, PasswordHash, RepositoryError, User, UserEmail, UserId, Username};

/// 用户持久化网关。
///
/// 只做读写，不做业务校验。`update` 是整条记录替换，并以 `user.version` 做比较交换：
/// 存储中的版本与传入版本不一致时返回 `RepositoryError::VersionConflict`。
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait UserRepository: Send + Sync {
    /// 邮箱重复时返回 `RepositoryError::Conflict`
    async fn create(&self, user: NewUser) -> Result<User, RepositoryError>;
    async fn find_by_id(&self, id: UserId) -> Result<Option<User>, RepositoryError>;
    async fn find_by_email(&self, email: UserEmail) -> Result<Option<User>, RepositoryError>;
    /// 批量读取，不保证返回顺序
    async fn find_by_ids(&self, ids: &[UserId]) -> Result<Vec<User>, RepositoryError>;
    async fn update(&self, user: User) -> Result<User, RepositoryError>;

    /// 按 id 解析用户名，结果以 id 为键，调用方自行按需要的顺序投影。
    async fn find_usernames(
        &self,
        ids: &[UserId],
    ) -> Result<HashMap<UserId, Username>, RepositoryError> {
        let users = self.find_by_ids(ids).await?;
        Ok(users
            .into_iter()
            .map(|user| (user.id, user.username))
            .collect())
    }
}

/// 聊天室持久化网关。
///
/// 涉及用户和聊天室两条记录的写入（`create_with_creator`、`save_membership`）
/// 在同一个事务中完成，要么都成功，要么都不生效。
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ChatRepository: Send + Sync {
    /// 创建聊天室（成员仅为创建者），并把新聊天室 id 写入创建者的聊天室集合。
    async fn create_with_creator(
        &self,
        password: PasswordHash,
        creator: User,
    ) -> Result<(Chat, User), RepositoryError>;
    async fn find_by_id(&self, id: ChatId) -> Result<Option<Chat>, RepositoryError>;
    /// 批量读取，不保证返回顺序
    async fn find_by_ids(&self, ids: &[ChatId]) -> Result<Vec<Chat>, RepositoryError>;
    async fn update(&self, chat: Chat) -> Result<Chat, RepositoryError>;
    /// 同时写入聊天室和用户记录，两者都做版本比较交换。
    async fn save_membership(&self, chat: Chat, user: User)
        -> Result<(Chat, User), RepositoryError>;
}
