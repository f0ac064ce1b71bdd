//! 进程内存储，语义与 Postgres 实现保持一致（自增 id、邮箱唯一、版本比较交换）。
//!
//! 用户表和聊天室表放在同一把锁后面，双记录写入在一次加锁内完成。

use std::collections::HashMap;
use std::sync::Arc;

use application::{ChatRepository, UserRepository};
use async_trait::async_trait;
use domain::{
    Chat, ChatId, NewUser, PasswordHash, RepositoryError, User, UserEmail, UserId, Version,
};
use tokio::sync::RwLock;

#[derive(Debug, Default)]
struct MemoryState {
    users: HashMap<UserId, User>,
    chats: HashMap<ChatId, Chat>,
    last_user_id: i32,
    last_chat_id: i32,
}

fn check_version(stored: Option<Version>, expected: Version) -> Result<(), RepositoryError> {
    match stored {
        None => Err(RepositoryError::NotFound),
        Some(version) if version != expected => Err(RepositoryError::VersionConflict),
        Some(_) => Ok(()),
    }
}

impl MemoryState {
    fn check_user(&self, user: &User) -> Result<(), RepositoryError> {
        check_version(self.users.get(&user.id).map(|u| u.version), user.version)?;
        let email_taken = self
            .users
            .values()
            .any(|other| other.id != user.id && other.email == user.email);
        if email_taken {
            return Err(RepositoryError::Conflict);
        }
        Ok(())
    }

    fn check_chat(&self, chat: &Chat) -> Result<(), RepositoryError> {
        check_version(self.chats.get(&chat.id).map(|c| c.version), chat.version)
    }

    /// 调用前必须已通过 `check_user`
    fn store_user(&mut self, mut user: User) -> User {
        user.version += 1;
        self.users.insert(user.id, user.clone());
        user
    }

    /// 调用前必须已通过 `check_chat`
    fn store_chat(&mut self, mut chat: Chat) -> Chat {
        chat.version += 1;
        self.chats.insert(chat.id, chat.clone());
        chat
    }
}

/// 同时实现 `UserRepository` 和 `ChatRepository` 的内存存储，克隆后共享同一份数据。
#[derive(Debug, Clone, Default)]
pub struct MemoryStorage {
    state: Arc<RwLock<MemoryState>>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl UserRepository for MemoryStorage {
    async fn create(&self, user: NewUser) -> Result<User, RepositoryError> {
        let mut state = self.state.write().await;
        if state.users.values().any(|u| u.email == user.email) {
            return Err(RepositoryError::Conflict);
        }

        state.last_user_id += 1;
        let stored = User {
            id: UserId(state.last_user_id),
            username: user.username,
            email: user.email,
            password: user.password,
            chats: Vec::new(),
            version: 0,
        };
        state.users.insert(stored.id, stored.clone());
        Ok(stored)
    }

    async fn find_by_id(&self, id: UserId) -> Result<Option<User>, RepositoryError> {
        Ok(self.state.read().await.users.get(&id).cloned())
    }

    async fn find_by_email(&self, email: UserEmail) -> Result<Option<User>, RepositoryError> {
        let state = self.state.read().await;
        Ok(state.users.values().find(|u| u.email == email).cloned())
    }

    async fn find_by_ids(&self, ids: &[UserId]) -> Result<Vec<User>, RepositoryError> {
        let state = self.state.read().await;
        Ok(ids.iter().filter_map(|id| state.users.get(id).cloned()).collect())
    }

    async fn update(&self, user: User) -> Result<User, RepositoryError> {
        let mut state = self.state.write().await;
        state.check_user(&user)?;
        Ok(state.store_user(user))
    }
}

#[async_trait]
impl ChatRepository for MemoryStorage {
    async fn create_with_creator(
        &self,
        password: PasswordHash,
        mut creator: User,
    ) -> Result<(Chat, User), RepositoryError> {
        let mut state = self.state.write().await;
        state.check_user(&creator)?;

        state.last_chat_id += 1;
        let chat = Chat {
            id: ChatId(state.last_chat_id),
            password,
            messages: Vec::new(),
            members: vec![creator.id],
            version: 0,
        };
        state.chats.insert(chat.id, chat.clone());

        creator.add_chat(chat.id);
        let creator = state.store_user(creator);
        Ok((chat, creator))
    }

    async fn find_by_id(&self, id: ChatId) -> Result<Option<Chat>, RepositoryError> {
        Ok(self.state.read().await.chats.get(&id).cloned())
    }

    async fn find_by_ids(&self, ids: &[ChatId]) -> Result<Vec<Chat>, RepositoryError> {
        let state = self.state.read().await;
        Ok(ids.iter().filter_map(|id| state.chats.get(id).cloned()).collect())
    }

    async fn update(&self, chat: Chat) -> Result<Chat, RepositoryError> {
        let mut state = self.state.write().await;
        state.check_chat(&chat)?;
        Ok(state.store_chat(chat))
    }

    async fn save_membership(
        &self,
        chat: Chat,
        user: User,
    ) -> Result<(Chat, User), RepositoryError> {
        let mut state = self.state.write().await;
        // 两条记录都校验通过后才写入
        state.check_chat(&chat)?;
        state.check_user(&user)?;
        let chat = state.store_chat(chat);
        let user = state.store_user(user);
        Ok((chat, user))
    }
}
