use std::collections::HashMap;
use std::sync::Arc;

use application::{ChatRepository, UserRepository};
use async_trait::async_trait;
use domain::{
    Chat, ChatId, Message, NewUser, PasswordHash, RepositoryError, User, UserEmail, UserId,
    Username,
};
use sqlx::{postgres::PgPoolOptions, types::Json, FromRow, PgConnection, PgPool};

pub(crate) fn map_sqlx_err(err: sqlx::Error) -> RepositoryError {
    match err.as_database_error() {
        Some(db_err) if db_err.is_unique_violation() => RepositoryError::Conflict,
        _ => RepositoryError::storage(err.to_string()),
    }
}

fn invalid_data(message: impl Into<String>) -> RepositoryError {
    RepositoryError::storage(message)
}

pub async fn create_pg_pool(database_url: &str, max_connections: u32) -> Result<PgPool, sqlx::Error> {
    PgPoolOptions::new()
        .max_connections(max_connections)
        .connect(database_url)
        .await
}

const USER_COLUMNS: &str = "id, username, email, password, chats, version";
const CHAT_COLUMNS: &str = "id, password, messages, users, version";

#[derive(Debug, FromRow)]
struct UserRecord {
    id: i32,
    username: String,
    email: String,
    password: String,
    chats: Vec<i32>,
    version: i64,
}

impl TryFrom<UserRecord> for User {
    type Error = RepositoryError;

    fn try_from(value: UserRecord) -> Result<Self, Self::Error> {
        let username = Username::parse(value.username).map_err(|err| invalid_data(err.to_string()))?;
        let email = UserEmail::parse(value.email).map_err(|err| invalid_data(err.to_string()))?;
        let password =
            PasswordHash::new(value.password).map_err(|err| invalid_data(err.to_string()))?;

        Ok(User {
            id: UserId::from(value.id),
            username,
            email,
            password,
            chats: value.chats.into_iter().map(ChatId::from).collect(),
            version: value.version,
        })
    }
}

#[derive(Debug, FromRow)]
struct ChatRecord {
    id: i32,
    password: String,
    messages: Json<Vec<Message>>,
    users: Vec<i32>,
    version: i64,
}

impl TryFrom<ChatRecord> for Chat {
    type Error = RepositoryError;

    fn try_from(value: ChatRecord) -> Result<Self, Self::Error> {
        let password =
            PasswordHash::new(value.password).map_err(|err| invalid_data(err.to_string()))?;

        Ok(Chat {
            id: ChatId::from(value.id),
            password,
            messages: value.messages.0,
            members: value.users.into_iter().map(UserId::from).collect(),
            version: value.version,
        })
    }
}

fn chat_ids(ids: &[ChatId]) -> Vec<i32> {
    ids.iter().copied().map(i32::from).collect()
}

fn user_ids(ids: &[UserId]) -> Vec<i32> {
    ids.iter().copied().map(i32::from).collect()
}

/// 比较交换失败后区分“记录不存在”和“版本已变化”
async fn missing_or_stale(
    conn: &mut PgConnection,
    table: &'static str,
    id: i32,
) -> RepositoryError {
    let query = format!("SELECT EXISTS(SELECT 1 FROM {table} WHERE id = $1)");
    match sqlx::query_scalar::<_, bool>(&query)
        .bind(id)
        .fetch_one(conn)
        .await
    {
        Ok(true) => RepositoryError::VersionConflict,
        Ok(false) => RepositoryError::NotFound,
        Err(err) => map_sqlx_err(err),
    }
}

async fn update_user(conn: &mut PgConnection, user: &User) -> Result<User, RepositoryError> {
    let query = format!(
        "UPDATE users SET username = $2, email = $3, password = $4, chats = $5, version = version + 1 \
         WHERE id = $1 AND version = $6 RETURNING {USER_COLUMNS}"
    );
    let record = sqlx::query_as::<_, UserRecord>(&query)
        .bind(i32::from(user.id))
        .bind(user.username.as_str())
        .bind(user.email.as_str())
        .bind(user.password.as_str())
        .bind(chat_ids(&user.chats))
        .bind(user.version)
        .fetch_optional(&mut *conn)
        .await
        .map_err(map_sqlx_err)?;

    match record {
        Some(record) => User::try_from(record),
        None => Err(missing_or_stale(conn, "users", user.id.into()).await),
    }
}

async fn update_chat(conn: &mut PgConnection, chat: &Chat) -> Result<Chat, RepositoryError> {
    let query = format!(
        "UPDATE chat SET password = $2, messages = $3, users = $4, version = version + 1 \
         WHERE id = $1 AND version = $5 RETURNING {CHAT_COLUMNS}"
    );
    let record = sqlx::query_as::<_, ChatRecord>(&query)
        .bind(i32::from(chat.id))
        .bind(chat.password.as_str())
        .bind(Json(&chat.messages))
        .bind(user_ids(&chat.members))
        .bind(chat.version)
        .fetch_optional(&mut *conn)
        .await
        .map_err(map_sqlx_err)?;

    match record {
        Some(record) => Chat::try_from(record),
        None => Err(missing_or_stale(conn, "chat", chat.id.into()).await),
    }
}

#[derive(Clone)]
pub struct PgUserRepository {
    pool: PgPool,
}

impl PgUserRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl UserRepository for PgUserRepository {
    async fn create(&self, user: NewUser) -> Result<User, RepositoryError> {
        let query = format!(
            "INSERT INTO users (username, email, password, chats, version) \
             VALUES ($1, $2, $3, '{{}}', 0) RETURNING {USER_COLUMNS}"
        );
        let record = sqlx::query_as::<_, UserRecord>(&query)
            .bind(user.username.as_str())
            .bind(user.email.as_str())
            .bind(user.password.as_str())
            .fetch_one(&self.pool)
            .await
            .map_err(map_sqlx_err)?;

        User::try_from(record)
    }

    async fn find_by_id(&self, id: UserId) -> Result<Option<User>, RepositoryError> {
        let query = format!("SELECT {USER_COLUMNS} FROM users WHERE id = $1");
        let record = sqlx::query_as::<_, UserRecord>(&query)
            .bind(i32::from(id))
            .fetch_optional(&self.pool)
            .await
            .map_err(map_sqlx_err)?;

        record.map(User::try_from).transpose()
    }

    async fn find_by_email(&self, email: UserEmail) -> Result<Option<User>, RepositoryError> {
        let query = format!("SELECT {USER_COLUMNS} FROM users WHERE email = $1");
        let record = sqlx::query_as::<_, UserRecord>(&query)
            .bind(email.as_str())
            .fetch_optional(&self.pool)
            .await
            .map_err(map_sqlx_err)?;

        record.map(User::try_from).transpose()
    }

    async fn find_by_ids(&self, ids: &[UserId]) -> Result<Vec<User>, RepositoryError> {
        let query = format!("SELECT {USER_COLUMNS} FROM users WHERE id = ANY($1)");
        let records = sqlx::query_as::<_, UserRecord>(&query)
            .bind(user_ids(ids))
            .fetch_all(&self.pool)
            .await
            .map_err(map_sqlx_err)?;

        records.into_iter().map(User::try_from).collect()
    }

    async fn update(&self, user: User) -> Result<User, RepositoryError> {
        let mut conn = self.pool.acquire().await.map_err(map_sqlx_err)?;
        update_user(&mut *conn, &user).await
    }

    async fn find_usernames(
        &self,
        ids: &[UserId],
    ) -> Result<HashMap<UserId, Username>, RepositoryError> {
        let rows = sqlx::query_as::<_, (i32, String)>(
            "SELECT id, username FROM users WHERE id = ANY($1)",
        )
        .bind(user_ids(ids))
        .fetch_all(&self.pool)
        .await
        .map_err(map_sqlx_err)?;

        rows.into_iter()
            .map(|(id, username)| {
                Username::parse(username)
                    .map(|username| (UserId::from(id), username))
                    .map_err(|err| invalid_data(err.to_string()))
            })
            .collect()
    }
}

#[derive(Clone)]
pub struct PgChatRepository {
    pool: PgPool,
}

impl PgChatRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl ChatRepository for PgChatRepository {
    async fn create_with_creator(
        &self,
        password: PasswordHash,
        mut creator: User,
    ) -> Result<(Chat, User), RepositoryError> {
        let mut tx = self.pool.begin().await.map_err(map_sqlx_err)?;

        let query = format!(
            "INSERT INTO chat (password, messages, users, version) \
             VALUES ($1, $2, $3, 0) RETURNING {CHAT_COLUMNS}"
        );
        let record = sqlx::query_as::<_, ChatRecord>(&query)
            .bind(password.as_str())
            .bind(Json(Vec::<Message>::new()))
            .bind(vec![i32::from(creator.id)])
            .fetch_one(&mut *tx)
            .await
            .map_err(map_sqlx_err)?;
        let chat = Chat::try_from(record)?;

        creator.add_chat(chat.id);
        let creator = update_user(&mut *tx, &creator).await?;

        tx.commit().await.map_err(map_sqlx_err)?;
        Ok((chat, creator))
    }

    async fn find_by_id(&self, id: ChatId) -> Result<Option<Chat>, RepositoryError> {
        let query = format!("SELECT {CHAT_COLUMNS} FROM chat WHERE id = $1");
        let record = sqlx::query_as::<_, ChatRecord>(&query)
            .bind(i32::from(id))
            .fetch_optional(&self.pool)
            .await
            .map_err(map_sqlx_err)?;

        record.map(Chat::try_from).transpose()
    }

    async fn find_by_ids(&self, ids: &[ChatId]) -> Result<Vec<Chat>, RepositoryError> {
        let query = format!("SELECT {CHAT_COLUMNS} FROM chat WHERE id = ANY($1)");
        let records = sqlx::query_as::<_, ChatRecord>(&query)
            .bind(chat_ids(ids))
            .fetch_all(&self.pool)
            .await
            .map_err(map_sqlx_err)?;

        records.into_iter().map(Chat::try_from).collect()
    }

    async fn update(&self, chat: Chat) -> Result<Chat, RepositoryError> {
        let mut conn = self.pool.acquire().await.map_err(map_sqlx_err)?;
        update_chat(&mut *conn, &chat).await
    }

    async fn save_membership(
        &self,
        chat: Chat,
        user: User,
    ) -> Result<(Chat, User), RepositoryError> {
        // 任何一步失败时 tx 被丢弃，事务自动回滚
        let mut tx = self.pool.begin().await.map_err(map_sqlx_err)?;
        let chat = update_chat(&mut *tx, &chat).await?;
        let user = update_user(&mut *tx, &user).await?;
        tx.commit().await.map_err(map_sqlx_err)?;
        Ok((chat, user))
    }
}

/// Postgres 存储的仓储集合
#[derive(Clone)]
pub struct PgStorage {
    pub user_repository: Arc<PgUserRepository>,
    pub chat_repository: Arc<PgChatRepository>,
}

impl PgStorage {
    pub fn new(pool: PgPool) -> Self {
        Self {
            user_repository: Arc::new(PgUserRepository::new(pool.clone())),
            chat_repository: Arc::new(PgChatRepository::new(pool)),
        }
    }
}
