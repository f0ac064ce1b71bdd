use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use serde::Deserialize;
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};

use application::services::{
    AuthenticateUserRequest, CreateChatRequest, JoinChatRequest, PostMessageRequest,
    RegisterUserRequest,
};
use application::{ChatDto, UserDto};
use domain::{ChatId, Message, User};

use crate::{
    auth::{AuthUser, SessionResponse},
    error::ApiError,
    extract::JsonBody,
    state::AppState,
};

#[derive(Debug, Deserialize)]
struct RegisterPayload {
    username: String,
    email: String,
    password: String,
}

#[derive(Debug, Deserialize)]
struct LoginPayload {
    email: String,
    password: String,
}

#[derive(Debug, Deserialize)]
struct CreateChatPayload {
    password: String,
}

#[derive(Debug, Deserialize)]
struct JoinChatPayload {
    password: String,
    /// 可选，提供时必须与路径中的 id 一致
    id: Option<i32>,
}

#[derive(Debug, Deserialize)]
struct PostMessagePayload {
    text: String,
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health))
        .nest("/api", api_routes())
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

fn api_routes() -> Router<AppState> {
    Router::new()
        .route("/register", post(register_user))
        .route("/login", post(login_user))
        .route("/chats/create", post(create_chat))
        .route(
            "/chats/{chat_id}",
            get(get_chat).post(join_chat).delete(leave_chat),
        )
        .route("/chats/{chat_id}/messages", post(post_message))
}

async fn health() -> StatusCode {
    StatusCode::OK
}

/// 非数字的 id 当作不存在的聊天室处理
fn parse_chat_id(raw: &str) -> Result<ChatId, ApiError> {
    raw.parse::<i32>()
        .map(ChatId::from)
        .map_err(|_| ApiError::not_found())
}

fn session(
    state: &AppState,
    user: &User,
    chats: Vec<ChatDto>,
) -> Result<SessionResponse, ApiError> {
    let token = state.jwt_service.generate_token(user.id)?;
    Ok(SessionResponse {
        user: UserDto::from(user),
        chats,
        token,
    })
}

async fn register_user(
    State(state): State<AppState>,
    JsonBody(payload): JsonBody<RegisterPayload>,
) -> Result<(StatusCode, Json<SessionResponse>), ApiError> {
    let user = state
        .user_service
        .register(RegisterUserRequest {
            username: payload.username,
            email: payload.email,
            password: payload.password,
        })
        .await?;

    let response = session(&state, &user, Vec::new())?;
    Ok((StatusCode::CREATED, Json(response)))
}

async fn login_user(
    State(state): State<AppState>,
    JsonBody(payload): JsonBody<LoginPayload>,
) -> Result<(StatusCode, Json<SessionResponse>), ApiError> {
    let user = state
        .user_service
        .authenticate(AuthenticateUserRequest {
            email: payload.email,
            password: payload.password,
        })
        .await?;

    let chats = state.membership_service.list_chats(&user).await?;
    let response = session(&state, &user, chats)?;
    Ok((StatusCode::CREATED, Json(response)))
}

async fn create_chat(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    JsonBody(payload): JsonBody<CreateChatPayload>,
) -> Result<(StatusCode, Json<ChatDto>), ApiError> {
    let dto = state
        .membership_service
        .create_chat(
            &user,
            CreateChatRequest {
                password: payload.password,
            },
        )
        .await?;

    Ok((StatusCode::CREATED, Json(dto)))
}

async fn get_chat(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    Path(chat_id): Path<String>,
) -> Result<Json<ChatDto>, ApiError> {
    let chat_id = parse_chat_id(&chat_id)?;
    let dto = state.membership_service.get_chat(&user, chat_id).await?;
    Ok(Json(dto))
}

async fn join_chat(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    Path(chat_id): Path<String>,
    JsonBody(payload): JsonBody<JoinChatPayload>,
) -> Result<Json<ChatDto>, ApiError> {
    let chat_id = parse_chat_id(&chat_id)?;
    if let Some(body_id) = payload.id {
        if ChatId::from(body_id) != chat_id {
            return Err(ApiError::bad_request("chat id in body does not match path"));
        }
    }

    let dto = state
        .membership_service
        .join_chat(
            &user,
            JoinChatRequest {
                chat_id,
                password: payload.password,
            },
        )
        .await?;

    Ok(Json(dto))
}

async fn leave_chat(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    Path(chat_id): Path<String>,
) -> Result<Json<&'static str>, ApiError> {
    let chat_id = parse_chat_id(&chat_id)?;
    state.membership_service.leave_chat(&user, chat_id).await?;
    Ok(Json("chat left"))
}

async fn post_message(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    Path(chat_id): Path<String>,
    JsonBody(payload): JsonBody<PostMessagePayload>,
) -> Result<(StatusCode, Json<Message>), ApiError> {
    let chat_id = parse_chat_id(&chat_id)?;
    let message = state
        .membership_service
        .post_message(
            &user,
            PostMessageRequest {
                chat_id,
                text: payload.text,
            },
        )
        .await?;

    Ok((StatusCode::CREATED, Json(message)))
}
