/// 并发加入同一个聊天室：每次写入要么完整生效，要么以版本冲突失败
use std::sync::Arc;

use application::{
    services::{CreateChatRequest, JoinChatRequest, RegisterUserRequest},
    ApplicationError, ChatRepository, MembershipService, MembershipServiceDependencies,
    UserRepository, UserService, UserServiceDependencies,
};
use domain::RepositoryError;
use futures::future::join_all;
use infrastructure::{BcryptPasswordHasher, MemoryStorage};

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_joins_never_leave_half_written_membership() {
    let storage = MemoryStorage::new();
    let hasher = Arc::new(BcryptPasswordHasher::new(Some(4)));
    let users = UserService::new(UserServiceDependencies {
        user_repository: Arc::new(storage.clone()),
        password_hasher: hasher.clone(),
    });
    let membership = MembershipService::new(MembershipServiceDependencies {
        user_repository: Arc::new(storage.clone()),
        chat_repository: Arc::new(storage.clone()),
        password_hasher: hasher,
    });

    let mut registered = Vec::new();
    for i in 0..6 {
        let user = users
            .register(RegisterUserRequest {
                username: format!("user{i}"),
                email: format!("user{i}@x.com"),
                password: "pw".to_string(),
            })
            .await
            .expect("register");
        registered.push(user);
    }

    let owner = &registered[0];
    let chat = membership
        .create_chat(
            owner,
            CreateChatRequest {
                password: "secret".to_string(),
            },
        )
        .await
        .expect("create chat");

    let joins = registered[1..].iter().map(|user| {
        membership.join_chat(
            user,
            JoinChatRequest {
                chat_id: chat.id,
                password: "secret".to_string(),
            },
        )
    });
    let outcomes = join_all(joins).await;

    let mut joined = 0;
    for outcome in &outcomes {
        match outcome {
            Ok(_) => joined += 1,
            Err(ApplicationError::Repository(RepositoryError::VersionConflict)) => {}
            Err(other) => panic!("unexpected join failure: {other}"),
        }
    }
    assert!(joined >= 1);

    let stored_chat = ChatRepository::find_by_id(&storage, chat.id)
        .await
        .unwrap()
        .expect("chat exists");
    assert_eq!(stored_chat.members.len(), 1 + joined);

    for user in &registered {
        let stored = UserRepository::find_by_id(&storage, user.id)
            .await
            .unwrap()
            .expect("user exists");
        assert_eq!(
            stored.is_member_of(chat.id),
            stored_chat.has_member(user.id),
            "user {} out of sync with chat",
            user.id
        );
    }
}
