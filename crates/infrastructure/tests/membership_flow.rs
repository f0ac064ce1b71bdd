use std::sync::Arc;

use application::{
    services::{
        AuthenticateUserRequest, CreateChatRequest, JoinChatRequest, PostMessageRequest,
        RegisterUserRequest,
    },
    ApplicationError, ChatRepository, MembershipService, MembershipServiceDependencies,
    UserService, UserServiceDependencies,
};
use domain::{ChatId, RepositoryError, User, UserId};
use infrastructure::{BcryptPasswordHasher, MemoryStorage};

struct Harness {
    storage: MemoryStorage,
    users: UserService,
    membership: MembershipService,
}

impl Harness {
    fn new() -> Self {
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
        Self {
            storage,
            users,
            membership,
        }
    }

    async fn register(&self, username: &str, email: &str, password: &str) -> User {
        self.users
            .register(RegisterUserRequest {
                username: username.to_string(),
                email: email.to_string(),
                password: password.to_string(),
            })
            .await
            .expect("register")
    }

    /// 每次操作前重新读取用户，和 web 层按 token 加载用户的方式一致
    async fn fresh(&self, id: UserId) -> User {
        self.users.find_by_id(id).await.expect("user exists")
    }

    async fn chat_members(&self, chat_id: ChatId) -> Vec<UserId> {
        ChatRepository::find_by_id(&self.storage, chat_id)
            .await
            .expect("read chat")
            .expect("chat exists")
            .members
    }

    /// 双向成员关系一致性
    async fn assert_consistent(&self, user_ids: &[UserId], chat_ids: &[ChatId]) {
        for user_id in user_ids {
            let user = self.fresh(*user_id).await;
            for chat_id in chat_ids {
                let members = self.chat_members(*chat_id).await;
                assert_eq!(
                    user.is_member_of(*chat_id),
                    members.contains(user_id),
                    "user {user_id} / chat {chat_id} out of sync"
                );
            }
        }
    }
}

#[tokio::test]
async fn register_then_login_returns_same_user() {
    let harness = Harness::new();
    let registered = harness.register("alice", "a@x.com", "pw123").await;

    let logged_in = harness
        .users
        .authenticate(AuthenticateUserRequest {
            email: "a@x.com".to_string(),
            password: "pw123".to_string(),
        })
        .await
        .expect("login");
    assert_eq!(logged_in.id, registered.id);

    let wrong = harness
        .users
        .authenticate(AuthenticateUserRequest {
            email: "a@x.com".to_string(),
            password: "pw124".to_string(),
        })
        .await;
    assert!(matches!(wrong, Err(ApplicationError::InvalidCredentials)));
}

#[tokio::test]
async fn duplicate_email_is_rejected() {
    let harness = Harness::new();
    harness.register("alice", "a@x.com", "pw123").await;

    let result = harness
        .users
        .register(RegisterUserRequest {
            username: "alice2".to_string(),
            email: "a@x.com".to_string(),
            password: "other".to_string(),
        })
        .await;
    assert!(matches!(result, Err(ApplicationError::UserAlreadyExists)));
}

#[tokio::test]
async fn alice_and_bob_share_a_chat() {
    let harness = Harness::new();

    let alice = harness.register("alice", "a@x.com", "pw123").await;
    assert_eq!(alice.id, UserId(1));

    let chat = harness
        .membership
        .create_chat(
            &alice,
            CreateChatRequest {
                password: "secret".to_string(),
            },
        )
        .await
        .expect("create chat");
    assert_eq!(chat.id, ChatId(1));
    assert_eq!(chat.member_ids(), vec![UserId(1)]);

    let bob = harness.register("bob", "b@x.com", "pw456").await;
    assert_eq!(bob.id, UserId(2));

    let joined = harness
        .membership
        .join_chat(
            &bob,
            JoinChatRequest {
                chat_id: chat.id,
                password: "secret".to_string(),
            },
        )
        .await
        .expect("join chat");
    assert_eq!(joined.member_ids(), vec![UserId(1), UserId(2)]);
    let usernames: Vec<&str> = joined.users.iter().map(|a| a.username.as_str()).collect();
    assert_eq!(usernames, vec!["alice", "bob"]);
    assert_eq!(harness.fresh(bob.id).await.chats, vec![ChatId(1)]);

    let alice = harness.fresh(alice.id).await;
    harness
        .membership
        .leave_chat(&alice, chat.id)
        .await
        .expect("leave chat");

    assert_eq!(harness.chat_members(chat.id).await, vec![UserId(2)]);
    assert!(harness.fresh(alice.id).await.chats.is_empty());
    harness
        .assert_consistent(&[alice.id, bob.id], &[chat.id])
        .await;
}

#[tokio::test]
async fn wrong_chat_password_changes_nothing() {
    let harness = Harness::new();
    let alice = harness.register("alice", "a@x.com", "pw123").await;
    let bob = harness.register("bob", "b@x.com", "pw456").await;
    let chat = harness
        .membership
        .create_chat(
            &alice,
            CreateChatRequest {
                password: "secret".to_string(),
            },
        )
        .await
        .expect("create chat");

    let chat_before = ChatRepository::find_by_id(&harness.storage, chat.id)
        .await
        .unwrap();
    let bob_before = harness.fresh(bob.id).await;

    let result = harness
        .membership
        .join_chat(
            &bob_before,
            JoinChatRequest {
                chat_id: chat.id,
                password: "guess".to_string(),
            },
        )
        .await;
    assert!(matches!(result, Err(ApplicationError::Authentication)));

    let chat_after = ChatRepository::find_by_id(&harness.storage, chat.id)
        .await
        .unwrap();
    assert_eq!(chat_before, chat_after);
    assert_eq!(bob_before, harness.fresh(bob.id).await);
}

#[tokio::test]
async fn joining_twice_keeps_one_membership() {
    let harness = Harness::new();
    let alice = harness.register("alice", "a@x.com", "pw123").await;
    let bob = harness.register("bob", "b@x.com", "pw456").await;
    let chat = harness
        .membership
        .create_chat(
            &alice,
            CreateChatRequest {
                password: "secret".to_string(),
            },
        )
        .await
        .expect("create chat");

    for _ in 0..2 {
        let bob = harness.fresh(bob.id).await;
        harness
            .membership
            .join_chat(
                &bob,
                JoinChatRequest {
                    chat_id: chat.id,
                    password: "secret".to_string(),
                },
            )
            .await
            .expect("join chat");
    }

    assert_eq!(harness.chat_members(chat.id).await, vec![alice.id, bob.id]);
    assert_eq!(harness.fresh(bob.id).await.chats, vec![chat.id]);
}

#[tokio::test]
async fn leaving_a_chat_never_joined_is_not_found() {
    let harness = Harness::new();
    let alice = harness.register("alice", "a@x.com", "pw123").await;
    let bob = harness.register("bob", "b@x.com", "pw456").await;
    let chat = harness
        .membership
        .create_chat(
            &alice,
            CreateChatRequest {
                password: "secret".to_string(),
            },
        )
        .await
        .expect("create chat");
    let members_before = harness.chat_members(chat.id).await;

    let result = harness.membership.leave_chat(&bob, chat.id).await;
    assert!(matches!(result, Err(ApplicationError::NotFound)));

    // 不存在的聊天室返回同样的错误
    let result = harness.membership.leave_chat(&bob, ChatId(99)).await;
    assert!(matches!(result, Err(ApplicationError::NotFound)));

    assert_eq!(harness.chat_members(chat.id).await, members_before);
    assert!(harness.fresh(bob.id).await.chats.is_empty());
}

#[tokio::test]
async fn non_member_cannot_read_or_post() {
    let harness = Harness::new();
    let alice = harness.register("alice", "a@x.com", "pw123").await;
    let bob = harness.register("bob", "b@x.com", "pw456").await;
    let chat = harness
        .membership
        .create_chat(
            &alice,
            CreateChatRequest {
                password: "secret".to_string(),
            },
        )
        .await
        .expect("create chat");

    let read = harness.membership.get_chat(&bob, chat.id).await;
    assert!(matches!(read, Err(ApplicationError::NotFound)));

    let post = harness
        .membership
        .post_message(
            &bob,
            PostMessageRequest {
                chat_id: chat.id,
                text: "hi".to_string(),
            },
        )
        .await;
    assert!(matches!(post, Err(ApplicationError::NotFound)));
}

#[tokio::test]
async fn posted_messages_show_up_in_order() {
    let harness = Harness::new();
    let alice = harness.register("alice", "a@x.com", "pw123").await;
    let chat = harness
        .membership
        .create_chat(
            &alice,
            CreateChatRequest {
                password: "secret".to_string(),
            },
        )
        .await
        .expect("create chat");
    let alice = harness.fresh(alice.id).await;

    for text in ["first", "second"] {
        harness
            .membership
            .post_message(
                &alice,
                PostMessageRequest {
                    chat_id: chat.id,
                    text: text.to_string(),
                },
            )
            .await
            .expect("post message");
    }

    let view = harness
        .membership
        .get_chat(&alice, chat.id)
        .await
        .expect("get chat");
    let texts: Vec<&str> = view.messages.iter().map(|m| m.text.as_str()).collect();
    assert_eq!(texts, vec!["first", "second"]);
    assert!(view.messages.iter().all(|m| m.author.id == alice.id));

    let chats = harness.membership.list_chats(&alice).await.expect("list chats");
    assert_eq!(chats, vec![view]);
}

#[tokio::test]
async fn stale_user_snapshot_is_a_version_conflict() {
    let harness = Harness::new();
    let alice = harness.register("alice", "a@x.com", "pw123").await;
    let bob = harness.register("bob", "b@x.com", "pw456").await;
    let chat = harness
        .membership
        .create_chat(
            &alice,
            CreateChatRequest {
                password: "secret".to_string(),
            },
        )
        .await
        .expect("create chat");

    // alice 的快照早于创建聊天室，版本已过期
    let second = harness
        .membership
        .create_chat(
            &alice,
            CreateChatRequest {
                password: "other".to_string(),
            },
        )
        .await;
    assert!(matches!(
        second,
        Err(ApplicationError::Repository(RepositoryError::VersionConflict))
    ));

    let bob = harness.fresh(bob.id).await;
    harness
        .membership
        .join_chat(
            &bob,
            JoinChatRequest {
                chat_id: chat.id,
                password: "secret".to_string(),
            },
        )
        .await
        .expect("join chat");
    harness
        .assert_consistent(&[alice.id, bob.id], &[chat.id])
        .await;
}

#[tokio::test]
async fn list_authors_keeps_input_order_and_length() {
    let harness = Harness::new();
    let alice = harness.register("alice", "a@x.com", "pw123").await;
    let bob = harness.register("bob", "b@x.com", "pw456").await;

    let authors = harness
        .membership
        .list_authors(&[bob.id, alice.id, bob.id])
        .await
        .expect("list authors");
    let resolved: Vec<(UserId, &str)> = authors
        .iter()
        .map(|a| (a.id, a.username.as_str()))
        .collect();
    assert_eq!(
        resolved,
        vec![(bob.id, "bob"), (alice.id, "alice"), (bob.id, "bob")]
    );

    // 未知 id 不会被悄悄丢掉
    let result = harness
        .membership
        .list_authors(&[alice.id, UserId(77), alice.id])
        .await;
    assert!(matches!(
        result,
        Err(ApplicationError::Repository(RepositoryError::Storage { .. }))
    ));
}
