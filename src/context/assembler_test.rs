use std::sync::Arc;

use crate::models::Role;
use crate::storage::{ConversationStore, sqlite::Sqlite};

use super::*;

async fn setup() -> (ArcStorage, Assembler) {
    let storage: ArcStorage = Arc::new(Sqlite::new(None).await.unwrap());
    let assembler = Assembler::new(Arc::clone(&storage));
    (storage, assembler)
}

#[tokio::test]
async fn test_build_context() {
    let (storage, assembler) = setup().await;

    let convo = storage.create_conversation("Test").await.unwrap();
    storage
        .append_message(convo.id(), Role::User, "Hi")
        .await
        .unwrap();
    storage
        .append_message(convo.id(), Role::Assistant, "Hello")
        .await
        .unwrap();
    storage
        .set_setting(SYSTEM_PROMPT_KEY, "Be terse")
        .await
        .unwrap();

    let context = assembler
        .build_context(convo.id(), "How are you?")
        .await
        .unwrap();

    assert_eq!(
        context,
        vec![
            ChatMessage::system("Be terse"),
            ChatMessage::user("Hi"),
            ChatMessage::assistant("Hello"),
            ChatMessage::user("How are you?"),
        ]
    );
}

#[tokio::test]
async fn test_build_context_default_prompt_empty_history() {
    let (storage, assembler) = setup().await;
    let convo = storage.create_conversation("Fresh").await.unwrap();

    let context = assembler.build_context(convo.id(), "Hi").await.unwrap();
    assert_eq!(
        context,
        vec![
            ChatMessage::system(crate::config::constants::DEFAULT_SYSTEM_PROMPT),
            ChatMessage::user("Hi"),
        ]
    );
}

#[tokio::test]
async fn test_build_context_without_system_prompt() {
    let (storage, assembler) = setup().await;
    let convo = storage.create_conversation("Bare").await.unwrap();
    storage.set_setting(SYSTEM_PROMPT_KEY, "").await.unwrap();
    storage
        .append_message(convo.id(), Role::User, "Hi")
        .await
        .unwrap();

    let context = assembler.build_context(convo.id(), "Again").await.unwrap();
    assert_eq!(
        context,
        vec![ChatMessage::user("Hi"), ChatMessage::user("Again")]
    );
}

#[test]
fn test_assemble_order_for_any_history_length() {
    let roles = [Role::User, Role::Assistant, Role::System];
    for len in 0..8 {
        let history = (0..len)
            .map(|i| Message::new(roles[i % roles.len()], format!("message {}", i)))
            .collect::<Vec<_>>();

        for prompt in ["", "Be terse"] {
            let context = assemble(prompt, &history, "pending");
            let offset = if prompt.is_empty() { 0 } else { 1 };

            assert_eq!(context.len(), len + offset + 1);
            if offset == 1 {
                assert_eq!(context[0], ChatMessage::system(prompt));
            }
            for (i, msg) in history.iter().enumerate() {
                assert_eq!(context[i + offset], ChatMessage::from(msg));
            }
            assert_eq!(context.last(), Some(&ChatMessage::user("pending")));
        }
    }
}
