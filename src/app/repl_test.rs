use std::sync::Arc;

use crate::backend::{BackendError, MockBackend};
use crate::models::LocalModel;
use crate::storage::{ArcStorage, ConversationStore, MessageStore, SettingsStore, sqlite::Sqlite};

use super::*;

#[test]
fn test_parse_action() {
    let cases = [
        ("Hi there", Action::Submit("Hi there".to_string())),
        ("  /list  ", Action::ListConversations),
        ("/new Trip plans", Action::NewConversation("Trip plans".to_string())),
        ("/switch 3", Action::SwitchConversation(3)),
        (
            "/rename 3 Trip  plans",
            Action::RenameConversation(3, "Trip  plans".to_string()),
        ),
        ("/delete 7", Action::DeleteConversation(7)),
        ("/system", Action::ShowSystemPrompt),
        ("/system Be terse", Action::SetSystemPrompt("Be terse".to_string())),
        ("/system \"\"", Action::SetSystemPrompt(String::new())),
        ("/models", Action::ListModels),
        ("/model llama3.2", Action::SetModel("llama3.2".to_string())),
        ("/history", Action::History),
        ("/help", Action::Help),
        ("/quit", Action::Quit),
        ("what does /new do?", Action::Submit("what does /new do?".to_string())),
    ];

    for (line, expected) in cases {
        assert_eq!(line.parse::<Action>().unwrap(), expected, "line: {line:?}");
    }
}

#[test]
fn test_parse_action_errors() {
    let cases = [
        ("/bogus", "unknown command /bogus, try /help"),
        ("/new", "usage: /new <name>"),
        ("/model", "usage: /model <name>"),
        ("/rename 3", "usage: /rename <id> <name>"),
        ("/switch abc", "invalid conversation id \"abc\""),
    ];

    for (line, expected) in cases {
        let err = line.parse::<Action>().unwrap_err();
        assert_eq!(err.to_string(), expected, "line: {line:?}");
    }
}

async fn run_session(backend: MockBackend, script: &str) -> (String, ArcStorage) {
    let storage: ArcStorage = Arc::new(Sqlite::new(None).await.unwrap());
    let controller = Controller::new(Arc::clone(&storage), Arc::new(backend)).with_model("llama3.2");

    let mut output = Vec::new();
    let mut repl = Repl::new(controller, script.as_bytes(), &mut output);
    repl.run().await.unwrap();
    drop(repl);

    (String::from_utf8(output).unwrap(), storage)
}

#[tokio::test]
async fn test_run_chat_session() {
    let mut backend = MockBackend::new();
    backend
        .expect_chat()
        .times(1)
        .returning(|_| Box::pin(async { Ok("Hello".to_string()) }));

    let (output, storage) =
        run_session(backend, "/new Demo\nHi\n/history\n/quit\nnever sent\n").await;

    assert!(output.contains("Started conversation 1 Demo"), "{output}");
    assert!(output.contains("#1> Hello\n"), "{output}");
    assert!(output.contains("[user] Hi\n[assistant] Hello\n"), "{output}");

    let stored = storage.list_messages(1).await.unwrap();
    assert_eq!(stored.len(), 2);
}

#[tokio::test]
async fn test_run_reports_errors_and_continues() {
    let mut backend = MockBackend::new();
    backend
        .expect_chat()
        .times(1)
        .returning(|_| Box::pin(async { Err(BackendError::Timeout) }));

    let (output, storage) = run_session(
        backend,
        "Hi\n/bogus\n/new Demo\nHi\n/history\n/switch 42\n",
    )
    .await;

    assert!(output.contains("error: no active conversation"), "{output}");
    assert!(output.contains("error: unknown command /bogus"), "{output}");
    assert!(
        output.contains("error: inference failed: inference request timed out"),
        "{output}"
    );
    assert!(!output.contains("[user] Hi"), "{output}");
    assert!(output.contains("error: conversation 42 not found"), "{output}");
    assert!(storage.list_messages(1).await.unwrap().is_empty());
}

#[tokio::test]
async fn test_run_manages_conversations() {
    let (output, storage) = run_session(
        MockBackend::new(),
        "/list\n/new first\n/new second\n/rename 1 renamed\n/delete 2\n/list\n",
    )
    .await;

    assert!(output.contains("No conversations yet"), "{output}");
    assert!(output.contains("Renamed conversation 1"), "{output}");
    assert!(output.contains("Deleted conversation 2"), "{output}");

    let conversations = storage.list_conversations().await.unwrap();
    assert_eq!(conversations.len(), 1);
    assert_eq!(conversations[0].name(), "renamed");
    assert!(output.contains("  1 renamed ("), "{output}");
}

#[tokio::test]
async fn test_run_system_prompt_and_models() {
    let mut backend = MockBackend::new();
    backend.expect_list_models().times(1).returning(|| {
        Box::pin(async {
            Ok(vec![
                LocalModel::new("llama3.2"),
                LocalModel::new("qwen2.5"),
            ])
        })
    });

    let (output, storage) = run_session(
        backend,
        "/system\n/system \"\"\n/system\n/models\n/model qwen2.5\n",
    )
    .await;

    assert!(output.contains("You are a helpful assistant."), "{output}");
    assert!(output.contains("System prompt is disabled"), "{output}");
    assert!(output.contains("* llama3.2 ("), "{output}");
    assert!(output.contains("  qwen2.5 ("), "{output}");
    assert!(output.contains("Using model qwen2.5"), "{output}");
    assert_eq!(storage.get_setting("system_prompt").await.unwrap(), "");
}

#[tokio::test]
async fn test_run_shows_unsaved_reply() {
    let db = Arc::new(Sqlite::new(None).await.unwrap());
    db.execute_batch(
        r#"CREATE TRIGGER block_message_insert BEFORE INSERT ON chat_messages
        BEGIN SELECT RAISE(ABORT, 'disk full'); END;"#,
    )
    .await
    .unwrap();

    let mut backend = MockBackend::new();
    backend
        .expect_chat()
        .times(1)
        .returning(|_| Box::pin(async { Ok("Hello".to_string()) }));

    let storage: ArcStorage = db.clone();
    let controller = Controller::new(Arc::clone(&storage), Arc::new(backend)).with_model("llama3.2");
    let mut output = Vec::new();
    let mut repl = Repl::new(controller, "/new Demo\nHi\n".as_bytes(), &mut output);
    repl.run().await.unwrap();
    drop(repl);

    let output = String::from_utf8(output).unwrap();
    assert!(output.contains("#1> Hello\nwarning: reply was not saved"), "{output}");
    assert!(storage.list_messages(1).await.unwrap().is_empty());
}
