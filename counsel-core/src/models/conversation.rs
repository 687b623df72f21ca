use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
}

/// A message as forwarded to the chat-completions API.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: Role,
    pub content: String,
}

impl ChatMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: Role::System,
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            content: content.into(),
        }
    }
}

/// Convert the chat front end's `{id, sender, content, timestamp}` history into
/// LLM messages, preserving order.
///
/// Entries that are not objects, or lack `sender` or `content`, are skipped.
/// `sender == "user"` maps to [`Role::User`]; any other sender is the assistant.
pub fn history_to_messages(history: &[Value]) -> Vec<ChatMessage> {
    history
        .iter()
        .filter_map(|entry| {
            let obj = entry.as_object()?;
            let sender = obj.get("sender")?;
            let content = value_to_text(obj.get("content")?);
            if sender.as_str() == Some("user") {
                Some(ChatMessage::user(content))
            } else {
                Some(ChatMessage::assistant(content))
            }
        })
        .collect()
}

/// Render a JSON value as message text: strings verbatim, null as empty,
/// anything else as compact JSON.
pub fn value_to_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Null => String::new(),
        other => other.to_string(),
    }
}

fn lenient_text<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Value::deserialize(deserializer)?;
    Ok(value_to_text(&value))
}

/// History entry posted to `/examples`.
///
/// Missing, null, or non-string fields are accepted and rendered as text.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExampleHistoryEntry {
    #[serde(deserialize_with = "lenient_text")]
    pub role: String,
    #[serde(deserialize_with = "lenient_text")]
    pub content: String,
}

/// Flatten a history into the `role: content` text blob that gets embedded.
pub fn format_example_history(history: &[ExampleHistoryEntry]) -> String {
    let mut formatted = String::new();
    for entry in history {
        formatted.push_str(&entry.role);
        formatted.push_str(": ");
        formatted.push_str(&entry.content);
        formatted.push('\n');
    }
    formatted.trim().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_history_roles_follow_sender_and_keep_order() {
        let history = vec![
            json!({"id": 1, "sender": "user", "content": "first", "timestamp": "t1"}),
            json!({"id": 2, "sender": "ai", "content": "second"}),
            json!({"id": 3, "sender": "counselor", "content": "third"}),
            json!({"id": 4, "sender": "user", "content": "fourth"}),
        ];

        let messages = history_to_messages(&history);
        assert_eq!(
            messages,
            vec![
                ChatMessage::user("first"),
                ChatMessage::assistant("second"),
                ChatMessage::assistant("third"),
                ChatMessage::user("fourth"),
            ]
        );
    }

    #[test]
    fn test_history_skips_malformed_entries() {
        let history = vec![
            json!("just a string"),
            json!({"sender": "user"}),
            json!({"content": "no sender"}),
            json!({"sender": "user", "content": "kept"}),
        ];

        let messages = history_to_messages(&history);
        assert_eq!(messages, vec![ChatMessage::user("kept")]);
    }

    #[test]
    fn test_role_serializes_lowercase() {
        let value = serde_json::to_value(ChatMessage::assistant("x")).unwrap();
        assert_eq!(value, json!({"role": "assistant", "content": "x"}));
    }

    #[test]
    fn test_format_example_history() {
        let history = vec![
            ExampleHistoryEntry {
                role: "user".to_string(),
                content: "I can't sleep".to_string(),
            },
            ExampleHistoryEntry {
                role: "assistant".to_string(),
                content: "How long has this been going on?".to_string(),
            },
        ];

        assert_eq!(
            format_example_history(&history),
            "user: I can't sleep\nassistant: How long has this been going on?"
        );
    }

    #[test]
    fn test_format_example_history_defaults_missing_fields() {
        let history: Vec<ExampleHistoryEntry> =
            serde_json::from_value(json!([{"content": "hello"}, {}])).unwrap();
        assert_eq!(format_example_history(&history), ": hello\n:");
        assert_eq!(format_example_history(&[]), "");
    }

    #[test]
    fn test_example_history_accepts_null_and_non_string_fields() {
        let history: Vec<ExampleHistoryEntry> = serde_json::from_value(json!([
            {"role": "user", "content": null},
            {"role": null, "content": 42},
            {"role": "assistant", "content": {"text": "hi"}},
        ]))
        .unwrap();

        assert_eq!(history[0].content, "");
        assert_eq!(history[1].role, "");
        assert_eq!(history[1].content, "42");
        assert_eq!(
            format_example_history(&history),
            "user: \n: 42\nassistant: {\"text\":\"hi\"}"
        );
    }
}
