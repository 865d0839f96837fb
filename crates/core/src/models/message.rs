use serde::{Deserialize, Serialize};

use super::JobId;

pub type ClientId = String;

/// 推送到客户端邮箱的消息
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientMessage {
    JobSubmitted { job_id: JobId },
    JobCompleted { job_id: JobId },
    Notice { payload: serde_json::Value },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_message_tagging() {
        let message = ClientMessage::JobCompleted {
            job_id: "job-1".to_string(),
        };
        let json = serde_json::to_value(&message).unwrap();
        assert_eq!(json["type"], "job_completed");
        assert_eq!(json["job_id"], "job-1");

        let parsed: ClientMessage =
            serde_json::from_value(serde_json::json!({"type": "notice", "payload": {"k": 1}}))
                .unwrap();
        assert!(matches!(parsed, ClientMessage::Notice { .. }));
    }
}
