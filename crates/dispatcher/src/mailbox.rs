use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, info};

use scheduler_core::{
    models::{ClientId, ClientMessage},
    sync::{BlockingQueue, RwLock},
    SchedulerError, SchedulerResult,
};

/// 客户端消息邮箱
///
/// 每个已注册客户端一个阻塞队列。投递尽力而为，读取时最多等待调用方给出的
/// 超时，然后取走当前全部消息；超时无消息返回空列表而不是错误。
#[derive(Default)]
pub struct Mailbox {
    clients: RwLock<HashMap<ClientId, Arc<BlockingQueue<ClientMessage>>>>,
}

impl Mailbox {
    pub fn new() -> Self {
        Self::default()
    }

    /// 注册客户端，已注册时保留原队列
    pub fn register_client(&self, client_id: &str) {
        self.clients.with_write_lock(|clients| {
            clients
                .entry(client_id.to_string())
                .or_insert_with(|| Arc::new(BlockingQueue::new()));
        });
        info!("客户端已注册: {}", client_id);
    }

    pub fn unregister_client(&self, client_id: &str) -> SchedulerResult<()> {
        self.clients
            .with_write_lock(|clients| clients.remove(client_id))
            .map(|_| info!("客户端已注销: {}", client_id))
            .ok_or_else(|| SchedulerError::client_not_found(client_id))
    }

    pub fn push_message(&self, client_id: &str, message: ClientMessage) -> SchedulerResult<()> {
        self.queue(client_id)?.push(message);
        Ok(())
    }

    pub fn get_messages(
        &self,
        client_id: &str,
        timeout: Duration,
    ) -> SchedulerResult<Vec<ClientMessage>> {
        let messages = self.queue(client_id)?.drain_timeout(timeout);
        if messages.is_empty() {
            debug!("客户端 {} 在 {:?} 内没有新消息", client_id, timeout);
        }
        Ok(messages)
    }

    pub fn is_registered(&self, client_id: &str) -> bool {
        self.clients
            .with_read_lock(|clients| clients.contains_key(client_id))
    }

    fn queue(&self, client_id: &str) -> SchedulerResult<Arc<BlockingQueue<ClientMessage>>> {
        self.clients
            .with_read_lock(|clients| clients.get(client_id).cloned())
            .ok_or_else(|| SchedulerError::client_not_found(client_id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;
    use std::time::Instant;

    fn completed(job_id: &str) -> ClientMessage {
        ClientMessage::JobCompleted {
            job_id: job_id.to_string(),
        }
    }

    #[test]
    fn test_batched_delivery() {
        let mailbox = Mailbox::new();
        mailbox.register_client("c1");
        mailbox.push_message("c1", completed("a")).unwrap();
        mailbox.push_message("c1", completed("b")).unwrap();

        let messages = mailbox
            .get_messages("c1", Duration::from_millis(10))
            .unwrap();
        assert_eq!(messages, vec![completed("a"), completed("b")]);
    }

    #[test]
    fn test_timeout_returns_empty() {
        let mailbox = Mailbox::new();
        mailbox.register_client("c1");
        let started = Instant::now();
        let messages = mailbox
            .get_messages("c1", Duration::from_millis(50))
            .unwrap();
        assert!(messages.is_empty());
        assert!(started.elapsed() >= Duration::from_millis(50));
    }

    #[test]
    fn test_waiting_reader_woken_by_push() {
        let mailbox = Arc::new(Mailbox::new());
        mailbox.register_client("c1");
        let reader = {
            let mailbox = Arc::clone(&mailbox);
            thread::spawn(move || mailbox.get_messages("c1", Duration::from_secs(5)).unwrap())
        };
        thread::sleep(Duration::from_millis(20));
        mailbox.push_message("c1", completed("a")).unwrap();
        assert_eq!(reader.join().unwrap(), vec![completed("a")]);
    }

    #[test]
    fn test_unknown_client() {
        let mailbox = Mailbox::new();
        assert!(matches!(
            mailbox.push_message("ghost", completed("a")),
            Err(SchedulerError::ClientNotFound { .. })
        ));
        assert!(mailbox.unregister_client("ghost").is_err());

        mailbox.register_client("c1");
        mailbox.register_client("c1");
        mailbox.unregister_client("c1").unwrap();
        assert!(!mailbox.is_registered("c1"));
    }
}
