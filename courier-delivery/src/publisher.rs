use std::sync::Arc;

use courier_common::{DeliveryTask, NotificationId};

use crate::{error::TransportError, transport::Transport};

/// Puts delivery tasks on the transport.
#[derive(Debug, Clone)]
pub struct DispatchPublisher {
    transport: Arc<dyn Transport>,
}

impl DispatchPublisher {
    #[must_use]
    pub fn new(transport: Arc<dyn Transport>) -> Self {
        Self { transport }
    }

    /// # Errors
    /// When the transport refuses the task.
    pub async fn publish(&self, task: DeliveryTask) -> Result<(), TransportError> {
        self.transport.publish(task).await
    }

    /// Publish the first task for a notification.
    ///
    /// # Errors
    /// When the transport refuses the task.
    pub async fn publish_new(&self, id: NotificationId) -> Result<DeliveryTask, TransportError> {
        let task = DeliveryTask::new(id);
        self.publish(task.clone()).await?;
        Ok(task)
    }

    /// Publish the successor of `task`, keeping its correlation id.
    ///
    /// # Errors
    /// When the transport refuses the task.
    pub async fn publish_retry(&self, task: &DeliveryTask) -> Result<DeliveryTask, TransportError> {
        let next = task.for_retry();
        self.publish(next.clone()).await?;
        Ok(next)
    }
}
