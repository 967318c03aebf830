use async_trait::async_trait;
use tokio::sync::mpsc;

use crate::errors::DirectoryError;
use crate::lifecycle::LifecycleEvent;
use crate::protocol::ServiceEndpoint;

/// Export and name-registration primitives, used only during startup.
#[async_trait]
pub trait ServiceDirectory: Send + Sync {
    /// Kick off the service export. The result arrives asynchronously as a
    /// [`LifecycleEvent::ExportResolved`] on `events`.
    fn begin_export(&self, events: mpsc::UnboundedSender<LifecycleEvent>);

    /// Bind `name` to the exported endpoint so clients can discover it.
    async fn register_name(
        &self,
        name: &str,
        endpoint: ServiceEndpoint,
    ) -> Result<(), DirectoryError>;
}
