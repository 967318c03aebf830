// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

//! Startup state machine.
//!
//! Run once before the broker accepts real traffic: export the service,
//! wait for the export to resolve, register the discovery name, and only
//! then report running. The wait is cooperative: the sequencer awaits the
//! next lifecycle event rather than spinning, so other tasks keep making
//! progress while the export is pending.

use std::fmt;
use std::sync::Arc;

use tokio::sync::mpsc;

use crate::config::BrokerConfig;
use crate::errors::{DirectoryError, StartupError};
use crate::observability::messages::lifecycle::{
    NameRegistered, ServiceExported, StartupStateChanged,
};
use crate::observability::messages::StructuredLog;
use crate::protocol::ServiceEndpoint;
use crate::traits::ServiceDirectory;

/// States of the one-shot startup sequence. `Running` is terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ServiceState {
    Exporting,
    ExportOk,
    ExportFail,
    NameRegistering,
    NameRegisterOk,
    NameRegisterFail,
    Running,
}

impl ServiceState {
    pub fn is_failure(&self) -> bool {
        matches!(self, ServiceState::ExportFail | ServiceState::NameRegisterFail)
    }
}

impl fmt::Display for ServiceState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ServiceState::Exporting => "exporting",
            ServiceState::ExportOk => "export_ok",
            ServiceState::ExportFail => "export_fail",
            ServiceState::NameRegistering => "name_registering",
            ServiceState::NameRegisterOk => "name_register_ok",
            ServiceState::NameRegisterFail => "name_register_fail",
            ServiceState::Running => "running",
        };
        f.write_str(name)
    }
}

/// Events that resolve the asynchronous parts of startup.
#[derive(Debug)]
pub enum LifecycleEvent {
    ExportResolved(Result<ServiceEndpoint, DirectoryError>),
}

/// Owns the startup state and drives the export / name-register sequence.
pub struct StartupSequencer {
    directory: Arc<dyn ServiceDirectory>,
    state: ServiceState,
}

impl StartupSequencer {
    pub fn new(directory: Arc<dyn ServiceDirectory>) -> Self {
        Self {
            directory,
            state: ServiceState::Exporting,
        }
    }

    pub fn state(&self) -> ServiceState {
        self.state
    }

    fn set_state(&mut self, next: ServiceState) {
        StartupStateChanged {
            from: self.state,
            to: next,
        }
        .log();
        self.state = next;
    }

    /// Run the startup sequence to completion. Returns the exported
    /// endpoint once the service is running.
    pub async fn run(&mut self, config: &BrokerConfig) -> Result<ServiceEndpoint, StartupError> {
        let (events_tx, mut events_rx) = mpsc::unbounded_channel();
        self.directory.begin_export(events_tx);

        // Cooperative wait: yield to the event channel until the export
        // resolves, one way or the other.
        let endpoint = match events_rx.recv().await {
            Some(LifecycleEvent::ExportResolved(Ok(endpoint))) => {
                self.set_state(ServiceState::ExportOk);
                endpoint
            }
            Some(LifecycleEvent::ExportResolved(Err(err))) => {
                self.set_state(ServiceState::ExportFail);
                return Err(StartupError::ExportFailed(err));
            }
            None => {
                self.set_state(ServiceState::ExportFail);
                return Err(StartupError::ExportFailed(DirectoryError::ChannelClosed));
            }
        };
        ServiceExported { endpoint }.log();

        self.set_state(ServiceState::NameRegistering);
        let name = config.registered_name();
        if let Err(err) = self.directory.register_name(&name, endpoint).await {
            // The export stays claimed; nothing rolls it back here.
            self.set_state(ServiceState::NameRegisterFail);
            return Err(StartupError::NameRegisterFailed(err));
        }
        self.set_state(ServiceState::NameRegisterOk);
        NameRegistered {
            name: &name,
            endpoint,
        }
        .log();

        self.set_state(ServiceState::Running);
        Ok(endpoint)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backends::LoopbackDirectory;

    fn config() -> BrokerConfig {
        BrokerConfig::default()
    }

    #[tokio::test]
    async fn healthy_directory_reaches_running() {
        let directory = Arc::new(LoopbackDirectory::healthy());
        let mut sequencer = StartupSequencer::new(Arc::clone(&directory) as Arc<dyn ServiceDirectory>);

        let endpoint = sequencer.run(&config()).await.unwrap();
        assert_eq!(sequencer.state(), ServiceState::Running);
        assert_eq!(directory.registered(), vec!["xeon_phi_dma.0".to_string()]);
        assert_eq!(endpoint, ServiceEndpoint(1));
    }

    #[tokio::test]
    async fn export_failure_aborts_before_name_registration() {
        let directory = Arc::new(LoopbackDirectory::export_fails());
        let mut sequencer = StartupSequencer::new(Arc::clone(&directory) as Arc<dyn ServiceDirectory>);

        let err = sequencer.run(&config()).await.unwrap_err();
        assert!(matches!(err, StartupError::ExportFailed(_)));
        assert_eq!(sequencer.state(), ServiceState::ExportFail);
        assert!(directory.registered().is_empty());
    }

    #[tokio::test]
    async fn name_registration_failure_never_reaches_running() {
        let directory = Arc::new(LoopbackDirectory::registration_fails());
        let mut sequencer = StartupSequencer::new(Arc::clone(&directory) as Arc<dyn ServiceDirectory>);

        let err = sequencer.run(&config()).await.unwrap_err();
        assert!(matches!(err, StartupError::NameRegisterFailed(_)));
        assert_eq!(sequencer.state(), ServiceState::NameRegisterFail);
    }

    #[tokio::test]
    async fn dropped_directory_channel_counts_as_export_failure() {
        struct SilentDirectory;

        #[async_trait::async_trait]
        impl ServiceDirectory for SilentDirectory {
            fn begin_export(&self, events: mpsc::UnboundedSender<LifecycleEvent>) {
                drop(events);
            }

            async fn register_name(
                &self,
                _name: &str,
                _endpoint: ServiceEndpoint,
            ) -> Result<(), DirectoryError> {
                Ok(())
            }
        }

        let mut sequencer = StartupSequencer::new(Arc::new(SilentDirectory));
        let err = sequencer.run(&config()).await.unwrap_err();
        assert_eq!(
            err,
            StartupError::ExportFailed(DirectoryError::ChannelClosed)
        );
        assert_eq!(sequencer.state(), ServiceState::ExportFail);
    }
}
