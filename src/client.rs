//! `CephClient` wires the transport, session, task tracker and executor
//! together and hands out the per-resource operation groups.

use crate::config::{ClientConfig, EngineConfig};
use crate::engine::{OperationExecutor, TaskSource, TaskTracker, TransportTaskSource};
use crate::error::Result;
use crate::logging::Logger;
use crate::operations::{
    BlockOperations, FsOperations, NamespaceOperations, SnapshotOperations, TaskOperations,
};
use crate::session::Session;
use crate::transport::{HttpTransport, TokenSlot, Transport};
use std::sync::{Arc, RwLock};

pub struct CephClientBuilder {
    config: ClientConfig,
    logger: Option<Logger>,
}

impl CephClientBuilder {
    pub fn new(config: ClientConfig) -> Self {
        Self {
            config,
            logger: None,
        }
    }

    pub fn with_logger(mut self, logger: Logger) -> Self {
        self.logger = Some(logger);
        self
    }

    pub fn build(self) -> Result<CephClient> {
        self.config.validate()?;
        let logger = self
            .logger
            .unwrap_or_else(|| Logger::new(self.config.verbose));

        logger.verbose(&format!(
            "Connecting to {}",
            self.config.server.url("")
        ));

        let http = HttpTransport::new(
            self.config.server.clone(),
            self.config.retry.clone(),
            logger.clone(),
        )?;
        let token = http.token_slot();
        let transport: Arc<dyn Transport> = Arc::new(http);
        let source = Arc::new(TransportTaskSource::new(Arc::clone(&transport)));

        Ok(CephClient::from_parts(
            transport,
            source,
            token,
            &self.config.engine,
            logger,
        ))
    }
}

#[derive(Clone)]
pub struct CephClient {
    transport: Arc<dyn Transport>,
    session: Arc<Session>,
    executor: OperationExecutor,
    logger: Logger,
}

impl CephClient {
    pub fn new(config: ClientConfig) -> Result<Self> {
        Self::builder(config).build()
    }

    pub fn builder(config: ClientConfig) -> CephClientBuilder {
        CephClientBuilder::new(config)
    }

    /// Assemble a client over any transport and task source
    pub fn from_parts(
        transport: Arc<dyn Transport>,
        task_source: Arc<dyn TaskSource>,
        token: TokenSlot,
        engine: &EngineConfig,
        logger: Logger,
    ) -> Self {
        let tracker = TaskTracker::new(task_source, engine, logger.clone());
        let executor = OperationExecutor::new(Arc::new(tracker), engine, logger.clone());
        let session = Session::new(Arc::clone(&transport), token, logger.clone());

        Self {
            transport,
            session: Arc::new(session),
            executor,
            logger,
        }
    }

    /// Client over a transport that also serves the task queue
    pub fn with_transport(transport: Arc<dyn Transport>, engine: &EngineConfig, logger: Logger) -> Self {
        let source = Arc::new(TransportTaskSource::new(Arc::clone(&transport)));
        Self::from_parts(transport, source, Arc::new(RwLock::new(None)), engine, logger)
    }

    pub fn transport(&self) -> Arc<dyn Transport> {
        Arc::clone(&self.transport)
    }

    pub fn session(&self) -> &Session {
        &self.session
    }

    pub fn executor(&self) -> &OperationExecutor {
        &self.executor
    }

    pub fn logger(&self) -> &Logger {
        &self.logger
    }

    pub async fn login(&self, username: &str, password: &str) -> Result<u16> {
        self.session.login(username, password).await
    }

    pub async fn logout(&self) -> Result<()> {
        self.session.logout().await
    }

    pub fn block(&self) -> BlockOperations {
        BlockOperations::new(self.transport(), self.executor.clone(), self.logger.clone())
    }

    pub fn snapshot(&self) -> SnapshotOperations {
        SnapshotOperations::new(self.transport(), self.executor.clone(), self.logger.clone())
    }

    pub fn namespace(&self) -> NamespaceOperations {
        NamespaceOperations::new(self.transport(), self.executor.clone(), self.logger.clone())
    }

    pub fn fs(&self) -> FsOperations {
        FsOperations::new(self.transport(), self.logger.clone())
    }

    pub fn tasks(&self) -> TaskOperations {
        TaskOperations::new(self.transport())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ServerConfig;

    #[test]
    fn test_builder_rejects_invalid_config() {
        let config = ClientConfig::new(ServerConfig::new("ceph").with_protocol("ftp"));
        assert!(CephClient::new(config).is_err());

        let config = ClientConfig::new(ServerConfig::new("ceph"))
            .with_engine(EngineConfig::default().with_max_attempts(0));
        assert!(CephClient::new(config).is_err());
    }

    #[test]
    fn test_builder_uses_engine_config() {
        let config = ClientConfig::new(ServerConfig::new("ceph").with_skip_tls(true))
            .with_engine(EngineConfig::default().with_max_attempts(7));
        let client = CephClient::builder(config)
            .with_logger(Logger::new_quiet())
            .build()
            .unwrap();
        assert_eq!(client.executor().max_attempts(), 7);
        assert!(!client.session().is_logged_in());
    }
}
