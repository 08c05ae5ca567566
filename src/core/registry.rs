use crate::config::catalog::{Catalog, OperationDefinition, ServiceDefinition};
use crate::core::client::ServiceClient;
use crate::core::transport::ReqwestTransport;
use crate::core::webhook::WebhookVerifier;
use crate::domain::model::{ApiResponse, Record};
use crate::domain::ports::Transport;
use crate::utils::error::Result;
use serde_json::{Map, Value};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};

/// Entry point for every skill: resolves services by name and builds their
/// clients on first use. Clients share one transport.
pub struct SkillRegistry {
    catalog: Catalog,
    transport: Arc<dyn Transport>,
    clients: Mutex<HashMap<String, Arc<ServiceClient>>>,
}

impl SkillRegistry {
    pub fn new(catalog: Catalog, transport: Arc<dyn Transport>) -> Self {
        Self {
            catalog,
            transport,
            clients: Mutex::new(HashMap::new()),
        }
    }

    /// Registry over `catalog` using the production HTTP transport.
    pub fn with_default_transport(catalog: Catalog) -> Result<Self> {
        Ok(Self::new(catalog, Arc::new(ReqwestTransport::new()?)))
    }

    pub fn catalog(&self) -> &Catalog {
        &self.catalog
    }

    pub fn services(&self) -> &[ServiceDefinition] {
        &self.catalog.services
    }

    pub fn operations(&self, service: &str) -> Result<&[OperationDefinition]> {
        Ok(&self.catalog.service(service)?.operations)
    }

    /// Cached client for `service`. Credentials are checked here, so a
    /// service with unset secrets fails only when it is used.
    pub fn client(&self, service: &str) -> Result<Arc<ServiceClient>> {
        let mut clients = self
            .clients
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        if let Some(client) = clients.get(service) {
            return Ok(Arc::clone(client));
        }

        // 第一次使用時才建立 client
        let definition = self.catalog.service(service)?.clone();
        let client = Arc::new(ServiceClient::new(definition, Arc::clone(&self.transport))?);
        clients.insert(service.to_string(), Arc::clone(&client));
        Ok(client)
    }

    pub async fn call(
        &self,
        service: &str,
        operation: &str,
        params: &Map<String, Value>,
    ) -> Result<ApiResponse> {
        self.client(service)?.call(operation, params).await
    }

    pub async fn call_records(
        &self,
        service: &str,
        operation: &str,
        params: &Map<String, Value>,
    ) -> Result<Vec<Record>> {
        self.client(service)?.call_records(operation, params).await
    }

    pub fn webhook_verifier(&self, service: &str) -> Result<WebhookVerifier> {
        self.client(service)?.webhook_verifier()
    }
}
