use std::sync::Arc;

use async_trait::async_trait;
use log::{error, info};
use ndnd_fw::mgmt::Management;
use ndnd_fw::Forwarder;
use tokio::sync::{Mutex, RwLock};

use crate::config::Config;
use crate::service::Service;

/// The forwarding plane wrapped in the daemon's service lifecycle
pub struct ForwarderService {
    forwarder: Arc<Mutex<Forwarder>>,
    running: Arc<RwLock<bool>>,
}

impl ForwarderService {
    pub fn new(forwarder: Forwarder) -> Self {
        Self {
            forwarder: Arc::new(Mutex::new(forwarder)),
            running: Arc::new(RwLock::new(false)),
        }
    }
}

#[async_trait]
impl Service for ForwarderService {
    fn name(&self) -> &str {
        "forwarder"
    }

    fn is_running(&self) -> bool {
        futures::executor::block_on(async { *self.running.read().await })
    }

    async fn start(&self) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
        info!("Starting forwarder service");
        self.forwarder.lock().await.start()?;
        *self.running.write().await = true;
        Ok(())
    }

    async fn stop(&self) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
        info!("Stopping forwarder service");
        self.forwarder.lock().await.shutdown().await?;
        *self.running.write().await = false;
        Ok(())
    }
}

pub struct Daemon {
    config: Config,
    service: Option<ForwarderService>,
    management: Option<Arc<Management>>,
}

impl Daemon {
    pub fn new(config: Config) -> Self {
        Self {
            config,
            service: None,
            management: None,
        }
    }

    pub async fn start(&mut self) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
        info!("Starting ndnd daemon services");

        ndnd_core::init();
        ndnd_fw::init();

        let forwarder = Forwarder::new(self.config.forwarding.to_forwarder_config());
        let management = forwarder.management();
        let service = ForwarderService::new(forwarder);

        if let Err(e) = service.start().await {
            error!("Failed to start forwarder: {}", e);
            return Err(e);
        }

        self.management = Some(management);
        self.service = Some(service);

        info!("All services started successfully");
        Ok(())
    }

    pub async fn stop(&mut self) {
        info!("Stopping ndnd daemon services");

        if let Some(ref service) = self.service {
            if let Err(e) = service.stop().await {
                error!("Failed to stop forwarder: {}", e);
            }
        }
        self.service = None;
        self.management = None;

        info!("All services stopped");
    }

    /// Management entry point for control operations, once started
    pub fn management(&self) -> Option<Arc<Management>> {
        self.management.clone()
    }

    pub fn is_running(&self) -> bool {
        self.service
            .as_ref()
            .map(|service| service.is_running())
            .unwrap_or(false)
    }
}
