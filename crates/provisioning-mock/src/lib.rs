//! Mock implementation of the provisioning client for testing purposes.
//!
//! Holds services, their allowlists, configuration objects and catalogs in
//! memory, records every
//! call it receives, and can be scripted to report specific status sequences or
//! to fail individual calls.
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]

mod call;
mod error;

pub use call::{Call, FailurePoint};
pub use error::Error;

use std::collections::{BTreeMap, HashMap, VecDeque};
use std::sync::Arc;

use async_trait::async_trait;
use dps_provisioning::{
    AddAllowedAddressRequest, AllowlistEntry, AllowlistStatus, Config, ConfigKey,
    CreateConfigRequest, CreateServiceRequest, DefaultCredentials, ProvisioningClient, Service,
    ServiceStatus, StorageVolume, UpdateConfigRequest, UpdateServiceRequest,
};
use parking_lot::Mutex;

/// One scripted answer to `get_service`.
#[derive(Clone, Debug)]
pub enum ServiceRead {
    /// Report the service with this status (and keep it).
    Status(ServiceStatus),

    /// Report the service as absent (and forget it).
    Absent,

    /// Fail the read with this error.
    Fail(Error),
}

#[derive(Debug)]
struct ServiceEntry {
    service: Service,
    reads_until_settled: u32,
}

#[derive(Debug)]
struct AllowlistSlot {
    entry: AllowlistEntry,
    reads_until_enforcing: u32,
}

#[derive(Debug, Default)]
struct State {
    allowlists: HashMap<String, Vec<AllowlistSlot>>,
    calls: Vec<Call>,
    catalogs: HashMap<(String, String), Vec<ConfigKey>>,
    configs: HashMap<String, Config>,
    credentials: HashMap<String, DefaultCredentials>,
    failures: HashMap<FailurePoint, VecDeque<Error>>,
    next_id: u64,
    scripts: HashMap<String, VecDeque<ServiceRead>>,
    services: HashMap<String, ServiceEntry>,
    settle_reads: u32,
    values: HashMap<String, BTreeMap<String, String>>,
}

impl State {
    fn record(&mut self, call: Call) -> Result<(), Error> {
        let point = call.failure_point();
        self.calls.push(call);

        match self.failures.get_mut(&point).and_then(VecDeque::pop_front) {
            Some(error) => Err(error),
            None => Ok(()),
        }
    }

    fn next_id(&mut self, prefix: &str) -> String {
        self.next_id += 1;
        format!("{prefix}-{}", self.next_id)
    }

    fn forget_service(&mut self, service_id: &str) {
        self.services.remove(service_id);
        self.allowlists.remove(service_id);
        self.credentials.remove(service_id);
    }

    fn require_service(&self, service_id: &str) -> Result<(), Error> {
        if self.services.contains_key(service_id) {
            Ok(())
        } else {
            Err(Error::NotFound(format!("service {service_id}")))
        }
    }

    fn begin_transition(&mut self, service_id: &str, status: ServiceStatus) -> Result<(), Error> {
        let settle_reads = self.settle_reads;
        let entry = self
            .services
            .get_mut(service_id)
            .ok_or_else(|| Error::NotFound(format!("service {service_id}")))?;
        entry.service.status = status;
        entry.reads_until_settled = settle_reads;
        Ok(())
    }
}

/// Mock implementation of [`ProvisioningClient`].
///
/// Every mutation puts the affected service into the matching pending status;
/// after a configurable number of reads (one by default) the service settles
/// into `ready`, or disappears for a deletion. Scripted reads take precedence.
/// Clones share state.
#[derive(Clone, Debug)]
pub struct MockProvisioningClient {
    state: Arc<Mutex<State>>,
}

impl Default for MockProvisioningClient {
    fn default() -> Self {
        Self::new()
    }
}

impl MockProvisioningClient {
    /// Create an empty mock.
    #[must_use]
    pub fn new() -> Self {
        Self {
            state: Arc::new(Mutex::new(State {
                settle_reads: 1,
                ..State::default()
            })),
        }
    }

    /// Number of reads a pending service needs before it settles.
    #[must_use]
    pub fn with_settle_reads(self, reads: u32) -> Self {
        self.state.lock().settle_reads = reads;
        self
    }

    /// Seed a service, keyed by its id.
    pub fn insert_service(&self, service: Service) {
        self.state.lock().services.insert(
            service.id.clone(),
            ServiceEntry {
                service,
                reads_until_settled: 0,
            },
        );
    }

    /// Current state of a service, without recording a call.
    #[must_use]
    pub fn service(&self, service_id: &str) -> Option<Service> {
        self.state
            .lock()
            .services
            .get(service_id)
            .map(|entry| entry.service.clone())
    }

    /// Queue scripted answers for subsequent reads of a service.
    pub fn script_service_reads<I>(&self, service_id: &str, reads: I)
    where
        I: IntoIterator<Item = ServiceRead>,
    {
        self.state
            .lock()
            .scripts
            .entry(service_id.to_string())
            .or_default()
            .extend(reads);
    }

    /// Replace the default credentials reported for a service.
    pub fn set_credentials(&self, service_id: &str, credentials: DefaultCredentials) {
        self.state
            .lock()
            .credentials
            .insert(service_id.to_string(), credentials);
    }

    /// Addresses currently allowed on a service, without recording a call.
    #[must_use]
    pub fn allowed_addresses(&self, service_id: &str) -> Vec<AllowlistEntry> {
        self.state
            .lock()
            .allowlists
            .get(service_id)
            .map(|slots| slots.iter().map(|slot| slot.entry.clone()).collect())
            .unwrap_or_default()
    }

    /// Seed a configuration object, keyed by its id.
    pub fn insert_config(&self, config: Config) {
        self.state.lock().configs.insert(config.id.clone(), config);
    }

    /// Current state of a configuration object, without recording a call.
    #[must_use]
    pub fn config(&self, config_id: &str) -> Option<Config> {
        self.state.lock().configs.get(config_id).cloned()
    }

    /// Values currently set on a configuration object.
    #[must_use]
    pub fn config_values(&self, config_id: &str) -> BTreeMap<String, String> {
        self.state
            .lock()
            .values
            .get(config_id)
            .cloned()
            .unwrap_or_default()
    }

    /// Install the parameter catalog for a topology/version pair.
    pub fn set_catalog(&self, topology: &str, version: &str, keys: Vec<ConfigKey>) {
        self.state
            .lock()
            .catalogs
            .insert((topology.to_string(), version.to_string()), keys);
    }

    /// Fail the next call matching `point` with `error`. Failures queue up per
    /// point and are consumed one per call.
    pub fn fail_next(&self, point: FailurePoint, error: Error) {
        self.state
            .lock()
            .failures
            .entry(point)
            .or_default()
            .push_back(error);
    }

    /// Every call received so far.
    #[must_use]
    pub fn calls(&self) -> Vec<Call> {
        self.state.lock().calls.clone()
    }

    /// Every state-changing call received so far.
    #[must_use]
    pub fn mutations(&self) -> Vec<Call> {
        self.state
            .lock()
            .calls
            .iter()
            .filter(|call| call.is_mutation())
            .cloned()
            .collect()
    }

    /// Number of recorded calls matching the predicate.
    pub fn count_calls(&self, predicate: impl Fn(&Call) -> bool) -> usize {
        self.state
            .lock()
            .calls
            .iter()
            .filter(|call| predicate(call))
            .count()
    }

    /// Forget recorded calls.
    pub fn clear_calls(&self) {
        self.state.lock().calls.clear();
    }
}

#[async_trait]
impl ProvisioningClient for MockProvisioningClient {
    type Error = Error;

    async fn create_service(&self, request: &CreateServiceRequest) -> Result<Service, Error> {
        let mut state = self.state.lock();
        state.record(Call::CreateService {
            name: request.name.clone(),
        })?;

        let id = state.next_id("svc");
        let service = Service {
            id: id.clone(),
            name: request.name.clone(),
            project_id: request.project_id.clone().unwrap_or_default(),
            service_type: request.service_type.clone(),
            provider: request.provider.clone(),
            region: request.region.clone(),
            architecture: request.architecture.clone().unwrap_or_default(),
            topology: request.topology.clone(),
            version: request.version.clone().unwrap_or_default(),
            size: request.size.clone(),
            nodes: request.nodes.unwrap_or(1),
            ssl_enabled: request.ssl_enabled.unwrap_or(true),
            status: ServiceStatus::PendingCreate,
            storage_volume: StorageVolume {
                size: request.storage,
                volume_type: request.volume_type.clone().unwrap_or_default(),
                iops: request.volume_iops.unwrap_or_default(),
                throughput: request.volume_throughput.unwrap_or_default(),
            },
            is_active: true,
            ..Service::default()
        };

        let settle_reads = state.settle_reads;
        state.credentials.insert(
            id.clone(),
            DefaultCredentials {
                username: format!("db{}", id.replace('-', "")),
                password: format!("generated-{id}"),
            },
        );
        state.services.insert(
            id,
            ServiceEntry {
                service: service.clone(),
                reads_until_settled: settle_reads,
            },
        );

        Ok(service)
    }

    async fn get_service(&self, service_id: &str) -> Result<Service, Error> {
        let mut state = self.state.lock();
        state.record(Call::GetService {
            service_id: service_id.to_string(),
        })?;

        let scripted = state
            .scripts
            .get_mut(service_id)
            .and_then(VecDeque::pop_front);

        match scripted {
            Some(ServiceRead::Fail(error)) => return Err(error),
            Some(ServiceRead::Absent) => {
                state.forget_service(service_id);
                return Err(Error::NotFound(format!("service {service_id}")));
            }
            Some(ServiceRead::Status(status)) => {
                let entry = state
                    .services
                    .get_mut(service_id)
                    .ok_or_else(|| Error::NotFound(format!("service {service_id}")))?;
                entry.service.status = status;
                entry.reads_until_settled = 0;
                return Ok(entry.service.clone());
            }
            None => {}
        }

        let entry = state
            .services
            .get_mut(service_id)
            .ok_or_else(|| Error::NotFound(format!("service {service_id}")))?;

        if entry.service.status.is_pending() && entry.reads_until_settled > 0 {
            entry.reads_until_settled -= 1;
            if entry.reads_until_settled == 0 {
                if entry.service.status == ServiceStatus::PendingDelete {
                    state.forget_service(service_id);
                    return Err(Error::NotFound(format!("service {service_id}")));
                }
                entry.service.status = ServiceStatus::Ready;
            }
        }

        Ok(entry.service.clone())
    }

    async fn update_service(
        &self,
        service_id: &str,
        request: &UpdateServiceRequest,
    ) -> Result<Service, Error> {
        let mut state = self.state.lock();
        state.record(Call::UpdateService {
            service_id: service_id.to_string(),
            request: request.clone(),
        })?;

        state.begin_transition(service_id, ServiceStatus::PendingUpdate)?;
        let entry = state
            .services
            .get_mut(service_id)
            .ok_or_else(|| Error::NotFound(format!("service {service_id}")))?;

        let service = &mut entry.service;
        if let Some(nodes) = request.nodes {
            service.nodes = nodes;
        }
        if let Some(storage) = request.storage {
            service.storage_volume.size = storage;
        }
        if let Some(volume_type) = &request.volume_type {
            service.storage_volume.volume_type.clone_from(volume_type);
        }
        if let Some(iops) = request.volume_iops {
            service.storage_volume.iops = iops;
        }
        if let Some(throughput) = request.volume_throughput {
            service.storage_volume.throughput = throughput;
        }

        Ok(service.clone())
    }

    async fn delete_service(&self, service_id: &str) -> Result<(), Error> {
        let mut state = self.state.lock();
        state.record(Call::DeleteService {
            service_id: service_id.to_string(),
        })?;

        state.begin_transition(service_id, ServiceStatus::PendingDelete)
    }

    async fn apply_service_config(&self, service_id: &str, config_id: &str) -> Result<(), Error> {
        let mut state = self.state.lock();
        state.record(Call::ApplyServiceConfig {
            service_id: service_id.to_string(),
            config_id: config_id.to_string(),
        })?;

        state.begin_transition(service_id, ServiceStatus::PendingUpdate)?;
        if let Some(entry) = state.services.get_mut(service_id) {
            entry.service.config_id = Some(config_id.to_string());
        }
        Ok(())
    }

    async fn remove_service_config(&self, service_id: &str) -> Result<(), Error> {
        let mut state = self.state.lock();
        state.record(Call::RemoveServiceConfig {
            service_id: service_id.to_string(),
        })?;

        state.begin_transition(service_id, ServiceStatus::PendingUpdate)?;
        if let Some(entry) = state.services.get_mut(service_id) {
            entry.service.config_id = None;
        }
        Ok(())
    }

    async fn get_default_credentials(&self, service_id: &str) -> Result<DefaultCredentials, Error> {
        let mut state = self.state.lock();
        state.record(Call::GetDefaultCredentials {
            service_id: service_id.to_string(),
        })?;

        state.require_service(service_id)?;
        Ok(state
            .credentials
            .get(service_id)
            .cloned()
            .unwrap_or_default())
    }

    async fn list_allowed_addresses(&self, service_id: &str) -> Result<Vec<AllowlistEntry>, Error> {
        let mut state = self.state.lock();
        state.record(Call::ListAllowedAddresses {
            service_id: service_id.to_string(),
        })?;

        state.require_service(service_id)?;
        let Some(slots) = state.allowlists.get_mut(service_id) else {
            return Ok(Vec::new());
        };

        for slot in slots.iter_mut() {
            if slot.entry.status == AllowlistStatus::Pending && slot.reads_until_enforcing > 0 {
                slot.reads_until_enforcing -= 1;
                if slot.reads_until_enforcing == 0 {
                    slot.entry.status = AllowlistStatus::Enforcing;
                }
            }
        }

        Ok(slots.iter().map(|slot| slot.entry.clone()).collect())
    }

    async fn add_allowed_address(
        &self,
        service_id: &str,
        request: &AddAllowedAddressRequest,
    ) -> Result<AllowlistEntry, Error> {
        let mut state = self.state.lock();
        state.record(Call::AddAllowedAddress {
            service_id: service_id.to_string(),
            ip_address: request.ip_address.clone(),
        })?;

        state.require_service(service_id)?;
        let settle_reads = state.settle_reads;
        let slots = state.allowlists.entry(service_id.to_string()).or_default();
        if slots
            .iter()
            .any(|slot| slot.entry.ip_address == request.ip_address)
        {
            return Err(Error::rejected(
                409,
                format!("{} is already allowed", request.ip_address),
            ));
        }

        let entry = AllowlistEntry {
            ip_address: request.ip_address.clone(),
            comment: request.comment.clone(),
            status: if settle_reads == 0 {
                AllowlistStatus::Enforcing
            } else {
                AllowlistStatus::Pending
            },
        };
        slots.push(AllowlistSlot {
            entry: entry.clone(),
            reads_until_enforcing: settle_reads,
        });

        Ok(entry)
    }

    async fn remove_allowed_address(&self, service_id: &str, ip_address: &str) -> Result<(), Error> {
        let mut state = self.state.lock();
        state.record(Call::RemoveAllowedAddress {
            service_id: service_id.to_string(),
            ip_address: ip_address.to_string(),
        })?;

        state.require_service(service_id)?;
        let slots = state.allowlists.entry(service_id.to_string()).or_default();
        let before = slots.len();
        slots.retain(|slot| slot.entry.ip_address != ip_address);
        if slots.len() == before {
            return Err(Error::NotFound(format!(
                "allowlist entry {ip_address} on service {service_id}"
            )));
        }
        Ok(())
    }

    async fn create_config(&self, request: &CreateConfigRequest) -> Result<Config, Error> {
        let mut state = self.state.lock();
        state.record(Call::CreateConfig {
            name: request.name.clone(),
        })?;

        let id = state.next_id("cfg");
        let config = Config {
            id: id.clone(),
            name: request.name.clone(),
            topology_id: format!("topology-{}", request.topology),
            version_id: format!("version-{}", request.version),
            ..Config::default()
        };
        state.configs.insert(id.clone(), config.clone());
        state.values.insert(id, BTreeMap::new());

        Ok(config)
    }

    async fn get_config(&self, config_id: &str) -> Result<Config, Error> {
        let mut state = self.state.lock();
        state.record(Call::GetConfig {
            config_id: config_id.to_string(),
        })?;

        state
            .configs
            .get(config_id)
            .cloned()
            .ok_or_else(|| Error::NotFound(format!("config {config_id}")))
    }

    async fn update_config(
        &self,
        config_id: &str,
        request: &UpdateConfigRequest,
    ) -> Result<Config, Error> {
        let mut state = self.state.lock();
        state.record(Call::UpdateConfig {
            config_id: config_id.to_string(),
            name: request.name.clone(),
        })?;

        let config = state
            .configs
            .get_mut(config_id)
            .ok_or_else(|| Error::NotFound(format!("config {config_id}")))?;
        config.name.clone_from(&request.name);
        Ok(config.clone())
    }

    async fn delete_config(&self, config_id: &str) -> Result<(), Error> {
        let mut state = self.state.lock();
        state.record(Call::DeleteConfig {
            config_id: config_id.to_string(),
        })?;

        state.values.remove(config_id);
        state
            .configs
            .remove(config_id)
            .map(|_| ())
            .ok_or_else(|| Error::NotFound(format!("config {config_id}")))
    }

    async fn set_config_value(
        &self,
        config_id: &str,
        variable: &str,
        value: &str,
        allow_restart: bool,
    ) -> Result<(), Error> {
        let mut state = self.state.lock();
        state.record(Call::SetConfigValue {
            config_id: config_id.to_string(),
            variable: variable.to_string(),
            value: value.to_string(),
            allow_restart,
        })?;

        state
            .values
            .get_mut(config_id)
            .ok_or_else(|| Error::NotFound(format!("config {config_id}")))?
            .insert(variable.to_string(), value.to_string());
        Ok(())
    }

    async fn unset_config_value(
        &self,
        config_id: &str,
        variable: &str,
        allow_restart: bool,
    ) -> Result<(), Error> {
        let mut state = self.state.lock();
        state.record(Call::UnsetConfigValue {
            config_id: config_id.to_string(),
            variable: variable.to_string(),
            allow_restart,
        })?;

        state
            .values
            .get_mut(config_id)
            .ok_or_else(|| Error::NotFound(format!("config {config_id}")))?
            .remove(variable);
        Ok(())
    }

    async fn get_config_keys(&self, topology: &str, version: &str) -> Result<Vec<ConfigKey>, Error> {
        let mut state = self.state.lock();
        state.record(Call::GetConfigKeys {
            topology: topology.to_string(),
            version: version.to_string(),
        })?;

        Ok(state
            .catalogs
            .get(&(topology.to_string(), version.to_string()))
            .cloned()
            .unwrap_or_default())
    }
}
