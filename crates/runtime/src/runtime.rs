use std::path::PathBuf;
use std::sync::Arc;

use tokio_util::sync::CancellationToken;
use tracing::{debug, info};
use winbridge_core::platform::{PlatformModule, PlatformProviders};
use winbridge_core::types::{
    AclSpecification, EffectivePermissions, ElevationState, ProcessRecord, RegistrationEntry,
};

use crate::config::BridgeConfig;
use crate::privilege::PrivilegeManager;
use crate::process::{KillReport, ProcessController};
use crate::registry::RegistryManager;
use crate::BridgeError;

/// Facade over the process, registry and privilege components.
///
/// The synchronous components are reachable through [`Runtime::processes`],
/// [`Runtime::registry`] and [`Runtime::privileges`]. The `async` methods run
/// the same calls on tokio's blocking pool so an event loop is never stalled;
/// independent calls may run concurrently.
pub struct Runtime {
    module: Option<&'static dyn PlatformModule>,
    providers: PlatformProviders,
    config: Arc<BridgeConfig>,
    processes: ProcessController,
    registry: RegistryManager,
    privileges: PrivilegeManager,
}

impl std::fmt::Debug for Runtime {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Runtime")
            .field("module", &self.module.map(|module| module.name()))
            .field("providers", &self.providers)
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

async fn run_blocking<T, F>(operation: &'static str, work: F) -> Result<T, BridgeError>
where
    T: Send + 'static,
    F: FnOnce() -> Result<T, BridgeError> + Send + 'static,
{
    tokio::task::spawn_blocking(work)
        .await
        .map_err(|err| {
            BridgeError::SubsystemUnavailable(format!("{operation} worker failed: {err}"))
        })?
}

impl Runtime {
    /// Initializes the platform backend of this build target with the default configuration.
    pub fn new() -> Result<Self, BridgeError> {
        Self::with_config(BridgeConfig::default())
    }

    pub fn with_config(config: BridgeConfig) -> Result<Self, BridgeError> {
        let module = winbridge_link::os_platform_module();
        module.initialize()?;
        let providers = PlatformProviders::discover()?;
        info!(module = module.name(), ?providers, "runtime initialized");
        let mut runtime = Self::with_providers(providers, config);
        runtime.module = Some(module);
        Ok(runtime)
    }

    /// Builds a runtime on explicitly chosen providers, bypassing discovery.
    pub fn with_providers(providers: PlatformProviders, config: BridgeConfig) -> Self {
        let config = Arc::new(config);
        Self {
            module: None,
            providers,
            processes: ProcessController::new(providers.processes),
            registry: RegistryManager::new(providers.registry, config.classes_scope),
            privileges: PrivilegeManager::new(
                providers.elevation,
                providers.acl,
                Arc::clone(&config),
            ),
            config,
        }
    }

    pub fn config(&self) -> &BridgeConfig {
        &self.config
    }

    pub fn providers(&self) -> PlatformProviders {
        self.providers
    }

    pub fn processes(&self) -> &ProcessController {
        &self.processes
    }

    pub fn registry(&self) -> &RegistryManager {
        &self.registry
    }

    pub fn privileges(&self) -> &PrivilegeManager {
        &self.privileges
    }

    /// Shuts the platform module down. Providers injected through
    /// [`Runtime::with_providers`] have no module to shut down.
    pub fn shutdown(&mut self) {
        if let Some(module) = self.module.take() {
            debug!(module = module.name(), "shutting down platform module");
            module.shutdown();
        }
    }

    // Process Controller

    pub async fn kill_process_tree(&self, pid: u32) -> Result<bool, BridgeError> {
        let processes = self.processes.clone();
        run_blocking("kill_process_tree", move || processes.kill_process_tree(pid)).await
    }

    /// Like [`Runtime::kill_process_tree`] with a per-node report; stops
    /// before the next signal once `cancel` fires.
    pub async fn terminate_tree(
        &self,
        pid: u32,
        cancel: CancellationToken,
    ) -> Result<KillReport, BridgeError> {
        let processes = self.processes.clone();
        run_blocking("terminate_tree", move || processes.terminate_tree(pid, &cancel)).await
    }

    pub async fn list_processes_by_name(
        &self,
        name: impl Into<String>,
    ) -> Result<Vec<u32>, BridgeError> {
        self.list_processes_by_name_cancellable(name, CancellationToken::new()).await
    }

    pub async fn list_processes_by_name_cancellable(
        &self,
        name: impl Into<String>,
        cancel: CancellationToken,
    ) -> Result<Vec<u32>, BridgeError> {
        let processes = self.processes.clone();
        let name = name.into();
        run_blocking("list_processes_by_name", move || {
            processes.list_processes_by_name_cancellable(&name, &cancel)
        })
        .await
    }

    pub async fn is_process_elevated(&self, pid: u32) -> Result<bool, BridgeError> {
        let processes = self.processes.clone();
        run_blocking("is_process_elevated", move || processes.is_process_elevated(pid)).await
    }

    pub async fn get_process_info(
        &self,
        pids: Vec<u32>,
    ) -> Result<Vec<ProcessRecord>, BridgeError> {
        let processes = self.processes.clone();
        run_blocking("get_process_info", move || processes.get_process_info(&pids)).await
    }

    // Registry Manager

    pub async fn register_file_association(
        &self,
        extension: impl Into<String>,
        program_id: impl Into<String>,
        executable: impl Into<PathBuf>,
        description: impl Into<String>,
    ) -> Result<(), BridgeError> {
        self.register_file_association_with_content_type(
            extension,
            program_id,
            executable,
            description,
            None,
        )
        .await
    }

    pub async fn register_file_association_with_content_type(
        &self,
        extension: impl Into<String>,
        program_id: impl Into<String>,
        executable: impl Into<PathBuf>,
        description: impl Into<String>,
        content_type: Option<String>,
    ) -> Result<(), BridgeError> {
        let registry = self.registry.clone();
        let (extension, program_id, executable, description) =
            (extension.into(), program_id.into(), executable.into(), description.into());
        run_blocking("register_file_association", move || {
            registry.register_file_association_with_content_type(
                &extension,
                &program_id,
                &executable,
                &description,
                content_type.as_deref(),
            )
        })
        .await
    }

    pub async fn register_url_protocol(
        &self,
        protocol: impl Into<String>,
        executable: impl Into<PathBuf>,
        description: impl Into<String>,
    ) -> Result<(), BridgeError> {
        let registry = self.registry.clone();
        let (protocol, executable, description) =
            (protocol.into(), executable.into(), description.into());
        run_blocking("register_url_protocol", move || {
            registry.register_url_protocol(&protocol, &executable, &description)
        })
        .await
    }

    pub async fn set_auto_start(
        &self,
        app_name: impl Into<String>,
        executable: impl Into<PathBuf>,
        enabled: bool,
    ) -> Result<(), BridgeError> {
        let registry = self.registry.clone();
        let (app_name, executable) = (app_name.into(), executable.into());
        run_blocking("set_auto_start", move || {
            registry.set_auto_start(&app_name, &executable, enabled)
        })
        .await
    }

    pub async fn remove_file_association(
        &self,
        extension: impl Into<String>,
        program_id: impl Into<String>,
    ) -> Result<(), BridgeError> {
        let registry = self.registry.clone();
        let (extension, program_id) = (extension.into(), program_id.into());
        run_blocking("remove_file_association", move || {
            registry.remove_file_association(&extension, &program_id)
        })
        .await
    }

    pub async fn remove_url_protocol(
        &self,
        protocol: impl Into<String>,
    ) -> Result<(), BridgeError> {
        let registry = self.registry.clone();
        let protocol = protocol.into();
        run_blocking("remove_url_protocol", move || registry.remove_url_protocol(&protocol)).await
    }

    pub async fn lookup_file_association(
        &self,
        extension: impl Into<String>,
    ) -> Result<Option<RegistrationEntry>, BridgeError> {
        let registry = self.registry.clone();
        let extension = extension.into();
        run_blocking("lookup_file_association", move || {
            registry.lookup_file_association(&extension)
        })
        .await
    }

    pub async fn lookup_url_protocol(
        &self,
        protocol: impl Into<String>,
    ) -> Result<Option<RegistrationEntry>, BridgeError> {
        let registry = self.registry.clone();
        let protocol = protocol.into();
        run_blocking("lookup_url_protocol", move || registry.lookup_url_protocol(&protocol)).await
    }

    pub async fn lookup_auto_start(
        &self,
        app_name: impl Into<String>,
    ) -> Result<Option<RegistrationEntry>, BridgeError> {
        let registry = self.registry.clone();
        let app_name = app_name.into();
        run_blocking("lookup_auto_start", move || registry.lookup_auto_start(&app_name)).await
    }

    pub async fn is_auto_start_enabled(
        &self,
        app_name: impl Into<String>,
    ) -> Result<bool, BridgeError> {
        let registry = self.registry.clone();
        let app_name = app_name.into();
        run_blocking("is_auto_start_enabled", move || {
            registry.is_auto_start_enabled(&app_name)
        })
        .await
    }

    // Privilege Manager

    pub async fn is_running_as_admin(&self) -> Result<bool, BridgeError> {
        let privileges = self.privileges.clone();
        run_blocking("is_running_as_admin", move || privileges.is_running_as_admin()).await
    }

    pub async fn elevation_state(&self) -> Result<ElevationState, BridgeError> {
        let privileges = self.privileges.clone();
        run_blocking("elevation_state", move || privileges.elevation_state()).await
    }

    pub async fn request_elevation(
        &self,
        executable: impl Into<PathBuf>,
        args: Vec<String>,
    ) -> Result<bool, BridgeError> {
        let privileges = self.privileges.clone();
        let executable = executable.into();
        run_blocking("request_elevation", move || {
            privileges.request_elevation(&executable, &args)
        })
        .await
    }

    pub async fn requires_admin_access(
        &self,
        path: impl Into<PathBuf>,
    ) -> Result<bool, BridgeError> {
        let privileges = self.privileges.clone();
        let path = path.into();
        run_blocking("requires_admin_access", move || privileges.requires_admin_access(&path)).await
    }

    pub async fn set_file_acl(
        &self,
        path: impl Into<PathBuf>,
        spec: AclSpecification,
    ) -> Result<(), BridgeError> {
        let privileges = self.privileges.clone();
        let path = path.into();
        run_blocking("set_file_acl", move || privileges.set_file_acl(&path, &spec)).await
    }

    pub async fn remove_file_acl(
        &self,
        path: impl Into<PathBuf>,
        principal: impl Into<String>,
    ) -> Result<(), BridgeError> {
        let privileges = self.privileges.clone();
        let (path, principal) = (path.into(), principal.into());
        run_blocking("remove_file_acl", move || privileges.remove_file_acl(&path, &principal)).await
    }

    pub async fn reset_file_acl(&self, path: impl Into<PathBuf>) -> Result<(), BridgeError> {
        let privileges = self.privileges.clone();
        let path = path.into();
        run_blocking("reset_file_acl", move || privileges.reset_file_acl(&path)).await
    }

    pub async fn get_effective_permissions(
        &self,
        path: impl Into<PathBuf>,
    ) -> Result<EffectivePermissions, BridgeError> {
        let privileges = self.privileges.clone();
        let path = path.into();
        run_blocking("get_effective_permissions", move || {
            privileges.get_effective_permissions(&path)
        })
        .await
    }
}
