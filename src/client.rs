//! Client context
//!
//! [`RpxLoaderClient`] is the single owned context behind the public API:
//! it resolves the provider module, negotiates the API version, populates
//! the export table, and routes every capability call through the guard
//! chain before forwarding it.
//!
//! Guard order is fixed for every entry point:
//!
//! 1. negotiated version still at the sentinel -> `LibUninitialized`
//! 2. export unresolved, or version below the capability minimum ->
//!    `UnsupportedCommand`
//! 3. invalid caller argument -> `InvalidArgument`
//! 4. forward the call; translate the raw result

use std::collections::HashMap;
use std::ffi::CString;

use tracing::{debug, error, warn};

use crate::capability::{Capability, CapabilityDescriptor, CapabilityTable};
use crate::provider::{ModuleHost, ProviderExport, ProviderModule};
use crate::status::{LoaderResult, LoaderStatus, ModuleVersion, MODULE_VERSION_ERROR};
use crate::types::{ExportType, ExportValue};

/// Well-known name of the provider module, stable across all revisions.
pub const MODULE_NAME: &str = "homebrew_rpx_loader";

/// Source type of a bundle handed to [`RpxLoaderClient::mount_bundle`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u32)]
pub enum BundleSource {
    /// Plain file descriptor.
    FileDescriptor = 0,
    /// File descriptor opened through the Cafe OS filesystem layer.
    FileDescriptorCafeOs = 1,
}

/// Version-negotiating client for the provider module.
///
/// Construct one context per consumer; all process-wide state lives here.
/// The export table and negotiated version are written only during
/// initialization and read-only afterwards.
pub struct RpxLoaderClient {
    host: Box<dyn ModuleHost>,
    table: CapabilityTable,
    module: Option<Box<dyn ProviderModule>>,
    exports: HashMap<Capability, Box<dyn ProviderExport>>,
    version: ModuleVersion,
}

impl RpxLoaderClient {
    /// Create a client over the given host with the latest capability table.
    pub fn new(host: Box<dyn ModuleHost>) -> Self {
        Self::with_table(host, CapabilityTable::latest())
    }

    /// Create a client with a custom capability table.
    ///
    /// Registering fewer capabilities reproduces an older protocol
    /// revision.
    pub fn with_table(host: Box<dyn ModuleHost>, table: CapabilityTable) -> Self {
        Self {
            host,
            table,
            module: None,
            exports: HashMap::new(),
            version: MODULE_VERSION_ERROR,
        }
    }

    /// The negotiated provider version, if initialization succeeded.
    pub fn negotiated_version(&self) -> Option<ModuleVersion> {
        (self.version != MODULE_VERSION_ERROR).then_some(self.version)
    }

    /// Whether a capability's export resolved during initialization.
    pub fn has_capability(&self, capability: Capability) -> bool {
        self.exports.contains_key(&capability)
    }

    /// Acquire the provider module, negotiate the version, and resolve
    /// the export table.
    ///
    /// Must succeed before any capability other than [`get_version`] can
    /// be used. The version-query export is mandatory; every other
    /// export is resolved independently and an absence only disables
    /// that one capability.
    ///
    /// [`get_version`]: RpxLoaderClient::get_version
    pub fn init_library(&mut self) -> LoaderResult {
        let module = match self.host.acquire(MODULE_NAME) {
            Ok(module) => module,
            Err(err) => {
                error!(module = MODULE_NAME, %err, "module acquisition failed");
                return Err(LoaderStatus::ModuleNotFound);
            }
        };

        let version_desc = match self.table.get(Capability::GetVersion) {
            Some(desc) => desc.clone(),
            None => return Err(LoaderStatus::ModuleMissingExport),
        };

        let version_export = match module.find_export(&version_desc.export, &version_desc.signature)
        {
            Ok(export) => export,
            Err(err) => {
                error!(export = %version_desc.export, %err, "mandatory export missing");
                return Err(LoaderStatus::ModuleMissingExport);
            }
        };

        let version = match query_version(version_export.as_ref()) {
            Ok(version) => version,
            Err(_) => return Err(LoaderStatus::UnsupportedApiVersion),
        };

        // Mandatory stage passed; repopulate the export table. Optional
        // failures are logged and leave the slot absent, never aborting
        // initialization: a newer client against an older provider just
        // loses the commands the provider never exported.
        self.exports.clear();
        self.exports.insert(Capability::GetVersion, version_export);

        for desc in self.table.iter() {
            if desc.capability == Capability::GetVersion {
                continue;
            }
            match module.find_export(&desc.export, &desc.signature) {
                Ok(export) => {
                    self.exports.insert(desc.capability, export);
                }
                Err(err) => {
                    warn!(export = %desc.export, %err, "optional export not resolved");
                }
            }
        }

        debug!(version, resolved = self.exports.len(), "library initialized");
        self.module = Some(module);
        self.version = version;
        Ok(())
    }

    /// Deinitialize the library.
    ///
    /// Idempotent no-op: the module handle stays acquired and the export
    /// table and negotiated version are kept for the process lifetime.
    pub fn deinit_library(&mut self) -> LoaderResult {
        Ok(())
    }

    /// Query the provider API version.
    ///
    /// Special-cased: does not require prior initialization. When the
    /// version export has not been resolved yet, the module is acquired
    /// and the export resolved on the spot. The negotiated version held
    /// by the context is not touched.
    pub fn get_version(&mut self) -> LoaderResult<ModuleVersion> {
        if !self.exports.contains_key(&Capability::GetVersion) {
            let desc = match self.table.get(Capability::GetVersion) {
                Some(desc) => desc.clone(),
                None => return Err(LoaderStatus::ModuleMissingExport),
            };

            if self.module.is_none() {
                match self.host.acquire(MODULE_NAME) {
                    Ok(module) => self.module = Some(module),
                    Err(err) => {
                        warn!(module = MODULE_NAME, %err, "module acquisition failed");
                        return Err(LoaderStatus::ModuleNotFound);
                    }
                }
            }

            let module = self.module.as_ref().ok_or(LoaderStatus::ModuleNotFound)?;
            match module.find_export(&desc.export, &desc.signature) {
                Ok(export) => {
                    self.exports.insert(Capability::GetVersion, export);
                }
                Err(err) => {
                    warn!(export = %desc.export, %err, "version export not resolved");
                    return Err(LoaderStatus::ModuleMissingExport);
                }
            }
        }

        let export = self
            .exports
            .get(&Capability::GetVersion)
            .ok_or(LoaderStatus::ModuleMissingExport)?;
        query_version(export.as_ref())
    }

    /// Stage a bundle to be loaded on the next launch of the wrapper
    /// application.
    pub fn prepare_launch_from_sd(&self, path: &str) -> LoaderResult {
        let (export, desc) = self.guarded(Capability::PrepareLaunchFromSd)?;
        let path = cstring_arg(path)?;
        let raw = export.invoke(&[ExportValue::CStr(path)]);
        translate(raw, desc.signature.returns)
    }

    /// Launch the previously staged bundle by restarting the wrapper
    /// application. Irreversible once forwarded.
    pub fn launch_prepared_homebrew(&self) -> LoaderResult {
        let (export, desc) = self.guarded(Capability::LaunchPreparedHomebrew)?;
        let raw = export.invoke(&[]);
        translate(raw, desc.signature.returns)
    }

    /// Stage the given bundle and launch it in one call.
    pub fn launch_homebrew(&self, bundle_path: &str) -> LoaderResult {
        let (export, desc) = self.guarded(Capability::LaunchHomebrew)?;
        let bundle_path = cstring_arg(bundle_path)?;
        let raw = export.invoke(&[ExportValue::CStr(bundle_path)]);
        translate(raw, desc.signature.returns)
    }

    /// Enable the /vol/content redirection to the mounted bundle, with
    /// fallback to the original path for files absent from the bundle.
    pub fn enable_content_redirection(&self) -> LoaderResult {
        let (export, desc) = self.guarded(Capability::EnableContentRedirection)?;
        let raw = export.invoke(&[]);
        translate(raw, desc.signature.returns)
    }

    /// Disable the /vol/content redirection.
    pub fn disable_content_redirection(&self) -> LoaderResult {
        let (export, desc) = self.guarded(Capability::DisableContentRedirection)?;
        let raw = export.invoke(&[]);
        translate(raw, desc.signature.returns)
    }

    /// Unmount the currently running bundle. Also disables the
    /// /vol/content redirection.
    pub fn unmount_current_running_bundle(&self) -> LoaderResult {
        let (export, desc) = self.guarded(Capability::UnmountCurrentRunningBundle)?;
        let raw = export.invoke(&[]);
        translate(raw, desc.signature.returns)
    }

    /// Retrieve the path of the running executable into a caller buffer.
    ///
    /// Requires a newer provider than the rest of the API surface.
    pub fn get_path_of_running_executable(&self, buffer: &mut [u8]) -> LoaderResult {
        let (export, desc) = self.guarded(Capability::GetPathOfRunningExecutable)?;
        if buffer.is_empty() {
            return Err(LoaderStatus::InvalidArgument);
        }
        let raw = export.invoke(&[
            ExportValue::Ptr(buffer.as_mut_ptr() as usize),
            ExportValue::U32(buffer.len() as u32),
        ]);
        translate(raw, desc.signature.returns)
    }

    /// Convenience wrapper around [`get_path_of_running_executable`]
    /// returning an owned string.
    ///
    /// [`get_path_of_running_executable`]: RpxLoaderClient::get_path_of_running_executable
    pub fn path_of_running_executable(&self) -> LoaderResult<String> {
        let mut buffer = [0u8; 256];
        self.get_path_of_running_executable(&mut buffer)?;
        let end = buffer.iter().position(|&b| b == 0).unwrap_or(buffer.len());
        Ok(String::from_utf8_lossy(&buffer[..end]).into_owned())
    }

    /// Mount a bundle file to a named mount path.
    pub fn mount_bundle(
        &self,
        name: &str,
        bundle_path: &str,
        source: BundleSource,
    ) -> LoaderResult {
        let (export, desc) = self.guarded(Capability::MountBundle)?;
        let name = cstring_arg(name)?;
        let bundle_path = cstring_arg(bundle_path)?;
        let raw = export.invoke(&[
            ExportValue::CStr(name),
            ExportValue::CStr(bundle_path),
            ExportValue::U32(source as u32),
        ]);
        translate(raw, desc.signature.returns)
    }

    /// Unmount a named mount path.
    pub fn unmount_bundle(&self, name: &str) -> LoaderResult {
        let (export, desc) = self.guarded(Capability::UnmountBundle)?;
        let name = cstring_arg(name)?;
        let raw = export.invoke(&[ExportValue::CStr(name)]);
        translate(raw, desc.signature.returns)
    }

    /// Check whether a file exists inside a mounted bundle.
    ///
    /// The provider answers with a plain bool rather than a status, so a
    /// missing file is `Ok(false)`, not an error.
    pub fn file_exists(&self, name: &str) -> LoaderResult<bool> {
        let (export, _) = self.guarded(Capability::FileExists)?;
        let name = cstring_arg(name)?;
        let raw = export.invoke(&[ExportValue::CStr(name)]);
        // Only the low byte carries the C bool.
        Ok(raw & 0xFF != 0)
    }

    /// Open a read-only file inside a mounted bundle, returning its handle.
    pub fn file_open(&self, name: &str) -> LoaderResult<u32> {
        let (export, desc) = self.guarded(Capability::FileOpen)?;
        let name = cstring_arg(name)?;
        let mut handle: u32 = 0;
        let raw = export.invoke(&[
            ExportValue::CStr(name),
            ExportValue::Ptr(&mut handle as *mut u32 as usize),
        ]);
        translate(raw, desc.signature.returns)?;
        Ok(handle)
    }

    /// Read from an open bundle file, returning the number of bytes read.
    pub fn file_read(&self, handle: u32, buffer: &mut [u8]) -> LoaderResult<u32> {
        let (export, _) = self.guarded(Capability::FileRead)?;
        if buffer.is_empty() {
            return Err(LoaderStatus::InvalidArgument);
        }
        let raw = export.invoke(&[
            ExportValue::U32(handle),
            ExportValue::Ptr(buffer.as_mut_ptr() as usize),
            ExportValue::U32(buffer.len() as u32),
        ]);
        // The raw return is a byte count; negative values carry a status.
        let count = raw as u32 as i32;
        if count >= 0 {
            Ok(count as u32)
        } else {
            Err(LoaderStatus::from_raw(count))
        }
    }

    /// Close an open bundle file.
    pub fn file_close(&self, handle: u32) -> LoaderResult {
        let (export, desc) = self.guarded(Capability::FileClose)?;
        let raw = export.invoke(&[ExportValue::U32(handle)]);
        translate(raw, desc.signature.returns)
    }

    /// Guards 1 and 2 of the chain, shared by every gateway entry point.
    fn guarded(
        &self,
        capability: Capability,
    ) -> Result<(&dyn ProviderExport, &CapabilityDescriptor), LoaderStatus> {
        if self.version == MODULE_VERSION_ERROR {
            return Err(LoaderStatus::LibUninitialized);
        }

        let desc = self
            .table
            .get(capability)
            .ok_or(LoaderStatus::UnsupportedCommand)?;

        match self.exports.get(&capability) {
            Some(export) if self.version >= desc.min_version => Ok((export.as_ref(), desc)),
            _ => Err(LoaderStatus::UnsupportedCommand),
        }
    }
}

/// Invoke the version-query export through its out-parameter contract.
fn query_version(export: &dyn ProviderExport) -> LoaderResult<ModuleVersion> {
    let mut version: ModuleVersion = MODULE_VERSION_ERROR;
    let raw = export.invoke(&[ExportValue::Ptr(&mut version as *mut ModuleVersion as usize)]);
    translate(raw, ExportType::Status)?;
    if version == MODULE_VERSION_ERROR {
        return Err(LoaderStatus::UnsupportedApiVersion);
    }
    Ok(version)
}

/// Translate a raw provider result according to the declared return type.
fn translate(raw: u64, returns: ExportType) -> LoaderResult {
    match returns {
        ExportType::Status => match LoaderStatus::from_raw(raw as u32 as i32) {
            LoaderStatus::Success => Ok(()),
            status => Err(status),
        },
        ExportType::Bool => {
            if raw & 0xFF != 0 {
                Ok(())
            } else {
                Err(LoaderStatus::UnknownError)
            }
        }
        ExportType::Void => Ok(()),
        _ => Err(LoaderStatus::UnknownError),
    }
}

/// Validate a path/name argument and convert it for the C boundary.
///
/// Empty strings and strings with interior NUL bytes cannot cross the
/// boundary and fail the argument guard.
fn cstring_arg(value: &str) -> Result<CString, LoaderStatus> {
    if value.is_empty() {
        return Err(LoaderStatus::InvalidArgument);
    }
    CString::new(value).map_err(|_| LoaderStatus::InvalidArgument)
}
