//! Native module host
//!
//! [`ModuleHost`] implementation backed by libloading. Resolves provider
//! modules from platform search paths and forwards calls through raw
//! function pointers with a per-arity `extern "C"` dispatch.
//!
//! Signature mismatches cannot be detected here: the declared contract
//! (name, argument order and types, return type) is trusted bit-exactly,
//! exactly like the native client this crate models.

use std::ffi::CString;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use libloading::{Library, Symbol};
use tracing::debug;

use crate::provider::{AcquireError, ModuleHost, ProviderExport, ProviderModule, ResolveError};
use crate::types::{ExportSignature, ExportValue};

/// Maximum number of arguments the arity dispatch can forward.
pub const MAX_FORWARD_ARITY: usize = 4;

/// Module host backed by the platform dynamic loader.
pub struct DynamicModuleHost {
    /// Search paths probed before falling back to the loader's own search.
    search_paths: Vec<PathBuf>,
}

impl DynamicModuleHost {
    /// Create a host with the platform default search paths.
    pub fn new() -> Self {
        Self {
            search_paths: default_search_paths(),
        }
    }

    /// Add a search path.
    pub fn add_search_path(&mut self, path: impl AsRef<Path>) {
        self.search_paths.push(path.as_ref().to_path_buf());
    }

    /// Find a module file by name.
    ///
    /// Names containing a path separator or an extension are treated as
    /// literal paths; bare names are mangled into the platform library
    /// filename and probed against the search paths.
    pub fn find_module(&self, name: &str) -> Option<PathBuf> {
        let path = Path::new(name);
        if path.exists() {
            return Some(path.to_path_buf());
        }

        let file_name = library_filename(name);
        for search_path in &self.search_paths {
            let full_path = search_path.join(&file_name);
            if full_path.exists() {
                return Some(full_path);
            }
        }

        None
    }
}

impl Default for DynamicModuleHost {
    fn default() -> Self {
        Self::new()
    }
}

impl ModuleHost for DynamicModuleHost {
    fn acquire(&self, module_name: &str) -> Result<Box<dyn ProviderModule>, AcquireError> {
        // Fall back to the loader's own search order (rpath, default
        // system paths) when the probe finds nothing.
        let path = self
            .find_module(module_name)
            .unwrap_or_else(|| PathBuf::from(library_filename(module_name)));

        debug!(module = module_name, path = %path.display(), "acquiring module");

        // Safety: loading a dynamic module runs its initializers. The
        // module is identified by a well-known name the caller trusts.
        let library = unsafe {
            Library::new(&path).map_err(|e| AcquireError::LoadFailed {
                name: module_name.to_string(),
                reason: e.to_string(),
            })?
        };

        Ok(Box::new(NativeModule {
            library: Arc::new(library),
        }))
    }
}

/// A provider module loaded through the platform dynamic loader.
pub struct NativeModule {
    library: Arc<Library>,
}

impl ProviderModule for NativeModule {
    fn find_export(
        &self,
        name: &str,
        signature: &ExportSignature,
    ) -> Result<Box<dyn ProviderExport>, ResolveError> {
        if signature.arity() > MAX_FORWARD_ARITY {
            return Err(ResolveError::UnsupportedArity {
                name: name.to_string(),
                arity: signature.arity(),
            });
        }

        let c_name =
            CString::new(name).map_err(|_| ResolveError::InvalidName(name.to_string()))?;

        // Safety: the symbol is looked up by name only; the declared
        // contract is applied at the call site.
        let symbol: Symbol<*const ()> = unsafe {
            self.library
                .get(c_name.as_bytes_with_nul())
                .map_err(|_| ResolveError::NotFound(name.to_string()))?
        };

        Ok(Box::new(NativeExport {
            addr: *symbol as usize,
            signature: signature.clone(),
            _library: Arc::clone(&self.library),
        }))
    }
}

/// A resolved native export.
///
/// Holds the owning library so the handle outlives every callable; the
/// module is acquired once and never released.
struct NativeExport {
    addr: usize,
    signature: ExportSignature,
    _library: Arc<Library>,
}

impl ProviderExport for NativeExport {
    fn invoke(&self, args: &[ExportValue]) -> u64 {
        debug_assert!(self.signature.matches_args(args));

        // The exact parameter count must be known at compile time, so
        // each arity gets its own transmuted call.
        match args.len() {
            0 => self.call_0(),
            1 => self.call_1(args[0].to_u64()),
            2 => self.call_2(args[0].to_u64(), args[1].to_u64()),
            3 => self.call_3(args[0].to_u64(), args[1].to_u64(), args[2].to_u64()),
            _ => self.call_4(
                args[0].to_u64(),
                args[1].to_u64(),
                args[2].to_u64(),
                args[3].to_u64(),
            ),
        }
    }
}

impl NativeExport {
    fn call_0(&self) -> u64 {
        type Fn0 = extern "C" fn() -> u64;
        // Safety: addr came from a successful symbol lookup; the caller
        // guarantees the declared contract matches the export.
        let f: Fn0 = unsafe { std::mem::transmute(self.addr) };
        f()
    }

    fn call_1(&self, a: u64) -> u64 {
        type Fn1 = extern "C" fn(u64) -> u64;
        // Safety: see call_0.
        let f: Fn1 = unsafe { std::mem::transmute(self.addr) };
        f(a)
    }

    fn call_2(&self, a: u64, b: u64) -> u64 {
        type Fn2 = extern "C" fn(u64, u64) -> u64;
        // Safety: see call_0.
        let f: Fn2 = unsafe { std::mem::transmute(self.addr) };
        f(a, b)
    }

    fn call_3(&self, a: u64, b: u64, c: u64) -> u64 {
        type Fn3 = extern "C" fn(u64, u64, u64) -> u64;
        // Safety: see call_0.
        let f: Fn3 = unsafe { std::mem::transmute(self.addr) };
        f(a, b, c)
    }

    fn call_4(&self, a: u64, b: u64, c: u64, d: u64) -> u64 {
        type Fn4 = extern "C" fn(u64, u64, u64, u64) -> u64;
        // Safety: see call_0.
        let f: Fn4 = unsafe { std::mem::transmute(self.addr) };
        f(a, b, c, d)
    }
}

/// Default module search paths for this platform.
///
/// The current directory and the loader environment variable come first,
/// so a module shipped next to the application wins over a system-wide
/// install.
fn default_search_paths() -> Vec<PathBuf> {
    let mut paths = Vec::new();

    if let Ok(cwd) = std::env::current_dir() {
        paths.push(cwd);
    }

    #[cfg(target_os = "linux")]
    {
        push_env_paths(&mut paths, "LD_LIBRARY_PATH", ':');
        paths.extend(["/usr/local/lib", "/usr/lib", "/usr/lib64"].map(PathBuf::from));
    }

    #[cfg(target_os = "macos")]
    {
        push_env_paths(&mut paths, "DYLD_LIBRARY_PATH", ':');
        paths.extend(["/usr/local/lib", "/opt/homebrew/lib"].map(PathBuf::from));
    }

    #[cfg(target_os = "windows")]
    {
        push_env_paths(&mut paths, "PATH", ';');
    }

    paths
}

/// Append the entries of a loader search-path environment variable.
fn push_env_paths(paths: &mut Vec<PathBuf>, var: &str, separator: char) {
    if let Ok(value) = std::env::var(var) {
        paths.extend(
            value
                .split(separator)
                .filter(|p| !p.is_empty())
                .map(PathBuf::from),
        );
    }
}

/// Construct the platform-specific library filename.
fn library_filename(name: &str) -> String {
    if name.contains(std::path::MAIN_SEPARATOR) || name.contains('.') {
        return name.to_string();
    }

    #[cfg(target_os = "linux")]
    {
        format!("lib{}.so", name)
    }

    #[cfg(target_os = "macos")]
    {
        format!("lib{}.dylib", name)
    }

    #[cfg(target_os = "windows")]
    {
        format!("{}.dll", name)
    }

    #[cfg(not(any(target_os = "linux", target_os = "macos", target_os = "windows")))]
    {
        name.to_string()
    }
}
