//! Process-wide client instance
//!
//! Free functions mirroring the [`RpxLoaderClient`] gateway over a single
//! lazily constructed client backed by the native module host. The mutex
//! serializes concurrent initialize+call races; callers that need test
//! isolation should construct their own [`RpxLoaderClient`] instead.

use once_cell::sync::Lazy;
use parking_lot::Mutex;

use crate::client::{BundleSource, RpxLoaderClient};
use crate::native::DynamicModuleHost;
use crate::status::{LoaderResult, ModuleVersion};

static CLIENT: Lazy<Mutex<RpxLoaderClient>> =
    Lazy::new(|| Mutex::new(RpxLoaderClient::new(Box::new(DynamicModuleHost::new()))));

/// Initialize the process-wide client. See [`RpxLoaderClient::init_library`].
pub fn init_library() -> LoaderResult {
    CLIENT.lock().init_library()
}

/// Deinitialize the process-wide client (idempotent no-op).
pub fn deinit_library() -> LoaderResult {
    CLIENT.lock().deinit_library()
}

/// Query the provider API version.
pub fn get_version() -> LoaderResult<ModuleVersion> {
    CLIENT.lock().get_version()
}

/// Stage a bundle to be loaded on the next launch.
pub fn prepare_launch_from_sd(path: &str) -> LoaderResult {
    CLIENT.lock().prepare_launch_from_sd(path)
}

/// Launch the previously staged bundle.
pub fn launch_prepared_homebrew() -> LoaderResult {
    CLIENT.lock().launch_prepared_homebrew()
}

/// Stage and launch a bundle in one call.
pub fn launch_homebrew(bundle_path: &str) -> LoaderResult {
    CLIENT.lock().launch_homebrew(bundle_path)
}

/// Enable the /vol/content redirection.
pub fn enable_content_redirection() -> LoaderResult {
    CLIENT.lock().enable_content_redirection()
}

/// Disable the /vol/content redirection.
pub fn disable_content_redirection() -> LoaderResult {
    CLIENT.lock().disable_content_redirection()
}

/// Unmount the currently running bundle.
pub fn unmount_current_running_bundle() -> LoaderResult {
    CLIENT.lock().unmount_current_running_bundle()
}

/// Retrieve the path of the running executable into a caller buffer.
pub fn get_path_of_running_executable(buffer: &mut [u8]) -> LoaderResult {
    CLIENT.lock().get_path_of_running_executable(buffer)
}

/// Mount a bundle file to a named mount path.
pub fn mount_bundle(name: &str, bundle_path: &str, source: BundleSource) -> LoaderResult {
    CLIENT.lock().mount_bundle(name, bundle_path, source)
}

/// Unmount a named mount path.
pub fn unmount_bundle(name: &str) -> LoaderResult {
    CLIENT.lock().unmount_bundle(name)
}

/// Check whether a file exists inside a mounted bundle.
pub fn file_exists(name: &str) -> LoaderResult<bool> {
    CLIENT.lock().file_exists(name)
}

/// Open a read-only file inside a mounted bundle.
pub fn file_open(name: &str) -> LoaderResult<u32> {
    CLIENT.lock().file_open(name)
}

/// Read from an open bundle file.
pub fn file_read(handle: u32, buffer: &mut [u8]) -> LoaderResult<u32> {
    CLIENT.lock().file_read(handle, buffer)
}

/// Close an open bundle file.
pub fn file_close(handle: u32) -> LoaderResult {
    CLIENT.lock().file_close(handle)
}
