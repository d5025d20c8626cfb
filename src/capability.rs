//! Capability table
//!
//! The declarative list of provider capabilities the client negotiates:
//! one entry per capability with its export name, its minimum required
//! provider version, and its declared call contract.
//!
//! The builtin table ([`CapabilityTable::latest`]) describes the newest
//! protocol revision. Older revisions fall out of the same design by
//! registering fewer entries, either in code or through a JSON manifest.

use std::fs::File;
use std::io::BufReader;
use std::path::Path;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::status::ModuleVersion;
use crate::types::{ExportSignature, ExportType};

/// Identifier of one negotiated provider capability.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Capability {
    /// Query the provider API version. Mandatory; everything else gates on it.
    GetVersion,
    /// Stage a bundle path to be loaded on the next launch.
    PrepareLaunchFromSd,
    /// Launch the previously staged bundle.
    LaunchPreparedHomebrew,
    /// Stage and launch a bundle in one call.
    LaunchHomebrew,
    /// Enable the /vol/content redirection.
    EnableContentRedirection,
    /// Disable the /vol/content redirection.
    DisableContentRedirection,
    /// Unmount the currently running bundle.
    UnmountCurrentRunningBundle,
    /// Retrieve the path of the running executable into a caller buffer.
    GetPathOfRunningExecutable,
    /// Mount a bundle file to a named mount path.
    MountBundle,
    /// Unmount a named mount path.
    UnmountBundle,
    /// Check whether a file exists inside a mounted bundle.
    FileExists,
    /// Open a file inside a mounted bundle.
    FileOpen,
    /// Read from an open bundle file.
    FileRead,
    /// Close an open bundle file.
    FileClose,
}

/// One entry of the capability table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CapabilityDescriptor {
    /// Capability this entry resolves.
    pub capability: Capability,
    /// Export name in the provider module.
    pub export: String,
    /// Minimum negotiated version required to invoke the capability.
    pub min_version: ModuleVersion,
    /// Declared call contract of the export.
    pub signature: ExportSignature,
}

impl CapabilityDescriptor {
    /// Create a new descriptor.
    pub fn new(
        capability: Capability,
        export: impl Into<String>,
        min_version: ModuleVersion,
        signature: ExportSignature,
    ) -> Self {
        Self {
            capability,
            export: export.into(),
            min_version,
            signature,
        }
    }
}

/// Ordered set of capability descriptors.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CapabilityTable {
    /// Registered capabilities.
    pub capabilities: Vec<CapabilityDescriptor>,
}

impl CapabilityTable {
    /// Create an empty table.
    pub fn empty() -> Self {
        Self {
            capabilities: Vec::new(),
        }
    }

    /// The builtin table for the newest protocol revision.
    ///
    /// Every capability requires version 1 except the running-executable
    /// path query, which requires version 2.
    pub fn latest() -> Self {
        use Capability::*;
        use ExportType::*;

        let status0 = || ExportSignature::new(vec![], Status);
        let mut table = Self::empty();

        table.push(CapabilityDescriptor::new(
            GetVersion,
            "RL_GetVersion",
            1,
            ExportSignature::new(vec![Ptr], Status),
        ));
        table.push(CapabilityDescriptor::new(
            PrepareLaunchFromSd,
            "RL_PrepareLaunchFromSD",
            1,
            ExportSignature::new(vec![CStr], Status),
        ));
        table.push(CapabilityDescriptor::new(
            LaunchPreparedHomebrew,
            "RL_LaunchPreparedHomebrew",
            1,
            status0(),
        ));
        table.push(CapabilityDescriptor::new(
            LaunchHomebrew,
            "RL_LaunchHomebrew",
            1,
            ExportSignature::new(vec![CStr], Status),
        ));
        table.push(CapabilityDescriptor::new(
            EnableContentRedirection,
            "RL_EnableContentRedirection",
            1,
            status0(),
        ));
        table.push(CapabilityDescriptor::new(
            DisableContentRedirection,
            "RL_DisableContentRedirection",
            1,
            status0(),
        ));
        table.push(CapabilityDescriptor::new(
            UnmountCurrentRunningBundle,
            "RL_UnmountCurrentRunningBundle",
            1,
            status0(),
        ));
        table.push(CapabilityDescriptor::new(
            GetPathOfRunningExecutable,
            "RL_GetPathOfRunningExecutable",
            2,
            ExportSignature::new(vec![Ptr, U32], Status),
        ));
        table.push(CapabilityDescriptor::new(
            MountBundle,
            "RL_MountBundle",
            1,
            ExportSignature::new(vec![CStr, CStr, U32], Status),
        ));
        table.push(CapabilityDescriptor::new(
            UnmountBundle,
            "RL_UnmountBundle",
            1,
            ExportSignature::new(vec![CStr], Status),
        ));
        table.push(CapabilityDescriptor::new(
            FileExists,
            "RL_FileExists",
            1,
            ExportSignature::new(vec![CStr], Bool),
        ));
        table.push(CapabilityDescriptor::new(
            FileOpen,
            "RL_FileOpen",
            1,
            ExportSignature::new(vec![CStr, Ptr], Status),
        ));
        table.push(CapabilityDescriptor::new(
            FileRead,
            "RL_FileRead",
            1,
            ExportSignature::new(vec![U32, Ptr, U32], I32),
        ));
        table.push(CapabilityDescriptor::new(
            FileClose,
            "RL_FileClose",
            1,
            ExportSignature::new(vec![U32], Status),
        ));

        table
    }

    /// Add a descriptor, replacing any existing entry for the same capability.
    pub fn push(&mut self, descriptor: CapabilityDescriptor) {
        self.capabilities
            .retain(|d| d.capability != descriptor.capability);
        self.capabilities.push(descriptor);
    }

    /// Look up the descriptor for a capability.
    pub fn get(&self, capability: Capability) -> Option<&CapabilityDescriptor> {
        self.capabilities
            .iter()
            .find(|d| d.capability == capability)
    }

    /// Iterate over all registered descriptors.
    pub fn iter(&self) -> impl Iterator<Item = &CapabilityDescriptor> {
        self.capabilities.iter()
    }

    /// Number of registered capabilities.
    pub fn len(&self) -> usize {
        self.capabilities.len()
    }

    /// Whether the table has no entries.
    pub fn is_empty(&self) -> bool {
        self.capabilities.is_empty()
    }

    /// Load a table from a JSON manifest file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, TableError> {
        let file = File::open(path.as_ref()).map_err(|e| TableError::Io(e.to_string()))?;
        let reader = BufReader::new(file);
        serde_json::from_reader(reader).map_err(|e| TableError::Parse(e.to_string()))
    }

    /// Save this table to a JSON manifest file.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<(), TableError> {
        let file = File::create(path.as_ref()).map_err(|e| TableError::Io(e.to_string()))?;
        serde_json::to_writer_pretty(file, self).map_err(|e| TableError::Serialize(e.to_string()))
    }

    /// Parse a table from a JSON string.
    pub fn from_json(json: &str) -> Result<Self, TableError> {
        serde_json::from_str(json).map_err(|e| TableError::Parse(e.to_string()))
    }

    /// Serialize this table to a JSON string.
    pub fn to_json(&self) -> Result<String, TableError> {
        serde_json::to_string_pretty(self).map_err(|e| TableError::Serialize(e.to_string()))
    }
}

impl Default for CapabilityTable {
    fn default() -> Self {
        Self::latest()
    }
}

/// Capability manifest error types.
#[derive(Debug, Error)]
pub enum TableError {
    /// I/O error.
    #[error("I/O error: {0}")]
    Io(String),
    /// Parse error.
    #[error("parse error: {0}")]
    Parse(String),
    /// Serialization error.
    #[error("serialization error: {0}")]
    Serialize(String),
}
