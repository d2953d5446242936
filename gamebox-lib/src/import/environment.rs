//! Outside collaborators of an import: drive mounting and free-space
//! queries.

use std::io;
use std::path::Path;
use std::sync::Arc;

use gamebox_core::Drive;
use sysinfo::Disks;

/// Takes drives offline for the duration of an import and brings them back.
pub trait DriveMounter: Send + Sync {
    fn unmount(&self, drive: &Drive) -> io::Result<()>;
    fn remount(&self, drive: &Drive) -> io::Result<()>;
}

/// A mounter for hosts where gamebox does not manage mounts itself.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopMounter;

impl DriveMounter for NoopMounter {
    fn unmount(&self, drive: &Drive) -> io::Result<()> {
        log::debug!("Leaving {} mounted", drive.path.display());
        Ok(())
    }

    fn remount(&self, _drive: &Drive) -> io::Result<()> {
        Ok(())
    }
}

/// Reports free space at a path, when it can be measured.
pub trait SpaceProbe: Send + Sync {
    fn available_space(&self, path: &Path) -> Option<u64>;
}

/// Free space from the host's mounted disks.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemSpaceProbe;

impl SpaceProbe for SystemSpaceProbe {
    fn available_space(&self, path: &Path) -> Option<u64> {
        let path = path.canonicalize().ok()?;
        let disks = Disks::new_with_refreshed_list();
        // The most specific mount point containing the path.
        disks
            .list()
            .iter()
            .filter(|d| path.starts_with(d.mount_point()))
            .max_by_key(|d| d.mount_point().as_os_str().len())
            .map(|d| d.available_space())
    }
}

/// The collaborators shared by every operation a registry starts.
#[derive(Clone)]
pub struct ImportEnvironment {
    pub mounter: Arc<dyn DriveMounter>,
    pub space: Arc<dyn SpaceProbe>,
}

impl Default for ImportEnvironment {
    fn default() -> Self {
        Self {
            mounter: Arc::new(NoopMounter),
            space: Arc::new(SystemSpaceProbe),
        }
    }
}

impl std::fmt::Debug for ImportEnvironment {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ImportEnvironment").finish_non_exhaustive()
    }
}
