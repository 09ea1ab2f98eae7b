use super::{DirectUploader, StorageBackend};

/// Optional behaviors a backend may implement.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Capability {
    DirectUpload,
}

impl Capability {
    pub const ALL: [Capability; 1] = [Capability::DirectUpload];

    const fn bit(self) -> u32 {
        1 << (self as u32)
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CapabilitySet(u32);

impl CapabilitySet {
    pub const fn empty() -> Self {
        Self(0)
    }

    pub fn insert(&mut self, cap: Capability) {
        self.0 |= cap.bit();
    }

    pub fn contains(&self, cap: Capability) -> bool {
        self.0 & cap.bit() != 0
    }

    pub fn is_empty(&self) -> bool {
        self.0 == 0
    }

    pub fn iter(&self) -> impl Iterator<Item = Capability> + '_ {
        Capability::ALL.into_iter().filter(|c| self.contains(*c))
    }
}

/// Returns the backend's direct upload implementation if it advertises one.
/// A missing capability is the common case and not an error.
pub fn probe_direct_upload(backend: &dyn StorageBackend) -> Option<&dyn DirectUploader> {
    if !backend.capabilities().contains(Capability::DirectUpload) {
        return None;
    }
    backend.direct_uploader()
}
