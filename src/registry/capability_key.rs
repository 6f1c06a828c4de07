use serde::{Deserialize, Serialize};
use std::fmt;

/// Composite lookup key built from capability attributes, e.g.
/// `KVM-SftpBackupStorage` for a {hypervisor, backup storage} pair
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CapabilityKey(String);

impl CapabilityKey {
    pub const SEPARATOR: &'static str = "-";

    pub fn new<I, S>(parts: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let parts: Vec<String> = parts.into_iter().map(|p| p.as_ref().to_string()).collect();
        Self(parts.join(Self::SEPARATOR))
    }

    pub fn single(part: impl AsRef<str>) -> Self {
        Self(part.as_ref().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for CapabilityKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parts_joined_in_order() {
        let key = CapabilityKey::new(["KVM", "SftpBackupStorage"]);
        assert_eq!(key.as_str(), "KVM-SftpBackupStorage");
        assert_ne!(key, CapabilityKey::new(["SftpBackupStorage", "KVM"]));
    }
}
