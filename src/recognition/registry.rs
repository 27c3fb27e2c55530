use std::{collections::HashMap, fs, path::Path};

use anyhow::{bail, Context, Result};
use serde::Deserialize;

/// One enrolled identity: stable id, display name, reference descriptor.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IdentityProfile {
    pub id: i64,
    pub name: String,
    pub descriptor: Vec<f32>,
}

/// Known-identity registry, loaded once per process and immutable for the
/// lifetime of every session. Enrollment happens elsewhere; this only reads
/// the exported descriptor file.
#[derive(Debug)]
pub struct IdentityRegistry {
    profiles: HashMap<i64, IdentityProfile>,
}

impl IdentityRegistry {
    pub fn load(path: &Path) -> Result<Self> {
        let contents = fs::read_to_string(path)
            .with_context(|| format!("failed to read identity registry {}", path.display()))?;
        let profiles: Vec<IdentityProfile> = serde_json::from_str(&contents)
            .with_context(|| format!("failed to parse identity registry {}", path.display()))?;
        Self::from_profiles(profiles)
    }

    pub fn from_profiles(profiles: Vec<IdentityProfile>) -> Result<Self> {
        let mut by_id = HashMap::with_capacity(profiles.len());
        for profile in profiles {
            if profile.descriptor.is_empty() {
                bail!("identity {} ({}) has an empty descriptor", profile.id, profile.name);
            }
            if by_id.insert(profile.id, profile).is_some() {
                bail!("duplicate identity id in registry");
            }
        }
        Ok(Self { profiles: by_id })
    }

    pub fn get(&self, identity_id: i64) -> Option<&IdentityProfile> {
        self.profiles.get(&identity_id)
    }

    pub fn name_of(&self, identity_id: i64) -> Option<&str> {
        self.profiles.get(&identity_id).map(|p| p.name.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = &IdentityProfile> {
        self.profiles.values()
    }

    pub fn len(&self) -> usize {
        self.profiles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.profiles.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn profile(id: i64, name: &str) -> IdentityProfile {
        IdentityProfile {
            id,
            name: name.into(),
            descriptor: vec![1.0, 0.0],
        }
    }

    #[test]
    fn rejects_duplicate_ids() {
        let result = IdentityRegistry::from_profiles(vec![profile(1, "A"), profile(1, "B")]);
        assert!(result.is_err());
    }

    #[test]
    fn rejects_empty_descriptors() {
        let result = IdentityRegistry::from_profiles(vec![IdentityProfile {
            id: 1,
            name: "A".into(),
            descriptor: vec![],
        }]);
        assert!(result.is_err());
    }

    #[test]
    fn looks_up_by_id() {
        let registry =
            IdentityRegistry::from_profiles(vec![profile(1, "Sana"), profile(2, "Ravi")]).unwrap();
        assert_eq!(registry.len(), 2);
        assert_eq!(registry.name_of(2), Some("Ravi"));
        assert!(registry.get(3).is_none());
    }
}
