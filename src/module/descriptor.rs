use crate::error::{KernelError, Result};
use serde::{Deserialize, Deserializer, Serialize};

/// Identity and ordering constraints of a module.
///
/// `before`/`after` entries may name a module, a group or a tag; group and
/// tag references stand for every current member.
///
/// # Example
///
/// ```
/// use microkernel::ModuleDescriptor;
///
/// let descriptor = ModuleDescriptor::new("api")
///     .group("SERVICE")
///     .tag("HTTP")
///     .after("db");
/// assert_eq!(descriptor.after, vec!["db"]);
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModuleDescriptor {
    pub name: String,
    #[serde(default)]
    pub group: Option<String>,
    #[serde(default, alias = "tag", deserialize_with = "one_or_many")]
    pub tags: Vec<String>,
    #[serde(default, deserialize_with = "one_or_many")]
    pub before: Vec<String>,
    #[serde(default, deserialize_with = "one_or_many")]
    pub after: Vec<String>,
}

/// A bare string or a list of strings
#[derive(Deserialize)]
#[serde(untagged)]
enum OneOrMany {
    One(String),
    Many(Vec<String>),
}

fn one_or_many<'de, D>(deserializer: D) -> std::result::Result<Vec<String>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match OneOrMany::deserialize(deserializer)? {
        OneOrMany::One(single) => vec![single],
        OneOrMany::Many(list) => list,
    })
}

impl ModuleDescriptor {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    pub fn group(mut self, group: impl Into<String>) -> Self {
        self.group = Some(group.into());
        self
    }

    pub fn tag(mut self, tag: impl Into<String>) -> Self {
        self.tags.push(tag.into());
        self
    }

    /// This module must run before `reference` (module, group or tag)
    pub fn before(mut self, reference: impl Into<String>) -> Self {
        self.before.push(reference.into());
        self
    }

    /// This module must run after `reference` (module, group or tag)
    pub fn after(mut self, reference: impl Into<String>) -> Self {
        self.after.push(reference.into());
        self
    }

    /// Reject descriptors the registry cannot manage.
    pub fn validate(&self, groups: &[String]) -> Result<()> {
        if self.name.trim().is_empty() {
            return Err(KernelError::configuration(
                "invalid module: descriptor has no name",
            ));
        }
        if let Some(group) = &self.group {
            if !groups.iter().any(|g| g == group) {
                return Err(KernelError::UnknownGroup {
                    module: self.name.clone(),
                    group: group.clone(),
                });
            }
        }
        let blank = self
            .tags
            .iter()
            .chain(&self.before)
            .chain(&self.after)
            .any(|r| r.trim().is_empty());
        if blank {
            return Err(KernelError::configuration(format!(
                "invalid module {}: empty tag or ordering reference",
                self.name
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;

    fn groups() -> Vec<String> {
        vec!["RESOURCE".into(), "SERVICE".into()]
    }

    #[test]
    fn test_validate_accepts_known_group() {
        ModuleDescriptor::new("db")
            .group("RESOURCE")
            .validate(&groups())
            .unwrap();
    }

    #[test]
    fn test_validate_rejects_unknown_group() {
        let err = ModuleDescriptor::new("db")
            .group("NOPE")
            .validate(&groups())
            .unwrap_err();
        assert!(matches!(err, KernelError::UnknownGroup { .. }));
        assert_eq!(err.kind(), ErrorKind::Configuration);
    }

    #[test]
    fn test_validate_rejects_missing_name() {
        let err = ModuleDescriptor::default().validate(&groups()).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Configuration);
    }

    #[test]
    fn test_deserialize_tag_alias() {
        let descriptor: ModuleDescriptor =
            serde_json::from_str(r#"{ "name": "api", "tag": ["HTTP"], "after": ["db"] }"#)
                .unwrap();
        assert_eq!(descriptor.tags, vec!["HTTP"]);
        assert_eq!(descriptor.after, vec!["db"]);
        assert_eq!(descriptor.group, None);
    }

    #[test]
    fn test_deserialize_single_strings() {
        let descriptor: ModuleDescriptor = serde_json::from_str(
            r#"{ "name": "api", "tag": "HTTP", "before": "cache", "after": "db" }"#,
        )
        .unwrap();
        assert_eq!(descriptor.tags, vec!["HTTP"]);
        assert_eq!(descriptor.before, vec!["cache"]);
        assert_eq!(descriptor.after, vec!["db"]);
    }

    #[test]
    fn test_deserialize_rejects_non_string_reference() {
        let err = serde_json::from_str::<ModuleDescriptor>(r#"{ "name": "api", "after": 3 }"#);
        assert!(err.is_err());
    }
}
