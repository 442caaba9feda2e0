use crate::content_key::ContentKey;
use crate::error::CascError;
use std::collections::HashMap;
use std::fs;
use std::path::Path;

/// Represents the build configuration of a CASC storage: `name = value...` lines.
#[derive(Debug, Clone, Default)]
pub struct CascConfig {
    variables: HashMap<String, Variable>,
}

/// Represents a variable in the CASC configuration, with a name and a list of values.
#[derive(Debug, Clone, Eq, PartialEq, Hash)]
pub struct Variable {
    pub name: String,
    pub values: Vec<String>,
}

impl CascConfig {
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, CascError> {
        Ok(Self::parse(&fs::read_to_string(path)?))
    }

    /// Parses configuration text. Blank lines, comments and lines without `=`
    /// are skipped.
    pub fn parse(text: &str) -> Self {
        let variables = text
            .lines()
            .map(str::trim)
            .filter(|line| !line.is_empty() && !line.starts_with('#'))
            .filter_map(|line| line.split_once('='))
            .map(|(name, value)| {
                let name = name.trim().to_string();
                let values = value.split_whitespace().map(str::to_string).collect();
                (name.clone(), Variable { name, values })
            })
            .collect();
        Self { variables }
    }

    pub fn get(&self, name: &str) -> Option<&Variable> {
        self.variables.get(name)
    }

    /// The key the TVFS root table is stored under: the encoding key, the
    /// second value of `vfs-root`.
    pub fn vfs_root_key(&self) -> Result<ContentKey, CascError> {
        self.encoding_key("vfs-root")?
            .ok_or_else(|| CascError::malformed("build config has no vfs-root"))
    }

    /// Encoding keys of every `vfs-N` sub-file-system root, ordered by `N`.
    pub fn nested_vfs_keys(&self) -> Result<Vec<ContentKey>, CascError> {
        let mut numbered = self
            .variables
            .keys()
            .filter_map(|name| {
                let number = name.strip_prefix("vfs-")?.parse::<u32>().ok()?;
                Some((number, name.as_str()))
            })
            .collect::<Vec<_>>();
        numbered.sort_unstable();

        let mut keys = Vec::with_capacity(numbered.len());
        for (_, name) in numbered {
            if let Some(key) = self.encoding_key(name)? {
                keys.push(key);
            }
        }
        Ok(keys)
    }

    fn encoding_key(&self, name: &str) -> Result<Option<ContentKey>, CascError> {
        let Some(variable) = self.variables.get(name) else {
            return Ok(None);
        };
        let value = variable.values.get(1).ok_or_else(|| {
            CascError::malformed(format!("{name} needs a content key and an encoding key"))
        })?;
        ContentKey::from_hex(value).map(Some)
    }
}
