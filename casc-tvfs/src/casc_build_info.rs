use crate::error::CascError;
use crate::utility::dsv_file::DsvTable;
use std::collections::HashMap;
use std::path::Path;

/// One field of the active `.build.info` record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Variable {
    pub name: String,
    /// Declared type from the header, e.g. `STRING:0` or `HEX:16`.
    pub var_type: String,
    pub value: String,
}

/// The active record of a `.build.info` file.
///
/// The file is pipe-delimited; header cells read `Name!TYPE:size`, and each
/// following line describes one installed build. The record whose `Active`
/// field is `1` is the one in use. A file without an `Active` column must
/// hold exactly one record.
#[derive(Debug, Clone, Default)]
pub struct CascBuildInfo {
    variables: HashMap<String, Variable>,
}

impl CascBuildInfo {
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, CascError> {
        Self::from_table(DsvTable::from_file(path, '|', Some("#"))?)
    }

    pub fn parse(text: &str) -> Result<Self, CascError> {
        Self::from_table(DsvTable::from_reader(text.as_bytes(), '|', Some("#"))?)
    }

    fn from_table(table: DsvTable) -> Result<Self, CascError> {
        let columns = table
            .header()
            .iter()
            .map(|cell| match cell.split_once('!') {
                Some((name, var_type)) => Ok((name.to_string(), var_type.to_string())),
                None => Err(CascError::malformed(format!("build info column {cell:?} has no type"))),
            })
            .collect::<Result<Vec<_>, _>>()?;

        let active_column = columns.iter().position(|(name, _)| name == "Active");
        let record = match active_column {
            Some(column) => table.records().iter().find(|record| record[column] == "1"),
            None if table.records().len() == 1 => table.records().first(),
            None => None,
        }
        .ok_or_else(|| CascError::malformed("build info has no active record"))?;

        let variables = columns
            .into_iter()
            .zip(record)
            .map(|((name, var_type), value)| {
                let variable = Variable {
                    name: name.clone(),
                    var_type,
                    value: value.clone(),
                };
                (name, variable)
            })
            .collect();
        Ok(Self { variables })
    }

    pub fn variable(&self, name: &str) -> Option<&Variable> {
        self.variables.get(name)
    }

    /// The value of `name` in the active record, or `default_value` when absent.
    pub fn get(&self, name: &str, default_value: &str) -> String {
        self.variables
            .get(name)
            .map_or_else(|| default_value.to_string(), |var| var.value.clone())
    }

    /// Hex name of the build configuration file.
    pub fn build_key(&self) -> Result<&str, CascError> {
        self.variables
            .get("Build Key")
            .map(|var| var.value.as_str())
            .filter(|value| !value.is_empty())
            .ok_or_else(|| CascError::malformed("active build info record has no Build Key"))
    }
}
