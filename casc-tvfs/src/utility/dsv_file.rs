use crate::error::CascError;
use std::fs::File;
use std::io::{BufRead, BufReader, Read};
use std::path::Path;

/// A delimiter separated value table such as `.build.info`.
#[derive(Debug, Default)]
pub(crate) struct DsvTable {
    header: Vec<String>,
    records: Vec<Vec<String>>,
}

impl DsvTable {
    pub(crate) fn from_file<P: AsRef<Path>>(path: P, delimiter: char, comment: Option<&str>) -> Result<Self, CascError> {
        Self::from_reader(File::open(path)?, delimiter, comment)
    }

    /// Reads rows from `reader`. The first non-blank, non-comment line is the header.
    pub(crate) fn from_reader<R: Read>(reader: R, delimiter: char, comment: Option<&str>) -> Result<Self, CascError> {
        let comment = comment.filter(|c| !c.is_empty());
        let mut rows = Vec::new();
        for line in BufReader::new(reader).lines() {
            let line = line?;
            let line = line.trim_end_matches(['\r', '\n']);
            if line.trim().is_empty() || comment.is_some_and(|c| line.starts_with(c)) {
                continue;
            }
            rows.push(line.split(delimiter).map(|cell| cell.trim().to_string()).collect::<Vec<_>>());
        }

        let mut rows = rows.into_iter();
        let header = rows
            .next()
            .ok_or_else(|| CascError::malformed("delimited table has no header line"))?;
        let records: Vec<Vec<String>> = rows.collect();
        if let Some(bad) = records.iter().position(|record| record.len() != header.len()) {
            return Err(CascError::malformed(format!(
                "record {} has {} fields, header has {}",
                bad + 1,
                records[bad].len(),
                header.len()
            )));
        }
        Ok(Self { header, records })
    }

    pub(crate) fn header(&self) -> &[String] {
        &self.header
    }

    pub(crate) fn records(&self) -> &[Vec<String>] {
        &self.records
    }
}
