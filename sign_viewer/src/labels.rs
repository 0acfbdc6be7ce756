use crate::config::LabelsConfig;
use std::{
    collections::HashMap,
    fs::File,
    io::{self, BufRead},
};

/// Class-index to display-name table, read once at startup and immutable
/// for the process lifetime.
pub struct ClassLabelTable {
    names: HashMap<u32, String>,
}

impl ClassLabelTable {
    pub fn load(labels_cfg: &LabelsConfig) -> io::Result<Self> {
        let file = File::open(labels_cfg.get_path())?;
        let names = parse_labels(io::BufReader::new(file))?;

        Ok(Self { names })
    }

    /// Falls back to a literal "Unknown" for class indices the table does
    /// not carry.
    pub fn name_for(&self, class: u32) -> &str {
        self.names
            .get(&class)
            .map(String::as_str)
            .unwrap_or("Unknown")
    }
}

fn parse_labels(reader: impl BufRead) -> io::Result<HashMap<u32, String>> {
    let mut lines = reader.lines();

    // first row is the ClassId,Name header
    match lines.next() {
        Some(header) => {
            header?;
        }
        None => {
            return Err(io::Error::new(
                io::ErrorKind::InvalidData,
                "empty labels file",
            ));
        }
    }

    let mut names = HashMap::new();
    for line_result in lines {
        let line = line_result?;
        if line.trim().is_empty() {
            continue;
        }

        let (class_id, name) = line.split_once(',').ok_or_else(|| {
            io::Error::new(
                io::ErrorKind::InvalidData,
                format!("Invalid line format: {}", line),
            )
        })?;
        let class_id: u32 = class_id
            .trim()
            .parse()
            .map_err(|_| io::Error::new(io::ErrorKind::InvalidData, "Invalid class id"))?;

        names.insert(class_id, name.trim().to_string());
    }

    Ok(names)
}
