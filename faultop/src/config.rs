//! Injector configuration: a JSON array of entries, accepted either as an
//! inline document or as a path to a file containing one.

use std::fs;
use std::path::Path;

use serde::Deserialize;

use crate::error::Error;

/// One configuration entry. The duration budget is not part of the document;
/// it is derived from observation count × effective tick period and injected
/// when specs are built.
#[derive(Debug, Clone, Deserialize)]
pub struct InjectorEntry {
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default)]
    pub tag: String,
    /// Memory variant: elements per allocation chunk.
    #[serde(default, alias = "items_for_loop")]
    pub chunk_items: Option<usize>,
    /// CPU variant: explicit target core; the tag's embedded integer is the
    /// fallback when absent.
    #[serde(default)]
    pub core: Option<usize>,
}

/// Parse `input` as a JSON document; failing that, treat it as a file path.
pub fn load_entries(input: &str) -> Result<Vec<InjectorEntry>, Error> {
    match serde_json::from_str(input) {
        Ok(entries) => Ok(entries),
        Err(parse_err) => {
            let path = Path::new(input);
            if path.exists() {
                let data = fs::read_to_string(path)?;
                Ok(serde_json::from_str(&data)?)
            } else {
                Err(Error::Config(format!(
                    "input is neither a JSON document nor a readable path: {parse_err}"
                )))
            }
        }
    }
}
