use serde::{Deserialize, Serialize};

/// Contact submitted by the front-end.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncRecord {
    pub name: String,
    /// Accepted but not written to the sheet.
    #[serde(default)]
    pub email: String,
    pub phone: String,
}

impl SyncRecord {
    /// Spreadsheet row in column order: name, phone, and an empty third cell.
    pub fn to_row(&self) -> [&str; 3] {
        [self.name.as_str(), self.phone.as_str(), ""]
    }
}
