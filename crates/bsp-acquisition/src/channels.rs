//! Synthetic fields appended after the raw device channels

/// Name of the pass-through timestamp field
pub const TIMESTAMP_CHANNEL: &str = "LSL_timestamp";

/// Name of the trigger field; always the last field of a record
pub const TRIGGER_CHANNEL: &str = "TRG";

/// Fixed, ordered list of appended field names: `[timestamp?] ++ [trigger]`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AppendedChannels {
    include_timestamp: bool,
}

impl AppendedChannels {
    pub fn new(include_timestamp: bool) -> Self {
        Self { include_timestamp }
    }

    pub fn includes_timestamp(&self) -> bool {
        self.include_timestamp
    }

    pub fn names(&self) -> Vec<&'static str> {
        let mut names = Vec::with_capacity(2);
        if self.include_timestamp {
            names.push(TIMESTAMP_CHANNEL);
        }
        names.push(TRIGGER_CHANNEL);
        names
    }

    pub fn len(&self) -> usize {
        1 + usize::from(self.include_timestamp)
    }

    /// Never empty: the trigger field is always present
    pub fn is_empty(&self) -> bool {
        false
    }

    /// `raw` followed by the appended names
    pub fn append_to(&self, raw: &[String]) -> Vec<String> {
        raw.iter()
            .cloned()
            .chain(self.names().into_iter().map(String::from))
            .collect()
    }
}
