//! Display implementations for Event and Filter

use crate::{Event, Filter};
use std::fmt;

/// Pretty-printed JSON, the way the event travels on the wire
impl fmt::Display for Event {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match serde_json::to_string_pretty(self) {
            Ok(json) => write!(f, "{}", json),
            Err(_) => write!(f, "<invalid Event>"),
        }
    }
}

/// Compact wire JSON, handy in log lines
impl fmt::Display for Filter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match serde_json::to_string(self) {
            Ok(json) => write!(f, "{}", json),
            Err(_) => write!(f, "<invalid Filter>"),
        }
    }
}
