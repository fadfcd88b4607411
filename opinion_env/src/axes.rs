//! Opinion axes: what each column of the opinion matrix means.

use serde::{Deserialize, Serialize};

/// One opinion dimension. 0.0 agrees with `con`, 1.0 with `pro`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OpinionAxis {
    pub name: String,
    pub pro: String,
    pub con: String,
}

impl OpinionAxis {
    pub fn new(name: impl Into<String>, pro: impl Into<String>, con: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            pro: pro.into(),
            con: con.into(),
        }
    }

    /// Statement closest to `value`, or `None` inside the neutral band [0.4, 0.6].
    pub fn leaning(&self, value: f64) -> Option<&str> {
        if value > 0.6 {
            Some(&self.pro)
        } else if value < 0.4 {
            Some(&self.con)
        } else {
            None
        }
    }
}

impl Default for OpinionAxis {
    fn default() -> Self {
        Self::new(
            "Pineapple on pizza",
            "Pineapple belongs on pizza",
            "Pineapple does not belong on pizza",
        )
    }
}
