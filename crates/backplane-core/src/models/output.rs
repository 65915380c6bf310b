//! Command output model

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Result of an executed command.
///
/// Every backend answers with one of these three shapes so consumers never
/// need backend-specific decoding.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "snake_case")]
pub enum CommandOutput {
    /// Ordered sequence of strings
    List(Vec<String>),
    /// A single string
    Scalar(String),
    /// String-to-string mapping, ordered by key
    Map(BTreeMap<String, String>),
}

impl CommandOutput {
    /// Sort list output in place; scalars and maps are left untouched
    pub fn sorted(self) -> Self {
        match self {
            CommandOutput::List(mut items) => {
                items.sort();
                CommandOutput::List(items)
            }
            other => other,
        }
    }

    /// Number of items carried by this output
    pub fn len(&self) -> usize {
        match self {
            CommandOutput::List(items) => items.len(),
            CommandOutput::Scalar(_) => 1,
            CommandOutput::Map(map) => map.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sorted_orders_lists_only() {
        let list = CommandOutput::List(vec!["Sports".into(), "Books".into()]).sorted();
        assert_eq!(list, CommandOutput::List(vec!["Books".into(), "Sports".into()]));

        let scalar = CommandOutput::Scalar("b a".into()).sorted();
        assert_eq!(scalar, CommandOutput::Scalar("b a".into()));
    }

    #[test]
    fn serializes_with_type_tag() {
        let json = serde_json::to_value(CommandOutput::Scalar("42".into())).unwrap();
        assert_eq!(json, serde_json::json!({"type": "scalar", "value": "42"}));
    }
}
