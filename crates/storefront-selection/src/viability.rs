use std::collections::BTreeMap;

use serde::Serialize;
use storefront_core::{ListingRef, Operation};

/// Whether the selected operations can go into one consistent plan.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Viability {
    Empty,
    Single { operation: Operation, count: usize },
    /// An install of something already present turns into an update, so the
    /// two mix.
    InstallOrUpdate { count: usize },
    NotViable { operations: Vec<Operation> },
}

impl Viability {
    pub fn from_grouping(grouping: &BTreeMap<Operation, Vec<ListingRef>>) -> Self {
        let groups: Vec<(Operation, usize)> = grouping
            .iter()
            .filter(|(operation, items)| !operation.is_none() && !items.is_empty())
            .map(|(operation, items)| (*operation, items.len()))
            .collect();

        match groups.as_slice() {
            [] => Self::Empty,
            [(operation, count)] => Self::Single {
                operation: *operation,
                count: *count,
            },
            [(Operation::Install, installs), (Operation::Update, updates)] => {
                Self::InstallOrUpdate {
                    count: installs + updates,
                }
            }
            _ => Self::NotViable {
                operations: groups.iter().map(|(operation, _)| *operation).collect(),
            },
        }
    }

    pub fn is_viable(&self) -> bool {
        !matches!(self, Self::NotViable { .. })
    }

    pub fn message(&self) -> String {
        match self {
            Self::Empty => "No items selected".to_string(),
            Self::Single { operation, count } => {
                format!("{} selected for {}", items(*count), operation.verb())
            }
            Self::InstallOrUpdate { count } => {
                format!("{} selected for install or update", items(*count))
            }
            Self::NotViable { operations } => format!(
                "Cannot {} in one operation; select listings for a single kind of change",
                operations
                    .iter()
                    .map(|operation| operation.verb())
                    .collect::<Vec<_>>()
                    .join(" and ")
            ),
        }
    }
}

fn items(count: usize) -> String {
    if count == 1 {
        "1 item".to_string()
    } else {
        format!("{count} items")
    }
}
