//! Artist alias canonicalization.
//!
//! Alias groups are ordered name lists whose first entry is the canonical
//! (primary) name. The resolver is built once from the configuration and is
//! read-only afterwards.

use std::collections::HashMap;
use std::fmt;

use super::normalize::fold;

/// Problem found in the alias table
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AliasWarning {
    /// A group without any names
    EmptyGroup { group: usize },

    /// The same alias appears in two groups
    DuplicateAlias {
        alias: String,
        first_group: usize,
        second_group: usize,
    },

    /// A primary name is listed as a non-primary alias of another group
    PrimaryConflict {
        name: String,
        primary_group: usize,
        alias_group: usize,
    },
}

impl fmt::Display for AliasWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::EmptyGroup { group } => write!(f, "alias group {} is empty", group),
            Self::DuplicateAlias {
                alias,
                first_group,
                second_group,
            } => write!(
                f,
                "alias '{}' appears in groups {} and {}",
                alias, first_group, second_group
            ),
            Self::PrimaryConflict {
                name,
                primary_group,
                alias_group,
            } => write!(
                f,
                "primary '{}' of group {} is an alias in group {}",
                name, primary_group, alias_group
            ),
        }
    }
}

/// Check an alias table for empty groups and cross-group conflicts
pub fn validate_alias_groups(groups: &[Vec<String>]) -> Vec<AliasWarning> {
    let mut warnings = Vec::new();
    // folded name -> (group, position)
    let mut seen: HashMap<String, (usize, usize)> = HashMap::new();

    for (group_idx, group) in groups.iter().enumerate() {
        if group.iter().all(|name| name.trim().is_empty()) {
            warnings.push(AliasWarning::EmptyGroup { group: group_idx });
            continue;
        }

        for (position, name) in group.iter().enumerate() {
            let key = fold(name);
            if key.is_empty() {
                continue;
            }

            match seen.get(&key) {
                None => {
                    seen.insert(key, (group_idx, position));
                }
                Some(&(first_group, _)) if first_group == group_idx => {}
                Some(&(first_group, first_position)) => {
                    let warning = if first_position == 0 && position != 0 {
                        AliasWarning::PrimaryConflict {
                            name: name.clone(),
                            primary_group: first_group,
                            alias_group: group_idx,
                        }
                    } else if position == 0 && first_position != 0 {
                        AliasWarning::PrimaryConflict {
                            name: name.clone(),
                            primary_group: group_idx,
                            alias_group: first_group,
                        }
                    } else {
                        AliasWarning::DuplicateAlias {
                            alias: name.clone(),
                            first_group,
                            second_group: group_idx,
                        }
                    };
                    warnings.push(warning);
                }
            }
        }
    }

    warnings
}

/// Read-only alias lookup table
#[derive(Debug, Clone, Default)]
pub struct AliasResolver {
    /// folded alias -> index into `primaries`
    index: HashMap<String, usize>,
    primaries: Vec<String>,
}

impl AliasResolver {
    /// Build the lookup table. When an alias is listed in several groups the
    /// first group wins.
    pub fn new(groups: &[Vec<String>]) -> Self {
        let mut index = HashMap::new();
        let mut primaries = Vec::new();

        for group in groups {
            let Some(primary) = group.iter().find(|n| !n.trim().is_empty()) else {
                continue;
            };
            let primary_idx = primaries.len();
            primaries.push(primary.trim().to_string());

            for name in group {
                let key = fold(name);
                if !key.is_empty() {
                    index.entry(key).or_insert(primary_idx);
                }
            }
        }

        Self { index, primaries }
    }

    /// Canonical name for `name`, or `name` unchanged when it is not an alias
    pub fn resolve(&self, name: &str) -> String {
        match self.index.get(&fold(name)) {
            Some(&idx) => self.primaries[idx].clone(),
            None => name.to_string(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.primaries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn groups() -> Vec<Vec<String>> {
        vec![
            vec!["Aphex Twin".into(), "AFX".into(), "Polygon Window".into()],
            vec!["Björk".into(), "Bjork Gudmundsdottir".into()],
        ]
    }

    #[test]
    fn test_resolve_alias_to_primary() {
        let resolver = AliasResolver::new(&groups());
        assert_eq!(resolver.resolve("afx"), "Aphex Twin");
        assert_eq!(resolver.resolve("  POLYGON   window "), "Aphex Twin");
        assert_eq!(resolver.resolve("bjork"), "Björk");
    }

    #[test]
    fn test_unknown_name_unchanged() {
        let resolver = AliasResolver::new(&groups());
        assert_eq!(resolver.resolve("Autechre"), "Autechre");
        assert!(AliasResolver::default().is_empty());
    }

    #[test]
    fn test_validate_clean_table() {
        assert!(validate_alias_groups(&groups()).is_empty());
    }

    #[test]
    fn test_validate_reports_problems() {
        let table = vec![
            vec!["Aphex Twin".into(), "AFX".into()],
            vec![],
            vec!["Caustic Window".into(), "Aphex Twin".into()],
            vec!["The Tuss".into(), "afx".into()],
        ];
        let warnings = validate_alias_groups(&table);

        assert_eq!(warnings.len(), 3);
        assert_eq!(warnings[0], AliasWarning::EmptyGroup { group: 1 });
        assert!(matches!(
            warnings[1],
            AliasWarning::PrimaryConflict {
                primary_group: 0,
                alias_group: 2,
                ..
            }
        ));
        assert!(matches!(
            warnings[2],
            AliasWarning::DuplicateAlias {
                first_group: 0,
                second_group: 3,
                ..
            }
        ));
    }
}
