use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::str::FromStr;

/// Scope required for every SSH certificate operation.
pub const SCOPE_SSH: &str = "ssh:manage";

/// Parsed token scope in `resource:action,action;resource:action` form.
///
/// A resource listed without actions grants only the bare resource.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Scope {
    grants: BTreeMap<String, BTreeSet<String>>,
}

impl Scope {
    pub fn parse(value: &str) -> Self {
        let mut grants: BTreeMap<String, BTreeSet<String>> = BTreeMap::new();
        for part in value.split(';').flat_map(groups) {
            let (resource, actions) = match part.split_once(':') {
                Some((resource, actions)) => (resource, actions),
                None => (part.as_str(), ""),
            };
            let resource = resource.trim().to_ascii_lowercase();
            if resource.is_empty() {
                continue;
            }
            let entry = grants.entry(resource).or_default();
            entry.extend(
                actions
                    .split(',')
                    .map(|a| a.trim().to_ascii_lowercase())
                    .filter(|a| !a.is_empty()),
            );
        }
        Self { grants }
    }

    pub fn is_empty(&self) -> bool {
        self.grants.is_empty()
    }

    /// True when every resource/action in `required` is granted here.
    pub fn contains(&self, required: &Scope) -> bool {
        required.grants.iter().all(|(resource, actions)| {
            self.grants
                .get(resource)
                .is_some_and(|granted| actions.is_subset(granted))
        })
    }
}

/// Splits on whitespace between `resource:actions` groups. A word stays in
/// the current group while the action list is still open, i.e. the group
/// ends with `:` or `,` or the word starts with `,`.
fn groups(value: &str) -> Vec<String> {
    let mut groups: Vec<String> = Vec::new();
    for word in value.split_whitespace() {
        match groups.last_mut() {
            Some(last) if last.ends_with([':', ',']) || word.starts_with(',') => {
                last.push_str(word)
            }
            _ => groups.push(word.to_string()),
        }
    }
    groups
}

impl FromStr for Scope {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Scope::parse(s))
    }
}

impl fmt::Display for Scope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut first = true;
        for (resource, actions) in &self.grants {
            if !first {
                f.write_str(";")?;
            }
            first = false;
            f.write_str(resource)?;
            if !actions.is_empty() {
                let joined: Vec<&str> = actions.iter().map(String::as_str).collect();
                write!(f, ":{}", joined.join(","))?;
            }
        }
        Ok(())
    }
}
