use std::collections::{BTreeMap, HashMap};

use crate::model::SecretRecord;

/// Key/value pairs stored under one secret name.
pub type SecretData = BTreeMap<String, String>;

/// Records grouped by secret name, iterated in first-seen name order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SecretBundles {
    order: Vec<String>,
    data: HashMap<String, SecretData>,
}

impl SecretBundles {
    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    #[cfg(test)]
    pub fn get(&self, name: &str) -> Option<&SecretData> {
        self.data.get(name)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.order.iter().map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &SecretData)> {
        self.order
            .iter()
            .filter_map(|name| self.data.get(name).map(|d| (name.as_str(), d)))
    }

    fn insert(&mut self, record: &SecretRecord) {
        if !self.data.contains_key(&record.name) {
            self.order.push(record.name.clone());
        }
        self.data
            .entry(record.name.clone())
            .or_default()
            .insert(record.key.clone(), record.value.clone());
    }
}

/// Group flat records into one bundle per secret name. A repeated key under
/// the same name keeps the last value.
pub fn group_secrets(records: &[SecretRecord]) -> SecretBundles {
    let mut bundles = SecretBundles::default();
    for record in records {
        bundles.insert(record);
    }
    bundles
}
