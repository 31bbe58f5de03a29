use std::collections::HashMap;

/// Read-only lookup of notification type descriptions.
#[derive(Debug, Clone, Default)]
pub struct NotificationTypeCatalog {
    descriptions: HashMap<i64, String>,
}

impl NotificationTypeCatalog {
    pub fn new(descriptions: HashMap<i64, String>) -> Self {
        Self { descriptions }
    }

    pub fn describe(&self, type_id: i64) -> Option<&str> {
        self.descriptions.get(&type_id).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.descriptions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.descriptions.is_empty()
    }
}

impl FromIterator<(i64, String)> for NotificationTypeCatalog {
    fn from_iter<I: IntoIterator<Item = (i64, String)>>(iter: I) -> Self {
        Self::new(iter.into_iter().collect())
    }
}
