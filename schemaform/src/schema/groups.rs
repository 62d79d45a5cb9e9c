//! Display group classification of top-level fields.

use serde::Serialize;

use crate::schema::field::FieldTree;

/// Named display bucket.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum FieldGroup {
    Connection,
    DataSelection,
    Destination,
    /// Catch-all for unclassified fields.
    Configuration,
    /// Group named explicitly by the schema.
    Custom(String),
}

impl FieldGroup {
    /// Fixed display precedence of the built-in groups.
    pub const PRECEDENCE: [FieldGroup; 4] = [
        FieldGroup::Connection,
        FieldGroup::DataSelection,
        FieldGroup::Destination,
        FieldGroup::Configuration,
    ];

    pub fn name(&self) -> &str {
        match self {
            FieldGroup::Connection => "Connection",
            FieldGroup::DataSelection => "Data Selection",
            FieldGroup::Destination => "Destination",
            FieldGroup::Configuration => "Configuration",
            FieldGroup::Custom(name) => name,
        }
    }

    /// Map an explicit group tag, folding built-in names onto their variants.
    pub fn from_name(name: &str) -> Self {
        Self::PRECEDENCE
            .into_iter()
            .find(|g| g.name() == name)
            .unwrap_or_else(|| FieldGroup::Custom(name.to_string()))
    }

    /// Ordering heuristic: 1-4 connection, 5-7 data selection, 8+ destination.
    pub fn from_property_order(order: i64) -> Option<Self> {
        match order {
            1..=4 => Some(FieldGroup::Connection),
            5..=7 => Some(FieldGroup::DataSelection),
            8.. => Some(FieldGroup::Destination),
            _ => None,
        }
    }

    fn rank(&self) -> usize {
        Self::PRECEDENCE
            .iter()
            .position(|g| g == self)
            .unwrap_or(Self::PRECEDENCE.len())
    }
}

impl Serialize for FieldGroup {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.name())
    }
}

/// One labeled section of a reorganized layout.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Section {
    pub group: FieldGroup,
    pub keys: Vec<String>,
}

/// Group -> ordered field keys, groups in first-seen order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FieldGroups {
    groups: Vec<(FieldGroup, Vec<String>)>,
}

impl FieldGroups {
    /// Classify the top-level fields of a schema.
    pub fn classify(fields: &FieldTree) -> Self {
        let mut groups = FieldGroups::default();
        for field in &fields.fields {
            let group = field
                .group_tag
                .as_deref()
                .map(FieldGroup::from_name)
                .or_else(|| field.property_order.and_then(FieldGroup::from_property_order))
                .unwrap_or(FieldGroup::Configuration);
            groups.push(group, &field.key);
        }
        groups
    }

    fn push(&mut self, group: FieldGroup, key: &str) {
        match self.groups.iter_mut().find(|(g, _)| *g == group) {
            Some((_, keys)) => keys.push(key.to_string()),
            None => self.groups.push((group, vec![key.to_string()])),
        }
    }

    pub fn len(&self) -> usize {
        self.groups.len()
    }

    pub fn is_empty(&self) -> bool {
        self.groups.is_empty()
    }

    /// Keys classified into `group`.
    pub fn get(&self, group: &FieldGroup) -> Option<&[String]> {
        self.groups
            .iter()
            .find(|(g, _)| g == group)
            .map(|(_, keys)| keys.as_slice())
    }

    /// Sections for a grouped layout.
    ///
    /// Returns `None` when there is at most one group: the default
    /// single-column layout stays as it is. Built-in groups come first in
    /// fixed precedence, custom groups follow in first-seen order.
    pub fn organize_sections(&self) -> Option<Vec<Section>> {
        if self.groups.len() <= 1 {
            return None;
        }
        let mut sections: Vec<Section> = self
            .groups
            .iter()
            .map(|(group, keys)| Section {
                group: group.clone(),
                keys: keys.clone(),
            })
            .collect();
        // stable: custom groups keep their relative order
        sections.sort_by_key(|s| s.group.rank());
        Some(sections)
    }
}
