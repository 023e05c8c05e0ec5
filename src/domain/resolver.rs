//! Reference resolution
//!
//! Source records point at each other with free text: a topic names its
//! parent, an outcome names its topic, a skill-bit names its outcome by text
//! or URL. A [`ReferenceTable`] maps every label and URL registered so far
//! to the canonical entity ID. Lookups try the reference verbatim first and
//! then with surrounding whitespace trimmed. Entity IDs are kept apart and
//! only consulted once no label or URL matches, so a slug can never shadow
//! another entity's exact label. What happens on a miss is the caller's
//! policy.

use std::collections::HashMap;

use super::id::EntityId;

/// Lookup from label, URL or ID to canonical entity ID
#[derive(Debug, Clone, Default)]
pub struct ReferenceTable {
    entries: HashMap<String, EntityId>,
    ids: HashMap<String, EntityId>,
}

fn lookup<'t>(table: &'t HashMap<String, EntityId>, reference: &str) -> Option<&'t EntityId> {
    table
        .get(reference)
        .or_else(|| table.get(reference.trim()))
}

impl ReferenceTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `key` (and its trimmed form) for `id`
    ///
    /// The first entity registered under a key keeps it. Returns false if
    /// the key was blank or already taken.
    pub fn register(&mut self, key: &str, id: &EntityId) -> bool {
        insert_variants(&mut self.entries, key, id)
    }

    /// Registers an entity under its original label and URL, with its ID
    /// as a fallback key
    pub fn register_entity(&mut self, id: &EntityId, label: &str, url: Option<&str>) {
        self.register(label, id);
        if let Some(url) = url {
            self.register(url, id);
        }
        insert_variants(&mut self.ids, id.as_str(), id);
    }

    /// Resolves a reference against labels and URLs, then against IDs
    ///
    /// Each table is tried verbatim first, then with the trimmed variant.
    pub fn resolve(&self, reference: &str) -> Option<&EntityId> {
        self.resolve_label(reference)
            .or_else(|| lookup(&self.ids, reference))
    }

    /// Resolves against labels and URLs only
    pub fn resolve_label(&self, reference: &str) -> Option<&EntityId> {
        lookup(&self.entries, reference)
    }

    /// Resolves the first reference in preference order that matches
    pub fn resolve_first<'r>(&self, references: impl IntoIterator<Item = &'r str>) -> Option<&EntityId> {
        references.into_iter().find_map(|r| self.resolve(r))
    }

    pub fn contains(&self, reference: &str) -> bool {
        self.resolve(reference).is_some()
    }

    pub fn len(&self) -> usize {
        self.entries.len() + self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty() && self.ids.is_empty()
    }
}

fn insert_variants(table: &mut HashMap<String, EntityId>, key: &str, id: &EntityId) -> bool {
    let trimmed = key.trim();
    if trimmed.is_empty() {
        return false;
    }

    let mut inserted = false;
    for variant in [key, trimmed] {
        if !table.contains_key(variant) {
            table.insert(variant.to_string(), id.clone());
            inserted = true;
        }
    }
    inserted
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resolves_by_label_url_and_id() {
        let mut table = ReferenceTable::new();
        let id = EntityId::new("algebra");
        table.register_entity(&id, "Algebra", Some("https://example.org/topic/42"));

        assert_eq!(table.resolve("Algebra"), Some(&id));
        assert_eq!(table.resolve("https://example.org/topic/42"), Some(&id));
        assert_eq!(table.resolve("algebra"), Some(&id));
        assert_eq!(table.resolve("Geometry"), None);
    }

    #[test]
    fn falls_back_to_trimmed_reference() {
        let mut table = ReferenceTable::new();
        let id = EntityId::new("algebra");
        table.register("Algebra", &id);

        assert_eq!(table.resolve("  Algebra\n"), Some(&id));
    }

    #[test]
    fn untrimmed_registration_matches_trimmed_lookup() {
        let mut table = ReferenceTable::new();
        let id = EntityId::new("algebra");
        table.register(" Algebra ", &id);

        assert_eq!(table.resolve("Algebra"), Some(&id));
        assert_eq!(table.resolve(" Algebra "), Some(&id));
    }

    #[test]
    fn first_registration_wins() {
        let mut table = ReferenceTable::new();
        let first = EntityId::new("numbers");
        let second = EntityId::new("numbers-2");

        assert!(table.register("Numbers", &first));
        assert!(!table.register("Numbers", &second));
        assert_eq!(table.resolve("Numbers"), Some(&first));
    }

    #[test]
    fn labels_take_precedence_over_earlier_ids() {
        let mut table = ReferenceTable::new();
        let math_algebra = EntityId::new("algebra");
        let art_algebra = EntityId::new("algebra-2");
        table.register_entity(&math_algebra, "Algebra", None);
        table.register_entity(&art_algebra, "algebra", None);

        assert_eq!(table.resolve("algebra"), Some(&art_algebra));
        assert_eq!(table.resolve("Algebra"), Some(&math_algebra));
        assert_eq!(table.resolve("algebra-2"), Some(&art_algebra));
        assert_eq!(table.resolve_label("algebra-2"), None);
    }

    #[test]
    fn blank_keys_are_ignored() {
        let mut table = ReferenceTable::new();
        assert!(!table.register("   ", &EntityId::new("x")));
        assert!(table.is_empty());
        assert!(!table.contains(""));
    }

    #[test]
    fn resolve_first_respects_preference_order() {
        let mut table = ReferenceTable::new();
        let a = EntityId::new("a");
        let b = EntityId::new("b");
        table.register("A", &a);
        table.register("B", &b);

        assert_eq!(table.resolve_first(["missing", "B", "A"]), Some(&b));
        assert_eq!(table.resolve_first(["missing"]), None);
    }
}
