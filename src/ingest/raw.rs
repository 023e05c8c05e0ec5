//! Raw input shapes
//!
//! Two incompatible layouts are supported:
//! - **split**: four collections that already look like the canonical
//!   entities, but may miss IDs, timestamps or valid references
//! - **combined**: one document of free-text records that reference each
//!   other by label or URL
//!
//! Every field is optional here; the normalizers decide what a missing
//! value means.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer};

/// A reference field that may be a single string, a list of strings or null
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StringList(pub Vec<String>);

impl StringList {
    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.0.iter().map(String::as_str)
    }

    /// Entries with surrounding whitespace removed, blanks skipped
    pub fn cleaned(&self) -> impl Iterator<Item = &str> {
        self.0.iter().map(|s| s.trim()).filter(|s| !s.is_empty())
    }

    /// First non-blank entry
    pub fn first(&self) -> Option<&str> {
        self.cleaned().next()
    }

    pub fn is_empty(&self) -> bool {
        self.cleaned().next().is_none()
    }
}

impl<const N: usize> From<[&str; N]> for StringList {
    fn from(items: [&str; N]) -> Self {
        Self(items.iter().map(|s| s.to_string()).collect())
    }
}

impl<'de> Deserialize<'de> for StringList {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        use serde::de::{SeqAccess, Visitor};

        struct StringListVisitor;

        impl<'de> Visitor<'de> for StringListVisitor {
            type Value = StringList;

            fn expecting(&self, formatter: &mut std::fmt::Formatter) -> std::fmt::Result {
                formatter.write_str("a string, a list of strings or null")
            }

            fn visit_str<E>(self, v: &str) -> Result<Self::Value, E>
            where
                E: serde::de::Error,
            {
                Ok(StringList(vec![v.to_string()]))
            }

            fn visit_i64<E>(self, v: i64) -> Result<Self::Value, E>
            where
                E: serde::de::Error,
            {
                Ok(StringList(vec![v.to_string()]))
            }

            fn visit_u64<E>(self, v: u64) -> Result<Self::Value, E>
            where
                E: serde::de::Error,
            {
                Ok(StringList(vec![v.to_string()]))
            }

            fn visit_unit<E>(self) -> Result<Self::Value, E>
            where
                E: serde::de::Error,
            {
                Ok(StringList::default())
            }

            fn visit_none<E>(self) -> Result<Self::Value, E>
            where
                E: serde::de::Error,
            {
                Ok(StringList::default())
            }

            fn visit_seq<A>(self, mut seq: A) -> Result<Self::Value, A::Error>
            where
                A: SeqAccess<'de>,
            {
                let mut items = Vec::new();

                while let Some(value) = seq.next_element::<serde_json::Value>()? {
                    match value {
                        serde_json::Value::String(s) => items.push(s),
                        serde_json::Value::Number(n) => items.push(n.to_string()),
                        serde_json::Value::Null => {}
                        _ => {
                            return Err(serde::de::Error::custom(
                                "expected string entries in reference list",
                            ))
                        }
                    }
                }

                Ok(StringList(items))
            }
        }

        deserializer.deserialize_any(StringListVisitor)
    }
}

// Split shape

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct SplitSubject {
    pub id: Option<String>,
    #[serde(alias = "name")]
    pub title: Option<String>,
    pub description: Option<String>,
    #[serde(alias = "url")]
    pub uri: Option<String>,
    pub status: Option<String>,
    pub created_at: Option<DateTime<Utc>>,
    pub updated_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct SplitTopic {
    pub id: Option<String>,
    #[serde(alias = "title", alias = "text")]
    pub name: Option<String>,
    pub name_localized: Option<String>,
    pub description: Option<String>,
    #[serde(alias = "url")]
    pub uri: Option<String>,
    #[serde(alias = "subject")]
    pub subject_id: Option<String>,
    #[serde(alias = "parent")]
    pub parent_topic_id: Option<String>,
    #[serde(alias = "order")]
    pub sort_order: Option<i64>,
    pub status: Option<String>,
    pub created_at: Option<DateTime<Utc>>,
    pub updated_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct SplitOutcome {
    pub id: Option<String>,
    pub text: Option<String>,
    pub text_localized: Option<String>,
    #[serde(alias = "topic")]
    pub topic_id: Option<String>,
    #[serde(alias = "url")]
    pub uri: Option<String>,
    pub school_level: Option<String>,
    pub grade: Option<String>,
    #[serde(alias = "order")]
    pub sort_order: Option<i64>,
    pub status: Option<String>,
    pub expects: StringList,
    pub consists_of: StringList,
    pub created_at: Option<DateTime<Utc>>,
    pub updated_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct SplitSkillBit {
    pub id: Option<String>,
    #[serde(alias = "text")]
    pub label: Option<String>,
    #[serde(alias = "outcome", alias = "learning_outcome_id")]
    pub outcome_id: Option<String>,
    #[serde(alias = "order")]
    pub manual_order: Option<u32>,
    pub created_at: Option<DateTime<Utc>>,
    pub updated_at: Option<DateTime<Utc>>,
}

/// Four independently fetched collections
#[derive(Debug, Clone, Default)]
pub struct SplitInput {
    pub subjects: Vec<SplitSubject>,
    pub topics: Vec<SplitTopic>,
    pub outcomes: Vec<SplitOutcome>,
    pub skill_bits: Vec<SplitSkillBit>,
}

// Combined shape

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct CombinedTopic {
    #[serde(alias = "name")]
    pub text: Option<String>,
    #[serde(alias = "name_localized")]
    pub text_localized: Option<String>,
    pub description: Option<String>,
    #[serde(alias = "uri")]
    pub url: Option<String>,
    pub subject: StringList,
    #[serde(alias = "parent_topic")]
    pub parent: StringList,
    pub order: Option<i64>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct CombinedOutcome {
    pub text: Option<String>,
    pub text_localized: Option<String>,
    #[serde(alias = "uri")]
    pub url: Option<String>,
    pub subject: StringList,
    pub topic: StringList,
    pub school_level: Option<String>,
    pub grade: Option<String>,
    pub expects: StringList,
    pub consists_of: StringList,
    pub order: Option<i64>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct CombinedSkillBit {
    #[serde(alias = "label")]
    pub text: Option<String>,
    #[serde(alias = "learning_outcome")]
    pub outcome: StringList,
    pub order: Option<u32>,
}

/// One document with free-text cross-references
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct CombinedInput {
    pub subjects: Vec<String>,
    pub topics: Vec<CombinedTopic>,
    pub learning_outcomes: Vec<CombinedOutcome>,
    #[serde(alias = "sub_skills")]
    pub skill_bits: Vec<CombinedSkillBit>,
}

impl CombinedInput {
    pub fn from_json(text: &str) -> serde_json::Result<Self> {
        serde_json::from_str(text)
    }
}

/// Raw data in either supported layout
#[derive(Debug, Clone)]
pub enum RawDataset {
    Split(SplitInput),
    Combined(CombinedInput),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn string_list_accepts_all_forms() {
        #[derive(Deserialize)]
        struct Probe {
            #[serde(default)]
            refs: StringList,
        }

        let single: Probe = serde_json::from_str(r#"{"refs": "Algebra"}"#).unwrap();
        assert_eq!(single.refs, StringList::from(["Algebra"]));

        let many: Probe = serde_json::from_str(r#"{"refs": ["A", null, " B "]}"#).unwrap();
        assert_eq!(many.refs.0, vec!["A", " B "]);
        assert_eq!(many.refs.cleaned().collect::<Vec<_>>(), vec!["A", "B"]);

        let null: Probe = serde_json::from_str(r#"{"refs": null}"#).unwrap();
        assert!(null.refs.is_empty());

        let missing: Probe = serde_json::from_str("{}").unwrap();
        assert!(missing.refs.is_empty());

        let numeric: Probe = serde_json::from_str(r#"{"refs": [7]}"#).unwrap();
        assert_eq!(numeric.refs.first(), Some("7"));

        assert!(serde_json::from_str::<Probe>(r#"{"refs": [{"x": 1}]}"#).is_err());
    }

    #[test]
    fn combined_accepts_sub_skills_alias() {
        let input = CombinedInput::from_json(
            r#"{
                "subjects": ["Math"],
                "sub_skills": [{"label": "Isolate x", "learning_outcome": "Solve"}]
            }"#,
        )
        .unwrap();

        assert_eq!(input.skill_bits.len(), 1);
        assert_eq!(input.skill_bits[0].text.as_deref(), Some("Isolate x"));
        assert_eq!(input.skill_bits[0].outcome.first(), Some("Solve"));
        assert!(input.topics.is_empty());
    }

    #[test]
    fn split_records_accept_aliases() {
        let topic: SplitTopic = serde_json::from_str(
            r#"{"id": "algebra", "title": "Algebra", "subject": "math", "parent": null, "order": 3}"#,
        )
        .unwrap();

        assert_eq!(topic.name.as_deref(), Some("Algebra"));
        assert_eq!(topic.subject_id.as_deref(), Some("math"));
        assert_eq!(topic.parent_topic_id, None);
        assert_eq!(topic.sort_order, Some(3));
    }
}
