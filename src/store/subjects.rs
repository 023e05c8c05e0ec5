use chrono::Utc;

use super::error::required_text;
use super::input::{optional_text, NewSubject, SubjectPatch};
use super::{assign_id, CurriculumStore, Removal, StoreError};
use crate::domain::{EntityId, EntityKind, Subject};

impl CurriculumStore {
    pub fn subjects(&self) -> &[Subject] {
        self.current.subjects()
    }

    pub fn subject(&self, id: &EntityId) -> Result<&Subject, StoreError> {
        self.current
            .subject(id)
            .ok_or_else(|| StoreError::not_found(EntityKind::Subject, id))
    }

    pub fn create_subject(&mut self, input: NewSubject) -> Result<Subject, StoreError> {
        let title = required_text("title", &input.title)?;
        let id = assign_id(
            EntityKind::Subject,
            input.id,
            &title,
            self.current.subjects().iter().map(|s| &s.id),
        )?;

        let mut subject = Subject::new(id, title, Utc::now());
        subject.description = optional_text(input.description);
        subject.uri = optional_text(input.uri);
        subject.status = input.status;

        let mut subjects = self.current.subjects().to_vec();
        subjects.push(subject.clone());

        let mut next = self.current.clone();
        next.set_subjects(subjects);
        self.commit(next, "create subject");

        Ok(subject)
    }

    pub fn update_subject(&mut self, id: &EntityId, patch: SubjectPatch) -> Result<Subject, StoreError> {
        let mut subjects = self.current.subjects().to_vec();
        let subject = subjects
            .iter_mut()
            .find(|s| &s.id == id)
            .ok_or_else(|| StoreError::not_found(EntityKind::Subject, id))?;

        if let Some(title) = patch.title {
            subject.title = required_text("title", &title)?;
        }
        if let Some(description) = patch.description {
            subject.description = optional_text(description);
        }
        if let Some(uri) = patch.uri {
            subject.uri = optional_text(uri);
        }
        if let Some(status) = patch.status {
            subject.status = status;
        }
        subject.touch(Utc::now());
        let updated = subject.clone();

        let mut next = self.current.clone();
        next.set_subjects(subjects);
        self.commit(next, "update subject");

        Ok(updated)
    }

    /// Deletes a subject with all its topics, their outcomes and skill-bits
    pub fn delete_subject(&mut self, id: &EntityId) -> Result<Removal, StoreError> {
        self.subject(id)?;

        let removal = Removal::cascade(&self.current, std::slice::from_ref(id), &[], &[], &[]);
        let next = removal.apply(&self.current, Utc::now());
        self.commit(next, "delete subject");

        Ok(removal)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::PublicationStatus;
    use crate::store::tests::{id, seeded};
    use crate::store::{NewOutcome, NewSkillBit, NewTopic};

    #[test]
    fn create_allocates_unique_ids() {
        let (mut store, _) = seeded();

        let first = store
            .create_subject(NewSubject {
                title: "  Mathematics ".to_string(),
                ..Default::default()
            })
            .unwrap();
        assert_eq!(first.id, id("mathematics-2"));
        assert_eq!(first.title, "Mathematics");
        assert_eq!(first.created_at, first.updated_at);

        let explicit = store
            .create_subject(NewSubject {
                id: Some(id("phys")),
                title: "Physics".to_string(),
                status: PublicationStatus::Published,
                ..Default::default()
            })
            .unwrap();
        assert_eq!(explicit.id, id("phys"));
        assert!(store.subject(&id("phys")).unwrap().status.is_published());
    }

    #[test]
    fn create_rejects_blank_title() {
        let (mut store, _) = seeded();
        let err = store
            .create_subject(NewSubject {
                title: "   ".to_string(),
                ..Default::default()
            })
            .unwrap_err();
        assert!(matches!(err, StoreError::Invalid { field: "title", .. }));
        assert_eq!(store.subjects().len(), 1);
    }

    #[test]
    fn update_merges_fields_and_touches() {
        let (mut store, _) = seeded();
        let before = store.subject(&id("mathematics")).unwrap().clone();

        let updated = store
            .update_subject(
                &id("mathematics"),
                SubjectPatch {
                    description: Some(Some("Numbers and shapes".to_string())),
                    uri: Some(None),
                    ..Default::default()
                },
            )
            .unwrap();

        assert_eq!(updated.title, before.title);
        assert_eq!(updated.description.as_deref(), Some("Numbers and shapes"));
        assert!(updated.updated_at > before.updated_at);
    }

    #[test]
    fn unknown_subject_is_not_found() {
        let (mut store, _) = seeded();
        assert!(matches!(
            store.update_subject(&id("nope"), SubjectPatch::default()),
            Err(StoreError::NotFound { kind: EntityKind::Subject, .. })
        ));
        assert!(store.delete_subject(&id("nope")).is_err());
    }

    #[test]
    fn delete_cascades_through_the_topic_tree() {
        let (mut store, _) = seeded();
        store
            .create_subject(NewSubject {
                title: "Physics".to_string(),
                ..Default::default()
            })
            .unwrap();
        let root = store.create_topic(NewTopic::new("Mechanics", id("physics"))).unwrap();
        let child = store
            .create_topic(NewTopic::new("Forces", id("physics")).with_parent(root.id.clone()))
            .unwrap();
        for topic in [&root, &child] {
            let outcome = store
                .create_outcome(NewOutcome::new(format!("Explain {}", topic.name), topic.id.clone()))
                .unwrap();
            store
                .create_skill_bit(NewSkillBit::new("Draw a diagram", outcome.id))
                .unwrap();
        }

        let removal = store.delete_subject(&id("physics")).unwrap();
        assert_eq!(removal.topics.len(), 2);
        assert_eq!(removal.learning_outcomes.len(), 2);
        assert_eq!(removal.skill_bits.len(), 2);
        assert_eq!(removal.total(), 7);

        let dataset = store.dataset();
        assert!(dataset.topics().iter().all(|t| t.subject_id != id("physics")));
        assert!(dataset
            .outcomes()
            .iter()
            .all(|o| o.topic_id != root.id && o.topic_id != child.id));
        assert_eq!(dataset.counts().skill_bits, 4);
        assert!(dataset.violations().is_empty());
    }
}
