use crate::reactive::{Signal, Topic};
use crate::scope::{EventPayload, FieldSnapshot, GlobalEvent, GlobalEventKind};
use crate::VariableEngine;

/// A field whose key changed in place
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenameInfo {
    pub before: FieldSnapshot,
    pub after: FieldSnapshot,
}

/// Compares a field list before and after an update.
///
/// It's a rename iff both lists are non-empty and have the same length, exactly one position has a
/// different key, and the fields at that position have the same type kind. Otherwise every field
/// of `prev` which isn't in `next` is reported as disposed.
pub fn detect_rename(prev: &[FieldSnapshot], next: &[FieldSnapshot]) -> Result<RenameInfo, Vec<FieldSnapshot>> {
    let removed = || prev.iter()
        .filter(|field| !next.iter().any(|next| next.id == field.id))
        .cloned()
        .collect::<Vec<_>>();
    if prev.is_empty() || next.is_empty() || prev.len() != next.len() {
        return Err(removed());
    }

    let mut changed = prev.iter().zip(next).filter(|(prev, next)| prev.key != next.key);
    match (changed.next(), changed.next()) {
        (Some((before, after)), None) if before.type_kind == after.type_kind => Ok(RenameInfo {
            before: before.clone(),
            after: after.clone(),
        }),
        _ => Err(removed()),
    }
}

impl VariableEngine {
    /// Raises rename / dispose-in-list notifications for field list changes
    pub(crate) fn rename_on_event(&mut self, event: &GlobalEvent) {
        if !matches!(event.kind, GlobalEventKind::VariableListChange | GlobalEventKind::ObjectPropertiesChange) {
            return;
        }
        let Some(EventPayload::FieldListChange { prev, next }) = &event.payload else {
            return;
        };
        match detect_rename(prev, next) {
            Ok(rename) => {
                log::debug!("{} renamed to {} in {}", rename.before.key, rename.after.key, event.scope);
                self.emit(Topic::Rename, move || Signal::Rename(rename));
            }
            Err(removed) => {
                for field in removed {
                    self.emit(Topic::DisposeInList, move || Signal::DisposeInList(field));
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use smol_str::SmolStr;
    use test_log::test;

    use crate::ast::NodeId;
    use crate::scope::FieldSnapshot;
    use crate::services::detect_rename;

    fn field(id: NodeId, key: &str, type_kind: &str) -> FieldSnapshot {
        FieldSnapshot {
            id,
            key: SmolStr::new(key),
            key_path: [SmolStr::new(key)].into_iter().collect(),
            type_kind: Some(SmolStr::new(type_kind)),
        }
    }

    fn ids(fields: &[FieldSnapshot]) -> Vec<&str> {
        fields.iter().map(|field| field.key.as_str()).collect()
    }

    #[test]
    pub fn single_key_change_is_a_rename() {
        let (a, b, c) = (NodeId::from_raw(1), NodeId::from_raw(2), NodeId::from_raw(3));
        let prev = [field(a, "a", "String"), field(b, "b", "Number")];
        let next = [field(a, "a", "String"), field(c, "c", "Number")];
        let rename = detect_rename(&prev, &next).unwrap();
        assert_eq!(rename.before.key, "b");
        assert_eq!(rename.after.key, "c");
    }

    #[test]
    pub fn type_change_is_not_a_rename() {
        let (a, b) = (NodeId::from_raw(1), NodeId::from_raw(2));
        let removed = detect_rename(&[field(a, "a", "String")], &[field(b, "b", "Number")]).unwrap_err();
        assert_eq!(ids(&removed), vec!["a"]);
    }

    #[test]
    pub fn two_key_changes_are_removals() {
        let nodes = [1, 2, 3, 4].map(NodeId::from_raw);
        let prev = [field(nodes[0], "a", "String"), field(nodes[1], "b", "String")];
        let next = [field(nodes[2], "c", "String"), field(nodes[3], "d", "String")];
        assert_eq!(ids(&detect_rename(&prev, &next).unwrap_err()), vec!["a", "b"]);
    }

    #[test]
    pub fn length_change_reports_removed_fields() {
        let (a, b) = (NodeId::from_raw(1), NodeId::from_raw(2));
        let prev = [field(a, "a", "String"), field(b, "b", "String")];
        let next = [field(a, "a", "String")];
        assert_eq!(ids(&detect_rename(&prev, &next).unwrap_err()), vec!["b"]);
        assert!(detect_rename(&[], &next).unwrap_err().is_empty());
    }
}
