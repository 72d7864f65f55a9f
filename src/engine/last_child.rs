use crate::models::Record;

/// Pick the record to cache as a parent's `lastChild`
///
/// `children` must be in index order: `created_at` ascending, then id
/// ascending. Locked children are never eligible. Among children sharing the
/// newest `created_at`, the lexically greatest id wins.
pub fn select_last_child(children: impl IntoIterator<Item = Record>) -> Option<Record> {
    children
        .into_iter()
        .filter(|child| !child.is_locked())
        .last()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Status;

    fn child(id: &str, created_at: i64, locked: bool) -> Record {
        let mut record = Record::bare(id, created_at);
        record.parent_id = Some("exa-1".to_string());
        if locked {
            record.status.insert(Status::Locked);
        }
        record
    }

    #[test]
    fn test_newest_unlocked_child_wins() {
        let selected = select_last_child(vec![
            child("exr-1", 100, false),
            child("exr-2", 200, false),
        ]);
        assert_eq!(selected.map(|r| r.id), Some("exr-2".to_string()));
    }

    #[test]
    fn test_locked_child_is_skipped() {
        let selected = select_last_child(vec![
            child("exr-1", 100, false),
            child("exr-2", 200, true),
        ]);
        assert_eq!(selected.map(|r| r.id), Some("exr-1".to_string()));
    }

    #[test]
    fn test_only_locked_children_select_nothing() {
        assert!(select_last_child(vec![child("exr-2", 200, true)]).is_none());
        assert!(select_last_child(Vec::new()).is_none());
    }

    #[test]
    fn test_equal_timestamps_resolve_to_greatest_id() {
        // Index order for equal created_at is id ascending
        let selected = select_last_child(vec![
            child("exr-a", 100, false),
            child("exr-b", 100, false),
        ]);
        assert_eq!(selected.map(|r| r.id), Some("exr-b".to_string()));
    }
}
