//! Task and batch identifier generation.

use uuid::Uuid;

/// Produce a fresh, universally unique identifier.
pub fn new_id() -> String {
    Uuid::new_v4().to_string()
}

/// Returns the candidate when it carries anything other than whitespace.
pub fn non_blank(candidate: Option<&str>) -> Option<&str> {
    candidate.filter(|s| !s.trim().is_empty())
}

/// Use the supplied identifier, or generate one if it is missing or blank.
pub fn resolve(candidate: Option<&str>) -> String {
    non_blank(candidate)
        .map(str::to_string)
        .unwrap_or_else(new_id)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_new_id_is_uuid() {
        let id = new_id();
        assert!(Uuid::parse_str(&id).is_ok());
    }

    #[test]
    fn test_new_ids_are_unique() {
        let ids: HashSet<String> = (0..1000).map(|_| new_id()).collect();
        assert_eq!(ids.len(), 1000);
    }

    #[test]
    fn test_resolve_keeps_supplied_id() {
        assert_eq!(resolve(Some("task-7")), "task-7");
    }

    #[test]
    fn test_resolve_replaces_blank() {
        for blank in [None, Some(""), Some("   "), Some("\t\n")] {
            let id = resolve(blank);
            assert!(Uuid::parse_str(&id).is_ok(), "{:?} -> {}", blank, id);
        }
    }
}
