//! Component E — atomicity-group tracker.
//!
//! Converts the JSON `atomicityGroup`/`dependsOn` model into the same
//! changeset-event shape the MIME driver produces natively, and validates
//! `dependsOn` well-formedness (no self-reference, no forward reference, no
//! request-instead-of-group reference).

use std::collections::HashMap;

use crate::error::Error;

/// Maintains request-id ↔ group-id membership and the flattened dependency
/// graph for a JSON batch.
#[derive(Debug, Default)]
pub(crate) struct AtomicGroupTracker {
    active_group: Option<String>,
    // Group id -> member request ids, insertion order preserved.
    groups: Vec<(String, Vec<String>)>,
    request_to_group: HashMap<String, String>,
    seen_requests: Vec<String>,
}

impl AtomicGroupTracker {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn active_group(&self) -> Option<&str> {
        self.active_group.as_deref()
    }

    /// True iff a changeset is currently open and `next_group` differs from
    /// it (including `next_group` being absent).
    pub(crate) fn is_end(&self, next_group: Option<&str>) -> bool {
        match &self.active_group {
            Some(active) => next_group != Some(active.as_str()),
            None => false,
        }
    }

    /// True if `group_id` names a group not yet seen — i.e. recording the
    /// next request under it would open a brand new changeset. Pure: does
    /// not mutate tracker state. Callers must check this *before* calling
    /// [`Self::add`] for the same request, since `add` is not idempotent.
    pub(crate) fn is_new_group(&self, group_id: Option<&str>) -> bool {
        match group_id {
            Some(group_id) => !self.is_known_group(group_id),
            None => false,
        }
    }

    /// Records `request_id` as a member of `group_id` (if any). Must be
    /// called exactly once per request — it is not idempotent, and calling
    /// it twice for the same request duplicates it in `seen_requests` and
    /// in its group's member list.
    pub(crate) fn add(&mut self, request_id: &str, group_id: Option<&str>) {
        self.seen_requests.push(request_id.to_string());

        let Some(group_id) = group_id else {
            self.active_group = None;
            return;
        };

        self.active_group = Some(group_id.to_string());
        self.request_to_group
            .insert(request_id.to_string(), group_id.to_string());

        if let Some((_, members)) = self.groups.iter_mut().find(|(g, _)| g == group_id) {
            members.push(request_id.to_string());
        } else {
            self.groups
                .push((group_id.to_string(), vec![request_id.to_string()]));
        }
    }

    /// Closes out the active group without starting a new one, for the
    /// "array ends while a group is active" boundary case.
    pub(crate) fn close(&mut self) {
        self.active_group = None;
    }

    fn group_members(&self, group_id: &str) -> Option<&[String]> {
        self.groups
            .iter()
            .find(|(g, _)| g == group_id)
            .map(|(_, members)| members.as_slice())
    }

    fn is_known_request(&self, id: &str) -> bool {
        self.seen_requests.iter().any(|r| r == id)
    }

    fn is_known_group(&self, id: &str) -> bool {
        self.groups.iter().any(|(g, _)| g == id)
    }

    /// Validates and flattens one request's `dependsOn` list into leaf
    /// request ids, applying the self-reference, self-group-reference,
    /// must-reference-group, and no-forward-reference rules.
    pub(crate) fn flatten(
        &self,
        request_id: &str,
        own_group: Option<&str>,
        depends_on: &[String],
    ) -> Result<Vec<String>, Error> {
        let mut flattened = Vec::new();

        for entry in depends_on {
            if entry == request_id {
                return Err(Error::SelfReference(entry.clone()));
            }
            if let Some(own_group) = own_group {
                if entry == own_group {
                    return Err(Error::SelfGroupReference(
                        request_id.to_string(),
                        own_group.to_string(),
                    ));
                }
            }

            if let Some(members) = self.group_members(entry) {
                for member in members {
                    if !flattened.contains(member) {
                        flattened.push(member.clone());
                    }
                }
                continue;
            }

            if self.is_known_request(entry) {
                if let Some(group) = self.request_to_group.get(entry) {
                    if Some(group.as_str()) != own_group {
                        return Err(Error::MustReferenceGroup {
                            entry: entry.clone(),
                            request: entry.clone(),
                            group: group.clone(),
                        });
                    }
                }
                if !flattened.contains(entry) {
                    flattened.push(entry.clone());
                }
                continue;
            }

            if self.is_known_group(entry) {
                // Reached only if the group exists but has no members yet,
                // which cannot happen (groups are created with their first
                // member) — kept for exhaustiveness.
                continue;
            }

            return Err(Error::ForwardReferenceNotAllowed(entry.clone()));
        }

        Ok(flattened)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn opens_group_once() {
        let mut t = AtomicGroupTracker::new();
        assert!(t.is_new_group(Some("g1")));
        t.add("r1", Some("g1"));
        assert!(!t.is_new_group(Some("g1")));
        t.add("r2", Some("g1"));
    }

    #[test]
    fn is_end_detects_group_change() {
        let mut t = AtomicGroupTracker::new();
        t.add("r1", Some("g1"));
        assert!(t.is_end(None));
        assert!(t.is_end(Some("g2")));
        assert!(!t.is_end(Some("g1")));
    }

    #[test]
    fn flatten_expands_group_reference() {
        let mut t = AtomicGroupTracker::new();
        t.add("r1", Some("g1"));
        t.add("r2", Some("g1"));
        let flat = t.flatten("r3", None, &["g1".to_string()]).unwrap();
        assert_eq!(flat, vec!["r1".to_string(), "r2".to_string()]);
    }

    #[test]
    fn flatten_rejects_self_reference() {
        let t = AtomicGroupTracker::new();
        let err = t.flatten("r1", None, &["r1".to_string()]).unwrap_err();
        assert!(matches!(err, Error::SelfReference(_)));
    }

    #[test]
    fn flatten_rejects_self_group_reference() {
        let t = AtomicGroupTracker::new();
        let err = t
            .flatten("r1", Some("g1"), &["g1".to_string()])
            .unwrap_err();
        assert!(matches!(err, Error::SelfGroupReference(_, _)));
    }

    #[test]
    fn flatten_rejects_request_instead_of_group() {
        let mut t = AtomicGroupTracker::new();
        t.add("r1", Some("g1"));
        let err = t.flatten("r2", None, &["r1".to_string()]).unwrap_err();
        assert!(matches!(err, Error::MustReferenceGroup { .. }));
    }

    #[test]
    fn flatten_allows_sibling_request_in_own_group() {
        let mut t = AtomicGroupTracker::new();
        t.add("r1", Some("g1"));
        let flat = t.flatten("r2", Some("g1"), &["r1".to_string()]).unwrap();
        assert_eq!(flat, vec!["r1".to_string()]);
    }

    #[test]
    fn flatten_rejects_forward_reference() {
        let t = AtomicGroupTracker::new();
        let err = t
            .flatten("r1", None, &["rLater".to_string()])
            .unwrap_err();
        assert!(matches!(err, Error::ForwardReferenceNotAllowed(_)));
    }
}
