use crate::domain::{ThreadEntity, is_same_entity};
use crate::sync::overlay::PendingOverlay;
use std::collections::HashSet;

/// Merges a scope's confirmed set with its pending overlay.
///
/// Pending entries come first, newest first, followed by the confirmed set in
/// server order. The overlay is only read; entries leave it when the scope's
/// confirmed set is replaced by a fetch (see [`prune`]). When
/// `include_pending` is false the confirmed set is returned as-is.
pub fn merge<E: ThreadEntity>(
    confirmed: &[E],
    overlay: &PendingOverlay<E>,
    include_pending: bool,
) -> Vec<E> {
    if !include_pending {
        return confirmed.to_vec();
    }

    let mut merged = Vec::with_capacity(overlay.len() + confirmed.len());
    merged.extend(overlay.entries().iter().cloned());
    merged.extend(confirmed.iter().cloned());
    merged
}

/// Removes overlay entries resolved by a freshly fetched `confirmed` set,
/// returning how many were dropped.
///
/// An entry tagged with its server id is resolved only by that id. Untagged
/// entries fall back to the dedup key, matched against confirmed entities no
/// tagged entry has claimed.
pub fn prune<E: ThreadEntity>(confirmed: &[E], overlay: &mut PendingOverlay<E>) -> usize {
    if overlay.is_empty() || confirmed.is_empty() {
        return 0;
    }

    let claimed: HashSet<&str> = confirmed
        .iter()
        .filter(|entity| {
            overlay.entries().iter().any(|entry| {
                entry.origin().server_id().is_some() && is_same_entity(entry, *entity)
            })
        })
        .map(ThreadEntity::id)
        .collect();

    overlay.remove_where(|entry| {
        let tagged = entry.origin().server_id().is_some();
        confirmed
            .iter()
            .filter(|entity| tagged || !claimed.contains(entity.id()))
            .any(|entity| is_same_entity(entry, entity))
    })
}

#[cfg(test)]
mod tests {
    use super::{merge, prune};
    use crate::domain::{Author, AuthorRole, ClientId, Comment, Origin, ThreadEntity};
    use crate::sync::overlay::PendingOverlay;

    fn comment(id: &str, content: &str, origin: Origin) -> Comment {
        Comment {
            id: id.to_owned(),
            content: content.to_owned(),
            author: Author {
                id: "u1".to_owned(),
                first_name: "Sam".to_owned(),
                last_name: "Doe".to_owned(),
                role: AuthorRole::Member,
            },
            reply_count: 0,
            origin,
        }
    }

    fn pending(client_id: u64, content: &str) -> Comment {
        comment(
            &ClientId(client_id).display_id(),
            content,
            Origin::pending(ClientId(client_id)),
        )
    }

    fn ids(merged: &[Comment]) -> Vec<&str> {
        merged.iter().map(|c| c.id.as_str()).collect()
    }

    #[test]
    fn pending_precede_confirmed_in_their_own_orders() {
        let mut overlay = PendingOverlay::default();
        overlay.add(pending(1, "older"));
        overlay.add(pending(2, "newer"));
        let confirmed = vec![
            comment("c3", "three", Origin::Confirmed),
            comment("c1", "one", Origin::Confirmed),
        ];

        let merged = merge(&confirmed, &overlay, true);
        assert_eq!(
            ids(&merged),
            vec!["optimistic-2", "optimistic-1", "c3", "c1"]
        );
    }

    #[test]
    fn merge_never_drops_a_pending_duplicate_of_held_data() {
        let mut overlay = PendingOverlay::default();
        overlay.add(pending(1, "gm"));
        let held = vec![comment("c1", "gm", Origin::Confirmed)];

        for _ in 0..3 {
            let merged = merge(&held, &overlay, true);
            assert_eq!(ids(&merged), vec!["optimistic-1", "c1"]);
        }
        assert_eq!(overlay.len(), 1);
    }

    #[test]
    fn matched_pending_is_pruned_once() {
        let mut overlay = PendingOverlay::default();
        overlay.add(pending(1, "gm"));
        let confirmed = vec![
            comment("c9", "gm", Origin::Confirmed),
            comment("c8", "hello", Origin::Confirmed),
        ];

        assert_eq!(prune(&confirmed, &mut overlay), 1);
        let merged = merge(&confirmed, &overlay, true);
        let key = pending(1, "gm").dedup_key();
        assert_eq!(
            merged.iter().filter(|c| c.dedup_key() == key).count(),
            1
        );
        assert!(overlay.is_empty());
    }

    #[test]
    fn excluded_pending_is_kept_but_not_rendered() {
        let mut overlay = PendingOverlay::default();
        overlay.add(pending(1, "gm"));
        let confirmed = vec![comment("c9", "hello", Origin::Confirmed)];

        let merged = merge(&confirmed, &overlay, false);
        assert_eq!(ids(&merged), vec!["c9"]);
        assert_eq!(overlay.len(), 1);
    }

    #[test]
    fn tagged_pending_waits_for_its_own_id() {
        let mut overlay = PendingOverlay::default();
        overlay.add(pending(1, "gm"));
        overlay.add(pending(2, "gm"));
        overlay.tag_server_id(ClientId(1), "c10");
        overlay.tag_server_id(ClientId(2), "c11");

        let first_refresh = vec![comment("c10", "gm", Origin::Confirmed)];
        assert_eq!(prune(&first_refresh, &mut overlay), 1);
        assert_eq!(
            ids(&merge(&first_refresh, &overlay, true)),
            vec!["optimistic-2", "c10"]
        );

        let second_refresh = vec![
            comment("c11", "gm", Origin::Confirmed),
            comment("c10", "gm", Origin::Confirmed),
        ];
        assert_eq!(prune(&second_refresh, &mut overlay), 1);
        assert_eq!(
            ids(&merge(&second_refresh, &overlay, true)),
            vec!["c11", "c10"]
        );
        assert!(overlay.is_empty());
    }

    #[test]
    fn untagged_pending_falls_back_to_unclaimed_keys() {
        let mut overlay = PendingOverlay::default();
        overlay.add(pending(1, "gm"));
        overlay.tag_server_id(ClientId(1), "c10");
        overlay.add(pending(2, "gm"));

        let confirmed = vec![comment("c10", "gm", Origin::Confirmed)];
        assert_eq!(prune(&confirmed, &mut overlay), 1);
        assert_eq!(
            ids(&merge(&confirmed, &overlay, true)),
            vec!["optimistic-2", "c10"]
        );

        let later = vec![
            comment("c12", "gm", Origin::Confirmed),
            comment("c10", "gm", Origin::Confirmed),
        ];
        assert_eq!(prune(&later, &mut overlay), 1);
        assert!(overlay.is_empty());
    }
}
