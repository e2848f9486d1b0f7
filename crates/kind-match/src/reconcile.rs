use std::collections::hash_map::Entry;
use std::collections::{HashMap, HashSet};

use kind_types::models::{Conversation, Match, MatchSide};
use serde::Serialize;
use tracing::debug;
use uuid::Uuid;

use crate::pair::{PairKey, pair_key};
use crate::thread::Thread;

/// The two derived surfaces for one viewer.
#[derive(Debug, Clone, Default, Serialize)]
pub struct Reconciliation {
    /// Matches the viewer still has to act on, newest first.
    pub unopened_matches: Vec<Match>,
    /// The messages surface, most recently active first. Contains a
    /// synthetic thread for every opened match without a conversation.
    pub threads: Vec<Thread>,
    /// Conversations held back because the viewer has not opened their match.
    pub suppressed: Vec<Conversation>,
}

impl Reconciliation {
    pub fn is_empty(&self) -> bool {
        self.unopened_matches.is_empty() && self.threads.is_empty()
    }
}

/// Derive the unopened-matches and messages surfaces from independently
/// fetched matches and conversations.
///
/// `side` is the viewer's side of every match passed in and `viewer_id` is
/// used to pick the counterpart of each thread.
///
/// A match stays on the unopened surface unless the viewer has opened it
/// *and* a conversation exists for it, either linked by `match_id` or, for
/// conversations never linked to any match, by pair key.
pub fn reconcile(
    matches: &[Match],
    conversations: &[Conversation],
    side: MatchSide,
    viewer_id: &str,
) -> Reconciliation {
    let by_id: HashMap<Uuid, &Match> = matches.iter().map(|m| (m.id, m)).collect();

    // Concurrent lazy creation can leave several rows for one match.
    // Keep the most recently active.
    let mut linked: HashMap<Uuid, &Conversation> = HashMap::new();
    let mut unlinked: Vec<&Conversation> = Vec::new();
    for conversation in conversations {
        let Some(match_id) = conversation.match_id else {
            unlinked.push(conversation);
            continue;
        };
        match linked.entry(match_id) {
            Entry::Vacant(slot) => {
                slot.insert(conversation);
            }
            Entry::Occupied(mut slot) => {
                debug!(
                    "Duplicate conversations {} and {} for match {}",
                    slot.get().id,
                    conversation.id,
                    match_id
                );
                if conversation.last_activity() > slot.get().last_activity() {
                    slot.insert(conversation);
                }
            }
        }
    }

    // A conversation left behind by a deleted match belongs to no other match.
    let unlinked_pairs: HashSet<PairKey> = unlinked
        .iter()
        .filter(|c| c.is_pair_fallback())
        .filter_map(|c| pair_key(&c.participant_one, &c.participant_two))
        .collect();

    let mut threads: Vec<Thread> = unlinked
        .iter()
        .map(|c| Thread::from_conversation(c, viewer_id))
        .collect();
    let mut suppressed = Vec::new();

    for (match_id, conversation) in &linked {
        match by_id.get(match_id) {
            Some(m) if !m.is_opened_by(side) => suppressed.push((*conversation).clone()),
            // Linked to a match we weren't given: nothing to gate it on.
            _ => threads.push(Thread::from_conversation(conversation, viewer_id)),
        }
    }

    let mut unopened_matches = Vec::new();
    for m in matches {
        if !m.is_opened_by(side) {
            unopened_matches.push(m.clone());
            continue;
        }

        let has_conversation = linked.contains_key(&m.id)
            || pair_key(&m.employer_id, &m.worker_id).is_some_and(|key| unlinked_pairs.contains(&key));
        if has_conversation {
            continue;
        }

        unopened_matches.push(m.clone());
        threads.push(Thread::synthetic(m, side));
    }

    threads.sort_by(|a, b| {
        b.last_activity()
            .cmp(&a.last_activity())
            .then_with(|| a.id.to_string().cmp(&b.id.to_string()))
    });
    unopened_matches.sort_by(|a, b| b.created_at.cmp(&a.created_at).then_with(|| a.id.cmp(&b.id)));
    suppressed.sort_by(|a, b| b.last_activity().cmp(&a.last_activity()).then_with(|| a.id.cmp(&b.id)));

    Reconciliation {
        unopened_matches,
        threads,
        suppressed,
    }
}

#[cfg(test)]
mod tests {
    use chrono::{DateTime, Duration, TimeZone, Utc};

    use super::*;
    use crate::thread::ThreadRef;

    const BOSS: &str = "user_boss";
    const TAO: &str = "user_tao";

    fn at(minutes: i64) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 3, 1, 9, 0, 0).unwrap() + Duration::minutes(minutes)
    }

    fn new_match(employer: &str, worker: &str, opened_by_worker: bool, minute: i64) -> Match {
        Match {
            id: Uuid::new_v4(),
            job_post_id: Uuid::new_v4(),
            employer_id: employer.into(),
            worker_id: worker.into(),
            is_opened_by_employer: false,
            is_opened_by_worker: opened_by_worker,
            created_at: at(minute),
        }
    }

    fn conversation(match_id: Option<Uuid>, a: &str, b: &str, last: Option<i64>) -> Conversation {
        Conversation {
            id: Uuid::new_v4(),
            match_id,
            detached_match_id: None,
            participant_one: a.into(),
            participant_two: b.into(),
            last_message_id: last.map(|_| Uuid::new_v4()),
            last_message_at: last.map(at),
            created_at: at(0),
        }
    }

    fn unopened_ids(r: &Reconciliation) -> Vec<Uuid> {
        r.unopened_matches.iter().map(|m| m.id).collect()
    }

    #[test]
    fn test_unopened_match_always_listed() {
        let m = new_match(BOSS, TAO, false, 1);
        let linked = conversation(Some(m.id), BOSS, TAO, Some(5));

        for convs in [vec![], vec![linked.clone()]] {
            let r = reconcile(std::slice::from_ref(&m), &convs, MatchSide::Worker, TAO);
            assert_eq!(unopened_ids(&r), vec![m.id]);
        }
    }

    #[test]
    fn test_opened_match_with_linked_conversation_hidden() {
        let m = new_match(BOSS, TAO, true, 1);
        let c = conversation(Some(m.id), BOSS, TAO, Some(5));
        let r = reconcile(&[m], &[c.clone()], MatchSide::Worker, TAO);

        assert!(r.unopened_matches.is_empty());
        assert_eq!(r.threads.len(), 1);
        assert_eq!(r.threads[0].id, ThreadRef::Real(c.id));
        assert_eq!(r.threads[0].counterpart_id, BOSS);
    }

    #[test]
    fn test_opened_match_with_pair_conversation_hidden() {
        let m = new_match(BOSS, TAO, true, 1);
        // Predates match-level linkage; participants stored in the other order.
        let c = conversation(None, TAO, BOSS, Some(5));
        let r = reconcile(&[m], &[c], MatchSide::Worker, TAO);

        assert!(r.unopened_matches.is_empty());
        assert_eq!(r.threads.len(), 1);
        assert!(!r.threads[0].id.is_synthetic());
    }

    #[test]
    fn test_matchless_conversation_always_visible() {
        let m = new_match(BOSS, TAO, false, 1);
        let direct = conversation(None, "user_admin", TAO, None);
        let r = reconcile(&[m], &[direct.clone()], MatchSide::Worker, TAO);

        assert_eq!(r.threads.len(), 1);
        assert_eq!(r.threads[0].id, ThreadRef::Real(direct.id));
        assert_eq!(r.threads[0].counterpart_id, "user_admin");
    }

    #[test]
    fn test_conversation_suppressed_until_viewer_opens() {
        let mut m = new_match(BOSS, TAO, false, 1);
        m.is_opened_by_employer = true;
        let c = conversation(Some(m.id), BOSS, TAO, Some(3));

        let worker_view = reconcile(std::slice::from_ref(&m), std::slice::from_ref(&c), MatchSide::Worker, TAO);
        assert!(worker_view.threads.is_empty());
        assert_eq!(worker_view.suppressed, vec![c.clone()]);

        let employer_view = reconcile(&[m], &[c.clone()], MatchSide::Employer, BOSS);
        assert!(employer_view.unopened_matches.is_empty());
        assert_eq!(employer_view.threads[0].id, ThreadRef::Real(c.id));
    }

    #[test]
    fn test_opened_match_without_conversation_gets_synthetic_thread() {
        let m = new_match(BOSS, TAO, true, 1);
        let r = reconcile(std::slice::from_ref(&m), &[], MatchSide::Worker, TAO);

        assert_eq!(unopened_ids(&r), vec![m.id]);
        assert_eq!(r.threads.len(), 1);
        assert_eq!(r.threads[0].id, ThreadRef::Synthetic(m.id));
        assert_eq!(r.threads[0].id.to_string(), format!("new-{}", m.id));
        assert_eq!(r.threads[0].counterpart_id, BOSS);
    }

    #[test]
    fn test_no_cross_contamination_between_matches() {
        // Same pair, two job posts.
        let first = new_match(BOSS, TAO, true, 1);
        let second = new_match(BOSS, TAO, true, 2);

        let before = reconcile(&[first.clone(), second.clone()], &[], MatchSide::Worker, TAO);
        assert_eq!(before.unopened_matches.len(), 2);

        let c = conversation(Some(first.id), BOSS, TAO, Some(10));
        let after = reconcile(&[first.clone(), second.clone()], &[c], MatchSide::Worker, TAO);
        assert_eq!(unopened_ids(&after), vec![second.id]);
        assert!(after.threads.iter().any(|t| t.id == ThreadRef::Synthetic(second.id)));
        assert!(!after.threads.iter().any(|t| t.id == ThreadRef::Synthetic(first.id)));
    }

    #[test]
    fn test_deleted_match_conversation_not_reused_by_sibling() {
        let deleted = Uuid::new_v4();
        let sibling = new_match(BOSS, TAO, true, 2);
        let mut orphan = conversation(None, BOSS, TAO, Some(10));
        orphan.detached_match_id = Some(deleted);

        let r = reconcile(std::slice::from_ref(&sibling), &[orphan.clone()], MatchSide::Worker, TAO);
        assert_eq!(unopened_ids(&r), vec![sibling.id]);
        let order: Vec<ThreadRef> = r.threads.iter().map(|t| t.id).collect();
        assert_eq!(order, vec![ThreadRef::Real(orphan.id), ThreadRef::Synthetic(sibling.id)]);
    }

    #[test]
    fn test_duplicate_conversations_collapse_to_latest() {
        let m = new_match(BOSS, TAO, true, 1);
        let stale = conversation(Some(m.id), BOSS, TAO, Some(2));
        let fresh = conversation(Some(m.id), TAO, BOSS, Some(9));
        let r = reconcile(&[m], &[stale, fresh.clone()], MatchSide::Worker, TAO);

        assert_eq!(r.threads.len(), 1);
        assert_eq!(r.threads[0].id, ThreadRef::Real(fresh.id));
    }

    #[test]
    fn test_conversation_for_unknown_match_visible() {
        let c = conversation(Some(Uuid::new_v4()), BOSS, TAO, Some(4));
        let r = reconcile(&[], &[c.clone()], MatchSide::Employer, BOSS);
        assert_eq!(r.threads[0].id, ThreadRef::Real(c.id));
        assert_eq!(r.threads[0].counterpart_id, TAO);
    }

    #[test]
    fn test_ordering() {
        let older = new_match(BOSS, "user_a", false, 1);
        let newer = new_match(BOSS, "user_b", false, 7);
        let quiet = conversation(None, BOSS, "user_c", None);
        let busy = conversation(None, BOSS, "user_d", Some(30));

        let r = reconcile(&[older.clone(), newer.clone()], &[quiet.clone(), busy.clone()], MatchSide::Employer, BOSS);
        assert_eq!(unopened_ids(&r), vec![newer.id, older.id]);
        let order: Vec<ThreadRef> = r.threads.iter().map(|t| t.id).collect();
        assert_eq!(order, vec![ThreadRef::Real(busy.id), ThreadRef::Real(quiet.id)]);
    }

    #[test]
    fn test_empty_inputs() {
        assert!(reconcile(&[], &[], MatchSide::Worker, TAO).is_empty());
    }
}
