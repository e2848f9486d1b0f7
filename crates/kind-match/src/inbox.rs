use std::collections::HashSet;
use std::fmt::Display;

use kind_types::models::{Conversation, Match, MatchSide};
use tracing::{debug, warn};
use uuid::Uuid;

use crate::reconcile::{Reconciliation, reconcile};
use crate::thread::{Thread, ThreadRef};

/// Returned by [`Inbox::open_match`]. Hand it back to [`Inbox::confirm`] once
/// the server has found or created the conversation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PendingOpen {
    /// Where to navigate right away. Synthetic unless a real thread for the
    /// match was already listed.
    pub thread: ThreadRef,
    pub match_id: Uuid,
    generation: u64,
}

impl PendingOpen {
    pub fn needs_confirmation(&self) -> bool {
        self.thread.is_synthetic()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Confirmation {
    pub thread: ThreadRef,
    /// Whether a synthetic entry was swapped out or dropped.
    pub replaced: bool,
    /// Set only while the open is still the current navigation. A caller
    /// rewrites its location to this id without reloading.
    pub redirect: Option<ThreadRef>,
}

/// Client-side messages surface with optimistic navigation.
///
/// Opening a match that has no conversation yet puts a `new-<matchId>`
/// placeholder at the front of the list; the real conversation replaces it
/// once the server confirms one. A navigation counter makes sure a response
/// that arrives after the user moved on fixes up the list but never
/// redirects.
#[derive(Debug, Clone)]
pub struct Inbox {
    viewer_id: String,
    side: MatchSide,
    threads: Vec<Thread>,
    /// Matches opened here whose conversation hasn't been confirmed yet.
    opening: HashSet<Uuid>,
    generation: u64,
}

impl Inbox {
    pub fn new(viewer_id: impl Into<String>, side: MatchSide, threads: Vec<Thread>) -> Self {
        Self {
            viewer_id: viewer_id.into(),
            side,
            threads,
            opening: HashSet::new(),
            generation: 0,
        }
    }

    /// Build the messages surface from freshly fetched rows.
    pub fn reconciled(
        viewer_id: impl Into<String>,
        side: MatchSide,
        matches: &[Match],
        conversations: &[Conversation],
    ) -> Self {
        let viewer_id = viewer_id.into();
        let threads = reconcile(matches, conversations, side, &viewer_id).threads;
        Self::new(viewer_id, side, threads)
    }

    pub fn threads(&self) -> &[Thread] {
        &self.threads
    }

    pub fn get(&self, id: ThreadRef) -> Option<&Thread> {
        self.threads.iter().find(|t| t.id == id)
    }

    pub fn open_match(&mut self, m: &Match) -> PendingOpen {
        self.generation += 1;

        if let Some(existing) = self
            .threads
            .iter()
            .find(|t| t.match_id == Some(m.id) && !t.id.is_synthetic())
        {
            return PendingOpen {
                thread: existing.id,
                match_id: m.id,
                generation: self.generation,
            };
        }

        let synthetic = ThreadRef::Synthetic(m.id);
        let entry = match self.position(synthetic) {
            Some(pos) => self.threads.remove(pos),
            None => Thread::synthetic(m, self.side),
        };
        self.threads.insert(0, entry);
        self.opening.insert(m.id);

        PendingOpen {
            thread: synthetic,
            match_id: m.id,
            generation: self.generation,
        }
    }

    pub fn confirm(&mut self, pending: &PendingOpen, conversation: &Conversation) -> Confirmation {
        let real = ThreadRef::Real(conversation.id);

        if !conversation.involves(&self.viewer_id) {
            warn!(
                "Conversation {} does not involve {}, ignoring confirmation for match {}",
                conversation.id, self.viewer_id, pending.match_id
            );
            return Confirmation {
                thread: pending.thread,
                replaced: false,
                redirect: None,
            };
        }

        self.opening.remove(&pending.match_id);
        let synthetic = ThreadRef::Synthetic(pending.match_id);
        let replaced = match (self.position(synthetic), self.position(real)) {
            (Some(s), None) => {
                self.threads[s] = Thread::from_conversation(conversation, &self.viewer_id);
                true
            }
            (Some(s), Some(_)) => {
                self.threads.remove(s);
                true
            }
            (None, None) => {
                self.threads
                    .insert(0, Thread::from_conversation(conversation, &self.viewer_id));
                false
            }
            (None, Some(_)) => false,
        };

        let current = pending.generation == self.generation;
        if !current {
            debug!("Stale confirmation for match {}, not redirecting", pending.match_id);
        }

        Confirmation {
            thread: real,
            replaced,
            redirect: current.then_some(real),
        }
    }

    /// The placeholder stays so the user can retry by sending a message.
    pub fn fail(&self, pending: &PendingOpen, error: &dyn Display) {
        warn!(
            "Background conversation lookup for match {} failed: {}",
            pending.match_id, error
        );
    }

    /// Invalidate every outstanding [`PendingOpen`].
    pub fn navigate_away(&mut self) {
        self.generation += 1;
    }

    /// Take the server's view. Placeholders for matches opened here and not
    /// yet confirmed stay at the front until the server lists a real thread
    /// for them; everything else, order included, comes from `server`.
    pub fn refresh(&mut self, server: Reconciliation) {
        let threads = server.threads;
        self.opening.retain(|match_id| {
            !threads
                .iter()
                .any(|t| t.match_id == Some(*match_id) && !t.id.is_synthetic())
        });

        let opening = &self.opening;
        let local: Vec<Thread> = self
            .threads
            .drain(..)
            .filter(|t| t.id.synthetic_match_id().is_some_and(|id| opening.contains(&id)))
            .collect();

        let rest: Vec<Thread> = threads
            .into_iter()
            .filter(|t| !local.iter().any(|l| l.id == t.id))
            .collect();

        self.threads = local;
        self.threads.extend(rest);
    }

    fn position(&self, id: ThreadRef) -> Option<usize> {
        self.threads.iter().position(|t| t.id == id)
    }
}
