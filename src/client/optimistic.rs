//! Optimistic local updates: apply now, then commit or compensate once the
//! remote call has answered.

use std::collections::HashSet;

pub trait OptimisticMutation<S> {
    /// Apply to local state. Returns whether anything changed.
    fn apply(&self, state: &mut S) -> bool;

    /// Undo a changing `apply`.
    fn revert(&self, state: &mut S);
}

/// An applied mutation waiting on its remote call.
#[must_use = "a pending mutation must be committed or compensated"]
#[derive(Debug)]
pub struct Pending<M> {
    mutation: M,
    changed: bool,
}

impl<M> Pending<M> {
    pub fn apply<S>(mutation: M, state: &mut S) -> Self
    where
        M: OptimisticMutation<S>,
    {
        let changed = mutation.apply(state);
        Self { mutation, changed }
    }

    pub fn changed(&self) -> bool {
        self.changed
    }

    /// Keep the local change.
    pub fn commit(self) -> M {
        self.mutation
    }

    /// Roll back only what `apply` changed, so an already-liked artifact stays liked.
    pub fn compensate<S>(self, state: &mut S) -> M
    where
        M: OptimisticMutation<S>,
    {
        if self.changed {
            self.mutation.revert(state);
        }
        self.mutation
    }

    pub fn settle<S>(self, state: &mut S, succeeded: bool) -> M
    where
        M: OptimisticMutation<S>,
    {
        if succeeded {
            self.commit()
        } else {
            self.compensate(state)
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LikeMutation {
    Like(i64),
    Unlike(i64),
}

impl OptimisticMutation<HashSet<i64>> for LikeMutation {
    fn apply(&self, liked: &mut HashSet<i64>) -> bool {
        match *self {
            Self::Like(id) => liked.insert(id),
            Self::Unlike(id) => liked.remove(&id),
        }
    }

    fn revert(&self, liked: &mut HashSet<i64>) {
        match *self {
            Self::Like(id) => {
                liked.remove(&id);
            }
            Self::Unlike(id) => {
                liked.insert(id);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_compensate_reverts_change() {
        let mut liked = HashSet::new();
        let pending = Pending::apply(LikeMutation::Like(7), &mut liked);
        assert!(pending.changed());
        assert!(liked.contains(&7));
        pending.compensate(&mut liked);
        assert!(liked.is_empty());
    }

    #[test]
    fn test_compensate_keeps_prior_state() {
        let mut liked = HashSet::from([7]);
        let pending = Pending::apply(LikeMutation::Like(7), &mut liked);
        assert!(!pending.changed());
        pending.settle(&mut liked, false);
        assert!(liked.contains(&7));

        let mut liked = HashSet::new();
        let pending = Pending::apply(LikeMutation::Unlike(7), &mut liked);
        pending.settle(&mut liked, false);
        assert!(liked.is_empty());
    }

    #[test]
    fn test_commit_keeps_change() {
        let mut liked = HashSet::from([7]);
        let pending = Pending::apply(LikeMutation::Unlike(7), &mut liked);
        assert_eq!(pending.settle(&mut liked, true), LikeMutation::Unlike(7));
        assert!(liked.is_empty());
    }
}
