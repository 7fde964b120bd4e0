use std::{cmp::Reverse, collections::BinaryHeap};

use serde::{Deserialize, Serialize};
use thiserror::Error;

// ------------------------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
/// A stable handle of a factor registered in a scheduler
pub struct FactorId(pub usize);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
/// A stable handle of a message registered in a scheduler
pub struct MessageId(pub usize);

#[derive(Debug, Clone, PartialEq, Eq, Error)]
/// Errors that could appear in scheduler's methods
pub enum SchedulerError {
    /// Ordering relations contain a cycle, the number of factors that could be ordered is attached
    #[error("Factor relations contain a cycle, only {ordered} of {total} factors could be ordered")]
    CyclicRelations { ordered: usize, total: usize },

    /// A relation references a factor that has never been added
    #[error("Factor {0:?} is unknown to the scheduler")]
    UnknownFactor(FactorId),
}

/// Scheduler's methods result type
pub type SchedulerResult<T> = Result<T, SchedulerError>;

// ------------------------------------------------------------------------------------------

/// The contract of an external scheduling engine that stores factors and messages
/// and later runs message passing over them
pub trait Scheduler {
    /// Registers a new factor and returns its stable handle
    fn add_factor(&mut self) -> FactorId;

    /// Records that `before` has to be visited before `after` in a forward pass
    fn add_factor_relation(&mut self, before: FactorId, after: FactorId);

    /// Registers a new message between two factors and returns its stable handle
    fn add_message(&mut self, left: FactorId, right: FactorId) -> MessageId;

    /// Returns the number of registered factors
    fn number_of_factors(&self) -> usize;
}

impl<S: Scheduler + ?Sized> Scheduler for &mut S {
    #[inline(always)]
    fn add_factor(&mut self) -> FactorId {
        (**self).add_factor()
    }

    #[inline(always)]
    fn add_factor_relation(&mut self, before: FactorId, after: FactorId) {
        (**self).add_factor_relation(before, after)
    }

    #[inline(always)]
    fn add_message(&mut self, left: FactorId, right: FactorId) -> MessageId {
        (**self).add_message(left, right)
    }

    #[inline(always)]
    fn number_of_factors(&self) -> usize {
        (**self).number_of_factors()
    }
}

// ------------------------------------------------------------------------------------------

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
/// An in-memory scheduler recording factors, messages and ordering relations
pub struct Lp {
    factors_number: usize,
    relations: Vec<(FactorId, FactorId)>,
    messages: Vec<(FactorId, FactorId)>,
}

impl Lp {
    /// Creates an empty scheduler
    #[inline]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns all recorded relations in the order they were added
    #[inline]
    pub fn relations(&self) -> &[(FactorId, FactorId)] {
        &self.relations
    }

    /// Returns endpoints of all recorded messages, indexed by message handle
    #[inline]
    pub fn messages(&self) -> &[(FactorId, FactorId)] {
        &self.messages
    }

    #[inline]
    pub fn number_of_messages(&self) -> usize {
        self.messages.len()
    }

    /// Returns whether the relation `before -> after` has been recorded
    #[inline]
    pub fn has_relation(&self, before: FactorId, after: FactorId) -> bool {
        self.relations.contains(&(before, after))
    }

    /// Orders all factors consistently with recorded relations.
    /// Among factors that are ready at the same time the one registered first goes first
    ///
    /// # Example
    ///
    /// ```
    /// use lpmrf::core::{Lp, Scheduler};
    ///
    /// let mut lp = Lp::new();
    /// let a = lp.add_factor();
    /// let b = lp.add_factor();
    /// lp.add_factor_relation(b, a);
    /// assert_eq!(lp.forward_order().unwrap(), vec![b, a]);
    /// ```
    pub fn forward_order(&self) -> SchedulerResult<Vec<FactorId>> {
        let total = self.factors_number;
        let mut successors = vec![Vec::new(); total];
        let mut in_degree = vec![0usize; total];
        for (before, after) in &self.relations {
            if before.0 >= total {
                return Err(SchedulerError::UnknownFactor(*before));
            }
            if after.0 >= total {
                return Err(SchedulerError::UnknownFactor(*after));
            }
            successors[before.0].push(after.0);
            in_degree[after.0] += 1;
        }
        let mut ready: BinaryHeap<_> = (0..total)
            .filter(|i| in_degree[*i] == 0)
            .map(Reverse)
            .collect();
        let mut order = Vec::with_capacity(total);
        while let Some(Reverse(current)) = ready.pop() {
            order.push(FactorId(current));
            for next in &successors[current] {
                in_degree[*next] -= 1;
                if in_degree[*next] == 0 {
                    ready.push(Reverse(*next));
                }
            }
        }
        if order.len() != total {
            return Err(SchedulerError::CyclicRelations {
                ordered: order.len(),
                total,
            });
        }
        Ok(order)
    }
}

impl Scheduler for Lp {
    #[inline]
    fn add_factor(&mut self) -> FactorId {
        self.factors_number += 1;
        FactorId(self.factors_number - 1)
    }

    #[inline]
    fn add_factor_relation(&mut self, before: FactorId, after: FactorId) {
        self.relations.push((before, after));
    }

    #[inline]
    fn add_message(&mut self, left: FactorId, right: FactorId) -> MessageId {
        self.messages.push((left, right));
        MessageId(self.messages.len() - 1)
    }

    #[inline]
    fn number_of_factors(&self) -> usize {
        self.factors_number
    }
}
