use crate::core::{factor::Factor, message::Message, EPS};
use thiserror::Error;

// ------------------------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Error)]
/// Errors that could appear in equality message's methods
pub enum EqualityError {
    /// A slot does not belong to a potential
    #[error("Slot {index} is out of range of a potential of size {size}")]
    SlotOutOfRange { index: usize, size: usize },

    /// A potential must have at least two entries to be made uniform
    #[error("A potential of size {0} can not be made uniform, at least 2 entries are required")]
    PotentialTooSmall(usize),

    /// Damped weights of a batched update sum up to more than one
    #[error("Damped sum of weights {0} exceeds 1 + eps")]
    WeightSumExceeded(f64),

    /// Index aligned inputs of a batched update have different lengths
    #[error("Batched update got {messages} messages, {values} message values and {omegas} weights")]
    LengthMismatch {
        messages: usize,
        values: usize,
        omegas: usize,
    },

    /// The message only receives restricted messages
    #[error("Message is restricted, optimizing updates are disabled")]
    MessagesDisabled,

    /// Primal propagation was requested in the direction the message does not support
    #[error("Primal propagation towards the {0:?} side is not active for this message")]
    WrongChirality(Chirality),
}

/// Equality message's methods result type
pub type EqualityResult<T> = Result<T, EqualityError>;

// ------------------------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
/// Side which is the source of primal label propagation
pub enum Chirality {
    /// Committed labels flow from the left factor to the right one
    Left,
    /// Committed labels flow from the right factor to the left one
    Right,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
/// Whether a message computes optimizing updates or only receives restricted ones
pub enum MessageMode {
    Optimize,
    RestrictedOnly,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
/// A hard equality constraint between one slot of the left factor's cost vector
/// and one slot of the right factor's cost vector
pub struct EqualityMessage {
    left_slot: usize,
    right_slot: usize,
    chirality: Chirality,
    mode: MessageMode,
}

// public methods ---------------------------------------------------------------------------

impl EqualityMessage {
    /// Creates a new equality message computing optimizing updates
    ///
    /// # Arguments
    ///
    /// * `left_slot` - A tracked slot of the left factor
    /// * `right_slot` - A tracked slot of the right factor
    /// * `chirality` - A side from which committed labels are propagated
    ///
    /// # Example
    ///
    /// ```
    /// use lpmrf::core::{Chirality, EqualityMessage};
    ///
    /// let msg = EqualityMessage::new(1, 3, Chirality::Left);
    /// assert_eq!(msg.left_slot(), 1);
    /// assert_eq!(msg.right_slot(), 3);
    /// ```
    #[inline]
    pub fn new(left_slot: usize, right_slot: usize, chirality: Chirality) -> Self {
        EqualityMessage {
            left_slot,
            right_slot,
            chirality,
            mode: MessageMode::Optimize,
        }
    }

    /// Creates a new equality message that only receives restricted messages
    #[inline]
    pub fn restricted(left_slot: usize, right_slot: usize, chirality: Chirality) -> Self {
        EqualityMessage {
            left_slot,
            right_slot,
            chirality,
            mode: MessageMode::RestrictedOnly,
        }
    }

    #[inline]
    pub fn left_slot(&self) -> usize {
        self.left_slot
    }

    #[inline]
    pub fn right_slot(&self) -> usize {
        self.right_slot
    }

    #[inline]
    pub fn chirality(&self) -> Chirality {
        self.chirality
    }

    #[inline]
    pub fn mode(&self) -> MessageMode {
        self.mode
    }

    /// Updates a message such that, after the message is added back into
    /// `potential[excluded]`, that entry moves (by `omega`) towards the minimum
    /// of the remaining entries
    ///
    /// # Arguments
    ///
    /// * `potential` - A reparametrized cost vector
    /// * `msg` - A message value that is updated
    /// * `excluded` - A slot of the potential the message is attached to
    /// * `omega` - A weight of the update
    ///
    /// # Example
    ///
    /// ```
    /// use lpmrf::core::EqualityMessage;
    ///
    /// let potential = [3., 1., 2.];
    /// let mut msg = 0.;
    /// EqualityMessage::make_factor_uniform(&potential, &mut msg, 0, 1.).unwrap();
    /// assert_eq!(msg, -2.);
    /// ```
    pub fn make_factor_uniform(
        potential: &[f64],
        msg: &mut f64,
        excluded: usize,
        omega: f64,
    ) -> EqualityResult<()> {
        if potential.len() < 2 {
            return Err(EqualityError::PotentialTooSmall(potential.len()));
        }
        if excluded >= potential.len() {
            return Err(EqualityError::SlotOutOfRange {
                index: excluded,
                size: potential.len(),
            });
        }
        let min_val = potential
            .iter()
            .enumerate()
            .filter(|(i, _)| *i != excluded)
            .map(|(_, x)| *x)
            .fold(f64::MAX, f64::min);
        *msg -= omega * (potential[excluded] - min_val);
        Ok(())
    }

    /// Computes a message sent from the right factor, the tracked right slot is excluded
    #[inline]
    pub fn receive_message_from_right(&self, right_pot: &[f64], msg: &mut f64) -> EqualityResult<()> {
        self.check_optimizing()?;
        Self::make_factor_uniform(right_pot, msg, self.right_slot, 1f64)
    }

    /// Computes a message sent from the left factor, the tracked left slot is excluded
    #[inline]
    pub fn receive_message_from_left(&self, left_pot: &[f64], msg: &mut f64) -> EqualityResult<()> {
        self.check_optimizing()?;
        Self::make_factor_uniform(left_pot, msg, self.left_slot, 1f64)
    }

    /// Receives a message from the right factor whose label has been fixed already
    ///
    /// # Arguments
    ///
    /// * `msg` - A message value that is updated
    /// * `right_label` - A committed label of the right factor, `None` if unknown
    ///
    /// # Notes
    ///
    /// If the committed label differs from the tracked slot the slot is forbidden
    /// (the message becomes `+inf`), otherwise it is forced (the message becomes `-inf`)
    #[inline]
    pub fn receive_restricted_message_from_right(&self, msg: &mut f64, right_label: Option<usize>) {
        Self::restrict(msg, right_label, self.right_slot)
    }

    /// Receives a message from the left factor whose label has been fixed already.
    /// See [`EqualityMessage::receive_restricted_message_from_right`]
    #[inline]
    pub fn receive_restricted_message_from_left(&self, msg: &mut f64, left_label: Option<usize>) {
        Self::restrict(msg, left_label, self.left_slot)
    }

    /// Updates all messages that reference slots of one shared potential at once
    ///
    /// # Arguments
    ///
    /// * `slot_of` - Returns the slot of the shared potential a message refers to
    /// * `messages` - Messages attached to the shared potential
    /// * `values` - Message values, index aligned with `messages`
    /// * `potential` - The shared reparametrized cost vector
    /// * `omegas` - Weights of messages, index aligned with `messages`
    ///
    /// # Notes
    ///
    /// The effective step is `0.5 * sum(omegas)`. Covered slots are moved towards
    /// the global minimum if it lies outside of the covered set and towards the
    /// second minimum otherwise
    pub fn make_factor_uniform_parallel(
        slot_of: impl Fn(&EqualityMessage) -> usize,
        messages: &[EqualityMessage],
        values: &mut [f64],
        potential: &[f64],
        omegas: &[f64],
    ) -> EqualityResult<()> {
        if messages.len() != values.len() || messages.len() != omegas.len() {
            return Err(EqualityError::LengthMismatch {
                messages: messages.len(),
                values: values.len(),
                omegas: omegas.len(),
            });
        }
        let omega_sum = 0.5f64 * omegas.iter().sum::<f64>();
        if omega_sum > 1f64 + EPS {
            return Err(EqualityError::WeightSumExceeded(omega_sum));
        }

        let mut min_val_covered = f64::MAX;
        for msg in messages {
            let slot = slot_of(msg);
            let val = potential.get(slot).ok_or(EqualityError::SlotOutOfRange {
                index: slot,
                size: potential.len(),
            })?;
            min_val_covered = min_val_covered.min(*val);
        }

        let (min_val, second_min_val) = smallest_values(potential);
        let new_val = if min_val < min_val_covered {
            min_val
        } else {
            second_min_val
        };

        for ((msg, value), omega) in messages.iter().zip(values.iter_mut()).zip(omegas) {
            if *omega > 0f64 {
                *value -= omega_sum * (potential[slot_of(msg)] - new_val);
            }
        }
        Ok(())
    }

    /// Sends all messages attached to one right potential to their left factors
    #[inline]
    pub fn send_messages_to_left(
        right_repam: &[f64],
        messages: &[EqualityMessage],
        values: &mut [f64],
        omegas: &[f64],
    ) -> EqualityResult<()> {
        Self::check_all_optimizing(messages)?;
        Self::make_factor_uniform_parallel(|m| m.right_slot, messages, values, right_repam, omegas)
    }

    /// Sends all messages attached to one left potential to their right factors
    #[inline]
    pub fn send_messages_to_right(
        left_repam: &[f64],
        messages: &[EqualityMessage],
        values: &mut [f64],
        omegas: &[f64],
    ) -> EqualityResult<()> {
        Self::check_all_optimizing(messages)?;
        Self::make_factor_uniform_parallel(|m| m.left_slot, messages, values, left_repam, omegas)
    }

    /// Propagates a committed label from the right factor to the left one
    pub fn compute_left_from_right_primal<L, R>(&self, left: &mut L, right: &R) -> EqualityResult<()>
    where
        L: Factor,
        R: Factor,
    {
        if self.chirality != Chirality::Right {
            return Err(EqualityError::WrongChirality(Chirality::Left));
        }
        self.left_from_right(left, right);
        Ok(())
    }

    /// Propagates a committed label from the left factor to the right one
    ///
    /// # Notes
    ///
    /// An out of range label of the right factor is first normalized to its last
    /// label, which stands for "unassigned" in matching problems
    pub fn compute_right_from_left_primal<L, R>(&self, left: &L, right: &mut R) -> EqualityResult<()>
    where
        L: Factor,
        R: Factor,
    {
        if self.chirality != Chirality::Left {
            return Err(EqualityError::WrongChirality(Chirality::Right));
        }
        self.right_from_left(left, right);
        Ok(())
    }

    /// Propagates a committed label in the direction selected by the message's chirality
    #[inline]
    pub fn propagate_primal<L, R>(&self, left: &mut L, right: &mut R)
    where
        L: Factor,
        R: Factor,
    {
        match self.chirality {
            Chirality::Left => self.right_from_left(left, right),
            Chirality::Right => self.left_from_right(left, right),
        }
    }

    /// Checks whether committed labels of both sides satisfy the equality constraint
    ///
    /// # Notes
    ///
    /// A mismatch is a diagnostic, it is reported but never repaired
    pub fn check_primal_consistency<L, R>(&self, left: &L, right: &R) -> bool
    where
        L: Factor,
        R: Factor,
    {
        if left.primal() == self.left_slot {
            let consistent = right.primal() == self.right_slot;
            if !consistent {
                tracing::debug!(
                    left_slot = self.left_slot,
                    right_primal = right.primal(),
                    "left side takes the tracked slot but right side does not"
                );
            }
            return consistent;
        }
        if right.primal() == self.right_slot {
            let consistent = left.primal() == self.left_slot;
            if !consistent {
                tracing::debug!(
                    right_slot = self.right_slot,
                    left_primal = left.primal(),
                    "right side takes the tracked slot but left side does not"
                );
            }
            return consistent;
        }
        true
    }

    /// Adds a message value into the tracked slot of the left potential
    #[inline(always)]
    pub fn repam_left_slot(&self, left_pot: &mut [f64], msg: f64) {
        left_pot[self.left_slot] += msg;
    }

    /// Adds a message value into the tracked slot of the right potential
    #[inline(always)]
    pub fn repam_right_slot(&self, right_pot: &mut [f64], msg: f64) {
        right_pot[self.right_slot] += msg;
    }
}

impl Message for EqualityMessage {
    #[inline(always)]
    fn size(&self) -> usize {
        1
    }

    #[inline(always)]
    fn repam_left(&self, left: &mut [f64], msg: &[f64]) {
        debug_assert_eq!(msg.len(), 1);
        self.repam_left_slot(left, msg[0]);
    }

    #[inline(always)]
    fn repam_right(&self, right: &mut [f64], msg: &[f64]) {
        debug_assert_eq!(msg.len(), 1);
        self.repam_right_slot(right, msg[0]);
    }
}

// private methods --------------------------------------------------------------------------

impl EqualityMessage {
    #[inline(always)]
    fn check_optimizing(&self) -> EqualityResult<()> {
        match self.mode {
            MessageMode::Optimize => Ok(()),
            MessageMode::RestrictedOnly => Err(EqualityError::MessagesDisabled),
        }
    }

    #[inline(always)]
    fn check_all_optimizing(messages: &[EqualityMessage]) -> EqualityResult<()> {
        messages.iter().try_for_each(|m| m.check_optimizing())
    }

    #[inline(always)]
    fn left_from_right<L: Factor, R: Factor>(&self, left: &mut L, right: &R) {
        if right.primal() == self.right_slot {
            left.set_primal(self.left_slot);
        }
    }

    #[inline(always)]
    fn right_from_left<L: Factor, R: Factor>(&self, left: &L, right: &mut R) {
        if right.primal() >= right.size() && right.size() > 0 {
            right.set_primal(right.size() - 1);
        }
        if left.primal() == self.left_slot {
            right.set_primal(self.right_slot);
        }
    }

    #[inline(always)]
    fn restrict(msg: &mut f64, label: Option<usize>, slot: usize) {
        match label {
            Some(label) if label != slot => *msg -= f64::NEG_INFINITY,
            Some(_) => *msg -= f64::INFINITY,
            None => {}
        }
    }
}

/// Returns the smallest and the second smallest entries. If the smallest value
/// occurs twice, both returned values are equal
#[inline]
pub(crate) fn smallest_values(potential: &[f64]) -> (f64, f64) {
    let mut min_val = f64::MAX;
    let mut second_min_val = f64::MAX;
    for cur_val in potential {
        if min_val >= *cur_val {
            second_min_val = min_val;
            min_val = *cur_val;
        } else if second_min_val > *cur_val {
            second_min_val = *cur_val;
        }
    }
    (min_val, second_min_val)
}
