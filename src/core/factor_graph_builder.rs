use rustc_hash::FxHashMap;
use thiserror::Error;

use crate::core::{
    factor::Factor,
    keys::PairKey,
    message::Message,
    scheduler::{FactorId, MessageId, Scheduler},
};

// ------------------------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, Error)]
/// Errors that could appear in factor graph builder's methods
pub enum FGBuilderError {
    /// Index of a variable is out of range
    #[error("ID (index) of a variable {1} is out of range of [0..{0}] variables")]
    OutOfRangeVariable(usize, usize),

    /// A unary factor has already been added for a variable
    #[error("Unary factor {0} already present")]
    UnaryFactorPresent(usize),

    /// A variable has no unary factor
    #[error("Unary factor {0} is missing")]
    MissingUnaryFactor(usize),

    /// A unary factor must have at least one label
    #[error("Unary factor {0} has an empty cost vector")]
    EmptyUnaryFactor(usize),

    /// Variables of a pairwise or triplet factor are not strictly increasing
    #[error("Variables {0:?} are not strictly increasing")]
    UnorderedVariables(Vec<usize>),

    /// A pairwise factor has already been added for a pair of variables
    #[error("Pairwise factor ({0}, {1}) already present")]
    PairwiseFactorPresent(usize, usize),

    /// A pairwise factor for a pair of variables is missing
    #[error("Pairwise factor ({0}, {1}) is missing")]
    MissingPairwiseFactor(usize, usize),

    /// A triplet factor has already been added for a triple of variables
    #[error("Triplet factor ({0}, {1}, {2}) already present")]
    TripletFactorPresent(usize, usize, usize),

    /// ID of a pairwise or triplet factor is out of range
    #[error("ID of a factor {1} is out of range of [0..{0}] factors")]
    OutOfRangeFactor(usize, usize),

    /// A label is out of range of a variable's labels
    #[error("Label {label} is out of range of [0..{labels}] labels")]
    OutOfRangeLabel { label: usize, labels: usize },

    /// Length of a cost vector does not match the product of cardinalities
    #[error("Cost vector has {actual} entries while {expected} are required")]
    DimensionMismatch { expected: usize, actual: usize },

    /// A variable index does not fit into a packed key
    #[error("Variable index {0} is too large to be packed into a key")]
    IndexOverflow(usize),

    /// Tightening was requested with zero budget
    #[error("Number of triplets to add must be positive")]
    ZeroBudget,
}

/// Factor graph builder's methods result type
pub type FGBuilderResult<T> = Result<T, FGBuilderError>;

// ------------------------------------------------------------------------------------------

/// Construction hooks a concrete model supplies to the generic builder
pub trait MrfHooks {
    /// Type of a unary factor
    type Unary: Factor;
    /// Type of a pairwise factor
    type Pairwise: Factor;
    /// Type of a message between the first variable's unary factor and a pairwise factor
    type LeftMessage: Message;
    /// Type of a message between the second variable's unary factor and a pairwise factor
    type RightMessage: Message;

    /// Makes a unary factor from a cost vector
    fn construct_unary_factor(&self, cost: &[f64]) -> Self::Unary;

    /// Makes a pairwise factor from a cost vector flattened as `i1 + i2 * left_dim`
    fn construct_pairwise_factor(
        &self,
        cost: &[f64],
        left_dim: usize,
        right_dim: usize,
    ) -> Self::Pairwise;

    /// Makes a message linking the first variable's unary factor with a pairwise factor
    fn construct_left_unary_pairwise_message(
        &self,
        left: &Self::Unary,
        pairwise: &Self::Pairwise,
    ) -> Self::LeftMessage;

    /// Makes a message linking the second variable's unary factor with a pairwise factor
    fn construct_right_unary_pairwise_message(
        &self,
        right: &Self::Unary,
        pairwise: &Self::Pairwise,
    ) -> Self::RightMessage;
}

#[derive(Debug)]
/// A unary factor owned by a builder
pub struct UnaryEntry<U> {
    pub(crate) id: FactorId,
    pub(crate) factor: U,
}

#[derive(Debug)]
/// A pairwise factor owned by a builder together with its metadata
pub struct PairwiseEntry<P> {
    pub(crate) id: FactorId,
    pub(crate) variables: (usize, usize),
    pub(crate) factor: P,
    pub(crate) left_message: usize,
    pub(crate) right_message: usize,
}

#[derive(Debug)]
/// A message owned by a builder together with its endpoints
pub struct MessageEntry<M> {
    pub(crate) id: MessageId,
    pub(crate) left: FactorId,
    pub(crate) right: FactorId,
    pub(crate) message: M,
}

impl<U> UnaryEntry<U> {
    #[inline]
    pub fn id(&self) -> FactorId {
        self.id
    }

    #[inline]
    pub fn factor(&self) -> &U {
        &self.factor
    }
}

impl<P> PairwiseEntry<P> {
    #[inline]
    pub fn id(&self) -> FactorId {
        self.id
    }

    #[inline]
    pub fn variables(&self) -> (usize, usize) {
        self.variables
    }

    #[inline]
    pub fn factor(&self) -> &P {
        &self.factor
    }

    /// Positions of the two unary linking messages in
    /// `left_messages()` and `right_messages()` respectively
    #[inline]
    pub fn messages(&self) -> (usize, usize) {
        (self.left_message, self.right_message)
    }
}

impl<M> MessageEntry<M> {
    #[inline]
    pub fn id(&self) -> MessageId {
        self.id
    }

    #[inline]
    pub fn left(&self) -> FactorId {
        self.left
    }

    #[inline]
    pub fn right(&self) -> FactorId {
        self.right
    }

    #[inline]
    pub fn message(&self) -> &M {
        &self.message
    }
}

// public methods ---------------------------------------------------------------------------

#[derive(Debug)]
/// A builder of pairwise Markov random fields.
///
/// The builder owns all factors and messages, keeps the sorted pair lookup
/// and reports factors, messages and ordering relations to a scheduler
pub struct MrfBuilder<H, S>
where
    H: MrfHooks,
    S: Scheduler,
{
    pub(crate) hooks: H,
    pub(crate) lp: S,
    pub(crate) unary_factors: Vec<Option<UnaryEntry<H::Unary>>>,
    pub(crate) pairwise_factors: Vec<PairwiseEntry<H::Pairwise>>,
    pub(crate) pairwise_map: FxHashMap<PairKey, usize>,
    pub(crate) left_messages: Vec<MessageEntry<H::LeftMessage>>,
    pub(crate) right_messages: Vec<MessageEntry<H::RightMessage>>,
    unary_factor_index_begin: Option<usize>,
}

impl<H, S> MrfBuilder<H, S>
where
    H: MrfHooks,
    S: Scheduler,
{
    /// Creates an empty builder
    ///
    /// # Arguments
    ///
    /// * `hooks` - Construction hooks of a concrete model
    /// * `lp` - A scheduler factors and messages are reported to
    ///
    /// # Example
    ///
    /// ```
    /// use lpmrf::core::{Lp, MrfBuilder};
    /// use lpmrf::mrf::StandardMrfHooks;
    ///
    /// let mrf = MrfBuilder::new(StandardMrfHooks, Lp::new());
    /// assert_eq!(mrf.number_of_variables(), 0);
    /// ```
    #[inline]
    pub fn new(hooks: H, lp: S) -> Self {
        MrfBuilder {
            hooks,
            lp,
            unary_factors: Vec::new(),
            pairwise_factors: Vec::new(),
            pairwise_map: FxHashMap::default(),
            left_messages: Vec::new(),
            right_messages: Vec::new(),
            unary_factor_index_begin: None,
        }
    }

    /// Adds a unary factor for a variable
    ///
    /// # Arguments
    ///
    /// * `index` - Index of a variable
    /// * `cost` - A cost vector, its length is the variable's number of labels
    ///
    /// # Notes
    ///
    /// Variables do not have to be added in order, gaps are filled by empty
    /// slots. Adding a unary factor twice for the same variable is an error
    ///
    /// # Example
    ///
    /// ```
    /// use lpmrf::mrf::new_standard_builder;
    /// use lpmrf::core::Lp;
    ///
    /// let mut mrf = new_standard_builder(Lp::new());
    /// mrf.add_unary_factor(2, &[0., 1., 2.]).unwrap();
    /// assert_eq!(mrf.number_of_variables(), 3);
    /// assert!(mrf.add_unary_factor(2, &[0., 1.]).is_err());
    /// ```
    pub fn add_unary_factor(&mut self, index: usize, cost: &[f64]) -> FGBuilderResult<FactorId> {
        if cost.is_empty() {
            return Err(FGBuilderError::EmptyUnaryFactor(index));
        }
        self.check_free_unary_slot(index)?;
        let factor = self.hooks.construct_unary_factor(cost);
        let id = self.lp.add_factor();
        self.unary_factors[index] = Some(UnaryEntry { id, factor });
        Ok(id)
    }

    /// Adds a unary factor for the next variable and returns the variable's index
    #[inline]
    pub fn push_unary_factor(&mut self, cost: &[f64]) -> FGBuilderResult<usize> {
        let index = self.unary_factors.len();
        self.add_unary_factor(index, cost)?;
        Ok(index)
    }

    /// Registers a unary factor that was constructed and reported to the scheduler elsewhere
    ///
    /// # Arguments
    ///
    /// * `index` - Index of a variable
    /// * `factor` - A unary factor
    /// * `id` - The handle the scheduler assigned to the factor
    pub fn register_unary_factor(
        &mut self,
        index: usize,
        factor: H::Unary,
        id: FactorId,
    ) -> FGBuilderResult<()> {
        if factor.size() == 0 {
            return Err(FGBuilderError::EmptyUnaryFactor(index));
        }
        self.check_free_unary_slot(index)?;
        self.unary_factors[index] = Some(UnaryEntry { id, factor });
        Ok(())
    }

    /// Adds a pairwise factor together with two messages linking it to unary factors
    ///
    /// # Arguments
    ///
    /// * `var1` - The first variable
    /// * `var2` - The second variable, `var1 < var2`
    /// * `cost` - A cost vector flattened as `i1 + i2 * labels(var1)`
    ///
    /// # Notes
    ///
    /// Unary factors of both variables must be present. The scheduler receives
    /// relations `unary(var1) -> pairwise -> unary(var2)`. Returns the pairwise factor's ID
    ///
    /// # Example
    ///
    /// ```
    /// use lpmrf::mrf::new_standard_builder;
    /// use lpmrf::core::Lp;
    ///
    /// let mut mrf = new_standard_builder(Lp::new());
    /// mrf.add_unary_factor(0, &[0., 0.]).unwrap();
    /// mrf.add_unary_factor(1, &[0., 0., 0.]).unwrap();
    /// let id = mrf.add_pairwise_factor(0, 1, &[0., 1., 2., 3., 4., 5.]).unwrap();
    /// assert!(mrf.has_pairwise_factor(0, 1));
    /// assert_eq!(mrf.pairwise_value(id, 1, 2).unwrap(), 5.);
    /// ```
    pub fn add_pairwise_factor(
        &mut self,
        var1: usize,
        var2: usize,
        cost: &[f64],
    ) -> FGBuilderResult<usize> {
        let key = Self::pair_key(var1, var2)?;
        if self.pairwise_map.contains_key(&key) {
            return Err(FGBuilderError::PairwiseFactorPresent(var1, var2));
        }
        let left_dim = self.number_of_labels(var1)?;
        let right_dim = self.number_of_labels(var2)?;
        if cost.len() != left_dim * right_dim {
            return Err(FGBuilderError::DimensionMismatch {
                expected: left_dim * right_dim,
                actual: cost.len(),
            });
        }
        let factor = self
            .hooks
            .construct_pairwise_factor(cost, left_dim, right_dim);
        let id = self.lp.add_factor();
        let (left_message, right_message) = self.link_unary_pairwise_factor(var1, &factor, id, var2)?;
        let (left_id, right_id) = (self.unary_id(var1)?, self.unary_id(var2)?);
        self.pairwise_factors.push(PairwiseEntry {
            id,
            variables: (var1, var2),
            factor,
            left_message,
            right_message,
        });
        let factor_id = self.pairwise_factors.len() - 1;
        self.pairwise_map.insert(key, factor_id);
        self.lp.add_factor_relation(left_id, id);
        self.lp.add_factor_relation(id, right_id);
        Ok(factor_id)
    }

    /// Adds a pairwise factor with all-zero cost
    #[inline]
    pub fn add_empty_pairwise_factor(&mut self, var1: usize, var2: usize) -> FGBuilderResult<usize> {
        let dim = self.number_of_labels(var1)? * self.number_of_labels(var2)?;
        self.add_pairwise_factor(var1, var2, &vec![0f64; dim])
    }

    /// Finalizes the structure by chaining all unary factors in a total order
    /// `unary(0) -> unary(1) -> ...`
    ///
    /// # Notes
    ///
    /// Every variable must have a unary factor at this point
    pub fn construct(&mut self) -> FGBuilderResult<()> {
        tracing::info!(
            unary_factors = self.unary_factors.len(),
            pairwise_factors = self.pairwise_factors.len(),
            "construct MRF problem"
        );
        self.unary_factor_index_begin = Some(self.lp.number_of_factors());
        for index in 1..self.unary_factors.len() {
            let before = self.unary_id(index - 1)?;
            let after = self.unary_id(index)?;
            self.lp.add_factor_relation(before, after);
        }
        Ok(())
    }

    /// Returns the number of variables, i.e. the length of the unary factor array
    #[inline]
    pub fn number_of_variables(&self) -> usize {
        debug_assert!(!(self.unary_factors.is_empty() && !self.pairwise_factors.is_empty()));
        self.unary_factors.len()
    }

    /// Returns the number of labels of a variable
    #[inline]
    pub fn number_of_labels(&self, var: usize) -> FGBuilderResult<usize> {
        Ok(self.unary_entry(var)?.factor.size())
    }

    /// Returns whether a pairwise factor for a strictly ordered pair is present.
    /// A pair which is not strictly ordered is never present
    #[inline]
    pub fn has_pairwise_factor(&self, var1: usize, var2: usize) -> bool {
        PairKey::new(var1, var2).is_some_and(|key| self.pairwise_map.contains_key(&key))
    }

    /// Returns the ID of a pairwise factor for a strictly ordered pair
    #[inline]
    pub fn pairwise_factor_id(&self, var1: usize, var2: usize) -> FGBuilderResult<usize> {
        let key = Self::pair_key(var1, var2)?;
        self.pairwise_map
            .get(&key)
            .copied()
            .ok_or(FGBuilderError::MissingPairwiseFactor(var1, var2))
    }

    #[inline]
    pub fn number_of_pairwise_factors(&self) -> usize {
        self.pairwise_factors.len()
    }

    /// Returns variables of a pairwise factor
    #[inline]
    pub fn pairwise_variables(&self, factor_id: usize) -> FGBuilderResult<(usize, usize)> {
        Ok(self.pairwise_entry(factor_id)?.variables)
    }

    /// Returns the cost of a pairwise factor for labels `i1` of the first
    /// variable and `i2` of the second one, read at `i1 + i2 * labels(var1)`
    pub fn pairwise_value(&self, factor_id: usize, i1: usize, i2: usize) -> FGBuilderResult<f64> {
        let entry = self.pairwise_entry(factor_id)?;
        let (var1, var2) = entry.variables;
        let dim1 = self.number_of_labels(var1)?;
        let dim2 = self.number_of_labels(var2)?;
        if i1 >= dim1 {
            return Err(FGBuilderError::OutOfRangeLabel {
                label: i1,
                labels: dim1,
            });
        }
        if i2 >= dim2 {
            return Err(FGBuilderError::OutOfRangeLabel {
                label: i2,
                labels: dim2,
            });
        }
        Ok(entry.factor.cost()[i1 + i2 * dim1])
    }

    /// Returns the unary factor of a variable if present
    #[inline]
    pub fn unary_factor(&self, var: usize) -> Option<&H::Unary> {
        self.unary_factors
            .get(var)
            .and_then(|u| u.as_ref())
            .map(|u| &u.factor)
    }

    /// Returns the unary factor of a variable for in place modification
    #[inline]
    pub fn unary_factor_mut(&mut self, var: usize) -> Option<&mut H::Unary> {
        self.unary_factors
            .get_mut(var)
            .and_then(|u| u.as_mut())
            .map(|u| &mut u.factor)
    }

    /// Returns the scheduler handle of a variable's unary factor
    #[inline]
    pub fn unary_factor_id(&self, var: usize) -> Option<FactorId> {
        self.unary_factors
            .get(var)
            .and_then(|u| u.as_ref())
            .map(|u| u.id)
    }

    /// Returns a pairwise factor together with its metadata
    #[inline]
    pub fn pairwise_factor(&self, factor_id: usize) -> Option<&PairwiseEntry<H::Pairwise>> {
        self.pairwise_factors.get(factor_id)
    }

    /// Returns a pairwise factor for in place modification
    #[inline]
    pub fn pairwise_factor_mut(&mut self, factor_id: usize) -> Option<&mut H::Pairwise> {
        self.pairwise_factors.get_mut(factor_id).map(|p| &mut p.factor)
    }

    #[inline]
    pub fn pairwise_factors(&self) -> &[PairwiseEntry<H::Pairwise>] {
        &self.pairwise_factors
    }

    #[inline]
    pub fn left_messages(&self) -> &[MessageEntry<H::LeftMessage>] {
        &self.left_messages
    }

    #[inline]
    pub fn right_messages(&self) -> &[MessageEntry<H::RightMessage>] {
        &self.right_messages
    }

    #[inline]
    pub fn hooks(&self) -> &H {
        &self.hooks
    }

    #[inline]
    pub fn scheduler(&self) -> &S {
        &self.lp
    }

    /// Returns the number of factors the scheduler held when `construct` was called
    #[inline]
    pub fn unary_factor_index_begin(&self) -> Option<usize> {
        self.unary_factor_index_begin
    }

    /// Consumes the builder and returns its scheduler
    #[inline]
    pub fn into_scheduler(self) -> S {
        self.lp
    }
}

// private methods --------------------------------------------------------------------------

impl<H, S> MrfBuilder<H, S>
where
    H: MrfHooks,
    S: Scheduler,
{
    #[inline(always)]
    pub(crate) fn pair_key(var1: usize, var2: usize) -> FGBuilderResult<PairKey> {
        if var1 >= var2 {
            return Err(FGBuilderError::UnorderedVariables(vec![var1, var2]));
        }
        PairKey::new(var1, var2).ok_or(FGBuilderError::IndexOverflow(var2))
    }

    #[inline(always)]
    fn check_free_unary_slot(&mut self, index: usize) -> FGBuilderResult<()> {
        if index >= self.unary_factors.len() {
            self.unary_factors.resize_with(index + 1, || None);
        } else if self.unary_factors[index].is_some() {
            return Err(FGBuilderError::UnaryFactorPresent(index));
        }
        Ok(())
    }

    #[inline(always)]
    fn unary_entry(&self, var: usize) -> FGBuilderResult<&UnaryEntry<H::Unary>> {
        match self.unary_factors.get(var) {
            Some(Some(entry)) => Ok(entry),
            Some(None) => Err(FGBuilderError::MissingUnaryFactor(var)),
            None => Err(FGBuilderError::OutOfRangeVariable(
                self.unary_factors.len(),
                var,
            )),
        }
    }

    #[inline(always)]
    fn unary_id(&self, var: usize) -> FGBuilderResult<FactorId> {
        Ok(self.unary_entry(var)?.id)
    }

    #[inline(always)]
    pub(crate) fn pairwise_entry(&self, factor_id: usize) -> FGBuilderResult<&PairwiseEntry<H::Pairwise>> {
        self.pairwise_factors
            .get(factor_id)
            .ok_or(FGBuilderError::OutOfRangeFactor(
                self.pairwise_factors.len(),
                factor_id,
            ))
    }

    fn link_unary_pairwise_factor(
        &mut self,
        var1: usize,
        pairwise: &H::Pairwise,
        pairwise_id: FactorId,
        var2: usize,
    ) -> FGBuilderResult<(usize, usize)> {
        let left = self.unary_entry(var1)?;
        let left_message = self
            .hooks
            .construct_left_unary_pairwise_message(&left.factor, pairwise);
        let left_id = left.id;
        let right = self.unary_entry(var2)?;
        let right_message = self
            .hooks
            .construct_right_unary_pairwise_message(&right.factor, pairwise);
        let right_id = right.id;

        let id = self.lp.add_message(left_id, pairwise_id);
        self.left_messages.push(MessageEntry {
            id,
            left: left_id,
            right: pairwise_id,
            message: left_message,
        });
        let id = self.lp.add_message(right_id, pairwise_id);
        self.right_messages.push(MessageEntry {
            id,
            left: right_id,
            right: pairwise_id,
            message: right_message,
        });
        Ok((self.left_messages.len() - 1, self.right_messages.len() - 1))
    }
}
