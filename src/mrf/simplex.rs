use crate::config::TighteningParameters;
use crate::core::{
    Factor, Message, MrfBuilder, MrfHooks, Scheduler, TighteningMrfBuilder, TripletHooks,
    TripletPair,
};

// ------------------------------------------------------------------------------------------

/// A factor over a simplex of joint labels: a cost vector and a committed label
#[derive(Debug, Clone, PartialEq)]
pub struct SimplexFactor {
    cost: Vec<f64>,
    primal: usize,
}

impl SimplexFactor {
    /// Creates a factor with nothing committed
    #[inline]
    pub fn new(cost: &[f64]) -> Self {
        SimplexFactor {
            cost: cost.to_vec(),
            primal: cost.len(),
        }
    }
}

impl Factor for SimplexFactor {
    #[inline(always)]
    fn size(&self) -> usize {
        self.cost.len()
    }

    #[inline(always)]
    fn cost(&self) -> &[f64] {
        &self.cost
    }

    #[inline(always)]
    fn cost_mut(&mut self) -> &mut [f64] {
        &mut self.cost
    }

    #[inline(always)]
    fn primal(&self) -> usize {
        self.primal
    }

    #[inline(always)]
    fn set_primal(&mut self, label: usize) {
        self.primal = label;
    }
}

// ------------------------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
/// Endpoint of a pairwise factor
pub enum PairwiseSide {
    /// The first (smaller) variable
    Left,
    /// The second variable
    Right,
}

/// A message between a unary factor and one endpoint of a pairwise factor.
/// A pairwise cost is flattened as `a + b * d1`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UnaryPairwiseMessage {
    side: PairwiseSide,
    dims: (usize, usize),
}

impl UnaryPairwiseMessage {
    #[inline]
    pub fn new(side: PairwiseSide, left_dim: usize, right_dim: usize) -> Self {
        UnaryPairwiseMessage {
            side,
            dims: (left_dim, right_dim),
        }
    }

    #[inline]
    pub fn side(&self) -> PairwiseSide {
        self.side
    }

    /// Returns the label of the tracked endpoint for an index of the pairwise cost
    #[inline(always)]
    pub fn unary_label(&self, pairwise_index: usize) -> usize {
        match self.side {
            PairwiseSide::Left => pairwise_index % self.dims.0,
            PairwiseSide::Right => pairwise_index / self.dims.0,
        }
    }

    /// Minimizes a pairwise cost over the other endpoint
    ///
    /// # Example
    ///
    /// ```
    /// use lpmrf::mrf::{PairwiseSide, UnaryPairwiseMessage};
    ///
    /// // labels of the left variable change fastest
    /// let cost = [0., 5., 3., 1., 4., 2.];
    /// let left = UnaryPairwiseMessage::new(PairwiseSide::Left, 2, 3);
    /// assert_eq!(left.min_marginals(&cost), vec![0., 1.]);
    /// let right = UnaryPairwiseMessage::new(PairwiseSide::Right, 2, 3);
    /// assert_eq!(right.min_marginals(&cost), vec![0., 1., 2.]);
    /// ```
    pub fn min_marginals(&self, pairwise_cost: &[f64]) -> Vec<f64> {
        let mut marginals = vec![f64::INFINITY; self.size()];
        for (i, c) in pairwise_cost.iter().enumerate() {
            let label = self.unary_label(i);
            marginals[label] = marginals[label].min(*c);
        }
        marginals
    }
}

impl Message for UnaryPairwiseMessage {
    #[inline(always)]
    fn size(&self) -> usize {
        match self.side {
            PairwiseSide::Left => self.dims.0,
            PairwiseSide::Right => self.dims.1,
        }
    }

    #[inline]
    fn repam_left(&self, left: &mut [f64], msg: &[f64]) {
        debug_assert_eq!(msg.len(), self.size());
        left.iter_mut().zip(msg).for_each(|(l, m)| *l += *m);
    }

    #[inline]
    fn repam_right(&self, right: &mut [f64], msg: &[f64]) {
        debug_assert_eq!(msg.len(), self.size());
        for (i, r) in right.iter_mut().enumerate() {
            *r += msg[self.unary_label(i)];
        }
    }
}

// ------------------------------------------------------------------------------------------

/// A message between a pairwise factor and a triplet factor containing it.
/// A triplet cost is flattened as `a + b * d1 + c * d1 * d2`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PairwiseTripletMessage {
    position: TripletPair,
    dims: [usize; 3],
}

impl PairwiseTripletMessage {
    #[inline]
    pub fn new(position: TripletPair, dims: [usize; 3]) -> Self {
        PairwiseTripletMessage { position, dims }
    }

    #[inline]
    pub fn position(&self) -> TripletPair {
        self.position
    }

    /// Maps an index of the triplet cost onto an index of the pairwise cost
    #[inline(always)]
    pub fn pairwise_index(&self, triplet_index: usize) -> usize {
        let [d1, d2, _] = self.dims;
        let labels = [
            triplet_index % d1,
            (triplet_index / d1) % d2,
            triplet_index / (d1 * d2),
        ];
        let (p, q) = self.position.positions();
        labels[p] + labels[q] * self.dims[p]
    }

    /// Minimizes a triplet cost over the variable which is not in the pair
    pub fn min_marginals(&self, triplet_cost: &[f64]) -> Vec<f64> {
        let mut marginals = vec![f64::INFINITY; self.size()];
        for (i, c) in triplet_cost.iter().enumerate() {
            let index = self.pairwise_index(i);
            marginals[index] = marginals[index].min(*c);
        }
        marginals
    }
}

impl Message for PairwiseTripletMessage {
    #[inline(always)]
    fn size(&self) -> usize {
        let (p, q) = self.position.positions();
        self.dims[p] * self.dims[q]
    }

    #[inline]
    fn repam_left(&self, left: &mut [f64], msg: &[f64]) {
        debug_assert_eq!(msg.len(), self.size());
        left.iter_mut().zip(msg).for_each(|(l, m)| *l += *m);
    }

    #[inline]
    fn repam_right(&self, right: &mut [f64], msg: &[f64]) {
        debug_assert_eq!(msg.len(), self.size());
        for (i, r) in right.iter_mut().enumerate() {
            *r += msg[self.pairwise_index(i)];
        }
    }
}

// ------------------------------------------------------------------------------------------

/// Hooks building a model out of simplex factors
#[derive(Debug, Clone, Copy, Default)]
pub struct StandardMrfHooks;

impl MrfHooks for StandardMrfHooks {
    type Unary = SimplexFactor;
    type Pairwise = SimplexFactor;
    type LeftMessage = UnaryPairwiseMessage;
    type RightMessage = UnaryPairwiseMessage;

    #[inline]
    fn construct_unary_factor(&self, cost: &[f64]) -> SimplexFactor {
        SimplexFactor::new(cost)
    }

    #[inline]
    fn construct_pairwise_factor(&self, cost: &[f64], _: usize, _: usize) -> SimplexFactor {
        SimplexFactor::new(cost)
    }

    #[inline]
    fn construct_left_unary_pairwise_message(
        &self,
        left: &SimplexFactor,
        pairwise: &SimplexFactor,
    ) -> UnaryPairwiseMessage {
        let left_dim = left.size();
        UnaryPairwiseMessage::new(PairwiseSide::Left, left_dim, pairwise.size() / left_dim)
    }

    #[inline]
    fn construct_right_unary_pairwise_message(
        &self,
        right: &SimplexFactor,
        pairwise: &SimplexFactor,
    ) -> UnaryPairwiseMessage {
        let right_dim = right.size();
        UnaryPairwiseMessage::new(PairwiseSide::Right, pairwise.size() / right_dim, right_dim)
    }
}

impl TripletHooks for StandardMrfHooks {
    type Triplet = SimplexFactor;
    type PairwiseTripletMessage = PairwiseTripletMessage;

    #[inline]
    fn construct_triplet_factor(&self, cost: &[f64], _: [usize; 3]) -> SimplexFactor {
        SimplexFactor::new(cost)
    }

    #[inline]
    fn construct_pairwise_triplet_message(
        &self,
        position: TripletPair,
        _: &SimplexFactor,
        _: &SimplexFactor,
        dims: [usize; 3],
    ) -> PairwiseTripletMessage {
        PairwiseTripletMessage::new(position, dims)
    }
}

/// Returns an empty builder of a model made of simplex factors
///
/// # Arguments
///
/// * `lp` - A scheduler factors and messages are reported to
///
/// # Example
///
/// ```
/// use lpmrf::core::Lp;
/// use lpmrf::mrf::new_standard_builder;
///
/// let mut mrf = new_standard_builder(Lp::new());
/// mrf.add_unary_factor(0, &[1., 0.]).unwrap();
/// mrf.add_unary_factor(1, &[0., 1.]).unwrap();
/// mrf.add_pairwise_factor(0, 1, &[0., 1., 1., 0.]).unwrap();
/// mrf.construct().unwrap();
/// assert_eq!(mrf.scheduler().number_of_messages(), 2);
/// ```
#[inline]
pub fn new_standard_builder<S: Scheduler>(lp: S) -> MrfBuilder<StandardMrfHooks, S> {
    MrfBuilder::new(StandardMrfHooks, lp)
}

/// Returns an empty builder of a model made of simplex factors that may be tightened
///
/// # Arguments
///
/// * `lp` - A scheduler factors and messages are reported to
/// * `parameters` - Parameters of cycle searches
#[inline]
pub fn new_tightening_builder<S: Scheduler>(
    lp: S,
    parameters: TighteningParameters,
) -> TighteningMrfBuilder<StandardMrfHooks, S> {
    TighteningMrfBuilder::new(StandardMrfHooks, lp, parameters)
}
