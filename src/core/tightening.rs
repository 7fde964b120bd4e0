use std::fmt::Display;

use rustc_hash::{FxHashMap, FxHashSet};
use serde::{Deserialize, Serialize};

use crate::{
    config::TighteningParameters,
    core::{
        factor::Factor,
        factor_graph_builder::{
            FGBuilderError, FGBuilderResult, MessageEntry, MrfBuilder, MrfHooks, PairwiseEntry,
        },
        keys::{PairKey, TripletKey},
        message::Message,
        scheduler::{FactorId, Scheduler},
    },
};

// ------------------------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
/// One of the three pairs a sorted triple `(v1, v2, v3)` consists of
pub enum TripletPair {
    /// `(v1, v2)`
    P12,
    /// `(v1, v3)`
    P13,
    /// `(v2, v3)`
    P23,
}

impl TripletPair {
    /// Positions of the pair's variables inside a triple
    #[inline]
    pub fn positions(&self) -> (usize, usize) {
        match self {
            TripletPair::P12 => (0, 1),
            TripletPair::P13 => (0, 2),
            TripletPair::P23 => (1, 2),
        }
    }
}

/// Construction hooks needed to tighten a model with triplet factors
pub trait TripletHooks: MrfHooks {
    /// Type of a triplet factor
    type Triplet: Factor;
    /// Type of a message between a pairwise factor and a triplet factor
    type PairwiseTripletMessage: Message;

    /// Makes a triplet factor from a cost vector flattened as `a + b * d1 + c * d1 * d2`
    fn construct_triplet_factor(&self, cost: &[f64], dims: [usize; 3]) -> Self::Triplet;

    /// Makes a message linking one constituent pairwise factor with a triplet factor
    fn construct_pairwise_triplet_message(
        &self,
        position: TripletPair,
        pairwise: &Self::Pairwise,
        triplet: &Self::Triplet,
        dims: [usize; 3],
    ) -> Self::PairwiseTripletMessage;
}

#[derive(Debug)]
/// A triplet factor owned by a builder together with its metadata
pub struct TripletEntry<T> {
    pub(crate) id: FactorId,
    pub(crate) variables: (usize, usize, usize),
    pub(crate) factor: T,
    pub(crate) messages: [usize; 3],
}

impl<T> TripletEntry<T> {
    #[inline]
    pub fn id(&self) -> FactorId {
        self.id
    }

    #[inline]
    pub fn variables(&self) -> (usize, usize, usize) {
        self.variables
    }

    #[inline]
    pub fn factor(&self) -> &T {
        &self.factor
    }

    /// Positions of linking messages in `triplet_messages()`, ordered as `P12, P13, P23`
    #[inline]
    pub fn messages(&self) -> [usize; 3] {
        self.messages
    }
}

// ------------------------------------------------------------------------------------------

/// Cost vector of a pairwise factor copied into a snapshot
#[derive(Debug, Clone, PartialEq)]
pub struct PairwiseCost {
    /// Sorted pair of variables
    pub variables: (usize, usize),

    /// Cost vector flattened as `i1 + i2 * labels(v1)`
    pub cost: Vec<f64>,
}

/// An owned copy of the costs a cycle search reads, so that
/// the builder may be mutated while candidates are proposed
#[derive(Debug, Clone, Default)]
pub struct CostSnapshot {
    cardinalities: Vec<usize>,
    unary: Vec<Vec<f64>>,
    pairwise: Vec<PairwiseCost>,
    pairwise_map: FxHashMap<PairKey, usize>,
}

impl CostSnapshot {
    /// Copies costs of a model, every variable must have a unary factor
    pub fn from_builder<H, S>(mrf: &MrfBuilder<H, S>) -> FGBuilderResult<Self>
    where
        H: MrfHooks,
        S: Scheduler,
    {
        let number_of_variables = mrf.number_of_variables();
        let mut cardinalities = Vec::with_capacity(number_of_variables);
        let mut unary = Vec::with_capacity(number_of_variables);
        for var in 0..number_of_variables {
            let factor = mrf
                .unary_factor(var)
                .ok_or(FGBuilderError::MissingUnaryFactor(var))?;
            cardinalities.push(factor.size());
            unary.push(factor.cost().to_vec());
        }
        let pairwise: Vec<_> = mrf
            .pairwise_factors()
            .iter()
            .map(|entry: &PairwiseEntry<H::Pairwise>| PairwiseCost {
                variables: entry.variables(),
                cost: entry.factor().cost().to_vec(),
            })
            .collect();
        Ok(CostSnapshot {
            cardinalities,
            unary,
            pairwise_map: mrf.pairwise_map.clone(),
            pairwise,
        })
    }

    #[inline]
    pub fn number_of_variables(&self) -> usize {
        self.cardinalities.len()
    }

    #[inline]
    pub fn cardinalities(&self) -> &[usize] {
        &self.cardinalities
    }

    #[inline]
    pub fn unary(&self, var: usize) -> Option<&[f64]> {
        self.unary.get(var).map(Vec::as_slice)
    }

    #[inline]
    pub fn pairwise(&self) -> &[PairwiseCost] {
        &self.pairwise
    }

    /// Returns the cost vector of a pairwise factor for a strictly ordered pair
    #[inline]
    pub fn pairwise_cost(&self, var1: usize, var2: usize) -> Option<&[f64]> {
        let key = PairKey::new(var1, var2)?;
        self.pairwise_map
            .get(&key)
            .map(|id| self.pairwise[*id].cost.as_slice())
    }
}

// ------------------------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
/// How label sets are projected onto binary variables in a cycle search
pub enum ProjectionDepth {
    /// One projection per label: "takes label k" against the rest
    K,
    /// One projection per bipartition of labels
    Full,
}

/// A callback proposing a sorted triple, returns whether a new triplet was created
pub type AddTriplet<'a> = dyn FnMut(usize, usize, usize) -> FGBuilderResult<bool> + 'a;

/// A search of violated cycle inequalities
pub trait CycleSearch {
    /// Proposes triangles of existing pairwise factors
    ///
    /// # Arguments
    ///
    /// * `snapshot` - Costs of a model
    /// * `add` - A callback receiving sorted triples
    /// * `budget` - Maximal number of accepted candidates
    /// * `tolerance` - Minimal gap of a proposed triangle
    /// * `seen` - Triples that must not be proposed again, updated by the search
    ///
    /// # Notes
    ///
    /// Returns the number of candidates `add` accepted, never more than `budget`
    fn tighten_triplet(
        &mut self,
        snapshot: &CostSnapshot,
        add: &mut AddTriplet<'_>,
        budget: usize,
        tolerance: f64,
        seen: &mut FxHashSet<TripletKey>,
    ) -> FGBuilderResult<usize>;

    /// Proposes triangulations of frustrated cycles of a projection graph
    ///
    /// # Arguments
    ///
    /// * `snapshot` - Costs of a model
    /// * `add` - A callback receiving sorted triples
    /// * `budget` - Maximal number of accepted candidates
    /// * `tolerance` - Minimal strength of a projected edge
    /// * `depth` - How labels are projected onto binary variables
    ///
    /// # Notes
    ///
    /// Returns the number of candidates `add` accepted, never more than `budget`
    fn tighten_cycle(
        &mut self,
        snapshot: &CostSnapshot,
        add: &mut AddTriplet<'_>,
        budget: usize,
        tolerance: f64,
        depth: ProjectionDepth,
    ) -> FGBuilderResult<usize>;
}

/// Information returned after a tightening round
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TighteningInfo {
    /// Triplets added by the triangle search
    pub triplet_search: usize,

    /// Triplets added by the k-projection cycle search
    pub k_projection: usize,

    /// Triplets added by the full projection cycle search
    pub full_projection: usize,
}

impl TighteningInfo {
    #[inline]
    pub fn total(&self) -> usize {
        self.triplet_search + self.k_projection + self.full_projection
    }
}

impl Display for TighteningInfo {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "Tightening has added {} triplets: {} from triangle search, {} from k-projection, {} from full projection",
            self.total(),
            self.triplet_search,
            self.k_projection,
            self.full_projection,
        )
    }
}

// public methods ---------------------------------------------------------------------------

#[derive(Debug)]
/// A builder of pairwise Markov random fields that may be tightened by triplet factors
pub struct TighteningMrfBuilder<H, S>
where
    H: TripletHooks,
    S: Scheduler,
{
    mrf: MrfBuilder<H, S>,
    parameters: TighteningParameters,
    triplet_factors: Vec<TripletEntry<H::Triplet>>,
    triplet_map: FxHashMap<TripletKey, usize>,
    triplet_messages: Vec<MessageEntry<H::PairwiseTripletMessage>>,
}

impl<H, S> TighteningMrfBuilder<H, S>
where
    H: TripletHooks,
    S: Scheduler,
{
    /// Creates an empty builder
    ///
    /// # Arguments
    ///
    /// * `hooks` - Construction hooks of a concrete model
    /// * `lp` - A scheduler factors and messages are reported to
    /// * `parameters` - Parameters of cycle searches
    #[inline]
    pub fn new(hooks: H, lp: S, parameters: TighteningParameters) -> Self {
        TighteningMrfBuilder {
            mrf: MrfBuilder::new(hooks, lp),
            parameters,
            triplet_factors: Vec::new(),
            triplet_map: FxHashMap::default(),
            triplet_messages: Vec::new(),
        }
    }

    #[inline]
    pub fn builder(&self) -> &MrfBuilder<H, S> {
        &self.mrf
    }

    #[inline]
    pub fn builder_mut(&mut self) -> &mut MrfBuilder<H, S> {
        &mut self.mrf
    }

    #[inline]
    pub fn parameters(&self) -> &TighteningParameters {
        &self.parameters
    }

    #[inline]
    pub fn add_unary_factor(&mut self, index: usize, cost: &[f64]) -> FGBuilderResult<FactorId> {
        self.mrf.add_unary_factor(index, cost)
    }

    #[inline]
    pub fn add_pairwise_factor(
        &mut self,
        var1: usize,
        var2: usize,
        cost: &[f64],
    ) -> FGBuilderResult<usize> {
        self.mrf.add_pairwise_factor(var1, var2, cost)
    }

    #[inline]
    pub fn construct(&mut self) -> FGBuilderResult<()> {
        self.mrf.construct()
    }

    #[inline]
    pub fn number_of_variables(&self) -> usize {
        self.mrf.number_of_variables()
    }

    #[inline]
    pub fn number_of_labels(&self, var: usize) -> FGBuilderResult<usize> {
        self.mrf.number_of_labels(var)
    }

    #[inline]
    pub fn has_pairwise_factor(&self, var1: usize, var2: usize) -> bool {
        self.mrf.has_pairwise_factor(var1, var2)
    }

    #[inline]
    pub fn pairwise_factor_id(&self, var1: usize, var2: usize) -> FGBuilderResult<usize> {
        self.mrf.pairwise_factor_id(var1, var2)
    }

    #[inline]
    pub fn pairwise_value(&self, factor_id: usize, i1: usize, i2: usize) -> FGBuilderResult<f64> {
        self.mrf.pairwise_value(factor_id, i1, i2)
    }

    #[inline]
    pub fn number_of_pairwise_factors(&self) -> usize {
        self.mrf.number_of_pairwise_factors()
    }

    /// Adds a triplet factor linked to its three pairwise factors
    ///
    /// # Arguments
    ///
    /// * `var1`, `var2`, `var3` - Variables, `var1 < var2 < var3`
    /// * `cost` - A cost vector flattened as `a + b * d1 + c * d1 * d2`
    ///
    /// # Notes
    ///
    /// Pairwise factors `(var1, var2)`, `(var1, var3)` and `(var2, var3)` must be present.
    /// The scheduler receives relations `p12 -> triplet`, `p13 -> triplet` and
    /// `triplet -> p23`. Returns the triplet factor's ID
    pub fn add_triplet_factor(
        &mut self,
        var1: usize,
        var2: usize,
        var3: usize,
        cost: &[f64],
    ) -> FGBuilderResult<usize> {
        let key = self.triplet_key(var1, var2, var3)?;
        if self.triplet_map.contains_key(&key) {
            return Err(FGBuilderError::TripletFactorPresent(var1, var2, var3));
        }
        let pairs = [
            (TripletPair::P12, self.mrf.pairwise_factor_id(var1, var2)?),
            (TripletPair::P13, self.mrf.pairwise_factor_id(var1, var3)?),
            (TripletPair::P23, self.mrf.pairwise_factor_id(var2, var3)?),
        ];
        let dims = [
            self.mrf.number_of_labels(var1)?,
            self.mrf.number_of_labels(var2)?,
            self.mrf.number_of_labels(var3)?,
        ];
        let expected = dims.iter().product::<usize>();
        if cost.len() != expected {
            return Err(FGBuilderError::DimensionMismatch {
                expected,
                actual: cost.len(),
            });
        }

        let factor = self.mrf.hooks.construct_triplet_factor(cost, dims);
        let id = self.mrf.lp.add_factor();
        let mut messages = [0usize; 3];
        for (slot, (position, pairwise_id)) in messages.iter_mut().zip(pairs) {
            let pairwise = &self.mrf.pairwise_factors[pairwise_id];
            let message = self.mrf.hooks.construct_pairwise_triplet_message(
                position,
                &pairwise.factor,
                &factor,
                dims,
            );
            let pairwise_factor_id = pairwise.id;
            let message_id = self.mrf.lp.add_message(pairwise_factor_id, id);
            self.triplet_messages.push(MessageEntry {
                id: message_id,
                left: pairwise_factor_id,
                right: id,
                message,
            });
            *slot = self.triplet_messages.len() - 1;
        }
        let [(_, p12), (_, p13), (_, p23)] = pairs;
        let (p12, p13, p23) = (
            self.mrf.pairwise_factors[p12].id,
            self.mrf.pairwise_factors[p13].id,
            self.mrf.pairwise_factors[p23].id,
        );
        self.mrf.lp.add_factor_relation(p12, id);
        self.mrf.lp.add_factor_relation(p13, id);
        self.mrf.lp.add_factor_relation(id, p23);

        self.triplet_factors.push(TripletEntry {
            id,
            variables: (var1, var2, var3),
            factor,
            messages,
        });
        let triplet_id = self.triplet_factors.len() - 1;
        self.triplet_map.insert(key, triplet_id);
        tracing::debug!(var1, var2, var3, triplet_id, "add triplet factor");
        Ok(triplet_id)
    }

    /// Adds a zero cost triplet factor unless one is already present,
    /// missing pairwise factors are added with zero cost first
    ///
    /// # Notes
    ///
    /// Returns `true` if a new triplet factor has been created
    ///
    /// # Example
    ///
    /// ```
    /// use lpmrf::config::TighteningParameters;
    /// use lpmrf::core::Lp;
    /// use lpmrf::mrf::new_tightening_builder;
    ///
    /// let mut mrf = new_tightening_builder(Lp::new(), TighteningParameters::default());
    /// for var in 0..3 {
    ///     mrf.add_unary_factor(var, &[0., 0.]).unwrap();
    /// }
    /// assert!(mrf.add_tightening_triplet(0, 1, 2).unwrap());
    /// assert!(!mrf.add_tightening_triplet(0, 1, 2).unwrap());
    /// assert_eq!(mrf.number_of_triplet_factors(), 1);
    /// assert_eq!(mrf.number_of_pairwise_factors(), 3);
    /// ```
    pub fn add_tightening_triplet(
        &mut self,
        var1: usize,
        var2: usize,
        var3: usize,
    ) -> FGBuilderResult<bool> {
        let key = self.triplet_key(var1, var2, var3)?;
        if self.triplet_map.contains_key(&key) {
            return Ok(false);
        }
        for (v1, v2) in [(var1, var2), (var1, var3), (var2, var3)] {
            if !self.mrf.has_pairwise_factor(v1, v2) {
                self.mrf.add_empty_pairwise_factor(v1, v2)?;
            }
        }
        let dim = self.mrf.number_of_labels(var1)?
            * self.mrf.number_of_labels(var2)?
            * self.mrf.number_of_labels(var3)?;
        self.add_triplet_factor(var1, var2, var3, &vec![0f64; dim])?;
        Ok(true)
    }

    /// Adds at most `budget` triplet factors proposed by a cycle search
    ///
    /// # Arguments
    ///
    /// * `search` - A cycle search
    /// * `budget` - Maximal number of triplets to add, must be positive
    ///
    /// # Notes
    ///
    /// Searches run one after another while the budget is not met: the triangle search,
    /// the k-projection cycle search and the full projection cycle search.
    /// Returns the number of added triplets
    #[inline]
    pub fn tighten<C>(&mut self, search: &mut C, budget: usize) -> FGBuilderResult<usize>
    where
        C: CycleSearch + ?Sized,
    {
        Ok(self.tighten_with_info(search, budget)?.total())
    }

    /// Same as `tighten` but reports how many triplets each search has added
    pub fn tighten_with_info<C>(
        &mut self,
        search: &mut C,
        budget: usize,
    ) -> FGBuilderResult<TighteningInfo>
    where
        C: CycleSearch + ?Sized,
    {
        if budget == 0 {
            return Err(FGBuilderError::ZeroBudget);
        }
        let mut info = TighteningInfo::default();
        let tolerance = self.parameters.tolerance;
        let mut seen: FxHashSet<TripletKey> = self.triplet_map.keys().copied().collect();

        info.triplet_search = self.run_search_pass(|snapshot, add| {
            search.tighten_triplet(snapshot, add, budget, tolerance, &mut seen)
        })?;
        if info.total() < budget {
            let remaining = budget - info.total();
            info.k_projection = self.run_search_pass(|snapshot, add| {
                search.tighten_cycle(snapshot, add, remaining, tolerance, ProjectionDepth::K)
            })?;
        }
        if info.total() < budget {
            let remaining = budget - info.total();
            info.full_projection = self.run_search_pass(|snapshot, add| {
                search.tighten_cycle(snapshot, add, remaining, tolerance, ProjectionDepth::Full)
            })?;
        }
        tracing::info!(
            budget,
            triplet_search = info.triplet_search,
            k_projection = info.k_projection,
            full_projection = info.full_projection,
            "tightening round finished"
        );
        Ok(info)
    }

    /// Copies costs of the model for a cycle search
    #[inline]
    pub fn snapshot(&self) -> FGBuilderResult<CostSnapshot> {
        CostSnapshot::from_builder(&self.mrf)
    }

    #[inline]
    pub fn number_of_triplet_factors(&self) -> usize {
        self.triplet_factors.len()
    }

    /// Returns whether a triplet factor for a strictly ordered triple is present
    #[inline]
    pub fn has_triplet_factor(&self, var1: usize, var2: usize, var3: usize) -> bool {
        TripletKey::new(var1, var2, var3).is_some_and(|key| self.triplet_map.contains_key(&key))
    }

    #[inline]
    pub fn triplet_factor(&self, factor_id: usize) -> Option<&TripletEntry<H::Triplet>> {
        self.triplet_factors.get(factor_id)
    }

    #[inline]
    pub fn triplet_variables(&self, factor_id: usize) -> FGBuilderResult<(usize, usize, usize)> {
        self.triplet_factors
            .get(factor_id)
            .map(|t| t.variables)
            .ok_or(FGBuilderError::OutOfRangeFactor(
                self.triplet_factors.len(),
                factor_id,
            ))
    }

    #[inline]
    pub fn triplet_messages(&self) -> &[MessageEntry<H::PairwiseTripletMessage>] {
        &self.triplet_messages
    }

    #[inline]
    pub fn scheduler(&self) -> &S {
        self.mrf.scheduler()
    }
}

// private methods --------------------------------------------------------------------------

impl<H, S> TighteningMrfBuilder<H, S>
where
    H: TripletHooks,
    S: Scheduler,
{
    fn triplet_key(&self, var1: usize, var2: usize, var3: usize) -> FGBuilderResult<TripletKey> {
        if var1 >= var2 || var2 >= var3 {
            return Err(FGBuilderError::UnorderedVariables(vec![var1, var2, var3]));
        }
        let number_of_variables = self.mrf.number_of_variables();
        if var3 >= number_of_variables {
            return Err(FGBuilderError::OutOfRangeVariable(number_of_variables, var3));
        }
        TripletKey::new(var1, var2, var3).ok_or(FGBuilderError::IndexOverflow(var3))
    }

    fn run_search_pass<F>(&mut self, pass: F) -> FGBuilderResult<usize>
    where
        F: FnOnce(&CostSnapshot, &mut AddTriplet<'_>) -> FGBuilderResult<usize>,
    {
        let snapshot = self.snapshot()?;
        let mut added = 0usize;
        let mut add = |var1: usize, var2: usize, var3: usize| -> FGBuilderResult<bool> {
            let created = self.add_tightening_triplet(var1, var2, var3)?;
            if created {
                added += 1;
            }
            Ok(created)
        };
        let accepted = pass(&snapshot, &mut add)?;
        tracing::debug!(accepted, added, "search pass finished");
        Ok(added)
    }
}
