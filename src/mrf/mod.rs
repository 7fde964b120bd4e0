mod cycle_inequalities;
mod simplex;

pub use cycle_inequalities::CycleInequalities;
pub use simplex::{
    new_standard_builder, new_tightening_builder, PairwiseSide, PairwiseTripletMessage,
    SimplexFactor, StandardMrfHooks, UnaryPairwiseMessage,
};
