mod equality_message;
mod factor;
mod factor_graph_builder;
mod keys;
mod message;
mod scheduler;
mod tightening;

/// Numerical tolerance of weight sums and consistency checks
pub const EPS: f64 = 1e-8;

pub use equality_message::{Chirality, EqualityError, EqualityMessage, EqualityResult, MessageMode};
pub use factor::Factor;
pub use factor_graph_builder::{
    FGBuilderError, FGBuilderResult, MessageEntry, MrfBuilder, MrfHooks, PairwiseEntry, UnaryEntry,
};
pub use keys::{PairKey, TripletKey};
pub use message::Message;
pub use scheduler::{FactorId, Lp, MessageId, Scheduler, SchedulerError, SchedulerResult};
pub use tightening::{
    AddTriplet, CostSnapshot, CycleSearch, PairwiseCost, ProjectionDepth, TighteningInfo,
    TighteningMrfBuilder, TripletEntry, TripletHooks, TripletPair,
};

#[cfg(test)]
pub(crate) use equality_message::smallest_values;
