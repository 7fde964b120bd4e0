use rand::Rng;
use rand_distr::{Distribution, Uniform};

use crate::config::TighteningParameters;
use crate::core::{Lp, TighteningMrfBuilder};
use crate::mrf::{new_tightening_builder, StandardMrfHooks};

/// Pairwise Potts cost: `0` on the diagonal and `strength` elsewhere
pub(super) fn potts_cost(labels: usize, strength: f64) -> Vec<f64> {
    (0..labels * labels)
        .map(|i| {
            if i % labels == i / labels {
                0f64
            } else {
                strength
            }
        })
        .collect()
}

/// Pairwise binary cost penalizing equal labels
pub(super) fn repulsive_binary_cost(strength: f64) -> Vec<f64> {
    vec![strength, 0f64, 0f64, strength]
}

pub(super) fn random_potential(rng: &mut impl Rng, size: usize) -> Vec<f64> {
    let distr = Uniform::new(0f64, 10f64);
    (0..size).map(|_| distr.sample(rng)).collect()
}

/// A model with zero unary costs and the given pairwise costs, edges are added in order
pub(super) fn zero_unary_model(
    labels: &[usize],
    edges: &[(usize, usize, Vec<f64>)],
) -> TighteningMrfBuilder<StandardMrfHooks, Lp> {
    let mut mrf = new_tightening_builder(Lp::new(), TighteningParameters::default());
    for (var, l) in labels.iter().enumerate() {
        mrf.add_unary_factor(var, &vec![0f64; *l]).unwrap();
    }
    for (v1, v2, cost) in edges {
        mrf.add_pairwise_factor(*v1, *v2, cost).unwrap();
    }
    mrf
}
