use crate::core::{
    FGBuilderError, Factor, FactorId, Lp, Message, MrfBuilder, MrfHooks, Scheduler,
};
use crate::mrf::{new_standard_builder, PairwiseSide, UnaryPairwiseMessage};

// The simplest fake implementation of construction hooks.
// Messages only remember sizes of factors they were built from,
// it is nonsense for all the applications apart from validating the builder --------------

#[derive(Debug)]
struct FakeFactor(Vec<f64>);

#[derive(Debug)]
struct FakeMessage {
    unary_size: usize,
    pairwise_size: usize,
}

#[derive(Debug)]
struct FakeHooks;

impl Factor for FakeFactor {
    #[inline(always)]
    fn size(&self) -> usize {
        self.0.len()
    }

    #[inline(always)]
    fn cost(&self) -> &[f64] {
        &self.0
    }

    #[inline(always)]
    fn cost_mut(&mut self) -> &mut [f64] {
        &mut self.0
    }

    #[inline(always)]
    fn primal(&self) -> usize {
        unimplemented!()
    }

    #[inline(always)]
    fn set_primal(&mut self, _: usize) {
        unimplemented!()
    }
}

impl Message for FakeMessage {
    #[inline(always)]
    fn size(&self) -> usize {
        self.unary_size
    }

    #[inline(always)]
    fn repam_left(&self, _: &mut [f64], _: &[f64]) {
        unimplemented!()
    }

    #[inline(always)]
    fn repam_right(&self, _: &mut [f64], _: &[f64]) {
        unimplemented!()
    }
}

impl MrfHooks for FakeHooks {
    type Unary = FakeFactor;
    type Pairwise = FakeFactor;
    type LeftMessage = FakeMessage;
    type RightMessage = FakeMessage;

    fn construct_unary_factor(&self, cost: &[f64]) -> FakeFactor {
        FakeFactor(cost.to_vec())
    }

    fn construct_pairwise_factor(&self, cost: &[f64], left_dim: usize, right_dim: usize) -> FakeFactor {
        assert_eq!(cost.len(), left_dim * right_dim);
        FakeFactor(cost.to_vec())
    }

    fn construct_left_unary_pairwise_message(&self, left: &FakeFactor, pairwise: &FakeFactor) -> FakeMessage {
        FakeMessage {
            unary_size: left.size(),
            pairwise_size: pairwise.size(),
        }
    }

    fn construct_right_unary_pairwise_message(&self, right: &FakeFactor, pairwise: &FakeFactor) -> FakeMessage {
        FakeMessage {
            unary_size: right.size(),
            pairwise_size: pairwise.size(),
        }
    }
}

// ------------------------------------------------------------------------------------------

#[test]
fn small_factor_graph_builder_logic() {
    let mut mrf = MrfBuilder::new(FakeHooks, Lp::new());
    mrf.add_unary_factor(1, &[0., 0., 0.]).unwrap();
    assert_eq!(mrf.number_of_variables(), 2);
    assert!(mrf.unary_factor(0).is_none());
    mrf.add_unary_factor(0, &[0., 0.]).unwrap();
    mrf.add_unary_factor(2, &[0., 0., 0., 0.]).unwrap();

    let p01 = mrf.add_pairwise_factor(0, 1, &[0.; 6]).unwrap();
    let p12 = mrf.add_pairwise_factor(1, 2, &[1.; 12]).unwrap();
    assert_eq!((p01, p12), (0, 1));
    assert_eq!(mrf.number_of_pairwise_factors(), 2);
    assert_eq!(mrf.pairwise_variables(p12).unwrap(), (1, 2));
    assert_eq!(mrf.pairwise_factor_id(1, 2).unwrap(), p12);

    let left = &mrf.left_messages()[1];
    let right = &mrf.right_messages()[1];
    assert_eq!(left.message().unary_size, 3);
    assert_eq!(right.message().unary_size, 4);
    assert_eq!(left.message().pairwise_size, 12);
    assert_eq!(right.message().pairwise_size, 12);
    assert_eq!(left.left(), mrf.unary_factor_id(1).unwrap());
    assert_eq!(right.left(), mrf.unary_factor_id(2).unwrap());
    assert_eq!(left.right(), mrf.pairwise_factor(p12).unwrap().id());
    assert_eq!(mrf.pairwise_factor(p12).unwrap().messages(), (1, 1));
    assert_eq!(mrf.scheduler().number_of_messages(), 4);
}

#[test]
fn unary_factor_errors() {
    let mut mrf = new_standard_builder(Lp::new());
    mrf.add_unary_factor(0, &[1., 2.]).unwrap();
    assert_eq!(
        mrf.add_unary_factor(0, &[1., 2.]),
        Err(FGBuilderError::UnaryFactorPresent(0))
    );
    assert_eq!(
        mrf.add_unary_factor(1, &[]),
        Err(FGBuilderError::EmptyUnaryFactor(1))
    );
    assert_eq!(mrf.number_of_variables(), 1);
    assert_eq!(mrf.push_unary_factor(&[0.; 3]).unwrap(), 1);
    assert_eq!(mrf.number_of_labels(1).unwrap(), 3);
    assert_eq!(
        mrf.number_of_labels(5),
        Err(FGBuilderError::OutOfRangeVariable(2, 5))
    );
}

#[test]
fn register_unary_factor_keeps_slot_discipline() {
    let mut lp = Lp::new();
    let id = lp.add_factor();
    let mut mrf = MrfBuilder::new(FakeHooks, &mut lp);
    mrf.register_unary_factor(2, FakeFactor(vec![0.; 2]), id)
        .unwrap();
    assert_eq!(mrf.unary_factor_id(2), Some(id));
    assert_eq!(
        mrf.register_unary_factor(2, FakeFactor(vec![0.; 2]), FactorId(7)),
        Err(FGBuilderError::UnaryFactorPresent(2))
    );
    assert_eq!(
        mrf.number_of_labels(1),
        Err(FGBuilderError::MissingUnaryFactor(1))
    );
}

#[test]
fn pairwise_factor_errors() {
    let mut mrf = new_standard_builder(Lp::new());
    mrf.add_unary_factor(0, &[0., 0.]).unwrap();
    mrf.add_unary_factor(2, &[0., 0., 0.]).unwrap();

    assert_eq!(
        mrf.add_pairwise_factor(2, 0, &[0.; 6]),
        Err(FGBuilderError::UnorderedVariables(vec![2, 0]))
    );
    assert_eq!(
        mrf.add_pairwise_factor(0, 1, &[0.; 6]),
        Err(FGBuilderError::MissingUnaryFactor(1))
    );
    assert_eq!(
        mrf.add_pairwise_factor(0, 2, &[0.; 5]),
        Err(FGBuilderError::DimensionMismatch {
            expected: 6,
            actual: 5
        })
    );
    mrf.add_pairwise_factor(0, 2, &[0.; 6]).unwrap();
    assert!(mrf.has_pairwise_factor(0, 2));
    assert!(!mrf.has_pairwise_factor(2, 0));
    assert_eq!(
        mrf.add_pairwise_factor(0, 2, &[0.; 6]),
        Err(FGBuilderError::PairwiseFactorPresent(0, 2))
    );
    assert_eq!(
        mrf.pairwise_factor_id(0, 1),
        Err(FGBuilderError::MissingPairwiseFactor(0, 1))
    );
    assert_eq!(mrf.number_of_pairwise_factors(), 1);
}

#[test]
fn pairwise_value_uses_first_variable_fastest_layout() {
    let mut mrf = new_standard_builder(Lp::new());
    mrf.add_unary_factor(0, &[0., 0.]).unwrap();
    mrf.add_unary_factor(1, &[0., 0., 0.]).unwrap();
    let cost: Vec<f64> = (0..6).map(|x| x as f64).collect();
    let id = mrf.add_pairwise_factor(0, 1, &cost).unwrap();
    for i1 in 0..2 {
        for i2 in 0..3 {
            assert_eq!(mrf.pairwise_value(id, i1, i2).unwrap(), (i1 + 2 * i2) as f64);
        }
    }
    assert_eq!(
        mrf.pairwise_value(id, 2, 0),
        Err(FGBuilderError::OutOfRangeLabel { label: 2, labels: 2 })
    );
    assert_eq!(
        mrf.pairwise_value(3, 0, 0),
        Err(FGBuilderError::OutOfRangeFactor(1, 3))
    );
}

#[test]
fn ordering_relations() {
    let mut mrf = new_standard_builder(Lp::new());
    let u0 = mrf.add_unary_factor(0, &[0., 0.]).unwrap();
    let u1 = mrf.add_unary_factor(1, &[0., 0.]).unwrap();
    let u2 = mrf.add_unary_factor(2, &[0., 0.]).unwrap();
    let p = mrf.add_pairwise_factor(0, 2, &[0.; 4]).unwrap();
    let p = mrf.pairwise_factor(p).unwrap().id();
    assert!(mrf.scheduler().has_relation(u0, p));
    assert!(mrf.scheduler().has_relation(p, u2));
    assert!(!mrf.scheduler().has_relation(u0, u1));

    mrf.construct().unwrap();
    assert_eq!(mrf.unary_factor_index_begin(), Some(4));
    assert!(mrf.scheduler().has_relation(u0, u1));
    assert!(mrf.scheduler().has_relation(u1, u2));
    assert_eq!(
        mrf.scheduler().forward_order().unwrap(),
        vec![u0, u1, p, u2]
    );
}

#[test]
fn construct_fails_on_missing_unary_factor() {
    let mut mrf = new_standard_builder(Lp::new());
    mrf.add_unary_factor(0, &[0., 0.]).unwrap();
    mrf.add_unary_factor(2, &[0., 0.]).unwrap();
    assert_eq!(mrf.construct(), Err(FGBuilderError::MissingUnaryFactor(1)));
}

#[test]
fn unary_pairwise_messages_of_standard_model() {
    let mut mrf = new_standard_builder(Lp::new());
    mrf.add_unary_factor(0, &[0., 0.]).unwrap();
    mrf.add_unary_factor(1, &[0., 0., 0.]).unwrap();
    mrf.add_pairwise_factor(0, 1, &[0.; 6]).unwrap();
    assert_eq!(
        *mrf.left_messages()[0].message(),
        UnaryPairwiseMessage::new(PairwiseSide::Left, 2, 3)
    );
    assert_eq!(
        *mrf.right_messages()[0].message(),
        UnaryPairwiseMessage::new(PairwiseSide::Right, 2, 3)
    );
    assert_eq!(mrf.left_messages()[0].message().size(), 2);
    assert_eq!(mrf.right_messages()[0].message().size(), 3);

    let message = UnaryPairwiseMessage::new(PairwiseSide::Right, 2, 3);
    let mut pairwise = [0.; 6];
    message.repam_right(&mut pairwise, &[1., 2., 3.]);
    assert_eq!(pairwise, [1., 1., 2., 2., 3., 3.]);
    let mut unary = [1., 1., 1.];
    message.repam_left(&mut unary, &[-1., 0., 1.]);
    assert_eq!(unary, [0., 1., 2.]);
}
