use crate::core::{FactorId, Lp, MessageId, Scheduler, SchedulerError};

#[test]
fn handles_are_assigned_in_order() {
    let mut lp = Lp::new();
    assert_eq!(lp.add_factor(), FactorId(0));
    assert_eq!(lp.add_factor(), FactorId(1));
    assert_eq!(lp.number_of_factors(), 2);
    assert_eq!(lp.add_message(FactorId(0), FactorId(1)), MessageId(0));
    assert_eq!(lp.add_message(FactorId(1), FactorId(0)), MessageId(1));
    assert_eq!(lp.messages()[1], (FactorId(1), FactorId(0)));
}

#[test]
fn forward_order_prefers_registered_first() {
    let mut lp = Lp::new();
    let factors: Vec<_> = (0..5).map(|_| lp.add_factor()).collect();
    lp.add_factor_relation(factors[3], factors[0]);
    lp.add_factor_relation(factors[4], factors[1]);
    assert_eq!(
        lp.forward_order().unwrap(),
        vec![factors[2], factors[3], factors[0], factors[4], factors[1]]
    );
}

#[test]
fn forward_order_detects_cycles() {
    let mut lp = Lp::new();
    let a = lp.add_factor();
    let b = lp.add_factor();
    let c = lp.add_factor();
    lp.add_factor_relation(a, b);
    lp.add_factor_relation(b, a);
    lp.add_factor_relation(b, c);
    assert_eq!(
        lp.forward_order(),
        Err(SchedulerError::CyclicRelations {
            ordered: 0,
            total: 3
        })
    );
    lp.add_factor_relation(c, FactorId(9));
    assert_eq!(
        lp.forward_order(),
        Err(SchedulerError::UnknownFactor(FactorId(9)))
    );
}

#[test]
fn mutable_reference_is_a_scheduler() {
    fn register(mut lp: impl Scheduler) -> FactorId {
        lp.add_factor()
    }
    let mut lp = Lp::new();
    register(&mut lp);
    assert_eq!(register(&mut lp), FactorId(1));
    assert_eq!(lp.number_of_factors(), 2);
}
