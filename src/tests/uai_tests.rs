use std::io::Write;

use crate::config::TighteningParameters;
use crate::core::{Factor, Lp};
use crate::mrf::{new_standard_builder, new_tightening_builder};
use crate::uai::{build_mrf, parse_uai, read_uai, MrfInput, UaiError};

const PAIR: &str = "MARKOV
2
3 3
1
2 0 1

9
0 1 2
3 4 5
6 7 8
";

#[test]
fn pairwise_table_is_transposed() {
    let input = parse_uai(PAIR).unwrap();
    assert_eq!(input.cardinalities, vec![3, 3]);
    let mut mrf = new_standard_builder(Lp::new());
    build_mrf(&mut mrf, &input).unwrap();

    assert_eq!(mrf.number_of_variables(), 2);
    assert_eq!(mrf.number_of_pairwise_factors(), 1);
    for var in 0..2 {
        assert_eq!(mrf.unary_factor(var).unwrap().cost(), &[0.; 3]);
    }
    let id = mrf.pairwise_factor_id(0, 1).unwrap();
    for i1 in 0..3 {
        for i2 in 0..3 {
            assert_eq!(
                mrf.pairwise_value(id, i1, i2).unwrap(),
                input.function_tables[0][i1 * 3 + i2]
            );
        }
    }
}

#[test]
fn unary_cliques_overwrite_zero_costs() {
    let text = "MARKOV 3 2 3 2 4
        1 1
        2 0 2
        1 0
        2 2 1
        3 0.5 -1 2e1
        4 0 1 1 0
        2 1.5 2.5
        6 1 2 3 4 5 6";
    let input = parse_uai(text).unwrap();
    let mut mrf = new_tightening_builder(Lp::new(), TighteningParameters::default());
    build_mrf(mrf.builder_mut(), &input).unwrap();

    assert_eq!(mrf.builder().unary_factor(0).unwrap().cost(), &[1.5, 2.5]);
    assert_eq!(mrf.builder().unary_factor(1).unwrap().cost(), &[0.5, -1., 20.]);
    assert_eq!(mrf.builder().unary_factor(2).unwrap().cost(), &[0., 0.]);
    assert_eq!(mrf.number_of_pairwise_factors(), 2);

    let p02 = mrf.pairwise_factor_id(0, 2).unwrap();
    assert_eq!(mrf.pairwise_value(p02, 0, 1).unwrap(), 1.);
    assert_eq!(mrf.pairwise_value(p02, 1, 1).unwrap(), 0.);

    // scope (2, 1) lists the larger variable first, its table needs no transposition
    let p12 = mrf.pairwise_factor_id(1, 2).unwrap();
    for l1 in 0..3 {
        for l2 in 0..2 {
            assert_eq!(
                mrf.pairwise_value(p12, l1, l2).unwrap(),
                input.function_tables[3][l2 * 3 + l1]
            );
        }
    }
}

#[test]
fn parse_errors() {
    assert!(matches!(
        parse_uai("BAYES 1 2 0"),
        Err(UaiError::BadHeader(header)) if header == "BAYES"
    ));
    assert!(matches!(
        parse_uai("MARKOV 2 2"),
        Err(UaiError::UnexpectedEnd("cardinality"))
    ));
    assert!(matches!(
        parse_uai("MARKOV 2 2 x"),
        Err(UaiError::BadNumber { what: "cardinality", .. })
    ));
    assert!(matches!(
        parse_uai("MARKOV 2 2 0"),
        Err(UaiError::ZeroCardinality(1))
    ));
    assert!(matches!(
        parse_uai("MARKOV 3 2 2 2 1 3 0 1 2"),
        Err(UaiError::UnsupportedArity { clique: 0, arity: 3 })
    ));
    assert!(matches!(
        parse_uai("MARKOV 2 2 2 1 2 0 2"),
        Err(UaiError::OutOfRangeVariable {
            clique: 0,
            variable: 2,
            variables: 2
        })
    ));
    assert!(matches!(
        parse_uai("MARKOV 2 2 2 1 2 1 1"),
        Err(UaiError::RepeatedVariable {
            clique: 0,
            variable: 1
        })
    ));
    assert!(matches!(
        parse_uai("MARKOV 2 2 2 1 2 0 1 3 0 0 0"),
        Err(UaiError::TableLengthMismatch {
            clique: 0,
            expected: 4,
            actual: 3
        })
    ));
    assert!(matches!(
        parse_uai("MARKOV 1 2 1 1 0 2 0 0 7"),
        Err(UaiError::TrailingInput(token)) if token == "7"
    ));
}

#[test]
fn build_mrf_rejects_inconsistent_input() {
    let input = MrfInput {
        variable_count: 2,
        cardinalities: vec![2, 2],
        clique_scopes: vec![vec![0, 1]],
        function_tables: vec![vec![0.; 3]],
    };
    let mut mrf = new_standard_builder(Lp::new());
    assert!(matches!(
        build_mrf(&mut mrf, &input),
        Err(UaiError::Builder(_))
    ));
}

#[test]
fn build_mrf_rejects_mismatched_counts() {
    let input = MrfInput {
        variable_count: 3,
        cardinalities: vec![2, 2],
        clique_scopes: vec![vec![0], vec![0, 1]],
        function_tables: vec![vec![1., 2.], vec![0.; 4]],
    };
    let mut mrf = new_standard_builder(Lp::new());
    assert!(matches!(
        build_mrf(&mut mrf, &input),
        Err(UaiError::InconsistentInput {
            what: "cardinalities",
            expected: 3,
            actual: 2
        })
    ));
    assert_eq!(mrf.number_of_variables(), 0);

    let input = MrfInput {
        variable_count: 2,
        cardinalities: vec![2, 2],
        clique_scopes: vec![vec![0], vec![0, 1]],
        function_tables: vec![vec![1., 2.]],
    };
    let mut mrf = new_standard_builder(Lp::new());
    assert!(matches!(
        build_mrf(&mut mrf, &input),
        Err(UaiError::InconsistentInput {
            what: "function_tables",
            expected: 2,
            actual: 1
        })
    ));
    assert_eq!(mrf.number_of_pairwise_factors(), 0);
}

#[test]
fn read_uai_from_file() {
    let path = std::env::temp_dir().join(format!("lpmrf_pair_{}.uai", std::process::id()));
    let mut file = std::fs::File::create(&path).unwrap();
    file.write_all(PAIR.as_bytes()).unwrap();
    drop(file);
    let input = read_uai(&path).unwrap();
    std::fs::remove_file(&path).unwrap();
    assert_eq!(input, parse_uai(PAIR).unwrap());
    assert!(matches!(read_uai(&path), Err(UaiError::Io(_))));
}
