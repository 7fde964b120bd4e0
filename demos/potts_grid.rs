use clap::Parser;
use lpmrf::config::MrfConfig;
use lpmrf::core::{Factor, Lp, Scheduler, TighteningMrfBuilder};
use lpmrf::mrf::{new_tightening_builder, CycleInequalities, StandardMrfHooks};
use lpmrf::uai::{build_mrf, read_uai};
use rand::thread_rng;
use rand_distr::{Distribution, Normal, Uniform};
use std::path::PathBuf;

/// Builds a random Potts grid (or reads a UAI model) and tightens it with triplet factors
#[derive(Debug, Parser)]
struct Args {
    /// Side of a square grid
    #[arg(long, default_value_t = 8)]
    side: usize,

    /// Number of labels per variable
    #[arg(long, default_value_t = 3)]
    labels: usize,

    /// Std of Potts couplings, negative couplings make edges repulsive
    #[arg(long, default_value_t = 1.0)]
    coupling_std: f64,

    /// Number of triplets to add
    #[arg(long, default_value_t = 10)]
    budget: usize,

    /// A UAI model used instead of a random grid
    #[arg(long)]
    uai: Option<PathBuf>,

    /// A YAML configuration of tightening
    #[arg(long)]
    config: Option<PathBuf>,
}

fn main() {
    let args = Args::parse();
    let config = match &args.config {
        Some(path) => MrfConfig::from_yaml_file(path).unwrap(),
        None => MrfConfig::default(),
    };
    let budget = config.tightening_budget.unwrap_or(args.budget);
    let mut mrf = new_tightening_builder(Lp::new(), config.tightening);

    match &args.uai {
        Some(path) => {
            let input = read_uai(path).unwrap();
            build_mrf(mrf.builder_mut(), &input).unwrap();
        }
        None => {
            // parameters ----------------------------------------------------------------------
            let mut rng = thread_rng();
            let unary_distr = Uniform::new(0f64, 1f64);
            let coupling_distr = Normal::new(0f64, args.coupling_std).unwrap();
            // ---------------------------------------------------------------------------------
            let index = |row: usize, col: usize| row * args.side + col;
            for var in 0..args.side * args.side {
                let cost: Vec<f64> = (0..args.labels)
                    .map(|_| unary_distr.sample(&mut rng))
                    .collect();
                mrf.add_unary_factor(var, &cost).unwrap();
            }
            for row in 0..args.side {
                for col in 0..args.side {
                    let neighbours = [(row + 1, col), (row, col + 1)];
                    for (r, c) in neighbours {
                        if r >= args.side || c >= args.side {
                            continue;
                        }
                        let coupling = coupling_distr.sample(&mut rng);
                        let cost: Vec<f64> = (0..args.labels * args.labels)
                            .map(|i| {
                                let equal = i % args.labels == i / args.labels;
                                match (equal, coupling >= 0f64) {
                                    (false, true) => coupling,
                                    (true, false) => -coupling,
                                    _ => 0f64,
                                }
                            })
                            .collect();
                        mrf.add_pairwise_factor(index(row, col), index(r, c), &cost)
                            .unwrap();
                    }
                }
            }
        }
    }
    mrf.construct().unwrap();

    let lower_bound = |mrf: &TighteningMrfBuilder<StandardMrfHooks, Lp>| -> f64 {
        let builder = mrf.builder();
        (0..builder.number_of_variables())
            .filter_map(|var| builder.unary_factor(var))
            .map(|f| f.lower_bound())
            .chain(builder.pairwise_factors().iter().map(|p| p.factor().lower_bound()))
            .sum()
    };
    println!(
        "Model with {} variables and {} pairwise factors, lower bound {:.4}",
        mrf.number_of_variables(),
        mrf.number_of_pairwise_factors(),
        lower_bound(&mrf),
    );

    let mut search = CycleInequalities::new(*mrf.parameters());
    let info = mrf.tighten_with_info(&mut search, budget).unwrap();
    println!("{}", info);
    println!(
        "Model has {} triplet factors, scheduler holds {} factors and {} messages",
        mrf.number_of_triplet_factors(),
        mrf.scheduler().number_of_factors(),
        mrf.scheduler().number_of_messages(),
    );
}
