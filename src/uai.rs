use std::{fs, path::Path, str::SplitAsciiWhitespace};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::core::{FGBuilderError, Factor, MrfBuilder, MrfHooks, Scheduler};

// ------------------------------------------------------------------------------------------

#[derive(Debug, Error)]
/// Errors that could appear while reading a UAI model
pub enum UaiError {
    #[error("Unable to read a model file: {0}")]
    Io(#[from] std::io::Error),

    /// The first token is not `MARKOV`
    #[error("Expected `MARKOV` header, found `{0}`")]
    BadHeader(String),

    /// Input ends before a section is complete
    #[error("Unexpected end of input while reading {0}")]
    UnexpectedEnd(&'static str),

    /// A token is not a number of the expected kind
    #[error("Unable to parse `{token}` as {what}")]
    BadNumber { token: String, what: &'static str },

    /// A variable has no labels
    #[error("Variable {0} has zero cardinality")]
    ZeroCardinality(usize),

    /// Only unary and pairwise cliques are supported
    #[error("Clique {clique} has arity {arity}, only 1 and 2 are supported")]
    UnsupportedArity { clique: usize, arity: usize },

    /// A clique references an unknown variable
    #[error("Clique {clique} references variable {variable} out of range of [0..{variables}]")]
    OutOfRangeVariable {
        clique: usize,
        variable: usize,
        variables: usize,
    },

    /// A pairwise clique references the same variable twice
    #[error("Clique {clique} references variable {variable} twice")]
    RepeatedVariable { clique: usize, variable: usize },

    /// A function table does not match its clique's cardinalities
    #[error("Function table of clique {clique} has {actual} entries while {expected} are required")]
    TableLengthMismatch {
        clique: usize,
        expected: usize,
        actual: usize,
    },

    /// Counts of a model do not agree with each other
    #[error("Inconsistent model: {what} has {actual} entries while {expected} are declared")]
    InconsistentInput {
        what: &'static str,
        expected: usize,
        actual: usize,
    },

    /// Tokens are left after the last function table
    #[error("Unexpected trailing token `{0}`")]
    TrailingInput(String),

    #[error(transparent)]
    Builder(#[from] FGBuilderError),
}

/// UAI reader's methods result type
pub type UaiResult<T> = Result<T, UaiError>;

// ------------------------------------------------------------------------------------------

/// A model as it is stored in a UAI file
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MrfInput {
    pub variable_count: usize,

    /// Number of labels of each variable
    pub cardinalities: Vec<usize>,

    /// Variables of each clique, one or two per clique
    pub clique_scopes: Vec<Vec<usize>>,

    /// Cost tables aligned with `clique_scopes`, the last variable of a scope changes fastest
    pub function_tables: Vec<Vec<f64>>,
}

struct Tokens<'a>(SplitAsciiWhitespace<'a>);

impl<'a> Tokens<'a> {
    #[inline]
    fn next_token(&mut self, what: &'static str) -> UaiResult<&'a str> {
        self.0.next().ok_or(UaiError::UnexpectedEnd(what))
    }

    #[inline]
    fn next_usize(&mut self, what: &'static str) -> UaiResult<usize> {
        let token = self.next_token(what)?;
        token.parse().map_err(|_| UaiError::BadNumber {
            token: token.to_owned(),
            what,
        })
    }

    #[inline]
    fn next_f64(&mut self, what: &'static str) -> UaiResult<f64> {
        let token = self.next_token(what)?;
        token.parse().map_err(|_| UaiError::BadNumber {
            token: token.to_owned(),
            what,
        })
    }
}

/// Parses a model in the UAI `MARKOV` text format
///
/// # Arguments
///
/// * `text` - Whitespace separated tokens: the header, the number of variables,
///   cardinalities, the number of cliques, clique scopes and function tables
///
/// # Example
///
/// ```
/// use lpmrf::uai::parse_uai;
///
/// let input = parse_uai("MARKOV\n2\n2 2\n1\n2 0 1\n4\n0 1 1 0\n").unwrap();
/// assert_eq!(input.variable_count, 2);
/// assert_eq!(input.clique_scopes, vec![vec![0, 1]]);
/// ```
pub fn parse_uai(text: &str) -> UaiResult<MrfInput> {
    let mut tokens = Tokens(text.split_ascii_whitespace());
    let header = tokens.next_token("header")?;
    if header != "MARKOV" {
        return Err(UaiError::BadHeader(header.to_owned()));
    }

    let variable_count = tokens.next_usize("number of variables")?;
    let mut cardinalities = Vec::with_capacity(variable_count);
    for var in 0..variable_count {
        let cardinality = tokens.next_usize("cardinality")?;
        if cardinality == 0 {
            return Err(UaiError::ZeroCardinality(var));
        }
        cardinalities.push(cardinality);
    }

    let clique_count = tokens.next_usize("number of cliques")?;
    let mut clique_scopes = Vec::with_capacity(clique_count);
    for clique in 0..clique_count {
        let arity = tokens.next_usize("clique arity")?;
        if arity == 0 || arity > 2 {
            return Err(UaiError::UnsupportedArity { clique, arity });
        }
        let mut scope = Vec::with_capacity(arity);
        for _ in 0..arity {
            let variable = tokens.next_usize("clique variable")?;
            if variable >= variable_count {
                return Err(UaiError::OutOfRangeVariable {
                    clique,
                    variable,
                    variables: variable_count,
                });
            }
            if scope.contains(&variable) {
                return Err(UaiError::RepeatedVariable { clique, variable });
            }
            scope.push(variable);
        }
        clique_scopes.push(scope);
    }

    let mut function_tables = Vec::with_capacity(clique_count);
    for (clique, scope) in clique_scopes.iter().enumerate() {
        let expected = scope.iter().map(|v| cardinalities[*v]).product::<usize>();
        let actual = tokens.next_usize("function table length")?;
        if actual != expected {
            return Err(UaiError::TableLengthMismatch {
                clique,
                expected,
                actual,
            });
        }
        let table = (0..actual)
            .map(|_| tokens.next_f64("function table entry"))
            .collect::<UaiResult<Vec<_>>>()?;
        function_tables.push(table);
    }
    if let Some(token) = tokens.0.next() {
        return Err(UaiError::TrailingInput(token.to_owned()));
    }

    tracing::info!(variable_count, clique_count, "parsed UAI model");
    Ok(MrfInput {
        variable_count,
        cardinalities,
        clique_scopes,
        function_tables,
    })
}

/// Reads a model from a UAI file
#[inline]
pub fn read_uai(path: impl AsRef<Path>) -> UaiResult<MrfInput> {
    let text = fs::read_to_string(path)?;
    parse_uai(&text)
}

/// Fills an empty builder with a parsed model
///
/// # Arguments
///
/// * `mrf` - A builder without factors
/// * `input` - A parsed model
///
/// # Notes
///
/// Fails if `input` declares more or fewer variables or tables than it holds.
/// All unary factors are added with zero cost first, then unary cliques overwrite
/// their costs, then pairwise cliques are added. Tables of pairwise cliques are
/// transposed into the builder's layout where the first variable changes fastest
pub fn build_mrf<H, S>(mrf: &mut MrfBuilder<H, S>, input: &MrfInput) -> UaiResult<()>
where
    H: MrfHooks,
    S: Scheduler,
{
    if input.cardinalities.len() != input.variable_count {
        return Err(UaiError::InconsistentInput {
            what: "cardinalities",
            expected: input.variable_count,
            actual: input.cardinalities.len(),
        });
    }
    if input.function_tables.len() != input.clique_scopes.len() {
        return Err(UaiError::InconsistentInput {
            what: "function_tables",
            expected: input.clique_scopes.len(),
            actual: input.function_tables.len(),
        });
    }
    for (var, cardinality) in input.cardinalities.iter().enumerate() {
        mrf.add_unary_factor(var, &vec![0f64; *cardinality])?;
    }

    for (scope, table) in input.clique_scopes.iter().zip(&input.function_tables) {
        if let [var] = scope.as_slice() {
            let factor = mrf
                .unary_factor_mut(*var)
                .ok_or(FGBuilderError::MissingUnaryFactor(*var))?;
            if factor.size() != table.len() {
                return Err(FGBuilderError::DimensionMismatch {
                    expected: factor.size(),
                    actual: table.len(),
                }
                .into());
            }
            factor.cost_mut().copy_from_slice(table);
        }
    }

    for (scope, table) in input.clique_scopes.iter().zip(&input.function_tables) {
        if let [var1, var2] = scope.as_slice() {
            let (var1, var2) = (*var1, *var2);
            if var1 < var2 {
                let dim1 = mrf.number_of_labels(var1)?;
                let dim2 = mrf.number_of_labels(var2)?;
                if table.len() != dim1 * dim2 {
                    return Err(FGBuilderError::DimensionMismatch {
                        expected: dim1 * dim2,
                        actual: table.len(),
                    }
                    .into());
                }
                let mut cost = vec![0f64; dim1 * dim2];
                for l1 in 0..dim1 {
                    for l2 in 0..dim2 {
                        cost[l1 + l2 * dim1] = table[l1 * dim2 + l2];
                    }
                }
                mrf.add_pairwise_factor(var1, var2, &cost)?;
            } else {
                mrf.add_pairwise_factor(var2, var1, table)?;
            }
        }
    }
    tracing::info!(
        variables = mrf.number_of_variables(),
        pairwise_factors = mrf.number_of_pairwise_factors(),
        "built model from UAI input"
    );
    Ok(())
}
