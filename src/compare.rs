//! Structural and content equivalence of two tables.
//!
//! [`compare`] scores two tables as they are. [`align`] first projects both
//! onto their common columns and coerces the candidate's column types to the
//! reference's, and [`compare_aligned`] combines the two.

use serde::Serialize;
use std::collections::HashSet;
use tracing::debug;

use crate::error::CoercionWarning;
use crate::table::{Column, DataType, Table};
use crate::value_conversion::coerce_value;

/// Similarity of two tables along columns, rows and cells.
/// Percentages are in `[0, 100]`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ComparisonResult {
    pub columns_match: bool,
    pub column_similarity_percentage: f64,
    pub rows_match: bool,
    pub row_similarity_percentage: f64,
    pub data_match: bool,
    pub data_similarity_percentage: f64,
}

/// What to do when a candidate column cannot take the reference type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CoercionPolicy {
    /// Fail the alignment on the first column that cannot be coerced
    Strict,
    /// Keep the column as it was; the comparison scores lower instead
    #[default]
    Lenient,
}

/// Compares `candidate` against `reference`.
///
/// Rows are paired by position, so both tables must already be sorted the
/// same way for the data metrics to mean anything.
pub fn compare(reference: &Table, candidate: &Table) -> ComparisonResult {
    let (columns_match, column_similarity_percentage) = compare_columns(reference, candidate);
    let (rows_match, row_similarity_percentage) = compare_rows(reference, candidate);
    let (data_match, data_similarity_percentage) = compare_data(reference, candidate);

    ComparisonResult {
        columns_match,
        column_similarity_percentage,
        rows_match,
        row_similarity_percentage,
        data_match,
        data_similarity_percentage,
    }
}

fn compare_columns(reference: &Table, candidate: &Table) -> (bool, f64) {
    let reference_names = reference.column_names();
    let candidate_names = candidate.column_names();
    let columns_match = reference_names == candidate_names;

    if reference_names.is_empty() {
        let percentage = if candidate_names.is_empty() { 100.0 } else { 0.0 };
        return (columns_match, percentage);
    }

    let candidate_set: HashSet<&str> = candidate_names.into_iter().collect();
    let common = reference_names
        .iter()
        .filter(|name| candidate_set.contains(*name))
        .count();
    (
        columns_match,
        100.0 * common as f64 / reference_names.len() as f64,
    )
}

fn compare_rows(reference: &Table, candidate: &Table) -> (bool, f64) {
    let (a, b) = (reference.num_rows(), candidate.num_rows());
    let percentage = if a == 0 && b == 0 {
        100.0
    } else {
        100.0 * a.min(b) as f64 / a.max(b) as f64
    };
    (a == b, percentage)
}

fn compare_data(reference: &Table, candidate: &Table) -> (bool, f64) {
    let paired: Vec<(&Column, Option<&Column>)> = reference
        .columns()
        .iter()
        .map(|column| (column, candidate.column(column.name())))
        .collect();

    let total_rows = reference.num_rows();
    let matching_rows = (0..total_rows)
        .filter(|&row| {
            paired.iter().all(|(column, other)| match other {
                Some(other) => other
                    .values()
                    .get(row)
                    .is_some_and(|value| column.values()[row].same_as(value)),
                None => false,
            })
        })
        .count();

    let data_match = reference.fields() == candidate.fields()
        && total_rows == candidate.num_rows()
        && matching_rows == total_rows;
    let percentage = if total_rows == 0 {
        100.0
    } else {
        100.0 * matching_rows as f64 / total_rows as f64
    };
    (data_match, percentage)
}

/// Two tables projected onto their common columns
#[derive(Debug, Clone)]
pub struct Alignment {
    pub reference: Table,
    pub candidate: Table,
    /// Columns left with their original type (lenient policy only)
    pub warnings: Vec<CoercionWarning>,
}

/// Projects both tables onto the columns they share, in the reference's
/// order, and coerces each candidate column whose declared type differs to
/// the reference's type.
pub fn align(
    reference: Table,
    candidate: Table,
    policy: CoercionPolicy,
) -> Result<Alignment, CoercionWarning> {
    let common: Vec<&str> = reference
        .column_names()
        .into_iter()
        .filter(|name| candidate.contains(name))
        .collect();

    // Names come from both tables, so the projections cannot fail
    let mut aligned_reference = Table::default();
    let mut aligned_candidate = Table::default();
    let mut warnings = Vec::new();

    for name in common {
        let (Some(target), Some(column)) = (reference.column(name), candidate.column(name)) else {
            continue;
        };
        let column = if column.data_type() == target.data_type() {
            column.clone()
        } else {
            match coerce_column(column, target.data_type()) {
                Ok(coerced) => coerced,
                Err(warning) if policy == CoercionPolicy::Lenient => {
                    debug!(%warning, "keeping column with its original type");
                    warnings.push(warning);
                    column.clone()
                }
                Err(warning) => return Err(warning),
            }
        };
        push_aligned(&mut aligned_reference, target.clone());
        push_aligned(&mut aligned_candidate, column);
    }

    Ok(Alignment {
        reference: aligned_reference,
        candidate: aligned_candidate,
        warnings,
    })
}

fn push_aligned(table: &mut Table, column: Column) {
    // Columns of one source table share a length and have unique names
    if let Err(err) = table.push_column(column) {
        debug!(%err, "skipping column during alignment");
    }
}

/// Converts every value of `column` to `target`. All or nothing: the first
/// value without a representation in `target` fails the column.
pub fn coerce_column(column: &Column, target: DataType) -> Result<Column, CoercionWarning> {
    let values = column
        .values()
        .iter()
        .map(|value| {
            coerce_value(value, target).ok_or_else(|| CoercionWarning {
                column: column.name().to_string(),
                from: column.data_type(),
                to: target,
                value: value.to_string(),
            })
        })
        .collect::<Result<Vec<_>, _>>()?;
    Ok(Column::with_type(column.name(), target, values))
}

/// Scores `candidate` against `reference` the way a conversion check needs
/// it: column and row metrics from the tables as given, data metrics after
/// [`align`].
pub fn compare_aligned(
    reference: Table,
    candidate: Table,
    policy: CoercionPolicy,
) -> Result<(ComparisonResult, Vec<CoercionWarning>), CoercionWarning> {
    let (columns_match, column_similarity_percentage) = compare_columns(&reference, &candidate);
    let (rows_match, row_similarity_percentage) = compare_rows(&reference, &candidate);

    let alignment = align(reference, candidate, policy)?;
    let (data_match, data_similarity_percentage) =
        compare_data(&alignment.reference, &alignment.candidate);

    Ok((
        ComparisonResult {
            columns_match,
            column_similarity_percentage,
            rows_match,
            row_similarity_percentage,
            data_match,
            data_similarity_percentage,
        },
        alignment.warnings,
    ))
}
