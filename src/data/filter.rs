use crate::error::CutResult;

use super::cut::{CutSet, Predicate};
use super::model::{Dataset, Mask};

// ---------------------------------------------------------------------------
// Mask construction: conjunction of per-column predicates
// ---------------------------------------------------------------------------

/// AND together `predicate(dataset[column])` for every `(column, predicate)`.
///
/// Starts from an all-true mask, so an empty iterator keeps every row. The
/// result does not depend on iteration order. A column missing from the
/// dataset aborts with [`crate::CutError::MissingColumn`].
pub fn cut_mask<'a, I>(dataset: &Dataset, cuts: I) -> CutResult<Mask>
where
    I: IntoIterator<Item = (&'a str, &'a Predicate)>,
{
    let mut mask = vec![true; dataset.len()];
    for (column, predicate) in cuts {
        let values = dataset.column(column)?;
        let passed = predicate.evaluate(column, values)?;
        for (keep, pass) in mask.iter_mut().zip(passed) {
            *keep &= pass;
        }
    }
    Ok(mask)
}

/// Apply a whole cut set at once, returning the surviving rows of every
/// column. The input dataset is left untouched.
pub fn apply_cuts(dataset: &Dataset, cuts: &CutSet) -> CutResult<Dataset> {
    let mask = cut_mask(dataset, cuts.iter())?;
    let filtered = dataset.filter(&mask)?;
    log::debug!(
        "applied {} cut(s) [{}]: {} -> {} events",
        cuts.len(),
        cuts.joined_names(),
        dataset.len(),
        filtered.len()
    );
    Ok(filtered)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::model::{Column, LABEL_COLUMN};
    use crate::error::CutError;

    fn scenario_a() -> Dataset {
        Dataset::from_columns([
            (LABEL_COLUMN, Column::from(vec!["sig", "sig", "bkg"])),
            ("x", Column::from(vec![1.0, 5.0, 10.0])),
        ])
        .unwrap()
    }

    #[test]
    fn keeps_rows_passing_cut() {
        let cuts = CutSet::from_conditions([("x", "< 6")]).unwrap();
        let out = apply_cuts(&scenario_a(), &cuts).unwrap();
        assert_eq!(out.column("x").unwrap(), &Column::Float(vec![1.0, 5.0]));
        assert_eq!(out.labels(), &["sig".to_string(), "sig".to_string()]);
    }

    #[test]
    fn missing_column_aborts() {
        let cuts = CutSet::from_conditions([("x", "< 6"), ("x2", ">= 0")]).unwrap();
        let err = apply_cuts(&scenario_a(), &cuts).unwrap_err();
        assert_eq!(err, CutError::MissingColumn { column: "x2".into() });
    }

    #[test]
    fn empty_cut_set_keeps_everything() {
        let ds = scenario_a();
        let out = apply_cuts(&ds, &CutSet::new()).unwrap();
        assert_eq!(out, ds);
    }

    #[test]
    fn reapplying_is_stable() {
        let cuts = CutSet::from_conditions([("x", "> 2")]).unwrap();
        let once = apply_cuts(&scenario_a(), &cuts).unwrap();
        let twice = apply_cuts(&once, &cuts).unwrap();
        assert_eq!(once, twice);

        let none = CutSet::from_conditions([("x", "> 100")]).unwrap();
        let empty = apply_cuts(&scenario_a(), &none).unwrap();
        let again = apply_cuts(&empty, &none).unwrap();
        assert_eq!(again.len(), 0);
        assert!(again.has_column(LABEL_COLUMN));
    }

    #[test]
    fn conjunction_is_order_independent() {
        let ds = Dataset::from_columns([
            (LABEL_COLUMN, Column::from(vec!["a"; 8])),
            ("x", Column::from(vec![0.0, 1.0, 2.0, 3.0, 4.0, 5.0, 6.0, 7.0])),
            ("n", Column::from(vec![0_i64, 1, 0, 1, 0, 1, 0, 1])),
            ("e", Column::from(vec![9.0, 8.0, 7.0, 6.0, 5.0, 4.0, 3.0, 2.0])),
        ])
        .unwrap();
        let cuts = [
            ("x", Predicate::parse(">= 1").unwrap()),
            ("n", Predicate::parse("== 1").unwrap()),
            ("e", Predicate::parse("> 3").unwrap()),
        ];
        let orders: [[usize; 3]; 6] = [
            [0, 1, 2],
            [0, 2, 1],
            [1, 0, 2],
            [1, 2, 0],
            [2, 0, 1],
            [2, 1, 0],
        ];
        let expected = vec![false, true, false, true, false, true, false, false];
        for order in orders {
            let mask = cut_mask(&ds, order.iter().map(|&i| (cuts[i].0, &cuts[i].1))).unwrap();
            assert_eq!(mask, expected, "order {order:?}");
        }
    }
}
