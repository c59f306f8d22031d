use config::{ColumnValues, Filters};
use log::{debug, info};
use polars::prelude::*;

/// A single row predicate. Rows are kept when every predicate holds.
#[derive(Debug, Clone, PartialEq)]
pub enum Predicate {
    /// drop rows holding exactly zero; null is kept
    NonZero(String),
    /// keep rows strictly above the threshold
    Above { column: String, threshold: f64 },
    /// drop rows whose value is listed; null is kept
    Exclude { column: String, values: Vec<String> },
    /// keep only rows whose value is listed
    Include { column: String, values: Vec<String> },
}

impl Predicate {
    pub fn column(&self) -> &str {
        match self {
            Predicate::NonZero(column)
            | Predicate::Above { column, .. }
            | Predicate::Exclude { column, .. }
            | Predicate::Include { column, .. } => column,
        }
    }

    pub fn expr(&self) -> Expr {
        match self {
            Predicate::NonZero(column) => {
                let value = col(column.as_str()).cast(DataType::Float64);
                value.clone().neq(lit(0.0)).or(value.is_null())
            }
            Predicate::Above { column, threshold } => col(column.as_str())
                .cast(DataType::Float64)
                .gt(lit(*threshold)),
            Predicate::Exclude { column, values } => any_of(column, values)
                .not()
                .or(col(column.as_str()).is_null()),
            Predicate::Include { column, values } => any_of(column, values),
        }
    }
}

fn any_of(column: &str, values: &[String]) -> Expr {
    values.iter().fold(lit(false), |acc, v| {
        acc.or(col(column).cast(DataType::String).eq(lit(v.as_str())))
    })
}

pub fn exclusions(lists: &[ColumnValues]) -> Vec<Predicate> {
    lists
        .iter()
        .map(|l| Predicate::Exclude {
            column: l.column.clone(),
            values: l.values.clone(),
        })
        .collect()
}

#[derive(Debug, Clone, Default)]
pub struct RowFilter {
    predicates: Vec<Predicate>,
}

impl RowFilter {
    pub fn new(predicates: Vec<Predicate>) -> Self {
        RowFilter { predicates }
    }

    pub fn from_config(filters: &Filters) -> Self {
        let mut predicates: Vec<Predicate> = filters
            .nonzero
            .iter()
            .map(|c| Predicate::NonZero(c.clone()))
            .collect();
        predicates.extend(filters.above.iter().map(|t| Predicate::Above {
            column: t.column.clone(),
            threshold: t.value,
        }));
        predicates.extend(exclusions(&filters.exclude));
        predicates.extend(
            filters
                .include
                .iter()
                .filter(|l| !l.values.is_empty())
                .map(|l| Predicate::Include {
                    column: l.column.clone(),
                    values: l.values.clone(),
                }),
        );
        RowFilter { predicates }
    }

    pub fn with(mut self, predicate: Predicate) -> Self {
        self.predicates.push(predicate);
        self
    }

    pub fn predicates(&self) -> &[Predicate] {
        &self.predicates
    }

    pub fn columns(&self) -> Vec<String> {
        self.predicates
            .iter()
            .map(|p| p.column().to_string())
            .collect()
    }

    pub fn is_empty(&self) -> bool {
        self.predicates.is_empty()
    }

    pub fn apply(&self, df: &DataFrame) -> PolarsResult<DataFrame> {
        if self.predicates.is_empty() {
            return Ok(df.clone());
        }
        let mut filter_expr = lit(true);
        for predicate in &self.predicates {
            debug!("filter: {:?}", predicate);
            filter_expr = filter_expr.and(predicate.expr());
        }
        let filtered = df.clone().lazy().filter(filter_expr).collect()?;
        info!("filter: {} rows -> {} rows", df.height(), filtered.height());
        Ok(filtered)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use config::Threshold;

    fn records() -> DataFrame {
        df!(
            "Hostname" => &["H1", "H2", "H3", "H4", "H5"],
            "Car City" => &[Some("上海"), Some("斯图加特"), None, Some("北京"), Some("上海")],
            "Total mileage (km)" => &[Some(50.0), Some(60.0), Some(0.0), None, Some(15.0)],
            "Autononous driving mileage (km)" => &[30.0, 20.0, 0.0, 12.0, 11.0],
        )
        .unwrap()
    }

    fn hostnames(df: &DataFrame) -> Vec<String> {
        df.column("Hostname")
            .unwrap()
            .str()
            .unwrap()
            .into_iter()
            .flatten()
            .map(String::from)
            .collect()
    }

    #[test]
    fn test_zero_exclusion() {
        let df = df!(
            "Hostname" => &["H1", "H2", "H3"],
            "Total mileage (km)" => &[50, 0, 30],
        )
        .unwrap();
        let filter = RowFilter::new(vec![Predicate::NonZero("Total mileage (km)".into())]);
        let filtered = filter.apply(&df).unwrap();
        assert_eq!(filtered.height(), 2);
        assert_eq!(hostnames(&filtered), vec!["H1", "H3"]);
    }

    #[test]
    fn test_zero_exclusion_keeps_null() {
        let filter = RowFilter::new(vec![Predicate::NonZero("Total mileage (km)".into())]);
        let filtered = filter.apply(&records()).unwrap();
        assert_eq!(hostnames(&filtered), vec!["H1", "H2", "H4", "H5"]);
    }

    #[test]
    fn test_threshold() {
        let filter = RowFilter::new(vec![Predicate::Above {
            column: "Total mileage (km)".into(),
            threshold: 20.0,
        }]);
        let filtered = filter.apply(&records()).unwrap();
        assert_eq!(hostnames(&filtered), vec!["H1", "H2"]);
    }

    #[test]
    fn test_exclude_and_include() {
        let filter = RowFilter::new(vec![Predicate::Exclude {
            column: "Car City".into(),
            values: vec!["斯图加特".into(), "法兰克福".into()],
        }]);
        assert_eq!(hostnames(&filter.apply(&records()).unwrap()), vec!["H1", "H3", "H4", "H5"]);

        let filter = filter.with(Predicate::Include {
            column: "Hostname".into(),
            values: vec!["H2".into(), "H3".into()],
        });
        assert_eq!(hostnames(&filter.apply(&records()).unwrap()), vec!["H3"]);
    }

    #[test]
    fn test_filter_is_idempotent() {
        let filters = Filters {
            nonzero: vec![
                "Total mileage (km)".into(),
                "Autononous driving mileage (km)".into(),
            ],
            above: vec![Threshold {
                column: "Autononous driving mileage (km)".into(),
                value: 10.0,
            }],
            exclude: vec![ColumnValues {
                column: "Car City".into(),
                values: vec!["斯图加特".into()],
            }],
            include: vec![],
        };
        let filter = RowFilter::from_config(&filters);
        assert_eq!(filter.predicates().len(), 4);
        let once = filter.apply(&records()).unwrap();
        let twice = filter.apply(&once).unwrap();
        assert_eq!(hostnames(&once), vec!["H1", "H4", "H5"]);
        assert!(once.equals_missing(&twice));
    }

    #[test]
    fn test_predicate_order_does_not_matter() {
        let a = Predicate::Above {
            column: "Total mileage (km)".into(),
            threshold: 10.0,
        };
        let b = Predicate::Exclude {
            column: "Car City".into(),
            values: vec!["上海".into()],
        };
        let ab = RowFilter::new(vec![a.clone(), b.clone()]).apply(&records()).unwrap();
        let ba = RowFilter::new(vec![b, a]).apply(&records()).unwrap();
        assert!(ab.equals_missing(&ba));
        assert_eq!(hostnames(&ab), vec!["H2"]);
    }

    #[test]
    fn test_empty_include_list_is_ignored() {
        let filters = Filters {
            nonzero: vec![],
            above: vec![],
            exclude: vec![],
            include: vec![ColumnValues {
                column: "Hostname".into(),
                values: vec![],
            }],
        };
        let filter = RowFilter::from_config(&filters);
        assert!(filter.is_empty());
        assert_eq!(filter.apply(&records()).unwrap().height(), 5);
    }
}
