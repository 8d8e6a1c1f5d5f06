//! Budget estimation, splitting and assignment.

use crate::constants::ATTRIBUTES_BUDGET;
use crate::error::{DataSpecError, Result};
use crate::node::Dataset;
use crate::schema::Type;

use super::{
    AttributeAllocation, AttributeBudget, AttributePath, Budget, BudgetPolicy, PrivacyBudget,
};

/// Fraction of the total withheld when splitting, so rounding in the sum
/// of shares never exceeds the total.
const SPLIT_MARGIN: f64 = 1e-9;

/// Columns of the protected tables of `dataset`, relative to its data,
/// sorted.
pub fn protected_attributes(dataset: &Dataset) -> Vec<AttributePath> {
    let Some(protected) = &dataset.protected else {
        return Vec::new();
    };
    let data = dataset.data_type();
    let mut attributes: Vec<AttributePath> = protected
        .leaves()
        .into_iter()
        .filter_map(|table| match data.descend(&table) {
            Some(Type::Struct { fields }) => Some(
                fields
                    .iter()
                    .map(|column| {
                        let mut path = table.clone();
                        path.push(column.name.clone());
                        AttributePath(path)
                    })
                    .collect::<Vec<_>>(),
            ),
            _ => None,
        })
        .flatten()
        .collect();
    attributes.sort();
    attributes.dedup();
    attributes
}

/// Rows across the protected tables of `dataset`.
fn protected_rows(dataset: &Dataset) -> u64 {
    dataset
        .protected
        .iter()
        .flat_map(|protected| protected.leaves())
        .filter_map(|table| dataset.statistics.table_size(&table))
        .fold(0u64, u64::saturating_add)
}

/// Size a total budget for a protected dataset.
///
/// Epsilon grows with the number of protected attributes and the number of
/// protected rows, capped by the policy; delta is taken from the policy.
pub fn automatic_budget(dataset: &Dataset, policy: &BudgetPolicy) -> Result<Budget> {
    if !dataset.is_protected() {
        return Err(DataSpecError::contract(
            "automatic_budget",
            "input dataset has no protected entity",
        ));
    }
    policy.validate()?;
    let attributes = protected_attributes(dataset);
    let epsilon = policy.epsilon(attributes.len(), protected_rows(dataset));
    Ok(Budget {
        total: PrivacyBudget::new(epsilon, policy.delta),
        attributes,
    })
}

/// Split a total budget equally across its attributes.
pub fn attributes_budget(budget: &Budget) -> Result<AttributeAllocation> {
    budget
        .total
        .validate()
        .map_err(|e| DataSpecError::parameter("attributes_budget", "total", e))?;
    if budget.attributes.is_empty() {
        return Ok(AttributeAllocation::new(budget.total, Vec::new()));
    }
    let n = budget.attributes.len() as f64;
    let share = PrivacyBudget::new(
        budget.total.epsilon * (1.0 - SPLIT_MARGIN) / n,
        budget.total.delta * (1.0 - SPLIT_MARGIN) / n,
    );
    let allocations = budget
        .attributes
        .iter()
        .map(|path| AttributeBudget {
            path: path.clone(),
            budget: share,
        })
        .collect();
    Ok(AttributeAllocation::new(budget.total, allocations))
}

/// Bind `allocation` to a protected dataset.
///
/// Fails with `BudgetExceeded` when the allocation spends more than its own
/// total or than an allocation already bound upstream.
pub fn assign_budget(dataset: &Dataset, allocation: &AttributeAllocation) -> Result<Dataset> {
    allocation
        .validate()
        .map_err(|e| DataSpecError::parameter("assign_budget", ATTRIBUTES_BUDGET, e))?;

    let attributes = protected_attributes(dataset);
    if let Some(unknown) = allocation.paths().find(|p| !attributes.contains(p)) {
        return Err(DataSpecError::parameter(
            "assign_budget",
            ATTRIBUTES_BUDGET,
            format!("'{}' is not a protected attribute of the dataset", unknown),
        ));
    }

    let spent = allocation.sum();
    let mut limits = vec![allocation.total];
    if let Some(upstream) = &dataset.budget {
        limits.push(upstream.total);
    }
    for limit in limits {
        if let Some((dimension, requested, available)) = spent.excess_over(&limit) {
            return Err(DataSpecError::BudgetExceeded {
                dimension,
                requested,
                available,
            });
        }
    }

    Ok(Dataset {
        type_: dataset.type_.clone(),
        protected: dataset.protected.clone(),
        statistics: dataset.statistics.clone(),
        budget: Some(allocation.clone()),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::constants::DATA;
    use crate::schema::{Field, FieldStatistics, Path, Statistics};

    fn dataset(protected_tables: &[&str]) -> Dataset {
        let table = |columns: &[&str]| Type::Struct {
            fields: columns.iter().map(|c| Field::new(*c, Type::integer())).collect(),
        };
        let data = Type::Union {
            fields: vec![
                Field::new("census", table(&["age", "sex"])),
                Field::new("visits", table(&["day"])),
            ],
        };
        Dataset {
            type_: Type::Struct {
                fields: vec![Field::new(DATA, data)],
            },
            protected: Some(Path::from_leaves(
                DATA,
                protected_tables.iter().map(|t| vec![t.to_string()]),
            )),
            statistics: Statistics::union(vec![
                FieldStatistics::new("census", Statistics::table(1000, ["age", "sex"])),
                FieldStatistics::new("visits", Statistics::table(50, ["day"])),
            ]),
            budget: None,
        }
    }

    #[test]
    fn test_protected_attributes() {
        let attributes = protected_attributes(&dataset(&["visits", "census"]));
        let names: Vec<String> = attributes.iter().map(ToString::to_string).collect();
        assert_eq!(names, vec!["census.age", "census.sex", "visits.day"]);
    }

    #[test]
    fn test_automatic_budget_is_monotone() {
        let policy = BudgetPolicy::default();
        let small = automatic_budget(&dataset(&["census"]), &policy).unwrap();
        let large = automatic_budget(&dataset(&["census", "visits"]), &policy).unwrap();
        assert!(large.total.epsilon >= small.total.epsilon);
        assert_eq!(large.total.delta, policy.delta);
    }

    #[test]
    fn test_automatic_budget_with_huge_tables() {
        let mut huge = dataset(&["census", "visits"]);
        huge.statistics = Statistics::union(vec![
            FieldStatistics::new("census", Statistics::table(u64::MAX, ["age", "sex"])),
            FieldStatistics::new("visits", Statistics::table(u64::MAX, ["day"])),
        ]);
        let policy = BudgetPolicy::default();
        let budget = automatic_budget(&huge, &policy).unwrap();
        assert!(budget.total.epsilon.is_finite());
        assert!(budget.total.epsilon <= policy.max_epsilon);
    }

    #[test]
    fn test_automatic_budget_requires_protection() {
        let mut source = dataset(&[]);
        source.protected = None;
        let err = automatic_budget(&source, &BudgetPolicy::default()).unwrap_err();
        assert!(matches!(err, DataSpecError::ContractViolation { .. }));
    }

    #[test]
    fn test_split_never_exceeds_total() {
        let budget = automatic_budget(&dataset(&["census", "visits"]), &BudgetPolicy::default())
            .unwrap();
        let allocation = attributes_budget(&budget).unwrap();
        assert_eq!(allocation.allocations.len(), 3);
        assert!(allocation.sum().excess_over(&budget.total).is_none());
        assert_eq!(attributes_budget(&budget).unwrap(), allocation);
    }

    #[test]
    fn test_assign_budget() {
        let ds = dataset(&["census"]);
        let budget = automatic_budget(&ds, &BudgetPolicy::default()).unwrap();
        let allocation = attributes_budget(&budget).unwrap();
        let budgeted = assign_budget(&ds, &allocation).unwrap();
        assert_eq!(budgeted.budget.as_ref(), Some(&allocation));
        assert_eq!(budgeted.type_, ds.type_);
    }

    #[test]
    fn test_assign_budget_rejects_overspending() {
        let ds = dataset(&["census"]);
        let allocation = AttributeAllocation::new(
            PrivacyBudget::new(1.0, 0.0),
            vec![
                AttributeBudget {
                    path: AttributePath::new(["census", "age"]),
                    budget: PrivacyBudget::new(0.75, 0.0),
                },
                AttributeBudget {
                    path: AttributePath::new(["census", "sex"]),
                    budget: PrivacyBudget::new(0.5, 0.0),
                },
            ],
        );
        let err = assign_budget(&ds, &allocation).unwrap_err();
        assert!(matches!(err, DataSpecError::BudgetExceeded { dimension: "epsilon", .. }));
    }

    #[test]
    fn test_assign_budget_checks_upstream_total() {
        let mut ds = dataset(&["census"]);
        ds.budget = Some(AttributeAllocation::new(PrivacyBudget::new(0.1, 0.0), Vec::new()));
        let budget = automatic_budget(&ds, &BudgetPolicy::default()).unwrap();
        let allocation = attributes_budget(&budget).unwrap();
        let err = assign_budget(&ds, &allocation).unwrap_err();
        assert!(matches!(err, DataSpecError::BudgetExceeded { .. }));
    }

    #[test]
    fn test_assign_budget_rejects_unprotected_attribute() {
        let ds = dataset(&["census"]);
        let allocation = AttributeAllocation::new(
            PrivacyBudget::new(1.0, 0.0),
            vec![AttributeBudget {
                path: AttributePath::new(["visits", "day"]),
                budget: PrivacyBudget::new(0.5, 0.0),
            }],
        );
        let err = assign_budget(&ds, &allocation).unwrap_err();
        assert!(matches!(err, DataSpecError::InvalidParameter { .. }));
    }
}
