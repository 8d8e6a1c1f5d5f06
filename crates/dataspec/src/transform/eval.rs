//! Evaluation of built-in transforms on computed values.

use std::collections::BTreeMap;

use crate::budget::{self, BudgetPolicy};
use crate::constants::{ATTRIBUTES_BUDGET, PROTECTED_PATHS, PUBLIC_PATHS, USER_TYPE};
use crate::error::{DataSpecError, Result};
use crate::node::{Dataset, Scalar, Value};

use super::{
    automatic_protected_paths, automatic_public_paths, automatic_user_settings, protect,
    user_settings, Transform, TransformKind, UserSettingsPolicy,
};

/// Compute the value of `transform` applied to the values of its
/// positional and named arguments.
///
/// Contracts are checked when nodes are built; a value of the wrong shape
/// here is reported as a contract violation all the same.
pub fn evaluate(
    transform: &Transform,
    inputs: &[&Value],
    named: &BTreeMap<String, Value>,
) -> Result<Value> {
    let kind = transform.kind()?;
    let args = Args {
        transform: kind,
        inputs,
        named,
    };
    let value = match kind {
        TransformKind::AutomaticProtectedPaths => {
            Value::Scalar(Scalar::ProtectedPaths(automatic_protected_paths(args.dataset()?)))
        }
        TransformKind::AutomaticPublicPaths => {
            Value::Scalar(Scalar::PublicPaths(automatic_public_paths(args.dataset()?)))
        }
        TransformKind::Protect => {
            let protected = match args.scalar(PROTECTED_PATHS)? {
                Scalar::ProtectedPaths(path) => path,
                other => return Err(args.mismatch(PROTECTED_PATHS, other)),
            };
            let public = match args.scalar(PUBLIC_PATHS)? {
                Scalar::PublicPaths(path) => path,
                other => return Err(args.mismatch(PUBLIC_PATHS, other)),
            };
            Value::Dataset(protect(args.dataset()?, protected, public)?)
        }
        TransformKind::AutomaticUserSettings => {
            let policy = UserSettingsPolicy::from_properties(&transform.properties)?;
            Value::Scalar(Scalar::UserSettings(automatic_user_settings(
                args.dataset()?,
                &policy,
            )))
        }
        TransformKind::UserSettings => {
            let user_type = match args.scalar(USER_TYPE)? {
                Scalar::UserSettings(ty) => ty,
                other => return Err(args.mismatch(USER_TYPE, other)),
            };
            Value::Dataset(user_settings(args.dataset()?, user_type)?)
        }
        TransformKind::AutomaticBudget => {
            let policy = BudgetPolicy::from_properties(&transform.properties)?;
            Value::Scalar(Scalar::Budget(budget::automatic_budget(
                args.dataset()?,
                &policy,
            )?))
        }
        TransformKind::AttributesBudget => match args.input()? {
            Value::Scalar(Scalar::Budget(total)) => {
                Value::Scalar(Scalar::AttributesBudget(budget::attributes_budget(total)?))
            }
            _ => return Err(DataSpecError::contract(kind.as_str(), "expected a budget input")),
        },
        TransformKind::AssignBudget => {
            let allocation = match args.scalar(ATTRIBUTES_BUDGET)? {
                Scalar::AttributesBudget(allocation) => allocation,
                other => return Err(args.mismatch(ATTRIBUTES_BUDGET, other)),
            };
            Value::Dataset(budget::assign_budget(args.dataset()?, allocation)?)
        }
    };
    Ok(value)
}

struct Args<'a> {
    transform: TransformKind,
    inputs: &'a [&'a Value],
    named: &'a BTreeMap<String, Value>,
}

impl<'a> Args<'a> {
    fn input(&self) -> Result<&'a Value> {
        match self.inputs {
            [value] => Ok(value),
            _ => Err(DataSpecError::contract(
                self.transform.as_str(),
                format!("expected 1 input, got {}", self.inputs.len()),
            )),
        }
    }

    fn dataset(&self) -> Result<&'a Dataset> {
        self.input()?.as_dataset().ok_or_else(|| {
            DataSpecError::contract(self.transform.as_str(), "expected a dataset input")
        })
    }

    fn scalar(&self, name: &str) -> Result<&'a Scalar> {
        match self.named.get(name) {
            Some(Value::Scalar(scalar)) => Ok(scalar),
            Some(Value::Dataset(_)) => Err(DataSpecError::parameter(
                self.transform.as_str(),
                name,
                "expected a scalar, got a dataset",
            )),
            None => Err(DataSpecError::parameter(
                self.transform.as_str(),
                name,
                "parameter is unbound",
            )),
        }
    }

    fn mismatch(&self, name: &str, found: &Scalar) -> DataSpecError {
        DataSpecError::parameter(
            self.transform.as_str(),
            name,
            format!("unexpected {} value", found.kind()),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::{Field, Path, Statistics, Type};

    fn source() -> Value {
        let census = Type::Struct {
            fields: vec![
                Field::new("age", Type::integer_interval(0, 120)),
                Field::new("income", Type::float_interval(0.0, 1e6)),
            ],
        };
        Value::Dataset(Dataset {
            type_: Type::Union {
                fields: vec![Field::new(
                    "main",
                    Type::Union {
                        fields: vec![Field::new("census", census)],
                    },
                )],
            },
            protected: None,
            statistics: Statistics::union(Vec::new()),
            budget: None,
        })
    }

    fn run(kind: TransformKind, input: &Value, named: &[(&str, &Value)]) -> Result<Value> {
        let named = named
            .iter()
            .map(|(name, value)| (name.to_string(), (*value).clone()))
            .collect();
        let transform = match kind {
            TransformKind::AutomaticBudget => Transform::automatic_budget(&BudgetPolicy::default()),
            TransformKind::AutomaticUserSettings => {
                Transform::automatic_user_settings(&UserSettingsPolicy::default())
            }
            _ => Transform::new(kind),
        };
        evaluate(&transform, &[input], &named)
    }

    #[test]
    fn test_full_chain() {
        let src = source();
        let protected_paths = run(TransformKind::AutomaticProtectedPaths, &src, &[]).unwrap();
        let public_paths = run(TransformKind::AutomaticPublicPaths, &src, &[]).unwrap();
        let protected = run(
            TransformKind::Protect,
            &src,
            &[(PROTECTED_PATHS, &protected_paths), (PUBLIC_PATHS, &public_paths)],
        )
        .unwrap();
        assert!(protected.as_dataset().unwrap().is_protected());

        let user_type = run(TransformKind::AutomaticUserSettings, &protected, &[]).unwrap();
        let adjusted = run(TransformKind::UserSettings, &protected, &[(USER_TYPE, &user_type)]).unwrap();

        let total = run(TransformKind::AutomaticBudget, &adjusted, &[]).unwrap();
        let split = run(TransformKind::AttributesBudget, &total, &[]).unwrap();
        let budgeted =
            run(TransformKind::AssignBudget, &adjusted, &[(ATTRIBUTES_BUDGET, &split)]).unwrap();
        let allocation = budgeted.as_dataset().unwrap().budget.clone().unwrap();
        assert_eq!(allocation.allocations.len(), 2);
    }

    #[test]
    fn test_budget_of_unprotected_dataset() {
        let err = run(TransformKind::AutomaticBudget, &source(), &[]).unwrap_err();
        assert!(matches!(err, DataSpecError::ContractViolation { .. }));
    }

    #[test]
    fn test_wrong_parameter_value() {
        let src = source();
        let public = run(TransformKind::AutomaticPublicPaths, &src, &[]).unwrap();
        let err = run(
            TransformKind::Protect,
            &src,
            &[(PROTECTED_PATHS, &public), (PUBLIC_PATHS, &public)],
        )
        .unwrap_err();
        assert!(matches!(err, DataSpecError::InvalidParameter { .. }));
    }

    #[test]
    fn test_unbound_parameter() {
        let src = source();
        let err = run(TransformKind::Protect, &src, &[]).unwrap_err();
        assert!(matches!(err, DataSpecError::InvalidParameter { ref parameter, .. } if parameter == PROTECTED_PATHS));
    }

    #[test]
    fn test_scalar_where_dataset_expected() {
        let paths = Value::Scalar(Scalar::ProtectedPaths(Path::leaf("data")));
        let err = run(TransformKind::AutomaticPublicPaths, &paths, &[]).unwrap_err();
        assert!(matches!(err, DataSpecError::ContractViolation { .. }));
    }
}
