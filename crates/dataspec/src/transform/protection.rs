//! Protected/public path discovery and the `protect` transform.

use crate::constants::{
    DATA, IS_PUBLIC, PROTECTED_ENTITY, PROTECTED_PATHS, PUBLIC, PUBLIC_PATHS, WEIGHTS,
};
use crate::error::{DataSpecError, Result};
use crate::node::Dataset;
use crate::schema::{Field, IdBase, Path, Type};

/// Paths to every table of `dataset` not marked public.
pub fn automatic_protected_paths(dataset: &Dataset) -> Path {
    let leaves = dataset
        .type_
        .tables()
        .into_iter()
        .filter(|table| !table.public)
        .map(|table| table.path);
    Path::from_leaves(DATA, leaves)
}

/// Paths to every table of `dataset` marked public.
pub fn automatic_public_paths(dataset: &Dataset) -> Path {
    let leaves = dataset
        .type_
        .tables()
        .into_iter()
        .filter(|table| table.public)
        .map(|table| table.path);
    Path::from_leaves(DATA, leaves)
}

/// Wrap a source dataset into a protected one.
///
/// Every leaf of both path trees must address a table of the source, and
/// no table may be both protected and public. The resulting type nests the
/// source type under `data`, with each table's public marker rewritten
/// from `public`, next to the privacy unit, public flag and weight columns.
pub fn protect(dataset: &Dataset, protected: &Path, public: &Path) -> Result<Dataset> {
    let tables: Vec<Vec<String>> = dataset.type_.tables().into_iter().map(|t| t.path).collect();
    let protected_leaves = protected.leaves();
    let public_leaves = public.leaves();

    for (parameter, leaves) in [(PROTECTED_PATHS, &protected_leaves), (PUBLIC_PATHS, &public_leaves)] {
        if let Some(unknown) = leaves.iter().find(|leaf| !tables.contains(*leaf)) {
            return Err(DataSpecError::parameter(
                "protect",
                parameter,
                format!("'{}' is not a table of the dataset", unknown.join(".")),
            ));
        }
    }
    if let Some(both) = protected_leaves.iter().find(|leaf| public_leaves.contains(*leaf)) {
        return Err(DataSpecError::parameter(
            "protect",
            PUBLIC_PATHS,
            format!("table '{}' cannot be both protected and public", both.join(".")),
        ));
    }

    let data = mark_public(&dataset.type_, &mut Vec::new(), &public_leaves);
    let type_ = Type::Struct {
        fields: vec![
            Field::new(DATA, data),
            Field::new(PROTECTED_ENTITY, Type::optional(Type::id(IdBase::String, false))),
            Field::new(IS_PUBLIC, Type::Boolean),
            Field::new(WEIGHTS, Type::float_interval(0.0, f64::MAX)),
        ],
    };

    Ok(Dataset {
        type_,
        protected: Some(Path::from_leaves(DATA, protected_leaves)),
        statistics: dataset.statistics.clone(),
        budget: None,
    })
}

/// Copy `ty`, setting the public marker on every union member that holds
/// a table.
fn mark_public(ty: &Type, prefix: &mut Vec<String>, public: &[Vec<String>]) -> Type {
    let Type::Union { fields } = ty else {
        return ty.clone();
    };
    let fields = fields
        .iter()
        .map(|field| {
            prefix.push(field.name.clone());
            let mut marked = Field {
                name: field.name.clone(),
                type_: mark_public(&field.type_, prefix, public),
                properties: field.properties.clone(),
            };
            if matches!(field.type_, Type::Struct { .. }) {
                let flag = public.iter().any(|p| p.as_slice() == prefix.as_slice());
                marked.properties.insert(PUBLIC.to_string(), flag.to_string());
            }
            prefix.pop();
            marked
        })
        .collect();
    Type::Union { fields }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::{FieldStatistics, Statistics};

    fn source() -> Dataset {
        let type_ = Type::Union {
            fields: vec![Field::new(
                "extract",
                Type::Union {
                    fields: vec![
                        Field::new(
                            "beacon",
                            Type::Struct {
                                fields: vec![Field::new("id", Type::id(IdBase::Int64, true))],
                            },
                        )
                        .with_property(PUBLIC, "true"),
                        Field::new(
                            "census",
                            Type::Struct {
                                fields: vec![
                                    Field::new("age", Type::integer_interval(0, 120)),
                                    Field::new("sex", Type::text_values(["F", "M"])),
                                ],
                            },
                        ),
                    ],
                },
            )],
        };
        let statistics = Statistics::union(vec![FieldStatistics::new(
            "extract",
            Statistics::union(vec![
                FieldStatistics::new("beacon", Statistics::table(10, ["id"])),
                FieldStatistics::new("census", Statistics::table(200, ["age", "sex"])),
            ]),
        )]);
        Dataset {
            type_,
            protected: None,
            statistics,
            budget: None,
        }
    }

    fn walk(parts: &[&str]) -> Vec<String> {
        parts.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_automatic_paths_split_tables() {
        let dataset = source();
        let protected = automatic_protected_paths(&dataset);
        let public = automatic_public_paths(&dataset);
        assert_eq!(protected.label, DATA);
        assert_eq!(protected.leaves(), vec![walk(&["extract", "census"])]);
        assert_eq!(public.leaves(), vec![walk(&["extract", "beacon"])]);
    }

    #[test]
    fn test_protect_keeps_columns() {
        let dataset = source();
        let protected = protect(
            &dataset,
            &automatic_protected_paths(&dataset),
            &automatic_public_paths(&dataset),
        )
        .unwrap();
        assert!(protected.is_protected());
        assert_eq!(protected.data_type().columns(), dataset.type_.columns());
        assert_eq!(protected.statistics, dataset.statistics);
        assert!(protected.type_.field(PROTECTED_ENTITY).is_some());
        assert!(protected.type_.validate().is_ok());

        let tables = protected.data_type().tables();
        assert!(tables[0].public);
        assert!(!tables[1].public);
    }

    #[test]
    fn test_protect_rejects_unknown_table() {
        let dataset = source();
        let bogus = Path::from_leaves(DATA, [walk(&["extract", "nope"])]);
        let err = protect(&dataset, &bogus, &automatic_public_paths(&dataset)).unwrap_err();
        assert!(matches!(err, DataSpecError::InvalidParameter { ref parameter, .. } if parameter == PROTECTED_PATHS));
    }

    #[test]
    fn test_protect_rejects_overlap() {
        let dataset = source();
        let both = Path::from_leaves(DATA, [walk(&["extract", "census"])]);
        let err = protect(&dataset, &both, &both).unwrap_err();
        assert!(matches!(err, DataSpecError::InvalidParameter { ref parameter, .. } if parameter == PUBLIC_PATHS));
    }

    #[test]
    fn test_protect_can_publish_a_table() {
        let dataset = source();
        let none = Path::leaf(DATA);
        let everything = Path::from_leaves(
            DATA,
            [walk(&["extract", "beacon"]), walk(&["extract", "census"])],
        );
        let protected = protect(&dataset, &none, &everything).unwrap();
        assert!(protected.data_type().tables().iter().all(|t| t.public));
        assert!(protected.protected.unwrap().is_empty());
    }
}
