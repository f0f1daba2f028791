//! Biological assembly expansion from `_pdbx_struct_assembly_gen` and
//! `_pdbx_struct_oper_list`.

use std::sync::Arc;

use glam::{Mat4, Vec4};
use rustc_hash::FxHashMap;

use super::{Model, Structure, StructureError, Unit};
use crate::cif::{CifBlock, CifField};

/// A named rigid transform from `_pdbx_struct_oper_list`.
#[derive(Debug, Clone, PartialEq)]
pub struct Operator {
    /// Operator id.
    pub id: String,
    /// Rotation and translation.
    pub matrix: Mat4,
}

/// One `_pdbx_struct_assembly_gen` row.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AssemblyGen {
    /// Raw operator expression, e.g. `(1-60)` or `(X0)(1-5)`.
    pub oper_expression: String,
    /// Label chain ids the operators apply to.
    pub asym_ids: Vec<String>,
}

/// A biological assembly: the generators sharing one `assembly_id`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Assembly {
    /// Assembly id.
    pub id: String,
    /// Generators in file order.
    pub generators: Vec<AssemblyGen>,
}

pub(super) fn read_assemblies(block: &CifBlock) -> Result<Vec<Assembly>, StructureError> {
    const CATEGORY: &str = "pdbx_struct_assembly_gen";
    let Some(category) = block.category(CATEGORY) else {
        return Ok(Vec::new());
    };
    let field = |name: &'static str| {
        category.field(name).ok_or(StructureError::MissingField {
            category: CATEGORY,
            field: name,
        })
    };
    let (ids, exprs, asyms) = (
        field("assembly_id")?,
        field("oper_expression")?,
        field("asym_id_list")?,
    );

    let mut assemblies: Vec<Assembly> = Vec::new();
    for row in 0..category.row_count {
        let value = |f: &CifField| {
            f.str(row).map(|s| s.trim().to_owned()).ok_or_else(|| {
                StructureError::BadRow {
                    category: CATEGORY,
                    row,
                    message: format!("missing '{}'", f.name),
                }
            })
        };
        let id = value(ids)?;
        let generator = AssemblyGen {
            oper_expression: value(exprs)?,
            asym_ids: value(asyms)?
                .split(',')
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(str::to_owned)
                .collect(),
        };
        match assemblies.iter_mut().find(|a| a.id == id) {
            Some(assembly) => assembly.generators.push(generator),
            None => assemblies.push(Assembly {
                id,
                generators: vec![generator],
            }),
        }
    }
    Ok(assemblies)
}

pub(super) fn read_operators(
    block: &CifBlock,
) -> Result<FxHashMap<String, Operator>, StructureError> {
    const CATEGORY: &str = "pdbx_struct_oper_list";
    let mut operators = FxHashMap::default();
    let Some(list) = block.category(CATEGORY) else {
        return Ok(operators);
    };
    let ids = list.field("id").ok_or(StructureError::MissingField {
        category: CATEGORY,
        field: "id",
    })?;

    for row in 0..list.row_count {
        let id = ids
            .str(row)
            .map(|s| s.trim().to_owned())
            .ok_or_else(|| StructureError::BadRow {
                category: CATEGORY,
                row,
                message: "missing 'id'".to_owned(),
            })?;
        // Absent matrix entries fall back to the identity.
        let read = |name: String, default: f32| {
            list.field(&name)
                .and_then(|f| f.float(row))
                .map_or(default, |v| v as f32)
        };
        let mut cols = [Vec4::ZERO, Vec4::ZERO, Vec4::ZERO, Vec4::W];
        for (r, row_name) in (1..=3).enumerate() {
            for (c, col) in cols.iter_mut().take(3).enumerate() {
                let default = if r == c { 1.0 } else { 0.0 };
                col[r] = read(format!("matrix[{row_name}][{}]", c + 1), default);
            }
            cols[3][r] = read(format!("vector[{row_name}]"), 0.0);
        }
        let _ = operators.insert(
            id.clone(),
            Operator {
                id,
                matrix: Mat4::from_cols(cols[0], cols[1], cols[2], cols[3]),
            },
        );
    }
    Ok(operators)
}

/// Most operators a single generator may produce, per range and in total.
const MAX_OPERATOR_RANGE: i64 = 100_000;

fn expand_group(group: &str, expr: &str) -> Result<Vec<String>, StructureError> {
    let bad = || StructureError::BadOperatorExpression(expr.to_owned());
    let mut ids = Vec::new();
    for part in group.split(',') {
        let part = part.trim();
        if part.is_empty() {
            return Err(bad());
        }
        let range = part.split_once('-').and_then(|(a, b)| {
            Some((a.parse::<i64>().ok()?, b.parse::<i64>().ok()?))
        });
        match range {
            Some((start, end)) => {
                let span = end.checked_sub(start).ok_or_else(bad)?;
                if !(0..MAX_OPERATOR_RANGE).contains(&span) {
                    return Err(bad());
                }
                ids.extend((start..=end).map(|i| i.to_string()));
            }
            None => ids.push(part.to_owned()),
        }
    }
    Ok(ids)
}

/// Parse an operator expression into its parenthesized factors.
///
/// `1,2` and `(1,2)` give one factor `[1, 2]`; `(1-3)` gives `[1, 2, 3]`;
/// `(X0)(1-2)` gives two factors `[X0]` and `[1, 2]`, whose cartesian
/// product lists the composed operators.
pub fn parse_oper_expression(expr: &str) -> Result<Vec<Vec<String>>, StructureError> {
    let compact: String = expr.chars().filter(|c| !c.is_whitespace()).collect();
    if compact.is_empty() {
        return Err(StructureError::BadOperatorExpression(expr.to_owned()));
    }
    if !compact.starts_with('(') {
        return Ok(vec![expand_group(&compact, expr)?]);
    }

    let mut factors = Vec::new();
    let mut rest = compact.as_str();
    while !rest.is_empty() {
        let inner = rest
            .strip_prefix('(')
            .and_then(|r| r.split_once(')'))
            .ok_or_else(|| StructureError::BadOperatorExpression(expr.to_owned()))?;
        factors.push(expand_group(inner.0, expr)?);
        rest = inner.1;
    }

    let total = factors
        .iter()
        .try_fold(1i64, |n, f| n.checked_mul(f.len() as i64))
        .filter(|&n| n <= MAX_OPERATOR_RANGE);
    if total.is_none() {
        return Err(StructureError::BadOperatorExpression(expr.to_owned()));
    }
    Ok(factors)
}

/// Cartesian product of the factors, leftmost factor varying slowest.
fn combinations(factors: &[Vec<String>]) -> Vec<Vec<&str>> {
    factors.iter().fold(vec![Vec::new()], |acc, factor| {
        acc.iter()
            .flat_map(|prefix| {
                factor.iter().map(move |id| {
                    let mut next = prefix.clone();
                    next.push(id.as_str());
                    next
                })
            })
            .collect()
    })
}

/// Expand `assembly_id` (or the first assembly) of `model`.
///
/// A model without assembly records expands to its deposited coordinates
/// when no specific assembly was requested.
pub(super) fn expand(
    model: Arc<Model>,
    assembly_id: Option<&str>,
) -> Result<Structure, StructureError> {
    let entry = Arc::clone(&model.entry);
    let assembly = match assembly_id {
        Some(id) => entry
            .assembly(id)
            .ok_or_else(|| StructureError::UnknownAssembly(id.to_owned()))?,
        None => match entry.assemblies.first() {
            Some(first) => first,
            None => {
                log::debug!("'{}' defines no assemblies, using the model", entry.name);
                return Ok(Structure::from_model(model));
            }
        },
    };

    let chains = model.chain_runs();
    let mut units = Vec::new();
    for generator in &assembly.generators {
        let factors = parse_oper_expression(&generator.oper_expression)?;
        for combo in combinations(&factors) {
            // Rightmost operator applies first.
            let mut matrix = Mat4::IDENTITY;
            for id in &combo {
                let op = entry
                    .operators
                    .get(*id)
                    .ok_or_else(|| StructureError::UnknownOperator((*id).to_owned()))?;
                matrix *= op.matrix;
            }
            let name = combo.join("x");
            for (label_asym_id, indices) in &chains {
                if !generator.asym_ids.contains(label_asym_id) {
                    continue;
                }
                let positions = indices
                    .iter()
                    .map(|&i| matrix.transform_point3(model.atoms[i].position))
                    .collect();
                units.push(Unit {
                    label_asym_id: label_asym_id.clone(),
                    operator: name.clone(),
                    atom_indices: indices.clone(),
                    positions,
                });
            }
        }
    }

    log::debug!(
        "assembly '{}' of '{}': {} units",
        assembly.id,
        entry.name,
        units.len()
    );
    Ok(Structure { model, units })
}

#[cfg(test)]
mod tests {
    use glam::Vec3;

    use super::super::{fixtures, StructureKind, Trajectory};
    use super::*;

    fn model() -> Arc<Model> {
        Trajectory::from_cif(&fixtures::two_chains())
            .unwrap()
            .model(0)
            .unwrap()
    }

    #[test]
    fn operator_expressions() {
        assert_eq!(parse_oper_expression("1").unwrap(), vec![vec!["1"]]);
        assert_eq!(parse_oper_expression("1,2").unwrap(), vec![vec!["1", "2"]]);
        assert_eq!(
            parse_oper_expression("(1-3)").unwrap(),
            vec![vec!["1", "2", "3"]]
        );
        assert_eq!(
            parse_oper_expression("(X0)(1-2,5)").unwrap(),
            vec![vec!["X0"], vec!["1", "2", "5"]]
        );
        assert!(parse_oper_expression("").is_err());
        assert!(parse_oper_expression("(1").is_err());
        assert!(parse_oper_expression("(3-1)").is_err());
        assert!(parse_oper_expression("(1,,2)").is_err());
    }

    #[test]
    fn oversized_ranges_are_rejected() {
        assert!(parse_oper_expression("(1-999999999999)").is_err());
        assert!(parse_oper_expression("(0-9223372036854775807)").is_err());
        assert!(parse_oper_expression("(1-1000)(1-1000)").is_err());
        let largest = format!("(1-{MAX_OPERATOR_RANGE})");
        assert_eq!(
            parse_oper_expression(&largest).unwrap()[0].len(),
            MAX_OPERATOR_RANGE as usize
        );
    }

    #[test]
    fn products_vary_rightmost_fastest() {
        let factors = parse_oper_expression("(A,B)(1,2)").unwrap();
        assert_eq!(
            combinations(&factors),
            vec![vec!["A", "1"], vec!["A", "2"], vec!["B", "1"], vec!["B", "2"]]
        );
    }

    #[test]
    fn operators_are_read() {
        let model = model();
        let shift = &model.entry.operators["2"];
        assert_eq!(
            shift.matrix.transform_point3(Vec3::ZERO),
            Vec3::new(50.0, 0.0, 0.0)
        );
        assert_eq!(model.entry.operators["1"].matrix, Mat4::IDENTITY);
        assert_eq!(model.entry.assemblies.len(), 2);
        assert_eq!(model.entry.assemblies[0].generators[0].asym_ids, ["A", "B"]);
    }

    #[test]
    fn expands_requested_assembly() {
        let structure =
            Structure::build(model(), &StructureKind::Assembly(Some("1".to_owned())))
                .unwrap();
        let units: Vec<_> = structure
            .units
            .iter()
            .map(|u| (u.label_asym_id.as_str(), u.operator.as_str()))
            .collect();
        assert_eq!(units, [("A", "1"), ("B", "1"), ("A", "2"), ("B", "2")]);
        assert_eq!(structure.units[2].positions[0], Vec3::new(50.0, 0.0, 0.0));
        assert_eq!(structure.atom_count(), 14);

        let first = Structure::build(model(), &StructureKind::Assembly(None)).unwrap();
        assert_eq!(first, structure);
    }

    #[test]
    fn unknown_assembly_and_operator() {
        assert_eq!(
            Structure::build(model(), &StructureKind::Assembly(Some("9".to_owned()))),
            Err(StructureError::UnknownAssembly("9".to_owned()))
        );

        let mut entry = (*model().entry).clone();
        entry.assemblies[0].generators[0].oper_expression = "(7)".to_owned();
        let broken = Arc::new(Model {
            entry: Arc::new(entry),
            ..(*model()).clone()
        });
        assert_eq!(
            expand(broken, Some("1")),
            Err(StructureError::UnknownOperator("7".to_owned()))
        );
    }
}
