//! BinaryCIF reader.
//!
//! A BinaryCIF file is a MessagePack document
//! `{ dataBlocks: [{ header, categories: [{ name, rowCount, columns }] }] }`
//! where every column carries an encoded byte payload plus the chain of
//! encodings that produced it. Decoding walks that chain backwards.

use rmpv::Value;

use super::{CifBlock, CifCategory, CifError, CifField, CifFile, FieldData};

/// Intermediate column state while unwinding an encoding chain.
#[derive(Debug, Clone, PartialEq)]
enum Decoded {
    Bytes(Vec<u8>),
    Ints(Vec<i64>),
    Floats(Vec<f64>),
    Strings(Vec<String>),
}

/// Typed-array codes used by `ByteArray` and `srcType` parameters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ArrayType {
    Int8,
    Int16,
    Int32,
    Uint8,
    Uint16,
    Uint32,
    Float32,
    Float64,
}

impl ArrayType {
    fn from_code(code: i64) -> Result<Self, CifError> {
        Ok(match code {
            1 => Self::Int8,
            2 => Self::Int16,
            3 => Self::Int32,
            4 => Self::Uint8,
            5 => Self::Uint16,
            6 => Self::Uint32,
            32 => Self::Float32,
            33 => Self::Float64,
            other => {
                return Err(CifError::binary(format!(
                    "unknown array type code {other}"
                )))
            }
        })
    }

    fn width(self) -> usize {
        match self {
            Self::Int8 | Self::Uint8 => 1,
            Self::Int16 | Self::Uint16 => 2,
            Self::Int32 | Self::Uint32 | Self::Float32 => 4,
            Self::Float64 => 8,
        }
    }
}

fn get<'v>(value: &'v Value, key: &str) -> Option<&'v Value> {
    value
        .as_map()?
        .iter()
        .find(|(k, _)| k.as_str() == Some(key))
        .map(|(_, v)| v)
}

fn param<'v>(encoding: &'v Value, key: &str) -> Result<&'v Value, CifError> {
    get(encoding, key)
        .ok_or_else(|| CifError::binary(format!("encoding lacks '{key}'")))
}

fn str_param<'v>(value: &'v Value, key: &str) -> Result<&'v str, CifError> {
    param(value, key)?
        .as_str()
        .ok_or_else(|| CifError::binary(format!("'{key}' is not a string")))
}

fn list_param<'v>(value: &'v Value, key: &str) -> Result<&'v [Value], CifError> {
    match param(value, key)? {
        Value::Array(items) => Ok(items),
        _ => Err(CifError::binary(format!("'{key}' is not a list"))),
    }
}

fn bin_param<'v>(value: &'v Value, key: &str) -> Result<&'v [u8], CifError> {
    match param(value, key)? {
        Value::Binary(bytes) => Ok(bytes),
        _ => Err(CifError::binary(format!("'{key}' is not binary"))),
    }
}

fn int_param(encoding: &Value, key: &str) -> Result<i64, CifError> {
    let value = match param(encoding, key)? {
        Value::Integer(i) => i.as_i64(),
        Value::F64(x) if x.fract() == 0.0 => Some(*x as i64),
        _ => None,
    };
    value.ok_or_else(|| CifError::binary(format!("'{key}' is not an integer")))
}

fn float_param(encoding: &Value, key: &str) -> Result<f64, CifError> {
    let value = match param(encoding, key)? {
        Value::Integer(i) => i.as_i64().map(|v| v as f64),
        Value::F32(x) => Some(f64::from(*x)),
        Value::F64(x) => Some(*x),
        _ => None,
    };
    value.ok_or_else(|| CifError::binary(format!("'{key}' is not a number")))
}

fn byte_array(bytes: &[u8], ty: ArrayType) -> Result<Decoded, CifError> {
    let width = ty.width();
    if bytes.len() % width != 0 {
        return Err(CifError::binary(format!(
            "{} bytes is not a multiple of element width {width}",
            bytes.len()
        )));
    }
    let chunks = bytes.chunks_exact(width);
    Ok(match ty {
        ArrayType::Int8 => {
            Decoded::Ints(chunks.map(|c| i64::from(c[0] as i8)).collect())
        }
        ArrayType::Uint8 => Decoded::Ints(chunks.map(|c| i64::from(c[0])).collect()),
        ArrayType::Int16 => Decoded::Ints(
            chunks
                .map(|c| i64::from(i16::from_le_bytes([c[0], c[1]])))
                .collect(),
        ),
        ArrayType::Uint16 => Decoded::Ints(
            chunks
                .map(|c| i64::from(u16::from_le_bytes([c[0], c[1]])))
                .collect(),
        ),
        ArrayType::Int32 => Decoded::Ints(
            chunks
                .map(|c| i64::from(i32::from_le_bytes([c[0], c[1], c[2], c[3]])))
                .collect(),
        ),
        ArrayType::Uint32 => Decoded::Ints(
            chunks
                .map(|c| i64::from(u32::from_le_bytes([c[0], c[1], c[2], c[3]])))
                .collect(),
        ),
        ArrayType::Float32 => Decoded::Floats(
            chunks
                .map(|c| f64::from(f32::from_le_bytes([c[0], c[1], c[2], c[3]])))
                .collect(),
        ),
        ArrayType::Float64 => Decoded::Floats(
            chunks
                .map(|c| {
                    let mut raw = [0u8; 8];
                    raw.copy_from_slice(c);
                    f64::from_le_bytes(raw)
                })
                .collect(),
        ),
    })
}

fn expect_ints(data: Decoded, kind: &str) -> Result<Vec<i64>, CifError> {
    match data {
        Decoded::Ints(values) => Ok(values),
        _ => Err(CifError::binary(format!("{kind} expects integer input"))),
    }
}

fn run_length(values: &[i64], limit: usize) -> Result<Vec<i64>, CifError> {
    if values.len() % 2 != 0 {
        return Err(CifError::binary("RunLength data has odd length"));
    }
    let mut total = 0usize;
    for pair in values.chunks_exact(2) {
        let count = usize::try_from(pair[1])
            .map_err(|_| CifError::binary("negative RunLength count"))?;
        total = total
            .checked_add(count)
            .filter(|&total| total <= limit)
            .ok_or_else(|| {
                CifError::binary(format!(
                    "RunLength expands past the {limit} values the column holds"
                ))
            })?;
    }
    let mut out = Vec::with_capacity(total);
    for pair in values.chunks_exact(2) {
        out.extend(std::iter::repeat_n(pair[0], pair[1] as usize));
    }
    Ok(out)
}

fn delta(mut values: Vec<i64>, origin: i64) -> Result<Vec<i64>, CifError> {
    let mut acc = origin;
    for v in &mut values {
        acc = acc
            .checked_add(*v)
            .ok_or_else(|| CifError::binary("Delta decoding overflows i64"))?;
        *v = acc;
    }
    Ok(values)
}

fn integer_packing(values: &[i64], byte_count: i64, unsigned: bool) -> Vec<i64> {
    let (upper, lower) = match (byte_count, unsigned) {
        (1, true) => (0xff, i64::MIN),
        (1, false) => (0x7f, -0x80),
        (_, true) => (0xffff, i64::MIN),
        (_, false) => (0x7fff, -0x8000),
    };
    let mut out = Vec::with_capacity(values.len());
    let mut acc = 0i64;
    for &v in values {
        acc += v;
        if v != upper && v != lower {
            out.push(acc);
            acc = 0;
        }
    }
    out
}

/// Decode a `{ data, encoding }` pair into at most `limit` values.
fn decode_data(encoded: &Value, limit: usize) -> Result<Decoded, CifError> {
    let bytes = bin_param(encoded, "data")?;
    let encodings = list_param(encoded, "encoding")?;
    apply_encodings(Decoded::Bytes(bytes.to_vec()), encodings, limit)
}

fn apply_encodings(
    mut data: Decoded,
    encodings: &[Value],
    limit: usize,
) -> Result<Decoded, CifError> {
    for encoding in encodings.iter().rev() {
        let kind = str_param(encoding, "kind")?;
        data = match kind {
            "ByteArray" => match data {
                Decoded::Bytes(bytes) => {
                    let ty = ArrayType::from_code(int_param(encoding, "type")?)?;
                    byte_array(&bytes, ty)?
                }
                _ => return Err(CifError::binary("ByteArray expects bytes")),
            },
            "FixedPoint" => {
                let factor = float_param(encoding, "factor")?;
                let ints = expect_ints(data, kind)?;
                Decoded::Floats(
                    ints.into_iter().map(|v| v as f64 / factor).collect(),
                )
            }
            "IntervalQuantization" => {
                let min = float_param(encoding, "min")?;
                let max = float_param(encoding, "max")?;
                let steps = int_param(encoding, "numSteps")?;
                let delta = (max - min) / (steps - 1).max(1) as f64;
                let ints = expect_ints(data, kind)?;
                Decoded::Floats(
                    ints.into_iter().map(|v| min + delta * v as f64).collect(),
                )
            }
            "RunLength" => {
                Decoded::Ints(run_length(&expect_ints(data, kind)?, limit)?)
            }
            "Delta" => {
                let origin = int_param(encoding, "origin")?;
                Decoded::Ints(delta(expect_ints(data, kind)?, origin)?)
            }
            "IntegerPacking" => {
                let byte_count = int_param(encoding, "byteCount")?;
                let unsigned =
                    matches!(get(encoding, "isUnsigned"), Some(Value::Boolean(true)));
                Decoded::Ints(integer_packing(
                    &expect_ints(data, kind)?,
                    byte_count,
                    unsigned,
                ))
            }
            "StringArray" => string_array(data, encoding, limit)?,
            other => {
                return Err(CifError::binary(format!(
                    "unsupported encoding '{other}'"
                )))
            }
        };
    }
    Ok(data)
}

fn string_array(
    data: Decoded,
    encoding: &Value,
    limit: usize,
) -> Result<Decoded, CifError> {
    let Decoded::Bytes(bytes) = data else {
        return Err(CifError::binary("StringArray expects bytes"));
    };
    let data_encoding = list_param(encoding, "dataEncoding")?;
    let offset_encoding = list_param(encoding, "offsetEncoding")?;
    let offsets_raw = bin_param(encoding, "offsets")?;
    let string_data = str_param(encoding, "stringData")?;

    let indices = expect_ints(
        apply_encodings(Decoded::Bytes(bytes), data_encoding, limit)?,
        "StringArray data",
    )?;
    // One offset more than there are distinct strings.
    let offsets = expect_ints(
        apply_encodings(
            Decoded::Bytes(offsets_raw.to_vec()),
            offset_encoding,
            limit.saturating_add(1),
        )?,
        "StringArray offsets",
    )?;

    // Offsets count characters, which only equal bytes for ASCII text.
    let chars: Vec<char> = string_data.chars().collect();
    let slice = |start: i64, end: i64| -> Result<String, CifError> {
        let (start, end) = (start as usize, end as usize);
        if start > end || end > chars.len() {
            return Err(CifError::binary("StringArray offset out of range"));
        }
        Ok(chars[start..end].iter().collect())
    };
    let strings = offsets
        .windows(2)
        .map(|w| slice(w[0], w[1]))
        .collect::<Result<Vec<_>, _>>()?;

    indices
        .into_iter()
        .map(|i| {
            if i < 0 {
                Ok(String::new())
            } else {
                strings.get(i as usize).cloned().ok_or_else(|| {
                    CifError::binary(format!("string index {i} out of range"))
                })
            }
        })
        .collect::<Result<Vec<_>, _>>()
        .map(Decoded::Strings)
}

fn decode_column(column: &Value, row_count: usize) -> Result<CifField, CifError> {
    let name = str_param(column, "name")?.to_owned();
    let values = decode_data(param(column, "data")?, row_count)?;
    let mask = match get(column, "mask") {
        Some(Value::Nil) | None => None,
        Some(mask) => Some(expect_ints(decode_data(mask, row_count)?, "mask")?),
    };
    let present = |row: usize| mask.as_ref().is_none_or(|m| m.get(row) == Some(&0));

    let data = match values {
        Decoded::Ints(v) => FieldData::Int(
            v.into_iter()
                .enumerate()
                .map(|(row, x)| present(row).then_some(x))
                .collect(),
        ),
        Decoded::Floats(v) => FieldData::Float(
            v.into_iter()
                .enumerate()
                .map(|(row, x)| present(row).then_some(x))
                .collect(),
        ),
        Decoded::Strings(v) => FieldData::Text(
            v.into_iter()
                .enumerate()
                .map(|(row, x)| present(row).then_some(x))
                .collect(),
        ),
        Decoded::Bytes(_) => {
            return Err(CifError::binary(format!(
                "column '{name}' decoded to raw bytes"
            )))
        }
    };

    let field = CifField { name, data };
    if field.len() != row_count {
        return Err(CifError::binary(format!(
            "column '{}' has {} rows, category declares {row_count}",
            field.name,
            field.len()
        )));
    }
    Ok(field)
}

fn decode_category(category: &Value) -> Result<CifCategory, CifError> {
    let name = str_param(category, "name")?
        .trim_start_matches('_')
        .to_owned();
    let row_count = usize::try_from(int_param(category, "rowCount")?)
        .map_err(|_| CifError::binary("negative rowCount"))?;
    let fields = list_param(category, "columns")?
        .iter()
        .map(|column| decode_column(column, row_count))
        .collect::<Result<Vec<_>, _>>()?;
    Ok(CifCategory {
        name,
        row_count,
        fields,
    })
}

/// Parse BinaryCIF bytes.
pub fn parse_binary(data: &[u8]) -> Result<CifFile, CifError> {
    let root = rmpv::decode::read_value(&mut &data[..])
        .map_err(|e| CifError::binary(format!("invalid MessagePack: {e}")))?;

    let mut file = CifFile::default();
    for block in list_param(&root, "dataBlocks")? {
        let header = get(block, "header")
            .and_then(Value::as_str)
            .unwrap_or_default();
        let mut out = CifBlock::new(header);
        for category in list_param(block, "categories")? {
            out.categories.push(decode_category(category)?);
        }
        file.blocks.push(out);
    }

    if file.blocks.is_empty() {
        return Err(CifError::NoDataBlock);
    }
    Ok(file)
}
