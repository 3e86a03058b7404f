//! # Telemetry Record Codec
//!
//! Structured telemetry is written as fixed-width binary records against a declared schema. A
//! record is `[timestamp: f64][declared fields in order]`, all little-endian, with no padding
//! beyond each type's native width. The schema fixes the record length, so a stream of records
//! can be sliced without framing bytes.

// ------------------------------------------------------------------------------------------------
// IMPORTS
// ------------------------------------------------------------------------------------------------

use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};
use serde::{Deserialize, Serialize};
use std::io::Cursor;
use thiserror::Error;

// ------------------------------------------------------------------------------------------------
// ENUMS
// ------------------------------------------------------------------------------------------------

/// The type of a telemetry field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TmType {
    /// Unsigned 8 bit integer
    Byte,
    /// Unsigned 16 bit integer
    Word,
    /// Signed 32 bit integer
    Int,
    /// Signed 64 bit integer
    Long,
    /// 32 bit float
    Float,
    /// 64 bit float
    Double,
    /// Fixed-width string, zero padded
    Str(usize),
    /// Fixed-width byte array
    Bytes(usize),
}

/// A telemetry field value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum TmValue {
    Byte(u8),
    Word(u16),
    Int(i32),
    Long(i64),
    Float(f32),
    Double(f64),
    Str(String),
    Bytes(Vec<u8>),
}

/// Possible errors when encoding or decoding telemetry records.
#[derive(Debug, Error)]
pub enum TmError {
    #[error("Schema has {expected} fields but {found} values were provided")]
    FieldCountMismatch { expected: usize, found: usize },

    #[error("Value for field {0:?} does not match its declared type")]
    TypeMismatch(String),

    #[error("String for field {field:?} is longer than its declared width {width}")]
    StringTooLong { field: String, width: usize },

    #[error("Byte array for field {field:?} is not its declared width {width}")]
    WrongBytesWidth { field: String, width: usize },

    #[error("Field {field:?} holds a string which is not valid UTF-8")]
    InvalidUtf8 { field: String },

    #[error("Expected a record of {expected} bytes, found {found}")]
    WrongRecordLength { expected: usize, found: usize },
}

// ------------------------------------------------------------------------------------------------
// STRUCTS
// ------------------------------------------------------------------------------------------------

/// A telemetry field declaration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TmField {
    /// Name of the field, used in error reports and ground decoding.
    pub name: String,

    /// The field's type.
    pub ty: TmType,
}

/// A declared telemetry record schema.
///
/// Fields are written in declaration order.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TmSchema {
    fields: Vec<TmField>,
}

// ------------------------------------------------------------------------------------------------
// IMPLS
// ------------------------------------------------------------------------------------------------

impl TmType {
    /// The packed width of the type in bytes.
    pub fn width(&self) -> usize {
        match self {
            TmType::Byte => 1,
            TmType::Word => 2,
            TmType::Int => 4,
            TmType::Long => 8,
            TmType::Float => 4,
            TmType::Double => 8,
            TmType::Str(n) => *n,
            TmType::Bytes(n) => *n,
        }
    }
}

impl TmSchema {
    /// Create a new empty schema.
    pub fn new() -> Self {
        Self { fields: Vec::new() }
    }

    /// Append a field declaration, builder style.
    pub fn field(mut self, name: &str, ty: TmType) -> Self {
        self.fields.push(TmField {
            name: name.to_string(),
            ty,
        });
        self
    }

    /// The declared fields, in write order.
    pub fn fields(&self) -> &[TmField] {
        &self.fields
    }

    /// The fixed length of one encoded record, including the leading timestamp.
    pub fn record_len(&self) -> usize {
        8 + self.fields.iter().map(|f| f.ty.width()).sum::<usize>()
    }

    /// Encode one record.
    pub fn encode(&self, timestamp_s: f64, values: &[TmValue]) -> Result<Vec<u8>, TmError> {
        if values.len() != self.fields.len() {
            return Err(TmError::FieldCountMismatch {
                expected: self.fields.len(),
                found: values.len(),
            });
        }

        let mut buf = Vec::with_capacity(self.record_len());

        // Timestamp always leads the record
        buf.write_f64::<LittleEndian>(timestamp_s).unwrap();

        for (field, value) in self.fields.iter().zip(values.iter()) {
            match (&field.ty, value) {
                (TmType::Byte, TmValue::Byte(v)) => buf.write_u8(*v).unwrap(),
                (TmType::Word, TmValue::Word(v)) => buf.write_u16::<LittleEndian>(*v).unwrap(),
                (TmType::Int, TmValue::Int(v)) => buf.write_i32::<LittleEndian>(*v).unwrap(),
                (TmType::Long, TmValue::Long(v)) => buf.write_i64::<LittleEndian>(*v).unwrap(),
                (TmType::Float, TmValue::Float(v)) => buf.write_f32::<LittleEndian>(*v).unwrap(),
                (TmType::Double, TmValue::Double(v)) => buf.write_f64::<LittleEndian>(*v).unwrap(),
                (TmType::Str(width), TmValue::Str(s)) => {
                    if s.len() > *width {
                        return Err(TmError::StringTooLong {
                            field: field.name.clone(),
                            width: *width,
                        });
                    }

                    buf.extend_from_slice(s.as_bytes());
                    buf.extend(std::iter::repeat(0u8).take(width - s.len()));
                }
                (TmType::Bytes(width), TmValue::Bytes(b)) => {
                    if b.len() != *width {
                        return Err(TmError::WrongBytesWidth {
                            field: field.name.clone(),
                            width: *width,
                        });
                    }

                    buf.extend_from_slice(b);
                }
                _ => return Err(TmError::TypeMismatch(field.name.clone())),
            }
        }

        Ok(buf)
    }

    /// Decode one record, returning the timestamp and the field values in declaration order.
    pub fn decode(&self, record: &[u8]) -> Result<(f64, Vec<TmValue>), TmError> {
        if record.len() != self.record_len() {
            return Err(TmError::WrongRecordLength {
                expected: self.record_len(),
                found: record.len(),
            });
        }

        let mut cursor = Cursor::new(record);

        let timestamp_s = cursor.read_f64::<LittleEndian>().unwrap();

        let mut values = Vec::with_capacity(self.fields.len());

        for field in self.fields.iter() {
            let value = match field.ty {
                TmType::Byte => TmValue::Byte(cursor.read_u8().unwrap()),
                TmType::Word => TmValue::Word(cursor.read_u16::<LittleEndian>().unwrap()),
                TmType::Int => TmValue::Int(cursor.read_i32::<LittleEndian>().unwrap()),
                TmType::Long => TmValue::Long(cursor.read_i64::<LittleEndian>().unwrap()),
                TmType::Float => TmValue::Float(cursor.read_f32::<LittleEndian>().unwrap()),
                TmType::Double => TmValue::Double(cursor.read_f64::<LittleEndian>().unwrap()),
                TmType::Str(width) => {
                    let start = cursor.position() as usize;
                    let raw = &record[start..start + width];
                    cursor.set_position((start + width) as u64);

                    // Strip the zero padding
                    let end = raw.iter().position(|&b| b == 0).unwrap_or(width);
                    let s = std::str::from_utf8(&raw[..end]).map_err(|_| {
                        TmError::InvalidUtf8 {
                            field: field.name.clone(),
                        }
                    })?;

                    TmValue::Str(s.to_string())
                }
                TmType::Bytes(width) => {
                    let start = cursor.position() as usize;
                    let raw = record[start..start + width].to_vec();
                    cursor.set_position((start + width) as u64);

                    TmValue::Bytes(raw)
                }
            };

            values.push(value);
        }

        Ok((timestamp_s, values))
    }
}

// ------------------------------------------------------------------------------------------------
// TESTS
// ------------------------------------------------------------------------------------------------

#[cfg(test)]
mod test {
    use super::*;

    fn full_schema() -> TmSchema {
        TmSchema::new()
            .field("b", TmType::Byte)
            .field("w", TmType::Word)
            .field("i", TmType::Int)
            .field("l", TmType::Long)
            .field("f", TmType::Float)
            .field("d", TmType::Double)
            .field("s", TmType::Str(8))
            .field("raw", TmType::Bytes(3))
    }

    #[test]
    fn round_trip_all_types() {
        let schema = full_schema();
        let values = vec![
            TmValue::Byte(0xA5),
            TmValue::Word(512),
            TmValue::Int(-40000),
            TmValue::Long(1 << 40),
            TmValue::Float(3.5),
            TmValue::Double(-0.125),
            TmValue::Str("wall".into()),
            TmValue::Bytes(vec![1, 2, 3]),
        ];

        let record = schema.encode(123.456, &values).unwrap();
        assert_eq!(record.len(), schema.record_len());

        let (ts, decoded) = schema.decode(&record).unwrap();
        assert_eq!(ts, 123.456);
        assert_eq!(decoded, values);
    }

    #[test]
    fn record_len_is_fixed() {
        let schema = full_schema();
        assert_eq!(schema.record_len(), 8 + 1 + 2 + 4 + 8 + 4 + 8 + 8 + 3);
    }

    #[test]
    fn encode_errors_are_typed() {
        let schema = TmSchema::new().field("s", TmType::Str(4));

        assert!(matches!(
            schema.encode(0.0, &[TmValue::Str("too long".into())]),
            Err(TmError::StringTooLong { .. })
        ));
        assert!(matches!(
            schema.encode(0.0, &[TmValue::Int(1)]),
            Err(TmError::TypeMismatch(_))
        ));
        assert!(matches!(
            schema.encode(0.0, &[]),
            Err(TmError::FieldCountMismatch { .. })
        ));
    }

    #[test]
    fn decode_rejects_short_records() {
        let schema = TmSchema::new().field("i", TmType::Int);
        assert!(matches!(
            schema.decode(&[0u8; 4]),
            Err(TmError::WrongRecordLength { .. })
        ));
    }
}
