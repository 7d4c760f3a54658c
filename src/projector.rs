//! Row 프로젝터 - 행 튜플을 타입이 있는 구조체로 변환
//!
//! 대상 타입마다 {필드, 컬럼명, 변환 규칙, setter}의 정적 바인딩 테이블을
//! 선언하고, 프로젝터가 그 테이블을 순회하며 셀 값을 변환합니다.
//! 변환은 같은 튜플/메타데이터에 대해 결정적입니다.

use crate::error::{CanalError, Result};
use crate::events::{CellValue, RowChangeEvent};
use crate::schema::{ColumnKind, ColumnMeta};
use chrono::NaiveDateTime;

/// Timestamp/DateTime 컬럼의 텍스트 형식
pub const DATETIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// 대상 필드의 변환 규칙
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldKind {
    /// 정수로 읽어 1이면 true
    Bool,
    /// 부호 있는 정수 (임의 폭 -> i64)
    Int,
    /// 부호 없는 정수 (임의 폭 -> u64)
    UInt,
    /// 부동소수점 (f32/f64 -> f64)
    Float,
    /// 텍스트 (enum 컬럼은 1-based ordinal을 값 목록으로 해석)
    Text,
    /// 텍스트, NULL이면 None
    NullableText,
    /// 부호 있는 정수, NULL이면 None
    NullableInt,
    /// "YYYY-MM-DD HH:MM:SS" 텍스트 파싱
    DateTime,
    /// 텍스트를 JSON으로 파싱
    Json,
}

/// 변환이 끝난 값 (필드 setter로 전달)
#[derive(Debug, Clone, PartialEq)]
pub enum ProjectedValue {
    Bool(bool),
    Int(i64),
    UInt(u64),
    Float(f64),
    Text(String),
    NullableText(Option<String>),
    NullableInt(Option<i64>),
    DateTime(NaiveDateTime),
    Json(serde_json::Value),
}

/// 필드 바인딩 테이블의 한 항목
pub struct FieldBinding<T> {
    /// 필드 식별자 (진단용)
    pub field: &'static str,
    /// 소스 컬럼명
    pub column: &'static str,
    /// 변환 규칙
    pub kind: FieldKind,
    /// 변환된 값을 필드에 대입하는 setter
    pub assign: fn(&mut T, ProjectedValue),
}

/// 프로젝션 대상 타입이 구현하는 트레이트
///
/// 바인딩 테이블은 타입마다 한 번 선언되며 런타임 introspection은 없습니다.
pub trait RowProjection: Sized {
    fn bindings() -> &'static [FieldBinding<Self>];
}

/// 바인딩 테이블을 순회하며 대상 구조체를 채움
///
/// `row_index`는 읽을 행 튜플 선택 (Insert/Delete: 0, Update: 0=old/1=new).
/// 첫 번째 변환 실패에서 전체 프로젝션이 중단되며, 실패한 필드와 컬럼이
/// 에러에 담깁니다.
pub fn project<T: RowProjection + 'static>(
    dest: &mut T,
    event: &RowChangeEvent,
    row_index: usize,
) -> Result<()> {
    for binding in T::bindings() {
        let column_index =
            event
                .column_index(binding.column)
                .ok_or_else(|| CanalError::ColumnNotFound {
                    column: binding.column.to_string(),
                    table: event.qualified_name(),
                })?;

        let cell = event.cell(row_index, column_index).ok_or_else(|| {
            CanalError::Other(format!(
                "row {} is missing in {} event",
                row_index,
                event.action.as_str()
            ))
        })?;

        let meta = &event.columns[column_index];
        let value = convert(cell, meta, binding.kind).map_err(|e| CanalError::ProjectionError {
            field: binding.field,
            column: binding.column.to_string(),
            source: Box::new(e),
        })?;

        (binding.assign)(dest, value);
    }

    Ok(())
}

/// 셀 값을 변환 규칙에 따라 변환
fn convert(cell: &CellValue, meta: &ColumnMeta, kind: FieldKind) -> Result<ProjectedValue> {
    match kind {
        FieldKind::Bool => Ok(ProjectedValue::Bool(int_value(cell, meta)? == 1)),
        FieldKind::Int => Ok(ProjectedValue::Int(int_value(cell, meta)?)),
        FieldKind::UInt => Ok(ProjectedValue::UInt(uint_value(cell, meta)?)),
        FieldKind::Float => Ok(ProjectedValue::Float(float_value(cell, meta)?)),
        FieldKind::Text => Ok(ProjectedValue::Text(text_value(cell, meta)?)),
        FieldKind::NullableText => {
            if cell.is_null() {
                Ok(ProjectedValue::NullableText(None))
            } else {
                Ok(ProjectedValue::NullableText(Some(text_value(cell, meta)?)))
            }
        }
        FieldKind::NullableInt => {
            if cell.is_null() {
                Ok(ProjectedValue::NullableInt(None))
            } else {
                Ok(ProjectedValue::NullableInt(Some(int_value(cell, meta)?)))
            }
        }
        FieldKind::DateTime => Ok(ProjectedValue::DateTime(datetime_value(cell, meta)?)),
        FieldKind::Json => Ok(ProjectedValue::Json(json_value(cell, meta)?)),
    }
}

/// 부호 있는 정수 계열을 i64로 확장
fn int_value(cell: &CellValue, meta: &ColumnMeta) -> Result<i64> {
    match cell {
        CellValue::Int8(v) => Ok(*v as i64),
        CellValue::Int16(v) => Ok(*v as i64),
        CellValue::Int32(v) => Ok(*v as i64),
        CellValue::Int64(v) => Ok(*v),
        other => Err(unsupported(meta, other)),
    }
}

/// 부호 없는 정수 계열을 u64로 확장
fn uint_value(cell: &CellValue, meta: &ColumnMeta) -> Result<u64> {
    match cell {
        CellValue::UInt8(v) => Ok(*v as u64),
        CellValue::UInt16(v) => Ok(*v as u64),
        CellValue::UInt32(v) => Ok(*v as u64),
        CellValue::UInt64(v) => Ok(*v),
        other => Err(unsupported(meta, other)),
    }
}

/// f32/f64를 f64로 확장
fn float_value(cell: &CellValue, meta: &ColumnMeta) -> Result<f64> {
    match cell {
        CellValue::Float(v) => Ok(*v as f64),
        CellValue::Double(v) => Ok(*v),
        other => Err(unsupported(meta, other)),
    }
}

/// 텍스트 변환
///
/// enum 컬럼은 raw 값이 값 목록에 대한 1-based ordinal입니다.
/// ordinal 0 또는 NULL은 빈 문자열이며 에러가 아닙니다.
fn text_value(cell: &CellValue, meta: &ColumnMeta) -> Result<String> {
    if meta.kind == ColumnKind::Enum {
        return enum_text(cell, meta);
    }

    match cell {
        CellValue::Null => Ok(String::new()),
        CellValue::Text(s) => Ok(s.clone()),
        CellValue::Bytes(b) => Ok(String::from_utf8_lossy(b).to_string()),
        CellValue::Decimal(d) => Ok(d.clone()),
        other => Err(unsupported(meta, other)),
    }
}

/// enum ordinal을 값 목록의 텍스트로 해석
fn enum_text(cell: &CellValue, meta: &ColumnMeta) -> Result<String> {
    if meta.enum_values.is_empty() {
        return Ok(String::new());
    }

    let ordinal = match cell {
        CellValue::Null => return Ok(String::new()),
        other => int_or_uint(other, meta)?,
    };

    if ordinal == 0 {
        return Ok(String::new());
    }

    meta.enum_values
        .get(ordinal as usize - 1)
        .cloned()
        .ok_or_else(|| CanalError::Other(format!(
            "enum ordinal {} out of range for column {}",
            ordinal, meta.name
        )))
}

/// 정수 계열 (부호 무관)을 i64로 읽음 (enum ordinal용)
fn int_or_uint(cell: &CellValue, meta: &ColumnMeta) -> Result<i64> {
    match cell {
        CellValue::UInt8(v) => Ok(*v as i64),
        CellValue::UInt16(v) => Ok(*v as i64),
        CellValue::UInt32(v) => Ok(*v as i64),
        CellValue::UInt64(v) => Ok(*v as i64),
        other => int_value(other, meta),
    }
}

/// Timestamp/DateTime 컬럼의 텍스트를 파싱
///
/// 컬럼의 선언 타입이 temporal이 아니면 에러, 파싱 실패도 에러입니다.
fn datetime_value(cell: &CellValue, meta: &ColumnMeta) -> Result<NaiveDateTime> {
    if !meta.kind.is_temporal() {
        return Err(CanalError::UnsupportedColumnType {
            column: meta.name.clone(),
            detail: format!("{:?}", meta.kind),
        });
    }

    let text = match cell {
        CellValue::Text(s) => s.clone(),
        CellValue::Bytes(b) => String::from_utf8_lossy(b).to_string(),
        other => return Err(unsupported(meta, other)),
    };

    NaiveDateTime::parse_from_str(&text, DATETIME_FORMAT)
        .map_err(|e| CanalError::TimestampParseError(format!("{}: {}", text, e)))
}

/// 텍스트를 JSON으로 파싱
fn json_value(cell: &CellValue, meta: &ColumnMeta) -> Result<serde_json::Value> {
    let text = text_value(cell, meta)?;
    let value = serde_json::from_str(&text)?;
    Ok(value)
}

fn unsupported(meta: &ColumnMeta, cell: &CellValue) -> CanalError {
    CanalError::UnsupportedColumnType {
        column: meta.name.clone(),
        detail: cell_kind_name(cell).to_string(),
    }
}

fn cell_kind_name(cell: &CellValue) -> &'static str {
    match cell {
        CellValue::Null => "null",
        CellValue::Int8(_) => "int8",
        CellValue::Int16(_) => "int16",
        CellValue::Int32(_) => "int32",
        CellValue::Int64(_) => "int64",
        CellValue::UInt8(_) => "uint8",
        CellValue::UInt16(_) => "uint16",
        CellValue::UInt32(_) => "uint32",
        CellValue::UInt64(_) => "uint64",
        CellValue::Float(_) => "float",
        CellValue::Double(_) => "double",
        CellValue::Text(_) => "text",
        CellValue::Bytes(_) => "bytes",
        CellValue::Decimal(_) => "decimal",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::ActionKind;
    use crate::schema::ColumnKind;
    use chrono::{NaiveDate, Timelike};

    #[derive(Debug, Default)]
    struct Order {
        id: i64,
        user_id: u64,
        amount: f64,
        status: String,
        note: Option<String>,
        coupon_id: Option<i64>,
        paid: bool,
        created_at: Option<NaiveDateTime>,
        attrs: Option<serde_json::Value>,
    }

    impl RowProjection for Order {
        fn bindings() -> &'static [FieldBinding<Self>] {
            const BINDINGS: &[FieldBinding<Order>] = &[
                FieldBinding {
                    field: "id",
                    column: "id",
                    kind: FieldKind::Int,
                    assign: |o, v| {
                        if let ProjectedValue::Int(x) = v {
                            o.id = x;
                        }
                    },
                },
                FieldBinding {
                    field: "user_id",
                    column: "user_id",
                    kind: FieldKind::UInt,
                    assign: |o, v| {
                        if let ProjectedValue::UInt(x) = v {
                            o.user_id = x;
                        }
                    },
                },
                FieldBinding {
                    field: "amount",
                    column: "amount",
                    kind: FieldKind::Float,
                    assign: |o, v| {
                        if let ProjectedValue::Float(x) = v {
                            o.amount = x;
                        }
                    },
                },
                FieldBinding {
                    field: "status",
                    column: "status",
                    kind: FieldKind::Text,
                    assign: |o, v| {
                        if let ProjectedValue::Text(x) = v {
                            o.status = x;
                        }
                    },
                },
                FieldBinding {
                    field: "note",
                    column: "note",
                    kind: FieldKind::NullableText,
                    assign: |o, v| {
                        if let ProjectedValue::NullableText(x) = v {
                            o.note = x;
                        }
                    },
                },
                FieldBinding {
                    field: "coupon_id",
                    column: "coupon_id",
                    kind: FieldKind::NullableInt,
                    assign: |o, v| {
                        if let ProjectedValue::NullableInt(x) = v {
                            o.coupon_id = x;
                        }
                    },
                },
                FieldBinding {
                    field: "paid",
                    column: "paid",
                    kind: FieldKind::Bool,
                    assign: |o, v| {
                        if let ProjectedValue::Bool(x) = v {
                            o.paid = x;
                        }
                    },
                },
                FieldBinding {
                    field: "created_at",
                    column: "created_at",
                    kind: FieldKind::DateTime,
                    assign: |o, v| {
                        if let ProjectedValue::DateTime(x) = v {
                            o.created_at = Some(x);
                        }
                    },
                },
                FieldBinding {
                    field: "attrs",
                    column: "attrs",
                    kind: FieldKind::Json,
                    assign: |o, v| {
                        if let ProjectedValue::Json(x) = v {
                            o.attrs = Some(x);
                        }
                    },
                },
            ];
            BINDINGS
        }
    }

    fn order_columns() -> Vec<ColumnMeta> {
        let mut status = ColumnMeta::new("status", ColumnKind::Enum);
        status.enum_values = vec![
            "pending".to_string(),
            "shipped".to_string(),
            "done".to_string(),
        ];

        vec![
            ColumnMeta::new("id", ColumnKind::BigInt),
            ColumnMeta::new("user_id", ColumnKind::Int),
            ColumnMeta::new("amount", ColumnKind::Double),
            status,
            ColumnMeta::new("note", ColumnKind::VarChar),
            ColumnMeta::new("coupon_id", ColumnKind::BigInt),
            ColumnMeta::new("paid", ColumnKind::TinyInt),
            ColumnMeta::new("created_at", ColumnKind::DateTime),
            ColumnMeta::new("attrs", ColumnKind::Json),
        ]
    }

    fn order_event(row: Vec<CellValue>) -> RowChangeEvent {
        RowChangeEvent {
            schema: "testdb".to_string(),
            table: "orders".to_string(),
            action: ActionKind::Insert,
            columns: order_columns(),
            rows: vec![row],
            timestamp: 0,
        }
    }

    fn full_row() -> Vec<CellValue> {
        vec![
            CellValue::Int64(42),
            CellValue::UInt32(u32::MAX),
            CellValue::Float(1.5),
            CellValue::Int64(2),
            CellValue::Text("gift".to_string()),
            CellValue::Int64(7),
            CellValue::Int8(1),
            CellValue::Text("2023-05-01 10:20:30".to_string()),
            CellValue::Text(r#"{"color":"red"}"#.to_string()),
        ]
    }

    #[test]
    fn test_project_full_row() {
        let event = order_event(full_row());
        let mut order = Order::default();
        project(&mut order, &event, 0).unwrap();

        assert_eq!(order.id, 42);
        assert_eq!(order.user_id, u32::MAX as u64);
        assert_eq!(order.amount, 1.5);
        assert_eq!(order.status, "shipped");
        assert_eq!(order.note, Some("gift".to_string()));
        assert_eq!(order.coupon_id, Some(7));
        assert!(order.paid);
        assert_eq!(
            order.created_at,
            NaiveDate::from_ymd_opt(2023, 5, 1).and_then(|d| d.and_hms_opt(10, 20, 30))
        );
        assert_eq!(order.attrs, Some(serde_json::json!({"color": "red"})));
    }

    #[test]
    fn test_project_nullable_fields() {
        let mut row = full_row();
        row[4] = CellValue::Null; // note
        row[5] = CellValue::Null; // coupon_id
        let event = order_event(row);

        let mut order = Order::default();
        order.note = Some("stale".to_string());
        order.coupon_id = Some(99);
        project(&mut order, &event, 0).unwrap();

        assert_eq!(order.note, None);
        assert_eq!(order.coupon_id, None);
    }

    #[test]
    fn test_enum_ordinal_zero_and_null() {
        let mut status = ColumnMeta::new("status", ColumnKind::Enum);
        status.enum_values = vec!["a".to_string(), "b".to_string(), "c".to_string()];

        assert_eq!(text_value(&CellValue::Int64(2), &status).unwrap(), "b");
        assert_eq!(text_value(&CellValue::Int64(0), &status).unwrap(), "");
        assert_eq!(text_value(&CellValue::Null, &status).unwrap(), "");
    }

    #[test]
    fn test_enum_ordinal_out_of_range() {
        let mut status = ColumnMeta::new("status", ColumnKind::Enum);
        status.enum_values = vec!["a".to_string()];

        assert!(text_value(&CellValue::Int64(5), &status).is_err());
    }

    #[test]
    fn test_datetime_parse_failure() {
        let mut row = full_row();
        row[7] = CellValue::Text("not-a-date".to_string());
        let event = order_event(row);

        let mut order = Order::default();
        let err = project(&mut order, &event, 0).unwrap_err();
        match err {
            CanalError::ProjectionError { field, .. } => assert_eq!(field, "created_at"),
            other => panic!("unexpected error: {}", other),
        }
    }

    #[test]
    fn test_datetime_requires_temporal_column() {
        let meta = ColumnMeta::new("created_at", ColumnKind::Int);
        let cell = CellValue::Text("2023-05-01 10:20:30".to_string());

        match datetime_value(&cell, &meta) {
            Err(CanalError::UnsupportedColumnType { column, .. }) => {
                assert_eq!(column, "created_at")
            }
            other => panic!("unexpected result: {:?}", other),
        }
    }

    #[test]
    fn test_datetime_value_parses_instant() {
        let meta = ColumnMeta::new("created_at", ColumnKind::Timestamp);
        let cell = CellValue::Text("2023-05-01 10:20:30".to_string());

        let dt = datetime_value(&cell, &meta).unwrap();
        assert_eq!(dt.hour(), 10);
        assert_eq!(dt.to_string(), "2023-05-01 10:20:30");
    }

    #[test]
    fn test_missing_column_aborts_projection() {
        let mut event = order_event(full_row());
        event.columns.remove(0); // "id" 컬럼 제거
        event.rows[0].remove(0);

        let mut order = Order::default();
        let err = project(&mut order, &event, 0).unwrap_err();
        match err {
            CanalError::ColumnNotFound { column, table } => {
                assert_eq!(column, "id");
                assert_eq!(table, "testdb.orders");
            }
            other => panic!("unexpected error: {}", other),
        }
    }

    #[test]
    fn test_int_widening() {
        let meta = ColumnMeta::new("n", ColumnKind::SmallInt);
        assert_eq!(int_value(&CellValue::Int8(-5), &meta).unwrap(), -5);
        assert_eq!(int_value(&CellValue::Int16(300), &meta).unwrap(), 300);
        assert_eq!(
            int_value(&CellValue::Int64(i64::MIN), &meta).unwrap(),
            i64::MIN
        );
        assert!(int_value(&CellValue::UInt8(1), &meta).is_err());
    }

    #[test]
    fn test_uint_widening() {
        let meta = ColumnMeta::new("n", ColumnKind::Int);
        assert_eq!(
            uint_value(&CellValue::UInt32(4294967295), &meta).unwrap(),
            4294967295
        );
        assert_eq!(uint_value(&CellValue::UInt8(255), &meta).unwrap(), 255);
        assert!(uint_value(&CellValue::Int8(1), &meta).is_err());
    }

    #[test]
    fn test_float_widening() {
        let meta = ColumnMeta::new("f", ColumnKind::Float);
        assert_eq!(float_value(&CellValue::Float(1.5), &meta).unwrap(), 1.5);
        assert_eq!(float_value(&CellValue::Double(2.25), &meta).unwrap(), 2.25);
        assert!(float_value(&CellValue::Text("x".to_string()), &meta).is_err());
    }

    #[test]
    fn test_json_parse_failure() {
        let meta = ColumnMeta::new("attrs", ColumnKind::Json);
        assert!(json_value(&CellValue::Text("{not json".to_string()), &meta).is_err());
    }
}
