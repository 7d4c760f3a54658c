//! Row 변경 이벤트 및 셀 값 데이터 구조 정의
//!
//! 외부 replication 클라이언트가 디코딩한 행 변경 사항을
//! 라우터/프로젝터가 소비하는 형태로 표현합니다.

use crate::schema::ColumnMeta;
use serde::{Deserialize, Serialize};

/// 행 변경 연산 타입
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ActionKind {
    Insert,
    Update,
    Delete,
}

impl ActionKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ActionKind::Insert => "Insert",
            ActionKind::Update => "Update",
            ActionKind::Delete => "Delete",
        }
    }
}

/// 디코딩된 binlog 셀 값 (다양한 MySQL 타입 지원)
///
/// 런타임 타입 검사 대신 명시적인 variant로 분기합니다.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum CellValue {
    Null,
    Int8(i8),
    Int16(i16),
    Int32(i32),
    Int64(i64),
    UInt8(u8),
    UInt16(u16),
    UInt32(u32),
    UInt64(u64),
    Float(f32),
    Double(f64),
    Text(String),
    Bytes(Vec<u8>),
    Decimal(String),
}

impl CellValue {
    pub fn is_null(&self) -> bool {
        matches!(self, CellValue::Null)
    }

    /// 텍스트 계열 값을 String으로 변환 (Bytes는 UTF-8로 해석)
    pub fn as_text(&self) -> Option<String> {
        match self {
            CellValue::Text(s) => Some(s.clone()),
            CellValue::Bytes(b) => Some(String::from_utf8_lossy(b).to_string()),
            CellValue::Decimal(d) => Some(d.clone()),
            _ => None,
        }
    }
}

/// 하나의 행 변경 알림
///
/// Insert/Delete는 행 튜플 1개, Update는 (old, new) 순서로 2개를 가집니다.
/// 컬럼 메타데이터는 튜플과 같은 순서로 정렬되어 있습니다.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RowChangeEvent {
    /// 데이터베이스명
    pub schema: String,
    /// 테이블명
    pub table: String,
    /// 연산 타입
    pub action: ActionKind,
    /// 컬럼 메타데이터 (순서 = 튜플 순서)
    pub columns: Vec<ColumnMeta>,
    /// 행 튜플들
    pub rows: Vec<Vec<CellValue>>,
    /// 이벤트 타임스탬프 (초 단위, binlog 헤더 기준)
    pub timestamp: u32,
}

impl RowChangeEvent {
    /// "schema.table" 형태의 식별자
    pub fn qualified_name(&self) -> String {
        format!("{}.{}", self.schema, self.table)
    }

    /// 컬럼명으로 위치 조회 (정확한 이름 일치, 선형 탐색)
    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c.name == name)
    }

    /// 특정 행 튜플의 특정 컬럼 값 조회
    pub fn cell(&self, row_index: usize, column_index: usize) -> Option<&CellValue> {
        self.rows.get(row_index).and_then(|row| row.get(column_index))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::{ColumnKind, ColumnMeta};

    fn sample_event() -> RowChangeEvent {
        RowChangeEvent {
            schema: "testdb".to_string(),
            table: "users".to_string(),
            action: ActionKind::Insert,
            columns: vec![
                ColumnMeta::new("id", ColumnKind::BigInt),
                ColumnMeta::new("name", ColumnKind::VarChar),
            ],
            rows: vec![vec![
                CellValue::Int64(1),
                CellValue::Text("alice".to_string()),
            ]],
            timestamp: 0,
        }
    }

    #[test]
    fn test_column_index() {
        let event = sample_event();
        assert_eq!(event.column_index("id"), Some(0));
        assert_eq!(event.column_index("name"), Some(1));
        assert_eq!(event.column_index("missing"), None);
    }

    #[test]
    fn test_cell_lookup() {
        let event = sample_event();
        assert_eq!(event.cell(0, 0), Some(&CellValue::Int64(1)));
        assert_eq!(event.cell(1, 0), None);
    }

    #[test]
    fn test_action_as_str() {
        assert_eq!(ActionKind::Update.as_str(), "Update");
    }

    #[test]
    fn test_cell_value_as_text() {
        assert_eq!(
            CellValue::Bytes(b"abc".to_vec()).as_text(),
            Some("abc".to_string())
        );
        assert_eq!(CellValue::Int64(1).as_text(), None);
    }
}
