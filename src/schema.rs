//! 테이블 스키마 메타데이터
//!
//! Binlog의 테이블 맵 이벤트에는 컬럼 이름과 enum 값 목록이 없으므로
//! INFORMATION_SCHEMA에서 읽어 캐싱합니다.

use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// 선언된 SQL 컬럼 타입 분류
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ColumnKind {
    TinyInt,
    SmallInt,
    MediumInt,
    Int,
    BigInt,
    Float,
    Double,
    Decimal,
    Char,
    VarChar,
    Text,
    Blob,
    Enum,
    Set,
    Date,
    Time,
    DateTime,
    Timestamp,
    Year,
    Json,
    Other(String),
}

impl ColumnKind {
    /// INFORMATION_SCHEMA.COLUMNS.DATA_TYPE 문자열에서 분류
    pub fn from_data_type(data_type: &str) -> Self {
        match data_type.to_ascii_lowercase().as_str() {
            "tinyint" => ColumnKind::TinyInt,
            "smallint" => ColumnKind::SmallInt,
            "mediumint" => ColumnKind::MediumInt,
            "int" | "integer" => ColumnKind::Int,
            "bigint" => ColumnKind::BigInt,
            "float" => ColumnKind::Float,
            "double" | "real" => ColumnKind::Double,
            "decimal" | "numeric" => ColumnKind::Decimal,
            "char" => ColumnKind::Char,
            "varchar" => ColumnKind::VarChar,
            "text" | "tinytext" | "mediumtext" | "longtext" => ColumnKind::Text,
            "blob" | "tinyblob" | "mediumblob" | "longblob" | "binary" | "varbinary" => {
                ColumnKind::Blob
            }
            "enum" => ColumnKind::Enum,
            "set" => ColumnKind::Set,
            "date" => ColumnKind::Date,
            "time" => ColumnKind::Time,
            "datetime" => ColumnKind::DateTime,
            "timestamp" => ColumnKind::Timestamp,
            "year" => ColumnKind::Year,
            "json" => ColumnKind::Json,
            other => ColumnKind::Other(other.to_string()),
        }
    }

    /// Timestamp 프로젝션이 허용되는 타입인지 여부
    pub fn is_temporal(&self) -> bool {
        matches!(self, ColumnKind::DateTime | ColumnKind::Timestamp)
    }
}

/// 컬럼 메타데이터
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ColumnMeta {
    /// 컬럼명
    pub name: String,
    /// 선언된 타입 분류
    pub kind: ColumnKind,
    /// UNSIGNED 여부
    pub unsigned: bool,
    /// enum 컬럼의 값 목록 (binlog의 raw 값은 1-based ordinal)
    pub enum_values: Vec<String>,
}

impl ColumnMeta {
    pub fn new(name: impl Into<String>, kind: ColumnKind) -> Self {
        ColumnMeta {
            name: name.into(),
            kind,
            unsigned: false,
            enum_values: Vec::new(),
        }
    }

    /// INFORMATION_SCHEMA의 (COLUMN_NAME, DATA_TYPE, COLUMN_TYPE)에서 생성
    pub fn from_information_schema(name: &str, data_type: &str, column_type: &str) -> Self {
        let kind = ColumnKind::from_data_type(data_type);
        let unsigned = column_type.to_ascii_lowercase().contains("unsigned");
        let enum_values = if kind == ColumnKind::Enum {
            parse_enum_values(column_type)
        } else {
            Vec::new()
        };

        ColumnMeta {
            name: name.to_string(),
            kind,
            unsigned,
            enum_values,
        }
    }
}

/// COLUMN_TYPE 리터럴에서 enum 값 목록 추출
///
/// 예: "enum('pending','shipped','done')" -> ["pending", "shipped", "done"]
fn parse_enum_values(column_type: &str) -> Vec<String> {
    let Ok(re) = Regex::new(r"'([^']*)'") else {
        return Vec::new();
    };

    re.captures_iter(column_type)
        .filter_map(|caps| caps.get(1))
        .map(|m| m.as_str().to_string())
        .collect()
}

/// 하나의 테이블 스키마 (순서 있는 컬럼 목록)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TableSchema {
    pub schema: String,
    pub table: String,
    pub columns: Vec<ColumnMeta>,
}

impl TableSchema {
    /// "schema.table" 소문자 키 (조회용)
    pub fn key(&self) -> String {
        format!("{}.{}", self.schema, self.table).to_lowercase()
    }
}

/// 테이블 스키마 캐시
///
/// 시작 시 allow-list 대상 테이블에 대해 한 번 로드되며 이후 읽기 전용입니다.
#[derive(Debug, Clone, Default)]
pub struct SchemaRegistry {
    tables: HashMap<String, TableSchema>,
}

impl SchemaRegistry {
    pub fn new() -> Self {
        SchemaRegistry {
            tables: HashMap::new(),
        }
    }

    pub fn insert(&mut self, table: TableSchema) {
        self.tables.insert(table.key(), table);
    }

    /// schema.table로 조회 (대소문자 무시)
    pub fn get(&self, schema: &str, table: &str) -> Option<&TableSchema> {
        let key = format!("{}.{}", schema, table).to_lowercase();
        self.tables.get(&key)
    }

    pub fn len(&self) -> usize {
        self.tables.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tables.is_empty()
    }
}
