//! Canal 관련 에러 타입

use std::io;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum CanalError {
    #[error("MySQL 연결 에러: {0}")]
    ConnectionError(String),

    #[error("쿼리 실행 에러: {0}")]
    QueryError(String),

    #[error("설정 에러: {0}")]
    ConfigError(String),

    #[error("Replication 스트림 에러: {0}")]
    ReplicationError(String),

    #[error("컬럼을 찾을 수 없습니다: {column} (테이블: {table})")]
    ColumnNotFound { column: String, table: String },

    #[error("지원하지 않는 컬럼 타입: {column} ({detail})")]
    UnsupportedColumnType { column: String, detail: String },

    #[error("Timestamp 파싱 에러: {0}")]
    TimestampParseError(String),

    #[error("필드 프로젝션 에러: {field} (컬럼: {column}): {source}")]
    ProjectionError {
        field: &'static str,
        column: String,
        source: Box<CanalError>,
    },

    #[error("행 직렬화 에러 ({action}, row {row_index}): {source}")]
    RowSerializeError {
        action: &'static str,
        row_index: usize,
        source: serde_json::Error,
    },

    #[error("직렬화 에러: {0}")]
    SerializationError(#[from] serde_json::Error),

    #[error("I/O 에러: {0}")]
    IoError(String),

    #[error("예상치 못한 에러: {0}")]
    Other(String),
}

impl From<io::Error> for CanalError {
    fn from(err: io::Error) -> Self {
        CanalError::IoError(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, CanalError>;
