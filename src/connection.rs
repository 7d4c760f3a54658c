//! MySQL 제어용 연결 관리
//!
//! Replication 스트림과 별개로 시작 시 필요한 조회를 담당합니다:
//! master 위치(SHOW MASTER STATUS), binlog_format 확인,
//! INFORMATION_SCHEMA 컬럼 메타데이터.

use crate::error::{CanalError, Result};
use crate::schema::ColumnMeta;
use mysql_async::prelude::*;
use mysql_async::{Conn, Opts};
use std::fmt;
use std::time::Duration;

/// MySQL 연결 설정
#[derive(Debug, Clone)]
pub struct ConnectionConfig {
    pub hostname: String,
    pub port: u16,
    pub username: String,
    pub password: String,
    pub database: Option<String>,
    pub server_id: u32,
    pub timeout: Duration,
}

impl Default for ConnectionConfig {
    fn default() -> Self {
        ConnectionConfig {
            hostname: "localhost".to_string(),
            port: 3306,
            username: "root".to_string(),
            password: String::new(),
            database: None,
            server_id: 1,
            timeout: Duration::from_secs(30),
        }
    }
}

impl ConnectionConfig {
    pub fn new(hostname: impl Into<String>, username: impl Into<String>) -> Self {
        ConnectionConfig {
            hostname: hostname.into(),
            username: username.into(),
            ..Default::default()
        }
    }

    fn build_opts(&self) -> Result<Opts> {
        let connection_string = if let Some(ref db) = self.database {
            format!(
                "mysql://{}:{}@{}:{}/{}",
                self.username, self.password, self.hostname, self.port, db
            )
        } else {
            format!(
                "mysql://{}:{}@{}:{}",
                self.username, self.password, self.hostname, self.port
            )
        };

        connection_string
            .parse()
            .map_err(|_| CanalError::ConnectionError("Failed to parse connection string".to_string()))
    }
}

/// Binlog 파일 위치
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BinlogPosition {
    /// 바이너리 로그 파일명 (e.g., "mysql-bin.000001")
    pub filename: String,
    /// 바이트 위치
    pub position: u64,
}

impl BinlogPosition {
    pub fn new(filename: String, position: u64) -> Self {
        BinlogPosition { filename, position }
    }
}

impl fmt::Display for BinlogPosition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.filename, self.position)
    }
}

/// MySQL 제어용 연결 래퍼
pub struct MySqlConnection {
    conn: Conn,
}

impl MySqlConnection {
    /// 연결. 실패는 시작 단계의 치명적 에러로 호출자에게 전파됩니다.
    pub async fn connect(config: ConnectionConfig) -> Result<Self> {
        let opts = config.build_opts()?;
        let pool = mysql_async::Pool::new(opts);

        let conn = pool
            .get_conn()
            .await
            .map_err(|e| CanalError::ConnectionError(format!("Failed to connect to MySQL: {}", e)))?;

        Ok(MySqlConnection { conn })
    }

    /// 현재 master binlog 위치 조회 (GetMasterPos에 해당)
    pub async fn master_status(&mut self) -> Result<BinlogPosition> {
        let result: Vec<(String, u64, String, String, String)> = self
            .conn
            .query("SHOW MASTER STATUS")
            .await
            .map_err(|e| CanalError::QueryError(format!("Failed to query master status: {}", e)))?;

        let (file, position, _, _, _) = result
            .into_iter()
            .next()
            .ok_or_else(|| CanalError::QueryError("No master status available (is binlog enabled?)".to_string()))?;

        Ok(BinlogPosition::new(file, position))
    }

    /// binlog_format 조회 (ROW, STATEMENT, MIXED)
    pub async fn binlog_format(&mut self) -> Result<String> {
        let result: Vec<(String, String)> = self
            .conn
            .query("SHOW GLOBAL VARIABLES LIKE 'binlog_format'")
            .await
            .map_err(|e| CanalError::QueryError(format!("Failed to query binlog_format: {}", e)))?;

        result
            .into_iter()
            .next()
            .map(|(_, value)| value)
            .ok_or_else(|| CanalError::QueryError("binlog_format not found".to_string()))
    }

    /// 테이블의 컬럼 메타데이터 조회 (순서 보존)
    pub async fn table_columns(&mut self, schema: &str, table: &str) -> Result<Vec<ColumnMeta>> {
        let query = format!(
            "SELECT COLUMN_NAME, DATA_TYPE, COLUMN_TYPE \
             FROM INFORMATION_SCHEMA.COLUMNS \
             WHERE TABLE_SCHEMA = '{}' AND TABLE_NAME = '{}' \
             ORDER BY ORDINAL_POSITION",
            schema, table
        );

        let result: Vec<(String, String, String)> = self
            .conn
            .query(&query)
            .await
            .map_err(|e| CanalError::QueryError(format!("Failed to query table columns: {}", e)))?;

        Ok(result
            .into_iter()
            .map(|(name, data_type, column_type)| {
                ColumnMeta::from_information_schema(&name, &data_type, &column_type)
            })
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_connection_config_default() {
        let config = ConnectionConfig::default();
        assert_eq!(config.hostname, "localhost");
        assert_eq!(config.port, 3306);
    }

    #[test]
    fn test_connection_config_new() {
        let config = ConnectionConfig::new("127.0.0.1", "canal");
        assert_eq!(config.hostname, "127.0.0.1");
        assert_eq!(config.username, "canal");
    }

    #[test]
    fn test_binlog_position_display() {
        let pos = BinlogPosition::new("mysql-bin.000003".to_string(), 4097);
        assert_eq!(pos.to_string(), "mysql-bin.000003:4097");
    }
}
