//! Binlog 리스너 - 부트스트랩 및 이벤트 루프
//!
//! 시작 순서:
//! 1. 제어용 연결로 binlog_format 확인
//! 2. master 위치 조회 (여기서부터 스트리밍 시작)
//! 3. allow-list 대상 테이블의 스키마 레지스트리 로드
//! 4. replication 클라이언트(blocking)를 전용 태스크로 기동
//! 5. 채널에서 이벤트를 받아 라우터로 디스패치
//!
//! 시작 단계의 실패는 치명적이며 호출자에게 전파됩니다.
//! 스트리밍 중 이벤트 하나의 실패는 라우터 경계에서 회수됩니다.

use crate::connection::{BinlogPosition, ConnectionConfig, MySqlConnection};
use crate::decode::EventDecoder;
use crate::error::{CanalError, Result};
use crate::events::RowChangeEvent;
use crate::router::{EventRouter, RowSink, StdoutSink, TableAllowList};
use crate::schema::{SchemaRegistry, TableSchema};
use mysql_cdc::binlog_client::BinlogClient;
use mysql_cdc::binlog_options::BinlogOptions;
use mysql_cdc::replica_options::ReplicaOptions;
use mysql_cdc::ssl_mode::SslMode;
use std::fmt;
use tokio::sync::mpsc;
use tracing::info;

/// Canal 설정
#[derive(Debug, Clone)]
pub struct CanalConfig {
    pub connection: ConnectionConfig,
    /// 감시 대상 데이터베이스명
    pub schema: String,
    /// 감시 대상 테이블명 목록 (allow-list)
    pub tables: Vec<String>,
}

/// Binlog 리스너
pub struct BinlogListener {
    config: CanalConfig,
}

impl BinlogListener {
    pub fn new(config: CanalConfig) -> Self {
        BinlogListener { config }
    }

    /// 리스너 실행 (기본 stdout 싱크)
    pub async fn run(&self) -> Result<()> {
        self.run_with_sink(StdoutSink).await
    }

    /// 지정한 싱크로 리스너 실행
    pub async fn run_with_sink<S: RowSink + 'static>(&self, sink: S) -> Result<()> {
        if self.config.tables.is_empty() {
            return Err(CanalError::ConfigError(
                "table allow-list is empty".to_string(),
            ));
        }

        let mut conn = MySqlConnection::connect(self.config.connection.clone()).await?;

        let format = conn.binlog_format().await?;
        if !format.eq_ignore_ascii_case("ROW") {
            return Err(CanalError::ConfigError(format!(
                "binlog_format must be ROW, got {}",
                format
            )));
        }

        let position = conn.master_status().await?;
        info!("Starting from binlog position {}", position);

        let registry = self.load_registry(&mut conn).await?;
        let decoder = EventDecoder::new(registry);

        let (tx, mut rx) = mpsc::unbounded_channel();
        let replica_options = self.replica_options(&position);
        let worker =
            tokio::task::spawn_blocking(move || stream_events(replica_options, decoder, tx));

        info!("{} started", self);

        let allow_list = TableAllowList::new(&self.config.schema, &self.config.tables);
        let mut router = EventRouter::new(allow_list, sink);
        while let Some(event) = rx.recv().await {
            router.dispatch(&event);
        }

        match worker.await {
            Ok(Ok(())) => {
                info!("Replication stream ended");
                Ok(())
            }
            Ok(Err(e)) => Err(e),
            Err(e) => Err(CanalError::Other(format!(
                "replication worker panicked: {}",
                e
            ))),
        }
    }

    /// allow-list 대상 테이블의 컬럼 메타데이터 로드
    async fn load_registry(&self, conn: &mut MySqlConnection) -> Result<SchemaRegistry> {
        let mut registry = SchemaRegistry::new();

        for table in &self.config.tables {
            let columns = conn.table_columns(&self.config.schema, table).await?;
            if columns.is_empty() {
                return Err(CanalError::ConfigError(format!(
                    "table {}.{} not found",
                    self.config.schema, table
                )));
            }

            registry.insert(TableSchema {
                schema: self.config.schema.clone(),
                table: table.clone(),
                columns,
            });
        }

        info!("Loaded metadata for {} tables", registry.len());
        Ok(registry)
    }

    fn replica_options(&self, position: &BinlogPosition) -> ReplicaOptions {
        ReplicaOptions {
            hostname: self.config.connection.hostname.clone(),
            port: self.config.connection.port,
            username: self.config.connection.username.clone(),
            password: self.config.connection.password.clone(),
            blocking: true,
            ssl_mode: SslMode::Disabled,
            binlog: BinlogOptions::from_position(
                position.filename.clone(),
                position.position as u32,
            ),
            ..Default::default()
        }
    }
}

impl fmt::Display for BinlogListener {
    /// 진단 등록용 식별자
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "BinlogListener({})", self.config.schema)
    }
}

/// Blocking replication 루프
///
/// mysql_cdc의 이벤트 이터레이터를 소비해 디코딩된 RowChangeEvent를
/// 채널로 전달합니다. 수신측이 닫히면 조용히 종료합니다.
fn stream_events(
    options: ReplicaOptions,
    mut decoder: EventDecoder,
    tx: mpsc::UnboundedSender<RowChangeEvent>,
) -> Result<()> {
    let mut client = BinlogClient::new(options);

    let events = client
        .replicate()
        .map_err(|e| CanalError::ReplicationError(format!("{:?}", e)))?;

    for result in events {
        let (header, event) =
            result.map_err(|e| CanalError::ReplicationError(format!("{:?}", e)))?;

        for change in decoder.decode(&header, &event) {
            if tx.send(change).is_err() {
                return Ok(());
            }
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_config(tables: Vec<String>) -> CanalConfig {
        CanalConfig {
            connection: ConnectionConfig::default(),
            schema: "testdb".to_string(),
            tables,
        }
    }

    #[test]
    fn test_listener_display() {
        let listener = BinlogListener::new(test_config(vec!["orders".to_string()]));
        assert_eq!(listener.to_string(), "BinlogListener(testdb)");
    }

    #[tokio::test]
    async fn test_empty_allow_list_is_config_error() {
        let listener = BinlogListener::new(test_config(Vec::new()));

        match listener.run().await {
            Err(CanalError::ConfigError(_)) => {}
            other => panic!("unexpected result: {:?}", other),
        }
    }

    #[tokio::test]
    #[ignore] // 실제 MySQL 연결 필요
    async fn test_listener_run_live() -> Result<()> {
        let listener = BinlogListener::new(test_config(vec!["orders".to_string()]));
        listener.run().await
    }
}
