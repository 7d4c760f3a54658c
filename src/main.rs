/// MySQL binlog 리스너 실행 바이너리
///
/// 환경 변수로 연결 정보와 감시 대상 테이블을 설정하고,
/// 변경된 행을 stdout으로 내보냅니다.
use rust_canal::connection::ConnectionConfig;
use rust_canal::listener::{BinlogListener, CanalConfig};
use std::env;
use tracing::info;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // 로깅 초기화
    tracing_subscriber::fmt::init();

    let schema = env::var("DB_NAME").unwrap_or_else(|_| "testdb".to_string());

    let config = CanalConfig {
        connection: ConnectionConfig {
            hostname: env::var("DB_HOST").unwrap_or_else(|_| "localhost".to_string()),
            port: env::var("DB_PORT")
                .unwrap_or_else(|_| "3306".to_string())
                .parse()
                .unwrap_or(3306),
            username: env::var("DB_USER").unwrap_or_else(|_| "root".to_string()),
            password: env::var("DB_PASSWORD").unwrap_or_default(),
            database: Some(schema.clone()),
            server_id: 1,
            timeout: std::time::Duration::from_secs(30),
        },
        schema,
        // 쉼표로 구분된 테이블 목록
        tables: env::var("CANAL_TABLES")
            .unwrap_or_else(|_| "orders".to_string())
            .split(',')
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect(),
    };

    info!("Starting binlog listener for {}", config.schema);
    info!("Watching tables: {:?}", config.tables);

    let listener = BinlogListener::new(config);
    listener.run().await?;

    Ok(())
}
