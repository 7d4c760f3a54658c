//! 이벤트 라우터 - 테이블 allow-list 매칭 및 싱크 전달
//!
//! 매칭된 이벤트의 행 튜플을 JSON으로 직렬화해 싱크로 내보냅니다.
//! 이벤트 하나의 실패가 replication 스트림을 중단시키지 않도록
//! dispatch 경계에서 에러와 panic을 모두 회수합니다.

use crate::error::{CanalError, Result};
use crate::events::{ActionKind, RowChangeEvent};
use std::panic::{self, AssertUnwindSafe};
use tracing::{debug, error, warn};

/// 감시 대상 테이블 allow-list ({schema, table} 쌍)
///
/// 매칭은 "schema.table" 소문자 정규화 후 선형 탐색, 첫 일치에서 종료합니다.
#[derive(Debug, Clone, Default)]
pub struct TableAllowList {
    entries: Vec<String>,
}

impl TableAllowList {
    /// 하나의 스키마와 테이블명 목록으로 구성
    pub fn new(schema: &str, tables: &[String]) -> Self {
        let entries = tables
            .iter()
            .map(|table| format!("{}.{}", schema, table).to_lowercase())
            .collect();
        TableAllowList { entries }
    }

    /// {schema, table} 쌍 추가
    pub fn add(&mut self, schema: &str, table: &str) {
        self.entries
            .push(format!("{}.{}", schema, table).to_lowercase());
    }

    /// 대소문자 무시 매칭
    pub fn contains(&self, schema: &str, table: &str) -> bool {
        let key = format!("{}.{}", schema, table).to_lowercase();
        self.entries.iter().any(|entry| *entry == key)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// 변경된 행을 전달받는 싱크
///
/// 현재는 stdout이 기본이며, 메시지 발행 등으로 교체하려면
/// 이 트레이트를 구현합니다.
pub trait RowSink: Send {
    fn emit(&mut self, line: &str);
}

/// 표준 출력 싱크 (기본 동작)
#[derive(Debug, Default)]
pub struct StdoutSink;

impl RowSink for StdoutSink {
    fn emit(&mut self, line: &str) {
        println!("{}", line);
    }
}

/// 테스트용 메모리 싱크
#[derive(Debug, Default)]
pub struct MemorySink {
    pub lines: Vec<String>,
}

impl RowSink for MemorySink {
    fn emit(&mut self, line: &str) {
        self.lines.push(line.to_string());
    }
}

/// 이벤트 라우터
pub struct EventRouter<S: RowSink> {
    allow_list: TableAllowList,
    sink: S,
}

impl<S: RowSink> EventRouter<S> {
    pub fn new(allow_list: TableAllowList, sink: S) -> Self {
        EventRouter { allow_list, sink }
    }

    pub fn sink(&self) -> &S {
        &self.sink
    }

    /// 행 변경 이벤트 하나를 처리
    ///
    /// allow-list에 없는 테이블은 조용히 무시합니다 (에러 아님).
    /// Update는 old/new 두 튜플, Insert/Delete는 첫 튜플을 내보냅니다.
    pub fn handle_row_change(&mut self, event: &RowChangeEvent) -> Result<()> {
        if !self.allow_list.contains(&event.schema, &event.table) {
            debug!("Ignoring event for {}", event.qualified_name());
            return Ok(());
        }

        match event.action {
            ActionKind::Update => {
                let old_row = self.serialize_row(event, 0)?;
                let new_row = self.serialize_row(event, 1)?;
                self.sink.emit(&format!("Old Row: {}", old_row));
                self.sink.emit(&format!("New Row: {}", new_row));
                self.sink
                    .emit(&format!("{} is updated: {}", event.table, new_row));
            }
            ActionKind::Insert => {
                let row = self.serialize_row(event, 0)?;
                self.sink.emit(&format!("Inserted Row: {}", row));
                self.sink
                    .emit(&format!("{} is created: {}", event.table, row));
            }
            ActionKind::Delete => {
                let row = self.serialize_row(event, 0)?;
                self.sink.emit(&format!("Deleted Row: {}", row));
                self.sink
                    .emit(&format!("{} is deleted: {}", event.table, row));
            }
        }

        Ok(())
    }

    /// catch-and-continue 경계
    ///
    /// 에러와 panic을 모두 로그로 남기고 이벤트를 버립니다.
    /// 호스트 스트림 루프로는 어떤 실패도 전파되지 않습니다.
    pub fn dispatch(&mut self, event: &RowChangeEvent) {
        let result = panic::catch_unwind(AssertUnwindSafe(|| self.handle_row_change(event)));

        match result {
            Ok(Ok(())) => {}
            Ok(Err(e)) => {
                warn!(
                    "Dropping {} event for {}: {}",
                    event.action.as_str(),
                    event.qualified_name(),
                    e
                );
            }
            Err(payload) => {
                let backtrace = std::backtrace::Backtrace::force_capture();
                error!(
                    "Panic while handling {} event for {}: {}\n{}",
                    event.action.as_str(),
                    event.qualified_name(),
                    panic_message(&payload),
                    backtrace
                );
            }
        }
    }

    fn serialize_row(&self, event: &RowChangeEvent, row_index: usize) -> Result<String> {
        let row = event.rows.get(row_index).ok_or_else(|| CanalError::Other(format!(
            "{} event for {} is missing row {}",
            event.action.as_str(),
            event.qualified_name(),
            row_index
        )))?;

        serde_json::to_string(row).map_err(|e| CanalError::RowSerializeError {
            action: event.action.as_str(),
            row_index,
            source: e,
        })
    }
}

fn panic_message(payload: &Box<dyn std::any::Any + Send>) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}
