//! 외부 replication 클라이언트 이벤트 디코딩
//!
//! mysql_cdc가 디코딩한 binlog 이벤트를 RowChangeEvent로 변환합니다.
//! 테이블 맵 이벤트로 table_id -> 테이블 매핑을 추적하고, 행 이벤트를
//! 스키마 레지스트리의 컬럼 메타데이터와 결합합니다.
//! 이 모듈만 mysql_cdc의 이벤트 타입을 직접 다룹니다.

use crate::events::{ActionKind, CellValue, RowChangeEvent};
use crate::projector::DATETIME_FORMAT;
use crate::schema::{ColumnMeta, SchemaRegistry};
use mysql_cdc::events::event_header::EventHeader;
use mysql_cdc::events::row_events::delete_rows_event::DeleteRowsEvent;
use mysql_cdc::events::row_events::mysql_value::MySqlValue;
use mysql_cdc::events::row_events::row_data::RowData;
use mysql_cdc::events::row_events::update_rows_event::UpdateRowsEvent;
use mysql_cdc::events::row_events::write_rows_event::WriteRowsEvent;
use mysql_cdc::events::binlog_event::BinlogEvent;
use std::collections::HashMap;
use tracing::debug;

/// Binlog 이벤트 -> RowChangeEvent 디코더
///
/// 테이블 맵 상태를 가지므로 하나의 replication 스트림당 하나를 사용합니다.
pub struct EventDecoder {
    registry: SchemaRegistry,
    /// table_id -> (schema, table). 테이블 맵 이벤트로 갱신됩니다.
    table_map: HashMap<u64, (String, String)>,
}

impl EventDecoder {
    pub fn new(registry: SchemaRegistry) -> Self {
        EventDecoder {
            registry,
            table_map: HashMap::new(),
        }
    }

    /// 이벤트 하나를 0개 이상의 RowChangeEvent로 변환
    ///
    /// Update는 (old, new) 쌍마다, Insert/Delete는 행마다 하나씩 만듭니다.
    /// 행 변경이 아닌 이벤트와 레지스트리에 없는 테이블의 이벤트는
    /// 빈 결과를 반환합니다.
    pub fn decode(&mut self, header: &EventHeader, event: &BinlogEvent) -> Vec<RowChangeEvent> {
        match event {
            BinlogEvent::TableMapEvent(e) => {
                self.table_map
                    .insert(e.table_id, (e.database_name.clone(), e.table_name.clone()));
                Vec::new()
            }
            BinlogEvent::WriteRowsEvent(e) => self.decode_write(header, e),
            BinlogEvent::UpdateRowsEvent(e) => self.decode_update(header, e),
            BinlogEvent::DeleteRowsEvent(e) => self.decode_delete(header, e),
            _ => Vec::new(),
        }
    }

    fn decode_write(&self, header: &EventHeader, event: &WriteRowsEvent) -> Vec<RowChangeEvent> {
        let Some((schema, table, columns)) = self.table_context(event.table_id) else {
            return Vec::new();
        };

        event
            .rows
            .iter()
            .map(|row| RowChangeEvent {
                schema: schema.clone(),
                table: table.clone(),
                action: ActionKind::Insert,
                columns: columns.clone(),
                rows: vec![decode_row(row, &columns)],
                timestamp: header.timestamp,
            })
            .collect()
    }

    fn decode_update(&self, header: &EventHeader, event: &UpdateRowsEvent) -> Vec<RowChangeEvent> {
        let Some((schema, table, columns)) = self.table_context(event.table_id) else {
            return Vec::new();
        };

        event
            .rows
            .iter()
            .map(|pair| RowChangeEvent {
                schema: schema.clone(),
                table: table.clone(),
                action: ActionKind::Update,
                columns: columns.clone(),
                rows: vec![
                    decode_row(&pair.before_update, &columns),
                    decode_row(&pair.after_update, &columns),
                ],
                timestamp: header.timestamp,
            })
            .collect()
    }

    fn decode_delete(&self, header: &EventHeader, event: &DeleteRowsEvent) -> Vec<RowChangeEvent> {
        let Some((schema, table, columns)) = self.table_context(event.table_id) else {
            return Vec::new();
        };

        event
            .rows
            .iter()
            .map(|row| RowChangeEvent {
                schema: schema.clone(),
                table: table.clone(),
                action: ActionKind::Delete,
                columns: columns.clone(),
                rows: vec![decode_row(row, &columns)],
                timestamp: header.timestamp,
            })
            .collect()
    }

    /// table_id를 (schema, table, 컬럼 메타데이터)로 해석
    fn table_context(&self, table_id: u64) -> Option<(String, String, Vec<ColumnMeta>)> {
        let (schema, table) = match self.table_map.get(&table_id) {
            Some(entry) => entry,
            None => {
                debug!("No table map entry for table_id {}", table_id);
                return None;
            }
        };

        match self.registry.get(schema, table) {
            Some(table_schema) => {
                Some((schema.clone(), table.clone(), table_schema.columns.clone()))
            }
            None => {
                // allow-list 대상이 아닌 테이블 (레지스트리는 대상 테이블만 로드)
                debug!("No cached schema for {}.{}", schema, table);
                None
            }
        }
    }
}

/// 행 하나의 셀들을 CellValue로 변환
fn decode_row(row: &RowData, columns: &[ColumnMeta]) -> Vec<CellValue> {
    row.cells
        .iter()
        .enumerate()
        .map(|(i, cell)| cell_value(cell.as_ref(), columns.get(i)))
        .collect()
}

/// mysql_cdc 셀 값 하나를 CellValue로 변환
///
/// Binlog에는 정수의 부호 정보가 없으므로 INFORMATION_SCHEMA에서 읽은
/// unsigned 여부로 해석합니다. 시간 계열 값은 프로젝터가 소비하는
/// "YYYY-MM-DD HH:MM:SS" 텍스트 형식으로 정규화합니다.
fn cell_value(value: Option<&MySqlValue>, meta: Option<&ColumnMeta>) -> CellValue {
    let unsigned = meta.map(|m| m.unsigned).unwrap_or(false);

    let Some(value) = value else {
        return CellValue::Null;
    };

    match value {
        MySqlValue::TinyInt(v) => {
            if unsigned {
                CellValue::UInt8(*v as u8)
            } else {
                CellValue::Int8(*v as i8)
            }
        }
        MySqlValue::SmallInt(v) => {
            if unsigned {
                CellValue::UInt16(*v as u16)
            } else {
                CellValue::Int16(*v as i16)
            }
        }
        MySqlValue::MediumInt(v) => {
            if unsigned {
                CellValue::UInt32(*v as u32)
            } else {
                CellValue::Int32(*v as i32)
            }
        }
        MySqlValue::Int(v) => {
            if unsigned {
                CellValue::UInt32(*v as u32)
            } else {
                CellValue::Int32(*v as i32)
            }
        }
        MySqlValue::BigInt(v) => {
            if unsigned {
                CellValue::UInt64(*v as u64)
            } else {
                CellValue::Int64(*v as i64)
            }
        }
        MySqlValue::Float(v) => CellValue::Float(*v),
        MySqlValue::Double(v) => CellValue::Double(*v),
        MySqlValue::Decimal(v) => CellValue::Decimal(v.clone()),
        MySqlValue::String(v) => CellValue::Text(v.clone()),
        MySqlValue::Blob(v) => CellValue::Bytes(v.clone()),
        // enum의 raw 값은 값 목록에 대한 1-based ordinal
        MySqlValue::Enum(v) => CellValue::Int64(*v as i64),
        MySqlValue::Set(v) => CellValue::UInt64(*v as u64),
        MySqlValue::Year(v) => CellValue::UInt16(*v as u16),
        MySqlValue::Bit(bits) => CellValue::UInt64(bits_to_u64(bits)),
        MySqlValue::Date(d) => CellValue::Text(d.format("%Y-%m-%d").to_string()),
        MySqlValue::Time(t) => CellValue::Text(t.format("%H:%M:%S").to_string()),
        MySqlValue::DateTime(dt) => CellValue::Text(dt.format(DATETIME_FORMAT).to_string()),
        MySqlValue::Timestamp(ts) => CellValue::Text(ts.format(DATETIME_FORMAT).to_string()),
        MySqlValue::Json(bytes) => CellValue::Text(String::from_utf8_lossy(bytes).to_string()),
    }
}

/// BIT 컬럼의 비트 목록을 u64로 접음 (MSB 우선)
fn bits_to_u64(bits: &[bool]) -> u64 {
    bits.iter().take(64).fold(0u64, |acc, bit| {
        (acc << 1) | u64::from(*bit)
    })
}
