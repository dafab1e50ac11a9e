//! Parquet-backed block store.
//!
//! Row group `i` of the file is block `i`. The footer is read once at open
//! time; statistics and layout come from it without touching row data.

use std::fs::File;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use arrow::compute::concat_batches;
use arrow::datatypes::SchemaRef;
use arrow::error::ArrowError;
use arrow::record_batch::RecordBatch;
use parquet::arrow::arrow_reader::ParquetRecordBatchReaderBuilder;
use parquet::basic::{ConvertedType, LogicalType};
use parquet::file::metadata::{ColumnChunkMetaData, ParquetMetaData};
use parquet::file::statistics::Statistics;
use parquet::schema::types::ColumnDescriptor;
use tracing::debug;

use crate::catalog::block::BlockId;
use crate::catalog::stats::{ColumnStats, ScalarValue};
use crate::engine::QueryExecutor;
use crate::store::{BlockMetadata, BlockStore, ColumnChunkMeta, StoreError};

/// The materialized rows of one row group.
pub type RecordBatches = Arc<[RecordBatch]>;

pub struct ParquetStore {
    path: PathBuf,
    metadata: Arc<ParquetMetaData>,
    schema: SchemaRef,
}

impl ParquetStore {
    /// Open a Parquet file and load its footer.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, StoreError> {
        let path = path.as_ref().to_path_buf();
        let file = File::open(&path)?;
        let builder = ParquetRecordBatchReaderBuilder::try_new(file)?;
        let metadata = builder.metadata().clone();
        let schema = builder.schema().clone();

        debug!(
            path = %path.display(),
            row_groups = metadata.num_row_groups(),
            rows = metadata.file_metadata().num_rows(),
            "Opened parquet store"
        );

        Ok(Self {
            path,
            metadata,
            schema,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Leaf column names in schema order.
    pub fn column_names(&self) -> Vec<String> {
        self.metadata
            .file_metadata()
            .schema_descr()
            .columns()
            .iter()
            .map(|c| c.name().to_string())
            .collect()
    }

    pub fn num_rows(&self) -> u64 {
        self.metadata.file_metadata().num_rows().max(0) as u64
    }

    pub fn schema(&self) -> &SchemaRef {
        &self.schema
    }

    /// Concatenate the rows of `blocks`, in order, into one batch.
    pub fn merge(&self, blocks: &[RecordBatches]) -> Result<RecordBatch, StoreError> {
        let merged = concat_batches(&self.schema, blocks.iter().flat_map(|b| b.iter()))?;
        Ok(merged)
    }
}

/// Hands the selected row groups on as a single merged batch.
impl QueryExecutor<RecordBatches> for ParquetStore {
    type Output = RecordBatch;
    type Error = StoreError;

    fn execute(&self, blocks: &[RecordBatches], _sql: &str) -> Result<RecordBatch, StoreError> {
        self.merge(blocks)
    }
}

impl BlockStore for ParquetStore {
    type Payload = RecordBatches;

    fn num_blocks(&self) -> usize {
        self.metadata.num_row_groups()
    }

    fn block_metadata(&self, block_id: BlockId) -> Option<BlockMetadata> {
        let row_group = self.metadata.row_groups().get(block_id as usize)?;
        let columns = row_group.columns().iter().map(chunk_meta).collect();
        Some(BlockMetadata {
            row_count: row_group.num_rows().max(0) as u64,
            columns,
        })
    }

    fn read_block(&self, block_id: BlockId) -> Result<RecordBatches, StoreError> {
        let num_blocks = self.num_blocks();
        if block_id as usize >= num_blocks {
            return Err(StoreError::UnknownBlock {
                block_id,
                num_blocks,
            });
        }

        let file = File::open(&self.path)?;
        let reader = ParquetRecordBatchReaderBuilder::try_new(file)?
            .with_row_groups(vec![block_id as usize])
            .build()?;
        let batches = reader.collect::<Result<Vec<_>, ArrowError>>()?;

        debug!(
            block_id,
            batches = batches.len(),
            rows = batches.iter().map(|b| b.num_rows()).sum::<usize>(),
            "Read row group"
        );

        Ok(batches.into())
    }
}

/// How footer min / max values relate to the column's logical values.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum StatsOrder {
    /// Physical order is logical order.
    Physical,
    /// Unscaled integers of a decimal with this scale.
    Decimal { scale: i32 },
    /// Physical order says nothing about logical order.
    Unusable,
}

fn stats_order(descr: &ColumnDescriptor) -> StatsOrder {
    match descr.logical_type() {
        Some(LogicalType::Decimal { scale, .. }) => return StatsOrder::Decimal { scale },
        Some(LogicalType::Integer { is_signed: false, .. }) => return StatsOrder::Unusable,
        _ => {}
    }
    match descr.converted_type() {
        ConvertedType::DECIMAL => StatsOrder::Decimal {
            scale: descr.type_scale(),
        },
        // Unsigned values are stored in signed physical types.
        ConvertedType::UINT_8
        | ConvertedType::UINT_16
        | ConvertedType::UINT_32
        | ConvertedType::UINT_64
        | ConvertedType::INTERVAL => StatsOrder::Unusable,
        _ => StatsOrder::Physical,
    }
}

fn chunk_meta(column: &ColumnChunkMetaData) -> ColumnChunkMeta {
    let descr = column.column_descr();
    let stats = match stats_order(descr) {
        StatsOrder::Unusable => None,
        order => column.statistics().map(|s| convert_statistics(s, order)),
    };

    ColumnChunkMeta {
        name: descr.name().to_string(),
        byte_offset: column
            .dictionary_page_offset()
            .unwrap_or_else(|| column.data_page_offset())
            .max(0) as u64,
        byte_length: column.compressed_size().max(0) as u64,
        compression: format!("{:?}", column.compression()),
        stats,
    }
}

/// Largest magnitude an `i64` keeps exactly as an `f64`.
const MAX_EXACT_F64_INT: u64 = 1 << 53;

/// Powers of ten that are exact in an `f64`.
const POW10: [f64; 23] = [
    1e0, 1e1, 1e2, 1e3, 1e4, 1e5, 1e6, 1e7, 1e8, 1e9, 1e10, 1e11, 1e12, 1e13, 1e14, 1e15, 1e16,
    1e17, 1e18, 1e19, 1e20, 1e21, 1e22,
];

/// Scale an unscaled decimal to its nearest `f64`.
///
/// Both operands are exact, so the division rounds once and lands on the
/// same value as parsing the decimal literal. Rounding is monotonic, which
/// keeps scaled bounds valid. Values or scales outside that range give no
/// bound.
fn scale_decimal(unscaled: i64, scale: i32) -> Option<ScalarValue> {
    if unscaled.unsigned_abs() > MAX_EXACT_F64_INT {
        return None;
    }
    let divisor = usize::try_from(scale).ok().and_then(|s| POW10.get(s))?;
    Some(ScalarValue::Float(unscaled as f64 / divisor))
}

fn convert_statistics(stats: &Statistics, order: StatsOrder) -> ColumnStats {
    let (min, max) = match (order, stats) {
        (StatsOrder::Decimal { scale }, Statistics::Int32(s)) => (
            s.min_opt().and_then(|v| scale_decimal(*v as i64, scale)),
            s.max_opt().and_then(|v| scale_decimal(*v as i64, scale)),
        ),
        (StatsOrder::Decimal { scale }, Statistics::Int64(s)) => (
            s.min_opt().and_then(|v| scale_decimal(*v, scale)),
            s.max_opt().and_then(|v| scale_decimal(*v, scale)),
        ),
        // Byte-array decimals are big-endian two's complement.
        (StatsOrder::Decimal { .. }, _) => (None, None),
        (_, Statistics::Boolean(s)) => (
            s.min_opt().map(|v| ScalarValue::Boolean(*v)),
            s.max_opt().map(|v| ScalarValue::Boolean(*v)),
        ),
        (_, Statistics::Int32(s)) => (
            s.min_opt().map(|v| ScalarValue::Int(*v as i64)),
            s.max_opt().map(|v| ScalarValue::Int(*v as i64)),
        ),
        (_, Statistics::Int64(s)) => (
            s.min_opt().map(|v| ScalarValue::Int(*v)),
            s.max_opt().map(|v| ScalarValue::Int(*v)),
        ),
        (_, Statistics::Float(s)) => (
            s.min_opt().map(|v| ScalarValue::Float(*v as f64)),
            s.max_opt().map(|v| ScalarValue::Float(*v as f64)),
        ),
        (_, Statistics::Double(s)) => (
            s.min_opt().map(|v| ScalarValue::Float(*v)),
            s.max_opt().map(|v| ScalarValue::Float(*v)),
        ),
        // Truncated byte-array bounds are not safe to compare against.
        (_, Statistics::ByteArray(s)) if stats.min_is_exact() && stats.max_is_exact() => (
            s.min_opt()
                .and_then(|v| v.as_utf8().ok())
                .map(|v| ScalarValue::Utf8(v.to_string())),
            s.max_opt()
                .and_then(|v| v.as_utf8().ok())
                .map(|v| ScalarValue::Utf8(v.to_string())),
        ),
        _ => (None, None),
    };

    ColumnStats {
        min,
        max,
        null_count: stats.null_count_opt(),
    }
}
