/// Fixed slot counts per multiplex category.
pub const MATRIX_SLOTS: usize = 3;
pub const FORMATION_SLOTS: usize = 2;
pub const MANAGEMENT_SLOTS: usize = 2;
pub const COMPLEX_SLOTS: usize = 2;

/// Maximum number of source rows per incid.
pub const SOURCE_SLOTS: usize = 3;

/// Default number of values per chunked `IN` predicate.
pub const DEFAULT_CONDITION_CHUNK_SIZE: usize = 240;

/// Width of the zero-padded numeric part of an incid (`HLU:0000042`).
pub const INCID_NUMBER_WIDTH: usize = 7;

/// Largest incid number that fits the fixed width.
pub const MAX_INCID_NUMBER: u32 = 9_999_999;

/// Width of a zero-padded toid fragment id (`00003`).
pub const FRAGMENT_ID_WIDTH: usize = 5;

/// Separator between codes in the derived IHS summary.
pub const IHS_SUMMARY_SEPARATOR: &str = ".";

/// Determination written onto a priority habitat row that is no longer
/// supported by the current classification.
pub const BAP_DETERMINATION_NOT_CURRENT: &str = "X";

/// Determination given to priority habitat rows created automatically from
/// the classification.
pub const BAP_DETERMINATION_AUTO_DEFAULT: &str = "D";

/// Status written onto pending external updates superseded by a manual save.
pub const OSMM_STATUS_SUPERSEDED: i32 = -1;

/// Timestamp format for history and modification stamps (second resolution).
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Name of the GIS-side geometry length column.
pub const GIS_LENGTH_COLUMN: &str = "shape_length";

/// Name of the GIS-side geometry area column.
pub const GIS_AREA_COLUMN: &str = "shape_area";
