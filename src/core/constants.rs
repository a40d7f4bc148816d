// Tick and timing
pub const TICK_INTERVAL_MS: u64 = 1000;
pub const AUTOSAVE_INTERVAL_SECONDS: u64 = 5;
pub const RITUAL_DURATION_MS: u64 = 2000;
pub const COMMAND_QUEUE_CAPACITY: usize = 32;
pub const MEDITATION_LOG_CAPACITY: usize = 5;

// Spirit power accrual: floor(BASE_SPIRIT_PER_TICK * multiplier * (1 + (level - 1) * STEP))
pub const BASE_SPIRIT_PER_TICK: f64 = 10.0;
pub const METHOD_LEVEL_BONUS_STEP: f64 = 0.1;

// Spirit stone windfalls while meditating
pub const STONE_FIND_CHANCE: f64 = 0.05;
pub const STONE_FIND_MIN: u64 = 1;
pub const STONE_FIND_MAX: u64 = 5;

// Sub-levels within a tier
pub const MIN_SUB_LEVEL: u32 = 1;
pub const MAX_SUB_LEVEL: u32 = 9;

// Breakthrough odds (percentage points)
pub const MAJOR_BREAKTHROUGH_BASE_RATE: u32 = 30;
pub const MINOR_BREAKTHROUGH_BASE_RATE: u32 = 100;
pub const FAILURE_BONUS_GAIN: u32 = 5;
pub const MAX_BREAKTHROUGH_BONUS: u32 = 100;
pub const MAX_SUCCESS_RATE: u32 = 100;

// Minor breakthrough cost: floor(base * (1 + level * STEP))
pub const MINOR_COST_LEVEL_STEP: f64 = 0.5;
/// Used as the minor-breakthrough base when a tier declares no requirement.
pub const FALLBACK_MINOR_COST_BASE: u64 = 1000;

// Save file format
pub const SAVE_VERSION_MAGIC: u64 = 0x4355_4C54_5641_0001;
