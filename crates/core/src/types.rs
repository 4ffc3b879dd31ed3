/// Backend primary keys are `Long` identity columns.
pub type DbId = i64;

/// Wall-clock instants travel as milliseconds since the Unix epoch.
pub type EpochMillis = i64;

/// Durations (event length, pool process time) are plain milliseconds.
pub type Millis = i64;
