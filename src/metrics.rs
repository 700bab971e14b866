// Copyright 2021 TiKV Project Authors. Licensed under Apache-2.0.

use prometheus::{register_int_counter, IntCounter};

lazy_static! {
    pub static ref COMPACTION_FILTERED: IntCounter = register_int_counter!(
        "rockdis_compaction_filtered",
        "Expired metadata rows dropped by compaction"
    )
    .unwrap();
    pub static ref COMPACTION_ORPHAN_DROPPED: IntCounter = register_int_counter!(
        "rockdis_compaction_orphan_dropped",
        "Orphaned or stale sub-key rows dropped by compaction"
    )
    .unwrap();
    pub static ref COMPACTION_FILTER_FAILURE: IntCounter = register_int_counter!(
        "rockdis_compaction_filter_failure",
        "Compaction filter met a decode failure"
    )
    .unwrap();
    pub static ref COMPACTION_UNKNOWN_CF: IntCounter = register_int_counter!(
        "rockdis_compaction_unknown_cfcode",
        "Rows with an unknown cf code seen by compaction"
    )
    .unwrap();
    pub static ref PROCESSOR_COMMANDS: IntCounter = register_int_counter!(
        "rockdis_processor_commands_total",
        "Commands executed by the processor"
    )
    .unwrap();
    pub static ref PROCESSOR_ERRORS: IntCounter = register_int_counter!(
        "rockdis_processor_errors_total",
        "Commands aborted with an error reply"
    )
    .unwrap();
}
