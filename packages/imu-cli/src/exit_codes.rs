pub const SUCCESS: i32 = 0;
/// Bad arguments, unreadable band file, no matching traces
pub const INPUT_ERROR: i32 = 1;
/// The transport could not be opened
pub const CONNECT_ERROR: i32 = 3;
pub const EXECUTION_ERROR: i32 = 4;
/// Some traces in a batch failed
pub const PARTIAL_FAILURE: i32 = 5;
