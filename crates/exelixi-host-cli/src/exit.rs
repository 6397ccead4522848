// Exit codes that are not OpenCL statuses. Fatal OpenCL failures exit with
// the status itself.
pub const EXIT_SUCCESS: i32 = 0;
pub const EXIT_GENERIC_FAIL: i32 = 1;
pub const EXIT_NOT_FOUND: i32 = 2;
