pub mod calibration;
pub mod call_records;
pub mod tracked_numbers;
