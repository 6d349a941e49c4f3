pub mod allocation;
pub mod dorm;
