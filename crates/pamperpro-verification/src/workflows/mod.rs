pub mod professional;
