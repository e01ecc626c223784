//! Test-only helpers: a leak-checking resource snapshot and a diagnostic log
//! channel. Neither is part of the four CORE subsystems' public contracts —
//! they exist purely to support this crate's own test suite, the way
//! `C-kern/test/resourceusage.c` and `C-kern/test/test.c` supported the
//! original's.

pub mod log;
pub mod resourceusage;
