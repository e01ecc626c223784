//! Hash primitives. Correctness-only: spec.md's Non-goals explicitly exclude
//! any cryptographic authority over SHA-1 beyond matching the reference
//! digest.

pub mod sha1;
