//! SQL type mapping for Diesel.
//!
//! Sqlite stores every `INTEGER` column as a 64-bit value, and Wikidot
//! identifiers and timestamps do not fit in [i32]. Diesel maps `INTEGER` to
//! [i32] by default.
//!
//! Using the type mapping feature of Diesel, **all** `INTEGER` fields are
//! mapped to [`BigInt`] which maps them to [i64] fields.
//!
//! See [Diesel Issue #852](https://github.com/diesel-rs/diesel/issues/852).

pub use diesel::sql_types::*;

/// Mapping `INTEGER` SQL type to `BigInt` for [i64].
pub type Integer = BigInt;
