//! Repository tests against the real schema.
//!
//! Every test gets a fresh in-memory SQLite database with the production
//! migrations applied. Fixture rows are inserted through [`harness::Fixtures`]
//! with plain SQL, so the repositories under test are the only code paths
//! exercised.
//!
//! ```bash
//! cargo test db::tests
//! ```
