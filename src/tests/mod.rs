//! End-to-end pipeline scenarios against the in-memory ledger
