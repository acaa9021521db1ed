//! Tests for the expand resolver.
//!
//! Organized by functionality:
//! - Plain single and list hops
//! - Masking of records the principal cannot read
//! - Sensitive-resource pruning at every path length
//! - Depth limits and unknown relations

mod mocks;

mod resolver_tests;
